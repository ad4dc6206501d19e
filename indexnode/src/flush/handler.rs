/// Owner of a transaction log stream and a set of flush targets.
///
/// The handler name keys the per-handler transaction log statistics handed
/// to the flush strategies. The rest of the handler surface (collecting
/// flush targets, acknowledging finished flushes, pruning the log) belongs
/// to the flush engine and is not consumed here.
pub trait FlushHandler: Send + Sync {
    /// Handler name, unique within the node.
    fn name(&self) -> &str;
}
