//! `utils` is intended to be a place to put code that is shared
//! between the other crates in this repository.

// logging setup
pub mod logging;

// transaction log serial numbers
pub mod serial;
