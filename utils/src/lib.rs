//! Shared infrastructure utilities for Parley.
//!
//! - **`atomic_write`**: crash-safe file persistence (temp + rename)

pub mod atomic_write;

pub use atomic_write::{
    SyncPolicy, WriteOptions, atomic_write, atomic_write_with, recover_bak_file,
};
