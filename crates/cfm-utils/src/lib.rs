//! Small helpers shared by the conda-forge metadata crates.

pub mod bytes;
pub mod error;
pub mod fs;
pub mod path;
pub mod time;
