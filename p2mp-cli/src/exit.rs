//! Process exit codes for the CLI tools
//!
//! Aligned with the sysexits convention: data and file problems are
//! distinguishable from network setup problems in scripts.

/// Input file could not be opened, or output file could not be created.
pub const EX_FILE_OPEN: i32 = 65;

/// The input file shrank while being read.
pub const EX_SHORT_READ: i32 = 66;

/// Socket setup failed: bind, connect, or interface discovery.
pub const EX_UNAVAILABLE: i32 = 69;
