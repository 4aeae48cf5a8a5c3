//! Thin, testable wrappers around the handful of raw syscalls the executor and runtime-dir
//! manager need: the subreaper flag, terminal raw-mode/size/EOF handling, `waitpid` status
//! decoding, and directory/file creation with ownership.

pub mod fsutil;
pub mod proc;
pub mod subreaper;
pub mod tty;
