pub mod config;
pub mod crypto;
pub mod dirs;
pub mod harness;
pub mod session;
pub mod storage;
