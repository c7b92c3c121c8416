pub mod constants;
pub mod error;
pub mod platform;
pub mod recorder;
pub mod target_process;
pub mod types;
