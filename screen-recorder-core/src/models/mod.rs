pub mod config;
pub mod diagnostics;
pub mod error;
pub mod manifest;
pub mod phase;
pub mod sample;
pub mod state;
