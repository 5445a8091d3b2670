pub(crate) mod code_registry;
pub mod config;
pub mod device;
pub mod error;
pub mod host_api;
pub mod sample_format;
pub mod state;
