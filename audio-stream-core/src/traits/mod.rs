pub mod native_engine;
pub mod stream_callback;
