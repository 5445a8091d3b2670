pub mod bridge;
pub mod host;
#[cfg(test)]
pub(crate) mod mock_engine;
pub mod registry;
pub mod stream;
