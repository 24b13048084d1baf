pub mod catalog;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use error::{PlayError, Result};
