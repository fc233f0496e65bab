pub mod config;
pub mod cors;
pub mod error;
pub mod multipart;
pub mod relay;
pub mod staging;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, OversizePolicy, RelayConfig, SecondarySink, Staging};
pub use error::RelayError;
pub use relay::UploadRelay;
pub use reqwest::Url;
