// Kagami image proxy library

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod image_transform;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod proxy;
pub mod request;
pub mod s3;
pub mod transport;
