//! Image transform engine
//!
//! Applies [`TransformOptions`] to GIF, JPEG and PNG payloads. Output is always
//! re-encoded in the source format (JPEG at quality 95).
//!
//! # Example
//!
//! ```ignore
//! let options = TransformOptions::decode("100x100,fit")?;
//! let thumbnail = image_transform::transform(original, &options).await?;
//! ```

pub mod error;
pub mod processor;

pub use error::ImageError;
pub use processor::SourceFormat;

use bytes::Bytes;

use crate::options::TransformOptions;

/// Transform `data` on the blocking pool
///
/// Empty options return `data` untouched without decoding it.
pub async fn transform(data: Bytes, options: &TransformOptions) -> Result<Bytes, ImageError> {
    if options.is_empty() {
        return Ok(data);
    }

    let options = *options;
    tokio::task::spawn_blocking(move || processor::process(&data, &options))
        .await
        .map_err(|e| ImageError::task_failed(e.to_string()))?
        .map(Bytes::from)
}
