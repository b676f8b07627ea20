//! Image transform error types

use std::fmt;

/// Errors that can occur while transforming an image
///
/// None of these reach the client: the transform layer logs them and serves
/// the original bytes instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Payload is not a GIF, JPEG or PNG
    UnsupportedFormat { format: String },
    /// Failed to decode image data
    DecodeFailed { message: String },
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding back to the source format failed
    EncodeFailed { format: String, message: String },
    /// The blocking worker panicked or was cancelled
    TaskFailed { message: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::TaskFailed { message } => {
                write!(f, "Transform task failed: {}", message)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn task_failed(message: impl Into<String>) -> Self {
        ImageError::TaskFailed {
            message: message.into(),
        }
    }

    /// Short label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::UnsupportedFormat { .. } => "unsupported_format",
            ImageError::DecodeFailed { .. } => "decode_failed",
            ImageError::ResizeFailed { .. } => "resize_failed",
            ImageError::EncodeFailed { .. } => "encode_failed",
            ImageError::TaskFailed { .. } => "task_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ImageError::unsupported_format("webp").to_string(),
            "Unsupported image format: webp"
        );
        assert_eq!(
            ImageError::encode_failed("png", "disk full").to_string(),
            "Failed to encode to png: disk full"
        );
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ImageError::decode_failed("x").kind(), "decode_failed");
        assert_eq!(ImageError::task_failed("x").kind(), "task_failed");
    }
}
