//! Central error types for the compositor.
//!
//! Only initialization failures surface as errors. Draw-time problems are
//! reported through [`crate::compositor::DrawStatus`] instead.
//! All errors implement `Serialize` so they can cross the webview IPC boundary.

use serde::Serialize;
use thiserror::Error;

/// Main error type for compositor operations.
#[derive(Error, Debug)]
pub enum CompositorError {
    /// No usable GPU API (no backend compiled in, or acceleration disabled)
    #[error("GPU rendering is not supported: {0}")]
    GpuUnavailable(String),

    /// Adapter request returned nothing
    #[error("No GPU adapter found: {0}")]
    NoAdapter(String),

    /// Adapter refused to create a logical device
    #[error("Failed to create GPU device: {0}")]
    DeviceRequest(String),

    /// Surface creation or configuration failed
    #[error("Surface error: {0}")]
    Surface(String),

    /// Invalid compositor configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Reading a config file or writing an output image failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding/encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl CompositorError {
    /// Whether the error means the GPU path can never work on this host,
    /// as opposed to a failure that a later retry might get past.
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            CompositorError::GpuUnavailable(_) | CompositorError::NoAdapter(_)
        )
    }
}

/// Errors are sent to the frontend as their message string.
impl Serialize for CompositorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for CompositorError {
    fn from(err: image::ImageError) -> Self {
        CompositorError::Image(err.to_string())
    }
}

impl From<wgpu::RequestAdapterError> for CompositorError {
    fn from(err: wgpu::RequestAdapterError) -> Self {
        CompositorError::NoAdapter(err.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for CompositorError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        CompositorError::DeviceRequest(err.to_string())
    }
}

impl From<wgpu::CreateSurfaceError> for CompositorError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        CompositorError::Surface(err.to_string())
    }
}

impl From<String> for CompositorError {
    fn from(msg: String) -> Self {
        CompositorError::Other(msg)
    }
}

impl From<&str> for CompositorError {
    fn from(msg: &str) -> Self {
        CompositorError::Other(msg.to_string())
    }
}

/// Extension trait for adding context to Results.
///
/// # Example
/// ```ignore
/// use crate::error::{CompositorResult, ResultExt};
///
/// fn load() -> CompositorResult<String> {
///     std::fs::read_to_string("compositor.json").context("failed to read config file")
/// }
/// ```
pub trait ResultExt<T> {
    /// Add context to an error, converting it to CompositorError::Other.
    fn context(self, msg: &str) -> CompositorResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> CompositorResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> CompositorResult<T> {
        self.map_err(|e| CompositorError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> CompositorResult<T> {
        self.map_err(|e| CompositorError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    /// Convert None to CompositorError::Other with the given message.
    fn context(self, msg: &str) -> CompositorResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> CompositorResult<T> {
        self.ok_or_else(|| CompositorError::Other(msg.to_string()))
    }
}

/// Type alias for Results using CompositorError.
pub type CompositorResult<T> = Result<T, CompositorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompositorError::NoAdapter("none matched".to_string());
        assert_eq!(err.to_string(), "No GPU adapter found: none matched");
    }

    #[test]
    fn test_error_serialization() {
        let err = CompositorError::GpuUnavailable("disabled".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"GPU rendering is not supported: disabled\"");
    }

    #[test]
    fn test_capability_errors_are_distinguishable() {
        assert!(CompositorError::GpuUnavailable(String::new()).is_capability_error());
        assert!(CompositorError::NoAdapter(String::new()).is_capability_error());
        assert!(!CompositorError::DeviceRequest(String::new()).is_capability_error());
        assert!(!CompositorError::Surface(String::new()).is_capability_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CompositorError = io_err.into();
        assert!(matches!(err, CompositorError::Storage(_)));
    }

    #[test]
    fn test_from_string() {
        let err: CompositorError = "test error".into();
        assert!(matches!(err, CompositorError::Other(_)));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), &str> = Err("disk full");
        let msg = result.context("operation failed").unwrap_err().to_string();
        assert!(msg.contains("operation failed"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<(), &str> = Err("inner");
        let msg = result
            .with_context(|| format!("ctx-{}", 42))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("ctx-42"));
        assert!(msg.contains("inner"));
    }

    #[test]
    fn test_option_ext_context() {
        let opt: Option<i32> = None;
        let result = opt.context("value was missing");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("value was missing"));

        assert_eq!(Some(7).context("unused").unwrap(), 7);
    }
}
