//! Error types for media embeds and uploads.

use std::sync::Arc;

use miette::Diagnostic;
use smol_str::SmolStr;

/// Main error type for weaver-media operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum MediaError {
    /// The file's MIME type matches no leaf of the taxonomy.
    #[error("file type {mime:?} of {name:?} is not supported")]
    #[diagnostic(
        code(weaver_media::unsupported_type),
        help("add a pattern for this type to `mimetypes`, or enable `accept_any_file`")
    )]
    UnsupportedType { mime: SmolStr, name: SmolStr },

    /// The file name carries an extension from `blocked_extensions`.
    #[error("file {name:?} has blocked extension {extension:?}")]
    #[diagnostic(code(weaver_media::blocked_extension))]
    BlockedExtension { name: SmolStr, extension: SmolStr },

    /// No format is registered under the requested blot tag.
    #[error("no media format registered as {0:?}")]
    #[diagnostic(code(weaver_media::format_not_registered))]
    FormatNotRegistered(SmolStr),

    /// Reading the picked file's content failed.
    #[error("failed to read {name:?}: {reason}")]
    #[diagnostic(code(weaver_media::read))]
    Read { name: SmolStr, reason: String },

    /// The uploader was already disposed.
    #[error("media uploader has been disposed")]
    #[diagnostic(code(weaver_media::disposed))]
    Disposed,

    /// Invalid configuration.
    #[error("invalid media configuration: {0}")]
    #[diagnostic(code(weaver_media::config))]
    Config(String),

    /// JSON (de)serialization error.
    #[error(transparent)]
    #[diagnostic(code(weaver_media::json))]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error(transparent)]
    #[diagnostic(code(weaver_media::toml))]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error(transparent)]
    #[diagnostic(code(weaver_media::io))]
    Io(#[from] std::io::Error),
}

/// Error reported by an upload transport.
///
/// Cloneable so the same failure can be handed to the `upload_error`
/// callback and kept in the session outcome.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct UploadError {
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl UploadError {
    /// Create an upload error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an upload error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(err.to_string(), err)
    }
}
