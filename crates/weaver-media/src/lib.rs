//! weaver-media: media embeds and asynchronous uploads for the weaver editor.
//!
//! This crate provides:
//! - `MimeTaxonomy` - category configuration and file classification
//! - `MediaFormat` - icon and image embed formats over a typed `MediaElement`
//! - `MediaUploader` - turns picked files into placeholder embeds that
//!   finalize when the application's upload transport settles
//! - `MediaDocument` - an in-memory `EditorHost` with grouped undo history
//!
//! Everything here is single-threaded. Upload sessions run as local tasks on
//! the host's event loop (a tokio `LocalSet` natively).

pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod host;
pub mod mime;
pub mod node;
pub mod runtime;
pub mod sanitize;
pub mod session;
pub mod snapshot;
pub mod state;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod types;
pub mod uploader;

pub use config::{MediaConfig, MediaOptions, capitalize_first};
pub use document::MediaDocument;
pub use error::{MediaError, UploadError};
pub use history::{EditHistory, UndoManager};
pub use host::{EditorHost, FileInput, Toolbar};
pub use mime::{MimePattern, MimeTaxonomy, classify};
pub use node::{
    FormatRegistry, ICON_BLOT, IMAGE_BLOT, IconFormat, ImageFormat, LinkTarget, MediaClick,
    MediaDescriptor, MediaElement, MediaFormat, MediaNode, NodeStatus,
};
pub use sanitize::{sanitize_link, sanitize_src};
pub use session::{CancelReason, SessionState, UploadCallbacks, UploadTransport};
pub use smol_str::SmolStr;
pub use snapshot::{DocumentSnapshot, SanitizeOptions, Segment, sanitize_snapshot};
pub use state::UploadingState;
pub use types::{
    EMBED_CHAR, FileHandle, MediaData, MediaFile, MediaValue, MemoryFile, Selection, Thumbnail,
    UploadHint,
};
pub use uploader::{ClickEvent, MediaUploader};
