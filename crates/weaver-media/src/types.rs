//! Core media types: selection ranges, media values, descriptors and files.
//!
//! These types are host-agnostic and shared by every media format.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use futures_util::future::LocalBoxFuture;
use mime_sniffer::MimeTypeSniffer;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::MediaError;

/// Object replacement character standing in for an embed in the text stream.
pub const EMBED_CHAR: char = '\u{FFFC}';

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where cursor is now
    pub head: usize,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Get the selection length.
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Convert to a Range<usize> (ordered).
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }
}

/// A finalized media value: a usable reference or an opaque structured result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaValue {
    /// Directly usable reference, normally a URL.
    Link(String),
    /// Arbitrary JSON result returned by the upload transport.
    Data(serde_json::Value),
}

impl MediaValue {
    /// Build a value from JSON, treating a bare string as a link.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Link(s),
            other => Self::Data(other),
        }
    }

    /// A JSON `null` result, which counts as no value at all.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Data(serde_json::Value::Null))
    }

    pub fn as_link(&self) -> Option<&str> {
        match self {
            Self::Link(link) => Some(link),
            Self::Data(_) => None,
        }
    }
}

impl From<&str> for MediaValue {
    fn from(link: &str) -> Self {
        Self::Link(link.to_owned())
    }
}

impl From<String> for MediaValue {
    fn from(link: String) -> Self {
        Self::Link(link)
    }
}

impl From<serde_json::Value> for MediaValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

/// Display-size constraints for image thumbnails, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
}

impl Thumbnail {
    pub fn new(max_width: u32, max_height: u32, min_width: u32, min_height: u32) -> Self {
        Self {
            max_width: Some(max_width),
            max_height: Some(max_height),
            min_width: Some(min_width),
            min_height: Some(min_height),
        }
    }

    /// True when no bound is set.
    pub fn is_empty(&self) -> bool {
        self.max_width.is_none()
            && self.max_height.is_none()
            && self.min_width.is_none()
            && self.min_height.is_none()
    }
}

/// The serializable part of a media descriptor.
///
/// `src` and `thumbnail` are only meaningful for image embeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaData {
    /// Display name, typically the original filename.
    pub name: SmolStr,
    /// Matched taxonomy leaf key (`image`, `pdf`, `word`, ...).
    #[serde(rename = "type")]
    pub media_type: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<MediaValue>,
    /// Preview source, set from the local file before the upload completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
}

impl MediaData {
    pub fn new(name: impl Into<SmolStr>, media_type: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            value: None,
            src: None,
            thumbnail: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<MediaValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_preview(mut self, src: impl Into<String>, thumbnail: Option<Thumbnail>) -> Self {
        self.src = Some(src.into());
        self.thumbnail = thumbnail;
        self
    }
}

/// A picked file, as provided by the host's file input.
pub trait FileHandle {
    /// Original file name.
    fn name(&self) -> &str;

    /// Declared MIME type. May be empty when the host couldn't determine it.
    fn mime_type(&self) -> &str;

    /// Read the whole file content.
    fn read_bytes(&self) -> LocalBoxFuture<'static, Result<Bytes, MediaError>>;
}

/// Shared handle to a picked file.
#[derive(Clone)]
pub struct MediaFile(Rc<dyn FileHandle>);

impl MediaFile {
    pub fn new(handle: impl FileHandle + 'static) -> Self {
        Self(Rc::new(handle))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn mime_type(&self) -> &str {
        self.0.mime_type()
    }

    pub async fn read_bytes(&self) -> Result<Bytes, MediaError> {
        self.0.read_bytes().await
    }

    /// Read the file into a `data:` URL for immediate preview.
    pub async fn read_data_url(&self) -> Result<String, MediaError> {
        let bytes = self.read_bytes().await?;
        let mime = match self.mime_type() {
            "" => "application/octet-stream",
            mime => mime,
        };
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
    }
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name())
            .field("mime_type", &self.mime_type())
            .finish()
    }
}

/// In-memory file, for hosts that already hold the bytes and for tests.
#[derive(Clone, Debug)]
pub struct MemoryFile {
    name: SmolStr,
    mime_type: SmolStr,
    data: Bytes,
}

impl MemoryFile {
    pub fn new(name: impl Into<SmolStr>, mime_type: impl Into<SmolStr>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Create a file whose MIME type is sniffed from its content.
    pub fn sniffed(name: impl Into<SmolStr>, data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let mime_type = data
            .sniff_mime_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn read_bytes(&self) -> LocalBoxFuture<'static, Result<Bytes, MediaError>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data) })
    }
}

/// Which categories an upload request is scoped to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadHint {
    /// Falsy toolbar value: the request is ignored.
    Disabled,
    /// Any configured category.
    Any,
    /// A single taxonomy category.
    Category(SmolStr),
}

impl UploadHint {
    /// Parse the value a toolbar picker hands to its handler.
    pub fn from_toolbar_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("false") => Self::Disabled,
            Some("true") | Some("any") => Self::Any,
            Some(category) => Self::Category(category.into()),
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Category(category) => Some(category),
            _ => None,
        }
    }
}

impl From<&str> for UploadHint {
    fn from(value: &str) -> Self {
        Self::from_toolbar_value(Some(value))
    }
}
