//! Persisted document layout and snapshot sanitizing.
//!
//! A snapshot is a flat list of text runs and embeds. Embeds are stored as
//! the data their format extracts plus the visual status at capture time,
//! and are rebuilt through the format on load. Rebuilding never restarts an
//! upload.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::MediaError;
use crate::node::{MediaNode, NodeStatus};
use crate::types::MediaData;

/// One embed in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbedRecord {
    pub blot: SmolStr,
    pub status: NodeStatus,
    pub data: MediaData,
}

impl EmbedRecord {
    pub fn from_node(node: &MediaNode) -> Self {
        Self {
            blot: node.blot_name().into(),
            status: node.status(),
            data: node.data(),
        }
    }
}

/// A run of document content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Text { text: String },
    Embed(EmbedRecord),
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Length in chars. An embed counts as one.
    pub fn len(&self) -> usize {
        match self {
            Self::Text { text } => text.chars().count(),
            Self::Embed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_embed(&self) -> Option<&EmbedRecord> {
        match self {
            Self::Embed(record) => Some(record),
            Self::Text { .. } => None,
        }
    }
}

/// Total length in chars of a segment list.
pub fn segments_len(segments: &[Segment]) -> usize {
    segments.iter().map(Segment::len).sum()
}

/// Serializable document content.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub segments: Vec<Segment>,
}

impl DocumentSnapshot {
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut snapshot = Self::default();
        for segment in segments {
            snapshot.push(segment);
        }
        snapshot
    }

    /// Append a segment, merging adjacent text runs and dropping empty ones.
    pub fn push(&mut self, segment: Segment) {
        match segment {
            Segment::Text { text } if text.is_empty() => {}
            Segment::Text { text } => match self.segments.last_mut() {
                Some(Segment::Text { text: last }) => last.push_str(&text),
                _ => self.segments.push(Segment::Text { text }),
            },
            embed => self.segments.push(embed),
        }
    }

    pub fn embeds(&self) -> impl Iterator<Item = &EmbedRecord> {
        self.segments.iter().filter_map(Segment::as_embed)
    }

    pub fn len_chars(&self) -> usize {
        segments_len(&self.segments)
    }

    pub fn to_json(&self) -> Result<String, MediaError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What `sanitize_snapshot` removes besides pending uploads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Drop embeds in error state entirely.
    pub strip_failed: bool,
    /// Clear inlined `data:` image sources.
    pub strip_previews: bool,
}

/// Prepare a snapshot taken mid-upload for persisting.
///
/// Embeds still marked uploading can never finish once reloaded, so they
/// are downgraded to error first.
pub fn sanitize_snapshot(snapshot: &DocumentSnapshot, options: SanitizeOptions) -> DocumentSnapshot {
    let mut sanitized = DocumentSnapshot::default();
    for segment in &snapshot.segments {
        let Segment::Embed(record) = segment else {
            sanitized.push(segment.clone());
            continue;
        };
        let mut record = record.clone();
        if record.status == NodeStatus::Uploading {
            record.status = NodeStatus::Error;
        }
        if options.strip_failed && record.status == NodeStatus::Error {
            continue;
        }
        if options.strip_previews && record.data.src.as_deref().is_some_and(is_inline_preview) {
            record.data.src = None;
        }
        sanitized.push(Segment::Embed(record));
    }
    sanitized
}

fn is_inline_preview(src: &str) -> bool {
    src.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}
