//! What the media extension needs from the editor hosting it.

use std::ops::Range;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::error::MediaError;
use crate::node::{MediaDescriptor, MediaFormat, MediaNode};
use crate::types::Selection;

/// Host document/editor API.
///
/// Offsets are in chars, each embed occupying exactly one.
pub trait EditorHost {
    /// Current selection. Focuses the editor if needed.
    fn selection(&self) -> Selection;

    /// Replace `range` with a single embed built by the format registered as
    /// `blot`, as one atomic edit. Returns the inserted node.
    fn replace_with_embed(
        &mut self,
        range: Range<usize>,
        blot: &str,
        descriptor: MediaDescriptor,
    ) -> Result<Rc<MediaNode>, MediaError>;

    /// Collapse the selection to `offset` without recording history.
    fn set_caret(&mut self, offset: usize);

    /// Close the current undo group.
    fn history_cutoff(&mut self);

    /// Make a format available to `replace_with_embed`.
    fn register_format(&mut self, format: Rc<dyn MediaFormat>);

    /// The embed at `offset`, if there is one.
    fn media_at(&self, offset: usize) -> Option<Rc<MediaNode>>;
}

/// The editor toolbar's upload picker.
pub trait Toolbar {
    /// Values of the upload picker's entries, in display order.
    fn upload_picker_values(&self) -> Vec<SmolStr>;

    /// Tooltip of the upload picker itself.
    fn set_picker_title(&mut self, title: &str);

    /// Visible label of one picker entry.
    fn set_item_label(&mut self, value: &str, label: &str);

    /// Show the file dialog for `input`. The selected file is reported back
    /// through `MediaUploader::on_file_selected`.
    fn open_file_picker(&mut self, input: &FileInput);
}

/// The toolbar's hidden file input. Created once per uploader and reused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInput {
    accept: Vec<SmolStr>,
}

impl FileInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// MIME patterns the picker is restricted to. Empty means anything.
    pub fn accept(&self) -> &[SmolStr] {
        &self.accept
    }

    pub fn set_accept(&mut self, accept: Vec<SmolStr>) {
        self.accept = accept;
    }

    /// The `accept` attribute value.
    pub fn accept_attribute(&self) -> String {
        self.accept.join(", ")
    }
}
