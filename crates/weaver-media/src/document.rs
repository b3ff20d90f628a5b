//! In-memory editor document with media embeds.
//!
//! `MediaDocument` is a complete [`EditorHost`]: text lives in a rope where
//! each embed is an object replacement character, and the k-th such
//! character corresponds to the k-th live node. Edits are recorded in a
//! grouped history. Undoing an embed's insertion removes the node (tearing
//! down any pending upload); redoing it rebuilds the node from the data
//! captured when it was removed.

use std::ops::Range;
use std::rc::Rc;

use ropey::Rope;

use crate::error::MediaError;
use crate::history::{Edit, EditHistory, UndoManager};
use crate::host::EditorHost;
use crate::node::{FormatRegistry, MediaDescriptor, MediaFormat, MediaNode};
use crate::snapshot::{DocumentSnapshot, EmbedRecord, Segment, segments_len};
use crate::types::{EMBED_CHAR, Selection};

/// Content to splice into the document.
enum Fragment {
    Text(String),
    Node(Rc<MediaNode>),
}

pub struct MediaDocument {
    rope: Rope,
    embeds: Vec<Rc<MediaNode>>,
    registry: FormatRegistry,
    selection: Selection,
    history: EditHistory<Segment>,
}

impl Default for MediaDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDocument {
    /// Empty document with no formats registered.
    pub fn new() -> Self {
        Self::with_registry(FormatRegistry::new())
    }

    pub fn with_registry(registry: FormatRegistry) -> Self {
        Self {
            rope: Rope::new(),
            embeds: Vec::new(),
            registry,
            selection: Selection::collapsed(0),
            history: EditHistory::default(),
        }
    }

    /// Plain-text document. Caret at the end, history empty.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::new();
        doc.rope = Rope::from_str(&strip_embed_chars(text));
        doc.selection = Selection::collapsed(doc.rope.len_chars());
        doc
    }

    /// Rebuild a document from a snapshot using `registry`'s formats.
    pub fn from_snapshot(snapshot: &DocumentSnapshot, registry: FormatRegistry) -> Result<Self, MediaError> {
        if let Some(missing) = snapshot.embeds().find(|record| !registry.contains(&record.blot)) {
            return Err(MediaError::FormatNotRegistered(missing.blot.clone()));
        }
        let mut doc = Self::with_registry(registry);
        let fragments = doc.fragments(&snapshot.segments);
        doc.splice(0..0, fragments);
        doc.selection = Selection::collapsed(doc.len_chars());
        Ok(doc)
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Content with embeds as object replacement characters.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Content with embeds left out.
    pub fn plain_text(&self) -> String {
        strip_embed_chars(&self.text())
    }

    /// Live embeds in document order.
    pub fn embeds(&self) -> &[Rc<MediaNode>] {
        &self.embeds
    }

    pub fn set_selection(&mut self, selection: Selection) {
        let len = self.len_chars();
        self.selection = Selection::new(selection.anchor.min(len), selection.head.min(len));
    }

    /// Insert user text at `pos`.
    pub fn insert_text(&mut self, pos: usize, text: &str) {
        let text = strip_embed_chars(text);
        if text.is_empty() {
            return;
        }
        let pos = pos.min(self.len_chars());
        let caret = pos + text.chars().count();
        let inserted = vec![Segment::text(text.clone())];
        let deleted = self.splice(pos..pos, vec![Fragment::Text(text)]);
        self.history.record(Edit { pos, deleted, inserted });
        self.selection = Selection::collapsed(caret);
    }

    /// Delete a range of user content, embeds included.
    pub fn delete(&mut self, range: Range<usize>) {
        let range = self.clamp(range);
        if range.is_empty() {
            return;
        }
        let deleted = self.splice(range.clone(), Vec::new());
        self.history.record(Edit {
            pos: range.start,
            deleted,
            inserted: Vec::new(),
        });
        self.selection = Selection::collapsed(range.start);
    }

    /// Capture the document content.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::new(self.capture(0..self.len_chars()))
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let len = self.len_chars();
        let start = range.start.min(len);
        start..range.end.clamp(start, len)
    }

    /// Index into `embeds` of the first embed at or after `pos`.
    fn embed_index(&self, pos: usize) -> usize {
        self.rope
            .slice(..pos)
            .chars()
            .filter(|c| *c == EMBED_CHAR)
            .count()
    }

    fn capture(&self, range: Range<usize>) -> Vec<Segment> {
        let mut snapshot = DocumentSnapshot::default();
        let mut embed = self.embed_index(range.start);
        let mut run = String::new();
        for c in self.rope.slice(range).chars() {
            if c != EMBED_CHAR {
                run.push(c);
                continue;
            }
            snapshot.push(Segment::text(std::mem::take(&mut run)));
            if let Some(node) = self.embeds.get(embed) {
                snapshot.push(Segment::Embed(EmbedRecord::from_node(node)));
            }
            embed += 1;
        }
        snapshot.push(Segment::text(run));
        snapshot.segments
    }

    /// Rebuild splice content from recorded segments.
    fn fragments(&self, segments: &[Segment]) -> Vec<Fragment> {
        segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text { text } => Some(Fragment::Text(text.clone())),
                Segment::Embed(record) => {
                    let descriptor = MediaDescriptor::settled(record.data.clone());
                    match self.registry.create(&record.blot, descriptor) {
                        Ok(node) => Some(Fragment::Node(node)),
                        Err(err) => {
                            tracing::error!(error = %err, "dropping embed that can't be rebuilt");
                            None
                        }
                    }
                }
            })
            .collect()
    }

    /// Replace `range` with `insert`, returning what was removed.
    ///
    /// Removed nodes are notified after they leave the document.
    fn splice(&mut self, range: Range<usize>, insert: Vec<Fragment>) -> Vec<Segment> {
        let range = self.clamp(range);
        let removed = self.capture(range.clone());

        let first = self.embed_index(range.start);
        let removed_embeds = removed.iter().filter(|s| s.as_embed().is_some()).count();
        let detached: Vec<_> = self.embeds.drain(first..first + removed_embeds).collect();
        self.rope.remove(range.clone());

        let mut pos = range.start;
        let mut index = first;
        for fragment in insert {
            match fragment {
                Fragment::Text(text) => {
                    let text = strip_embed_chars(&text);
                    self.rope.insert(pos, &text);
                    pos += text.chars().count();
                }
                Fragment::Node(node) => {
                    self.rope.insert_char(pos, EMBED_CHAR);
                    self.embeds.insert(index, node);
                    pos += 1;
                    index += 1;
                }
            }
        }

        for node in detached {
            node.on_removed_from_document();
        }
        removed
    }
}

fn strip_embed_chars(text: &str) -> String {
    text.chars().filter(|c| *c != EMBED_CHAR).collect()
}

impl EditorHost for MediaDocument {
    fn selection(&self) -> Selection {
        self.selection
    }

    fn replace_with_embed(
        &mut self,
        range: Range<usize>,
        blot: &str,
        descriptor: MediaDescriptor,
    ) -> Result<Rc<MediaNode>, MediaError> {
        let range = self.clamp(range);
        let node = self.registry.create(blot, descriptor)?;
        let inserted = vec![Segment::Embed(EmbedRecord::from_node(&node))];
        let deleted = self.splice(range.clone(), vec![Fragment::Node(Rc::clone(&node))]);
        self.history.record(Edit {
            pos: range.start,
            deleted,
            inserted,
        });
        Ok(node)
    }

    fn set_caret(&mut self, offset: usize) {
        self.selection = Selection::collapsed(offset.min(self.len_chars()));
    }

    fn history_cutoff(&mut self) {
        self.history.cutoff();
    }

    fn register_format(&mut self, format: Rc<dyn MediaFormat>) {
        self.registry.register(format);
    }

    fn media_at(&self, offset: usize) -> Option<Rc<MediaNode>> {
        if self.rope.get_char(offset)? != EMBED_CHAR {
            return None;
        }
        self.embeds.get(self.embed_index(offset)).cloned()
    }
}

impl UndoManager for MediaDocument {
    fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn undo(&mut self) -> bool {
        let Some(group) = self.history.take_undo() else {
            return false;
        };
        let mut reverted = Vec::with_capacity(group.len());
        let mut caret = self.selection.head;
        for edit in group.into_iter().rev() {
            let inserted_len = segments_len(&edit.inserted);
            let fragments = self.fragments(&edit.deleted);
            let current = self.splice(edit.pos..edit.pos + inserted_len, fragments);
            caret = edit.pos + segments_len(&edit.deleted);
            reverted.push(Edit {
                pos: edit.pos,
                deleted: edit.deleted,
                inserted: current,
            });
        }
        reverted.reverse();
        self.history.push_redo(reverted);
        self.set_caret(caret);
        true
    }

    fn redo(&mut self) -> bool {
        let Some(group) = self.history.take_redo() else {
            return false;
        };
        let mut applied = Vec::with_capacity(group.len());
        let mut caret = self.selection.head;
        for edit in group {
            let deleted_len = segments_len(&edit.deleted);
            let fragments = self.fragments(&edit.inserted);
            let current = self.splice(edit.pos..edit.pos + deleted_len, fragments);
            caret = edit.pos + segments_len(&edit.inserted);
            applied.push(Edit {
                pos: edit.pos,
                deleted: current,
                inserted: edit.inserted,
            });
        }
        self.history.push_undo(applied);
        self.set_caret(caret);
        true
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl std::fmt::Debug for MediaDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDocument")
            .field("text", &self.rope.to_string())
            .field("embeds", &self.embeds.len())
            .field("selection", &self.selection)
            .field("registry", &self.registry)
            .finish()
    }
}
