//! Media embeds: the typed element record, the format contract and the
//! live node instances held by a document.
//!
//! A format (`IconFormat`, `ImageFormat`) knows how to turn a
//! [`MediaDescriptor`] into a [`MediaElement`] and back. A [`MediaNode`] is
//! one embed living in a document: it owns its element and, while an upload
//! is pending, the handle to that upload's session.

pub mod icon;
pub mod image;

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use crate::error::MediaError;
use crate::sanitize::sanitize_link;
use crate::session::{self, CancelReason, PendingUpload, SessionState};
use crate::types::{MediaData, MediaValue, Thumbnail};

pub use icon::IconFormat;
pub use image::ImageFormat;

/// Blot tag of the generic file embed.
pub const ICON_BLOT: &str = "mediaicon";
/// Blot tag of the inline image embed.
pub const IMAGE_BLOT: &str = "mediaimage";

/// Visual state of an embed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Placeholder waiting on its upload.
    Uploading,
    /// Upload failed, was cancelled, or there was never anything to upload.
    Error,
    /// Holds a finalized value.
    #[default]
    Ready,
}

/// Where an embed's link points.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkTarget {
    #[default]
    None,
    /// Sanitized, directly usable reference.
    Href(String),
    /// Opaque structured value, stored as JSON text.
    DataValue(String),
}

/// The link wrapping an embed's body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLink {
    /// Display name of the media.
    pub title: SmolStr,
    pub target: LinkTarget,
    /// Clicks on an active link are forwarded to the click handler.
    pub active: bool,
}

/// Format-specific content of an embed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementBody {
    Icon {
        icon_class: String,
        caption: SmolStr,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
        alt: SmolStr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<Thumbnail>,
    },
}

/// Structural representation of an embed.
///
/// Everything `extract` needs is held in named fields, so a format can
/// recover the descriptor without walking any markup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaElement {
    pub blot: SmolStr,
    #[serde(rename = "type")]
    pub media_type: SmolStr,
    pub status: NodeStatus,
    pub link: MediaLink,
    pub body: ElementBody,
}

impl MediaElement {
    /// Value stored on the link, if any.
    ///
    /// A malformed opaque value reads as absent.
    pub fn value(&self) -> Option<MediaValue> {
        match &self.link.target {
            LinkTarget::None => None,
            LinkTarget::Href(href) => Some(MediaValue::Link(href.clone())),
            LinkTarget::DataValue(json) => serde_json::from_str(json).ok().map(MediaValue::Data),
        }
    }

    /// Store a settled upload result and activate the link.
    ///
    /// A null result counts as no value and leaves the embed in error.
    pub fn set_value(&mut self, value: &MediaValue) {
        if value.is_null() {
            self.link.target = LinkTarget::None;
            self.link.active = false;
            self.status = NodeStatus::Error;
            return;
        }
        self.link.target = link_target(value);
        self.link.active = true;
        self.status = NodeStatus::Ready;
    }
}

fn link_target(value: &MediaValue) -> LinkTarget {
    match value {
        MediaValue::Link(link) => LinkTarget::Href(sanitize_link(link)),
        MediaValue::Data(data) => LinkTarget::DataValue(data.to_string()),
    }
}

/// Everything a node is constructed from.
///
/// `upload` is only set for a freshly picked file. Nodes rebuilt from
/// history or a snapshot never carry one.
pub struct MediaDescriptor {
    pub data: MediaData,
    pub upload: Option<PendingUpload>,
}

impl MediaDescriptor {
    /// A descriptor with nothing left to upload.
    pub fn settled(data: MediaData) -> Self {
        Self { data, upload: None }
    }

    /// True when this descriptor starts an upload on construction.
    pub fn is_pending(&self) -> bool {
        self.data.value.as_ref().is_none_or(MediaValue::is_null) && self.upload.is_some()
    }
}

impl fmt::Debug for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDescriptor")
            .field("data", &self.data)
            .field("pending", &self.upload.is_some())
            .finish()
    }
}

impl From<MediaData> for MediaDescriptor {
    fn from(data: MediaData) -> Self {
        Self::settled(data)
    }
}

/// Capability contract shared by every embed format.
pub trait MediaFormat {
    /// Tag the format is registered under.
    fn blot_name(&self) -> &'static str;

    /// Build the element for a descriptor.
    fn build(&self, descriptor: &MediaDescriptor) -> MediaElement;

    /// Recover the descriptor data from an element. Inverse of `build`.
    fn extract(&self, element: &MediaElement) -> MediaData;
}

/// Link and status every format starts from.
pub(crate) fn base_element(blot: &str, descriptor: &MediaDescriptor, body: ElementBody) -> MediaElement {
    let data = &descriptor.data;
    let (target, active, status) = match data.value.as_ref().filter(|value| !value.is_null()) {
        Some(value @ MediaValue::Link(_)) => (link_target(value), true, NodeStatus::Ready),
        Some(value @ MediaValue::Data(_)) => (link_target(value), false, NodeStatus::Ready),
        None if descriptor.upload.is_some() => (LinkTarget::None, false, NodeStatus::Uploading),
        None => (LinkTarget::None, false, NodeStatus::Error),
    };
    MediaElement {
        blot: blot.into(),
        media_type: data.media_type.clone(),
        status,
        link: MediaLink {
            title: data.name.clone(),
            target,
            active,
        },
        body,
    }
}

/// Name, type and value shared by every format's `extract`.
pub(crate) fn base_data(element: &MediaElement) -> MediaData {
    MediaData {
        name: element.link.title.clone(),
        media_type: element.media_type.clone(),
        value: element.value(),
        src: None,
        thumbnail: None,
    }
}

/// Formats known to one editor instance, keyed by blot tag.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<Rc<dyn MediaFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the icon and image formats.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Rc::new(IconFormat));
        registry.register(Rc::new(ImageFormat));
        registry
    }

    /// Register a format, replacing any format with the same tag.
    pub fn register(&mut self, format: Rc<dyn MediaFormat>) {
        match self
            .formats
            .iter_mut()
            .find(|existing| existing.blot_name() == format.blot_name())
        {
            Some(slot) => *slot = format,
            None => self.formats.push(format),
        }
    }

    pub fn get(&self, blot: &str) -> Option<Rc<dyn MediaFormat>> {
        self.formats
            .iter()
            .find(|format| format.blot_name() == blot)
            .cloned()
    }

    pub fn contains(&self, blot: &str) -> bool {
        self.get(blot).is_some()
    }

    pub fn blot_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formats.iter().map(|format| format.blot_name())
    }

    /// Construct a live node through the format registered as `blot`.
    pub fn create(&self, blot: &str, descriptor: MediaDescriptor) -> Result<Rc<MediaNode>, MediaError> {
        let format = self
            .get(blot)
            .ok_or_else(|| MediaError::FormatNotRegistered(blot.into()))?;
        Ok(MediaNode::create(format, descriptor))
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.blot_names()).finish()
    }
}

/// Handle a node keeps on its live upload session.
pub(crate) struct SessionHandle {
    pub(crate) stop: CancellationToken,
    pub(crate) reason: Rc<Cell<Option<CancelReason>>>,
}

impl SessionHandle {
    fn cancel(&self, reason: CancelReason) {
        if self.reason.get().is_none() {
            self.reason.set(Some(reason));
        }
        self.stop.cancel();
    }
}

/// What a click on an active embed reports.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaClick {
    pub media_type: SmolStr,
    pub name: SmolStr,
    pub value: Option<MediaValue>,
}

/// One embed instance living in a document.
pub struct MediaNode {
    format: Rc<dyn MediaFormat>,
    element: RefCell<MediaElement>,
    session: RefCell<Option<SessionHandle>>,
    outcome: RefCell<Option<SessionState>>,
}

impl MediaNode {
    /// Build the node and, for a pending descriptor, start its upload.
    ///
    /// This is the only place an upload is ever started.
    pub fn create(format: Rc<dyn MediaFormat>, descriptor: MediaDescriptor) -> Rc<Self> {
        let element = format.build(&descriptor);
        let pending = descriptor.is_pending();
        let MediaDescriptor { data, upload } = descriptor;
        let node = Rc::new(Self {
            format,
            element: RefCell::new(element),
            session: RefCell::new(None),
            outcome: RefCell::new(None),
        });
        if let (true, Some(upload)) = (pending, upload) {
            let handle = session::start(&node, &data, upload);
            *node.session.borrow_mut() = Some(handle);
        }
        node
    }

    pub fn blot_name(&self) -> &'static str {
        self.format.blot_name()
    }

    pub fn format(&self) -> &Rc<dyn MediaFormat> {
        &self.format
    }

    pub fn element(&self) -> Ref<'_, MediaElement> {
        self.element.borrow()
    }

    /// Current descriptor data, recovered through the node's format.
    pub fn data(&self) -> MediaData {
        self.format.extract(&self.element.borrow())
    }

    pub fn status(&self) -> NodeStatus {
        self.element.borrow().status
    }

    pub fn is_active(&self) -> bool {
        self.element.borrow().link.active
    }

    /// True while an upload session is attached to this node.
    pub fn has_live_session(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Terminal state of this node's upload, once settled.
    pub fn upload_outcome(&self) -> Option<SessionState> {
        self.outcome.borrow().clone()
    }

    /// Click payload. Only active links are clickable.
    pub fn click_value(&self) -> Option<MediaClick> {
        let element = self.element.borrow();
        if !element.link.active {
            return None;
        }
        let data = self.format.extract(&element);
        Some(MediaClick {
            media_type: data.media_type,
            name: data.name,
            value: data.value,
        })
    }

    /// The node was removed from its document.
    ///
    /// A still-pending upload is torn down without firing `upload_cancelled`.
    pub fn on_removed_from_document(&self) {
        if let Some(handle) = self.session.borrow_mut().take() {
            tracing::debug!(name = %self.element.borrow().link.title, "media node detached mid-upload");
            handle.cancel(CancelReason::Detached);
        }
    }

    /// Forced teardown from outside the document, e.g. editor disposal.
    pub fn on_dispose_signal(&self) {
        if let Some(handle) = self.session.borrow_mut().take() {
            handle.cancel(CancelReason::Disposed);
        }
    }

    pub(crate) fn finish(&self, state: &SessionState) {
        {
            let mut element = self.element.borrow_mut();
            match state {
                SessionState::Succeeded(value) => element.set_value(value),
                SessionState::Failed(_) | SessionState::Cancelled(_) => {
                    element.status = NodeStatus::Error;
                }
                SessionState::Pending => {}
            }
        }
        self.session.borrow_mut().take();
        *self.outcome.borrow_mut() = Some(state.clone());
    }
}

impl fmt::Debug for MediaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaNode")
            .field("element", &*self.element.borrow())
            .field("live_session", &self.has_live_session())
            .finish()
    }
}
