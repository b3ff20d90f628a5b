//! The media upload orchestrator.
//!
//! One `MediaUploader` is attached to one editor instance. It registers the
//! media formats with the host, labels the toolbar's upload picker, turns
//! picked files into placeholder embeds and owns the signals every upload
//! session listens to.
//!
//! Host events (`on_file_selected`, `handle_click`) never return errors.
//! Anything that goes wrong on the upload path ends up as a node state, a
//! callback or a log line.

use std::cell::{Cell, RefCell};
use std::ops::Range;
use std::rc::Rc;

use smol_str::SmolStr;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::MediaOptions;
use crate::error::MediaError;
use crate::host::{EditorHost, FileInput, Toolbar};
use crate::node::{ICON_BLOT, IMAGE_BLOT, IconFormat, ImageFormat, MediaDescriptor};
use crate::runtime;
use crate::session::{PendingUpload, SessionSignals};
use crate::snapshot::{DocumentSnapshot, SanitizeOptions, sanitize_snapshot};
use crate::state::UploadingState;
use crate::types::{MediaData, MediaFile, UploadHint};

/// Category whose files get an inline image embed.
pub const IMAGE_CATEGORY: &str = "image";

/// Category assigned to unclassified files when `accept_any_file` is set.
pub const FILE_CATEGORY: &str = "file";

/// A click inside the editor, as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickEvent {
    /// Char offset of the clicked content.
    pub offset: usize,
    default_prevented: bool,
}

impl ClickEvent {
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            default_prevented: false,
        }
    }

    /// Suppress the host's default navigation.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

struct Inner {
    host: Rc<RefCell<dyn EditorHost>>,
    toolbar: Rc<RefCell<dyn Toolbar>>,
    options: MediaOptions,
    state: Rc<UploadingState>,
    /// Replaced after every broadcast so later sessions start uncancelled.
    cancel_all: RefCell<CancellationToken>,
    dispose: CancellationToken,
    file_input: RefCell<Option<FileInput>>,
    click_delegation: Cell<bool>,
}

/// Per-editor media upload orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct MediaUploader {
    inner: Rc<Inner>,
}

impl MediaUploader {
    /// Attach to an editor: register the media formats, label the upload
    /// picker and install click delegation when a click handler is set.
    pub fn new(
        host: Rc<RefCell<dyn EditorHost>>,
        toolbar: Rc<RefCell<dyn Toolbar>>,
        options: MediaOptions,
    ) -> Self {
        {
            let mut host = host.borrow_mut();
            host.register_format(Rc::new(IconFormat));
            host.register_format(Rc::new(ImageFormat));
        }
        let click_delegation = options.click_handler.is_some();
        let uploader = Self {
            inner: Rc::new(Inner {
                host,
                toolbar,
                options,
                state: UploadingState::new(),
                cancel_all: RefCell::new(CancellationToken::new()),
                dispose: CancellationToken::new(),
                file_input: RefCell::new(None),
                click_delegation: Cell::new(click_delegation),
            }),
        };
        uploader.layout();
        uploader
    }

    pub fn options(&self) -> &MediaOptions {
        &self.inner.options
    }

    /// Label the toolbar's upload picker and its entries.
    fn layout(&self) {
        let translate = &self.inner.options.translate;
        let mut toolbar = self.inner.toolbar.borrow_mut();
        toolbar.set_picker_title(&translate("media"));
        for value in toolbar.upload_picker_values() {
            toolbar.set_item_label(&value, &translate(&value));
        }
    }

    /// Toolbar entry point: open the file picker scoped to `hint`.
    pub fn upload_media(&self, hint: impl Into<UploadHint>) {
        let hint = hint.into();
        if hint == UploadHint::Disabled {
            return;
        }
        if self.is_disposed() {
            tracing::debug!("{}", MediaError::Disposed);
            return;
        }

        let config = &self.inner.options.config;
        let accept = match &hint {
            UploadHint::Category(category) => config.mimetypes.accept_list(Some(category.as_str())),
            UploadHint::Any if config.accept_any_file => Vec::new(),
            _ => config.mimetypes.accept_list(None),
        };
        if let UploadHint::Category(category) = &hint {
            if accept.is_empty() {
                tracing::warn!(%category, "no mimetypes configured for media category {category}");
                return;
            }
        }

        let input = {
            let mut slot = self.inner.file_input.borrow_mut();
            let input = slot.get_or_insert_with(|| {
                tracing::debug!("creating media file input");
                FileInput::new()
            });
            input.set_accept(accept);
            input.clone()
        };
        self.inner.toolbar.borrow_mut().open_file_picker(&input);
    }

    /// The file picker reported a selection.
    ///
    /// The insertion point is the selection at this moment, regardless of
    /// how long reading or uploading takes afterwards.
    pub fn on_file_selected(&self, file: Option<MediaFile>) {
        if self.inner.file_input.borrow().is_none() || self.is_disposed() {
            return;
        }
        let Some(file) = file else {
            return;
        };
        let range = self.inner.host.borrow().selection().to_range();

        let media_type = match self.inner.classify(&file) {
            Ok(media_type) => media_type,
            Err(err) => {
                tracing::warn!(name = file.name(), mime = file.mime_type(), "{err}");
                return;
            }
        };
        tracing::debug!(%media_type, name = file.name(), ?range, "media file selected");

        let data = MediaData::new(file.name(), media_type.clone());
        let upload = self.inner.options.transport.as_ref().map(|transport| PendingUpload {
            file: file.clone(),
            transport: Rc::clone(transport),
            callbacks: self.inner.options.callbacks.clone(),
            signals: SessionSignals {
                cancel_all: self.inner.cancel_all.borrow().clone(),
                dispose: self.inner.dispose.clone(),
                tracker: self.inner.state.register(),
            },
        });

        if media_type != IMAGE_CATEGORY {
            self.inner.insert(range, ICON_BLOT, MediaDescriptor { data, upload });
            return;
        }

        let inner = Rc::clone(&self.inner);
        let thumbnail = Some(self.inner.options.config.thumbnail);
        runtime::spawn_local(async move {
            let read = tokio::select! {
                biased;
                _ = inner.dispose.cancelled() => return,
                read = file.read_data_url() => read,
            };
            match read {
                Ok(src) => {
                    let data = data.with_preview(src, thumbnail);
                    inner.insert(range, IMAGE_BLOT, MediaDescriptor { data, upload });
                }
                Err(err) => {
                    tracing::warn!(name = file.name(), error = %err, "failed to read image preview");
                }
            }
        });
    }

    /// Cancel every pending upload.
    ///
    /// Sessions started afterwards are not affected.
    pub fn cancel_uploading(&self) {
        let token = self.inner.cancel_all.replace(CancellationToken::new());
        tracing::debug!(live = self.inner.state.live_sessions(), "cancelling pending uploads");
        token.cancel();
    }

    /// Detach from the editor and tear down every pending upload.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        tracing::debug!(live = self.inner.state.live_sessions(), "disposing media uploader");
        self.inner.click_delegation.set(false);
        self.inner.file_input.borrow_mut().take();
        self.inner.dispose.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.dispose.is_cancelled()
    }

    /// Delegated click handling for the editor root.
    ///
    /// Returns true when the click hit an active embed and was forwarded to
    /// the click handler.
    pub fn handle_click(&self, event: &mut ClickEvent) -> bool {
        if !self.inner.click_delegation.get() {
            return false;
        }
        let Some(handler) = &self.inner.options.click_handler else {
            return false;
        };
        let node = self.inner.host.borrow().media_at(event.offset);
        let Some(click) = node.and_then(|node| node.click_value()) else {
            return false;
        };
        event.prevent_default();
        handler(click.media_type.as_str(), click.name.as_str(), click.value.as_ref());
        true
    }

    /// Subscribe to the aggregate "any upload pending" flag.
    pub fn uploading_state(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    pub fn is_uploading(&self) -> bool {
        self.inner.state.is_uploading()
    }

    /// Sessions still registered, including ones whose node is being read.
    pub fn live_sessions(&self) -> usize {
        self.inner.state.live_sessions()
    }

    /// Downgrade pending embeds in a snapshot before persisting it.
    pub fn sanitize(snapshot: &DocumentSnapshot, options: SanitizeOptions) -> DocumentSnapshot {
        sanitize_snapshot(snapshot, options)
    }
}

impl Inner {
    /// Pick the category for `file`, or the reason it is rejected.
    fn classify(&self, file: &MediaFile) -> Result<SmolStr, MediaError> {
        let config = &self.options.config;
        if let Some(extension) = config.blocked_extension(file.name()) {
            return Err(MediaError::BlockedExtension {
                name: file.name().into(),
                extension: extension.into(),
            });
        }
        match config.mimetypes.classify(file.mime_type()) {
            Some(media_type) => Ok(media_type.into()),
            None if config.accept_any_file => Ok(FILE_CATEGORY.into()),
            None => Err(MediaError::UnsupportedType {
                mime: file.mime_type().into(),
                name: file.name().into(),
            }),
        }
    }

    /// Replace `range` with the embed as its own undo group, then place the
    /// caret after it.
    fn insert(&self, range: Range<usize>, blot: &str, descriptor: MediaDescriptor) {
        let mut host = self.host.borrow_mut();
        host.history_cutoff();
        match host.replace_with_embed(range.clone(), blot, descriptor) {
            Ok(_) => {
                host.history_cutoff();
                host.set_caret(range.start + 1);
            }
            Err(err) => tracing::error!(blot, error = %err, "failed to insert media embed"),
        }
    }
}

impl std::fmt::Debug for MediaUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUploader")
            .field("options", &self.inner.options)
            .field("live_sessions", &self.inner.state.live_sessions())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
