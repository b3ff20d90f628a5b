//! End-to-end upload scenarios driving `MediaUploader` against `MediaDocument`.
//!
//! Sessions are local tasks, so every test runs inside a `LocalSet`. The
//! transport hands each call a oneshot channel the test resolves by hand.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::oneshot;
use tokio::task::LocalSet;
use bytes::Bytes;
use futures_util::future::LocalBoxFuture;
use weaver_media::{
    CancelReason, ClickEvent, DocumentSnapshot, EditorHost, FileHandle, FileInput, LinkTarget,
    MediaConfig, MediaDocument, MediaError, MediaFile, MediaOptions, MediaUploader, MediaValue, MemoryFile, NodeStatus,
    SanitizeOptions, Selection, SessionState, SmolStr, Thumbnail, Toolbar, UndoManager, UploadError,
    UploadHint,
};
use weaver_media::node::ElementBody;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

/// A picked file whose content can't be read.
struct UnreadableFile;

impl FileHandle for UnreadableFile {
    fn name(&self) -> &str {
        "broken.png"
    }

    fn mime_type(&self) -> &str {
        "image/png"
    }

    fn read_bytes(&self) -> LocalBoxFuture<'static, Result<Bytes, MediaError>> {
        Box::pin(async {
            Err(MediaError::Read {
                name: "broken.png".into(),
                reason: "permission denied".into(),
            })
        })
    }
}

#[derive(Default)]
struct TestToolbar {
    values: Vec<SmolStr>,
    title: Option<String>,
    labels: Vec<(String, String)>,
    opened: Vec<FileInput>,
}

impl Toolbar for TestToolbar {
    fn upload_picker_values(&self) -> Vec<SmolStr> {
        self.values.clone()
    }

    fn set_picker_title(&mut self, title: &str) {
        self.title = Some(title.to_owned());
    }

    fn set_item_label(&mut self, value: &str, label: &str) {
        self.labels.push((value.to_owned(), label.to_owned()));
    }

    fn open_file_picker(&mut self, input: &FileInput) {
        self.opened.push(input.clone());
    }
}

struct Call {
    media_type: SmolStr,
    name: String,
    reply: Option<oneshot::Sender<Result<MediaValue, UploadError>>>,
}

type Calls = Rc<RefCell<Vec<Call>>>;
type Events = Rc<RefCell<Vec<String>>>;

fn describe(value: Option<&MediaValue>) -> String {
    match value {
        Some(MediaValue::Link(link)) => link.clone(),
        Some(MediaValue::Data(data)) => data.to_string(),
        None => "-".to_owned(),
    }
}

fn recording_options(config: MediaConfig, calls: &Calls, events: &Events) -> MediaOptions {
    let calls = Rc::clone(calls);
    let (success, error, cancelled, click) = (
        Rc::clone(events),
        Rc::clone(events),
        Rc::clone(events),
        Rc::clone(events),
    );
    MediaOptions::new(config)
        .upload_fn(move |media_type: SmolStr, file: MediaFile| {
            let (reply, rx) = oneshot::channel();
            calls.borrow_mut().push(Call {
                media_type,
                name: file.name().to_owned(),
                reply: Some(reply),
            });
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(UploadError::new("transport dropped")))
            }
        })
        .upload_success(move |t, n, v| success.borrow_mut().push(format!("success {t} {n} {}", describe(Some(v)))))
        .upload_error(move |t, n, e| error.borrow_mut().push(format!("error {t} {n} {e}")))
        .upload_cancelled(move |t, n| cancelled.borrow_mut().push(format!("cancelled {t} {n}")))
        .click_handler(move |t, n, v| click.borrow_mut().push(format!("click {t} {n} {}", describe(v))))
}

struct Harness {
    doc: Rc<RefCell<MediaDocument>>,
    toolbar: Rc<RefCell<TestToolbar>>,
    uploader: MediaUploader,
    calls: Calls,
    events: Events,
}

impl Harness {
    fn new(text: &str) -> Self {
        Self::with_config(text, MediaConfig::default())
    }

    fn with_config(text: &str, config: MediaConfig) -> Self {
        let calls = Calls::default();
        let events = Events::default();
        let options = recording_options(config, &calls, &events);
        Self::with_options(text, options, calls, events)
    }

    fn with_options(text: &str, options: MediaOptions, calls: Calls, events: Events) -> Self {
        let doc = Rc::new(RefCell::new(MediaDocument::from_text(text)));
        let toolbar = Rc::new(RefCell::new(TestToolbar {
            values: vec!["image".into(), "file".into()],
            ..Default::default()
        }));
        let uploader = MediaUploader::new(doc.clone(), toolbar.clone(), options);
        Self {
            doc,
            toolbar,
            uploader,
            calls,
            events,
        }
    }

    fn select(&self, selection: Selection) {
        self.doc.borrow_mut().set_selection(selection);
    }

    /// Open the picker and report `name` as the picked file.
    fn pick(&self, hint: &str, name: &str, mime: &str, data: &'static [u8]) {
        self.uploader.upload_media(hint);
        self.uploader
            .on_file_selected(Some(MediaFile::new(MemoryFile::new(name, mime, data))));
    }

    fn resolve(&self, call: usize, result: Result<MediaValue, UploadError>) {
        let reply = self.calls.borrow_mut()[call].reply.take();
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_insert_image() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("hello world");
            h.select(Selection::collapsed(5));
            h.pick("image", "photo.png", "image/png", PNG);
            assert_eq!(h.toolbar.borrow().opened[0].accept_attribute(), "image/*");

            // the preview is read before anything is inserted
            assert!(h.doc.borrow().embeds().is_empty());
            // moving the cursor meanwhile must not move the insertion point
            h.select(Selection::collapsed(0));
            settle().await;

            let node = h.doc.borrow().media_at(5).unwrap();
            assert_eq!(h.doc.borrow().plain_text(), "hello world");
            assert_eq!(h.doc.borrow().selection(), Selection::collapsed(6));
            assert_eq!(node.blot_name(), "mediaimage");
            assert_eq!(node.status(), NodeStatus::Uploading);
            assert!(node.has_live_session());
            let data = node.data();
            assert_eq!(data.media_type, "image");
            assert_eq!(data.name, "photo.png");
            assert_eq!(data.src.as_deref(), Some("data:image/png;base64,iVBORw0KGgo="));
            assert_eq!(data.thumbnail, Some(Thumbnail::new(180, 60, 10, 10)));
            assert!(h.uploader.is_uploading());

            {
                let calls = h.calls.borrow();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].media_type, "image");
                assert_eq!(calls[0].name, "photo.png");
            }

            h.resolve(0, Ok("https://cdn/x.png".into()));
            settle().await;

            assert_eq!(node.status(), NodeStatus::Ready);
            assert!(node.is_active());
            assert!(!node.has_live_session());
            assert_eq!(node.data().value, Some(MediaValue::Link("https://cdn/x.png".into())));
            assert_eq!(h.events(), ["success image photo.png https://cdn/x.png"]);
            assert!(!h.uploader.is_uploading());
            assert_eq!(h.uploader.live_sessions(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_unsupported_file_is_ignored() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("hello world");
            h.select(Selection::new(2, 7));
            h.pick("any", "setup.exe", "application/x-msdownload", b"MZ");
            settle().await;

            let doc = h.doc.borrow();
            assert_eq!(doc.text(), "hello world");
            assert_eq!(doc.selection(), Selection::new(2, 7));
            assert!(!doc.can_undo());
            assert!(h.calls.borrow().is_empty());
            assert_eq!(h.uploader.live_sessions(), 0);
            assert!(h.events().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_icon_replaces_selection() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("see this file");
            h.select(Selection::new(8, 4));
            h.pick("pdf", "report.pdf", "application/pdf", b"%PDF");
            assert_eq!(h.toolbar.borrow().opened[0].accept_attribute(), "application/pdf");

            // non-image files are inserted synchronously
            let node = h.doc.borrow().media_at(4).unwrap();
            assert_eq!(h.doc.borrow().plain_text(), "see  file");
            assert_eq!(h.doc.borrow().selection(), Selection::collapsed(5));
            assert_eq!(node.blot_name(), "mediaicon");
            assert_eq!(node.status(), NodeStatus::Uploading);

            h.resolve(0, Ok(MediaValue::Data(serde_json::json!({"id": 42}))));
            settle().await;
            assert_eq!(node.status(), NodeStatus::Ready);
            assert_eq!(node.element().link.target, LinkTarget::DataValue(r#"{"id":42}"#.into()));
            assert_eq!(h.events(), [r#"success pdf report.pdf {"id":42}"#]);
        })
        .await;
}

#[tokio::test]
async fn test_cancel_all() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.pick("any", "done.pdf", "application/pdf", b"%PDF");
            h.resolve(0, Ok("https://cdn/done.pdf".into()));
            settle().await;

            h.pick("any", "slow.docx", "application/msword", b"doc");
            settle().await;
            let done = h.doc.borrow().embeds()[0].clone();
            let slow = h.doc.borrow().embeds()[1].clone();
            assert_eq!(slow.status(), NodeStatus::Uploading);

            h.uploader.cancel_uploading();
            settle().await;

            assert_eq!(slow.status(), NodeStatus::Error);
            assert!(matches!(
                slow.upload_outcome(),
                Some(SessionState::Cancelled(CancelReason::Broadcast))
            ));
            assert_eq!(done.status(), NodeStatus::Ready);
            assert_eq!(
                h.events(),
                ["success pdf done.pdf https://cdn/done.pdf", "cancelled word slow.docx"]
            );
            assert!(!h.uploader.is_uploading());

            // a late transport result and a second broadcast change nothing
            h.resolve(1, Ok("https://cdn/slow.docx".into()));
            h.uploader.cancel_uploading();
            settle().await;
            assert_eq!(slow.status(), NodeStatus::Error);
            assert_eq!(h.events().len(), 2);

            // uploads started after the broadcast are unaffected by it
            h.pick("any", "next.pdf", "application/pdf", b"%PDF");
            settle().await;
            let next = h.doc.borrow().embeds()[2].clone();
            assert_eq!(next.status(), NodeStatus::Uploading);
            h.resolve(2, Ok("https://cdn/next.pdf".into()));
            settle().await;
            assert_eq!(next.status(), NodeStatus::Ready);
        })
        .await;
}

#[tokio::test]
async fn test_detach_mid_upload() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("ab");
            h.select(Selection::collapsed(1));
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            let node = h.doc.borrow().media_at(1).unwrap();
            assert!(h.uploader.is_uploading());

            h.doc.borrow_mut().delete(1..2);
            assert!(!node.has_live_session());
            settle().await;

            assert_eq!(h.doc.borrow().text(), "ab");
            assert_eq!(node.status(), NodeStatus::Error);
            assert!(matches!(
                node.upload_outcome(),
                Some(SessionState::Cancelled(CancelReason::Detached))
            ));
            assert!(h.events().is_empty());
            assert!(!h.uploader.is_uploading());
            assert_eq!(h.uploader.live_sessions(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_undo_redo_mid_upload() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("hi");
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            assert!(h.doc.borrow_mut().undo());
            settle().await;
            assert_eq!(h.doc.borrow().text(), "hi");
            assert!(!h.uploader.is_uploading());

            assert!(h.doc.borrow_mut().redo());
            settle().await;
            let rebuilt = h.doc.borrow().media_at(2).unwrap();
            assert_eq!(rebuilt.status(), NodeStatus::Error);
            assert!(!rebuilt.has_live_session());
            // redo never restarts the upload
            assert_eq!(h.calls.borrow().len(), 1);
            assert!(h.events().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_upload_failure() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.pick("any", "big.pdf", "application/pdf", b"%PDF");
            h.resolve(0, Err(UploadError::new("quota exceeded")));
            settle().await;

            let node = h.doc.borrow().embeds()[0].clone();
            assert_eq!(node.status(), NodeStatus::Error);
            assert!(!node.is_active());
            assert_eq!(node.data().value, None);
            assert_eq!(h.events(), ["error pdf big.pdf quota exceeded"]);
            assert!(!h.uploader.is_uploading());

            // a failed session can't be cancelled afterwards
            h.uploader.cancel_uploading();
            settle().await;
            assert_eq!(h.events().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn test_aggregate_state_is_distinct() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            let mut rx = h.uploader.uploading_state();
            assert!(!*rx.borrow());

            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            assert!(rx.has_changed().unwrap());
            assert!(*rx.borrow_and_update());

            h.pick("any", "b.pdf", "application/pdf", b"%PDF");
            assert!(!rx.has_changed().unwrap());

            h.resolve(0, Ok("https://cdn/a.pdf".into()));
            settle().await;
            assert!(!rx.has_changed().unwrap());
            assert!(h.uploader.is_uploading());

            h.resolve(1, Ok("https://cdn/b.pdf".into()));
            settle().await;
            assert!(rx.has_changed().unwrap());
            assert!(!*rx.borrow_and_update());
        })
        .await;
}

#[tokio::test]
async fn test_click_delegation() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("x");
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");

            // not active until the upload settles
            let mut event = ClickEvent::new(1);
            assert!(!h.uploader.handle_click(&mut event));
            assert!(!event.default_prevented());

            h.resolve(0, Ok("https://cdn/a.pdf".into()));
            settle().await;

            let mut event = ClickEvent::new(1);
            assert!(h.uploader.handle_click(&mut event));
            assert!(event.default_prevented());

            let mut text_click = ClickEvent::new(0);
            assert!(!h.uploader.handle_click(&mut text_click));

            assert_eq!(
                h.events(),
                ["success pdf a.pdf https://cdn/a.pdf", "click pdf a.pdf https://cdn/a.pdf"]
            );
        })
        .await;
}

#[tokio::test]
async fn test_dispose() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            let node = h.doc.borrow().embeds()[0].clone();
            h.resolve(0, Ok("https://cdn/a.pdf".into()));
            h.pick("any", "b.pdf", "application/pdf", b"%PDF");
            let pending = h.doc.borrow().embeds()[1].clone();
            settle().await;
            assert_eq!(node.status(), NodeStatus::Ready);

            h.uploader.dispose();
            settle().await;
            assert_eq!(pending.status(), NodeStatus::Error);
            assert!(matches!(
                pending.upload_outcome(),
                Some(SessionState::Cancelled(CancelReason::Disposed))
            ));
            assert_eq!(h.events(), ["success pdf a.pdf https://cdn/a.pdf"]);
            assert!(!h.uploader.is_uploading());

            // nothing reacts after disposal
            let opened = h.toolbar.borrow().opened.len();
            h.pick("any", "c.pdf", "application/pdf", b"%PDF");
            assert_eq!(h.toolbar.borrow().opened.len(), opened);
            assert_eq!(h.doc.borrow().embeds().len(), 2);
            assert!(!h.uploader.handle_click(&mut ClickEvent::new(0)));
        })
        .await;
}

#[tokio::test]
async fn test_dispose_during_image_read() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.pick("image", "photo.png", "image/png", PNG);
            h.uploader.dispose();
            settle().await;
            assert!(h.doc.borrow().embeds().is_empty());
            assert!(h.calls.borrow().is_empty());
            assert_eq!(h.uploader.live_sessions(), 0);
        })
        .await;
}

#[test]
fn test_toolbar_labels() {
    let h = Harness::new("");
    let toolbar = h.toolbar.borrow();
    assert_eq!(toolbar.title.as_deref(), Some("Media"));
    assert_eq!(
        toolbar.labels,
        [
            ("image".to_owned(), "Image".to_owned()),
            ("file".to_owned(), "File".to_owned())
        ]
    );
}

#[test]
fn test_custom_translate() {
    let options = MediaOptions::default().translate(|key| format!("[{key}]"));
    let h = Harness::with_options("", options, Calls::default(), Events::default());
    assert_eq!(h.toolbar.borrow().title.as_deref(), Some("[media]"));
    assert_eq!(h.toolbar.borrow().labels[0].1, "[image]");
}

#[test]
fn test_picker_accept_lists() {
    let h = Harness::new("");
    h.uploader.upload_media(UploadHint::Disabled);
    assert!(h.toolbar.borrow().opened.is_empty());

    h.uploader.upload_media("word");
    h.uploader.upload_media(UploadHint::Any);
    let toolbar = h.toolbar.borrow();
    assert_eq!(toolbar.opened.len(), 2);
    assert_eq!(toolbar.opened[0].accept().len(), 2);
    assert_eq!(toolbar.opened[1].accept().len(), 10);
    assert_eq!(toolbar.opened[1].accept()[0], "image/*");
}

#[tokio::test]
async fn test_file_selection_without_picker_is_ignored() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.uploader.on_file_selected(Some(MediaFile::new(MemoryFile::new(
                "a.pdf",
                "application/pdf",
                &b"%PDF"[..],
            ))));
            h.uploader.upload_media("pdf");
            h.uploader.on_file_selected(None);
            assert!(h.doc.borrow().embeds().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_accept_any_file() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::with_config("", MediaConfig::default().accept_any_file(true));
            h.uploader.upload_media(UploadHint::Any);
            assert!(h.toolbar.borrow().opened[0].accept().is_empty());

            h.pick("any", "archive.zip", "application/zip", b"PK");
            let node = h.doc.borrow().embeds()[0].clone();
            assert_eq!(node.data().media_type, "file");
            assert_eq!(h.calls.borrow()[0].media_type, "file");
            assert!(matches!(&node.element().body, ElementBody::Icon { icon_class, .. } if icon_class == "fas fa-file-file fa-2x"));
        })
        .await;
}

#[tokio::test]
async fn test_blocked_extension() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::with_config("", MediaConfig::default().block_extension("exe"));
            h.pick("any", "photo.PNG.exe", "image/png", PNG);
            settle().await;
            assert!(h.doc.borrow().embeds().is_empty());
            assert!(h.calls.borrow().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_without_transport_node_is_error() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::with_options("", MediaOptions::default(), Calls::default(), Events::default());
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            let node = h.doc.borrow().embeds()[0].clone();
            assert_eq!(node.status(), NodeStatus::Error);
            assert!(!node.has_live_session());
            assert_eq!(h.uploader.live_sessions(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_snapshot_mid_upload() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("pic: ");
            h.pick("image", "photo.png", "image/png", PNG);
            settle().await;
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            h.resolve(1, Ok("https://cdn/a.pdf".into()));
            settle().await;

            let snapshot = h.doc.borrow().snapshot();
            let statuses: Vec<_> = snapshot.embeds().map(|e| e.status).collect();
            assert_eq!(statuses, [NodeStatus::Uploading, NodeStatus::Ready]);

            let stored = MediaUploader::sanitize(
                &snapshot,
                SanitizeOptions {
                    strip_previews: true,
                    ..Default::default()
                },
            );
            let json = stored.to_json().unwrap();
            let reloaded = DocumentSnapshot::from_json(&json).unwrap();
            let doc = MediaDocument::from_snapshot(&reloaded, h.doc.borrow().registry().clone()).unwrap();
            let image = doc.media_at(5).unwrap();
            assert_eq!(image.status(), NodeStatus::Error);
            assert_eq!(image.data().src, None);
            assert_eq!(doc.media_at(6).unwrap().status(), NodeStatus::Ready);
            assert_eq!(h.calls.borrow().len(), 2);
        })
        .await;
}

#[tokio::test]
async fn test_cancel_all_during_image_read() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.pick("image", "photo.png", "image/png", PNG);
            h.uploader.cancel_uploading();
            settle().await;

            // the embed still lands, but the transport is never reached
            let node = h.doc.borrow().embeds()[0].clone();
            assert!(h.calls.borrow().is_empty());
            assert_eq!(node.status(), NodeStatus::Error);
            assert!(matches!(
                node.upload_outcome(),
                Some(SessionState::Cancelled(CancelReason::Broadcast))
            ));
            assert_eq!(h.events(), ["cancelled image photo.png"]);
            assert!(!h.uploader.is_uploading());
            assert_eq!(h.uploader.live_sessions(), 0);
        })
        .await;
}

#[test]
fn test_unknown_category_does_not_open_picker() {
    let h = Harness::new("");
    h.uploader.upload_media("spreadsheet");
    assert!(h.toolbar.borrow().opened.is_empty());

    h.uploader.upload_media("pdf");
    assert_eq!(h.toolbar.borrow().opened.len(), 1);
}

#[tokio::test]
async fn test_unreadable_image_is_not_inserted() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("x");
            h.uploader.upload_media("image");
            h.uploader.on_file_selected(Some(MediaFile::new(UnreadableFile)));
            settle().await;

            assert!(h.doc.borrow().embeds().is_empty());
            assert_eq!(h.doc.borrow().text(), "x");
            assert!(h.calls.borrow().is_empty());
            assert!(h.events().is_empty());
            assert_eq!(h.uploader.live_sessions(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_null_upload_result_leaves_error() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new("");
            h.pick("any", "a.pdf", "application/pdf", b"%PDF");
            h.resolve(0, Ok(MediaValue::Data(serde_json::Value::Null)));
            settle().await;

            let node = h.doc.borrow().embeds()[0].clone();
            assert_eq!(node.status(), NodeStatus::Error);
            assert!(!node.is_active());
            assert_eq!(h.events(), ["error pdf a.pdf upload returned no value"]);
            assert!(!h.uploader.handle_click(&mut ClickEvent::new(0)));
        })
        .await;
}
