//! Composer behaviour against an in-memory board.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Barrier;

use super::*;
use crate::config::PayloadShape;
use crate::editor::HtmlEditor;
use crate::images::{FetchedImage, scan_images};
use crate::presenter::RecordingPresenter;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

enum Reply {
    Created(Value),
    Rejected(u16, Value),
}

/// Board double that records what it was asked to do.
struct FakeBoard {
    images: HashMap<String, Vec<u8>>,
    fetches: Cell<usize>,
    fetches_at_post: Cell<Option<usize>>,
    posts: RefCell<Vec<(PostPayload, AuthContext)>>,
    uploads: RefCell<Vec<ImageUpload>>,
    reply: Reply,
    upload_reply: Option<String>,
    barrier: Option<Barrier>,
}

impl FakeBoard {
    fn new() -> Self {
        Self {
            images: HashMap::new(),
            fetches: Cell::new(0),
            fetches_at_post: Cell::new(None),
            posts: RefCell::new(Vec::new()),
            uploads: RefCell::new(Vec::new()),
            reply: Reply::Created(json!({"id": 1})),
            upload_reply: Some("/uploads/picked.png".into()),
            barrier: None,
        }
    }

    fn with_image(mut self, url: &str) -> Self {
        self.images.insert(url.to_string(), PNG.to_vec());
        self
    }

    fn rejecting(mut self, status: u16, body: Value) -> Self {
        self.reply = Reply::Rejected(status, body);
        self
    }

    fn posts(&self) -> std::cell::Ref<'_, Vec<(PostPayload, AuthContext)>> {
        self.posts.borrow()
    }
}

impl BoardApi for FakeBoard {
    async fn create_post(
        &self,
        payload: &PostPayload,
        auth: &AuthContext,
    ) -> Result<Value, ApiError> {
        self.fetches_at_post.set(Some(self.fetches.get()));
        self.posts.borrow_mut().push((payload.clone(), auth.clone()));
        match &self.reply {
            Reply::Created(body) => Ok(body.clone()),
            Reply::Rejected(status, body) => Err(ApiError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn upload_image(
        &self,
        upload: ImageUpload,
        _auth: &AuthContext,
    ) -> Result<String, ApiError> {
        self.uploads.borrow_mut().push(upload);
        self.upload_reply
            .clone()
            .ok_or_else(|| ApiError::Decode("no imageUrl".into()))
    }
}

impl ImageFetcher for FakeBoard {
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, ApiError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        self.fetches.set(self.fetches.get() + 1);
        self.images
            .get(url)
            .map(|data| FetchedImage {
                data: Bytes::copy_from_slice(data),
                content_type: Some("image/png".into()),
            })
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: Value::Null,
            })
    }
}

type TestComposer = Composer<HtmlEditor, FakeBoard, RecordingPresenter>;

fn composer(board: FakeBoard) -> TestComposer {
    Composer::new(
        Config::default(),
        HtmlEditor::new(),
        board,
        RecordingPresenter::default(),
    )
}

fn filled(board: FakeBoard, body: &str) -> TestComposer {
    let mut composer = composer(board);
    composer.set_title("Sizing question");
    composer.set_category(Some(Category::ProductInquiry));
    composer.editor_mut().insert_text(0, body);
    composer
}

fn auth() -> AuthContext {
    AuthContext::bearer("tok")
}

#[tokio::test]
async fn valid_document_is_sent_once_with_matching_fields() {
    let mut composer = filled(FakeBoard::new(), "Does it run small?");

    let receipt = composer.submit(&auth()).await.unwrap();

    assert_eq!(receipt.response, json!({"id": 1}));
    assert_eq!(receipt.inlined_images, 0);
    let posts = composer.api.posts();
    assert_eq!(posts.len(), 1);
    let (payload, sent_auth) = &posts[0];
    assert_eq!(payload.qboard().title, "Sizing question");
    assert_eq!(payload.qboard().content, "<p>Does it run small?</p>");
    assert_eq!(payload.qboard().board_type, Category::ProductInquiry);
    assert_eq!(sent_auth.token(), Some("tok"));
}

#[tokio::test]
async fn success_confirms_and_navigates_to_listing() {
    let mut composer = filled(FakeBoard::new(), "hello");
    composer.attach_files([Attachment::new("a.txt", &b"a"[..])]);

    composer.submit(&auth()).await.unwrap();

    assert_eq!(composer.state(), ComposerState::Navigated);
    assert!(composer.attachments().is_empty());
    assert_eq!(composer.presenter().alerts, vec![messages::POSTED]);
    assert_eq!(composer.presenter().routes, vec!["/qna"]);
}

#[tokio::test]
async fn submitted_composer_cannot_submit_again() {
    let mut composer = filled(FakeBoard::new(), "hello");
    composer.submit(&auth()).await.unwrap();

    let err = composer.submit(&auth()).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::InvalidState {
            state: ComposerState::Navigated,
            ..
        }
    ));
    assert_eq!(composer.api.posts().len(), 1);
}

#[tokio::test]
async fn missing_fields_fail_validation_without_a_request() {
    let mut composer = composer(FakeBoard::new());
    composer.set_title("   ");

    let err = composer.submit(&auth()).await.unwrap_err();

    match err {
        ComposerError::Validation(e) => {
            assert_eq!(e.missing, vec![Field::Title, Field::Body, Field::Category]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(composer.state(), ComposerState::Editing);
    assert!(composer.api.posts().is_empty());
    assert_eq!(composer.presenter().inline, vec![messages::MISSING_FIELDS]);
    assert!(composer.presenter().alerts.is_empty());
}

#[tokio::test]
async fn empty_editor_markup_counts_as_missing_body() {
    let mut composer = composer(FakeBoard::new());
    composer.set_title("t");
    composer.set_category(Some(Category::OtherInquiry));

    let err = composer.submit(&auth()).await.unwrap_err();
    assert!(matches!(err, ComposerError::Validation(ref e) if e.missing == vec![Field::Body]));
}

#[tokio::test]
async fn remote_images_are_all_inlined_before_sending() {
    let urls = [
        "https://cdn.test/1.png",
        "https://cdn.test/2.png",
        "https://cdn.test/3.png",
    ];
    let mut board = FakeBoard::new();
    for url in urls {
        board = board.with_image(url);
    }
    // Every fetch waits for all the others, so this only completes when the
    // fetches are in flight together.
    board.barrier = Some(Barrier::new(urls.len()));

    let mut composer = filled(board, "look:");
    for url in urls {
        let end = composer.editor().len();
        composer.editor_mut().insert_image(end, url);
    }

    let receipt = tokio::time::timeout(Duration::from_secs(5), composer.submit(&auth()))
        .await
        .expect("image fetches did not run concurrently")
        .unwrap();

    assert_eq!(receipt.inlined_images, 3);
    assert_eq!(composer.api.fetches_at_post.get(), Some(3));
    let posts = composer.api.posts();
    let content = &posts[0].0.qboard().content;
    let embedded = scan_images(content);
    assert_eq!(embedded.len(), 3);
    assert!(embedded.iter().all(|image| image.is_inline()));
    assert!(!content.contains("https://cdn.test"));
}

#[tokio::test]
async fn inline_images_are_not_fetched() {
    let mut composer = filled(FakeBoard::new(), "x");
    composer
        .editor_mut()
        .insert_image(1, "data:image/png;base64,AAAA");

    let receipt = composer.submit(&auth()).await.unwrap();

    assert_eq!(receipt.inlined_images, 0);
    assert_eq!(composer.api.fetches.get(), 0);
}

#[tokio::test]
async fn image_failure_aborts_and_preserves_fields() {
    let board = FakeBoard::new().with_image("https://cdn.test/ok.png");
    let mut composer = filled(board, "body");
    composer
        .editor_mut()
        .insert_image(4, "https://cdn.test/ok.png");
    composer
        .editor_mut()
        .insert_image(5, "https://cdn.test/gone.png");
    let before = composer.document();

    let err = composer.submit(&auth()).await.unwrap_err();

    assert!(matches!(err, ComposerError::ImageProcessing(ref reason) if reason.contains("gone.png")));
    assert!(composer.api.posts().is_empty());
    assert_eq!(composer.state(), ComposerState::Editing);
    assert_eq!(composer.document(), before);
    assert_eq!(composer.presenter().alerts, vec![messages::IMAGE_FAILED]);
}

#[tokio::test]
async fn rejected_submission_returns_to_editing_with_fields_intact() {
    let board = FakeBoard::new().rejecting(500, json!({"error": "db down"}));
    let mut composer = filled(board, "body");
    composer.attach_files([
        Attachment::new("a.txt", &b"a"[..]),
        Attachment::new("b.txt", &b"b"[..]),
    ]);
    let before = composer.document();

    let err = composer.submit(&auth()).await.unwrap_err();

    match err {
        ComposerError::Submission { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body["error"], "db down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(composer.state(), ComposerState::Editing);
    assert_eq!(composer.document(), before);
    assert_eq!(composer.attachments().len(), 2);
    assert_eq!(composer.presenter().alerts, vec![messages::SUBMIT_FAILED]);
    assert!(composer.presenter().routes.is_empty());

    // The user can try again from the same state.
    composer.api.reply = Reply::Created(Value::Null);
    composer.submit(&auth()).await.unwrap();
    assert_eq!(composer.api.posts().len(), 2);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let config = Config {
        api_url: "http://127.0.0.1:1".into(),
        ..Config::default()
    };
    let client = crate::client::HttpBoardClient::new(config.clone());
    let mut composer = Composer::new(
        config,
        HtmlEditor::with_text("body"),
        client,
        RecordingPresenter::default(),
    );
    composer.set_title("t");
    composer.set_category(Some(Category::OtherInquiry));

    let err = composer.submit(&AuthContext::anonymous()).await.unwrap_err();

    assert!(matches!(err, ComposerError::Network(_)));
    assert_eq!(composer.state(), ComposerState::Editing);
    assert_eq!(
        composer.presenter().alerts,
        vec![messages::SERVER_UNAVAILABLE]
    );
}

#[tokio::test]
async fn wrapped_payload_carries_attachments_as_base64() {
    let mut composer = filled(FakeBoard::new(), "body");
    composer.config.payload_shape = PayloadShape::Wrapped;
    composer.attach_files([
        Attachment::new("a.txt", &b"hello"[..]),
        Attachment::new("b.txt", &b"hi"[..]),
    ]);

    composer.submit(&auth()).await.unwrap();

    let posts = composer.api.posts();
    assert_eq!(posts[0].0.attachments(), ["aGVsbG8=", "aGk="]);
}

#[test]
fn remove_attachment_keeps_order() {
    let mut composer = composer(FakeBoard::new());
    composer.attach_files(
        ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| Attachment::new(name, Bytes::new())),
    );
    composer.attach_files([Attachment::new("a", Bytes::new())]);

    let removed = composer.remove_attachment(1).unwrap();
    assert_eq!(removed.name, "b");
    let names: Vec<_> = composer.attachments().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["a", "c", "d", "a"]);

    assert!(composer.remove_attachment(10).is_none());
    assert_eq!(composer.attachments().len(), 4);
}

#[test]
fn cancel_always_navigates_and_discards() {
    let mut composer = filled(FakeBoard::new(), "draft");
    composer.attach_files([Attachment::new("a", Bytes::new())]);

    composer.cancel();

    assert_eq!(composer.state(), ComposerState::Navigated);
    assert_eq!(composer.presenter().routes, vec!["/qna"]);
    assert_eq!(composer.title(), "");
    assert_eq!(composer.category(), None);
    assert!(composer.attachments().is_empty());
    assert!(is_blank_markup(&composer.editor().content()));

    let mut empty = composer_with_nothing();
    empty.cancel();
    assert_eq!(empty.presenter().routes, vec!["/qna"]);
}

fn composer_with_nothing() -> TestComposer {
    composer(FakeBoard::new())
}

#[tokio::test]
async fn upload_strategy_embeds_server_url_at_cursor() {
    let mut composer = filled(FakeBoard::new(), "abcd");
    composer.editor_mut().set_cursor(Some(2));

    let src = composer
        .insert_image(PickedImage::new("picked.png", PNG), &auth())
        .await
        .unwrap();

    assert_eq!(src, "http://localhost:8080/uploads/picked.png");
    assert_eq!(
        composer.editor().content(),
        "<p>ab<img src=\"http://localhost:8080/uploads/picked.png\">cd</p>"
    );
    let uploads = composer.api.uploads.borrow();
    assert_eq!(uploads[0].file_name, "picked.png");
    assert_eq!(uploads[0].mime_type, "image/png");
}

#[tokio::test]
async fn inline_strategy_embeds_data_url_without_a_request() {
    let mut composer = filled(FakeBoard::new(), "abcd");
    composer.config.image_strategy = ImageStrategy::Inline;
    composer.editor_mut().set_cursor(None);

    let src = composer
        .insert_image(PickedImage::new("picked.png", PNG), &auth())
        .await
        .unwrap();

    assert!(src.starts_with("data:image/png;base64,"));
    assert!(composer.api.uploads.borrow().is_empty());
    assert_eq!(composer.editor().image_sources(), vec![src.as_str()]);
    assert!(composer.editor().content().ends_with("\"></p>"));
}

#[tokio::test]
async fn failed_upload_inserts_nothing() {
    let mut board = FakeBoard::new();
    board.upload_reply = None;
    let mut composer = filled(board, "abcd");

    let err = composer
        .insert_image(PickedImage::new("picked.png", PNG), &auth())
        .await
        .unwrap_err();

    assert!(matches!(err, ComposerError::ImageProcessing(_)));
    assert!(composer.editor().image_sources().is_empty());
    assert_eq!(composer.state(), ComposerState::Editing);
}
