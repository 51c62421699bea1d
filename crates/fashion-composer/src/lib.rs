//! fashion-composer: the Q&A board post composer, without any UI framework.
//!
//! This crate provides:
//! - `Composer` - form state, the submit pipeline and its state machine
//! - `RichTextEditor` trait for editor access, `HtmlEditor` in-memory implementation
//! - Image scanning and concurrent inlining into `data:` URLs
//! - `BoardApi` / `ImageFetcher` traits with a reqwest-backed `HttpBoardClient`
//! - Explicit `AuthContext` and token storage
//! - `Config` loading from the environment or a JSON file

pub mod auth;
pub mod client;
pub mod composer;
pub mod config;
pub mod editor;
pub mod error;
pub mod images;
pub mod payload;
pub mod presenter;
pub mod types;

pub use auth::{
    ACCESS_TOKEN_KEY, AuthContext, FileTokenStore, MemoryTokenStore, TokenStore,
};
pub use client::{BoardApi, HttpBoardClient, ImageUpload};
pub use composer::{Composer, PickedImage, SubmitReceipt};
pub use config::{Config, FileStore, ImageStrategy, Loader, PayloadShape, Saver};
pub use editor::{EMPTY_MARKUP, HtmlEditor, RichTextEditor, is_blank_markup};
pub use error::{ApiError, AuthError, ComposerError, ConfigError, ValidationError};
pub use images::{EmbeddedImage, FetchedImage, ImageFetcher, inline_images, scan_images};
pub use payload::{PostPayload, QBoard};
pub use presenter::{Presenter, RecordingPresenter};
pub use types::{
    Attachment, Category, ComposerEvent, ComposerState, Document, Field, InvalidTransition,
};
