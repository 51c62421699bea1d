//! Document model and composer state machine.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Board category of a Q&A post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Question about a product.
    #[serde(rename = "ProductQnA")]
    ProductInquiry,
    /// Anything else.
    #[serde(rename = "EtcQnA")]
    OtherInquiry,
}

impl Category {
    /// Value sent as `boardType`.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Category::ProductInquiry => "ProductQnA",
            Category::OtherInquiry => "EtcQnA",
        }
    }

    /// Parse either the wire value or a short name (`product`, `other`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "ProductQnA" | "product" | "Product" => Some(Category::ProductInquiry),
            "EtcQnA" | "other" | "etc" | "Other" => Some(Category::OtherInquiry),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Required fields checked at submit time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Title,
    Body,
    Category,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Body => "body",
            Field::Category => "category",
        }
    }
}

/// The fields a user fills in.
///
/// The body is not stored here while editing; it lives in the editor and is
/// captured into a `Document` when a submission starts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub body: String,
    pub category: Option<Category>,
}

/// A file selected by the user to accompany the post.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: String,
    pub data: Bytes,
    encoded: Option<String>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            encoded: None,
        }
    }

    /// Standard base64 of the raw bytes, computed on first use.
    pub fn encoded(&mut self) -> &str {
        let data = &self.data;
        self.encoded.get_or_insert_with(|| STANDARD.encode(data))
    }

    /// Whether the base64 form has already been computed.
    pub fn is_encoded(&self) -> bool {
        self.encoded.is_some()
    }
}

/// Where the composer is in its submit lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComposerState {
    #[default]
    Editing,
    Validating,
    ProcessingImages,
    Submitting,
    Navigated,
}

/// Inputs to [`ComposerState::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposerEvent {
    Submit,
    Validated,
    ImagesInlined,
    Accepted,
    Failed,
    Cancel,
}

/// A transition the state machine does not allow.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: ComposerState,
    pub event: ComposerEvent,
}

impl ComposerState {
    /// Pure transition function.
    ///
    /// `Cancel` is accepted from every state. `Failed` is accepted from any of
    /// the in-flight states and always lands back in `Editing`.
    pub fn next(self, event: ComposerEvent) -> Result<ComposerState, InvalidTransition> {
        use ComposerEvent as E;
        use ComposerState as S;

        match (self, event) {
            (_, E::Cancel) => Ok(S::Navigated),
            (S::Editing, E::Submit) => Ok(S::Validating),
            (S::Validating, E::Validated) => Ok(S::ProcessingImages),
            (S::ProcessingImages, E::ImagesInlined) => Ok(S::Submitting),
            (S::Submitting, E::Accepted) => Ok(S::Navigated),
            (S::Validating | S::ProcessingImages | S::Submitting, E::Failed) => Ok(S::Editing),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComposerState::Navigated)
    }
}

impl fmt::Display for ComposerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComposerState::Editing => "editing",
            ComposerState::Validating => "validating",
            ComposerState::ProcessingImages => "processing images",
            ComposerState::Submitting => "submitting",
            ComposerState::Navigated => "navigated away",
        };
        f.write_str(s)
    }
}
