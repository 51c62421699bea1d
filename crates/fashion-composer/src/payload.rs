//! Wire payloads for the board-creation endpoint.

use serde::Serialize;

use crate::config::PayloadShape;
use crate::types::Category;

/// The document fields as the backend names them.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QBoard {
    pub title: String,
    pub content: String,
    pub board_type: Category,
}

/// Body of the create request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PostPayload {
    Flat(QBoard),
    #[serde(rename_all = "camelCase")]
    Wrapped {
        qboard: QBoard,
        base64_images: Vec<String>,
    },
}

impl PostPayload {
    /// Build the payload for `shape`.
    ///
    /// The flat shape has nowhere to put attachments; they are dropped with a
    /// warning.
    pub fn build(shape: PayloadShape, qboard: QBoard, attachments: Vec<String>) -> Self {
        match shape {
            PayloadShape::Flat => {
                if !attachments.is_empty() {
                    tracing::warn!(
                        count = attachments.len(),
                        "flat payload cannot carry attachments, dropping them"
                    );
                }
                PostPayload::Flat(qboard)
            }
            PayloadShape::Wrapped => PostPayload::Wrapped {
                qboard,
                base64_images: attachments,
            },
        }
    }

    pub fn qboard(&self) -> &QBoard {
        match self {
            PostPayload::Flat(qboard) | PostPayload::Wrapped { qboard, .. } => qboard,
        }
    }

    pub fn attachments(&self) -> &[String] {
        match self {
            PostPayload::Flat(_) => &[],
            PostPayload::Wrapped { base64_images, .. } => base64_images,
        }
    }
}
