//! The Q&A post composer.
//!
//! Owns the form fields and the attachment list, drives the editor through
//! [`RichTextEditor`], and runs the submit pipeline:
//! validate, inline images, send, then navigate or fall back to editing.

use bytes::Bytes;

use crate::auth::AuthContext;
use crate::client::{BoardApi, ImageUpload};
use crate::config::{Config, ImageStrategy};
use crate::editor::{RichTextEditor, is_blank_markup};
use crate::error::{ApiError, ComposerError, ValidationError};
use crate::images::{self, ImageFetcher};
use crate::payload::{PostPayload, QBoard};
use crate::presenter::{Presenter, messages};
use crate::types::{Attachment, Category, ComposerEvent, ComposerState, Document, Field};

#[cfg(test)]
mod tests;

/// An image file the user picked for embedding in the body.
#[derive(Clone, Debug)]
pub struct PickedImage {
    pub name: String,
    pub data: Bytes,
}

impl PickedImage {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Outcome of a successful submit.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitReceipt {
    /// JSON the server answered with.
    pub response: serde_json::Value,
    /// Remote images converted to `data:` URLs before sending.
    pub inlined_images: usize,
}

pub struct Composer<E, A, P> {
    config: Config,
    editor: E,
    api: A,
    presenter: P,
    title: String,
    category: Option<Category>,
    attachments: Vec<Attachment>,
    state: ComposerState,
}

impl<E, A, P> Composer<E, A, P>
where
    E: RichTextEditor,
    A: BoardApi + ImageFetcher,
    P: Presenter,
{
    pub fn new(config: Config, editor: E, api: A, presenter: P) -> Self {
        Self {
            config,
            editor,
            api,
            presenter,
            title: String::new(),
            category: None,
            attachments: Vec::new(),
            state: ComposerState::Editing,
        }
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Snapshot of the current fields, body included.
    pub fn document(&self) -> Document {
        Document {
            title: self.title.clone(),
            body: self.editor.content(),
            category: self.category,
        }
    }

    pub fn set_title(&mut self, text: impl Into<String>) {
        self.title = text.into();
    }

    pub fn set_category(&mut self, category: Option<Category>) {
        self.category = category;
    }

    /// Append files to the attachment list. No dedup, no limits.
    pub fn attach_files(&mut self, files: impl IntoIterator<Item = Attachment>) {
        self.attachments.extend(files);
    }

    /// Remove the attachment at `index`, keeping the others in order.
    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }

    /// Embed `image` at the editor's cursor (or the end, without one).
    ///
    /// Depending on [`Config::image_strategy`] the image is either uploaded and
    /// referenced by URL, or embedded as a `data:` URL. Returns the inserted
    /// `src`. Nothing is inserted when the upload fails.
    pub async fn insert_image(
        &mut self,
        image: PickedImage,
        auth: &AuthContext,
    ) -> Result<String, ComposerError> {
        self.require_editing("insert an image")?;

        let mime_type = images::sniff_mime(&image.data);
        let src = match self.config.image_strategy {
            ImageStrategy::Inline => images::data_url(&mime_type, &image.data),
            ImageStrategy::Upload => {
                let upload = ImageUpload {
                    file_name: image.name,
                    mime_type,
                    data: image.data,
                };
                match self.api.upload_image(upload, auth).await {
                    Ok(image_url) => self.config.asset_link(&image_url),
                    Err(e) => {
                        tracing::warn!(error = %e, "image upload failed");
                        return Err(upload_error(e));
                    }
                }
            }
        };

        let position = self.editor.cursor().unwrap_or_else(|| self.editor.len());
        self.editor.insert_image(position, &src);
        tracing::debug!(position, strategy = ?self.config.image_strategy, "image inserted");
        Ok(src)
    }

    /// Validate, inline images, and send the post.
    ///
    /// On success the attachments are dropped, a confirmation is shown and the
    /// presenter navigates to the listing route. On failure the composer is back
    /// in [`ComposerState::Editing`] with every field as it was.
    pub async fn submit(&mut self, auth: &AuthContext) -> Result<SubmitReceipt, ComposerError> {
        self.require_editing("submit")?;
        self.advance(ComposerEvent::Submit)?;

        match self.run_submit(auth).await {
            Ok(receipt) => {
                self.advance(ComposerEvent::Accepted)?;
                self.attachments.clear();
                tracing::info!(
                    inlined_images = receipt.inlined_images,
                    "post submitted"
                );
                self.presenter.alert(messages::POSTED);
                self.presenter.navigate(&self.config.listing_route);
                Ok(receipt)
            }
            Err(err) => {
                self.advance(ComposerEvent::Failed)?;
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Discard everything and leave the form.
    pub fn cancel(&mut self) {
        self.title.clear();
        self.category = None;
        self.attachments.clear();
        self.editor.clear();
        self.state = self
            .state
            .next(ComposerEvent::Cancel)
            .unwrap_or(ComposerState::Navigated);
        self.presenter.navigate(&self.config.listing_route);
    }

    async fn run_submit(&mut self, auth: &AuthContext) -> Result<SubmitReceipt, ComposerError> {
        let document = self.document();
        let category = validate(&document)?;
        self.advance(ComposerEvent::Validated)?;

        let inlined = images::inline_images(&document.body, &self.api)
            .await
            .map_err(|e| ComposerError::ImageProcessing(e.to_string()))?;
        self.advance(ComposerEvent::ImagesInlined)?;

        let attachments = self
            .attachments
            .iter_mut()
            .map(|attachment| attachment.encoded().to_owned())
            .collect();
        let payload = PostPayload::build(
            self.config.payload_shape,
            QBoard {
                title: document.title,
                content: inlined.body,
                board_type: category,
            },
            attachments,
        );

        let response = self
            .api
            .create_post(&payload, auth)
            .await
            .map_err(submit_error)?;

        Ok(SubmitReceipt {
            response,
            inlined_images: inlined.converted,
        })
    }

    fn require_editing(&self, action: &'static str) -> Result<(), ComposerError> {
        match self.state {
            ComposerState::Editing => Ok(()),
            state => Err(ComposerError::InvalidState { action, state }),
        }
    }

    fn advance(&mut self, event: ComposerEvent) -> Result<(), ComposerError> {
        self.state = self
            .state
            .next(event)
            .map_err(|e| ComposerError::InvalidState {
                action: "advance",
                state: e.from,
            })?;
        Ok(())
    }

    fn report(&mut self, err: &ComposerError) {
        match err {
            ComposerError::Validation(e) => {
                tracing::debug!(error = %e, "validation failed");
                self.presenter.inline_message(messages::MISSING_FIELDS);
            }
            ComposerError::ImageProcessing(reason) => {
                tracing::error!(%reason, "image processing failed");
                self.presenter.alert(messages::IMAGE_FAILED);
            }
            ComposerError::Submission { status, body } => {
                tracing::error!(status, payload = %body, "error response from server");
                self.presenter.alert(messages::SUBMIT_FAILED);
            }
            other => {
                tracing::error!(error = %other, "error submitting post");
                self.presenter.alert(messages::SERVER_UNAVAILABLE);
            }
        }
    }
}

/// Returns the chosen category when every required field is present.
fn validate(document: &Document) -> Result<Category, ValidationError> {
    let mut missing = Vec::new();
    if document.title.trim().is_empty() {
        missing.push(Field::Title);
    }
    if is_blank_markup(&document.body) {
        missing.push(Field::Body);
    }
    if document.category.is_none() {
        missing.push(Field::Category);
    }

    match document.category {
        Some(category) if missing.is_empty() => Ok(category),
        _ => Err(ValidationError { missing }),
    }
}

fn submit_error(err: ApiError) -> ComposerError {
    match err {
        ApiError::Status { status, body } => ComposerError::Submission { status, body },
        other => ComposerError::Network(other.to_string()),
    }
}

fn upload_error(err: ApiError) -> ComposerError {
    match err {
        ApiError::Status { status, body } => ComposerError::Submission { status, body },
        ApiError::Transport(e) => ComposerError::Network(e.to_string()),
        ApiError::Decode(reason) => ComposerError::ImageProcessing(reason),
    }
}
