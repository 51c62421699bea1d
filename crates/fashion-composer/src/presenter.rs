//! UI effects the composer triggers.

/// Sink for user-visible feedback and navigation.
///
/// A browser binding maps these onto inline form messages, `alert()` and the
/// router; the CLI prints them.
pub trait Presenter {
    /// Message shown next to the form, e.g. for missing fields.
    fn inline_message(&mut self, message: &str);

    /// Blocking notification.
    fn alert(&mut self, message: &str);

    /// Leave the form for `route`.
    fn navigate(&mut self, route: &str);
}

/// Messages shown to the user.
pub mod messages {
    pub const MISSING_FIELDS: &str = "Please fill in all fields.";
    pub const POSTED: &str = "Your post has been submitted.";
    pub const IMAGE_FAILED: &str = "An error occurred while processing images. Please try again.";
    pub const SUBMIT_FAILED: &str = "Failed to submit your post.";
    pub const SERVER_UNAVAILABLE: &str =
        "There was a problem with the server. Please try again later.";
}

/// Presenter that records every call, for tests and headless use.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingPresenter {
    pub inline: Vec<String>,
    pub alerts: Vec<String>,
    pub routes: Vec<String>,
}

impl Presenter for RecordingPresenter {
    fn inline_message(&mut self, message: &str) {
        self.inline.push(message.to_owned());
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_owned());
    }

    fn navigate(&mut self, route: &str) {
        self.routes.push(route.to_owned());
    }
}
