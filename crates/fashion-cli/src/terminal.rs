use fashion_composer::Presenter;

/// Prints composer feedback for a terminal user.
///
/// Messages go to stderr so that stdout only carries the route the
/// composer navigated to.
#[derive(Debug, Default)]
pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn inline_message(&mut self, message: &str) {
        eprintln!("  ! {message}");
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn navigate(&mut self, route: &str) {
        println!("{route}");
    }
}
