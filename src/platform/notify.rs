use tokio::sync::broadcast;

/// The one message every user-visible failure surfaces.
pub const GENERIC_ERROR: &str =
    "Oops! Something went wrong. Please contact us if this issue persists.";

/// A fire-and-forget event for the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A single user-visible error notification.
    Error(String),
    /// Scroll the page back to the top.
    ScrollToTop,
}

/// Fans UI events out to whatever surface is listening. Sending never
/// blocks, and no listener being present is not an error.
#[derive(Clone)]
pub struct Notifier {
    events: broadcast::Sender<UiEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self { events }
    }

    /// Surfaces the generic user-visible error notification.
    pub fn error(&self) {
        tracing::warn!("surfacing error notification to the candidate");
        let _ = self.events.send(UiEvent::Error(GENERIC_ERROR.to_string()));
    }

    /// Asks the page to scroll back to the top.
    pub fn scroll_to_top(&self) {
        let _ = self.events.send(UiEvent::ScrollToTop);
    }

    /// Subscribes a listening surface to the event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
