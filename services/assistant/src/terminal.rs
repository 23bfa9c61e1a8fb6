//! Terminal rendering of the assistant surfaces.

use parking_lot::Mutex;
use parley_core::ui::{ImagePanel, MapPin, TranscriptRole, UiSink};

/// Renders status, transcript, errors, and panels as plain terminal lines.
///
/// Calls arrive from both the session task and the command loop, so the
/// retained surfaces live behind a mutex.
#[derive(Default)]
pub struct TerminalUi {
    inner: Mutex<Surfaces>,
}

#[derive(Default)]
struct Surfaces {
    transcript: Vec<(TranscriptRole, String)>,
    image: Option<ImagePanel>,
    map: Option<MapPin>,
    error: Option<String>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UiSink for TerminalUi {
    fn update_status(&self, message: &str) {
        println!("[status] {message}");
    }

    fn show_error(&self, message: &str) {
        self.inner.lock().error = Some(message.to_string());
        eprintln!("[error] {message}");
    }

    fn hide_error(&self) {
        self.inner.lock().error = None;
    }

    fn push_transcript(&self, role: TranscriptRole, text: &str) {
        println!("[{role}] {text}");
        self.inner.lock().transcript.push((role, text.to_string()));
    }

    fn show_image(&self, image: ImagePanel) {
        println!("[image] {}: {}", image.caption, image.url);
        if let Some(source) = &image.source {
            println!("[image] source: {source}");
        }
        self.inner.lock().image = Some(image);
    }

    fn show_map(&self, pin: MapPin) {
        println!(
            "[map] {} at {:.4}, {:.4}",
            pin.label, pin.latitude, pin.longitude
        );
        self.inner.lock().map = Some(pin);
    }

    fn clear(&self) {
        let mut surfaces = self.inner.lock();
        surfaces.transcript.clear();
        surfaces.image = None;
        surfaces.map = None;
        surfaces.error = None;
        println!("[status] Conversation cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_empties_all_retained_surfaces() {
        let ui = TerminalUi::new();
        ui.push_transcript(TranscriptRole::User, "hello");
        ui.push_transcript(TranscriptRole::Assistant, "hi");
        ui.show_image(ImagePanel {
            url: "https://example.org/a.png".to_string(),
            source: None,
            caption: "a".to_string(),
        });
        ui.show_map(MapPin {
            latitude: 51.2,
            longitude: 4.4,
            label: "Antwerp".to_string(),
        });
        ui.show_error("boom");

        ui.clear();

        let surfaces = ui.inner.lock();
        assert!(surfaces.transcript.is_empty());
        assert!(surfaces.image.is_none());
        assert!(surfaces.map.is_none());
        assert!(surfaces.error.is_none());
    }

    #[test]
    fn hide_error_only_drops_the_banner() {
        let ui = TerminalUi::new();
        ui.push_transcript(TranscriptRole::User, "hello");
        ui.show_error("boom");
        ui.hide_error();

        let surfaces = ui.inner.lock();
        assert!(surfaces.error.is_none());
        assert_eq!(surfaces.transcript.len(), 1);
    }
}
