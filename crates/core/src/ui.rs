//! UI surfaces consumed by the session transport and the tools.
//!
//! Everything the assistant shows the user goes through [`UiSink`], so the
//! transport and tool layers stay free of rendering concerns and tests can
//! observe exactly what would be displayed.

use std::fmt;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptRole {
    /// Text the local user contributed.
    User,
    /// A model response transcript.
    Assistant,
    /// A rendered function result.
    ToolResult,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
            TranscriptRole::ToolResult => write!(f, "tool"),
        }
    }
}

/// An image to display alongside the transcript, with optional attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePanel {
    pub url: String,
    pub source: Option<String>,
    pub caption: String,
}

/// A location pin for the map surface.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPin {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

/// Output surfaces of the assistant UI.
///
/// Implementations render; they make no protocol decisions. All methods take
/// `&self` so a shared handle can be used from the session task and the
/// command loop alike.
#[cfg_attr(test, mockall::automock)]
pub trait UiSink: Send + Sync {
    /// Replaces the status line.
    fn update_status(&self, message: &str);
    /// Shows an error banner until hidden or cleared.
    fn show_error(&self, message: &str);
    /// Hides the error banner.
    fn hide_error(&self);
    /// Appends one transcript entry.
    fn push_transcript(&self, role: TranscriptRole, text: &str);
    /// Shows or replaces the image panel.
    fn show_image(&self, image: ImagePanel);
    /// Shows or replaces the map pin.
    fn show_map(&self, pin: MapPin);
    /// Resets transcript, image, and map surfaces. Session state is untouched.
    fn clear(&self);
}
