//! Event handling and user feedback

use crate::logging::log_event_with_tracing;
use console::{Style, Term};
use pkgreg_events::{AppEvent, EventMessage, GeneralEvent, PackageEvent, UploadEvent};

/// Routes events to the log and, for interactive use, to stderr
pub struct EventHandler {
    term: Term,
    interactive: bool,
    colors: bool,
}

impl EventHandler {
    pub fn new(json_mode: bool) -> Self {
        let term = Term::stderr();
        let colors = term.features().colors_supported();
        Self {
            term,
            interactive: !json_mode,
            colors,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&self, message: &EventMessage) {
        log_event_with_tracing(message);
        if !self.interactive {
            return;
        }

        match &message.event {
            AppEvent::Upload(UploadEvent::Started { identity, .. }) => {
                self.show_status(&format!("Uploading {identity}"));
            }
            AppEvent::General(GeneralEvent::RetryScheduled {
                operation, attempt, ..
            }) => {
                self.show_warning(&format!("{operation} failed, retrying (attempt {attempt})"));
            }
            AppEvent::Upload(UploadEvent::CleanupFailed { resource, error, .. }) => {
                self.show_warning(&format!("could not clean up {resource}: {error}"));
            }
            AppEvent::Package(PackageEvent::BlobOrphaned { location, .. }) => {
                self.show_warning(&format!("blob {location} could not be removed"));
            }
            AppEvent::General(GeneralEvent::Warning { message, .. }) => {
                self.show_warning(message);
            }
            _ => {}
        }
    }

    fn show_status(&self, message: &str) {
        let _ = self.term.write_line(&self.paint(Style::new().dim(), message));
    }

    fn show_warning(&self, message: &str) {
        let line = format!("warning: {message}");
        let _ = self.term.write_line(&self.paint(Style::new().yellow(), &line));
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.colors {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}
