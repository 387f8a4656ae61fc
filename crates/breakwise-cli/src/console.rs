//! Terminal stand-ins for the desktop collaborators.

use breakwise_core::overlay::{OverlayContent, Rect, SurfaceId, SurfaceKind};
use breakwise_core::{CoreError, Notifier, OverlayError, OverlayHost};
use tracing::debug;

/// Renders overlays as lines on stdout. With `quiet` nothing is printed.
#[derive(Debug, Default)]
pub struct ConsoleOverlayHost {
    quiet: bool,
}

impl ConsoleOverlayHost {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    fn print(&self, line: String) {
        if !self.quiet {
            println!("{line}");
        }
    }
}

fn describe(content: &OverlayContent) -> String {
    match content {
        OverlayContent::BreakRemaining { remaining_secs } => {
            format!("Break: {} left. Look away from the screen.", format_secs(*remaining_secs))
        }
        OverlayContent::Countdown { next_break_in_secs } => {
            format!("Break in {}", format_secs(*next_break_in_secs))
        }
        OverlayContent::Reminder { kind, message } => format!("[{kind}] {message}"),
    }
}

pub fn format_secs(secs: u64) -> String {
    if secs >= 60 {
        format!("{}:{:02}", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

impl OverlayHost for ConsoleOverlayHost {
    fn create(
        &mut self,
        id: SurfaceId,
        kind: SurfaceKind,
        bounds: Rect,
        content: &OverlayContent,
    ) -> Result<(), OverlayError> {
        debug!(surface = id.0, ?kind, ?bounds, "create surface");
        match kind {
            SurfaceKind::BreakOverlay { display } => {
                self.print(format!("[display {display}] {}", describe(content)))
            }
            _ => self.print(describe(content)),
        }
        Ok(())
    }

    fn render(&mut self, id: SurfaceId, content: &OverlayContent) {
        debug!(surface = id.0, "render surface");
        self.print(describe(content));
    }

    fn move_to(&mut self, id: SurfaceId, bounds: Rect) {
        debug!(surface = id.0, ?bounds, "move surface");
    }

    fn disable_input(&mut self, _id: SurfaceId) {}

    fn detach_content(&mut self, _id: SurfaceId) {}

    fn release(&mut self, id: SurfaceId) {
        debug!(surface = id.0, "release surface");
    }
}

/// Rings the terminal bell and prints the reminder.
#[derive(Debug, Default)]
pub struct BellNotifier;

impl Notifier for BellNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), CoreError> {
        use std::io::Write;
        let mut stderr = std::io::stderr();
        writeln!(stderr, "\x07{title}: {body}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_are_formatted_for_humans() {
        assert_eq!(format_secs(9), "9s");
        assert_eq!(format_secs(60), "1:00");
        assert_eq!(format_secs(1205), "20:05");
    }
}
