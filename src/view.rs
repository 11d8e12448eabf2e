//! Output surfaces for the scanner.
//!
//! [`ScannerView`] is everything the scanner needs from its host page: a
//! status line, a result panel and the start/stop/scan-next controls.
//! [`TerminalView`] implements it for the command line: coloured status
//! lines, plain-text result cards, and optionally the current HTML card
//! mirrored to a file for a browser or kiosk display to pick up.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use yansi::{Paint, Style};

use crate::render::{render_text, ResultKind, StatusLevel};
use crate::scanner::machine::Controls;
use crate::scanner::verdict::ScanVerdict;

/// Host surface driven by the scanner session.
pub trait ScannerView: Send {
    /// Replace the single-line status indicator.
    fn set_status(&mut self, message: &str, level: StatusLevel);

    /// Show a verdict. `html` is the rendered card (empty if rendering failed).
    fn show_result(&mut self, verdict: &ScanVerdict, html: &str);

    /// Hide the result panel.
    fn hide_result(&mut self);

    /// Reflect which controls are usable.
    fn set_controls(&mut self, controls: Controls);
}

/// [`ScannerView`] writing to a terminal.
pub struct TerminalView<W: Write + Send> {
    out: W,
    color: bool,
    html_out: Option<PathBuf>,
    controls: Option<Controls>,
}

impl TerminalView<io::Stdout> {
    /// View on standard output.
    #[must_use]
    pub fn stdout(color: bool, html_out: Option<PathBuf>) -> Self {
        Self::new(io::stdout(), color, html_out)
    }
}

impl<W: Write + Send> TerminalView<W> {
    /// View on an arbitrary writer.
    #[must_use]
    pub fn new(out: W, color: bool, html_out: Option<PathBuf>) -> Self {
        Self {
            out,
            color,
            html_out,
            controls: None,
        }
    }

    /// Consume the view and return the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn status_style(level: StatusLevel) -> Style {
        match level {
            StatusLevel::Info => Style::new().cyan(),
            StatusLevel::Success => Style::new().green(),
            StatusLevel::Warning => Style::new().yellow(),
            StatusLevel::Error => Style::new().red().bold(),
        }
    }

    fn result_style(kind: ResultKind) -> Style {
        match kind {
            ResultKind::Success => Style::new().green(),
            ResultKind::Warning => Style::new().yellow(),
            ResultKind::Error => Style::new().red(),
        }
    }

    fn write_line(&mut self, text: &str, style: Style) {
        let result = if self.color {
            writeln!(self.out, "{}", text.paint(style))
        } else {
            writeln!(self.out, "{}", text)
        };
        if let Err(e) = result.and_then(|()| self.out.flush()) {
            log::warn!("Failed to write to terminal: {}", e);
        }
    }

    fn mirror_html(&self, html: &str) {
        if let Some(path) = &self.html_out {
            if let Err(e) = fs::write(path, html) {
                log::warn!("Failed to write result card to {}: {}", path.display(), e);
            }
        }
    }
}

impl<W: Write + Send> ScannerView for TerminalView<W> {
    fn set_status(&mut self, message: &str, level: StatusLevel) {
        let line = if self.color {
            message.to_string()
        } else {
            format!("[{}] {}", level, message)
        };
        self.write_line(&line, Self::status_style(level));
    }

    fn show_result(&mut self, verdict: &ScanVerdict, html: &str) {
        let style = Self::result_style(ResultKind::from(verdict));
        for line in render_text(verdict).lines() {
            self.write_line(line, style);
        }
        self.mirror_html(html);
    }

    fn hide_result(&mut self) {
        self.mirror_html("");
    }

    fn set_controls(&mut self, controls: Controls) {
        if self.controls == Some(controls) {
            return;
        }
        log::debug!("Controls: {:?}", controls);
        self.controls = Some(controls);
        if controls.scan_next_visible {
            self.write_line("Type 'next' to scan the next attendee.", Style::new().dim());
        }
    }
}
