//! Audible scan cue.
//!
//! The cue is best-effort: callers ignore failures, and a missing or muted
//! output is never an error the user sees.

use std::io::{self, Write};

/// Plays a short cue when a code is accepted.
pub trait Beeper: Send {
    /// Play the cue once.
    fn beep(&mut self) -> io::Result<()>;
}

/// Rings the terminal bell on standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Beeper for TerminalBell {
    fn beep(&mut self) -> io::Result<()> {
        let mut stderr = io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()
    }
}

/// No cue at all (`--no-beep`).
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Beeper for Silent {
    fn beep(&mut self) -> io::Result<()> {
        Ok(())
    }
}
