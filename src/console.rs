//! Line-based control console.
//!
//! Reads commands from standard input (`start`, `stop`, `next`, `switch`,
//! `quit`, `help`) and forwards them to the running session. Mistyped
//! commands get a suggestion based on string similarity.

use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::scanner::machine::Control;
use crate::scanner::session::ControlHandle;
use crate::signal::ShutdownHandler;

/// Recognised command words and their aliases.
const COMMANDS: &[(&str, ConsoleCommand)] = &[
    ("start", ConsoleCommand::Control(Control::Start)),
    ("stop", ConsoleCommand::Control(Control::Stop)),
    ("next", ConsoleCommand::Control(Control::ScanNext)),
    ("switch", ConsoleCommand::Control(Control::SwitchCamera)),
    ("quit", ConsoleCommand::Quit),
    ("exit", ConsoleCommand::Quit),
    ("help", ConsoleCommand::Help),
];

pub const HELP_TEXT: &str = "Commands:
  start   start the scanner
  stop    stop the scanner
  next    scan the next attendee
  switch  switch to the next camera
  quit    stop and exit
  help    show this help";

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Control(Control),
    Quit,
    Help,
}

/// An unrecognised command, with the closest known one if any is near.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand {
    pub input: String,
    pub suggestion: Option<&'static str>,
}

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown command '{}'", self.input)?;
        if let Some(suggestion) = self.suggestion {
            write!(f, ". Did you mean '{}'?", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for ConsoleCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().to_ascii_lowercase();
        if let Some((_, command)) = COMMANDS.iter().find(|(name, _)| *name == word) {
            return Ok(*command);
        }
        Err(UnknownCommand {
            suggestion: suggest(&word),
            input: s.trim().to_string(),
        })
    }
}

fn suggest(word: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .map(|(name, _)| (*name, strsim::jaro_winkler(word, name)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name)
}

/// Forward commands read from `input` until `quit` or end of input.
///
/// Both end conditions request shutdown, so a closed stdin ends the session.
pub async fn run_console<R>(input: R, controls: ControlHandle, shutdown: ShutdownHandler)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to read console input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Control(control)) => {
                if !controls.send(control) {
                    break;
                }
            }
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Help) => eprintln!("{}", HELP_TEXT),
            Err(e) => eprintln!("{}", e),
        }
    }
    shutdown.request_shutdown();
}
