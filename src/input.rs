//! Operator input routing.
//!
//! One reader thread owns the operator terminal. Each line is routed to one
//! of two consumers: single-key command lines go to the monitoring loop's
//! command feed, and raw lines go to the arbiter's code-entry worker instead
//! while a code prompt is outstanding. The switch is the `awaiting` flag set
//! by [`RoutedPrompt::read_code`], so the monitoring loop never steals an
//! access code as if it were a command.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::arbiter::{CodePrompt, CodePurpose};

/// Operator command surface: four single-key commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    SetBaseline,
    RequestDefenseToggle,
    RequestAlarmAcknowledge,
}

impl Command {
    /// Reference key bindings: q / b / d / a.
    pub fn from_key(key: &str) -> Option<Command> {
        match key {
            "q" => Some(Command::Quit),
            "b" => Some(Command::SetBaseline),
            "d" => Some(Command::RequestDefenseToggle),
            "a" => Some(Command::RequestAlarmAcknowledge),
            _ => None,
        }
    }
}

/// Non-blocking command feed drained once per tick.
pub struct CommandFeed {
    rx: Receiver<Command>,
}

impl CommandFeed {
    pub fn try_next(&self) -> Option<Command> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Code prompt backed by the input router. The arbiter's worker blocks here
/// until the operator types a line.
pub struct RoutedPrompt {
    awaiting: Arc<AtomicBool>,
    codes: Mutex<Receiver<String>>,
}

impl CodePrompt for RoutedPrompt {
    fn read_code(&self, purpose: CodePurpose) -> Result<String> {
        eprintln!("\n--- ENTER ACCESS CODE ({}) ---", purpose.describe());
        eprintln!(">>> type the access code and press enter <<<");
        self.awaiting.store(true, Ordering::Release);
        let result = {
            let codes = self
                .codes
                .lock()
                .map_err(|_| anyhow!("code channel lock poisoned"))?;
            codes.recv().map_err(|_| anyhow!("operator input closed"))
        };
        self.awaiting.store(false, Ordering::Release);
        eprintln!("--- back to monitoring ---");
        result
    }
}

/// Spawn the reader thread over an operator terminal.
pub fn spawn_router<R>(reader: R) -> (CommandFeed, Arc<RoutedPrompt>)
where
    R: BufRead + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (code_tx, code_rx) = mpsc::channel();
    let awaiting = Arc::new(AtomicBool::new(false));

    let routing_flag = Arc::clone(&awaiting);
    let spawned = std::thread::Builder::new()
        .name("operator-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else {
                    break;
                };
                route_line(line.trim(), &routing_flag, &cmd_tx, &code_tx);
            }
            // Reader closed; both channels drop and consumers see Disconnected.
        });
    if let Err(e) = spawned {
        log::error!("failed to spawn operator-input thread: {e}");
    }

    (
        CommandFeed { rx: cmd_rx },
        Arc::new(RoutedPrompt {
            awaiting,
            codes: Mutex::new(code_rx),
        }),
    )
}

fn route_line(
    line: &str,
    awaiting: &AtomicBool,
    cmd_tx: &Sender<Command>,
    code_tx: &Sender<String>,
) {
    if line.is_empty() {
        return;
    }
    if awaiting.load(Ordering::Acquire) {
        let _ = code_tx.send(line.to_string());
        return;
    }
    match Command::from_key(line) {
        Some(command) => {
            let _ = cmd_tx.send(command);
        }
        None => log::info!("ignoring unrecognized input '{line}' (keys: q, b, d, a)"),
    }
}
