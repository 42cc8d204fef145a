//! Access-code arbitration.
//!
//! Human code entry is slow and blocking; the monitoring tick is not. The
//! arbiter serializes code entry by keeping at most one request in flight:
//! [`AccessCodeArbiter::request_code`] spawns a worker that blocks on a
//! [`CodePrompt`], and the monitoring loop drains the result with a
//! non-blocking [`AccessCodeArbiter::poll`] once per tick.
//!
//! The worker is not forcibly cancellable (there is no API to abort an
//! in-progress human input); a new request is simply refused while one is
//! outstanding.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

/// What a pending code entry will be resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodePurpose {
    /// Enter or leave defense mode.
    DefenseToggle,
    /// Silence an active alarm and accept the new scene as baseline.
    AlarmAcknowledge,
}

impl CodePurpose {
    pub fn describe(&self) -> &'static str {
        match self {
            CodePurpose::DefenseToggle => "defense mode toggle",
            CodePurpose::AlarmAcknowledge => "alarm acknowledgment",
        }
    }
}

/// Blocking source of raw access-code text.
///
/// The daemon wires this to stdin; tests feed canned strings through a
/// channel.
pub trait CodePrompt: Send + Sync {
    fn read_code(&self, purpose: CodePurpose) -> Result<String>;
}

/// A resolved request: purpose plus the raw text the operator typed.
/// Correctness is judged by the caller, not the arbiter.
#[derive(Clone, Debug)]
pub struct ResolvedCode {
    pub purpose: CodePurpose,
    pub code: String,
}

#[derive(Debug)]
struct PendingCodeRequest {
    purpose: CodePurpose,
    created_at: Instant,
}

/// Single-slot code-entry arbiter.
pub struct AccessCodeArbiter {
    prompt: Arc<dyn CodePrompt>,
    pending: Option<PendingCodeRequest>,
    slot: Option<Receiver<Result<String>>>,
}

impl AccessCodeArbiter {
    pub fn new(prompt: Arc<dyn CodePrompt>) -> Self {
        Self {
            prompt,
            pending: None,
            slot: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ask the operator for a code. Returns `false` (leaving the original
    /// request untouched) when a request is already in flight.
    pub fn request_code(&mut self, purpose: CodePurpose) -> bool {
        if let Some(pending) = &self.pending {
            log::warn!(
                "code entry busy: {} still pending ({}s old), refusing {}",
                pending.purpose.describe(),
                pending.created_at.elapsed().as_secs(),
                purpose.describe()
            );
            return false;
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let prompt = Arc::clone(&self.prompt);
        let spawned = std::thread::Builder::new()
            .name("code-entry".to_string())
            .spawn(move || {
                let result = prompt.read_code(purpose);
                // The arbiter may have been dropped; a dead receiver is fine.
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            log::error!("failed to spawn code-entry worker: {e}");
            return false;
        }

        self.pending = Some(PendingCodeRequest {
            purpose,
            created_at: Instant::now(),
        });
        self.slot = Some(rx);
        true
    }

    /// Non-blocking: returns the resolved request once the worker finished.
    /// The pending slot is cleared on resolution regardless of whether the
    /// typed code turns out to be correct.
    pub fn poll(&mut self) -> Option<ResolvedCode> {
        let rx = self.slot.as_ref()?;
        match rx.try_recv() {
            Ok(Ok(code)) => {
                let pending = self.clear_slot()?;
                Some(ResolvedCode {
                    purpose: pending.purpose,
                    code,
                })
            }
            Ok(Err(e)) => {
                log::warn!("code prompt failed: {e}");
                self.clear_slot();
                None
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("code-entry worker exited without a result");
                self.clear_slot();
                None
            }
        }
    }

    fn clear_slot(&mut self) -> Option<PendingCodeRequest> {
        self.slot = None;
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Prompt fed by a channel, so tests control when the "operator" types.
    struct ChannelPrompt {
        rx: Mutex<Receiver<String>>,
    }

    fn channel_prompt() -> (Sender<String>, Arc<ChannelPrompt>) {
        let (tx, rx) = mpsc::channel();
        (tx, Arc::new(ChannelPrompt { rx: Mutex::new(rx) }))
    }

    impl CodePrompt for ChannelPrompt {
        fn read_code(&self, _purpose: CodePurpose) -> Result<String> {
            let rx = self.rx.lock().unwrap();
            Ok(rx.recv()?)
        }
    }

    fn poll_until_resolved(arbiter: &mut AccessCodeArbiter) -> ResolvedCode {
        for _ in 0..200 {
            if let Some(resolved) = arbiter.poll() {
                return resolved;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("arbiter did not resolve in time");
    }

    #[test]
    fn second_request_is_refused_while_pending() {
        let (tx, prompt) = channel_prompt();
        let mut arbiter = AccessCodeArbiter::new(prompt);

        assert!(arbiter.request_code(CodePurpose::DefenseToggle));
        assert!(arbiter.is_pending());
        assert!(!arbiter.request_code(CodePurpose::AlarmAcknowledge));

        // The original request is unaffected and still resolves.
        tx.send("123".to_string()).unwrap();
        let resolved = poll_until_resolved(&mut arbiter);
        assert_eq!(resolved.purpose, CodePurpose::DefenseToggle);
        assert_eq!(resolved.code, "123");
        assert!(!arbiter.is_pending());
    }

    #[test]
    fn poll_is_nonblocking_while_worker_waits() {
        let (_tx, prompt) = channel_prompt();
        let mut arbiter = AccessCodeArbiter::new(prompt);

        assert!(arbiter.request_code(CodePurpose::AlarmAcknowledge));
        assert!(arbiter.poll().is_none());
        assert!(arbiter.is_pending());
    }

    #[test]
    fn slot_clears_after_resolution_and_accepts_new_requests() {
        let (tx, prompt) = channel_prompt();
        let mut arbiter = AccessCodeArbiter::new(prompt);

        assert!(arbiter.request_code(CodePurpose::DefenseToggle));
        tx.send("wrong".to_string()).unwrap();
        let resolved = poll_until_resolved(&mut arbiter);
        // Cleared regardless of correctness; a fresh request is accepted.
        assert_eq!(resolved.code, "wrong");
        assert!(arbiter.request_code(CodePurpose::DefenseToggle));
        tx.send("123".to_string()).unwrap();
        assert_eq!(poll_until_resolved(&mut arbiter).code, "123");
    }

    #[test]
    fn dropped_prompt_channel_clears_pending_slot() {
        let (tx, prompt) = channel_prompt();
        let mut arbiter = AccessCodeArbiter::new(prompt);

        assert!(arbiter.request_code(CodePurpose::DefenseToggle));
        drop(tx);

        for _ in 0..200 {
            arbiter.poll();
            if !arbiter.is_pending() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!arbiter.is_pending());
    }
}
