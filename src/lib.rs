//! Presence Guard
//!
//! This crate implements a presence-monitoring guard for a fixed camera: it
//! watches object-detection snapshots of a scene, compares them against a
//! stored baseline inventory, and raises a persistent-deviation alarm that an
//! operator silences with a shared access code.
//!
//! # Architecture
//!
//! The guard maintains a few invariants by construction:
//!
//! 1. **Complementary modes**: `monitoring` is defined as `!defense_mode`;
//!    the two flags can never agree.
//! 2. **Coherent reads**: every multi-field state read happens under one
//!    lock acquisition, so a tick never sees a torn mode/baseline pair.
//! 3. **Single raise**: an alarm fires at most once per deviation window and
//!    never while in defense mode or while another alarm is active.
//! 4. **One code at a time**: code entry is serialized through a single-slot
//!    arbiter; a second request while one is pending is refused, not queued.
//! 5. **Tick isolation**: detection errors, log IO, and capture IO degrade a
//!    single tick, never the primary loop.
//!
//! # Module Structure
//!
//! - `frame`: raw frame container handed from ingestion to detection
//! - `ingest`: camera sources and the bounded-backoff reconnect policy
//! - `detect`: detection provider boundary plus stub/scripted backends
//! - `baseline` / `change`: stored inventory, diffing, persistence timing
//! - `state`: mutex-guarded composite system state
//! - `arbiter` / `input`: access-code entry and operator key routing
//! - `alarm`: siren worker and the alarm-frame hand-off
//! - `activity`: daily JSON activity log and frame captures
//! - `monitor`: the per-tick driver tying the above together

pub mod activity;
pub mod alarm;
pub mod arbiter;
pub mod baseline;
pub mod change;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod input;
pub mod monitor;
pub mod notify;
pub mod state;

pub use activity::{ActivityEvent, ActivityLog, AuthStatus, CaptureStore, EventKind};
pub use alarm::{AlarmCoordinator, NullSiren, Siren, SirenBackend};
#[cfg(feature = "audio-rodio")]
pub use alarm::RodioSiren;
pub use arbiter::{AccessCodeArbiter, CodePrompt, CodePurpose, ResolvedCode};
pub use baseline::{Baseline, BaselineStore};
pub use change::{diff, ChangeRecord, PersistenceTimer};
pub use config::GuardConfig;
pub use detect::{
    count_objects, BoundingBox, CountSnapshot, Detection, Detector, DetectorBackend,
    ScriptedBackend, ScriptedStep, StubBackend,
};
pub use frame::RawFrame;
pub use ingest::{CameraConfig, CameraSource, CameraStats, FramePull, ReconnectPolicy};
pub use input::{spawn_router, Command, CommandFeed, RoutedPrompt};
pub use monitor::{LoopControl, Monitor};
pub use notify::{NotificationSink, RecordingNotifier, TerminalNotifier};
pub use state::{ModeSnapshot, StateStore, TickView};
