mod scripted;
mod stub;

pub use scripted::{ScriptedBackend, ScriptedStep};
pub use stub::StubBackend;
