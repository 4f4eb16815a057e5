// src/session/mod.rs

pub mod engine;
pub mod error;
pub mod registry;
pub mod scoring;

pub use engine::{ExamSession, SessionEvent, SessionSnapshot, SessionStatus, TimerEvent};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use scoring::{GradedAnswer, GradedResult};
