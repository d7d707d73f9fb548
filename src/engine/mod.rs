//! Engine module housing the practice orchestration layer.
//!
//! This module exposes trait-based audio backends (`backend`) and the
//! `PracticeEngine` handle (`core`) used by the CLI and integration tests.

pub mod backend;
pub mod core;

pub use backend::{AudioBackend, AudioSession, CpalBackend, EngineStartContext, StubBackend};
pub use self::core::PracticeEngine;
