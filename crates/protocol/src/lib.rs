//! # vf-protocol
//!
//! Core protocol definitions and data models for videoforge.
//!
//! This crate defines all shared data structures used for:
//! - The pipeline aggregate and its persisted snapshot document
//! - Per-step run state, metrics and scene assets
//! - The run-all state machine snapshot
//! - Operation/Event communication between host and core
//!
//! ## Modules
//!
//! - [`step_models`]: Step identifiers, statuses, metrics
//! - [`scene_models`]: Per-scene asset records and audio timing
//! - [`run_models`]: Run-all state, classified errors, progress
//! - [`pipeline_models`]: The aggregate root and snapshot document
//! - [`ipc`]: Operations and Events for host-core communication
//!
//! ## Design Principles
//!
//! - Minimal dependencies: only serde, ts-rs, uuid and chrono
//! - TypeScript generation: all types derive `TS` for client compatibility
//! - Independent compilation: no dependencies on other videoforge crates

pub mod ipc;
pub mod pipeline_models;
pub mod run_models;
pub mod scene_models;
pub mod step_models;

// Re-export all public types for convenience
pub use ipc::*;
pub use pipeline_models::*;
pub use run_models::*;
pub use scene_models::*;
pub use step_models::*;
