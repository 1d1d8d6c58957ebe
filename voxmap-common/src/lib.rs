//! # Voxmap Common Library
//!
//! Shared code for Voxmap services including:
//! - Error types (Error/Result)
//! - Event types (VoxmapEvent enum) and the EventBus
//! - Global tunable parameters (clustering thresholds, batch sizes)
//! - Configuration loading and root folder resolution
//! - Seeded randomness helpers (stable cross-service seed derivation)

pub mod config;
pub mod error;
pub mod events;
pub mod params;
pub mod seed;

pub use error::{Error, Result};
