#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

//! Shared vocabulary for the afterimage crates: errors, sizes and tuning.
//!
//! No GL handles live here.

pub mod config;
pub mod error;
pub mod size;

pub use config::{AccumulateConfig, DifferenceMode, OutputConfig, PipelineConfig};
pub use error::EngineError;
pub use size::Size;
