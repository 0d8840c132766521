#![forbid(unsafe_code)]

//! Backend-agnostic temporal accumulation pipeline.
//!
//! The scheduler decides *when* resources are (re)created and in which order the passes
//! run; a [`FrameDevice`] decides *how*. [`shade`] holds the per-pixel math both the GLSL
//! programs and the software device implement.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod geometry;
pub mod presets;
pub mod runtime_contract;
pub mod scheduler;
pub mod shade;
pub mod software;
pub mod targets;

pub use presets::{preset_from_str, Preset};
pub use runtime_contract::{AccumulatePass, FrameDevice, OutputPass, SurfaceKind};
pub use scheduler::{FrameOutcome, PassThroughReason, Pipeline, PipelineStats, SchedulerState};
pub use software::{Image, SoftwareDevice};
pub use targets::{HistoryPair, RenderTargets};
