//! Per-frame orchestration: resource validity, pass order, ping-pong flip.

use std::time::Instant;

use afterimage_core::{EngineError, PipelineConfig, Size};
use tracing::{debug, error, info, trace, warn};

use crate::runtime_contract::{AccumulatePass, FrameDevice, OutputPass};
use crate::targets::RenderTargets;

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No resources for the current size; the next frame (re)initializes.
    Uninitialized,
    /// Resources match the last seen size.
    Ready,
    /// Shaders failed to build. Every frame passes through untouched.
    Disabled,
}

/// Why a frame was presented without enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    /// Zero/negative surface size, or one that scales to an empty internal size.
    InvalidSize,
    /// Surface or geometry allocation failed; retried on the next frame.
    Allocation,
    /// The pipeline is disabled after a shader build failure.
    Disabled,
    /// A pass failed on the device.
    Device,
}

/// Result of one `present_frame` call. Nothing here requires action from the caller;
/// presentation always proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Processed { reinitialized: bool },
    PassThrough(PassThroughReason),
}

impl FrameOutcome {
    pub fn is_processed(self) -> bool {
        matches!(self, FrameOutcome::Processed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_passed_through: u64,
    /// Successful (re)initializations, the first one included.
    pub reallocations: u64,
}

/// The temporal post-processing pipeline for one graphics context.
///
/// The device is passed into every call rather than stored, so the host keeps full
/// ownership of its graphics context.
#[derive(Debug)]
pub struct Pipeline<D: FrameDevice> {
    config: PipelineConfig,
    state: SchedulerState,
    output_size: Option<Size>,
    internal_size: Size,
    first_frame: bool,
    programs_ready: bool,
    geometry_ready: bool,
    targets: Option<RenderTargets<D::Surface>>,
    clock_origin: Instant,
    stats: PipelineStats,
}

impl<D: FrameDevice> Pipeline<D> {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Uninitialized,
            output_size: None,
            internal_size: Size::default(),
            first_frame: true,
            programs_ready: false,
            geometry_ready: false,
            targets: None,
            clock_origin: Instant::now(),
            stats: PipelineStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replace the tuning. A scale change forces reallocation on the next frame; any
    /// other change takes effect on the next frame's uniforms.
    pub fn set_config(&mut self, config: PipelineConfig) {
        if config.scale != self.config.scale && self.state == SchedulerState::Ready {
            debug!(old = self.config.scale, new = config.scale, "scale changed, reinitializing");
            self.state = SchedulerState::Uninitialized;
        }
        self.config = config;
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn output_size(&self) -> Option<Size> {
        self.output_size
    }

    pub fn internal_size(&self) -> Size {
        self.internal_size
    }

    pub fn is_first_frame(&self) -> bool {
        self.first_frame
    }

    /// Write slot of the ping-pong pair, if resources exist.
    pub fn history_index(&self) -> Option<usize> {
        self.targets.as_ref().map(|t| t.history().index())
    }

    pub fn targets(&self) -> Option<&RenderTargets<D::Surface>> {
        self.targets.as_ref()
    }

    /// The entry point: a frame of `width` x `height` is about to be presented.
    ///
    /// Never fails; on any problem the presentation framebuffer is left untouched and a
    /// pass-through outcome is returned.
    pub fn present_frame(&mut self, device: &mut D, width: i32, height: i32) -> FrameOutcome {
        let time = self.clock_origin.elapsed().as_secs_f32();
        self.present_frame_at(device, width, height, time)
    }

    /// [`Self::present_frame`] with an explicit time (seconds since clock origin).
    pub fn present_frame_at(
        &mut self,
        device: &mut D,
        width: i32,
        height: i32,
        time: f32,
    ) -> FrameOutcome {
        let outcome = self.run_frame(device, Size::new(width, height), time);
        match outcome {
            FrameOutcome::Processed { .. } => self.stats.frames_processed += 1,
            FrameOutcome::PassThrough(_) => self.stats.frames_passed_through += 1,
        }
        outcome
    }

    fn run_frame(&mut self, device: &mut D, output: Size, time: f32) -> FrameOutcome {
        if self.state == SchedulerState::Disabled {
            return FrameOutcome::PassThrough(PassThroughReason::Disabled);
        }

        let internal = output.scaled(self.config.scale);
        if output.is_empty() || internal.is_empty() {
            warn!(%output, %internal, "rejecting frame with degenerate size");
            return FrameOutcome::PassThrough(PassThroughReason::InvalidSize);
        }

        let reinitialized = match self.ensure_resources(device, output) {
            Ok(r) => r,
            Err(err) if err.is_shader_failure() => {
                error!(error = %err, "shader build failed, pipeline disabled");
                self.state = SchedulerState::Disabled;
                return FrameOutcome::PassThrough(PassThroughReason::Disabled);
            }
            Err(err) => {
                warn!(error = %err, %output, "resource allocation failed, passing frame through");
                return FrameOutcome::PassThrough(PassThroughReason::Allocation);
            }
        };

        match self.run_passes(device, output, time) {
            Ok(()) => FrameOutcome::Processed { reinitialized },
            Err(err) => {
                warn!(error = %err, "frame pass failed, passing frame through");
                FrameOutcome::PassThrough(PassThroughReason::Device)
            }
        }
    }

    /// Make resources valid for `output`. Returns `true` if they were (re)created.
    fn ensure_resources(&mut self, device: &mut D, output: Size) -> Result<bool, EngineError> {
        if self.state == SchedulerState::Ready
            && self.output_size == Some(output)
            && self.targets.is_some()
        {
            return Ok(false);
        }

        if !self.programs_ready {
            device.compile_programs()?;
            self.programs_ready = true;
        }

        self.release_frame_resources(device);

        let internal = output.scaled(self.config.scale);
        device.create_geometry()?;
        self.geometry_ready = true;

        let targets = match RenderTargets::allocate(device, internal) {
            Ok(t) => t,
            Err(err) => {
                device.destroy_geometry();
                self.geometry_ready = false;
                return Err(err);
            }
        };

        self.targets = Some(targets);
        self.output_size = Some(output);
        self.internal_size = internal;
        self.first_frame = true;
        self.state = SchedulerState::Ready;
        self.stats.reallocations += 1;

        info!(%output, %internal, scale = self.config.scale, "pipeline initialized");
        Ok(true)
    }

    /// Drop surfaces and geometry. Size bookkeeping is cleared so the next frame retries.
    fn release_frame_resources(&mut self, device: &mut D) {
        if let Some(targets) = self.targets.take() {
            debug!(size = %targets.size(), "releasing render targets");
            targets.destroy(device);
        }
        if self.geometry_ready {
            device.destroy_geometry();
            self.geometry_ready = false;
        }
        self.output_size = None;
        self.internal_size = Size::default();
        self.state = SchedulerState::Uninitialized;
    }

    fn run_passes(&mut self, device: &mut D, output: Size, time: f32) -> Result<(), EngineError> {
        let targets = self
            .targets
            .as_mut()
            .ok_or_else(|| EngineError::other("render targets missing after initialization"))?;
        let internal = targets.size();

        device.reset_render_state();

        // 1. downsample
        device.capture_frame(output, targets.capture())?;

        // 2. accumulate into history[index], reading history[1 - index]
        let copy_only = self.first_frame;
        device.accumulate(AccumulatePass {
            capture: targets.capture(),
            previous: targets.history().read_source(),
            target: targets.history().write_target(),
            size: internal,
            params: &self.config.accumulate,
            copy_only,
        })?;
        self.first_frame = false;

        // 3. sharpen + grade into the presentation framebuffer
        device.output(OutputPass {
            source: targets.history().write_target(),
            source_size: internal,
            target_size: output,
            params: &self.config.output,
            time,
        })?;

        trace!(index = targets.history().index(), copy_only, "frame processed");
        targets.history_mut().flip();
        Ok(())
    }

    /// Release every resource this pipeline created on `device`, programs included.
    ///
    /// Call before the graphics context goes away. The pipeline can be reused
    /// afterwards; the next frame initializes from scratch.
    pub fn destroy(&mut self, device: &mut D) {
        self.release_frame_resources(device);
        if self.programs_ready {
            device.destroy_programs();
            self.programs_ready = false;
        }
        self.first_frame = true;
        info!("pipeline destroyed");
    }
}
