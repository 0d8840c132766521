//! Host glue (policy layer).
//!
//! [`PresentHook`] is what a windowing host, or an interception shim, calls right before
//! its swap-buffers call. It owns the policy the core deliberately leaves out: the
//! minimum-width gate and reentrancy protection.

use std::cell::RefCell;

use afterimage_core::PipelineConfig;
use afterimage_runtime::{FrameDevice, FrameOutcome, Pipeline};
use tracing::{trace, warn};

/// Frames this wide or narrower are left alone (splash screens, tiny overlays).
pub const DEFAULT_MIN_WIDTH: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BelowMinWidth,
    /// Called again while a frame was already being processed.
    Reentrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The pipeline was not invoked; the frame is presented as the host drew it.
    Skipped(SkipReason),
    Frame(FrameOutcome),
}

impl HookOutcome {
    pub fn is_processed(self) -> bool {
        matches!(self, HookOutcome::Frame(f) if f.is_processed())
    }
}

/// Adapter between an "about to present" event and [`Pipeline::present_frame`].
#[derive(Debug)]
pub struct PresentHook<D: FrameDevice> {
    pipeline: RefCell<Pipeline<D>>,
    min_width: i32,
}

impl<D: FrameDevice> PresentHook<D> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_min_width(config, DEFAULT_MIN_WIDTH)
    }

    pub fn with_min_width(config: PipelineConfig, min_width: i32) -> Self {
        Self {
            pipeline: RefCell::new(Pipeline::new(config)),
            min_width,
        }
    }

    pub fn min_width(&self) -> i32 {
        self.min_width
    }

    /// Process the frame about to be presented. Presentation proceeds afterwards no
    /// matter what this returns.
    pub fn before_present(&self, device: &mut D, width: i32, height: i32) -> HookOutcome {
        if width <= self.min_width {
            trace!(width, min = self.min_width, "frame below minimum width");
            return HookOutcome::Skipped(SkipReason::BelowMinWidth);
        }
        let Ok(mut pipeline) = self.pipeline.try_borrow_mut() else {
            warn!(width, height, "reentrant present call, passing frame through");
            return HookOutcome::Skipped(SkipReason::Reentrant);
        };
        HookOutcome::Frame(pipeline.present_frame(device, width, height))
    }

    /// Run `f` against the pipeline (config changes, stats). Frames presented from
    /// inside `f` are treated as reentrant.
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&mut Pipeline<D>) -> R) -> R {
        f(&mut self.pipeline.borrow_mut())
    }

    /// Release all pipeline resources. Call while the context is still current.
    pub fn shutdown(&self, device: &mut D) {
        self.pipeline.borrow_mut().destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterimage_core::Size;
    use afterimage_runtime::shade::gray;
    use afterimage_runtime::{Image, SoftwareDevice};

    fn device(w: i32, h: i32) -> SoftwareDevice {
        let mut dev = SoftwareDevice::new();
        dev.set_presentation(Image::new(Size::new(w, h), gray(0.4)));
        dev
    }

    #[test]
    fn narrow_frames_are_skipped() {
        let hook = PresentHook::new(PipelineConfig::default());
        let mut dev = device(100, 80);
        assert_eq!(
            hook.before_present(&mut dev, 100, 80),
            HookOutcome::Skipped(SkipReason::BelowMinWidth)
        );
        assert_eq!(dev.counters().surfaces_created, 0);
    }

    #[test]
    fn wide_frames_reach_the_pipeline() {
        let hook = PresentHook::new(PipelineConfig::default());
        let mut dev = device(101, 80);
        assert!(hook.before_present(&mut dev, 101, 80).is_processed());
        hook.with_pipeline(|p| assert_eq!(p.stats().frames_processed, 1));
    }

    #[test]
    fn nested_call_passes_through() {
        let hook = PresentHook::new(PipelineConfig::default());
        let mut dev = device(200, 100);
        let nested = hook.with_pipeline(|_| hook.before_present(&mut dev, 200, 100));
        assert_eq!(nested, HookOutcome::Skipped(SkipReason::Reentrant));
        assert_eq!(dev.counters().captures, 0);
    }

    #[test]
    fn shutdown_releases_surfaces() {
        let hook = PresentHook::new(PipelineConfig::default());
        let mut dev = device(200, 100);
        hook.before_present(&mut dev, 200, 100);
        assert_eq!(dev.live_surfaces(), 3);
        hook.shutdown(&mut dev);
        assert_eq!(dev.live_surfaces(), 0);
    }
}
