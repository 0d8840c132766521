//! The contract between the frame scheduler and a graphics backend.
//!
//! The scheduler never touches GL directly. Everything it needs from the graphics
//! subsystem goes through [`FrameDevice`], which lets the same scheduling logic run on
//! the glow backend in production and on [`crate::software::SoftwareDevice`] in tests.

use afterimage_core::{AccumulateConfig, EngineError, OutputConfig, Size};

/// What a surface is used for. Backends may use this for labels/logging only; all
/// kinds share format, filtering (linear) and wrap mode (clamp-to-edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Downsampled copy of the presentation framebuffer.
    Capture,
    /// One half of the ping-pong accumulation pair.
    History,
}

/// Inputs of the temporal accumulation pass.
#[derive(Debug)]
pub struct AccumulatePass<'a, S> {
    pub capture: &'a S,
    pub previous: &'a S,
    pub target: &'a S,
    /// Internal resolution; all three surfaces have this size.
    pub size: Size,
    pub params: &'a AccumulateConfig,
    /// Skip blending and write `capture` verbatim.
    pub copy_only: bool,
}

/// Inputs of the sharpen/grade pass that writes the presentation framebuffer.
#[derive(Debug)]
pub struct OutputPass<'a, S> {
    pub source: &'a S,
    pub source_size: Size,
    pub target_size: Size,
    pub params: &'a OutputConfig,
    /// Seconds since the pipeline's clock origin.
    pub time: f32,
}

/// Graphics operations the pipeline needs.
///
/// Contract:
/// - every call happens on the thread that owns the graphics context
/// - `create_*` must either fully succeed or release whatever it created
/// - `capture_frame` reads the presentation framebuffer; only `output` writes it
/// - no call may leave the presentation framebuffer partially written on error
pub trait FrameDevice {
    type Surface: std::fmt::Debug;

    /// Compile and link both programs. Called once per device.
    fn compile_programs(&mut self) -> Result<(), EngineError>;
    fn destroy_programs(&mut self);

    /// Upload the full-screen quad.
    fn create_geometry(&mut self) -> Result<(), EngineError>;
    fn destroy_geometry(&mut self);

    fn create_surface(&mut self, size: Size, kind: SurfaceKind)
        -> Result<Self::Surface, EngineError>;
    fn destroy_surface(&mut self, surface: Self::Surface);
    fn clear_surface(&mut self, surface: &Self::Surface, rgba: [f32; 4]);

    /// Disable scissor, depth and blend state before full-screen passes. Nothing is
    /// restored afterwards; the host re-establishes its own state.
    fn reset_render_state(&mut self);

    /// Linear downsample of the presentation framebuffer (`source` pixels) into `target`.
    fn capture_frame(&mut self, source: Size, target: &Self::Surface) -> Result<(), EngineError>;

    fn accumulate(&mut self, pass: AccumulatePass<'_, Self::Surface>) -> Result<(), EngineError>;

    fn output(&mut self, pass: OutputPass<'_, Self::Surface>) -> Result<(), EngineError>;
}
