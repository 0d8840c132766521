//! A [`FrameDevice`] that logs every call before delegating to the software device.

use afterimage_core::{EngineError, Size};
use afterimage_runtime::software::SurfaceId;
use afterimage_runtime::{AccumulatePass, FrameDevice, OutputPass, SoftwareDevice, SurfaceKind};

/// Surfaces are recorded by slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompilePrograms,
    DestroyPrograms,
    CreateGeometry,
    DestroyGeometry,
    CreateSurface { size: Size, kind: SurfaceKind },
    DestroySurface(usize),
    ClearSurface { slot: usize, rgba: [f32; 4] },
    ResetRenderState,
    Capture { source: Size, target: usize },
    Accumulate {
        capture: usize,
        previous: usize,
        target: usize,
        size: Size,
        copy_only: bool,
    },
    Output { source: usize, target_size: Size },
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub inner: SoftwareDevice,
    calls: Vec<Call>,
}

impl RecordingDevice {
    pub fn new(inner: SoftwareDevice) -> Self {
        Self {
            inner,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Return and forget everything recorded so far.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn accumulate_calls(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Accumulate { .. }))
            .collect()
    }
}

impl FrameDevice for RecordingDevice {
    type Surface = SurfaceId;

    fn compile_programs(&mut self) -> Result<(), EngineError> {
        self.calls.push(Call::CompilePrograms);
        self.inner.compile_programs()
    }

    fn destroy_programs(&mut self) {
        self.calls.push(Call::DestroyPrograms);
        self.inner.destroy_programs();
    }

    fn create_geometry(&mut self) -> Result<(), EngineError> {
        self.calls.push(Call::CreateGeometry);
        self.inner.create_geometry()
    }

    fn destroy_geometry(&mut self) {
        self.calls.push(Call::DestroyGeometry);
        self.inner.destroy_geometry();
    }

    fn create_surface(&mut self, size: Size, kind: SurfaceKind) -> Result<SurfaceId, EngineError> {
        self.calls.push(Call::CreateSurface { size, kind });
        self.inner.create_surface(size, kind)
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        self.calls.push(Call::DestroySurface(surface.slot()));
        self.inner.destroy_surface(surface);
    }

    fn clear_surface(&mut self, surface: &SurfaceId, rgba: [f32; 4]) {
        self.calls.push(Call::ClearSurface {
            slot: surface.slot(),
            rgba,
        });
        self.inner.clear_surface(surface, rgba);
    }

    fn reset_render_state(&mut self) {
        self.calls.push(Call::ResetRenderState);
        self.inner.reset_render_state();
    }

    fn capture_frame(&mut self, source: Size, target: &SurfaceId) -> Result<(), EngineError> {
        self.calls.push(Call::Capture {
            source,
            target: target.slot(),
        });
        self.inner.capture_frame(source, target)
    }

    fn accumulate(&mut self, pass: AccumulatePass<'_, SurfaceId>) -> Result<(), EngineError> {
        self.calls.push(Call::Accumulate {
            capture: pass.capture.slot(),
            previous: pass.previous.slot(),
            target: pass.target.slot(),
            size: pass.size,
            copy_only: pass.copy_only,
        });
        self.inner.accumulate(pass)
    }

    fn output(&mut self, pass: OutputPass<'_, SurfaceId>) -> Result<(), EngineError> {
        self.calls.push(Call::Output {
            source: pass.source.slot(),
            target_size: pass.target_size,
        });
        self.inner.output(pass)
    }
}
