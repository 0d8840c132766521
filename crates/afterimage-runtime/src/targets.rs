use afterimage_core::{EngineError, Size};

use crate::runtime_contract::{FrameDevice, SurfaceKind};
use crate::shade::NEUTRAL;

/// Ping-pong pair of history surfaces.
///
/// Semantics:
/// - `write_target()` is the surface this frame's accumulation renders into
/// - `read_source()` is last frame's result, sampled as "previous"
/// - after both passes complete, call `flip()`; `read_source()` is then the surface
///   that was just written
#[derive(Debug)]
pub struct HistoryPair<S> {
    surfaces: [S; 2],
    index: usize,
}

impl<S> HistoryPair<S> {
    pub fn new(a: S, b: S) -> Self {
        Self {
            surfaces: [a, b],
            index: 0,
        }
    }

    /// Current ping-pong index (the write slot).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn write_target(&self) -> &S {
        &self.surfaces[self.index]
    }

    pub fn read_source(&self) -> &S {
        &self.surfaces[1 - self.index]
    }

    /// Surface in `slot` (0 or 1), independent of the current index.
    pub fn get(&self, slot: usize) -> Option<&S> {
        self.surfaces.get(slot)
    }

    pub fn flip(&mut self) {
        self.index = 1 - self.index;
    }

    fn into_surfaces(self) -> [S; 2] {
        self.surfaces
    }
}

/// One generation of GPU surfaces: the capture target plus both history targets.
///
/// All three share `size`. A resize never mutates a generation; the scheduler destroys
/// it and allocates a new one.
#[derive(Debug)]
pub struct RenderTargets<S> {
    size: Size,
    capture: S,
    history: HistoryPair<S>,
}

impl<S> RenderTargets<S> {
    /// Allocate a full generation at `size` and clear both history surfaces to
    /// opaque black.
    ///
    /// On failure every surface created so far is released before returning.
    pub fn allocate<D>(device: &mut D, size: Size) -> Result<Self, EngineError>
    where
        D: FrameDevice<Surface = S>,
    {
        if size.is_empty() {
            return Err(EngineError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }

        let capture = device.create_surface(size, SurfaceKind::Capture)?;
        let h0 = match device.create_surface(size, SurfaceKind::History) {
            Ok(s) => s,
            Err(e) => {
                device.destroy_surface(capture);
                return Err(e);
            }
        };
        let h1 = match device.create_surface(size, SurfaceKind::History) {
            Ok(s) => s,
            Err(e) => {
                device.destroy_surface(h0);
                device.destroy_surface(capture);
                return Err(e);
            }
        };

        // Avoid sampling undefined memory as "history" on the first accumulation.
        let neutral = NEUTRAL.to_array();
        device.clear_surface(&h0, neutral);
        device.clear_surface(&h1, neutral);

        Ok(Self {
            size,
            capture,
            history: HistoryPair::new(h0, h1),
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn capture(&self) -> &S {
        &self.capture
    }

    pub fn history(&self) -> &HistoryPair<S> {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryPair<S> {
        &mut self.history
    }

    /// Release every surface of this generation.
    pub fn destroy<D>(self, device: &mut D)
    where
        D: FrameDevice<Surface = S>,
    {
        let [h0, h1] = self.history.into_surfaces();
        device.destroy_surface(self.capture);
        device.destroy_surface(h0);
        device.destroy_surface(h1);
    }
}
