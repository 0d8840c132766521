//! CPU implementation of [`FrameDevice`].
//!
//! Runs the reference shading math per pixel over `f32` RGBA images. It exists so the
//! scheduler and both passes can be exercised headlessly; it is not meant to be fast.
//! Surfaces are clamped to [0, 1] on write, matching an RGBA8 UNORM target.

use afterimage_core::{EngineError, Size};
use glam::{vec2, Vec2, Vec4};
use tracing::debug;

use crate::runtime_contract::{AccumulatePass, FrameDevice, OutputPass, SurfaceKind};
use crate::shade;

/// Contents of a freshly created surface before anyone writes it.
///
/// Real GPU memory is undefined at this point; a loud color makes reads visible.
pub const UNDEFINED: Vec4 = Vec4::new(1.0, 0.0, 1.0, 0.0);

/// Row-major RGBA image; row 0 is the bottom row (GL convention).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    size: Size,
    pixels: Vec<Vec4>,
}

impl Image {
    pub fn new(size: Size, fill: Vec4) -> Self {
        Self {
            size,
            pixels: vec![fill; size.area()],
        }
    }

    pub fn from_fn(size: Size, mut f: impl FnMut(usize, usize) -> Vec4) -> Self {
        let mut pixels = Vec::with_capacity(size.area());
        for y in 0..size.height.max(0) as usize {
            for x in 0..size.width.max(0) as usize {
                pixels.push(f(x, y));
            }
        }
        Self { size, pixels }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn get(&self, x: usize, y: usize) -> Vec4 {
        self.pixels[y * self.size.width as usize + x]
    }

    pub fn set(&mut self, x: usize, y: usize, v: Vec4) {
        let w = self.size.width as usize;
        self.pixels[y * w + x] = v;
    }

    pub fn fill(&mut self, v: Vec4) {
        self.pixels.iter_mut().for_each(|p| *p = v);
    }

    /// Texel fetch with clamp-to-edge.
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.size.width - 1) as usize;
        let y = y.clamp(0, self.size.height - 1) as usize;
        self.get(x, y)
    }

    /// Bilinear sample at normalized `uv` with clamp-to-edge.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.size.width as f32 - 0.5;
        let y = uv.y * self.size.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), fx);
        let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), fx);
        top.lerp(bottom, fy)
    }

    /// Window coordinate of the center of pixel `(x, y)`.
    pub fn pixel_center(x: usize, y: usize) -> Vec2 {
        vec2(x as f32 + 0.5, y as f32 + 0.5)
    }

    /// Largest per-channel absolute difference against `other` (same size required).
    pub fn max_abs_diff(&self, other: &Image) -> f32 {
        assert_eq!(self.size, other.size, "image sizes differ");
        self.pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f32::max)
    }
}

fn unorm(v: Vec4) -> Vec4 {
    v.clamp(Vec4::ZERO, Vec4::ONE)
}

/// Handle to a software surface.
#[derive(Debug, PartialEq, Eq)]
pub struct SurfaceId(usize);

impl SurfaceId {
    /// Storage slot. Slots are reused after a surface is destroyed.
    pub fn slot(&self) -> usize {
        self.0
    }
}

/// Call counters, for asserting scheduling behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub program_builds: u32,
    pub geometry_uploads: u32,
    pub surfaces_created: u32,
    pub surfaces_destroyed: u32,
    pub clears: u32,
    pub state_resets: u32,
    pub captures: u32,
    pub copy_passes: u32,
    pub blend_passes: u32,
    pub output_passes: u32,
}

#[derive(Debug)]
pub struct SoftwareDevice {
    slots: Vec<Option<Image>>,
    presentation: Image,
    programs_ready: bool,
    geometry_ready: bool,
    /// Remaining successful allocations before one injected failure.
    fail_after: Option<u32>,
    fail_compile: bool,
    counters: DeviceCounters,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            presentation: Image::new(Size::default(), Vec4::ZERO),
            programs_ready: false,
            geometry_ready: false,
            fail_after: None,
            fail_compile: false,
            counters: DeviceCounters::default(),
        }
    }

    /// Replace the presentation framebuffer (the frame "about to be presented").
    pub fn set_presentation(&mut self, image: Image) {
        self.presentation = image;
    }

    pub fn presentation(&self) -> &Image {
        &self.presentation
    }

    pub fn image(&self, surface: &SurfaceId) -> Option<&Image> {
        self.slots.get(surface.0).and_then(Option::as_ref)
    }

    pub fn live_surfaces(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry_ready
    }

    pub fn has_programs(&self) -> bool {
        self.programs_ready
    }

    /// Let `n` more surface allocations succeed, then fail exactly one.
    pub fn fail_allocation_after(&mut self, n: u32) {
        self.fail_after = Some(n);
    }

    /// Make every future `compile_programs` call fail with a link error.
    pub fn fail_shader_compile(&mut self, fail: bool) {
        self.fail_compile = fail;
    }

    fn lookup(&self, surface: &SurfaceId) -> Result<&Image, EngineError> {
        self.image(surface)
            .ok_or_else(|| EngineError::other(format!("unknown surface {}", surface.0)))
    }

    fn take(&mut self, surface: &SurfaceId) -> Result<Image, EngineError> {
        self.slots
            .get_mut(surface.0)
            .and_then(Option::take)
            .ok_or_else(|| EngineError::other(format!("unknown surface {}", surface.0)))
    }

    fn put(&mut self, surface: &SurfaceId, image: Image) {
        self.slots[surface.0] = Some(image);
    }

    fn render_accumulate(
        &self,
        pass: &AccumulatePass<'_, SurfaceId>,
        size: Size,
    ) -> Result<Image, EngineError> {
        let capture = self.lookup(pass.capture)?;
        let previous = self.lookup(pass.previous)?;
        let dims = vec2(size.width as f32, size.height as f32);
        Ok(Image::from_fn(size, |x, y| {
            let pixel = Image::pixel_center(x, y);
            let uv = pixel / dims;
            let curr = capture.sample(uv);
            if pass.copy_only {
                return unorm(curr);
            }
            let hist = previous.sample(shade::history_uv(pass.params, uv));
            unorm(shade::accumulate(pass.params, curr, hist, uv, pixel, false))
        }))
    }
}

impl FrameDevice for SoftwareDevice {
    type Surface = SurfaceId;

    fn compile_programs(&mut self) -> Result<(), EngineError> {
        if self.fail_compile {
            return Err(EngineError::Link("injected link failure".into()));
        }
        self.programs_ready = true;
        self.counters.program_builds += 1;
        Ok(())
    }

    fn destroy_programs(&mut self) {
        self.programs_ready = false;
    }

    fn create_geometry(&mut self) -> Result<(), EngineError> {
        self.geometry_ready = true;
        self.counters.geometry_uploads += 1;
        Ok(())
    }

    fn destroy_geometry(&mut self) {
        self.geometry_ready = false;
    }

    fn create_surface(&mut self, size: Size, kind: SurfaceKind) -> Result<SurfaceId, EngineError> {
        if size.is_empty() {
            return Err(EngineError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                return Err(EngineError::GlCreate(format!(
                    "injected allocation failure ({kind:?} {size})"
                )));
            }
            Some(n) => self.fail_after = Some(n - 1),
            None => {}
        }

        let image = Image::new(size, UNDEFINED);
        let id = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some(image);
                free
            }
            None => {
                self.slots.push(Some(image));
                self.slots.len() - 1
            }
        };
        self.counters.surfaces_created += 1;
        debug!(id, ?kind, %size, "software surface created");
        Ok(SurfaceId(id))
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        if let Some(slot) = self.slots.get_mut(surface.0) {
            if slot.take().is_some() {
                self.counters.surfaces_destroyed += 1;
            }
        }
    }

    fn clear_surface(&mut self, surface: &SurfaceId, rgba: [f32; 4]) {
        if let Some(Some(img)) = self.slots.get_mut(surface.0) {
            img.fill(Vec4::from_array(rgba));
            self.counters.clears += 1;
        }
    }

    fn reset_render_state(&mut self) {
        self.counters.state_resets += 1;
    }

    fn capture_frame(&mut self, source: Size, target: &SurfaceId) -> Result<(), EngineError> {
        if self.presentation.size() != source {
            return Err(EngineError::other(format!(
                "presentation framebuffer is {}, frame reported {source}",
                self.presentation.size()
            )));
        }
        let size = self.lookup(target)?.size();
        let src = &self.presentation;
        let dst = Image::from_fn(size, |x, y| {
            let uv = Image::pixel_center(x, y) / vec2(size.width as f32, size.height as f32);
            unorm(src.sample(uv))
        });
        self.put(target, dst);
        self.counters.captures += 1;
        Ok(())
    }

    fn accumulate(&mut self, pass: AccumulatePass<'_, SurfaceId>) -> Result<(), EngineError> {
        if !self.programs_ready || !self.geometry_ready {
            return Err(EngineError::other("accumulate before initialization"));
        }
        if pass.target == pass.previous || pass.target == pass.capture {
            return Err(EngineError::other("accumulate target aliases an input"));
        }

        let target = self.take(pass.target)?;
        let result = self.render_accumulate(&pass, target.size());
        match result {
            Ok(image) => self.put(pass.target, image),
            Err(e) => {
                self.put(pass.target, target);
                return Err(e);
            }
        }

        if pass.copy_only {
            self.counters.copy_passes += 1;
        } else {
            self.counters.blend_passes += 1;
        }
        Ok(())
    }

    fn output(&mut self, pass: OutputPass<'_, SurfaceId>) -> Result<(), EngineError> {
        if !self.programs_ready || !self.geometry_ready {
            return Err(EngineError::other("output before initialization"));
        }
        if self.presentation.size() != pass.target_size {
            return Err(EngineError::other(format!(
                "presentation framebuffer is {}, output targets {}",
                self.presentation.size(),
                pass.target_size
            )));
        }

        let source = self.lookup(pass.source)?;
        let texel = Vec2::from_array(pass.source_size.texel());
        let size = pass.target_size;
        let dims = vec2(size.width as f32, size.height as f32);
        let presented = Image::from_fn(size, |x, y| {
            let uv = Image::pixel_center(x, y) / dims;
            shade::output(pass.params, |p| source.sample(p), uv, texel, pass.time)
        });
        self.presentation = presented;
        self.counters.output_passes += 1;
        Ok(())
    }
}
