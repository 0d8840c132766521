use std::rc::Rc;

use glow::HasContext;
use tracing::{debug, info};

use afterimage_core::{EngineError, Size};
use afterimage_runtime::{AccumulatePass, FrameDevice, OutputPass, SurfaceKind};

use crate::shaders::{GlslDialect, ACCUMULATE_FRAG, OUTPUT_FRAG, QUAD_VERT};
use crate::{compile_program, create_render_target, QuadMesh, RenderTarget};

#[derive(Debug)]
struct Programs {
    accumulate: glow::NativeProgram,
    output: glow::NativeProgram,
}

/// [`FrameDevice`] over a host-owned GL context.
///
/// The presentation framebuffer is the default framebuffer (`None`). The host keeps
/// ownership of the context; every method must run on the thread where it is current.
#[derive(Debug)]
pub struct GlowDevice {
    gl: Rc<glow::Context>,
    dialect: GlslDialect,
    programs: Option<Programs>,
    quad: Option<QuadMesh>,
}

impl GlowDevice {
    pub fn new(gl: Rc<glow::Context>, dialect: GlslDialect) -> Self {
        Self {
            gl,
            dialect,
            programs: None,
            quad: None,
        }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn ready(&self) -> Result<(&Programs, &QuadMesh), EngineError> {
        match (&self.programs, &self.quad) {
            (Some(p), Some(q)) => Ok((p, q)),
            (None, _) => Err(EngineError::other("programs not compiled")),
            (_, None) => Err(EngineError::other("quad geometry not uploaded")),
        }
    }
}

unsafe fn set_f32(gl: &glow::Context, prog: glow::NativeProgram, name: &str, v: f32) {
    if let Some(loc) = gl.get_uniform_location(prog, name) {
        gl.uniform_1_f32(Some(&loc), v);
    }
}

unsafe fn set_vec2(gl: &glow::Context, prog: glow::NativeProgram, name: &str, x: f32, y: f32) {
    if let Some(loc) = gl.get_uniform_location(prog, name) {
        gl.uniform_2_f32(Some(&loc), x, y);
    }
}

unsafe fn set_vec3(gl: &glow::Context, prog: glow::NativeProgram, name: &str, v: [f32; 3]) {
    if let Some(loc) = gl.get_uniform_location(prog, name) {
        gl.uniform_3_f32(Some(&loc), v[0], v[1], v[2]);
    }
}

unsafe fn set_i32(gl: &glow::Context, prog: glow::NativeProgram, name: &str, v: i32) {
    if let Some(loc) = gl.get_uniform_location(prog, name) {
        gl.uniform_1_i32(Some(&loc), v);
    }
}

unsafe fn bind_sampler(
    gl: &glow::Context,
    prog: glow::NativeProgram,
    name: &str,
    unit: u32,
    tex: glow::NativeTexture,
) {
    gl.active_texture(glow::TEXTURE0 + unit);
    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    set_i32(gl, prog, name, unit as i32);
}

unsafe fn unbind_samplers(gl: &glow::Context, units: u32) {
    for unit in (0..units).rev() {
        gl.active_texture(glow::TEXTURE0 + unit);
        gl.bind_texture(glow::TEXTURE_2D, None);
    }
}

impl FrameDevice for GlowDevice {
    type Surface = RenderTarget;

    fn compile_programs(&mut self) -> Result<(), EngineError> {
        if self.programs.is_some() {
            return Ok(());
        }
        let gl = &*self.gl;
        let vert = self.dialect.source(QUAD_VERT);
        unsafe {
            let accumulate = compile_program(gl, &vert, &self.dialect.source(ACCUMULATE_FRAG))?;
            let output = match compile_program(gl, &vert, &self.dialect.source(OUTPUT_FRAG)) {
                Ok(p) => p,
                Err(e) => {
                    gl.delete_program(accumulate);
                    return Err(e);
                }
            };
            self.programs = Some(Programs { accumulate, output });
        }
        info!(dialect = ?self.dialect, "programs compiled");
        Ok(())
    }

    fn destroy_programs(&mut self) {
        if let Some(p) = self.programs.take() {
            unsafe {
                self.gl.delete_program(p.accumulate);
                self.gl.delete_program(p.output);
            }
        }
    }

    fn create_geometry(&mut self) -> Result<(), EngineError> {
        if self.quad.is_none() {
            self.quad = Some(unsafe { QuadMesh::new(&self.gl)? });
        }
        Ok(())
    }

    fn destroy_geometry(&mut self) {
        if let Some(q) = self.quad.take() {
            unsafe { q.destroy(&self.gl) };
        }
    }

    fn create_surface(&mut self, size: Size, kind: SurfaceKind) -> Result<RenderTarget, EngineError> {
        let rt = unsafe { create_render_target(&self.gl, size)? };
        debug!(?kind, %size, "render target created");
        Ok(rt)
    }

    fn destroy_surface(&mut self, surface: RenderTarget) {
        unsafe { surface.delete(&self.gl) };
    }

    fn clear_surface(&mut self, surface: &RenderTarget, rgba: [f32; 4]) {
        unsafe { surface.clear(&self.gl, rgba) };
    }

    fn reset_render_state(&mut self) {
        unsafe {
            self.gl.disable(glow::SCISSOR_TEST);
            self.gl.disable(glow::DEPTH_TEST);
            self.gl.disable(glow::BLEND);
        }
    }

    fn capture_frame(&mut self, source: Size, target: &RenderTarget) -> Result<(), EngineError> {
        let gl = &*self.gl;
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(target.fbo));
            gl.blit_framebuffer(
                0,
                0,
                source.width,
                source.height,
                0,
                0,
                target.size.width,
                target.size.height,
                glow::COLOR_BUFFER_BIT,
                glow::LINEAR,
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn accumulate(&mut self, pass: AccumulatePass<'_, RenderTarget>) -> Result<(), EngineError> {
        let (programs, quad) = self.ready()?;
        let gl = &*self.gl;
        let prog = programs.accumulate;
        let p = pass.params;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(pass.target.fbo));
            gl.viewport(0, 0, pass.size.width, pass.size.height);
            gl.use_program(Some(prog));

            bind_sampler(gl, prog, "u_curr", 0, pass.capture.tex);
            bind_sampler(gl, prog, "u_prev", 1, pass.previous.tex);
            set_i32(gl, prog, "u_copy_only", i32::from(pass.copy_only));
            set_i32(gl, prog, "u_diff_mode", p.difference_mode.as_uniform());
            set_vec2(gl, prog, "u_velocity", p.velocity_low, p.velocity_high);
            set_vec2(gl, prog, "u_retention", p.max_retention, p.min_retention);
            set_vec3(
                gl,
                prog,
                "u_luma_gate",
                [p.luma_retention, p.luma_low, p.luma_high],
            );
            set_f32(gl, prog, "u_shadow_bias", p.shadow_bias);
            set_vec2(gl, prog, "u_center", p.center_inner, p.center_radius);
            set_f32(gl, prog, "u_trail_zoom", p.trail_zoom);
            set_f32(gl, prog, "u_dither", p.dither);

            quad.draw(gl);

            unbind_samplers(gl, 2);
            gl.use_program(None);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn output(&mut self, pass: OutputPass<'_, RenderTarget>) -> Result<(), EngineError> {
        let (programs, quad) = self.ready()?;
        let gl = &*self.gl;
        let prog = programs.output;
        let p = pass.params;
        let texel = pass.source_size.texel();
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, pass.target_size.width, pass.target_size.height);
            gl.use_program(Some(prog));

            bind_sampler(gl, prog, "u_history", 0, pass.source.tex);
            set_vec2(gl, prog, "u_texel", texel[0], texel[1]);
            set_f32(gl, prog, "u_time", pass.time);
            set_f32(gl, prog, "u_sharpen", p.sharpen);
            set_vec2(gl, prog, "u_dark_sharpen", p.dark_sharpen_floor, p.dark_sharpen_luma);
            set_f32(gl, prog, "u_vibrance", p.vibrance);
            set_vec2(gl, prog, "u_shadow_lift", p.shadow_lift, p.shadow_lift_luma);
            set_vec3(gl, prog, "u_haze", [p.haze_strength, p.haze_speed, p.haze_luma]);

            quad.draw(gl);

            unbind_samplers(gl, 1);
            gl.use_program(None);
        }
        Ok(())
    }
}
