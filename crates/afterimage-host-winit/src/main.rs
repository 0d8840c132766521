//! Runnable demo: draws a moving test scene, runs it through the pipeline right before
//! each swap, and accepts live tuning over OSC.
//!
//! Usage: `afterimage-demo [config.json | --preset <name>] [--osc <addr>]`
//!
//! OSC messages (default bind 127.0.0.1:9000):
//!   /param/sharpen 0.6
//!   /param/max_retention 0.97
//!   /preset light_trails

use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context as _, Result};
use glow::HasContext;
use tracing::{error, info, warn};

use afterimage_control_osc::{apply_updates, OscParamReceiver};
use afterimage_core::PipelineConfig;
use afterimage_host_winit::PresentHook;
use afterimage_runtime::preset_from_str;
use afterimage_runtime_glow::shaders::QUAD_VERT;
use afterimage_runtime_glow::{compile_program, GlowDevice, GlslDialect, QuadMesh};

use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use raw_window_handle::HasRawWindowHandle;

// Bright dots orbiting over a dim gradient, with a flickering band: enough motion and
// luma range to exercise retention, the luma gate and the center mask.
const SCENE_FRAG: &str = r#"
in vec2 v_uv;
out vec4 o_color;
uniform float u_time;

void main() {
    vec3 col = vec3(0.05 + 0.15 * v_uv.y, 0.08, 0.12 + 0.1 * v_uv.x);
    for (int i = 0; i < 5; i++) {
        float fi = float(i);
        vec2 c = vec2(0.5 + 0.35 * sin(u_time * (0.6 + 0.2 * fi) + fi),
                      0.5 + 0.3 * cos(u_time * (0.8 + 0.1 * fi) + 2.0 * fi));
        float d = length(v_uv - c);
        col += vec3(1.0, 0.7 - 0.1 * fi, 0.3 + 0.15 * fi) * smoothstep(0.04, 0.0, d);
    }
    float band = step(0.48, fract(v_uv.x * 6.0 + u_time * 0.25)) * 0.1;
    o_color = vec4(col + band, 1.0);
}
"#;

#[derive(Debug)]
struct Args {
    config: Option<String>,
    preset: Option<String>,
    osc: String,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        preset: None,
        osc: "127.0.0.1:9000".to_string(),
    };
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--preset" => args.preset = Some(it.next().context("--preset needs a name")?),
            "--osc" => args.osc = it.next().context("--osc needs an address")?,
            s if s.starts_with("--") => bail!("unknown flag {s}"),
            _ => args.config = Some(a),
        }
    }
    Ok(args)
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    match (&args.config, &args.preset) {
        (Some(path), Some(name)) => {
            bail!("config file {path} and --preset {name} are mutually exclusive")
        }
        (Some(path), None) => {
            PipelineConfig::from_json_path(path).with_context(|| format!("loading config {path}"))
        }
        (None, Some(name)) => preset_from_str(name)
            .map(|preset| preset.config())
            .ok_or_else(|| anyhow!("unknown preset {name}")),
        (None, None) => Ok(PipelineConfig::default()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v.max(1)).unwrap_or(NonZeroU32::MIN)
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = load_config(&args)?;
    info!(?config, "starting demo");

    let event_loop = EventLoop::new();

    let window_builder = WindowBuilder::new()
        .with_title("afterimage demo")
        .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0));

    let template = glutin::config::ConfigTemplateBuilder::new().with_alpha_size(8);

    let display_builder =
        glutin_winit::DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |mut configs| {
            configs.next().expect("at least one GL config")
        })
        .map_err(|e| anyhow!("DisplayBuilder.build: {e}"))?;

    let window = window.context("DisplayBuilder did not create a window")?;
    let gl_display = gl_config.display();

    let raw_window_handle = window.raw_window_handle();

    let context_attributes = glutin::context::ContextAttributesBuilder::new()
        .with_profile(glutin::context::GlProfile::Core)
        .build(Some(raw_window_handle));

    let not_current_gl_context = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .context("create_context")?
    };

    let size = window.inner_size();
    let attrs = glutin::surface::SurfaceAttributesBuilder::<glutin::surface::WindowSurface>::new()
        .build(raw_window_handle, non_zero(size.width), non_zero(size.height));

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .context("create_window_surface")?
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .context("make_current")?;

    let gl = unsafe {
        glow::Context::from_loader_function(|s| match std::ffi::CString::new(s) {
            Ok(name) => gl_display.get_proc_address(name.as_c_str()) as *const _,
            Err(_) => std::ptr::null(),
        })
    };
    let gl = Rc::new(gl);

    let dialect = GlslDialect::Core330;
    let scene_program = unsafe {
        compile_program(&gl, &dialect.source(QUAD_VERT), &dialect.source(SCENE_FRAG))?
    };
    let mut scene_quad = Some(unsafe { QuadMesh::new(&gl)? });

    let mut device = GlowDevice::new(Rc::clone(&gl), dialect);
    let hook = PresentHook::new(config);

    let mut osc = match OscParamReceiver::bind(&args.osc) {
        Ok(rx) => {
            info!(addr = %args.osc, "listening for OSC");
            Some(rx)
        }
        Err(e) => {
            warn!(addr = %args.osc, error = %e, "OSC disabled");
            None
        }
    };

    let start = Instant::now();
    let mut frames: u64 = 0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,

                WindowEvent::Resized(physical_size) => {
                    gl_surface.resize(
                        &gl_context,
                        non_zero(physical_size.width),
                        non_zero(physical_size.height),
                    );
                    window.request_redraw();
                }

                _ => {}
            },

            Event::MainEventsCleared => window.request_redraw(),

            Event::RedrawRequested(_) => {
                let s = window.inner_size();
                let w = s.width as i32;
                let h = s.height as i32;
                let t = start.elapsed().as_secs_f32();

                if let Some(osc) = osc.as_mut() {
                    let updates = osc.poll();
                    if !updates.is_empty() {
                        hook.with_pipeline(|p| {
                            let mut cfg = *p.config();
                            apply_updates(&mut cfg, &updates);
                            p.set_config(cfg);
                        });
                    }
                }

                unsafe {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                    gl.viewport(0, 0, w, h);
                    gl.use_program(Some(scene_program));
                    if let Some(loc) = gl.get_uniform_location(scene_program, "u_time") {
                        gl.uniform_1_f32(Some(&loc), t);
                    }
                    if let Some(quad) = &scene_quad {
                        quad.draw(&gl);
                    }
                    gl.use_program(None);
                }

                let outcome = hook.before_present(&mut device, w, h);

                if let Err(e) = gl_surface.swap_buffers(&gl_context) {
                    error!(error = %e, "swap_buffers failed");
                }

                frames += 1;
                if frames % 600 == 0 {
                    hook.with_pipeline(|p| info!(stats = ?p.stats(), ?outcome, "pipeline"));
                }
            }

            Event::LoopDestroyed => {
                hook.shutdown(&mut device);
                unsafe {
                    if let Some(quad) = scene_quad.take() {
                        quad.destroy(&gl);
                    }
                    gl.delete_program(scene_program);
                }
            }

            _ => {}
        }
    });
}
