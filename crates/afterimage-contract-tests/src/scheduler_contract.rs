#[cfg(test)]
mod tests {
    use afterimage_core::{AccumulateConfig, DifferenceMode, PipelineConfig, Size};
    use afterimage_runtime::shade::{self, gray, Vec3Ext};
    use afterimage_runtime::software::UNDEFINED;
    use afterimage_runtime::{
        FrameOutcome, Image, PassThroughReason, Pipeline, Preset, SoftwareDevice, SurfaceKind,
    };
    use glam::{vec2, vec3, Vec2, Vec3};

    use crate::recording::{Call, RecordingDevice};

    fn device() -> RecordingDevice {
        RecordingDevice::new(SoftwareDevice::new())
    }

    /// Put `image` on screen and run one frame at its size.
    fn present(
        p: &mut Pipeline<RecordingDevice>,
        dev: &mut RecordingDevice,
        image: Image,
    ) -> FrameOutcome {
        present_at(p, dev, image, 0.0)
    }

    fn present_at(
        p: &mut Pipeline<RecordingDevice>,
        dev: &mut RecordingDevice,
        image: Image,
        time: f32,
    ) -> FrameOutcome {
        let size = image.size();
        dev.inner.set_presentation(image);
        p.present_frame_at(dev, size.width, size.height, time)
    }

    fn gradient(size: Size) -> Image {
        Image::from_fn(size, |x, y| {
            let u = x as f32 / size.width as f32;
            let v = y as f32 / size.height as f32;
            vec3(u, v, 0.5 * (u + v)).extend(1.0)
        })
    }

    /// The history surface written by the most recent frame.
    fn last_written(p: &Pipeline<RecordingDevice>, dev: &RecordingDevice) -> Image {
        let targets = p.targets().expect("targets");
        dev.inner
            .image(targets.history().read_source())
            .expect("history image")
            .clone()
    }

    fn capture(p: &Pipeline<RecordingDevice>, dev: &RecordingDevice) -> Image {
        let targets = p.targets().expect("targets");
        dev.inner.image(targets.capture()).expect("capture image").clone()
    }

    // ---- Resource lifecycle ----

    #[test]
    fn internal_size_is_constant_without_resize() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        let size = Size::new(320, 180);

        for i in 0..10 {
            let out = present(&mut p, &mut dev, gradient(size));
            assert_eq!(out, FrameOutcome::Processed { reinitialized: i == 0 });
            assert_eq!(p.internal_size(), Size::new(160, 90));
        }

        let created = dev
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateSurface { .. }))
            .count();
        assert_eq!(created, 3);
        assert_eq!(p.stats().reallocations, 1);
        assert_eq!(p.stats().frames_processed, 10);
    }

    #[test]
    fn first_frame_call_sequence() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        present(&mut p, &mut dev, gradient(Size::new(200, 100)));

        let internal = Size::new(100, 50);
        let black = [0.0, 0.0, 0.0, 1.0];
        assert_eq!(
            dev.take_calls(),
            vec![
                Call::CompilePrograms,
                Call::CreateGeometry,
                Call::CreateSurface {
                    size: internal,
                    kind: SurfaceKind::Capture
                },
                Call::CreateSurface {
                    size: internal,
                    kind: SurfaceKind::History
                },
                Call::CreateSurface {
                    size: internal,
                    kind: SurfaceKind::History
                },
                Call::ClearSurface { slot: 1, rgba: black },
                Call::ClearSurface { slot: 2, rgba: black },
                Call::ResetRenderState,
                Call::Capture {
                    source: Size::new(200, 100),
                    target: 0
                },
                Call::Accumulate {
                    capture: 0,
                    previous: 2,
                    target: 1,
                    size: internal,
                    copy_only: true
                },
                Call::Output {
                    source: 1,
                    target_size: Size::new(200, 100)
                },
            ]
        );
    }

    #[test]
    fn steady_state_frame_runs_only_the_passes() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        present(&mut p, &mut dev, gradient(Size::new(200, 100)));
        dev.take_calls();

        present(&mut p, &mut dev, gradient(Size::new(200, 100)));
        let calls = dev.take_calls();
        assert_eq!(calls.len(), 4, "{calls:?}");
        assert_eq!(calls[0], Call::ResetRenderState);
        assert!(matches!(calls[1], Call::Capture { target: 0, .. }));
        assert!(matches!(
            calls[2],
            Call::Accumulate {
                target: 2,
                previous: 1,
                copy_only: false,
                ..
            }
        ));
        assert!(matches!(calls[3], Call::Output { source: 2, .. }));
    }

    #[test]
    fn ping_pong_alternates_and_resets_after_resize() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());

        let mut indices = Vec::new();
        for _ in 0..5 {
            present(&mut p, &mut dev, gradient(Size::new(320, 180)));
            indices.push(p.history_index().expect("index"));
        }
        // The index is flipped after each frame, so frames wrote slots 0,1,0,1,0.
        assert_eq!(indices, vec![1, 0, 1, 0, 1]);

        let (h0, h1) = {
            let h = p.targets().expect("targets").history();
            (h.get(0).expect("slot 0").slot(), h.get(1).expect("slot 1").slot())
        };
        let writes: Vec<(usize, usize)> = dev
            .accumulate_calls()
            .iter()
            .map(|c| match c {
                Call::Accumulate {
                    target, previous, ..
                } => (*target, *previous),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(writes, vec![(h0, h1), (h1, h0), (h0, h1), (h1, h0), (h0, h1)]);

        dev.take_calls();
        let out = present(&mut p, &mut dev, gradient(Size::new(400, 200)));
        assert_eq!(out, FrameOutcome::Processed { reinitialized: true });
        assert_eq!(p.history_index(), Some(1), "new generation starts writing slot 0");

        let h0 = p
            .targets()
            .expect("targets")
            .history()
            .get(0)
            .expect("slot 0")
            .slot();
        match dev.accumulate_calls().as_slice() {
            [Call::Accumulate {
                target, copy_only, ..
            }] => {
                assert_eq!(*target, h0);
                assert!(*copy_only);
            }
            other => panic!("expected one accumulate call, got {other:?}"),
        }
    }

    #[test]
    fn resize_frame_copies_capture_and_never_reads_stale_history() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        for _ in 0..3 {
            present(&mut p, &mut dev, Image::new(Size::new(320, 180), gray(0.8)));
        }

        present(&mut p, &mut dev, gradient(Size::new(480, 270)));
        assert_eq!(p.internal_size(), Size::new(240, 135));

        let written = last_written(&p, &dev);
        let captured = capture(&p, &dev);
        assert!(written.max_abs_diff(&captured) < 1e-5);

        let targets = p.targets().expect("targets");
        for slot in 0..2 {
            let img = dev
                .inner
                .image(targets.history().get(slot).expect("slot"))
                .expect("image");
            assert_eq!(img.size(), Size::new(240, 135));
            assert!(img.pixels().iter().all(|px| *px != UNDEFINED));
        }
    }

    #[test]
    fn destroy_then_present_starts_from_scratch() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        present(&mut p, &mut dev, gradient(Size::new(200, 100)));
        p.destroy(&mut dev);
        assert_eq!(dev.inner.live_surfaces(), 0);

        let out = present(&mut p, &mut dev, gradient(Size::new(200, 100)));
        assert_eq!(out, FrameOutcome::Processed { reinitialized: true });
        let compiles = dev
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::CompilePrograms))
            .count();
        assert_eq!(compiles, 2);
    }

    // ---- Shading contracts ----

    fn zero_retention() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.accumulate.max_retention = 0.0;
        cfg.accumulate.min_retention = 0.0;
        cfg.accumulate.shadow_bias = 0.0;
        cfg
    }

    #[test]
    fn zero_retention_history_equals_capture_and_output_is_graded_capture() {
        let cfg = zero_retention();
        let mut dev = device();
        let mut p = Pipeline::new(cfg);
        let size = Size::new(160, 120);

        present(&mut p, &mut dev, Image::new(size, gray(0.2)));
        present(&mut p, &mut dev, gradient(size));

        let captured = capture(&p, &dev);
        let written = last_written(&p, &dev);
        assert!(written.max_abs_diff(&captured) < 1e-5);

        let texel = Vec2::from_array(captured.size().texel());
        let dims = vec2(size.width as f32, size.height as f32);
        let expected = Image::from_fn(size, |x, y| {
            let uv = Image::pixel_center(x, y) / dims;
            shade::output(&cfg.output, |q| captured.sample(q), uv, texel, 0.0)
        });
        let presented = dev.inner.presentation();
        assert!(presented.max_abs_diff(&expected) < 1e-5);
        assert!(presented.pixels().iter().all(|px| px.w == 1.0));
    }

    #[test]
    fn retention_is_monotone_in_difference() {
        for mode in [DifferenceMode::Luma, DifferenceMode::ChannelSum] {
            let cfg = AccumulateConfig {
                difference_mode: mode,
                ..AccumulateConfig::default()
            };
            let curr = vec3(0.6, 0.6, 0.6);
            // History starts equal to the current frame and drifts brighter or darker.
            for step in [0.01_f32, -0.01] {
                let mut last = f32::INFINITY;
                let mut last_diff = -1.0;
                for k in 0..40 {
                    let hist = curr + Vec3::splat(step * k as f32);
                    let diff = shade::difference(mode, curr, hist);
                    assert!(diff > last_diff, "{mode:?}: difference must grow");
                    let r = shade::retention(&cfg, diff, curr.luma(), hist.luma());
                    assert!(r <= last + 1e-6, "{mode:?} step={step}: retention rose at k={k}");
                    last = r;
                    last_diff = diff;
                }
            }
        }
    }

    #[test]
    fn center_is_protected_and_periphery_is_blended() {
        let cfg = AccumulateConfig::default();
        assert_eq!(shade::center_mask(&cfg, vec2(0.5, 0.5)), 0.0);
        for d in [cfg.center_radius + 0.001, 0.3, 0.5] {
            assert_eq!(shade::center_mask(&cfg, vec2(0.5 + d, 0.5)), 1.0, "d = {d}");
        }
        assert_eq!(shade::center_mask(&cfg, vec2(0.0, 0.0)), 1.0);
    }

    // ---- Reference scenario ----

    #[test]
    fn full_hd_first_frame_is_copy_at_half_resolution() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        let out = present(&mut p, &mut dev, gradient(Size::new(1920, 1080)));

        assert_eq!(out, FrameOutcome::Processed { reinitialized: true });
        assert_eq!(p.output_size(), Some(Size::new(1920, 1080)));
        assert_eq!(p.internal_size(), Size::new(960, 540));
        assert_eq!(dev.inner.counters().copy_passes, 1);
        assert!(last_written(&p, &dev).max_abs_diff(&capture(&p, &dev)) < 1e-5);
        assert_eq!(dev.inner.presentation().size(), Size::new(1920, 1080));
    }

    #[test]
    fn identical_frames_give_stable_output() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        let size = Size::new(192, 108);

        present(&mut p, &mut dev, gradient(size));
        let first = dev.inner.presentation().clone();
        let first_history = last_written(&p, &dev);
        present(&mut p, &mut dev, gradient(size));
        let second = dev.inner.presentation().clone();
        let second_history = last_written(&p, &dev);

        assert!(second_history.max_abs_diff(&first_history) < 1e-4, "static scene drifted");
        assert!(second.max_abs_diff(&first) < 1e-3);
    }

    #[test]
    fn cut_favors_current_frame_outside_center() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        let size = Size::new(192, 108);

        present(&mut p, &mut dev, Image::new(size, gray(0.1)));
        present(&mut p, &mut dev, Image::new(size, gray(0.1)));
        present(&mut p, &mut dev, Image::new(size, gray(0.9)));
        let cut = last_written(&p, &dev);
        let internal = cut.size();
        assert_eq!(internal, Size::new(96, 54));

        // Periphery: fully moving, history darker, so
        // decay = 0.35 + 0.65 * 0.05 and 0.9 + (0.1 - 0.9) * decay.
        let corner = cut.get(0, 0).x;
        assert!((corner - 0.594).abs() < 1e-3, "corner = {corner}");
        assert!((corner - 0.9).abs() < (corner - 0.1).abs());

        // Center disc: effectively the current frame.
        let cx = internal.width as usize / 2;
        let cy = internal.height as usize / 2;
        let center = cut.get(cx, cy).x;
        assert!((center - 0.9).abs() < 1e-3, "center = {center}");
    }

    // ---- Optional stages ----

    /// Dark on the left, climbing past the haze threshold on the right.
    fn bright_ramp(size: Size) -> Image {
        Image::from_fn(size, |x, _| gray(0.5 + 0.5 * x as f32 / (size.width - 1) as f32))
    }

    #[test]
    fn haze_follows_time_only_on_bright_pixels() {
        let cfg = Preset::HeatHaze.config();
        let size = Size::new(192, 108);

        let mut at_zero = (device(), Pipeline::new(cfg));
        let mut at_one = (device(), Pipeline::new(cfg));
        present_at(&mut at_zero.1, &mut at_zero.0, bright_ramp(size), 0.0);
        present_at(&mut at_one.1, &mut at_one.0, bright_ramp(size), 1.0);

        let history = last_written(&at_zero.1, &at_zero.0);
        assert_eq!(history, last_written(&at_one.1, &at_one.0));

        let a = at_zero.0.inner.presentation();
        let b = at_one.0.inner.presentation();
        let dims = vec2(size.width as f32, size.height as f32);
        let mut moved = 0;
        for y in 0..size.height as usize {
            for x in 0..size.width as usize {
                let uv = Image::pixel_center(x, y) / dims;
                let luma = history.sample(uv).truncate().luma();
                let delta = (a.get(x, y) - b.get(x, y)).abs().max_element();
                if luma <= cfg.output.haze_luma {
                    assert_eq!(delta, 0.0, "dark pixel ({x}, {y}) moved with time");
                } else if delta > 1e-5 {
                    moved += 1;
                }
            }
        }
        assert!(moved > 0, "no bright pixel followed the haze phase");
    }

    #[test]
    fn trail_zoom_pulls_periphery_and_leaves_center() {
        let mut still = Preset::LightTrails.config();
        still.accumulate.dither = 0.0;
        still.accumulate.trail_zoom = 0.0;
        let zoomed = PipelineConfig {
            accumulate: AccumulateConfig {
                trail_zoom: 0.2,
                ..still.accumulate
            },
            ..still
        };

        // Odd internal size puts a texel center exactly on uv (0.5, 0.5).
        let size = Size::new(194, 110);
        let run = |cfg: PipelineConfig| {
            let mut dev = device();
            let mut p = Pipeline::new(cfg);
            present(&mut p, &mut dev, gradient(size));
            present(&mut p, &mut dev, Image::new(size, gray(0.5)));
            (last_written(&p, &dev), capture(&p, &dev))
        };
        let (plain, captured) = run(still);
        let (pulled, _) = run(zoomed);
        assert_eq!(plain.size(), Size::new(97, 55));

        let corner = (plain.get(0, 0) - pulled.get(0, 0)).abs().max_element();
        assert!(corner > 1e-3, "zoom did not move the periphery: {corner}");

        let center = pulled.get(48, 27);
        assert!((center - plain.get(48, 27)).abs().max_element() < 1e-6);
        assert!((center - captured.get(48, 27)).abs().max_element() < 1e-6);
    }

    #[test]
    fn dither_stays_within_one_step_of_undithered_history() {
        let mut dithered = Preset::LightTrails.config();
        dithered.accumulate.dither = 1.0;
        let mut plain = dithered;
        plain.accumulate.dither = 0.0;

        let size = Size::new(192, 108);
        let run = |cfg: PipelineConfig| {
            let mut dev = device();
            let mut p = Pipeline::new(cfg);
            present(&mut p, &mut dev, gradient(size));
            present(&mut p, &mut dev, gradient(size));
            last_written(&p, &dev)
        };
        let spread = run(dithered).max_abs_diff(&run(plain));
        assert!(spread > 1e-4, "dither had no effect");
        assert!(spread <= dithered.accumulate.dither / 255.0 + 1e-6, "spread = {spread}");
    }

    #[test]
    fn dither_offset_is_bounded_per_fragment() {
        let cfg = AccumulateConfig {
            dither: 2.0,
            ..AccumulateConfig::default()
        };
        let plain = AccumulateConfig { dither: 0.0, ..cfg };
        let curr = gray(0.4);
        let hist = gray(0.38);
        for x in 0..64 {
            for y in 0..16 {
                let pixel = vec2(x as f32 + 0.5, y as f32 + 0.5);
                let uv = vec2(0.02, 0.02);
                let a = shade::accumulate(&cfg, curr, hist, uv, pixel, false);
                let b = shade::accumulate(&plain, curr, hist, uv, pixel, false);
                let d = (a - b).abs();
                assert!(d.max_element() <= cfg.dither / 255.0 + 1e-6, "{pixel:?}: {d:?}");
                assert_eq!(d.w, 0.0, "dither must not touch alpha");
            }
        }
    }

    // ---- Failure policy ----

    #[test]
    fn allocation_failure_passes_through_then_recovers() {
        let mut dev = device();
        dev.inner.fail_allocation_after(1);
        let mut p = Pipeline::new(PipelineConfig::default());

        let frame = gradient(Size::new(200, 100));
        let out = present(&mut p, &mut dev, frame.clone());
        assert_eq!(out, FrameOutcome::PassThrough(PassThroughReason::Allocation));
        assert_eq!(dev.inner.presentation(), &frame, "presentation must be untouched");
        assert_eq!(p.output_size(), None);
        assert_eq!(dev.inner.live_surfaces(), 0);
        assert!(!dev
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Capture { .. } | Call::Output { .. })));

        let out = present(&mut p, &mut dev, frame);
        assert_eq!(out, FrameOutcome::Processed { reinitialized: true });
        assert_eq!(p.output_size(), Some(Size::new(200, 100)));
    }

    #[test]
    fn allocation_failure_on_resize_retries_next_frame() {
        let mut dev = device();
        let mut p = Pipeline::new(PipelineConfig::default());
        present(&mut p, &mut dev, gradient(Size::new(200, 100)));

        dev.inner.fail_allocation_after(0);
        let bigger = gradient(Size::new(300, 150));
        let out = present(&mut p, &mut dev, bigger.clone());
        assert_eq!(out, FrameOutcome::PassThrough(PassThroughReason::Allocation));
        assert_eq!(dev.inner.presentation(), &bigger);
        assert_eq!(dev.inner.live_surfaces(), 0);

        let out = present(&mut p, &mut dev, bigger);
        assert_eq!(out, FrameOutcome::Processed { reinitialized: true });
        assert_eq!(p.internal_size(), Size::new(150, 75));
    }

    #[test]
    fn compile_failure_disables_for_good() {
        let mut dev = device();
        dev.inner.fail_shader_compile(true);
        let mut p = Pipeline::new(PipelineConfig::default());

        let frame = gradient(Size::new(200, 100));
        for _ in 0..5 {
            let out = present(&mut p, &mut dev, frame.clone());
            assert_eq!(out, FrameOutcome::PassThrough(PassThroughReason::Disabled));
            assert_eq!(dev.inner.presentation(), &frame);
        }
        assert_eq!(dev.calls(), &[Call::CompilePrograms]);
        assert_eq!(p.stats().frames_passed_through, 5);
    }
}
