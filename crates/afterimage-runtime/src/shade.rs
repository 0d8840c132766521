//! Reference shading math for both passes.
//!
//! These functions are the CPU mirror of the GLSL in `afterimage-runtime-glow`. The
//! software device evaluates them per pixel, and the property tests below pin down the
//! behaviour both implementations must share. Keep the two in sync.

use afterimage_core::{AccumulateConfig, DifferenceMode, OutputConfig};
use glam::{vec2, vec3, Vec2, Vec3, Vec4};

/// Rec.601 luma weights.
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// Spatial frequency of the heat-haze ripple.
pub const HAZE_FREQ: f32 = 40.0;

/// Epsilon in the CAS contrast ratio denominator.
const CAS_EPSILON: f32 = 0.001;

pub trait Vec3Ext {
    fn luma(self) -> f32;
}

impl Vec3Ext for Vec3 {
    fn luma(self) -> f32 {
        self.dot(LUMA_WEIGHTS)
    }
}

/// GLSL `smoothstep`. Callers guarantee `e0 < e1`.
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// GLSL `mix` for scalars.
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// GLSL `fract`.
fn fract(x: f32) -> f32 {
    x - x.floor()
}

// -------------------------------------------------------------------------------------------------
// Accumulation
// -------------------------------------------------------------------------------------------------

pub fn difference(mode: DifferenceMode, curr: Vec3, prev: Vec3) -> f32 {
    match mode {
        DifferenceMode::Luma => (curr.luma() - prev.luma()).abs(),
        DifferenceMode::ChannelSum => {
            let d = (curr - prev).abs();
            d.x + d.y + d.z
        }
    }
}

/// Motion proxy in [0, 1].
pub fn velocity(cfg: &AccumulateConfig, diff: f32) -> f32 {
    smoothstep(cfg.velocity_low, cfg.velocity_high, diff)
}

/// History retention weight before the spatial mask is applied.
pub fn retention(cfg: &AccumulateConfig, diff: f32, curr_luma: f32, hist_luma: f32) -> f32 {
    let mut decay = mix(cfg.max_retention, cfg.min_retention, velocity(cfg, diff));

    let gate = smoothstep(cfg.luma_low, cfg.luma_high, curr_luma);
    decay *= mix(1.0 - cfg.luma_retention, 1.0, gate);

    if hist_luma <= curr_luma {
        decay += (1.0 - decay) * cfg.shadow_bias;
    }
    decay
}

/// 0 inside the protected disc, 1 in the periphery.
pub fn center_mask(cfg: &AccumulateConfig, uv: Vec2) -> f32 {
    let dist = uv.distance(Vec2::splat(0.5));
    smoothstep(cfg.center_inner, cfg.center_radius, dist)
}

/// History lookup coordinate, zoomed around the center for trail stretching.
pub fn history_uv(cfg: &AccumulateConfig, uv: Vec2) -> Vec2 {
    (uv - 0.5) * (1.0 - cfg.trail_zoom) + 0.5
}

/// Deterministic per-pixel noise in [0, 1).
pub fn dither_noise(pixel: Vec2) -> f32 {
    fract((pixel.dot(vec2(12.9898, 78.233))).sin() * 43758.5453)
}

/// One accumulation fragment.
///
/// `hist` must already be sampled at [`history_uv`]. `pixel` is the fragment's
/// window coordinate (center of the texel).
pub fn accumulate(
    cfg: &AccumulateConfig,
    curr: Vec4,
    hist: Vec4,
    uv: Vec2,
    pixel: Vec2,
    copy_only: bool,
) -> Vec4 {
    if copy_only {
        return curr;
    }

    let c = curr.truncate();
    let h = hist.truncate();
    let diff = difference(cfg.difference_mode, c, h);
    let decay = retention(cfg, diff, c.luma(), h.luma());
    let mask = center_mask(cfg, uv);

    let mut retained = hist;
    if cfg.dither > 0.0 {
        let n = (dither_noise(pixel) - 0.5) * cfg.dither / 255.0;
        retained += Vec4::new(n, n, n, 0.0);
    }

    curr.lerp(retained, decay * mask)
}

// -------------------------------------------------------------------------------------------------
// Output
// -------------------------------------------------------------------------------------------------

/// Heat-haze coordinate offset for a pixel of luma `luma`.
pub fn haze_offset(cfg: &OutputConfig, uv: Vec2, luma: f32, time: f32) -> Vec2 {
    if cfg.haze_strength <= 0.0 {
        return Vec2::ZERO;
    }
    let mask = smoothstep(cfg.haze_luma, 1.0, luma);
    let phase = time * cfg.haze_speed;
    vec2(
        (phase + uv.y * HAZE_FREQ).sin(),
        (phase + uv.x * HAZE_FREQ).cos(),
    ) * cfg.haze_strength
        * mask
}

/// CAS peak coefficient (negative).
pub fn cas_peak(cfg: &OutputConfig, center_luma: f32, min_luma: f32, max_luma: f32) -> f32 {
    let amt = (min_luma / (1.0 - max_luma + CAS_EPSILON))
        .clamp(0.0, 1.0)
        .sqrt();
    let peak = -1.0 / mix(8.0, 5.0, amt * cfg.sharpen);
    let dark = smoothstep(0.0, cfg.dark_sharpen_luma, center_luma);
    peak * mix(cfg.dark_sharpen_floor, 1.0, dark)
}

/// Contrast-adaptive sharpening of `center` given its four axis neighbours.
pub fn sharpen(cfg: &OutputConfig, center: Vec3, n: Vec3, s: Vec3, e: Vec3, w: Vec3) -> Vec3 {
    if cfg.sharpen <= 0.0 {
        return center;
    }
    let (lc, ln, ls, le, lw) = (center.luma(), n.luma(), s.luma(), e.luma(), w.luma());
    let mx = lc.max(ln.max(ls)).max(le.max(lw));
    let mn = lc.min(ln.min(ls)).min(le.min(lw));

    let peak = cas_peak(cfg, lc, mn, mx);
    let sharp = (lc + (ln + ls + le + lw) * peak) / (1.0 + 4.0 * peak);
    center + Vec3::splat(sharp - lc)
}

pub fn vibrance(amount: f32, col: Vec3) -> Vec3 {
    if amount == 0.0 {
        return col;
    }
    let max_rgb = col.max_element();
    let sat = (max_rgb - col.min_element()).clamp(0.0, 1.0);
    col.lerp(Vec3::splat(max_rgb), -amount * (1.0 - sat.sqrt()))
}

pub fn shadow_lift(cfg: &OutputConfig, col: Vec3) -> Vec3 {
    if cfg.shadow_lift <= 0.0 {
        return col;
    }
    let l = col.luma();
    if l < cfg.shadow_lift_luma {
        col * (1.0 + cfg.shadow_lift * (1.0 - l / cfg.shadow_lift_luma))
    } else {
        col
    }
}

/// ACES filmic approximation, per channel.
///
/// Negative input (sharpening undershoot) is clamped first; the rational curve maps
/// it to bright values otherwise.
pub fn aces(x: Vec3) -> Vec3 {
    let x = x.max(Vec3::ZERO);
    let num = x * (x * 2.51 + 0.03);
    let den = x * (x * 2.43 + 0.59) + 0.14;
    (num / den).clamp(Vec3::ZERO, Vec3::ONE)
}

/// One output fragment.
///
/// `sample` reads the current history with linear filtering and clamp-to-edge;
/// `texel` is one history texel in UV units.
pub fn output<F>(cfg: &OutputConfig, sample: F, uv: Vec2, texel: Vec2, time: f32) -> Vec4
where
    F: Fn(Vec2) -> Vec4,
{
    let mut uv = uv;
    if cfg.haze_strength > 0.0 {
        let base = sample(uv).truncate();
        uv += haze_offset(cfg, uv, base.luma(), time);
    }

    let mut col = sample(uv).truncate();
    if cfg.sharpen > 0.0 {
        let n = sample(uv + vec2(0.0, -texel.y)).truncate();
        let s = sample(uv + vec2(0.0, texel.y)).truncate();
        let e = sample(uv + vec2(texel.x, 0.0)).truncate();
        let w = sample(uv + vec2(-texel.x, 0.0)).truncate();
        col = sharpen(cfg, col, n, s, e, w);
    }

    col = vibrance(cfg.vibrance, col);
    col = shadow_lift(cfg, col);
    aces(col).extend(1.0)
}

/// Neutral clear color for fresh history surfaces.
pub const NEUTRAL: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Convenience for tests and the software device.
pub fn gray(v: f32) -> Vec4 {
    vec3(v, v, v).extend(1.0)
}
