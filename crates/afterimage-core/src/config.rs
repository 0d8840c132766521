//! Pipeline tuning.
//!
//! Every numeric constant of the two shader stages lives here. Variants of the effect
//! are different values of these fields, never different code paths.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How the accumulation stage estimates per-pixel motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceMode {
    /// `|luma(curr) - luma(prev)|`
    #[default]
    Luma,
    /// Sum of per-channel absolute differences.
    ChannelSum,
}

impl DifferenceMode {
    /// Integer form used for the shader uniform.
    pub fn as_uniform(self) -> i32 {
        match self {
            DifferenceMode::Luma => 0,
            DifferenceMode::ChannelSum => 1,
        }
    }
}

/// Parameters of the temporal accumulation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccumulateConfig {
    pub difference_mode: DifferenceMode,
    /// Difference at or below which a pixel counts as static.
    pub velocity_low: f32,
    /// Difference at or above which a pixel counts as fully moving.
    pub velocity_high: f32,
    /// History retention for static pixels.
    pub max_retention: f32,
    /// History retention for fully moving pixels.
    pub min_retention: f32,
    /// How much dark pixels lose retention relative to bright ones (0 = off).
    pub luma_retention: f32,
    pub luma_low: f32,
    pub luma_high: f32,
    /// Extra pull towards history when history is darker than the current frame.
    pub shadow_bias: f32,
    /// Distance from center where blending starts to fade in.
    pub center_inner: f32,
    /// Distance from center where blending reaches full strength.
    pub center_radius: f32,
    /// Radial zoom applied to the history lookup (0 = off).
    pub trail_zoom: f32,
    /// Dither amplitude in 8-bit steps (0 = off).
    pub dither: f32,
}

impl Default for AccumulateConfig {
    fn default() -> Self {
        Self {
            difference_mode: DifferenceMode::Luma,
            velocity_low: 0.02,
            velocity_high: 0.30,
            max_retention: 0.94,
            min_retention: 0.35,
            luma_retention: 0.0,
            luma_low: 0.1,
            luma_high: 0.6,
            shadow_bias: 0.05,
            center_inner: 0.01,
            center_radius: 0.12,
            trail_zoom: 0.0,
            dither: 0.0,
        }
    }
}

/// Parameters of the sharpen/grade/output pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// CAS strength (0 = sharpening off).
    pub sharpen: f32,
    /// Sharpening multiplier in fully dark regions (1 = no suppression).
    pub dark_sharpen_floor: f32,
    /// Luma at which dark-region suppression stops.
    pub dark_sharpen_luma: f32,
    pub vibrance: f32,
    /// Exposure boost for pixels below `shadow_lift_luma` (0 = off).
    pub shadow_lift: f32,
    pub shadow_lift_luma: f32,
    /// Heat-haze coordinate offset in UV units (0 = off).
    pub haze_strength: f32,
    pub haze_speed: f32,
    /// Luma above which haze starts to apply.
    pub haze_luma: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sharpen: 0.88,
            dark_sharpen_floor: 1.0,
            dark_sharpen_luma: 0.15,
            vibrance: 0.2,
            shadow_lift: 0.0,
            shadow_lift_luma: 0.25,
            haze_strength: 0.0,
            haze_speed: 2.0,
            haze_luma: 0.72,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Internal resolution relative to the presentation surface, in (0, 1].
    pub scale: f32,
    pub accumulate: AccumulateConfig,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scale: 0.5,
            accumulate: AccumulateConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn check_range(name: &str, v: f32, lo: f32, hi: f32) -> Result<(), EngineError> {
    if v.is_finite() && (lo..=hi).contains(&v) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "{name} = {v} is outside [{lo}, {hi}]"
        )))
    }
}

fn check_edges(name: &str, lo: f32, hi: f32) -> Result<(), EngineError> {
    if lo < hi {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "{name}: lower edge {lo} must be below upper edge {hi}"
        )))
    }
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
        let cfg: PipelineConfig = serde_json::from_str(s)
            .map_err(|e| EngineError::InvalidConfig(format!("parse json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: PipelineConfig =
            serde_json::from_slice(&bytes).map_err(|source| EngineError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::other(e.to_string()))
    }

    /// Range checks. Degenerate smoothstep windows are rejected too.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.scale.is_finite() && self.scale > 0.0 && self.scale <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "scale = {} must be in (0, 1]",
                self.scale
            )));
        }

        let a = &self.accumulate;
        check_range("accumulate.velocity_low", a.velocity_low, 0.0, 3.0)?;
        check_range("accumulate.velocity_high", a.velocity_high, 0.0, 3.0)?;
        check_edges("accumulate.velocity", a.velocity_low, a.velocity_high)?;
        check_range("accumulate.max_retention", a.max_retention, 0.0, 1.0)?;
        check_range("accumulate.min_retention", a.min_retention, 0.0, 1.0)?;
        if a.min_retention > a.max_retention {
            return Err(EngineError::InvalidConfig(format!(
                "accumulate.min_retention {} exceeds max_retention {}",
                a.min_retention, a.max_retention
            )));
        }
        check_range("accumulate.luma_retention", a.luma_retention, 0.0, 1.0)?;
        check_range("accumulate.luma_low", a.luma_low, 0.0, 1.0)?;
        check_range("accumulate.luma_high", a.luma_high, 0.0, 1.0)?;
        check_edges("accumulate.luma", a.luma_low, a.luma_high)?;
        check_range("accumulate.shadow_bias", a.shadow_bias, 0.0, 1.0)?;
        check_range("accumulate.center_inner", a.center_inner, 0.0, 1.0)?;
        check_range("accumulate.center_radius", a.center_radius, 0.0, 1.0)?;
        check_edges("accumulate.center", a.center_inner, a.center_radius)?;
        check_range("accumulate.trail_zoom", a.trail_zoom, 0.0, 0.5)?;
        check_range("accumulate.dither", a.dither, 0.0, 8.0)?;

        let o = &self.output;
        check_range("output.sharpen", o.sharpen, 0.0, 1.0)?;
        check_range("output.dark_sharpen_floor", o.dark_sharpen_floor, 0.0, 1.0)?;
        check_range("output.dark_sharpen_luma", o.dark_sharpen_luma, 0.001, 1.0)?;
        check_range("output.vibrance", o.vibrance, -1.0, 1.0)?;
        check_range("output.shadow_lift", o.shadow_lift, 0.0, 2.0)?;
        check_range("output.shadow_lift_luma", o.shadow_lift_luma, 0.001, 1.0)?;
        check_range("output.haze_strength", o.haze_strength, 0.0, 0.05)?;
        check_range("output.haze_speed", o.haze_speed, 0.0, 100.0)?;
        check_range("output.haze_luma", o.haze_luma, 0.0, 0.999)?;

        Ok(())
    }

    /// Apply a single named update (used by live control surfaces).
    ///
    /// The update is rejected, and `self` left unchanged, if the result fails
    /// validation.
    pub fn set_param(&mut self, name: &str, value: f32) -> Result<(), EngineError> {
        let mut next = *self;
        {
            let a = &mut next.accumulate;
            let o = &mut next.output;
            match name {
                "scale" => next.scale = value,
                "difference_mode" => {
                    a.difference_mode = if value >= 0.5 {
                        DifferenceMode::ChannelSum
                    } else {
                        DifferenceMode::Luma
                    }
                }
                "velocity_low" => a.velocity_low = value,
                "velocity_high" => a.velocity_high = value,
                "max_retention" => a.max_retention = value,
                "min_retention" => a.min_retention = value,
                "luma_retention" => a.luma_retention = value,
                "luma_low" => a.luma_low = value,
                "luma_high" => a.luma_high = value,
                "shadow_bias" => a.shadow_bias = value,
                "center_inner" => a.center_inner = value,
                "center_radius" => a.center_radius = value,
                "trail_zoom" => a.trail_zoom = value,
                "dither" => a.dither = value,
                "sharpen" => o.sharpen = value,
                "dark_sharpen_floor" => o.dark_sharpen_floor = value,
                "dark_sharpen_luma" => o.dark_sharpen_luma = value,
                "vibrance" => o.vibrance = value,
                "shadow_lift" => o.shadow_lift = value,
                "shadow_lift_luma" => o.shadow_lift_luma = value,
                "haze_strength" => o.haze_strength = value,
                "haze_speed" => o.haze_speed = value,
                "haze_luma" => o.haze_luma = value,
                _ => return Err(EngineError::UnknownParam(name.to_string())),
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = PipelineConfig::from_json_str(r#"{ "scale": 0.75, "output": { "sharpen": 0.7 } }"#)
            .expect("parse");
        assert_eq!(cfg.scale, 0.75);
        assert_eq!(cfg.output.sharpen, 0.7);
        assert_eq!(cfg.accumulate, AccumulateConfig::default());
    }

    #[test]
    fn difference_mode_parses_snake_case() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "accumulate": { "difference_mode": "channel_sum" } }"#,
        )
        .expect("parse");
        assert_eq!(cfg.accumulate.difference_mode, DifferenceMode::ChannelSum);
    }

    #[test]
    fn rejects_out_of_range_scale() {
        let err = PipelineConfig::from_json_str(r#"{ "scale": 0.0 }"#).expect_err("scale 0");
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn rejects_inverted_retention() {
        let err = PipelineConfig::from_json_str(
            r#"{ "accumulate": { "max_retention": 0.2, "min_retention": 0.5 } }"#,
        )
        .expect_err("inverted");
        assert!(err.to_string().contains("min_retention"));
    }

    #[test]
    fn set_param_updates_and_validates() {
        let mut cfg = PipelineConfig::default();
        cfg.set_param("sharpen", 0.5).expect("sharpen");
        assert_eq!(cfg.output.sharpen, 0.5);

        cfg.set_param("difference_mode", 1.0).expect("mode");
        assert_eq!(cfg.accumulate.difference_mode, DifferenceMode::ChannelSum);

        let before = cfg;
        assert!(cfg.set_param("center_radius", 0.0).is_err());
        assert_eq!(cfg, before, "failed update must leave config untouched");

        match cfg.set_param("bogus", 1.0) {
            Err(EngineError::UnknownParam(name)) => assert_eq!(name, "bogus"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn json_roundtrip_is_stable() {
        let cfg = PipelineConfig::default();
        let s = cfg.to_json_pretty().expect("serialize");
        assert_eq!(PipelineConfig::from_json_str(&s).expect("parse"), cfg);
    }
}
