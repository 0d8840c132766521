use afterimage_core::{AccumulateConfig, DifferenceMode, OutputConfig, PipelineConfig};

/// Named tunings of the effect.
///
/// Presets are plain [`PipelineConfig`] values; switching between them never changes
/// which code runs, only the uniforms it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Motion smoothing with a small protected aim region. The default tuning.
    Balanced,
    /// Long retention on bright pixels, radial trail stretch and dither.
    LightTrails,
    /// Shorter trails plus an animated shimmer on the brightest pixels.
    HeatHaze,
    /// Light smoothing, wide protected center, strong sharpening.
    Crisp,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Balanced,
        Preset::LightTrails,
        Preset::HeatHaze,
        Preset::Crisp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Balanced => "balanced",
            Preset::LightTrails => "light_trails",
            Preset::HeatHaze => "heat_haze",
            Preset::Crisp => "crisp",
        }
    }

    pub fn config(self) -> PipelineConfig {
        match self {
            Preset::Balanced => PipelineConfig::default(),
            Preset::LightTrails => PipelineConfig {
                scale: 0.5,
                accumulate: AccumulateConfig {
                    difference_mode: DifferenceMode::ChannelSum,
                    velocity_low: 0.05,
                    velocity_high: 0.6,
                    max_retention: 0.98,
                    min_retention: 0.2,
                    luma_retention: 0.6,
                    luma_low: 0.15,
                    luma_high: 0.7,
                    shadow_bias: 0.0,
                    center_inner: 0.08,
                    center_radius: 0.25,
                    trail_zoom: 0.004,
                    dither: 1.0,
                },
                output: OutputConfig {
                    sharpen: 0.8,
                    ..OutputConfig::default()
                },
            },
            Preset::HeatHaze => PipelineConfig {
                scale: 0.5,
                accumulate: AccumulateConfig {
                    velocity_low: 0.02,
                    velocity_high: 0.4,
                    max_retention: 0.9,
                    min_retention: 0.1,
                    center_inner: 0.1,
                    center_radius: 0.3,
                    ..AccumulateConfig::default()
                },
                output: OutputConfig {
                    sharpen: 0.75,
                    dark_sharpen_floor: 0.4,
                    shadow_lift: 0.15,
                    haze_strength: 0.003,
                    haze_speed: 3.0,
                    haze_luma: 0.72,
                    ..OutputConfig::default()
                },
            },
            Preset::Crisp => PipelineConfig {
                scale: 0.5,
                accumulate: AccumulateConfig {
                    velocity_low: 0.05,
                    velocity_high: 0.3,
                    max_retention: 0.86,
                    min_retention: 0.0,
                    center_inner: 0.2,
                    center_radius: 0.45,
                    ..AccumulateConfig::default()
                },
                output: OutputConfig {
                    sharpen: 0.9,
                    dark_sharpen_floor: 0.5,
                    vibrance: 0.3,
                    ..OutputConfig::default()
                },
            },
        }
    }
}

/// Convert user-facing strings to a known preset.
///
/// Accepts common aliases: `light_trails`, `light-trails`, `LightTrails`, etc.
pub fn preset_from_str(s: &str) -> Option<Preset> {
    match s {
        "balanced" | "Balanced" | "default" => Some(Preset::Balanced),
        "light_trails" | "light-trails" | "LightTrails" | "trails" => Some(Preset::LightTrails),
        "heat_haze" | "heat-haze" | "HeatHaze" | "haze" => Some(Preset::HeatHaze),
        "crisp" | "Crisp" => Some(Preset::Crisp),
        _ => None,
    }
}
