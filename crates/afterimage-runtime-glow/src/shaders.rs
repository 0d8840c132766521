//! GLSL for both passes. Mirrors `afterimage_runtime::shade`; keep the two in sync.

/// Which GLSL flavour the host context speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlslDialect {
    /// Desktop GL 3.3 core.
    #[default]
    Core330,
    /// OpenGL ES 3.0 / WebGL2.
    Es300,
}

impl GlslDialect {
    pub fn header(self) -> &'static str {
        match self {
            GlslDialect::Core330 => "#version 330 core\n",
            GlslDialect::Es300 => "#version 300 es\nprecision highp float;\n",
        }
    }

    /// Prefix `body` with this dialect's version header.
    pub fn source(self, body: &str) -> String {
        let mut s = String::with_capacity(body.len() + 48);
        s.push_str(self.header());
        s.push_str(body);
        s
    }
}

pub const QUAD_VERT: &str = r#"
layout (location = 0) in vec2 a_pos;
layout (location = 1) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

pub const ACCUMULATE_FRAG: &str = r#"
in vec2 v_uv;
out vec4 o_color;

uniform sampler2D u_curr;
uniform sampler2D u_prev;
uniform int u_copy_only;
uniform int u_diff_mode;
uniform vec2 u_velocity;   // low, high
uniform vec2 u_retention;  // max, min
uniform vec3 u_luma_gate;  // luma_retention, low, high
uniform float u_shadow_bias;
uniform vec2 u_center;     // inner, radius
uniform float u_trail_zoom;
uniform float u_dither;

const vec3 LUMA = vec3(0.299, 0.587, 0.114);

void main() {
    vec4 curr = texture(u_curr, v_uv);
    if (u_copy_only != 0) {
        o_color = curr;
        return;
    }

    vec2 huv = (v_uv - 0.5) * (1.0 - u_trail_zoom) + 0.5;
    vec4 hist = texture(u_prev, huv);

    float lc = dot(curr.rgb, LUMA);
    float lh = dot(hist.rgb, LUMA);
    float diff = u_diff_mode == 0
        ? abs(lc - lh)
        : dot(abs(curr.rgb - hist.rgb), vec3(1.0));

    float vel = smoothstep(u_velocity.x, u_velocity.y, diff);
    float decay = mix(u_retention.x, u_retention.y, vel);
    decay *= mix(1.0 - u_luma_gate.x, 1.0, smoothstep(u_luma_gate.y, u_luma_gate.z, lc));
    if (lh <= lc) {
        decay += (1.0 - decay) * u_shadow_bias;
    }

    float mask = smoothstep(u_center.x, u_center.y, distance(v_uv, vec2(0.5)));

    vec4 retained = hist;
    if (u_dither > 0.0) {
        float n = fract(sin(dot(gl_FragCoord.xy, vec2(12.9898, 78.233))) * 43758.5453);
        retained.rgb += vec3((n - 0.5) * u_dither / 255.0);
    }

    o_color = mix(curr, retained, decay * mask);
}
"#;

pub const OUTPUT_FRAG: &str = r#"
in vec2 v_uv;
out vec4 o_color;

uniform sampler2D u_history;
uniform vec2 u_texel;
uniform float u_time;
uniform float u_sharpen;
uniform vec2 u_dark_sharpen;  // floor, luma
uniform float u_vibrance;
uniform vec2 u_shadow_lift;   // amount, luma
uniform vec3 u_haze;          // strength, speed, luma

const vec3 LUMA = vec3(0.299, 0.587, 0.114);
const float HAZE_FREQ = 40.0;

vec3 aces(vec3 x) {
    x = max(x, vec3(0.0));
    return clamp((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14), 0.0, 1.0);
}

void main() {
    vec2 uv = v_uv;
    if (u_haze.x > 0.0) {
        float l = dot(texture(u_history, uv).rgb, LUMA);
        float m = smoothstep(u_haze.z, 1.0, l);
        float phase = u_time * u_haze.y;
        uv += vec2(sin(phase + uv.y * HAZE_FREQ), cos(phase + uv.x * HAZE_FREQ)) * u_haze.x * m;
    }

    vec3 col = texture(u_history, uv).rgb;

    if (u_sharpen > 0.0) {
        vec3 n = texture(u_history, uv + vec2(0.0, -u_texel.y)).rgb;
        vec3 s = texture(u_history, uv + vec2(0.0, u_texel.y)).rgb;
        vec3 e = texture(u_history, uv + vec2(u_texel.x, 0.0)).rgb;
        vec3 w = texture(u_history, uv + vec2(-u_texel.x, 0.0)).rgb;

        float lc = dot(col, LUMA);
        float ln = dot(n, LUMA);
        float ls = dot(s, LUMA);
        float le = dot(e, LUMA);
        float lw = dot(w, LUMA);
        float mx = max(lc, max(max(ln, ls), max(le, lw)));
        float mn = min(lc, min(min(ln, ls), min(le, lw)));

        float amt = sqrt(clamp(mn / (1.0 - mx + 0.001), 0.0, 1.0));
        float peak = -1.0 / mix(8.0, 5.0, amt * u_sharpen);
        peak *= mix(u_dark_sharpen.x, 1.0, smoothstep(0.0, u_dark_sharpen.y, lc));

        float sharp = (lc + (ln + ls + le + lw) * peak) / (1.0 + 4.0 * peak);
        col += vec3(sharp - lc);
    }

    if (u_vibrance != 0.0) {
        float mx = max(col.r, max(col.g, col.b));
        float sat = clamp(mx - min(col.r, min(col.g, col.b)), 0.0, 1.0);
        col = mix(col, vec3(mx), -u_vibrance * (1.0 - sqrt(sat)));
    }

    if (u_shadow_lift.x > 0.0) {
        float l = dot(col, LUMA);
        if (l < u_shadow_lift.y) {
            col *= 1.0 + u_shadow_lift.x * (1.0 - l / u_shadow_lift.y);
        }
    }

    o_color = vec4(aces(col), 1.0);
}
"#;
