use std::path::PathBuf;

/// Engine-level errors used across afterimage crates.
///
/// Contract rule: this type lives in `afterimage-core` and is re-exported by runtimes.
/// None of these ever reach the host application; the frame scheduler turns them into
/// a pass-through frame.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    // ---- Config (SDK-level) ----
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json parse error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown parameter '{0}'")]
    UnknownParam(String),

    // ---- Frame-facing ----
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: i32, height: i32 },

    // ---- Runtime-facing (backend) ----
    #[error("vertex shader compile error: {0}")]
    VertexCompile(String),

    #[error("fragment shader compile error: {0}")]
    FragmentCompile(String),

    #[error("program link error: {0}")]
    Link(String),

    #[error("backend object creation failed: {0}")]
    GlCreate(String),

    // ---- Fallback ----
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }

    /// Shader compile and link failures cannot be fixed by retrying on the next frame.
    pub fn is_shader_failure(&self) -> bool {
        matches!(
            self,
            EngineError::VertexCompile(_) | EngineError::FragmentCompile(_) | EngineError::Link(_)
        )
    }
}
