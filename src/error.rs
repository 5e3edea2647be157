use std::fmt;

use thiserror::Error;

/// Shader stage a compile error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackgroundError {
    #[error("WebGL2 drawing surface unavailable")]
    SurfaceUnavailable,

    #[error("Shader compile failed ({stage}): {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("Program link failed: {0}")]
    ProgramLink(String),

    #[error("failed to create GL resource: {0}")]
    Resource(&'static str),

    #[error("Failed to load asset: {url} (HTTP {status})")]
    AssetFetch { url: String, status: u16 },

    #[error("Failed to decode asset: {url}")]
    AssetDecode { url: String },

    #[error("element #{0} not found")]
    MissingElement(String),

    #[error("{0}")]
    Js(String),
}

impl BackgroundError {
    /// Errors after which the render loop stops for good.
    pub fn halts_rendering(&self) -> bool {
        matches!(
            self,
            BackgroundError::SurfaceUnavailable
                | BackgroundError::ShaderCompile { .. }
                | BackgroundError::ProgramLink(_)
        )
    }

    /// Cross-origin failures usually mean the page was opened from `file://`.
    pub fn is_cross_origin(&self) -> bool {
        self.to_string().contains("cross-origin")
    }
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for BackgroundError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                js_sys::Reflect::get(&value, &"message".into())
                    .ok()
                    .and_then(|m| m.as_string())
            })
            .unwrap_or_else(|| format!("{:?}", value));
        BackgroundError::Js(message)
    }
}

#[cfg(target_arch = "wasm32")]
impl From<BackgroundError> for wasm_bindgen::JsValue {
    fn from(err: BackgroundError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}

pub type Result<T, E = BackgroundError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_stage() {
        let err = BackgroundError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "ERROR: 0:12: 'foo' : undeclared identifier".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Shader compile failed (fragment)"));
        assert!(msg.contains("undeclared identifier"));
    }

    #[test]
    fn halting_taxonomy() {
        assert!(BackgroundError::SurfaceUnavailable.halts_rendering());
        assert!(BackgroundError::ProgramLink("x".into()).halts_rendering());
        assert!(!BackgroundError::AssetFetch {
            url: "a".into(),
            status: 404
        }
        .halts_rendering());
        assert!(!BackgroundError::AssetDecode { url: "a".into() }.halts_rendering());
    }

    #[test]
    fn cross_origin_detection() {
        let err = BackgroundError::Js("SecurityError: cross-origin image".into());
        assert!(err.is_cross_origin());
        assert!(!BackgroundError::SurfaceUnavailable.is_cross_origin());
    }
}
