//! Shader variant preparation.
//!
//! Fetched GLSL is normalized to GLSL ES 3.00 and the active profile's
//! tuning knobs are compiled in through a `#define` preamble placed right
//! after the `#version` line. Because the knobs are part of the program
//! text, any change to them needs a new program.

use std::fmt::Write as _;

use crate::error::ShaderStage;
use crate::profile::QualityProfile;

const VERSION_LINE: &str = "#version 300 es";
const PRECISION_LINE: &str = "precision highp float;";
const FRAG_OUTPUT_LINE: &str = "layout(location = 0) out vec4 fragColor;";

/// Ray-march knobs baked into the main scene program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaderTuning {
    pub step_size: f64,
    pub trace_iterations: u32,
    /// Sample the accretion disk on every n-th march step.
    pub disk_sample_stride: u32,
    /// Added to the octave index of the disk noise; skips the finest
    /// octave's weighting at low noise detail.
    pub noise_octave_offset: u32,
}

impl From<&QualityProfile> for ShaderTuning {
    fn from(profile: &QualityProfile) -> Self {
        Self {
            step_size: profile.step_size,
            trace_iterations: profile.trace_iterations.max(1),
            disk_sample_stride: profile.disk_sample_stride.max(1),
            noise_octave_offset: if profile.disk_noise_lod <= 1.0 { 1 } else { 0 },
        }
    }
}

impl ShaderTuning {
    /// `#define` lines for this tuning, one per knob.
    pub fn preamble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#define STEP_SIZE {:.4}", self.step_size);
        let _ = writeln!(out, "#define TRACE_ITERATIONS {}", self.trace_iterations);
        let _ = writeln!(out, "#define DISK_SAMPLE_STRIDE {}", self.disk_sample_stride);
        let _ = writeln!(out, "#define NOISE_OCTAVE_OFFSET {}", self.noise_octave_offset);
        out
    }
}

/// Raw shader text as fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSources {
    pub scene_fragment: String,
    pub tonemap_fragment: String,
    pub vertex: String,
}

/// Final sources for one program set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedSources {
    pub vertex: String,
    pub scene_fragment: String,
    pub tonemap_fragment: String,
}

impl ShaderSources {
    pub fn prepare(&self, tuning: &ShaderTuning) -> PreparedSources {
        PreparedSources {
            vertex: normalize(&self.vertex, ShaderStage::Vertex, ""),
            scene_fragment: normalize(&self.scene_fragment, ShaderStage::Fragment, &tuning.preamble()),
            tonemap_fragment: normalize(&self.tonemap_fragment, ShaderStage::Fragment, ""),
        }
    }
}

/// Rewrite `source` as GLSL ES 3.00 with `defines` inserted after the
/// header.
///
/// Accepts desktop `#version 330 core` sources: the version line is
/// replaced, default precision and the fragment output are declared when
/// missing, uniform initializers are dropped and `texture2D` calls become
/// `texture`.
pub fn normalize(source: &str, stage: ShaderStage, defines: &str) -> String {
    let mut has_precision = false;
    let mut has_output = stage == ShaderStage::Vertex;
    let mut body = String::with_capacity(source.len() + defines.len() + 128);

    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") {
            continue;
        }
        if trimmed.starts_with("precision") && trimmed.contains("highp float") {
            has_precision = true;
        }
        if is_frag_output(trimmed) {
            has_output = true;
        }
        let line = strip_uniform_initializer(line);
        body.push_str(&line.replace("texture2D(", "texture("));
        body.push('\n');
    }

    let mut out = String::with_capacity(body.len() + defines.len() + 96);
    out.push_str(VERSION_LINE);
    out.push('\n');
    if !has_precision {
        out.push_str(PRECISION_LINE);
        out.push('\n');
    }
    if !has_output {
        out.push_str(FRAG_OUTPUT_LINE);
        out.push('\n');
    }
    out.push_str(defines);
    out.push_str(&body);
    out
}

fn is_frag_output(line: &str) -> bool {
    let mut words = line.split(|c: char| c.is_whitespace() || c == ';').filter(|w| !w.is_empty());
    words.any(|w| w == "out")
        && line.contains("vec4")
        && line.contains("fragColor")
}

/// `uniform float x = 1.0;` becomes `uniform float x;`. GLSL ES rejects
/// initializers on uniforms.
fn strip_uniform_initializer(line: &str) -> std::borrow::Cow<'_, str> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with("uniform ") {
        return line.into();
    }
    match (line.find('='), line.find(';')) {
        (Some(eq), Some(semi)) if eq < semi => {
            format!("{};{}", line[..eq].trim_end(), &line[semi + 1..]).into()
        }
        _ => line.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{DetailLevel, DeviceClass, ProfileTable};

    const DESKTOP_FRAG: &str = "#version 330 core\n\
        uniform float gamma = 2.2;\n\
        uniform sampler2D texture0;\n\
        void main() {\n\
            fragColor = texture2D(texture0, vec2(0.5));\n\
        }\n";

    #[test]
    fn desktop_fragment_becomes_es() {
        let out = normalize(DESKTOP_FRAG, ShaderStage::Fragment, "");
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some(VERSION_LINE));
        assert_eq!(lines.next(), Some(PRECISION_LINE));
        assert_eq!(lines.next(), Some(FRAG_OUTPUT_LINE));
        assert!(out.contains("uniform float gamma;"));
        assert!(out.contains("texture(texture0"));
        assert!(!out.contains("texture2D"));
        assert!(!out.contains("330"));
    }

    #[test]
    fn existing_header_lines_are_kept_once() {
        let src = "#version 300 es\nprecision highp float;\nout vec4 fragColor;\nvoid main() { fragColor = vec4(1.0); }\n";
        let out = normalize(src, ShaderStage::Fragment, "");
        assert_eq!(out.matches("#version").count(), 1);
        assert_eq!(out.matches("precision highp float").count(), 1);
        assert_eq!(out.matches("fragColor;").count(), 1);
    }

    #[test]
    fn vertex_stage_gets_no_fragment_output() {
        let out = normalize("#version 330 core\nvoid main() {}\n", ShaderStage::Vertex, "");
        assert!(!out.contains("fragColor"));
        assert!(out.contains(PRECISION_LINE));
    }

    #[test]
    fn defines_follow_header() {
        let out = normalize("void main() {}\n", ShaderStage::Fragment, "#define A 1\n");
        let define_at = out.find("#define A 1").unwrap();
        assert!(out.find(FRAG_OUTPUT_LINE).unwrap() < define_at);
        assert!(define_at < out.find("void main").unwrap());
    }

    #[test]
    fn initializer_stripping_leaves_other_lines_alone() {
        assert_eq!(strip_uniform_initializer("  uniform vec2 r = vec2(1.0); // x"), "  uniform vec2 r; // x");
        assert_eq!(strip_uniform_initializer("float a = 1.0;"), "float a = 1.0;");
        assert_eq!(strip_uniform_initializer("uniform float b;"), "uniform float b;");
    }

    #[test]
    fn tuning_tracks_profile_endpoints() {
        let table = ProfileTable::new(DeviceClass::Standard);
        let low = ShaderTuning::from(table.get(DetailLevel::MIN));
        let high = ShaderTuning::from(table.get(DetailLevel::MAX));

        assert_eq!(low.trace_iterations, 168);
        assert_eq!(low.disk_sample_stride, 3);
        assert_eq!(low.noise_octave_offset, 1);
        assert_eq!(high.trace_iterations, 220);
        assert_eq!(high.disk_sample_stride, 1);
        assert_eq!(high.noise_octave_offset, 0);

        let preamble = low.preamble();
        assert!(preamble.contains("#define STEP_SIZE 0.1200\n"));
        assert!(preamble.contains("#define TRACE_ITERATIONS 168\n"));
        assert!(preamble.contains("#define DISK_SAMPLE_STRIDE 3\n"));
    }

    #[test]
    fn only_scene_fragment_receives_tuning() {
        let sources = ShaderSources {
            scene_fragment: "void main() {}\n".into(),
            tonemap_fragment: "void main() {}\n".into(),
            vertex: "void main() {}\n".into(),
        };
        let tuning = ShaderTuning::from(&crate::profile::QualityProfile::high());
        let prepared = sources.prepare(&tuning);
        assert!(prepared.scene_fragment.contains("TRACE_ITERATIONS 220"));
        assert!(!prepared.tonemap_fragment.contains("#define"));
        assert!(!prepared.vertex.contains("#define"));
    }
}
