//! Linked programs with their uniform locations resolved once.

use web_sys::{WebGl2RenderingContext as GL, WebGlProgram, WebGlUniformLocation};

use super::gl::link_program;
use crate::error::Result;
use crate::shader::PreparedSources;
use crate::uniforms::{
    MainFrameUniforms, MainStaticUniforms, PlaceholderUniforms, ToneFrameUniforms,
    ToneStaticUniforms, UploadCache,
};

const PLACEHOLDER_VERT: &str = r#"#version 300 es
precision highp float;
layout(location = 0) in vec3 position;
out vec2 uv;
void main() {
    uv = (position.xy + 1.0) * 0.5;
    gl_Position = vec4(position, 1.0);
}"#;

/// Warm ring around a dark core, flickering slowly.
const PLACEHOLDER_FRAG: &str = r#"#version 300 es
precision highp float;
in vec2 uv;
layout(location = 0) out vec4 fragColor;
uniform float time;
uniform vec2 resolution;
void main() {
    vec2 p = uv - 0.5;
    p.x *= resolution.x / max(resolution.y, 1.0);
    float r = length(p);
    float ring = smoothstep(0.32, 0.28, r) - smoothstep(0.42, 0.38, r);
    float core = smoothstep(0.18, 0.04, r);
    float flicker = 0.85 + 0.15 * sin(time * 0.9);
    vec3 base = vec3(0.01);
    vec3 warm = vec3(0.35, 0.22, 0.1);
    fragColor = vec4(base + warm * (core * 0.9 + ring * 0.7) * flicker, 1.0);
}"#;

/// Texture units used by the scene program.
pub const GALAXY_UNIT: u32 = 0;
pub const COLOR_MAP_UNIT: u32 = 1;
/// Texture unit the tonemap pass samples the scene from.
pub const SCENE_UNIT: u32 = 0;

/// A uniform struct that knows its GLSL names.
pub trait UniformBlock: Copy + PartialEq {
    type Locations;

    fn locate(gl: &GL, program: &WebGlProgram) -> Self::Locations;

    /// Upload into the currently bound program.
    fn upload(&self, gl: &GL, loc: &Self::Locations);
}

type Loc = Option<WebGlUniformLocation>;

fn loc(gl: &GL, program: &WebGlProgram, name: &str) -> Loc {
    gl.get_uniform_location(program, name)
}

fn set_sampler(gl: &GL, program: &WebGlProgram, name: &str, unit: u32) {
    if let Some(l) = gl.get_uniform_location(program, name) {
        gl.uniform1i(Some(&l), unit as i32);
    }
}

pub struct MainStaticLocations {
    gravitational_lensing: Loc,
    render_black_hole: Loc,
    fov_scale: Loc,
    disk_enabled: Loc,
    disk_particle: Loc,
    disk_height: Loc,
    disk_lit: Loc,
    disk_density_v: Loc,
    disk_density_h: Loc,
    disk_noise_scale: Loc,
    disk_noise_lod: Loc,
    disk_speed: Loc,
    jet_radius: Loc,
    jet_length: Loc,
    spin: Loc,
    disk_inner_radius: Loc,
    disk_outer_radius: Loc,
    disk_opacity: Loc,
}

impl UniformBlock for MainStaticUniforms {
    type Locations = MainStaticLocations;

    fn locate(gl: &GL, p: &WebGlProgram) -> MainStaticLocations {
        MainStaticLocations {
            gravitational_lensing: loc(gl, p, "gravitationalLensing"),
            render_black_hole: loc(gl, p, "renderBlackHole"),
            fov_scale: loc(gl, p, "fovScale"),
            disk_enabled: loc(gl, p, "adiskEnabled"),
            disk_particle: loc(gl, p, "adiskParticle"),
            disk_height: loc(gl, p, "adiskHeight"),
            disk_lit: loc(gl, p, "adiskLit"),
            disk_density_v: loc(gl, p, "adiskDensityV"),
            disk_density_h: loc(gl, p, "adiskDensityH"),
            disk_noise_scale: loc(gl, p, "adiskNoiseScale"),
            disk_noise_lod: loc(gl, p, "adiskNoiseLOD"),
            disk_speed: loc(gl, p, "adiskSpeed"),
            jet_radius: loc(gl, p, "jetRadius"),
            jet_length: loc(gl, p, "jetLength"),
            spin: loc(gl, p, "bhSpin"),
            disk_inner_radius: loc(gl, p, "diskInnerRadius"),
            disk_outer_radius: loc(gl, p, "diskOuterRadius"),
            disk_opacity: loc(gl, p, "diskOpacity"),
        }
    }

    fn upload(&self, gl: &GL, l: &MainStaticLocations) {
        gl.uniform1f(l.gravitational_lensing.as_ref(), self.gravitational_lensing);
        gl.uniform1f(l.render_black_hole.as_ref(), self.render_black_hole);
        gl.uniform1f(l.fov_scale.as_ref(), self.fov_scale);
        gl.uniform1f(l.disk_enabled.as_ref(), self.disk_enabled);
        gl.uniform1f(l.disk_particle.as_ref(), self.disk_particle);
        gl.uniform1f(l.disk_height.as_ref(), self.disk_height);
        gl.uniform1f(l.disk_lit.as_ref(), self.disk_lit);
        gl.uniform1f(l.disk_density_v.as_ref(), self.disk_density_v);
        gl.uniform1f(l.disk_density_h.as_ref(), self.disk_density_h);
        gl.uniform1f(l.disk_noise_scale.as_ref(), self.disk_noise_scale);
        gl.uniform1f(l.disk_noise_lod.as_ref(), self.disk_noise_lod);
        gl.uniform1f(l.disk_speed.as_ref(), self.disk_speed);
        gl.uniform1f(l.jet_radius.as_ref(), self.jet_radius);
        gl.uniform1f(l.jet_length.as_ref(), self.jet_length);
        gl.uniform1f(l.spin.as_ref(), self.spin);
        gl.uniform1f(l.disk_inner_radius.as_ref(), self.disk_inner_radius);
        gl.uniform1f(l.disk_outer_radius.as_ref(), self.disk_outer_radius);
        gl.uniform1f(l.disk_opacity.as_ref(), self.disk_opacity);
    }
}

pub struct MainFrameLocations {
    resolution: Loc,
    time: Loc,
    cam_distance: Loc,
    cam_height: Loc,
    cam_orbit_phase: Loc,
    cam_orbit_mix: Loc,
    jet_strength: Loc,
}

impl UniformBlock for MainFrameUniforms {
    type Locations = MainFrameLocations;

    fn locate(gl: &GL, p: &WebGlProgram) -> MainFrameLocations {
        MainFrameLocations {
            resolution: loc(gl, p, "resolution"),
            time: loc(gl, p, "time"),
            cam_distance: loc(gl, p, "camDistance"),
            cam_height: loc(gl, p, "camHeight"),
            cam_orbit_phase: loc(gl, p, "camOrbitPhase"),
            cam_orbit_mix: loc(gl, p, "camOrbitMix"),
            jet_strength: loc(gl, p, "jetStrength"),
        }
    }

    fn upload(&self, gl: &GL, l: &MainFrameLocations) {
        gl.uniform2f(l.resolution.as_ref(), self.resolution[0], self.resolution[1]);
        gl.uniform1f(l.time.as_ref(), self.time);
        gl.uniform1f(l.cam_distance.as_ref(), self.cam_distance);
        gl.uniform1f(l.cam_height.as_ref(), self.cam_height);
        gl.uniform1f(l.cam_orbit_phase.as_ref(), self.cam_orbit_phase);
        gl.uniform1f(l.cam_orbit_mix.as_ref(), self.cam_orbit_mix);
        gl.uniform1f(l.jet_strength.as_ref(), self.jet_strength);
    }
}

pub struct ToneStaticLocations {
    gamma: Loc,
    tonemapping_enabled: Loc,
}

impl UniformBlock for ToneStaticUniforms {
    type Locations = ToneStaticLocations;

    fn locate(gl: &GL, p: &WebGlProgram) -> ToneStaticLocations {
        ToneStaticLocations {
            gamma: loc(gl, p, "gamma"),
            tonemapping_enabled: loc(gl, p, "tonemappingEnabled"),
        }
    }

    fn upload(&self, gl: &GL, l: &ToneStaticLocations) {
        gl.uniform1f(l.gamma.as_ref(), self.gamma);
        gl.uniform1f(l.tonemapping_enabled.as_ref(), self.tonemapping_enabled);
    }
}

pub struct ResolutionLocation(Loc);

impl UniformBlock for ToneFrameUniforms {
    type Locations = ResolutionLocation;

    fn locate(gl: &GL, p: &WebGlProgram) -> ResolutionLocation {
        ResolutionLocation(loc(gl, p, "resolution"))
    }

    fn upload(&self, gl: &GL, l: &ResolutionLocation) {
        gl.uniform2f(l.0.as_ref(), self.resolution[0], self.resolution[1]);
    }
}

pub struct PlaceholderLocations {
    resolution: Loc,
    time: Loc,
}

impl UniformBlock for PlaceholderUniforms {
    type Locations = PlaceholderLocations;

    fn locate(gl: &GL, p: &WebGlProgram) -> PlaceholderLocations {
        PlaceholderLocations {
            resolution: loc(gl, p, "resolution"),
            time: loc(gl, p, "time"),
        }
    }

    fn upload(&self, gl: &GL, l: &PlaceholderLocations) {
        gl.uniform2f(l.resolution.as_ref(), self.resolution[0], self.resolution[1]);
        gl.uniform1f(l.time.as_ref(), self.time);
    }
}

/// A program plus the per-frame block it consumes.
pub struct StageProgram<F: UniformBlock> {
    program: WebGlProgram,
    locations: F::Locations,
    cache: UploadCache<F>,
}

impl<F: UniformBlock> StageProgram<F> {
    pub fn new(gl: &GL, program: WebGlProgram) -> Self {
        let locations = F::locate(gl, &program);
        Self {
            program,
            locations,
            cache: UploadCache::default(),
        }
    }

    pub fn bind(&self, gl: &GL) {
        gl.use_program(Some(&self.program));
    }

    /// Upload `block` if it differs from the last upload. The program must
    /// be bound.
    pub fn set_frame(&mut self, gl: &GL, block: &F) {
        if self.cache.needs_upload(block) {
            block.upload(gl, &self.locations);
        }
    }

    pub fn delete(self, gl: &GL) {
        gl.delete_program(Some(&self.program));
    }
}

pub type PlaceholderProgram = StageProgram<PlaceholderUniforms>;

pub fn placeholder_program(gl: &GL) -> Result<PlaceholderProgram> {
    let program = link_program(gl, PLACEHOLDER_VERT, PLACEHOLDER_FRAG)?;
    Ok(StageProgram::new(gl, program))
}

/// Scene and tonemap programs built for one shader tuning.
pub struct ScenePrograms {
    pub main: StageProgram<MainFrameUniforms>,
    main_static: MainStaticLocations,
    pub tone: StageProgram<ToneFrameUniforms>,
}

impl ScenePrograms {
    /// Link both programs and upload their static blocks. Nothing is left
    /// allocated on failure.
    pub fn build(gl: &GL, sources: &PreparedSources, statics: &MainStaticUniforms) -> Result<Self> {
        let main = link_program(gl, &sources.vertex, &sources.scene_fragment)?;
        let tone = match link_program(gl, &sources.vertex, &sources.tonemap_fragment) {
            Ok(tone) => tone,
            Err(err) => {
                gl.delete_program(Some(&main));
                return Err(err);
            }
        };

        let main_static = MainStaticUniforms::locate(gl, &main);
        gl.use_program(Some(&main));
        statics.upload(gl, &main_static);
        set_sampler(gl, &main, "galaxy", GALAXY_UNIT);
        set_sampler(gl, &main, "colorMap", COLOR_MAP_UNIT);

        gl.use_program(Some(&tone));
        let tone_static = ToneStaticUniforms::locate(gl, &tone);
        ToneStaticUniforms::default().upload(gl, &tone_static);
        set_sampler(gl, &tone, "texture0", SCENE_UNIT);

        Ok(Self {
            main: StageProgram::new(gl, main),
            main_static,
            tone: StageProgram::new(gl, tone),
        })
    }

    /// Re-upload the scene's static block, e.g. after a noise LOD change.
    pub fn update_statics(&self, gl: &GL, statics: &MainStaticUniforms) {
        self.main.bind(gl);
        statics.upload(gl, &self.main_static);
    }

    pub fn delete(self, gl: &GL) {
        self.main.delete(gl);
        self.tone.delete(gl);
    }
}
