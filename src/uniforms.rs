//! Typed uniform blocks, one struct per program stage.
//!
//! Static blocks are uploaded once per program build; frame blocks every
//! frame through an [`UploadCache`] that skips values the program already
//! holds.

use crate::camera::{CameraPose, JetTuning};
use crate::profile::QualityProfile;

/// Scene parameters fixed for the lifetime of a scene program, apart from
/// `disk_noise_lod` which follows the detail level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MainStaticUniforms {
    pub gravitational_lensing: f32,
    pub render_black_hole: f32,
    pub fov_scale: f32,
    pub disk_enabled: f32,
    pub disk_particle: f32,
    pub disk_height: f32,
    pub disk_lit: f32,
    pub disk_density_v: f32,
    pub disk_density_h: f32,
    pub disk_noise_scale: f32,
    pub disk_noise_lod: f32,
    pub disk_speed: f32,
    pub jet_radius: f32,
    pub jet_length: f32,
    pub spin: f32,
    pub disk_inner_radius: f32,
    pub disk_outer_radius: f32,
    pub disk_opacity: f32,
}

impl Default for MainStaticUniforms {
    fn default() -> Self {
        let jets = JetTuning::default();
        Self {
            gravitational_lensing: 1.0,
            render_black_hole: 1.0,
            fov_scale: 1.0,
            disk_enabled: 1.0,
            disk_particle: 1.0,
            disk_height: 0.30,
            disk_lit: 0.078,
            disk_density_v: 0.95,
            disk_density_h: 2.15,
            disk_noise_scale: 1.0,
            disk_noise_lod: 1.0,
            disk_speed: 0.30,
            jet_radius: jets.radius as f32,
            jet_length: jets.length as f32,
            spin: 0.52,
            disk_inner_radius: 2.95,
            disk_outer_radius: 12.0,
            disk_opacity: 0.86,
        }
    }
}

impl MainStaticUniforms {
    pub fn for_profile(profile: &QualityProfile) -> Self {
        Self {
            disk_noise_lod: profile.disk_noise_lod as f32,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MainFrameUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub cam_distance: f32,
    pub cam_height: f32,
    pub cam_orbit_phase: f32,
    pub cam_orbit_mix: f32,
    pub jet_strength: f32,
}

impl MainFrameUniforms {
    pub fn new(resolution: (u32, u32), time_s: f64, pose: &CameraPose, jet_strength: f64) -> Self {
        Self {
            resolution: [resolution.0 as f32, resolution.1 as f32],
            time: time_s as f32,
            cam_distance: pose.distance as f32,
            cam_height: pose.height as f32,
            cam_orbit_phase: pose.orbit_phase as f32,
            cam_orbit_mix: pose.orbit_mix as f32,
            jet_strength: jet_strength as f32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneStaticUniforms {
    pub gamma: f32,
    pub tonemapping_enabled: f32,
}

impl Default for ToneStaticUniforms {
    fn default() -> Self {
        Self {
            gamma: 2.4,
            tonemapping_enabled: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ToneFrameUniforms {
    pub resolution: [f32; 2],
}

/// Inputs of the loading placeholder pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlaceholderUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
}

/// Remembers the last block uploaded to one program.
#[derive(Clone, Debug)]
pub struct UploadCache<T> {
    last: Option<T>,
}

impl<T> Default for UploadCache<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: Copy + PartialEq> UploadCache<T> {
    /// True when `next` differs from what was last uploaded; records it.
    pub fn needs_upload(&mut self, next: &T) -> bool {
        if self.last.as_ref() == Some(next) {
            return false;
        }
        self.last = Some(*next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPath;
    use crate::profile::{DeviceClass, QualityProfile};

    #[test]
    fn cache_skips_unchanged_blocks() {
        let mut cache = UploadCache::default();
        let a = ToneFrameUniforms { resolution: [800.0, 600.0] };
        assert!(cache.needs_upload(&a));
        assert!(!cache.needs_upload(&a));
        let b = ToneFrameUniforms { resolution: [801.0, 600.0] };
        assert!(cache.needs_upload(&b));
        assert!(!cache.needs_upload(&b));
    }

    #[test]
    fn static_block_follows_noise_lod() {
        let low = MainStaticUniforms::for_profile(&QualityProfile::low(DeviceClass::Standard));
        let high = MainStaticUniforms::for_profile(&QualityProfile::high());
        assert_eq!(low.disk_noise_lod, 1.0);
        assert_eq!(high.disk_noise_lod, 2.0);
        assert_eq!(low.spin, high.spin);
    }

    #[test]
    fn frame_block_from_pose() {
        let pose = CameraPath::default().pose(0.0);
        let block = MainFrameUniforms::new((640, 360), 0.0, &pose, 0.0);
        assert_eq!(block.resolution, [640.0, 360.0]);
        assert_eq!(block.cam_distance, 36.0);
    }
}
