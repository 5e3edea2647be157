//! Scripted camera move and jet animation, as functions of scene time.

/// Timing and amplitude of the approach/orbit camera move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPath {
    pub approach_start: f64,
    pub approach_duration: f64,
    pub orbit_start: f64,
    pub orbit_duration: f64,
    pub post_orbit_start: f64,
    pub base_distance: f64,
    pub approach_distance_delta: f64,
    pub base_height: f64,
    pub height_wobble_amp: f64,
    pub height_wobble_freq: f64,
    pub orbit_height_base: f64,
    pub orbit_height_amp: f64,
    pub orbit_height_freq: f64,
    pub orbit_phase_base: f64,
    pub orbit_phase_extra: f64,
}

impl Default for CameraPath {
    fn default() -> Self {
        Self {
            approach_start: 1.0,
            approach_duration: 18.0,
            orbit_start: 10.0,
            orbit_duration: 8.0,
            post_orbit_start: 18.0,
            base_distance: 36.0,
            approach_distance_delta: 20.0,
            base_height: 1.2,
            height_wobble_amp: 1.0,
            height_wobble_freq: 0.08,
            orbit_height_base: 2.0,
            orbit_height_amp: 4.0,
            orbit_height_freq: 0.22,
            orbit_phase_base: 0.18,
            orbit_phase_extra: 0.12,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub distance: f64,
    pub height: f64,
    pub orbit_phase: f64,
    /// 0 before the orbit starts, eased to 1 once it is fully blended in.
    pub orbit_mix: f64,
}

impl CameraPath {
    pub fn pose(&self, t: f64) -> CameraPose {
        let approach = ease((t - self.approach_start) / self.approach_duration);
        let orbit_mix = ease((t - self.orbit_start) / self.orbit_duration);
        let post_orbit = (t - self.post_orbit_start).max(0.0);

        let height = if orbit_mix > 0.0 {
            self.orbit_height_base + self.orbit_height_amp * (post_orbit * self.orbit_height_freq).sin()
        } else {
            self.base_height + self.height_wobble_amp * (t * self.height_wobble_freq).sin()
        };

        CameraPose {
            distance: self.base_distance - self.approach_distance_delta * approach,
            height,
            orbit_phase: t * self.orbit_phase_base + post_orbit * self.orbit_phase_extra,
            orbit_mix,
        }
    }
}

/// Relativistic jet flicker. A zero `base` disables the jets entirely.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JetTuning {
    pub base: f64,
    pub flicker_base: f64,
    pub flicker_amp: f64,
    pub flicker_freq: f64,
    pub noise_base: f64,
    pub noise_amp: f64,
    pub noise_freq_a: f64,
    pub noise_freq_b: f64,
    pub noise_phase: f64,
    pub intro_fade_start: f64,
    pub intro_fade_end: f64,
    pub radius: f64,
    pub length: f64,
}

impl Default for JetTuning {
    fn default() -> Self {
        Self {
            base: 0.0,
            flicker_base: 0.55,
            flicker_amp: 0.35,
            flicker_freq: 0.9,
            noise_base: 0.75,
            noise_amp: 0.25,
            noise_freq_a: 2.3,
            noise_freq_b: 0.4,
            noise_phase: 2.1,
            intro_fade_start: 11.0,
            intro_fade_end: 18.0,
            radius: 1.35,
            length: 20.0,
        }
    }
}

impl JetTuning {
    pub fn enabled(&self) -> bool {
        self.base > 1e-4
    }

    pub fn strength(&self, t: f64) -> f64 {
        if !self.enabled() {
            return 0.0;
        }
        let flicker = self.flicker_base + self.flicker_amp * (t * self.flicker_freq).sin();
        let noise = self.noise_base
            + self.noise_amp * (t * self.noise_freq_a + (t * self.noise_freq_b).sin() * self.noise_phase).sin();
        let fade_len = (self.intro_fade_end - self.intro_fade_start).max(1e-3);
        let intro = ease((t - self.intro_fade_start) / fade_len);
        self.base * flicker * noise * intro
    }
}

/// Clamped smoothstep on `[0, 1]`.
fn ease(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_starts_far_and_ends_near() {
        let path = CameraPath::default();
        let start = path.pose(0.0);
        assert_eq!(start.distance, 36.0);
        assert_eq!(start.orbit_mix, 0.0);
        assert_eq!(start.height, 1.2);

        let settled = path.pose(60.0);
        assert_eq!(settled.distance, 16.0);
        assert_eq!(settled.orbit_mix, 1.0);
    }

    #[test]
    fn orbit_height_takes_over_once_orbit_begins() {
        let path = CameraPath::default();
        let pose = path.pose(12.0);
        assert!(pose.orbit_mix > 0.0 && pose.orbit_mix < 1.0);
        // post-orbit clock has not started yet
        assert_eq!(pose.height, path.orbit_height_base);
    }

    #[test]
    fn ease_is_clamped_smoothstep() {
        assert_eq!(ease(-1.0), 0.0);
        assert_eq!(ease(0.5), 0.5);
        assert_eq!(ease(2.0), 1.0);
    }

    #[test]
    fn jets_are_off_by_default() {
        let jets = JetTuning::default();
        assert!(!jets.enabled());
        assert_eq!(jets.strength(30.0), 0.0);
    }

    #[test]
    fn jets_fade_in() {
        let jets = JetTuning { base: 1.0, ..JetTuning::default() };
        assert_eq!(jets.strength(5.0), 0.0);
        assert!(jets.strength(25.0).abs() > 0.0);
    }
}
