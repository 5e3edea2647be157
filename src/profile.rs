//! Detail levels and the quality profiles they select.
//!
//! A [`DetailLevel`] is the user's quality dial quantized to steps of
//! [`DETAIL_STEP`]. Each level maps to one [`QualityProfile`], linearly
//! interpolated between a low-detail and a high-detail endpoint. The full
//! table is built once at startup by [`ProfileTable::new`].

use std::fmt;

/// Granularity of the detail dial.
pub const DETAIL_STEP: f64 = 0.01;

/// Number of steps between level 0 and level 1.
const DETAIL_STEPS: u8 = 100;

/// Quantized detail level in `[0, 1]`, stored as a step index so that
/// quantization is exact and comparisons never suffer float noise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetailLevel(u8);

impl DetailLevel {
    pub const MIN: DetailLevel = DetailLevel(0);
    pub const MAX: DetailLevel = DetailLevel(DETAIL_STEPS);

    /// Round a raw dial value to the nearest allowed step.
    ///
    /// Non-finite input maps to level 0; out-of-range input is clamped.
    pub fn quantize(raw: f64) -> Self {
        if !raw.is_finite() {
            return Self::MIN;
        }
        let clamped = raw.clamp(0.0, 1.0);
        DetailLevel((clamped / DETAIL_STEP).round() as u8).min(Self::MAX)
    }

    /// Parse the string value of a range input. Unparseable text is level 0.
    pub fn parse(text: &str) -> Self {
        Self::quantize(text.trim().parse::<f64>().unwrap_or(f64::NAN))
    }

    pub fn from_index(index: usize) -> Self {
        DetailLevel(index.min(DETAIL_STEPS as usize) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> f64 {
        self.0 as f64 / DETAIL_STEPS as f64
    }

    /// Every level from 0 to 1 in order.
    pub fn all() -> impl Iterator<Item = DetailLevel> {
        (0..=DETAIL_STEPS).map(DetailLevel)
    }
}

impl fmt::Display for DetailLevel {
    /// `0` and `1` at the ends, two decimals in between.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("0"),
            DETAIL_STEPS => f.write_str("1"),
            n => write!(f, "0.{:02}", n),
        }
    }
}

/// Hardware bucket used to pick the low-detail endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceClass {
    #[default]
    Standard,
    LowEnd,
}

impl DeviceClass {
    /// Classify from `navigator.hardwareConcurrency` and
    /// `navigator.deviceMemory`. Unknown values count as 8.
    pub fn classify(hardware_concurrency: Option<f64>, device_memory_gb: Option<f64>) -> Self {
        let cores = hardware_concurrency.filter(|v| *v > 0.0).unwrap_or(8.0);
        let memory = device_memory_gb.filter(|v| *v > 0.0).unwrap_or(8.0);
        if cores <= 4.0 || memory <= 4.0 {
            DeviceClass::LowEnd
        } else {
            DeviceClass::Standard
        }
    }
}

/// Rendering parameters for one detail level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityProfile {
    pub base_render_scale: f64,
    pub min_render_scale: f64,
    pub max_render_scale: f64,
    /// Interval between performance checks.
    pub frame_check_ms: u32,
    /// Scale down when smoothed frame time exceeds `budget * drop`.
    pub perf_drop_threshold: f64,
    /// Scale up when smoothed frame time falls below `budget * rise`.
    pub perf_rise_threshold: f64,
    pub disk_noise_lod: f64,
    pub step_size: f64,
    pub trace_iterations: u32,
    pub disk_sample_stride: u32,
}

impl QualityProfile {
    pub fn low(device: DeviceClass) -> Self {
        let (base, min, max) = match device {
            DeviceClass::Standard => (0.72, 0.5, 0.8),
            DeviceClass::LowEnd => (0.62, 0.45, 0.72),
        };
        Self {
            base_render_scale: base,
            min_render_scale: min,
            max_render_scale: max,
            frame_check_ms: 700,
            perf_drop_threshold: 1.08,
            perf_rise_threshold: 0.78,
            disk_noise_lod: 1.0,
            step_size: 0.12,
            trace_iterations: 168,
            disk_sample_stride: 3,
        }
    }

    pub fn high() -> Self {
        Self {
            base_render_scale: 1.0,
            min_render_scale: 1.0,
            max_render_scale: 1.0,
            frame_check_ms: 1400,
            perf_drop_threshold: 1.25,
            perf_rise_threshold: 0.75,
            disk_noise_lod: 2.0,
            step_size: 0.1,
            trace_iterations: 220,
            disk_sample_stride: 1,
        }
    }

    /// Blend `low` and `high` at `t` in `[0, 1]`. Integer fields round to
    /// the nearest value.
    pub fn interpolate(low: &Self, high: &Self, t: f64) -> Self {
        Self {
            base_render_scale: lerp(low.base_render_scale, high.base_render_scale, t),
            min_render_scale: lerp(low.min_render_scale, high.min_render_scale, t),
            max_render_scale: lerp(low.max_render_scale, high.max_render_scale, t),
            frame_check_ms: lerp_int(low.frame_check_ms, high.frame_check_ms, t),
            perf_drop_threshold: lerp(low.perf_drop_threshold, high.perf_drop_threshold, t),
            perf_rise_threshold: lerp(low.perf_rise_threshold, high.perf_rise_threshold, t),
            disk_noise_lod: lerp(low.disk_noise_lod, high.disk_noise_lod, t),
            step_size: lerp(low.step_size, high.step_size, t),
            trace_iterations: lerp_int(low.trace_iterations, high.trace_iterations, t),
            disk_sample_stride: lerp_int(low.disk_sample_stride, high.disk_sample_stride, t),
        }
    }

    /// Clamp a render scale into this profile's bounds.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_render_scale, self.max_render_scale)
    }
}

// Weighted form so both endpoints come back bit-exact.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

fn lerp_int(a: u32, b: u32, t: f64) -> u32 {
    lerp(a as f64, b as f64, t).round() as u32
}

/// Precomputed profile for every detail level.
#[derive(Clone, Debug)]
pub struct ProfileTable {
    profiles: Vec<QualityProfile>,
}

impl ProfileTable {
    pub fn new(device: DeviceClass) -> Self {
        Self::between(QualityProfile::low(device), QualityProfile::high())
    }

    pub fn between(low: QualityProfile, high: QualityProfile) -> Self {
        let profiles = DetailLevel::all()
            .map(|level| QualityProfile::interpolate(&low, &high, level.value()))
            .collect();
        Self { profiles }
    }

    pub fn get(&self, level: DetailLevel) -> &QualityProfile {
        &self.profiles[level.index().min(self.profiles.len() - 1)]
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn quantize_rounds_to_nearest_step() {
        assert_eq!(DetailLevel::quantize(0.004), DetailLevel::from_index(0));
        assert_eq!(DetailLevel::quantize(0.006), DetailLevel::from_index(1));
        assert_eq!(DetailLevel::quantize(0.499), DetailLevel::from_index(50));
        assert_eq!(DetailLevel::quantize(0.994), DetailLevel::from_index(99));
        assert_eq!(DetailLevel::quantize(0.996), DetailLevel::MAX);
    }

    #[test]
    fn quantize_clamps_and_rejects_non_finite() {
        assert_eq!(DetailLevel::quantize(-3.0), DetailLevel::MIN);
        assert_eq!(DetailLevel::quantize(7.5), DetailLevel::MAX);
        assert_eq!(DetailLevel::quantize(f64::NAN), DetailLevel::MIN);
        assert_eq!(DetailLevel::quantize(f64::INFINITY), DetailLevel::MIN);
    }

    #[test]
    fn parse_slider_text() {
        assert_eq!(DetailLevel::parse("0.37"), DetailLevel::from_index(37));
        assert_eq!(DetailLevel::parse(" 1 "), DetailLevel::MAX);
        assert_eq!(DetailLevel::parse("abc"), DetailLevel::MIN);
        assert_eq!(DetailLevel::parse(""), DetailLevel::MIN);
    }

    #[test]
    fn display_matches_label_format() {
        assert_eq!(DetailLevel::MIN.to_string(), "0");
        assert_eq!(DetailLevel::MAX.to_string(), "1");
        assert_eq!(DetailLevel::from_index(5).to_string(), "0.05");
        assert_eq!(DetailLevel::from_index(50).to_string(), "0.50");
    }

    #[test]
    fn device_classification() {
        assert_eq!(DeviceClass::classify(None, None), DeviceClass::Standard);
        assert_eq!(DeviceClass::classify(Some(4.0), None), DeviceClass::LowEnd);
        assert_eq!(DeviceClass::classify(Some(16.0), Some(2.0)), DeviceClass::LowEnd);
        assert_eq!(DeviceClass::classify(Some(8.0), Some(8.0)), DeviceClass::Standard);
    }

    #[test]
    fn table_has_one_profile_per_level() {
        let table = ProfileTable::new(DeviceClass::Standard);
        assert_eq!(table.len(), 101);
    }

    #[test]
    fn interpolation_endpoints_are_exact() {
        for device in [DeviceClass::Standard, DeviceClass::LowEnd] {
            let table = ProfileTable::new(device);
            assert_eq!(*table.get(DetailLevel::MIN), QualityProfile::low(device));
            assert_eq!(*table.get(DetailLevel::MAX), QualityProfile::high());
        }
    }

    #[test]
    fn midpoint_is_mean_of_endpoints() {
        let low = QualityProfile::low(DeviceClass::Standard);
        let high = QualityProfile::high();
        let mid = *ProfileTable::new(DeviceClass::Standard).get(DetailLevel::quantize(0.5));

        assert!(approx(mid.base_render_scale, (low.base_render_scale + high.base_render_scale) / 2.0));
        assert!(approx(mid.min_render_scale, (low.min_render_scale + high.min_render_scale) / 2.0));
        assert!(approx(mid.max_render_scale, (low.max_render_scale + high.max_render_scale) / 2.0));
        assert!(approx(mid.perf_drop_threshold, (low.perf_drop_threshold + high.perf_drop_threshold) / 2.0));
        assert!(approx(mid.perf_rise_threshold, (low.perf_rise_threshold + high.perf_rise_threshold) / 2.0));
        assert!(approx(mid.disk_noise_lod, 1.5));
        assert!(approx(mid.step_size, 0.11));
        assert_eq!(mid.frame_check_ms, 1050);
        assert_eq!(mid.trace_iterations, 194);
        assert_eq!(mid.disk_sample_stride, 2);
    }

    #[test]
    fn clamp_scale_respects_bounds() {
        let low = QualityProfile::low(DeviceClass::Standard);
        assert_eq!(low.clamp_scale(0.1), 0.5);
        assert_eq!(low.clamp_scale(0.9), 0.8);
        assert_eq!(low.clamp_scale(0.6), 0.6);
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn quantize_is_idempotent(x in 0.0f64..=1.0) {
                let once = DetailLevel::quantize(x);
                prop_assert_eq!(DetailLevel::quantize(once.value()), once);
            }

            #[test]
            fn quantize_never_moves_more_than_half_a_step(x in 0.0f64..=1.0) {
                let level = DetailLevel::quantize(x);
                prop_assert!((level.value() - x).abs() <= DETAIL_STEP / 2.0 + 1e-9);
            }

            #[test]
            fn scale_bounds_are_ordered(x in 0.0f64..=1.0, low_end in any::<bool>()) {
                let device = if low_end { DeviceClass::LowEnd } else { DeviceClass::Standard };
                let table = ProfileTable::new(device);
                let p = table.get(DetailLevel::quantize(x));
                prop_assert!(p.min_render_scale <= p.base_render_scale);
                prop_assert!(p.base_render_scale <= p.max_render_scale);
            }
        }
    }
}
