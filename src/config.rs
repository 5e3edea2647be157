//! Page-level configuration.
//!
//! Defaults suit the stock page; any field can be overridden from `data-*`
//! attributes on the canvas element (see [`BackgroundConfig::apply_overrides`]).

use std::str::FromStr;

use crate::adaptive::LoopSettings;
use crate::profile::DetailLevel;

/// Content hash of `static/`, stamped by build.rs.
pub const ASSET_VERSION: &str = env!("ASSET_VERSION");

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundConfig {
    pub canvas_id: String,
    pub detail_slider_id: String,
    pub detail_label_id: String,
    /// Element whose open state pauses rendering.
    pub pause_element_id: String,
    pub pause_class: String,
    /// Base path of shaders and textures, without trailing slash.
    pub asset_base: String,
    /// Appended to every asset URL as `?v=`.
    pub asset_version: String,
    pub target_fps: f64,
    pub scale_step: f64,
    pub max_device_pixel_ratio: f64,
    pub initial_detail: DetailLevel,
    pub detail_debounce_ms: i32,
    /// Upper bound on waiting for an idle callback before loading assets.
    pub idle_load_timeout_ms: u32,
    /// Load delay used when `requestIdleCallback` is unavailable.
    pub fallback_load_delay_ms: i32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            canvas_id: "myCanvas".into(),
            detail_slider_id: "detailSlider".into(),
            detail_label_id: "detailValue".into(),
            pause_element_id: "blazModal".into(),
            pause_class: "is-open".into(),
            asset_base: "bhsim".into(),
            asset_version: ASSET_VERSION.into(),
            target_fps: 30.0,
            scale_step: 0.05,
            max_device_pixel_ratio: 1.0,
            initial_detail: DetailLevel::MIN,
            detail_debounce_ms: 120,
            idle_load_timeout_ms: 2000,
            fallback_load_delay_ms: 800,
        }
    }
}

impl BackgroundConfig {
    /// Apply overrides looked up by attribute name (`data-target-fps`, ...).
    /// Values that fail to parse or fall out of range are logged and skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_attr::<f64>(&lookup, "data-target-fps")
            .filter(|v| check(*v > 0.0 && *v <= 240.0, "data-target-fps"))
        {
            self.target_fps = v;
        }
        if let Some(v) = parse_attr::<f64>(&lookup, "data-scale-step")
            .filter(|v| check(*v > 0.0 && *v < 1.0, "data-scale-step"))
        {
            self.scale_step = v;
        }
        if let Some(v) = parse_attr::<f64>(&lookup, "data-max-dpr")
            .filter(|v| check(*v > 0.0, "data-max-dpr"))
        {
            self.max_device_pixel_ratio = v;
        }
        if let Some(v) = parse_attr::<f64>(&lookup, "data-detail") {
            self.initial_detail = DetailLevel::quantize(v);
        }
        if let Some(base) = lookup("data-asset-base") {
            self.asset_base = base.trim_end_matches('/').to_string();
        }
        if let Some(version) = lookup("data-asset-version").filter(|v| !v.is_empty()) {
            self.asset_version = version;
        }
    }

    /// URL of `path` under the asset base with the cache-busting version.
    pub fn asset_url(&self, path: &str) -> String {
        if self.asset_base.is_empty() {
            format!("{}?v={}", path, self.asset_version)
        } else {
            format!("{}/{}?v={}", self.asset_base, path, self.asset_version)
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            target_fps: self.target_fps,
            scale_step: self.scale_step,
            max_device_pixel_ratio: self.max_device_pixel_ratio,
        }
    }
}

fn parse_attr<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

fn check(ok: bool, name: &str) -> bool {
    if !ok {
        log::warn!("ignoring {}: out of range", name);
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn default_asset_urls_are_versioned() {
        let mut cfg = BackgroundConfig::default();
        cfg.asset_version = "20260209-84".into();
        assert_eq!(
            cfg.asset_url("shader/simple.vert"),
            "bhsim/shader/simple.vert?v=20260209-84"
        );
        assert!(!ASSET_VERSION.is_empty());
    }

    #[test]
    fn overrides_replace_defaults() {
        let map = attrs(&[
            ("data-target-fps", "60"),
            ("data-scale-step", "0.1"),
            ("data-max-dpr", "2"),
            ("data-detail", "0.333"),
            ("data-asset-base", "/static/bh/"),
            ("data-asset-version", "abc"),
        ]);
        let mut cfg = BackgroundConfig::default();
        cfg.apply_overrides(|k| map.get(k).cloned());

        assert_eq!(cfg.target_fps, 60.0);
        assert_eq!(cfg.scale_step, 0.1);
        assert_eq!(cfg.max_device_pixel_ratio, 2.0);
        assert_eq!(cfg.initial_detail, DetailLevel::from_index(33));
        assert_eq!(cfg.asset_url("a.png"), "/static/bh/a.png?v=abc");
        assert!((cfg.loop_settings().frame_budget_ms() - 1000.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let map = attrs(&[
            ("data-target-fps", "fast"),
            ("data-scale-step", "4"),
            ("data-max-dpr", "-1"),
            ("data-asset-version", ""),
        ]);
        let mut cfg = BackgroundConfig::default();
        cfg.apply_overrides(|k| map.get(k).cloned());
        assert_eq!(cfg, BackgroundConfig::default());
    }

    #[test]
    fn empty_base_yields_relative_urls() {
        let mut cfg = BackgroundConfig::default();
        cfg.asset_base.clear();
        cfg.asset_version = "1".into();
        assert_eq!(cfg.asset_url("x.frag"), "x.frag?v=1");
    }
}
