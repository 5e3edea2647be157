//! The adaptive render loop: frame pacing, frame-time smoothing, render
//! scale control and detail-level switching.
//!
//! Everything here is pure bookkeeping driven by timestamps. The browser
//! driver in `wasm::render` calls [`AdaptiveLoop::tick`] from
//! `requestAnimationFrame` and performs the GL work the returned
//! [`FrameStep`] asks for.

use crate::profile::{DetailLevel, ProfileTable, QualityProfile};

/// Weight kept from the previous smoothed frame time on every sample.
const SMOOTHING: f64 = 0.9;

/// Smallest internal render target edge.
const MIN_RENDER_EDGE: u32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Internal render target for this canvas size at `scale`.
    pub fn scaled(&self, scale: f64) -> Size {
        Size {
            width: ((self.width as f64 * scale).floor() as u32).max(MIN_RENDER_EDGE),
            height: ((self.height as f64 * scale).floor() as u32).max(MIN_RENDER_EDGE),
        }
    }
}

/// Lifecycle of the background.
///
/// `Uninitialized -> Loading -> Ready`; `ContextLost` and `Halted` are
/// terminal and stop the loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopPhase {
    #[default]
    Uninitialized,
    /// Shader assets in flight; a placeholder pattern is drawn.
    Loading,
    Ready,
    /// The initial program build failed.
    Halted,
    ContextLost,
}

impl LoopPhase {
    pub fn is_stopped(self) -> bool {
        matches!(self, LoopPhase::Halted | LoopPhase::ContextLost)
    }
}

/// Frame pacing knobs that do not depend on the detail level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopSettings {
    pub target_fps: f64,
    pub scale_step: f64,
    pub max_device_pixel_ratio: f64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            scale_step: 0.05,
            max_device_pixel_ratio: 1.0,
        }
    }
}

impl LoopSettings {
    /// Target duration of one frame.
    pub fn frame_budget_ms(&self) -> f64 {
        1000.0 / self.target_fps
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleChange {
    pub from: f64,
    pub to: f64,
}

impl ScaleChange {
    pub fn lowered(&self) -> bool {
        self.to < self.from
    }
}

/// Low-pass filtered frame time feeding a stepwise render scale controller.
#[derive(Clone, Debug)]
pub struct ScaleGovernor {
    budget_ms: f64,
    step: f64,
    scale: f64,
    smoothed_ms: f64,
    last_check_ms: f64,
}

impl ScaleGovernor {
    pub fn new(budget_ms: f64, step: f64, scale: f64) -> Self {
        Self {
            budget_ms,
            step,
            scale,
            smoothed_ms: budget_ms,
            last_check_ms: 0.0,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn smoothed_ms(&self) -> f64 {
        self.smoothed_ms
    }

    pub fn reset(&mut self, scale: f64) {
        self.scale = scale;
    }

    /// Fold in one frame duration. Once per `frame_check_ms` the smoothed
    /// value is compared against the budget and the scale moves one step.
    pub fn observe(&mut self, now_ms: f64, frame_ms: f64, profile: &QualityProfile) -> Option<ScaleChange> {
        self.smoothed_ms = self.smoothed_ms * SMOOTHING + frame_ms * (1.0 - SMOOTHING);

        if now_ms - self.last_check_ms <= profile.frame_check_ms as f64 {
            return None;
        }
        self.last_check_ms = now_ms;

        let from = self.scale;
        if self.smoothed_ms > self.budget_ms * profile.perf_drop_threshold
            && self.scale > profile.min_render_scale
        {
            self.scale = (self.scale - self.step).max(profile.min_render_scale);
        } else if self.smoothed_ms < self.budget_ms * profile.perf_rise_threshold
            && self.scale < profile.max_render_scale
        {
            self.scale = (self.scale + self.step).min(profile.max_render_scale);
        } else {
            return None;
        }
        Some(ScaleChange { from, to: self.scale })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPass {
    /// Cheap pattern straight to the canvas while assets load.
    Placeholder,
    /// Scene to the offscreen target, then tonemap to the canvas.
    Scene,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FramePlan {
    pub time_s: f64,
    pub pass: DrawPass,
    /// Set when this frame changed the render scale; the offscreen target
    /// must be reallocated before drawing.
    pub rescaled: Option<ScaleChange>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameStep {
    /// The loop is over; do not reschedule.
    Stop,
    Paused,
    /// Too early for the next frame under the frame-rate cap.
    Throttled,
    Draw(FramePlan),
}

impl FrameStep {
    pub fn reschedule(&self) -> bool {
        !matches!(self, FrameStep::Stop)
    }
}

/// Outcome of [`AdaptiveLoop::set_detail_level`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetailChange {
    pub level: DetailLevel,
    pub previous: DetailLevel,
    /// Shader programs must be rebuilt with the new tuning.
    pub rebuild: bool,
    /// The render target size was recomputed.
    pub resized: bool,
}

/// Single owner of all mutable render state.
#[derive(Clone, Debug)]
pub struct AdaptiveLoop {
    settings: LoopSettings,
    table: ProfileTable,
    level: DetailLevel,
    profile: QualityProfile,
    phase: LoopPhase,
    paused: bool,
    canvas: Size,
    render_target: Size,
    governor: ScaleGovernor,
    last_frame_ms: f64,
    /// The next drawn frame starts a new measurement instead of timing the
    /// gap since `last_frame_ms` (first frame, or first frame after a pause).
    rebaseline: bool,
}

impl AdaptiveLoop {
    pub fn new(settings: LoopSettings, table: ProfileTable) -> Self {
        let level = DetailLevel::MIN;
        let profile = *table.get(level);
        let governor = ScaleGovernor::new(
            settings.frame_budget_ms(),
            settings.scale_step,
            profile.base_render_scale,
        );
        Self {
            settings,
            table,
            level,
            profile,
            phase: LoopPhase::Uninitialized,
            paused: false,
            canvas: Size::default(),
            render_target: Size::default(),
            governor,
            last_frame_ms: 0.0,
            rebaseline: true,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn level(&self) -> DetailLevel {
        self.level
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    pub fn render_scale(&self) -> f64 {
        self.governor.scale()
    }

    pub fn smoothed_frame_ms(&self) -> f64 {
        self.governor.smoothed_ms()
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    pub fn render_target_size(&self) -> Size {
        self.render_target
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Time spent paused is never measured: resuming rebaselines the frame
    /// clock on the next drawn frame.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused && !paused {
            self.rebaseline = true;
        }
        self.paused = paused;
    }

    pub fn begin_loading(&mut self) {
        if self.phase == LoopPhase::Uninitialized {
            self.phase = LoopPhase::Loading;
        }
    }

    /// Full programs are linked; subsequent frames draw the scene.
    pub fn mark_ready(&mut self) {
        if !self.phase.is_stopped() {
            self.phase = LoopPhase::Ready;
        }
    }

    pub fn halt(&mut self) {
        if self.phase != LoopPhase::ContextLost {
            self.phase = LoopPhase::Halted;
        }
    }

    pub fn mark_context_lost(&mut self) {
        self.phase = LoopPhase::ContextLost;
    }

    /// Recompute canvas and render target sizes from the viewport.
    ///
    /// Returns the new canvas size, or `None` once the loop has stopped.
    pub fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Option<Size> {
        if self.phase.is_stopped() {
            return None;
        }
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        let dpr = dpr.min(self.settings.max_device_pixel_ratio);
        self.canvas = Size {
            width: ((css_width * dpr).floor().max(0.0) as u32).max(1),
            height: ((css_height * dpr).floor().max(0.0) as u32).max(1),
        };
        self.render_target = self.canvas.scaled(self.render_scale());
        Some(self.canvas)
    }

    /// One display refresh at `now_ms`.
    pub fn tick(&mut self, now_ms: f64) -> FrameStep {
        if self.phase.is_stopped() {
            return FrameStep::Stop;
        }
        if self.paused {
            return FrameStep::Paused;
        }
        let budget = self.settings.frame_budget_ms();
        let frame_ms = if self.rebaseline {
            self.rebaseline = false;
            budget
        } else {
            let elapsed = now_ms - self.last_frame_ms;
            if elapsed < budget {
                return FrameStep::Throttled;
            }
            elapsed
        };
        self.last_frame_ms = now_ms;

        let rescaled = self.governor.observe(now_ms, frame_ms, &self.profile);
        if let Some(change) = rescaled {
            log::debug!(
                "render scale {:.2} -> {:.2} (smoothed {:.1}ms)",
                change.from,
                change.to,
                self.governor.smoothed_ms()
            );
            self.render_target = self.canvas.scaled(change.to);
        }

        let pass = match self.phase {
            LoopPhase::Ready => DrawPass::Scene,
            _ => DrawPass::Placeholder,
        };
        FrameStep::Draw(FramePlan {
            time_s: now_ms * 0.001,
            pass,
            rescaled,
        })
    }

    /// Switch to the profile for `raw` (quantized to the nearest step).
    pub fn set_detail_level(&mut self, raw: f64, reset_scale: bool) -> DetailChange {
        let previous = self.level;
        let level = DetailLevel::quantize(raw);
        let changed = level != previous;

        self.level = level;
        self.profile = *self.table.get(level);

        if reset_scale || changed {
            self.governor.reset(self.profile.base_render_scale);
        } else {
            let clamped = self.profile.clamp_scale(self.governor.scale());
            self.governor.reset(clamped);
        }

        let stopped = self.phase.is_stopped();
        let resized = !stopped && !self.canvas.is_empty();
        if resized {
            self.render_target = self.canvas.scaled(self.render_scale());
        }

        DetailChange {
            level,
            previous,
            rebuild: changed && !stopped,
            resized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::DeviceClass;

    fn new_loop() -> AdaptiveLoop {
        let mut lp = AdaptiveLoop::new(LoopSettings::default(), ProfileTable::new(DeviceClass::Standard));
        lp.begin_loading();
        lp
    }

    #[test]
    fn size_scaling_floors_and_keeps_minimum() {
        assert_eq!(Size::new(1920, 1080).scaled(0.5), Size::new(960, 540));
        assert_eq!(Size::new(101, 51).scaled(0.5), Size::new(50, 25));
        assert_eq!(Size::new(3, 1).scaled(0.5), Size::new(2, 2));
    }

    #[test]
    fn resize_caps_device_pixel_ratio() {
        let mut lp = new_loop();
        let canvas = lp.resize(1280.0, 720.0, 2.0).unwrap();
        assert_eq!(canvas, Size::new(1280, 720));
        assert_eq!(lp.render_target_size(), Size::new(921, 518));
    }

    #[test]
    fn resize_treats_missing_ratio_as_one() {
        let mut lp = new_loop();
        assert_eq!(lp.resize(0.4, 10.0, f64::NAN), Some(Size::new(1, 10)));
    }

    #[test]
    fn throttles_frames_under_the_cap() {
        let mut lp = new_loop();
        assert!(matches!(lp.tick(16.0), FrameStep::Draw(_)));
        assert_eq!(lp.tick(40.0), FrameStep::Throttled);
        assert!(matches!(lp.tick(50.0), FrameStep::Draw(_)));
        assert_eq!(lp.tick(80.0), FrameStep::Throttled);
        assert!(matches!(lp.tick(90.0), FrameStep::Draw(_)));
    }

    #[test]
    fn paused_loop_neither_draws_nor_measures() {
        let mut lp = new_loop();
        lp.set_paused(true);
        let before = lp.smoothed_frame_ms();
        for t in 1..50 {
            assert_eq!(lp.tick(t as f64 * 100.0), FrameStep::Paused);
        }
        assert_eq!(lp.smoothed_frame_ms(), before);
        lp.set_paused(false);
        assert!(matches!(lp.tick(6000.0), FrameStep::Draw(_)));
        // The 6 s gap is not a frame.
        assert!((lp.smoothed_frame_ms() - before).abs() < 1e-9);
    }

    #[test]
    fn first_frame_is_not_timed_from_zero() {
        let mut lp = new_loop();
        let before = lp.smoothed_frame_ms();
        assert!(matches!(lp.tick(4500.0), FrameStep::Draw(_)));
        assert!((lp.smoothed_frame_ms() - before).abs() < 1e-9);
    }

    #[test]
    fn draw_pass_follows_phase() {
        let mut lp = new_loop();
        match lp.tick(100.0) {
            FrameStep::Draw(plan) => assert_eq!(plan.pass, DrawPass::Placeholder),
            other => panic!("unexpected {:?}", other),
        }
        lp.mark_ready();
        match lp.tick(200.0) {
            FrameStep::Draw(plan) => {
                assert_eq!(plan.pass, DrawPass::Scene);
                assert!((plan.time_s - 0.2).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn context_loss_is_terminal() {
        let mut lp = new_loop();
        lp.mark_ready();
        lp.mark_context_lost();
        assert_eq!(lp.tick(1000.0), FrameStep::Stop);
        assert!(!lp.tick(2000.0).reschedule());
        lp.mark_ready();
        assert_eq!(lp.phase(), LoopPhase::ContextLost);
        assert_eq!(lp.resize(800.0, 600.0, 1.0), None);
    }

    #[test]
    fn halt_stops_the_loop() {
        let mut lp = new_loop();
        lp.halt();
        assert_eq!(lp.tick(1000.0), FrameStep::Stop);
    }

    #[test]
    fn smoothing_is_exponential() {
        let mut gov = ScaleGovernor::new(1000.0 / 30.0, 0.05, 0.72);
        let profile = *ProfileTable::new(DeviceClass::Standard).get(DetailLevel::MIN);
        gov.observe(100.0, 100.0, &profile);
        let expected = (1000.0 / 30.0) * 0.9 + 100.0 * 0.1;
        assert!((gov.smoothed_ms() - expected).abs() < 1e-9);
    }

    #[test]
    fn checks_only_after_interval() {
        let profile = *ProfileTable::new(DeviceClass::Standard).get(DetailLevel::MIN);
        let mut gov = ScaleGovernor::new(1000.0 / 30.0, 0.05, 0.72);
        gov.smoothed_ms = 200.0;
        assert_eq!(gov.observe(700.0, 200.0, &profile), None);
        let change = gov.observe(701.0, 200.0, &profile).unwrap();
        assert!(change.lowered());
        assert_eq!(gov.observe(1200.0, 200.0, &profile), None);
    }

    #[test]
    fn detail_change_signals_rebuild_once() {
        let mut lp = new_loop();
        let first = lp.set_detail_level(0.42, true);
        assert!(first.rebuild);
        assert_eq!(first.level, DetailLevel::from_index(42));
        assert_eq!(first.previous, DetailLevel::MIN);

        let again = lp.set_detail_level(0.42, true);
        assert!(!again.rebuild);
        let nearby = lp.set_detail_level(0.4249, true);
        assert!(!nearby.rebuild);
    }

    #[test]
    fn stopped_loop_never_asks_for_programs() {
        for stop in [AdaptiveLoop::halt as fn(&mut AdaptiveLoop), AdaptiveLoop::mark_context_lost] {
            let mut lp = new_loop();
            lp.resize(800.0, 600.0, 1.0);
            stop(&mut lp);
            let change = lp.set_detail_level(0.8, true);
            assert_eq!(change.level, DetailLevel::from_index(80));
            assert!(!change.rebuild);
            assert!(!change.resized);
        }
    }

    #[test]
    fn level_change_resets_scale_to_base() {
        let mut lp = new_loop();
        lp.resize(1000.0, 500.0, 1.0);
        lp.governor.reset(0.55);
        let change = lp.set_detail_level(0.5, false);
        assert!(change.resized);
        assert_eq!(lp.render_scale(), lp.profile().base_render_scale);
        assert_eq!(lp.render_target_size(), Size::new(860, 430));
    }

    #[test]
    fn same_level_without_reset_clamps_scale() {
        let mut lp = new_loop();
        lp.governor.reset(0.3);
        let change = lp.set_detail_level(0.0, false);
        assert!(!change.rebuild);
        assert!(!change.resized);
        assert_eq!(lp.render_scale(), lp.profile().min_render_scale);
    }

    #[test]
    fn same_level_with_reset_restores_base() {
        let mut lp = new_loop();
        lp.governor.reset(0.55);
        lp.set_detail_level(0.0, true);
        assert_eq!(lp.render_scale(), 0.72);
    }
}
