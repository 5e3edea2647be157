use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{
    window, Document, HtmlCanvasElement, WebGl2RenderingContext as GL, WebGlContextAttributes,
    WebGlPowerPreference, WebGlTexture,
};

use super::assets::SceneImages;
use super::gl::{bind_texture_unit, placeholder_texture, upload_image, Quad, RenderTarget};
use super::overlay::DiagnosticOverlay;
use super::programs::{
    placeholder_program, PlaceholderProgram, ScenePrograms, COLOR_MAP_UNIT, GALAXY_UNIT, SCENE_UNIT,
};
use crate::adaptive::{AdaptiveLoop, DetailChange, DrawPass, FrameStep};
use crate::camera::{CameraPath, JetTuning};
use crate::config::BackgroundConfig;
use crate::error::{BackgroundError, Result};
use crate::profile::{DeviceClass, ProfileTable};
use crate::shader::{ShaderSources, ShaderTuning};
use crate::uniforms::{MainFrameUniforms, MainStaticUniforms, PlaceholderUniforms, ToneFrameUniforms};

pub type SharedBackground = Rc<RefCell<Background>>;

/// Environment and color lookup maps sampled by the scene program.
struct SceneTextures {
    galaxy: WebGlTexture,
    color_map: WebGlTexture,
}

/// Everything the render loop touches, owned in one place.
pub struct Background {
    gl: GL,
    canvas: HtmlCanvasElement,
    adaptive: AdaptiveLoop,
    camera: CameraPath,
    jets: JetTuning,
    quad: Quad,
    placeholder: PlaceholderProgram,
    scene: Option<ScenePrograms>,
    sources: Option<ShaderSources>,
    target: RenderTarget,
    textures: SceneTextures,
    overlay: DiagnosticOverlay,
    frame_request: Option<i32>,
}

impl Background {
    fn new(gl: GL, canvas: HtmlCanvasElement, document: Document, config: &BackgroundConfig, device: DeviceClass) -> Result<Self> {
        let adaptive = AdaptiveLoop::new(config.loop_settings(), ProfileTable::new(device));
        let quad = Quad::new(&gl)?;
        let placeholder = placeholder_program(&gl)?;
        let target = RenderTarget::new(&gl, adaptive.render_target_size())?;
        let textures = SceneTextures {
            galaxy: placeholder_texture(&gl, true)?,
            color_map: placeholder_texture(&gl, false)?,
        };
        Ok(Self {
            gl,
            canvas,
            adaptive,
            camera: CameraPath::default(),
            jets: JetTuning::default(),
            quad,
            placeholder,
            scene: None,
            sources: None,
            target,
            textures,
            overlay: DiagnosticOverlay::new(document),
            frame_request: None,
        })
    }

    /// Match the canvas to the viewport and reallocate the render target.
    pub fn handle_resize(&mut self) -> Result<()> {
        let window = window().ok_or(BackgroundError::Js("no window".into()))?;
        let width = window.inner_width()?.as_f64().unwrap_or(0.0);
        let height = window.inner_height()?.as_f64().unwrap_or(0.0);
        let Some(size) = self.adaptive.resize(width, height, window.device_pixel_ratio()) else {
            return Ok(());
        };
        self.canvas.set_width(size.width);
        self.canvas.set_height(size.height);
        self.target.resize(&self.gl, self.adaptive.render_target_size())
    }

    /// Run one animation frame.
    fn frame(&mut self, now_ms: f64) -> FrameStep {
        let step = self.adaptive.tick(now_ms);
        let FrameStep::Draw(plan) = step else {
            return step;
        };
        if plan.rescaled.is_some() {
            if let Err(err) = self.target.resize(&self.gl, self.adaptive.render_target_size()) {
                log::error!("render target reallocation failed: {}", err);
            }
        }

        self.gl.disable(GL::DEPTH_TEST);
        match (plan.pass, self.scene.as_mut()) {
            (DrawPass::Scene, Some(scene)) => {
                let target = self.target.size();
                let pose = self.camera.pose(plan.time_s);
                let jet_strength = self.jets.strength(plan.time_s);

                scene.main.bind(&self.gl);
                self.gl.bind_framebuffer(GL::FRAMEBUFFER, Some(self.target.framebuffer()));
                self.gl.viewport(0, 0, target.width as i32, target.height as i32);
                let block = MainFrameUniforms::new((target.width, target.height), plan.time_s, &pose, jet_strength);
                scene.main.set_frame(&self.gl, &block);
                bind_texture_unit(&self.gl, GALAXY_UNIT, &self.textures.galaxy);
                bind_texture_unit(&self.gl, COLOR_MAP_UNIT, &self.textures.color_map);
                self.quad.draw(&self.gl);

                let canvas = self.adaptive.canvas_size();
                scene.tone.bind(&self.gl);
                self.gl.bind_framebuffer(GL::FRAMEBUFFER, None);
                self.gl.viewport(0, 0, canvas.width as i32, canvas.height as i32);
                let block = ToneFrameUniforms {
                    resolution: [canvas.width as f32, canvas.height as f32],
                };
                scene.tone.set_frame(&self.gl, &block);
                bind_texture_unit(&self.gl, SCENE_UNIT, self.target.texture());
                self.quad.draw(&self.gl);
            }
            _ => {
                let canvas = self.adaptive.canvas_size();
                self.placeholder.bind(&self.gl);
                self.gl.bind_framebuffer(GL::FRAMEBUFFER, None);
                self.gl.viewport(0, 0, canvas.width as i32, canvas.height as i32);
                let block = PlaceholderUniforms {
                    resolution: [canvas.width as f32, canvas.height as f32],
                    time: plan.time_s as f32,
                };
                self.placeholder.set_frame(&self.gl, &block);
                self.quad.draw(&self.gl);
            }
        }
        step
    }

    /// Commit a detail level from the slider (or startup).
    pub fn apply_detail(&mut self, raw: f64, reset_scale: bool) -> DetailChange {
        let change = self.adaptive.set_detail_level(raw, reset_scale);
        if self.adaptive.phase().is_stopped() {
            log::debug!("detail {} ignored; rendering has stopped", change.level);
            return change;
        }
        let statics = MainStaticUniforms::for_profile(self.adaptive.profile());

        if change.rebuild && self.sources.is_some() {
            if let Err(err) = self.rebuild_programs() {
                log::error!("detail switch to {} failed: {}", change.level, err);
            }
        } else if let Some(scene) = &self.scene {
            scene.update_statics(&self.gl, &statics);
        }

        if change.resized {
            if let Err(err) = self.target.resize(&self.gl, self.adaptive.render_target_size()) {
                log::error!("render target reallocation failed: {}", err);
            }
        }
        log::info!(
            "detail {} -> {} (scale {:.2}, {} iterations)",
            change.previous,
            change.level,
            self.adaptive.render_scale(),
            self.adaptive.profile().trace_iterations
        );
        change
    }

    /// Link programs for the active profile. The previous set is released
    /// only once the new one has linked.
    fn rebuild_programs(&mut self) -> Result<()> {
        let Some(sources) = &self.sources else {
            return Ok(());
        };
        let profile = self.adaptive.profile();
        let prepared = sources.prepare(&ShaderTuning::from(profile));
        let next = ScenePrograms::build(&self.gl, &prepared, &MainStaticUniforms::for_profile(profile))?;
        if let Some(old) = self.scene.replace(next) {
            old.delete(&self.gl);
        }
        log::debug!("scene programs built for detail {}", self.adaptive.level());
        Ok(())
    }

    pub fn install_sources(&mut self, sources: ShaderSources) -> Result<()> {
        self.sources = Some(sources);
        self.rebuild_programs()?;
        self.adaptive.mark_ready();
        log::info!("scene shaders ready");
        Ok(())
    }

    pub fn install_images(&mut self, images: &SceneImages) -> Result<()> {
        upload_image(&self.gl, &self.textures.galaxy, &images.galaxy)?;
        upload_image(&self.gl, &self.textures.color_map, &images.color_map)?;
        log::info!("scene textures ready");
        Ok(())
    }

    /// Surface an error on the page; fatal ones halt the loop.
    pub fn report(&mut self, err: &BackgroundError) {
        log::error!("background failed: {}", err);
        if let Err(shown) = self.overlay.show(&failure_message(err)) {
            log::warn!("diagnostic overlay unavailable: {}", shown);
        }
        if err.halts_rendering() {
            self.adaptive.halt();
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.adaptive.is_paused() != paused {
            log::debug!("rendering {}", if paused { "paused" } else { "resumed" });
        }
        self.adaptive.set_paused(paused);
    }

    fn on_context_lost(&mut self) {
        log::warn!("WebGL context lost; rendering stopped");
        self.adaptive.mark_context_lost();
        if let (Some(id), Some(window)) = (self.frame_request.take(), window()) {
            let _ = window.cancel_animation_frame(id);
        }
    }
}

fn failure_message(err: &BackgroundError) -> String {
    let file_hint = err.is_cross_origin()
        && window()
            .and_then(|w| w.location().protocol().ok())
            .is_some_and(|p| p == "file:");
    if file_hint {
        format!("Blackhole init failed:\n{} (Tip: open via a local server, not file://)", err)
    } else {
        format!("Blackhole init failed:\n{}", err)
    }
}

fn context(canvas: &HtmlCanvasElement) -> Result<Option<GL>> {
    let attrs = WebGlContextAttributes::new();
    attrs.set_antialias(false);
    attrs.set_alpha(false);
    attrs.set_premultiplied_alpha(false);
    attrs.set_preserve_drawing_buffer(false);
    attrs.set_power_preference(WebGlPowerPreference::HighPerformance);
    match canvas.get_context_with_context_options("webgl2", &attrs)? {
        Some(ctx) => ctx
            .dyn_into::<GL>()
            .map(Some)
            .map_err(|_| BackgroundError::SurfaceUnavailable),
        None => Ok(None),
    }
}

fn device_class(window: &web_sys::Window) -> DeviceClass {
    let navigator = window.navigator();
    let memory = js_sys::Reflect::get(&navigator, &JsValue::from_str("deviceMemory"))
        .ok()
        .and_then(|v| v.as_f64());
    DeviceClass::classify(Some(navigator.hardware_concurrency()), memory)
}

/// Create the background on `canvas` and start its render loop.
///
/// Without WebGL2 the canvas falls back to a static black fill.
pub fn start(canvas: HtmlCanvasElement, config: BackgroundConfig) -> Result<()> {
    let window = window().ok_or(BackgroundError::Js("no window".into()))?;
    let document = window.document().ok_or(BackgroundError::Js("no document".into()))?;

    let Some(gl) = context(&canvas)? else {
        log::warn!("{}; using static fallback", BackgroundError::SurfaceUnavailable);
        canvas.style().set_property("background", "black")?;
        return Ok(());
    };

    let device = device_class(&window);
    log::info!("starting background ({:?} device)", device);
    let background = match Background::new(gl, canvas.clone(), document.clone(), &config, device) {
        Ok(bg) => Rc::new(RefCell::new(bg)),
        Err(err) => {
            let _ = DiagnosticOverlay::new(document).show(&failure_message(&err));
            canvas.style().set_property("background", "black")?;
            return Err(err);
        }
    };

    super::controls::install(&background, &document, &config)?;
    {
        let mut bg = background.borrow_mut();
        bg.adaptive.begin_loading();
        bg.handle_resize()?;
    }

    // Resize canvas to fit window
    let resize_closure = {
        let background = background.clone();
        Closure::wrap(Box::new(move || {
            let resized = background.borrow_mut().handle_resize();
            if let Err(err) = resized {
                log::error!("resize failed: {}", err);
            }
        }) as Box<dyn FnMut()>)
    };
    window.add_event_listener_with_callback("resize", resize_closure.as_ref().unchecked_ref())?;
    resize_closure.forget();

    if let Some(element) = document.get_element_by_id(&config.pause_element_id) {
        let background = background.clone();
        super::pause::watch_class(element, config.pause_class.clone(), move |open| {
            background.borrow_mut().set_paused(open);
        })?;
    }

    watch_context(&canvas, &background)?;
    run(background.clone())?;
    super::assets::schedule_load(background, config)
}

/// Context loss stops the loop; a restored context reloads the page.
fn watch_context(canvas: &HtmlCanvasElement, background: &SharedBackground) -> Result<()> {
    let lost = {
        let background = background.clone();
        Closure::wrap(Box::new(move |event: web_sys::Event| {
            event.prevent_default();
            background.borrow_mut().on_context_lost();
        }) as Box<dyn FnMut(web_sys::Event)>)
    };
    canvas.add_event_listener_with_callback("webglcontextlost", lost.as_ref().unchecked_ref())?;
    lost.forget();

    let restored = Closure::wrap(Box::new(move || {
        if let Some(window) = window() {
            let _ = window.location().reload();
        }
    }) as Box<dyn FnMut()>);
    canvas.add_event_listener_with_callback("webglcontextrestored", restored.as_ref().unchecked_ref())?;
    restored.forget();
    Ok(())
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

fn request_frame(callback: &FrameCallback) -> Result<i32> {
    let window = window().ok_or(BackgroundError::Js("no window".into()))?;
    let slot = callback.borrow();
    let closure = slot.as_ref().ok_or(BackgroundError::Resource("frame callback"))?;
    Ok(window.request_animation_frame(closure.as_ref().unchecked_ref())?)
}

/// Animation loop
fn run(background: SharedBackground) -> Result<()> {
    // `f` holds the animation-frame closure so that we can keep calling
    // `request_animation_frame` recursively. Storing it inside an `Option`
    // allows us to create the `Closure` first and then obtain a reference to
    // it from within itself.
    let f: FrameCallback = Rc::new(RefCell::new(None));
    let g = f.clone();
    let bg = background.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
        let step = bg.borrow_mut().frame(now);
        if !step.reschedule() {
            return;
        }

        // schedule next
        match request_frame(&f) {
            Ok(id) => bg.borrow_mut().frame_request = Some(id),
            Err(err) => log::error!("requestAnimationFrame failed: {}", err),
        }
    }) as Box<dyn FnMut(f64)>));

    let id = request_frame(&g)?;
    background.borrow_mut().frame_request = Some(id);
    Ok(())
}
