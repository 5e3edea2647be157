use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Document, Event, HtmlElement, HtmlInputElement};

use super::render::SharedBackground;
use super::timer::Timeout;
use crate::config::BackgroundConfig;
use crate::detail::{DetailPipeline, DetailPreview};
use crate::error::{BackgroundError, Result};
use crate::profile::DetailLevel;

struct DetailControls {
    slider: HtmlInputElement,
    label: Option<HtmlElement>,
    pipeline: DetailPipeline,
    pending: Option<Timeout>,
    debounce_ms: i32,
}

impl DetailControls {
    fn show(&self, preview: &DetailPreview) {
        if let Some(label) = &self.label {
            label.set_text_content(Some(&preview.label));
        }
        let _ = self.slider.set_attribute("aria-valuenow", &preview.label);
    }

    fn sync(&self, level: DetailLevel) {
        self.slider.set_value(&level.to_string());
        self.show(&level.into());
    }
}

type SharedControls = Rc<RefCell<DetailControls>>;

/// Wire the detail slider to the background and apply the initial level.
/// Without a slider the initial level is applied and nothing else happens.
pub fn install(background: &SharedBackground, document: &Document, config: &BackgroundConfig) -> Result<()> {
    let slider = document
        .get_element_by_id(&config.detail_slider_id)
        .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());
    let Some(slider) = slider else {
        log::info!(
            "{}; detail fixed at {}",
            BackgroundError::MissingElement(config.detail_slider_id.clone()),
            config.initial_detail
        );
        background.borrow_mut().apply_detail(config.initial_detail.value(), true);
        return Ok(());
    };
    let label = document
        .get_element_by_id(&config.detail_label_id)
        .and_then(|el| el.dyn_into::<HtmlElement>().ok());

    let controls: SharedControls = Rc::new(RefCell::new(DetailControls {
        slider: slider.clone(),
        label,
        pipeline: DetailPipeline::new(),
        pending: None,
        debounce_ms: config.detail_debounce_ms,
    }));
    apply(&controls, background, config.initial_detail);

    // Live preview; the profile switch waits for the input to go quiet.
    let on_input = {
        let controls = controls.clone();
        let background = background.clone();
        Closure::wrap(Box::new(move |_event: Event| {
            let mut c = controls.borrow_mut();
            let raw = c.slider.value();
            let preview = c.pipeline.input(&raw);
            c.show(&preview);

            let weak = Rc::downgrade(&controls);
            let background = background.clone();
            match Timeout::schedule(c.debounce_ms, move || settle(&weak, &background)) {
                // Replacing the old timeout cancels it.
                Ok(timer) => c.pending = Some(timer),
                Err(err) => log::warn!("detail debounce unavailable: {}", err),
            }
        }) as Box<dyn FnMut(Event)>)
    };
    slider.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())?;
    on_input.forget();

    let on_change = {
        let controls = controls.clone();
        let background = background.clone();
        Closure::wrap(Box::new(move |_event: Event| {
            let level = {
                let mut c = controls.borrow_mut();
                c.pending = None;
                let raw = c.slider.value();
                c.pipeline.commit(&raw)
            };
            apply(&controls, &background, level);
        }) as Box<dyn FnMut(Event)>)
    };
    slider.add_event_listener_with_callback("change", on_change.as_ref().unchecked_ref())?;
    on_change.forget();
    Ok(())
}

// Runs inside the pending timeout's own callback, so `pending` is left
// alone here; the next input or change replaces it.
fn settle(controls: &Weak<RefCell<DetailControls>>, background: &SharedBackground) {
    let Some(controls) = controls.upgrade() else {
        return;
    };
    let level = controls.borrow_mut().pipeline.settle();
    if let Some(level) = level {
        apply(&controls, background, level);
    }
}

fn apply(controls: &SharedControls, background: &SharedBackground, level: DetailLevel) {
    let change = background.borrow_mut().apply_detail(level.value(), true);
    controls.borrow().sync(change.level);
}
