use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Element, MutationObserver, MutationObserverInit};

use crate::error::Result;

/// Call `on_change` with whether `element` carries `class`, now and after
/// every change to its class attribute. The observer lives as long as the
/// page.
pub fn watch_class<F>(element: Element, class: String, on_change: F) -> Result<()>
where
    F: Fn(bool) + 'static,
{
    on_change(element.class_list().contains(&class));

    let observed = element.clone();
    let callback = Closure::wrap(Box::new(move |_records: js_sys::Array, _observer: MutationObserver| {
        on_change(observed.class_list().contains(&class));
    }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_attributes(true);
    init.set_attribute_filter(&js_sys::Array::of1(&"class".into()));
    observer.observe_with_options(&element, &init)?;

    callback.forget();
    Ok(())
}
