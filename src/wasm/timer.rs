use wasm_bindgen::{closure::Closure, JsCast};

use crate::error::{BackgroundError, Result};

/// A pending `setTimeout` callback. Dropping it cancels the callback if it
/// has not fired yet.
pub struct Timeout {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Timeout {
    pub fn schedule<F>(delay_ms: i32, callback: F) -> Result<Self>
    where
        F: FnMut() + 'static,
    {
        let window = web_sys::window().ok_or(BackgroundError::Js("no window".into()))?;
        let callback = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
        let handle = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            delay_ms,
        )?;
        Ok(Self {
            handle,
            _callback: callback,
        })
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_timeout_with_handle(self.handle);
        }
    }
}
