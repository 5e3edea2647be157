use web_sys::{Document, HtmlElement};
use wasm_bindgen::JsCast;

use crate::error::Result;

const OVERLAY_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("left", "12px"),
    ("top", "12px"),
    ("right", "12px"),
    ("max-height", "45vh"),
    ("overflow", "auto"),
    ("background", "rgba(0,0,0,0.75)"),
    ("color", "#ffccaa"),
    ("padding", "10px 12px"),
    ("font-size", "12px"),
    ("z-index", "9999"),
    ("border", "1px solid rgba(255,204,170,0.35)"),
];

/// On-page `<pre>` for errors that would otherwise only reach the console.
/// Created on first use.
pub struct DiagnosticOverlay {
    document: Document,
    element: Option<HtmlElement>,
}

impl DiagnosticOverlay {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            element: None,
        }
    }

    pub fn show(&mut self, message: &str) -> Result<()> {
        let element = match &self.element {
            Some(el) => el.clone(),
            None => {
                let el: HtmlElement = self.document.create_element("pre")?.unchecked_into();
                let style = el.style();
                for (name, value) in OVERLAY_STYLE {
                    style.set_property(name, value)?;
                }
                if let Some(body) = self.document.body() {
                    body.append_child(&el)?;
                }
                self.element = Some(el.clone());
                el
            }
        };
        element.set_text_content(Some(message));
        Ok(())
    }
}
