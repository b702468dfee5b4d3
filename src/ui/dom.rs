//! [`View`] over the live document.

use super::{PanelUpdate, View};
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, HtmlInputElement};

pub const API_KEY_INPUT_ID: &str = "apiKeyInput";
pub const SUBMIT_KEY_BUTTON_ID: &str = "btnEnviarApiKey";
pub const CHECK_BUTTON_ID: &str = "btnVerificarAdb";

const SPINNER_SELECTOR: &str = "#btnVerificarAdb .spinner";

#[derive(Clone)]
pub struct DomView {
    document: Document,
}

impl DomView {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl View for DomView {
    fn api_key_input(&self) -> String {
        self.document
            .get_element_by_id(API_KEY_INPUT_ID)
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.value())
            .unwrap_or_default()
    }

    fn render(&self, update: &PanelUpdate) {
        let id = update.panel.element_id();
        match self.document.get_element_by_id(id) {
            Some(el) => el.set_inner_html(&update.html),
            None => tracing::warn!("Panel #{} not found, dropping update", id),
        }
    }

    fn set_loading(&self, loading: bool) {
        // The spinner is optional markup.
        if let Ok(Some(el)) = self.document.query_selector(SPINNER_SELECTOR) {
            if let Ok(spinner) = el.dyn_into::<HtmlElement>() {
                spinner.set_hidden(!loading);
            }
        }
    }
}
