//! Presentation layer.
//!
//! `view` holds the page-independent view models; `dom` applies them to the
//! real document on WASM.

#[cfg(target_arch = "wasm32")]
pub mod dom;
pub mod view;

#[cfg(target_arch = "wasm32")]
pub use dom::DomView;
pub use view::{Panel, PanelUpdate};

/// What handlers need from the page.
pub trait View {
    /// Current API key input as typed. Empty if the field is missing.
    fn api_key_input(&self) -> String;

    /// Replaces a panel's content.
    fn render(&self, update: &PanelUpdate);

    /// Shows or hides the device-check spinner.
    fn set_loading(&self, loading: bool);
}

/// Shows the loading indicator until dropped.
pub struct LoadingGuard<'a, V: View> {
    view: &'a V,
}

impl<'a, V: View> LoadingGuard<'a, V> {
    pub fn show(view: &'a V) -> Self {
        view.set_loading(true);
        Self { view }
    }
}

impl<V: View> Drop for LoadingGuard<'_, V> {
    fn drop(&mut self) {
        self.view.set_loading(false);
    }
}
