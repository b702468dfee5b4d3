//! Page startup: settings, cache migration, button wiring.

use crate::api::{ApiClient, FetchTransport};
use crate::config::ClientConfig;
use crate::handlers::Handlers;
use crate::storage::{IndexedDbStore, StorageConfig};
use crate::ui::dom::{CHECK_BUTTON_ID, SUBMIT_KEY_BUTTON_ID};
use crate::ui::DomView;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type PageHandlers = Handlers<FetchTransport, IndexedDbStore, DomView>;

pub async fn run() -> Result<(), JsValue> {
    let config = ClientConfig::load();
    tracing::info!(
        "Starting with API {:?} at '{}'",
        config.api_version,
        config.base_url
    );

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document"))?;

    // Migrations run once here; handlers reuse the open connection.
    let store = if config.persist_results {
        match IndexedDbStore::open(StorageConfig::default()).await {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("Result cache disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let client = ApiClient::new(FetchTransport, config.base_url, config.api_version);
    let view = DomView::new(document.clone());
    let handlers = Rc::new(Handlers::new(client, store, view));

    bind_click(&document, SUBMIT_KEY_BUTTON_ID, &handlers, |h| async move {
        h.submit_api_key().await
    })?;
    bind_click(&document, CHECK_BUTTON_ID, &handlers, |h| async move {
        h.check_device().await
    })?;

    Ok(())
}

/// Spawns `action` on every click of `#id`. A missing button is logged and
/// skipped so the other one still works.
fn bind_click<F, Fut>(
    document: &web_sys::Document,
    id: &str,
    handlers: &Rc<PageHandlers>,
    action: F,
) -> Result<(), JsValue>
where
    F: Fn(Rc<PageHandlers>) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let Some(button) = document.get_element_by_id(id) else {
        tracing::warn!("Button #{} not found", id);
        return Ok(());
    };

    let handlers = handlers.clone();
    let onclick = Closure::<dyn FnMut()>::new(move || {
        wasm_bindgen_futures::spawn_local(action(handlers.clone()));
    });
    button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
    onclick.forget(); // Listener lives as long as the page

    Ok(())
}
