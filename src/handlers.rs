//! Button actions.
//!
//! Each invocation is independent: nothing is queued or cancelled, so when
//! a button is clicked twice the response that arrives last is the one left
//! on screen.

use crate::api::{ApiClient, CheckAdbOutcome, CheckAdbRequest, DeviceMessage, Transport};
use crate::storage::{AnalysisRecord, ResultStore};
use crate::ui::{view, LoadingGuard, View};

pub struct Handlers<T, S, V> {
    client: ApiClient<T>,
    /// `None` when the cache could not be opened or persistence is off.
    store: Option<S>,
    view: V,
}

impl<T: Transport, S: ResultStore, V: View> Handlers<T, S, V> {
    pub fn new(client: ApiClient<T>, store: Option<S>, view: V) -> Self {
        Self {
            client,
            store,
            view,
        }
    }

    /// Sends the key typed into the API key field.
    pub async fn submit_api_key(&self) {
        let input = self.view.api_key_input();
        let api_key = input.trim();
        if api_key.is_empty() {
            self.view.render(&view::missing_api_key());
            return;
        }

        let update = match self.client.set_api_key(api_key).await {
            Ok(response) if response.success => {
                tracing::info!("API key saved");
                view::api_key_saved()
            }
            Ok(response) => {
                let error = response.error.unwrap_or_default();
                tracing::warn!("Backend rejected API key: {}", error);
                view::api_key_rejected(&error)
            }
            Err(e) => {
                tracing::error!("Failed to send API key: {}", e);
                view::api_key_request_failed()
            }
        };
        self.view.render(&update);
    }

    /// Runs a device check and renders (and maybe caches) the findings.
    pub async fn check_device(&self) {
        let _loading = LoadingGuard::show(&self.view);
        let request = CheckAdbRequest::default();

        let update = match self.client.check_adb(&request).await {
            Ok(CheckAdbOutcome::Messages(messages)) => {
                tracing::debug!("Device check returned {} messages", messages.len());
                self.persist(&request, &messages).await;
                view::device_messages(&messages)
            }
            Ok(CheckAdbOutcome::Output(output)) => view::device_output(&output),
            Ok(CheckAdbOutcome::Failed(error)) => {
                tracing::warn!("Device check failed: {}", error);
                view::device_check_failed(&error)
            }
            Err(e) => {
                tracing::error!("Device check request failed ({:?}): {}", self.client.version(), e);
                view::device_request_failed()
            }
        };
        self.view.render(&update);
    }

    /// Best effort: a cache failure never hides the results.
    async fn persist(&self, request: &CheckAdbRequest, messages: &[DeviceMessage]) {
        let Some(store) = &self.store else {
            return;
        };
        if messages.is_empty() {
            return;
        }

        let record = AnalysisRecord::new(request.serial.clone(), messages.to_vec());
        match store.save(&record).await {
            Ok(id) => tracing::info!("Cached device check as record {}", id),
            Err(e) => tracing::warn!("Failed to cache device check: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeTransport;
    use crate::api::{ApiVersion, TransportError};
    use crate::storage::native::MemoryStore;
    use crate::storage::{RecordId, StorageError, StoredRecord};
    use crate::ui::{Panel, PanelUpdate};
    use pollster::block_on;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeView {
        input: String,
        rendered: RefCell<Vec<PanelUpdate>>,
        loading: RefCell<Vec<bool>>,
    }

    impl FakeView {
        fn with_input(input: &str) -> Self {
            Self {
                input: input.to_string(),
                ..Default::default()
            }
        }

        fn last(&self) -> PanelUpdate {
            self.rendered.borrow().last().cloned().expect("nothing rendered")
        }
    }

    impl View for FakeView {
        fn api_key_input(&self) -> String {
            self.input.clone()
        }

        fn render(&self, update: &PanelUpdate) {
            self.rendered.borrow_mut().push(update.clone());
        }

        fn set_loading(&self, loading: bool) {
            self.loading.borrow_mut().push(loading);
        }
    }

    /// Store whose writes always fail.
    #[derive(Default)]
    struct BrokenStore {
        attempts: Cell<u32>,
    }

    impl ResultStore for BrokenStore {
        async fn save(&self, _: &AnalysisRecord) -> Result<RecordId, StorageError> {
            self.attempts.set(self.attempts.get() + 1);
            Err(StorageError::WriteError("quota exceeded".into()))
        }
        async fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
            Err(StorageError::ReadError("broken".into()))
        }
        async fn get_by_id(&self, _: RecordId) -> Result<Option<StoredRecord>, StorageError> {
            Err(StorageError::ReadError("broken".into()))
        }
        async fn delete_by_id(&self, _: RecordId) -> Result<bool, StorageError> {
            Err(StorageError::WriteError("broken".into()))
        }
        async fn clear_all(&self) -> Result<(), StorageError> {
            Err(StorageError::WriteError("broken".into()))
        }
    }

    fn build<S: ResultStore>(
        transport: FakeTransport,
        store: Option<S>,
        view: FakeView,
    ) -> Handlers<FakeTransport, S, FakeView> {
        Handlers::new(ApiClient::new(transport, "", ApiVersion::V1), store, view)
    }

    const TWO_MESSAGES: &str = r#"{"success":true,"messages":[
        {"category":"Informativo","message":"Device connected"},
        {"category":"VirusTotal","message":"No detections"}]}"#;

    #[test]
    fn test_empty_key_renders_warning_without_request() {
        let h = build::<MemoryStore>(FakeTransport::default(), None, FakeView::with_input("   "));

        block_on(h.submit_api_key());

        assert!(h.client_requests().is_empty());
        assert_eq!(h.view.last(), view::missing_api_key());
    }

    #[test]
    fn test_key_saved_renders_success() {
        let transport = FakeTransport::default().respond(200, r#"{"success":true}"#);
        let h = build::<MemoryStore>(transport, None, FakeView::with_input(" key-1 "));

        block_on(h.submit_api_key());

        assert_eq!(h.client_requests()[0].1, r#"{"api_key":"key-1"}"#);
        let last = h.view.last();
        assert_eq!(last.panel, Panel::ApiKeyStatus);
        assert_eq!(last.html, "✅ Chave da API salva com sucesso!");
    }

    #[test]
    fn test_key_rejected_renders_server_error() {
        let transport = FakeTransport::default()
            .respond(200, r#"{"success":false,"error":"Invalid API key format"}"#);
        let h = build::<MemoryStore>(transport, None, FakeView::with_input("bad"));

        block_on(h.submit_api_key());

        assert_eq!(
            h.view.last().html,
            "❌ Erro ao salvar a chave da API: Invalid API key format"
        );
    }

    #[test]
    fn test_key_transport_failure_renders_generic_error() {
        let transport =
            FakeTransport::default().fail(TransportError::Network("connection refused".into()));
        let h = build::<MemoryStore>(transport, None, FakeView::with_input("key"));

        block_on(h.submit_api_key());

        let last = h.view.last();
        assert_eq!(last, view::api_key_request_failed());
        assert!(!last.html.contains("connection refused"));
    }

    #[test]
    fn test_check_renders_and_caches_messages() {
        let store = MemoryStore::default();
        let transport = FakeTransport::default().respond(200, TWO_MESSAGES);
        let h = build(transport, Some(store.clone()), FakeView::default());

        block_on(h.check_device());

        assert!(h.view.last().html.contains("<strong>VIRUSTOTAL</strong> - No detections"));
        let cached = block_on(store.get_all()).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].record.messages.len(), 2);
        assert_eq!(cached[0].record.serial, None);
    }

    #[test]
    fn test_check_renders_entry_with_category_and_status() {
        let transport = FakeTransport::default().respond(
            200,
            r#"{"success":true,"messages":[{"category":"Stalking","status":"INFO","message":"m"}]}"#,
        );
        let h = build::<MemoryStore>(transport, None, FakeView::default());

        block_on(h.check_device());

        assert_eq!(h.view.last().html, "<div><strong>STALKING</strong> - m</div>");
    }

    #[test]
    fn test_check_empty_list_renders_fallback_and_skips_cache() {
        let store = MemoryStore::default();
        let transport = FakeTransport::default().respond(200, r#"{"success":true,"messages":[]}"#);
        let h = build(transport, Some(store.clone()), FakeView::default());

        block_on(h.check_device());

        assert_eq!(h.view.last().html, "✅ Dispositivo encontrado!");
        assert!(block_on(store.get_all()).unwrap().is_empty());
    }

    #[test]
    fn test_check_cache_failure_still_renders() {
        let transport = FakeTransport::default().respond(200, TWO_MESSAGES);
        let h = build(transport, Some(BrokenStore::default()), FakeView::default());

        block_on(h.check_device());

        assert_eq!(h.store.as_ref().unwrap().attempts.get(), 1);
        assert!(h.view.last().html.contains("INFORMATIVO"));
    }

    #[test]
    fn test_check_failure_renders_server_error() {
        let transport = FakeTransport::default()
            .respond(200, r#"{"success":false,"error":"no devices/emulators found"}"#);
        let h = build::<MemoryStore>(transport, None, FakeView::default());

        block_on(h.check_device());

        assert_eq!(h.view.last().html, "❌ Erro: no devices/emulators found");
    }

    #[test]
    fn test_spinner_hidden_after_every_outcome() {
        let cases = [
            FakeTransport::default().respond(200, TWO_MESSAGES),
            FakeTransport::default().respond(200, r#"{"success":false,"error":"x"}"#),
            FakeTransport::default().fail(TransportError::Network("offline".into())),
            FakeTransport::default().respond(500, "Internal Server Error"),
        ];

        for transport in cases {
            let h = build::<MemoryStore>(transport, None, FakeView::default());
            block_on(h.check_device());
            assert_eq!(*h.view.loading.borrow(), vec![true, false]);
        }
    }

    #[test]
    fn test_check_transport_failure_renders_generic_error() {
        let transport = FakeTransport::default().respond(500, "Internal Server Error");
        let h = build::<MemoryStore>(transport, None, FakeView::default());

        block_on(h.check_device());

        assert_eq!(h.view.last(), view::device_request_failed());
    }

    impl<S> Handlers<FakeTransport, S, FakeView> {
        fn client_requests(&self) -> Vec<(String, String)> {
            self.client.transport().requests.borrow().clone()
        }
    }
}
