//! `ResultCache` class exported to page scripts.
//!
//! ```js
//! const cache = await ResultCache.open();
//! const id = await cache.save([{ category: "info", message: "ok" }]);
//! const all = await cache.getAll();
//! ```
//!
//! Every method returns a Promise; failures reject with an `Error` carrying
//! the storage error message.

use super::{AnalysisRecord, IndexedDbStore, RecordId, ResultStore, StorageConfig, StorageError};
use crate::api::DeviceMessage;
use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

#[wasm_bindgen]
pub struct ResultCache {
    store: IndexedDbStore,
}

impl ResultCache {
    fn new(store: IndexedDbStore) -> Self {
        Self { store }
    }
}

#[wasm_bindgen]
impl ResultCache {
    /// Opens (and if needed creates) the cache.
    pub fn open() -> Promise {
        future_to_promise(async move {
            let store = IndexedDbStore::open(StorageConfig::default())
                .await
                .map_err(to_js_error)?;
            Ok(ResultCache::new(store).into())
        })
    }

    /// Saves a result list and resolves to its new id.
    pub fn save(&self, messages: JsValue) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let messages: Vec<DeviceMessage> = serde_wasm_bindgen::from_value(messages)
                .map_err(|e| to_js_error(StorageError::SerializationError(e.to_string())))?;
            let id = store
                .save(&AnalysisRecord::new(None, messages))
                .await
                .map_err(to_js_error)?;
            Ok(JsValue::from(id.0))
        })
    }

    /// Resolves to an array of every stored record.
    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let records = store.get_all().await.map_err(to_js_error)?;
            to_plain_js(&records)
        })
    }

    /// Resolves to the record with `id`, or `undefined`.
    #[wasm_bindgen(js_name = getById)]
    pub fn get_by_id(&self, id: u32) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            match store.get_by_id(RecordId(id)).await.map_err(to_js_error)? {
                Some(record) => to_plain_js(&record),
                None => Ok(JsValue::UNDEFINED),
            }
        })
    }

    /// Resolves to `true`, whether or not the id existed.
    #[wasm_bindgen(js_name = deleteById)]
    pub fn delete_by_id(&self, id: u32) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let deleted = store
                .delete_by_id(RecordId(id))
                .await
                .map_err(to_js_error)?;
            Ok(JsValue::from_bool(deleted))
        })
    }

    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.clear_all().await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

fn to_js_error(err: StorageError) -> JsValue {
    tracing::error!("Result cache operation failed: {}", err);
    js_sys::Error::new(&err.to_string()).into()
}

/// Serializes to plain objects and arrays rather than `Map`s.
fn to_plain_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| to_js_error(StorageError::SerializationError(e.to_string())))
}
