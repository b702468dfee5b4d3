//! IndexedDB-backed result store for WASM targets.
//!
//! The database is opened once at startup with [`IndexedDbStore::open`],
//! which runs any pending migrations inside the `upgradeneeded` callback.
//! Every later operation reuses that connection and never touches the
//! schema.

use super::{
    AnalysisRecord, RecordId, ResultStore, StorageConfig, StorageError, StoredRecord,
};
use js_sys::Array;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbDatabase, IdbObjectStore, IdbRequest, IdbTransaction, IdbTransactionMode};

/// A schema step. Index `i` in [`MIGRATIONS`] upgrades to version `i + 1`.
type Migration = fn(&IdbDatabase, &StorageConfig) -> Result<(), JsValue>;

const MIGRATIONS: &[Migration] = &[create_results_store];

/// v1: one collection keyed by an auto-incremented `id` field.
fn create_results_store(db: &IdbDatabase, config: &StorageConfig) -> Result<(), JsValue> {
    if db.object_store_names().contains(&config.store_name) {
        return Ok(());
    }
    let params = web_sys::IdbObjectStoreParameters::new();
    params.set_key_path(&JsValue::from_str("id"));
    params.set_auto_increment(true);
    db.create_object_store_with_optional_parameters(&config.store_name, &params)?;
    tracing::info!("Created IndexedDB object store: {}", config.store_name);
    Ok(())
}

/// IndexedDB result store.
#[derive(Clone)]
pub struct IndexedDbStore {
    config: StorageConfig,
    db: IdbDatabase,
}

impl IndexedDbStore {
    /// Opens the database, applying pending migrations.
    ///
    /// Opening an up-to-date database is a no-op apart from the connection.
    pub async fn open(config: StorageConfig) -> Result<Self, StorageError> {
        Self::open_with_migrations(config, MIGRATIONS).await
    }

    async fn open_with_migrations(
        config: StorageConfig,
        migrations: &'static [Migration],
    ) -> Result<Self, StorageError> {
        let db = open_database(&config, migrations).await?;
        Ok(Self { config, db })
    }

    fn transaction(&self, mode: IdbTransactionMode) -> Result<IdbTransaction, String> {
        self.db
            .transaction_with_str_and_mode(&self.config.store_name, mode)
            .map_err(|e| format!("Failed to create transaction: {:?}", e))
    }

    fn object_store(&self, tx: &IdbTransaction) -> Result<IdbObjectStore, String> {
        tx.object_store(&self.config.store_name)
            .map_err(|e| format!("Failed to get {} store: {:?}", self.config.store_name, e))
    }

    /// Runs a single write request and waits for its transaction to commit.
    async fn write<F>(&self, issue: F) -> Result<JsValue, StorageError>
    where
        F: FnOnce(&IdbObjectStore) -> Result<IdbRequest, JsValue>,
    {
        let tx = self
            .transaction(IdbTransactionMode::Readwrite)
            .map_err(StorageError::WriteError)?;
        let done = TransactionWatch::new(&tx);
        let store = self.object_store(&tx).map_err(StorageError::WriteError)?;
        let request = issue(&store)
            .map_err(|e| StorageError::WriteError(format!("Request rejected: {:?}", e)))?;

        let result = wait_for_request(&request)
            .await
            .map_err(StorageError::WriteError)?;
        done.wait().await.map_err(StorageError::WriteError)?;
        Ok(result)
    }

    async fn read<F>(&self, issue: F) -> Result<JsValue, StorageError>
    where
        F: FnOnce(&IdbObjectStore) -> Result<IdbRequest, JsValue>,
    {
        let tx = self
            .transaction(IdbTransactionMode::Readonly)
            .map_err(StorageError::ReadError)?;
        let store = self.object_store(&tx).map_err(StorageError::ReadError)?;
        let request = issue(&store)
            .map_err(|e| StorageError::ReadError(format!("Request rejected: {:?}", e)))?;
        wait_for_request(&request)
            .await
            .map_err(StorageError::ReadError)
    }
}

impl ResultStore for IndexedDbStore {
    async fn save(&self, record: &AnalysisRecord) -> Result<RecordId, StorageError> {
        let value = to_js_value(record)?;
        let key = self.write(|store| store.add(&value)).await?;

        let id = key
            .as_f64()
            .ok_or_else(|| StorageError::WriteError("Store returned a non-numeric key".into()))?;
        RecordId::from_key(id)
            .ok_or_else(|| StorageError::WriteError(format!("Key {} out of range", id)))
    }

    async fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        let result = self.read(|store| store.get_all()).await?;
        Array::from(&result)
            .iter()
            .filter_map(|value| from_js_value(&value).transpose())
            .collect()
    }

    async fn get_by_id(&self, id: RecordId) -> Result<Option<StoredRecord>, StorageError> {
        let key = JsValue::from(id.0);
        let result = self.read(|store| store.get(&key)).await?;
        from_js_value(&result)
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError> {
        let key = JsValue::from(id.0);
        self.write(|store| store.delete(&key)).await?;
        Ok(true)
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        self.write(|store| store.clear()).await?;
        tracing::info!("Cleared {}", self.config.store_name);
        Ok(())
    }
}

/// Opens the database and runs `migrations` from the stored version up to
/// `config.version`.
///
/// A failing migration aborts the version change, so the stored version
/// stays where it was and the next open retries the upgrade.
async fn open_database(
    config: &StorageConfig,
    migrations: &'static [Migration],
) -> Result<IdbDatabase, StorageError> {
    if config.version as usize > migrations.len() {
        return Err(StorageError::StorageUnavailable(format!(
            "No migration for schema v{} (latest is v{})",
            config.version,
            migrations.len()
        )));
    }

    let window = web_sys::window()
        .ok_or_else(|| StorageError::StorageUnavailable("No window object".to_string()))?;

    let idb_factory = window
        .indexed_db()
        .map_err(|e| StorageError::StorageUnavailable(format!("{:?}", e)))?
        .ok_or_else(|| StorageError::StorageUnavailable("IndexedDB not available".to_string()))?;

    let open_request = idb_factory
        .open_with_u32(&config.database_name, config.version)
        .map_err(|e| StorageError::StorageUnavailable(format!("{:?}", e)))?;

    // A failed migration is reported after the open settles.
    let upgrade_error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let request = open_request.clone();
    let migrate_config = config.clone();
    let migrate_error = upgrade_error.clone();
    let onupgradeneeded = Closure::wrap(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
        let old_version = event.old_version() as usize;
        let new_version = migrate_config.version as usize;

        let outcome = request
            .result()
            .and_then(|r| r.dyn_into::<IdbDatabase>())
            .map_err(|e| format!("Upgrade without database: {:?}", e))
            .and_then(|db| {
                tracing::info!("Upgrading IndexedDB from v{} to v{}", old_version, new_version);
                migrations
                    .iter()
                    .enumerate()
                    .take(new_version)
                    .skip(old_version)
                    .try_for_each(|(index, migration)| {
                        migration(&db, &migrate_config)
                            .map_err(|e| format!("Migration v{} failed: {:?}", index + 1, e))
                    })
            });

        if let Err(err) = outcome {
            tracing::error!("{}", err);
            *migrate_error.borrow_mut() = Some(err);
            if let Some(tx) = request.transaction() {
                let _ = tx.abort();
            }
        }
    }) as Box<dyn FnMut(_)>);

    open_request.set_onupgradeneeded(Some(onupgradeneeded.as_ref().unchecked_ref()));

    let db_result = wait_for_request(&open_request).await;

    open_request.set_onupgradeneeded(None);
    drop(onupgradeneeded);

    // An aborted upgrade fails the open request too; the migration error is
    // the useful one.
    let upgrade_error = upgrade_error.borrow_mut().take();
    let db_result = match (upgrade_error, db_result) {
        (Some(err), result) => {
            if let Some(db) = result.ok().and_then(|r| r.dyn_into::<IdbDatabase>().ok()) {
                db.close();
            }
            return Err(StorageError::StorageUnavailable(err));
        }
        (None, result) => result.map_err(StorageError::StorageUnavailable)?,
    };

    let db: IdbDatabase = db_result.dyn_into().map_err(|_| {
        StorageError::StorageUnavailable("Failed to cast to IdbDatabase".to_string())
    })?;

    tracing::info!(
        "Opened IndexedDB database: {} v{}",
        config.database_name,
        config.version
    );

    Ok(db)
}

/// Waits for an IDB request to complete and returns its result.
async fn wait_for_request(request: &IdbRequest) -> Result<JsValue, String> {
    let (tx, rx) = futures_channel::oneshot::channel::<Result<JsValue, String>>();
    let tx = Rc::new(RefCell::new(Some(tx)));

    let tx_success = tx.clone();
    let success_request = request.clone();
    let onsuccess = Closure::wrap(Box::new(move |_: web_sys::Event| {
        let result = success_request.result().unwrap_or(JsValue::UNDEFINED);
        if let Some(tx) = tx_success.borrow_mut().take() {
            let _ = tx.send(Ok(result));
        }
    }) as Box<dyn FnMut(_)>);

    let tx_error = tx;
    let error_request = request.clone();
    let onerror = Closure::wrap(Box::new(move |_: web_sys::Event| {
        let error_msg = error_request
            .error()
            .ok()
            .flatten()
            .map(|e| e.message())
            .unwrap_or_else(|| "Unknown error".to_string());
        if let Some(tx) = tx_error.borrow_mut().take() {
            let _ = tx.send(Err(error_msg));
        }
    }) as Box<dyn FnMut(_)>);

    request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
    request.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    let result = rx.await.map_err(|_| "Channel closed".to_string());

    request.set_onsuccess(None);
    request.set_onerror(None);

    drop(onsuccess);
    drop(onerror);

    result?
}

/// Completion listener for a transaction.
///
/// Handlers are attached on construction, before any request is issued, so
/// the `complete` event cannot be missed. Dropping the watch detaches them.
struct TransactionWatch {
    tx: IdbTransaction,
    rx: futures_channel::oneshot::Receiver<Result<(), String>>,
    _oncomplete: Closure<dyn FnMut(web_sys::Event)>,
    _onerror: Closure<dyn FnMut(web_sys::Event)>,
}

impl TransactionWatch {
    fn new(tx: &IdbTransaction) -> Self {
        let (sender, rx) = futures_channel::oneshot::channel::<Result<(), String>>();
        let sender = Rc::new(RefCell::new(Some(sender)));

        let tx_complete = sender.clone();
        let oncomplete = Closure::wrap(Box::new(move |_: web_sys::Event| {
            if let Some(tx) = tx_complete.borrow_mut().take() {
                let _ = tx.send(Ok(()));
            }
        }) as Box<dyn FnMut(_)>);

        let tx_error = sender;
        let error_tx = tx.clone();
        let onerror = Closure::wrap(Box::new(move |_: web_sys::Event| {
            let error_msg = error_tx
                .error()
                .map(|e| e.message())
                .unwrap_or_else(|| "Transaction error".to_string());
            if let Some(tx) = tx_error.borrow_mut().take() {
                let _ = tx.send(Err(error_msg));
            }
        }) as Box<dyn FnMut(_)>);

        tx.set_oncomplete(Some(oncomplete.as_ref().unchecked_ref()));
        tx.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        tx.set_onabort(Some(onerror.as_ref().unchecked_ref()));

        Self {
            tx: tx.clone(),
            rx,
            _oncomplete: oncomplete,
            _onerror: onerror,
        }
    }

    async fn wait(mut self) -> Result<(), String> {
        (&mut self.rx)
            .await
            .map_err(|_| "Channel closed".to_string())?
    }
}

impl Drop for TransactionWatch {
    fn drop(&mut self) {
        self.tx.set_oncomplete(None);
        self.tx.set_onerror(None);
        self.tx.set_onabort(None);
    }
}

/// Converts a record to a plain JS object via JSON.
fn to_js_value(record: &AnalysisRecord) -> Result<JsValue, StorageError> {
    let json = serde_json::to_string(record)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    js_sys::JSON::parse(&json)
        .map_err(|e| StorageError::SerializationError(format!("JSON parse error: {:?}", e)))
}

/// Reads a stored JS object back via JSON. `undefined`/`null` is `None`.
fn from_js_value<T: DeserializeOwned>(value: &JsValue) -> Result<Option<T>, StorageError> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    let json = js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .ok_or_else(|| StorageError::SerializationError("Value is not JSON".to_string()))?;
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|e| StorageError::SerializationError(e.to_string()))
}
