use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use learnovate_storage::KeyValueStore;
use serde_json::{Map, Value};
use snafu::ResultExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::catalog::TranslationCatalog;
use crate::error::{
    PersistIdentitySnafu, PersistLanguageSnafu, PersistUserSettingsSnafu, PreferenceResult,
    SerializeIdentitySnafu,
};
use crate::identity::{UserIdentity, user_settings_key};
use crate::language::{DEFAULT_LANGUAGE, Language, SUPPORTED_LANGUAGES};
use crate::notify::{ChangeNotifier, ChangeSource, PreferenceEvent, Subscription};

/// Global slot holding a bare language code.
pub const GLOBAL_LANGUAGE_SLOT: &str = "app.language";
/// Slot holding the signed-in user record, written by the auth layer.
pub const USER_SLOT: &str = "user";

const MIN_WATCH_PERIOD: Duration = Duration::from_millis(10);

/// Resolves the active display language and keeps consumers in sync.
///
/// Resolution order: the signed-in user's settings record, the global slot,
/// then the configured default. Reads never fail; unreadable or malformed
/// slots count as missing. The identity is looked up again on every
/// resolution, so sign-in and sign-out take effect without rebuilding the
/// store.
pub struct PreferenceStore {
    storage: Arc<dyn KeyValueStore>,
    catalog: Arc<TranslationCatalog>,
    default_language: Language,
    active: ArcSwap<Language>,
    notifier: ChangeNotifier,
    // Serializes resolve-and-swap against writes so a refresh cannot publish a stale value.
    write_lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, catalog: Arc<TranslationCatalog>) -> Self {
        Self::with_default_language(storage, catalog, DEFAULT_LANGUAGE)
    }

    pub fn with_default_language(
        storage: Arc<dyn KeyValueStore>,
        catalog: Arc<TranslationCatalog>,
        default_language: Language,
    ) -> Self {
        let store = Self {
            storage,
            catalog,
            default_language,
            active: ArcSwap::from_pointee(default_language),
            notifier: ChangeNotifier::new(),
            write_lock: Mutex::new(()),
        };
        store.active.store(Arc::new(store.read()));
        store
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    pub fn supported_languages(&self) -> &'static [Language] {
        SUPPORTED_LANGUAGES
    }

    /// The language consumers should render with right now. No I/O.
    pub fn language(&self) -> Language {
        **self.active.load()
    }

    /// Resolves the language from storage through the precedence chain.
    pub fn read(&self) -> Language {
        if let Some(language) = self.scoped_language() {
            return language;
        }
        if let Some(language) = self.global_language() {
            return language;
        }
        self.default_language
    }

    /// Selects a language. Unsupported codes become the default.
    ///
    /// The in-process language changes even if the global slot cannot be
    /// written, and that failure is reported. If the signed-in user's settings
    /// record exists but cannot be updated, the stored record still outranks
    /// the new choice, so the active language falls back to what storage
    /// resolves and the failure is reported.
    pub fn write(&self, code: &str) -> PreferenceResult<Language> {
        let language = Language::normalize(code, self.default_language);
        if Language::parse(code).is_none() {
            tracing::debug!(
                requested = code,
                language = %language,
                "unsupported language requested, using default"
            );
        }

        let (previous, outcome) = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = self.language();
            self.active.store(Arc::new(language));
            let persisted = self
                .storage
                .set(GLOBAL_LANGUAGE_SLOT, language.code())
                .context(PersistLanguageSnafu {
                    stage: "write-global-language",
                    language,
                });
            let mirrored = self.mirror_into_user_settings(language);
            if mirrored.is_err() {
                self.active.store(Arc::new(self.read()));
            }
            (previous, persisted.and(mirrored))
        };

        if outcome.is_ok() || self.language() != previous {
            self.notifier.notify(PreferenceEvent {
                source: ChangeSource::Local,
            });
        }

        outcome?;
        tracing::info!(language = %language, "saved language preference");
        Ok(language)
    }

    /// Looks `key` up in the active language, then the default language.
    /// Falls back to `fallback`, then to `key` itself.
    pub fn translate<'a>(&'a self, key: &'a str, fallback: Option<&'a str>) -> &'a str {
        self.catalog
            .lookup(self.language(), self.default_language, key, fallback)
    }

    /// Same as [`PreferenceStore::translate`] for an explicit language.
    pub fn translate_in<'a>(
        &'a self,
        language: Language,
        key: &'a str,
        fallback: Option<&'a str>,
    ) -> &'a str {
        self.catalog
            .lookup(language, self.default_language, key, fallback)
    }

    /// Re-resolves from storage and notifies if the active language moved.
    pub fn refresh(&self, source: ChangeSource) -> Language {
        let (previous, current) = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let current = self.read();
            let previous = *self.active.swap(Arc::new(current));
            (previous, current)
        };

        if previous != current {
            tracing::debug!(
                source = ?source,
                from = %previous,
                to = %current,
                "active language changed"
            );
            self.notifier.notify(PreferenceEvent { source });
        }
        current
    }

    pub fn current_identity(&self) -> Option<UserIdentity> {
        let raw = self.load_slot(USER_SLOT)?;
        match serde_json::from_str::<UserIdentity>(&raw) {
            Ok(identity) => Some(identity),
            Err(error) => {
                tracing::debug!(error = %error, "stored user record is unreadable, treating as signed out");
                None
            }
        }
    }

    /// Records a sign-in (`Some`) or sign-out (`None`) and re-resolves.
    ///
    /// Always notifies, since the scoped record in effect has changed even
    /// when the resolved language has not.
    pub fn set_identity(&self, identity: Option<&UserIdentity>) -> PreferenceResult<Language> {
        let language = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            match identity {
                Some(identity) => {
                    let raw = serde_json::to_string(identity).context(SerializeIdentitySnafu {
                        stage: "serialize-user-identity",
                    })?;
                    self.storage
                        .set(USER_SLOT, &raw)
                        .context(PersistIdentitySnafu {
                            stage: "write-user-identity",
                        })?;
                }
                None => {
                    self.storage.remove(USER_SLOT).context(PersistIdentitySnafu {
                        stage: "remove-user-identity",
                    })?;
                }
            }
            let language = self.read();
            self.active.store(Arc::new(language));
            language
        };

        tracing::info!(
            signed_in = identity.is_some(),
            language = %language,
            "preference identity changed"
        );
        self.notifier.notify(PreferenceEvent {
            source: ChangeSource::Identity,
        });
        Ok(language)
    }

    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PreferenceEvent) + Send + Sync + 'static,
    {
        self.notifier.on_change(callback)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreferenceEvent> {
        self.notifier.subscribe()
    }

    /// Polls storage for changes made by other processes.
    ///
    /// The task holds a weak reference and ends once the store is dropped.
    pub fn spawn_external_watch(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = period.max(MIN_WATCH_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.refresh(ChangeSource::External);
            }
            tracing::debug!("external preference watch stopped");
        })
    }

    fn scoped_language(&self) -> Option<Language> {
        let identity = self.current_identity();
        let key = user_settings_key(identity.as_ref());
        let raw = self.load_slot(&key)?;

        let record = match serde_json::from_str::<Value>(&raw) {
            Ok(record) => record,
            Err(error) => {
                tracing::debug!(key = %key, error = %error, "user settings record is not JSON, skipping");
                return None;
            }
        };

        let code = record
            .get("preferences")
            .and_then(|preferences| preferences.get("language"))
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())?;
        Some(Language::normalize(code, self.default_language))
    }

    fn global_language(&self) -> Option<Language> {
        let raw = self.load_slot(GLOBAL_LANGUAGE_SLOT)?;
        Some(Language::normalize(&raw, self.default_language))
    }

    fn mirror_into_user_settings(&self, language: Language) -> PreferenceResult<()> {
        let identity = self.current_identity();
        let key = user_settings_key(identity.as_ref());
        let Some(raw) = self.load_slot(&key) else {
            return Ok(());
        };

        let mut record = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(record)) => record,
            Ok(_) | Err(_) => {
                tracing::debug!(key = %key, "user settings record is not a JSON object, not mirroring");
                return Ok(());
            }
        };

        let mut preferences = match record.remove("preferences") {
            Some(Value::Object(preferences)) => preferences,
            _ => Map::new(),
        };
        preferences.insert(
            "language".to_string(),
            Value::String(language.code().to_string()),
        );
        record.insert("preferences".to_string(), Value::Object(preferences));

        let merged = Value::Object(record).to_string();
        self.storage
            .set(&key, &merged)
            .context(PersistUserSettingsSnafu {
                stage: "mirror-user-settings",
                key,
            })
    }

    fn load_slot(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(Some(raw)) if !raw.is_empty() => Some(raw),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(key, error = %error, "failed to read preference slot, treating as missing");
                None
            }
        }
    }
}
