#![deny(unsafe_code)]

//! Language preference resolution and translation lookup.

pub mod catalog;
pub mod error;
pub mod identity;
pub mod language;
pub mod notify;
pub mod store;

pub use catalog::{Dictionary, TranslationCatalog};
pub use error::{CatalogError, CatalogResult, PreferenceError, PreferenceResult};
pub use identity::{ANONYMOUS_IDENTITY, UserIdentity, user_settings_key};
pub use language::{DEFAULT_LANGUAGE, Language, SUPPORTED_LANGUAGES, UnsupportedLanguage};
pub use notify::{ChangeNotifier, ChangeSource, PreferenceEvent, Subscription};
pub use store::{GLOBAL_LANGUAGE_SLOT, PreferenceStore, USER_SLOT};
