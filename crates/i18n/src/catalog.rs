use std::collections::HashMap;
use std::path::Path;

use snafu::ResultExt;

use crate::error::{
    CatalogResult, ParseDictionarySnafu, ReadDictionarySnafu, ReadDirectorySnafu,
};
use crate::language::{Language, SUPPORTED_LANGUAGES};

pub type Dictionary = HashMap<String, String>;

const BUILTIN_EN: &[(&str, &str)] = &[
    (
        "support.greeting",
        "Hi! I’m LearnovateX Assistant. How can I help you with the app?",
    ),
    ("support.placeholder", "Ask about the app…"),
    ("support.typing", "Typing…"),
    ("support.noResponse", "Sorry, I couldn’t generate a response."),
    (
        "support.unreachable",
        "I couldn’t reach the assistant service. Please try again.",
    ),
    ("support.quickTitle", "Quick questions"),
    ("support.q1", "How do I start a learning path?"),
    ("support.q2", "Where can I update my profile?"),
    ("support.q3", "How do internships work?"),
    ("support.q4", "How do I change the app language?"),
];

const BUILTIN_TE: &[(&str, &str)] = &[
    (
        "support.greeting",
        "నమస్కారం! నేను LearnovateX అసిస్టెంట్. యాప్‌లో మీకు ఎలా సహాయం చేయగలను?",
    ),
    ("support.placeholder", "యాప్ గురించి అడగండి…"),
    ("support.typing", "టైప్ చేస్తోంది…"),
    ("support.noResponse", "క్షమించండి, సమాధానం ఇవ్వలేకపోయాను."),
    (
        "support.unreachable",
        "అసిస్టెంట్ సేవను చేరుకోలేకపోయాను. దయచేసి మళ్ళీ ప్రయత్నించండి.",
    ),
    ("support.quickTitle", "త్వరిత ప్రశ్నలు"),
    ("support.q1", "లెర్నింగ్ పాత్ ఎలా ప్రారంభించాలి?"),
    ("support.q2", "నా ప్రొఫైల్‌ను ఎక్కడ అప్‌డేట్ చేయాలి?"),
    ("support.q3", "ఇంటర్న్‌షిప్‌లు ఎలా పనిచేస్తాయి?"),
    ("support.q4", "యాప్ భాషను ఎలా మార్చాలి?"),
];

const BUILTIN_HI: &[(&str, &str)] = &[
    (
        "support.greeting",
        "नमस्ते! मैं LearnovateX असिस्टेंट हूँ। ऐप में मैं आपकी क्या मदद कर सकता हूँ?",
    ),
    ("support.placeholder", "ऐप के बारे में पूछें…"),
    ("support.typing", "लिख रहा है…"),
    ("support.noResponse", "क्षमा करें, मैं जवाब नहीं बना सका।"),
    (
        "support.unreachable",
        "मैं असिस्टेंट सेवा तक नहीं पहुँच सका। कृपया फिर से प्रयास करें।",
    ),
    ("support.quickTitle", "त्वरित प्रश्न"),
    ("support.q1", "मैं लर्निंग पाथ कैसे शुरू करूँ?"),
    ("support.q2", "मैं अपनी प्रोफ़ाइल कहाँ अपडेट करूँ?"),
    ("support.q3", "इंटर्नशिप कैसे काम करती हैं?"),
    ("support.q4", "मैं ऐप की भाषा कैसे बदलूँ?"),
];

/// One immutable dictionary per supported language.
///
/// Every supported language has a dictionary, possibly empty, so whichever
/// language a store treats as its default always has a terminal table.
#[derive(Debug, Clone)]
pub struct TranslationCatalog {
    dictionaries: HashMap<Language, Dictionary>,
}

impl Default for TranslationCatalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl TranslationCatalog {
    pub fn empty() -> Self {
        Self {
            dictionaries: SUPPORTED_LANGUAGES
                .iter()
                .map(|language| (*language, Dictionary::new()))
                .collect(),
        }
    }

    /// Strings shipped with the support widget.
    pub fn builtin() -> Self {
        Self::empty()
            .with_entries(Language::En, BUILTIN_EN.iter().copied())
            .with_entries(Language::Te, BUILTIN_TE.iter().copied())
            .with_entries(Language::Hi, BUILTIN_HI.iter().copied())
    }

    pub fn with_entries<I, K, V>(mut self, language: Language, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.dictionaries.entry(language).or_default().extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    /// Loads `<code>.json` files from `dir` over the builtin strings.
    ///
    /// Files named after unsupported codes are skipped. Any other unreadable or
    /// malformed file fails the load: catalogs are read once at startup.
    pub fn load_dir(dir: &Path) -> CatalogResult<Self> {
        let mut catalog = Self::builtin();
        let entries = std::fs::read_dir(dir).context(ReadDirectorySnafu {
            stage: "list-translation-files",
            path: dir.to_path_buf(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.context(ReadDirectorySnafu {
                stage: "read-translation-entry",
                path: dir.to_path_buf(),
            })?;
            paths.push(entry.path());
        }
        paths.sort();

        for path in paths {
            if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Some(language) = Language::parse(stem) else {
                tracing::warn!(path = ?path, "skipping translations for unsupported language");
                continue;
            };

            let content = std::fs::read_to_string(&path).context(ReadDictionarySnafu {
                stage: "read-translation-file",
                path: path.clone(),
            })?;
            let dictionary: Dictionary =
                serde_json::from_str(&content).context(ParseDictionarySnafu {
                    stage: "parse-translation-file",
                    path: path.clone(),
                })?;

            tracing::debug!(
                path = ?path,
                language = %language,
                entry_count = dictionary.len(),
                "loaded translations"
            );
            catalog = catalog.with_entries(language, dictionary);
        }

        Ok(catalog)
    }

    pub fn dictionary(&self, language: Language) -> Option<&Dictionary> {
        self.dictionaries.get(&language)
    }

    /// Resolves `key` through `language`, then `default_language`, then
    /// `fallback`, then the key itself.
    pub fn lookup<'a>(
        &'a self,
        language: Language,
        default_language: Language,
        key: &'a str,
        fallback: Option<&'a str>,
    ) -> &'a str {
        self.entry(language, key)
            .or_else(|| self.entry(default_language, key))
            .or(fallback)
            .unwrap_or(key)
    }

    fn entry(&self, language: Language, key: &str) -> Option<&str> {
        self.dictionaries
            .get(&language)
            .and_then(|dictionary| dictionary.get(key))
            .map(String::as_str)
    }
}
