use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Display languages offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Language {
    #[default]
    En,
    Te,
    Hi,
}

pub const DEFAULT_LANGUAGE: Language = Language::En;

/// Ordered for presentation in language pickers.
pub const SUPPORTED_LANGUAGES: &[Language] = &[Language::En, Language::Te, Language::Hi];

impl Language {
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Te => "te",
            Self::Hi => "hi",
        }
    }

    /// Name of the language written in that language.
    pub const fn native_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Te => "తెలుగు",
            Self::Hi => "हिन्दी",
        }
    }

    /// Parses a language tag, ignoring case and any region suffix (`te-IN`, `hi_in`).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let primary = normalized.split(['-', '_']).next().unwrap_or_default();
        match primary {
            "en" => Some(Self::En),
            "te" => Some(Self::Te),
            "hi" => Some(Self::Hi),
            _ => None,
        }
    }

    /// Like [`Language::parse`], but unsupported input silently becomes `default`.
    pub fn normalize(raw: &str, default: Language) -> Self {
        Self::parse(raw).unwrap_or(default)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| UnsupportedLanguage {
            raw: raw.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedLanguage {
    pub raw: String,
}

impl fmt::Display for UnsupportedLanguage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "unsupported language '{}'", self.raw)
    }
}

impl std::error::Error for UnsupportedLanguage {}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::normalize(&value, DEFAULT_LANGUAGE))
    }
}
