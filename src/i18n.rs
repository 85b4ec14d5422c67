//! UI string lookup for the supported languages.
//!
//! The table is a JSON document embedded in the binary: language name to a
//! flat key/value dictionary. Keys are the English strings themselves.

use lazy_static::lazy_static;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type Table = HashMap<String, String>;

lazy_static! {
    static ref TRANSLATIONS: HashMap<String, Table> =
        serde_json::from_str(include_str!("./static/translations.json")).unwrap_or_default();
    static ref EMPTY: Table = Table::new();
}

/// Languages the forms and emails are offered in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Hausa,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Hausa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hausa => "Hausa",
        }
    }

    /// Parse the value posted by a language selector
    pub fn parse(value: &str) -> Option<Language> {
        match value.trim() {
            "English" => Some(Language::English),
            "Hausa" => Some(Language::Hausa),
            _ => None,
        }
    }

    /// Like [`Language::parse`], falling back to English
    pub fn parse_or_default(value: &str) -> Language {
        Self::parse(value).unwrap_or_default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full string table for a language, English when the language has none
pub fn table(language: Language) -> &'static Table {
    TRANSLATIONS
        .get(language.as_str())
        .or_else(|| TRANSLATIONS.get("English"))
        .unwrap_or(&EMPTY)
}

/// Translate `key`, falling back to English and then to a visible marker
///
/// # Examples
/// ```
/// use ficore::i18n::{translate, Language};
///
/// assert_eq!(translate("Strategist", Language::English), "Strategist");
/// assert_eq!(
///     translate("no such key", Language::Hausa),
///     "Missing translation: no such key"
/// );
/// ```
pub fn translate(key: &str, language: Language) -> String {
    if let Some(value) = TRANSLATIONS
        .get(language.as_str())
        .and_then(|table| table.get(key))
    {
        return value.clone();
    }
    if language != Language::English {
        warn!(
            "Translation key '{}' not found for language '{}', falling back to English",
            key, language
        );
    }
    match TRANSLATIONS.get("English").and_then(|table| table.get(key)) {
        Some(value) => value.clone(),
        None => format!("Missing translation: {}", key),
    }
}

/// Translate `key` and fill its `{name}` placeholders
pub fn translate_with(key: &str, language: Language, args: &[(&str, &str)]) -> String {
    let mut text = translate(key, language);
    for (name, value) in args {
        text = text.replace(&format!("{{{}}}", name), value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_languages_loaded() {
        assert!(!table(Language::English).is_empty());
        assert!(!table(Language::Hausa).is_empty());
    }

    #[test]
    fn test_every_english_key_has_hausa() {
        let hausa = table(Language::Hausa);
        let missing: Vec<&String> = table(Language::English)
            .keys()
            .filter(|key| !hausa.contains_key(*key))
            .collect();
        assert!(missing.is_empty(), "missing Hausa keys: {:?}", missing);

        for key in ["{min}", "{max}", "{amount}"] {
            for (name, text) in table(Language::English) {
                if text.contains(key) {
                    assert!(hausa[name].contains(key), "{} lost {}", name, key);
                }
            }
        }
    }

    #[test]
    fn test_hausa_lookup_differs() {
        let en = translate("Strategist", Language::English);
        let ha = translate("Strategist", Language::Hausa);
        assert_eq!(en, "Strategist");
        assert!(!ha.is_empty());
    }

    #[test]
    fn test_placeholders_filled() {
        let text = translate_with(
            "Bill Reminder Subject",
            Language::English,
            &[("description", "Electricity")],
        );
        assert_eq!(text, "Reminder: Electricity Due Soon");
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(Language::parse("Hausa"), Some(Language::Hausa));
        assert_eq!(Language::parse("French"), None);
        assert_eq!(Language::parse_or_default("French"), Language::English);
    }
}
