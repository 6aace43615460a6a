//! Supported target languages and display-name lookup.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
}

pub const DEFAULT_SOURCE_LANGUAGE: &str = "en";
pub const DEFAULT_TARGET_LANGUAGE: &str = "zh-hans";

pub const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English", native_name: "English" },
    Language { code: "en-sa", name: "English (South Africa)", native_name: "English (South Africa)" },
    Language { code: "zh-hant", name: "Chinese (Traditional)", native_name: "繁體中文" },
    Language { code: "vi", name: "Vietnamese", native_name: "Tiếng Việt" },
    Language { code: "ru", name: "Russian", native_name: "Русский" },
    Language { code: "ja", name: "Japanese", native_name: "日本語" },
    Language { code: "es", name: "Spanish", native_name: "Español" },
    Language { code: "es-co", name: "Spanish (Colombia)", native_name: "Español (Colombia)" },
    Language { code: "es-ar", name: "Spanish (Argentina)", native_name: "Español (Argentina)" },
    Language { code: "id", name: "Indonesian", native_name: "Bahasa Indonesia" },
    Language { code: "pt", name: "Portuguese", native_name: "Português" },
    Language { code: "de", name: "German", native_name: "Deutsch" },
    Language { code: "th", name: "Thai", native_name: "ไทย" },
    Language { code: "ar", name: "Arabic", native_name: "العربية" },
    Language { code: "fr", name: "French", native_name: "Français" },
    Language { code: "it", name: "Italian", native_name: "Italiano" },
    Language { code: "uk", name: "Ukrainian", native_name: "Українська" },
    Language { code: "pl", name: "Polish", native_name: "Polski" },
    Language { code: "zh-hans", name: "Chinese (Simplified)", native_name: "简体中文" },
];

pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code == code)
}

/// Display name for a language code. Unknown codes come back unchanged, so a
/// prompt never receives an empty language label.
pub fn display_name(code: &str, native: bool) -> &str {
    match find(code) {
        Some(lang) if native => lang.native_name,
        Some(lang) => lang.name,
        None => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve_to_names() {
        assert_eq!(display_name("zh-hans", false), "Chinese (Simplified)");
        assert_eq!(display_name("zh-hans", true), "简体中文");
        assert_eq!(display_name("de", false), "German");
    }

    #[test]
    fn unknown_code_falls_back_to_itself() {
        assert_eq!(display_name("tlh", false), "tlh");
        assert_eq!(display_name("tlh", true), "tlh");
    }

    #[test]
    fn defaults_are_registered() {
        assert!(find(DEFAULT_SOURCE_LANGUAGE).is_some());
        assert!(find(DEFAULT_TARGET_LANGUAGE).is_some());
    }
}
