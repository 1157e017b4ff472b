//! Host language names → chat backend language codes.

/// Fallback code when the host language is unknown.
pub const DEFAULT_LANGUAGE: &str = "en";

const LANGUAGES: &[(&str, &str)] = &[
    ("Arabic", "ar"),
    ("Bulgarian", "bg"),
    ("Chinese-Simplified", "zh"),
    ("Chinese-Traditional", "zh-TW"),
    ("Czech", "cs"),
    ("Danish", "da"),
    ("Dutch", "nl"),
    ("English", "en"),
    ("Estonian", "et"),
    ("Finnish", "fi"),
    ("French", "fr"),
    ("German", "de"),
    ("Greek", "el"),
    ("Hebrew", "he"),
    ("Hungarian", "hu"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Latvian", "lv"),
    ("Lithuanian", "lt"),
    ("Norwegian", "no"),
    ("Persian", "fa"),
    ("Polish", "pl"),
    ("Portuguese-Brazil", "pt-BR"),
    ("Portuguese-Portuguese", "pt"),
    ("Romanian", "ro"),
    ("Russian", "ru"),
    ("Serbian", "sr"),
    ("Slovenian", "sl"),
    ("Spanish", "es"),
    ("Swedish", "sv"),
    ("Thai", "th"),
    ("Turkish", "tr"),
    ("Ukrainian", "uk"),
    ("Vietnamese", "vi"),
];

/// Convert a host language name (`"German"`) to its short code (`"de"`).
///
/// Matching is case-insensitive. Unknown or empty names map to [`DEFAULT_LANGUAGE`].
pub fn to_short_code(language: &str) -> &'static str {
    LANGUAGES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(language.trim()))
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_languages() {
        assert_eq!(to_short_code("German"), "de");
        assert_eq!(to_short_code("Portuguese-Brazil"), "pt-BR");
        assert_eq!(to_short_code("russian"), "ru");
    }

    #[test]
    fn unknown_falls_back_to_english() {
        assert_eq!(to_short_code(""), "en");
        assert_eq!(to_short_code("Klingon"), "en");
    }
}
