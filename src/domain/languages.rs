//! Language registry entries and their validation rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageMarker {
    pub iso2: String,
    pub native_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl LanguageMarker {
    pub fn new(iso2: &str, native_name: &str) -> Self {
        Self {
            iso2: iso2.to_ascii_lowercase(),
            native_name: native_name.to_string(),
            slug: slug::slugify(native_name),
            is_default: false,
            enabled: true,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

pub fn is_valid_iso2(value: &str) -> bool {
    value.len() == 2 && value.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Normalizes a submitted language list and enforces its invariants:
/// lowercase two-letter codes, a non-empty slug for every entry (derived from
/// the native name when blank), unique codes, unique slugs among enabled
/// languages, and exactly one enabled default.
pub fn normalize_languages(
    languages: Vec<LanguageMarker>,
) -> Result<Vec<LanguageMarker>, DomainError> {
    let mut normalized = Vec::with_capacity(languages.len());
    let mut codes = HashSet::new();
    let mut slugs = HashSet::new();
    let mut defaults = 0usize;

    for mut language in languages {
        language.iso2 = language.iso2.trim().to_ascii_lowercase();
        language.native_name = language.native_name.trim().to_string();

        if !is_valid_iso2(&language.iso2) {
            return Err(DomainError::validation(
                "iso2",
                format!("`{}` is not a two-letter language code", language.iso2),
            ));
        }
        if language.native_name.is_empty() {
            return Err(DomainError::validation(
                "native_name",
                format!("language `{}` needs a native name", language.iso2),
            ));
        }
        if !codes.insert(language.iso2.clone()) {
            return Err(DomainError::validation(
                "iso2",
                format!("language `{}` is listed twice", language.iso2),
            ));
        }

        let slug_source = if language.slug.trim().is_empty() {
            language.native_name.as_str()
        } else {
            language.slug.as_str()
        };
        let mut derived = slug::slugify(slug_source);
        if derived.is_empty() {
            derived = language.iso2.clone();
        }
        language.slug = derived;

        if language.is_default && !language.enabled {
            return Err(DomainError::validation(
                "is_default",
                format!("default language `{}` cannot be disabled", language.iso2),
            ));
        }
        if language.enabled && !slugs.insert(language.slug.clone()) {
            return Err(DomainError::validation(
                "slug",
                format!("slug `{}` is already used by another language", language.slug),
            ));
        }
        if language.is_default {
            defaults += 1;
        }
        normalized.push(language);
    }

    if normalized.is_empty() {
        return Err(DomainError::validation(
            "languages",
            "at least one language is required",
        ));
    }
    if defaults != 1 {
        return Err(DomainError::validation(
            "is_default",
            format!("exactly one default language is required, found {defaults}"),
        ));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_slug_from_native_name() {
        let languages = normalize_languages(vec![
            LanguageMarker {
                slug: String::new(),
                ..LanguageMarker::new("EN", "English").as_default()
            },
            LanguageMarker {
                slug: String::new(),
                ..LanguageMarker::new("fr", "Français")
            },
        ])
        .expect("valid list");

        assert_eq!(languages[0].iso2, "en");
        assert_eq!(languages[0].slug, "english");
        assert_eq!(languages[1].slug, "francais");
    }

    #[test]
    fn rejects_duplicate_enabled_slugs() {
        let mut second = LanguageMarker::new("de", "Deutsch");
        second.slug = "english".into();
        let err = normalize_languages(vec![LanguageMarker::new("en", "English").as_default(), second])
            .expect_err("duplicate slug");
        assert!(matches!(err, DomainError::Validation { field: "slug", .. }));
    }

    #[test]
    fn disabled_languages_may_reuse_slugs() {
        let mut second = LanguageMarker::new("de", "Deutsch");
        second.slug = "english".into();
        second.enabled = false;
        let languages =
            normalize_languages(vec![LanguageMarker::new("en", "English").as_default(), second])
                .expect("disabled entries are not checked for slug clashes");
        assert_eq!(languages.len(), 2);
    }

    #[test]
    fn requires_exactly_one_default() {
        let err = normalize_languages(vec![
            LanguageMarker::new("en", "English"),
            LanguageMarker::new("fr", "Français"),
        ])
        .expect_err("no default");
        assert!(matches!(err, DomainError::Validation { field: "is_default", .. }));

        let err = normalize_languages(vec![
            LanguageMarker::new("en", "English").as_default(),
            LanguageMarker::new("fr", "Français").as_default(),
        ])
        .expect_err("two defaults");
        assert!(matches!(err, DomainError::Validation { field: "is_default", .. }));
    }

    #[test]
    fn rejects_bad_codes() {
        let err = normalize_languages(vec![LanguageMarker::new("eng", "English").as_default()])
            .expect_err("three letters");
        assert!(matches!(err, DomainError::Validation { field: "iso2", .. }));
    }
}
