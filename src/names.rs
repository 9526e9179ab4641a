//! Validation and canonical form for country and genre names.

use crate::error::{AppError, AppResult};

/// Which catalogue table a name belongs to; only affects error wording.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameKind {
    Country,
    Genre,
}

impl NameKind {
    pub fn label(self) -> &'static str {
        match self {
            NameKind::Country => "Country",
            NameKind::Genre => "Genre",
        }
    }
}

/// Letters and whitespace only, mirroring `^[a-zA-Z\s]+$`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

/// First character upper-cased, remainder lower-cased: "sOUTH korea" -> "South korea".
pub fn normalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
    }
}

/// Validates raw input and returns the canonical name to store and compare on.
pub fn canonical(kind: NameKind, raw: Option<&str>) -> AppResult<String> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::validation(format!("{} name is required", kind.label())));
    }
    if !is_valid_name(name) {
        return Err(AppError::validation(format!(
            "{} name must contain only letters and cannot include numbers or special characters",
            kind.label()
        )));
    }
    Ok(normalize(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case() {
        assert_eq!(normalize("france"), "France");
        assert_eq!(normalize("FRANCE"), "France");
        assert_eq!(normalize("sOUTH korea"), "South korea");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn rejects_digits_and_symbols() {
        for bad in ["France1", "Côte", "a-b", "x!", "42", "new_zealand"] {
            assert!(!is_valid_name(bad), "{bad} should be rejected");
            assert!(canonical(NameKind::Country, Some(bad)).is_err());
        }
    }

    #[test]
    fn accepts_letters_and_spaces() {
        assert_eq!(canonical(NameKind::Genre, Some("  science fiction ")).unwrap(), "Science fiction");
    }

    #[test]
    fn missing_name_has_kind_specific_message() {
        let err = canonical(NameKind::Genre, None).unwrap_err();
        assert_eq!(err.to_string(), "Genre name is required");
        let err = canonical(NameKind::Country, Some("   ")).unwrap_err();
        assert_eq!(err.to_string(), "Country name is required");
    }
}
