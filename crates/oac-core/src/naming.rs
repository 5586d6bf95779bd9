use std::fmt;

use heck::{ToLowerCamelCase, ToPascalCase};

/// An operation or schema name with its identifier casings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedName {
    pub original: String,
    pub pascal_case: String,
    pub camel_case: String,
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Create a `NormalizedName` from an arbitrary string, computing all casing variants.
pub fn normalize_name(name: &str) -> NormalizedName {
    let sanitized = sanitize_words(name);

    NormalizedName {
        original: name.to_string(),
        pascal_case: escape_leading_digit(sanitized.to_pascal_case()),
        camel_case: escape_leading_digit(sanitized.to_lower_camel_case()),
    }
}

/// Turn an arbitrary string into an identifier, keeping its casing.
///
/// Every character that cannot appear in an identifier (including `-`)
/// becomes `_`; a leading digit is prefixed with `_`.
pub fn to_identifier(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if mapped.is_empty() {
        return "_".to_string();
    }
    escape_leading_digit(mapped)
}

fn escape_leading_digit(name: String) -> String {
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name
    }
}

/// Replace separator runs with a single `_` so heck sees word boundaries.
fn sanitize_words(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_separator = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if prev_was_separator && !result.is_empty() {
                result.push('_');
            }
            result.push(ch);
            prev_was_separator = false;
        } else {
            prev_was_separator = true;
        }
    }

    if result.is_empty() {
        return "unnamed".to_string();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name() {
        let n = normalize_name("listModels");
        assert_eq!(n.pascal_case, "ListModels");
        assert_eq!(n.camel_case, "listModels");
    }

    #[test]
    fn test_kebab_case() {
        let n = normalize_name("pet-store");
        assert_eq!(n.pascal_case, "PetStore");
        assert_eq!(n.camel_case, "petStore");
    }

    #[test]
    fn test_leading_number() {
        let n = normalize_name("3dModel");
        assert_eq!(n.pascal_case, "_3dModel");
    }

    #[test]
    fn test_identifier_keeps_case() {
        assert_eq!(to_identifier("pet-store"), "pet_store");
        assert_eq!(to_identifier("Pet"), "Pet");
        assert_eq!(to_identifier("v1.Pet"), "v1_Pet");
        assert_eq!(to_identifier("2fa"), "_2fa");
        assert_eq!(to_identifier(""), "_");
    }
}
