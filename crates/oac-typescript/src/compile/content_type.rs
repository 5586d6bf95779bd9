//! Content types: wildcard matching and the built-in body codecs.

use oac_core::error::CompileError;
use oac_core::parse::content::MediaType;

use super::Compiler;
use super::transform::Mode;
use crate::context::Context;
use crate::fragment::Code;
use crate::{cat, code};

/// `type/subtype` matching where either part of `pattern` may be `*`.
///
/// A wildcard in `target` only matches a wildcard in `pattern`, so
/// `matches("text/plain", "text/*")` is false. A `target` without a
/// subtype only matches a `pattern` without one.
pub fn matches(pattern: &str, target: &str) -> bool {
    let (pattern_type, pattern_sub) = split(essence(pattern));
    let (target_type, target_sub) = split(essence(target));
    match (pattern_sub, target_sub) {
        (Some(pattern_sub), Some(target_sub)) => {
            part_matches(pattern_type, target_type) && part_matches(pattern_sub, target_sub)
        }
        (None, None) => part_matches(pattern_type, target_type),
        _ => false,
    }
}

fn part_matches(pattern: &str, target: &str) -> bool {
    pattern == "*" || pattern.eq_ignore_ascii_case(target)
}

fn split(essence: &str) -> (&str, Option<&str>) {
    match essence.split_once('/') {
        Some((kind, sub)) => (kind, Some(sub)),
        None => (essence, None),
    }
}

/// The media type without parameters: `text/plain; charset=utf-8` → `text/plain`.
pub fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

/// First pattern in declaration order that matches `target`.
pub fn first_match<'p>(patterns: impl IntoIterator<Item = &'p str>, target: &str) -> Option<&'p str> {
    patterns.into_iter().find(|pattern| matches(pattern, target))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCodec {
    Json,
    Form,
    Text,
    Binary,
    /// Unrecognised content type, passed through as bytes.
    Raw,
}

impl BodyCodec {
    pub fn for_content_type(content_type: &str) -> Self {
        let essence = essence(content_type).to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => BodyCodec::Json,
            "application/x-www-form-urlencoded" => BodyCodec::Form,
            "application/binary" | "application/octet-stream" => BodyCodec::Binary,
            _ if matches("text/*", &essence) => BodyCodec::Text,
            _ => BodyCodec::Raw,
        }
    }
}

impl Compiler<'_> {
    /// Type of a body value with the given content type.
    pub fn body_type(
        &self,
        ctx: &mut Context,
        codec: BodyCodec,
        media: &MediaType,
    ) -> Result<Code, CompileError> {
        match (codec, &media.schema) {
            (BodyCodec::Json | BodyCodec::Form, Some(schema)) => self.schema_to_type(ctx, schema),
            (BodyCodec::Json | BodyCodec::Form, None) => Ok(code!("unknown")),
            (BodyCodec::Text, _) => Ok(code!("string")),
            (BodyCodec::Binary | BodyCodec::Raw, _) => Ok(code!("Uint8Array")),
        }
    }

    /// Statements reading a body from `source` (anything with async `text()`
    /// and `bytes()`), and the expression holding the decoded value.
    pub fn decode_body(
        &self,
        ctx: &mut Context,
        codec: BodyCodec,
        media: &MediaType,
        source: &str,
    ) -> Result<(Code, Code), CompileError> {
        match codec {
            BodyCodec::Json | BodyCodec::Form => {
                let (name, read) = if codec == BodyCodec::Json {
                    let name = ctx.fresh("json");
                    let read = format!("JSON.parse(await {source}.text())");
                    (name, read)
                } else {
                    ctx.use_query_string();
                    let name = ctx.fresh("form");
                    let read = format!("qs.parse(await {source}.text())");
                    (name, read)
                };
                let statement = code!("const {name}: any = {read};");
                let value = match &media.schema {
                    Some(schema) => self.schema_to_parser(ctx, schema, &code!("{name}"))?,
                    None => code!("{name}"),
                };
                Ok((statement, value))
            }
            BodyCodec::Text => {
                let name = ctx.fresh("text");
                Ok((code!("const {name} = await {source}.text();"), code!("{name}")))
            }
            BodyCodec::Binary | BodyCodec::Raw => {
                let name = ctx.fresh("bytes");
                Ok((code!("const {name} = await {source}.bytes();"), code!("{name}")))
            }
        }
    }

    /// Wire form (`string` or `Uint8Array`) of a typed body value.
    pub fn encode_body(
        &self,
        ctx: &mut Context,
        codec: BodyCodec,
        media: &MediaType,
        value: &Code,
    ) -> Result<Code, CompileError> {
        let serialized = match &media.schema {
            Some(schema) => self.schema_to_transform(ctx, schema, Mode::Serializer, value)?,
            None => value.clone(),
        };
        match codec {
            BodyCodec::Json => Ok(cat!("JSON.stringify(", serialized, ")")),
            BodyCodec::Form => {
                ctx.use_query_string();
                Ok(cat!("qs.stringify(", serialized, ")"))
            }
            BodyCodec::Text | BodyCodec::Binary | BodyCodec::Raw => Ok(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(matches("text/*", "text/plain"));
        assert!(matches("*/*", "anything/here"));
        assert!(!matches("text/plain", "text/*"));
        assert!(matches("text/*", "text/*"));
        assert!(!matches("application/json", "text/json"));
    }

    #[test]
    fn test_missing_subtype_never_matches_a_wildcard() {
        assert!(!matches("text/*", "text"));
        assert!(!matches("*/*", "text"));
        assert!(!matches("text", "text/plain"));
        assert!(matches("text", "TEXT"));
        assert_eq!(BodyCodec::for_content_type("text"), BodyCodec::Raw);
    }

    #[test]
    fn test_parameters_and_case_are_ignored() {
        assert!(matches("application/json", "Application/JSON; charset=utf-8"));
        assert_eq!(essence("text/plain ; q=1"), "text/plain");
    }

    #[test]
    fn test_first_match_keeps_order() {
        let declared = ["text/*", "text/plain"];
        assert_eq!(first_match(declared, "text/plain"), Some("text/*"));
        assert_eq!(first_match(declared, "image/png"), None);
    }

    #[test]
    fn test_codecs() {
        assert_eq!(BodyCodec::for_content_type("application/json"), BodyCodec::Json);
        assert_eq!(
            BodyCodec::for_content_type("application/x-www-form-urlencoded"),
            BodyCodec::Form
        );
        assert_eq!(BodyCodec::for_content_type("text/csv"), BodyCodec::Text);
        assert_eq!(BodyCodec::for_content_type("application/octet-stream"), BodyCodec::Binary);
        assert_eq!(BodyCodec::for_content_type("application/binary"), BodyCodec::Binary);
        assert_eq!(BodyCodec::for_content_type("image/png"), BodyCodec::Raw);
    }

    #[test]
    fn test_classification_is_repeatable() {
        let first = BodyCodec::for_content_type("application/xml");
        assert_eq!(first, BodyCodec::Raw);
        assert_eq!(BodyCodec::for_content_type("application/xml"), first);
    }
}
