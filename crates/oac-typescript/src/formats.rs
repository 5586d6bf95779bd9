//! String-format registry.
//!
//! A format maps a `format` keyword to a type expression plus parse and
//! serialize expression templates. Templates are never evaluated: the body is
//! spliced into the output with the parameter replaced by the value
//! expression.

use indexmap::IndexMap;
use oac_core::config::{FormatConfig, FunctionSpec};
use oac_core::error::{CompileError, ConfigError};
use oac_core::parse::schema::Schema;

use crate::fragment::{Code, Origin};

/// A one-parameter expression template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprTemplate {
    param: String,
    pieces: Vec<Piece>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Hole,
}

impl ExprTemplate {
    pub fn new(param: &str, body: &str) -> Result<Self, String> {
        if !is_identifier(param) {
            return Err(format!("parameter '{param}' is not an identifier"));
        }
        if body.trim().is_empty() {
            return Err("empty body".to_string());
        }
        Ok(Self::parse(param, body))
    }

    fn parse(param: &str, body: &str) -> Self {
        Self {
            param: param.to_string(),
            pieces: split_on_param(body.trim(), param),
        }
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    /// Splice `value` into the body. Non-path values are parenthesised.
    pub fn apply(&self, value: &Code, origin: &Origin) -> Code {
        let mut out = Code::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.append(Code::tagged(text.clone(), origin.clone())),
                Piece::Hole => out.append(value.parenthesized()),
            }
        }
        out
    }

    /// True when applying the template gives back its input unchanged.
    pub fn is_identity(&self) -> bool {
        let probe = Code::text("value");
        self.apply(&probe, &Origin::Preamble).render() == probe.render()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code { depth: usize },
    Quote(char),
    Template,
}

/// Split `body` at whole-identifier occurrences of `param`, skipping string
/// literals, template text outside `${}` and property names after `.`.
fn split_on_param(body: &str, param: &str) -> Vec<Piece> {
    let chars: Vec<char> = body.chars().collect();
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut modes = vec![Scan::Code { depth: 0 }];
    let mut previous: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mode = modes.last().copied().unwrap_or(Scan::Code { depth: 0 });
        match mode {
            Scan::Quote(quote) => {
                text.push(c);
                if c == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        text.push(next);
                        i += 1;
                    }
                } else if c == quote {
                    modes.pop();
                    previous = Some(c);
                }
                i += 1;
            }
            Scan::Template => {
                text.push(c);
                if c == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        text.push(next);
                        i += 1;
                    }
                } else if c == '`' {
                    modes.pop();
                    previous = Some(c);
                } else if c == '$' && chars.get(i + 1) == Some(&'{') {
                    text.push('{');
                    i += 1;
                    modes.push(Scan::Code { depth: 0 });
                    previous = Some('{');
                }
                i += 1;
            }
            Scan::Code { depth } => {
                if c == '"' || c == '\'' {
                    modes.push(Scan::Quote(c));
                    text.push(c);
                    i += 1;
                } else if c == '`' {
                    modes.push(Scan::Template);
                    text.push(c);
                    i += 1;
                } else if c == '{' {
                    set_depth(&mut modes, depth + 1);
                    text.push(c);
                    previous = Some(c);
                    i += 1;
                } else if c == '}' {
                    if depth == 0 && modes.len() > 1 {
                        modes.pop();
                    } else {
                        set_depth(&mut modes, depth.saturating_sub(1));
                    }
                    text.push(c);
                    previous = Some(c);
                    i += 1;
                } else if c.is_ascii_digit() {
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                        text.push(chars[i]);
                        i += 1;
                    }
                    previous = Some('0');
                } else if is_identifier_start(c) {
                    let start = i;
                    while i < chars.len() && is_identifier_part(chars[i]) {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    if word == param && previous != Some('.') {
                        if !text.is_empty() {
                            pieces.push(Piece::Text(std::mem::take(&mut text)));
                        }
                        pieces.push(Piece::Hole);
                    } else {
                        text.push_str(&word);
                    }
                    previous = Some('a');
                } else {
                    text.push(c);
                    if !c.is_whitespace() {
                        previous = Some(c);
                    }
                    i += 1;
                }
            }
        }
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    pieces
}

fn set_depth(modes: &mut [Scan], depth: usize) {
    if let Some(Scan::Code { depth: d }) = modes.last_mut() {
        *d = depth;
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_part)
}

/// Everything the compilers need to know about one string format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub name: String,
    pub type_name: String,
    pub parse: ExprTemplate,
    pub serialize: ExprTemplate,
    pub instanceof: Option<ExprTemplate>,
    pub imports: IndexMap<String, Vec<String>>,
}

impl FormatSpec {
    pub fn from_config(name: &str, config: &FormatConfig) -> Result<Self, ConfigError> {
        let template = |spec: &FunctionSpec| {
            ExprTemplate::new(&spec.param, &spec.body).map_err(|reason| ConfigError::InvalidFormat {
                format: name.to_string(),
                reason,
            })
        };
        if config.type_name.trim().is_empty() {
            return Err(ConfigError::InvalidFormat {
                format: name.to_string(),
                reason: "empty type".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            type_name: config.type_name.clone(),
            parse: template(&config.parse)?,
            serialize: template(&config.serialize)?,
            instanceof: config.instanceof.as_ref().map(template).transpose()?,
            imports: config.imports.clone(),
        })
    }

    fn origin(&self) -> Origin {
        Origin::StringFormat(self.name.clone())
    }

    pub fn type_expr(&self) -> Code {
        Code::tagged(self.type_name.clone(), self.origin())
    }

    pub fn parse_expr(&self, value: &Code) -> Code {
        self.parse.apply(value, &self.origin())
    }

    pub fn serialize_expr(&self, value: &Code) -> Code {
        self.serialize.apply(value, &self.origin())
    }

    pub fn instance_test(&self, value: &Code) -> Option<Code> {
        self.instanceof
            .as_ref()
            .map(|template| template.apply(value, &self.origin()))
    }
}

/// Format name → spec. Built once per run, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: IndexMap<String, FormatSpec>,
}

impl FormatRegistry {
    /// The built-in formats; `uuid` imports its helpers from `runtime_module`.
    pub fn builtin(runtime_module: &str) -> Self {
        let mut registry = Self::default();
        let uuid_imports = IndexMap::from([(
            runtime_module.to_string(),
            vec![
                "Uuid".to_string(),
                "parseUuid".to_string(),
                "isUuid".to_string(),
            ],
        )]);
        let builtins: [(&str, &str, (&str, &str), (&str, &str), Option<(&str, &str)>); 7] = [
            ("uri", "URL", ("s", "new URL(s)"), ("u", "u.href"), Some(("v", "v instanceof URL"))),
            (
                "date-time",
                "Date",
                ("s", "new Date(s)"),
                ("d", "d.toISOString()"),
                Some(("v", "v instanceof Date")),
            ),
            (
                "http-date",
                "Date",
                ("s", "new Date(s)"),
                ("d", "d.toUTCString()"),
                Some(("v", "v instanceof Date")),
            ),
            ("uuid", "Uuid", ("s", "parseUuid(s)"), ("u", "u"), Some(("v", "isUuid(v)"))),
            ("ipv4", "string", ("s", "s"), ("s", "s"), None),
            ("ipv6", "string", ("s", "s"), ("s", "s"), None),
            ("password", "string", ("s", "s"), ("s", "s"), None),
        ];
        for (name, type_name, parse, serialize, instanceof) in builtins {
            registry.insert(FormatSpec {
                name: name.to_string(),
                type_name: type_name.to_string(),
                parse: ExprTemplate::parse(parse.0, parse.1),
                serialize: ExprTemplate::parse(serialize.0, serialize.1),
                instanceof: instanceof.map(|(param, body)| ExprTemplate::parse(param, body)),
                imports: if name == "uuid" {
                    uuid_imports.clone()
                } else {
                    IndexMap::new()
                },
            });
        }
        registry
    }

    /// Built-ins plus user declarations; user entries win.
    pub fn from_config(
        runtime_module: &str,
        formats: &IndexMap<String, FormatConfig>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin(runtime_module);
        for (name, config) in formats {
            registry.insert(FormatSpec::from_config(name, config)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, spec: FormatSpec) {
        self.formats.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&FormatSpec> {
        self.formats.get(name)
    }

    /// Like [`get`](Self::get), but an unregistered format is a hard failure.
    pub fn require(&self, name: &str, schema: &Schema) -> Result<&FormatSpec, CompileError> {
        self.get(name).ok_or_else(|| CompileError::UnknownFormat {
            format: name.to_string(),
            schema: serde_json::to_string(schema).unwrap_or_else(|_| "<schema>".to_string()),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code;

    fn render(template: &ExprTemplate, value: &str) -> String {
        template.apply(&Code::text(value), &Origin::Preamble).render()
    }

    #[test]
    fn test_substitutes_whole_identifiers_only() {
        let t = ExprTemplate::new("s", "new Decimal(s, sx, \"s\", obj.s)").unwrap();
        assert_eq!(render(&t, "v"), "new Decimal(v, sx, \"s\", obj.s)");
    }

    #[test]
    fn test_parenthesises_complex_values() {
        let t = ExprTemplate::new("d", "d.toISOString()").unwrap();
        assert_eq!(render(&t, "value[\"at\"]"), "value[\"at\"].toISOString()");
        assert_eq!(render(&t, "a ?? b"), "(a ?? b).toISOString()");
    }

    #[test]
    fn test_template_literal_holes() {
        let t = ExprTemplate::new("x", "`x=${x}`").unwrap();
        assert_eq!(render(&t, "v"), "`x=${v}`");
    }

    #[test]
    fn test_number_suffix_is_not_identifier() {
        let t = ExprTemplate::new("e5", "1e5 + e5").unwrap();
        assert_eq!(render(&t, "v"), "1e5 + v");
    }

    #[test]
    fn test_identity_detection() {
        assert!(ExprTemplate::new("s", " s ").unwrap().is_identity());
        assert!(!ExprTemplate::new("s", "new URL(s)").unwrap().is_identity());
    }

    #[test]
    fn test_rejects_bad_param() {
        assert!(ExprTemplate::new("1x", "x").is_err());
        assert!(ExprTemplate::new("x", "  ").is_err());
    }

    #[test]
    fn test_builtins() {
        let registry = FormatRegistry::builtin("oac-runtime");
        let uuid = registry.get("uuid").unwrap();
        assert_eq!(uuid.parse_expr(&code!("x")).render(), "parseUuid(x)");
        assert!(uuid.serialize.is_identity());
        assert_eq!(uuid.imports["oac-runtime"].len(), 3);
        let dt = registry.get("date-time").unwrap();
        assert_eq!(dt.serialize_expr(&code!("d")).render(), "d.toISOString()");
        assert_eq!(
            registry.get("http-date").unwrap().serialize_expr(&code!("d")).render(),
            "d.toUTCString()"
        );
        assert_eq!(registry.get("uri").unwrap().type_name, "URL");
        for name in ["ipv4", "ipv6", "password"] {
            let spec = registry.get(name).unwrap();
            assert!(spec.parse.is_identity() && spec.serialize.is_identity());
        }
    }

    #[test]
    fn test_fragments_are_tagged_with_format() {
        let registry = FormatRegistry::builtin("oac-runtime");
        let code = registry.get("uri").unwrap().parse_expr(&code!("x"));
        assert_eq!(code.fragments()[0].origin, Origin::StringFormat("uri".into()));
    }

    #[test]
    fn test_user_format_overrides() {
        let config: IndexMap<String, FormatConfig> = serde_yaml_ng::from_str(
            r#"
uuid:
  type: string
  parse: { param: s, body: s }
  serialize: { param: s, body: s }
decimal:
  type: Decimal
  parse: { param: s, body: "new Decimal(s)" }
  serialize: { param: d, body: "d.toString()" }
  instanceof: { param: v, body: "v instanceof Decimal" }
  imports: { decimal.js: [Decimal] }
"#,
        )
        .unwrap();
        let registry = FormatRegistry::from_config("oac-runtime", &config).unwrap();
        assert_eq!(registry.get("uuid").unwrap().type_name, "string");
        let decimal = registry.get("decimal").unwrap();
        assert_eq!(
            decimal.instance_test(&code!("x")).unwrap().render(),
            "x instanceof Decimal"
        );
    }

    #[test]
    fn test_invalid_user_format() {
        let config: IndexMap<String, FormatConfig> = serde_yaml_ng::from_str(
            r#"
bad:
  type: X
  parse: { param: "not an ident", body: s }
  serialize: { param: s, body: s }
"#,
        )
        .unwrap();
        let err = FormatRegistry::from_config("oac-runtime", &config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { format, .. } if format == "bad"));
    }

    #[test]
    fn test_unknown_format_names_schema() {
        let registry = FormatRegistry::builtin("oac-runtime");
        let schema: Schema =
            serde_json::from_value(serde_json::json!({ "type": "string", "format": "iban" })).unwrap();
        let err = registry.require("iban", &schema).unwrap_err();
        match err {
            CompileError::UnknownFormat { format, schema } => {
                assert_eq!(format, "iban");
                assert!(schema.contains("iban"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
