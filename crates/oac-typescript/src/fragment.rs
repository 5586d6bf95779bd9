//! Provenance-tagged generated code.
//!
//! A [`Code`] value is an append-only list of [`Fragment`]s. Each fragment
//! remembers where it was produced: the generator call site (captured with
//! `#[track_caller]`), the file preamble, or a string-format template.

use std::fmt;
use std::panic::Location;

/// Where a fragment of generated code came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Site { file: &'static str, line: u32 },
    Preamble,
    StringFormat(String),
}

impl Origin {
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Origin::Site {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Site { file, line } => write!(f, "{file}:{line}"),
            Origin::Preamble => f.write_str("preamble"),
            Origin::StringFormat(name) => write!(f, "string-format:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub origin: Origin,
}

/// Generated code: ordered fragments whose concatenation is the source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    fragments: Vec<Fragment>,
}

impl Code {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    pub fn text(text: impl Into<String>) -> Self {
        Self::tagged(text, Origin::caller())
    }

    pub fn tagged(text: impl Into<String>, origin: Origin) -> Self {
        let mut code = Self::new();
        code.push_fragment(Fragment {
            text: text.into(),
            origin,
        });
        code
    }

    #[track_caller]
    pub fn push(&mut self, text: impl AsRef<str>) {
        self.push_fragment(Fragment {
            text: text.as_ref().to_string(),
            origin: Origin::caller(),
        });
    }

    /// Append another piece of code, keeping its provenance.
    pub fn append(&mut self, other: Code) {
        for fragment in other.fragments {
            self.push_fragment(fragment);
        }
    }

    fn push_fragment(&mut self, fragment: Fragment) {
        if fragment.text.is_empty() {
            return;
        }
        match self.fragments.last_mut() {
            Some(last) if last.origin == fragment.origin => last.text.push_str(&fragment.text),
            _ => self.fragments.push(fragment),
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Join pieces with a separator tagged at the caller.
    #[track_caller]
    pub fn join(parts: impl IntoIterator<Item = Code>, separator: &str) -> Code {
        let origin = Origin::caller();
        let mut out = Code::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_fragment(Fragment {
                    text: separator.to_string(),
                    origin: origin.clone(),
                });
            }
            out.append(part);
        }
        out
    }

    /// Wrap in parentheses unless the code is a plain path or literal.
    #[track_caller]
    pub fn parenthesized(&self) -> Code {
        if is_simple_expression(&self.render()) {
            self.clone()
        } else {
            let mut out = Code::text("(");
            out.append(self.clone());
            out.push(")");
            out
        }
    }

    /// Parenthesise object literals so an arrow function returns them
    /// instead of reading them as a block.
    #[track_caller]
    pub fn arrow_body(&self) -> Code {
        if self.render().starts_with('{') {
            let mut out = Code::text("(");
            out.append(self.clone());
            out.push(")");
            out
        } else {
            self.clone()
        }
    }

    pub fn render(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    /// Render with a `/* origin */` marker in front of every fragment.
    pub fn render_annotated(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            out.push_str(&format!("/* {} */", fragment.origin));
            out.push_str(&fragment.text);
        }
        out
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Conversion used by [`cat!`]; plain text is tagged with the caller.
pub trait IntoCode {
    fn into_code(self) -> Code;
}

impl IntoCode for Code {
    fn into_code(self) -> Code {
        self
    }
}

impl IntoCode for &Code {
    fn into_code(self) -> Code {
        self.clone()
    }
}

impl IntoCode for &str {
    #[track_caller]
    fn into_code(self) -> Code {
        Code::text(self)
    }
}

impl IntoCode for String {
    #[track_caller]
    fn into_code(self) -> Code {
        Code::text(self)
    }
}

impl IntoCode for &String {
    #[track_caller]
    fn into_code(self) -> Code {
        Code::text(self.as_str())
    }
}

/// Formatted text as a fragment tagged with the call site.
#[macro_export]
macro_rules! code {
    ($($arg:tt)*) => {
        $crate::fragment::Code::text(format!($($arg)*))
    };
}

/// Concatenate text and code pieces, preserving the provenance of each.
#[macro_export]
macro_rules! cat {
    ($($part:expr),* $(,)?) => {{
        let mut out = $crate::fragment::Code::new();
        $( out.append($crate::fragment::IntoCode::into_code($part)); )*
        out
    }};
}

/// A field of an object type literal or of an argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectField {
    pub name: String,
    pub ty: Code,
    pub optional: bool,
    /// Emit `name` verbatim instead of as a quoted key.
    pub raw: bool,
}

impl ObjectField {
    pub fn required(name: impl Into<String>, ty: Code) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            raw: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: Code) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty)
        }
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    #[track_caller]
    fn declaration(&self) -> Code {
        let key = if self.raw {
            self.name.clone()
        } else {
            quote(&self.name)
        };
        let marker = if self.optional { "?: " } else { ": " };
        let mut out = Code::text(format!("{key}{marker}"));
        out.append(self.ty.clone());
        out
    }
}

/// `{ "a": A; "b"?: B }`, or `{}` without fields.
#[track_caller]
pub fn object_type(fields: &[ObjectField]) -> Code {
    if fields.is_empty() {
        return Code::text("{}");
    }
    let mut out = Code::text("{ ");
    out.append(Code::join(fields.iter().map(ObjectField::declaration), "; "));
    out.push(" }");
    out
}

/// `a: A, b?: B` for a function signature.
#[track_caller]
pub fn argument_list(fields: &[ObjectField]) -> Code {
    Code::join(fields.iter().map(ObjectField::declaration), ", ")
}

/// A double-quoted string literal.
pub fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// A JSON value as a literal, valid both as a value and as a type.
pub fn literal(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Paths such as `value["id"].items` or literals, which never need parentheses.
pub fn is_simple_expression(expr: &str) -> bool {
    !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']' | '"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_keep_origins() {
        let mut code = Code::tagged("a", Origin::Preamble);
        code.append(Code::tagged("b", Origin::StringFormat("uuid".into())));
        code.push("c");
        assert_eq!(code.render(), "abc");
        assert_eq!(code.fragments().len(), 3);
        assert_eq!(code.fragments()[0].origin, Origin::Preamble);
        assert!(matches!(code.fragments()[2].origin, Origin::Site { .. }));
    }

    #[test]
    fn test_adjacent_same_origin_merges() {
        let mut code = Code::tagged("a", Origin::Preamble);
        code.append(Code::tagged("b", Origin::Preamble));
        assert_eq!(code.fragments().len(), 1);
    }

    #[test]
    fn test_annotated_render() {
        let code = Code::tagged("x", Origin::StringFormat("uri".into()));
        assert_eq!(code.render_annotated(), "/* string-format:uri */x");
    }

    #[test]
    fn test_cat_and_join() {
        let parts = vec![code!("a"), code!("b")];
        let joined = cat!("(", Code::join(parts, " | "), ")");
        assert_eq!(joined.render(), "(a | b)");
    }

    #[test]
    fn test_object_type_and_arguments() {
        let fields = vec![
            ObjectField::required("id", code!("string")),
            ObjectField::optional("note", code!("string")),
        ];
        assert_eq!(
            object_type(&fields).render(),
            r#"{ "id": string; "note"?: string }"#
        );
        let args = vec![
            ObjectField::required("transport", code!("Runtime.Transport")).raw(),
            ObjectField::optional("body", code!("Body")).raw(),
        ];
        assert_eq!(
            argument_list(&args).render(),
            "transport: Runtime.Transport, body?: Body"
        );
        assert_eq!(object_type(&[]).render(), "{}");
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(code!("value[\"id\"]").parenthesized().render(), "value[\"id\"]");
        assert_eq!(code!("a ? b : c").parenthesized().render(), "(a ? b : c)");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), r#""a\"b""#);
    }
}
