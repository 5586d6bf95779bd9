use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::content::Content;
use super::schema::SchemaOrRef;

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialization style of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Simple,
    Form,
    Matrix,
    Label,
    DeepObject,
    SpaceDelimited,
    PipeDelimited,
}

/// An API parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    #[serde(rename = "in")]
    pub location: ParameterLocation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,

    #[serde(rename = "allowEmptyValue", default)]
    pub allow_empty_value: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaOrRef>,

    /// Content-type addressed alternative to `schema`; exactly one entry.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: Content,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,

    /// Vendor extension: a payload-less query flag.
    #[serde(rename = "x-isFlag", default)]
    pub is_flag: bool,
}

impl Parameter {
    /// Style after applying the location default.
    pub fn effective_style(&self) -> ParameterStyle {
        self.style.unwrap_or(match self.location {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        })
    }

    pub fn effective_explode(&self) -> bool {
        self.explode
            .unwrap_or(self.effective_style() == ParameterStyle::Form)
    }
}

/// A reference or inline parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterOrRef {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    Parameter(Parameter),
}

/// A response header. Same shape as a parameter without `name` and `in`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaOrRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: Content,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
}

impl Header {
    /// View this header as a `header` parameter so the parameter codec applies.
    pub fn to_parameter(&self, name: &str) -> Parameter {
        Parameter {
            name: name.to_string(),
            location: ParameterLocation::Header,
            description: self.description.clone(),
            required: self.required,
            deprecated: None,
            allow_empty_value: false,
            schema: self.schema.clone(),
            content: self.content.clone(),
            style: self.style,
            explode: self.explode,
            is_flag: false,
        }
    }
}

/// A reference or inline header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderOrRef {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    Header(Header),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_styles() {
        let query: Parameter =
            serde_json::from_str(r#"{"name": "page", "in": "query"}"#).unwrap();
        assert_eq!(query.effective_style(), ParameterStyle::Form);
        assert!(query.effective_explode());

        let path: Parameter =
            serde_json::from_str(r#"{"name": "id", "in": "path", "required": true}"#).unwrap();
        assert_eq!(path.effective_style(), ParameterStyle::Simple);
        assert!(!path.effective_explode());
    }

    #[test]
    fn test_flag_extension() {
        let p: Parameter = serde_json::from_str(
            r#"{"name": "verbose", "in": "query", "allowEmptyValue": true, "x-isFlag": true}"#,
        )
        .unwrap();
        assert!(p.is_flag);
        assert!(p.allow_empty_value);
        assert!(p.schema.is_none());
    }
}
