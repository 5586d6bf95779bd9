use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::content::{RequestBodyOrRef, ResponseOrRef};
use super::operation::PathItem;
use super::parameter::{HeaderOrRef, ParameterOrRef};
use super::schema::SchemaOrRef;
use super::security::{SecurityRequirement, SecurityScheme};

/// Root of an OpenAPI 3.0 document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiSpec {
    pub openapi: String,

    pub info: Info,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub paths: IndexMap<String, PathItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,

    /// Document-wide default, overridden by any operation-level list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
}

impl OpenApiSpec {
    /// Only the 3.x line is compiled.
    pub fn is_supported_version(&self) -> bool {
        self.openapi.starts_with("3.")
    }

    /// Component schemas in declaration order.
    pub fn schemas(&self) -> impl Iterator<Item = (&str, &SchemaOrRef)> {
        self.components
            .iter()
            .flat_map(|c| c.schemas.iter().map(|(name, schema)| (name.as_str(), schema)))
    }

    /// URL of the first listed server.
    pub fn default_server(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }

    pub fn default_security(&self) -> Option<&[SecurityRequirement]> {
        self.security.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub version: String,
}

/// A server entry. Variables are not expanded; the URL is used as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Reusable definitions, addressed by `#/components/<kind>/<name>` pointers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, SchemaOrRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, ParameterOrRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, HeaderOrRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub request_bodies: IndexMap<String, RequestBodyOrRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub responses: IndexMap<String, ResponseOrRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}
