use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::content::{RequestBody, RequestBodyOrRef, Response, ResponseOrRef};
use super::parameter::{Header, HeaderOrRef, Parameter, ParameterOrRef};
use super::pointer;
use super::schema::SchemaOrRef;
use super::spec::OpenApiSpec;
use crate::error::{CompileError, ParseError, ResolveError};
use crate::naming::to_identifier;

/// A loaded OpenAPI document: the raw JSON tree for pointer resolution and
/// the typed model for everything else. Immutable once built.
#[derive(Debug, Clone)]
pub struct Document {
    raw: Value,
    spec: OpenApiSpec,
}

/// Model types that may be replaced by a `{ $ref }` object.
pub trait Referable: DeserializeOwned + Clone {
    const KIND: &'static str;
    fn ref_path(&self) -> Option<&str>;
}

macro_rules! referable {
    ($ty:ty, $kind:literal) => {
        impl Referable for $ty {
            const KIND: &'static str = $kind;
            fn ref_path(&self) -> Option<&str> {
                match self {
                    Self::Ref { ref_path } => Some(ref_path),
                    _ => None,
                }
            }
        }
    };
}

referable!(SchemaOrRef, "schema");
referable!(ParameterOrRef, "parameter");
referable!(RequestBodyOrRef, "request body");
referable!(ResponseOrRef, "response");
referable!(HeaderOrRef, "header");

impl Document {
    pub fn from_value(raw: Value) -> Result<Self, ParseError> {
        let spec: OpenApiSpec = serde_json::from_value(raw.clone())?;
        if !spec.is_supported_version() {
            return Err(ParseError::UnsupportedVersion(spec.openapi.clone()));
        }
        Ok(Self { raw, spec })
    }

    pub fn spec(&self) -> &OpenApiSpec {
        &self.spec
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn resolve(&self, reference: &str) -> Result<&Value, ResolveError> {
        pointer::resolve(&self.raw, reference)
    }

    /// Resolve `reference` and decode the target as `T`.
    pub fn resolve_as<T: DeserializeOwned>(
        &self,
        reference: &str,
        expected: &'static str,
    ) -> Result<T, ResolveError> {
        let node = self.resolve(reference)?;
        serde_json::from_value(node.clone()).map_err(|source| ResolveError::Decode {
            reference: reference.to_string(),
            expected,
            source,
        })
    }

    /// Follow a `$ref` chain to the first non-reference node.
    pub fn deref<'a, T: Referable>(&self, node: &'a T) -> Result<Cow<'a, T>, CompileError> {
        let mut current = Cow::Borrowed(node);
        let mut seen: Vec<String> = Vec::new();
        while let Some(reference) = current.ref_path().map(str::to_string) {
            if seen.contains(&reference) {
                return Err(CompileError::malformed(format!(
                    "{} reference cycle through {}",
                    T::KIND,
                    seen.join(" -> ")
                )));
            }
            let next: T = self.resolve_as(&reference, T::KIND)?;
            seen.push(reference);
            current = Cow::Owned(next);
        }
        Ok(current)
    }

    pub fn deref_schema<'a>(
        &self,
        node: &'a SchemaOrRef,
    ) -> Result<Cow<'a, SchemaOrRef>, CompileError> {
        self.deref(node)
    }

    pub fn parameter<'a>(&self, node: &'a ParameterOrRef) -> Result<Cow<'a, Parameter>, CompileError> {
        match self.deref(node)? {
            Cow::Borrowed(ParameterOrRef::Parameter(p)) => Ok(Cow::Borrowed(p)),
            Cow::Owned(ParameterOrRef::Parameter(p)) => Ok(Cow::Owned(p)),
            _ => Err(unresolved(ParameterOrRef::KIND)),
        }
    }

    pub fn request_body<'a>(
        &self,
        node: &'a RequestBodyOrRef,
    ) -> Result<Cow<'a, RequestBody>, CompileError> {
        match self.deref(node)? {
            Cow::Borrowed(RequestBodyOrRef::RequestBody(b)) => Ok(Cow::Borrowed(b)),
            Cow::Owned(RequestBodyOrRef::RequestBody(b)) => Ok(Cow::Owned(b)),
            _ => Err(unresolved(RequestBodyOrRef::KIND)),
        }
    }

    pub fn response<'a>(&self, node: &'a ResponseOrRef) -> Result<Cow<'a, Response>, CompileError> {
        match self.deref(node)? {
            Cow::Borrowed(ResponseOrRef::Response(r)) => Ok(Cow::Borrowed(r)),
            Cow::Owned(ResponseOrRef::Response(r)) => Ok(Cow::Owned(r)),
            _ => Err(unresolved(ResponseOrRef::KIND)),
        }
    }

    pub fn header<'a>(&self, node: &'a HeaderOrRef) -> Result<Cow<'a, Header>, CompileError> {
        match self.deref(node)? {
            Cow::Borrowed(HeaderOrRef::Header(h)) => Ok(Cow::Borrowed(h)),
            Cow::Owned(HeaderOrRef::Header(h)) => Ok(Cow::Owned(h)),
            _ => Err(unresolved(HeaderOrRef::KIND)),
        }
    }

    /// Identifier for a referenced schema: its `title`, else the final pointer
    /// segment, made into a valid identifier.
    pub fn ref_name(&self, reference: &str) -> Result<String, ResolveError> {
        let target = self.resolve(reference)?;
        if let Some(title) = target.get("title").and_then(Value::as_str) {
            return Ok(to_identifier(title));
        }
        let segment = pointer::last_segment(reference)?.unwrap_or_else(|| "Root".to_string());
        Ok(to_identifier(&segment))
    }
}

fn unresolved(kind: &str) -> CompileError {
    CompileError::malformed(format!("{kind} reference did not resolve to a {kind}"))
}
