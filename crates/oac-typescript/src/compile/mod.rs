//! Schema and operation compilers.
//!
//! All compilers hang off [`Compiler`], which borrows the document and the
//! format registry, and take the per-file [`Context`] explicitly.

pub mod content_type;
pub mod operations;
pub mod params;
pub mod path_template;
pub mod transform;
pub mod types;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use oac_core::Document;

use crate::context::Context;
use crate::formats::FormatRegistry;
use self::transform::Mode;

/// Alias under which generated files import the runtime module.
pub const RUNTIME: &str = "Runtime";

/// Alias under which non-types files import `./types`.
pub const TYPES: &str = "Types";

pub struct Compiler<'a> {
    doc: &'a Document,
    formats: &'a FormatRegistry,
    namespace: Option<&'a str>,
    /// Schema pointers whose transform need is being probed.
    probing: RefCell<Vec<String>>,
    /// Shallowest `probing` depth a cycle short-circuit fell back to.
    cycle_floor: Cell<usize>,
    /// Settled `needs_transform` answers.
    needs: RefCell<HashMap<(String, Mode), bool>>,
}

impl<'a> Compiler<'a> {
    pub fn new(doc: &'a Document, formats: &'a FormatRegistry) -> Self {
        Self {
            doc,
            formats,
            namespace: None,
            probing: RefCell::new(Vec::new()),
            cycle_floor: Cell::new(usize::MAX),
            needs: RefCell::new(HashMap::new()),
        }
    }

    /// Qualify named schema types and transform functions with `namespace`.
    pub fn with_namespace(mut self, namespace: &'a str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn formats(&self) -> &'a FormatRegistry {
        self.formats
    }

    fn qualify(&self, ctx: &mut Context, name: &str) -> String {
        match self.namespace {
            Some(namespace) => {
                ctx.use_types();
                format!("{namespace}.{name}")
            }
            None => name.to_string(),
        }
    }
}

/// `Runtime.<symbol>`, marking the runtime import as used.
pub fn runtime(ctx: &mut Context, symbol: &str) -> String {
    ctx.use_runtime();
    format!("{RUNTIME}.{symbol}")
}

/// `new Runtime.MalformedError(location, name, message)` as a throw statement.
pub fn throw_malformed(ctx: &mut Context, location: &str, name: &str, message: &str) -> String {
    format!(
        "throw new {}({}, {}, {});",
        runtime(ctx, "MalformedError"),
        crate::fragment::quote(location),
        crate::fragment::quote(name),
        message
    )
}
