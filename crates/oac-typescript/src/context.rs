use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

/// Per-file compilation state: a counter-based name source and the usage
/// flags the preamble is built from.
#[derive(Debug, Clone, Default)]
pub struct Context {
    next_name: usize,
    usage: Usage,
}

/// Which optional imports the generated body referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    /// `Runtime.*` helpers.
    pub runtime: bool,
    /// The namespaced `./types` module.
    pub types: bool,
    /// The query-string library used by form bodies.
    pub query_string: bool,
    /// Module → symbols pulled in by string formats.
    pub imports: BTreeMap<String, BTreeSet<String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A local name that does not collide with any other name minted by this
    /// context: `value_0`, `value_1`, ...
    pub fn fresh(&mut self, hint: &str) -> String {
        let name = format!("{hint}_{}", self.next_name);
        self.next_name += 1;
        name
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    pub fn use_runtime(&mut self) {
        self.usage.runtime = true;
    }

    pub fn use_types(&mut self) {
        self.usage.types = true;
    }

    pub fn use_query_string(&mut self) {
        self.usage.query_string = true;
    }

    pub fn use_imports(&mut self, imports: &IndexMap<String, Vec<String>>) {
        for (module, symbols) in imports {
            self.usage
                .imports
                .entry(module.clone())
                .or_default()
                .extend(symbols.iter().cloned());
        }
    }

    /// A throwaway copy for probing whether something would generate code.
    pub fn scratch(&self) -> Context {
        self.clone()
    }
}
