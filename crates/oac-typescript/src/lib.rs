//! OpenAPI to TypeScript compiler.
//!
//! The [`compile`] module turns schemas, parameters and operations into
//! [`fragment::Code`]; [`emitters`] assemble those into files and
//! [`generator::TypeScriptGenerator`] drives a whole run.

pub mod compile;
pub mod context;
pub mod emitters;
pub mod formats;
pub mod fragment;
pub mod generator;

pub use formats::FormatRegistry;
pub use generator::{TypeScriptConfig, TypeScriptGenerator};
