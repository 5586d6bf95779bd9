use oac_core::Document;
use oac_core::error::CompileError;

use super::{EmitOptions, finish_file};
use crate::compile::operations::operation_sites;
use crate::compile::{Compiler, TYPES};
use crate::context::Context;
use crate::formats::FormatRegistry;
use crate::fragment::{Code, quote};
use crate::code;

/// Emit `client.ts`: one async function per operation, plus `defaultServer`
/// when the document lists servers.
pub fn emit_client(doc: &Document, formats: &FormatRegistry, options: &EmitOptions) -> Result<String, CompileError> {
    let compiler = Compiler::new(doc, formats).with_namespace(TYPES);
    let mut ctx = Context::new();
    let mut body = Code::new();

    if let Some(url) = doc.spec().default_server() {
        body.append(code!("export const defaultServer = {};\n\n", quote(url)));
    }
    let sites = operation_sites(doc)?;
    for (i, site) in sites.iter().enumerate() {
        if i > 0 {
            body.push("\n");
        }
        body.append(compiler.compile_client_call(&mut ctx, site)?);
    }
    if sites.is_empty() && body.is_empty() {
        body.push("export {};\n");
    }
    Ok(finish_file(&ctx, options, &[], body))
}
