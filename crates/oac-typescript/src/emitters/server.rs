use oac_core::Document;
use oac_core::error::CompileError;

use super::{EmitOptions, finish_file};
use crate::compile::operations::operation_sites;
use crate::compile::path_template::PathTemplate;
use crate::compile::{Compiler, TYPES, runtime};
use crate::context::Context;
use crate::formats::FormatRegistry;
use crate::fragment::{Code, quote};
use crate::code;

/// Namespace the server file imports `./server-types` under.
pub const SERVER_TYPES: &str = "ServerTypes";

/// Emit `server.ts`: an endpoint per operation and `routes(handlers)`, a
/// table the routing framework mounts. Paths use `:name` placeholders.
pub fn emit_server(doc: &Document, formats: &FormatRegistry, options: &EmitOptions) -> Result<String, CompileError> {
    let compiler = Compiler::new(doc, formats).with_namespace(TYPES);
    let mut ctx = Context::new();
    let mut body = Code::new();

    let sites = operation_sites(doc)?;
    for site in &sites {
        let handler_type = format!("{SERVER_TYPES}.{}", site.handler_type_name());
        body.append(compiler.compile_endpoint(&mut ctx, site, &handler_type)?);
        body.push("\n");
    }

    let route = runtime(&mut ctx, "Route");
    body.append(code!(
        "export function routes(handlers: {SERVER_TYPES}.Handlers): Array<{route}> {{\n  return [\n"
    ));
    for site in &sites {
        body.append(code!(
            "    {{ method: {}, path: {}, handle: (request) => {}(handlers[{}], request) }},\n",
            quote(site.method.as_str()),
            quote(&PathTemplate::parse(site.path).route_pattern()),
            site.endpoint_name(),
            quote(&site.name.camel_case)
        ));
    }
    body.push("  ];\n}\n");
    Ok(finish_file(&ctx, options, &[(SERVER_TYPES, "./server-types")], body))
}
