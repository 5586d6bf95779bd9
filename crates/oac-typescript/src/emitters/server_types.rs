use oac_core::Document;
use oac_core::error::CompileError;

use super::{EmitOptions, finish_file};
use crate::compile::operations::operation_sites;
use crate::compile::{Compiler, TYPES};
use crate::context::Context;
use crate::formats::FormatRegistry;
use crate::fragment::{Code, quote};
use crate::code;

/// Emit `server-types.ts`: a handler type per operation and the `Handlers`
/// record the server's route table is built from.
pub fn emit_server_types(
    doc: &Document,
    formats: &FormatRegistry,
    options: &EmitOptions,
) -> Result<String, CompileError> {
    let compiler = Compiler::new(doc, formats).with_namespace(TYPES);
    let mut ctx = Context::new();
    let mut body = Code::new();

    let sites = operation_sites(doc)?;
    for site in &sites {
        body.append(compiler.compile_handler_type(&mut ctx, site)?);
        body.push("\n");
    }
    body.push("export type Handlers = {\n");
    for site in &sites {
        body.append(code!(
            "  {}: {};\n",
            quote(&site.name.camel_case),
            site.handler_type_name()
        ));
    }
    body.push("};\n");
    Ok(finish_file(&ctx, options, &[], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handlers_record() {
        let doc = oac_core::parse::from_yaml(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths:
  /ping:
    get:
      operationId: ping
      responses:
        "204": { description: pong }
"#,
        )
        .unwrap();
        let formats = FormatRegistry::builtin("oac-runtime");
        let options = EmitOptions {
            runtime_module: "oac-runtime".to_string(),
            annotate: false,
        };
        let file = emit_server_types(&doc, &formats, &options).unwrap();
        insta::assert_snapshot!(file.trim_end(), @r#"
        // Generated by oac. Do not edit.

        export type PingHandler = () => Promise<{ status: 204 }>;

        export type Handlers = {
          "ping": PingHandler;
        };
        "#);
    }
}
