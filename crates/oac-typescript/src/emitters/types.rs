use oac_core::Document;
use oac_core::error::CompileError;
use oac_core::parse::pointer::schema_pointer;

use super::{EmitOptions, finish_file};
use crate::compile::Compiler;
use crate::compile::transform::Mode;
use crate::context::Context;
use crate::formats::FormatRegistry;
use crate::fragment::Code;
use crate::{cat, code};

/// Emit `types.ts`: one type per component schema, plus `parse<Name>` and
/// `serialize<Name>` for schemas whose wire form differs from their type.
pub fn emit_types(doc: &Document, formats: &FormatRegistry, options: &EmitOptions) -> Result<String, CompileError> {
    let compiler = Compiler::new(doc, formats);
    let mut ctx = Context::new();
    let mut body = Code::new();

    for (key, schema) in doc.spec().schemas() {
        let pointer = schema_pointer(key);
        let name = compiler.type_name(&mut ctx, &pointer)?;
        log::debug!("emitting type {name}");
        let ty = compiler.schema_to_type(&mut ctx, schema)?;
        body.append(cat!(format!("export type {name} = "), ty, ";\n\n"));

        for mode in [Mode::Parser, Mode::Serializer] {
            if !compiler.needs_transform(&ctx, &pointer, mode)? {
                continue;
            }
            let function = compiler.transform_function(&mut ctx, &pointer, mode)?;
            let value = code!("value");
            let transformed = compiler.schema_to_transform(&mut ctx, schema, mode, &value)?;
            let signature = match mode {
                Mode::Parser => format!("export function {function}(value: any): {name} {{\n"),
                Mode::Serializer => format!("export function {function}(value: {name}): any {{\n"),
            };
            body.append(cat!(signature, "  return ", transformed, ";\n}\n\n"));
        }
    }
    if body.is_empty() {
        body.push("export {};\n");
    }
    Ok(finish_file(&ctx, options, &[], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EmitOptions {
        EmitOptions {
            runtime_module: "oac-runtime".to_string(),
            annotate: false,
        }
    }

    #[test]
    fn test_types_and_transforms() {
        let doc = oac_core::parse::from_yaml(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths: {}
components:
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id: { type: string, format: uuid }
        name: { type: string }
    Name:
      type: string
"#,
        )
        .unwrap();
        let formats = FormatRegistry::builtin("oac-runtime");
        let file = emit_types(&doc, &formats, &options()).unwrap();
        assert!(file.contains("import { Uuid, isUuid, parseUuid } from \"oac-runtime\";"));
        assert!(file.contains("export type Pet = { \"id\": Uuid; \"name\": string };"));
        assert!(file.contains(
            "export function parsePet(value: any): Pet {\n  return { ...value, \"id\": parseUuid(value[\"id\"]) };\n}"
        ));
        assert!(!file.contains("serializePet"));
        assert!(file.contains("export type Name = string;"));
        assert!(!file.contains("parseName"));
        assert!(!file.contains("import * as Runtime"));
    }

    #[test]
    fn test_no_components() {
        let doc = oac_core::parse::from_yaml(
            "openapi: \"3.0.3\"\ninfo: { title: T, version: \"1\" }\npaths: {}\n",
        )
        .unwrap();
        let formats = FormatRegistry::builtin("oac-runtime");
        let file = emit_types(&doc, &formats, &options()).unwrap();
        assert!(file.ends_with("export {};\n"));
    }
}
