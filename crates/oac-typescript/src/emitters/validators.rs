use oac_core::Document;
use oac_core::error::CompileError;
use oac_core::parse::pointer::schema_pointer;
use serde_json::json;

use super::{EmitOptions, finish_file};
use crate::compile::transform::upper_first;
use crate::compile::{Compiler, TYPES, runtime};
use crate::context::Context;
use crate::formats::FormatRegistry;
use crate::fragment::{Code, quote};
use crate::code;

/// Emit `validators.ts`: a validator built from the document's components and
/// one `validate<Name>` type guard per component schema.
///
/// Validation itself is delegated to the runtime; this file only wires
/// schema pointers to calls.
pub fn emit_validators(
    doc: &Document,
    formats: &FormatRegistry,
    options: &EmitOptions,
) -> Result<String, CompileError> {
    let compiler = Compiler::new(doc, formats).with_namespace(TYPES);
    let mut ctx = Context::new();
    let mut body = Code::new();

    let components = doc.raw().get("components").cloned().unwrap_or_else(|| json!({}));
    let schemas = json!({ "components": components });
    let schemas = serde_json::to_string(&schemas)
        .map_err(|e| CompileError::malformed(format!("components are not serializable: {e}")))?;
    body.append(code!(
        "const validator = {}({schemas});\n",
        runtime(&mut ctx, "createValidator")
    ));

    for (key, _) in doc.spec().schemas() {
        let pointer = schema_pointer(key);
        let ty = compiler.type_name(&mut ctx, &pointer)?;
        let local = upper_first(&doc.ref_name(&pointer)?);
        body.append(code!(
            "\nexport function validate{local}(value: unknown): value is {ty} {{\n  return validator({}, value);\n}}\n",
            quote(&pointer)
        ));
    }
    Ok(finish_file(&ctx, options, &[], body))
}
