use oac_core::error::CompileError;
use oac_core::parse::schema::{AdditionalProperties, Schema, SchemaOrRef, SchemaType};

use super::Compiler;
use crate::context::Context;
use crate::fragment::{Code, ObjectField, literal, object_type};
use crate::{cat, code};

impl Compiler<'_> {
    /// Compile a schema into a TypeScript type expression.
    ///
    /// References become names and are never inlined, so recursive schemas
    /// terminate. The output depends only on the schema, never on the
    /// context's name counter.
    pub fn schema_to_type(&self, ctx: &mut Context, schema: &SchemaOrRef) -> Result<Code, CompileError> {
        match schema {
            SchemaOrRef::Bool(true) => Ok(code!("unknown")),
            SchemaOrRef::Bool(false) => Ok(code!("never")),
            SchemaOrRef::Ref { ref_path } => Ok(Code::text(self.type_name(ctx, ref_path)?)),
            SchemaOrRef::Schema(inner) => {
                let ty = self.inline_type(ctx, inner)?;
                if inner.is_nullable() {
                    Ok(cat!("(", ty, " | null)"))
                } else {
                    Ok(ty)
                }
            }
        }
    }

    /// Name of the type declared for the schema at `ref_path`.
    pub fn type_name(&self, ctx: &mut Context, ref_path: &str) -> Result<String, CompileError> {
        let name = self.doc.ref_name(ref_path)?;
        Ok(self.qualify(ctx, &name))
    }

    fn inline_type(&self, ctx: &mut Context, schema: &Schema) -> Result<Code, CompileError> {
        if !schema.all_of.is_empty() {
            let mut members = self.compile_all(ctx, &schema.all_of)?;
            if !schema.properties.is_empty() || schema.additional_properties.is_some() {
                members.push(self.object_type(ctx, schema)?);
            }
            return Ok(join_members(members, " & "));
        }
        if !schema.one_of.is_empty() {
            return self.combine(ctx, &schema.one_of, " | ");
        }
        if !schema.any_of.is_empty() {
            return self.combine(ctx, &schema.any_of, " | ");
        }
        if !schema.enum_values.is_empty() {
            let members: Vec<Code> = schema.enum_values.iter().map(|v| Code::text(literal(v))).collect();
            return Ok(if members.len() == 1 {
                Code::join(members, "")
            } else {
                cat!("(", Code::join(members, " | "), ")")
            });
        }
        if let Some(value) = &schema.const_value {
            return Ok(Code::text(literal(value)));
        }

        match &schema.schema_type {
            Some(SchemaType::Null) => Ok(code!("null")),
            Some(SchemaType::Boolean) => Ok(code!("boolean")),
            Some(SchemaType::Integer) | Some(SchemaType::Number) => Ok(code!("number")),
            Some(SchemaType::String) => self.string_type(ctx, schema),
            Some(SchemaType::Array) => self.array_type(ctx, schema),
            Some(SchemaType::Object) => self.object_type(ctx, schema),
            Some(SchemaType::Unknown(other)) => Err(CompileError::UnhandledSchema(format!(
                "unknown type '{other}' in {}",
                serde_json::to_string(schema).unwrap_or_default()
            ))),
            None if schema.is_object_like() => self.object_type(ctx, schema),
            None if schema.items.is_some() => self.array_type(ctx, schema),
            None if schema.format.is_some() => self.string_type(ctx, schema),
            None => Ok(code!("unknown")),
        }
    }

    fn combine(&self, ctx: &mut Context, parts: &[SchemaOrRef], operator: &str) -> Result<Code, CompileError> {
        Ok(join_members(self.compile_all(ctx, parts)?, operator))
    }

    fn compile_all(&self, ctx: &mut Context, parts: &[SchemaOrRef]) -> Result<Vec<Code>, CompileError> {
        parts.iter().map(|part| self.schema_to_type(ctx, part)).collect()
    }

    fn string_type(&self, ctx: &mut Context, schema: &Schema) -> Result<Code, CompileError> {
        match &schema.format {
            Some(format) => {
                let spec = self.formats.require(format, schema)?;
                ctx.use_imports(&spec.imports);
                Ok(spec.type_expr())
            }
            None => Ok(code!("string")),
        }
    }

    fn array_type(&self, ctx: &mut Context, schema: &Schema) -> Result<Code, CompileError> {
        match &schema.items {
            Some(items) => Ok(cat!("Array<", self.schema_to_type(ctx, items)?, ">")),
            None => Ok(code!("Array<unknown>")),
        }
    }

    fn object_type(&self, ctx: &mut Context, schema: &Schema) -> Result<Code, CompileError> {
        let mut fields = Vec::with_capacity(schema.properties.len());
        for (name, property) in &schema.properties {
            let ty = self.schema_to_type(ctx, property)?;
            fields.push(if schema.required.contains(name) {
                ObjectField::required(name, ty)
            } else {
                ObjectField::optional(name, ty)
            });
        }

        let index = match &schema.additional_properties {
            Some(AdditionalProperties::Bool(true)) => Some(code!("unknown")),
            Some(AdditionalProperties::Schema(extra)) => Some(self.schema_to_type(ctx, extra)?),
            Some(AdditionalProperties::Bool(false)) | None => None,
        };

        match index {
            // A bare `{ type: object }` is free-form.
            None if fields.is_empty() && schema.additional_properties.is_none() => {
                Ok(code!("Record<string, unknown>"))
            }
            None if fields.is_empty() => Ok(code!("Record<string, never>")),
            None => Ok(object_type(&fields)),
            // Every property type is assignable to `unknown`, so one literal suffices.
            Some(value) if fields.is_empty() || value.render() == "unknown" => {
                fields.push(index_signature(value));
                Ok(object_type(&fields))
            }
            Some(value) => Ok(cat!(
                "(",
                object_type(&fields),
                " & ",
                object_type(&[index_signature(value)]),
                ")"
            )),
        }
    }
}

fn join_members(members: Vec<Code>, operator: &str) -> Code {
    if members.len() == 1 {
        return Code::join(members, "");
    }
    cat!("(", Code::join(members, operator), ")")
}

fn index_signature(value: Code) -> ObjectField {
    ObjectField::required("[key: string]", value).raw()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatRegistry;
    use oac_core::Document;
    use serde_json::json;

    fn document() -> Document {
        Document::from_value(json!({
            "openapi": "3.0.3",
            "info": { "title": "T", "version": "1" },
            "paths": {},
            "components": {
                "schemas": {
                    "Pet": { "type": "object", "properties": { "name": { "type": "string" } } },
                    "pet-tag": { "type": "string" },
                    "Tree": {
                        "type": "object",
                        "properties": {
                            "children": { "type": "array", "items": { "$ref": "#/components/schemas/Tree" } }
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn compile(schema: serde_json::Value) -> Result<String, CompileError> {
        let doc = document();
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        let schema: SchemaOrRef = serde_json::from_value(schema).unwrap();
        compiler
            .schema_to_type(&mut Context::new(), &schema)
            .map(|code| code.render())
    }

    #[test]
    fn test_booleans_and_empty() {
        assert_eq!(compile(json!(true)).unwrap(), "unknown");
        assert_eq!(compile(json!(false)).unwrap(), "never");
        assert_eq!(compile(json!({})).unwrap(), "unknown");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(compile(json!({ "type": "integer" })).unwrap(), "number");
        assert_eq!(compile(json!({ "type": "number" })).unwrap(), "number");
        assert_eq!(compile(json!({ "type": "boolean" })).unwrap(), "boolean");
        assert_eq!(compile(json!({ "type": "null" })).unwrap(), "null");
        assert_eq!(compile(json!({ "type": "string" })).unwrap(), "string");
    }

    #[test]
    fn test_string_enum_const_and_format() {
        assert_eq!(
            compile(json!({ "type": "string", "enum": ["a", "b"] })).unwrap(),
            r#"("a" | "b")"#
        );
        assert_eq!(compile(json!({ "type": "string", "const": "x" })).unwrap(), r#""x""#);
        assert_eq!(
            compile(json!({ "type": "string", "format": "date-time" })).unwrap(),
            "Date"
        );
        assert!(matches!(
            compile(json!({ "type": "string", "format": "iban" })),
            Err(CompileError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_references_are_named() {
        assert_eq!(compile(json!({ "$ref": "#/components/schemas/Pet" })).unwrap(), "Pet");
        assert_eq!(
            compile(json!({ "$ref": "#/components/schemas/pet-tag" })).unwrap(),
            "pet_tag"
        );
        assert_eq!(
            compile(json!({ "$ref": "#/components/schemas/Tree" })).unwrap(),
            "Tree"
        );
    }

    #[test]
    fn test_namespace_marks_usage() {
        let doc = document();
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats).with_namespace("Types");
        let mut ctx = Context::new();
        let schema = SchemaOrRef::reference("#/components/schemas/Pet");
        let code = compiler.schema_to_type(&mut ctx, &schema).unwrap();
        assert_eq!(code.render(), "Types.Pet");
        assert!(ctx.usage().types);
    }

    #[test]
    fn test_composition() {
        assert_eq!(
            compile(json!({ "allOf": [{ "$ref": "#/components/schemas/Pet" }, { "type": "object", "properties": { "id": { "type": "integer" } }, "required": ["id"] }] })).unwrap(),
            r#"(Pet & { "id": number })"#
        );
        assert_eq!(
            compile(json!({ "oneOf": [{ "type": "string" }, { "type": "integer" }] })).unwrap(),
            "(string | number)"
        );
        assert_eq!(
            compile(json!({ "anyOf": [{ "type": "string" }] })).unwrap(),
            "string"
        );
    }

    #[test]
    fn test_all_of_keeps_sibling_properties() {
        assert_eq!(
            compile(json!({
                "allOf": [{ "$ref": "#/components/schemas/Pet" }],
                "properties": { "at": { "type": "string", "format": "date-time" } }
            }))
            .unwrap(),
            r#"(Pet & { "at"?: Date })"#
        );
        assert_eq!(
            compile(json!({
                "allOf": [{ "$ref": "#/components/schemas/Pet" }, { "$ref": "#/components/schemas/Tree" }],
                "required": ["id"],
                "properties": { "id": { "type": "integer" } }
            }))
            .unwrap(),
            r#"(Pet & Tree & { "id": number })"#
        );
    }

    #[test]
    fn test_enum_outranks_format() {
        assert_eq!(
            compile(json!({ "type": "string", "format": "date-time", "enum": ["2020-01-01T00:00:00Z"] })).unwrap(),
            r#""2020-01-01T00:00:00Z""#
        );
        assert_eq!(
            compile(json!({ "type": "string", "format": "iban", "enum": ["a", "b"] })).unwrap(),
            r#"("a" | "b")"#
        );
    }

    #[test]
    fn test_free_form_objects_are_open() {
        assert_eq!(compile(json!({ "type": "object" })).unwrap(), "Record<string, unknown>");
        assert_eq!(
            compile(json!({ "type": "object", "properties": {} })).unwrap(),
            "Record<string, unknown>"
        );
        assert_eq!(
            compile(json!({ "type": "object", "additionalProperties": false })).unwrap(),
            "Record<string, never>"
        );
        assert_eq!(
            compile(json!({ "type": "object", "properties": { "a": { "type": "string" } } })).unwrap(),
            r#"{ "a"?: string }"#
        );
    }

    #[test]
    fn test_arrays() {
        assert_eq!(compile(json!({ "type": "array" })).unwrap(), "Array<unknown>");
        assert_eq!(
            compile(json!({ "type": "array", "items": { "type": "string", "format": "uri" } })).unwrap(),
            "Array<URL>"
        );
    }

    #[test]
    fn test_objects() {
        assert_eq!(
            compile(json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "string", "format": "uuid" },
                    "note": { "type": "string" }
                }
            }))
            .unwrap(),
            r#"{ "id": Uuid; "note"?: string }"#
        );
        assert_eq!(
            compile(json!({ "type": "object" })).unwrap(),
            "Record<string, unknown>"
        );
        assert_eq!(
            compile(json!({ "type": "object", "additionalProperties": false })).unwrap(),
            "Record<string, never>"
        );
        assert_eq!(
            compile(json!({ "type": "object", "additionalProperties": true })).unwrap(),
            "{ [key: string]: unknown }"
        );
        assert_eq!(
            compile(json!({ "type": "object", "additionalProperties": { "type": "integer" } })).unwrap(),
            "{ [key: string]: number }"
        );
        assert_eq!(
            compile(json!({
                "type": "object",
                "properties": { "a": { "type": "string" } },
                "required": ["a"],
                "additionalProperties": true
            }))
            .unwrap(),
            r#"{ "a": string; [key: string]: unknown }"#
        );
        assert_eq!(
            compile(json!({
                "properties": { "a": { "type": "string" } },
                "required": ["a"],
                "additionalProperties": { "type": "number" }
            }))
            .unwrap(),
            r#"({ "a": string } & { [key: string]: number })"#
        );
    }

    #[test]
    fn test_nullable_and_non_string_enums() {
        assert_eq!(
            compile(json!({ "type": "string", "nullable": true })).unwrap(),
            "(string | null)"
        );
        assert_eq!(compile(json!({ "type": "integer", "enum": [1, 2] })).unwrap(), "(1 | 2)");
    }

    #[test]
    fn test_unknown_type_is_unhandled() {
        assert!(matches!(
            compile(json!({ "type": "decimal" })),
            Err(CompileError::UnhandledSchema(_))
        ));
    }

    #[test]
    fn test_idempotent() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "$ref": "#/components/schemas/pet-tag" } },
                "at": { "type": "string", "format": "date-time" }
            }
        });
        assert_eq!(compile(schema.clone()).unwrap(), compile(schema).unwrap());
    }
}
