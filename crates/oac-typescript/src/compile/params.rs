//! Parameter codec: packing typed values into path segments, query pairs,
//! header and cookie strings, and unpacking (with validation) the other way.

use oac_core::error::CompileError;
use oac_core::parse::parameter::{Parameter, ParameterLocation, ParameterStyle};
use oac_core::parse::content::MediaType;
use oac_core::parse::schema::{AdditionalProperties, ExclusiveBound, Schema, SchemaOrRef, SchemaType};

use super::transform::Mode;
use super::{Compiler, throw_malformed};
use crate::context::Context;
use crate::fragment::{Code, literal, quote};
use crate::{cat, code};

/// A packed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packed {
    /// `Array<[string, string | null]>`; a `null` value is a bare key.
    Pairs(Code),
    /// A single `string`.
    Text(Code),
}

enum Shape {
    Array(Schema),
    Object(Schema),
    Scalar(Schema),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Integer,
    Number,
    String,
}

impl Compiler<'_> {
    /// Type of a parameter value as seen by client callers and server handlers.
    pub fn parameter_type(&self, ctx: &mut Context, param: &Parameter) -> Result<Code, CompileError> {
        if param.is_flag {
            check_flag(param)?;
            return Ok(code!("boolean"));
        }
        if !param.content.is_empty() {
            let (content_type, media) = single_content(param)?;
            return match content_type {
                "application/json" => match &media.schema {
                    Some(schema) => self.schema_to_type(ctx, schema),
                    None => Ok(code!("unknown")),
                },
                "text/plain" => Ok(code!("string")),
                other => Err(unsupported_content(param, other)),
            };
        }
        self.schema_to_type(ctx, parameter_schema(param)?)
    }

    pub fn pack_parameter_expression(
        &self,
        ctx: &mut Context,
        param: &Parameter,
        value: &Code,
    ) -> Result<Packed, CompileError> {
        let name = quote(&param.name);
        if param.is_flag {
            check_flag(param)?;
            return Ok(Packed::Pairs(cat!(
                value.parenthesized(),
                format!(" ? [[{name}, null]] : []")
            )));
        }
        if !param.content.is_empty() {
            let text = self.pack_content(ctx, param, value)?;
            return Ok(match param.location {
                ParameterLocation::Query | ParameterLocation::Cookie => {
                    Packed::Pairs(cat!(format!("[[{name}, "), text, "]]"))
                }
                ParameterLocation::Path | ParameterLocation::Header => Packed::Text(text),
            });
        }
        let schema = parameter_schema(param)?;
        let explode = param.effective_explode();
        match param.effective_style() {
            ParameterStyle::Simple => Ok(Packed::Text(self.pack_simple(ctx, schema, explode, value)?)),
            ParameterStyle::Form => Ok(Packed::Pairs(self.pack_form(ctx, &name, schema, explode, value)?)),
            other => Err(unsupported_style(param, other)),
        }
    }

    fn pack_simple(
        &self,
        ctx: &mut Context,
        schema: &SchemaOrRef,
        explode: bool,
        value: &Code,
    ) -> Result<Code, CompileError> {
        match self.shape(schema)? {
            Shape::Array(items) => self.join_items(ctx, &items, value),
            Shape::Object(object) => {
                let entries = self.object_entries(ctx, &object, value)?;
                if explode {
                    Ok(cat!(
                        entries,
                        ".map(([key, item]) => key + \"=\" + item).join(\",\")"
                    ))
                } else {
                    Ok(cat!(entries, ".flat().join(\",\")"))
                }
            }
            Shape::Scalar(scalar) => self.pack_scalar(ctx, &scalar, value),
        }
    }

    fn pack_form(
        &self,
        ctx: &mut Context,
        name: &str,
        schema: &SchemaOrRef,
        explode: bool,
        value: &Code,
    ) -> Result<Code, CompileError> {
        match self.shape(schema)? {
            Shape::Array(items) if explode => {
                let item = ctx.fresh("item");
                let packed = self.pack_scalar(ctx, &items, &code!("{item}"))?;
                Ok(cat!(
                    value.parenthesized(),
                    format!(".map(({item}: any): [string, string] => [{name}, "),
                    packed,
                    "])"
                ))
            }
            Shape::Array(items) => Ok(cat!(
                format!("[[{name}, "),
                self.join_items(ctx, &items, value)?,
                "]]"
            )),
            Shape::Object(object) if explode => self.object_entries(ctx, &object, value),
            Shape::Object(object) => Ok(cat!(
                format!("[[{name}, "),
                self.object_entries(ctx, &object, value)?,
                ".flat().join(\",\")]]"
            )),
            Shape::Scalar(scalar) => Ok(cat!(
                format!("[[{name}, "),
                self.pack_scalar(ctx, &scalar, value)?,
                "]]"
            )),
        }
    }

    /// `a,b,c` from an array value.
    fn join_items(&self, ctx: &mut Context, items: &Schema, value: &Code) -> Result<Code, CompileError> {
        let item = ctx.fresh("item");
        let packed = self.pack_scalar(ctx, items, &code!("{item}"))?;
        if packed.render() == item {
            return Ok(cat!(value.parenthesized(), ".join(\",\")"));
        }
        Ok(cat!(
            value.parenthesized(),
            format!(".map(({item}: any) => "),
            packed,
            ").join(\",\")"
        ))
    }

    /// `Array<[string, string]>` of the object's present properties.
    fn object_entries(&self, ctx: &mut Context, object: &Schema, value: &Code) -> Result<Code, CompileError> {
        let base = value.parenthesized();
        if object.properties.is_empty() {
            let extra = match &object.additional_properties {
                Some(AdditionalProperties::Schema(extra)) => self.resolved_schema(extra)?,
                _ => Schema::default(),
            };
            let key = ctx.fresh("key");
            let entry = ctx.fresh("entry");
            let packed = self.pack_scalar(ctx, &extra, &code!("{entry}"))?;
            return Ok(cat!(
                "Object.entries(",
                &base,
                format!(").map(([{key}, {entry}]: [string, any]): [string, string] => [{key}, "),
                packed,
                "])"
            ));
        }
        let mut elements = Vec::new();
        for (name, property) in &object.properties {
            let key = quote(name);
            let access = cat!(&base, "[", &key, "]");
            let property = self.resolved_schema(property)?;
            let packed = self.pack_scalar(ctx, &property, &access)?;
            if object.required.contains(name) {
                elements.push(cat!("[", &key, ", ", packed, "]"));
            } else {
                elements.push(cat!(
                    "...(",
                    access,
                    " !== undefined ? [[",
                    &key,
                    ", ",
                    packed,
                    "]] : [])"
                ));
            }
        }
        Ok(cat!(
            "([",
            Code::join(elements, ", "),
            "] as Array<[string, string]>)"
        ))
    }

    fn pack_scalar(&self, ctx: &mut Context, schema: &Schema, value: &Code) -> Result<Code, CompileError> {
        if schema.is_composite() {
            return Err(CompileError::not_implemented("composite schema as a parameter value"));
        }
        match &schema.schema_type {
            Some(SchemaType::Integer | SchemaType::Number | SchemaType::Null) => Ok(cat!("String(", value, ")")),
            Some(SchemaType::Boolean) => Ok(cat!("(", value, " ? \"true\" : \"\")")),
            Some(SchemaType::String) => {
                self.schema_to_serializer(ctx, &SchemaOrRef::inline(schema.clone()), value)
            }
            Some(SchemaType::Array | SchemaType::Object) => Err(CompileError::not_implemented(
                "nested array or object inside a parameter value",
            )),
            Some(SchemaType::Unknown(other)) => Err(CompileError::UnhandledSchema(format!(
                "unknown type '{other}' in a parameter"
            ))),
            None if schema.format.is_some() => {
                self.schema_to_serializer(ctx, &SchemaOrRef::inline(schema.clone()), value)
            }
            None => Ok(cat!("String(", value, ")")),
        }
    }

    fn pack_content(&self, ctx: &mut Context, param: &Parameter, value: &Code) -> Result<Code, CompileError> {
        let (content_type, media) = single_content(param)?;
        match content_type {
            "application/json" => {
                let serialized = match &media.schema {
                    Some(schema) => self.schema_to_serializer(ctx, schema, value)?,
                    None => value.clone(),
                };
                Ok(cat!("JSON.stringify(", serialized, ")"))
            }
            "text/plain" => Ok(value.clone()),
            other => Err(unsupported_content(param, other)),
        }
    }

    /// Typed value from the raw wire string `raw`. Flags take the possibly
    /// undefined raw value and yield whether it was present.
    pub fn unpack_parameter_expression(
        &self,
        ctx: &mut Context,
        param: &Parameter,
        raw: &Code,
    ) -> Result<Code, CompileError> {
        if param.is_flag {
            check_flag(param)?;
            return Ok(cat!("(", raw, " !== undefined)"));
        }
        if !param.content.is_empty() {
            return self.unpack_content(ctx, param, raw);
        }
        let schema = parameter_schema(param)?;
        let style = param.effective_style();
        if !matches!(style, ParameterStyle::Simple | ParameterStyle::Form) {
            return Err(unsupported_style(param, style));
        }
        let schema = self.resolved_schema(schema)?;
        let kind = match &schema.schema_type {
            Some(SchemaType::Integer) => ScalarKind::Integer,
            Some(SchemaType::Number) => ScalarKind::Number,
            Some(SchemaType::String) | None if !schema.is_composite() && !schema.is_object_like() && schema.items.is_none() => {
                ScalarKind::String
            }
            other => {
                let described = other.as_ref().map(ToString::to_string).unwrap_or_else(|| "composite".to_string());
                return Err(CompileError::not_implemented(format!(
                    "unpacking {} parameter '{}' of type {described}",
                    param.location, param.name
                )));
            }
        };
        self.unpack_scalar(ctx, param.location.as_str(), &param.name, &schema, kind, raw)
    }

    fn unpack_scalar(
        &self,
        ctx: &mut Context,
        location: &str,
        name: &str,
        schema: &Schema,
        kind: ScalarKind,
        raw: &Code,
    ) -> Result<Code, CompileError> {
        let raw_name = ctx.fresh("raw");
        let raw_var = code!("{raw_name}");
        let mut statements = Vec::new();

        let result = match kind {
            ScalarKind::Integer | ScalarKind::Number => {
                let value_name = ctx.fresh("value");
                statements.push(code!("const {value_name} = Number({raw_name});"));
                statements.push(Code::text(format!(
                    "if ({raw_name}.trim() === \"\" || Number.isNaN({value_name})) {}",
                    throw_malformed(ctx, location, name, &quote("expected a number"))
                )));
                if kind == ScalarKind::Integer {
                    statements.push(Code::text(format!(
                        "if (!Number.isInteger({value_name})) {}",
                        throw_malformed(ctx, location, name, &quote("expected an integer"))
                    )));
                }
                statements.extend(numeric_checks(ctx, location, name, schema, &value_name));
                statements.extend(membership_checks(ctx, location, name, schema, &value_name));
                code!("{value_name}")
            }
            ScalarKind::String => {
                statements.extend(string_checks(ctx, location, name, schema, &raw_name));
                statements.extend(membership_checks(ctx, location, name, schema, &raw_name));
                let plain = SchemaOrRef::inline(Schema {
                    nullable: None,
                    ..schema.clone()
                });
                if statements.is_empty() {
                    return self.schema_to_parser(ctx, &plain, raw);
                }
                self.schema_to_parser(ctx, &plain, &raw_var)?
            }
        };

        let annotation = match kind {
            ScalarKind::Integer | ScalarKind::Number => ": number",
            ScalarKind::String => "",
        };
        Ok(cat!(
            format!("(({raw_name}: string){annotation} => {{ "),
            Code::join(statements, " "),
            " return ",
            result,
            "; })(",
            raw,
            ")"
        ))
    }

    fn unpack_content(&self, ctx: &mut Context, param: &Parameter, raw: &Code) -> Result<Code, CompileError> {
        let (content_type, media) = single_content(param)?;
        match content_type {
            "application/json" => {
                let json = ctx.fresh("json");
                let parsed = match &media.schema {
                    Some(schema) => self.transform(ctx, schema, Mode::Parser, &code!("{json}"))?,
                    None => None,
                };
                Ok(match parsed {
                    Some(parsed) => cat!(
                        format!("(({json}: any) => "),
                        parsed.arrow_body(),
                        ")(JSON.parse(",
                        raw,
                        "))"
                    ),
                    None => cat!("JSON.parse(", raw, ")"),
                })
            }
            "text/plain" => Ok(raw.clone()),
            other => Err(unsupported_content(param, other)),
        }
    }

    fn resolved_schema(&self, schema: &SchemaOrRef) -> Result<Schema, CompileError> {
        match self.doc.deref_schema(schema)?.as_ref() {
            SchemaOrRef::Schema(inner) => Ok(inner.as_ref().clone()),
            SchemaOrRef::Bool(true) => Ok(Schema::default()),
            SchemaOrRef::Bool(false) => Err(CompileError::malformed("parameter schema is `false`")),
            SchemaOrRef::Ref { ref_path } => Err(CompileError::malformed(format!("unresolved reference {ref_path}"))),
        }
    }

    fn shape(&self, schema: &SchemaOrRef) -> Result<Shape, CompileError> {
        let resolved = self.resolved_schema(schema)?;
        let is_array = matches!(resolved.schema_type, Some(SchemaType::Array))
            || (resolved.schema_type.is_none() && resolved.items.is_some());
        if is_array {
            let items = match &resolved.items {
                Some(items) => self.resolved_schema(items)?,
                None => Schema::default(),
            };
            return Ok(Shape::Array(items));
        }
        if resolved.is_object_like() {
            return Ok(Shape::Object(resolved));
        }
        Ok(Shape::Scalar(resolved))
    }
}

fn parameter_schema(param: &Parameter) -> Result<&SchemaOrRef, CompileError> {
    param.schema.as_ref().ok_or_else(|| {
        CompileError::malformed(format!(
            "{} parameter '{}' has neither schema nor content",
            param.location, param.name
        ))
    })
}

fn single_content(param: &Parameter) -> Result<(&str, &MediaType), CompileError> {
    if param.content.len() != 1 {
        return Err(CompileError::malformed(format!(
            "{} parameter '{}' must declare exactly one content type",
            param.location, param.name
        )));
    }
    param
        .content
        .first()
        .map(|(content_type, media)| (content_type.as_str(), media))
        .ok_or_else(|| CompileError::malformed(format!("parameter '{}' has no content", param.name)))
}

fn check_flag(param: &Parameter) -> Result<(), CompileError> {
    let valid = param.location == ParameterLocation::Query
        && !param.required
        && param.allow_empty_value
        && param.schema.is_none()
        && param.content.is_empty();
    if valid {
        Ok(())
    } else {
        Err(CompileError::malformed(format!(
            "x-isFlag parameter '{}' must be an optional query parameter with allowEmptyValue and no schema",
            param.name
        )))
    }
}

fn unsupported_style(param: &Parameter, style: ParameterStyle) -> CompileError {
    CompileError::not_implemented(format!("{style:?} style for {} parameter '{}'", param.location, param.name))
}

fn unsupported_content(param: &Parameter, content_type: &str) -> CompileError {
    CompileError::not_implemented(format!(
        "content type '{content_type}' for {} parameter '{}'",
        param.location, param.name
    ))
}

fn numeric_checks(ctx: &mut Context, location: &str, name: &str, schema: &Schema, value: &str) -> Vec<Code> {
    let mut checks = Vec::new();
    let mut check = |ctx: &mut Context, condition: String, message: String| {
        checks.push(Code::text(format!(
            "if ({condition}) {}",
            throw_malformed(ctx, location, name, &quote(&message))
        )));
    };
    if let Some(minimum) = schema.minimum {
        if matches!(schema.exclusive_minimum, Some(ExclusiveBound::Flag(true))) {
            check(ctx, format!("{value} <= {minimum}"), format!("must be > {minimum}"));
        } else {
            check(ctx, format!("{value} < {minimum}"), format!("must be >= {minimum}"));
        }
    }
    if let Some(ExclusiveBound::Value(bound)) = schema.exclusive_minimum {
        check(ctx, format!("{value} <= {bound}"), format!("must be > {bound}"));
    }
    if let Some(maximum) = schema.maximum {
        if matches!(schema.exclusive_maximum, Some(ExclusiveBound::Flag(true))) {
            check(ctx, format!("{value} >= {maximum}"), format!("must be < {maximum}"));
        } else {
            check(ctx, format!("{value} > {maximum}"), format!("must be <= {maximum}"));
        }
    }
    if let Some(ExclusiveBound::Value(bound)) = schema.exclusive_maximum {
        check(ctx, format!("{value} >= {bound}"), format!("must be < {bound}"));
    }
    if let Some(multiple) = schema.multiple_of {
        // Quotient within rounding of an integer; `%` drifts on decimals.
        check(
            ctx,
            format!("Math.abs({value} / {multiple} - Math.round({value} / {multiple})) > 1e-9"),
            format!("must be a multiple of {multiple}"),
        );
    }
    checks
}

fn string_checks(ctx: &mut Context, location: &str, name: &str, schema: &Schema, value: &str) -> Vec<Code> {
    let mut checks = Vec::new();
    let mut check = |ctx: &mut Context, condition: String, message: String| {
        checks.push(Code::text(format!(
            "if ({condition}) {}",
            throw_malformed(ctx, location, name, &quote(&message))
        )));
    };
    if let Some(min) = schema.min_length {
        check(ctx, format!("{value}.length < {min}"), format!("must be at least {min} characters"));
    }
    if let Some(max) = schema.max_length {
        check(ctx, format!("{value}.length > {max}"), format!("must be at most {max} characters"));
    }
    if let Some(pattern) = &schema.pattern {
        check(
            ctx,
            format!("!new RegExp({}).test({value})", quote(pattern)),
            format!("must match {pattern}"),
        );
    }
    checks
}

fn membership_checks(ctx: &mut Context, location: &str, name: &str, schema: &Schema, value: &str) -> Vec<Code> {
    let mut checks = Vec::new();
    if !schema.enum_values.is_empty() {
        let allowed = serde_json::Value::Array(schema.enum_values.clone());
        checks.push(Code::text(format!(
            "if (!({}).includes({value})) {}",
            literal(&allowed),
            throw_malformed(ctx, location, name, &quote(&format!("must be one of {allowed}")))
        )));
    }
    if let Some(constant) = &schema.const_value {
        checks.push(Code::text(format!(
            "if ({value} !== {}) {}",
            literal(constant),
            throw_malformed(ctx, location, name, &quote(&format!("must be {constant}")))
        )));
    }
    checks
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
                    "Limit": { "type": "integer", "minimum": 1, "maximum": 100 }
                }
            }
        }))
        .unwrap()
    }

    fn param(value: serde_json::Value) -> Parameter {
        serde_json::from_value(value).unwrap()
    }

    fn pack(p: serde_json::Value) -> Result<Packed, CompileError> {
        let doc = document();
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        compiler.pack_parameter_expression(&mut Context::new(), &param(p), &code!("value"))
    }

    fn unpack(p: serde_json::Value) -> Result<String, CompileError> {
        let doc = document();
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        compiler
            .unpack_parameter_expression(&mut Context::new(), &param(p), &code!("raw"))
            .map(|code| code.render())
    }

    fn pairs(packed: Packed) -> String {
        match packed {
            Packed::Pairs(code) => code.render(),
            Packed::Text(code) => panic!("expected pairs, got text {code}"),
        }
    }

    fn text(packed: Packed) -> String {
        match packed {
            Packed::Text(code) => code.render(),
            Packed::Pairs(code) => panic!("expected text, got pairs {code}"),
        }
    }

    #[test]
    fn test_page_scenario() {
        let page = json!({ "name": "page", "in": "query", "required": false, "schema": { "type": "number" } });
        assert_eq!(pairs(pack(page.clone()).unwrap()), r#"[["page", String(value)]]"#);
        let unpacked = unpack(page).unwrap();
        assert!(unpacked.contains("Number(raw_0)"));
        assert!(!unpacked.contains(" < "));
        assert!(!unpacked.contains(" > "));
        assert!(unpacked.ends_with("return value_1; })(raw)"));
    }

    #[test]
    fn test_simple_scalars() {
        assert_eq!(
            text(pack(json!({ "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } })).unwrap()),
            "String(value)"
        );
        assert_eq!(
            text(pack(json!({ "name": "on", "in": "header", "schema": { "type": "boolean" } })).unwrap()),
            r#"(value ? "true" : "")"#
        );
        assert_eq!(
            text(pack(json!({ "name": "at", "in": "header", "schema": { "type": "string", "format": "date-time" } })).unwrap()),
            "value.toISOString()"
        );
        assert_eq!(
            text(pack(json!({ "name": "s", "in": "path", "required": true, "schema": { "type": "string" } })).unwrap()),
            "value"
        );
    }

    #[test]
    fn test_simple_arrays_and_objects() {
        assert_eq!(
            text(pack(json!({ "name": "ids", "in": "path", "required": true, "schema": { "type": "array", "items": { "type": "string" } } })).unwrap()),
            r#"value.join(",")"#
        );
        assert_eq!(
            text(pack(json!({ "name": "ids", "in": "path", "required": true, "schema": { "type": "array", "items": { "type": "integer" } } })).unwrap()),
            r#"value.map((item_0: any) => String(item_0)).join(",")"#
        );
        let object = json!({
            "type": "object",
            "required": ["a"],
            "properties": { "a": { "type": "integer" }, "b": { "type": "string" } }
        });
        assert_eq!(
            text(pack(json!({ "name": "o", "in": "path", "required": true, "explode": true, "schema": object.clone() })).unwrap()),
            r#"([["a", String(value["a"])], ...(value["b"] !== undefined ? [["b", value["b"]]] : [])] as Array<[string, string]>).map(([key, item]) => key + "=" + item).join(",")"#
        );
        assert_eq!(
            text(pack(json!({ "name": "o", "in": "path", "required": true, "schema": object })).unwrap()),
            r#"([["a", String(value["a"])], ...(value["b"] !== undefined ? [["b", value["b"]]] : [])] as Array<[string, string]>).flat().join(",")"#
        );
    }

    #[test]
    fn test_form_arrays() {
        assert_eq!(
            pairs(pack(json!({ "name": "tag", "in": "query", "schema": { "type": "array", "items": { "type": "string" } } })).unwrap()),
            r#"value.map((item_0: any): [string, string] => ["tag", item_0])"#
        );
        assert_eq!(
            pairs(pack(json!({ "name": "tag", "in": "query", "explode": false, "schema": { "type": "array", "items": { "type": "string" } } })).unwrap()),
            r#"[["tag", value.join(",")]]"#
        );
    }

    #[test]
    fn test_unsupported_styles_fail() {
        for style in ["matrix", "label", "deepObject", "spaceDelimited", "pipeDelimited"] {
            let err = pack(json!({ "name": "x", "in": "query", "style": style, "schema": { "type": "string" } })).unwrap_err();
            assert!(matches!(err, CompileError::NotImplemented(_)), "{style}");
        }
    }

    #[test]
    fn test_flag() {
        let flag = json!({ "name": "verbose", "in": "query", "allowEmptyValue": true, "x-isFlag": true });
        assert_eq!(pairs(pack(flag.clone()).unwrap()), r#"value ? [["verbose", null]] : []"#);
        assert_eq!(unpack(flag).unwrap(), "(raw !== undefined)");
    }

    #[test]
    fn test_flag_preconditions() {
        for bad in [
            json!({ "name": "v", "in": "query", "required": true, "allowEmptyValue": true, "x-isFlag": true }),
            json!({ "name": "v", "in": "query", "x-isFlag": true }),
            json!({ "name": "v", "in": "header", "allowEmptyValue": true, "x-isFlag": true }),
            json!({ "name": "v", "in": "query", "allowEmptyValue": true, "x-isFlag": true, "schema": { "type": "boolean" } }),
        ] {
            assert!(matches!(pack(bad), Err(CompileError::MalformedInput(_))));
        }
    }

    #[test]
    fn test_unpack_validation() {
        let out = unpack(json!({
            "name": "limit", "in": "query",
            "schema": { "type": "integer", "minimum": 1, "maximum": 100, "exclusiveMaximum": true, "multipleOf": 5 }
        }))
        .unwrap();
        assert!(out.contains("if (!Number.isInteger(value_1))"));
        assert!(out.contains(r#"if (value_1 < 1) throw new Runtime.MalformedError("query", "limit", "must be >= 1");"#));
        assert!(out.contains("if (value_1 >= 100)"));
        assert!(out.contains("if (Math.abs(value_1 / 5 - Math.round(value_1 / 5)) > 1e-9)"));
    }

    #[test]
    fn test_unpack_decimal_multiple() {
        let out = unpack(json!({
            "name": "step", "in": "query",
            "schema": { "type": "number", "multipleOf": 0.1 }
        }))
        .unwrap();
        assert!(out.contains(
            r#"if (Math.abs(value_1 / 0.1 - Math.round(value_1 / 0.1)) > 1e-9) throw new Runtime.MalformedError("query", "step", "must be a multiple of 0.1");"#
        ));
        assert!(!out.contains(" % "));
    }

    #[test]
    fn test_unpack_numeric_exclusive_bounds() {
        let out = unpack(json!({
            "name": "x", "in": "header",
            "schema": { "type": "number", "exclusiveMinimum": 0 }
        }))
        .unwrap();
        assert!(out.contains("if (value_1 <= 0)"));
    }

    #[test]
    fn test_unpack_string_checks() {
        let out = unpack(json!({
            "name": "code", "in": "path", "required": true,
            "schema": { "type": "string", "minLength": 2, "maxLength": 4, "pattern": "^[A-Z]+$", "enum": ["AB", "CDE"] }
        }))
        .unwrap();
        assert!(out.contains("if (raw_0.length < 2)"));
        assert!(out.contains("if (raw_0.length > 4)"));
        assert!(out.contains(r#"!new RegExp("^[A-Z]+$").test(raw_0)"#));
        assert!(out.contains(r#"if (!(["AB","CDE"]).includes(raw_0))"#));
        assert!(out.contains(r#"throw new Runtime.MalformedError("path", "code""#));
    }

    #[test]
    fn test_unpack_plain_string_and_format() {
        assert_eq!(
            unpack(json!({ "name": "q", "in": "query", "schema": { "type": "string" } })).unwrap(),
            "raw"
        );
        assert_eq!(
            unpack(json!({ "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } })).unwrap(),
            "parseUuid(raw)"
        );
    }

    #[test]
    fn test_unpack_reference_and_unsupported() {
        let out = unpack(json!({ "name": "limit", "in": "query", "schema": { "$ref": "#/components/schemas/Limit" } })).unwrap();
        assert!(out.contains("if (value_1 > 100)"));
        for schema in [json!({ "type": "boolean" }), json!({ "type": "array", "items": { "type": "string" } })] {
            let err = unpack(json!({ "name": "x", "in": "header", "schema": schema })).unwrap_err();
            assert!(matches!(err, CompileError::NotImplemented(_)));
        }
    }

    #[test]
    fn test_content_parameters() {
        let json_param = json!({
            "name": "filter", "in": "query",
            "content": { "application/json": { "schema": { "type": "object", "properties": { "since": { "type": "string", "format": "date-time" } } } } }
        });
        assert_eq!(
            pairs(pack(json_param.clone()).unwrap()),
            r#"[["filter", JSON.stringify({ ...value, ...(value["since"] !== undefined ? { "since": value["since"].toISOString() } : {}) })]]"#
        );
        assert_eq!(
            unpack(json_param).unwrap(),
            r#"((json_0: any) => ({ ...json_0, ...(json_0["since"] !== undefined ? { "since": new Date(json_0["since"]) } : {}) }))(JSON.parse(raw))"#
        );
        let text_param = json!({ "name": "note", "in": "header", "content": { "text/plain": {} } });
        assert_eq!(text(pack(text_param.clone()).unwrap()), "value");
        assert_eq!(unpack(text_param).unwrap(), "raw");
        let xml = json!({ "name": "x", "in": "header", "content": { "application/xml": {} } });
        assert!(matches!(pack(xml), Err(CompileError::NotImplemented(_))));
    }
}
