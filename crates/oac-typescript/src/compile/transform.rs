//! Parser and serializer compiler.
//!
//! Both directions share one recursive walk. Internally every step returns
//! `None` when the value needs no transformation, so callers can leave the
//! input expression untouched instead of wrapping it.

use std::borrow::Cow;

use oac_core::error::CompileError;
use oac_core::parse::pointer;
use oac_core::parse::schema::{AdditionalProperties, Discriminator, Schema, SchemaOrRef, SchemaType};

use super::{Compiler, throw_malformed};
use crate::context::Context;
use crate::formats::FormatSpec;
use crate::fragment::{Code, quote};
use crate::{cat, code};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Wire value to typed value.
    Parser,
    /// Typed value to wire value.
    Serializer,
}

impl Mode {
    pub fn prefix(self) -> &'static str {
        match self {
            Mode::Parser => "parse",
            Mode::Serializer => "serialize",
        }
    }
}

impl Compiler<'_> {
    pub fn schema_to_parser(
        &self,
        ctx: &mut Context,
        schema: &SchemaOrRef,
        value: &Code,
    ) -> Result<Code, CompileError> {
        self.schema_to_transform(ctx, schema, Mode::Parser, value)
    }

    pub fn schema_to_serializer(
        &self,
        ctx: &mut Context,
        schema: &SchemaOrRef,
        value: &Code,
    ) -> Result<Code, CompileError> {
        self.schema_to_transform(ctx, schema, Mode::Serializer, value)
    }

    /// The transformed expression, or `value` itself when nothing changes.
    pub fn schema_to_transform(
        &self,
        ctx: &mut Context,
        schema: &SchemaOrRef,
        mode: Mode,
        value: &Code,
    ) -> Result<Code, CompileError> {
        Ok(self
            .transform(ctx, schema, mode, value)?
            .unwrap_or_else(|| value.clone()))
    }

    /// `value` must be free of side effects; it may be repeated in the output.
    pub fn transform(
        &self,
        ctx: &mut Context,
        schema: &SchemaOrRef,
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        match schema {
            SchemaOrRef::Bool(_) => Ok(None),
            SchemaOrRef::Ref { ref_path } => {
                if !self.needs_transform(ctx, ref_path, mode)? {
                    return Ok(None);
                }
                let function = self.transform_function(ctx, ref_path, mode)?;
                Ok(Some(cat!(function, "(", value, ")")))
            }
            SchemaOrRef::Schema(inner) => {
                let Some(transformed) = self.transform_shape(ctx, inner, mode, value)? else {
                    return Ok(None);
                };
                if inner.is_nullable() {
                    Ok(Some(cat!("(", value, " === null ? null : ", transformed, ")")))
                } else {
                    Ok(Some(transformed))
                }
            }
        }
    }

    /// Name of the `parse<Name>`/`serialize<Name>` function for a schema.
    pub fn transform_function(
        &self,
        ctx: &mut Context,
        ref_path: &str,
        mode: Mode,
    ) -> Result<String, CompileError> {
        let name = self.doc.ref_name(ref_path)?;
        Ok(self.qualify(ctx, &format!("{}{}", mode.prefix(), upper_first(&name))))
    }

    /// Whether the named schema has any transformable leaf in `mode`.
    ///
    /// Probes the target with a scratch context. A pointer already under
    /// evaluation counts as "no transform", so recursive schemas terminate
    /// and the answer is decided by their non-recursive parts. Answers that
    /// did not lean on an enclosing probe are memoized, which keeps shared
    /// subgraphs linear.
    pub fn needs_transform(&self, ctx: &Context, ref_path: &str, mode: Mode) -> Result<bool, CompileError> {
        let key = (ref_path.to_string(), mode);
        if let Some(&known) = self.needs.borrow().get(&key) {
            return Ok(known);
        }
        let depth = {
            let probing = self.probing.borrow();
            if let Some(open) = probing.iter().position(|p| p == ref_path) {
                self.cycle_floor.set(self.cycle_floor.get().min(open));
                return Ok(false);
            }
            probing.len()
        };

        let outer_floor = self.cycle_floor.replace(usize::MAX);
        self.probing.borrow_mut().push(key.0.clone());
        let result = (|| -> Result<bool, CompileError> {
            let target: SchemaOrRef = self.doc.resolve_as(ref_path, "schema")?;
            let mut scratch = ctx.scratch();
            Ok(self.transform(&mut scratch, &target, mode, &code!("value"))?.is_some())
        })();
        self.probing.borrow_mut().pop();
        let floor = self.cycle_floor.get();
        self.cycle_floor.set(outer_floor.min(floor));

        let needed = result?;
        if needed || floor >= depth {
            self.needs.borrow_mut().insert(key, needed);
        }
        Ok(needed)
    }

    fn transform_shape(
        &self,
        ctx: &mut Context,
        schema: &Schema,
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        if !schema.all_of.is_empty() {
            let merged = self.merge_all_of(schema)?;
            return self.transform_object(ctx, &merged, mode, value);
        }
        let branches = schema.union_branches();
        if !branches.is_empty() {
            return match &schema.discriminator {
                Some(discriminator) => self.transform_discriminated(ctx, branches, discriminator, mode, value),
                None => self.transform_union(ctx, branches, mode, value),
            };
        }
        match &schema.schema_type {
            Some(SchemaType::String) => self.transform_string(ctx, schema, mode, value),
            Some(SchemaType::Array) => self.transform_array(ctx, schema.items.as_deref(), mode, value),
            Some(SchemaType::Object) => self.transform_object(ctx, schema, mode, value),
            Some(SchemaType::Unknown(other)) => Err(CompileError::UnhandledSchema(format!(
                "unknown type '{other}'"
            ))),
            None if schema.is_object_like() => self.transform_object(ctx, schema, mode, value),
            None if schema.items.is_some() => self.transform_array(ctx, schema.items.as_deref(), mode, value),
            None if schema.format.is_some() => self.transform_string(ctx, schema, mode, value),
            _ => Ok(None),
        }
    }

    fn transform_string(
        &self,
        ctx: &mut Context,
        schema: &Schema,
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        let Some(format) = &schema.format else {
            return Ok(None);
        };
        // Enum and const values are declared as string literals.
        if is_literal_valued(schema) {
            return Ok(None);
        }
        let spec = self.formats.require(format, schema)?;
        Ok(format_transform(ctx, spec, mode, value))
    }

    fn transform_array(
        &self,
        ctx: &mut Context,
        items: Option<&SchemaOrRef>,
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        let Some(items) = items else {
            return Ok(None);
        };
        let item = ctx.fresh("item");
        let Some(element) = self.transform(ctx, items, mode, &code!("{item}"))? else {
            return Ok(None);
        };
        Ok(Some(cat!(
            value.parenthesized(),
            format!(".map(({item}: any) => "),
            element.arrow_body(),
            ")"
        )))
    }

    fn transform_object(
        &self,
        ctx: &mut Context,
        schema: &Schema,
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        let base = value.parenthesized();
        let mut overrides = Vec::new();
        for (name, property) in &schema.properties {
            let key = quote(name);
            let access = cat!(&base, "[", &key, "]");
            let Some(field) = self.transform(ctx, property, mode, &access)? else {
                continue;
            };
            if schema.required.contains(name) {
                overrides.push(cat!(&key, ": ", field));
            } else {
                overrides.push(cat!(
                    "...(",
                    access,
                    " !== undefined ? { ",
                    &key,
                    ": ",
                    field,
                    " } : {})"
                ));
            }
        }

        let extra = match &schema.additional_properties {
            Some(AdditionalProperties::Schema(extra)) => {
                let key = ctx.fresh("key");
                let entry = ctx.fresh("entry");
                self.transform(ctx, extra, mode, &code!("{entry}"))?
                    .map(|transformed| (key, entry, transformed))
            }
            _ => None,
        };

        if overrides.is_empty() && extra.is_none() {
            return Ok(None);
        }

        let spread = match extra {
            None => cat!("...", &base),
            Some((key, entry, transformed)) => {
                let mapped = if schema.properties.is_empty() {
                    transformed
                } else {
                    let known: Vec<String> = schema.properties.keys().map(|k| quote(k)).collect();
                    cat!(
                        format!("[{}].includes({key}) ? {entry} : ", known.join(", ")),
                        transformed
                    )
                };
                cat!(
                    "...Object.fromEntries(Object.entries(",
                    &base,
                    format!(").map(([{key}, {entry}]: [string, any]) => [{key}, "),
                    mapped,
                    "]))"
                )
            }
        };

        let mut members = vec![spread];
        members.extend(overrides);
        Ok(Some(cat!("{ ", Code::join(members, ", "), " }")))
    }

    /// Merge the object parts of an `allOf` into one object schema. Later
    /// properties override earlier ones; `required` sets are united.
    pub fn merge_all_of(&self, schema: &Schema) -> Result<Schema, CompileError> {
        let mut merged = Schema {
            schema_type: Some(SchemaType::Object),
            ..Schema::default()
        };
        self.merge_into(&mut merged, schema, &mut Vec::new())?;
        Ok(merged)
    }

    fn merge_into(&self, merged: &mut Schema, schema: &Schema, seen: &mut Vec<String>) -> Result<(), CompileError> {
        for part in &schema.all_of {
            if let SchemaOrRef::Ref { ref_path } = part {
                if seen.contains(ref_path) {
                    return Err(CompileError::malformed(format!("allOf cycle through {ref_path}")));
                }
                seen.push(ref_path.clone());
            }
            let resolved = self.doc.deref_schema(part)?;
            let part_schema: Cow<'_, Schema> = match resolved {
                Cow::Borrowed(SchemaOrRef::Schema(inner)) => Cow::Borrowed(inner.as_ref()),
                Cow::Owned(SchemaOrRef::Schema(inner)) => Cow::Owned(*inner),
                Cow::Borrowed(SchemaOrRef::Bool(true)) | Cow::Owned(SchemaOrRef::Bool(true)) => continue,
                _ => {
                    return Err(CompileError::not_implemented(
                        "allOf part that is not an object schema",
                    ));
                }
            };
            let is_object = part_schema.is_object_like()
                || !part_schema.all_of.is_empty()
                || part_schema.is_unconstrained();
            if !is_object || !part_schema.union_branches().is_empty() {
                return Err(CompileError::not_implemented(
                    "allOf part that is not an object schema",
                ));
            }
            self.merge_into(merged, &part_schema, seen)?;
        }

        for (name, property) in &schema.properties {
            merged.properties.insert(name.clone(), property.clone());
        }
        for name in &schema.required {
            if !merged.required.contains(name) {
                merged.required.push(name.clone());
            }
        }
        if schema.additional_properties.is_some() {
            merged.additional_properties = schema.additional_properties.clone();
        }
        Ok(())
    }

    fn transform_discriminated(
        &self,
        ctx: &mut Context,
        branches: &[SchemaOrRef],
        discriminator: &Discriminator,
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        let mut cases: Vec<(String, SchemaOrRef)> = Vec::new();
        for (tag, target) in &discriminator.mapping {
            cases.push((tag.clone(), SchemaOrRef::reference(mapping_target(target))));
        }
        for branch in branches {
            match branch {
                SchemaOrRef::Ref { ref_path } => {
                    if cases.iter().any(|(_, target)| target == branch) {
                        continue;
                    }
                    let tag = pointer::last_segment(ref_path)?.unwrap_or_default();
                    cases.push((tag, branch.clone()));
                }
                _ => {
                    return Err(CompileError::not_implemented(
                        "inline branch in a discriminated union",
                    ));
                }
            }
        }

        let mut compiled = Vec::with_capacity(cases.len());
        let mut any = false;
        for (tag, target) in &cases {
            let transformed = self.transform(ctx, target, mode, value)?;
            any |= transformed.is_some();
            compiled.push((tag, transformed.unwrap_or_else(|| value.clone())));
        }
        if !any {
            return Ok(None);
        }

        let property = quote(&discriminator.property_name);
        let selector = cat!(value.parenthesized(), "[", &property, "]");
        let mut out = cat!("(() => { switch (", &selector, ") { ");
        for (tag, body) in compiled {
            out.append(cat!(format!("case {}: return ", quote(tag)), body, "; "));
        }
        let message = cat!("\"unknown discriminator value \" + String(", &selector, ")").render();
        out.append(Code::text(format!(
            "default: {} }} }})()",
            throw_malformed(ctx, "data", &discriminator.property_name, &message)
        )));
        Ok(Some(out))
    }

    fn transform_union(
        &self,
        ctx: &mut Context,
        branches: &[SchemaOrRef],
        mode: Mode,
        value: &Code,
    ) -> Result<Option<Code>, CompileError> {
        let shapes = self.classify_branches(branches)?;
        if shapes.objects.len() > 1 {
            return Err(CompileError::not_implemented(
                "several object branches in a union without discriminator",
            ));
        }

        let object = match shapes.objects.first() {
            Some(branch) => Some(self.transform(ctx, branch, mode, value)?),
            None => None,
        };
        let array = match shapes.arrays.len() {
            0 => None,
            1 => Some(self.transform_array(ctx, Some(&shapes.arrays[0]), mode, value)?),
            _ => {
                let items = SchemaOrRef::inline(Schema {
                    one_of: shapes.arrays.clone(),
                    ..Schema::default()
                });
                Some(self.transform_array(ctx, Some(&items), mode, value)?)
            }
        };

        let formats: Vec<&FormatSpec> = shapes
            .formats
            .iter()
            .copied()
            .filter(|spec| match mode {
                Mode::Parser => !spec.parse.is_identity(),
                Mode::Serializer => !spec.serialize.is_identity(),
            })
            .collect();
        let plain_string = shapes.plain_string || formats.len() < shapes.formats.len();

        let needs_object = matches!(object, Some(Some(_)));
        let needs_array = matches!(array, Some(Some(_)));
        if !needs_object && !needs_array && formats.is_empty() {
            return Ok(None);
        }

        let mut tests: Vec<Code> = Vec::new();
        if mode == Mode::Serializer {
            for spec in &formats {
                let Some(test) = spec.instance_test(value) else {
                    return Err(CompileError::not_implemented(format!(
                        "serializing format '{}' inside a union without an instanceof test",
                        spec.name
                    )));
                };
                let serialized = format_transform(ctx, spec, mode, value).unwrap_or_else(|| value.clone());
                tests.push(cat!("if (", test, ") return ", serialized, "; "));
            }
        }
        if let Some(object) = object {
            tests.push(cat!(
                "if (typeof ",
                value,
                " === \"object\" && ",
                value,
                " !== null && !Array.isArray(",
                value,
                ")) return ",
                object.unwrap_or_else(|| value.clone()),
                "; "
            ));
        }
        if let Some(array) = array {
            tests.push(cat!(
                "if (Array.isArray(",
                value,
                ")) return ",
                array.unwrap_or_else(|| value.clone()),
                "; "
            ));
        }
        if shapes.null {
            tests.push(cat!("if (", value, " === null) return null; "));
        }
        if shapes.number {
            tests.push(cat!("if (typeof ", value, " === \"number\") return ", value, "; "));
        }
        if shapes.boolean {
            tests.push(cat!("if (typeof ", value, " === \"boolean\") return ", value, "; "));
        }
        match mode {
            Mode::Parser if !formats.is_empty() || plain_string => {
                let mut body = Code::new();
                for spec in &formats {
                    let parsed = format_transform(ctx, spec, mode, value).unwrap_or_else(|| value.clone());
                    body.append(cat!("try { return ", parsed, "; } catch {} "));
                }
                if plain_string {
                    body.append(cat!("return ", value, "; "));
                }
                tests.push(cat!("if (typeof ", value, " === \"string\") { ", body, "} "));
            }
            Mode::Serializer if plain_string => {
                tests.push(cat!("if (typeof ", value, " === \"string\") return ", value, "; "));
            }
            _ => {}
        }
        if shapes.any {
            tests.push(cat!("return ", value, "; "));
        } else {
            let message = quote("value matches no union branch");
            tests.push(Code::text(format!("{} ", throw_malformed(ctx, "data", "", &message))));
        }

        Ok(Some(cat!("(() => { ", Code::join(tests, ""), "})()")))
    }

    fn classify_branches(&self, branches: &[SchemaOrRef]) -> Result<UnionShapes<'_>, CompileError> {
        let mut shapes = UnionShapes::default();
        for branch in branches {
            let resolved = self.doc.deref_schema(branch)?;
            let schema = match resolved.as_ref() {
                SchemaOrRef::Bool(true) => {
                    shapes.any = true;
                    continue;
                }
                SchemaOrRef::Bool(false) => continue,
                SchemaOrRef::Schema(schema) => schema.as_ref(),
                SchemaOrRef::Ref { ref_path } => {
                    return Err(CompileError::malformed(format!("unresolved reference {ref_path}")));
                }
            };
            if schema.is_composite() {
                return Err(CompileError::not_implemented(
                    "composition nested in a union without discriminator",
                ));
            }
            if schema.is_nullable() {
                shapes.null = true;
            }
            match &schema.schema_type {
                Some(SchemaType::Object) => shapes.objects.push(branch.clone()),
                Some(SchemaType::Array) => shapes
                    .arrays
                    .push(schema.items.as_deref().cloned().unwrap_or(SchemaOrRef::Bool(true))),
                Some(SchemaType::Null) => shapes.null = true,
                Some(SchemaType::Integer) | Some(SchemaType::Number) => shapes.number = true,
                Some(SchemaType::Boolean) => shapes.boolean = true,
                Some(SchemaType::String) => match &schema.format {
                    Some(format) if !is_literal_valued(schema) => {
                        shapes.formats.push(self.formats.require(format, schema)?)
                    }
                    _ => shapes.plain_string = true,
                },
                Some(SchemaType::Unknown(other)) => {
                    return Err(CompileError::UnhandledSchema(format!("unknown type '{other}'")));
                }
                None if schema.is_object_like() => shapes.objects.push(branch.clone()),
                None if schema.items.is_some() => shapes
                    .arrays
                    .push(schema.items.as_deref().cloned().unwrap_or(SchemaOrRef::Bool(true))),
                None => match &schema.format {
                    Some(format) if !is_literal_valued(schema) => {
                        shapes.formats.push(self.formats.require(format, schema)?)
                    }
                    Some(_) => shapes.plain_string = true,
                    None => shapes.any = true,
                },
            }
        }
        Ok(shapes)
    }
}

#[derive(Default)]
struct UnionShapes<'a> {
    objects: Vec<SchemaOrRef>,
    /// Item schemas of every array branch.
    arrays: Vec<SchemaOrRef>,
    null: bool,
    number: bool,
    boolean: bool,
    plain_string: bool,
    formats: Vec<&'a FormatSpec>,
    any: bool,
}

fn is_literal_valued(schema: &Schema) -> bool {
    !schema.enum_values.is_empty() || schema.const_value.is_some()
}

/// The format's expression for `mode`, or `None` for an identity template.
fn format_transform(ctx: &mut Context, spec: &FormatSpec, mode: Mode, value: &Code) -> Option<Code> {
    let template = match mode {
        Mode::Parser => &spec.parse,
        Mode::Serializer => &spec.serialize,
    };
    if template.is_identity() {
        return None;
    }
    ctx.use_imports(&spec.imports);
    Some(match mode {
        Mode::Parser => spec.parse_expr(value),
        Mode::Serializer => spec.serialize_expr(value),
    })
}

/// Mapping values are either pointers or bare component names.
fn mapping_target(target: &str) -> String {
    if target.starts_with('#') {
        target.to_string()
    } else {
        format!("#/components/schemas/{target}")
    }
}

pub(crate) fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
