//! Operation compiler: client calls, server handler types and endpoints.

use std::collections::HashMap;

use indexmap::IndexSet;
use oac_core::Document;
use oac_core::error::CompileError;
use oac_core::naming::{NormalizedName, normalize_name};
use oac_core::parse::content::{Content, Response};
use oac_core::parse::operation::{HttpMethod, Operation, PathItem};
use oac_core::parse::parameter::{Header, Parameter, ParameterLocation};
use oac_core::parse::security::requires_authentication;

use super::content_type::BodyCodec;
use super::params::Packed;
use super::path_template::PathTemplate;
use super::{Compiler, runtime, throw_malformed};
use crate::context::Context;
use crate::fragment::{Code, ObjectField, argument_list, object_type, quote};
use crate::{cat, code};

/// One operation with its inputs resolved.
#[derive(Debug, Clone)]
pub struct OperationSite<'a> {
    pub path: &'a str,
    pub method: HttpMethod,
    pub operation: &'a Operation,
    pub name: NormalizedName,
    /// Path-level parameters first, then the operation's own.
    pub parameters: Vec<Parameter>,
    pub authenticated: bool,
}

impl<'a> OperationSite<'a> {
    pub fn new(
        doc: &Document,
        path: &'a str,
        item: &'a PathItem,
        method: HttpMethod,
        operation: &'a Operation,
    ) -> Result<Self, CompileError> {
        let id = operation.operation_id.as_deref().ok_or_else(|| {
            CompileError::malformed(format!("{method} {path} has no operationId"))
        })?;
        let parameters = item
            .parameters
            .iter()
            .chain(&operation.parameters)
            .map(|p| doc.parameter(p).map(|p| p.into_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        let security = operation
            .security
            .as_deref()
            .or(doc.spec().default_security())
            .unwrap_or(&[]);
        Ok(Self {
            path,
            method,
            operation,
            name: normalize_name(id),
            parameters,
            authenticated: requires_authentication(security),
        })
    }

    pub fn handler_type_name(&self) -> String {
        format!("{}Handler", self.name.pascal_case)
    }

    pub fn endpoint_name(&self) -> String {
        format!("handle{}", self.name.pascal_case)
    }

    fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Request and response content types without a dedicated codec, once each.
    pub fn raw_content_types(&self, doc: &Document) -> Result<IndexSet<String>, CompileError> {
        let mut declared = Vec::new();
        if let Some(body) = &self.operation.request_body {
            declared.extend(doc.request_body(body)?.content.keys().cloned());
        }
        for response in self.operation.responses.values() {
            declared.extend(doc.response(response)?.content.keys().cloned());
        }
        Ok(declared
            .into_iter()
            .filter(|content_type| BodyCodec::for_content_type(content_type) == BodyCodec::Raw)
            .collect())
    }
}

/// Warn about bodies that every emitter will pass through as raw bytes.
pub fn warn_raw_bodies(doc: &Document) -> Result<(), CompileError> {
    for site in operation_sites(doc)? {
        for content_type in site.raw_content_types(doc)? {
            log::warn!(
                "{}: unknown content type '{content_type}', body is passed through as raw bytes",
                site.name
            );
        }
    }
    Ok(())
}

/// Every operation of the document, in path and method order.
pub fn operation_sites(doc: &Document) -> Result<Vec<OperationSite<'_>>, CompileError> {
    let mut sites = Vec::new();
    for (path, item) in &doc.spec().paths {
        for (method, operation) in item.operations() {
            sites.push(OperationSite::new(doc, path, item, method, operation)?);
        }
    }
    Ok(sites)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Client,
    Server,
}

/// A declared response with its headers resolved.
struct ResponseCase {
    status: u16,
    content: Content,
    headers: Vec<(String, Header)>,
}

/// Indented statement builder.
struct Lines {
    out: Code,
    depth: usize,
}

impl Lines {
    fn new(depth: usize) -> Self {
        Self {
            out: Code::new(),
            depth,
        }
    }

    #[track_caller]
    fn line(&mut self, code: Code) {
        self.out.push("  ".repeat(self.depth));
        self.out.append(code);
        self.out.push("\n");
    }

    #[track_caller]
    fn open(&mut self, code: Code) {
        self.line(cat!(code, " {"));
        self.depth += 1;
    }

    /// `} <code> {` at the enclosing depth, as in `} else {`.
    #[track_caller]
    fn reopen(&mut self, code: Code) {
        self.depth = self.depth.saturating_sub(1);
        self.line(cat!("} ", code, " {"));
        self.depth += 1;
    }

    #[track_caller]
    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line(code!("}}"));
    }

    fn finish(self) -> Code {
        self.out
    }
}

impl Compiler<'_> {
    /// `export async function <name>(transport, ...)` for a client.
    pub fn compile_client_call(&self, ctx: &mut Context, site: &OperationSite<'_>) -> Result<Code, CompileError> {
        log::debug!("compiling client call {} {} {}", site.name, site.method, site.path);
        let mut args = vec![ObjectField::required("transport", code!("{}", runtime(ctx, "Transport"))).raw()];
        if site.authenticated {
            args.push(ObjectField::required("account", code!("{}", runtime(ctx, "Account"))).raw());
            args.push(ObjectField::required("authenticator", code!("{}", runtime(ctx, "Authenticator"))).raw());
            args.push(ObjectField::required("refresh", code!("{}", runtime(ctx, "RefreshCallback"))).raw());
        }
        if let Some(params) = self.params_type(ctx, site, Side::Client)? {
            args.push(ObjectField::required("params", params).raw());
        }
        let request_body = self.request_body(site)?;
        if let Some((content, required)) = &request_body {
            let ty = self.body_union_type(ctx, content)?;
            let field = if *required {
                ObjectField::required("body", ty)
            } else {
                ObjectField::optional("body", ty)
            };
            args.push(field.raw());
        }

        let cases = self.response_cases(site, Side::Client)?;
        let mut variants = cases
            .iter()
            .map(|case| self.response_variant_type(ctx, case))
            .collect::<Result<Vec<_>, _>>()?;
        variants.push(code!("{{ status: \"network\"; error: unknown }}"));
        if site.authenticated {
            variants.push(code!("{{ status: \"user-cancel\" }}"));
            variants.push(code!("{{ status: \"unauthenticated\" }}"));
        }

        let mut body = Lines::new(1);
        self.client_request(ctx, site, request_body.as_ref(), &mut body)?;
        self.client_responses(ctx, &cases, &mut body)?;

        Ok(cat!(
            doc_comment(site.operation),
            format!("export async function {}(", site.name.camel_case),
            argument_list(&args),
            "): Promise<",
            Code::join(variants, " | "),
            "> {\n",
            body.finish(),
            "}\n"
        ))
    }

    fn client_request(
        &self,
        ctx: &mut Context,
        site: &OperationSite<'_>,
        request_body: Option<&(Content, bool)>,
        lines: &mut Lines,
    ) -> Result<(), CompileError> {
        let template = PathTemplate::parse(site.path);
        let mut segments: HashMap<String, Code> = HashMap::new();
        for name in template.placeholders() {
            let value = code!("params[{}]", quote(name));
            let segment = match site.parameters_in(ParameterLocation::Path).find(|p| p.name == name) {
                Some(param) => match self.pack_parameter_expression(ctx, param, &value)? {
                    Packed::Text(text) => text,
                    Packed::Pairs(_) => {
                        return Err(CompileError::not_implemented(format!(
                            "form style for path parameter '{name}'"
                        )));
                    }
                },
                None => cat!("String(", value, ")"),
            };
            segments.insert(name.to_string(), cat!("encodeURIComponent(", segment, ")"));
        }
        let path = template.render(|name| segments.get(name).cloned().unwrap_or_default());
        lines.line(cat!("const path = ", path, ";"));

        let mut query = Vec::new();
        for param in site.parameters_in(ParameterLocation::Query) {
            query.push(self.client_pairs(ctx, param)?);
        }
        lines.line(cat!(
            "const query: Array<[string, string | null]> = [",
            Code::join(query, ", "),
            "];"
        ));

        let mut headers = Vec::new();
        for param in site.parameters_in(ParameterLocation::Header) {
            let value = code!("params[{}]", quote(&param.name));
            let text = match self.pack_parameter_expression(ctx, param, &value)? {
                Packed::Text(text) => text,
                Packed::Pairs(_) => {
                    return Err(CompileError::not_implemented(format!(
                        "form style for header parameter '{}'",
                        param.name
                    )));
                }
            };
            let key = quote(&param.name);
            headers.push(if param.required {
                cat!("[", &key, ", ", text, "]")
            } else {
                cat!("...(", value, " !== undefined ? [[", &key, ", ", text, "]] : [])")
            });
        }
        let mut cookies = Vec::new();
        for param in site.parameters_in(ParameterLocation::Cookie) {
            cookies.push(self.client_pairs(ctx, param)?);
        }
        if !cookies.is_empty() {
            lines.line(cat!(
                "const cookies: Array<[string, string | null]> = [",
                Code::join(cookies, ", "),
                "];"
            ));
            headers.push(code!(
                "...(cookies.length > 0 ? [[\"Cookie\", {}(cookies)]] : [])",
                runtime(ctx, "cookieHeader")
            ));
        }
        lines.line(cat!(
            "const headers: Array<[string, string]> = [",
            Code::join(headers, ", "),
            "];"
        ));

        let payload = match request_body {
            Some((content, required)) => {
                lines.line(code!(
                    "let payload: {{ contentType: string; data: string | Uint8Array }} | undefined = undefined;"
                ));
                if !required {
                    lines.open(code!("if (body !== undefined)"));
                }
                lines.open(code!("switch (body.contentType)"));
                for (content_type, media) in content {
                    let codec = BodyCodec::for_content_type(content_type);
                    let data = self.encode_body(ctx, codec, media, &code!("body.value"))?;
                    let ct = quote(content_type);
                    lines.line(cat!(
                        format!("case {ct}: payload = {{ contentType: {ct}, data: "),
                        data,
                        " }; break;"
                    ));
                }
                lines.close();
                if !required {
                    lines.close();
                }
                "payload"
            }
            None => "undefined",
        };

        let request = format!(
            "{{ method: {}, path, query, headers, body: {payload} }}",
            quote(site.method.as_str())
        );
        if site.authenticated {
            lines.line(code!(
                "const outcome = await {}(transport, {request}, account, authenticator, refresh);",
                runtime(ctx, "sendAuthenticated")
            ));
        } else {
            lines.line(code!(
                "const outcome = await {}(transport, {request});",
                runtime(ctx, "send")
            ));
        }
        lines.line(code!("if (outcome.status !== \"response\") return outcome;"));
        lines.line(code!("const response = outcome.response;"));
        Ok(())
    }

    /// Query or cookie pairs of one parameter, guarded when optional.
    fn client_pairs(&self, ctx: &mut Context, param: &Parameter) -> Result<Code, CompileError> {
        let value = code!("params[{}]", quote(&param.name));
        let pairs = match self.pack_parameter_expression(ctx, param, &value)? {
            Packed::Pairs(pairs) => pairs,
            Packed::Text(text) => cat!(format!("[[{}, ", quote(&param.name)), text, "]]"),
        };
        if param.is_flag || param.required {
            Ok(cat!("...", pairs.parenthesized()))
        } else {
            Ok(cat!("...(", value, " !== undefined ? ", pairs, " : [])"))
        }
    }

    fn client_responses(&self, ctx: &mut Context, cases: &[ResponseCase], lines: &mut Lines) -> Result<(), CompileError> {
        lines.open(code!("switch (response.status)"));
        for case in cases {
            lines.open(code!("case {}:", case.status));
            let mut fields = vec![code!("status: {}", case.status)];
            if !case.headers.is_empty() {
                let mut values = Vec::new();
                for (name, header) in &case.headers {
                    let param = header.to_parameter(name);
                    let raw = ctx.fresh("header");
                    lines.line(code!("const {raw} = response.header({});", quote(name)));
                    let unpacked = self.unpack_parameter_expression(ctx, &param, &code!("{raw}"))?;
                    let value = if header.required {
                        lines.line(code!(
                            "if ({raw} === undefined) {}",
                            throw_malformed(ctx, "header", name, &quote("missing required header"))
                        ));
                        unpacked
                    } else {
                        cat!(format!("{raw} === undefined ? undefined : "), unpacked)
                    };
                    values.push(cat!(quote(name), ": ", value));
                }
                let headers = ctx.fresh("headers");
                lines.line(cat!(format!("const {headers} = {{ "), Code::join(values, ", "), " };"));
                fields.push(code!("headers: {headers}"));
            }

            if case.content.is_empty() {
                lines.line(cat!("return { ", Code::join(fields, ", "), " };"));
            } else {
                let matches = runtime(ctx, "matches");
                for (content_type, media) in &case.content {
                    let codec = BodyCodec::for_content_type(content_type);
                    let ct = quote(content_type);
                    lines.open(code!("if ({matches}({ct}, response.contentType))"));
                    let (read, value) = self.decode_body(ctx, codec, media, "response")?;
                    lines.line(read);
                    let mut returned = fields.clone();
                    returned.push(cat!(format!("body: {{ contentType: {ct}, value: "), value, " }"));
                    lines.line(cat!("return { ", Code::join(returned, ", "), " };"));
                    lines.close();
                }
                lines.line(code!(
                    "{}",
                    throw_malformed(
                        ctx,
                        "response",
                        "content-type",
                        "\"unexpected content type \" + response.contentType"
                    )
                ));
            }
            lines.close();
        }
        lines.line(code!(
            "default: {}",
            throw_malformed(
                ctx,
                "response",
                "status",
                "\"unexpected status \" + String(response.status)"
            )
        ));
        lines.close();
        Ok(())
    }

    /// `export type <Name>Handler = (params, body) => Promise<...>;`
    pub fn compile_handler_type(&self, ctx: &mut Context, site: &OperationSite<'_>) -> Result<Code, CompileError> {
        log::debug!("compiling handler type {} {} {}", site.name, site.method, site.path);
        let mut args = Vec::new();
        if let Some(params) = self.params_type(ctx, site, Side::Server)? {
            args.push(ObjectField::required("params", params).raw());
        }
        if let Some((content, required)) = self.request_body(site)? {
            let ty = self.body_union_type(ctx, &content)?;
            args.push(if required {
                ObjectField::required("body", ty).raw()
            } else {
                ObjectField::required("body", cat!(ty, " | undefined")).raw()
            });
        }
        let cases = self.response_cases(site, Side::Server)?;
        let variants = cases
            .iter()
            .map(|case| self.response_variant_type(ctx, case))
            .collect::<Result<Vec<_>, _>>()?;
        let result = if variants.is_empty() {
            code!("never")
        } else {
            Code::join(variants, " | ")
        };
        Ok(cat!(
            format!("export type {} = (", site.handler_type_name()),
            argument_list(&args),
            ") => Promise<",
            result,
            ">;\n"
        ))
    }

    /// `export async function handle<Name>(handler, request)` for a server.
    ///
    /// `handler_type` is the (possibly namespaced) handler type name.
    pub fn compile_endpoint(
        &self,
        ctx: &mut Context,
        site: &OperationSite<'_>,
        handler_type: &str,
    ) -> Result<Code, CompileError> {
        log::debug!("compiling endpoint {} {} {}", site.name, site.method, site.path);
        let request_type = runtime(ctx, "ServerRequest");
        let response_type = runtime(ctx, "ServerResponse");
        let mut lines = Lines::new(1);

        let mut params = Vec::new();
        for param in &site.parameters {
            let accessor = match param.location {
                ParameterLocation::Path => "pathParam",
                ParameterLocation::Query => "query",
                ParameterLocation::Header => "header",
                ParameterLocation::Cookie => "cookie",
            };
            let raw = ctx.fresh("raw");
            lines.line(code!("const {raw} = request.{accessor}({});", quote(&param.name)));
            let unpacked = self.unpack_parameter_expression(ctx, param, &code!("{raw}"))?;
            let value = if param.is_flag {
                unpacked
            } else if param.required || param.location == ParameterLocation::Path {
                lines.line(code!(
                    "if ({raw} === undefined) {}",
                    throw_malformed(
                        ctx,
                        param.location.as_str(),
                        &param.name,
                        &quote("missing required parameter")
                    )
                ));
                unpacked
            } else {
                cat!(format!("{raw} === undefined ? undefined : "), unpacked)
            };
            let local = ctx.fresh("param");
            lines.line(cat!(format!("const {local} = "), value, ";"));
            params.push(code!("{}: {local}", quote(&param.name)));
        }
        let mut call_args = Vec::new();
        if !site.parameters.is_empty() {
            let local = ctx.fresh("params");
            lines.line(cat!(format!("const {local} = {{ "), Code::join(params, ", "), " };"));
            call_args.push(local);
        }

        if let Some((content, required)) = self.request_body(site)? {
            let body = ctx.fresh("body");
            let ty = self.body_union_type(ctx, &content)?;
            lines.line(cat!(format!("let {body}: "), ty, " | undefined = undefined;"));
            let content_type = ctx.fresh("contentType");
            lines.line(code!("const {content_type} = request.contentType;"));
            lines.open(code!("if ({content_type} !== undefined)"));
            let matches = runtime(ctx, "matches");
            for (i, (declared, media)) in content.iter().enumerate() {
                let codec = BodyCodec::for_content_type(declared);
                let ct = quote(declared);
                let test = code!("if ({matches}({ct}, {content_type}))");
                if i == 0 {
                    lines.open(test);
                } else {
                    lines.reopen(cat!("else ", test));
                }
                let (read, value) = self.decode_body(ctx, codec, media, "request")?;
                lines.line(read);
                lines.line(cat!(format!("{body} = {{ contentType: {ct}, value: "), value, " };"));
            }
            lines.reopen(code!("else"));
            lines.line(code!(
                "{}",
                throw_malformed(
                    ctx,
                    "body",
                    "content-type",
                    &format!("\"unsupported content type \" + {content_type}")
                )
            ));
            lines.close();
            lines.close();
            if required {
                lines.line(code!(
                    "if ({body} === undefined) {}",
                    throw_malformed(ctx, "body", "body", &quote("missing request body"))
                ));
            }
            call_args.push(body);
        }

        let result = ctx.fresh("result");
        lines.line(code!("const {result} = await handler({});", call_args.join(", ")));
        lines.open(code!("switch ({result}.status)"));
        for case in self.response_cases(site, Side::Server)? {
            lines.open(code!("case {}:", case.status));
            let mut headers = Vec::new();
            for (name, header) in &case.headers {
                let param = header.to_parameter(name);
                let value = code!("{result}.headers[{}]", quote(name));
                let text = match self.pack_parameter_expression(ctx, &param, &value)? {
                    Packed::Text(text) => text,
                    Packed::Pairs(_) => {
                        return Err(CompileError::not_implemented(format!(
                            "form style for response header '{name}'"
                        )));
                    }
                };
                let key = quote(name);
                headers.push(if header.required {
                    cat!("[", &key, ", ", text, "]")
                } else {
                    cat!("...(", value, " !== undefined ? [[", &key, ", ", text, "]] : [])")
                });
            }
            let packed_headers = ctx.fresh("headers");
            lines.line(cat!(
                format!("const {packed_headers}: Array<[string, string]> = ["),
                Code::join(headers, ", "),
                "];"
            ));
            let status = case.status;
            match (case.content.len(), case.content.first()) {
                (0, _) | (_, None) => {
                    lines.line(code!("return {{ status: {status}, headers: {packed_headers} }};"))
                }
                (1, Some((content_type, media))) => {
                    let encoded = self.encode_body(
                        ctx,
                        BodyCodec::for_content_type(content_type),
                        media,
                        &code!("{result}.body.value"),
                    )?;
                    lines.line(cat!(
                        format!(
                            "return {{ status: {status}, headers: {packed_headers}, contentType: {}, body: ",
                            quote(content_type)
                        ),
                        encoded,
                        " };"
                    ));
                }
                _ => {
                    let accepts = runtime(ctx, "accepts");
                    lines.open(code!("switch ({result}.body.contentType)"));
                    for (content_type, media) in &case.content {
                        let ct = quote(content_type);
                        let encoded = self.encode_body(
                            ctx,
                            BodyCodec::for_content_type(content_type),
                            media,
                            &code!("{result}.body.value"),
                        )?;
                        lines.line(cat!(
                            format!(
                                "case {ct}: if ({accepts}(request, {ct})) return {{ status: {status}, headers: {packed_headers}, contentType: {ct}, body: "
                            ),
                            encoded,
                            " }; break;"
                        ));
                    }
                    lines.close();
                    lines.line(code!("return {}();", runtime(ctx, "notAcceptable")));
                }
            }
            lines.close();
        }
        lines.line(code!(
            "default: {}",
            throw_malformed(ctx, "response", "status", &quote("handler returned an undeclared status"))
        ));
        lines.close();

        Ok(cat!(
            format!(
                "export async function {}(handler: {handler_type}, request: {request_type}): Promise<{response_type}> {{\n",
                site.endpoint_name()
            ),
            lines.finish(),
            "}\n"
        ))
    }

    /// Object type of all parameters, or `None` when there are none.
    fn params_type(
        &self,
        ctx: &mut Context,
        site: &OperationSite<'_>,
        side: Side,
    ) -> Result<Option<Code>, CompileError> {
        if site.parameters.is_empty() {
            return Ok(None);
        }
        let mut fields = Vec::with_capacity(site.parameters.len());
        for param in &site.parameters {
            let ty = self.parameter_type(ctx, param)?;
            let required = param.required
                || param.location == ParameterLocation::Path
                || (side == Side::Server && param.is_flag);
            fields.push(if required {
                ObjectField::required(&param.name, ty)
            } else {
                ObjectField::optional(&param.name, ty)
            });
        }
        Ok(Some(object_type(&fields)))
    }

    fn request_body(&self, site: &OperationSite<'_>) -> Result<Option<(Content, bool)>, CompileError> {
        let Some(body) = &site.operation.request_body else {
            return Ok(None);
        };
        let body = self.doc.request_body(body)?;
        if body.content.is_empty() {
            return Ok(None);
        }
        Ok(Some((body.content.clone(), body.required)))
    }

    /// `{ contentType: "a"; value: A } | ...`
    fn body_union_type(&self, ctx: &mut Context, content: &Content) -> Result<Code, CompileError> {
        let mut variants = Vec::with_capacity(content.len());
        for (content_type, media) in content {
            let codec = BodyCodec::for_content_type(content_type);
            let value = self.body_type(ctx, codec, media)?;
            variants.push(object_type(&[
                ObjectField::required("contentType", Code::text(quote(content_type))).raw(),
                ObjectField::required("value", value).raw(),
            ]));
        }
        Ok(if variants.len() == 1 {
            Code::join(variants, "")
        } else {
            cat!("(", Code::join(variants, " | "), ")")
        })
    }

    fn response_variant_type(&self, ctx: &mut Context, case: &ResponseCase) -> Result<Code, CompileError> {
        let mut fields = vec![ObjectField::required("status", code!("{}", case.status)).raw()];
        if !case.headers.is_empty() {
            let mut headers = Vec::with_capacity(case.headers.len());
            for (name, header) in &case.headers {
                let ty = self.parameter_type(ctx, &header.to_parameter(name))?;
                headers.push(if header.required {
                    ObjectField::required(name, ty)
                } else {
                    ObjectField::optional(name, ty)
                });
            }
            fields.push(ObjectField::required("headers", object_type(&headers)).raw());
        }
        if !case.content.is_empty() {
            fields.push(ObjectField::required("body", self.body_union_type(ctx, &case.content)?).raw());
        }
        Ok(object_type(&fields))
    }

    fn response_cases(&self, site: &OperationSite<'_>, side: Side) -> Result<Vec<ResponseCase>, CompileError> {
        let mut cases = Vec::new();
        for (status, response) in &site.operation.responses {
            if status == "default" {
                match side {
                    Side::Client => {
                        return Err(CompileError::not_implemented(format!(
                            "`default` response of {}",
                            site.name
                        )));
                    }
                    Side::Server => {
                        log::warn!("skipping `default` response of {} in its handler type", site.name);
                        continue;
                    }
                }
            }
            let code: u16 = status.parse().map_err(|_| {
                CompileError::not_implemented(format!("response status '{status}' of {}", site.name))
            })?;
            if code == 401 && site.authenticated {
                continue;
            }
            let response: Response = self.doc.response(response)?.into_owned();
            let mut headers = Vec::with_capacity(response.headers.len());
            for (name, header) in &response.headers {
                headers.push((name.clone(), self.doc.header(header)?.into_owned()));
            }
            cases.push(ResponseCase {
                status: code,
                content: response.content,
                headers,
            });
        }
        Ok(cases)
    }
}

/// JSDoc block from the operation's summary, description and deprecation.
fn doc_comment(operation: &Operation) -> String {
    let mut lines: Vec<String> = Vec::new();
    for text in [&operation.summary, &operation.description].into_iter().flatten() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(text.trim().lines().map(|line| line.replace("*/", "*\\/")));
    }
    if operation.deprecated == Some(true) {
        lines.push("@deprecated".to_string());
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = String::from("/**\n");
    for line in lines {
        if line.is_empty() {
            out.push_str(" *\n");
        } else {
            out.push_str(&format!(" * {line}\n"));
        }
    }
    out.push_str(" */\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatRegistry;

    fn document(yaml: &str) -> Document {
        oac_core::parse::from_yaml(yaml).unwrap()
    }

    const PETS: &str = r##"
openapi: "3.0.3"
info: { title: Pets, version: "1" }
security:
  - bearer: []
paths:
  /pets/{petId}:
    parameters:
      - { name: petId, in: path, required: true, schema: { type: string, format: uuid } }
    get:
      operationId: get-pet
      parameters:
        - { name: verbose, in: query, allowEmptyValue: true, x-isFlag: true }
      responses:
        "200":
          description: ok
          headers:
            X-Rate:
              required: true
              schema: { type: integer }
          content:
            application/json:
              schema: { $ref: "#/components/schemas/Pet" }
        "401":
          description: unauthorized
    put:
      operationId: putPet
      security: [{}]
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: "#/components/schemas/Pet" }
          text/plain: {}
      responses:
        "204": { description: saved }
        "401": { description: unauthorized }
        default: { description: error }
components:
  schemas:
    Pet:
      type: object
      required: [id]
      properties:
        id: { type: string, format: uuid }
        born: { type: string, format: date-time }
"##;

    fn site<'a>(doc: &'a Document, path: &str, method: HttpMethod) -> OperationSite<'a> {
        operation_sites(doc)
            .unwrap()
            .into_iter()
            .find(|s| s.path == path && s.method == method)
            .unwrap()
    }

    #[test]
    fn test_sites_merge_parameters_and_security() {
        let doc = document(PETS);
        let get = site(&doc, "/pets/{petId}", HttpMethod::Get);
        assert_eq!(get.name.camel_case, "getPet");
        assert_eq!(get.parameters.len(), 2);
        assert_eq!(get.parameters[0].name, "petId");
        assert!(get.authenticated);
        let put = site(&doc, "/pets/{petId}", HttpMethod::Put);
        assert!(!put.authenticated);
    }

    #[test]
    fn test_raw_content_types_are_listed_once() {
        let doc = document(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths:
  /report:
    post:
      operationId: report
      requestBody:
        content:
          application/xml: {}
          application/json: {}
      responses:
        "200":
          description: ok
          content:
            application/xml: {}
            image/png: {}
            text/csv: {}
"#,
        );
        let report = site(&doc, "/report", HttpMethod::Post);
        let raw: Vec<String> = report.raw_content_types(&doc).unwrap().into_iter().collect();
        assert_eq!(raw, ["application/xml", "image/png"]);
        assert!(warn_raw_bodies(&doc).is_ok());
        let pets = document(PETS);
        let put = site(&pets, "/pets/{petId}", HttpMethod::Put);
        assert!(put.raw_content_types(&pets).unwrap().is_empty());
    }

    #[test]
    fn test_missing_operation_id() {
        let doc = document(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths:
  /x:
    get:
      responses: { "200": { description: ok } }
"#,
        );
        assert!(matches!(operation_sites(&doc), Err(CompileError::MalformedInput(_))));
    }

    #[test]
    fn test_authenticated_client_drops_401() {
        let doc = document(PETS);
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats).with_namespace("Types");
        let mut ctx = Context::new();
        let get = site(&doc, "/pets/{petId}", HttpMethod::Get);
        let code = compiler.compile_client_call(&mut ctx, &get).unwrap().render();
        assert!(code.starts_with("export async function getPet(transport: Runtime.Transport, account: Runtime.Account, authenticator: Runtime.Authenticator, refresh: Runtime.RefreshCallback, params: { \"petId\": Uuid; \"verbose\"?: boolean })"));
        assert!(!code.contains("status: 401"));
        assert!(code.contains("{ status: \"user-cancel\" }"));
        assert!(code.contains("{ status: \"unauthenticated\" }"));
        assert!(code.contains("Runtime.sendAuthenticated(transport,"));
        assert!(code.contains("const path = `/pets/${encodeURIComponent(params[\"petId\"])}`;"));
        assert!(code.contains("...(params[\"verbose\"] ? [[\"verbose\", null]] : [])"));
        assert!(code.contains("body: { contentType: \"application/json\"; value: Types.Pet }"));
        assert!(code.contains("Types.parsePet(json_"));
        assert!(code.contains("response.header(\"X-Rate\")"));
        assert!(ctx.usage().types);
    }

    #[test]
    fn test_handler_type_drops_401_and_default() {
        let doc = document(PETS);
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats).with_namespace("Types");
        let mut ctx = Context::new();
        let get = site(&doc, "/pets/{petId}", HttpMethod::Get);
        let code = compiler.compile_handler_type(&mut ctx, &get).unwrap().render();
        assert!(code.starts_with("export type GetPetHandler = (params: { \"petId\": Uuid; \"verbose\": boolean }) => Promise<"));
        assert!(!code.contains("401"));

        let put = site(&doc, "/pets/{petId}", HttpMethod::Put);
        let code = compiler.compile_handler_type(&mut ctx, &put).unwrap().render();
        assert!(code.contains("status: 401"));
        assert!(code.contains("{ status: 204 }"));
        assert!(!code.contains("default"));
    }

    #[test]
    fn test_client_doc_comment() {
        let doc = document(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths:
  /pets:
    get:
      operationId: listPets
      summary: List pets
      description: |
        Pages through every pet.
        Ends with */ on purpose.
      deprecated: true
      responses: { "204": { description: none } }
"#,
        );
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        let list = site(&doc, "/pets", HttpMethod::Get);
        let code = compiler.compile_client_call(&mut Context::new(), &list).unwrap().render();
        assert!(code.starts_with(
            "/**\n * List pets\n *\n * Pages through every pet.\n * Ends with *\\/ on purpose.\n * @deprecated\n */\nexport async function listPets("
        ));
    }

    #[test]
    fn test_client_rejects_default_response() {
        let doc = document(PETS);
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        let put = site(&doc, "/pets/{petId}", HttpMethod::Put);
        let err = compiler.compile_client_call(&mut Context::new(), &put).unwrap_err();
        assert!(matches!(err, CompileError::NotImplemented(_)));
    }

    #[test]
    fn test_endpoint_unpacks_and_dispatches() {
        let doc = document(PETS);
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats).with_namespace("Types");
        let mut ctx = Context::new();
        let put = site(&doc, "/pets/{petId}", HttpMethod::Put);
        let code = compiler
            .compile_endpoint(&mut ctx, &put, "Handlers.PutPetHandler")
            .unwrap()
            .render();
        assert!(code.starts_with(
            "export async function handlePutPet(handler: Handlers.PutPetHandler, request: Runtime.ServerRequest): Promise<Runtime.ServerResponse> {"
        ));
        assert!(code.contains("request.pathParam(\"petId\")"));
        assert!(code.contains("missing required parameter"));
        assert!(code.contains("Runtime.matches(\"application/json\", contentType_"));
        assert!(code.contains("Runtime.matches(\"text/plain\", contentType_"));
        assert!(code.contains("missing request body"));
        assert!(code.contains("case 204:"));
        assert!(code.contains("case 401:"));
    }

    #[test]
    fn test_endpoint_negotiates_multiple_response_types() {
        let doc = document(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths:
  /report:
    get:
      operationId: getReport
      responses:
        "200":
          description: ok
          content:
            application/json: { schema: { type: object } }
            text/csv: {}
"#,
        );
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        let get = site(&doc, "/report", HttpMethod::Get);
        let code = compiler
            .compile_endpoint(&mut Context::new(), &get, "GetReportHandler")
            .unwrap()
            .render();
        assert!(code.contains("Runtime.accepts(request, \"application/json\")"));
        assert!(code.contains("Runtime.accepts(request, \"text/csv\")"));
        assert!(code.contains("return Runtime.notAcceptable();"));
        assert!(code.contains("const result_0 = await handler();"));
    }

    #[test]
    fn test_non_numeric_status_fails() {
        let doc = document(
            r#"
openapi: "3.0.3"
info: { title: T, version: "1" }
paths:
  /x:
    get:
      operationId: getX
      responses:
        "2XX": { description: ok }
"#,
        );
        let formats = FormatRegistry::builtin("oac-runtime");
        let compiler = Compiler::new(&doc, &formats);
        let get = site(&doc, "/x", HttpMethod::Get);
        assert!(matches!(
            compiler.compile_handler_type(&mut Context::new(), &get),
            Err(CompileError::NotImplemented(_))
        ));
    }
}
