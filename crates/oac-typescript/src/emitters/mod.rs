pub mod client;
pub mod server;
pub mod server_types;
pub mod types;
pub mod validators;

use crate::compile::{RUNTIME, TYPES};
use crate::context::Context;
use crate::fragment::{Code, Origin, quote};

/// Settings shared by every emitted file.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Module the `Runtime` namespace is imported from.
    pub runtime_module: String,
    /// Prefix every fragment with a comment naming where it was generated.
    pub annotate: bool,
}

/// Module specifier of the generated types file, relative to its siblings.
pub const TYPES_MODULE: &str = "./types";

/// Prepend the preamble the body turned out to need and render the file.
///
/// `local_imports` are `(alias, module)` namespace imports the emitter always
/// needs, such as `./server-types` in the server file.
pub fn finish_file(ctx: &Context, options: &EmitOptions, local_imports: &[(&str, &str)], body: Code) -> String {
    let mut file = preamble(ctx, options, local_imports);
    file.append(body);
    if options.annotate {
        file.render_annotated()
    } else {
        file.render()
    }
}

fn preamble(ctx: &Context, options: &EmitOptions, local_imports: &[(&str, &str)]) -> Code {
    let usage = ctx.usage();
    let mut lines = vec!["// Generated by oac. Do not edit.".to_string()];
    if usage.runtime {
        lines.push(format!(
            "import * as {RUNTIME} from {};",
            quote(&options.runtime_module)
        ));
    }
    if usage.types {
        lines.push(format!("import * as {TYPES} from {};", quote(TYPES_MODULE)));
    }
    for (alias, module) in local_imports {
        lines.push(format!("import * as {alias} from {};", quote(module)));
    }
    if usage.query_string {
        lines.push("import qs from \"qs\";".to_string());
    }
    for (module, symbols) in &usage.imports {
        let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
        lines.push(format!("import {{ {} }} from {};", symbols.join(", "), quote(module)));
    }
    let mut text = lines.join("\n");
    text.push_str("\n\n");
    Code::tagged(text, Origin::Preamble)
}
