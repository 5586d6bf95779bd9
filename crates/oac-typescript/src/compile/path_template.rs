use crate::fragment::Code;

/// A path such as `/pets/{petId}` split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

impl PathTemplate {
    /// Linear scan for `{...}` spans. An unclosed `{` stays literal text.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = path;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Placeholder(rest[open + 1..close].to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// A template literal with `f(name)` spliced in at every placeholder.
    #[track_caller]
    pub fn render(&self, mut f: impl FnMut(&str) -> Code) -> Code {
        let mut out = Code::text("`");
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push(escape_template_text(text)),
                Segment::Placeholder(name) => {
                    out.push("${");
                    out.append(f(name));
                    out.push("}");
                }
            }
        }
        out.push("`");
        out
    }

    /// The path with `{name}` rewritten to the router's `:name` syntax.
    pub fn route_pattern(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Placeholder(name) => format!(":{name}"),
            })
            .collect()
    }
}

/// Render `path` as a template literal and return it with its placeholder names.
#[track_caller]
pub fn template(path: &str, f: impl FnMut(&str) -> Code) -> (Code, Vec<String>) {
    let parsed = PathTemplate::parse(path);
    let names = parsed.placeholders().into_iter().map(str::to_string).collect();
    (parsed.render(f), names)
}

fn escape_template_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code;

    #[test]
    fn test_template_placeholders() {
        let (code, names) = template("/entry/{id}/completed", |name| code!("f({name})"));
        assert_eq!(names, vec!["id".to_string()]);
        assert_eq!(code.render(), "`/entry/${f(id)}/completed`");
    }

    #[test]
    fn test_multiple_and_adjacent() {
        let parsed = PathTemplate::parse("/{a}{b}/x");
        assert_eq!(parsed.placeholders(), vec!["a", "b"]);
        assert_eq!(parsed.route_pattern(), "/:a:b/x");
    }

    #[test]
    fn test_no_placeholders() {
        let (code, names) = template("/pets", |_| code!("unused"));
        assert!(names.is_empty());
        assert_eq!(code.render(), "`/pets`");
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let parsed = PathTemplate::parse("/a/{b");
        assert_eq!(parsed.segments(), &[Segment::Literal("/a/{b".to_string())]);
    }
}
