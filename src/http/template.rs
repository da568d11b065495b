//! Mustache template engine.
//!
//! # Responsibilities
//! - Resolve template names to sources (inline first, then
//!   `prefix + name + suffix` on disk)
//! - Parse once, cache the parsed form
//! - Render against a `serde_json::Value` model
//!
//! # Supported syntax
//! - `{{name}}` HTML-escaped, `{{{name}}}` and `{{& name}}` raw
//! - dotted names (`{{author.name}}`) and `{{.}}` for the current item
//! - `{{#section}}…{{/section}}` over lists, objects and booleans
//! - `{{^inverted}}…{{/inverted}}` when missing, false or empty
//! - `{{! comments }}`

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::config::schema::TemplateConfig;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template `{name}` not found at {}", .path.display())]
    NotFound {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template `{name}` is malformed: {reason}")]
    Parse { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var { name: String, escape: bool },
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

/// Renders named templates; registered as a bean when the server selects mustache.
#[derive(Debug)]
pub struct TemplateEngine {
    config: TemplateConfig,
    cache: DashMap<String, Arc<Vec<Node>>>,
}

impl TemplateEngine {
    pub fn new(config: TemplateConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Render the template called `name`.
    pub fn render(&self, name: &str, model: &Value) -> Result<String, TemplateError> {
        let nodes = self.load(name)?;
        let mut out = String::new();
        render_nodes(&nodes, &mut vec![model], &mut out);
        Ok(out)
    }

    /// Render a template given as source text. Nothing is cached.
    pub fn render_source(&self, source: &str, model: &Value) -> Result<String, TemplateError> {
        let nodes = parse(source).map_err(|reason| TemplateError::Parse {
            name: "<inline>".to_string(),
            reason,
        })?;
        let mut out = String::new();
        render_nodes(&nodes, &mut vec![model], &mut out);
        Ok(out)
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}{}{}", self.config.prefix, name, self.config.suffix))
    }

    fn load(&self, name: &str) -> Result<Arc<Vec<Node>>, TemplateError> {
        if let Some(nodes) = self.cache.get(name) {
            return Ok(nodes.value().clone());
        }

        let source = match self.config.inline.get(name) {
            Some(source) => source.clone(),
            None => {
                let path = self.path_for(name);
                fs::read_to_string(&path).map_err(|source| TemplateError::NotFound {
                    name: name.to_string(),
                    path,
                    source,
                })?
            }
        };

        let nodes = Arc::new(parse(&source).map_err(|reason| TemplateError::Parse {
            name: name.to_string(),
            reason,
        })?);
        tracing::debug!(template = name, "Template cached");
        self.cache.insert(name.to_string(), nodes.clone());
        Ok(nodes)
    }
}

fn parse(source: &str) -> Result<Vec<Node>, String> {
    let mut current: Vec<Node> = Vec::new();
    let mut open: Vec<(String, bool, Vec<Node>)> = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            current.push(Node::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];

        if let Some(raw) = after.strip_prefix('{') {
            let end = raw.find("}}}").ok_or("unterminated `{{{` tag")?;
            current.push(Node::Var {
                name: raw[..end].trim().to_string(),
                escape: false,
            });
            rest = &raw[end + 3..];
            continue;
        }

        let end = after.find("}}").ok_or("unterminated `{{` tag")?;
        let tag = after[..end].trim();
        rest = &after[end + 2..];

        match tag.chars().next() {
            Some('#') | Some('^') => {
                let name = tag[1..].trim().to_string();
                open.push((name, tag.starts_with('^'), std::mem::take(&mut current)));
            }
            Some('/') => {
                let name = tag[1..].trim();
                let (opened, inverted, parent) = open
                    .pop()
                    .ok_or_else(|| format!("closing `{name}` without opening section"))?;
                if opened != name {
                    return Err(format!("section `{opened}` closed by `{name}`"));
                }
                let children = std::mem::replace(&mut current, parent);
                current.push(Node::Section {
                    name: opened,
                    inverted,
                    children,
                });
            }
            Some('!') => {}
            Some('&') => current.push(Node::Var {
                name: tag[1..].trim().to_string(),
                escape: false,
            }),
            Some(_) => current.push(Node::Var {
                name: tag.to_string(),
                escape: true,
            }),
            None => return Err("empty tag".to_string()),
        }
    }

    if let Some((name, _, _)) = open.last() {
        return Err(format!("section `{name}` is never closed"));
    }
    if !rest.is_empty() {
        current.push(Node::Text(rest.to_string()));
    }
    Ok(current)
}

fn render_nodes<'a>(nodes: &[Node], stack: &mut Vec<&'a Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { name, escape } => {
                let Some(value) = lookup(stack, name) else {
                    continue;
                };
                let text = display(value);
                if *escape {
                    escape_html(&text, out);
                } else {
                    out.push_str(&text);
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(stack, name);
                let truthy = value.is_some_and(is_truthy);
                if *inverted {
                    if !truthy {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(value) if truthy => {
                        stack.push(value);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Innermost context whose first segment resolves wins.
fn lookup<'a>(stack: &[&'a Value], name: &str) -> Option<&'a Value> {
    if name == "." {
        return stack.last().copied();
    }
    let mut segments = name.split('.');
    let first = segments.next()?;
    let mut value = stack.iter().rev().find_map(|ctx| ctx.get(first))?;
    for segment in segments {
        value = value.get(segment)?;
    }
    Some(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> TemplateEngine {
        TemplateEngine::new(TemplateConfig::default())
    }

    #[test]
    fn test_variables_are_escaped() {
        let out = engine()
            .render_source("<h1>{{title}}</h1>{{{raw}}}{{& raw}}", &json!({
                "title": "Tom & <Jerry>",
                "raw": "<b>x</b>"
            }))
            .unwrap();
        assert_eq!(out, "<h1>Tom &amp; &lt;Jerry&gt;</h1><b>x</b><b>x</b>");
    }

    #[test]
    fn test_sections_and_dotted_names() {
        let model = json!({
            "title": "Blog",
            "articles": [
                { "title": "One", "author": { "name": "Ann" } },
                { "title": "Two", "author": { "name": "Bob" } }
            ]
        });
        let out = engine()
            .render_source(
                "{{#articles}}[{{title}} by {{author.name}} in {{title}}]{{/articles}}{{^drafts}}no drafts{{/drafts}}",
                &model,
            )
            .unwrap();
        assert_eq!(out, "[One by Ann in One][Two by Bob in Two]no drafts");
    }

    #[test]
    fn test_outer_context_visible_in_section() {
        let out = engine()
            .render_source("{{#items}}{{.}}@{{site}} {{/items}}", &json!({
                "site": "home",
                "items": [1, 2]
            }))
            .unwrap();
        assert_eq!(out, "1@home 2@home ");
    }

    #[test]
    fn test_malformed_templates() {
        for source in ["{{#a}}x", "{{#a}}{{/b}}", "{{/a}}", "{{name"] {
            assert!(
                matches!(engine().render_source(source, &json!({})), Err(TemplateError::Parse { .. })),
                "{source}"
            );
        }
    }

    #[test]
    fn test_inline_then_disk_with_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.mustache"), "Hello {{name}}").unwrap();

        let mut config = TemplateConfig::default();
        config
            .prefix(format!("{}/", dir.path().display()))
            .template("inline", "Inline {{name}}");
        let engine = TemplateEngine::new(config);
        let model = json!({ "name": "Ada" });

        assert_eq!(engine.render("inline", &model).unwrap(), "Inline Ada");
        assert_eq!(engine.render("page", &model).unwrap(), "Hello Ada");

        fs::remove_file(dir.path().join("page.mustache")).unwrap();
        assert_eq!(engine.render("page", &model).unwrap(), "Hello Ada");
        assert!(matches!(
            engine.render("missing", &model),
            Err(TemplateError::NotFound { .. })
        ));
    }
}
