//! Template resolution against the configuration context
//!
//! Strings may reference configuration values with `<%= key.path %>`.
//! Templates are parsed into literal and placeholder segments, then each
//! placeholder is looked up in a [`ConfigContext`]. Values that contain
//! placeholders of their own are resolved again, up to [`MAX_DEPTH`] levels.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::env;
use std::sync::LazyLock;

/// Maximum nesting of placeholder-in-value references
pub const MAX_DEPTH: usize = 10;

/// Marker opening a placeholder
const OPEN: &str = "<%=";

/// Namespace that reads process environment variables
const ENV_NAMESPACE: &str = "env.";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<%=\s*([^%]*?)\s*%>").expect("placeholder regex is valid"));

/// Configuration values addressed by dotted key path
#[derive(Debug, Clone, Default)]
pub struct ConfigContext {
    root: Mapping,
}

impl ConfigContext {
    pub fn new(root: Mapping) -> Self {
        ConfigContext { root }
    }

    /// Look up a dotted key path such as `path.dist`
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.root.get(first)?;

        for part in parts {
            current = match current {
                Value::Mapping(map) => map.get(part)?,
                Value::Sequence(seq) => seq.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Resolve every placeholder in a string
    pub fn resolve_str(&self, value: &str) -> InterpolationResult<String> {
        resolve_str(value, self)
    }

    /// Resolve every string inside a YAML value, recursing into mappings and sequences
    pub fn resolve_value(&self, value: &Value) -> InterpolationResult<Value> {
        resolve_value(value, self)
    }
}

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A string split into literal text and placeholder references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string
    pub fn parse(s: &str) -> InterpolationResult<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(s) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            push_literal(&mut segments, &s[last..whole.start()])?;

            let key = caps[1].trim();
            if key.is_empty() {
                return Err(InterpolationError::InvalidSyntax(format!(
                    "empty placeholder in '{}'",
                    s
                )));
            }
            segments.push(Segment::Placeholder(key.to_string()));
            last = whole.end();
        }
        push_literal(&mut segments, &s[last..])?;

        Ok(Template { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True if the template has no placeholders
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Keys referenced by this template
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(key) => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> InterpolationResult<()> {
    if text.contains(OPEN) {
        return Err(InterpolationError::InvalidSyntax(format!(
            "unterminated placeholder in '{}'",
            text
        )));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

/// Resolve every placeholder in a string against the context
pub fn resolve_str(value: &str, ctx: &ConfigContext) -> InterpolationResult<String> {
    resolve_at_depth(value, ctx, 0, None)
}

fn resolve_at_depth(
    value: &str,
    ctx: &ConfigContext,
    depth: usize,
    via: Option<&str>,
) -> InterpolationResult<String> {
    let template = Template::parse(value)?;
    if template.is_literal() {
        return Ok(value.to_string());
    }

    if depth >= MAX_DEPTH {
        let key = via
            .map(str::to_string)
            .or_else(|| template.placeholders().next().map(str::to_string))
            .unwrap_or_default();
        return Err(InterpolationError::CyclicReference(key));
    }

    let mut out = String::new();
    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(key) => {
                let raw = lookup_scalar(key, ctx)?;
                out.push_str(&resolve_at_depth(&raw, ctx, depth + 1, Some(key))?);
            }
        }
    }

    Ok(out)
}

fn lookup_scalar(key: &str, ctx: &ConfigContext) -> InterpolationResult<String> {
    if let Some(name) = key.strip_prefix(ENV_NAMESPACE) {
        return env::var(name).map_err(|_| InterpolationError::UnknownVariable(key.to_string()));
    }

    let value = ctx
        .lookup(key)
        .ok_or_else(|| InterpolationError::UnknownVariable(key.to_string()))?;

    scalar_to_string(value).ok_or_else(|| InterpolationError::NotScalar(key.to_string()))
}

/// Render a scalar YAML value as text
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Resolve every string inside a YAML value
pub fn resolve_value(value: &Value, ctx: &ConfigContext) -> InterpolationResult<Value> {
    match value {
        Value::String(s) => Ok(Value::String(resolve_str(s, ctx)?)),
        Value::Sequence(seq) => seq
            .iter()
            .map(|item| resolve_value(item, ctx))
            .collect::<InterpolationResult<Vec<_>>>()
            .map(Value::Sequence),
        Value::Mapping(map) => {
            let mut resolved = Mapping::new();
            for (k, v) in map {
                resolved.insert(k.clone(), resolve_value(v, ctx)?);
            }
            Ok(Value::Mapping(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve a list of strings
pub fn resolve_list(list: &[String], ctx: &ConfigContext) -> InterpolationResult<Vec<String>> {
    list.iter()
        .map(|s| resolve_str(s, ctx))
        .collect::<InterpolationResult<Vec<String>>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(yaml: &str) -> ConfigContext {
        ConfigContext::new(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_simple_resolution() {
        let ctx = context("path:\n  dev: application/\n  dist: public/\n");
        let result = ctx.resolve_str("<%= path.dev %>/assets/css/").unwrap();
        assert_eq!(result, "application//assets/css/");
    }

    #[test]
    fn test_whitespace_inside_marker_is_optional() {
        let ctx = context("name: site\n");
        assert_eq!(ctx.resolve_str("<%=name%>-<%= name %>").unwrap(), "site-site");
    }

    #[test]
    fn test_number_and_bool_values() {
        let ctx = context("level: 7\nminify: true\n");
        assert_eq!(ctx.resolve_str("-O<%= level %>").unwrap(), "-O7");
        assert_eq!(ctx.resolve_str("<%= minify %>").unwrap(), "true");
    }

    #[test]
    fn test_nested_reference() {
        let ctx = context("root: build\npath:\n  dist: \"<%= root %>/public\"\n");
        assert_eq!(ctx.resolve_str("<%= path.dist %>/js").unwrap(), "build/public/js");
    }

    #[test]
    fn test_unknown_variable() {
        let ctx = context("path:\n  dev: app/\n");
        let result = ctx.resolve_str("<%= path.missing %>");
        assert!(matches!(
            result,
            Err(InterpolationError::UnknownVariable(ref key)) if key == "path.missing"
        ));
    }

    #[test]
    fn test_cyclic_reference() {
        let ctx = context("a: \"<%= b %>\"\nb: \"<%= a %>\"\n");
        let result = ctx.resolve_str("<%= a %>");
        assert!(matches!(result, Err(InterpolationError::CyclicReference(_))));
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let ctx = context("a: \"x<%= a %>\"\n");
        assert!(matches!(
            ctx.resolve_str("<%= a %>"),
            Err(InterpolationError::CyclicReference(_))
        ));
    }

    #[test]
    fn test_mapping_is_not_scalar() {
        let ctx = context("path:\n  dev: app/\n");
        assert!(matches!(
            ctx.resolve_str("<%= path %>"),
            Err(InterpolationError::NotScalar(_))
        ));
    }

    #[test]
    fn test_unterminated_placeholder() {
        let ctx = context("a: b\n");
        assert!(matches!(
            ctx.resolve_str("<%= a"),
            Err(InterpolationError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let ctx = context("path:\n  dev: application/\n");
        let once = ctx.resolve_str("<%= path.dev %>css/*.css").unwrap();
        let twice = ctx.resolve_str(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_literal_untouched() {
        let ctx = ConfigContext::default();
        assert_eq!(ctx.resolve_str("cleancss -o ${dest}").unwrap(), "cleancss -o ${dest}");
    }

    #[test]
    fn test_resolve_nested_value() {
        let ctx = context("dist: public\n");
        let options: Value =
            serde_yaml::from_str("out: \"<%= dist %>/x\"\nlevel: 7\nlist: [\"<%= dist %>\"]\n")
                .unwrap();
        let resolved = ctx.resolve_value(&options).unwrap();
        assert_eq!(resolved["out"], Value::String("public/x".to_string()));
        assert_eq!(resolved["level"], Value::Number(7.into()));
        assert_eq!(resolved["list"][0], Value::String("public".to_string()));
    }

    #[test]
    fn test_env_namespace() {
        std::env::set_var("ASSETFLOW_TEST_RESOLVE", "from-env");
        let ctx = ConfigContext::default();
        assert_eq!(
            ctx.resolve_str("<%= env.ASSETFLOW_TEST_RESOLVE %>").unwrap(),
            "from-env"
        );
        std::env::remove_var("ASSETFLOW_TEST_RESOLVE");
    }

    #[test]
    fn test_template_segments() {
        let template = Template::parse("a<%= b %>c").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("a".to_string()),
                Segment::Placeholder("b".to_string()),
                Segment::Literal("c".to_string()),
            ]
        );
    }
}
