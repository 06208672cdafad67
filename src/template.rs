//! Template interpolation for pipeline configs
//!
//! Handles `{{ variable }}` interpolation in configuration values and URL
//! templates. `{{ env.NAME }}` reads the process environment, `{{ vars.x }}`
//! reads values declared in the config, and a bare `{{ name }}` looks up
//! per-request variables such as `{{ store_number }}`.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}").unwrap()
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Variables declared in the pipeline config
    pub vars: Value,
    /// Per-request variables (e.g. the current store number)
    pub locals: Value,
    /// Environment overrides, consulted before the process environment
    pub env: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config variables
    pub fn with_vars(vars: Value) -> Self {
        Self {
            vars,
            ..Default::default()
        }
    }

    /// Set config variables
    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Set per-request variables
    pub fn set_locals(&mut self, locals: Value) -> &mut Self {
        self.locals = locals;
        self
    }

    /// Override an environment variable for this context only
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Get a value by path (e.g., "vars.api_key")
    pub fn get(&self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["env", name] => self
                .env
                .get(*name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
                .map(Value::String),
            ["vars", rest @ ..] => get_nested_value(&self.vars, rest).cloned(),
            _ => get_nested_value(&self.locals, &parts)
                .or_else(|| get_nested_value(&self.vars, &parts))
                .cloned(),
        }
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut errors = Vec::new();

    let result = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let var_path = &cap[1];
        if let Some(value) = ctx.get(var_path) {
            value_to_string(&value)
        } else {
            errors.push(var_path.to_string());
            String::new()
        }
    });

    if errors.is_empty() {
        Ok(result.into_owned())
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Render all string values in a JSON value
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) if has_templates(s) => Ok(Value::String(render(s, ctx)?)),
        Value::Object(map) => {
            let mut new_map = serde_json::Map::new();
            for (k, v) in map {
                new_map.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(new_map))
        }
        Value::Array(arr) => {
            let new_arr: Result<Vec<Value>> = arr.iter().map(|v| render_value(v, ctx)).collect();
            Ok(Value::Array(new_arr?))
        }
        _ => Ok(value.clone()),
    }
}

/// Render every template in a YAML document before it is deserialized
pub fn render_yaml(value: &serde_yaml::Value, ctx: &TemplateContext) -> Result<serde_yaml::Value> {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::String(s) if has_templates(s) => Ok(Yaml::String(render(s, ctx)?)),
        Yaml::Mapping(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (k, v) in map {
                // api detail URLs keep their per-request placeholders
                let keep = k.as_str() == Some("detail_url");
                let rendered = if keep {
                    render_partial(v, ctx)
                } else {
                    render_yaml(v, ctx)?
                };
                out.insert(k.clone(), rendered);
            }
            Ok(Yaml::Mapping(out))
        }
        Yaml::Sequence(seq) => {
            let rendered: Result<Vec<Yaml>> = seq.iter().map(|v| render_yaml(v, ctx)).collect();
            Ok(Yaml::Sequence(rendered?))
        }
        _ => Ok(value.clone()),
    }
}

/// Render only `env.*` and `vars.*` placeholders, leaving the rest intact
fn render_partial(value: &serde_yaml::Value, ctx: &TemplateContext) -> serde_yaml::Value {
    match value {
        serde_yaml::Value::String(s) => {
            let out = TEMPLATE_REGEX.replace_all(s, |cap: &regex::Captures<'_>| {
                let var_path = &cap[1];
                let scoped = var_path.starts_with("env.") || var_path.starts_with("vars.");
                match ctx.get(var_path) {
                    Some(value) if scoped => value_to_string(&value),
                    _ => cap[0].to_string(),
                }
            });
            serde_yaml::Value::String(out.into_owned())
        }
        other => other.clone(),
    }
}
