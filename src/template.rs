// src/template.rs

//! `{name}` placeholder substitution for commands and marker templates.
//!
//! `{{` and `}}` produce literal braces. Shell expansions written as
//! `${NAME}` are left untouched.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::task::Params;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{[^{}]*\}|\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("placeholder regex is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown placeholder '{{{name}}}' in template '{template}'")]
pub struct TemplateError {
    pub name: String,
    pub template: String,
}

/// Names referenced by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            let name = name.as_str().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Substitute every placeholder from `params`.
pub fn render(template: &str, params: &Params) -> Result<String, TemplateError> {
    if let Some(name) = placeholders(template)
        .into_iter()
        .find(|name| !params.contains_key(name))
    {
        return Err(TemplateError {
            name,
            template: template.to_string(),
        });
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| match caps.get(1) {
        Some(name) => params[name.as_str()].clone(),
        None => match &caps[0] {
            "{{" => "{".to_string(),
            "}}" => "}".to_string(),
            shell => shell.to_string(),
        },
    });

    Ok(rendered.into_owned())
}
