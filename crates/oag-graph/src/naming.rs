use std::collections::HashSet;

use heck::ToPascalCase;
use minijinja::{Environment, context};

/// Claim `base` in `used`, appending `2`, `3`, ... until the name is free.
pub fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut i = 2;
    loop {
        let candidate = format!("{}{}", base, i);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}

/// PascalCase component name for a hoisted schema.
pub fn component_name(raw: &str) -> String {
    let pascal = raw.to_pascal_case();
    if pascal.is_empty() || pascal.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Enum{pascal}")
    } else {
        pascal
    }
}

/// Render a `{{name}}` naming template.
pub fn render_name(template: &str, name: &str) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("name", template)?;
    let tmpl = env.get_template("name")?;
    tmpl.render(context! { name => name })
}
