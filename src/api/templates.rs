//! Server-rendered pages and email bodies.
//!
//! Templates are compiled into the binary; names ending in `.html` are
//! autoescaped by minijinja.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../../templates/layout.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
    ("purchase.html", include_str!("../../templates/purchase.html")),
    (
        "email/magic_link.txt",
        include_str!("../../templates/email/magic_link.txt"),
    ),
    (
        "email/magic_link.html",
        include_str!("../../templates/email/magic_link.html"),
    ),
];

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    for &(name, source) in TEMPLATES {
        env.add_template(name, source)
            .with_context(|| format!("invalid template {name}"))?;
    }
    Ok(env)
}

/// Render a compiled-in template with the given context.
///
/// # Errors
/// Returns an error if the template is unknown or rendering fails.
pub fn render<S: Serialize>(name: &str, context: S) -> Result<String> {
    let env = environment()?;
    env.get_template(name)
        .with_context(|| format!("unknown template {name}"))?
        .render(context)
        .with_context(|| format!("failed to render template {name}"))
}
