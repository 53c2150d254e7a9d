//! Theme engine
//!
//! Templates are rendered with Tera. The default templates are embedded in
//! the binary from `assets/templates/`. When `<theme.path>/<theme.active>`
//! exists on disk, every `.html` file in it replaces the embedded template
//! with the same relative name, so a theme can override only the pages it
//! cares about.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::config::ThemeConfig;

mod error;

pub use error::ThemeError;

/// Template rendered when another template fails
pub const ERROR_TEMPLATE: &str = "error.html";

#[derive(RustEmbed)]
#[folder = "assets/templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
    /// Name of the active theme
    theme_name: String,
    /// Directory whose templates override the embedded ones, if present
    override_dir: Option<PathBuf>,
}

impl ThemeEngine {
    /// Build the engine for the configured theme
    pub fn new(config: &ThemeConfig) -> Result<Self> {
        let theme_dir = config.path.join(&config.active);
        let override_dir = theme_dir.is_dir().then_some(theme_dir);

        let engine = Self::load(&config.active, override_dir)?;
        match &engine.override_dir {
            Some(dir) => tracing::info!("Theme '{}' loaded from {:?}", engine.theme_name, dir),
            None => tracing::info!("Theme '{}' using embedded templates", engine.theme_name),
        }
        Ok(engine)
    }

    /// Engine with only the embedded templates
    pub fn embedded() -> Result<Self> {
        Self::load("default", None)
    }

    fn load(theme_name: &str, override_dir: Option<PathBuf>) -> Result<Self> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in EmbeddedTemplates::iter() {
            if let Some(file) = EmbeddedTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned())
                    .with_context(|| format!("Embedded template '{}' is not UTF-8", name))?;
                templates.insert(name.to_string(), content);
            }
        }

        if let Some(dir) = &override_dir {
            collect_templates_from_dir(dir, dir, &mut templates)?;
        }

        let mut tera = Tera::default();
        // add_raw_templates resolves inheritance once every template is in
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(error_chain("Failed to load templates", &e)))?;

        Ok(Self {
            tera,
            theme_name: theme_name.to_string(),
            override_dir,
        })
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()).into());
        }

        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(error_chain(&format!("Failed to render '{}'", template), &e))
                .into()
        })
    }

    /// Render a template, falling back to `error.html` and then to a plain
    /// HTML page. Always produces a body.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {:#}", template, e);

                let mut error_context = TeraContext::new();
                error_context.insert("status", &500);
                error_context.insert("title", "Server Error");
                error_context.insert("message", "Something went wrong while rendering this page.");

                match self.render(ERROR_TEMPLATE, &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::error!("Failed to render error template: {:#}", error_template_err);
                        simple_error_page()
                    }
                }
            }
        }
    }
}

/// Flatten an error and its sources into one message
fn error_chain(prefix: &str, e: &tera::Error) -> String {
    let mut message = format!("{}: {}", prefix, e);
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::from)? {
        let path = entry.map_err(ThemeError::from)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.insert(template_name, content);
        }
    }
    Ok(())
}

/// Last-resort page when even the error template fails
fn simple_error_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Server Error</title>
</head>
<body>
    <h1>Server Error</h1>
    <p>Something went wrong while rendering this page.</p>
</body>
</html>"#
        .to_string()
}
