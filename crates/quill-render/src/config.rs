//! Renderer configuration.
//!
//! [`RendererOptions`] is the caller-facing option set. It is resolved once,
//! when a [`Renderer`](crate::Renderer) is constructed, into [`ResolvedOptions`],
//! which never changes afterwards.
//!
//! # Development Mode
//!
//! When `is_dev` is set explicitly it wins. Otherwise the process is treated
//! as development unless the [`ENVIRONMENT_VAR`] variable equals
//! [`PRODUCTION`].
//!
//! `APP_ENV` plays the part `NODE_ENV` plays in Node deployments: code
//! ported from a Node renderer that checked `NODE_ENV=production` should set
//! `APP_ENV=production` instead. Only the exact value `production` counts.
//!
//! # Extensions
//!
//! The configured extension is appended verbatim, with no separator inserted.
//! The default is [`DEFAULT_EXTENSION`] (`".dust"`), so `"home"` becomes
//! `"home.dust"`. A caller configuring `"html"` gets `"homehtml"`; configure
//! `".html"` to get `"home.html"`.
//!
//! ```rust
//! use quill_render::RendererOptions;
//!
//! let options = RendererOptions::from_yaml("is_dev: false\nextension: .html\n").unwrap();
//! let resolved = options.resolve();
//! assert!(!resolved.is_dev);
//! assert_eq!(resolved.extension.apply("home"), "home.html");
//! assert_eq!(resolved.extension.apply("home.html"), "home.html");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension appended to template names when none is configured.
pub const DEFAULT_EXTENSION: &str = ".dust";

/// Environment variable consulted when `is_dev` is not set explicitly.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Value of [`ENVIRONMENT_VAR`] that marks a production process.
pub const PRODUCTION: &str = "production";

/// Template file suffix appended to names that lack it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extension(String);

impl Extension {
    pub fn new(extension: impl Into<String>) -> Self {
        Self(extension.into())
    }

    /// The raw extension string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends the extension to `name` unless `name` already ends with it.
    ///
    /// Idempotent: applying it twice gives the same result as applying it once.
    pub fn apply(&self, name: &str) -> String {
        if name.ends_with(&self.0) {
            name.to_string()
        } else {
            format!("{}{}", name, self.0)
        }
    }
}

impl Default for Extension {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options accepted when constructing a renderer.
///
/// Every field is optional; missing fields take their documented default
/// during [`resolve`](Self::resolve).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    /// Overrides the environment-derived development mode.
    pub is_dev: Option<bool>,
    /// Overrides [`DEFAULT_EXTENSION`].
    pub extension: Option<String>,
}

impl RendererOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces development mode on or off.
    pub fn dev(mut self, is_dev: bool) -> Self {
        self.is_dev = Some(is_dev);
        self
    }

    /// Sets the template extension.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Parses options from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Resolves the options against the process environment.
    pub fn resolve(&self) -> ResolvedOptions {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolves the options, reading environment variables through `lookup`.
    ///
    /// `lookup` is only called when `is_dev` is unset.
    pub fn resolve_with<F>(&self, lookup: F) -> ResolvedOptions
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let is_dev = match self.is_dev {
            Some(is_dev) => is_dev,
            None => lookup(ENVIRONMENT_VAR).as_deref() != Some(PRODUCTION),
        };
        let extension = self
            .extension
            .as_deref()
            .filter(|ext| !ext.is_empty())
            .map(Extension::new)
            .unwrap_or_default();

        ResolvedOptions { is_dev, extension }
    }
}

/// Configuration fixed at renderer construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub is_dev: bool,
    pub extension: Extension,
}
