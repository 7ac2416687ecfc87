//! # Quill Render - Asynchronous Template Rendering Adapter
//!
//! `quill-render` loads named templates from a [`TemplateSource`] and renders
//! them with a [`TemplateEngine`]. It owns the glue between the two: name
//! normalization, the acquire → compile → register → execute pipeline, the
//! hook the engine uses to fetch nested templates, and error surfacing.
//!
//! ## Core Concepts
//!
//! - [`TemplateSource`]: resolves a template name to its text
//! - [`TemplateEngine`]: compiles and executes templates; [`MiniJinjaEngine`] is the default
//! - [`Renderer`]: the adapter; call [`Renderer::render`] to produce output
//! - [`RendererOptions`]: extension and development-mode settings
//! - [`RenderError`]: the single error channel for lookup, compile and execution failures
//!
//! ## Quick Start
//!
//! ```rust
//! use quill_render::{MemorySource, MiniJinjaEngine, Renderer, RendererOptions};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Page {
//!     title: String,
//! }
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let source = MemorySource::new()
//!     .with_template("page.dust", "{% include \"header\" %}{{ title }}")
//!     .with_template("header.dust", "# ");
//!
//! let renderer = Renderer::with_options(source, MiniJinjaEngine::new(), RendererOptions::new().dev(false));
//! let output = renderer
//!     .render("page", &Page { title: "Report".into() })
//!     .await
//!     .unwrap();
//! assert_eq!(output, "# Report");
//! # });
//! ```
//!
//! ## Names and Extensions
//!
//! Names are normalized before every lookup by appending the configured
//! extension (default `".dust"`) when it is missing. See [`Extension::apply`].
//!
//! ## Development Mode
//!
//! Unless set explicitly, development mode is on when the `APP_ENV`
//! environment variable is not `production`. In development mode the engine
//! runs at [`Verbosity::Info`].

pub mod config;
mod error;
pub mod prelude;
pub mod source;
pub mod template;

pub use error::{EngineError, RenderError, SourceError};

pub use config::{
    Extension, RendererOptions, ResolvedOptions, DEFAULT_EXTENSION, ENVIRONMENT_VAR, PRODUCTION,
};

pub use source::{MemorySource, Template, TemplateSource};

pub use template::{
    CompiledTemplate, EngineConfig, MiniJinjaEngine, Renderer, SourceHook, TemplateEngine,
    TemplateRequestHook, Verbosity,
};
