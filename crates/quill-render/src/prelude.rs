//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use quill_render::prelude::*;
//!
//! let renderer = Renderer::new(MemorySource::new(), MiniJinjaEngine::new());
//! let output = renderer.render("home", &data).await?;
//! ```

pub use crate::config::RendererOptions;
pub use crate::error::{EngineError, RenderError, SourceError};
pub use crate::source::{MemorySource, Template, TemplateSource};
pub use crate::template::{MiniJinjaEngine, Renderer, TemplateEngine};
