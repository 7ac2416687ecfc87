//! Template engines and the render pipeline.
//!
//! ## Key Types
//!
//! - [`TemplateEngine`]: compile, register and execute named templates
//! - [`MiniJinjaEngine`]: the default engine, backed by MiniJinja
//! - [`Renderer`]: drives a source and an engine through the render pipeline
//! - [`SourceHook`]: lets the engine fetch nested templates from the source
//!
//! ## See Also
//!
//! - [`crate::source`]: where template text comes from
//! - [`crate::config`]: extension and development-mode options

pub mod engine;
mod renderer;

pub use engine::{CompiledTemplate, MiniJinjaEngine, TemplateEngine, TemplateRequestHook, Verbosity};
pub use renderer::{EngineConfig, Renderer, SourceHook};
