//! Template renderer.
//!
//! This module provides [`Renderer`], which ties a [`TemplateSource`] to a
//! [`TemplateEngine`]. Each render is a fixed pipeline:
//!
//! 1. Normalize: append the configured extension unless the name has it.
//! 2. Acquire: load the template from the source.
//! 3. Compile the template content under the template's returned name.
//! 4. Register the compiled form with the engine.
//! 5. Execute the registered template with the render parameters.
//!
//! A stage only starts once the previous one has finished. The first failure
//! ends the render; nothing is retried and no partial output is returned.
//!
//! Nested templates are resolved by the engine through a [`SourceHook`] the
//! renderer installs at construction. The hook normalizes and acquires exactly
//! like steps 1 and 2 above.
//!
//! Templates are never cached here: every render and every hook request goes
//! back to the source. Whether a partial is requested again on the next render
//! is up to the engine. [`MiniJinjaEngine`](super::MiniJinjaEngine) keeps
//! fetched partials only for the execution that needed them, so an edited
//! partial shows up on the next render just like an edited top-level
//! template. An engine that caches partials would only see the edit after
//! its own cache is cleared.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::engine::{TemplateEngine, TemplateRequestHook, Verbosity};
use crate::config::{Extension, RendererOptions, ResolvedOptions};
use crate::error::{RenderError, SourceError};
use crate::source::{Template, TemplateSource};

/// Per-call engine options.
///
/// Accepted by [`Renderer::render_with_config`] and passed nowhere yet; it is
/// reserved for engine-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineConfig(serde_json::Map<String, serde_json::Value>);

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for EngineConfig {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Request hook that resolves templates through a [`TemplateSource`].
///
/// Shared by [`Renderer`] for its acquire stage and installed on the engine
/// for nested templates, so both paths normalize and load identically.
pub struct SourceHook {
    source: Arc<dyn TemplateSource>,
    extension: Extension,
}

impl SourceHook {
    pub fn new(source: Arc<dyn TemplateSource>, extension: Extension) -> Self {
        Self { source, extension }
    }

    pub fn extension(&self) -> &Extension {
        &self.extension
    }

    /// Normalizes `name` and loads it from the source.
    pub async fn acquire(&self, name: &str) -> Result<Template, SourceError> {
        let name = self.extension.apply(name);
        tracing::debug!(template = %name, "loading template");
        self.source.load(&name).await
    }
}

#[async_trait]
impl TemplateRequestHook for SourceHook {
    async fn request(&self, name: &str, _params: &serde_json::Value) -> Result<String, SourceError> {
        match self.acquire(name).await {
            Ok(template) => Ok(template.content),
            Err(err) => {
                tracing::warn!(template = %name, error = %err, "nested template request failed");
                Err(err)
            }
        }
    }
}

/// Renders named templates from a [`TemplateSource`] with a [`TemplateEngine`].
///
/// Construction resolves [`RendererOptions`] once. In development mode the
/// engine's verbosity is raised to [`Verbosity::Info`]; otherwise it is left
/// as it was. Construction always installs the renderer's [`SourceHook`] on
/// the engine, replacing any hook already there, so an engine should be
/// owned by one renderer at a time.
///
/// Top-level templates are read from the source on every render. Nested
/// templates are read through the hook whenever the engine asks for them;
/// see the module docs for how caching in the engine affects that.
///
/// # Example
///
/// ```rust
/// use quill_render::{MemorySource, MiniJinjaEngine, Renderer, RendererOptions};
/// use serde_json::json;
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let source = MemorySource::new()
///     .with_template("home.dust", "{% include \"nav\" %} Hello, {{ name }}!")
///     .with_template("nav.dust", "[nav]");
///
/// let renderer = Renderer::with_options(
///     source,
///     MiniJinjaEngine::new(),
///     RendererOptions::new().dev(false),
/// );
///
/// let output = renderer.render("home", &json!({ "name": "World" })).await.unwrap();
/// assert_eq!(output, "[nav] Hello, World!");
/// # });
/// ```
pub struct Renderer<E: TemplateEngine> {
    engine: E,
    hook: Arc<SourceHook>,
    options: ResolvedOptions,
}

impl<E: TemplateEngine> Renderer<E> {
    /// Creates a renderer with default options.
    pub fn new<S>(source: S, engine: E) -> Self
    where
        S: TemplateSource + 'static,
    {
        Self::with_options(source, engine, RendererOptions::default())
    }

    /// Creates a renderer with explicit options.
    pub fn with_options<S>(source: S, engine: E, options: RendererOptions) -> Self
    where
        S: TemplateSource + 'static,
    {
        Self::with_resolved(Arc::new(source), engine, options.resolve())
    }

    /// Creates a renderer from already-resolved options.
    pub fn with_resolved(
        source: Arc<dyn TemplateSource>,
        engine: E,
        options: ResolvedOptions,
    ) -> Self {
        if options.is_dev {
            engine.set_verbosity(Verbosity::Info);
        }

        let hook = Arc::new(SourceHook::new(source, options.extension.clone()));
        engine.set_request_hook(hook.clone());

        tracing::info!(
            extension = %options.extension,
            is_dev = options.is_dev,
            "template renderer ready"
        );

        Self {
            engine,
            hook,
            options,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn extension(&self) -> &Extension {
        &self.options.extension
    }

    pub fn is_dev(&self) -> bool {
        self.options.is_dev
    }

    /// Appends the configured extension to `name` unless already present.
    pub fn add_extension(&self, name: &str) -> String {
        self.options.extension.apply(name)
    }

    /// Normalizes `name` and loads it from the source, as a render would.
    pub async fn load_template(&self, name: &str) -> Result<Template, SourceError> {
        self.hook.acquire(name).await
    }

    /// Renders `name` with `params`.
    pub async fn render<P>(&self, name: &str, params: &P) -> Result<String, RenderError>
    where
        P: Serialize + ?Sized,
    {
        self.render_with_config(name, params, &EngineConfig::default())
            .await
    }

    /// Renders `name` with `params` and per-call engine options.
    ///
    /// The template is compiled and executed under the name the source
    /// returned, which may differ from the normalized name it was asked for.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Serialization`] if `params` cannot be serialized
    /// - [`RenderError::Lookup`] with the source's error, untouched
    /// - [`RenderError::Engine`] with the engine's compile, register or
    ///   execute error, untouched
    pub async fn render_with_config<P>(
        &self,
        name: &str,
        params: &P,
        _engine_config: &EngineConfig,
    ) -> Result<String, RenderError>
    where
        P: Serialize + ?Sized,
    {
        let result = self.run(name, params).await;
        if let Err(err) = &result {
            tracing::warn!(template = %name, error = %err, "render failed");
        }
        result
    }

    async fn run<P>(&self, name: &str, params: &P) -> Result<String, RenderError>
    where
        P: Serialize + ?Sized,
    {
        let params = serde_json::to_value(params)?;
        let template = self.hook.acquire(name).await?;

        tracing::debug!(template = %template.name, "compiling template");
        let compiled = self.engine.compile(&template.content, &template.name)?;
        self.engine.register_compiled(compiled)?;

        tracing::debug!(template = %template.name, "executing template");
        Ok(self.engine.execute(&template.name, &params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Compile { source: String, identifier: String },
        Register(String),
        Execute { identifier: String, params: serde_json::Value },
    }

    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<Call>>,
        hook: Mutex<Option<Arc<dyn TemplateRequestHook>>>,
        verbosity: Mutex<Verbosity>,
        compile_error: Option<&'static str>,
        execute_error: Option<&'static str>,
    }

    impl RecordingEngine {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn installed_hook(&self) -> Arc<dyn TemplateRequestHook> {
            self.hook.lock().unwrap().clone().expect("hook installed")
        }
    }

    #[async_trait]
    impl TemplateEngine for RecordingEngine {
        type Compiled = String;

        fn compile(&self, source: &str, identifier: &str) -> Result<String, EngineError> {
            self.calls.lock().unwrap().push(Call::Compile {
                source: source.to_string(),
                identifier: identifier.to_string(),
            });
            match self.compile_error {
                Some(msg) => Err(EngineError::Syntax(msg.to_string())),
                None => Ok(format!("compiled:{}", identifier)),
            }
        }

        fn register_compiled(&self, compiled: String) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(Call::Register(compiled));
            Ok(())
        }

        async fn execute(
            &self,
            identifier: &str,
            params: &serde_json::Value,
        ) -> Result<String, EngineError> {
            self.calls.lock().unwrap().push(Call::Execute {
                identifier: identifier.to_string(),
                params: params.clone(),
            });
            match self.execute_error {
                Some(msg) => Err(EngineError::Execution(msg.to_string())),
                None => Ok(format!("rendered:{}", identifier)),
            }
        }

        fn verbosity(&self) -> Verbosity {
            *self.verbosity.lock().unwrap()
        }

        fn set_verbosity(&self, level: Verbosity) {
            *self.verbosity.lock().unwrap() = level;
        }

        fn set_request_hook(&self, hook: Arc<dyn TemplateRequestHook>) {
            *self.hook.lock().unwrap() = Some(hook);
        }
    }

    /// Returns every requested name as both the template name and content.
    #[derive(Default)]
    struct EchoSource {
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TemplateSource for EchoSource {
        async fn load(&self, name: &str) -> Result<Template, SourceError> {
            self.requests.lock().unwrap().push(name.to_string());
            Ok(Template::new(name, name))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TemplateSource for FailingSource {
        async fn load(&self, _name: &str) -> Result<Template, SourceError> {
            Err(SourceError::other("Test"))
        }
    }

    /// Answers every request with a fixed template, whatever name was asked.
    struct RenamingSource;

    #[async_trait]
    impl TemplateSource for RenamingSource {
        async fn load(&self, _name: &str) -> Result<Template, SourceError> {
            Ok(Template::new("canonical.dust", "X"))
        }
    }

    fn quiet() -> RendererOptions {
        RendererOptions::new().dev(false)
    }

    #[test]
    fn test_dev_mode_sets_info_verbosity() {
        let engine = RecordingEngine::default();
        engine.set_verbosity(Verbosity::Warn);
        let renderer = Renderer::with_options(EchoSource::default(), engine, RendererOptions::new().dev(true));
        assert!(renderer.is_dev());
        assert_eq!(renderer.engine().verbosity(), Verbosity::Info);
    }

    #[test]
    fn test_non_dev_leaves_verbosity_untouched() {
        let engine = RecordingEngine::default();
        engine.set_verbosity(Verbosity::Warn);
        let renderer = Renderer::with_options(EchoSource::default(), engine, quiet());
        assert!(!renderer.is_dev());
        assert_eq!(renderer.engine().verbosity(), Verbosity::Warn);
    }

    #[test]
    fn test_construction_installs_hook() {
        let renderer = Renderer::with_options(EchoSource::default(), RecordingEngine::default(), quiet());
        assert!(renderer.engine().hook.lock().unwrap().is_some());
    }

    #[test]
    fn test_add_extension() {
        let renderer = Renderer::with_options(EchoSource::default(), RecordingEngine::default(), quiet());
        assert_eq!(renderer.extension().as_str(), ".dust");
        assert_eq!(renderer.add_extension("fileName"), "fileName.dust");
        assert_eq!(renderer.add_extension("fileName.dust"), "fileName.dust");
    }

    #[tokio::test]
    async fn test_render_pipeline_order_and_arguments() {
        let source = Arc::new(EchoSource::default());
        let renderer = Renderer::with_options(source.clone(), RecordingEngine::default(), quiet());

        let output = renderer.render("home", &json!({ "a": 1 })).await.unwrap();

        assert_eq!(output, "rendered:home.dust");
        assert_eq!(*source.requests.lock().unwrap(), vec!["home.dust".to_string()]);
        assert_eq!(
            renderer.engine().calls(),
            vec![
                Call::Compile {
                    source: "home.dust".into(),
                    identifier: "home.dust".into(),
                },
                Call::Register("compiled:home.dust".into()),
                Call::Execute {
                    identifier: "home.dust".into(),
                    params: json!({ "a": 1 }),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_render_keeps_existing_extension() {
        let source = Arc::new(EchoSource::default());
        let options = quiet().extension(".html");
        let renderer = Renderer::with_options(source.clone(), RecordingEngine::default(), options);

        let output = renderer.render("home.html", &json!({})).await.unwrap();
        assert_eq!(output, "rendered:home.html");
        assert_eq!(*source.requests.lock().unwrap(), vec!["home.html".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_error_skips_engine() {
        let renderer = Renderer::with_options(FailingSource, RecordingEngine::default(), quiet());

        let err = renderer.render("home", &json!({})).await.unwrap_err();
        assert!(err.is_lookup());
        assert_eq!(err.to_string(), "Test");
        assert!(renderer.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_compile_error_skips_register_and_execute() {
        let engine = RecordingEngine {
            compile_error: Some("bad tag"),
            ..Default::default()
        };
        let renderer = Renderer::with_options(EchoSource::default(), engine, quiet());

        let err = renderer.render("home", &json!({})).await.unwrap_err();
        assert!(matches!(err, RenderError::Engine(EngineError::Syntax(ref msg)) if msg == "bad tag"));
        assert_eq!(renderer.engine().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_error_is_forwarded() {
        let engine = RecordingEngine {
            execute_error: Some("boom"),
            ..Default::default()
        };
        let renderer = Renderer::with_options(EchoSource::default(), engine, quiet());

        let err = renderer.render("home", &json!({})).await.unwrap_err();
        assert!(matches!(err, RenderError::Engine(EngineError::Execution(ref msg)) if msg == "boom"));
        assert_eq!(renderer.engine().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_returned_name_is_the_identity() {
        let renderer = Renderer::with_options(RenamingSource, RecordingEngine::default(), quiet());

        let output = renderer.render("home", &json!({})).await.unwrap();
        assert_eq!(output, "rendered:canonical.dust");
        assert!(renderer.engine().calls().contains(&Call::Compile {
            source: "X".into(),
            identifier: "canonical.dust".into(),
        }));
    }

    #[tokio::test]
    async fn test_engine_config_is_ignored() {
        let renderer = Renderer::with_options(EchoSource::default(), RecordingEngine::default(), quiet());
        let mut map = serde_json::Map::new();
        map.insert("cache".into(), json!(false));
        let config = EngineConfig::from(map);
        assert_eq!(config.get("cache"), Some(&json!(false)));

        let with_config = renderer.render_with_config("home", &json!({}), &config).await.unwrap();
        let without = renderer.render("home", &json!({})).await.unwrap();
        assert_eq!(with_config, without);
    }

    #[tokio::test]
    async fn test_hook_matches_render_acquire() {
        let source = Arc::new(EchoSource::default());
        let renderer = Renderer::with_options(source.clone(), RecordingEngine::default(), quiet());
        let hook = renderer.engine().installed_hook();

        let content = hook.request("fileName", &json!({})).await.unwrap();
        let template = renderer.load_template("fileName").await.unwrap();

        assert_eq!(content, "fileName.dust");
        assert_eq!(template.content, content);
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec!["fileName.dust".to_string(), "fileName.dust".to_string()]
        );
    }

    #[tokio::test]
    async fn test_hook_forwards_lookup_error() {
        let renderer = Renderer::with_options(FailingSource, RecordingEngine::default(), quiet());
        let err = renderer
            .engine()
            .installed_hook()
            .request("fileName", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Test");
    }

    #[tokio::test]
    async fn test_unserializable_params() {
        use std::collections::HashMap;

        let renderer = Renderer::with_options(EchoSource::default(), RecordingEngine::default(), quiet());
        let mut params = HashMap::new();
        params.insert((1, 2), "tuple keys are not valid JSON object keys");

        let err = renderer.render("home", &params).await.unwrap_err();
        assert!(matches!(err, RenderError::Serialization(_)));
        assert!(renderer.engine().calls().is_empty());
    }
}
