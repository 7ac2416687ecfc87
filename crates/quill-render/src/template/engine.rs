//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait, the capability the
//! [`Renderer`](super::Renderer) drives: compile source text, register the
//! compiled form, execute it by name. The default implementation is
//! [`MiniJinjaEngine`].
//!
//! # Request Hook
//!
//! While executing, an engine may meet a reference to a template it has never
//! registered (`{% include "header" %}`, `{% extends "base" %}`). It resolves
//! those through its [`TemplateRequestHook`]. The hook belongs to the engine
//! instance: installing a new one replaces the old, so an engine should be
//! driven by a single renderer at a time.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use minijinja::{Environment, Value};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, SourceError};

/// Engine verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verbosity {
    #[default]
    None,
    Error,
    Warn,
    Info,
    Debug,
}

impl Verbosity {
    const ALL: [Verbosity; 5] = [
        Verbosity::None,
        Verbosity::Error,
        Verbosity::Warn,
        Verbosity::Info,
        Verbosity::Debug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::None => "NONE",
            Verbosity::Error => "ERROR",
            Verbosity::Warn => "WARN",
            Verbosity::Info => "INFO",
            Verbosity::Debug => "DEBUG",
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(Verbosity::Debug)
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown verbosity level: {}", s))
    }
}

/// Resolves templates an engine needs while executing another template.
#[async_trait]
pub trait TemplateRequestHook: Send + Sync {
    /// Returns the raw content of the template called `name`.
    ///
    /// `params` carries the engine's render parameters where it has them;
    /// implementations may ignore it.
    async fn request(&self, name: &str, params: &serde_json::Value) -> Result<String, SourceError>;
}

/// A template engine that compiles, registers and executes named templates.
///
/// Compilation and registration are synchronous; execution is asynchronous
/// because it may have to fetch partials through the request hook.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Opaque executable form produced by [`compile`](Self::compile).
    type Compiled: Send;

    /// Compiles `source` into an executable form identified by `identifier`.
    fn compile(&self, source: &str, identifier: &str) -> Result<Self::Compiled, EngineError>;

    /// Registers a compiled template, replacing any template of the same name.
    fn register_compiled(&self, compiled: Self::Compiled) -> Result<(), EngineError>;

    /// Executes the registered template `identifier` with `params`.
    async fn execute(
        &self,
        identifier: &str,
        params: &serde_json::Value,
    ) -> Result<String, EngineError>;

    fn verbosity(&self) -> Verbosity;

    fn set_verbosity(&self, level: Verbosity);

    /// Installs the hook used to resolve unregistered templates.
    ///
    /// Replaces any previously installed hook.
    fn set_request_hook(&self, hook: Arc<dyn TemplateRequestHook>);
}

/// A template that passed syntax checking, ready for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    name: String,
    source: String,
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }
}

type Configurator = Arc<dyn Fn(&mut Environment<'static>) + Send + Sync>;

/// Registered template sources and environment customizations.
///
/// `templates` is copied on write so an execution in flight keeps the set it
/// started with.
#[derive(Default)]
struct Registry {
    templates: Arc<BTreeMap<String, String>>,
    configurators: Vec<Configurator>,
}

/// Templates requested during one execution.
#[derive(Default)]
struct Resolution {
    fetched: HashMap<String, String>,
    absent: HashSet<String>,
    pending: Vec<String>,
}

/// MiniJinja-based template engine.
///
/// Templates use Jinja2 syntax. Registered templates are kept as source text;
/// each execution builds its own MiniJinja environment over a snapshot of
/// them, so registering while another template executes never waits on it.
///
/// Templates the snapshot does not know are fetched through the installed
/// [`TemplateRequestHook`]. MiniJinja's loader is synchronous, so it only
/// records the missing name; the engine then awaits the hook and renders
/// again with the fetched content. Fetched partials belong to that single
/// execution and are requested again next time. Rendering itself runs on
/// tokio's blocking pool, so [`execute`](TemplateEngine::execute) must be
/// called from within a tokio runtime of either flavor.
///
/// At [`Verbosity::Info`] and above MiniJinja's debug mode is enabled (richer
/// error reports) and the engine emits `tracing` events for executions and
/// hook requests.
///
/// # Example
///
/// ```rust
/// use quill_render::{MiniJinjaEngine, TemplateEngine};
/// use serde_json::json;
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let engine = MiniJinjaEngine::new();
/// let compiled = engine.compile("Hello, {{ name }}!", "greeting").unwrap();
/// engine.register_compiled(compiled).unwrap();
///
/// let output = engine.execute("greeting", &json!({ "name": "World" })).await.unwrap();
/// assert_eq!(output, "Hello, World!");
/// # });
/// ```
pub struct MiniJinjaEngine {
    registry: RwLock<Registry>,
    hook: RwLock<Option<Arc<dyn TemplateRequestHook>>>,
    verbosity: AtomicU8,
}

impl MiniJinjaEngine {
    /// Creates an engine with no templates and no request hook.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            hook: RwLock::new(None),
            verbosity: AtomicU8::new(Verbosity::None as u8),
        }
    }

    /// Adds a customization applied to every execution environment, e.g. to
    /// register filters or functions.
    pub fn configure<F>(&self, f: F)
    where
        F: Fn(&mut Environment<'static>) + Send + Sync + 'static,
    {
        write(&self.registry).configurators.push(Arc::new(f));
    }

    /// Returns `true` if `name` is registered.
    ///
    /// Never consults the request hook.
    pub fn has_template(&self, name: &str) -> bool {
        read(&self.registry).templates.contains_key(name)
    }

    /// Drops every registered template.
    pub fn clear_templates(&self) {
        write(&self.registry).templates = Arc::default();
    }

    fn environment(&self, resolution: Arc<Mutex<Resolution>>) -> Environment<'static> {
        let (templates, configurators) = {
            let registry = read(&self.registry);
            (Arc::clone(&registry.templates), registry.configurators.clone())
        };

        let mut env = Environment::new();
        env.set_debug(self.verbosity() >= Verbosity::Info);
        for configure in &configurators {
            configure(&mut env);
        }
        env.set_loader(resolving_loader(templates, resolution));
        env
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MiniJinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaEngine")
            .field("verbosity", &self.verbosity())
            .field("templates", &read(&self.registry).templates.len())
            .field("hook_installed", &read(&self.hook).is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TemplateEngine for MiniJinjaEngine {
    type Compiled = CompiledTemplate;

    fn compile(&self, source: &str, identifier: &str) -> Result<CompiledTemplate, EngineError> {
        // Parse in a throwaway environment so syntax errors surface before
        // anything is registered.
        let scratch = Environment::new();
        scratch.template_from_named_str(identifier, source)?;

        Ok(CompiledTemplate {
            name: identifier.to_string(),
            source: source.to_string(),
        })
    }

    fn register_compiled(&self, compiled: CompiledTemplate) -> Result<(), EngineError> {
        let mut registry = write(&self.registry);
        Arc::make_mut(&mut registry.templates).insert(compiled.name, compiled.source);
        Ok(())
    }

    async fn execute(
        &self,
        identifier: &str,
        params: &serde_json::Value,
    ) -> Result<String, EngineError> {
        let chatty = self.verbosity() >= Verbosity::Info;
        let debug = self.verbosity() >= Verbosity::Debug;
        let hook = read(&self.hook).clone();
        let resolution: Arc<Mutex<Resolution>> = Arc::default();
        let env = Arc::new(self.environment(Arc::clone(&resolution)));

        if chatty {
            tracing::info!(template = %identifier, "executing template");
        }

        loop {
            let task_env = Arc::clone(&env);
            let name = identifier.to_string();
            let value = params.clone();
            let result = tokio::task::spawn_blocking(move || -> Result<String, minijinja::Error> {
                let template = task_env.get_template(&name)?;
                template.render(Value::from_serialize(&value))
            })
            .await
            .map_err(|err| EngineError::Execution(format!("render task failed: {}", err)))?;

            let mut pending = std::mem::take(&mut lock(&resolution).pending);
            pending.sort();
            pending.dedup();

            let hook = match &hook {
                Some(hook) if !pending.is_empty() => hook,
                _ => {
                    let result = result.map_err(EngineError::from);
                    if chatty {
                        if let Err(err) = &result {
                            tracing::warn!(template = %identifier, error = %err, "template execution failed");
                        }
                    }
                    return result;
                }
            };

            for name in pending {
                if debug {
                    tracing::debug!(template = %name, "requesting template through hook");
                }
                match hook.request(&name, params).await {
                    Ok(content) => {
                        lock(&resolution).fetched.insert(name, content);
                    }
                    Err(SourceError::NotFound(_)) => {
                        lock(&resolution).absent.insert(name);
                    }
                    Err(source) => return Err(EngineError::Lookup { name, source }),
                }
            }
        }
    }

    fn verbosity(&self) -> Verbosity {
        Verbosity::from_u8(self.verbosity.load(Ordering::Relaxed))
    }

    fn set_verbosity(&self, level: Verbosity) {
        self.verbosity.store(level as u8, Ordering::Relaxed);
    }

    fn set_request_hook(&self, hook: Arc<dyn TemplateRequestHook>) {
        *write(&self.hook) = Some(hook);
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builds the MiniJinja loader for one execution.
///
/// Serves registered templates and partials fetched so far. Any other name is
/// queued for the hook and reported missing; names the hook could not find
/// stay missing.
fn resolving_loader(
    templates: Arc<BTreeMap<String, String>>,
    resolution: Arc<Mutex<Resolution>>,
) -> impl Fn(&str) -> Result<Option<String>, minijinja::Error> + Send + Sync + 'static {
    move |name: &str| -> Result<Option<String>, minijinja::Error> {
        if let Some(source) = templates.get(name) {
            return Ok(Some(source.clone()));
        }
        let mut resolution = lock(&resolution);
        if let Some(content) = resolution.fetched.get(name) {
            return Ok(Some(content.clone()));
        }
        if !resolution.absent.contains(name) {
            resolution.pending.push(name.to_string());
        }
        Ok(None)
    }
}
