//! Template sources.
//!
//! A [`TemplateSource`] resolves a fully-qualified template name (extension
//! included) to its raw text. The renderer never caches what a source returns:
//! every render and every partial lookup asks the source again.
//!
//! [`MemorySource`] keeps templates in process memory. It is handy for
//! embedding a fixed template set and for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A template as returned by a [`TemplateSource`].
///
/// `name` is the identifier the renderer compiles and executes under. Sources
/// are expected to echo back the name they were asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub content: String,
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Resolves template names to template text.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Loads the template called `name`.
    async fn load(&self, name: &str) -> Result<Template, SourceError>;
}

#[async_trait]
impl<T: TemplateSource + ?Sized> TemplateSource for Arc<T> {
    async fn load(&self, name: &str) -> Result<Template, SourceError> {
        (**self).load(name).await
    }
}

/// In-memory template source.
///
/// ```rust
/// use quill_render::{MemorySource, TemplateSource};
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let source = MemorySource::new().with_template("home.dust", "Hello, {{ name }}!");
/// let template = source.load("home.dust").await.unwrap();
/// assert_eq!(template.content, "Hello, {{ name }}!");
/// assert!(source.load("missing.dust").await.is_err());
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    templates: RwLock<HashMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_template(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    /// Adds or replaces a template, returning the previous content.
    pub fn insert(&self, name: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), content.into())
    }

    /// Removes a template, returning its content.
    pub fn remove(&self, name: &str) -> Option<String> {
        self.templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
    }

    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> FromIterator<(K, V)> for MemorySource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let templates = iter
            .into_iter()
            .map(|(name, content)| (name.into(), content.into()))
            .collect();
        Self {
            templates: RwLock::new(templates),
        }
    }
}

#[async_trait]
impl TemplateSource for MemorySource {
    async fn load(&self, name: &str) -> Result<Template, SourceError> {
        let templates = self
            .templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        templates
            .get(name)
            .map(|content| Template::new(name, content.as_str()))
            .ok_or_else(|| SourceError::not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_load() {
        let source = MemorySource::new().with_template("home.dust", "Hi");
        let template = source.load("home.dust").await.unwrap();
        assert_eq!(template, Template::new("home.dust", "Hi"));
    }

    #[tokio::test]
    async fn test_memory_source_not_found() {
        let source = MemorySource::new();
        let err = source.load("home.dust").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(name) if name == "home.dust"));
    }

    #[tokio::test]
    async fn test_memory_source_replace_and_remove() {
        let source: MemorySource = [("a.dust", "one")].into_iter().collect();
        assert_eq!(source.insert("a.dust", "two"), Some("one".to_string()));
        assert_eq!(source.load("a.dust").await.unwrap().content, "two");
        assert_eq!(source.remove("a.dust"), Some("two".to_string()));
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_arc_source_delegates() {
        let source: Arc<dyn TemplateSource> =
            Arc::new(MemorySource::new().with_template("x.dust", "X"));
        assert_eq!(source.load("x.dust").await.unwrap().content, "X");
    }
}
