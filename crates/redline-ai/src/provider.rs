//! Embedding provider seam and lazily-initialised provider ownership.
//!
//! The review pipeline depends only on [`EmbeddingProvider`]: batch encode
//! texts into a cosine-comparable space. [`LazyProvider`] owns a provider
//! that is built by an injected factory on first use, so loading a model is
//! deferred until a review actually needs it and tests can substitute stubs.

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),

    #[error("embedding backend failed: {0}")]
    Backend(String),

    #[error("provider returned {got} vectors for {expected} texts")]
    LengthMismatch { expected: usize, got: usize },
}

/// Maps texts to fixed-size dense vectors.
///
/// Output must have one vector per input text, in order, and be
/// deterministic for identical input within a process lifetime.
pub trait EmbeddingProvider {
    /// Human-readable model name, recorded in review metadata.
    fn name(&self) -> &str;

    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).encode(texts)
    }
}

/// Encode `texts`, failing if the provider returns the wrong number of vectors.
pub fn encode_exact<P: EmbeddingProvider + ?Sized>(
    provider: &mut P,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = provider.encode(texts)?;
    if vectors.len() != texts.len() {
        return Err(EmbedError::LengthMismatch {
            expected: texts.len(),
            got: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Builds a provider. Called at most once.
pub type ProviderFactory = Box<dyn FnOnce() -> anyhow::Result<Box<dyn EmbeddingProvider>>>;

/// Provider built on first use from a primary factory, falling back to a
/// secondary factory if the primary fails to load.
pub struct LazyProvider {
    primary: Option<ProviderFactory>,
    fallback: Option<ProviderFactory>,
    inner: Option<Box<dyn EmbeddingProvider>>,
}

impl LazyProvider {
    pub fn new(factory: ProviderFactory) -> Self {
        Self {
            primary: Some(factory),
            fallback: None,
            inner: None,
        }
    }

    /// Use `factory` if the primary provider cannot be constructed.
    pub fn with_fallback(mut self, factory: ProviderFactory) -> Self {
        self.fallback = Some(factory);
        self
    }

    /// Wrap an already-constructed provider.
    pub fn ready(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            primary: None,
            fallback: None,
            inner: Some(provider),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Construct the provider if it has not been built yet.
    pub fn ensure_initialized(&mut self) -> Result<&mut dyn EmbeddingProvider, EmbedError> {
        if self.inner.is_none() {
            self.inner = Some(self.build()?);
        }
        match self.inner.as_deref_mut() {
            Some(provider) => Ok(provider),
            None => Err(EmbedError::Unavailable("provider not constructed".into())),
        }
    }

    fn build(&mut self) -> Result<Box<dyn EmbeddingProvider>, EmbedError> {
        let primary_err = match self.primary.take() {
            Some(factory) => match factory() {
                Ok(provider) => {
                    info!(model = provider.name(), "initialised embedding provider");
                    return Ok(provider);
                }
                Err(e) => Some(e),
            },
            None => None,
        };

        let Some(fallback) = self.fallback.take() else {
            return Err(EmbedError::Unavailable(match primary_err {
                Some(e) => format!("{e:#}"),
                None => "no provider factory".into(),
            }));
        };
        if let Some(e) = &primary_err {
            warn!(error = %format!("{e:#}"), "primary embedding model failed to load, using fallback");
        }
        let provider = fallback().map_err(|e| EmbedError::Unavailable(format!("{e:#}")))?;
        info!(model = provider.name(), "initialised fallback embedding provider");
        Ok(provider)
    }
}

impl EmbeddingProvider for LazyProvider {
    fn name(&self) -> &str {
        self.inner.as_ref().map_or("uninitialised", |p| p.name())
    }

    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let provider = self.ensure_initialized()?;
        encode_exact(provider, texts)
    }
}
