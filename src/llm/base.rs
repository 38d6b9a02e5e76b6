use crate::cache::{Cache, CacheKey, llm_string};
use crate::callbacks::{CallbackHandler, CallbackManager, ModelInfo};
use crate::llm::core::{
    CallOptions, Generation, LLM, LLMError, LLMResult, ProviderError, SerializedLLM, TYPE_KEY,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The LLM invocation orchestrator.
///
/// Wraps a provider and coordinates cache lookups, live invocations, callback
/// notifications and result assembly. Build one per model configuration and
/// share it behind an `Arc`; every method takes `&self`.
///
/// Caching follows `use_cache`:
///
/// * `None` (default): cache when a cache was supplied, otherwise call through;
/// * `Some(true)`: cache, and fail with [`LLMError::Configuration`] if none was supplied;
/// * `Some(false)`: never cache.
///
/// # Examples
///
/// ```rust
/// use forgechain::cache::InMemoryCache;
/// use forgechain::llm::{BaseLLM, CallOptions, FakeLLM};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), forgechain::llm::LLMError> {
/// let llm = BaseLLM::new(Arc::new(FakeLLM::default()))
///     .with_cache(Arc::new(InMemoryCache::new()));
///
/// let text = llm.call("Say hello world.", None, &CallOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BaseLLM {
    llm: Arc<dyn LLM>,
    callbacks: CallbackManager,
    cache: Option<Arc<dyn Cache>>,
    use_cache: Option<bool>,
    verbose: bool,
}

impl BaseLLM {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self {
            llm,
            callbacks: CallbackManager::default(),
            cache: None,
            use_cache: None,
            verbose: true,
        }
    }

    pub fn with_callbacks(mut self, callbacks: CallbackManager) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Shares `cache` with this orchestrator.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Forces caching on or off, see the type-level docs.
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Whether callbacks should report generated text in detail.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LLM> {
        &self.llm
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    /// The provider's identifying parameters plus its `_type` discriminator.
    pub fn serialize(&self) -> SerializedLLM {
        let mut serialized = self.llm.identifying_params();
        serialized.insert(TYPE_KEY.to_string(), Value::from(self.llm.llm_type()));
        serialized
    }

    /// Runs the model on a batch of prompts, serving what it can from the cache.
    ///
    /// Only prompts missing from the cache reach the provider, in a single
    /// batched call with each distinct prompt sent once; their results are
    /// written back to the cache and spliced into place, so the returned
    /// generations line up with `prompts`. An empty batch yields an empty
    /// result without touching the provider. A provider failure fails the
    /// whole batch.
    pub async fn generate(
        &self,
        prompts: &[String],
        stop: Option<&[String]>,
        options: &CallOptions,
    ) -> Result<LLMResult, LLMError> {
        if prompts.is_empty() {
            return Ok(LLMResult::default());
        }

        let cache = match (&self.cache, self.use_cache) {
            (None, Some(true)) => {
                return Err(LLMError::Configuration(
                    "caching was requested but no cache is configured".to_string(),
                ));
            }
            (Some(cache), None | Some(true)) => cache,
            _ => return self.generate_uncached(prompts, stop, options).await,
        };

        let llm_string = llm_string(&self.serialize(), stop);
        let keys: Vec<CacheKey> = prompts
            .iter()
            .map(|prompt| CacheKey::new(&llm_string, prompt))
            .collect();

        let mut generations: Vec<Option<Vec<Generation>>> = Vec::with_capacity(prompts.len());
        // One group per distinct missed key, holding every index it occupies.
        let mut missing: Vec<Vec<usize>> = Vec::new();
        let mut group_of: HashMap<&CacheKey, usize> = HashMap::new();
        for (index, key) in keys.iter().enumerate() {
            let cached = cache.lookup(key).await;
            if cached.is_none() {
                match group_of.get(key) {
                    Some(&group) => missing[group].push(index),
                    None => {
                        group_of.insert(key, missing.len());
                        missing.push(vec![index]);
                    }
                }
            }
            generations.push(cached);
        }
        let miss_count: usize = missing.iter().map(Vec::len).sum();
        debug!(
            model = %self.llm.llm_type(),
            hits = prompts.len() - miss_count,
            misses = miss_count,
            distinct_misses = missing.len(),
            "Checked LLM cache"
        );

        let mut llm_output = None;
        if !missing.is_empty() {
            let missing_prompts: Vec<String> = missing
                .iter()
                .map(|group| prompts[group[0]].clone())
                .collect();
            let fresh = self
                .generate_uncached(&missing_prompts, stop, options)
                .await?;
            for (group, generation) in missing.iter().zip(fresh.generations) {
                cache.update(keys[group[0]].clone(), generation.clone()).await;
                for &index in group {
                    generations[index] = Some(generation.clone());
                }
            }
            llm_output = fresh.llm_output;
        }

        let generations = generations
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(LLMError::GenerationCountMismatch {
                expected: prompts.len(),
                actual: prompts.len() - miss_count,
            })?;

        Ok(LLMResult {
            generations,
            llm_output,
        })
    }

    /// Runs the model on a single prompt and returns the first generated text.
    pub async fn call(
        &self,
        prompt: &str,
        stop: Option<&[String]>,
        options: &CallOptions,
    ) -> Result<String, LLMError> {
        let result = self
            .generate(&[prompt.to_string()], stop, options)
            .await?;
        result
            .generations
            .into_iter()
            .next()
            .and_then(|generations| generations.into_iter().next())
            .map(|generation| generation.text)
            .ok_or(LLMError::EmptyGeneration)
    }

    /// Invokes the provider, bracketed by the start and end/error callbacks.
    ///
    /// A provider error is reported to the error callback and then returned
    /// unchanged inside [`LLMError::Provider`].
    async fn generate_uncached(
        &self,
        prompts: &[String],
        stop: Option<&[String]>,
        options: &CallOptions,
    ) -> Result<LLMResult, LLMError> {
        let info = ModelInfo {
            name: self.llm.llm_type().to_string(),
            serialized: self.serialize(),
        };
        debug!(model = %info.name, prompt_count = prompts.len(), "Invoking LLM provider");
        self.callbacks.on_llm_start(&info, prompts, self.verbose);

        let call = self.llm.generate(prompts, stop, options);
        let outcome = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ProviderError::Timeout(limit))),
            None => call.await,
        };

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                self.callbacks.on_llm_error(&e.to_string(), self.verbose);
                return Err(LLMError::Provider(e));
            }
        };

        if output.generations.len() != prompts.len() {
            let error = LLMError::GenerationCountMismatch {
                expected: prompts.len(),
                actual: output.generations.len(),
            };
            self.callbacks.on_llm_error(&error.to_string(), self.verbose);
            return Err(error);
        }

        self.callbacks.on_llm_end(&output, self.verbose);
        Ok(output)
    }
}

impl fmt::Debug for BaseLLM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseLLM")
            .field("llm_type", &self.llm.llm_type())
            .field("callbacks", &self.callbacks)
            .field("cached", &self.cache.is_some())
            .field("use_cache", &self.use_cache)
            .field("verbose", &self.verbose)
            .finish()
    }
}
