use forgechain::cache::{Cache, FileCache, InMemoryCache};
use forgechain::callbacks::{CallbackManager, RunCollector, RunStatus};
use forgechain::llm::{
    BaseLLM, CallOptions, FakeLLM, FakeParams, LLMError, LLMFactory, ProviderError,
    ProviderRegistry, RetryConfig, RetryStrategy,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn prompts(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|text| text.to_string()).collect()
}

fn hello_world_model() -> FakeLLM {
    FakeLLM::from_params(
        json!({"model": "fake", "temperature": 0})
            .as_object()
            .cloned()
            .unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn repeated_prompt_reaches_provider_once() {
    let fake = hello_world_model();
    let llm = BaseLLM::new(Arc::new(fake.clone())).with_cache(Arc::new(InMemoryCache::new()));
    let batch = prompts(&["Say hello world."]);

    let first = llm.generate(&batch, None, &CallOptions::default()).await.unwrap();
    assert_eq!(fake.calls(), 1);

    let second = llm.generate(&batch, None, &CallOptions::default()).await.unwrap();
    assert_eq!(fake.calls(), 1);
    assert_eq!(first.generations, second.generations);
}

#[tokio::test]
async fn call_matches_first_generation() {
    let llm = BaseLLM::new(Arc::new(FakeLLM::default()));
    let options = CallOptions::default();

    let text = llm.call("p", None, &options).await.unwrap();
    let result = llm.generate(&prompts(&["p"]), None, &options).await.unwrap();

    assert_eq!(text, result.generations[0][0].text);
}

#[tokio::test]
async fn cached_entries_are_spliced_in_prompt_order() {
    let fake = FakeLLM::default().with_responses(["b-cached", "a-fresh", "c-fresh"]);
    let llm = BaseLLM::new(Arc::new(fake.clone())).with_cache(Arc::new(InMemoryCache::new()));
    let options = CallOptions::default();
    llm.generate(&prompts(&["b"]), None, &options).await.unwrap();

    let result = llm
        .generate(&prompts(&["a", "b", "c"]), None, &options)
        .await
        .unwrap();

    let texts: Vec<&str> = result
        .generations
        .iter()
        .map(|generations| generations[0].text.as_str())
        .collect();
    assert_eq!(texts, vec!["a-fresh", "b-cached", "c-fresh"]);
    assert_eq!(fake.seen_prompts(), vec!["b", "a", "c"]);
}

#[tokio::test]
async fn provider_failure_is_reported_once_and_returned() {
    let collector = Arc::new(RunCollector::new());
    let llm = BaseLLM::new(Arc::new(FakeLLM::default().failing("quota exceeded")))
        .with_callbacks(CallbackManager::new().with_handler(collector.clone()));

    let result = llm
        .generate(&prompts(&["x", "y"]), None, &CallOptions::default())
        .await;

    match result {
        Err(LLMError::Provider(ProviderError::Request(message))) => {
            assert_eq!(message, "quota exceeded")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    let runs = collector.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(
        runs[0].error.as_deref(),
        Some("provider request failed: quota exceeded")
    );
}

#[tokio::test]
async fn file_cache_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let batch = prompts(&["Say hello world."]);

    let fake = hello_world_model();
    let cache: Arc<dyn Cache> = Arc::new(FileCache::open(&path).await.unwrap());
    let llm = BaseLLM::new(Arc::new(fake.clone())).with_cache(cache);
    let first = llm.generate(&batch, None, &CallOptions::default()).await.unwrap();
    assert_eq!(fake.calls(), 1);

    let reopened_fake = hello_world_model();
    let reopened: Arc<dyn Cache> = Arc::new(FileCache::open(&path).await.unwrap());
    let llm = BaseLLM::new(Arc::new(reopened_fake.clone())).with_cache(reopened);
    let second = llm.generate(&batch, None, &CallOptions::default()).await.unwrap();

    assert_eq!(reopened_fake.calls(), 0);
    assert_eq!(first.generations, second.generations);
}

#[tokio::test]
async fn retrying_provider_still_hits_the_cache() {
    let fake = FakeLLM::default();
    let config = RetryConfig::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(5),
        RetryStrategy::Fixed,
    );
    let provider = LLMFactory::create(Arc::new(fake.clone()), Some(config));
    let llm = BaseLLM::new(provider).with_cache(Arc::new(InMemoryCache::new()));

    llm.call("ping", None, &CallOptions::default()).await.unwrap();
    llm.call("ping", None, &CallOptions::default()).await.unwrap();

    assert_eq!(fake.calls(), 1);
}

#[test]
fn serialized_model_round_trips_through_the_registry() {
    let registry = ProviderRegistry::with_defaults();
    let llm = BaseLLM::new(Arc::new(FakeLLM::new(FakeParams {
        model: "fake".to_string(),
        temperature: 0.0,
    })));

    let serialized = Value::Object(llm.serialize());
    let restored = BaseLLM::new(registry.deserialize(&serialized).unwrap());

    assert_eq!(Value::Object(restored.serialize()), serialized);
}

#[test]
fn unknown_provider_type_cannot_be_loaded() {
    let registry = ProviderRegistry::with_defaults();

    let result = registry.deserialize(&json!({"_type": "mystery"}));

    assert!(matches!(result, Err(LLMError::UnknownProviderType(t)) if t == "mystery"));
}
