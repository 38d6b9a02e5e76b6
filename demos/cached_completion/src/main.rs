// This demo runs a prompt chain twice against a fake model; the second run is served from the cache.

use forgechain::{
    callbacks::{CallbackManager, RunCollector, TracingHandler},
    chains::LlmChain,
    config::{CacheBackend, Settings},
    llm::{CallOptions, FakeLLM, FakeParams},
    prompts::PromptTemplate,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    // Initialize the logger.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting forgechain demo");

    // Load settings, falling back to an in-memory cache when none is configured.
    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            return;
        }
    };
    if settings.cache.backend == CacheBackend::None {
        settings.cache.backend = CacheBackend::Memory;
    }

    let model = FakeLLM::new(FakeParams {
        model: "fake".to_string(),
        temperature: 0.0,
    });
    let runs = Arc::new(RunCollector::new());
    let callbacks = CallbackManager::new()
        .with_handler(Arc::new(TracingHandler::new()))
        .with_handler(runs.clone());

    let llm = match settings.build_llm(Arc::new(model.clone())).await {
        Ok(llm) => llm.with_callbacks(callbacks),
        Err(e) => {
            error!(error = %e, "Failed to build the model");
            return;
        }
    };

    for round in 1..=2 {
        match llm.call("Say hello world.", None, &CallOptions::default()).await {
            Ok(text) => info!(round, provider_calls = model.calls(), "Answer: {}", text),
            Err(e) => error!(round, error = %e, "Completion failed"),
        }
    }

    let prompt = match PromptTemplate::new("Write a haiku about {{topic}}.", ["topic"]) {
        Ok(prompt) => prompt,
        Err(e) => {
            error!(error = %e, "Invalid prompt template");
            return;
        }
    };
    let chain = LlmChain::new(Arc::new(llm), prompt);
    let topics = [json!({"topic": "Rust"}), json!({"topic": "caches"})];
    for _ in 0..2 {
        match chain.apply(&topics).await {
            Ok(haikus) => info!(provider_calls = model.calls(), "Haikus: {:?}", haikus),
            Err(e) => error!(error = %e, "Chain failed"),
        }
    }

    info!(recorded_runs = runs.runs().len(), "forgechain demo finished");
}
