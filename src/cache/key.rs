//! Cache key generation.

use crate::llm::SerializedLLM;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Deterministic fingerprint of a model configuration and a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprints `prompt` under the configuration described by `llm_string`.
    pub fn new(llm_string: &str, prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        // Length-prefix the configuration so no two (config, prompt) pairs
        // concatenate to the same bytes.
        hasher.update((llm_string.len() as u64).to_be_bytes());
        hasher.update(llm_string.as_bytes());
        hasher.update(prompt.as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical string for a model configuration and its stop sequences.
///
/// The serialized parameters are emitted with their keys sorted and a `stop`
/// entry added (`null` when no stop sequences were given). It is computed once
/// per `generate` call and shared by every prompt in the batch.
pub fn llm_string(serialized: &SerializedLLM, stop: Option<&[String]>) -> String {
    let stop = stop.map_or(Value::Null, |stop| Value::from(stop.to_vec()));
    let mut params: BTreeMap<&str, &Value> = serialized
        .iter()
        .map(|(name, value)| (name.as_str(), value))
        .collect();
    params.insert("stop", &stop);
    serde_json::to_string(&params).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn serialized(value: Value) -> SerializedLLM {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn llm_string_sorts_parameters_and_adds_stop() {
        let params = serialized(json!({"temperature": 0, "model": "fake", "_type": "fake"}));

        assert_eq!(
            llm_string(&params, None),
            r#"{"_type":"fake","model":"fake","stop":null,"temperature":0}"#
        );

        let stop = vec!["\n".to_string()];
        assert_eq!(
            llm_string(&params, Some(&stop)),
            r#"{"_type":"fake","model":"fake","stop":["\n"],"temperature":0}"#
        );
    }

    #[test]
    fn keys_are_deterministic() {
        let a = CacheKey::new("{}", "Say hello world.");
        let b = CacheKey::new("{}", "Say hello world.");

        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn keys_differ_by_prompt_and_configuration() {
        let params = serialized(json!({"model": "fake", "temperature": 0}));
        let warm = serialized(json!({"model": "fake", "temperature": 1}));
        let base = llm_string(&params, None);

        assert_ne!(CacheKey::new(&base, "a"), CacheKey::new(&base, "b"));
        assert_ne!(
            CacheKey::new(&base, "a"),
            CacheKey::new(&llm_string(&warm, None), "a")
        );
        let stop = vec!["END".to_string()];
        assert_ne!(
            CacheKey::new(&base, "a"),
            CacheKey::new(&llm_string(&params, Some(&stop)), "a")
        );
    }

    #[test]
    fn boundary_between_configuration_and_prompt_matters() {
        assert_ne!(CacheKey::new("ab", "c"), CacheKey::new("a", "bc"));
    }
}
