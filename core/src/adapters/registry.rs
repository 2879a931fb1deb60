//! Instance-scoped adapter registry — not a process singleton, per spec
//! §9's "no global singletons" note. One registry is owned by each
//! session.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::ProviderAdapter;
use crate::adapters::anthropic::AnthropicAdapter;
use crate::adapters::gemini::GeminiAdapter;
use crate::adapters::openai_compatible::OpenAiCompatibleAdapter;

pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { adapters: HashMap::new() }
    }

    pub fn register(&mut self, key: &'static str, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(key, adapter);
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    /// `openai_compatible` shared across OpenAI, DeepSeek, Kimi, Zhipu;
    /// dedicated `anthropic` and `gemini` adapters.
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        for provider in ["openai", "deepseek", "kimi", "zhipu"] {
            registry.register(provider, Arc::new(OpenAiCompatibleAdapter::new(provider)));
        }
        registry.register("anthropic", Arc::new(AnthropicAdapter));
        registry.register("gemini", Arc::new(GeminiAdapter));
        registry
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_default_providers()
    }
}
