//! Model identifier routing
//!
//! Identifiers follow the `provider/model` convention. A bare name is an
//! OpenAI model.

use crate::clients::traits::ProviderError;
use crate::config::{Config, ProviderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

/// A model identifier split into the endpoint family and the wire name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub kind: ProviderKind,
    pub name: String,
}

impl ModelRoute {
    pub fn parse(model: &str) -> Result<Self, ProviderError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ProviderError::UnsupportedModel(
                "model identifier cannot be empty".to_string(),
            ));
        }

        let (kind, name) = match model.split_once('/') {
            Some(("ollama", name)) => (ProviderKind::Ollama, name),
            Some(("openai", name)) => (ProviderKind::OpenAi, name),
            Some((prefix, _)) => {
                return Err(ProviderError::UnsupportedModel(format!(
                    "unknown provider prefix '{}' in '{}'",
                    prefix, model
                )));
            }
            None => (ProviderKind::OpenAi, model),
        };

        if name.is_empty() {
            return Err(ProviderError::UnsupportedModel(format!(
                "missing model name in '{}'",
                model
            )));
        }

        Ok(Self {
            kind,
            name: name.to_string(),
        })
    }

    /// Base URL of the chat-completions endpoint for this route
    pub fn base_url<'a>(&self, provider: &'a ProviderConfig) -> &'a str {
        match self.kind {
            ProviderKind::OpenAi => &provider.openai_base_url,
            ProviderKind::Ollama => &provider.ollama_base_url,
        }
    }
}

/// Check the model can be served with the current configuration
///
/// Returns the route and a human-readable status line.
pub fn check_model_support(model: &str, config: &Config) -> Result<(ModelRoute, String), ProviderError> {
    let route = ModelRoute::parse(model)?;
    match route.kind {
        ProviderKind::OpenAi if config.runtime.openai_api_key.is_none() => {
            Err(ProviderError::UnsupportedModel(format!(
                "'{}' needs OPENAI_API_KEY to be set",
                model
            )))
        }
        ProviderKind::OpenAi => {
            let message = format!("Using OpenAI model '{}'", route.name);
            Ok((route, message))
        }
        ProviderKind::Ollama => {
            let message = format!(
                "Using Ollama model '{}' at {}",
                route.name, config.provider.ollama_base_url
            );
            Ok((route, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes() {
        let ollama = ModelRoute::parse("ollama/qwq").unwrap();
        assert_eq!(ollama.kind, ProviderKind::Ollama);
        assert_eq!(ollama.name, "qwq");

        let prefixed = ModelRoute::parse("openai/gpt-4o").unwrap();
        assert_eq!(prefixed.kind, ProviderKind::OpenAi);
        assert_eq!(prefixed.name, "gpt-4o");

        let bare = ModelRoute::parse("gpt-3.5-turbo").unwrap();
        assert_eq!(bare.kind, ProviderKind::OpenAi);
        assert_eq!(bare.name, "gpt-3.5-turbo");
    }

    #[test]
    fn test_parse_rejects_bad_identifiers() {
        assert!(ModelRoute::parse("").is_err());
        assert!(ModelRoute::parse("   ").is_err());
        assert!(ModelRoute::parse("ollama/").is_err());
        let err = ModelRoute::parse("vertex/gemini").unwrap_err();
        assert!(err.to_string().contains("vertex"));
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = Config::default();
        config.runtime.openai_api_key = None;
        assert!(check_model_support("gpt-4o", &config).is_err());

        config.runtime.openai_api_key = Some("sk-test".into());
        let (route, message) = check_model_support("gpt-4o", &config).unwrap();
        assert_eq!(route.base_url(&config.provider), "https://api.openai.com/v1");
        assert!(message.contains("gpt-4o"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = Config::default();
        let (route, _) = check_model_support("ollama/llama3", &config).unwrap();
        assert_eq!(route.base_url(&config.provider), "http://127.0.0.1:11434/v1");
    }
}
