use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            embedding: EmbeddingConfig {
                provider: EmbeddingProviderKind::Ollama,
                model: "nomic-embed-text".to_string(),
                api_base: "http://embedder:11434".to_string(),
                dimension: 768,
                ..EmbeddingConfig::default()
            },
            generation: GenerationConfig {
                provider: GenerationProviderKind::Ollama,
                model: "llama3:8b".to_string(),
                api_base: "http://embedder:11434/v1".to_string(),
                ..GenerationConfig::default()
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [embedding
            model = "text-embedding-3-small"
            dimension = "large"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let toml_str = r#"
            [generation]
            provider = "cohere"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [vector_store]
            collection = "my_graph"
        "#;

        let config: Config = toml::from_str(partial_toml).expect("should parse partial toml");
        assert_eq!(config.vector_store.collection, "my_graph");
        assert_eq!(config.vector_store.backend, VectorBackend::Local);
        assert_eq!(config.embedding, EmbeddingConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidScheme("ftp".to_string()),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}
