// Configuration management module
// Loads, validates and persists the TOML settings for providers and the vector store

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DEFAULT_COLLECTION, DEFAULT_TOP_K, EmbeddingConfig, EmbeddingProviderKind,
    GenerationConfig, GenerationProviderKind, RetrievalConfig, VectorBackend, VectorStoreConfig,
};
