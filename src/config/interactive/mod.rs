
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{
    Config, EmbeddingConfig, EmbeddingProviderKind, GenerationConfig, GenerationProviderKind,
    VectorBackend, VectorStoreConfig,
};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Graph RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Generation Provider").bold().yellow());
    configure_generation(&mut config.generation)?;

    eprintln!();
    eprintln!("{}", style("Vector Store").bold().yellow());
    configure_vector_store(&mut config.vector_store)?;

    config
        .validate()
        .context("Configuration is invalid, not saving")?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_endpoint(&config.embedding.api_base) {
        eprintln!("{}", style("✓ Embedding endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding endpoint").yellow()
        );
        eprintln!("You can continue, but make sure the provider is reachable before indexing.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!(
        "  Provider: {}",
        style(config.embedding.provider.label()).cyan()
    );
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  API base: {}", style(&config.embedding.api_base).cyan());
    eprintln!(
        "  API key: {}",
        style(mask_secret(&config.embedding.api_key)).cyan()
    );
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!(
        "  Provider: {}",
        style(config.generation.provider.label()).cyan()
    );
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!("  API base: {}", style(&config.generation.api_base).cyan());
    eprintln!(
        "  API key: {}",
        style(mask_secret(&config.generation.api_key)).cyan()
    );
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );
    eprintln!("  Max tokens: {}", style(config.generation.max_tokens).cyan());

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    let backend = match config.vector_store.backend {
        VectorBackend::Local => "local (in-memory)",
        VectorBackend::Remote => "remote (qdrant)",
    };
    eprintln!("  Backend: {}", style(backend).cyan());
    eprintln!(
        "  Collection: {}",
        style(&config.vector_store.collection).cyan()
    );
    if config.vector_store.backend == VectorBackend::Remote {
        eprintln!("  URL: {}", style(&config.vector_store.url).cyan());
        eprintln!(
            "  API key: {}",
            style(mask_secret(&config.vector_store.api_key)).cyan()
        );
    }
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let dir = Config::config_dir().context("Failed to locate configuration directory")?;
    Config::load(&dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

/// Hide all but a short prefix of a credential
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(not set)".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    if prefix.len() == secret.len() {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers = [EmbeddingProviderKind::OpenAi, EmbeddingProviderKind::Ollama];
    let labels = providers.map(|p| p.label());
    let default_index = providers
        .iter()
        .position(|&p| p == embedding.provider)
        .unwrap_or(0);

    let provider = providers[Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(&labels)
        .interact()?];

    let default_base = if provider == embedding.provider {
        embedding.api_base.clone()
    } else {
        provider.default_api_base().to_string()
    };

    embedding.api_base = prompt_url("Embedding API base URL", default_base)?;
    embedding.model = prompt_non_empty("Embedding model", embedding.model.clone())?;
    embedding.dimension = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 8192")
            }
        })
        .interact_text()?;
    embedding.batch_size = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    if provider == EmbeddingProviderKind::OpenAi {
        embedding.api_key = prompt_secret("Embedding API key", &embedding.api_key)?;
    }
    embedding.provider = provider;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let providers = [
        GenerationProviderKind::OpenAi,
        GenerationProviderKind::Anthropic,
        GenerationProviderKind::Ollama,
    ];
    let labels = providers.map(|p| p.label());
    let default_index = providers
        .iter()
        .position(|&p| p == generation.provider)
        .unwrap_or(0);

    let provider = providers[Select::new()
        .with_prompt("Generation provider")
        .default(default_index)
        .items(&labels)
        .interact()?];

    let default_base = if provider == generation.provider {
        generation.api_base.clone()
    } else {
        provider.default_api_base().to_string()
    };

    generation.api_base = prompt_url("Generation API base URL", default_base)?;
    generation.model = prompt_non_empty("Generation model", generation.model.clone())?;
    if provider != GenerationProviderKind::Ollama {
        generation.api_key = prompt_secret("Generation API key", &generation.api_key)?;
    }
    generation.provider = provider;

    Ok(())
}

fn configure_vector_store(store: &mut VectorStoreConfig) -> Result<()> {
    let backends = ["local (in-memory)", "remote (qdrant)"];
    let default_index = usize::from(store.backend == VectorBackend::Remote);
    let choice = Select::new()
        .with_prompt("Vector store backend")
        .default(default_index)
        .items(&backends)
        .interact()?;

    store.backend = if choice == 0 {
        VectorBackend::Local
    } else {
        VectorBackend::Remote
    };

    store.collection = Input::new()
        .with_prompt("Collection name")
        .default(store.collection.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if !input.is_empty()
                && input
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                Ok(())
            } else {
                Err("Use letters, digits, '-' and '_' only")
            }
        })
        .interact_text()?;

    if store.backend == VectorBackend::Remote {
        store.url = prompt_url("Qdrant URL", store.url.clone())?;
        store.api_key = prompt_secret("Qdrant API key", &store.api_key)?;
    }

    Ok(())
}

fn prompt_url(prompt: &str, default: String) -> Result<String> {
    let value = Input::new()
        .with_prompt(prompt)
        .default(default)
        .validate_with(|input: &String| -> Result<(), String> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("Invalid URL: {e}"))
        })
        .interact_text()?;
    Ok(value)
}

fn prompt_non_empty(prompt: &str, default: String) -> Result<String> {
    let value = Input::new()
        .with_prompt(prompt)
        .default(default)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Value cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(value)
}

/// Prompt for a credential; an empty answer keeps the current one
fn prompt_secret(prompt: &str, current: &str) -> Result<String> {
    let entered = Password::new()
        .with_prompt(format!("{prompt} (leave empty to keep current)"))
        .allow_empty_password(true)
        .interact()?;
    Ok(if entered.is_empty() {
        current.to_string()
    } else {
        entered
    })
}

fn test_endpoint(api_base: &str) -> bool {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(api_base).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
