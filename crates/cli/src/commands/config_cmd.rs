//! `lumeo config` — Configuration management commands.

use lumeo_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

/// A copy of the config that is safe to print.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    if config.search.api_key.is_some() {
        config.search.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.default_provider != "ollama" && config.api_key.is_none() {
                let has_provider_key = config
                    .providers
                    .get(&config.default_provider)
                    .is_some_and(|p| p.api_key.is_some());
                if !has_provider_key {
                    warnings.push(format!(
                        "No API key for provider '{}' (set LUMEO_API_KEY)",
                        config.default_provider
                    ));
                }
            }

            if !config.has_search_key() {
                warnings.push("No search key set; web search will fail (set TAVILY_API_KEY)".into());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.default_model);
            println!("   Budget:    {} tokens", config.context.max_tokens);
            println!("   Search:    {} (max {} results)", config.search.provider, config.search.max_results);
            println!("   Memory:    {}", config.memory.backend);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(&config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumeo_config::ProviderConfig;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_never_prints_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.search.api_key = Some("tvly-secret".into());
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-provider".into()),
                api_url: None,
                default_model: None,
            },
        );

        let rendered = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("sk-provider"));
        assert!(rendered.contains(REDACTED));
    }
}
