//! `lumeo doctor` — Diagnose system health.

use std::time::Duration;

use lumeo_agent::Workflow;
use lumeo_config::AppConfig;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Lumeo Doctor — System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file, using defaults ({})", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and run again.");
            return Ok(());
        }
    };

    // Model endpoint
    match Workflow::from_config(&config) {
        Ok(workflow) => {
            let provider = workflow.provider();
            match tokio::time::timeout(HEALTH_TIMEOUT, provider.health_check()).await {
                Ok(Ok(true)) => println!(
                    "  ✅ Model endpoint reachable ({}, model {})",
                    provider.name(),
                    workflow.model()
                ),
                Ok(Ok(false)) => {
                    println!("  ❌ Model endpoint answered with an error ({})", provider.name());
                    issues += 1;
                }
                Ok(Err(e)) => {
                    println!("  ❌ Model endpoint unreachable: {e}");
                    issues += 1;
                }
                Err(_) => {
                    println!("  ❌ Model endpoint timed out after {}s", HEALTH_TIMEOUT.as_secs());
                    issues += 1;
                }
            }

            match provider.list_models().await {
                Ok(models) if models.iter().any(|m| m == workflow.model()) => {
                    println!("  ✅ Model '{}' is available", workflow.model());
                }
                Ok(models) if !models.is_empty() => {
                    println!("  ⚠️  Model '{}' not listed by the endpoint", workflow.model());
                    issues += 1;
                }
                _ => {}
            }
        }
        Err(e) => {
            println!("  ❌ Could not set up the model provider: {e}");
            issues += 1;
        }
    }

    // Search
    if config.has_search_key() {
        println!("  ✅ Search configured ({})", config.search.provider);
    } else {
        println!("  ⚠️  No search key — set TAVILY_API_KEY to enable web search");
        issues += 1;
    }

    // Memory
    if config.memory.backend == "file" {
        println!("  ✅ Threads persisted in {}", config.threads_dir().display());
    } else {
        println!("  ✅ Threads kept in memory for the session");
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
