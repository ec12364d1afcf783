//! `recollect config`: Configuration management commands.

use recollect_config::RecollectConfig;

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match RecollectConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.storage.backend == "memory" {
                warnings.push("In-memory backend: nothing persists between commands");
            }
            if config.context.max_chars < 200 {
                warnings.push("context.max_chars is very small; most memories will be dropped");
            }
            if config.retrieval.tier_timeout_ms < 50 {
                warnings.push("retrieval.tier_timeout_ms below 50ms will time out on cold stores");
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
            println!("   Backend:   {}", config.storage.backend);
            println!("   Database:  {}", config.database_path().display());
            println!(
                "   Limits:    facts={}, recent={}, topics={}",
                config.retrieval.fact_limit, config.retrieval.recent_limit, config.retrieval.topic_limit
            );
            println!("   Window:    {} days", config.retrieval.recency_window_days);
            println!("   Budget:    {} chars", config.context.max_chars);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = RecollectConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

pub fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() && !force {
        println!("⚠️  {} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, RecollectConfig::default_toml())?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    std::env::var("RECOLLECT_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| RecollectConfig::config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    #[test]
    fn default_config_path_is_toml() {
        let path = recollect_config::RecollectConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
