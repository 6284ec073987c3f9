//! Config command handlers

use anyhow::{Context, Result};

use lexsync_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let token = masked_token(config.remote.token.as_deref());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "auto_sync": config.auto_sync,
                    "remote": {
                        "api_url": config.remote.api_url,
                        "token": token,
                        "articles_document": config.remote.articles_document,
                        "vocabulary_document": config.remote.vocabulary_document,
                        "description": config.remote.description,
                        "timeout_secs": config.remote.timeout_secs,
                    },
                    "sync": {
                        "availability_ttl_secs": config.sync.availability_ttl_secs,
                        "verify_revision": config.sync.verify_revision,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:                    {}", config.data_dir.display());
            println!("  auto_sync:                   {}", config.auto_sync);
            println!("  remote.api_url:              {}", config.remote.api_url);
            println!(
                "  remote.token:                {}",
                token.as_deref().unwrap_or("(not set)")
            );
            println!("  remote.articles_document:    {}", config.remote.articles_document);
            println!("  remote.vocabulary_document:  {}", config.remote.vocabulary_document);
            println!("  remote.description:          {}", config.remote.description);
            println!("  remote.timeout_secs:         {}", config.remote.timeout_secs);
            println!(
                "  sync.availability_ttl_secs:  {}",
                config.sync.availability_ttl_secs
            );
            println!("  sync.verify_revision:        {}", config.sync.verify_revision);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    config.set_value(&key, &value)?;
    config.save().context("Failed to save configuration")?;

    let shown = if key == "remote.token" {
        masked_token(Some(&value)).unwrap_or_default()
    } else {
        value
    };
    output.success(&format!("Set {} = {}", key, shown));
    Ok(())
}

/// Show only the last four characters of a token
fn masked_token(token: Option<&str>) -> Option<String> {
    let token = token.filter(|t| !t.is_empty())?;
    let chars: Vec<char> = token.chars().collect();
    let visible: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    Some(format!("****{}", visible))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_token() {
        assert_eq!(masked_token(None), None);
        assert_eq!(masked_token(Some("")), None);
        assert_eq!(masked_token(Some("ghp_abcdef1234")).as_deref(), Some("****1234"));
        assert_eq!(masked_token(Some("ab")).as_deref(), Some("****ab"));
    }
}
