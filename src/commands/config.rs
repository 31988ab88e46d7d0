//! Config command handler.

use postsieve::config::{PostsieveConfig, default_config_path};

/// Config command.
pub fn cmd_config(config: &PostsieveConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !show {
        let path = default_config_path()
            .map_or_else(|| "(no platform config dir)".to_string(), |p| p.display().to_string());
        println!("Default config file: {path}");
        println!("Use --show to print the effective configuration.");
        return Ok(());
    }

    println!("# Effective configuration (API key redacted)");
    println!("{}", config.to_redacted_toml()?);
    Ok(())
}
