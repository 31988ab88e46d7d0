//! Status command handler.

use postsieve::config::PostsieveConfig;
use postsieve::storage::{HistoryStore, SqliteHistoryStore};

/// Status command.
pub fn cmd_status(config: &PostsieveConfig, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("Postsieve Status");
    println!("================");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let path = &config.database_path;
    if !path.exists() {
        println!("History Database: Not initialized");
        println!("  Path: {}", path.display());
        return Ok(());
    }

    let store = SqliteHistoryStore::new(path)?;
    let health = match store.health_check() {
        Ok(()) => "Available".to_string(),
        Err(e) => format!("Unavailable ({e})"),
    };
    println!("History Database: {health}");
    println!("  Path: {}", path.display());
    println!("  Stored posts: {}", store.count_posts()?);
    println!();

    let skips = store.recent_skips(limit)?;
    if skips.is_empty() {
        println!("No skipped posts recorded.");
        return Ok(());
    }

    println!("Recent skips:");
    for event in skips {
        let matched = event
            .matched_url
            .as_deref()
            .map(|url| format!(" -> {url}"))
            .unwrap_or_default();
        let similarity = event
            .similarity
            .map(|s| format!(" ({s:.3})"))
            .unwrap_or_default();
        println!(
            "  [{}] {}{matched}{similarity}",
            event.reason, event.source_url
        );
    }

    Ok(())
}
