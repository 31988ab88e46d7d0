//! Run command handler.

use postsieve::config::PostsieveConfig;
use postsieve::models::Post;
use postsieve::services::{
    CancellationToken, IntakeNormalizer, PipelineDeps, PipelineOrchestrator, RawPost,
};
use std::path::{Path, PathBuf};

/// Arguments of the `run` command.
pub struct RunArgs {
    /// Batch file.
    pub input: PathBuf,
    /// Input holds raw scraped records.
    pub raw: bool,
    /// Skip the rewrite service.
    pub no_rewrite: bool,
    /// Where approved posts are written.
    pub output: Option<PathBuf>,
}

/// Run command.
pub fn cmd_run(config: PostsieveConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = if args.no_rewrite {
        config.with_rewrite_enabled(false)
    } else {
        config
    };

    let posts = load_batch(&args.input, args.raw, &config)?;
    println!("Loaded {} posts from {}", posts.len(), args.input.display());

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Interrupt received, stopping after the current stage...");
        handler_token.cancel();
    }) {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let deps = PipelineDeps::from_config(&config)?;
    let outcome = PipelineOrchestrator::new(deps, &config)
        .with_cancellation(token)
        .run(posts)?;

    let stats = outcome.stats;
    println!();
    println!("Run {}", outcome.run_id);
    println!("  Total:              {}", stats.total);
    println!("  Inserted:           {}", stats.inserted);
    println!("  Skipped (hash):     {}", stats.skipped_by_hash);
    println!("  Skipped (url):      {}", stats.skipped_by_url);
    println!("  Skipped (semantic): {}", stats.skipped_by_semantic);
    println!("  Skipped (size):     {}", stats.skipped_by_size);
    println!("  Dropped (empty):    {}", stats.dropped_empty);
    println!("  Failed writes:      {}", stats.failed);
    println!("  Rewritten:          {}", stats.rewritten);

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&outcome.approved)?;
        std::fs::write(output, json)?;
        println!();
        println!(
            "Wrote {} approved posts to {}",
            outcome.approved.len(),
            output.display()
        );
    }

    Ok(())
}

/// Reads a batch file, normalizing raw records when asked.
fn load_batch(
    path: &Path,
    raw: bool,
    config: &PostsieveConfig,
) -> Result<Vec<Post>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

    if !raw {
        return Ok(serde_json::from_str(&contents)?);
    }

    let records: Vec<RawPost> = serde_json::from_str(&contents)?;
    let report = IntakeNormalizer::new(config.intake).normalize(records)?;
    println!(
        "Normalized batch: {} reposts dropped, {} empty records dropped",
        report.reposts_dropped, report.empty_dropped
    );
    Ok(report.posts)
}
