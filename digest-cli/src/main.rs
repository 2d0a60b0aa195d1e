//! Weekly digest build pipeline entry point (spec §6's CLI flag list).

use std::process::ExitCode;

use clap::Parser;
use digest_common::{Config, DigestError};
use digest_pipeline::RunOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "digest-cli")]
#[command(about = "Build the weekly intelligence-brief digest")]
#[command(version)]
struct Cli {
    /// Week to build, e.g. "2026-W07". Defaults to the current ISO week.
    #[arg(long)]
    week: Option<String>,

    /// Bypass the scene-director and rendered-image caches.
    #[arg(long = "regenCover")]
    regen_cover: bool,

    /// Bypass the themes cache.
    #[arg(long = "regenThemes")]
    regen_themes: bool,

    /// Bypass the intro cache.
    #[arg(long = "regenIntro")]
    regen_intro: bool,

    /// Cover image style.
    #[arg(long = "coverStyle", default_value = "realistic")]
    cover_style: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("digest=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let options = RunOptions {
        week_label: cli.week,
        regen_cover: cli.regen_cover,
        regen_themes: cli.regen_themes,
        regen_intro: cli.regen_intro,
        cover_style: cli.cover_style,
    };

    info!("weekly digest build starting");

    match digest_pipeline::run(&config, &options).await {
        Ok((digest, path)) => {
            info!(
                week = %digest.week_label,
                total_articles = digest.total_articles,
                path = %path.display(),
                "digest written"
            );

            println!("\n=== Weekly Digest: {} ===", digest.week_label);
            println!("Articles: {}  |  Written to: {}", digest.total_articles, path.display());
            println!("\n{}", digest.intro_paragraph);

            ExitCode::SUCCESS
        }
        Err(e @ (DigestError::ArticleStore { .. } | DigestError::OutputWrite { .. })) => {
            error!(error = %e, "fatal I/O error, aborting");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "fatal error, aborting");
            ExitCode::FAILURE
        }
    }
}
