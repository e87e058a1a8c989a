//! wombo CLI - Dream image generation from the terminal
//!
//! Usage:
//!   wombo generate <prompt>     Generate an image and print its URL
//!   wombo styles                List available art styles
//!   wombo token                 Print a fresh anonymous token
//!   wombo check <task-id>       Show one status snapshot of a task
//!   wombo init-config [path]    Write a default wombo.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use wombo_client::{CancellationToken, Dream, GenerateOptions, Generation, ReqwestTransport};
use wombo_core::{DreamConfig, Style};

const DEFAULT_CONFIG: &str = "wombo.toml";

#[derive(Parser)]
#[command(name = "wombo")]
#[command(author, version, about = "Dream (WOMBO) image generation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Use this id token instead of anonymous sign-up (overrides WOMBO_ID_TOKEN)
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image
    Generate {
        /// Text prompt (first 200 characters are used)
        prompt: String,

        /// Art style code (see `wombo styles`)
        #[arg(short, long, default_value_t = Style::DEFAULT)]
        style: Style,

        /// Seconds between status checks
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,

        /// Seconds to wait for completion
        #[arg(long)]
        budget: Option<u64>,

        /// Aspect ratio keyword, e.g. old_vertical_ratio
        #[arg(long)]
        aspect_ratio: Option<String>,

        /// Write the preview frames as an animated GIF
        #[arg(long, value_name = "FILE")]
        gif: Option<PathBuf>,

        /// Print the completed task as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available art styles
    Styles,

    /// Acquire and print an anonymous id token
    Token,

    /// Show the current status of a task
    Check {
        /// Task id returned by the service
        task_id: String,
    },

    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let (config_path, token) = (cli.config, cli.token);

    match cli.command {
        Commands::Generate {
            prompt,
            style,
            interval,
            budget,
            aspect_ratio,
            gif,
            json,
        } => {
            let dream = client(&config_path, token)?;
            let mut options = GenerateOptions::from_config(dream.config())
                .with_style(style)
                .with_animation(gif.is_some());
            if let Some(secs) = interval {
                options = options.with_interval(Duration::from_secs(secs));
            }
            if let Some(secs) = budget {
                options = options.with_budget(Duration::from_secs(secs));
            }
            if let Some(ratio) = aspect_ratio {
                options = options.with_aspect_ratio(ratio);
            }
            cmd_generate(&dream, &prompt, &options, gif.as_deref(), json).await
        }
        Commands::Styles => cmd_styles(&client(&config_path, token)?).await,
        Commands::Token => cmd_token(&client(&config_path, token)?).await,
        Commands::Check { task_id } => cmd_check(&client(&config_path, token)?, &task_id).await,
        Commands::InitConfig { path } => cmd_init_config(&path),
    }
}

/// HTTP client from the config file
///
/// Token precedence: `--token`, then `WOMBO_ID_TOKEN` (read by
/// `Dream::from_config`), then anonymous sign-up.
fn client(config_path: &Path, token: Option<String>) -> Result<Dream<ReqwestTransport>> {
    let config = DreamConfig::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let dream = Dream::from_config(config).context("Failed to create HTTP client")?;
    Ok(match token {
        Some(token) => dream.with_token(token),
        None => dream,
    })
}

fn cmd_init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{:?} already exists", path);
    }
    DreamConfig::write_default(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote default configuration to {:?}", path);
    Ok(())
}

async fn cmd_generate(
    dream: &Dream<ReqwestTransport>,
    prompt: &str,
    options: &GenerateOptions,
    gif_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    info!("Generating with style {}", options.style);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    let generation = dream
        .generate_with_cancel(prompt, options, &cancel)
        .await
        .context("Generation failed")?;

    if let (Some(path), Generation::Animation { gif, .. }) = (gif_path, &generation) {
        tokio::fs::write(path, gif)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Wrote {} byte animation to {:?}", gif.len(), path);
    }

    let task = generation.task();
    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        match task.final_url() {
            Some(url) => println!("{}", url),
            None => println!("Task {} finished without an image", task.id),
        }
    }
    Ok(())
}

async fn cmd_styles(dream: &Dream<ReqwestTransport>) -> Result<()> {
    let styles = dream.styles().await.context("Failed to fetch style catalog")?;
    for style in styles {
        let premium = if style.is_premium { " (premium)" } else { "" };
        println!("{:>5}  {}{}", style.id.code(), style.name, premium);
    }
    Ok(())
}

async fn cmd_token(dream: &Dream<ReqwestTransport>) -> Result<()> {
    let credential = dream
        .acquire_credential()
        .await
        .context("Failed to acquire credential")?;
    println!("{}", credential.id_token());
    Ok(())
}

async fn cmd_check(dream: &Dream<ReqwestTransport>, task_id: &str) -> Result<()> {
    let task = dream
        .check(task_id)
        .await
        .with_context(|| format!("Failed to check task {}", task_id))?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["wombo", "generate", "a red fox"]).unwrap();
        match cli.command {
            Commands::Generate { prompt, style, gif, .. } => {
                assert_eq!(prompt, "a red fox");
                assert_eq!(style, Style(84));
                assert!(gif.is_none());
            }
            _ => panic!("expected generate"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::try_parse_from([
            "wombo", "generate", "owl", "--style", "32", "--budget", "90", "--gif", "owl.gif",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { style, budget, gif, .. } => {
                assert_eq!(style, Style(32));
                assert_eq!(budget, Some(90));
                assert_eq!(gif, Some(PathBuf::from("owl.gif")));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Cli::try_parse_from(["wombo", "generate", "owl", "--interval", "0"]).is_err());
        let cli = Cli::try_parse_from(["wombo", "generate", "owl", "--interval", "1"]).unwrap();
        match cli.command {
            Commands::Generate { interval, .. } => assert_eq!(interval, Some(1)),
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_token_flag_ignores_environment() {
        std::env::set_var("WOMBO_ID_TOKEN", "from-env");
        let cli = Cli::try_parse_from(["wombo", "token"]).unwrap();
        assert!(cli.token.is_none());

        let cli = Cli::try_parse_from(["wombo", "--token", "from-flag", "token"]).unwrap();
        assert_eq!(cli.token.as_deref(), Some("from-flag"));
        std::env::remove_var("WOMBO_ID_TOKEN");
    }
}
