//! CLI implementation: argument parsing and the single-edit command

use crate::broker::GenerativeEditBroker;
use crate::config::{EditAggressiveness, EditConfig, OutputFormat, RetryPolicy};
use crate::error::MaskGuardError;
use crate::region::{MaskRegion, MaskSet};
use crate::tracing_config::init_cli_tracing;
use crate::{edit_regions_from_bytes, HttpGenerativeModel};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Edit masked regions of an image with a generative model, guaranteeing
/// pixels outside the regions stay byte-identical.
#[derive(Parser, Debug)]
#[command(name = "maskguard", version)]
#[command(about = "Mask-guided generative image editing with pixel safeguards")]
pub(crate) struct Cli {
    /// Input image path
    input: PathBuf,

    /// Output image path
    #[arg(short, long)]
    output: PathBuf,

    /// Edit region as fractions "x,y,w,h" (repeatable)
    #[arg(short = 'r', long = "region", value_name = "X,Y,W,H", required = true)]
    regions: Vec<String>,

    /// Instruction text for the model
    #[arg(short, long)]
    instruction: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = CliOutputFormat::Png)]
    format: CliOutputFormat,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    jpeg_quality: u8,

    /// WebP quality (0-100)
    #[arg(long, default_value_t = 85)]
    webp_quality: u8,

    /// API key for the model endpoints
    #[arg(long, env = "MASKGUARD_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the model API
    #[arg(
        long,
        env = "MASKGUARD_ENDPOINT",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    endpoint: String,

    /// Primary model id
    #[arg(long, default_value = "pixel-edit-2")]
    model: String,

    /// Fallback model id, tried after the primary fails outright
    #[arg(long, default_value = "pixel-edit-1")]
    fallback_model: String,

    /// Maximum attempt-cycles before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Base backoff between attempts in milliseconds
    #[arg(long, default_value_t = 4000)]
    backoff_ms: u64,

    /// Permit layout re-composition instead of biasing toward preservation
    #[arg(long)]
    aggressive: bool,

    /// Skip border-artifact repair on generated frames
    #[arg(long)]
    no_repair: bool,

    /// Verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}

/// Parse one "x,y,w,h" fractional region argument
fn parse_region(arg: &str) -> Result<MaskRegion, MaskGuardError> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(MaskGuardError::validation(format!(
            "region '{arg}' must have exactly four comma-separated fractions"
        )));
    }
    let mut values = [0.0_f32; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part.parse::<f32>().map_err(|e| {
            MaskGuardError::validation(format!("region '{arg}': invalid fraction '{part}': {e}"))
        })?;
    }
    Ok(MaskRegion::new(values[0], values[1], values[2], values[3]))
}

/// Run the CLI
///
/// # Errors
/// Any failure along the edit path, with CLI-friendly context attached
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose)?;

    let regions = cli
        .regions
        .iter()
        .map(|r| parse_region(r))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid --region argument")?;
    let masks = MaskSet::new(regions);

    let config = EditConfig::builder()
        .retry_policy(RetryPolicy {
            max_attempts: cli.max_attempts,
            backoff_base_ms: cli.backoff_ms,
        })
        .aggressiveness(if cli.aggressive {
            EditAggressiveness::Aggressive
        } else {
            EditAggressiveness::Conservative
        })
        .output_format(cli.format.into())
        .jpeg_quality(cli.jpeg_quality)
        .webp_quality(cli.webp_quality)
        .repair_border_artifacts(!cli.no_repair)
        .build()
        .context("Invalid configuration")?;

    let primary = Arc::new(
        HttpGenerativeModel::new(&cli.endpoint, &cli.model, &cli.api_key)
            .context("Failed to create primary model client")?,
    );
    let fallback = Arc::new(
        HttpGenerativeModel::new(&cli.endpoint, &cli.fallback_model, &cli.api_key)
            .context("Failed to create fallback model client")?,
    );
    let broker = GenerativeEditBroker::new(primary, fallback);

    let image_bytes = std::fs::read(&cli.input)
        .with_context(|| format!("Failed to read '{}'", cli.input.display()))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!(
        "editing {} region(s) via '{}'...",
        masks.len(),
        cli.model
    ));

    let result =
        edit_regions_from_bytes(&image_bytes, &masks, &cli.instruction, &broker, &config).await;

    match result {
        Ok(edited) => {
            spinner.finish_with_message(format!(
                "done in {}ms ({} attempt(s))",
                edited.timings().total_ms,
                edited.timings().attempts
            ));

            let bytes = edited
                .to_bytes(config.output_format, match config.output_format {
                    OutputFormat::Jpeg => config.jpeg_quality,
                    _ => config.webp_quality,
                })
                .context("Failed to encode result")?;
            std::fs::write(&cli.output, bytes)
                .with_context(|| format!("Failed to write '{}'", cli.output.display()))?;

            log::info!(
                "Edited: {} -> {} ({} region(s))",
                cli.input.display(),
                cli.output.display(),
                masks.len()
            );
            Ok(())
        },
        Err(e) => {
            spinner.finish_with_message("failed");
            // User-facing phrasing; the raw cause only reaches debug logs
            log::debug!("edit failed: {e}");
            Err(anyhow::anyhow!(e.user_message()))
        },
    }
}
