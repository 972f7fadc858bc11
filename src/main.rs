use anyhow::{bail, Context};
use clap::Parser;
use pbrforge::config::{self, Config};
use pbrforge::diag::Diagnostics;
use pbrforge::intake::{CheckerProvider, FlatProvider, OpenAiProvider, TextureProvider};
use pbrforge::maps::MapKind;
use pbrforge::output::write_result;
use pbrforge::pipeline::{self, CancelFlag, PipelineStatus};
use pbrforge::tessellation::TessAlgorithm;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pbrforge", version)]
#[command(about = "Generate a seamlessly tileable PBR texture set from a text prompt")]
#[command(long_about = "
Generate a full PBR texture set (diffuse, normal, roughness, metallic,
ambient occlusion, height) from a single text prompt. The diffuse comes
from an AI image model; every other map is derived from it locally.

Examples:
  pbrforge \"weathered red brick wall\" --material brick
  pbrforge \"brushed steel plate\" -m metal -r 1024x1024 -t diffuse,normal,roughness,metallic
  pbrforge \"mossy cobblestones\" --config stone.json --preview -v
")]
struct Cli {
    /// Text prompt describing the surface
    prompt: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Material class (stone, brick, wood, metal, fabric, concrete)
    #[arg(short, long)]
    material: Option<String>,

    /// Output resolution, e.g. 512x512
    #[arg(short, long)]
    resolution: Option<String>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated map types (diffuse,normal,roughness,metallic,ao,height)
    #[arg(short, long, value_delimiter = ',')]
    types: Option<Vec<String>>,

    /// Output filename prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Tessellation method (offset, mirror, frequency)
    #[arg(long)]
    method: Option<String>,

    /// Write a 2x2 tiled diffuse preview
    #[arg(long)]
    preview: bool,

    /// Skip the seamless tessellation stage
    #[arg(long)]
    no_seamless: bool,

    /// Image provider (openai, flat, checker)
    #[arg(long, default_value = "openai")]
    provider: String,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    apply_cli_overrides(&mut config, &cli)?;

    let mut diag = Diagnostics::new();
    config.warn_unknown_keys(&mut diag);
    let mut request = config.to_request(&cli.prompt, &mut diag)?;
    if let Some(types) = &cli.types {
        request.kinds = parse_kinds(types)?;
    }
    if cli.no_seamless {
        request.seamless = false;
    }

    let provider = build_provider(&cli.provider, &config)?;
    let cancel = CancelFlag::default();

    log::info!(
        "generating '{}' as {} at {} ({} maps)",
        cli.prompt,
        request.material,
        request.resolution,
        request.kinds.len()
    );
    let mut result = pipeline::run(&request, provider.as_ref(), &cancel)?;
    let mut warnings = diag.into_warnings();
    warnings.append(&mut result.warnings);
    result.warnings = warnings;

    let written = write_result(&result, &config.output)?;
    for path in &written {
        log::info!("wrote {}", path.display());
    }
    for warning in &result.warnings {
        log::warn!("{warning}");
    }
    if result.status == PipelineStatus::Cancelled {
        log::warn!("run was cancelled; wrote partial set");
    }
    println!(
        "{} file(s) written to {}",
        written.len(),
        config.output.directory.display()
    );
    Ok(())
}

/// -v info, -vv debug, -vvv trace; warnings always show.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .init();
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(material) = &cli.material {
        config.material.base_material = material.clone();
    }
    if let Some(resolution) = &cli.resolution {
        let (w, h) = parse_resolution(resolution)?;
        config.textures.resolution.width = w;
        config.textures.resolution.height = h;
    }
    if let Some(dir) = &cli.output {
        config.output.directory = dir.clone();
    }
    if let Some(prefix) = &cli.prefix {
        config.output.prefix = prefix.clone();
    }
    if let Some(method) = &cli.method {
        match TessAlgorithm::from_name(method) {
            Some(algorithm) => config.tessellation.method = Some(algorithm),
            None => bail!("unknown tessellation method '{method}'"),
        }
    }
    if cli.preview {
        config.output.create_preview = true;
    }
    Ok(())
}

fn parse_resolution(text: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .with_context(|| format!("resolution '{text}' is not WxH"))?;
    Ok((
        w.trim().parse().with_context(|| format!("bad width in '{text}'"))?,
        h.trim().parse().with_context(|| format!("bad height in '{text}'"))?,
    ))
}

fn parse_kinds(types: &[String]) -> anyhow::Result<BTreeSet<MapKind>> {
    let mut kinds = BTreeSet::new();
    for name in types {
        match MapKind::from_name(name) {
            Some(kind) => {
                kinds.insert(kind);
            }
            None => bail!("unknown map type '{name}'"),
        }
    }
    Ok(kinds)
}

fn build_provider(name: &str, config: &Config) -> anyhow::Result<Box<dyn TextureProvider>> {
    match name {
        "openai" => {
            let env_var = &config.generation.api_key_ref;
            let key = std::env::var(env_var)
                .with_context(|| format!("provider 'openai' needs the {env_var} environment variable"))?;
            Ok(Box::new(OpenAiProvider::new(
                key,
                config.generation.model.clone(),
                config.timeout(),
            )))
        }
        "flat" => Ok(Box::new(FlatProvider::mid_gray())),
        "checker" => Ok(Box::new(CheckerProvider::default())),
        other => bail!("unknown provider '{other}' (expected openai, flat or checker)"),
    }
}
