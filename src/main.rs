use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use opgen::{GeneratorConfig, JsonRenderer, Renderer};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    let location = matches
        .get_one::<String>("document")
        .context("--document is required")?;
    let config_dir = matches.get_one::<PathBuf>("config");
    let out = matches.get_one::<PathBuf>("out");

    let doc = opgen::source::load(location).with_context(|| format!("loading {location}"))?;
    let config = match config_dir {
        Some(dir) => GeneratorConfig::from_dir(dir)
            .with_context(|| format!("loading config from {}", dir.display()))?,
        None => GeneratorConfig::default(),
    };

    let generation = opgen::compile(&doc, &config).context("generation failed")?;
    let renderer = JsonRenderer {
        pretty: !matches.get_flag("compact"),
    };
    let text = renderer
        .render(&generation)
        .with_context(|| format!("{} renderer failed", renderer.name()))?;

    match out {
        Some(path) => write_file(path, &text)?,
        None => write_stdout_line(&text)?,
    }

    info!(
        operations = generation.operations.len(),
        warnings = generation.warnings.len(),
        "done"
    );
    Ok(())
}

fn build_cli() -> Command {
    Command::new("opgen")
        .about("Compile an OpenAPI document into action and trigger descriptors")
        .arg(
            Arg::new("document")
                .long("document")
                .short('d')
                .env("OPGEN_DOCUMENT")
                .required(true)
                .value_name("PATH_OR_URL")
                .help("OpenAPI document (YAML or JSON), local path or http(s) URL"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .env("OPGEN_CONFIG")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory with settings.json, actions.json, triggers.json, authentication.json"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .short('o')
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write output to a file instead of stdout"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .action(ArgAction::SetTrue)
                .help("Single-line JSON output"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Debug logging (RUST_LOG takes precedence)"),
        )
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "opgen=debug" } else { "opgen=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    let mut contents = text.to_string();
    contents.push('\n');
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

fn write_stdout_line(value: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if let Err(err) = out.write_all(value.as_bytes()) {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    if let Err(err) = out.write_all(b"\n") {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    Ok(())
}
