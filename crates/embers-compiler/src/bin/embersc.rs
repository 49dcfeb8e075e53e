/// Embers template renderer CLI

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use embers_compiler::{CompileOptions, Compiler, TargetMode};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "embersc")]
#[command(about = "Embers template compiler - renders a template file to stdout")]
#[command(version)]
struct Args {
    /// Template file to render
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Locals as a JSON object
    #[arg(long, value_name = "JSON", conflicts_with = "locals_file")]
    locals: Option<String>,

    /// Read locals from a JSON file
    #[arg(long, value_name = "PATH")]
    locals_file: Option<PathBuf>,

    /// Open delimiter
    #[arg(long, default_value = "<%")]
    open: String,

    /// Close delimiter
    #[arg(long, default_value = "%>")]
    close: String,

    /// Compile without line tracking
    #[arg(long)]
    no_debug: bool,

    /// Fail on missing properties instead of rendering nothing
    #[arg(long)]
    strict: bool,

    /// Print the portable program instead of rendering
    #[arg(long)]
    portable: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let locals = read_locals(&args)?;
    let path = args.input.to_string_lossy().into_owned();

    let options = CompileOptions::new()
        .open(&args.open)
        .close(&args.close)
        .compile_debug(!args.no_debug)
        .strict(args.strict)
        .target(if args.portable { TargetMode::Portable } else { TargetMode::Server });
    let compiler = Compiler::new(options.clone());

    if args.portable {
        let source = fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?;
        let template = Compiler::new(options.filename(&path))
            .compile(&source)
            .with_context(|| format!("failed to compile {path}"))?;
        println!("{}", template.code());
        return Ok(());
    }

    let output = compiler
        .render_file(&path, &locals)
        .with_context(|| format!("failed to render {path}"))?;
    print!("{output}");
    Ok(())
}

fn read_locals(args: &Args) -> anyhow::Result<JsonValue> {
    let text = match (&args.locals, &args.locals_file) {
        (Some(json), _) => json.clone(),
        (None, Some(file)) => fs::read_to_string(file)
            .with_context(|| format!("failed to read locals file {}", file.display()))?,
        (None, None) => return Ok(JsonValue::Object(Default::default())),
    };

    let locals: JsonValue = serde_json::from_str(&text).context("locals are not valid JSON")?;
    if !locals.is_object() {
        bail!("locals must be a JSON object");
    }
    Ok(locals)
}
