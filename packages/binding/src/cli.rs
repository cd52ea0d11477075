//! Command-line interface for beanbinder.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;

use crate::dynamic::{Descriptor, ModelBuilder};
use crate::error::{BindingError, Result};

/// Beanbinder - bind XML documents to bean graphs and back.
#[derive(Parser)]
#[command(name = "beanbinder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a document into a model and write the model back to stdout.
    Roundtrip {
        /// Input XML document
        input: PathBuf,

        /// Namespace descriptor file (repeatable)
        #[arg(short, long = "descriptor", required = true)]
        descriptors: Vec<PathBuf>,

        /// Directory resource locations are relative to (default: directory
        /// of the first descriptor)
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Validate the document against the descriptor schemas first
        #[arg(long)]
        validate: bool,

        /// Bean type to root the model at (default: the whole bind result)
        #[arg(short = 't', long = "type")]
        root_type: Option<String>,
    },

    /// Validate a document against the descriptor schemas.
    Validate {
        /// Input XML document
        input: PathBuf,

        /// Namespace descriptor file (repeatable)
        #[arg(short, long = "descriptor", required = true)]
        descriptors: Vec<PathBuf>,

        /// Directory resource locations are relative to
        #[arg(short, long)]
        base: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Roundtrip {
            input,
            descriptors,
            base,
            validate,
            root_type,
        } => roundtrip_command(
            &input,
            &descriptors,
            base.as_deref(),
            validate,
            root_type.as_deref(),
        ),
        Commands::Validate {
            input,
            descriptors,
            base,
        } => validate_command(&input, &descriptors, base.as_deref()),
    }
}

fn load_descriptor(descriptors: &[PathBuf], base: Option<&Path>) -> Result<Arc<Descriptor>> {
    let base = match base {
        Some(base) => base.to_path_buf(),
        None => descriptors
            .first()
            .and_then(|path| path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Ok(Arc::new(Descriptor::load(descriptors, &base)?))
}

fn read_input(input: &Path) -> Result<String> {
    fs::read_to_string(input)
        .map_err(|e| BindingError::io(format!("Failed to read '{}': {e}", input.display())))
}

/// Execute the roundtrip command.
fn roundtrip_command(
    input: &Path,
    descriptors: &[PathBuf],
    base: Option<&Path>,
    validate: bool,
    root_type: Option<&str>,
) -> Result<()> {
    let builder = ModelBuilder::new(load_descriptor(descriptors, base)?, validate);
    let xml = read_input(input)?;

    let output = match root_type {
        Some(type_name) => builder.read_model(&xml, type_name)?.write_model_to_string()?,
        None => builder.read_result_model(&xml)?.write_model_to_string()?,
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

/// Execute the validate command.
fn validate_command(input: &Path, descriptors: &[PathBuf], base: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(descriptors, base)?;
    let schema = descriptor
        .schema()
        .filter(|schema| !schema.is_empty())
        .ok_or_else(|| {
            BindingError::Config("The descriptors do not declare any schema.".to_string())
        })?;

    let xml = read_input(input)?;
    let document = roxmltree::Document::parse(&xml)?;
    schema.validate(&document)?;

    println!("{} {}", style("Valid:").green().bold(), input.display());
    Ok(())
}
