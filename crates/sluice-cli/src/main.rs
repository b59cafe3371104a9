//! CLI binary for resolving and validating Sluice pipeline descriptions.

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use sluice_config::{resolve_path, PipelineDescription, Resource, Severity};
use sluice_plugin::Library;
use sluice_types::SluiceError;

#[derive(Parser)]
#[command(name = "sluice", version, about = "Declarative data-movement pipeline resolver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, lint and provision every pipeline
    Validate {
        /// A .sluice file or a directory of them
        path: PathBuf,

        /// Treat a directory as one concatenated unit instead of a group
        #[arg(long)]
        concat: bool,
    },

    /// Summarize declared resources and pipelines
    Info {
        /// A .sluice file or a directory of them
        path: PathBuf,

        /// Treat a directory as one concatenated unit instead of a group
        #[arg(long)]
        concat: bool,
    },

    /// Print the resolved description as JSON
    Resolve {
        /// A .sluice file or a directory of them
        path: PathBuf,

        /// Treat a directory as one concatenated unit instead of a group
        #[arg(long)]
        concat: bool,
    },

    /// List registered plugin resources and their capabilities
    Plugins,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "info" });

    let library = Library::default();

    match cli.command {
        Commands::Validate { path, concat } => cmd_validate(&library, &path, concat)?,
        Commands::Info { path, concat } => cmd_info(&library, &path, concat)?,
        Commands::Resolve { path, concat } => cmd_resolve(&library, &path, concat)?,
        Commands::Plugins => cmd_plugins(&library),
    }

    Ok(())
}

fn load(library: &Library, path: &Path, concat: bool) -> anyhow::Result<PipelineDescription> {
    debug!(path = %path.display(), concat, "loading");
    resolve_path(path, library.scope(), concat).map_err(|e| {
        if let Some(scope) = e.scope_at_failure() {
            debug!(visible = ?scope, "scope at failure");
        }
        if let SluiceError::ParseError {
            source_snippet: Some(snippet),
            ..
        } = e.root()
        {
            debug!(near = %snippet, "parse failed");
        }
        anyhow::Error::new(e)
    })
    .with_context(|| format!("failed to resolve {}", path.display()))
}

fn cmd_validate(library: &Library, path: &Path, concat: bool) -> anyhow::Result<()> {
    let description = load(library, path, concat)?;
    let diagnostics = sluice_config::validate(&description);

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let Some(fix) = &diag.fix {
            println!("        fix: {fix}");
        }
    }

    if let Err(e) = library.instantiate_all(&description, library.scope()) {
        println!("[ERROR] provision: {e}");
        has_error = true;
    }

    if has_error {
        std::process::exit(1);
    }
    println!("Pipelines are valid");
    Ok(())
}

fn cmd_info(library: &Library, path: &Path, concat: bool) -> anyhow::Result<()> {
    let description = load(library, path, concat)?;

    println!("Source: {}", path.display());
    println!("Resources: {}", description.resources().count());
    println!("Pipelines: {}", description.pipelines.len());
    if description.stop_after > 0 {
        println!("Stop after: {}", description.stop_after);
    }
    if description.exit_on_error {
        println!("Exit on error: yes");
    }

    if description.resources().next().is_some() {
        println!("\nResources:");
        for resource in description.resources() {
            let provider = library
                .get(&resource.kind)
                .map(|r| r.capabilities.to_string())
                .unwrap_or_else(|| "(not registered)".into());
            println!("  {} [{}]", resource.qualified_name(), provider);
        }
    }

    for pipeline in &description.pipelines {
        println!("\nPipeline: {}", pipeline.name);
        println!("  produce:   {}", qualified_names(&pipeline.producers));
        println!("  transform: {}", qualified_names(&pipeline.transformers));
        println!("  consume:   {}", qualified_names(&pipeline.consumers));
    }

    for plugin in &description.plugins {
        println!("\nPlugin: {} ({})", plugin.name, plugin.source);
    }

    Ok(())
}

fn qualified_names(resources: &[Arc<Resource>]) -> String {
    resources
        .iter()
        .map(|r| r.qualified_name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_resolve(library: &Library, path: &Path, concat: bool) -> anyhow::Result<()> {
    let description = load(library, path, concat)?;
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}

fn cmd_plugins(library: &Library) {
    for plugin in library.plugins() {
        println!("{}", plugin.name);
        for resource in &plugin.resources {
            let active = library
                .get(&resource.name)
                .is_some_and(|r| Arc::ptr_eq(r, resource));
            let marker = if active { "" } else { " (overridden)" };
            println!("  {} [{}]{}", resource.name, resource.capabilities, marker);
            for attr in &resource.spec {
                println!("      {attr}");
            }
        }
        let functions: Vec<_> = plugin.functions.keys().map(String::as_str).collect();
        if !functions.is_empty() {
            println!("  functions: {}", functions.join(", "));
        }
    }
}
