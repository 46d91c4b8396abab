use std::{io, path::PathBuf};

use clap::Parser;
use miette::{Report, Result};
use protosense::{Finding, Settings, Severity, Workspace, WorkspaceConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
pub struct Args {
    /// The source file(s) to check
    #[clap(value_name = "PROTO_FILES", required = true, value_parser)]
    files: Vec<PathBuf>,
    /// The directory in which to search for imports.
    #[clap(
        short = 'I',
        long = "include",
        visible_alias = "proto_path",
        value_name = "PATH",
        default_value = ".",
        value_parser
    )]
    includes: Vec<PathBuf>,
    /// A tree-sitter protobuf grammar library to parse with.
    #[clap(long, value_name = "PATH", value_parser)]
    grammar: Option<PathBuf>,
    /// A file containing an earlier version of the input file, to check for breaking changes.
    #[clap(long, value_name = "PATH", value_parser)]
    against: Option<PathBuf>,
    /// Resolve type references by simple name when scoped lookup fails.
    #[clap(long)]
    lenient: bool,
    /// Skip naming convention checks.
    #[clap(long)]
    no_naming: bool,
    /// Print parser statistics after checking.
    #[clap(long)]
    stats: bool,
}

pub fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut workspace = Workspace::try_new(WorkspaceConfig {
        include_paths: args.includes,
        grammar_path: args.grammar,
        lenient_resolution: args.lenient,
        settings: Settings {
            naming_conventions: !args.no_naming,
            ..Default::default()
        },
    })?;

    // Register everything first so cross-file references resolve regardless of order.
    let mut documents = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let (uri, text) = Workspace::open_file(file)?;
        workspace.update_document(&uri, &text);
        documents.push((file.display().to_string(), uri, text));
    }

    let baseline = match &args.against {
        Some(path) => Some(Workspace::open_file(path)?.1),
        None => None,
    };

    let mut errors = 0;
    for (name, uri, text) in &documents {
        let mut diagnostics = workspace.validate_document(uri, text);
        if let Some(baseline) = &baseline {
            diagnostics.extend(workspace.breaking_changes(uri, text, baseline));
        }
        diagnostics.sort_by_key(|d| (d.range.start, d.severity));

        for diagnostic in &diagnostics {
            if diagnostic.severity == Severity::Error {
                errors += 1;
            }
            eprintln!("{:?}", Report::new(Finding::new(name, text, diagnostic)));
        }
    }

    if args.stats {
        eprint!("{}", workspace.parser_stats().report());
    }

    if errors > 0 {
        Err(miette::miette!("found {errors} error(s)"))
    } else {
        Ok(())
    }
}
