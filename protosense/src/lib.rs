//! Symbol analysis and diagnostics for protobuf source files.
//!
//! A [`Workspace`] owns every stage of the pipeline: the parser facade from
//! [`protosense_parse`], a content-addressed parse cache, the cross-file [`SymbolAnalyzer`] and the
//! [`DiagnosticsEngine`]. Hosts feed it document text and receive positioned [`Diagnostic`]s.
//!
//! # Examples
//!
//! ```
//! use protosense::{Workspace, WorkspaceConfig};
//!
//! let mut workspace = Workspace::new(WorkspaceConfig::default());
//! let diagnostics = workspace.validate_document(
//!     "file:///work/shop/order.proto",
//!     "syntax = \"proto3\";\npackage shop;\nmessage Order { string id = 1; int32 count = 1; }\n",
//! );
//!
//! assert!(diagnostics
//!     .iter()
//!     .any(|d| d.message.starts_with("Duplicate field number 1")));
//! ```
//!
//! ### Error messages
//!
//! Findings can be rendered with [`miette`] by wrapping them in a [`Finding`]:
//!
//! ```text
//!   ⚠ protobuf::naming-convention
//!   │ Message name 'order' should be PascalCase, e.g. 'Order'
//!    ╭─[order.proto:3:1]
//!  3 │ message order {
//!    ·         ──┬──
//!    ·           ╰── warning
//!    ╰────
//!   help: fix: rename to 'Order'
//! ```
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/protosense/0.1.0/")]

pub mod analyzer;
mod cache;
mod case;
pub mod diagnostics;
mod error;
mod paths;
mod render;

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use protosense_parse::{ParseStats, ParserFacade, ProtoFile};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use self::{
    analyzer::{AnalyzerConfig, ResolvedImport, Symbol, SymbolAnalyzer, SymbolKind},
    cache::{content_hash, ParseCache},
    diagnostics::{
        check_breaking_changes, Diagnostic, DiagnosticsEngine, Fix, Settings, Severity,
    },
    error::Error,
    paths::{path_to_uri, uri_to_path},
    render::Finding,
};
pub use protosense_parse;

use self::error::ErrorKind;

/// Options for a [`Workspace`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Directories which imports are relative to, in priority order.
    pub include_paths: Vec<PathBuf>,
    /// A tree-sitter protobuf grammar library. Without one, the fallback parser is used.
    pub grammar_path: Option<PathBuf>,
    /// See [`AnalyzerConfig::lenient_resolution`].
    pub lenient_resolution: bool,
    pub settings: Settings,
}

/// The set of documents known to an editor session.
#[derive(Debug)]
pub struct Workspace {
    parser: ParserFacade,
    cache: ParseCache,
    analyzer: SymbolAnalyzer,
    engine: DiagnosticsEngine,
}

impl Workspace {
    /// Creates a workspace, loading the grammar if one is configured.
    ///
    /// A grammar which fails to load is logged and the workspace continues with the fallback
    /// parser. Use [`Workspace::try_new`] to treat that as an error.
    pub fn new(config: WorkspaceConfig) -> Self {
        let (workspace, result) = Workspace::build(config);
        if let Err(err) = result {
            warn!(error = %err, "continuing without the protobuf grammar");
        }
        workspace
    }

    /// Creates a workspace, failing if a configured grammar cannot be loaded.
    pub fn try_new(config: WorkspaceConfig) -> Result<Self, Error> {
        let (workspace, result) = Workspace::build(config);
        result.map(|()| workspace)
    }

    fn build(config: WorkspaceConfig) -> (Self, Result<(), Error>) {
        let mut parser = ParserFacade::new();
        let result = match &config.grammar_path {
            Some(path) => parser.initialize_grammar(path).map_err(Error::from),
            None => Ok(()),
        };
        if result.is_ok() {
            info!(strategy = ?parser.strategy(), "workspace ready");
        }

        let analyzer = SymbolAnalyzer::new(AnalyzerConfig {
            include_paths: config.include_paths,
            lenient_resolution: config.lenient_resolution,
        });
        let workspace = Workspace {
            parser,
            cache: ParseCache::new(),
            analyzer,
            engine: DiagnosticsEngine::new(config.settings),
        };
        (workspace, result)
    }

    /// Parses `text` as the contents of `uri` and registers it with the analyzer.
    ///
    /// Text which has already been parsed for this document is served from the cache.
    pub fn update_document(&mut self, uri: &str, text: &str) -> Arc<ProtoFile> {
        let hash = content_hash(text);
        if let Some(ast) = self.cache.get(uri, hash) {
            let registered = self
                .analyzer
                .file(uri)
                .is_some_and(|current| Arc::ptr_eq(current, &ast));
            if !registered {
                self.analyzer.update_file(uri, ast.clone());
            }
            return ast;
        }

        let ast = Arc::new(self.parser.parse(text, uri));
        self.cache.insert(uri, hash, ast.clone());
        self.analyzer.update_file(uri, ast.clone());
        ast
    }

    /// Updates the document and runs every enabled check against it.
    pub fn validate_document(&mut self, uri: &str, text: &str) -> Vec<Diagnostic> {
        let ast = self.update_document(uri, text);
        self.engine.validate(uri, &ast, &self.analyzer, Some(text))
    }

    /// Forgets a closed or deleted document.
    pub fn remove_document(&mut self, uri: &str) {
        self.cache.invalidate(uri);
        if self.analyzer.remove_file(uri).is_some() {
            debug!(uri, "removed document");
        }
        self.analyzer.clear_import_resolution_cache();
    }

    /// Compares `text` against `baseline_text`, an earlier version of the document `uri`.
    ///
    /// The current text goes through the cache like any update. The baseline is parsed on its own
    /// and is never registered.
    pub fn breaking_changes(&mut self, uri: &str, text: &str, baseline_text: &str) -> Vec<Diagnostic> {
        let current = self.update_document(uri, text);
        let baseline = self.parser.parse(baseline_text, uri);
        check_breaking_changes(&baseline, &current)
    }

    /// Reads a file from disk, returning its URI and contents.
    ///
    /// Relative paths are taken relative to the current directory.
    pub fn open_file(path: impl AsRef<Path>) -> Result<(String, String), Error> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_owned()
        } else {
            env::current_dir()
                .map_err(|err| {
                    Error::from_kind(ErrorKind::OpenFile {
                        path: path.to_owned(),
                        err,
                    })
                })?
                .join(path)
        };

        let bytes = fs::read(&absolute).map_err(|err| {
            Error::from_kind(ErrorKind::OpenFile {
                path: path.to_owned(),
                err,
            })
        })?;
        let text = String::from_utf8(bytes).map_err(|_| {
            Error::from_kind(ErrorKind::FileInvalidUtf8 {
                path: path.to_owned(),
            })
        })?;
        let uri = path_to_uri(&absolute).ok_or_else(|| {
            Error::from_kind(ErrorKind::InvalidPath {
                path: path.to_owned(),
            })
        })?;
        Ok((uri, text))
    }

    pub fn settings(&self) -> &Settings {
        self.engine.settings()
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.engine.set_settings(settings);
    }

    pub fn parser_stats(&self) -> &ParseStats {
        self.parser.stats()
    }

    pub fn parser(&self) -> &ParserFacade {
        &self.parser
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn analyzer(&self) -> &SymbolAnalyzer {
        &self.analyzer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_json() {
        let config: WorkspaceConfig = serde_json::from_str(
            r#"{
                "includePaths": ["/work/protos"],
                "lenientResolution": true,
                "settings": { "namingConventions": false }
            }"#,
        )
        .unwrap();

        assert_eq!(config.include_paths, [PathBuf::from("/work/protos")]);
        assert_eq!(config.grammar_path, None);
        assert!(config.lenient_resolution);
        assert!(!config.settings.naming_conventions);
        assert!(config.settings.reference_checks);
    }

    #[test]
    fn missing_grammar() {
        let config = WorkspaceConfig {
            grammar_path: Some(PathBuf::from("/nonexistent/tree-sitter-proto.so")),
            ..Default::default()
        };
        let err = Workspace::try_new(config.clone()).unwrap_err();
        assert!(err.is_grammar());

        let mut workspace = Workspace::new(config);
        workspace.update_document("file:///a.proto", "syntax = \"proto3\";");
        assert_eq!(workspace.parser_stats().fallback_uses, 1);
        assert_eq!(workspace.parser_stats().attempts, 0);
    }

    #[test]
    fn open_missing_file() {
        let err = Workspace::open_file("/nonexistent/dir/missing.proto").unwrap_err();
        assert!(err.is_io());
        assert_eq!(
            err.path(),
            Some(&PathBuf::from("/nonexistent/dir/missing.proto"))
        );
    }
}
