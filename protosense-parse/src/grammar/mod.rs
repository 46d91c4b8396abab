//! The grammar-based parser, backed by a tree-sitter grammar loaded from a shared library.
//!
//! The grammar is loaded at most once per [`GrammarParser`]. Loading is guarded by a
//! [`OnceCell`], so callers racing to initialize block on the single load in flight and then all
//! observe its result. A later call with a different path does not reload anything. There is no
//! teardown: the library stays mapped until the parser is dropped.

mod lower;
#[cfg(test)]
mod tests;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, info};
use tree_sitter::{Language, LanguageError, Parser, Tree};
use tree_sitter_language::LanguageFn;

use crate::ast::ProtoFile;

/// The symbol exported by a compiled protobuf grammar.
pub const LANGUAGE_SYMBOL: &str = "tree_sitter_proto";

/// An error from loading the grammar or running it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GrammarError {
    /// The grammar library does not exist.
    #[error("grammar library not found: {}", path.display())]
    NotFound {
        /// The path that was tried.
        path: PathBuf,
    },
    /// The shared library could not be loaded.
    #[error("failed to load grammar library {}", path.display())]
    Load {
        /// The library path.
        path: PathBuf,
        /// The loader error.
        #[source]
        source: libloading::Error,
    },
    /// The library does not export the language function.
    #[error("grammar library {} does not export '{LANGUAGE_SYMBOL}'", path.display())]
    MissingSymbol {
        /// The library path.
        path: PathBuf,
        /// The loader error.
        #[source]
        source: libloading::Error,
    },
    /// The grammar was built for an incompatible version of tree-sitter.
    #[error("incompatible grammar")]
    Language(#[from] LanguageError),
    /// [`GrammarParser::initialize`] has not succeeded.
    #[error("the grammar parser is not initialized")]
    NotInitialized,
    /// tree-sitter returned no tree.
    #[error("the grammar parser did not produce a tree")]
    ParseFailed,
    /// The parser panicked.
    #[error("the grammar parser panicked: {0}")]
    Panicked(String),
}

struct LoadedGrammar {
    language: Language,
    path: PathBuf,
    // Declared last so it is dropped after `language`, which points into it.
    _library: Library,
}

/// Parses protobuf source with a tree-sitter grammar and lowers the tree to a [`ProtoFile`].
#[derive(Default)]
pub struct GrammarParser {
    state: OnceCell<Result<LoadedGrammar, Arc<GrammarError>>>,
}

impl fmt::Debug for GrammarParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.get() {
            None => "uninitialized".to_owned(),
            Some(Ok(loaded)) => format!("loaded from {}", loaded.path.display()),
            Some(Err(err)) => format!("failed: {err}"),
        };
        f.debug_struct("GrammarParser").field("state", &state).finish()
    }
}

impl GrammarParser {
    /// Creates a parser with no grammar loaded.
    pub fn new() -> Self {
        GrammarParser::default()
    }

    /// Loads the grammar from the shared library at `path`.
    ///
    /// Only the first call loads anything. Every call, including concurrent ones, returns the
    /// result of that first load.
    pub fn initialize(&self, path: impl AsRef<Path>) -> Result<(), Arc<GrammarError>> {
        let path = path.as_ref();
        let state = self.state.get_or_init(|| {
            info!(path = %path.display(), "loading protobuf grammar");
            load(path).map_err(Arc::new)
        });

        match state {
            Ok(loaded) => {
                if loaded.path != path {
                    debug!(
                        requested = %path.display(),
                        loaded = %loaded.path.display(),
                        "grammar already initialized"
                    );
                }
                Ok(())
            }
            Err(err) => Err(err.clone()),
        }
    }

    /// Returns `true` if a grammar was loaded successfully.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state.get(), Some(Ok(_)))
    }

    /// The reason initialization failed, if it did.
    pub fn init_error(&self) -> Option<Arc<GrammarError>> {
        match self.state.get() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Parses `text` into a concrete syntax tree.
    pub fn parse_cst(&self, text: &str) -> Result<Tree, GrammarError> {
        let loaded = match self.state.get() {
            Some(Ok(loaded)) => loaded,
            _ => return Err(GrammarError::NotInitialized),
        };

        let mut parser = Parser::new();
        parser.set_language(&loaded.language)?;
        parser.parse(text, None).ok_or(GrammarError::ParseFailed)
    }

    /// Parses `text` and lowers the tree into a [`ProtoFile`].
    ///
    /// Error and missing nodes in the tree become entries in `syntax_errors`.
    pub fn parse(&self, text: &str) -> Result<ProtoFile, GrammarError> {
        let tree = self.parse_cst(text)?;
        Ok(lower::lower(&tree, text))
    }
}

#[allow(unsafe_code)]
fn load(path: &Path) -> Result<LoadedGrammar, GrammarError> {
    if !path.exists() {
        return Err(GrammarError::NotFound {
            path: path.to_owned(),
        });
    }

    // SAFETY: loading a library runs its initialization routines. Grammars generated by
    // tree-sitter have none beyond static data.
    let library = unsafe { Library::new(path) }.map_err(|source| GrammarError::Load {
        path: path.to_owned(),
        source,
    })?;

    let language = {
        // SAFETY: generated grammars export the language function with exactly this signature.
        let symbol: Symbol<unsafe extern "C" fn() -> *const ()> =
            unsafe { library.get(LANGUAGE_SYMBOL.as_bytes()) }.map_err(|source| {
                GrammarError::MissingSymbol {
                    path: path.to_owned(),
                    source,
                }
            })?;
        // SAFETY: the function pointer is valid while `library` is loaded, and `LoadedGrammar`
        // keeps it loaded for as long as the language exists.
        let language_fn = unsafe { LanguageFn::from_raw(*symbol) };
        Language::new(language_fn)
    };

    // Setting the language checks the grammar's ABI version.
    Parser::new().set_language(&language)?;

    Ok(LoadedGrammar {
        language,
        path: path.to_owned(),
        _library: library,
    })
}
