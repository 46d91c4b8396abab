use std::path::{Path, PathBuf};

use tracing::trace;

use super::{well_known, SymbolAnalyzer};
use crate::paths::{self, builtin_name, builtin_uri, ends_with, path_to_file_name, strip_prefix};

impl SymbolAnalyzer {
    /// Resolves the import `name` written in the document `from_uri`.
    ///
    /// Candidates are tried in order:
    ///
    /// 1. the built-in well-known files,
    /// 2. registered documents whose path ends with `name`, preferring one found relative to an
    ///    include path or to the importing document,
    /// 3. `name` relative to each include path on disk,
    /// 4. `name` relative to the importing document's directory on disk.
    ///
    /// Results are memoized per importing document and name until
    /// [`clear_import_resolution_cache`](SymbolAnalyzer::clear_import_resolution_cache) is called.
    pub fn resolve_import(&self, from_uri: &str, name: &str) -> Option<String> {
        let key = (from_uri.to_owned(), name.to_owned());
        if let Some(cached) = self.import_cache.borrow().get(&key) {
            return cached.clone();
        }

        let resolved = self.resolve_import_uncached(from_uri, name);
        trace!(from = from_uri, name, resolved = ?resolved, "resolved import");
        self.import_cache.borrow_mut().insert(key, resolved.clone());
        resolved
    }

    fn resolve_import_uncached(&self, from_uri: &str, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }

        if well_known::is_well_known(name) {
            return Some(builtin_uri(name));
        }

        let import = Path::new(name);
        let from_dir = paths::uri_path(from_uri)
            .and_then(|path| path.parent().map(Path::to_owned));
        let roots: Vec<PathBuf> = self
            .config
            .include_paths
            .iter()
            .cloned()
            .chain(from_dir.clone())
            .collect();

        let mut candidates: Vec<(&str, PathBuf)> = self
            .files
            .keys()
            .filter(|uri| uri.as_str() != from_uri && builtin_name(uri).is_none())
            .filter_map(|uri| Some((uri.as_str(), paths::uri_path(uri)?)))
            .filter(|(_, path)| ends_with(path, import))
            .collect();
        candidates.sort();

        let preferred = candidates.iter().find(|(_, path)| {
            roots
                .iter()
                .any(|root| paths::normalize(&root.join(import)) == paths::normalize(path))
        });
        if let Some((uri, _)) = preferred.or_else(|| candidates.first()) {
            return Some((*uri).to_owned());
        }

        for root in &roots {
            let path = root.join(import);
            if path.is_file() {
                if let Some(uri) = paths::path_to_uri(&path) {
                    return Some(uri);
                }
            }
        }

        None
    }

    /// The name under which `from_uri` should import `target_uri`.
    ///
    /// This is the target's path relative to the first include path containing it, or failing
    /// that, relative to the importing document's directory.
    pub fn import_path_for_file(&self, from_uri: &str, target_uri: &str) -> Option<String> {
        if let Some(name) = builtin_name(target_uri) {
            return Some(name.to_owned());
        }

        let target = paths::normalize(&paths::uri_path(target_uri)?);
        for include in &self.config.include_paths {
            let include = paths::normalize(include);
            if let Some(name) = strip_prefix(&target, &include).and_then(path_to_file_name) {
                return Some(name);
            }
        }

        let from_dir = paths::uri_path(from_uri)?.parent().map(paths::normalize)?;
        strip_prefix(&target, &from_dir).and_then(path_to_file_name)
    }
}
