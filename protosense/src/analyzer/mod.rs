//! The cross-file symbol table and import resolution.

mod resolve;
#[cfg(test)]
mod tests;
mod well_known;

use std::{cell::RefCell, fmt, path::PathBuf, sync::Arc};

use protosense_parse::{Extend, ImportModifier, Message, ProtoFile, Range};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::paths;

/// Settings which change how names and imports are resolved.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Directories which imports are relative to, in priority order.
    pub include_paths: Vec<PathBuf>,
    /// Accept a unique match on the simple name when a type reference does not resolve through
    /// its enclosing scopes.
    pub lenient_resolution: bool,
}

impl AnalyzerConfig {
    fn absolute(mut self) -> Self {
        for include in &mut self.include_paths {
            *include = paths::absolute(include);
        }
        self
    }
}

/// The kind of declaration a [`Symbol`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Message,
    Enum,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Message => f.write_str("message"),
            SymbolKind::Enum => f.write_str("enum"),
        }
    }
}

/// A named type declared in some file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// The name as declared, e.g. `Inner`.
    pub name: String,
    /// The fully-qualified name without a leading dot, e.g. `pkg.Outer.Inner`.
    pub qualified_name: String,
    pub kind: SymbolKind,
    /// The document declaring the type.
    pub uri: String,
    pub name_range: Range,
    pub range: Range,
}

/// An import statement together with the document it refers to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub path: String,
    pub resolved_uri: Option<String>,
    pub modifier: Option<ImportModifier>,
    /// The range of the whole import statement.
    pub range: Range,
    pub path_range: Range,
}

/// Indexes the messages and enums of every registered file by qualified name, and resolves
/// imports between files.
///
/// Registering a URI again replaces everything previously indexed for it. When two files declare
/// the same qualified name, the most recently registered one wins.
pub struct SymbolAnalyzer {
    config: AnalyzerConfig,
    files: FxHashMap<String, Arc<ProtoFile>>,
    symbols: FxHashMap<String, Symbol>,
    /// Fully-qualified extension field names, mapped to the declaring document.
    extensions: FxHashMap<String, String>,
    file_symbols: FxHashMap<String, Vec<String>>,
    file_extensions: FxHashMap<String, Vec<String>>,
    import_cache: RefCell<FxHashMap<(String, String), Option<String>>>,
}

impl fmt::Debug for SymbolAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolAnalyzer")
            .field("config", &self.config)
            .field("files", &self.files.len())
            .field("symbols", &self.symbols.len())
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

impl Default for SymbolAnalyzer {
    fn default() -> Self {
        SymbolAnalyzer::new(AnalyzerConfig::default())
    }
}

impl SymbolAnalyzer {
    /// Creates an analyzer with the well-known files already registered.
    ///
    /// Relative include paths are taken relative to the current directory.
    pub fn new(config: AnalyzerConfig) -> Self {
        let mut analyzer = SymbolAnalyzer {
            config: config.absolute(),
            files: FxHashMap::default(),
            symbols: FxHashMap::default(),
            extensions: FxHashMap::default(),
            file_symbols: FxHashMap::default(),
            file_extensions: FxHashMap::default(),
            import_cache: RefCell::default(),
        };

        for (name, source) in well_known::FILES {
            let file = protosense_parse::parse(source);
            analyzer.update_file(&paths::builtin_uri(name), Arc::new(file));
        }

        analyzer
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Replaces the configuration, dropping memoized import resolutions.
    pub fn set_config(&mut self, config: AnalyzerConfig) {
        self.config = config.absolute();
        self.clear_import_resolution_cache();
    }

    /// Registers the parsed contents of `uri`, replacing anything previously registered for it.
    pub fn update_file(&mut self, uri: &str, file: Arc<ProtoFile>) {
        let replaced = self.unindex(uri);
        if self.files.insert(uri.to_owned(), file.clone()).is_none() {
            // A new document may satisfy imports which previously failed to resolve.
            self.clear_import_resolution_cache();
        }

        let mut symbols = Vec::new();
        collect_symbols(uri, &file, &mut symbols);
        let mut extensions = Vec::new();
        collect_extensions(&file, &mut extensions);

        debug!(
            uri,
            symbols = symbols.len(),
            extensions = extensions.len(),
            "indexed file"
        );

        let names: Vec<String> = symbols.iter().map(|s| s.qualified_name.clone()).collect();
        for symbol in symbols {
            self.symbols.insert(symbol.qualified_name.clone(), symbol);
        }
        for name in &extensions {
            self.extensions.insert(name.clone(), uri.to_owned());
        }
        self.file_symbols.insert(uri.to_owned(), names);
        self.file_extensions.insert(uri.to_owned(), extensions);

        self.restore_shadowed(replaced);
    }

    /// Removes `uri` and everything it declares.
    pub fn remove_file(&mut self, uri: &str) -> Option<Arc<ProtoFile>> {
        let removed = self.unindex(uri);
        self.file_symbols.remove(uri);
        self.file_extensions.remove(uri);
        let file = self.files.remove(uri);
        self.clear_import_resolution_cache();
        self.restore_shadowed(removed);
        file
    }

    /// Drops the entries `uri` owns, returning their names.
    fn unindex(&mut self, uri: &str) -> (Vec<String>, Vec<String>) {
        let symbols = self.file_symbols.get(uri).cloned().unwrap_or_default();
        for name in &symbols {
            if self.symbols.get(name).is_some_and(|s| s.uri == uri) {
                self.symbols.remove(name);
            }
        }

        let extensions = self.file_extensions.get(uri).cloned().unwrap_or_default();
        for name in &extensions {
            if self.extensions.get(name).is_some_and(|owner| owner == uri) {
                self.extensions.remove(name);
            }
        }

        (symbols, extensions)
    }

    /// Re-indexes names which were dropped but are still declared by another file.
    fn restore_shadowed(&mut self, (symbols, extensions): (Vec<String>, Vec<String>)) {
        let missing: FxHashSet<&String> = symbols
            .iter()
            .filter(|name| !self.symbols.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            let mut owners: Vec<&String> = self
                .file_symbols
                .iter()
                .filter(|(_, names)| names.iter().any(|n| missing.contains(n)))
                .map(|(uri, _)| uri)
                .collect();
            owners.sort();

            let mut restored = Vec::new();
            for owner in owners {
                if let Some(file) = self.files.get(owner) {
                    collect_symbols(owner, file, &mut restored);
                }
            }
            for symbol in restored {
                if missing.contains(&symbol.qualified_name) {
                    self.symbols.insert(symbol.qualified_name.clone(), symbol);
                }
            }
        }

        for name in extensions {
            if self.extensions.contains_key(&name) {
                continue;
            }
            let owner = self
                .file_extensions
                .iter()
                .filter(|(_, names)| names.contains(&name))
                .map(|(uri, _)| uri)
                .min();
            if let Some(owner) = owner {
                self.extensions.insert(name, owner.clone());
            }
        }
    }

    pub fn file(&self, uri: &str) -> Option<&Arc<ProtoFile>> {
        self.files.get(uri)
    }

    /// Iterates over every registered document, including the well-known files.
    pub fn files(&self) -> impl Iterator<Item = (&str, &Arc<ProtoFile>)> {
        self.files.iter().map(|(uri, file)| (uri.as_str(), file))
    }

    /// Looks up a symbol by its fully-qualified name, with or without a leading dot.
    pub fn symbol(&self, qualified_name: &str) -> Option<&Symbol> {
        let name = qualified_name.strip_prefix('.').unwrap_or(qualified_name);
        self.symbols.get(name)
    }

    /// The symbols currently indexed for `uri`, in declaration order.
    pub fn symbols_in_file(&self, uri: &str) -> Vec<&Symbol> {
        self.file_symbols
            .get(uri)
            .into_iter()
            .flatten()
            .filter_map(|name| self.symbols.get(name))
            .filter(|symbol| symbol.uri == uri)
            .collect()
    }

    /// Resolves a type reference written inside `container`, the fully-qualified name of the
    /// enclosing scope (a package, or a message nested in one).
    ///
    /// A name with a leading dot is absolute. Otherwise the name is tried relative to the
    /// innermost scope first, then each enclosing scope in turn, and finally as written.
    pub fn resolve_type(&self, type_name: &str, from_uri: &str, container: &str) -> Option<Symbol> {
        let name = compact(type_name);
        if name.is_empty() {
            return None;
        }

        if let Some(symbol) = resolve_in_scope(&self.symbols, &name, container) {
            return Some(symbol.clone());
        }

        if self.config.lenient_resolution && !name.contains('.') {
            let mut candidates = self.symbols.values().filter(|s| s.name == name);
            if let (Some(symbol), None) = (candidates.next(), candidates.next()) {
                debug!(
                    uri = from_uri,
                    name = %name,
                    resolved = %symbol.qualified_name,
                    "resolved type by simple name"
                );
                return Some(symbol.clone());
            }
        }

        None
    }

    /// Resolves the name of an extension field, as used in a custom option, to the document
    /// declaring it.
    pub fn resolve_extension(&self, name: &str, container: &str) -> Option<&str> {
        let name = compact(name);
        if name.is_empty() {
            return None;
        }
        resolve_in_scope(&self.extensions, &name, container).map(String::as_str)
    }

    /// The imports of `uri` in declaration order, each with the document it resolves to.
    pub fn imports_with_resolutions(&self, uri: &str) -> Vec<ResolvedImport> {
        let Some(file) = self.files.get(uri) else {
            return Vec::new();
        };

        file.imports
            .iter()
            .map(|import| ResolvedImport {
                path: import.path.clone(),
                resolved_uri: self.resolve_import(uri, &import.path),
                modifier: import.modifier,
                range: import.range,
                path_range: import.path_range,
            })
            .collect()
    }

    /// The documents directly imported by `uri`.
    pub fn imported_file_uris(&self, uri: &str) -> FxHashSet<String> {
        self.imports_with_resolutions(uri)
            .into_iter()
            .filter_map(|import| import.resolved_uri)
            .collect()
    }

    /// The documents whose types `uri` may reference: its direct imports, plus anything those
    /// re-export through `import public`.
    pub fn visible_file_uris(&self, uri: &str) -> FxHashSet<String> {
        let mut visible = FxHashSet::default();
        let mut stack: Vec<String> = self.imported_file_uris(uri).into_iter().collect();
        while let Some(next) = stack.pop() {
            if !visible.insert(next.clone()) {
                continue;
            }
            stack.extend(self.public_imports(&next));
        }
        visible
    }

    /// The documents re-exported by `uri`, transitively, not including `uri` itself.
    pub(crate) fn public_closure(&self, uri: &str) -> FxHashSet<String> {
        let mut closure = FxHashSet::default();
        let mut stack = self.public_imports(uri);
        while let Some(next) = stack.pop() {
            if next != uri && closure.insert(next.clone()) {
                stack.extend(self.public_imports(&next));
            }
        }
        closure
    }

    fn public_imports(&self, uri: &str) -> Vec<String> {
        self.imports_with_resolutions(uri)
            .into_iter()
            .filter(|import| import.modifier == Some(ImportModifier::Public))
            .filter_map(|import| import.resolved_uri)
            .collect()
    }

    /// Forgets memoized import resolutions. Needed after documents are renamed or deleted.
    pub fn clear_import_resolution_cache(&self) {
        self.import_cache.borrow_mut().clear();
    }
}

/// Removes whitespace, which the parsers keep when a name is split across tokens.
fn compact(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

fn resolve_in_scope<'a, V>(map: &'a FxHashMap<String, V>, name: &str, container: &str) -> Option<&'a V> {
    if let Some(absolute) = name.strip_prefix('.') {
        return map.get(absolute);
    }

    let mut scope = container.trim_matches('.');
    loop {
        if scope.is_empty() {
            return map.get(name);
        }
        if let Some(value) = map.get(&format!("{scope}.{name}")) {
            return Some(value);
        }
        scope = match scope.rfind('.') {
            Some(idx) => &scope[..idx],
            None => "",
        };
    }
}

pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{scope}.{name}")
    }
}

fn collect_symbols(uri: &str, file: &ProtoFile, out: &mut Vec<Symbol>) {
    fn message(uri: &str, scope: &str, m: &Message, out: &mut Vec<Symbol>) {
        if m.name.is_empty() {
            return;
        }
        let qualified_name = qualify(scope, &m.name);
        out.push(Symbol {
            name: m.name.clone(),
            qualified_name: qualified_name.clone(),
            kind: SymbolKind::Message,
            uri: uri.to_owned(),
            name_range: m.name_range,
            range: m.range,
        });
        members(uri, &qualified_name, m, out);
    }

    fn members(uri: &str, scope: &str, m: &Message, out: &mut Vec<Symbol>) {
        for nested in &m.messages {
            message(uri, scope, nested, out);
        }
        // A group declares a nested message type of the same name.
        let groups = m.groups.iter().chain(m.oneofs.iter().flat_map(|o| &o.groups));
        for group in groups {
            let mut body = group.body.clone();
            body.name = group.name.clone();
            body.name_range = group.name_range;
            body.range = group.range;
            message(uri, scope, &body, out);
        }
        for e in &m.enums {
            enumeration(uri, scope, e, out);
        }
    }

    fn enumeration(uri: &str, scope: &str, e: &protosense_parse::Enum, out: &mut Vec<Symbol>) {
        if e.name.is_empty() {
            return;
        }
        out.push(Symbol {
            name: e.name.clone(),
            qualified_name: qualify(scope, &e.name),
            kind: SymbolKind::Enum,
            uri: uri.to_owned(),
            name_range: e.name_range,
            range: e.range,
        });
    }

    let package = file.package_name();
    for m in &file.messages {
        message(uri, package, m, out);
    }
    for e in &file.enums {
        enumeration(uri, package, e, out);
    }
}

fn collect_extensions(file: &ProtoFile, out: &mut Vec<String>) {
    fn extends(scope: &str, extends: &[Extend], out: &mut Vec<String>) {
        for extend in extends {
            let names = extend
                .fields
                .iter()
                .map(|f| &f.name)
                .chain(extend.groups.iter().map(|g| &g.name));
            for name in names.filter(|n| !n.is_empty()) {
                out.push(qualify(scope, name));
            }
        }
    }

    fn message(scope: &str, m: &Message, out: &mut Vec<String>) {
        let scope = qualify(scope, &m.name);
        extends(&scope, &m.extends, out);
        for nested in &m.messages {
            message(&scope, nested, out);
        }
    }

    let package = file.package_name();
    extends(package, &file.extends, out);
    for m in &file.messages {
        message(package, m, out);
    }
}
