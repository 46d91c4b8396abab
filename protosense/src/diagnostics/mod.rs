//! Semantic and stylistic checks over a parsed file.
//!
//! [`DiagnosticsEngine::validate`] runs every enabled check against one document and returns the
//! findings with the ranges they apply to. Checks read the document's tree and query the
//! [`SymbolAnalyzer`] for anything outside it; they never modify either.

mod breaking;
mod enums;
mod fields;
mod naming;
mod options;
mod references;
mod structure;

use std::fmt;

use protosense_parse::{Enum, Message, ProtoFile, Range};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use self::breaking::check_breaking_changes;
use crate::analyzer::{qualify, SymbolAnalyzer};

/// The `source` of every diagnostic.
pub const SOURCE: &str = "protobuf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Information => f.write_str("information"),
            Severity::Hint => f.write_str("hint"),
        }
    }
}

/// An edit which resolves a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fix {
    /// Add `import "path";` to the file.
    AddImport { path: String },
    /// Change an import's path.
    ReplaceImport { from: String, to: String },
    /// Rename the declaration at the diagnostic's range.
    Rename { to: String },
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fix::AddImport { path } => write!(f, "add 'import \"{path}\";'"),
            Fix::ReplaceImport { from, to } => write!(f, "replace '{from}' with '{to}'"),
            Fix::Rename { to } => write!(f, "rename to '{to}'"),
        }
    }
}

/// A finding at a location in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    pub message: String,
    /// Always [`SOURCE`].
    pub source: &'static str,
    /// A stable identifier for the check which produced this finding.
    pub code: Option<&'static str>,
    pub fix: Option<Fix>,
}

impl Diagnostic {
    pub fn new(severity: Severity, range: Range, message: impl Into<String>) -> Self {
        Diagnostic {
            range,
            severity,
            message: message.into(),
            source: SOURCE,
            code: None,
            fix: None,
        }
    }

    pub fn error(range: Range, message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Error, range, message)
    }

    pub fn warning(range: Range, message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Warning, range, message)
    }

    pub fn hint(range: Range, message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Hint, range, message)
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }
}

/// Switches for the optional groups of checks. Everything is enabled by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Declared names follow the protobuf style guide.
    pub naming_conventions: bool,
    /// Type references resolve.
    pub reference_checks: bool,
    /// Imports resolve, are used, and are spelled canonically.
    pub import_checks: bool,
    /// Field numbers are valid, unreserved, ordered and contiguous.
    pub field_tag_checks: bool,
    /// Field numbers are unique within a message.
    pub duplicate_field_checks: bool,
    /// `required` fields, groups and weak imports are flagged.
    pub discouraged_constructs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            naming_conventions: true,
            reference_checks: true,
            import_checks: true,
            field_tag_checks: true,
            duplicate_field_checks: true,
            discouraged_constructs: true,
        }
    }
}

/// Runs the enabled checks against documents.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticsEngine {
    settings: Settings,
}

impl DiagnosticsEngine {
    pub fn new(settings: Settings) -> Self {
        DiagnosticsEngine { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Checks the document `uri`, whose tree is `file`.
    ///
    /// `text` is the source the tree was parsed from. Checks that look at raw lines are skipped
    /// without it.
    pub fn validate(
        &self,
        uri: &str,
        file: &ProtoFile,
        analyzer: &SymbolAnalyzer,
        text: Option<&str>,
    ) -> Vec<Diagnostic> {
        let mut cx = Context {
            uri,
            file,
            analyzer,
            settings: &self.settings,
            text,
            diagnostics: Vec::new(),
        };

        structure::check(&mut cx);
        if self.settings.naming_conventions {
            naming::check(&mut cx);
        }
        fields::check(&mut cx);
        enums::check(&mut cx);
        references::check(&mut cx);
        options::check(&mut cx);

        debug!(uri, count = cx.diagnostics.len(), "validated document");
        cx.diagnostics
    }
}

/// State shared by the checks while validating one document.
pub(crate) struct Context<'a> {
    pub uri: &'a str,
    pub file: &'a ProtoFile,
    pub analyzer: &'a SymbolAnalyzer,
    pub settings: &'a Settings,
    pub text: Option<&'a str>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Context<'_> {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Every message in `file`, including nested messages and group bodies, in declaration order.
///
/// Each entry holds the fully-qualified name, the declared name and the body. For a group the
/// declared name is the group's, since its body is unnamed.
pub(crate) fn all_messages(file: &ProtoFile) -> Vec<(String, &str, &Message)> {
    fn walk<'a>(
        scope: &str,
        name: &'a str,
        m: &'a Message,
        out: &mut Vec<(String, &'a str, &'a Message)>,
    ) {
        let qualified = qualify(scope, name);
        out.push((qualified.clone(), name, m));
        for nested in &m.messages {
            walk(&qualified, &nested.name, nested, out);
        }
        let groups = m.groups.iter().chain(m.oneofs.iter().flat_map(|o| &o.groups));
        for group in groups {
            walk(&qualified, &group.name, &group.body, out);
        }
    }

    let mut out = Vec::new();
    for m in &file.messages {
        walk(file.package_name(), &m.name, m, &mut out);
    }
    out
}

/// Every enum in `file` with the fully-qualified name of its enclosing scope.
pub(crate) fn all_enums(file: &ProtoFile) -> Vec<(String, &Enum)> {
    let mut out: Vec<(String, &Enum)> = file
        .enums
        .iter()
        .map(|e| (file.package_name().to_owned(), e))
        .collect();
    for (qualified, _, message) in all_messages(file) {
        out.extend(message.enums.iter().map(|e| (qualified.clone(), e)));
    }
    out
}
