//! Presentation of [`Diagnostic`]s as [`miette`] reports.

use std::fmt;

use miette::{LabeledSpan, NamedSource, SourceCode};
use protosense_parse::LineIndex;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, Severity, SOURCE};

/// A [`Diagnostic`] bundled with the source it refers to, so it can be printed by a
/// [`miette`] report handler.
#[derive(Error)]
#[error("{message}")]
pub struct Finding {
    message: String,
    severity: Severity,
    code: Option<&'static str>,
    help: Option<String>,
    span: (usize, usize),
    src: NamedSource,
}

impl Finding {
    /// Attaches `text`, the contents of the document called `name`, to `diagnostic`.
    pub fn new(name: impl AsRef<str>, text: &str, diagnostic: &Diagnostic) -> Self {
        let index = LineIndex::new(text);
        let start = index.offset(diagnostic.range.start);
        let end = index.offset(diagnostic.range.end).max(start);

        Finding {
            message: diagnostic.message.clone(),
            severity: diagnostic.severity,
            code: diagnostic.code,
            help: diagnostic.fix.as_ref().map(|fix| fix.to_string()),
            span: (start, end - start),
            src: NamedSource::new(name, text.to_owned()),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl fmt::Debug for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finding")
            .field("message", &self.message)
            .field("severity", &self.severity)
            .field("code", &self.code)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

impl miette::Diagnostic for Finding {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.code
            .map(|code| Box::new(format!("{}::{code}", SOURCE)) as Box<dyn fmt::Display + 'a>)
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Information | Severity::Hint => miette::Severity::Advice,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|help| Box::new(format!("fix: {help}")) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.severity.to_string()),
            self.span,
        ))))
    }
}
