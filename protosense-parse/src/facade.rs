use std::{
    any::Any,
    fmt::Write,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::Arc,
    time::SystemTime,
};

use tracing::{debug, trace, warn};

use crate::{
    ast::ProtoFile,
    fallback,
    grammar::{GrammarError, GrammarParser},
};

/// Consecutive grammar failures are logged at warning level on the first and every this many.
const WARN_EVERY: u64 = 10;

/// Which parser the facade tries first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The tree-sitter grammar, falling back to the pattern-based parser on failure.
    Grammar,
    /// The pattern-based parser only.
    #[default]
    Fallback,
}

/// The most recent grammar failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub message: String,
    pub at: SystemTime,
}

/// Cumulative counters describing how parses were served.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseStats {
    /// Parses attempted with the grammar.
    pub attempts: u64,
    /// Grammar parses which produced a tree.
    pub successes: u64,
    /// Grammar parses which failed and fell back.
    pub failures: u64,
    /// Parses served by the fallback parser, whether by choice or after a failure.
    pub fallback_uses: u64,
    pub last_error: Option<LastError>,
}

impl ParseStats {
    /// The number of parse requests served.
    pub fn total_parses(&self) -> u64 {
        self.successes + self.fallback_uses
    }

    /// The fraction of grammar attempts which succeeded, if there were any.
    pub fn success_rate(&self) -> Option<f64> {
        if self.attempts == 0 {
            None
        } else {
            Some(self.successes as f64 / self.attempts as f64)
        }
    }

    /// Renders the statistics as text for troubleshooting.
    pub fn report(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "total parses: {}", self.total_parses());
        let _ = writeln!(
            report,
            "grammar attempts: {}, successes: {}, failures: {}",
            self.attempts, self.successes, self.failures
        );
        let _ = writeln!(report, "fallback uses: {}", self.fallback_uses);
        match self.success_rate() {
            Some(rate) => {
                let _ = writeln!(report, "success rate: {:.1}%", rate * 100.0);
            }
            None => {
                let _ = writeln!(report, "success rate: n/a");
            }
        }
        if let Some(last) = &self.last_error {
            let ago = SystemTime::now()
                .duration_since(last.at)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let _ = writeln!(report, "last error ({ago}s ago): {}", last.message);
        }
        report
    }
}

/// Chooses a parser for each request and guarantees a result.
///
/// With [`Strategy::Grammar`] the tree-sitter parser is tried first. Any error it returns, and
/// any panic inside it, is recorded in the statistics and the fallback parser is used instead.
#[derive(Debug, Default)]
pub struct ParserFacade {
    strategy: Strategy,
    grammar: GrammarParser,
    stats: ParseStats,
    consecutive_failures: u64,
    init_failure_logged: bool,
}

impl ParserFacade {
    /// Creates a facade using only the fallback parser.
    pub fn new() -> Self {
        ParserFacade::default()
    }

    /// Loads the grammar and switches to [`Strategy::Grammar`] if that succeeds.
    ///
    /// On failure the facade stays on the fallback parser.
    pub fn initialize_grammar(&mut self, path: impl AsRef<Path>) -> Result<(), Arc<GrammarError>> {
        match self.grammar.initialize(path) {
            Ok(()) => {
                self.strategy = Strategy::Grammar;
                Ok(())
            }
            Err(err) => {
                self.log_init_failure(&err.to_string());
                Err(err)
            }
        }
    }

    /// Selects the strategy for subsequent parses.
    ///
    /// Selecting [`Strategy::Grammar`] is refused, leaving the fallback strategy in place, if the
    /// grammar is not loaded. Returns whether the requested strategy is now active.
    pub fn set_strategy(&mut self, strategy: Strategy) -> bool {
        if strategy == Strategy::Grammar && !self.grammar.is_initialized() {
            let reason = match self.grammar.init_error() {
                Some(err) => err.to_string(),
                None => GrammarError::NotInitialized.to_string(),
            };
            self.log_init_failure(&reason);
            self.strategy = Strategy::Fallback;
            return false;
        }

        self.strategy = strategy;
        true
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn grammar(&self) -> &GrammarParser {
        &self.grammar
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ParseStats::default();
        self.consecutive_failures = 0;
    }

    /// Parses `text`, which belongs to the document `uri`. Never fails.
    pub fn parse(&mut self, text: &str, uri: &str) -> ProtoFile {
        if self.strategy == Strategy::Grammar && self.grammar.is_initialized() {
            self.stats.attempts += 1;

            let grammar = &self.grammar;
            let result = panic::catch_unwind(AssertUnwindSafe(|| grammar.parse(text)))
                .unwrap_or_else(|payload| Err(GrammarError::Panicked(panic_message(&*payload))));

            match result {
                Ok(file) => {
                    self.stats.successes += 1;
                    self.consecutive_failures = 0;
                    trace!(uri, "parsed with grammar");
                    return file;
                }
                Err(err) => self.record_failure(uri, &err),
            }
        }

        self.stats.fallback_uses += 1;
        trace!(uri, "parsed with fallback parser");
        fallback::parse(text)
    }

    fn record_failure(&mut self, uri: &str, err: &GrammarError) {
        self.stats.failures += 1;
        self.stats.last_error = Some(LastError {
            message: err.to_string(),
            at: SystemTime::now(),
        });
        self.consecutive_failures += 1;

        let consecutive = self.consecutive_failures;
        if consecutive == 1 || consecutive % WARN_EVERY == 0 {
            warn!(uri, error = %err, consecutive, "grammar parser failed, using fallback parser");
        } else {
            debug!(uri, error = %err, consecutive, "grammar parser failed, using fallback parser");
        }
    }

    fn log_init_failure(&mut self, reason: &str) {
        if !self.init_failure_logged {
            self.init_failure_logged = true;
            warn!(reason, "grammar parser unavailable, using fallback parser");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_by_default() {
        let mut facade = ParserFacade::new();
        assert_eq!(facade.strategy(), Strategy::Fallback);

        let file = facade.parse("message User { string name = 1; }", "file:///user.proto");
        assert_eq!(file.messages[0].name, "User");

        let stats = facade.stats();
        assert_eq!(stats.attempts, 0);
        assert_eq!(stats.fallback_uses, 1);
        assert_eq!(stats.total_parses(), 1);
        assert_eq!(stats.success_rate(), None);
    }

    #[test]
    fn grammar_strategy_rejected_without_grammar() {
        let mut facade = ParserFacade::new();
        assert!(!facade.set_strategy(Strategy::Grammar));
        assert_eq!(facade.strategy(), Strategy::Fallback);

        assert!(facade
            .initialize_grammar("/nonexistent/tree-sitter-proto.so")
            .is_err());
        assert!(!facade.set_strategy(Strategy::Grammar));
        assert_eq!(facade.strategy(), Strategy::Fallback);
        assert!(facade.set_strategy(Strategy::Fallback));
    }

    #[test]
    fn never_fails() {
        let mut facade = ParserFacade::new();
        for source in ["", "// only a comment", "{{{{invalid proto content}}}}", "message"] {
            let file = facade.parse(source, "file:///x.proto");
            assert!(file.syntax_errors.is_empty());
        }
        assert_eq!(facade.stats().fallback_uses, 4);
    }

    #[test]
    fn failures_are_recorded() {
        let mut facade = ParserFacade::new();
        for _ in 0..12 {
            facade.record_failure("file:///x.proto", &GrammarError::ParseFailed);
        }

        let stats = facade.stats();
        assert_eq!(stats.failures, 12);
        assert_eq!(
            stats.last_error.as_ref().map(|e| e.message.as_str()),
            Some("the grammar parser did not produce a tree")
        );
        assert!(stats.report().contains("last error"));

        facade.reset_stats();
        assert_eq!(facade.stats(), &ParseStats::default());
        assert_eq!(facade.consecutive_failures, 0);
    }

    #[test]
    fn report() {
        let stats = ParseStats {
            attempts: 4,
            successes: 3,
            failures: 1,
            fallback_uses: 1,
            last_error: None,
        };
        let report = stats.report();
        assert!(report.contains("total parses: 4"));
        assert!(report.contains("success rate: 75.0%"));
        assert!(report.contains("fallback uses: 1"));
    }

    #[test]
    fn panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(5);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
