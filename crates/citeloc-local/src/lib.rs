use citeloc_core::{DocumentSurface, MatchConfig, MatchResult, NodeId};
use serde::Serialize;

pub mod compare;
pub mod dom;
pub mod highlight;
pub mod matcher;
pub mod segments;
pub mod terms;
pub mod text_index;
pub mod textprep;

pub use dom::Document;
pub use highlight::{ActiveHighlight, HighlightKind, Highlighter};
pub use matcher::match_quote;
pub use segments::extract_segments;
pub use textprep::normalize;

/// What a locate call did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Matched, marked and scrolled into view.
    Highlighted {
        result: MatchResult,
        node: NodeId,
    },
    /// Matched, but no marker could be placed (stale locator and no usable block).
    Aborted { result: MatchResult },
    NotFound,
}

impl Outcome {
    pub fn result(&self) -> Option<&MatchResult> {
        match self {
            Outcome::Highlighted { result, .. } | Outcome::Aborted { result } => Some(result),
            Outcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.result().is_some()
    }
}

/// Locates quotes in a document and keeps at most one of them highlighted.
#[derive(Debug, Default)]
pub struct QuoteLocator {
    config: MatchConfig,
    highlighter: Highlighter,
}

impl QuoteLocator {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            highlighter: Highlighter::new(),
        }
    }

    /// Defaults overridden by `CITELOC_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(MatchConfig::from_env())
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Match without touching the surface.
    pub fn locate(&self, surface: &dyn DocumentSurface, quote: &str) -> Option<MatchResult> {
        match_quote(quote, surface, &self.config)
    }

    /// Clear the previous highlight, wait for the surface to settle, then match and mark.
    ///
    /// The previous highlight is cleared even when this call finds nothing.
    pub fn locate_and_highlight(
        &mut self,
        surface: &mut dyn DocumentSurface,
        quote: &str,
    ) -> Outcome {
        self.highlighter.clear(surface);
        surface.settle();

        let Some(result) = match_quote(quote, surface, &self.config) else {
            tracing::debug!(quote_chars = quote.chars().count(), "quote not found");
            return Outcome::NotFound;
        };
        match self.highlighter.apply(surface, &result) {
            Some(node) => Outcome::Highlighted { result, node },
            None => Outcome::Aborted { result },
        }
    }

    pub fn clear_highlight(&mut self, surface: &mut dyn DocumentSurface) {
        self.highlighter.clear(surface);
    }
}
