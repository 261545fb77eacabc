//! Quote matching: figure/table routing plus an ordered cascade of text strategies.
//!
//! Strategies run from highest precision to lowest and the first success wins outright; there is
//! no cross-strategy scoring. Each strategy reports the literal string it searched for, because
//! the highlighted span is that string's occurrence, not the original quote.

use crate::compare::{significant_words, similarity};
use crate::segments::extract_segments;
use crate::terms;
use crate::text_index::TextIndex;
use crate::textprep::{has_p_value, is_strippable_punct, strip_markdown_emphasis, MappedText};
use citeloc_core::{
    DocumentSurface, MatchConfig, MatchResult, Segment, SegmentKind, StrategyKind,
};
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;
use std::ops::Range;

/// Score given to a figure whose label ("Figure 2") equals the quote's label.
const LABEL_MATCH_SCORE: f64 = 0.9;

static FIGURE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fig(?:ure)?s?\.?|table|chart|graph|plot|image)\s*(\d+)\b")
        .expect("figure label regex")
});

/// Which rewrite of the document a strategy searches in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Lowercased only.
    Lower,
    /// Lowercased, p-values canonicalized.
    PValues,
    /// Lowercased, whitespace runs collapsed.
    Whitespace,
    /// Lowercased, clause/quote punctuation removed, whitespace collapsed.
    Punctuation,
}

impl View {
    fn apply(self, base: &MappedText) -> MappedText {
        match self {
            View::Lower => base.lowercase(),
            View::PValues => base.lowercase().canonicalize_p_values(),
            View::Whitespace => base.lowercase().collapse_whitespace(),
            View::Punctuation => base
                .lowercase()
                .strip_chars(is_strippable_punct)
                .collapse_whitespace(),
        }
    }

    /// Rewrite a needle the same way the document was rewritten.
    pub fn prepare(self, needle: &str) -> String {
        self.apply(&MappedText::new(needle)).as_str().trim().to_string()
    }
}

/// Everything a strategy may look at for one search call. Views and segments are built lazily.
pub struct Corpus<'a> {
    surface: &'a dyn DocumentSurface,
    config: &'a MatchConfig,
    index: TextIndex,
    base: MappedText,
    lower: OnceCell<MappedText>,
    p_values: OnceCell<MappedText>,
    whitespace: OnceCell<MappedText>,
    punctuation: OnceCell<MappedText>,
    segments: OnceCell<Vec<Segment>>,
}

impl<'a> Corpus<'a> {
    pub fn new(surface: &'a dyn DocumentSurface, config: &'a MatchConfig) -> Self {
        let index = TextIndex::build(surface, surface.root());
        let base = MappedText::new(index.text());
        Self {
            surface,
            config,
            index,
            base,
            lower: OnceCell::new(),
            p_values: OnceCell::new(),
            whitespace: OnceCell::new(),
            punctuation: OnceCell::new(),
            segments: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        self.config
    }

    pub fn text(&self) -> &str {
        self.index.text()
    }

    fn view(&self, v: View) -> &MappedText {
        let cell = match v {
            View::Lower => &self.lower,
            View::PValues => &self.p_values,
            View::Whitespace => &self.whitespace,
            View::Punctuation => &self.punctuation,
        };
        cell.get_or_init(|| v.apply(&self.base))
    }

    pub fn segments(&self) -> &[Segment] {
        self.segments.get_or_init(|| {
            let segs: Vec<Segment> = extract_segments(self.surface, self.config).collect();
            tracing::debug!(segments = segs.len(), "extracted segments");
            segs
        })
    }

    /// Find an already-prepared needle in a view; `word` requires non-alphanumeric neighbours.
    pub fn find_prepared(&self, v: View, needle: &str, word: bool) -> Option<Range<usize>> {
        let view = self.view(v);
        if word {
            view.find_word(needle)
        } else {
            view.find(needle)
        }
    }

    /// Prepare `needle` for `v` and search for it.
    pub fn find(&self, v: View, needle: &str) -> Option<Range<usize>> {
        self.find_prepared(v, &v.prepare(needle), false)
    }

    /// Build a result for a document byte range.
    pub fn result(
        &self,
        range: Range<usize>,
        search_quote: &str,
        strategy: StrategyKind,
        score: f64,
    ) -> Option<MatchResult> {
        let locator = self.index.locator(self.surface, range.clone())?;
        Some(MatchResult {
            locator,
            matched_substring: self.index.text().get(range)?.to_string(),
            search_quote: search_quote.to_string(),
            strategy,
            score: score.clamp(0.0, 1.0),
            exact_bounds: strategy == StrategyKind::DomainTerm
                || terms::is_domain_term(search_quote),
        })
    }
}

/// Share of the quote covered by the string actually searched.
fn coverage(search: &str, quote: &str) -> f64 {
    let q = quote.chars().count();
    if q == 0 {
        return 0.0;
    }
    (search.chars().count() as f64 / q as f64).min(1.0)
}

/// One heuristic of the cascade.
pub trait MatchStrategy {
    fn kind(&self) -> StrategyKind;
    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult>;
}

/// Shared shape of the "rewrite, then substring search" strategies.
fn substring_attempt(
    corpus: &Corpus<'_>,
    v: View,
    search: &str,
    quote: &str,
    kind: StrategyKind,
) -> Option<MatchResult> {
    let search = search.trim();
    if search.is_empty() {
        return None;
    }
    let range = corpus.find(v, search)?;
    corpus.result(range, search, kind, coverage(search, quote))
}

pub struct Exact;

impl MatchStrategy for Exact {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Exact
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        substring_attempt(corpus, View::Lower, quote, quote, self.kind())
    }
}

pub struct TrailingEllipsis;

impl MatchStrategy for TrailingEllipsis {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrailingEllipsis
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let head = terms::strip_trailing_ellipsis(quote)?;
        substring_attempt(corpus, View::Lower, &head, quote, self.kind())
    }
}

pub struct InternalEllipsis;

impl MatchStrategy for InternalEllipsis {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InternalEllipsis
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let clauses = terms::ellipsis_clauses(quote);
        let min = corpus.config().min_clause_chars;
        let mut candidates: Vec<&String> = Vec::new();
        if let Some(first) = clauses.first() {
            candidates.push(first);
        }
        if let Some(last) = clauses.last() {
            if clauses.len() > 1 {
                candidates.push(last);
            }
        }
        candidates
            .into_iter()
            .filter(|c| c.chars().count() >= min)
            .find_map(|c| substring_attempt(corpus, View::Lower, c, quote, self.kind()))
    }
}

pub struct PValue;

impl MatchStrategy for PValue {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PValue
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let clean = strip_markdown_emphasis(quote);
        if !has_p_value(&clean) {
            return None;
        }
        substring_attempt(corpus, View::PValues, &clean, quote, self.kind())
    }
}

pub struct Whitespace;

impl MatchStrategy for Whitespace {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Whitespace
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let clean = strip_markdown_emphasis(quote);
        substring_attempt(corpus, View::Whitespace, &clean, quote, self.kind())
    }
}

pub struct Punctuation;

impl MatchStrategy for Punctuation {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Punctuation
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let clean = strip_markdown_emphasis(quote);
        substring_attempt(corpus, View::Punctuation, &clean, quote, self.kind())
    }
}

pub struct DomainTerm;

impl MatchStrategy for DomainTerm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DomainTerm
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        terms::domain_terms(quote).into_iter().find_map(|term| {
            let needle = View::Lower.prepare(&term);
            let range = corpus.find_prepared(View::Lower, &needle, true)?;
            corpus.result(range, &term, self.kind(), coverage(&term, quote))
        })
    }
}

pub struct ProgressiveWindow;

impl MatchStrategy for ProgressiveWindow {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProgressiveWindow
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let cfg = corpus.config();
        if quote.chars().count() <= cfg.window_min_quote_chars {
            return None;
        }
        let prepared = View::Punctuation.prepare(&strip_markdown_emphasis(quote));
        let words: Vec<&str> = prepared.split_whitespace().collect();
        let n = words.len();
        if n <= cfg.window_min_words {
            return None;
        }
        for size in (cfg.window_min_words..n).rev() {
            let slack = n - size;
            let mut offsets: Vec<usize> = Vec::with_capacity(3);
            for off in [0, slack, slack / 2] {
                if !offsets.contains(&off) {
                    offsets.push(off);
                }
            }
            for off in offsets.into_iter().take(cfg.window_offsets.max(1)) {
                let window = words[off..off + size].join(" ");
                if let Some(range) = corpus.find_prepared(View::Punctuation, &window, false) {
                    tracing::debug!(size, offset = off, words = n, "window matched");
                    return corpus.result(range, &window, self.kind(), size as f64 / n as f64);
                }
            }
        }
        None
    }
}

pub struct DistinctivePhrase;

impl MatchStrategy for DistinctivePhrase {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DistinctivePhrase
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let cfg = corpus.config();
        if quote.chars().count() <= cfg.phrase_min_quote_chars {
            return None;
        }
        terms::distinctive_phrases(quote, cfg.phrase_min_chars)
            .into_iter()
            .find_map(|p| substring_attempt(corpus, View::Punctuation, &p, quote, self.kind()))
    }
}

/// Single content words, in quote order.
///
/// With `short_only` the strategy only fires for quotes under `short_quote_chars`; the unrestricted
/// variant is the cascade's last resort.
pub struct SignificantWord {
    pub short_only: bool,
}

impl MatchStrategy for SignificantWord {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SignificantWord
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let cfg = corpus.config();
        if self.short_only && quote.chars().count() >= cfg.short_quote_chars {
            return None;
        }
        if !self.short_only && !cfg.last_resort_word {
            return None;
        }
        let words = significant_words(quote, cfg.min_significant_word_chars);
        let hit = words.iter().find_map(|w| {
            let needle = View::Lower.prepare(w);
            corpus
                .find_prepared(View::Lower, &needle, true)
                .map(|r| (w, r))
        });
        let (word, range) = match hit {
            Some(h) => h,
            None => words.iter().find_map(|w| {
                let needle = View::Lower.prepare(w);
                corpus
                    .find_prepared(View::Lower, &needle, false)
                    .map(|r| (w, r))
            })?,
        };
        corpus.result(range, word, self.kind(), coverage(word, quote))
    }
}

/// Best prose segment by [`similarity`]; strictly greater wins, so ties go to the earlier segment.
pub struct SentenceSimilarity;

impl MatchStrategy for SentenceSimilarity {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SentenceSimilarity
    }

    fn attempt(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        let mut best: Option<(&Segment, f64)> = None;
        for seg in corpus.segments() {
            if !matches!(
                seg.kind,
                SegmentKind::ProseSentence | SegmentKind::HeadingOrCaption
            ) {
                continue;
            }
            let s = similarity(quote, &seg.raw);
            if best.map(|(_, b)| s > b).unwrap_or(true) {
                best = Some((seg, s));
            }
        }
        let (seg, score) = best?;
        tracing::debug!(score, "best sentence similarity");
        if score <= corpus.config().sentence_threshold {
            return None;
        }
        Some(MatchResult {
            locator: seg.locator.clone(),
            matched_substring: seg.raw.clone(),
            search_quote: quote.to_string(),
            strategy: self.kind(),
            score,
            exact_bounds: false,
        })
    }
}

/// An ordered list of strategies; the first to succeed wins.
pub struct Cascade {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

/// Strict to fuzzy. The final unrestricted [`SignificantWord`] runs after [`SentenceSimilarity`]
/// has rejected every sentence, so a quote scoring under `sentence_threshold` can still land on a
/// single shared word; `MatchConfig::last_resort_word = false` turns that step off.
impl Default for Cascade {
    fn default() -> Self {
        Self::new(vec![
            Box::new(Exact),
            Box::new(TrailingEllipsis),
            Box::new(InternalEllipsis),
            Box::new(PValue),
            Box::new(Whitespace),
            Box::new(Punctuation),
            Box::new(DomainTerm),
            Box::new(ProgressiveWindow),
            Box::new(DistinctivePhrase),
            Box::new(SignificantWord { short_only: true }),
            Box::new(SentenceSimilarity),
            Box::new(SignificantWord { short_only: false }),
        ])
    }
}

impl Cascade {
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn run(&self, quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
        for s in &self.strategies {
            if let Some(r) = s.attempt(quote, corpus) {
                tracing::debug!(
                    strategy = s.kind().as_str(),
                    score = r.score,
                    search_quote = %r.search_quote,
                    "quote matched"
                );
                return Some(r);
            }
        }
        tracing::debug!("no strategy matched");
        None
    }
}

fn figure_label(s: &str) -> Option<(String, String)> {
    let c = FIGURE_LABEL.captures(s)?;
    let kind = c[1].to_lowercase();
    let kind = if kind.starts_with("fig") {
        "figure".to_string()
    } else {
        kind
    };
    Some((kind, c[2].to_string()))
}

/// The quote's label, if the quote is little more than that label ("Figure 2", "see Table 1").
fn bare_label(quote: &str, min_word_chars: usize) -> Option<(String, String)> {
    let label = figure_label(quote)?;
    let rest = FIGURE_LABEL.replace(quote, " ");
    significant_words(&rest, min_word_chars)
        .is_empty()
        .then_some(label)
}

/// Visual-element branch: images (alt, title, caption), then table captions, then link text,
/// each in document order. The first element above its threshold wins; a quote that is just a
/// label also accepts the first element carrying the same label.
pub fn match_figure(quote: &str, corpus: &Corpus<'_>) -> Option<MatchResult> {
    if !terms::is_figure_reference(quote) {
        return None;
    }
    let cfg = corpus.config();
    let label = bare_label(quote, cfg.min_significant_word_chars);
    let groups: [(&[SegmentKind], f64); 3] = [
        (
            &[
                SegmentKind::ImageAlt,
                SegmentKind::ImageTitle,
                SegmentKind::FigureCaption,
            ],
            cfg.figure_threshold,
        ),
        (&[SegmentKind::TableCaption], cfg.figure_threshold),
        (&[SegmentKind::LinkText], cfg.link_threshold),
    ];
    for (kinds, threshold) in groups {
        for seg in corpus.segments().iter().filter(|s| kinds.contains(&s.kind)) {
            let sim = similarity(quote, &seg.raw);
            let same_label = label.is_some() && figure_label(&seg.raw) == label;
            if sim > threshold || same_label {
                let score = if same_label {
                    sim.max(LABEL_MATCH_SCORE)
                } else {
                    sim
                };
                return Some(MatchResult {
                    locator: seg.locator.clone(),
                    matched_substring: seg.raw.clone(),
                    search_quote: quote.to_string(),
                    strategy: StrategyKind::Figure,
                    score,
                    exact_bounds: false,
                });
            }
        }
    }
    tracing::debug!("figure reference without a matching visual element; trying prose");
    None
}

/// Locate `quote` in the document. Pure: the surface is only read.
pub fn match_quote(
    quote: &str,
    surface: &dyn DocumentSurface,
    config: &MatchConfig,
) -> Option<MatchResult> {
    let quote = quote.trim();
    if quote.is_empty() {
        return None;
    }
    let corpus = Corpus::new(surface, config);
    if let Some(r) = match_figure(quote, &corpus) {
        return Some(r);
    }
    Cascade::default().run(quote, &corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use citeloc_core::Locator;

    fn run(html: &str, quote: &str) -> Option<MatchResult> {
        let doc = Document::parse(html);
        match_quote(quote, &doc, &MatchConfig::default())
    }

    fn attempt(strategy: &dyn MatchStrategy, html: &str, quote: &str) -> Option<MatchResult> {
        let doc = Document::parse(html);
        let cfg = MatchConfig::default();
        let corpus = Corpus::new(&doc, &cfg);
        strategy.attempt(quote, &corpus)
    }

    const PAPER: &str = "<h1>Clopidogrel response and CYP2C19</h1>\
        <p>Carriers of the loss-of-function allele showed reduced platelet inhibition. \
        The rs4244285 variant was the most common in this cohort.</p>\
        <p>HbA1c decreased by 1.2% (P < 0.05) after treatment with metformin.</p>";

    #[test]
    fn exact_match_returns_literal_substring() {
        let q = "showed reduced platelet inhibition";
        let r = run(PAPER, q).unwrap();
        assert_eq!(r.strategy, StrategyKind::Exact);
        assert_eq!(r.matched_substring, q);
        assert_eq!(r.score, 1.0);
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let r = run(PAPER, "CARRIERS OF THE LOSS-OF-FUNCTION ALLELE").unwrap();
        assert_eq!(r.strategy, StrategyKind::Exact);
        assert_eq!(r.matched_substring, "Carriers of the loss-of-function allele");
    }

    #[test]
    fn trailing_ellipsis_is_dropped() {
        let r = run(PAPER, "The rs4244285 variant was the most common...").unwrap();
        assert_eq!(r.strategy, StrategyKind::TrailingEllipsis);
        assert_eq!(r.search_quote, "The rs4244285 variant was the most common");
    }

    #[test]
    fn internal_ellipsis_tries_first_then_last_clause() {
        let r = run(
            PAPER,
            "clause that is not in the paper at all ... was the most common in this cohort",
        )
        .unwrap();
        assert_eq!(r.strategy, StrategyKind::InternalEllipsis);
        assert_eq!(r.matched_substring, "was the most common in this cohort");
    }

    #[test]
    fn p_value_notation_is_canonicalized_on_both_sides() {
        let r = run(PAPER, "HbA1c decreased by 1.2% (p<.05)").unwrap();
        assert_eq!(r.strategy, StrategyKind::PValue);
        assert_eq!(r.matched_substring, "HbA1c decreased by 1.2% (P < 0.05)");
    }

    #[test]
    fn whitespace_runs_are_collapsed() {
        let html = "<p>Platelet reactivity was\n   measured at baseline and after loading.</p>";
        let r = run(html, "platelet reactivity was measured at baseline").unwrap();
        assert_eq!(r.strategy, StrategyKind::Whitespace);
        assert_eq!(r.matched_substring, "Platelet reactivity was\n   measured at baseline");
    }

    #[test]
    fn clause_punctuation_is_ignored() {
        let html = "<p>Older patients, women, and smokers had higher exposure.</p>";
        let r = run(html, "Older patients women and smokers had higher exposure").unwrap();
        assert_eq!(r.strategy, StrategyKind::Punctuation);
        assert_eq!(
            r.matched_substring,
            "Older patients, women, and smokers had higher exposure"
        );
    }

    #[test]
    fn domain_term_alone_is_enough() {
        let r = run(PAPER, "rs4244285 genotype").unwrap();
        assert_eq!(r.strategy, StrategyKind::DomainTerm);
        assert_eq!(r.matched_substring, "rs4244285");
        assert!(r.exact_bounds);
    }

    #[test]
    fn progressive_window_recovers_altered_word() {
        let doc_sentence = "In this randomized trial the participants who received the standard \
            loading dose showed markedly lower platelet aggregation when measured one week \
            after the start of therapy in every center";
        let quote = "In this randomized trial the patients who received the standard loading \
            dose showed markedly lower platelet aggregation when measured one week after the \
            start of therapy in every center";
        assert!(quote.chars().count() > 140);
        let html = format!("<p>{doc_sentence}.</p>");
        let r = run(&html, quote).unwrap();
        assert_eq!(r.strategy, StrategyKind::ProgressiveWindow);
        assert!(r.search_quote.split_whitespace().count() >= 8);
        assert!(doc_sentence.contains(&r.matched_substring));
    }

    #[test]
    fn distinctive_phrase_for_long_reworded_quotes() {
        let html = "<p>Data came from the International Warfarin Pharmacogenetics Consortium.</p>";
        let quote = "Using records assembled by the International Warfarin Pharmacogenetics \
            Consortium we modelled required weekly doses";
        let r = attempt(&DistinctivePhrase, html, quote).unwrap();
        assert_eq!(
            r.matched_substring,
            "International Warfarin Pharmacogenetics Consortium"
        );
    }

    #[test]
    fn significant_word_respects_short_only() {
        let html = "<p>Bleeding events were rare overall.</p>";
        let short = attempt(&SignificantWord { short_only: true }, html, "rare bleeding");
        assert_eq!(short.unwrap().matched_substring, "rare");

        let long_quote = "a quote that is much longer than fifty characters and mentions bleeding";
        assert!(attempt(&SignificantWord { short_only: true }, html, long_quote).is_none());
        let r = attempt(&SignificantWord { short_only: false }, html, long_quote).unwrap();
        assert_eq!(r.matched_substring, "Bleeding");
    }

    #[test]
    fn sentence_similarity_prefers_earliest_on_ties() {
        let html = "<p>Metformin lowered glucose in the first cohort.</p>\
            <p>Metformin lowered glucose in the second cohort.</p>";
        let r = attempt(&SentenceSimilarity, html, "metformin glucose cohort outcomes").unwrap();
        assert!(r.matched_substring.contains("first"));
        assert!(r.score > 0.2);
    }

    #[test]
    fn sentence_similarity_rejects_low_scores() {
        let html = "<p>Completely unrelated sentence about imaging hardware.</p>";
        assert!(attempt(&SentenceSimilarity, html, "warfarin dosing algorithm").is_none());
    }

    #[test]
    fn figure_quote_routes_to_image_wrapper() {
        let html = r#"<p>Association results are shown below in detail.</p>
            <figure><img src="f2.png" alt="Figure 2: Manhattan plot of genome-wide association results"></figure>"#;
        let doc = Document::parse(html);
        let r = match_quote("Figure 2", &doc, &MatchConfig::default()).unwrap();
        assert_eq!(r.strategy, StrategyKind::Figure);
        assert_eq!(
            r.locator,
            Locator::Element {
                node: doc.find_all("figure")[0]
            }
        );
    }

    #[test]
    fn prose_quote_mentioning_a_figure_matches_exactly() {
        let sentence = "As Figure 2 shows, carriers of the loss-of-function allele had reduced \
            platelet inhibition.";
        let html = format!(
            r#"<p>{sentence}</p>
            <figure><img alt="Figure 2: Manhattan plot of genome-wide association results"></figure>"#
        );
        let r = run(&html, sentence).unwrap();
        assert_eq!(r.strategy, StrategyKind::Exact);
        assert_eq!(r.matched_substring, sentence);
    }

    #[test]
    fn label_rule_needs_a_bare_label() {
        assert!(bare_label("Figure 2", 4).is_some());
        assert!(bare_label("see Fig. 2", 4).is_some());
        assert!(bare_label("Figure 2 shows reduced inhibition", 4).is_none());
        assert!(bare_label("the Manhattan plot", 4).is_none());
    }

    fn figure(html: &str, quote: &str, cfg: &MatchConfig) -> Option<MatchResult> {
        let doc = Document::parse(html);
        let corpus = Corpus::new(&doc, cfg);
        match_figure(quote, &corpus)
    }

    #[test]
    fn link_text_above_link_threshold_is_accepted() {
        let html = r#"<p>Response curves are in <a href="supp.html">Figure 3 dose response curves</a> online.</p>"#;
        let doc = Document::parse(html);
        let cfg = MatchConfig::default();
        let corpus = Corpus::new(&doc, &cfg);
        let r = match_figure("Figure 3 dose response", &corpus).unwrap();
        assert_eq!(r.strategy, StrategyKind::Figure);
        assert!(r.score > cfg.link_threshold);
        assert_eq!(
            r.locator,
            Locator::Element {
                node: doc.find_all("a")[0]
            }
        );
    }

    #[test]
    fn link_text_between_figure_and_link_thresholds_is_rejected() {
        let html = r#"<p>Details in <a href="supp.html">Figure 4 dosing curves by genotype group here</a>.</p>"#;
        let quote = "Figure 4 shows dose curves";
        // two shared words (figure, curves) out of six
        let sim = similarity(quote, "Figure 4 dosing curves by genotype group here");
        assert!(sim > 0.3 && sim <= 0.4, "got {sim}");

        assert!(figure(html, quote, &MatchConfig::default()).is_none());
        let loose = MatchConfig {
            link_threshold: 0.3,
            ..MatchConfig::default()
        };
        assert!(figure(html, quote, &loose).is_some());
    }

    #[test]
    fn table_caption_outranks_earlier_link() {
        let html = r#"<p><a href="tables.html">Table 2 baseline characteristics</a></p>
            <table><caption>Table 2 baseline characteristics</caption><tr><td>n</td></tr></table>"#;
        let doc = Document::parse(html);
        let cfg = MatchConfig::default();
        let corpus = Corpus::new(&doc, &cfg);
        let r = match_figure("Table 2 baseline characteristics", &corpus).unwrap();
        assert_eq!(
            r.locator,
            Locator::Element {
                node: doc.find_all("table")[0]
            }
        );
    }

    #[test]
    fn last_resort_word_can_be_disabled() {
        let html = "<p>Bleeding events were rare overall.</p>";
        let quote = "a quote that is much longer than fifty characters and mentions bleeding";
        let on = attempt(&SignificantWord { short_only: false }, html, quote);
        assert!(on.is_some());

        let doc = Document::parse(html);
        let cfg = MatchConfig {
            last_resort_word: false,
            ..MatchConfig::default()
        };
        let corpus = Corpus::new(&doc, &cfg);
        assert!(SignificantWord { short_only: false }.attempt(quote, &corpus).is_none());
        assert!(match_quote(quote, &doc, &cfg).is_none());
    }

    #[test]
    fn hard_line_break_does_not_glue_words() {
        let html = "<p>The dose was adjusted for renal function<br>in all enrolled patients of the trial.</p>";
        let r = run(html, "adjusted for renal function in all enrolled patients").unwrap();
        assert_eq!(r.strategy, StrategyKind::Whitespace);
        assert_eq!(
            r.matched_substring,
            "adjusted for renal function\nin all enrolled patients"
        );
    }

    #[test]
    fn figure_quote_falls_through_to_prose() {
        let html = "<p>As summarized in Table 3 the dose was reduced in carriers.</p>";
        let r = run(html, "Table 3 the dose was reduced").unwrap();
        assert_eq!(r.strategy, StrategyKind::Exact);
    }

    #[test]
    fn absent_quote_is_not_found() {
        assert!(run(PAPER, "0f8fad5b-d9cb-469f-a165-70867728950e").is_none());
        assert!(run(PAPER, "   ").is_none());
    }

    #[test]
    fn default_cascade_order() {
        assert_eq!(
            Cascade::default().kinds(),
            vec![
                StrategyKind::Exact,
                StrategyKind::TrailingEllipsis,
                StrategyKind::InternalEllipsis,
                StrategyKind::PValue,
                StrategyKind::Whitespace,
                StrategyKind::Punctuation,
                StrategyKind::DomainTerm,
                StrategyKind::ProgressiveWindow,
                StrategyKind::DistinctivePhrase,
                StrategyKind::SignificantWord,
                StrategyKind::SentenceSimilarity,
                StrategyKind::SignificantWord,
            ]
        );
    }
}
