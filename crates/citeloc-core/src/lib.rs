use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed locator: {0}")]
    MalformedLocator(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("parse failed: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Opaque handle to a node of a [`DocumentSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// A position inside a text leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPoint {
    pub node: NodeId,
    /// Byte offset into the leaf's text (always on a char boundary when produced by citeloc).
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    /// An exact text range, possibly spanning several leaves.
    Text {
        /// Nearest block-level ancestor; used when the precise range can no longer be resolved.
        block: Option<NodeId>,
        start: TextPoint,
        end: TextPoint,
    },
    /// A whole visual element (figure wrapper, table, link).
    Element { node: NodeId },
}

impl Locator {
    /// The node a caller should treat as "where the match is" (start leaf or element).
    pub fn anchor(&self) -> NodeId {
        match self {
            Locator::Text { start, .. } => start.node,
            Locator::Element { node } => *node,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    ProseSentence,
    HeadingOrCaption,
    ImageAlt,
    ImageTitle,
    FigureCaption,
    LinkText,
    TableCaption,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::ProseSentence => "prose_sentence",
            SegmentKind::HeadingOrCaption => "heading_or_caption",
            SegmentKind::ImageAlt => "image_alt",
            SegmentKind::ImageTitle => "image_title",
            SegmentKind::FigureCaption => "figure_caption",
            SegmentKind::LinkText => "link_text",
            SegmentKind::TableCaption => "table_caption",
        }
    }

    /// Segments synthesized from visual elements rather than running prose.
    pub fn is_visual(self) -> bool {
        matches!(
            self,
            SegmentKind::ImageAlt
                | SegmentKind::ImageTitle
                | SegmentKind::FigureCaption
                | SegmentKind::LinkText
                | SegmentKind::TableCaption
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Normalized, searchable text.
    pub text: String,
    /// Text as rendered (trimmed).
    pub raw: String,
    pub locator: Locator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Figure,
    Exact,
    TrailingEllipsis,
    InternalEllipsis,
    PValue,
    Whitespace,
    Punctuation,
    DomainTerm,
    ProgressiveWindow,
    DistinctivePhrase,
    SignificantWord,
    SentenceSimilarity,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Figure => "figure",
            StrategyKind::Exact => "exact",
            StrategyKind::TrailingEllipsis => "trailing_ellipsis",
            StrategyKind::InternalEllipsis => "internal_ellipsis",
            StrategyKind::PValue => "p_value",
            StrategyKind::Whitespace => "whitespace",
            StrategyKind::Punctuation => "punctuation",
            StrategyKind::DomainTerm => "domain_term",
            StrategyKind::ProgressiveWindow => "progressive_window",
            StrategyKind::DistinctivePhrase => "distinctive_phrase",
            StrategyKind::SignificantWord => "significant_word",
            StrategyKind::SentenceSimilarity => "sentence_similarity",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub locator: Locator,
    /// The document text covered by the match, as rendered.
    pub matched_substring: String,
    /// The literal string the winning strategy searched for.
    pub search_quote: String,
    pub strategy: StrategyKind,
    /// In `[0, 1]`; 1.0 means the whole quote matched verbatim.
    pub score: f64,
    /// If true, the highlighter must not widen the range to word boundaries.
    pub exact_bounds: bool,
}

/// Tunable thresholds for segmenting and matching.
///
/// The defaults were picked by trial against real papers; none of them is load-bearing on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Nodes whose text is shorter than this (chars) are not segmented.
    pub min_node_chars: usize,
    /// Sentences shorter than this (chars) are dropped.
    pub min_sentence_chars: usize,
    /// Ellipsis clauses shorter than this (chars) are not searched on their own.
    pub min_clause_chars: usize,
    /// Similarity an image alt/title or table caption must exceed.
    pub figure_threshold: f64,
    /// Similarity link text must exceed.
    pub link_threshold: f64,
    /// Similarity a sentence must exceed to be accepted by sentence ranking.
    pub sentence_threshold: f64,
    /// Quotes longer than this (chars) get the progressive window search.
    pub window_min_quote_chars: usize,
    pub window_min_words: usize,
    pub window_offsets: usize,
    /// Quotes longer than this (chars) get distinctive phrase extraction.
    pub phrase_min_quote_chars: usize,
    pub phrase_min_chars: usize,
    /// Quotes shorter than this (chars) fall back to single words before sentence ranking.
    pub short_quote_chars: usize,
    pub min_significant_word_chars: usize,
    /// After sentence ranking rejects every candidate, still try single content words of any
    /// quote. Turn off to make sub-threshold quotes come back as not found.
    pub last_resort_word: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_node_chars: 10,
            min_sentence_chars: 20,
            min_clause_chars: 20,
            figure_threshold: 0.3,
            link_threshold: 0.4,
            sentence_threshold: 0.2,
            window_min_quote_chars: 50,
            window_min_words: 8,
            window_offsets: 3,
            phrase_min_quote_chars: 80,
            phrase_min_chars: 10,
            short_quote_chars: 50,
            min_significant_word_chars: 4,
            last_resort_word: true,
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env(key)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env(key).map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env(key)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

impl MatchConfig {
    /// Defaults, overridden by `CITELOC_*` environment variables when set and parseable.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        Self {
            min_node_chars: env_usize("CITELOC_MIN_NODE_CHARS", self.min_node_chars),
            min_sentence_chars: env_usize("CITELOC_MIN_SENTENCE_CHARS", self.min_sentence_chars),
            min_clause_chars: env_usize("CITELOC_MIN_CLAUSE_CHARS", self.min_clause_chars),
            figure_threshold: env_f64("CITELOC_FIGURE_THRESHOLD", self.figure_threshold),
            link_threshold: env_f64("CITELOC_LINK_THRESHOLD", self.link_threshold),
            sentence_threshold: env_f64("CITELOC_SENTENCE_THRESHOLD", self.sentence_threshold),
            window_min_quote_chars: env_usize(
                "CITELOC_WINDOW_MIN_QUOTE_CHARS",
                self.window_min_quote_chars,
            ),
            window_min_words: env_usize("CITELOC_WINDOW_MIN_WORDS", self.window_min_words),
            window_offsets: env_usize("CITELOC_WINDOW_OFFSETS", self.window_offsets),
            phrase_min_quote_chars: env_usize(
                "CITELOC_PHRASE_MIN_QUOTE_CHARS",
                self.phrase_min_quote_chars,
            ),
            phrase_min_chars: env_usize("CITELOC_PHRASE_MIN_CHARS", self.phrase_min_chars),
            short_quote_chars: env_usize("CITELOC_SHORT_QUOTE_CHARS", self.short_quote_chars),
            min_significant_word_chars: env_usize(
                "CITELOC_MIN_SIGNIFICANT_WORD_CHARS",
                self.min_significant_word_chars,
            ),
            last_resort_word: env_bool("CITELOC_LAST_RESORT_WORD", self.last_resort_word),
        }
    }

    /// Parse a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: MatchConfig = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("figure_threshold", self.figure_threshold),
            ("link_threshold", self.link_threshold),
            ("sentence_threshold", self.sentence_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("{name} must be within [0, 1], got {v}")));
            }
        }
        if self.window_min_words == 0 {
            return Err(Error::Config("window_min_words must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Borrowed view of a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
    /// Element with its lowercase tag name.
    Element(&'a str),
    Text(&'a str),
}

/// The rendered document, as far as the locator needs it.
///
/// Implementations own the tree; citeloc only reads it and mutates the highlight marker.
/// Node handles of removed nodes must report `None` from [`DocumentSurface::node`].
pub trait DocumentSurface {
    fn root(&self) -> NodeId;
    fn node(&self, id: NodeId) -> Option<NodeKind<'_>>;
    fn children(&self, id: NodeId) -> &[NodeId];
    fn parent(&self, id: NodeId) -> Option<NodeId>;
    fn attr(&self, id: NodeId, name: &str) -> Option<&str>;

    fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<()>;
    fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<()>;
    /// Split a text leaf at `offset`; the leaf keeps `[..offset]` and the returned new sibling
    /// (inserted right after it) holds `[offset..]`.
    fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId>;
    /// Move the sibling run `first..=last` into a new element inserted in its place.
    fn wrap_range(
        &mut self,
        first: NodeId,
        last: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId>;
    /// Replace an element by its children, then merge adjacent text leaves around it.
    fn unwrap(&mut self, id: NodeId) -> Result<()>;
    /// Bring the node into view, vertically centered.
    fn scroll_into_view(&mut self, id: NodeId);
    /// Block until pending re-renders are done. Surfaces without asynchronous rendering keep the
    /// default no-op.
    fn settle(&mut self) {}

    fn tag(&self, id: NodeId) -> Option<&str> {
        match self.node(id)? {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn leaf_text(&self, id: NodeId) -> Option<&str> {
        match self.node(id)? {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }

    /// Concatenated text of all leaves below `id` (DOM `textContent`).
    fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if let Some(t) = self.leaf_text(n) {
                out.push_str(t);
            }
        }
        out
    }

    /// `id` and everything below it, in document order.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.node(id).is_none() {
            return out;
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for c in self.children(n).iter().rev() {
                stack.push(*c);
            }
        }
        out
    }

    /// Nearest inclusive ancestor with the given tag.
    fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if self.tag(n) == Some(tag) {
                return Some(n);
            }
            cur = self.parent(n);
        }
        None
    }

    fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_config_json_keeps_defaults_for_missing_fields() {
        let cfg = MatchConfig::from_json_str(r#"{"sentence_threshold": 0.5}"#).unwrap();
        assert_eq!(cfg.sentence_threshold, 0.5);
        assert_eq!(cfg.min_sentence_chars, 20);
        assert_eq!(cfg.link_threshold, 0.4);
    }

    #[test]
    fn match_config_rejects_thresholds_outside_unit_interval() {
        let err = MatchConfig::from_json_str(r#"{"figure_threshold": 1.5}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn match_config_json_can_disable_last_resort_word() {
        assert!(MatchConfig::default().last_resort_word);
        let cfg = MatchConfig::from_json_str(r#"{"last_resort_word": false}"#).unwrap();
        assert!(!cfg.last_resort_word);
    }

    #[test]
    fn locator_serializes_with_type_tag() {
        let loc = Locator::Element { node: NodeId(7) };
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["type"], "element");
        assert_eq!(v["node"], 7);
        assert_eq!(loc.anchor(), NodeId(7));
    }

    #[test]
    fn strategy_kind_names_match_serde() {
        for k in [
            StrategyKind::PValue,
            StrategyKind::ProgressiveWindow,
            StrategyKind::SentenceSimilarity,
        ] {
            let v = serde_json::to_value(k).unwrap();
            assert_eq!(v.as_str(), Some(k.as_str()));
        }
    }
}
