//! Segment extraction: the searchable units of a rendered document.
//!
//! Prose blocks are split into sentences, heading-like elements become one segment each, and
//! images/tables/links contribute synthesized "visual" segments pointing at the element itself.
//! Extraction is a lazy iterator over a fresh DFS stack; calling [`extract_segments`] again
//! re-derives everything from the current tree.

use crate::text_index::{is_block, is_skipped, TextIndex};
use crate::textprep::normalize;
use citeloc_core::{DocumentSurface, Locator, MatchConfig, NodeId, Segment, SegmentKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::ops::Range;

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?]+)\s+").expect("sentence boundary regex"));

/// Blocks split into sentences (when they hold no nested blocks).
const PROSE_TAGS: &[&str] = &["p", "div", "li", "td", "th", "blockquote", "dd"];

/// Elements taken whole.
const UNIT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "caption", "figcaption", "dt", "summary", "pre", "label",
];

pub struct Segments<'a> {
    surface: &'a dyn DocumentSurface,
    config: &'a MatchConfig,
    stack: Vec<NodeId>,
    pending: VecDeque<Segment>,
}

/// All segments of the document below `surface.root()`, in document order.
pub fn extract_segments<'a>(
    surface: &'a dyn DocumentSurface,
    config: &'a MatchConfig,
) -> Segments<'a> {
    Segments {
        surface,
        config,
        stack: vec![surface.root()],
        pending: VecDeque::new(),
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        loop {
            if let Some(s) = self.pending.pop_front() {
                return Some(s);
            }
            let n = self.stack.pop()?;
            self.visit(n);
        }
    }
}

impl<'a> Segments<'a> {
    fn visit(&mut self, n: NodeId) {
        let surface = self.surface;
        let Some(tag) = surface.tag(n) else {
            return;
        };
        if is_skipped(surface, n) {
            return;
        }
        for c in surface.children(n).iter().rev() {
            self.stack.push(*c);
        }

        match tag {
            "img" => {
                let target = surface.closest(n, "figure").unwrap_or(n);
                if let Some(alt) = surface.attr(n, "alt") {
                    self.push_visual(SegmentKind::ImageAlt, alt, target);
                }
                if let Some(title) = surface.attr(n, "title") {
                    self.push_visual(SegmentKind::ImageTitle, title, target);
                }
            }
            "table" => {
                let caption = surface
                    .children(n)
                    .iter()
                    .find(|c| surface.tag(**c) == Some("caption"))
                    .map(|c| surface.text_content(*c));
                if let Some(caption) = caption {
                    self.push_visual(SegmentKind::TableCaption, &caption, n);
                }
            }
            "a" => {
                let text = surface.text_content(n);
                self.push_visual(SegmentKind::LinkText, &text, n);
            }
            "figcaption" => {
                let text = surface.text_content(n);
                let target = surface.closest(n, "figure").unwrap_or(n);
                self.push_visual(SegmentKind::FigureCaption, &text, target);
            }
            _ => {}
        }

        if PROSE_TAGS.contains(&tag) {
            if !self.has_block_descendant(n) {
                self.push_sentences(n);
            }
        } else if UNIT_TAGS.contains(&tag) && !self.is_table_caption(n, tag) {
            self.push_unit(n);
        }
    }

    /// A `<caption>` directly under its `<table>` is already emitted as the table's caption.
    fn is_table_caption(&self, n: NodeId, tag: &str) -> bool {
        tag == "caption"
            && self
                .surface
                .parent(n)
                .and_then(|p| self.surface.tag(p))
                == Some("table")
    }

    fn has_block_descendant(&self, n: NodeId) -> bool {
        self.surface
            .descendants(n)
            .into_iter()
            .skip(1)
            .any(|d| is_block(self.surface, d))
    }

    fn push_sentences(&mut self, n: NodeId) {
        let idx = TextIndex::build(self.surface, n);
        let text = idx.text();
        if text.trim().chars().count() < self.config.min_node_chars {
            return;
        }
        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut start = 0usize;
        for caps in SENTENCE_END.captures_iter(text) {
            let (Some(whole), Some(punct)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            spans.push(start..punct.end());
            start = whole.end();
        }
        spans.push(start..text.len());

        for r in spans {
            self.push_text(
                &idx,
                r,
                SegmentKind::ProseSentence,
                self.config.min_sentence_chars,
            );
        }
    }

    fn push_unit(&mut self, n: NodeId) {
        let idx = TextIndex::build(self.surface, n);
        let len = idx.text().len();
        self.push_text(
            &idx,
            0..len,
            SegmentKind::HeadingOrCaption,
            self.config.min_node_chars,
        );
    }

    fn push_text(&mut self, idx: &TextIndex, r: Range<usize>, kind: SegmentKind, min_chars: usize) {
        let slice = &idx.text()[r.clone()];
        let trimmed = slice.trim();
        if trimmed.is_empty() || trimmed.chars().count() < min_chars {
            return;
        }
        let start = r.start + (slice.len() - slice.trim_start().len());
        let end = start + trimmed.len();
        let Some(locator) = idx.locator(self.surface, start..end) else {
            return;
        };
        self.pending.push_back(Segment {
            kind,
            text: normalize(trimmed),
            raw: trimmed.to_string(),
            locator,
        });
    }

    fn push_visual(&mut self, kind: SegmentKind, text: &str, target: NodeId) {
        let raw = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if raw.is_empty() {
            return;
        }
        self.pending.push_back(Segment {
            kind,
            text: normalize(&raw),
            raw,
            locator: Locator::Element { node: target },
        });
    }
}
