//! Flattened, addressable text of a subtree.
//!
//! The text is the concatenation of every text leaf in document order (like DOM `textContent`),
//! with a `\n` separator at block boundaries so sentences in different paragraphs never run
//! together. Each piece remembers which leaf it came from, so any byte range of the flattened
//! text resolves back to an exact leaf + offset pair.

use citeloc_core::{DocumentSurface, Locator, NodeId, TextPoint};
use std::ops::Range;

/// Subtrees that never contribute searchable text.
pub(crate) const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new block of text.
pub(crate) const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "details", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "html", "label", "li", "main", "nav", "ol", "p", "pre", "section", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

pub(crate) fn is_skipped(surface: &dyn DocumentSurface, id: NodeId) -> bool {
    surface
        .tag(id)
        .map(|t| SKIPPED_TAGS.contains(&t))
        .unwrap_or(false)
}

pub(crate) fn is_block(surface: &dyn DocumentSurface, id: NodeId) -> bool {
    surface
        .tag(id)
        .map(|t| BLOCK_TAGS.contains(&t))
        .unwrap_or(false)
}

/// Nearest block-level ancestor (exclusive of `id` itself when `id` is a leaf).
pub fn block_ancestor(surface: &dyn DocumentSurface, id: NodeId) -> Option<NodeId> {
    let mut cur = surface.parent(id);
    while let Some(n) = cur {
        if is_block(surface, n) {
            return Some(n);
        }
        cur = surface.parent(n);
    }
    None
}

#[derive(Debug, Clone)]
struct Piece {
    range: Range<usize>,
    leaf: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct TextIndex {
    text: String,
    pieces: Vec<Piece>,
}

impl TextIndex {
    pub fn build(surface: &dyn DocumentSurface, root: NodeId) -> Self {
        let mut idx = TextIndex {
            text: String::new(),
            pieces: Vec::new(),
        };
        let mut stack = vec![(root, false)];
        while let Some((n, leaving)) = stack.pop() {
            if leaving {
                idx.separate();
                continue;
            }
            if let Some(t) = surface.leaf_text(n) {
                idx.push_leaf(n, t);
                continue;
            }
            if is_skipped(surface, n) {
                continue;
            }
            if surface.tag(n) == Some("br") {
                idx.separate();
                continue;
            }
            let block = n != root && is_block(surface, n);
            if block {
                idx.separate();
                stack.push((n, true));
            }
            for c in surface.children(n).iter().rev() {
                stack.push((*c, false));
            }
        }
        idx
    }

    fn push_leaf(&mut self, leaf: NodeId, t: &str) {
        if t.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(t);
        self.pieces.push(Piece {
            range: start..self.text.len(),
            leaf: Some(leaf),
        });
    }

    fn separate(&mut self) {
        if self.text.is_empty() || self.text.ends_with('\n') {
            return;
        }
        let start = self.text.len();
        self.text.push('\n');
        self.pieces.push(Piece {
            range: start..self.text.len(),
            leaf: None,
        });
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolve a byte range of [`TextIndex::text`] to leaf positions.
    ///
    /// Range ends that fall on a block separator are pulled inward to the nearest leaf.
    pub fn locator(&self, surface: &dyn DocumentSurface, range: Range<usize>) -> Option<Locator> {
        if range.start >= range.end || range.end > self.text.len() {
            return None;
        }
        let first = self.pieces.partition_point(|p| p.range.end <= range.start);
        let start = self.pieces[first..]
            .iter()
            .take_while(|p| p.range.start < range.end)
            .find_map(|p| {
                let leaf = p.leaf?;
                let at = range.start.max(p.range.start);
                Some(TextPoint {
                    node: leaf,
                    offset: at - p.range.start,
                })
            })?;

        let last = self.pieces.partition_point(|p| p.range.start < range.end);
        let end = self.pieces[..last]
            .iter()
            .rev()
            .take_while(|p| p.range.end > range.start)
            .find_map(|p| {
                let leaf = p.leaf?;
                let at = range.end.min(p.range.end);
                Some(TextPoint {
                    node: leaf,
                    offset: at - p.range.start,
                })
            })?;

        Some(Locator::Text {
            block: block_ancestor(surface, start.node),
            start,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn blocks_are_separated_and_inline_text_is_joined() {
        let doc = Document::parse("<h1>Title</h1><p>One <em>two</em> three.</p><p>Four.</p>");
        let idx = TextIndex::build(&doc, doc.root());
        assert_eq!(idx.text().trim(), "Title\nOne two three.\nFour.");
    }

    #[test]
    fn line_breaks_separate_words() {
        let doc = Document::parse(
            "<p>The dose was adjusted for renal function<br>in all enrolled patients of the trial.</p>",
        );
        let idx = TextIndex::build(&doc, doc.root());
        assert!(idx.text().contains("renal function\nin all"));
        assert!(!idx.text().contains("functionin"));
    }

    #[test]
    fn scripts_and_styles_contribute_nothing() {
        let doc = Document::parse("<p>Keep me.</p><script>var x = 1;</script><style>p{}</style>");
        let idx = TextIndex::build(&doc, doc.root());
        assert!(!idx.text().contains("var x"));
        assert!(idx.text().contains("Keep me."));
    }

    #[test]
    fn locator_resolves_across_inline_leaves() {
        let doc = Document::parse("<p>One <em>two</em> three.</p>");
        let idx = TextIndex::build(&doc, doc.root());
        let at = idx.text().find("ne two th").unwrap();
        let loc = idx.locator(&doc, at..at + "ne two th".len()).unwrap();
        let Locator::Text { block, start, end } = loc else {
            panic!("expected text locator");
        };
        assert_eq!(doc.leaf_text(start.node), Some("One "));
        assert_eq!(start.offset, 1);
        assert_eq!(doc.leaf_text(end.node), Some(" three."));
        assert_eq!(end.offset, 3);
        assert_eq!(block, Some(doc.find_all("p")[0]));
    }

    #[test]
    fn locator_pulls_ends_off_separators() {
        let doc = Document::parse("<p>Alpha.</p><p>Beta.</p>");
        let idx = TextIndex::build(&doc, doc.root());
        let at = idx.text().find("Alpha.\n").unwrap();
        let loc = idx.locator(&doc, at..at + "Alpha.\n".len()).unwrap();
        let Locator::Text { start, end, .. } = loc else {
            panic!("expected text locator");
        };
        assert_eq!(start.node, end.node);
        assert_eq!(end.offset, "Alpha.".len());
    }
}
