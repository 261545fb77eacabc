//! Highlight markers on a [`DocumentSurface`].
//!
//! A text match is wrapped in one `span.quote-highlight`; an element match (figure, table, link)
//! or a degraded block fallback gets the class plus an appended inline style. Every marker also
//! carries `data-quote-highlight="<kind>"` so a later sweep knows how to take it off again.

use crate::text_index::is_block;
use citeloc_core::{DocumentSurface, Error, Locator, MatchResult, NodeId, Result, TextPoint};

pub const HIGHLIGHT_CLASS: &str = "quote-highlight";
pub const MARKER_ATTR: &str = "data-quote-highlight";

const TEXT_STYLE: &str = "background-color: #fef3c7; border-radius: 2px";
const ELEMENT_STYLE: &str =
    "outline: 3px solid #fbbf24; border-radius: 8px; padding: 4px; background-color: #fef3c7";
const BLOCK_STYLE: &str =
    "border: 2px solid #fbbf24; border-radius: 6px; padding: 8px; background-color: #fef3c7";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    /// A wrapper span around a text range.
    Text,
    /// A whole visual element.
    Element,
    /// The containing block, used when a text range could not be resolved.
    Block,
}

impl HighlightKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HighlightKind::Text => "text",
            HighlightKind::Element => "element",
            HighlightKind::Block => "block",
        }
    }

    fn from_marker(v: &str) -> Option<Self> {
        match v {
            "text" => Some(HighlightKind::Text),
            "element" => Some(HighlightKind::Element),
            "block" => Some(HighlightKind::Block),
            _ => None,
        }
    }

    fn style(self) -> &'static str {
        match self {
            HighlightKind::Text => TEXT_STYLE,
            HighlightKind::Element => ELEMENT_STYLE,
            HighlightKind::Block => BLOCK_STYLE,
        }
    }
}

/// A marker currently applied to the surface. Dropping it does nothing; call
/// [`ActiveHighlight::release`] to take the marker off.
#[derive(Debug, PartialEq, Eq)]
pub struct ActiveHighlight {
    node: NodeId,
    kind: HighlightKind,
}

impl ActiveHighlight {
    /// The marked node: the wrapper span, or the styled element.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> HighlightKind {
        self.kind
    }

    /// Wrap the text between two leaf positions.
    ///
    /// Without `exact_bounds` the range is widened to whole words. A range that crosses inline
    /// elements is widened to whole children of the nearest common ancestor; a range that would
    /// cross a block boundary is rejected.
    pub fn acquire_text(
        surface: &mut dyn DocumentSurface,
        start: TextPoint,
        end: TextPoint,
        exact_bounds: bool,
    ) -> Result<Self> {
        validate_point(surface, start)?;
        validate_point(surface, end)?;
        if start.node == end.node && start.offset >= end.offset {
            return Err(Error::MalformedLocator(format!(
                "empty range {}..{} in node {}",
                start.offset, end.offset, start.node.0
            )));
        }
        let (start, end) = if exact_bounds {
            (start, end)
        } else {
            expand_to_words(surface, start, end)
        };
        let (start, end) = trim_whitespace(surface, start, end);

        let attrs = [
            ("class", HIGHLIGHT_CLASS),
            (MARKER_ATTR, HighlightKind::Text.as_str()),
            ("style", TEXT_STYLE),
        ];

        if start.node == end.node {
            if start.offset >= end.offset {
                return Err(Error::MalformedLocator(format!(
                    "empty range {}..{} in node {}",
                    start.offset, end.offset, start.node.0
                )));
            }
            let leaf = start.node;
            let len = leaf_len(surface, leaf);
            if end.offset < len {
                surface.split_text(leaf, end.offset)?;
            }
            let target = if start.offset > 0 {
                surface.split_text(leaf, start.offset)?
            } else {
                leaf
            };
            let span = surface.wrap_range(target, target, "span", &attrs)?;
            return Ok(Self {
                node: span,
                kind: HighlightKind::Text,
            });
        }

        let (first, last) = sibling_run(surface, start.node, end.node)?;
        let first = if first == start.node && start.offset > 0 {
            surface.split_text(start.node, start.offset)?
        } else {
            first
        };
        if last == end.node && end.offset < leaf_len(surface, end.node) {
            surface.split_text(end.node, end.offset)?;
        }
        let span = surface.wrap_range(first, last, "span", &attrs)?;
        Ok(Self {
            node: span,
            kind: HighlightKind::Text,
        })
    }

    /// Style a whole element.
    pub fn acquire_element(
        surface: &mut dyn DocumentSurface,
        node: NodeId,
        kind: HighlightKind,
    ) -> Result<Self> {
        if surface.tag(node).is_none() {
            return Err(Error::MalformedLocator(format!(
                "node {} is not a live element",
                node.0
            )));
        }
        let class = match surface.attr(node, "class").map(str::trim) {
            Some(c) if !c.is_empty() => format!("{c} {HIGHLIGHT_CLASS}"),
            _ => HIGHLIGHT_CLASS.to_string(),
        };
        let style = match surface.attr(node, "style").map(|s| s.trim().trim_end_matches(';')) {
            Some(s) if !s.is_empty() => format!("{s}; {}", kind.style()),
            _ => kind.style().to_string(),
        };
        surface.set_attr(node, "class", &class)?;
        surface.set_attr(node, "style", &style)?;
        surface.set_attr(node, MARKER_ATTR, kind.as_str())?;
        Ok(Self { node, kind })
    }

    /// Take the marker off. A node that has already disappeared is not an error.
    pub fn release(self, surface: &mut dyn DocumentSurface) -> Result<()> {
        if surface.tag(self.node).is_none() {
            return Ok(());
        }
        match self.kind {
            HighlightKind::Text => surface.unwrap(self.node),
            HighlightKind::Element | HighlightKind::Block => unmark_element(surface, self.node),
        }
    }
}

fn leaf_len(surface: &dyn DocumentSurface, leaf: NodeId) -> usize {
    surface.leaf_text(leaf).map(str::len).unwrap_or(0)
}

fn validate_point(surface: &dyn DocumentSurface, p: TextPoint) -> Result<()> {
    let text = surface.leaf_text(p.node).ok_or_else(|| {
        Error::MalformedLocator(format!("node {} is not a live text leaf", p.node.0))
    })?;
    if p.offset > text.len() || !text.is_char_boundary(p.offset) {
        return Err(Error::MalformedLocator(format!(
            "offset {} out of range for node {}",
            p.offset, p.node.0
        )));
    }
    Ok(())
}

fn expand_to_words(
    surface: &dyn DocumentSurface,
    mut start: TextPoint,
    mut end: TextPoint,
) -> (TextPoint, TextPoint) {
    if let Some(t) = surface.leaf_text(start.node) {
        let inside = t[start.offset..].chars().next();
        if inside.map(char::is_alphanumeric).unwrap_or(false) {
            start.offset = t[..start.offset]
                .char_indices()
                .rev()
                .take_while(|(_, c)| c.is_alphanumeric())
                .last()
                .map(|(i, _)| i)
                .unwrap_or(start.offset);
        }
    }
    if let Some(t) = surface.leaf_text(end.node) {
        let inside = t[..end.offset].chars().next_back();
        if inside.map(char::is_alphanumeric).unwrap_or(false) {
            end.offset += t[end.offset..]
                .chars()
                .take_while(|c| c.is_alphanumeric())
                .map(char::len_utf8)
                .sum::<usize>();
        }
    }
    (start, end)
}

fn trim_whitespace(
    surface: &dyn DocumentSurface,
    mut start: TextPoint,
    mut end: TextPoint,
) -> (TextPoint, TextPoint) {
    let limit = |p: TextPoint, q: TextPoint, len: usize| if p.node == q.node { q.offset } else { len };
    if let Some(t) = surface.leaf_text(start.node) {
        let stop = limit(start, end, t.len());
        start.offset += t[start.offset..stop]
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(char::len_utf8)
            .sum::<usize>();
    }
    if let Some(t) = surface.leaf_text(end.node) {
        let floor = if start.node == end.node { start.offset } else { 0 };
        end.offset -= t[floor..end.offset]
            .chars()
            .rev()
            .take_while(|c| c.is_whitespace())
            .map(char::len_utf8)
            .sum::<usize>();
    }
    (start, end)
}

fn ancestry(surface: &dyn DocumentSurface, id: NodeId) -> Vec<NodeId> {
    let mut path = vec![id];
    let mut cur = surface.parent(id);
    while let Some(n) = cur {
        path.push(n);
        cur = surface.parent(n);
    }
    path.reverse();
    path
}

/// The children of the nearest common ancestor that hold `a` and `b`, as `(first, last)`.
fn sibling_run(surface: &dyn DocumentSurface, a: NodeId, b: NodeId) -> Result<(NodeId, NodeId)> {
    let pa = ancestry(surface, a);
    let pb = ancestry(surface, b);
    let shared = pa.iter().zip(&pb).take_while(|(x, y)| x == y).count();
    if shared == 0 || shared >= pa.len() || shared >= pb.len() {
        return Err(Error::MalformedLocator(format!(
            "nodes {} and {} share no usable ancestor",
            a.0, b.0
        )));
    }
    let parent = pa[shared - 1];
    let (first, last) = (pa[shared], pb[shared]);
    let kids = surface.children(parent);
    let i = kids.iter().position(|c| *c == first);
    let j = kids.iter().position(|c| *c == last);
    let (Some(i), Some(j)) = (i, j) else {
        return Err(Error::MalformedLocator("range ends are detached".to_string()));
    };
    if i > j {
        return Err(Error::MalformedLocator(format!(
            "range start {} is after its end {}",
            a.0, b.0
        )));
    }
    let crosses_block = kids[i..=j]
        .iter()
        .flat_map(|k| surface.descendants(*k))
        .any(|d| is_block(surface, d));
    if crosses_block {
        return Err(Error::MalformedLocator(
            "range crosses a block boundary".to_string(),
        ));
    }
    Ok((first, last))
}

fn unmark_element(surface: &mut dyn DocumentSurface, node: NodeId) -> Result<()> {
    let kind = surface.attr(node, MARKER_ATTR).and_then(HighlightKind::from_marker);
    let class: Vec<String> = surface
        .attr(node, "class")
        .unwrap_or_default()
        .split_whitespace()
        .filter(|c| *c != HIGHLIGHT_CLASS)
        .map(str::to_string)
        .collect();
    if class.is_empty() {
        surface.remove_attr(node, "class")?;
    } else {
        surface.set_attr(node, "class", &class.join(" "))?;
    }

    if let Some(kind) = kind {
        let style = surface.attr(node, "style").unwrap_or_default().to_string();
        let marker = kind.style();
        if style == marker {
            surface.remove_attr(node, "style")?;
        } else if let Some(rest) = style.strip_suffix(marker) {
            let rest = rest.trim_end().trim_end_matches(';').to_string();
            surface.set_attr(node, "style", &rest)?;
        }
    }
    surface.remove_attr(node, MARKER_ATTR)
}

/// Every node currently carrying the highlight class, in document order.
pub fn marked_nodes(surface: &dyn DocumentSurface) -> Vec<NodeId> {
    surface
        .descendants(surface.root())
        .into_iter()
        .filter(|n| surface.has_class(*n, HIGHLIGHT_CLASS))
        .collect()
}

/// Remove every marker from the surface, whoever placed it. Returns how many were removed.
pub fn sweep(surface: &mut dyn DocumentSurface) -> Result<usize> {
    let marked = marked_nodes(surface);
    for n in &marked {
        let kind = surface.attr(*n, MARKER_ATTR).and_then(HighlightKind::from_marker);
        let wrapper = match kind {
            Some(HighlightKind::Text) => true,
            Some(_) => false,
            None => surface.tag(*n) == Some("span"),
        };
        if wrapper {
            surface.unwrap(*n)?;
        } else {
            unmark_element(surface, *n)?;
        }
    }
    Ok(marked.len())
}

/// Holds at most one highlight; every apply releases the previous one first.
#[derive(Debug, Default)]
pub struct Highlighter {
    current: Option<ActiveHighlight>,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ActiveHighlight> {
        self.current.as_ref()
    }

    /// Release the held highlight and sweep any stray markers. Idempotent.
    pub fn clear(&mut self, surface: &mut dyn DocumentSurface) {
        if let Some(h) = self.current.take() {
            if let Err(e) = h.release(surface) {
                tracing::warn!(error = %e, "failed to release highlight");
            }
        }
        match sweep(surface) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(removed = n, "swept stray highlight markers"),
            Err(e) => tracing::warn!(error = %e, "failed to sweep highlight markers"),
        }
    }

    /// Mark `result` on the surface and scroll it into view. Returns the marked node, or `None`
    /// when the locator could not be resolved even at block level.
    pub fn apply(
        &mut self,
        surface: &mut dyn DocumentSurface,
        result: &MatchResult,
    ) -> Option<NodeId> {
        self.clear(surface);
        let acquired = match &result.locator {
            Locator::Text { block, start, end } => {
                match ActiveHighlight::acquire_text(surface, *start, *end, result.exact_bounds) {
                    Ok(h) => Ok(h),
                    Err(e) => {
                        tracing::warn!(error = %e, "text highlight failed; marking containing block");
                        match block {
                            Some(b) => ActiveHighlight::acquire_element(surface, *b, HighlightKind::Block),
                            None => Err(e),
                        }
                    }
                }
            }
            Locator::Element { node } => {
                ActiveHighlight::acquire_element(surface, *node, HighlightKind::Element)
            }
        };
        match acquired {
            Ok(h) => {
                let node = h.node();
                surface.scroll_into_view(node);
                self.current = Some(h);
                Some(node)
            }
            Err(e) => {
                tracing::warn!(error = %e, "highlight aborted");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use citeloc_core::StrategyKind;

    fn text_result(start: TextPoint, end: TextPoint, block: Option<NodeId>) -> MatchResult {
        MatchResult {
            locator: Locator::Text { block, start, end },
            matched_substring: String::new(),
            search_quote: String::new(),
            strategy: StrategyKind::Exact,
            score: 1.0,
            exact_bounds: false,
        }
    }

    fn point(node: NodeId, offset: usize) -> TextPoint {
        TextPoint { node, offset }
    }

    fn p_text(doc: &Document) -> (NodeId, NodeId) {
        let p = doc.find_all("p")[0];
        (p, doc.children(p)[0])
    }

    #[test]
    fn wraps_a_range_inside_one_leaf() {
        let mut doc = Document::parse("<p>alpha beta gamma</p>");
        let (p, t) = p_text(&doc);
        let mut h = Highlighter::new();
        let span = h
            .apply(&mut doc, &text_result(point(t, 6), point(t, 10), Some(p)))
            .unwrap();
        assert_eq!(doc.tag(span), Some("span"));
        assert_eq!(doc.text_content(span), "beta");
        assert_eq!(doc.text_content(p), "alpha beta gamma");
        assert_eq!(doc.last_scrolled(), Some(span));
        assert_eq!(h.current().map(|c| c.kind()), Some(HighlightKind::Text));
    }

    #[test]
    fn widens_to_words_unless_exact_bounds() {
        let mut doc = Document::parse("<p>alpha beta gamma</p>");
        let (p, t) = p_text(&doc);
        let mut h = Highlighter::new();
        let span = h
            .apply(&mut doc, &text_result(point(t, 7), point(t, 9), Some(p)))
            .unwrap();
        assert_eq!(doc.text_content(span), "beta");

        h.clear(&mut doc);
        let t = doc.children(p)[0];
        let mut exact = text_result(point(t, 7), point(t, 9), Some(p));
        exact.exact_bounds = true;
        let span = h.apply(&mut doc, &exact).unwrap();
        assert_eq!(doc.text_content(span), "et");
    }

    #[test]
    fn range_across_inline_elements_uses_one_wrapper() {
        let mut doc = Document::parse("<p>One <em>two</em> three.</p>");
        let p = doc.find_all("p")[0];
        let kids = doc.children(p).to_vec();
        let mut h = Highlighter::new();
        let span = h
            .apply(&mut doc, &text_result(point(kids[0], 1), point(kids[2], 3), Some(p)))
            .unwrap();
        assert_eq!(doc.text_content(span), "One two three");
        assert_eq!(marked_nodes(&doc), vec![span]);
        assert_eq!(doc.text_content(p), "One two three.");
    }

    #[test]
    fn clear_restores_the_original_markup() {
        let html = "<p>One <em>two</em> three.</p>";
        let mut doc = Document::parse(html);
        let p = doc.find_all("p")[0];
        let before = doc.inner_html(p);
        let kids = doc.children(p).to_vec();
        let mut h = Highlighter::new();
        h.apply(&mut doc, &text_result(point(kids[0], 4), point(kids[2], 6), Some(p)));
        assert_ne!(doc.inner_html(p), before);
        h.clear(&mut doc);
        assert_eq!(doc.inner_html(p), before);
        h.clear(&mut doc);
        assert_eq!(doc.inner_html(p), before);
    }

    #[test]
    fn element_marker_appends_and_strips_style() {
        let mut doc = Document::parse(
            r#"<figure class="wide" style="margin: 0"><img alt="Figure 1"></figure>"#,
        );
        let fig = doc.find_all("figure")[0];
        let result = MatchResult {
            locator: Locator::Element { node: fig },
            matched_substring: "Figure 1".to_string(),
            search_quote: "Figure 1".to_string(),
            strategy: StrategyKind::Figure,
            score: 1.0,
            exact_bounds: false,
        };
        let mut h = Highlighter::new();
        assert_eq!(h.apply(&mut doc, &result), Some(fig));
        assert_eq!(doc.attr(fig, "class"), Some("wide quote-highlight"));
        assert_eq!(doc.attr(fig, MARKER_ATTR), Some("element"));
        assert!(doc.attr(fig, "style").unwrap().starts_with("margin: 0; outline"));
        assert!(doc.find_all("span").is_empty());

        h.clear(&mut doc);
        assert_eq!(doc.attr(fig, "class"), Some("wide"));
        assert_eq!(doc.attr(fig, "style"), Some("margin: 0"));
        assert_eq!(doc.attr(fig, MARKER_ATTR), None);
    }

    #[test]
    fn malformed_range_falls_back_to_block() {
        let mut doc = Document::parse("<p>short</p>");
        let (p, t) = p_text(&doc);
        let mut h = Highlighter::new();
        let marked = h.apply(&mut doc, &text_result(point(t, 2), point(t, 99), Some(p)));
        assert_eq!(marked, Some(p));
        assert_eq!(doc.attr(p, MARKER_ATTR), Some("block"));
    }

    #[test]
    fn range_across_paragraphs_falls_back_to_block() {
        let mut doc = Document::parse("<div><p>First para.</p><p>Second para.</p></div>");
        let ps = doc.find_all("p");
        let a = doc.children(ps[0])[0];
        let b = doc.children(ps[1])[0];
        let mut h = Highlighter::new();
        let marked = h.apply(&mut doc, &text_result(point(a, 0), point(b, 6), Some(ps[0])));
        assert_eq!(marked, Some(ps[0]));
        assert!(doc.find_all("span").is_empty());
    }

    #[test]
    fn stale_locator_without_block_aborts_silently() {
        let mut doc = Document::parse("<p>alpha beta</p>");
        let mut h = Highlighter::new();
        let gone = NodeId(10_000);
        assert_eq!(h.apply(&mut doc, &text_result(point(gone, 0), point(gone, 3), None)), None);
        assert!(marked_nodes(&doc).is_empty());
        assert!(h.current().is_none());
    }

    #[test]
    fn sweep_removes_markers_it_did_not_place() {
        let mut doc = Document::parse(
            r#"<p>keep <span class="quote-highlight" data-quote-highlight="text">this</span> text</p>
               <div class="note quote-highlight" data-quote-highlight="element"
                    style="color: red; outline: 3px solid #fbbf24; border-radius: 8px; padding: 4px; background-color: #fef3c7">x</div>"#,
        );
        let mut h = Highlighter::new();
        h.clear(&mut doc);
        assert!(marked_nodes(&doc).is_empty());
        let p = doc.find_all("p")[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "keep this text");
        let div = doc.find_all("div")[0];
        assert_eq!(doc.attr(div, "class"), Some("note"));
        assert_eq!(doc.attr(div, "style"), Some("color: red"));
    }
}
