//! Arena-backed mutable HTML document.
//!
//! `scraper` gives us a spec-compliant parse but no convenient way to wrap/unwrap text ranges,
//! so the parsed tree is copied into a flat arena that implements [`DocumentSurface`].
//! Removed nodes keep their slot (handles stay stable) but report as dead.

use citeloc_core::{DocumentSurface, Error, NodeId, NodeKind, Result};
use html_scraper::{Html, Node};
use std::collections::HashMap;

const ROOT_TAG: &str = "#document";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    live: bool,
}

#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    root: NodeId,
    scrolled: Option<NodeId>,
}

impl Document {
    /// Parse a full HTML document or a rendered fragment (html5ever adds the missing wrappers).
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Document {
            slots: Vec::new(),
            root: NodeId(0),
            scrolled: None,
        };
        let mut ids = HashMap::new();
        for n in parsed.tree.root().descendants() {
            let parent = n.parent().and_then(|p| ids.get(&p.id()).copied());
            let data = match n.value() {
                Node::Document | Node::Fragment => NodeData::Element {
                    tag: ROOT_TAG.to_string(),
                    attrs: Vec::new(),
                },
                Node::Element(e) => NodeData::Element {
                    tag: e.name().to_ascii_lowercase(),
                    attrs: e
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                },
                Node::Text(t) => NodeData::Text(t.to_string()),
                _ => continue,
            };
            if parent.is_none() && !doc.slots.is_empty() {
                continue;
            }
            let id = doc.push(data, parent);
            ids.insert(n.id(), id);
        }
        if doc.slots.is_empty() {
            doc.push(
                NodeData::Element {
                    tag: ROOT_TAG.to_string(),
                    attrs: Vec::new(),
                },
                None,
            );
        }
        doc
    }

    fn push(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            data,
            parent,
            children: Vec::new(),
            live: true,
        });
        if let Some(p) = parent {
            self.slots[p.0].children.push(id);
        }
        id
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.0).filter(|s| s.live)
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.0)
            .filter(|s| s.live)
            .ok_or_else(|| Error::Surface(format!("node {} is not live", id.0)))
    }

    fn index_in_parent(&self, id: NodeId) -> Result<(NodeId, usize)> {
        let parent = self
            .slot(id)
            .and_then(|s| s.parent)
            .ok_or_else(|| Error::Surface(format!("node {} has no parent", id.0)))?;
        let idx = self.slots[parent.0]
            .children
            .iter()
            .position(|c| *c == id)
            .ok_or_else(|| Error::Surface(format!("node {} missing from parent", id.0)))?;
        Ok((parent, idx))
    }

    /// The `<body>` element, if the parse produced one.
    pub fn body(&self) -> Option<NodeId> {
        self.find_all("body").into_iter().next()
    }

    /// Live elements with the given tag, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.tag(*n) == Some(tag))
            .collect()
    }

    /// Live elements carrying `class`, in document order.
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    /// Node most recently passed to `scroll_into_view`.
    pub fn last_scrolled(&self) -> Option<NodeId> {
        self.scrolled
    }

    /// Serialize the live tree back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for c in self.children(self.root) {
            self.write_node(*c, &mut out);
        }
        out
    }

    /// Serialize the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for c in self.children(id) {
            self.write_node(*c, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        // Explicit stack: (node, closing?) so deep documents cannot overflow.
        let mut stack = vec![(id, false)];
        while let Some((n, closing)) = stack.pop() {
            let Some(slot) = self.slot(n) else {
                continue;
            };
            match &slot.data {
                NodeData::Text(t) => {
                    let raw = slot
                        .parent
                        .and_then(|p| self.tag(p))
                        .map(|t| matches!(t, "script" | "style"))
                        .unwrap_or(false);
                    if raw {
                        out.push_str(t);
                    } else {
                        escape_into(t, false, out);
                    }
                }
                NodeData::Element { tag, attrs } => {
                    if closing {
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                        continue;
                    }
                    out.push('<');
                    out.push_str(tag);
                    for (k, v) in attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        escape_into(v, true, out);
                        out.push('"');
                    }
                    out.push('>');
                    if VOID_TAGS.contains(&tag.as_str()) {
                        continue;
                    }
                    stack.push((n, true));
                    for c in slot.children.iter().rev() {
                        stack.push((*c, false));
                    }
                }
            }
        }
    }

    /// Merge runs of adjacent text children of `parent` and drop empty ones.
    fn merge_text_children(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.slots[parent.0].children);
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        for c in children {
            let text = match &self.slots[c.0].data {
                NodeData::Text(t) => Some(t.clone()),
                NodeData::Element { .. } => None,
            };
            match text {
                Some(t) if t.is_empty() => {
                    self.slots[c.0].live = false;
                }
                Some(t) => {
                    let prev_text = kept
                        .last()
                        .copied()
                        .filter(|p| matches!(self.slots[p.0].data, NodeData::Text(_)));
                    if let Some(p) = prev_text {
                        if let NodeData::Text(pt) = &mut self.slots[p.0].data {
                            pt.push_str(&t);
                        }
                        self.slots[c.0].live = false;
                    } else {
                        kept.push(c);
                    }
                }
                None => kept.push(c),
            }
        }
        self.slots[parent.0].children = kept;
    }
}

fn escape_into(s: &str, attr: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

impl DocumentSurface for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<NodeKind<'_>> {
        let slot = self.slot(id)?;
        Some(match &slot.data {
            NodeData::Element { tag, .. } => NodeKind::Element(tag.as_str()),
            NodeData::Text(t) => NodeKind::Text(t.as_str()),
        })
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id)?.parent
    }

    fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.slot(id)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        match &mut self.slot_mut(id)?.data {
            NodeData::Element { attrs, .. } => {
                if let Some(slot) = attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                    slot.1 = value.to_string();
                } else {
                    attrs.push((name.to_string(), value.to_string()));
                }
                Ok(())
            }
            NodeData::Text(_) => Err(Error::Surface(format!(
                "cannot set attribute on text node {}",
                id.0
            ))),
        }
    }

    fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<()> {
        if let NodeData::Element { attrs, .. } = &mut self.slot_mut(id)?.data {
            attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
        Ok(())
    }

    fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId> {
        let (parent, idx) = self.index_in_parent(id)?;
        let tail = match &mut self.slot_mut(id)?.data {
            NodeData::Text(t) => {
                if offset > t.len() || !t.is_char_boundary(offset) {
                    return Err(Error::Surface(format!(
                        "offset {offset} is not a char boundary of node {}",
                        id.0
                    )));
                }
                t.split_off(offset)
            }
            NodeData::Element { .. } => {
                return Err(Error::Surface(format!("node {} is not text", id.0)));
            }
        };
        let new_id = NodeId(self.slots.len());
        self.slots.push(Slot {
            data: NodeData::Text(tail),
            parent: Some(parent),
            children: Vec::new(),
            live: true,
        });
        self.slots[parent.0].children.insert(idx + 1, new_id);
        Ok(new_id)
    }

    fn wrap_range(
        &mut self,
        first: NodeId,
        last: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId> {
        let (parent, i) = self.index_in_parent(first)?;
        let (parent_last, j) = self.index_in_parent(last)?;
        if parent != parent_last || j < i {
            return Err(Error::Surface(format!(
                "nodes {} and {} are not an ordered sibling run",
                first.0, last.0
            )));
        }
        let wrapper = NodeId(self.slots.len());
        let moved: Vec<NodeId> = self.slots[parent.0].children.drain(i..=j).collect();
        for m in &moved {
            self.slots[m.0].parent = Some(wrapper);
        }
        self.slots.push(Slot {
            data: NodeData::Element {
                tag: tag.to_ascii_lowercase(),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
            parent: Some(parent),
            children: moved,
            live: true,
        });
        self.slots[parent.0].children.insert(i, wrapper);
        Ok(wrapper)
    }

    fn unwrap(&mut self, id: NodeId) -> Result<()> {
        if !matches!(self.slot(id).map(|s| &s.data), Some(NodeData::Element { .. })) {
            return Err(Error::Surface(format!("node {} is not an element", id.0)));
        }
        let (parent, idx) = self.index_in_parent(id)?;
        let children = std::mem::take(&mut self.slots[id.0].children);
        for c in &children {
            self.slots[c.0].parent = Some(parent);
        }
        let siblings = &mut self.slots[parent.0].children;
        siblings.remove(idx);
        for (k, c) in children.iter().enumerate() {
            siblings.insert(idx + k, *c);
        }
        self.slots[id.0].live = false;
        self.slots[id.0].parent = None;
        self.merge_text_children(parent);
        Ok(())
    }

    fn scroll_into_view(&mut self, id: NodeId) {
        if self.slot(id).is_some() {
            self.scrolled = Some(id);
        }
    }
}
