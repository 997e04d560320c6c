//! Snapshot of a page's composed DOM.
//!
//! The in-page probe serialises the live document (shadow roots included)
//! into [`RawNode`] trees. [`Document`] flattens that tree into an arena so
//! adapters can run selector queries and composed-tree walks without touching
//! the browser again. Node ids are assigned in pre-order (node, then its
//! shadow root and shadow children, then light children); the probe numbers
//! nodes the same way so ids can be handed back to it for scrolling.

pub mod selector;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use selector::{SelectorError, SelectorList};

pub type NodeId = usize;

/// Tags whose boundaries become line breaks in extracted text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "ol", "p", "pre", "section",
    "table", "tr", "ul",
];

/// Serialised node as produced by the probe. Text nodes are bare strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNode {
    Text(String),
    Element(RawElement),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawNode>,
    /// Children of an attached open shadow root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Vec<RawNode>>,
}

impl RawNode {
    pub fn element(tag: &str) -> RawNode {
        RawNode::Element(RawElement {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        })
    }

    pub fn text(text: &str) -> RawNode {
        RawNode::Text(text.to_string())
    }

    pub fn attr(mut self, name: &str, value: &str) -> RawNode {
        if let RawNode::Element(el) = &mut self {
            el.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
        self
    }

    pub fn class(self, class: &str) -> RawNode {
        self.attr("class", class)
    }

    pub fn child(mut self, child: RawNode) -> RawNode {
        if let RawNode::Element(el) = &mut self {
            el.children.push(child);
        }
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = RawNode>) -> RawNode {
        if let RawNode::Element(el) = &mut self {
            el.children.extend(children);
        }
        self
    }

    /// Appends a text child.
    pub fn with_text(self, text: &str) -> RawNode {
        self.child(RawNode::text(text))
    }

    /// Attaches a shadow root holding `children`.
    pub fn shadow(mut self, children: impl IntoIterator<Item = RawNode>) -> RawNode {
        if let RawNode::Element(el) = &mut self {
            el.shadow.get_or_insert_with(Vec::new).extend(children);
        }
        self
    }
}

/// Page snapshot as returned by the probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub root: RawNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
    ShadowRoot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub shadow_root: Option<NodeId>,
    /// Set on shadow roots only.
    pub host: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub url: String,
    pub title: String,
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl Document {
    pub const ROOT: NodeId = 0;

    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                shadow_root: None,
                host: None,
            }],
        }
    }

    pub fn from_snapshot(snapshot: RawSnapshot) -> Self {
        let mut doc = Self::new(&snapshot.url, &snapshot.title);
        doc.push_raw(Self::ROOT, &snapshot.root);
        doc
    }

    /// Convenience for building documents from a root element.
    pub fn from_root(url: &str, title: &str, root: RawNode) -> Self {
        Self::from_snapshot(RawSnapshot {
            url: url.to_string(),
            title: title.to_string(),
            root,
        })
    }

    fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            shadow_root: None,
            host: None,
        });
        id
    }

    fn push_raw(&mut self, parent: NodeId, raw: &RawNode) -> NodeId {
        match raw {
            RawNode::Text(text) => {
                let id = self.push_node(NodeKind::Text(text.clone()), Some(parent));
                self.nodes[parent].children.push(id);
                id
            }
            RawNode::Element(el) => {
                let id = self.push_node(
                    NodeKind::Element {
                        tag: el.tag.to_ascii_lowercase(),
                        attrs: el.attrs.clone(),
                    },
                    Some(parent),
                );
                self.nodes[parent].children.push(id);

                if let Some(shadow_children) = &el.shadow {
                    let root = self.push_node(NodeKind::ShadowRoot, None);
                    self.nodes[root].host = Some(id);
                    self.nodes[id].shadow_root = Some(root);
                    for child in shadow_children {
                        self.push_raw(root, child);
                    }
                }

                for child in &el.children {
                    self.push_raw(id, child);
                }
                id
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    /// Parent within the same tree; `None` at a document or shadow root.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(id)?.parent?;
        self.is_element(parent).then_some(parent)
    }

    /// Parent in the composed tree: shadow roots step out to their host.
    pub fn composed_parent(&self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(id)?;
        node.parent.or(node.host)
    }

    /// True when `ancestor` strictly contains `node` in the composed tree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.composed_parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.composed_parent(id);
        }
        false
    }

    /// All element ids in document order, shadow trees included.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(|id| self.is_element(*id))
    }

    /// Runs `selectors` against every element, piercing shadow roots.
    /// Selector matching itself never crosses a shadow boundary.
    pub fn query_all_deep(&self, selectors: &SelectorList) -> Vec<NodeId> {
        self.elements()
            .filter(|id| selectors.matches(self, *id))
            .collect()
    }

    pub fn query_first_deep(&self, selectors: &SelectorList) -> Option<NodeId> {
        self.elements().find(|id| selectors.matches(self, *id))
    }

    /// Composed descendants of `scope` matching `selectors`.
    pub fn query_within(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.elements()
            .filter(|id| self.contains(scope, *id) && selectors.matches(self, *id))
            .collect()
    }

    /// Whether the element accepts typed text.
    pub fn is_editable(&self, id: NodeId) -> bool {
        match self.tag(id) {
            Some("textarea") => true,
            Some("input") => !matches!(
                self.attr(id, "type"),
                Some("button" | "submit" | "checkbox" | "radio" | "hidden")
            ),
            Some(_) => matches!(
                self.attr(id, "contenteditable"),
                Some("" | "true" | "plaintext-only")
            ),
            None => false,
        }
    }

    /// Editable itself, inside an editable region, or wrapping one.
    pub fn touches_editable(&self, id: NodeId) -> bool {
        if self.is_editable(id) {
            return true;
        }
        let mut current = self.composed_parent(id);
        while let Some(ancestor) = current {
            if self.is_editable(ancestor) {
                return true;
            }
            current = self.composed_parent(ancestor);
        }
        self.elements()
            .any(|other| self.is_editable(other) && self.contains(id, other))
    }

    /// Composed text content with line breaks at block boundaries.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, .. } => {
                let block = BLOCK_TAGS.contains(&tag.as_str());
                if block {
                    out.push('\n');
                }
                if let Some(root) = node.shadow_root {
                    self.collect_text(root, out);
                }
                for child in &node.children {
                    self.collect_text(*child, out);
                }
                if block {
                    out.push('\n');
                }
            }
            NodeKind::Document | NodeKind::ShadowRoot => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }
}
