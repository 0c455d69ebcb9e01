use crate::margin_box::MarginBoxSlot;
use crate::stylesheet::Declaration;
use crate::style::StyleMap;
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoKind {
    Before,
    After,
    Placeholder,
    MarginBox(MarginBoxSlot),
}

impl PseudoKind {
    pub fn tag(self) -> &'static str {
        match self {
            PseudoKind::Before => "::before",
            PseudoKind::After => "::after",
            PseudoKind::Placeholder => "::placeholder",
            PseudoKind::MarginBox(_) => "::margin-box",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OccurrencePolicy {
    #[default]
    First,
    Start,
    Last,
    FirstExcept,
}

impl OccurrencePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first" => Some(OccurrencePolicy::First),
            "start" => Some(OccurrencePolicy::Start),
            "last" => Some(OccurrencePolicy::Last),
            "first-except" => Some(OccurrencePolicy::FirstExcept),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    PageCounter { total: bool, style: String },
    TargetPage { target: String, style: String },
    RunningRef { name: String, policy: OccurrencePolicy },
    StringRef { name: String, policy: OccurrencePolicy },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub pseudo: Option<PseudoKind>,
    pub declarations: Vec<Declaration>,
    pub synthetic: bool,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    style: Option<Rc<StyleMap>>,
}

// Arena document tree. Pseudo nodes point at their originating element as
// parent but are never listed among its children.
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl DomTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                style: None,
            }],
            root: NodeId(0),
        }
    }

    pub fn parse_html(html: &str) -> Self {
        let document = kuchiki::parse_html().one(html);
        let mut tree = DomTree::new();
        let root = tree.root;
        for child in document.children() {
            tree.import(&child, root);
        }
        tree
    }

    fn import(&mut self, node: &NodeRef, parent: NodeId) {
        match node.data() {
            NodeData::Element(el) => {
                let tag = el.name.local.as_ref().to_ascii_lowercase();
                let attrs = el
                    .attributes
                    .borrow()
                    .map
                    .iter()
                    .map(|(k, v)| (k.local.as_ref().to_ascii_lowercase(), v.value.clone()))
                    .collect();
                let id = self.append_child(
                    parent,
                    NodeKind::Element(ElementData {
                        tag,
                        attrs,
                        pseudo: None,
                        declarations: Vec::new(),
                        synthetic: false,
                    }),
                );
                let children: Vec<NodeRef> = match &el.template_contents {
                    Some(contents) => contents.children().collect(),
                    None => node.children().collect(),
                };
                for child in children {
                    self.import(&child, id);
                }
            }
            NodeData::Text(text) => {
                let text = text.borrow().clone();
                self.append_child(parent, NodeKind::Text(text));
            }
            NodeData::DocumentFragment => {
                for child in node.children() {
                    self.import(&child, parent);
                }
            }
            _ => {}
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            style: None,
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(kind, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append_child(parent, NodeKind::Text(text.to_string()))
    }

    pub fn create_pseudo(
        &mut self,
        origin: NodeId,
        kind: PseudoKind,
        declarations: Vec<Declaration>,
    ) -> NodeId {
        self.push(
            NodeKind::Element(ElementData {
                tag: kind.tag().to_string(),
                attrs: Vec::new(),
                pseudo: Some(kind),
                declarations,
                synthetic: true,
            }),
            Some(origin),
        )
    }

    pub fn append_synthetic(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let kind = match kind {
            NodeKind::Element(mut el) => {
                el.synthetic = true;
                NodeKind::Element(el)
            }
            other => other,
        };
        self.append_child(parent, kind)
    }

    pub fn clear_children(&mut self, node: NodeId) {
        self.nodes[node.0].children.clear();
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attr(name))
    }

    pub fn pseudo(&self, node: NodeId) -> Option<PseudoKind> {
        self.element(node).and_then(|el| el.pseudo)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.is_element(parent).then_some(parent)
    }

    pub fn preceding_element_siblings(&self, node: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(node) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        let Some(pos) = siblings.iter().position(|id| *id == node) else {
            return Vec::new();
        };
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .filter(|id| self.is_element(*id))
            .collect()
    }

    pub fn element_position(&self, node: NodeId, same_tag: bool) -> (usize, usize) {
        let Some(parent) = self.parent(node) else {
            return (1, 1);
        };
        let tag = self.tag(node);
        let mut index = 0;
        let mut count = 0;
        for sibling in self.children(parent) {
            if !self.is_element(*sibling) {
                continue;
            }
            if same_tag && self.tag(*sibling) != tag {
                continue;
            }
            count += 1;
            if *sibling == node {
                index = count;
            }
        }
        (index.max(1), count.max(1))
    }

    pub fn is_root_element(&self, node: NodeId) -> bool {
        self.is_element(node) && self.pseudo(node).is_none() && self.parent(node) == Some(self.root)
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    pub fn find_first(&self, tag: &str) -> Option<NodeId> {
        self.find_all(tag).into_iter().next()
    }

    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_tag(self.root, tag, &mut out);
        out
    }

    fn collect_tag(&self, node: NodeId, tag: &str, out: &mut Vec<NodeId>) {
        if self.tag(node) == Some(tag) {
            out.push(node);
        }
        for child in &self.nodes[node.0].children {
            self.collect_tag(*child, tag, out);
        }
    }

    pub fn style(&self, node: NodeId) -> Option<Rc<StyleMap>> {
        self.nodes.get(node.0).and_then(|n| n.style.clone())
    }

    pub fn set_style(&mut self, node: NodeId, style: Rc<StyleMap>) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.style = Some(style);
        }
    }

    pub fn clear_style(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.style = None;
        }
    }

    pub fn styled_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.style.is_some()).count()
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_elements_attributes_and_text() {
        let tree = DomTree::parse_html(
            "<html lang=en><body><p id=intro class='a b'>Hello <b>world</b></p></body></html>",
        );
        let html = tree.document_element().expect("html element");
        assert_eq!(tree.tag(html), Some("html"));
        assert_eq!(tree.attr(html, "lang"), Some("en"));
        assert!(tree.is_root_element(html));
        let p = tree.find_first("p").expect("p");
        assert_eq!(tree.attr(p, "class"), Some("a b"));
        assert_eq!(tree.text_content(p), "Hello world");
    }

    #[test]
    fn pseudo_nodes_are_not_children() {
        let mut tree = DomTree::parse_html("<p>x</p>");
        let p = tree.find_first("p").expect("p");
        let before = tree.create_pseudo(p, PseudoKind::Before, Vec::new());
        assert_eq!(tree.parent(before), Some(p));
        assert!(!tree.children(p).contains(&before));
        assert_eq!(tree.pseudo(before), Some(PseudoKind::Before));
    }

    #[test]
    fn element_positions_skip_text() {
        let tree = DomTree::parse_html("<ul><li>a</li> <li>b</li> <li>c</li></ul>");
        let items = tree.find_all("li");
        assert_eq!(tree.element_position(items[1], false), (2, 3));
        assert_eq!(tree.preceding_element_siblings(items[2]), vec![items[1], items[0]]);
    }
}
