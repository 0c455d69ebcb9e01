use crate::content;
use crate::dom::{DomTree, NodeId, NodeKind, PseudoKind};
use crate::handler::{apply_text_props, ElementHandler, HandlerInput, HandlerRegistry};
use crate::layout::{property, LayoutElement, LayoutKind, PropertyMap, PropertyValue};
use crate::metadata::DocumentMetadata;
use crate::outline::{DestinationNamer, OutlineEntry};
use crate::resources::ResourceResolver;
use crate::running::RunningRegistry;
use crate::style::{CssContext, StyleMap, StyleResolver};
use crate::types::Pt;
use std::rc::Rc;

pub struct ConversionContext {
    pub css: CssContext,
    pub running: RunningRegistry,
    pub metadata: DocumentMetadata,
    pub outlines: Vec<OutlineEntry>,
    pub root_style: Option<Rc<StyleMap>>,
    namer: DestinationNamer,
    stack: Vec<Box<dyn ElementHandler>>,
    roots: Vec<LayoutElement>,
}

impl ConversionContext {
    pub fn new(base_font_size: Pt, outline_prefix: &str) -> Self {
        Self {
            css: CssContext::new(base_font_size),
            running: RunningRegistry::new(),
            metadata: DocumentMetadata::default(),
            outlines: Vec::new(),
            root_style: None,
            namer: DestinationNamer::new(outline_prefix),
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.css.reset();
        self.running.clear();
        self.outlines.clear();
        self.root_style = None;
        self.namer.reset();
        self.stack.clear();
        self.roots.clear();
    }
}

pub struct Dispatcher<'a> {
    resolver: &'a StyleResolver,
    handlers: &'a HandlerRegistry,
    resources: &'a dyn ResourceResolver,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        resolver: &'a StyleResolver,
        handlers: &'a HandlerRegistry,
        resources: &'a dyn ResourceResolver,
    ) -> Self {
        Self {
            resolver,
            handlers,
            resources,
        }
    }

    pub fn process(&self, tree: &mut DomTree, root: NodeId, ctx: &mut ConversionContext) -> LayoutElement {
        ctx.stack.clear();
        ctx.roots.clear();
        self.visit(tree, root, ctx);
        let mut roots = std::mem::take(&mut ctx.roots);
        if roots.len() == 1 {
            if let Some(root) = roots.pop() {
                return root;
            }
        }
        let mut document = LayoutElement::new(LayoutKind::Document);
        ctx.metadata.stamp(&mut document);
        document.children = roots;
        document
    }

    pub fn process_detached(
        &self,
        tree: &mut DomTree,
        node: NodeId,
        ctx: &mut ConversionContext,
    ) -> Option<LayoutElement> {
        let saved_stack = std::mem::take(&mut ctx.stack);
        let saved_roots = std::mem::take(&mut ctx.roots);
        self.visit_element(tree, node, ctx);
        let produced = std::mem::take(&mut ctx.roots).into_iter().next();
        ctx.stack = saved_stack;
        ctx.roots = saved_roots;
        produced
    }

    fn visit(&self, tree: &mut DomTree, node: NodeId, ctx: &mut ConversionContext) {
        match tree.kind(node).clone() {
            NodeKind::Document => {
                for child in tree.children(node).to_vec() {
                    self.visit(tree, child, ctx);
                }
            }
            NodeKind::Element(_) => self.visit_element(tree, node, ctx),
            NodeKind::Text(text) => self.visit_text(tree, node, &text, ctx),
            NodeKind::PageCounter { total, style } => {
                self.deliver_marker(tree, node, LayoutKind::PageNumber { total, style }, ctx)
            }
            NodeKind::TargetPage { target, style } => {
                self.deliver_marker(tree, node, LayoutKind::TargetPage { target, style }, ctx)
            }
            NodeKind::RunningRef { name, policy } => {
                self.deliver_marker(tree, node, LayoutKind::RunningSlot { name, policy }, ctx)
            }
            NodeKind::StringRef { name, policy } => {
                self.deliver_marker(tree, node, LayoutKind::NamedString { name, policy }, ctx)
            }
        }
    }

    fn visit_text(&self, tree: &DomTree, node: NodeId, text: &str, ctx: &mut ConversionContext) {
        let style = tree
            .parent(node)
            .and_then(|parent| tree.style(parent))
            .unwrap_or_default();
        match ctx.stack.last_mut() {
            Some(top) => {
                if !top.process_content(text, &style) {
                    log::debug!("text dropped by its handler");
                }
            }
            None => log::debug!("text without a consuming handler"),
        }
    }

    fn deliver_marker(
        &self,
        tree: &DomTree,
        node: NodeId,
        kind: LayoutKind,
        ctx: &mut ConversionContext,
    ) {
        let style = tree
            .parent(node)
            .and_then(|parent| tree.style(parent))
            .unwrap_or_default();
        let mut props = PropertyMap::new();
        apply_text_props(&mut props, &style);
        deliver(ctx, LayoutElement::with_props(kind, props));
    }

    fn visit_element(&self, tree: &mut DomTree, node: NodeId, ctx: &mut ConversionContext) {
        ctx.css.counters.push_scope();
        let style = self.resolver.resolve(tree, node, &mut ctx.css);
        let pseudo = tree.pseudo(node);
        let tag = tree.tag(node).unwrap_or_default().to_string();
        if pseudo.is_none() && tree.is_root_element(node) {
            ctx.root_style = Some(style.clone());
        }

        if style.is_display_none() {
            log::trace!("<{tag}> pruned by display:none");
            self.leave(tree, node, ctx);
            return;
        }
        if pseudo.is_some() && is_suppressed(tree, node, &style) {
            log::trace!("{tag} suppressed without content");
            self.leave(tree, node, ctx);
            return;
        }

        log::trace!("dispatch <{tag}> display={}", style.display());
        let handler = self.handlers.create(
            &tag,
            &HandlerInput {
                tree,
                node,
                style: &style,
                resources: self.resources,
            },
        );
        let pushed = match handler {
            Some(mut handler) => {
                if ctx.stack.is_empty() && pseudo.is_none() {
                    if let Some(element) = handler.element_mut() {
                        ctx.metadata.stamp(element);
                    }
                }
                ctx.stack.push(handler);
                true
            }
            None => {
                log::warn!("no handler for <{tag}> ({}); children processed", style.display());
                false
            }
        };

        let string_sets = match style.get("string-set") {
            Some(value) if pseudo.is_none() && !value.eq_ignore_ascii_case("none") => {
                content::evaluate_string_set(tree, node, value, &ctx.css)
            }
            _ => Vec::new(),
        };

        if pseudo.is_none() {
            self.visit_pseudo(tree, node, PseudoKind::Before, ctx);
            if wants_placeholder(tree, node, &tag) {
                self.visit_pseudo(tree, node, PseudoKind::Placeholder, ctx);
            }
        }
        if tag != "svg" {
            for child in tree.children(node).to_vec() {
                self.visit(tree, child, ctx);
            }
        }
        if pseudo.is_none() {
            self.visit_pseudo(tree, node, PseudoKind::After, ctx);
        }

        if pushed {
            if let Some(mut handler) = ctx.stack.pop() {
                handler.complete();
                if let Some(element) = handler.take_element() {
                    let element = self.finish_element(tree, node, &tag, &style, element, string_sets, ctx);
                    deliver(ctx, element);
                }
            }
        } else {
            for (name, value) in string_sets {
                deliver(ctx, LayoutElement::new(LayoutKind::StringMarker { name, value }));
            }
        }
        self.leave(tree, node, ctx);
    }

    fn visit_pseudo(&self, tree: &mut DomTree, origin: NodeId, kind: PseudoKind, ctx: &mut ConversionContext) {
        let pseudo = tree.create_pseudo(origin, kind, Vec::new());
        self.visit_element(tree, pseudo, ctx);
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_element(
        &self,
        tree: &DomTree,
        node: NodeId,
        tag: &str,
        style: &StyleMap,
        mut element: LayoutElement,
        string_sets: Vec<(String, String)>,
        ctx: &mut ConversionContext,
    ) -> LayoutElement {
        let is_pseudo = tree.pseudo(node).is_some();
        if !is_pseudo {
            if let Some(id) = tree.attr(node, "id") {
                element
                    .props
                    .set(property::DESTINATION, PropertyValue::Text(id.to_string()));
            }
            if let Some(level) = heading_level(tag) {
                let title = tree
                    .text_content(node)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !title.is_empty() {
                    let destination = ctx.namer.next_name();
                    element.props.set(
                        property::OUTLINE_DESTINATION,
                        PropertyValue::Text(destination.clone()),
                    );
                    ctx.outlines.push(OutlineEntry {
                        title,
                        level,
                        destination,
                    });
                }
            }
        }

        if !string_sets.is_empty() {
            let markers = string_sets
                .into_iter()
                .map(|(name, value)| LayoutElement::new(LayoutKind::StringMarker { name, value }));
            match element.kind {
                LayoutKind::Block | LayoutKind::Inline => {
                    let rest = std::mem::take(&mut element.children);
                    element.children = markers.chain(rest).collect();
                }
                _ => {
                    let mut wrapper = LayoutElement::new(LayoutKind::Inline);
                    wrapper.children = markers.collect();
                    wrapper.push(element);
                    element = wrapper;
                }
            }
        }

        if let Some(name) = style.running_name() {
            let id = ctx.running.register(&name, element);
            return LayoutElement::new(LayoutKind::RunningMarker(id));
        }
        element
    }

    fn leave(&self, tree: &mut DomTree, node: NodeId, ctx: &mut ConversionContext) {
        tree.clear_style(node);
        ctx.css.counters.pop_scope();
    }
}

fn deliver(ctx: &mut ConversionContext, element: LayoutElement) {
    match ctx.stack.last_mut() {
        Some(top) => {
            if !top.accept_child(element) {
                log::debug!("child primitive dropped by its parent handler");
            }
        }
        None => ctx.roots.push(element),
    }
}

fn is_suppressed(tree: &DomTree, node: NodeId, style: &StyleMap) -> bool {
    if matches!(tree.pseudo(node), Some(PseudoKind::Before | PseudoKind::After))
        && matches!(style.keyword("content").as_str(), "normal" | "none" | "")
    {
        return true;
    }
    let has_text = !tree.text_content(node).is_empty();
    let has_nodes = tree
        .children(node)
        .iter()
        .any(|child| !matches!(tree.kind(*child), NodeKind::Text(_)));
    let positioned = style.is_out_of_flow();
    let non_inline = style.display() != "inline";
    !(has_text || has_nodes || positioned || non_inline)
}

fn wants_placeholder(tree: &DomTree, node: NodeId, tag: &str) -> bool {
    if !matches!(tag, "input" | "textarea") {
        return false;
    }
    let has_placeholder = tree
        .attr(node, "placeholder")
        .is_some_and(|text| !text.is_empty());
    let value_empty = if tag == "textarea" {
        tree.text_content(node).is_empty()
    } else {
        tree.attr(node, "value").is_none_or(|value| value.is_empty())
    };
    has_placeholder && value_empty
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::DataUriResolver;
    use crate::stylesheet::MediaDevice;

    fn run(html: &str, css: &str) -> (LayoutElement, ConversionContext, DomTree) {
        let resolver = StyleResolver::new(css, &MediaDevice::default());
        let handlers = HandlerRegistry::with_defaults();
        let dispatcher = Dispatcher::new(&resolver, &handlers, &DataUriResolver);
        let mut tree = DomTree::parse_html(html);
        let mut ctx = ConversionContext::new(Pt::from_i32(12), "d-");
        let root = tree.root();
        let element = dispatcher.process(&mut tree, root, &mut ctx);
        (element, ctx, tree)
    }

    fn texts(element: &LayoutElement) -> usize {
        element.count(&|el| matches!(el.kind, LayoutKind::Text(_)))
    }

    #[test]
    fn display_none_subtrees_vanish() {
        let (root, _, _) = run(
            "<div>keep</div><div class='gone'><p>drop</p><span>drop</span></div>",
            ".gone { display: none }",
        );
        assert!(root.text_content().contains("keep"));
        assert!(!root.text_content().contains("drop"));
        assert_eq!(texts(&root), 1);
    }

    #[test]
    fn root_is_html_and_stamped() {
        let (root, _, _) = run("<title>T</title><p>x</p>", "");
        assert_eq!(root.kind, LayoutKind::Block);
        assert_eq!(root.text_content(), "x");
    }

    #[test]
    fn styles_are_cleared_after_walk() {
        let (_, _, tree) = run("<div><p>a <b>b</b></p></div>", "");
        assert_eq!(tree.styled_count(), 0);
        let (_, _, tree) = run(
            "<div class='gone'><p>x</p></div><ul><li>one<li>two</ul><p>tail</p>",
            ".gone { display: none } p::before { content: '>' } li::after { content: '*' }",
        );
        assert_eq!(tree.styled_count(), 0);
    }

    #[test]
    fn pseudo_elements_wrap_children_in_order() {
        let (root, _, _) = run(
            "<p>body</p>",
            r#"p::before { content: "[" } p::after { content: "]" }"#,
        );
        assert_eq!(root.text_content(), "[body]");
    }

    #[test]
    fn empty_pseudo_is_suppressed() {
        let (root, _, _) = run("<p>x</p>", r#"p::before { content: "" }"#);
        let p = root
            .find(&|el| el.kind == LayoutKind::Block && el.text_content() == "x" && el.children.len() == 1)
            .is_some();
        assert!(p);
    }

    #[test]
    fn running_elements_leave_markers() {
        let (root, ctx, _) = run(
            "<div class='hdr'>Header</div><p>Body</p>",
            ".hdr { position: running(header) }",
        );
        assert_eq!(ctx.running.len(), 1);
        assert!(!root.text_content().contains("Header"));
        assert!(root
            .find(&|el| matches!(el.kind, LayoutKind::RunningMarker(_)))
            .is_some());
    }

    #[test]
    fn headings_produce_outline_entries() {
        let (root, ctx, _) = run("<h1>One</h1><h2 id='two'>Two <i>b</i></h2>", "");
        assert_eq!(ctx.outlines.len(), 2);
        assert_eq!(ctx.outlines[0].destination, "d-0");
        assert_eq!(ctx.outlines[1].title, "Two b");
        assert_eq!(ctx.outlines[1].level, 2);
        assert!(root
            .find(&|el| el.props.text(property::DESTINATION) == Some("two"))
            .is_some());
    }

    #[test]
    fn break_before_inserts_area_break() {
        let (root, _, _) = run(
            r#"<div>A</div><div style="break-before: always">B</div>"#,
            "",
        );
        assert_eq!(
            root.count(&|el| matches!(el.kind, LayoutKind::AreaBreak(_))),
            1
        );
    }

    #[test]
    fn placeholder_fills_empty_inputs() {
        let (root, _, _) = run(
            r#"<input placeholder="Name"><input value="Set" placeholder="Ignored">"#,
            "",
        );
        let text = root.text_content();
        assert!(text.contains("Name"));
        assert!(text.contains("Set"));
        assert!(!text.contains("Ignored"));
    }

    #[test]
    fn string_set_markers_lead_the_element() {
        let (root, _, _) = run("<h1>Intro</h1>", "h1 { string-set: chapter content() }");
        let marker = root.find(&|el| matches!(el.kind, LayoutKind::StringMarker { .. }));
        assert_eq!(
            marker.map(|el| el.kind.clone()),
            Some(LayoutKind::StringMarker {
                name: "chapter".to_string(),
                value: "Intro".to_string()
            })
        );
    }

    #[test]
    fn unknown_tags_keep_their_text() {
        let (root, _, _) = run("<p><blink>flash</blink></p>", "");
        assert!(root.text_content().contains("flash"));
    }

    #[test]
    fn svg_children_are_skipped() {
        let (root, _, _) = run(
            r#"<svg width="10" height="10"><text>inner</text></svg>"#,
            "",
        );
        assert!(!root.text_content().contains("inner"));
    }
}
