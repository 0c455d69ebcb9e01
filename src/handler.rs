use crate::css_values::parse_length;
use crate::dom::{DomTree, NodeId, PseudoKind};
use crate::layout::{property, BreakPolicy, LayoutElement, LayoutKind, PropertyMap, PropertyValue};
use crate::resources::{ImageResource, ResourceResolver};
use crate::style::StyleMap;
use crate::types::Pt;
use std::collections::HashMap;

pub struct HandlerInput<'a> {
    pub tree: &'a DomTree,
    pub node: NodeId,
    pub style: &'a StyleMap,
    pub resources: &'a dyn ResourceResolver,
}

impl HandlerInput<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.tree.attr(self.node, name)
    }
}

pub trait ElementHandler {
    fn accept_child(&mut self, child: LayoutElement) -> bool;

    fn process_content(&mut self, text: &str, style: &StyleMap) -> bool;

    fn complete(&mut self) {}

    fn element(&self) -> Option<&LayoutElement>;

    fn element_mut(&mut self) -> Option<&mut LayoutElement>;

    fn take_element(&mut self) -> Option<LayoutElement>;
}

pub type HandlerFactory = fn(&HandlerInput<'_>) -> Box<dyn ElementHandler>;

pub struct HandlerRegistry {
    by_tag_display: HashMap<(String, String), HandlerFactory>,
    by_tag: HashMap<String, HandlerFactory>,
}

const CONTAINER_TAGS: &[&str] = &[
    "html", "body", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "header", "footer", "nav", "aside", "main", "blockquote", "pre", "ul", "ol", "li", "dl",
    "dt", "dd", "figure", "figcaption", "form", "fieldset", "legend", "address", "hr", "center",
    "table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption", "span", "a", "b", "strong",
    "i", "em", "u", "ins", "s", "del", "small", "big", "code", "kbd", "samp", "tt", "var", "cite",
    "dfn", "abbr", "q", "sub", "sup", "mark", "font", "label", "time", "button", "select",
    "option", "summary", "details",
];

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            by_tag_display: HashMap::new(),
            by_tag: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for tag in CONTAINER_TAGS {
            registry.register(tag, None, ContainerHandler::create);
        }
        for pseudo in [
            PseudoKind::Before.tag(),
            PseudoKind::After.tag(),
            PseudoKind::Placeholder.tag(),
            "::margin-box",
        ] {
            registry.register(pseudo, None, ContainerHandler::create);
        }
        registry.register("img", None, ImageHandler::create);
        registry.register("img", Some("block"), ImageHandler::create_block);
        registry.register("br", None, LineBreakHandler::create);
        registry.register("input", None, InputHandler::create);
        registry.register("textarea", None, InputHandler::create);
        registry.register("svg", None, SvgHandler::create);
        registry
    }

    pub fn register(&mut self, tag: &str, display: Option<&str>, factory: HandlerFactory) {
        match display {
            Some(display) => {
                self.by_tag_display
                    .insert((tag.to_string(), display.to_string()), factory);
            }
            None => {
                self.by_tag.insert(tag.to_string(), factory);
            }
        }
    }

    pub fn lookup(&self, tag: &str, display: &str) -> Option<HandlerFactory> {
        self.by_tag_display
            .get(&(tag.to_string(), display.to_string()))
            .or_else(|| self.by_tag.get(tag))
            .copied()
    }

    pub fn create(&self, tag: &str, input: &HandlerInput<'_>) -> Option<Box<dyn ElementHandler>> {
        self.lookup(tag, input.style.display()).map(|factory| factory(input))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

pub struct ContainerHandler {
    element: Option<LayoutElement>,
}

impl ContainerHandler {
    pub fn create(input: &HandlerInput<'_>) -> Box<dyn ElementHandler> {
        let kind = if input.style.is_block_level() || input.style.is_out_of_flow() {
            LayoutKind::Block
        } else {
            LayoutKind::Inline
        };
        let mut props = PropertyMap::new();
        apply_text_props(&mut props, input.style);
        apply_box_props(&mut props, input.style);
        Box::new(Self {
            element: Some(LayoutElement::with_props(kind, props)),
        })
    }
}

impl ElementHandler for ContainerHandler {
    fn accept_child(&mut self, child: LayoutElement) -> bool {
        let Some(element) = self.element.as_mut() else {
            return false;
        };
        push_with_breaks(element, child);
        true
    }

    fn process_content(&mut self, text: &str, style: &StyleMap) -> bool {
        let Some(element) = self.element.as_mut() else {
            return false;
        };
        push_text(element, text, style);
        true
    }

    fn element(&self) -> Option<&LayoutElement> {
        self.element.as_ref()
    }

    fn element_mut(&mut self) -> Option<&mut LayoutElement> {
        self.element.as_mut()
    }

    fn take_element(&mut self) -> Option<LayoutElement> {
        self.element.take()
    }
}

pub struct ImageHandler {
    element: Option<LayoutElement>,
}

impl ImageHandler {
    pub fn create(input: &HandlerInput<'_>) -> Box<dyn ElementHandler> {
        Box::new(Self {
            element: Some(Self::build(input, false)),
        })
    }

    pub fn create_block(input: &HandlerInput<'_>) -> Box<dyn ElementHandler> {
        Box::new(Self {
            element: Some(Self::build(input, true)),
        })
    }

    fn build(input: &HandlerInput<'_>, block: bool) -> LayoutElement {
        let src = input.attr("src").unwrap_or_default();
        let mut props = PropertyMap::new();
        apply_text_props(&mut props, input.style);
        apply_box_props(&mut props, input.style);
        let Some(image) = ImageResource::load(input.resources, src) else {
            let alt = input.attr("alt").unwrap_or_default().to_string();
            let mut inline = LayoutElement::with_props(LayoutKind::Inline, props);
            if !alt.is_empty() {
                push_text(&mut inline, &alt, input.style);
            }
            return inline;
        };

        let (width, height) = image_size(input, &image);
        props.set(property::WIDTH, PropertyValue::Length(width));
        props.set(property::HEIGHT, PropertyValue::Length(height));
        let element = LayoutElement::with_props(LayoutKind::Image(image), props.clone());
        if block {
            let mut wrapper = LayoutElement::with_props(LayoutKind::Block, props);
            wrapper.props.remove(property::WIDTH);
            wrapper.props.remove(property::HEIGHT);
            wrapper.push(element);
            wrapper
        } else {
            element
        }
    }
}

fn image_size(input: &HandlerInput<'_>, image: &ImageResource) -> (Pt, Pt) {
    let font_size = input.style.font_size();
    let dimension = |css: &str, attr: &str| {
        input.style.length(css).or_else(|| {
            input
                .attr(attr)
                .and_then(|raw| parse_length(&format!("{}px", raw.trim_end_matches("px")), font_size, font_size))
        })
    };
    let intrinsic_w = Pt::from_f32(image.width_px as f32 * 0.75);
    let intrinsic_h = Pt::from_f32(image.height_px as f32 * 0.75);
    match (dimension("width", "width"), dimension("height", "height")) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if image.width_px > 0 => {
            (w, w.mul_ratio(image.height_px as i32, image.width_px as i32))
        }
        (None, Some(h)) if image.height_px > 0 => {
            (h.mul_ratio(image.width_px as i32, image.height_px as i32), h)
        }
        _ => (intrinsic_w, intrinsic_h),
    }
}

pub struct LineBreakHandler {
    element: Option<LayoutElement>,
}

impl LineBreakHandler {
    pub fn create(input: &HandlerInput<'_>) -> Box<dyn ElementHandler> {
        let mut props = PropertyMap::new();
        apply_text_props(&mut props, input.style);
        Box::new(Self {
            element: Some(LayoutElement::with_props(LayoutKind::LineBreak, props)),
        })
    }
}

impl ElementHandler for LineBreakHandler {
    fn accept_child(&mut self, _child: LayoutElement) -> bool {
        false
    }

    fn process_content(&mut self, _text: &str, _style: &StyleMap) -> bool {
        false
    }

    fn element(&self) -> Option<&LayoutElement> {
        self.element.as_ref()
    }

    fn element_mut(&mut self) -> Option<&mut LayoutElement> {
        self.element.as_mut()
    }

    fn take_element(&mut self) -> Option<LayoutElement> {
        self.element.take()
    }
}

impl ElementHandler for ImageHandler {
    fn accept_child(&mut self, child: LayoutElement) -> bool {
        match self.element.as_mut() {
            Some(element) if !matches!(element.kind, LayoutKind::Image(_)) => {
                element.push(child);
                true
            }
            _ => false,
        }
    }

    fn process_content(&mut self, _text: &str, _style: &StyleMap) -> bool {
        false
    }

    fn element(&self) -> Option<&LayoutElement> {
        self.element.as_ref()
    }

    fn element_mut(&mut self) -> Option<&mut LayoutElement> {
        self.element.as_mut()
    }

    fn take_element(&mut self) -> Option<LayoutElement> {
        self.element.take()
    }
}

pub struct InputHandler {
    element: Option<LayoutElement>,
    has_value: bool,
}

impl InputHandler {
    pub fn create(input: &HandlerInput<'_>) -> Box<dyn ElementHandler> {
        let mut props = PropertyMap::new();
        apply_text_props(&mut props, input.style);
        apply_box_props(&mut props, input.style);
        let mut element = LayoutElement::with_props(LayoutKind::Inline, props);
        let is_textarea = input.tree.tag(input.node) == Some("textarea");
        let value = if is_textarea {
            input.tree.text_content(input.node)
        } else {
            input.attr("value").unwrap_or_default().to_string()
        };
        let hidden = input
            .attr("type")
            .is_some_and(|kind| kind.eq_ignore_ascii_case("hidden"));
        let has_value = !value.is_empty();
        if has_value && !hidden && !is_textarea {
            push_text(&mut element, &value, input.style);
        }
        Box::new(Self {
            element: Some(element),
            has_value,
        })
    }
}

impl ElementHandler for InputHandler {
    fn accept_child(&mut self, child: LayoutElement) -> bool {
        if self.has_value && !matches!(child.kind, LayoutKind::Text(_)) {
            return false;
        }
        match self.element.as_mut() {
            Some(element) => {
                element.push(child);
                true
            }
            None => false,
        }
    }

    fn process_content(&mut self, text: &str, style: &StyleMap) -> bool {
        let Some(element) = self.element.as_mut() else {
            return false;
        };
        push_text(element, text, style);
        true
    }

    fn element(&self) -> Option<&LayoutElement> {
        self.element.as_ref()
    }

    fn element_mut(&mut self) -> Option<&mut LayoutElement> {
        self.element.as_mut()
    }

    fn take_element(&mut self) -> Option<LayoutElement> {
        self.element.take()
    }
}

pub struct SvgHandler {
    element: Option<LayoutElement>,
}

impl SvgHandler {
    pub fn create(input: &HandlerInput<'_>) -> Box<dyn ElementHandler> {
        let mut props = PropertyMap::new();
        apply_box_props(&mut props, input.style);
        let font_size = input.style.font_size();
        let attr_len = |name: &str| {
            input
                .attr(name)
                .and_then(|raw| parse_length(&format!("{}px", raw.trim_end_matches("px")), font_size, font_size))
        };
        let width = input.style.length("width").or_else(|| attr_len("width"));
        let height = input.style.length("height").or_else(|| attr_len("height"));
        props.set(
            property::WIDTH,
            PropertyValue::Length(width.unwrap_or(Pt::from_i32(225))),
        );
        props.set(
            property::HEIGHT,
            PropertyValue::Length(height.unwrap_or(Pt::from_f32(112.5))),
        );
        Box::new(Self {
            element: Some(LayoutElement::with_props(LayoutKind::Block, props)),
        })
    }
}

impl ElementHandler for SvgHandler {
    fn accept_child(&mut self, _child: LayoutElement) -> bool {
        false
    }

    fn process_content(&mut self, _text: &str, _style: &StyleMap) -> bool {
        false
    }

    fn element(&self) -> Option<&LayoutElement> {
        self.element.as_ref()
    }

    fn element_mut(&mut self) -> Option<&mut LayoutElement> {
        self.element.as_mut()
    }

    fn take_element(&mut self) -> Option<LayoutElement> {
        self.element.take()
    }
}

fn push_with_breaks(parent: &mut LayoutElement, child: LayoutElement) {
    let before = child
        .props
        .text(property::BREAK_BEFORE)
        .map(BreakPolicy::from_css)
        .unwrap_or_default();
    let after = child
        .props
        .text(property::BREAK_AFTER)
        .map(BreakPolicy::from_css)
        .unwrap_or_default();
    if before != BreakPolicy::None {
        parent.push(LayoutElement::new(LayoutKind::AreaBreak(before)));
    }
    parent.push(child);
    if after != BreakPolicy::None {
        parent.push(LayoutElement::new(LayoutKind::AreaBreak(after)));
    }
}

fn push_text(parent: &mut LayoutElement, text: &str, style: &StyleMap) {
    let preserve = preserve_whitespace(style);
    let normalized = normalize_text(text, preserve);
    if normalized.is_empty() {
        return;
    }
    let transformed = apply_text_transform(&normalized, &style.keyword("text-transform"));
    let mut props = PropertyMap::new();
    apply_text_props(&mut props, style);
    parent.push(LayoutElement::with_props(LayoutKind::Text(transformed), props));
}

fn preserve_whitespace(style: &StyleMap) -> bool {
    matches!(
        style.keyword("white-space").as_str(),
        "pre" | "pre-wrap" | "break-spaces"
    )
}

fn normalize_text(text: &str, preserve: bool) -> String {
    if preserve {
        return text.replace("\r\n", "\n").replace('\r', "\n");
    }
    let mut out = String::new();
    let mut in_space = false;
    for ch in text.chars() {
        let ch = if ch == '\u{00A0}' { ' ' } else { ch };
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn apply_text_transform(text: &str, mode: &str) -> String {
    match mode {
        "uppercase" => text.to_uppercase(),
        "lowercase" => text.to_lowercase(),
        "capitalize" => {
            let mut out = String::with_capacity(text.len());
            let mut new_word = true;
            for ch in text.chars() {
                if ch.is_whitespace() {
                    new_word = true;
                    out.push(ch);
                    continue;
                }
                if new_word {
                    out.extend(ch.to_uppercase());
                    new_word = false;
                } else {
                    out.push(ch);
                }
            }
            out
        }
        _ => text.to_string(),
    }
}

pub fn apply_text_props(props: &mut PropertyMap, style: &StyleMap) {
    props.set(
        property::FONT_FAMILY,
        PropertyValue::Text(style.get("font-family").unwrap_or("helvetica").to_string()),
    );
    props.set(property::FONT_SIZE, PropertyValue::Length(style.font_size()));
    props.set(property::BOLD, PropertyValue::Flag(style.is_bold()));
    props.set(property::ITALIC, PropertyValue::Flag(style.is_italic()));
    if let Some(color) = style.color("color") {
        props.set(property::COLOR, PropertyValue::Color(color));
    }
    props.set(property::LINE_HEIGHT, PropertyValue::Length(style.line_height()));
    props.set(
        property::UNDERLINE,
        PropertyValue::Flag(style.keyword("text-decoration").contains("underline")),
    );
    props.set(
        property::PRESERVE_WHITESPACE,
        PropertyValue::Flag(preserve_whitespace(style)),
    );
    props.set(
        property::TEXT_ALIGN,
        PropertyValue::Text(style.keyword("text-align")),
    );
}

pub fn apply_box_props(props: &mut PropertyMap, style: &StyleMap) {
    const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];
    for (i, side) in SIDES.iter().enumerate() {
        props.set(
            property::BOX_EDGES[0][i],
            length_property(style, &format!("margin-{side}")),
        );
        props.set(
            property::BOX_EDGES[1][i],
            PropertyValue::Length(style.length(&format!("border-{side}-width")).unwrap_or(Pt::ZERO)),
        );
        props.set(
            property::BOX_EDGES[2][i],
            length_property(style, &format!("padding-{side}")),
        );
        if let Some(color) = style.color(&format!("border-{side}-color")) {
            props.set(
                [
                    property::BORDER_TOP_COLOR,
                    property::BORDER_RIGHT_COLOR,
                    property::BORDER_BOTTOM_COLOR,
                    property::BORDER_LEFT_COLOR,
                ][i],
                PropertyValue::Color(color),
            );
        }
    }
    if let Some(color) = style.color("background-color") {
        props.set(property::BACKGROUND_COLOR, PropertyValue::Color(color));
    }
    props.set(property::WIDTH, length_property(style, "width"));
    props.set(property::HEIGHT, length_property(style, "height"));
    props.set(property::MIN_HEIGHT, length_property(style, "min-height"));
    if let Some(indent) = style.length("text-indent") {
        props.set(property::TEXT_INDENT, PropertyValue::Length(indent));
    }
    props.set(
        property::VERTICAL_ALIGN,
        PropertyValue::Text(style.keyword("vertical-align")),
    );
    for (name, id) in [
        ("break-before", property::BREAK_BEFORE),
        ("break-after", property::BREAK_AFTER),
    ] {
        let policy = BreakPolicy::from_css(&style.keyword(name));
        if policy != BreakPolicy::None {
            props.set(id, PropertyValue::Text(policy.as_str().to_string()));
        }
    }
    if style.is_out_of_flow() {
        props.set(property::OUT_OF_FLOW, PropertyValue::Flag(true));
    }
    if style.keyword("visibility") == "hidden" {
        props.set(property::HIDDEN, PropertyValue::Flag(true));
    }
}

fn length_property(style: &StyleMap, name: &str) -> PropertyValue {
    match style.length_value(name) {
        Some(crate::css_values::LengthValue::Length(value)) => PropertyValue::Length(value),
        Some(crate::css_values::LengthValue::Percent(pct)) => PropertyValue::Percent(pct),
        _ => PropertyValue::Auto,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::DataUriResolver;

    fn style(pairs: &[(&str, &str)]) -> StyleMap {
        let mut map = StyleMap::new();
        for (name, value) in pairs {
            map.set(*name, *value);
        }
        map
    }

    #[test]
    fn lookup_prefers_tag_and_display() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.lookup("div", "block").is_some());
        assert!(registry.lookup("img", "block").is_some());
        assert!(registry.lookup("blink", "inline").is_none());
        let mut custom = HandlerRegistry::empty();
        custom.register("x-note", Some("block"), ContainerHandler::create);
        assert!(custom.lookup("x-note", "block").is_some());
        assert!(custom.lookup("x-note", "inline").is_none());
    }

    #[test]
    fn container_kind_follows_display() {
        let tree = DomTree::parse_html("<div>x</div>");
        let node = tree.find_first("div").expect("div");
        let block = style(&[("display", "block"), ("margin-top", "10pt")]);
        let input = HandlerInput {
            tree: &tree,
            node,
            style: &block,
            resources: &DataUriResolver,
        };
        let mut handler = ContainerHandler::create(&input);
        assert!(handler.process_content("  hello \n world ", &block));
        let element = handler.take_element().expect("element");
        assert_eq!(element.kind, LayoutKind::Block);
        assert_eq!(element.props.length(property::MARGIN_TOP), Some(Pt::from_i32(10)));
        assert_eq!(element.text_content(), " hello world ");

        let inline = style(&[("display", "inline")]);
        let input = HandlerInput {
            tree: &tree,
            node,
            style: &inline,
            resources: &DataUriResolver,
        };
        let handler = ContainerHandler::create(&input);
        assert_eq!(handler.element().map(|e| e.kind.clone()), Some(LayoutKind::Inline));
    }

    #[test]
    fn break_policies_become_area_breaks() {
        let mut parent = LayoutElement::new(LayoutKind::Block);
        let mut child = LayoutElement::new(LayoutKind::Block);
        child.props.set(
            property::BREAK_BEFORE,
            PropertyValue::Text("always".to_string()),
        );
        child
            .props
            .set(property::BREAK_AFTER, PropertyValue::Text("right".to_string()));
        push_with_breaks(&mut parent, child);
        let kinds: Vec<LayoutKind> = parent.children.iter().map(|c| c.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                LayoutKind::AreaBreak(BreakPolicy::Always),
                LayoutKind::Block,
                LayoutKind::AreaBreak(BreakPolicy::Right),
            ]
        );
    }

    #[test]
    fn missing_image_uses_alt_text() {
        let tree = DomTree::parse_html(r#"<img src="missing.png" alt="Logo">"#);
        let node = tree.find_first("img").expect("img");
        let s = style(&[("display", "inline-block")]);
        let input = HandlerInput {
            tree: &tree,
            node,
            style: &s,
            resources: &DataUriResolver,
        };
        let mut handler = ImageHandler::create(&input);
        let element = handler.take_element().expect("element");
        assert_eq!(element.kind, LayoutKind::Inline);
        assert_eq!(element.text_content(), "Logo");
    }

    #[test]
    fn input_with_value_rejects_placeholder() {
        let tree = DomTree::parse_html(r#"<input value="typed" placeholder="hint">"#);
        let node = tree.find_first("input").expect("input");
        let s = style(&[("display", "inline-block")]);
        let input = HandlerInput {
            tree: &tree,
            node,
            style: &s,
            resources: &DataUriResolver,
        };
        let mut handler = InputHandler::create(&input);
        assert!(!handler.accept_child(LayoutElement::new(LayoutKind::Inline)));
        assert_eq!(handler.take_element().expect("element").text_content(), "typed");
    }

    #[test]
    fn text_transforms() {
        assert_eq!(apply_text_transform("hello world", "capitalize"), "Hello World");
        assert_eq!(apply_text_transform("abc", "uppercase"), "ABC");
        assert_eq!(normalize_text("a\n\t b", false), "a b");
        assert_eq!(normalize_text("a\r\n b", true), "a\n b");
    }
}
