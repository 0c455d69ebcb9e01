use crate::dom::OccurrencePolicy;
use crate::resources::ImageResource;
use crate::running::RunningId;
use crate::types::{Color, Pt};
use std::collections::BTreeMap;

pub type PropertyId = u32;

// Property ids understood by the renderer. The namespace is open: handlers
// may store ids outside this list and the renderer ignores them.
pub mod property {
    use super::PropertyId;

    pub const FONT_FAMILY: PropertyId = 1;
    pub const FONT_SIZE: PropertyId = 2;
    pub const BOLD: PropertyId = 3;
    pub const ITALIC: PropertyId = 4;
    pub const COLOR: PropertyId = 5;
    pub const LINE_HEIGHT: PropertyId = 6;
    pub const TEXT_ALIGN: PropertyId = 7;
    pub const UNDERLINE: PropertyId = 8;
    pub const PRESERVE_WHITESPACE: PropertyId = 9;
    pub const TEXT_INDENT: PropertyId = 10;
    pub const VERTICAL_ALIGN: PropertyId = 11;

    pub const MARGIN_TOP: PropertyId = 20;
    pub const MARGIN_RIGHT: PropertyId = 21;
    pub const MARGIN_BOTTOM: PropertyId = 22;
    pub const MARGIN_LEFT: PropertyId = 23;
    pub const PADDING_TOP: PropertyId = 24;
    pub const PADDING_RIGHT: PropertyId = 25;
    pub const PADDING_BOTTOM: PropertyId = 26;
    pub const PADDING_LEFT: PropertyId = 27;
    pub const BORDER_TOP_WIDTH: PropertyId = 28;
    pub const BORDER_RIGHT_WIDTH: PropertyId = 29;
    pub const BORDER_BOTTOM_WIDTH: PropertyId = 30;
    pub const BORDER_LEFT_WIDTH: PropertyId = 31;
    pub const BORDER_TOP_COLOR: PropertyId = 32;
    pub const BORDER_RIGHT_COLOR: PropertyId = 33;
    pub const BORDER_BOTTOM_COLOR: PropertyId = 34;
    pub const BORDER_LEFT_COLOR: PropertyId = 35;
    pub const BACKGROUND_COLOR: PropertyId = 36;
    pub const WIDTH: PropertyId = 37;
    pub const HEIGHT: PropertyId = 38;
    pub const MIN_HEIGHT: PropertyId = 39;

    pub const BREAK_BEFORE: PropertyId = 50;
    pub const BREAK_AFTER: PropertyId = 51;
    pub const DESTINATION: PropertyId = 52;
    pub const OUTLINE_DESTINATION: PropertyId = 53;
    pub const OUT_OF_FLOW: PropertyId = 54;
    pub const HIDDEN: PropertyId = 55;

    pub const META_TITLE: PropertyId = 70;
    pub const META_AUTHOR: PropertyId = 71;
    pub const META_SUBJECT: PropertyId = 72;
    pub const META_KEYWORDS: PropertyId = 73;
    pub const META_CREATOR: PropertyId = 74;
    pub const META_LANGUAGE: PropertyId = 75;

    pub const BOX_EDGES: [[PropertyId; 4]; 3] = [
        [MARGIN_TOP, MARGIN_RIGHT, MARGIN_BOTTOM, MARGIN_LEFT],
        [BORDER_TOP_WIDTH, BORDER_RIGHT_WIDTH, BORDER_BOTTOM_WIDTH, BORDER_LEFT_WIDTH],
        [PADDING_TOP, PADDING_RIGHT, PADDING_BOTTOM, PADDING_LEFT],
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Length(Pt),
    Percent(f32),
    Auto,
    Color(Color),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    values: BTreeMap<PropertyId, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: PropertyId, value: PropertyValue) {
        self.values.insert(id, value);
    }

    pub fn get(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.values.get(&id)
    }

    pub fn remove(&mut self, id: PropertyId) -> Option<PropertyValue> {
        self.values.remove(&id)
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn length(&self, id: PropertyId) -> Option<Pt> {
        match self.get(id) {
            Some(PropertyValue::Length(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn resolve_length(&self, id: PropertyId, basis: Pt) -> Option<Pt> {
        match self.get(id) {
            Some(PropertyValue::Length(value)) => Some(*value),
            Some(PropertyValue::Percent(pct)) => Some(basis * (*pct / 100.0)),
            _ => None,
        }
    }

    pub fn length_or_zero(&self, id: PropertyId) -> Pt {
        self.length(id).unwrap_or(Pt::ZERO)
    }

    pub fn color(&self, id: PropertyId) -> Option<Color> {
        match self.get(id) {
            Some(PropertyValue::Color(color)) => Some(*color),
            _ => None,
        }
    }

    pub fn text(&self, id: PropertyId) -> Option<&str> {
        match self.get(id) {
            Some(PropertyValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, id: PropertyId) -> bool {
        matches!(self.get(id), Some(PropertyValue::Flag(true)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakPolicy {
    #[default]
    None,
    Always,
    Left,
    Right,
}

impl BreakPolicy {
    pub fn from_css(raw: &str) -> BreakPolicy {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" | "page" | "recto-verso" => BreakPolicy::Always,
            "left" | "verso" => BreakPolicy::Left,
            "right" | "recto" => BreakPolicy::Right,
            _ => BreakPolicy::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BreakPolicy::None => "none",
            BreakPolicy::Always => "always",
            BreakPolicy::Left => "left",
            BreakPolicy::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutKind {
    Document,
    Block,
    Inline,
    Text(String),
    Image(ImageResource),
    LineBreak,
    AreaBreak(BreakPolicy),
    PageNumber { total: bool, style: String },
    TargetPage { target: String, style: String },
    RunningMarker(RunningId),
    StringMarker { name: String, value: String },
    RunningSlot { name: String, policy: OccurrencePolicy },
    NamedString { name: String, policy: OccurrencePolicy },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutElement {
    pub kind: LayoutKind,
    pub props: PropertyMap,
    pub children: Vec<LayoutElement>,
}

impl LayoutElement {
    pub fn new(kind: LayoutKind) -> Self {
        Self {
            kind,
            props: PropertyMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_props(kind: LayoutKind, props: PropertyMap) -> Self {
        Self {
            kind,
            props,
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: LayoutElement) {
        self.children.push(child);
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, LayoutKind::Block | LayoutKind::Document)
    }

    pub fn is_block_level(&self) -> bool {
        matches!(
            self.kind,
            LayoutKind::Block | LayoutKind::Document | LayoutKind::AreaBreak(_)
        )
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let LayoutKind::Text(text) = &self.kind {
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    pub fn find(&self, pred: &dyn Fn(&LayoutElement) -> bool) -> Option<&LayoutElement> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pred))
    }

    pub fn count(&self, pred: &dyn Fn(&LayoutElement) -> bool) -> usize {
        let own = usize::from(pred(self));
        own + self.children.iter().map(|child| child.count(pred)).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_lookup_by_type() {
        let mut props = PropertyMap::new();
        props.set(property::MARGIN_TOP, PropertyValue::Length(Pt::from_i32(5)));
        props.set(property::WIDTH, PropertyValue::Percent(50.0));
        props.set(property::UNDERLINE, PropertyValue::Flag(true));
        assert_eq!(props.length(property::MARGIN_TOP), Some(Pt::from_i32(5)));
        assert_eq!(props.length(property::WIDTH), None);
        assert_eq!(
            props.resolve_length(property::WIDTH, Pt::from_i32(200)),
            Some(Pt::from_i32(100))
        );
        assert!(props.flag(property::UNDERLINE));
        assert!(!props.flag(property::BOLD));
        props.set(999, PropertyValue::Text("custom".to_string()));
        assert_eq!(props.text(999), Some("custom"));
    }

    #[test]
    fn break_policies_from_css() {
        assert_eq!(BreakPolicy::from_css("page"), BreakPolicy::Always);
        assert_eq!(BreakPolicy::from_css("always"), BreakPolicy::Always);
        assert_eq!(BreakPolicy::from_css("left"), BreakPolicy::Left);
        assert_eq!(BreakPolicy::from_css("recto"), BreakPolicy::Right);
        assert_eq!(BreakPolicy::from_css("avoid"), BreakPolicy::None);
    }

    #[test]
    fn tree_queries() {
        let mut block = LayoutElement::new(LayoutKind::Block);
        let mut inline = LayoutElement::new(LayoutKind::Inline);
        inline.push(LayoutElement::new(LayoutKind::Text("b".to_string())));
        block.push(LayoutElement::new(LayoutKind::Text("a".to_string())));
        block.push(inline);
        assert_eq!(block.text_content(), "ab");
        assert_eq!(
            block.count(&|el| matches!(el.kind, LayoutKind::Text(_))),
            2
        );
        assert!(block.find(&|el| el.kind == LayoutKind::Inline).is_some());
    }
}
