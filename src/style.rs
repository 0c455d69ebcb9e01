use crate::content;
use crate::counters::CounterManager;
use crate::css_values::{
    attribute_declarations, default_value, format_pt, is_inherited, parse_border_width,
    parse_color, parse_length, parse_length_value, LengthValue, DEFAULT_VALUES,
    INHERITED_PROPERTIES, LENGTH_PROPERTIES, USER_AGENT_CSS,
};
use crate::dom::{DomTree, ElementData, NodeId, PseudoKind};
use crate::selector::PseudoTarget;
use crate::stylesheet::{parse_inline_declarations, CssSheet, Declaration, MediaDevice, StyleRule};
use crate::types::{Color, Pt};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

const DEFAULT_FONT_SIZE_PT: i32 = 12;
const LINE_HEIGHT_NORMAL: f32 = 1.2;
const FONT_SCALE_STEP: f32 = 1.2;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleMap {
    values: BTreeMap<String, String>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|value| value.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keyword(&self, name: &str) -> String {
        self.get(name)
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn font_size(&self) -> Pt {
        self.get("font-size")
            .and_then(|raw| parse_length(raw, Pt::ZERO, Pt::ZERO))
            .unwrap_or(Pt::from_i32(DEFAULT_FONT_SIZE_PT))
    }

    pub fn length(&self, name: &str) -> Option<Pt> {
        let font_size = self.font_size();
        self.get(name)
            .and_then(|raw| parse_length(raw, font_size, font_size))
    }

    pub fn length_value(&self, name: &str) -> Option<LengthValue> {
        let font_size = self.font_size();
        self.get(name)
            .and_then(|raw| parse_length_value(raw, font_size, font_size))
    }

    pub fn resolve_length(&self, name: &str, basis: Pt) -> Pt {
        self.length_value(name)
            .and_then(|value| value.resolve(basis))
            .unwrap_or(Pt::ZERO)
    }

    pub fn color(&self, name: &str) -> Option<Color> {
        self.get(name).and_then(parse_color)
    }

    pub fn display(&self) -> &str {
        self.get("display").unwrap_or("inline")
    }

    pub fn is_display_none(&self) -> bool {
        self.display().eq_ignore_ascii_case("none")
    }

    pub fn is_block_level(&self) -> bool {
        matches!(
            self.display(),
            "block" | "list-item" | "table" | "flex" | "grid" | "table-row" | "table-cell"
        )
    }

    pub fn is_out_of_flow(&self) -> bool {
        matches!(self.keyword("position").as_str(), "absolute" | "fixed")
    }

    pub fn running_name(&self) -> Option<String> {
        let position = self.keyword("position");
        let inner = position.strip_prefix("running(")?.strip_suffix(')')?;
        let name = inner.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub fn line_height(&self) -> Pt {
        let font_size = self.font_size();
        let raw = self.keyword("line-height");
        if raw.is_empty() || raw == "normal" {
            return font_size * LINE_HEIGHT_NORMAL;
        }
        if let Ok(factor) = raw.parse::<f32>() {
            return font_size * factor;
        }
        parse_length(&raw, font_size, font_size).unwrap_or(font_size * LINE_HEIGHT_NORMAL)
    }

    pub fn is_bold(&self) -> bool {
        let weight = self.keyword("font-weight");
        match weight.as_str() {
            "bold" | "bolder" => true,
            other => other.parse::<u32>().map(|w| w >= 600).unwrap_or(false),
        }
    }

    pub fn is_italic(&self) -> bool {
        matches!(self.keyword("font-style").as_str(), "italic" | "oblique")
    }
}

#[derive(Debug)]
pub struct CssContext {
    pub counters: CounterManager,
    pub base_font_size: Pt,
    pub root_font_size: Pt,
    root_font_size_set: bool,
    pub uses_page_total: bool,
    pub uses_target_pages: bool,
    pub forward_targets: bool,
}

impl CssContext {
    pub fn new(base_font_size: Pt) -> Self {
        Self {
            counters: CounterManager::new(),
            base_font_size,
            root_font_size: base_font_size,
            root_font_size_set: false,
            uses_page_total: false,
            uses_target_pages: false,
            forward_targets: false,
        }
    }

    pub fn reset(&mut self) {
        self.counters.reset_all();
        self.root_font_size = self.base_font_size;
        self.root_font_size_set = false;
        self.uses_page_total = false;
        self.uses_target_pages = false;
        self.forward_targets = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    UserAgent,
    Author,
}

#[derive(Debug)]
struct RuleEntry {
    origin: Origin,
    rule: StyleRule,
}

#[derive(Debug, Default)]
struct RuleIndex {
    by_tag: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, Vec<usize>>,
    by_class: HashMap<String, Vec<usize>>,
    universal: Vec<usize>,
}

impl RuleIndex {
    fn new(rules: &[RuleEntry]) -> Self {
        let mut index = Self::default();
        for (i, entry) in rules.iter().enumerate() {
            let (tag, id, classes) = entry.rule.selector.subject_keys();
            let mut indexed = false;
            if let Some(id) = id {
                index.by_id.entry(id.to_string()).or_default().push(i);
                indexed = true;
            }
            for class in classes {
                index.by_class.entry(class.to_string()).or_default().push(i);
                indexed = true;
            }
            if let Some(tag) = tag {
                index.by_tag.entry(tag.to_string()).or_default().push(i);
                indexed = true;
            }
            if !indexed {
                index.universal.push(i);
            }
        }
        index
    }

    fn candidate_indices(&self, tree: &DomTree, node: NodeId) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        if let Some(id) = tree.attr(node, "id") {
            if let Some(v) = self.by_id.get(id) {
                out.extend(v);
            }
        }
        if let Some(classes) = tree.attr(node, "class") {
            for class in classes.split_whitespace() {
                if let Some(v) = self.by_class.get(class) {
                    out.extend(v);
                }
            }
        }
        if let Some(v) = tree.tag(node).and_then(|tag| self.by_tag.get(tag)) {
            out.extend(v);
        }
        out.extend(&self.universal);
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[derive(Debug)]
pub struct StyleResolver {
    rules: Vec<RuleEntry>,
    index: RuleIndex,
    sheet: CssSheet,
}

impl StyleResolver {
    pub fn new(author_css: &str, device: &MediaDevice) -> Self {
        let ua = CssSheet::parse(USER_AGENT_CSS, device);
        let sheet = CssSheet::parse(author_css, device);
        let mut rules: Vec<RuleEntry> = ua
            .rules
            .into_iter()
            .map(|rule| RuleEntry {
                origin: Origin::UserAgent,
                rule,
            })
            .collect();
        rules.extend(sheet.rules.iter().cloned().map(|rule| RuleEntry {
            origin: Origin::Author,
            rule,
        }));
        let index = RuleIndex::new(&rules);
        log::debug!(
            "style resolver ready: {} rules, {} page rules",
            rules.len(),
            sheet.page_rules.len()
        );
        Self {
            rules,
            index,
            sheet,
        }
    }

    pub fn sheet(&self) -> &CssSheet {
        &self.sheet
    }

    // Resolves `node` against its parent's stored style, stores the result
    // on the node and applies counter and generated-content side effects.
    // The parent must already be resolved.
    pub fn resolve(&self, tree: &mut DomTree, node: NodeId, ctx: &mut CssContext) -> Rc<StyleMap> {
        let parent_style = tree.parent(node).and_then(|parent| tree.style(parent));
        let Some(element) = tree.element(node).cloned() else {
            return parent_style.unwrap_or_default();
        };
        let declared = self.collect_declarations(tree, node, &element);
        let is_root = element.pseudo.is_none() && tree.is_root_element(node);
        let map = self.compute(&declared, parent_style.as_deref(), ctx, is_root);
        let style = Rc::new(map);
        tree.set_style(node, style.clone());
        log::trace!(
            "resolved <{}> with {} declarations",
            element.tag,
            declared.len()
        );
        self.apply_side_effects(tree, node, &element, &style, ctx);
        style
    }

    pub fn compute_declared(
        &self,
        declarations: &[Declaration],
        parent: Option<&StyleMap>,
        ctx: &mut CssContext,
    ) -> StyleMap {
        let mut ordered: Vec<Declaration> =
            declarations.iter().filter(|d| !d.important).cloned().collect();
        ordered.extend(declarations.iter().filter(|d| d.important).cloned());
        self.compute(&ordered, parent, ctx, false)
    }

    fn collect_declarations(
        &self,
        tree: &DomTree,
        node: NodeId,
        element: &ElementData,
    ) -> Vec<Declaration> {
        if let Some(PseudoKind::MarginBox(slot)) = element.pseudo {
            let mut out = vec![
                Declaration::new("text-align", slot.default_text_align()),
                Declaration::new("vertical-align", slot.default_vertical_align()),
            ];
            out.extend(element.declarations.iter().filter(|d| !d.important).cloned());
            out.extend(element.declarations.iter().filter(|d| d.important).cloned());
            return out;
        }

        let (target, subject) = match element.pseudo {
            None => (PseudoTarget::None, node),
            Some(kind) => {
                let target = match kind {
                    PseudoKind::Before => PseudoTarget::Before,
                    PseudoKind::After => PseudoTarget::After,
                    _ => PseudoTarget::Placeholder,
                };
                let Some(origin) = tree.parent(node) else {
                    return Vec::new();
                };
                (target, origin)
            }
        };

        let mut matched: Vec<&RuleEntry> = self
            .index
            .candidate_indices(tree, subject)
            .into_iter()
            .map(|i| &self.rules[i])
            .filter(|entry| entry.rule.selector.pseudo_target() == target)
            .filter(|entry| entry.rule.selector.matches(tree, subject))
            .collect();
        matched.sort_by(|a, b| {
            (a.origin, a.rule.specificity, a.rule.order).cmp(&(
                b.origin,
                b.rule.specificity,
                b.rule.order,
            ))
        });

        let mut inline: Vec<Declaration> = element.declarations.clone();
        if element.pseudo.is_none() {
            if let Some(style) = element.attr("style") {
                inline.extend(parse_inline_declarations(style));
            }
        }
        let presentational = if element.pseudo.is_none() && !element.synthetic {
            attribute_declarations(&element.tag, &element.attrs, |name| {
                ancestor_attr(tree, node, name)
            })
        } else {
            Vec::new()
        };

        let rule_decls = |origin: Origin, important: bool| {
            matched
                .iter()
                .filter(move |entry| entry.origin == origin)
                .flat_map(|entry| entry.rule.declarations.iter())
                .filter(move |d| d.important == important)
                .cloned()
                .collect::<Vec<_>>()
        };

        let mut out = Vec::new();
        out.extend(rule_decls(Origin::UserAgent, false));
        out.extend(presentational);
        out.extend(rule_decls(Origin::Author, false));
        out.extend(inline.iter().filter(|d| !d.important).cloned());
        out.extend(rule_decls(Origin::Author, true));
        out.extend(inline.iter().filter(|d| d.important).cloned());
        out.extend(rule_decls(Origin::UserAgent, true));
        out
    }

    fn compute(
        &self,
        declared: &[Declaration],
        parent: Option<&StyleMap>,
        ctx: &mut CssContext,
        is_root: bool,
    ) -> StyleMap {
        let mut specified: BTreeMap<&str, &str> = BTreeMap::new();
        for decl in declared {
            specified.insert(decl.name.as_str(), decl.value.trim());
        }

        let parent_font = parent
            .map(|p| p.font_size())
            .unwrap_or(ctx.base_font_size);
        let font_size = resolve_font_size(
            specified.get("font-size").copied(),
            parent_font,
            ctx.root_font_size,
            ctx.base_font_size,
        );
        if is_root && !ctx.root_font_size_set {
            ctx.root_font_size = font_size;
            ctx.root_font_size_set = true;
            log::debug!("root font size {}", format_pt(font_size));
        }

        let mut map = StyleMap::new();
        map.set("font-size", format_pt(font_size));
        for (name, value) in &specified {
            if *name == "font-size" {
                continue;
            }
            let from_parent = || parent.and_then(|p| p.get(name)).map(str::to_string);
            let initial = || default_value(name).map(str::to_string);
            let resolved = match value.to_ascii_lowercase().as_str() {
                "inherit" => from_parent().or_else(initial),
                "initial" => initial(),
                "unset" if is_inherited(name) => from_parent().or_else(initial),
                "unset" => initial(),
                _ => Some((*value).to_string()),
            };
            if let Some(resolved) = resolved {
                map.set(*name, resolved);
            }
        }
        if let Some(parent) = parent {
            for name in INHERITED_PROPERTIES {
                if !map.contains(name) {
                    if let Some(value) = parent.get(name) {
                        map.set(*name, value);
                    }
                }
            }
        }
        for (name, value) in DEFAULT_VALUES {
            if !map.contains(name) {
                map.set(*name, *value);
            }
        }

        absolutize(&mut map, font_size, ctx.root_font_size);
        map
    }

    fn apply_side_effects(
        &self,
        tree: &mut DomTree,
        node: NodeId,
        element: &ElementData,
        style: &StyleMap,
        ctx: &mut CssContext,
    ) {
        let content = style.keyword("content");
        let generates = match element.pseudo {
            Some(PseudoKind::Before) | Some(PseudoKind::After) => {
                !matches!(content.as_str(), "normal" | "none" | "")
            }
            _ => true,
        };
        if !generates || style.is_display_none() {
            return;
        }

        ctx.counters.apply(
            style.get("counter-reset").unwrap_or("none"),
            style.get("counter-set").unwrap_or("none"),
            style.get("counter-increment").unwrap_or("none"),
            style.display() == "list-item",
        );
        if element.pseudo.is_none() {
            if let Some(id) = element.attr("id") {
                ctx.counters.record_target(id);
            }
        }

        match element.pseudo {
            None => {}
            Some(PseudoKind::Placeholder) if matches!(content.as_str(), "normal" | "") => {
                tree.clear_children(node);
                let text = tree
                    .parent(node)
                    .and_then(|origin| tree.attr(origin, "placeholder"))
                    .map(str::to_string);
                if let Some(text) = text {
                    tree.append_text(node, &text);
                }
            }
            Some(_) => content::expand_content(tree, node, style, ctx),
        }
    }
}

fn ancestor_attr(tree: &DomTree, node: NodeId, name: &str) -> Option<String> {
    let mut current = tree.parent_element(node);
    while let Some(id) = current {
        if let Some(value) = tree.attr(id, name) {
            return Some(value.to_string());
        }
        if tree.tag(id) == Some("table") {
            return None;
        }
        current = tree.parent_element(id);
    }
    None
}

fn resolve_font_size(raw: Option<&str>, parent: Pt, root: Pt, base: Pt) -> Pt {
    let Some(raw) = raw else {
        return parent;
    };
    let lower = raw.trim().to_ascii_lowercase();
    let keyword_scale = match lower.as_str() {
        "xx-small" => Some(0.6),
        "x-small" => Some(0.75),
        "small" => Some(8.0 / 9.0),
        "medium" => Some(1.0),
        "large" => Some(1.2),
        "x-large" => Some(1.5),
        "xx-large" => Some(2.0),
        "xxx-large" => Some(3.0),
        _ => None,
    };
    if let Some(scale) = keyword_scale {
        return base * scale;
    }
    let resolved = match lower.as_str() {
        "inherit" | "unset" => Some(parent),
        "initial" => Some(base),
        "larger" => Some(parent * FONT_SCALE_STEP),
        "smaller" => Some(parent / FONT_SCALE_STEP),
        other => match other.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f32>().ok().map(|pct| parent * (pct / 100.0)),
            None => parse_length(other, parent, root),
        },
    };
    match resolved {
        Some(size) if size >= Pt::ZERO => size,
        _ => {
            log::debug!("ignoring font-size '{raw}'");
            parent
        }
    }
}

fn absolutize(map: &mut StyleMap, font_size: Pt, root_font_size: Pt) {
    for name in LENGTH_PROPERTIES {
        let Some(raw) = map.get(name) else {
            continue;
        };
        if name.ends_with("-width") && name.starts_with("border-") {
            continue;
        }
        if let Some(pt) = parse_length(raw, font_size, root_font_size) {
            map.set(*name, format_pt(pt));
        }
    }

    for side in ["top", "right", "bottom", "left"] {
        let style_key = format!("border-{side}-style");
        let width_key = format!("border-{side}-width");
        let color_key = format!("border-{side}-color");
        let style = map.keyword(&style_key);
        let width = if matches!(style.as_str(), "none" | "hidden" | "") {
            Pt::ZERO
        } else {
            map.get(&width_key)
                .and_then(|raw| {
                    parse_border_width(raw).or_else(|| parse_length(raw, font_size, root_font_size))
                })
                .unwrap_or(Pt::ZERO)
        };
        map.set(width_key, format_pt(width));
        if map.keyword(&color_key) == "currentcolor" {
            let color = map.get("color").unwrap_or("black").to_string();
            map.set(color_key, color);
        }
    }

    let line_height = map.keyword("line-height");
    if let Some(pct) = line_height.strip_suffix('%') {
        if let Ok(pct) = pct.trim().parse::<f32>() {
            map.set("line-height", format_pt(font_size * (pct / 100.0)));
        }
    } else if line_height.parse::<f32>().is_err() && line_height != "normal" {
        if let Some(pt) = parse_length(&line_height, font_size, root_font_size) {
            map.set("line-height", format_pt(pt));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_chain(
        resolver: &StyleResolver,
        tree: &mut DomTree,
        ctx: &mut CssContext,
        node: NodeId,
    ) -> Rc<StyleMap> {
        let mut chain = vec![node];
        let mut current = tree.parent(node);
        while let Some(id) = current {
            if tree.is_element(id) {
                chain.push(id);
            }
            current = tree.parent(id);
        }
        let mut last = Rc::new(StyleMap::new());
        for id in chain.into_iter().rev() {
            last = resolver.resolve(tree, id, ctx);
        }
        last
    }

    fn setup(html: &str, css: &str) -> (StyleResolver, DomTree, CssContext) {
        (
            StyleResolver::new(css, &MediaDevice::default()),
            DomTree::parse_html(html),
            CssContext::new(Pt::from_i32(12)),
        )
    }

    #[test]
    fn author_rules_override_user_agent() {
        let (resolver, mut tree, mut ctx) = setup("<h1>Title</h1>", "h1 { font-size: 30pt }");
        let h1 = tree.find_first("h1").expect("h1");
        let style = resolve_chain(&resolver, &mut tree, &mut ctx, h1);
        assert_eq!(style.get("font-size"), Some("30pt"));
        assert_eq!(style.get("display"), Some("block"));
        assert_eq!(style.get("font-weight"), Some("bold"));
    }

    #[test]
    fn cascade_priorities() {
        let (resolver, mut tree, mut ctx) = setup(
            r#"<p id="x" class="c" style="color: green; margin-top: 1pt !important">t</p>"#,
            "#x { color: red; margin-top: 5pt !important } p.c { text-align: right } p { text-align: center }",
        );
        let p = tree.find_first("p").expect("p");
        let style = resolve_chain(&resolver, &mut tree, &mut ctx, p);
        assert_eq!(style.get("color"), Some("green"));
        assert_eq!(style.get("margin-top"), Some("1pt"));
        assert_eq!(style.get("text-align"), Some("right"));
    }

    #[test]
    fn inheritance_and_relative_units() {
        let (resolver, mut tree, mut ctx) = setup(
            r#"<div><span>t</span></div>"#,
            "html { font-size: 10pt } div { color: #ff0000; font-size: 2em; margin-left: 1rem; padding-top: 1em }",
        );
        let span = tree.find_first("span").expect("span");
        let style = resolve_chain(&resolver, &mut tree, &mut ctx, span);
        assert_eq!(style.get("font-size"), Some("20pt"));
        assert_eq!(style.color("color"), Some(Color::from_rgb8(255, 0, 0)));
        assert_eq!(style.get("margin-left"), Some("0pt"));
        let div = tree.find_first("div").expect("div");
        let div_style = tree.style(div).expect("div resolved");
        assert_eq!(div_style.get("margin-left"), Some("10pt"));
        assert_eq!(div_style.get("padding-top"), Some("20pt"));
    }

    #[test]
    fn explicit_inherit_and_initial() {
        let (resolver, mut tree, mut ctx) = setup(
            "<div><p>t</p></div>",
            "div { margin-left: 7pt; color: blue } p { margin-left: inherit; color: initial }",
        );
        let p = tree.find_first("p").expect("p");
        let style = resolve_chain(&resolver, &mut tree, &mut ctx, p);
        assert_eq!(style.get("margin-left"), Some("7pt"));
        assert_eq!(style.get("color"), Some("black"));
    }

    #[test]
    fn borders_without_style_have_no_width() {
        let (resolver, mut tree, mut ctx) = setup(
            "<div>a</div><p>b</p>",
            "div { border-top-width: 3pt } p { border: 2pt solid red }",
        );
        let div = tree.find_first("div").expect("div");
        let style = resolve_chain(&resolver, &mut tree, &mut ctx, div);
        assert_eq!(style.get("border-top-width"), Some("0pt"));
        let p = tree.find_first("p").expect("p");
        let style = resolve_chain(&resolver, &mut tree, &mut ctx, p);
        assert_eq!(style.get("border-left-width"), Some("2pt"));
        assert!(style.color("border-left-color").is_some());
    }

    #[test]
    fn presentational_attributes_lose_to_author_rules() {
        let (resolver, mut tree, mut ctx) = setup(
            r#"<p align="center">a</p><div align="center">b</div>"#,
            "div { text-align: right }",
        );
        let p = tree.find_first("p").expect("p");
        assert_eq!(
            resolve_chain(&resolver, &mut tree, &mut ctx, p).get("text-align"),
            Some("center")
        );
        let div = tree.find_first("div").expect("div");
        assert_eq!(
            resolve_chain(&resolver, &mut tree, &mut ctx, div).get("text-align"),
            Some("right")
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let (resolver, mut tree, mut ctx) =
            setup("<p class='a'>x</p>", "p.a { color: red; font-size: 1.5em }");
        let p = tree.find_first("p").expect("p");
        let first = resolve_chain(&resolver, &mut tree, &mut ctx, p);
        let second = resolver.resolve(&mut tree, p, &mut ctx);
        assert_eq!(*first, *second);
    }

    #[test]
    fn before_pseudo_generates_text() {
        let (resolver, mut tree, mut ctx) =
            setup("<p>x</p>", r#"p::before { content: "Note: "; color: red }"#);
        let p = tree.find_first("p").expect("p");
        resolve_chain(&resolver, &mut tree, &mut ctx, p);
        let before = tree.create_pseudo(p, PseudoKind::Before, Vec::new());
        let style = resolver.resolve(&mut tree, before, &mut ctx);
        assert_eq!(style.color("color"), Some(Color::from_rgb8(255, 0, 0)));
        assert_eq!(tree.text_content(before), "Note: ");
    }

    #[test]
    fn list_items_number_through_user_agent_rules() {
        let (resolver, mut tree, mut ctx) = setup("<ol><li>a</li><li>b</li></ol>", "");
        let items = tree.find_all("li");
        let ol = tree.find_first("ol").expect("ol");
        resolve_chain(&resolver, &mut tree, &mut ctx, ol);
        ctx.counters.push_scope();
        let mut markers = Vec::new();
        for li in items {
            ctx.counters.push_scope();
            resolver.resolve(&mut tree, li, &mut ctx);
            let before = tree.create_pseudo(li, PseudoKind::Before, Vec::new());
            resolver.resolve(&mut tree, before, &mut ctx);
            markers.push(tree.text_content(before));
            ctx.counters.pop_scope();
        }
        assert_eq!(markers, vec!["1. ".to_string(), "2. ".to_string()]);
    }

    #[test]
    fn margin_box_defaults_follow_slot() {
        let (resolver, mut tree, mut ctx) = setup("<p>x</p>", "");
        let html = tree.document_element().expect("html");
        resolver.resolve(&mut tree, html, &mut ctx);
        let node = tree.create_pseudo(
            html,
            PseudoKind::MarginBox(crate::margin_box::MarginBoxSlot::BottomRight),
            vec![Declaration::new("content", "\"end\"")],
        );
        let style = resolver.resolve(&mut tree, node, &mut ctx);
        assert_eq!(style.get("text-align"), Some("right"));
        assert_eq!(tree.text_content(node), "end");
    }

    #[test]
    fn font_size_keywords() {
        let base = Pt::from_i32(12);
        assert_eq!(resolve_font_size(Some("medium"), base * 2, base, base), base);
        assert_eq!(
            resolve_font_size(Some("150%"), Pt::from_i32(10), base, base),
            Pt::from_i32(15)
        );
        assert_eq!(resolve_font_size(Some("bogus"), base, base, base), base);
        assert_eq!(resolve_font_size(None, Pt::from_i32(9), base, base), Pt::from_i32(9));
    }
}
