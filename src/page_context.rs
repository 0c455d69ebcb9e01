use crate::css_values::{parse_length, split_top_level};
use crate::margin_box::{MarginBoxInput, MarginBoxSlot};
use crate::style::{CssContext, StyleMap, StyleResolver};
use crate::stylesheet::{Declaration, PagePseudo, PageRule, PageSelector};
use crate::types::{Color, Margins, Pt, Rect, Size};
use std::collections::{BTreeMap, HashMap};

const AUTO_BLEED_PT: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageClass {
    pub first: bool,
    pub side: PageSide,
    pub blank: bool,
}

impl PageClass {
    pub fn for_page(index: usize, even_pages_are_left: bool, blank: bool) -> Self {
        let even = (index + 1) % 2 == 0;
        let side = if even == even_pages_are_left {
            PageSide::Left
        } else {
            PageSide::Right
        };
        Self {
            first: index == 0,
            side,
            blank,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMarks {
    pub crop: bool,
    pub cross: bool,
}

impl PageMarks {
    pub fn any(self) -> bool {
        self.crop || self.cross
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub class: PageClass,
    pub size: Size,
    pub margins: Margins,
    pub borders: Margins,
    pub border_colors: [Color; 4],
    pub padding: Margins,
    pub background: Option<Color>,
    pub bleed: Pt,
    pub marks: PageMarks,
    pub style: StyleMap,
    pub margin_boxes: BTreeMap<MarginBoxSlot, Vec<Declaration>>,
}

impl PageContext {
    pub fn border_box(&self) -> Rect {
        Rect::new(Pt::ZERO, Pt::ZERO, self.size.width, self.size.height).inset(self.margins)
    }

    pub fn content_box(&self) -> Rect {
        self.border_box().inset(self.borders).inset(self.padding)
    }

    pub fn margin_box_input(&self, slot: MarginBoxSlot, min_content: Pt, max_content: Pt) -> MarginBoxInput {
        let mut input = MarginBoxInput::with_content(min_content, max_content);
        let Some(decls) = self.margin_boxes.get(&slot) else {
            return MarginBoxInput::default();
        };
        let horizontal = slot.edge().is_none_or(|edge| edge.is_horizontal());
        let (axis, basis) = if horizontal {
            ("width", self.size.width)
        } else {
            ("height", self.size.height)
        };
        let font_size = self.style.font_size();
        let extent = |name: &str| {
            declared(decls, name).and_then(|raw| resolve_extent(raw, basis, font_size))
        };
        input.extent = extent(axis);
        input.min_extent = extent(&format!("min-{axis}"));
        input.max_extent = extent(&format!("max-{axis}"));
        input
    }
}

#[derive(Debug, Clone)]
pub struct PageContextSnapshot {
    default_size: Size,
    default_margins: Margins,
    resolved: HashMap<PageClass, PageContext>,
}

// Resolves and caches `PageContext`s per page class. Contexts are
// recomputed when the default size or margins change.
#[derive(Debug, Clone)]
pub struct PageContextProcessor {
    rules: Vec<PageRule>,
    default_size: Size,
    default_margins: Margins,
    resolved: HashMap<PageClass, PageContext>,
}

impl PageContextProcessor {
    pub fn new(rules: Vec<PageRule>, default_size: Size, default_margins: Margins) -> Self {
        Self {
            rules,
            default_size,
            default_margins,
            resolved: HashMap::new(),
        }
    }

    pub fn set_defaults(&mut self, size: Size, margins: Margins) {
        if size != self.default_size || margins != self.default_margins {
            log::debug!("page defaults changed; page contexts recomputed");
            self.default_size = size;
            self.default_margins = margins;
            self.resolved.clear();
        }
    }

    pub fn context(
        &mut self,
        class: PageClass,
        resolver: &StyleResolver,
        css: &mut CssContext,
        parent: Option<&StyleMap>,
    ) -> &PageContext {
        let rules = &self.rules;
        let (size, margins) = (self.default_size, self.default_margins);
        self.resolved.entry(class).or_insert_with(|| {
            let context = resolve_context(rules, class, size, margins, resolver, css, parent);
            log::debug!(
                "page context {:?}: {}x{}pt, {} margin boxes",
                class,
                context.size.width.to_f32(),
                context.size.height.to_f32(),
                context.margin_boxes.len()
            );
            context
        })
    }

    pub fn snapshot(&self) -> PageContextSnapshot {
        PageContextSnapshot {
            default_size: self.default_size,
            default_margins: self.default_margins,
            resolved: self.resolved.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: PageContextSnapshot) {
        self.default_size = snapshot.default_size;
        self.default_margins = snapshot.default_margins;
        self.resolved = snapshot.resolved;
    }

    pub fn load_rules(&mut self, rules: Vec<PageRule>) {
        self.rules = rules;
        self.resolved.clear();
    }
}

type PageSpecificity = (usize, usize, usize);

fn selector_specificity(selector: &PageSelector, class: PageClass) -> Option<PageSpecificity> {
    if selector.name.is_some() {
        return None;
    }
    let mut first_or_blank = 0;
    let mut side = 0;
    for pseudo in &selector.pseudo_classes {
        let matches = match pseudo {
            PagePseudo::First => class.first,
            PagePseudo::Blank => class.blank,
            PagePseudo::Left => class.side == PageSide::Left,
            PagePseudo::Right => class.side == PageSide::Right,
        };
        if !matches {
            return None;
        }
        match pseudo {
            PagePseudo::First | PagePseudo::Blank => first_or_blank += 1,
            PagePseudo::Left | PagePseudo::Right => side += 1,
        }
    }
    Some((0, first_or_blank, side))
}

fn rule_specificity(rule: &PageRule, class: PageClass) -> Option<PageSpecificity> {
    if rule.selectors.is_empty() {
        return Some((0, 0, 0));
    }
    rule.selectors
        .iter()
        .filter_map(|selector| selector_specificity(selector, class))
        .max()
}

fn declared<'d>(decls: &'d [Declaration], name: &str) -> Option<&'d str> {
    let pick = |important: bool| {
        decls
            .iter()
            .rev()
            .find(|d| d.important == important && d.name == name)
            .map(|d| d.value.as_str())
    };
    pick(true).or_else(|| pick(false))
}

fn resolve_extent(raw: &str, basis: Pt, font_size: Pt) -> Option<Pt> {
    let raw = raw.trim();
    if let Some(pct) = raw.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|pct| basis * (pct / 100.0));
    }
    parse_length(raw, font_size, font_size)
}

fn resolve_context(
    rules: &[PageRule],
    class: PageClass,
    default_size: Size,
    default_margins: Margins,
    resolver: &StyleResolver,
    css: &mut CssContext,
    parent: Option<&StyleMap>,
) -> PageContext {
    let mut matched: Vec<(PageSpecificity, &PageRule)> = rules
        .iter()
        .filter_map(|rule| rule_specificity(rule, class).map(|spec| (spec, rule)))
        .collect();
    matched.sort_by_key(|(spec, rule)| (*spec, rule.order));

    let mut declarations = Vec::new();
    let mut boxes: BTreeMap<MarginBoxSlot, Vec<Declaration>> = BTreeMap::new();
    for (_, rule) in &matched {
        declarations.extend(rule.declarations.iter().cloned());
        for (slot, decls) in &rule.margin_rules {
            boxes.entry(*slot).or_default().extend(decls.iter().cloned());
        }
    }
    let style = resolver.compute_declared(&declarations, parent, css);
    let font_size = style.font_size();
    let size = parse_page_size(declared(&declarations, "size"), default_size, font_size);

    let side_basis = [size.height, size.width, size.height, size.width];
    let default_sides = [
        default_margins.top,
        default_margins.right,
        default_margins.bottom,
        default_margins.left,
    ];
    let mut margins = [Pt::ZERO; 4];
    let mut borders = [Pt::ZERO; 4];
    let mut padding = [Pt::ZERO; 4];
    let mut border_colors = [Color::BLACK; 4];
    for (i, side) in ["top", "right", "bottom", "left"].iter().enumerate() {
        let margin_name = format!("margin-{side}");
        margins[i] = match declared(&declarations, &margin_name) {
            Some(_) => style
                .length_value(&margin_name)
                .and_then(|value| value.resolve(side_basis[i]))
                .unwrap_or(default_sides[i]),
            None => default_sides[i],
        };
        borders[i] = style
            .length(&format!("border-{side}-width"))
            .unwrap_or(Pt::ZERO);
        padding[i] = style
            .length_value(&format!("padding-{side}"))
            .and_then(|value| value.resolve(side_basis[i]))
            .unwrap_or(Pt::ZERO);
        border_colors[i] = style
            .color(&format!("border-{side}-color"))
            .unwrap_or(Color::BLACK);
    }

    let marks = parse_marks(declared(&declarations, "marks"));
    let bleed = match declared(&declarations, "bleed").map(str::trim) {
        None | Some("auto") => {
            if marks.crop {
                Pt::from_i32(AUTO_BLEED_PT)
            } else {
                Pt::ZERO
            }
        }
        Some(raw) => parse_length(raw, font_size, font_size)
            .unwrap_or(Pt::ZERO)
            .max(Pt::ZERO),
    };

    boxes.retain(|slot, decls| {
        let has_content = declared(decls, "content")
            .map(|value| !matches!(value.trim(), "none" | "normal" | ""))
            .unwrap_or(false);
        if !has_content {
            log::trace!("margin box {} has no content", slot.name());
        }
        has_content
    });

    let sides = |values: [Pt; 4]| Margins {
        top: values[0],
        right: values[1],
        bottom: values[2],
        left: values[3],
    };
    PageContext {
        class,
        size,
        margins: sides(margins),
        borders: sides(borders),
        border_colors,
        padding: sides(padding),
        background: style.color("background-color"),
        bleed,
        marks,
        style,
        margin_boxes: boxes,
    }
}

fn parse_marks(raw: Option<&str>) -> PageMarks {
    let mut marks = PageMarks::default();
    for token in raw.unwrap_or("none").split_whitespace() {
        match token.to_ascii_lowercase().as_str() {
            "crop" => marks.crop = true,
            "cross" => marks.cross = true,
            _ => {}
        }
    }
    marks
}

fn named_page_size(name: &str) -> Option<Size> {
    let size = match name {
        "a3" => Size::from_mm(297.0, 420.0),
        "a4" => Size::a4(),
        "a5" => Size::from_mm(148.0, 210.0),
        "b4" => Size::from_mm(250.0, 353.0),
        "b5" => Size::from_mm(176.0, 250.0),
        "jis-b4" => Size::from_mm(257.0, 364.0),
        "jis-b5" => Size::from_mm(182.0, 257.0),
        "letter" => Size::letter(),
        "legal" => Size::from_inches(8.5, 14.0),
        "ledger" => Size::from_inches(11.0, 17.0),
        _ => return None,
    };
    Some(size)
}

fn orient_page_size(size: Size, orientation: Option<&str>) -> Size {
    match orientation {
        Some("landscape") if !size.is_landscape() => size.rotated(),
        Some("portrait") if size.is_landscape() => size.rotated(),
        _ => size,
    }
}

pub fn parse_page_size(raw: Option<&str>, default: Size, font_size: Pt) -> Size {
    let Some(raw) = raw else {
        return default;
    };
    let mut named = None;
    let mut orientation = None;
    let mut lengths = Vec::new();
    for token in split_top_level(&raw.to_ascii_lowercase()) {
        match token.as_str() {
            "auto" => {}
            "portrait" | "landscape" => orientation = Some(token.clone()),
            other => {
                if let Some(size) = named_page_size(other) {
                    named = Some(size);
                } else if let Some(length) = parse_length(other, font_size, font_size) {
                    lengths.push(length);
                } else {
                    log::warn!("unsupported page size '{raw}'; using default");
                    return default;
                }
            }
        }
    }
    let base = match lengths.as_slice() {
        [] => named.unwrap_or(default),
        [side] => Size::new(*side, *side),
        [width, height, ..] => Size::new(*width, *height),
    };
    if base.width <= Pt::ZERO || base.height <= Pt::ZERO {
        log::warn!("degenerate page size '{raw}'; using default");
        return default;
    }
    orient_page_size(base, orientation.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::MediaDevice;

    fn processor(css: &str) -> (PageContextProcessor, StyleResolver) {
        let resolver = StyleResolver::new(css, &MediaDevice::default());
        let processor = PageContextProcessor::new(
            resolver.sheet().page_rules.clone(),
            Size::a4(),
            Margins::all(36.0),
        );
        (processor, resolver)
    }

    fn context(css: &str, class: PageClass) -> PageContext {
        let (mut processor, resolver) = processor(css);
        let mut ctx = CssContext::new(Pt::from_i32(12));
        processor.context(class, &resolver, &mut ctx, None).clone()
    }

    fn first_right() -> PageClass {
        PageClass::for_page(0, true, false)
    }

    #[test]
    fn page_classes_follow_parity() {
        assert_eq!(PageClass::for_page(0, true, false).side, PageSide::Right);
        assert_eq!(PageClass::for_page(1, true, false).side, PageSide::Left);
        assert_eq!(PageClass::for_page(1, false, false).side, PageSide::Right);
        assert!(PageClass::for_page(0, true, false).first);
        assert!(!PageClass::for_page(2, true, true).first);
    }

    #[test]
    fn defaults_apply_without_rules() {
        let ctx = context("", first_right());
        assert_eq!(ctx.size, Size::a4());
        assert_eq!(ctx.margins, Margins::all(36.0));
        assert!(ctx.margin_boxes.is_empty());
        assert_eq!(ctx.bleed, Pt::ZERO);
    }

    #[test]
    fn named_size_and_orientation() {
        let ctx = context("@page { size: letter landscape }", first_right());
        assert_eq!(ctx.size, Size::letter().rotated());
        let ctx = context("@page { size: 100pt 200pt }", first_right());
        assert_eq!(ctx.size, Size::new(Pt::from_i32(100), Pt::from_i32(200)));
        let ctx = context("@page { size: auto }", first_right());
        assert_eq!(ctx.size, Size::a4());
    }

    #[test]
    fn specific_rules_win() {
        let css = "@page { margin: 10pt } @page :first { margin-top: 50pt } @page :left { margin-left: 70pt }";
        let first = context(css, first_right());
        assert_eq!(first.margins.top, Pt::from_i32(50));
        assert_eq!(first.margins.left, Pt::from_i32(10));
        let left = context(css, PageClass::for_page(1, true, false));
        assert_eq!(left.margins.top, Pt::from_i32(10));
        assert_eq!(left.margins.left, Pt::from_i32(70));
    }

    #[test]
    fn percentage_margins_use_page_dimensions() {
        let ctx = context(
            "@page { size: 200pt 400pt; margin: 10% }",
            first_right(),
        );
        assert_eq!(ctx.margins.top, Pt::from_i32(40));
        assert_eq!(ctx.margins.left, Pt::from_i32(20));
    }

    #[test]
    fn margin_boxes_need_content() {
        let css = r#"@page { @top-center { content: "Title" } @bottom-left { color: red } }"#;
        let ctx = context(css, first_right());
        assert!(ctx.margin_boxes.contains_key(&MarginBoxSlot::TopCenter));
        assert!(!ctx.margin_boxes.contains_key(&MarginBoxSlot::BottomLeft));
    }

    #[test]
    fn blank_pages_pick_up_blank_rules() {
        let css = r#"@page :blank { @top-center { content: "Intentionally blank" } }"#;
        let blank = context(css, PageClass::for_page(1, true, true));
        assert!(blank.margin_boxes.contains_key(&MarginBoxSlot::TopCenter));
        let normal = context(css, PageClass::for_page(1, true, false));
        assert!(normal.margin_boxes.is_empty());
    }

    #[test]
    fn crop_marks_enable_auto_bleed() {
        let ctx = context("@page { marks: crop cross }", first_right());
        assert!(ctx.marks.crop && ctx.marks.cross);
        assert_eq!(ctx.bleed, Pt::from_i32(6));
        let ctx = context("@page { marks: crop; bleed: 3mm }", first_right());
        assert!((ctx.bleed.to_f32() - 8.504).abs() < 0.01);
    }

    #[test]
    fn content_box_subtracts_borders_and_padding() {
        let ctx = context(
            "@page { size: 300pt 300pt; margin: 20pt; border: 2pt solid black; padding: 8pt }",
            first_right(),
        );
        let content = ctx.content_box();
        assert_eq!(content.x, Pt::from_i32(30));
        assert_eq!(content.width, Pt::from_i32(240));
    }

    #[test]
    fn defaults_change_invalidates_cache() {
        let (mut processor, resolver) = processor("");
        let mut ctx = CssContext::new(Pt::from_i32(12));
        processor.context(first_right(), &resolver, &mut ctx, None);
        let snapshot = processor.snapshot();
        processor.set_defaults(Size::letter(), Margins::all(36.0));
        let size = processor.context(first_right(), &resolver, &mut ctx, None).size;
        assert_eq!(size, Size::letter());
        processor.restore(snapshot);
        let size = processor.context(first_right(), &resolver, &mut ctx, None).size;
        assert_eq!(size, Size::a4());
    }

    #[test]
    fn margin_box_extents_come_from_declarations() {
        let css = r#"@page { size: 400pt 400pt; @top-left { content: "a"; width: 25% } }"#;
        let ctx = context(css, first_right());
        let input = ctx.margin_box_input(MarginBoxSlot::TopLeft, Pt::ZERO, Pt::from_i32(10));
        assert_eq!(input.extent, Some(Pt::from_i32(100)));
        assert!(input.present);
        assert!(!ctx.margin_box_input(MarginBoxSlot::TopRight, Pt::ZERO, Pt::ZERO).present);
    }

    #[test]
    fn size_parser_rejects_garbage() {
        let default = Size::a4();
        assert_eq!(parse_page_size(Some("banana"), default, Pt::from_i32(12)), default);
        assert_eq!(parse_page_size(Some("a5"), default, Pt::from_i32(12)), Size::from_mm(148.0, 210.0));
        assert_eq!(
            parse_page_size(Some("a5 landscape"), default, Pt::from_i32(12)),
            Size::from_mm(148.0, 210.0).rotated()
        );
    }
}
