use crate::css_values::{expand_shorthand, px_to_pt, split_commas};
use crate::margin_box::MarginBoxSlot;
use crate::selector::{SelectorPattern, Specificity};
use crate::types::Pt;
use lightningcss::declaration::DeclarationBlock;
use lightningcss::media_query::{
    MediaCondition, MediaFeature, MediaFeatureComparison, MediaFeatureId, MediaFeatureName,
    MediaFeatureValue, MediaList, MediaQuery, MediaType, Operator, Qualifier,
};
use lightningcss::rules::page::{PageMarginBox, PagePseudoClass};
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleAttribute, StyleSheet};
use lightningcss::traits::ToCss;

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            important: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Print,
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaDevice {
    pub media_type: MediaKind,
    pub width: Pt,
    pub height: Pt,
}

impl Default for MediaDevice {
    fn default() -> Self {
        let a4 = crate::types::Size::a4();
        Self {
            media_type: MediaKind::Print,
            width: a4.width,
            height: a4.height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector: SelectorPattern,
    pub specificity: Specificity,
    pub order: usize,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePseudo {
    First,
    Left,
    Right,
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSelector {
    pub name: Option<String>,
    pub pseudo_classes: Vec<PagePseudo>,
}

#[derive(Debug, Clone)]
pub struct PageRule {
    pub selectors: Vec<PageSelector>,
    pub declarations: Vec<Declaration>,
    pub margin_rules: Vec<(MarginBoxSlot, Vec<Declaration>)>,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub family: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CssSheet {
    pub rules: Vec<StyleRule>,
    pub page_rules: Vec<PageRule>,
    pub font_faces: Vec<FontFaceRule>,
}

impl CssSheet {
    pub fn parse(css: &str, device: &MediaDevice) -> CssSheet {
        let mut sheet = CssSheet::default();
        sheet.append(css, device);
        sheet
    }

    pub fn append(&mut self, css: &str, device: &MediaDevice) {
        if css.trim().is_empty() {
            return;
        }
        let options = ParserOptions {
            error_recovery: true,
            ..ParserOptions::default()
        };
        let parsed = match StyleSheet::parse(css, options) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("style sheet rejected: {err}");
                return;
            }
        };
        let mut order = self.rules.len() + self.page_rules.len();
        self.append_rule_list(&parsed.rules, device, &mut order);
    }

    fn append_rule_list(&mut self, rules: &CssRuleList, device: &MediaDevice, order: &mut usize) {
        for rule in &rules.0 {
            match rule {
                CssRule::Style(style) => {
                    let declarations = flatten_declarations(&style.declarations);
                    let selectors = style
                        .selectors
                        .to_css_string(PrinterOptions::default())
                        .unwrap_or_default();
                    for selector in split_commas(&selectors) {
                        let Some(pattern) = SelectorPattern::parse(&selector) else {
                            log::debug!("unsupported selector {selector}");
                            continue;
                        };
                        self.rules.push(StyleRule {
                            specificity: pattern.specificity(),
                            selector: pattern,
                            order: *order,
                            declarations: declarations.clone(),
                        });
                        *order += 1;
                    }
                }
                CssRule::Media(media) => {
                    if media_list_matches(&media.query, device) {
                        self.append_rule_list(&media.rules, device, order);
                    }
                }
                CssRule::Page(page_rule) => {
                    let mut selectors = Vec::new();
                    for selector in &page_rule.selectors {
                        let mut pseudo_classes = Vec::new();
                        let mut supported = true;
                        for pseudo in &selector.pseudo_classes {
                            match pseudo {
                                PagePseudoClass::First => pseudo_classes.push(PagePseudo::First),
                                PagePseudoClass::Left => pseudo_classes.push(PagePseudo::Left),
                                PagePseudoClass::Right => pseudo_classes.push(PagePseudo::Right),
                                PagePseudoClass::Blank => pseudo_classes.push(PagePseudo::Blank),
                                _ => supported = false,
                            }
                        }
                        if supported {
                            selectors.push(PageSelector {
                                name: selector.name.as_ref().map(|name| name.to_string()),
                                pseudo_classes,
                            });
                        }
                    }
                    if selectors.is_empty() && !page_rule.selectors.is_empty() {
                        continue;
                    }
                    let margin_rules = page_rule
                        .rules
                        .iter()
                        .map(|margin_rule| {
                            (
                                margin_slot(&margin_rule.margin_box),
                                flatten_declarations(&margin_rule.declarations),
                            )
                        })
                        .collect();
                    self.page_rules.push(PageRule {
                        selectors,
                        declarations: flatten_declarations(&page_rule.declarations),
                        margin_rules,
                        order: *order,
                    });
                    *order += 1;
                }
                CssRule::FontFace(font_face) => {
                    let mut face = FontFaceRule {
                        family: None,
                        sources: Vec::new(),
                    };
                    let Ok(text) = font_face.to_css_string(PrinterOptions::default()) else {
                        continue;
                    };
                    let body = match (text.find('{'), text.rfind('}')) {
                        (Some(open), Some(close)) if open < close => &text[open + 1..close],
                        _ => continue,
                    };
                    for entry in body.split(';') {
                        let Some((name, value)) = entry.split_once(':') else {
                            continue;
                        };
                        match name.trim() {
                            "font-family" => {
                                face.family = Some(
                                    value.trim().trim_matches('"').trim_matches('\'').to_string(),
                                );
                            }
                            "src" => face.sources.extend(extract_urls(value)),
                            _ => {}
                        }
                    }
                    self.font_faces.push(face);
                }
                _ => {}
            }
        }
    }
}

pub fn parse_inline_declarations(style: &str) -> Vec<Declaration> {
    if style.trim().is_empty() {
        return Vec::new();
    }
    match StyleAttribute::parse(style, ParserOptions::default()) {
        Ok(attr) => flatten_declarations(&attr.declarations),
        Err(err) => {
            log::warn!("inline style rejected: {err}");
            Vec::new()
        }
    }
}

fn flatten_declarations(block: &DeclarationBlock) -> Vec<Declaration> {
    let mut out = Vec::new();
    for (list, important) in [
        (&block.declarations, false),
        (&block.important_declarations, true),
    ] {
        for property in list {
            let name = property.property_id().name().to_ascii_lowercase();
            let Ok(value) = property.value_to_css_string(PrinterOptions::default()) else {
                continue;
            };
            expand_shorthand(&name, &value, important, &mut out);
        }
    }
    out
}

fn margin_slot(margin_box: &PageMarginBox) -> MarginBoxSlot {
    match margin_box {
        PageMarginBox::TopLeftCorner => MarginBoxSlot::TopLeftCorner,
        PageMarginBox::TopLeft => MarginBoxSlot::TopLeft,
        PageMarginBox::TopCenter => MarginBoxSlot::TopCenter,
        PageMarginBox::TopRight => MarginBoxSlot::TopRight,
        PageMarginBox::TopRightCorner => MarginBoxSlot::TopRightCorner,
        PageMarginBox::LeftTop => MarginBoxSlot::LeftTop,
        PageMarginBox::LeftMiddle => MarginBoxSlot::LeftMiddle,
        PageMarginBox::LeftBottom => MarginBoxSlot::LeftBottom,
        PageMarginBox::RightTop => MarginBoxSlot::RightTop,
        PageMarginBox::RightMiddle => MarginBoxSlot::RightMiddle,
        PageMarginBox::RightBottom => MarginBoxSlot::RightBottom,
        PageMarginBox::BottomLeftCorner => MarginBoxSlot::BottomLeftCorner,
        PageMarginBox::BottomLeft => MarginBoxSlot::BottomLeft,
        PageMarginBox::BottomCenter => MarginBoxSlot::BottomCenter,
        PageMarginBox::BottomRight => MarginBoxSlot::BottomRight,
        PageMarginBox::BottomRightCorner => MarginBoxSlot::BottomRightCorner,
    }
}

fn extract_urls(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find("url(") {
        let after = &rest[start + 4..];
        let Some(end) = after.find(')') else {
            break;
        };
        let url = after[..end].trim().trim_matches('"').trim_matches('\'');
        if !url.is_empty() {
            out.push(url.to_string());
        }
        rest = &after[end + 1..];
    }
    out
}

fn media_list_matches(list: &MediaList, device: &MediaDevice) -> bool {
    if list.media_queries.is_empty() {
        return true;
    }
    list.media_queries
        .iter()
        .any(|query| media_query_matches(query, device).unwrap_or(false))
}

fn media_query_matches(query: &MediaQuery, device: &MediaDevice) -> Option<bool> {
    let media_type_matches = match &query.media_type {
        MediaType::All => true,
        MediaType::Print => device.media_type == MediaKind::Print,
        MediaType::Screen => device.media_type == MediaKind::Screen,
        _ => false,
    };
    let condition_matches = match &query.condition {
        Some(condition) => media_condition_matches(condition, device)?,
        None => true,
    };
    let mut result = media_type_matches && condition_matches;
    if let Some(Qualifier::Not) = query.qualifier {
        result = !result;
    }
    Some(result)
}

fn media_condition_matches(condition: &MediaCondition, device: &MediaDevice) -> Option<bool> {
    match condition {
        MediaCondition::Feature(feature) => media_feature_matches(feature, device),
        MediaCondition::Not(inner) => media_condition_matches(inner, device).map(|v| !v),
        MediaCondition::Operation {
            operator,
            conditions,
        } => match operator {
            Operator::And => {
                for cond in conditions {
                    if !media_condition_matches(cond, device)? {
                        return Some(false);
                    }
                }
                Some(!conditions.is_empty())
            }
            Operator::Or => {
                for cond in conditions {
                    if media_condition_matches(cond, device)? {
                        return Some(true);
                    }
                }
                Some(false)
            }
        },
        _ => None,
    }
}

fn media_feature_matches(feature: &MediaFeature, device: &MediaDevice) -> Option<bool> {
    match feature {
        MediaFeature::Plain { name, value } => {
            media_feature_compare(name, MediaFeatureComparison::Equal, value, device)
        }
        MediaFeature::Range {
            name,
            operator,
            value,
        } => media_feature_compare(name, *operator, value, device),
        MediaFeature::Interval {
            name,
            start,
            start_operator,
            end,
            end_operator,
        } => {
            let left = media_feature_compare(name, *start_operator, start, device)?;
            let right = media_feature_compare(name, *end_operator, end, device)?;
            Some(left && right)
        }
        MediaFeature::Boolean { .. } => None,
    }
}

fn media_feature_compare(
    name: &MediaFeatureName<MediaFeatureId>,
    operator: MediaFeatureComparison,
    value: &MediaFeatureValue,
    device: &MediaDevice,
) -> Option<bool> {
    let target = match name {
        MediaFeatureName::Standard(id) => match id {
            MediaFeatureId::Width | MediaFeatureId::DeviceWidth => device.width,
            MediaFeatureId::Height | MediaFeatureId::DeviceHeight => device.height,
            _ => return None,
        },
        _ => return None,
    };
    let rhs = match value {
        MediaFeatureValue::Length(length) => length.to_px().map(px_to_pt),
        _ => None,
    }?;
    Some(match operator {
        MediaFeatureComparison::GreaterThan => target > rhs,
        MediaFeatureComparison::GreaterThanEqual => target >= rhs,
        MediaFeatureComparison::LessThan => target < rhs,
        MediaFeatureComparison::LessThanEqual => target <= rhs,
        MediaFeatureComparison::Equal => target == rhs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_rules_flatten_selector_lists_and_shorthands() {
        let sheet = CssSheet::parse(
            "h1, h2 { margin: 4pt; color: red !important }",
            &MediaDevice::default(),
        );
        assert_eq!(sheet.rules.len(), 2);
        let decls = &sheet.rules[0].declarations;
        assert!(decls.iter().any(|d| d.name == "margin-left" && d.value == "4pt"));
        assert!(decls.iter().any(|d| d.name == "color" && d.important));
        assert!(sheet.rules[0].order < sheet.rules[1].order);
    }

    #[test]
    fn media_rules_follow_the_device() {
        let css = "@media screen { p { color: red } } @media print { p { color: blue } }";
        let print = CssSheet::parse(css, &MediaDevice::default());
        assert_eq!(print.rules.len(), 1);
        assert!(print.rules[0].declarations[0].value.contains("blue") || print.rules[0].declarations[0].value == "#00f");
        let screen = CssSheet::parse(
            css,
            &MediaDevice {
                media_type: MediaKind::Screen,
                ..MediaDevice::default()
            },
        );
        assert_eq!(screen.rules.len(), 1);
    }

    #[test]
    fn page_rules_keep_selectors_and_margin_boxes() {
        let css = "@page :first { margin: 1in; @top-center { content: \"Title\" } } @page { size: a4 landscape }";
        let sheet = CssSheet::parse(css, &MediaDevice::default());
        assert_eq!(sheet.page_rules.len(), 2);
        let first = &sheet.page_rules[0];
        assert_eq!(first.selectors[0].pseudo_classes, vec![PagePseudo::First]);
        assert_eq!(first.margin_rules.len(), 1);
        assert_eq!(first.margin_rules[0].0, MarginBoxSlot::TopCenter);
        assert!(first.margin_rules[0]
            .1
            .iter()
            .any(|d| d.name == "content" && d.value.contains("Title")));
        assert!(sheet.page_rules[1].selectors.is_empty());
    }

    #[test]
    fn inline_declarations_parse() {
        let decls = parse_inline_declarations("break-before: always; font-size: 2em");
        assert!(decls.iter().any(|d| d.name == "break-before" && d.value == "always"));
        assert!(decls.iter().any(|d| d.name == "font-size" && d.value == "2em"));
    }

    #[test]
    fn font_face_sources_are_collected() {
        let sheet = CssSheet::parse(
            "@font-face { font-family: \"Body\"; src: url(body.ttf) format(\"truetype\") }",
            &MediaDevice::default(),
        );
        assert_eq!(sheet.font_faces.len(), 1);
        assert_eq!(sheet.font_faces[0].family.as_deref(), Some("Body"));
        assert_eq!(sheet.font_faces[0].sources, vec!["body.ttf".to_string()]);
    }
}
