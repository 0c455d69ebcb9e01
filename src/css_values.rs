use crate::stylesheet::Declaration;
use crate::types::{Color, Pt};

pub const USER_AGENT_CSS: &str = r#"
html, body, div, p, h1, h2, h3, h4, h5, h6, section, article, header, footer, nav,
aside, main, blockquote, pre, ul, ol, dl, dt, dd, figure, figcaption, form, fieldset,
address, hr, center, table, thead, tbody, tfoot, tr, td, th, caption, legend { display: block; }
li { display: list-item; }
head, title, meta, style, script, link, template, base, noscript { display: none; }
img, input, textarea, select, button, svg { display: inline-block; }
body { margin: 8px; }
p, blockquote, ul, ol, dl, figure, pre { margin-top: 1em; margin-bottom: 1em; }
h1 { font-size: 2em; margin-top: 0.67em; margin-bottom: 0.67em; font-weight: bold; }
h2 { font-size: 1.5em; margin-top: 0.83em; margin-bottom: 0.83em; font-weight: bold; }
h3 { font-size: 1.17em; margin-top: 1em; margin-bottom: 1em; font-weight: bold; }
h4 { margin-top: 1.33em; margin-bottom: 1.33em; font-weight: bold; }
h5 { font-size: 0.83em; margin-top: 1.67em; margin-bottom: 1.67em; font-weight: bold; }
h6 { font-size: 0.67em; margin-top: 2.33em; margin-bottom: 2.33em; font-weight: bold; }
b, strong, th { font-weight: bold; }
i, em, cite, var, dfn { font-style: italic; }
code, kbd, samp, tt, pre { font-family: monospace; }
pre { white-space: pre; }
small { font-size: smaller; }
big { font-size: larger; }
center { text-align: center; }
blockquote, figure { margin-left: 40px; margin-right: 40px; }
ul, ol { padding-left: 40px; counter-reset: list-item; }
dd { margin-left: 40px; }
hr { border-top: 1px solid gray; margin-top: 0.5em; margin-bottom: 0.5em; }
u, ins { text-decoration: underline; }
a { color: blue; text-decoration: underline; }
q::before { content: open-quote; }
q::after { content: close-quote; }
ol > li::before { content: counter(list-item) ". "; }
ul > li::before { content: counter(list-item, disc) " "; }
input::placeholder, textarea::placeholder { color: gray; }
"#;

pub const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "direction",
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "hyphens",
    "letter-spacing",
    "line-height",
    "list-style-position",
    "list-style-type",
    "orphans",
    "quotes",
    "text-align",
    "text-indent",
    "text-transform",
    "visibility",
    "white-space",
    "widows",
    "word-spacing",
];

pub fn is_inherited(name: &str) -> bool {
    INHERITED_PROPERTIES.contains(&name)
}

pub const DEFAULT_VALUES: &[(&str, &str)] = &[
    ("display", "inline"),
    ("position", "static"),
    ("color", "black"),
    ("font-family", "helvetica"),
    ("font-style", "normal"),
    ("font-weight", "normal"),
    ("line-height", "normal"),
    ("text-align", "left"),
    ("text-indent", "0pt"),
    ("text-transform", "none"),
    ("text-decoration", "none"),
    ("white-space", "normal"),
    ("letter-spacing", "normal"),
    ("word-spacing", "normal"),
    ("vertical-align", "baseline"),
    ("visibility", "visible"),
    ("direction", "ltr"),
    ("quotes", "auto"),
    ("list-style-type", "disc"),
    ("margin-top", "0pt"),
    ("margin-right", "0pt"),
    ("margin-bottom", "0pt"),
    ("margin-left", "0pt"),
    ("padding-top", "0pt"),
    ("padding-right", "0pt"),
    ("padding-bottom", "0pt"),
    ("padding-left", "0pt"),
    ("border-top-width", "medium"),
    ("border-right-width", "medium"),
    ("border-bottom-width", "medium"),
    ("border-left-width", "medium"),
    ("border-top-style", "none"),
    ("border-right-style", "none"),
    ("border-bottom-style", "none"),
    ("border-left-style", "none"),
    ("border-top-color", "currentcolor"),
    ("border-right-color", "currentcolor"),
    ("border-bottom-color", "currentcolor"),
    ("border-left-color", "currentcolor"),
    ("background-color", "transparent"),
    ("width", "auto"),
    ("height", "auto"),
    ("min-width", "0pt"),
    ("min-height", "0pt"),
    ("max-width", "none"),
    ("max-height", "none"),
    ("break-before", "auto"),
    ("break-after", "auto"),
    ("break-inside", "auto"),
    ("content", "normal"),
    ("counter-reset", "none"),
    ("counter-increment", "none"),
    ("counter-set", "none"),
    ("string-set", "none"),
    ("orphans", "2"),
    ("widows", "2"),
];

pub fn default_value(name: &str) -> Option<&'static str> {
    DEFAULT_VALUES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

pub const LENGTH_PROPERTIES: &[&str] = &[
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
    "width",
    "height",
    "min-width",
    "min-height",
    "max-width",
    "max-height",
    "text-indent",
    "letter-spacing",
    "word-spacing",
    "top",
    "right",
    "bottom",
    "left",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthValue {
    Length(Pt),
    Percent(f32),
    Auto,
}

impl LengthValue {
    pub fn resolve(self, basis: Pt) -> Option<Pt> {
        match self {
            LengthValue::Length(value) => Some(value),
            LengthValue::Percent(pct) => Some(basis * (pct / 100.0)),
            LengthValue::Auto => None,
        }
    }
}

pub fn px_to_pt(px: f32) -> Pt {
    Pt::from_f32(px * 0.75)
}

// Converts one length token to points. `em` and `ex` use `font_size`,
// `rem` uses `root_font_size`. Percentages and `auto` are not lengths here.
pub fn parse_length(raw: &str, font_size: Pt, root_font_size: Pt) -> Option<Pt> {
    let raw = raw.trim().to_ascii_lowercase();
    if raw == "0" {
        return Some(Pt::ZERO);
    }
    let split = raw
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.' || ch == '-' || ch == '+'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value = number.parse::<f32>().ok()?;
    let pt = match unit {
        "pt" => Pt::from_f32(value),
        "px" => px_to_pt(value),
        "in" => Pt::from_f32(value * 72.0),
        "cm" => Pt::from_f32(value * 72.0 / 2.54),
        "mm" => Pt::from_f32(value * 72.0 / 25.4),
        "q" => Pt::from_f32(value * 72.0 / 101.6),
        "pc" => Pt::from_f32(value * 12.0),
        "em" => font_size * value,
        "ex" => font_size * (value * 0.5),
        "rem" => root_font_size * value,
        "" => {
            if value == 0.0 {
                Pt::ZERO
            } else {
                return None;
            }
        }
        _ => return None,
    };
    Some(pt)
}

pub fn parse_length_value(raw: &str, font_size: Pt, root_font_size: Pt) -> Option<LengthValue> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("auto") || trimmed.eq_ignore_ascii_case("none") {
        return Some(LengthValue::Auto);
    }
    if let Some(pct) = trimmed.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(LengthValue::Percent);
    }
    parse_length(trimmed, font_size, root_font_size).map(LengthValue::Length)
}

pub fn parse_border_width(raw: &str) -> Option<Pt> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "thin" => Some(Pt::from_f32(0.75)),
        "medium" => Some(Pt::from_f32(2.25)),
        "thick" => Some(Pt::from_f32(3.75)),
        other => parse_length(other, Pt::from_i32(12), Pt::from_i32(12)),
    }
}

pub fn format_pt(value: Pt) -> String {
    let milli = value.to_milli_i64();
    let whole = milli / 1000;
    let frac = (milli % 1000).abs();
    if frac == 0 {
        format!("{whole}pt")
    } else {
        let sign = if milli < 0 && whole == 0 { "-" } else { "" };
        let frac = format!("{frac:03}");
        format!("{sign}{whole}.{}pt", frac.trim_end_matches('0'))
    }
}

pub fn parse_color(raw: &str) -> Option<Color> {
    let value = raw.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
    {
        let args = args.trim_end_matches(')');
        let parts: Vec<&str> = args
            .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.len() < 3 {
            return None;
        }
        let channel = |part: &str| -> Option<f32> {
            if let Some(pct) = part.strip_suffix('%') {
                pct.parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0))
            } else {
                part.parse::<f32>().ok().map(|v| (v / 255.0).clamp(0.0, 1.0))
            }
        };
        if let Some(alpha) = parts.get(3) {
            let alpha = if let Some(pct) = alpha.strip_suffix('%') {
                pct.parse::<f32>().ok()? / 100.0
            } else {
                alpha.parse::<f32>().ok()?
            };
            if alpha <= 0.0 {
                return None;
            }
        }
        return Some(Color::rgb(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
        ));
    }
    named_color(&value)
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let expand = |c: u8| -> Option<u8> {
        let v = (c as char).to_digit(16)? as u8;
        Some(v * 16 + v)
    };
    let pair = |s: &str| u8::from_str_radix(s, 16).ok();
    let bytes = hex.as_bytes();
    match hex.len() {
        3 | 4 => {
            if hex.len() == 4 && expand(bytes[3])? == 0 {
                return None;
            }
            Some(Color::from_rgb8(
                expand(bytes[0])?,
                expand(bytes[1])?,
                expand(bytes[2])?,
            ))
        }
        6 | 8 => {
            if hex.len() == 8 && pair(hex.get(6..8)?)? == 0 {
                return None;
            }
            Some(Color::from_rgb8(
                pair(hex.get(0..2)?)?,
                pair(hex.get(2..4)?)?,
                pair(hex.get(4..6)?)?,
            ))
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    let rgb = match name {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "lime" => (0, 255, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "aqua" | "cyan" => (0, 255, 255),
        "fuchsia" | "magenta" => (255, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "silver" => (192, 192, 192),
        "maroon" => (128, 0, 0),
        "navy" => (0, 0, 128),
        "olive" => (128, 128, 0),
        "purple" => (128, 0, 128),
        "teal" => (0, 128, 128),
        "orange" => (255, 165, 0),
        "brown" => (165, 42, 42),
        "pink" => (255, 192, 203),
        "gold" => (255, 215, 0),
        "indigo" => (75, 0, 130),
        "violet" => (238, 130, 238),
        "darkblue" => (0, 0, 139),
        "darkred" => (139, 0, 0),
        "darkgreen" => (0, 100, 0),
        "whitesmoke" => (245, 245, 245),
        "gainsboro" => (220, 220, 220),
        "beige" => (245, 245, 220),
        "ivory" => (255, 255, 240),
        "steelblue" => (70, 130, 180),
        "slategray" | "slategrey" => (112, 128, 144),
        _ => return None,
    };
    Some(Color::from_rgb8(rgb.0, rgb.1, rgb.2))
}

pub fn split_top_level(raw: &str) -> Vec<String> {
    split_top_level_on(raw, |ch| ch.is_whitespace())
}

pub fn split_commas(raw: &str) -> Vec<String> {
    split_top_level_on(raw, |ch| ch == ',')
}

fn split_top_level_on(raw: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            _ if depth == 0 && is_sep(ch) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

fn four_sides(values: &[String]) -> Option<[String; 4]> {
    match values.len() {
        1 => Some([
            values[0].clone(),
            values[0].clone(),
            values[0].clone(),
            values[0].clone(),
        ]),
        2 => Some([
            values[0].clone(),
            values[1].clone(),
            values[0].clone(),
            values[1].clone(),
        ]),
        3 => Some([
            values[0].clone(),
            values[1].clone(),
            values[2].clone(),
            values[1].clone(),
        ]),
        4 => Some([
            values[0].clone(),
            values[1].clone(),
            values[2].clone(),
            values[3].clone(),
        ]),
        _ => None,
    }
}

fn is_border_style(token: &str) -> bool {
    matches!(
        token,
        "none" | "hidden" | "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge"
            | "inset" | "outset"
    )
}

fn is_css_wide_keyword(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "inherit" | "initial" | "unset"
    )
}

fn split_border(value: &str) -> (Option<String>, Option<String>, Option<String>) {
    let mut width = None;
    let mut style = None;
    let mut color = None;
    for token in split_top_level(value) {
        let lower = token.to_ascii_lowercase();
        if is_border_style(&lower) {
            style = Some(lower);
        } else if parse_border_width(&lower).is_some() {
            width = Some(lower);
        } else {
            color = Some(token);
        }
    }
    (width, style, color)
}

pub fn expand_shorthand(name: &str, value: &str, important: bool, out: &mut Vec<Declaration>) {
    let push = |out: &mut Vec<Declaration>, name: String, value: String| {
        out.push(Declaration {
            name,
            value,
            important,
        });
    };
    let wide = is_css_wide_keyword(value);
    match name {
        "margin" | "padding" => {
            let values = if wide {
                vec![value.trim().to_string()]
            } else {
                split_top_level(value)
            };
            if let Some(sides) = four_sides(&values) {
                for (side, v) in SIDES.iter().zip(sides) {
                    push(out, format!("{name}-{side}"), v);
                }
            }
        }
        "border-width" | "border-style" | "border-color" => {
            let suffix = &name["border-".len()..];
            let values = if wide {
                vec![value.trim().to_string()]
            } else {
                split_top_level(value)
            };
            if let Some(sides) = four_sides(&values) {
                for (side, v) in SIDES.iter().zip(sides) {
                    push(out, format!("border-{side}-{suffix}"), v);
                }
            }
        }
        "border" | "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let sides: Vec<&str> = if name == "border" {
                SIDES.to_vec()
            } else {
                vec![&name["border-".len()..]]
            };
            let (width, style, color) = if wide {
                let v = value.trim().to_string();
                (Some(v.clone()), Some(v.clone()), Some(v))
            } else {
                split_border(value)
            };
            for side in sides {
                push(
                    out,
                    format!("border-{side}-width"),
                    width.clone().unwrap_or_else(|| "medium".to_string()),
                );
                push(
                    out,
                    format!("border-{side}-style"),
                    style.clone().unwrap_or_else(|| "none".to_string()),
                );
                push(
                    out,
                    format!("border-{side}-color"),
                    color.clone().unwrap_or_else(|| "currentcolor".to_string()),
                );
            }
        }
        "background" => {
            let color = split_top_level(value)
                .into_iter()
                .find(|token| {
                    let lower = token.to_ascii_lowercase();
                    lower == "transparent" || parse_color(&lower).is_some()
                })
                .unwrap_or_else(|| "transparent".to_string());
            push(out, "background-color".to_string(), color);
        }
        "page-break-before" | "page-break-after" | "page-break-inside" => {
            let target = format!("break-{}", &name["page-break-".len()..]);
            let mapped = match value.trim().to_ascii_lowercase().as_str() {
                "always" => "page".to_string(),
                other => other.to_string(),
            };
            push(out, target, mapped);
        }
        "font" => expand_font(value, important, out),
        _ => push(out, name.to_string(), value.trim().to_string()),
    }
}

fn expand_font(value: &str, important: bool, out: &mut Vec<Declaration>) {
    let tokens = split_top_level(value);
    let mut style = "normal".to_string();
    let mut weight = "normal".to_string();
    let mut size = None;
    let mut line_height = None;
    let mut family_start = tokens.len();
    for (index, token) in tokens.iter().enumerate() {
        let lower = token.to_ascii_lowercase();
        match lower.as_str() {
            "italic" | "oblique" => style = lower,
            "bold" | "bolder" | "lighter" => weight = lower,
            "normal" | "small-caps" => {}
            _ if lower.len() == 3 && lower.ends_with("00") && lower.parse::<u16>().is_ok() => {
                weight = lower
            }
            _ => {
                let (size_part, lh) = match lower.split_once('/') {
                    Some((s, lh)) => (s.to_string(), Some(lh.to_string())),
                    None => (lower.clone(), None),
                };
                size = Some(size_part);
                line_height = lh;
                family_start = index + 1;
                break;
            }
        }
    }
    let Some(size) = size else {
        return;
    };
    let family = tokens[family_start.min(tokens.len())..].join(" ");
    let mut push = |name: &str, value: String| {
        out.push(Declaration {
            name: name.to_string(),
            value,
            important,
        });
    };
    push("font-style", style);
    push("font-weight", weight);
    push("font-size", size);
    push(
        "line-height",
        line_height.unwrap_or_else(|| "normal".to_string()),
    );
    if !family.is_empty() {
        push("font-family", family);
    }
}

pub fn attribute_declarations(
    tag: &str,
    attrs: &[(String, String)],
    parent_attr: impl Fn(&str) -> Option<String>,
) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut push = |name: &str, value: String| {
        expand_shorthand(name, &value, false, &mut out);
    };
    let dimension = |raw: &str| -> String {
        let raw = raw.trim();
        if raw.ends_with('%') {
            raw.to_string()
        } else if raw.chars().all(|ch| ch.is_ascii_digit() || ch == '.') && !raw.is_empty() {
            format!("{raw}px")
        } else {
            raw.to_string()
        }
    };
    for (name, value) in attrs {
        match name.as_str() {
            "align" => match tag {
                "img" | "table" => {}
                _ => push("text-align", value.to_ascii_lowercase()),
            },
            "valign" => push("vertical-align", value.to_ascii_lowercase()),
            "bgcolor" => push("background-color", value.clone()),
            "color" if tag == "font" => push("color", value.clone()),
            "face" if tag == "font" => push("font-family", value.clone()),
            "size" if tag == "font" => {
                if let Some(size) = font_tag_size(value) {
                    push("font-size", size.to_string());
                }
            }
            "width" if tag != "input" => push("width", dimension(value)),
            "height" if tag != "input" => push("height", dimension(value)),
            "border" if matches!(tag, "table" | "img") => {
                push("border", format!("{} solid", dimension(value)))
            }
            "hidden" => push("display", "none".to_string()),
            "dir" => push("direction", value.to_ascii_lowercase()),
            _ => {}
        }
    }
    if matches!(tag, "td" | "th") {
        if let Some(padding) = parent_attr("cellpadding") {
            push("padding", dimension(&padding));
        }
    }
    out
}

fn font_tag_size(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    let base = 3i32;
    let size = if let Some(rel) = raw.strip_prefix('+') {
        base + rel.parse::<i32>().ok()?
    } else if let Some(rel) = raw.strip_prefix('-') {
        base - rel.parse::<i32>().ok()?
    } else {
        raw.parse::<i32>().ok()?
    };
    Some(match size.clamp(1, 7) {
        1 => "x-small",
        2 => "small",
        3 => "medium",
        4 => "large",
        5 => "x-large",
        6 => "xx-large",
        _ => "xxx-large",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_convert_to_points() {
        let twelve = Pt::from_i32(12);
        assert_eq!(parse_length("1in", twelve, twelve), Some(Pt::from_i32(72)));
        assert_eq!(parse_length("16px", twelve, twelve), Some(Pt::from_i32(12)));
        assert_eq!(parse_length("2em", twelve, twelve), Some(Pt::from_i32(24)));
        assert_eq!(
            parse_length("1.5rem", twelve, Pt::from_i32(10)),
            Some(Pt::from_i32(15))
        );
        assert_eq!(parse_length("12", twelve, twelve), None);
        assert_eq!(
            parse_length_value("50%", twelve, twelve),
            Some(LengthValue::Percent(50.0))
        );
    }

    #[test]
    fn colors_parse_hex_names_and_rgb() {
        assert_eq!(parse_color("#f00"), Some(Color::from_rgb8(255, 0, 0)));
        assert_eq!(parse_color("navy"), Some(Color::from_rgb8(0, 0, 128)));
        assert_eq!(
            parse_color("rgb(0, 128, 0)"),
            Some(Color::from_rgb8(0, 128, 0))
        );
        assert_eq!(parse_color("transparent"), None);
        assert_eq!(parse_color("rgba(0,0,0,0)"), None);
    }

    #[test]
    fn shorthands_expand_to_longhands() {
        let mut out = Vec::new();
        expand_shorthand("margin", "1pt 2pt", false, &mut out);
        let pairs: Vec<(String, String)> =
            out.iter().map(|d| (d.name.clone(), d.value.clone())).collect();
        assert_eq!(pairs[0], ("margin-top".to_string(), "1pt".to_string()));
        assert_eq!(pairs[3], ("margin-left".to_string(), "2pt".to_string()));

        let mut out = Vec::new();
        expand_shorthand("border-bottom", "2px dashed red", true, &mut out);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|d| d.important));
        assert_eq!(out[1].value, "dashed");
        assert_eq!(out[2].value, "red");

        let mut out = Vec::new();
        expand_shorthand("page-break-before", "always", false, &mut out);
        assert_eq!(out[0].name, "break-before");
        assert_eq!(out[0].value, "page");
    }

    #[test]
    fn top_level_split_honors_quotes_and_parens() {
        let parts = split_top_level("counter(page, decimal) \" of \" counter(pages)");
        assert_eq!(parts, vec!["counter(page, decimal)", "\" of \"", "counter(pages)"]);
        assert_eq!(format_pt(Pt::from_f32(10.5)), "10.5pt");
        assert_eq!(format_pt(Pt::from_i32(12)), "12pt");
    }

    #[test]
    fn legacy_attributes_map_to_declarations() {
        let attrs = vec![
            ("align".to_string(), "CENTER".to_string()),
            ("bgcolor".to_string(), "#eee".to_string()),
            ("width".to_string(), "200".to_string()),
        ];
        let decls = attribute_declarations("div", &attrs, |_| None);
        assert!(decls.iter().any(|d| d.name == "text-align" && d.value == "center"));
        assert!(decls.iter().any(|d| d.name == "width" && d.value == "200px"));
        assert!(decls.iter().any(|d| d.name == "background-color"));
    }
}
