use crate::counters::format_counter;
use crate::css_values::{split_commas, split_top_level};
use crate::dom::{DomTree, ElementData, NodeId, NodeKind, OccurrencePolicy};
use crate::style::{CssContext, StyleMap};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Ident(String),
    Func { name: String, args: Vec<String> },
}

fn tokenize(value: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = value.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        if ch == '"' || ch == '\'' {
            let (text, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(text));
            i = next;
            continue;
        }
        if ch.is_alphanumeric() || ch == '-' || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_')
            {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            if i < chars.len() && chars[i] == '(' {
                let (inner, next) = read_parens(&chars, i)?;
                let args = split_commas(&inner);
                tokens.push(Token::Func {
                    name: ident.to_ascii_lowercase(),
                    args,
                });
                i = next;
            } else {
                tokens.push(Token::Ident(ident.to_ascii_lowercase()));
            }
            continue;
        }
        return Err(format!("unexpected '{ch}'"));
    }
    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let ch = chars[i];
        if ch == quote {
            return Ok((out, i + 1));
        }
        if ch == '\\' {
            i += 1;
            let mut hex = String::new();
            while i < chars.len() && hex.len() < 6 && chars[i].is_ascii_hexdigit() {
                hex.push(chars[i]);
                i += 1;
            }
            if hex.is_empty() {
                if let Some(next) = chars.get(i) {
                    out.push(*next);
                    i += 1;
                }
            } else {
                if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(decoded);
                }
                if chars.get(i) == Some(&' ') {
                    i += 1;
                }
            }
            continue;
        }
        out.push(ch);
        i += 1;
    }
    Err("unterminated string".to_string())
}

fn read_parens(chars: &[char], open: usize) -> Result<(String, usize), String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, ch) in chars[open..].iter().enumerate() {
        if let Some(q) = quote {
            if *ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(*ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = open + offset;
                    let inner: String = chars[open + 1..end].iter().collect();
                    return Ok((inner, end + 1));
                }
            }
            _ => {}
        }
    }
    Err("unbalanced parentheses".to_string())
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() >= 2 && (chars[0] == '"' || chars[0] == '\'') {
        if let Ok((text, _)) = read_string(&chars, 0) {
            return text;
        }
    }
    trimmed.to_string()
}

fn quote_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    let raw = raw.unwrap_or("auto").trim();
    match raw.to_ascii_lowercase().as_str() {
        "none" => return Vec::new(),
        "auto" | "" => {
            return vec![
                ("\u{201c}".to_string(), "\u{201d}".to_string()),
                ("\u{2018}".to_string(), "\u{2019}".to_string()),
            ]
        }
        _ => {}
    }
    let strings: Vec<String> = tokenize(raw)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|token| match token {
            Token::Str(text) => Some(text),
            _ => None,
        })
        .collect();
    strings
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

fn quote_at(pairs: &[(String, String)], depth: usize, open: bool) -> String {
    let Some(pair) = pairs.get(depth.min(pairs.len().saturating_sub(1))) else {
        return String::new();
    };
    if open {
        pair.0.clone()
    } else {
        pair.1.clone()
    }
}

fn target_id(tree: &DomTree, origin: Option<NodeId>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    let reference = if let Some(inner) = raw
        .strip_prefix("attr(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        origin.and_then(|node| tree.attr(node, inner.trim()))?.to_string()
    } else if let Some(inner) = raw.strip_prefix("url(").and_then(|rest| rest.strip_suffix(')')) {
        unquote(inner)
    } else {
        unquote(raw)
    };
    let id = reference.strip_prefix('#')?;
    (!id.is_empty()).then(|| id.to_string())
}

fn format_list(values: &[i32], separator: &str, style: &str) -> String {
    if values.is_empty() {
        return format_counter(0, style);
    }
    values
        .iter()
        .map(|value| format_counter(*value, style))
        .collect::<Vec<_>>()
        .join(separator)
}

fn policy_arg(args: &[String], index: usize) -> OccurrencePolicy {
    args.get(index)
        .and_then(|raw| OccurrencePolicy::parse(raw))
        .unwrap_or_default()
}

pub fn expand_content(tree: &mut DomTree, pseudo: NodeId, style: &StyleMap, ctx: &mut CssContext) {
    tree.clear_children(pseudo);
    let value = style.get("content").unwrap_or("normal").trim().to_string();
    if matches!(value.to_ascii_lowercase().as_str(), "normal" | "none" | "") {
        return;
    }
    let tokens = match tokenize(&value) {
        Ok(tokens) => tokens,
        Err(reason) => {
            log::warn!("ignoring malformed content '{value}': {reason}");
            return;
        }
    };
    let origin = tree.parent(pseudo);
    let quotes = quote_pairs(style.get("quotes"));

    let mut items: Vec<NodeKind> = Vec::new();
    let mut text = String::new();
    let flush = |text: &mut String, items: &mut Vec<NodeKind>| {
        if !text.is_empty() {
            items.push(NodeKind::Text(std::mem::take(text)));
        }
    };

    for token in tokens {
        match token {
            Token::Str(literal) => text.push_str(&literal),
            Token::Ident(ident) => match ident.as_str() {
                "open-quote" => {
                    let depth = ctx.counters.open_quote();
                    text.push_str(&quote_at(&quotes, depth, true));
                }
                "close-quote" => {
                    if let Some(depth) = ctx.counters.close_quote() {
                        text.push_str(&quote_at(&quotes, depth, false));
                    }
                }
                "no-open-quote" => {
                    ctx.counters.open_quote();
                }
                "no-close-quote" => {
                    ctx.counters.close_quote();
                }
                other => {
                    log::warn!("ignoring content '{value}': unknown keyword '{other}'");
                    return;
                }
            },
            Token::Func { name, args } => match name.as_str() {
                "counter" => {
                    let counter = args.first().map(|s| s.trim()).unwrap_or_default();
                    let list_style = args.get(1).map(|s| s.trim()).unwrap_or("decimal");
                    if counter == "page" || counter == "pages" {
                        flush(&mut text, &mut items);
                        let total = counter == "pages";
                        ctx.uses_page_total |= total;
                        items.push(NodeKind::PageCounter {
                            total,
                            style: list_style.to_string(),
                        });
                    } else {
                        text.push_str(&format_counter(ctx.counters.value(counter), list_style));
                    }
                }
                "counters" => {
                    let counter = args.first().map(|s| s.trim()).unwrap_or_default();
                    let separator = args.get(1).map(|s| unquote(s)).unwrap_or_default();
                    let list_style = args.get(2).map(|s| s.trim()).unwrap_or("decimal");
                    text.push_str(&format_list(
                        &ctx.counters.values(counter),
                        &separator,
                        list_style,
                    ));
                }
                "target-counter" | "target-counters" => {
                    let Some(target) = args.first().and_then(|raw| target_id(tree, origin, raw))
                    else {
                        log::debug!("target-counter without a local target in '{value}'");
                        continue;
                    };
                    let counter = args.get(1).map(|s| s.trim()).unwrap_or_default();
                    let (separator, list_style) = if name == "target-counters" {
                        (
                            args.get(2).map(|s| unquote(s)).unwrap_or_default(),
                            args.get(3).map(|s| s.trim()).unwrap_or("decimal"),
                        )
                    } else {
                        (String::new(), args.get(2).map(|s| s.trim()).unwrap_or("decimal"))
                    };
                    if counter == "page" {
                        flush(&mut text, &mut items);
                        ctx.uses_target_pages = true;
                        items.push(NodeKind::TargetPage {
                            target,
                            style: list_style.to_string(),
                        });
                        continue;
                    }
                    match ctx.counters.target_values(&target, counter) {
                        Some(values) if name == "target-counters" => {
                            text.push_str(&format_list(&values, &separator, list_style))
                        }
                        Some(values) => text.push_str(&format_counter(
                            values.last().copied().unwrap_or(0),
                            list_style,
                        )),
                        None => {
                            ctx.forward_targets = true;
                            log::debug!("target '#{target}' not seen yet; counter left empty");
                        }
                    }
                }
                "attr" => {
                    let attr = args.first().map(|s| s.trim()).unwrap_or_default();
                    if let Some(value) = origin.and_then(|node| tree.attr(node, attr)) {
                        text.push_str(value);
                    }
                }
                "url" => {
                    let src = args.first().map(|s| unquote(s)).unwrap_or_default();
                    flush(&mut text, &mut items);
                    items.push(NodeKind::Element(ElementData {
                        tag: "img".to_string(),
                        attrs: vec![("src".to_string(), src)],
                        pseudo: None,
                        declarations: Vec::new(),
                        synthetic: true,
                    }));
                }
                "element" => {
                    flush(&mut text, &mut items);
                    items.push(NodeKind::RunningRef {
                        name: args.first().map(|s| s.trim().to_string()).unwrap_or_default(),
                        policy: policy_arg(&args, 1),
                    });
                }
                "string" => {
                    flush(&mut text, &mut items);
                    items.push(NodeKind::StringRef {
                        name: args.first().map(|s| s.trim().to_string()).unwrap_or_default(),
                        policy: policy_arg(&args, 1),
                    });
                }
                other => {
                    log::warn!("ignoring content '{value}': unsupported function '{other}()'");
                    return;
                }
            },
        }
    }
    flush(&mut text, &mut items);
    for kind in items {
        tree.append_synthetic(pseudo, kind);
    }
}

pub fn evaluate_string_set(
    tree: &DomTree,
    node: NodeId,
    value: &str,
    ctx: &CssContext,
) -> Vec<(String, String)> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    let mut out = Vec::new();
    for entry in split_commas(value) {
        let parts = split_top_level(&entry);
        let Some((name, rest)) = parts.split_first() else {
            continue;
        };
        let tokens = match tokenize(&rest.join(" ")) {
            Ok(tokens) => tokens,
            Err(reason) => {
                log::warn!("ignoring malformed string-set '{entry}': {reason}");
                continue;
            }
        };
        let mut text = String::new();
        for token in tokens {
            match token {
                Token::Str(literal) => text.push_str(&literal),
                Token::Func { name, args } => match name.as_str() {
                    "content" => {
                        let which = args.first().map(|s| s.trim()).unwrap_or("text");
                        if matches!(which, "text" | "") {
                            text.push_str(&collapse_whitespace(&tree.text_content(node)));
                        }
                    }
                    "attr" => {
                        let attr = args.first().map(|s| s.trim()).unwrap_or_default();
                        if let Some(value) = tree.attr(node, attr) {
                            text.push_str(value);
                        }
                    }
                    "counter" => {
                        let counter = args.first().map(|s| s.trim()).unwrap_or_default();
                        let list_style = args.get(1).map(|s| s.trim()).unwrap_or("decimal");
                        text.push_str(&format_counter(ctx.counters.value(counter), list_style));
                    }
                    "counters" => {
                        let counter = args.first().map(|s| s.trim()).unwrap_or_default();
                        let separator = args.get(1).map(|s| unquote(s)).unwrap_or_default();
                        let list_style = args.get(2).map(|s| s.trim()).unwrap_or("decimal");
                        text.push_str(&format_list(
                            &ctx.counters.values(counter),
                            &separator,
                            list_style,
                        ));
                    }
                    other => log::debug!("string-set ignores '{other}()'"),
                },
                Token::Ident(other) => log::debug!("string-set ignores '{other}'"),
            }
        }
        out.push((name.to_string(), text));
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
