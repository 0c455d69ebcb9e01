use crate::dom::{DomTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u16, pub u16, pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoTarget {
    None,
    Before,
    After,
    Placeholder,
}

#[derive(Debug, Clone)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<PseudoClass>,
}

impl SimpleSelector {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let Some(element) = tree.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != &element.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = element.attr("class").unwrap_or("");
            for class in &self.classes {
                if !classes.split_whitespace().any(|c| c == class) {
                    return false;
                }
            }
        }
        for attr in &self.attrs {
            if !attr.matches(element.attr(&attr.name)) {
                return false;
            }
        }
        self.pseudos
            .iter()
            .all(|pseudo_class| pseudo_class.matches(tree, node))
    }

    fn specificity(&self) -> Specificity {
        let mut id_count = self.id.as_ref().map(|_| 1).unwrap_or(0);
        let mut class_count = (self.classes.len() + self.attrs.len()) as u16;
        let mut tag_count = self
            .tag
            .as_ref()
            .filter(|tag| tag.as_str() != "*")
            .map(|_| 1)
            .unwrap_or(0);

        for pseudo in &self.pseudos {
            match pseudo {
                PseudoClass::Not(inner) => {
                    let inner_spec = inner.specificity();
                    id_count += inner_spec.0;
                    class_count += inner_spec.1;
                    tag_count += inner_spec.2;
                }
                PseudoClass::Element(_) => tag_count += 1,
                _ => class_count += 1,
            }
        }

        Specificity(id_count, class_count, tag_count)
    }
}

#[derive(Debug, Clone)]
enum PseudoClass {
    Root,
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    NthChild { a: i32, b: i32, of_type: bool },
    Element(PseudoTarget),
    Unsupported,
    Not(SimpleSelector),
}

impl PseudoClass {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        match self {
            PseudoClass::Root => tree.is_root_element(node),
            PseudoClass::FirstChild => tree.element_position(node, false).0 == 1,
            PseudoClass::LastChild => {
                let (index, count) = tree.element_position(node, false);
                index == count
            }
            PseudoClass::OnlyChild => tree.element_position(node, false).1 == 1,
            PseudoClass::Empty => tree.children(node).iter().all(|child| {
                !tree.is_element(*child) && tree.text_content(*child).is_empty()
            }),
            PseudoClass::NthChild { a, b, of_type } => {
                let idx = tree.element_position(node, *of_type).0 as i32;
                nth_matches(*a, *b, idx)
            }
            // Pseudo-element parts are checked against the resolution target
            // by the caller.
            PseudoClass::Element(_) => true,
            PseudoClass::Unsupported => false,
            PseudoClass::Not(selector) => !selector.matches(tree, node),
        }
    }
}

fn nth_matches(a: i32, b: i32, idx: i32) -> bool {
    if a == 0 {
        return idx == b;
    }
    if a > 0 {
        if idx < b {
            return false;
        }
        (idx - b) % a == 0
    } else {
        if idx > b {
            return false;
        }
        (b - idx) % (-a) == 0
    }
}

#[derive(Debug, Clone)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl AttrSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(value) = actual else {
            return false;
        };
        let Some(expected) = self.value.as_deref() else {
            return self.op == AttrOp::Exists;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => value == expected,
            AttrOp::Includes => value.split_whitespace().any(|part| part == expected),
            AttrOp::DashMatch => value == expected || value.starts_with(&format!("{expected}-")),
            AttrOp::Prefix => value.starts_with(expected),
            AttrOp::Suffix => value.ends_with(expected),
            AttrOp::Substring => value.contains(expected),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone)]
pub struct SelectorPattern {
    parts: Vec<SimpleSelector>,
    combinators: Vec<Combinator>,
}

impl SelectorPattern {
    pub fn parse(selector: &str) -> Option<SelectorPattern> {
        parse_selector_pattern(selector)
    }

    pub fn pseudo_target(&self) -> PseudoTarget {
        self.parts
            .last()
            .and_then(|part| {
                part.pseudos.iter().find_map(|pseudo| match pseudo {
                    PseudoClass::Element(target) => Some(*target),
                    _ => None,
                })
            })
            .unwrap_or(PseudoTarget::None)
    }

    pub fn subject_keys(&self) -> (Option<&str>, Option<&str>, Vec<&str>) {
        let Some(last) = self.parts.last() else {
            return (None, None, Vec::new());
        };
        (
            last.tag.as_deref().filter(|tag| *tag != "*"),
            last.id.as_deref(),
            last.classes.iter().map(|c| c.as_str()).collect(),
        )
    }

    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let Some(last) = self.parts.last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }

        let mut current = node;
        for (idx, part) in self.parts[..self.parts.len() - 1].iter().rev().enumerate() {
            let comb_index = self.combinators.len().saturating_sub(1 + idx);
            let combinator = self
                .combinators
                .get(comb_index)
                .copied()
                .unwrap_or(Combinator::Descendant);
            match combinator {
                Combinator::Child => {
                    let Some(parent) = tree.parent_element(current) else {
                        return false;
                    };
                    if !part.matches(tree, parent) {
                        return false;
                    }
                    current = parent;
                }
                Combinator::Descendant => {
                    let mut cursor = tree.parent_element(current);
                    let mut found = None;
                    while let Some(ancestor) = cursor {
                        if part.matches(tree, ancestor) {
                            found = Some(ancestor);
                            break;
                        }
                        cursor = tree.parent_element(ancestor);
                    }
                    let Some(ancestor) = found else {
                        return false;
                    };
                    current = ancestor;
                }
                Combinator::AdjacentSibling => {
                    let Some(prev) = tree.preceding_element_siblings(current).first().copied()
                    else {
                        return false;
                    };
                    if !part.matches(tree, prev) {
                        return false;
                    }
                    current = prev;
                }
                Combinator::GeneralSibling => {
                    let Some(prev) = tree
                        .preceding_element_siblings(current)
                        .into_iter()
                        .find(|prev| part.matches(tree, *prev))
                    else {
                        return false;
                    };
                    current = prev;
                }
            }
        }
        true
    }

    pub fn specificity(&self) -> Specificity {
        let mut spec = Specificity(0, 0, 0);
        for part in &self.parts {
            let part_spec = part.specificity();
            spec.0 += part_spec.0;
            spec.1 += part_spec.1;
            spec.2 += part_spec.2;
        }
        spec
    }
}

fn parse_selector_pattern(selector: &str) -> Option<SelectorPattern> {
    let selector = selector.trim();
    if selector.is_empty() {
        return None;
    }
    let mut parts: Vec<SimpleSelector> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut buf = String::new();
    let mut pending: Option<Combinator> = None;
    let mut depth = 0usize;
    let mut bracket = false;

    let flush_buf = |buf: &mut String,
                     parts: &mut Vec<SimpleSelector>,
                     combinators: &mut Vec<Combinator>,
                     pending: &mut Option<Combinator>|
     -> Option<()> {
        let trimmed = buf.trim();
        if trimmed.is_empty() {
            buf.clear();
            return Some(());
        }
        let simple = parse_simple_selector(trimmed)?;
        if !parts.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        parts.push(simple);
        buf.clear();
        Some(())
    };

    for ch in selector.chars() {
        if depth > 0 || bracket {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ']' => bracket = false,
                _ => {}
            }
            buf.push(ch);
            continue;
        }
        match ch {
            '(' => {
                depth += 1;
                buf.push(ch);
            }
            '[' => {
                bracket = true;
                buf.push(ch);
            }
            '>' | '+' | '~' => {
                flush_buf(&mut buf, &mut parts, &mut combinators, &mut pending)?;
                pending = Some(match ch {
                    '>' => Combinator::Child,
                    '+' => Combinator::AdjacentSibling,
                    _ => Combinator::GeneralSibling,
                });
            }
            _ if ch.is_whitespace() => {
                if !buf.trim().is_empty() {
                    flush_buf(&mut buf, &mut parts, &mut combinators, &mut pending)?;
                    pending = Some(Combinator::Descendant);
                }
            }
            _ => buf.push(ch),
        }
    }
    flush_buf(&mut buf, &mut parts, &mut combinators, &mut pending)?;

    if parts.is_empty() {
        return None;
    }

    Some(SelectorPattern { parts, combinators })
}

fn parse_simple_selector(selector: &str) -> Option<SimpleSelector> {
    let selector = selector.trim();
    if selector.is_empty() {
        return None;
    }

    let mut base = String::new();
    let mut pseudos_raw: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_pseudo = false;
    for ch in selector.chars() {
        if ch == ':' && depth == 0 {
            if !in_pseudo {
                base = current.clone();
                current.clear();
                in_pseudo = true;
            } else if current.trim().is_empty() {
                continue;
            } else {
                pseudos_raw.push(current.clone());
                current.clear();
            }
            continue;
        }
        if ch == '(' {
            depth += 1;
        } else if ch == ')' {
            depth = depth.saturating_sub(1);
        }
        current.push(ch);
    }
    if in_pseudo {
        if !current.trim().is_empty() {
            pseudos_raw.push(current);
        }
    } else {
        base = current;
    }

    let (base, attrs_raw) = extract_attr_selectors(&base);

    let mut tag = None;
    let mut id = None;
    let mut classes = Vec::new();
    let mut buffer = String::new();
    let mut mode = SelectorPart::Tag;

    for ch in base.chars() {
        match ch {
            '#' => {
                flush_selector_part(&mut mode, &mut buffer, &mut tag, &mut id, &mut classes);
                mode = SelectorPart::Id;
            }
            '.' => {
                flush_selector_part(&mut mode, &mut buffer, &mut tag, &mut id, &mut classes);
                mode = SelectorPart::Class;
            }
            _ => buffer.push(ch),
        }
    }
    flush_selector_part(&mut mode, &mut buffer, &mut tag, &mut id, &mut classes);

    let pseudos: Vec<PseudoClass> = pseudos_raw
        .iter()
        .filter_map(|raw| parse_pseudo_class(raw))
        .collect();
    let attrs: Vec<AttrSelector> = attrs_raw
        .iter()
        .filter_map(|raw| parse_attr_selector(raw))
        .collect();

    if tag.is_none() && id.is_none() && classes.is_empty() && attrs.is_empty() && pseudos.is_empty()
    {
        return None;
    }

    Some(SimpleSelector {
        tag: tag.map(|t| t.to_ascii_lowercase()),
        id,
        classes,
        attrs,
        pseudos,
    })
}

fn extract_attr_selectors(input: &str) -> (String, Vec<String>) {
    let mut base = String::new();
    let mut attrs = Vec::new();
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '[' {
            base.push(ch);
            continue;
        }
        let mut buf = String::new();
        let mut in_quote: Option<char> = None;
        for c in chars.by_ref() {
            if let Some(q) = in_quote {
                if c == q {
                    in_quote = None;
                }
                buf.push(c);
                continue;
            }
            if c == '"' || c == '\'' {
                in_quote = Some(c);
                buf.push(c);
                continue;
            }
            if c == ']' {
                break;
            }
            buf.push(c);
        }
        if !buf.trim().is_empty() {
            attrs.push(buf.trim().to_string());
        }
    }
    (base, attrs)
}

fn parse_attr_selector(raw: &str) -> Option<AttrSelector> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let ops = [
        ("~=", AttrOp::Includes),
        ("|=", AttrOp::DashMatch),
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("*=", AttrOp::Substring),
        ("=", AttrOp::Equals),
    ];
    let mut found: Option<(usize, &str, AttrOp)> = None;
    for (token, op) in ops {
        if let Some(pos) = raw.find(token) {
            if found.map(|(p, _, _)| pos < p).unwrap_or(true) {
                found = Some((pos, token, op));
            }
        }
    }

    let (name, op, value) = match found {
        Some((pos, token, op)) => {
            let value_raw = raw[pos + token.len()..].trim();
            let value = value_raw
                .split_whitespace()
                .next()
                .unwrap_or(value_raw)
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            (&raw[..pos], op, Some(value))
        }
        None => (raw, AttrOp::Exists, None),
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(AttrSelector { name, op, value })
}

fn parse_pseudo_class(raw: &str) -> Option<PseudoClass> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("not(") {
        let args = args.trim_end_matches(')').trim();
        let inner = parse_simple_selector(args)?;
        return Some(PseudoClass::Not(inner));
    }
    for (prefix, of_type) in [("nth-child(", false), ("nth-of-type(", true)] {
        if let Some(args) = lower.strip_prefix(prefix) {
            let args = args.trim_end_matches(')').trim();
            let (a, b) = match args {
                "even" => (2, 0),
                "odd" => (2, 1),
                other => parse_nth_formula(other)?,
            };
            return Some(PseudoClass::NthChild { a, b, of_type });
        }
    }
    Some(match lower.as_str() {
        "root" => PseudoClass::Root,
        "first-child" => PseudoClass::FirstChild,
        "last-child" => PseudoClass::LastChild,
        "only-child" => PseudoClass::OnlyChild,
        "first-of-type" => PseudoClass::NthChild {
            a: 0,
            b: 1,
            of_type: true,
        },
        "empty" => PseudoClass::Empty,
        "before" => PseudoClass::Element(PseudoTarget::Before),
        "after" => PseudoClass::Element(PseudoTarget::After),
        "placeholder" => PseudoClass::Element(PseudoTarget::Placeholder),
        _ => PseudoClass::Unsupported,
    })
}

fn parse_nth_formula(raw: &str) -> Option<(i32, i32)> {
    let s = raw.replace(' ', "").to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }
    if !s.contains('n') {
        let b = s.parse::<i32>().ok()?;
        return Some((0, b));
    }
    let n_pos = s.find('n')?;
    let (a_str, b_str) = s.split_at(n_pos);
    let b_str = b_str.trim_start_matches('n');
    let a = match a_str {
        "" | "+" => 1,
        "-" => -1,
        other => other.parse::<i32>().ok()?,
    };
    let b = if b_str.is_empty() {
        0
    } else {
        b_str.trim_start_matches('+').parse::<i32>().ok()?
    };
    Some((a, b))
}

enum SelectorPart {
    Tag,
    Id,
    Class,
}

fn flush_selector_part(
    mode: &mut SelectorPart,
    buffer: &mut String,
    tag: &mut Option<String>,
    id: &mut Option<String>,
    classes: &mut Vec<String>,
) {
    if buffer.is_empty() {
        return;
    }
    let value = std::mem::take(buffer);
    match mode {
        SelectorPart::Tag => *tag = Some(value),
        SelectorPart::Id => *id = Some(value),
        SelectorPart::Class => classes.push(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DomTree {
        DomTree::parse_html(
            "<body><div id=main class='box wide'><h2>A</h2><p lang=en-US>one</p><p>two</p></div></body>",
        )
    }

    #[test]
    fn compound_and_combinators() {
        let tree = tree();
        let ps = tree.find_all("p");
        let pattern = SelectorPattern::parse("div#main.box > p").expect("parse");
        assert!(pattern.matches(&tree, ps[0]));
        let pattern = SelectorPattern::parse("h2 + p").expect("parse");
        assert!(pattern.matches(&tree, ps[0]));
        assert!(!pattern.matches(&tree, ps[1]));
        let pattern = SelectorPattern::parse("h2 ~ p:last-child").expect("parse");
        assert!(pattern.matches(&tree, ps[1]));
        let pattern = SelectorPattern::parse("body p[lang|=en]").expect("parse");
        assert!(pattern.matches(&tree, ps[0]));
        assert!(!pattern.matches(&tree, ps[1]));
    }

    #[test]
    fn specificity_counts_ids_classes_tags() {
        let pattern = SelectorPattern::parse("div#main.box > p::before").expect("parse");
        assert_eq!(pattern.specificity(), Specificity(1, 1, 3));
        assert_eq!(pattern.pseudo_target(), PseudoTarget::Before);
        let plain = SelectorPattern::parse("p:nth-child(2n+1)").expect("parse");
        assert_eq!(plain.pseudo_target(), PseudoTarget::None);
        assert_eq!(plain.specificity(), Specificity(0, 1, 1));
    }

    #[test]
    fn nth_and_not() {
        let tree = tree();
        let ps = tree.find_all("p");
        let odd = SelectorPattern::parse("p:nth-of-type(odd)").expect("parse");
        assert!(odd.matches(&tree, ps[0]));
        assert!(!odd.matches(&tree, ps[1]));
        let not = SelectorPattern::parse("p:not([lang])").expect("parse");
        assert!(!not.matches(&tree, ps[0]));
        assert!(not.matches(&tree, ps[1]));
    }
}
