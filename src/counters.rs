use std::collections::HashMap;

// CSS counters scoped by tree nesting.
// A counter instantiated by an element lives in the scope of that
// element's parent, so following siblings and their descendants see it
// (`h1 { counter-reset: section }` followed by `h2 { counter-increment:
// section }`). Popping the parent's scope drops the instance.
#[derive(Debug, Default, Clone)]
pub struct CounterManager {
    values: HashMap<String, Vec<i32>>,
    scopes: Vec<Vec<String>>,
    targets: HashMap<String, HashMap<String, Vec<i32>>>,
    seeded: HashMap<String, HashMap<String, Vec<i32>>>,
    quote_depth: usize,
}

impl CounterManager {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
            ..Self::default()
        }
    }

    pub fn reset_all(&mut self) {
        *self = Self::new();
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() <= 1 {
            return;
        }
        if let Some(names) = self.scopes.pop() {
            for name in names {
                if let Some(stack) = self.values.get_mut(&name) {
                    stack.pop();
                    if stack.is_empty() {
                        self.values.remove(&name);
                    }
                }
            }
        }
    }

    fn owner_scope(&mut self) -> &mut Vec<String> {
        let len = self.scopes.len();
        let index = len.saturating_sub(2);
        if self.scopes.is_empty() {
            self.scopes.push(Vec::new());
        }
        &mut self.scopes[index]
    }

    pub fn reset(&mut self, name: &str, value: i32) {
        let already_here = self.owner_scope().iter().any(|n| n == name);
        if already_here {
            if let Some(top) = self.values.get_mut(name).and_then(|stack| stack.last_mut()) {
                *top = value;
                return;
            }
        }
        self.owner_scope().push(name.to_string());
        self.values.entry(name.to_string()).or_default().push(value);
    }

    pub fn increment(&mut self, name: &str, by: i32) {
        if !self.values.contains_key(name) {
            self.reset(name, 0);
        }
        if let Some(top) = self.values.get_mut(name).and_then(|stack| stack.last_mut()) {
            *top = top.saturating_add(by);
        }
    }

    pub fn set(&mut self, name: &str, value: i32) {
        match self.values.get_mut(name).and_then(|stack| stack.last_mut()) {
            Some(top) => *top = value,
            None => self.reset(name, value),
        }
    }

    pub fn value(&self, name: &str) -> i32 {
        self.values
            .get(name)
            .and_then(|stack| stack.last().copied())
            .unwrap_or(0)
    }

    pub fn values(&self, name: &str) -> Vec<i32> {
        self.values.get(name).cloned().unwrap_or_default()
    }

    pub fn record_target(&mut self, id: &str) {
        self.targets.insert(id.to_string(), self.values.clone());
    }

    pub fn target_values(&self, id: &str, name: &str) -> Option<Vec<i32>> {
        let snapshot = self.targets.get(id).or_else(|| self.seeded.get(id))?;
        Some(snapshot.get(name).cloned().unwrap_or_default())
    }

    pub fn take_targets(&mut self) -> HashMap<String, HashMap<String, Vec<i32>>> {
        std::mem::take(&mut self.targets)
    }

    pub fn seed_targets(&mut self, targets: HashMap<String, HashMap<String, Vec<i32>>>) {
        self.seeded = targets;
    }

    pub fn open_quote(&mut self) -> usize {
        let depth = self.quote_depth;
        self.quote_depth += 1;
        depth
    }

    pub fn close_quote(&mut self) -> Option<usize> {
        if self.quote_depth == 0 {
            return None;
        }
        self.quote_depth -= 1;
        Some(self.quote_depth)
    }

    // Applies `counter-reset`, `counter-set` and `counter-increment`
    // values in that order. `page` and `pages` are page-level and skipped.
    pub fn apply(&mut self, reset: &str, set: &str, increment: &str, list_item: bool) {
        for (name, value) in parse_counter_list(reset, 0) {
            if !is_page_counter(&name) {
                self.reset(&name, value);
            }
        }
        for (name, value) in parse_counter_list(set, 0) {
            if !is_page_counter(&name) {
                self.set(&name, value);
            }
        }
        let increments = parse_counter_list(increment, 1);
        let explicit_list_item = increments.iter().any(|(name, _)| name == "list-item");
        for (name, value) in increments {
            if !is_page_counter(&name) {
                self.increment(&name, value);
            }
        }
        if list_item && !explicit_list_item {
            self.increment("list-item", 1);
        }
    }
}

fn is_page_counter(name: &str) -> bool {
    name == "page" || name == "pages"
}

pub fn parse_counter_list(value: &str, default: i32) -> Vec<(String, i32)> {
    let mut out: Vec<(String, i32)> = Vec::new();
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return out;
    }
    for token in value.split_whitespace() {
        if let Ok(number) = token.parse::<i32>() {
            if let Some(last) = out.last_mut() {
                last.1 = number;
            }
            continue;
        }
        out.push((token.to_string(), default));
    }
    out
}

pub fn format_counter(value: i32, style: &str) -> String {
    match style.trim().to_ascii_lowercase().as_str() {
        "none" => String::new(),
        "disc" => "\u{2022}".to_string(),
        "circle" => "\u{25e6}".to_string(),
        "square" => "\u{25aa}".to_string(),
        "decimal-leading-zero" => {
            if (0..10).contains(&value) {
                format!("0{value}")
            } else {
                value.to_string()
            }
        }
        "lower-roman" => to_roman(value).to_ascii_lowercase(),
        "upper-roman" => to_roman(value),
        "lower-alpha" | "lower-latin" => to_alphabetic(value, b'a', 26),
        "upper-alpha" | "upper-latin" => to_alphabetic(value, b'A', 26),
        "lower-greek" => to_greek(value),
        _ => value.to_string(),
    }
}

fn to_roman(value: i32) -> String {
    if !(1..4000).contains(&value) {
        return value.to_string();
    }
    const TABLE: [(i32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut remaining = value;
    let mut out = String::new();
    for (amount, digits) in TABLE {
        while remaining >= amount {
            out.push_str(digits);
            remaining -= amount;
        }
    }
    out
}

fn to_alphabetic(value: i32, first: u8, radix: i32) -> String {
    if value < 1 {
        return value.to_string();
    }
    let mut n = value;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push((first + (n % radix) as u8) as char);
        n /= radix;
    }
    out.iter().rev().collect()
}

fn to_greek(value: i32) -> String {
    const LETTERS: [char; 24] = [
        'α', 'β', 'γ', 'δ', 'ε', 'ζ', 'η', 'θ', 'ι', 'κ', 'λ', 'μ', 'ν', 'ξ', 'ο', 'π', 'ρ', 'σ',
        'τ', 'υ', 'φ', 'χ', 'ψ', 'ω',
    ];
    if value < 1 {
        return value.to_string();
    }
    let mut n = value;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(LETTERS[(n % 24) as usize]);
        n /= 24;
    }
    out.iter().rev().collect()
}
