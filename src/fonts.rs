use crate::error::PagemillError;
use crate::types::Pt;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
}

impl StandardFamily {
    fn from_generic(name: &str) -> Option<Self> {
        match name {
            "helvetica" | "arial" | "sans-serif" | "system-ui" | "verdana" => {
                Some(StandardFamily::Helvetica)
            }
            "times" | "times new roman" | "times-roman" | "serif" | "georgia" => {
                Some(StandardFamily::Times)
            }
            "courier" | "courier new" | "monospace" => Some(StandardFamily::Courier),
            _ => None,
        }
    }

    pub fn pdf_name(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (StandardFamily::Helvetica, false, false) => "Helvetica",
            (StandardFamily::Helvetica, true, false) => "Helvetica-Bold",
            (StandardFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (StandardFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (StandardFamily::Times, false, false) => "Times-Roman",
            (StandardFamily::Times, true, false) => "Times-Bold",
            (StandardFamily::Times, false, true) => "Times-Italic",
            (StandardFamily::Times, true, true) => "Times-BoldItalic",
            (StandardFamily::Courier, false, false) => "Courier",
            (StandardFamily::Courier, true, false) => "Courier-Bold",
            (StandardFamily::Courier, false, true) => "Courier-Oblique",
            (StandardFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    fn char_width(self, ch: char, bold: bool) -> u16 {
        let base = match self {
            StandardFamily::Courier => return 600,
            _ => {
                let code = ch as u32;
                if (32..=126).contains(&code) {
                    HELVETICA_WIDTHS[(code - 32) as usize]
                } else {
                    556
                }
            }
        };
        let base = if self == StandardFamily::Times {
            (base as u32 * 92 / 100) as u16
        } else {
            base
        };
        if bold {
            (base as u32 * 105 / 100) as u16
        } else {
            base
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontChoice {
    pub pdf_name: &'static str,
    pub family: StandardFamily,
    pub bold: bool,
    pub registered: Option<usize>,
}

#[derive(Debug)]
pub struct RegisteredFont {
    pub name: String,
    pub data: Vec<u8>,
    metrics: FontMetrics,
}

#[derive(Debug)]
struct FontMetrics {
    first_char: u8,
    last_char: u8,
    widths: Vec<u16>,
    missing_width: u16,
    ascent: i16,
    descent: i16,
    line_gap: i16,
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let widths = build_widths(face, scale, first_char, last_char);
        let missing_width = widths.first().copied().unwrap_or(500);
        Self {
            first_char,
            last_char,
            widths,
            missing_width,
            ascent: scale_i16(face.ascender(), scale),
            descent: scale_i16(face.descender(), scale),
            line_gap: scale_i16(face.line_gap(), scale),
        }
    }

    fn advance_for_char(&self, ch: char) -> u16 {
        let code = ch as u32;
        let first = self.first_char as u32;
        let last = self.last_char as u32;
        if code < first || code > last {
            return self.missing_width;
        }
        let idx = (code - first) as usize;
        self.widths.get(idx).copied().unwrap_or(self.missing_width)
    }

    fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let total_units: i32 = text
            .chars()
            .map(|ch| self.advance_for_char(ch) as i32)
            .fold(0i32, |acc, adv| acc.saturating_add(adv));
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }

    fn line_height(&self, font_size: Pt) -> Pt {
        let height_1000 = self.ascent as i32 - self.descent as i32 + self.line_gap as i32;
        if height_1000 <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(height_1000, 1000)
    }
}

#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    standard_fonts: bool,
}

impl FontRegistry {
    pub fn new(standard_fonts: bool) -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            standard_fonts,
        }
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String, PagemillError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let source = path
            .file_stem()
            .and_then(|v| v.to_str())
            .unwrap_or("EmbeddedFont")
            .to_string();
        self.register_bytes(data, Some(&source))
    }

    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, PagemillError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(PagemillError::InvalidConfiguration(format!(
                "invalid font data for {source}"
            )));
        };

        let (name, aliases) = font_names(&face, source);
        let metrics = FontMetrics::from_face(&face);
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
        });

        let mut all_aliases = Vec::new();
        all_aliases.push(name.clone());
        all_aliases.extend(aliases);
        for alias in all_aliases {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        log::debug!("registered font program {name}");
        Ok(name)
    }

    pub fn ensure_usable(&self) -> Result<(), PagemillError> {
        if !self.standard_fonts && self.fonts.is_empty() {
            return Err(PagemillError::NoUsableFonts);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.fonts.get(*index))
    }

    pub fn select(&self, families: &str, bold: bool, italic: bool) -> FontChoice {
        let mut generic = None;
        for family in split_families(families) {
            let key = normalize_name(&family);
            if let Some(index) = self.lookup.get(&key).copied() {
                let family = generic.unwrap_or(StandardFamily::Helvetica);
                return FontChoice {
                    pdf_name: family.pdf_name(bold, italic),
                    family,
                    bold,
                    registered: Some(index),
                };
            }
            if generic.is_none() {
                generic = StandardFamily::from_generic(&key);
            }
        }
        let family = generic.unwrap_or(StandardFamily::Helvetica);
        let registered = if self.standard_fonts || self.fonts.is_empty() {
            None
        } else {
            Some(0)
        };
        FontChoice {
            pdf_name: family.pdf_name(bold, italic),
            family,
            bold,
            registered,
        }
    }

    pub fn measure(&self, choice: &FontChoice, font_size: Pt, text: &str) -> Pt {
        if let Some(font) = choice.registered.and_then(|index| self.fonts.get(index)) {
            return font.metrics.measure_text_width(font_size, text);
        }
        let units: i32 = text
            .chars()
            .map(|ch| choice.family.char_width(ch, choice.bold) as i32)
            .fold(0i32, |acc, adv| acc.saturating_add(adv));
        font_size.mul_ratio(units, 1000)
    }

    pub fn line_height(&self, choice: &FontChoice, font_size: Pt) -> Pt {
        if let Some(font) = choice.registered.and_then(|index| self.fonts.get(index)) {
            let height = font.metrics.line_height(font_size);
            if height > Pt::ZERO {
                return height;
            }
        }
        font_size * 1.2f32
    }
}

fn split_families(families: &str) -> Vec<String> {
    families
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn build_widths(face: &ttf_parser::Face<'_>, scale: f32, first: u8, last: u8) -> Vec<u16> {
    let mut widths = Vec::with_capacity((last - first) as usize + 1);
    for code in first..=last {
        let width = char::from_u32(code as u32)
            .and_then(|ch| face.glyph_index(ch))
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(0);
        let scaled = (width as f32 * scale).round() as i32;
        widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
    }
    widths
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, source: &str) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .unwrap_or_else(|| source.to_string());

    let mut aliases = Vec::new();
    for candidate in [family, full, post, Some(source.to_string())]
        .into_iter()
        .flatten()
    {
        if candidate != primary {
            aliases.push(candidate);
        }
    }

    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_families_map_to_standard_fonts() {
        let registry = FontRegistry::new(true);
        let choice = registry.select("\"Unknown Face\", serif", true, false);
        assert_eq!(choice.pdf_name, "Times-Bold");
        assert!(choice.registered.is_none());
        let mono = registry.select("monospace", false, true);
        assert_eq!(mono.pdf_name, "Courier-Oblique");
    }

    #[test]
    fn standard_metrics_measure_ascii() {
        let registry = FontRegistry::new(true);
        let choice = registry.select("sans-serif", false, false);
        let width = registry.measure(&choice, Pt::from_i32(10), "ab");
        // a=556, b=556
        assert_eq!(width.to_milli_i64(), 11_120);
        let courier = registry.select("monospace", false, false);
        assert_eq!(
            registry.measure(&courier, Pt::from_i32(10), "iii").to_milli_i64(),
            18_000
        );
    }

    #[test]
    fn zero_fonts_is_fatal() {
        let registry = FontRegistry::new(false);
        assert!(matches!(
            registry.ensure_usable(),
            Err(PagemillError::NoUsableFonts)
        ));
        assert!(FontRegistry::new(true).ensure_usable().is_ok());
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut registry = FontRegistry::new(true);
        let err = registry
            .register_bytes(vec![0, 1, 2, 3], Some("broken"))
            .expect_err("garbage is not a font");
        assert!(err.to_string().contains("broken"));
        assert!(registry.is_empty());
    }
}
