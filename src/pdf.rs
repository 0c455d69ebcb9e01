use crate::canvas::{Command, Document, Page};
use crate::error::PagemillError;
use crate::metadata::DocumentMetadata;
use crate::outline::OutlineEntry;
use crate::render::PlacedDestination;
use crate::resources::ImageResource;
use crate::types::{Color, Pt};
use fixed::types::I32F32;
use image::GenericImageView;
use lopdf::{dictionary, Dictionary, Document as LoDocument, Object, ObjectId, Stream};
use std::collections::BTreeMap;

const PRODUCER: &str = concat!("pagemill ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy)]
pub struct PdfInput<'a> {
    pub document: &'a Document,
    pub metadata: &'a DocumentMetadata,
    pub outlines: &'a [OutlineEntry],
    pub destinations: &'a [PlacedDestination],
}

pub fn write_pdf(input: PdfInput<'_>) -> Result<Vec<u8>, PagemillError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_names = collect_font_names(input.document);
    let mut font_resources = Dictionary::new();
    let mut font_keys = BTreeMap::new();
    for (idx, name) in font_names.iter().enumerate() {
        let key = format!("F{}", idx + 1);
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(name.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });
        font_resources.set(key.as_bytes().to_vec(), font_id);
        font_keys.insert(name.clone(), key);
    }

    let mut image_resources = Dictionary::new();
    let mut image_keys = BTreeMap::new();
    for (id, resource) in &input.document.images {
        let Some(object_id) = add_image(&mut doc, resource) else {
            continue;
        };
        let key = sanitize_name(id);
        image_resources.set(key.as_bytes().to_vec(), object_id);
        image_keys.insert(id.clone(), key);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => font_resources,
        "XObject" => image_resources,
    });

    let mut page_ids = Vec::with_capacity(input.document.pages.len());
    for (index, page) in input.document.pages.iter().enumerate() {
        let content = render_page(page, &font_keys, &image_keys);
        log::trace!("page {} content stream: {} bytes", index + 1, content.len());
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let media_width = page.size.width + page.bleed * 2;
        let media_height = page.size.height + page.bleed * 2;
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => rect_array(Pt::ZERO, Pt::ZERO, media_width, media_height),
        };
        if page.bleed > Pt::ZERO {
            page_dict.set("BleedBox", rect_array(Pt::ZERO, Pt::ZERO, media_width, media_height));
            page_dict.set(
                "TrimBox",
                rect_array(
                    page.bleed,
                    page.bleed,
                    page.size.width + page.bleed,
                    page.size.height + page.bleed,
                ),
            );
        }
        page_ids.push(doc.add_object(page_dict));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };

    let mut dests = Dictionary::new();
    for destination in input.destinations {
        if let Some(target) = destination_array(input.document, &page_ids, destination) {
            if !dests.has(destination.name.as_bytes()) {
                dests.set(destination.name.as_bytes().to_vec(), target);
            }
        }
    }
    if !dests.is_empty() {
        let dests_id = doc.add_object(dests);
        catalog.set("Dests", dests_id);
    }

    if let Some(outlines_id) = add_outlines(&mut doc, input, &page_ids) {
        catalog.set("Outlines", outlines_id);
        catalog.set("PageMode", "UseOutlines");
    }
    if let Some(language) = &input.metadata.language {
        catalog.set("Lang", Object::string_literal(language.as_str()));
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(info_dictionary(input.metadata));
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    log::debug!(
        "pdf written: {} pages, {} fonts, {} images, {} bytes",
        page_ids.len(),
        font_names.len(),
        image_keys.len(),
        out.len()
    );
    Ok(out)
}

fn collect_font_names(document: &Document) -> Vec<String> {
    let mut names = Vec::new();
    for page in &document.pages {
        let mut current = "Helvetica".to_string();
        for command in &page.commands {
            match command {
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { .. } => {
                    if !names.contains(&current) {
                        names.push(current.clone());
                    }
                }
                _ => {}
            }
        }
    }
    names
}

fn info_dictionary(metadata: &DocumentMetadata) -> Dictionary {
    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    };
    for (key, value) in [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Subject", &metadata.subject),
        ("Keywords", &metadata.keywords),
        ("Creator", &metadata.creator),
    ] {
        if let Some(value) = value {
            info.set(key, Object::string_literal(value.as_str()));
        }
    }
    info
}

fn destination_array(
    document: &Document,
    page_ids: &[ObjectId],
    destination: &PlacedDestination,
) -> Option<Object> {
    let page_id = *page_ids.get(destination.page)?;
    let page = document.pages.get(destination.page)?;
    let top = page.size.height - destination.y + page.bleed;
    Some(Object::Array(vec![
        page_id.into(),
        "XYZ".into(),
        Object::Null,
        pt_object(top),
        Object::Null,
    ]))
}

fn add_outlines(doc: &mut LoDocument, input: PdfInput<'_>, page_ids: &[ObjectId]) -> Option<ObjectId> {
    let mut items = Vec::new();
    for entry in input.outlines {
        let Some(destination) = input
            .destinations
            .iter()
            .find(|destination| destination.name == entry.destination)
        else {
            log::debug!("outline entry '{}' has no placed destination", entry.title);
            continue;
        };
        let Some(target) = destination_array(input.document, page_ids, destination) else {
            continue;
        };
        items.push((entry, target));
    }
    if items.is_empty() {
        return None;
    }

    // parent index per item, None for top level
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(items.len());
    let mut stack: Vec<(u8, usize)> = Vec::new();
    for (idx, (entry, _)) in items.iter().enumerate() {
        while stack.last().is_some_and(|(level, _)| *level >= entry.level) {
            stack.pop();
        }
        parents.push(stack.last().map(|(_, parent)| *parent));
        stack.push((entry.level, idx));
    }

    let root_id = doc.new_object_id();
    let ids: Vec<ObjectId> = items.iter().map(|_| doc.new_object_id()).collect();
    let children_of = |parent: Option<usize>| -> Vec<usize> {
        (0..items.len()).filter(|idx| parents[*idx] == parent).collect()
    };
    let mut descendants = vec![0i64; items.len()];
    for idx in (0..items.len()).rev() {
        if let Some(parent) = parents[idx] {
            descendants[parent] += descendants[idx] + 1;
        }
    }

    for (idx, (entry, target)) in items.iter().enumerate() {
        let mut item = dictionary! {
            "Title" => Object::string_literal(entry.title.as_str()),
            "Parent" => parents[idx].map(|parent| ids[parent]).unwrap_or(root_id),
            "Dest" => target.clone(),
        };
        let siblings = children_of(parents[idx]);
        if let Some(pos) = siblings.iter().position(|sibling| *sibling == idx) {
            if pos > 0 {
                item.set("Prev", ids[siblings[pos - 1]]);
            }
            if let Some(next) = siblings.get(pos + 1) {
                item.set("Next", ids[*next]);
            }
        }
        let children = children_of(Some(idx));
        if let (Some(first), Some(last)) = (children.first(), children.last()) {
            item.set("First", ids[*first]);
            item.set("Last", ids[*last]);
            item.set("Count", descendants[idx]);
        }
        doc.objects.insert(ids[idx], Object::Dictionary(item));
    }

    let top = children_of(None);
    let mut root = dictionary! {
        "Type" => "Outlines",
        "Count" => items.len() as i64,
    };
    if let (Some(first), Some(last)) = (top.first(), top.last()) {
        root.set("First", ids[*first]);
        root.set("Last", ids[*last]);
    }
    doc.objects.insert(root_id, Object::Dictionary(root));
    Some(root_id)
}

fn add_image(doc: &mut LoDocument, resource: &ImageResource) -> Option<ObjectId> {
    let data = resource.data.as_slice();
    let decoded = match image::load_from_memory(data) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::warn!("image {} skipped: {}", resource.uri, err);
            return None;
        }
    };
    let (width, height) = decoded.dimensions();
    let is_jpeg = data.starts_with(&[0xFF, 0xD8]);
    let color = decoded.color();
    if is_jpeg && !color.has_alpha() && matches!(color.channel_count(), 1 | 3) {
        let color_space = if color.channel_count() == 1 {
            "DeviceGray"
        } else {
            "DeviceRGB"
        };
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            data.to_vec(),
        );
        stream.allows_compression = false;
        return Some(doc.add_object(stream));
    }

    let smask = if color.has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|pixel| pixel.0[3]).collect();
        Some(doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            },
            alpha,
        )))
    } else {
        None
    };
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8i64,
    };
    if let Some(smask) = smask {
        dict.set("SMask", smask);
    }
    Some(doc.add_object(Stream::new(dict, decoded.to_rgb8().into_raw())))
}

// Content stream for one page. Canvas coordinates are top-left; the
// stream flips them and shifts everything by the bleed.
fn render_page(
    page: &Page,
    font_keys: &BTreeMap<String, String>,
    image_keys: &BTreeMap<String, String>,
) -> String {
    let page_height = page.size.height;
    let mut out = String::new();
    let mut current_font_size = Pt::from_f32(12.0);
    let mut current_font_name = "Helvetica".to_string();
    let mut path_open = false;

    out.push_str("q\n");
    if page.bleed > Pt::ZERO {
        out.push_str(&format!("1 0 0 1 {} {} cm\n", fmt_pt(page.bleed), fmt_pt(page.bleed)));
    }
    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::SetFillColor(color) => out.push_str(&color_op(*color, "rg")),
            Command::SetStrokeColor(color) => out.push_str(&color_op(*color, "RG")),
            Command::SetLineWidth(width) => out.push_str(&format!("{} w\n", fmt_pt(*width))),
            Command::SetFontName(name) => current_font_name = name.clone(),
            Command::SetFontSize(size) => current_font_size = *size,
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
                path_open = true;
            }
            Command::LineTo { x, y } => {
                if path_open {
                    out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
                }
            }
            Command::Stroke => {
                if path_open {
                    out.push_str("S\n");
                    path_open = false;
                }
            }
            Command::DrawString { x, y, text } => {
                let Some(key) = font_keys.get(&current_font_name) else {
                    continue;
                };
                let encoded = encode_winansi_pdf_string(text);
                if encoded.replaced > 0 {
                    log::debug!(
                        "{} characters outside WinAnsi replaced in '{}'",
                        encoded.replaced,
                        text
                    );
                }
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", key, fmt_pt(current_font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - current_font_size)
                ));
                out.push_str(&format!("({}) Tj\nET\n", encoded.text));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re f\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(key) = image_keys.get(resource_id) else {
                    continue;
                };
                let draw_y = page_height - *y - *height;
                out.push_str("q\n");
                out.push_str(&format!(
                    "{} 0 0 {} {} {} cm\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(draw_y)
                ));
                out.push_str(&format!("/{} Do\n", key));
                out.push_str("Q\n");
            }
        }
    }
    out.push_str("Q\n");
    out
}

fn color_op(color: Color, op: &str) -> String {
    format!(
        "{} {} {} {}\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b)),
        op
    )
}

fn rect_array(x0: Pt, y0: Pt, x1: Pt, y1: Pt) -> Vec<Object> {
    vec![pt_object(x0), pt_object(y0), pt_object(x1), pt_object(y1)]
}

fn pt_object(value: Pt) -> Object {
    let milli = value.to_milli_i64();
    if milli % 1000 == 0 {
        Object::Integer(milli / 1000)
    } else {
        Object::Real(value.to_f32())
    }
}

fn sanitize_name(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;
    use std::sync::Arc;

    fn page_with_text(text: &str) -> Page {
        let mut canvas = Canvas::new();
        canvas.set_font_name("Courier");
        canvas.set_font_size(Pt::from_i32(10));
        canvas.draw_string(Pt::from_i32(20), Pt::from_i32(30), text);
        let mut page = Page::new(Size::new(Pt::from_i32(200), Pt::from_i32(100)));
        page.commands = canvas.into_commands();
        page
    }

    fn write(document: &Document, outlines: &[OutlineEntry], destinations: &[PlacedDestination]) -> LoDocument {
        let metadata = DocumentMetadata {
            title: Some("Report".to_string()),
            language: Some("en".to_string()),
            ..DocumentMetadata::default()
        };
        let bytes = write_pdf(PdfInput {
            document,
            metadata: &metadata,
            outlines,
            destinations,
        })
        .expect("pdf");
        assert!(bytes.starts_with(b"%PDF-1.7"));
        LoDocument::load_mem(&bytes).expect("load pdf")
    }

    #[test]
    fn text_is_flipped_to_baseline() {
        let document = Document {
            pages: vec![page_with_text("Hi (x)")],
            ..Document::default()
        };
        let doc = write(&document, &[], &[]);
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().expect("page");
        let content = String::from_utf8(doc.get_page_content(page_id).expect("content")).expect("utf8");
        assert!(content.contains("/F1 10 Tf"));
        // 100 - 30 - 10
        assert!(content.contains("20 60 Td"));
        assert!(content.contains("(Hi \\(x\\)) Tj"));
    }

    #[test]
    fn info_and_language_are_written() {
        let document = Document {
            pages: vec![page_with_text("a")],
            ..Document::default()
        };
        let doc = write(&document, &[], &[]);
        let info_id = doc
            .trailer
            .get(b"Info")
            .and_then(|info| info.as_reference())
            .expect("info ref");
        let info = doc.get_dictionary(info_id).expect("info");
        let title = info.get(b"Title").and_then(|t| t.as_str()).expect("title");
        assert_eq!(title, b"Report");
        let catalog = doc.catalog().expect("catalog");
        assert!(catalog.has(b"Lang"));
    }

    #[test]
    fn bleed_extends_media_box() {
        let mut page = page_with_text("a");
        page.bleed = Pt::from_i32(6);
        let document = Document {
            pages: vec![page],
            ..Document::default()
        };
        let doc = write(&document, &[], &[]);
        let page_id = *doc.get_pages().values().next().expect("page");
        let dict = doc.get_dictionary(page_id).expect("page dict");
        let media = dict.get(b"MediaBox").and_then(|m| m.as_array()).expect("media box");
        assert_eq!(media[2].as_i64().expect("width"), 212);
        assert!(dict.has(b"TrimBox"));
    }

    #[test]
    fn outlines_nest_by_level() {
        let document = Document {
            pages: vec![page_with_text("a"), page_with_text("b")],
            ..Document::default()
        };
        let outlines = vec![
            OutlineEntry {
                title: "One".to_string(),
                level: 1,
                destination: "d-0".to_string(),
            },
            OutlineEntry {
                title: "One.A".to_string(),
                level: 2,
                destination: "d-1".to_string(),
            },
            OutlineEntry {
                title: "Two".to_string(),
                level: 1,
                destination: "d-2".to_string(),
            },
        ];
        let destinations: Vec<PlacedDestination> = ["d-0", "d-1", "d-2"]
            .iter()
            .enumerate()
            .map(|(i, name)| PlacedDestination {
                name: name.to_string(),
                page: i / 2,
                y: Pt::from_i32(10),
            })
            .collect();
        let doc = write(&document, &outlines, &destinations);
        let catalog = doc.catalog().expect("catalog");
        let root_id = catalog
            .get(b"Outlines")
            .and_then(|o| o.as_reference())
            .expect("outlines");
        let root = doc.get_dictionary(root_id).expect("root");
        assert_eq!(root.get(b"Count").and_then(|c| c.as_i64()).expect("count"), 3);
        let first_id = root.get(b"First").and_then(|f| f.as_reference()).expect("first");
        let first = doc.get_dictionary(first_id).expect("first item");
        assert_eq!(first.get(b"Count").and_then(|c| c.as_i64()).expect("count"), 1);
        assert!(first.has(b"Next"));
        assert!(catalog.has(b"Dests"));
    }

    #[test]
    fn png_images_become_xobjects() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 128]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode png");
        let mut canvas = Canvas::new();
        canvas.draw_image(Pt::ZERO, Pt::ZERO, Pt::from_i32(10), Pt::from_i32(10), "Im1");
        let mut page = Page::new(Size::new(Pt::from_i32(50), Pt::from_i32(50)));
        page.commands = canvas.into_commands();
        let mut document = Document {
            pages: vec![page],
            ..Document::default()
        };
        document.images.insert(
            "Im1".to_string(),
            ImageResource {
                uri: "logo.png".to_string(),
                width_px: 2,
                height_px: 2,
                data: Arc::new(png),
            },
        );
        let doc = write(&document, &[], &[]);
        let page_id = *doc.get_pages().values().next().expect("page");
        let content = String::from_utf8(doc.get_page_content(page_id).expect("content")).expect("utf8");
        assert!(content.contains("/Im1 Do"));
    }

    #[test]
    fn winansi_replaces_unmapped_characters() {
        let encoded = encode_winansi_pdf_string("caf\u{e9} \u{2014} \u{4e2d}");
        assert_eq!(encoded.replaced, 1);
        assert_eq!(encoded.text, "caf\\351 \\227 ?");
    }
}
