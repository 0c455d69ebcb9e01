use base64::Engine;
use image::GenericImageView;
use std::collections::HashMap;
use std::sync::Arc;

// Fetches external resources (`url()` images, `@font-face` sources) by URI.
// Returning `None` means the resource is unavailable; the caller logs and
// carries on without it.
pub trait ResourceResolver {
    fn resolve(&self, uri: &str) -> Option<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriResolver;

impl ResourceResolver for DataUriResolver {
    fn resolve(&self, uri: &str) -> Option<Vec<u8>> {
        parse_data_uri_bytes(uri).map(|(_, data)| data)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryResourceResolver {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, data: Vec<u8>) {
        self.entries.insert(uri.into(), data);
    }

    pub fn with(mut self, uri: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(uri, data);
        self
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve(&self, uri: &str) -> Option<Vec<u8>> {
        if let Some(data) = self.entries.get(uri) {
            return Some(data.clone());
        }
        parse_data_uri_bytes(uri).map(|(_, data)| data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    pub uri: String,
    pub width_px: u32,
    pub height_px: u32,
    pub data: Arc<Vec<u8>>,
}

impl ImageResource {
    pub fn load(resolver: &dyn ResourceResolver, uri: &str) -> Option<ImageResource> {
        let Some(data) = resolver.resolve(uri) else {
            log::warn!("unresolved image resource {}", abbreviate(uri));
            return None;
        };
        let Ok(decoded) = image::load_from_memory(&data) else {
            log::warn!("undecodable image resource {}", abbreviate(uri));
            return None;
        };
        let (width_px, height_px) = decoded.dimensions();
        Some(ImageResource {
            uri: uri.to_string(),
            width_px,
            height_px,
            data: Arc::new(data),
        })
    }
}

fn abbreviate(uri: &str) -> String {
    if uri.len() <= 64 {
        return uri.to_string();
    }
    let mut end = 64;
    while !uri.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &uri[..end])
}

pub(crate) fn parse_data_uri_bytes(uri: &str) -> Option<(String, Vec<u8>)> {
    if !uri.starts_with("data:") {
        return None;
    }
    let (header, payload) = uri.split_once(',')?;
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim().as_bytes())
            .ok()?
    } else {
        decode_percent_encoded_bytes(payload)?
    };
    Some((mime, data))
}

fn decode_percent_encoded_bytes(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([255, 0, 0]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn data_uri_base64_and_percent() {
        let resolver = DataUriResolver;
        assert_eq!(
            resolver.resolve("data:text/plain;base64,aGk="),
            Some(b"hi".to_vec())
        );
        assert_eq!(
            resolver.resolve("data:text/plain,a%20b"),
            Some(b"a b".to_vec())
        );
        assert_eq!(resolver.resolve("https://example.com/x.png"), None);
    }

    #[test]
    fn memory_resolver_probes_image_size() {
        let resolver = MemoryResourceResolver::new().with("logo.png", tiny_png());
        let image = ImageResource::load(&resolver, "logo.png").expect("image");
        assert_eq!((image.width_px, image.height_px), (3, 2));
        assert!(ImageResource::load(&resolver, "missing.png").is_none());
    }
}
