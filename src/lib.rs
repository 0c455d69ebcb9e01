mod canvas;
mod content;
mod counters;
mod css_values;
mod dispatch;
mod dom;
mod error;
mod fonts;
mod handler;
mod layout;
mod margin_box;
mod metadata;
mod outline;
mod page_context;
mod pdf;
mod render;
mod resources;
mod running;
mod selector;
mod style;
mod stylesheet;
mod types;
mod typeset;

pub use canvas::{Canvas, Command, Document, Page};
pub use dispatch::ConversionContext;
pub use dom::{DomTree, NodeId, OccurrencePolicy};
pub use error::PagemillError;
pub use handler::{ElementHandler, HandlerFactory, HandlerInput, HandlerRegistry};
pub use layout::{property, BreakPolicy, LayoutElement, LayoutKind, PropertyMap, PropertyValue};
pub use margin_box::{layout_margin_boxes, MarginBoxGeometry, MarginBoxInput, MarginBoxSlot};
pub use metadata::DocumentMetadata;
pub use outline::{OutlineCollector, OutlineEntry, OutlineSink};
pub use page_context::{PageClass, PageContext, PageSide};
pub use render::PlacedDestination;
pub use resources::{DataUriResolver, ImageResource, MemoryResourceResolver, ResourceResolver};
pub use style::StyleMap;
pub use stylesheet::{MediaDevice, MediaKind};
pub use types::{Color, Margins, Pt, Rect, Size};

use dispatch::Dispatcher;
use fonts::FontRegistry;
use page_context::PageContextProcessor;
use pdf::PdfInput;
use render::Renderer;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use style::StyleResolver;

const DEFAULT_OUTLINE_PREFIX: &str = "pagemill-dest-";

#[derive(Debug)]
pub struct ConversionResult {
    pub document: Document,
    pub root: LayoutElement,
    pub destinations: Vec<PlacedDestination>,
    pub metadata: DocumentMetadata,
    pub outlines: Vec<OutlineEntry>,
    pub passes: usize,
    pub converged: bool,
}

// HTML/CSS to paged media converter. One instance runs one conversion at
// a time and reuses its conversion state across calls.
pub struct Pagemill {
    media: MediaDevice,
    max_relayout_passes: usize,
    fonts: FontRegistry,
    resources: Box<dyn ResourceResolver>,
    outline_sink: Box<dyn OutlineSink>,
    handlers: HandlerRegistry,
    metadata: DocumentMetadata,
    context: ConversionContext,
    pages: PageContextProcessor,
    in_progress: Rc<Cell<bool>>,
}

struct ConversionGuard(Rc<Cell<bool>>);

impl ConversionGuard {
    fn acquire(flag: &Rc<Cell<bool>>) -> Result<Self, PagemillError> {
        if flag.replace(true) {
            return Err(PagemillError::Reentrant);
        }
        Ok(Self(flag.clone()))
    }
}

impl Drop for ConversionGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Pagemill {
    pub fn builder() -> PagemillBuilder {
        PagemillBuilder::new()
    }

    pub fn convert(&mut self, html: &str, css: &str) -> Result<ConversionResult, PagemillError> {
        let _guard = ConversionGuard::acquire(&self.in_progress)?;
        self.fonts.ensure_usable()?;
        self.context.reset();

        let mut tree = DomTree::parse_html(html);
        let resolver = StyleResolver::new(css, &self.media);
        self.load_font_faces(&resolver);
        self.context.metadata = DocumentMetadata::from_tree(&tree).merged_with(&self.metadata);

        let dispatcher = Dispatcher::new(&resolver, &self.handlers, self.resources.as_ref());
        let document_node = tree.root();
        let mut root = dispatcher.process(&mut tree, document_node, &mut self.context);
        if self.context.css.forward_targets {
            log::debug!("forward target-counter references; dispatching again");
            let targets = self.context.css.counters.take_targets();
            self.context.reset();
            self.context.css.counters.seed_targets(targets);
            tree = DomTree::parse_html(html);
            let document_node = tree.root();
            root = dispatcher.process(&mut tree, document_node, &mut self.context);
        }
        log::debug!(
            "dispatch done: {} running elements, {} outline entries",
            self.context.running.len(),
            self.context.outlines.len()
        );

        self.pages.load_rules(resolver.sheet().page_rules.clone());
        let renderer = Renderer::new(&self.fonts, &resolver, &dispatcher, self.max_relayout_passes);
        let output = renderer.render(&root, &mut tree, &mut self.context, &mut self.pages);

        let outlines = self.context.outlines.clone();
        for entry in &outlines {
            self.outline_sink.add_entry(entry.clone());
        }
        log::debug!(
            "conversion done: {} pages after {} passes",
            output.document.page_count(),
            output.passes
        );
        Ok(ConversionResult {
            document: output.document,
            root,
            destinations: output.destinations,
            metadata: self.context.metadata.clone(),
            outlines,
            passes: output.passes,
            converged: output.converged,
        })
    }

    pub fn convert_to_pdf(&mut self, html: &str, css: &str) -> Result<Vec<u8>, PagemillError> {
        let result = self.convert(html, css)?;
        pdf::write_pdf(PdfInput {
            document: &result.document,
            metadata: &result.metadata,
            outlines: &result.outlines,
            destinations: &result.destinations,
        })
    }

    pub fn process(
        &mut self,
        tree: &mut DomTree,
        root: NodeId,
        css: &str,
    ) -> Result<LayoutElement, PagemillError> {
        let _guard = ConversionGuard::acquire(&self.in_progress)?;
        self.fonts.ensure_usable()?;
        self.context.reset();
        let resolver = StyleResolver::new(css, &self.media);
        self.context.metadata = DocumentMetadata::from_tree(tree).merged_with(&self.metadata);
        let dispatcher = Dispatcher::new(&resolver, &self.handlers, self.resources.as_ref());
        Ok(dispatcher.process(tree, root, &mut self.context))
    }

    pub fn set_page_defaults(&mut self, size: Size, margins: Margins) -> Result<(), PagemillError> {
        validate_page_size(size)?;
        self.pages.set_defaults(size, margins);
        Ok(())
    }

    fn load_font_faces(&mut self, resolver: &StyleResolver) {
        for face in &resolver.sheet().font_faces {
            let family = face.family.as_deref();
            if family.is_some_and(|name| self.fonts.resolve(name).is_some()) {
                continue;
            }
            let loaded = face.sources.iter().find_map(|uri| {
                let data = self.resources.resolve(uri)?;
                match self.fonts.register_bytes(data, family) {
                    Ok(name) => Some(name),
                    Err(err) => {
                        log::warn!("@font-face source {uri} rejected: {err}");
                        None
                    }
                }
            });
            if loaded.is_none() {
                log::warn!(
                    "@font-face {} has no usable source",
                    family.unwrap_or("<unnamed>")
                );
            }
        }
    }
}

pub struct PagemillBuilder {
    page_size: Size,
    margins: Margins,
    base_font_size: Pt,
    media: Option<MediaDevice>,
    max_relayout_passes: usize,
    standard_fonts: bool,
    font_programs: Vec<(Vec<u8>, Option<String>)>,
    font_files: Vec<PathBuf>,
    resources: Option<Box<dyn ResourceResolver>>,
    outline_sink: Option<Box<dyn OutlineSink>>,
    outline_prefix: String,
    metadata: DocumentMetadata,
    handlers: Vec<(String, Option<String>, HandlerFactory)>,
}

impl Default for PagemillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PagemillBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::all(36.0),
            base_font_size: Pt::from_i32(12),
            media: None,
            max_relayout_passes: 4,
            standard_fonts: true,
            font_programs: Vec::new(),
            font_files: Vec::new(),
            resources: None,
            outline_sink: None,
            outline_prefix: DEFAULT_OUTLINE_PREFIX.to_string(),
            metadata: DocumentMetadata::default(),
            handlers: Vec::new(),
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn margin_all(mut self, value: f32) -> Self {
        self.margins = Margins::all(value);
        self
    }

    pub fn base_font_size(mut self, size: f32) -> Self {
        self.base_font_size = Pt::from_f32(size);
        self
    }

    pub fn media(mut self, media: MediaDevice) -> Self {
        self.media = Some(media);
        self
    }

    pub fn max_relayout_passes(mut self, passes: usize) -> Self {
        self.max_relayout_passes = passes;
        self
    }

    pub fn standard_fonts(mut self, enabled: bool) -> Self {
        self.standard_fonts = enabled;
        self
    }

    pub fn register_font_bytes(mut self, data: Vec<u8>, name: Option<&str>) -> Self {
        self.font_programs.push((data, name.map(str::to_string)));
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn resource_resolver(mut self, resolver: impl ResourceResolver + 'static) -> Self {
        self.resources = Some(Box::new(resolver));
        self
    }

    pub fn outline_sink(mut self, sink: impl OutlineSink + 'static) -> Self {
        self.outline_sink = Some(Box::new(sink));
        self
    }

    pub fn outline_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.outline_prefix = prefix.into();
        self
    }

    pub fn metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn handler(mut self, tag: &str, display: Option<&str>, factory: HandlerFactory) -> Self {
        self.handlers
            .push((tag.to_string(), display.map(str::to_string), factory));
        self
    }

    pub fn build(self) -> Result<Pagemill, PagemillError> {
        if self.max_relayout_passes == 0 {
            return Err(PagemillError::InvalidConfiguration(
                "max_relayout_passes must be at least 1".to_string(),
            ));
        }
        validate_page_size(self.page_size)?;
        if self.base_font_size <= Pt::ZERO {
            return Err(PagemillError::InvalidConfiguration(
                "base font size must be positive".to_string(),
            ));
        }

        let mut fonts = FontRegistry::new(self.standard_fonts);
        for (data, name) in self.font_programs {
            fonts.register_bytes(data, name.as_deref())?;
        }
        for path in &self.font_files {
            fonts.register_file(path)?;
        }

        let mut handlers = HandlerRegistry::with_defaults();
        for (tag, display, factory) in &self.handlers {
            handlers.register(tag, display.as_deref(), *factory);
        }

        let media = self.media.unwrap_or(MediaDevice {
            width: self.page_size.width,
            height: self.page_size.height,
            ..MediaDevice::default()
        });

        Ok(Pagemill {
            media,
            max_relayout_passes: self.max_relayout_passes,
            fonts,
            resources: self.resources.unwrap_or_else(|| Box::new(DataUriResolver)),
            outline_sink: self
                .outline_sink
                .unwrap_or_else(|| Box::new(OutlineCollector::new())),
            handlers,
            metadata: self.metadata,
            context: ConversionContext::new(self.base_font_size, &self.outline_prefix),
            pages: PageContextProcessor::new(Vec::new(), self.page_size, self.margins),
            in_progress: Rc::new(Cell::new(false)),
        })
    }
}

fn validate_page_size(size: Size) -> Result<(), PagemillError> {
    if size.width <= Pt::ZERO || size.height <= Pt::ZERO {
        return Err(PagemillError::InvalidConfiguration(format!(
            "page size must be positive, got {}x{}pt",
            size.width.to_f32(),
            size.height.to_f32()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> Pagemill {
        Pagemill::builder()
            .page_size(Size::new(Pt::from_i32(300), Pt::from_i32(300)))
            .margin_all(40.0)
            .build()
            .expect("converter")
    }

    #[test]
    fn break_before_starts_a_new_page() {
        let mut mill = converter();
        let result = mill
            .convert("<p>First</p><p style='break-before: page'>Second</p>", "")
            .expect("convert");
        let pages = &result.document.pages;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains_text("First"));
        assert!(pages[1].contains_text("Second"));
        assert!(!pages[0].contains_text("Second"));
    }

    #[test]
    fn leading_forced_break_adds_no_page() {
        let mut mill = converter();
        let result = mill
            .convert(r#"<div style="break-before:always">A</div><div>B</div>"#, "")
            .expect("convert");
        let pages = &result.document.pages;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains_text("A"));
        assert!(pages[0].contains_text("B"));
    }

    #[test]
    fn page_x_of_y_in_margin_boxes() {
        let mut mill = converter();
        let css = r#"
            @page { @bottom-center { content: "Page " counter(page) " of " counter(pages) } }
            section { break-before: page }
        "#;
        let result = mill
            .convert("<section>a</section><section>b</section><section>c</section>", css)
            .expect("convert");
        let pages = &result.document.pages;
        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert!(page.contains_text(&format!("Page {} of 3", i + 1)), "page {}", i + 1);
        }
        assert!(result.converged);
    }

    #[test]
    fn top_center_repeats_on_every_page() {
        let mut mill = converter();
        let css = "@page { @top-center { content: 'Quarterly' } } h2 { break-before: page }";
        let result = mill
            .convert("<h2>One</h2><h2>Two</h2>", css)
            .expect("convert");
        assert_eq!(result.document.page_count(), 2);
        assert!(result
            .document
            .pages
            .iter()
            .all(|page| page.contains_text("Quarterly")));
    }

    #[test]
    fn first_page_rule_overrides_margin_box() {
        let mut mill = converter();
        let css = r#"
            @page { @top-center { content: 'Running' } }
            @page :first { @top-center { content: none } }
            div { break-before: page }
        "#;
        let result = mill
            .convert("<div>a</div><div>b</div>", css)
            .expect("convert");
        let pages = &result.document.pages;
        assert!(!pages[0].contains_text("Running"));
        assert!(pages[1].contains_text("Running"));
    }

    #[test]
    fn trailing_blank_page_is_trimmed() {
        let mut mill = converter();
        let result = mill
            .convert("<p style='break-after: page'>Only</p>", "")
            .expect("convert");
        assert_eq!(result.document.page_count(), 1);
    }

    #[test]
    fn display_none_is_not_drawn() {
        let mut mill = converter();
        let result = mill
            .convert("<div class='x'>Secret</div><p>Shown</p>", ".x { display: none }")
            .expect("convert");
        let page = &result.document.pages[0];
        assert!(page.contains_text("Shown"));
        assert!(!page.contains_text("Secret"));
        assert!(!result.root.text_content().contains("Secret"));
    }

    #[test]
    fn inherited_color_reaches_text() {
        let mut mill = converter();
        let result = mill
            .convert("<p><span>tinted</span></p>", "body { color: red }")
            .expect("convert");
        let commands = &result.document.pages[0].commands;
        let fill = commands
            .iter()
            .position(|c| *c == Command::SetFillColor(Color::from_rgb8(255, 0, 0)))
            .expect("red fill");
        let text = commands
            .iter()
            .position(|c| matches!(c, Command::DrawString { text, .. } if text == "tinted"))
            .expect("text");
        assert!(fill < text);
    }

    #[test]
    fn repeated_conversions_are_identical() {
        let mut mill = converter();
        let html = "<ol><li>a</li><li>b</li></ol><h1>T</h1><p style='break-before: page'>z</p>";
        let css = "@page { @bottom-right { content: counter(page) } }";
        let first = mill.convert(html, css).expect("first");
        let second = mill.convert(html, css).expect("second");
        assert_eq!(first.document.page_count(), second.document.page_count());
        for (a, b) in first.document.pages.iter().zip(&second.document.pages) {
            assert_eq!(a.commands, b.commands);
        }
        assert_eq!(first.outlines, second.outlines);
        assert_eq!(first.destinations, second.destinations);
    }

    #[test]
    fn relayout_cap_is_not_fatal() {
        let mut mill = Pagemill::builder()
            .page_size(Size::new(Pt::from_i32(300), Pt::from_i32(300)))
            .max_relayout_passes(1)
            .build()
            .expect("converter");
        let result = mill
            .convert(
                "<p>a</p><p style='break-before: page'>b</p>",
                "p::after { content: ' / ' counter(pages) }",
            )
            .expect("convert");
        assert!(!result.converged);
        assert_eq!(result.passes, 1);
        assert!(result.document.pages[1].contains_text("b / 2"));
    }

    #[test]
    fn outline_sink_receives_headings() {
        let collector = OutlineCollector::new();
        let mut mill = Pagemill::builder()
            .outline_sink(collector.clone())
            .outline_prefix("toc-")
            .build()
            .expect("converter");
        let result = mill
            .convert("<h1>Intro</h1><h2>Scope</h2>", "")
            .expect("convert");
        let entries = collector.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].destination, "toc-0");
        assert_eq!(entries[1].level, 2);
        assert!(result.destinations.iter().any(|d| d.name == "toc-1"));
    }

    #[test]
    fn metadata_overrides_win() {
        let mut mill = Pagemill::builder()
            .metadata(DocumentMetadata {
                author: Some("Finance".to_string()),
                ..DocumentMetadata::default()
            })
            .build()
            .expect("converter");
        let result = mill
            .convert(
                "<html><head><title>Budget</title><meta name='author' content='Someone'></head><body>x</body></html>",
                "",
            )
            .expect("convert");
        assert_eq!(result.metadata.title.as_deref(), Some("Budget"));
        assert_eq!(result.metadata.author.as_deref(), Some("Finance"));
        assert_eq!(result.root.props.text(property::META_TITLE), Some("Budget"));
    }

    #[test]
    fn pdf_output_loads_back() {
        let mut mill = converter();
        let bytes = mill
            .convert_to_pdf(
                "<html><head><title>Memo</title></head><body><h1>Hello</h1><p style='break-before: page'>World</p></body></html>",
                "",
            )
            .expect("pdf");
        let doc = lopdf::Document::load_mem(&bytes).expect("load");
        assert_eq!(doc.get_pages().len(), 2);
        let catalog = doc.catalog().expect("catalog");
        assert!(catalog.has(b"Outlines"));
    }

    #[test]
    fn reentrant_calls_are_rejected() {
        let mut mill = converter();
        mill.in_progress.set(true);
        assert!(matches!(mill.convert("<p>x</p>", ""), Err(PagemillError::Reentrant)));
        mill.in_progress.set(false);
        assert!(mill.convert("<p>x</p>", "").is_ok());
    }

    #[test]
    fn missing_fonts_abort_conversion() {
        let mut mill = Pagemill::builder()
            .standard_fonts(false)
            .build()
            .expect("converter");
        assert!(matches!(
            mill.convert("<p>x</p>", ""),
            Err(PagemillError::NoUsableFonts)
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            Pagemill::builder().max_relayout_passes(0).build(),
            Err(PagemillError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Pagemill::builder()
                .page_size(Size::new(Pt::ZERO, Pt::from_i32(10)))
                .build(),
            Err(PagemillError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn forward_target_counter_resolves() {
        let mut mill = converter();
        let html = r##"<ul><li><a href="#c2">Two</a></li></ul>
            <h2 id="c1">One</h2><h2 id="c2">Two</h2>"##;
        let css = r#"
            body { counter-reset: chapter }
            h2 { counter-increment: chapter }
            a::after { content: " ch. " target-counter(attr(href), chapter) }
        "#;
        let result = mill.convert(html, css).expect("convert");
        assert!(result.document.pages[0].contains_text("ch. 2"));
    }

    #[test]
    fn page_defaults_apply_to_later_conversions() {
        let mut mill = converter();
        let first = mill.convert("<p>x</p>", "").expect("convert");
        assert_eq!(first.document.pages[0].size, Size::new(Pt::from_i32(300), Pt::from_i32(300)));

        let letter = Size::letter();
        mill.set_page_defaults(letter, Margins::all(72.0))
            .expect("defaults");
        let second = mill.convert("<p>x</p>", "").expect("convert");
        assert_eq!(second.document.pages[0].size, letter);

        let sized = mill
            .convert("<p>x</p>", "@page { size: 200pt 100pt }")
            .expect("convert");
        assert_eq!(sized.document.pages[0].size, Size::new(Pt::from_i32(200), Pt::from_i32(100)));
        assert!(matches!(
            mill.set_page_defaults(Size::new(Pt::ZERO, Pt::ZERO), Margins::all(0.0)),
            Err(PagemillError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn process_returns_the_root_primitive() {
        let mut mill = converter();
        let mut tree = DomTree::parse_html("<p>kept</p><script>dropped()</script>");
        let root = tree.root();
        let element = mill.process(&mut tree, root, "").expect("process");
        assert!(element.text_content().contains("kept"));
        assert!(!element.text_content().contains("dropped"));
        assert_eq!(tree.styled_count(), 0);
    }
}
