use crate::canvas::{Canvas, Document, Page};
use crate::counters::format_counter;
use crate::dispatch::{ConversionContext, Dispatcher};
use crate::dom::{DomTree, PseudoKind};
use crate::fonts::FontRegistry;
use crate::layout::{property, BreakPolicy, LayoutElement, LayoutKind, PropertyMap};
use crate::margin_box::{layout_margin_boxes, MarginBoxInput, MarginBoxSlot};
use crate::page_context::{PageClass, PageContext, PageContextProcessor, PageContextSnapshot, PageSide};
use crate::resources::ImageResource;
use crate::running::RunningRegistry;
use crate::style::{CssContext, StyleMap, StyleResolver};
use crate::typeset::{
    build_lines, collect_atoms, measure_atoms, Atom, Line, LineItem, LineMarker, RunText, TextAlign,
    TextStyle,
};
use crate::types::{Color, Margins, Pt, Rect};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedDestination {
    pub name: String,
    pub page: usize,
    pub y: Pt,
}

#[derive(Debug)]
pub struct RenderOutput {
    pub document: Document,
    pub destinations: Vec<PlacedDestination>,
    pub passes: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct PassFeedback {
    page_total: usize,
    targets: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct Decoration {
    background: Option<Color>,
    borders: Margins,
    colors: [Color; 4],
}

impl Decoration {
    fn from_props(props: &PropertyMap) -> Self {
        let side = |i: usize| props.length_or_zero(property::BOX_EDGES[1][i]);
        let color = |id| props.color(id).unwrap_or(Color::BLACK);
        Self {
            background: props.color(property::BACKGROUND_COLOR),
            borders: Margins {
                top: side(0),
                right: side(1),
                bottom: side(2),
                left: side(3),
            },
            colors: [
                color(property::BORDER_TOP_COLOR),
                color(property::BORDER_RIGHT_COLOR),
                color(property::BORDER_BOTTOM_COLOR),
                color(property::BORDER_LEFT_COLOR),
            ],
        }
    }

    fn is_visible(&self) -> bool {
        self.background.is_some() || !self.borders.is_zero()
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    depth: usize,
    top: Pt,
    bottom: Pt,
    left: Pt,
    right: Pt,
    decoration: Rc<Decoration>,
    first: bool,
    last: bool,
}

#[derive(Debug, Clone)]
struct PlacedLine {
    x: Pt,
    y: Pt,
    line: Line,
}

#[derive(Debug, Clone)]
struct PageState {
    context: PageContext,
    fragments: Vec<Fragment>,
    lines: Vec<PlacedLine>,
    has_content: bool,
    blank: bool,
}

impl PageState {
    fn class(&self) -> PageClass {
        self.context.class
    }
}

#[derive(Debug)]
struct OpenBlock {
    depth: usize,
    left: Pt,
    right: Pt,
    content_left: Pt,
    content_right: Pt,
    top: Pt,
    decoration: Rc<Decoration>,
    first_fragment: bool,
    hidden: bool,
}

struct PassResult {
    pages: Vec<PageState>,
    destinations: Vec<PlacedDestination>,
}

impl PassResult {
    fn feedback(&self) -> PassFeedback {
        let mut targets = BTreeMap::new();
        for destination in &self.destinations {
            targets
                .entry(destination.name.clone())
                .or_insert(destination.page);
        }
        PassFeedback {
            page_total: self.pages.len(),
            targets,
        }
    }
}

pub struct Renderer<'a> {
    fonts: &'a FontRegistry,
    resolver: &'a StyleResolver,
    dispatcher: &'a Dispatcher<'a>,
    max_passes: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(
        fonts: &'a FontRegistry,
        resolver: &'a StyleResolver,
        dispatcher: &'a Dispatcher<'a>,
        max_passes: usize,
    ) -> Self {
        Self {
            fonts,
            resolver,
            dispatcher,
            max_passes: max_passes.max(1),
        }
    }

    pub fn render(
        &self,
        root: &LayoutElement,
        tree: &mut DomTree,
        ctx: &mut ConversionContext,
        pages: &mut PageContextProcessor,
    ) -> RenderOutput {
        let needs_relayout = ctx.css.uses_page_total || ctx.css.uses_target_pages;
        let mut even_pages_are_left = true;
        let mut flipped = false;
        let mut feedback = PassFeedback::default();
        let mut snapshot: Option<PageContextSnapshot> = None;
        let mut passes = 0;
        let mut converged = true;

        let mut result = loop {
            if let Some(snapshot) = &snapshot {
                pages.restore(snapshot.clone());
            }
            ctx.running.clear_occurrences();
            let result = self.paginate(root, ctx, pages, &feedback, even_pages_are_left);
            if !flipped && result.pages.len() > 1 && result.pages[0].blank {
                flipped = true;
                even_pages_are_left = !even_pages_are_left;
                log::debug!("leading blank page trimmed; page parity flipped");
                continue;
            }
            passes += 1;
            let next = result.feedback();
            if !needs_relayout || next == feedback {
                break result;
            }
            if passes >= self.max_passes {
                log::warn!(
                    "pagination did not settle after {passes} passes; keeping the last layout"
                );
                converged = false;
                break result;
            }
            log::debug!(
                "relayout pass {} ({} pages in previous pass)",
                passes + 1,
                next.page_total
            );
            feedback = next;
            snapshot = Some(pages.snapshot());
        };

        if result.pages.len() > 1 {
            let trailing_blank = result
                .pages
                .last()
                .is_some_and(|page| !page.has_content && page.fragments.is_empty());
            if trailing_blank {
                result.pages.pop();
                log::debug!("trailing blank page removed");
                let last = result.pages.len() - 1;
                for destination in &mut result.destinations {
                    destination.page = destination.page.min(last);
                }
            }
        }

        let document = self.finalize(&result, tree, ctx);
        RenderOutput {
            document,
            destinations: result.destinations,
            passes,
            converged,
        }
    }

    fn paginate(
        &self,
        root: &LayoutElement,
        ctx: &mut ConversionContext,
        pages: &mut PageContextProcessor,
        feedback: &PassFeedback,
        even_pages_are_left: bool,
    ) -> PassResult {
        let root_style = ctx.root_style.clone();
        let first = make_page(
            pages,
            self.resolver,
            &mut ctx.css,
            root_style.as_deref(),
            0,
            even_pages_are_left,
            false,
        );
        let cursor = first.context.content_box().y;
        let mut pass = Pass {
            fonts: self.fonts,
            resolver: self.resolver,
            pages_proc: pages,
            css: &mut ctx.css,
            running: &mut ctx.running,
            root_style,
            feedback,
            even_pages_are_left,
            done: Vec::new(),
            page: first,
            open: Vec::new(),
            cursor,
            destinations: Vec::new(),
            pending_destinations: Vec::new(),
        };
        if root.is_block() {
            pass.layout_block(root, 0, false);
        } else {
            pass.paragraph(std::slice::from_ref(root), &PropertyMap::new(), false);
        }
        pass.finish()
    }

    fn finalize(&self, result: &PassResult, tree: &mut DomTree, ctx: &mut ConversionContext) -> Document {
        let total = result.pages.len();
        let mut document = Document::default();
        let mut images = ImageTable::default();
        for (index, page) in result.pages.iter().enumerate() {
            let mut canvas = Canvas::new();
            draw_page_box(&mut canvas, &page.context);

            let mut fragments: Vec<&Fragment> = page.fragments.iter().collect();
            fragments.sort_by_key(|fragment| fragment.depth);
            let content = page.context.content_box();
            for fragment in fragments {
                draw_fragment(&mut canvas, content, fragment);
            }

            for placed in &page.lines {
                let resolve =
                    |text: &RunText| final_text(text, index, total, &result.destinations, &ctx.running);
                draw_line(&mut canvas, placed.x, placed.y, &placed.line, &resolve, &mut images);
            }

            self.draw_margin_boxes(&mut canvas, page, index, total, &result.destinations, tree, ctx, &mut images);

            let mut out = Page::new(page.context.size);
            out.bleed = page.context.bleed;
            out.commands = canvas.into_commands();
            document.pages.push(out);
        }
        document.images = images.resources;
        log::debug!("finalized {} pages", document.pages.len());
        document
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_margin_boxes(
        &self,
        canvas: &mut Canvas,
        page: &PageState,
        index: usize,
        total: usize,
        destinations: &[PlacedDestination],
        tree: &mut DomTree,
        ctx: &mut ConversionContext,
        images: &mut ImageTable,
    ) {
        let context = &page.context;
        if context.margin_boxes.is_empty() {
            return;
        }
        let document_node = tree.root();
        tree.set_style(document_node, Rc::new(context.style.clone()));
        let mut contents: BTreeMap<MarginBoxSlot, (LayoutElement, Vec<Atom>)> = BTreeMap::new();
        let mut inputs: BTreeMap<MarginBoxSlot, MarginBoxInput> = BTreeMap::new();
        for (slot, declarations) in &context.margin_boxes {
            let node = tree.create_pseudo(document_node, PseudoKind::MarginBox(*slot), declarations.clone());
            let Some(mut element) = self.dispatcher.process_detached(tree, node, ctx) else {
                continue;
            };
            substitute_running(&mut element, index, &ctx.running);
            let mut atoms = Vec::new();
            let late = |text: &RunText| final_text(text, index, total, destinations, &ctx.running);
            collect_atoms(std::slice::from_ref(&element), self.fonts, &late, &mut atoms);
            if !atoms.iter().any(|atom| !matches!(atom, Atom::Marker(_))) {
                log::trace!("margin box {} empty on page {}", slot.name(), index + 1);
                continue;
            }
            let (min, max) = measure_atoms(&atoms);
            inputs.insert(*slot, context.margin_box_input(*slot, min, max));
            contents.insert(*slot, (element, atoms));
        }
        tree.clear_style(document_node);

        for geometry in layout_margin_boxes(context.size, context.margins, &inputs) {
            let Some((element, atoms)) = contents.remove(&geometry.slot) else {
                continue;
            };
            let rect = geometry.rect;
            if let Some(background) = element.props.color(property::BACKGROUND_COLOR) {
                canvas.set_fill_color(background);
                canvas.draw_rect(rect.x, rect.y, rect.width, rect.height);
            }
            let align = TextAlign::from_css(element.props.text(property::TEXT_ALIGN).unwrap_or("left"));
            let lines = build_lines(atoms, rect.width, align, Pt::ZERO);
            let height: Pt = lines.iter().map(|line| line.height).sum();
            let slack = (rect.height - height).max(Pt::ZERO);
            let offset = match element.props.text(property::VERTICAL_ALIGN) {
                Some("top") => Pt::ZERO,
                Some("bottom") => slack,
                _ => slack / 2,
            };
            let mut y = rect.y + offset;
            let resolve = |text: &RunText| final_text(text, index, total, destinations, &ctx.running);
            for line in lines.iter().filter(|line| line.is_visible()) {
                draw_line(canvas, rect.x, y, line, &resolve, images);
                y += line.height;
            }
        }
    }
}

fn make_page(
    pages: &mut PageContextProcessor,
    resolver: &StyleResolver,
    css: &mut CssContext,
    root_style: Option<&StyleMap>,
    index: usize,
    even_pages_are_left: bool,
    blank: bool,
) -> PageState {
    let class = PageClass::for_page(index, even_pages_are_left, blank);
    let context = pages.context(class, resolver, css, root_style).clone();
    PageState {
        context,
        fragments: Vec::new(),
        lines: Vec::new(),
        has_content: false,
        blank,
    }
}

struct Pass<'p> {
    fonts: &'p FontRegistry,
    resolver: &'p StyleResolver,
    pages_proc: &'p mut PageContextProcessor,
    css: &'p mut CssContext,
    running: &'p mut RunningRegistry,
    root_style: Option<Rc<StyleMap>>,
    feedback: &'p PassFeedback,
    even_pages_are_left: bool,
    done: Vec<PageState>,
    page: PageState,
    open: Vec<OpenBlock>,
    cursor: Pt,
    destinations: Vec<PlacedDestination>,
    pending_destinations: Vec<String>,
}

impl Pass<'_> {
    fn index(&self) -> usize {
        self.done.len()
    }

    fn content_box(&self) -> Rect {
        self.page.context.content_box()
    }

    fn content_insets(&self) -> (Pt, Pt) {
        self.open
            .last()
            .map(|block| (block.content_left, block.content_right))
            .unwrap_or((Pt::ZERO, Pt::ZERO))
    }

    fn new_page(&mut self) {
        let bottom = self.content_box().bottom();
        for block in &self.open {
            if block.hidden || !block.decoration.is_visible() {
                continue;
            }
            self.page.fragments.push(Fragment {
                depth: block.depth,
                top: block.top,
                bottom,
                left: block.left,
                right: block.right,
                decoration: block.decoration.clone(),
                first: block.first_fragment,
                last: false,
            });
        }
        let index = self.index() + 1;
        let next = make_page(
            self.pages_proc,
            self.resolver,
            self.css,
            self.root_style.as_deref(),
            index,
            self.even_pages_are_left,
            false,
        );
        let finished = std::mem::replace(&mut self.page, next);
        self.done.push(finished);
        self.cursor = self.content_box().y;
        for block in &mut self.open {
            block.top = self.cursor;
            block.first_fragment = false;
        }
        log::debug!("page {} started", index + 1);
    }

    fn mark_blank(&mut self) {
        let class = PageClass::for_page(self.index(), self.even_pages_are_left, true);
        self.page.blank = true;
        self.page.context = self
            .pages_proc
            .context(class, self.resolver, self.css, self.root_style.as_deref())
            .clone();
        log::debug!("blank page {} inserted", self.index() + 1);
    }

    fn apply_break(&mut self, policy: BreakPolicy) {
        let wanted = match policy {
            BreakPolicy::None => return,
            BreakPolicy::Always => {
                if self.page.has_content {
                    self.new_page();
                }
                return;
            }
            BreakPolicy::Left => PageSide::Left,
            BreakPolicy::Right => PageSide::Right,
        };
        if self.page.has_content {
            self.new_page();
        }
        while self.page.class().side != wanted {
            self.mark_blank();
            self.new_page();
        }
    }

    fn layout_block(&mut self, element: &LayoutElement, depth: usize, hidden: bool) {
        let props = &element.props;
        let hidden = hidden || props.flag(property::HIDDEN);
        let content = self.content_box();
        let (parent_left, parent_right) = self.content_insets();
        let available = (content.width - parent_left - parent_right).max(Pt::ZERO);
        let edge = |row: usize, side: usize| {
            props
                .resolve_length(property::BOX_EDGES[row][side], available)
                .unwrap_or(Pt::ZERO)
        };
        let margin = [edge(0, 0), edge(0, 1), edge(0, 2), edge(0, 3)];
        let border = [edge(1, 0), edge(1, 1), edge(1, 2), edge(1, 3)];
        let padding = [edge(2, 0), edge(2, 1), edge(2, 2), edge(2, 3)];

        let left = parent_left + margin[3];
        let mut right = parent_right + margin[1];
        if let Some(width) = props.resolve_length(property::WIDTH, available) {
            let border_box = width + border[1] + border[3] + padding[1] + padding[3];
            right = (content.width - left - border_box).max(Pt::ZERO);
        }

        self.cursor += margin[0];
        for id in [property::DESTINATION, property::OUTLINE_DESTINATION] {
            if let Some(name) = props.text(id) {
                self.pending_destinations.push(name.to_string());
            }
        }
        self.open.push(OpenBlock {
            depth,
            left,
            right,
            content_left: left + border[3] + padding[3],
            content_right: right + border[1] + padding[1],
            top: self.cursor,
            decoration: Rc::new(Decoration::from_props(props)),
            first_fragment: true,
            hidden,
        });
        self.cursor += border[0] + padding[0];
        let start_page = self.index();
        let content_start = self.cursor;

        self.layout_children(element, depth, hidden);

        let min_height = props
            .length(property::HEIGHT)
            .unwrap_or(Pt::ZERO)
            .max(props.length(property::MIN_HEIGHT).unwrap_or(Pt::ZERO));
        if start_page == self.index() && self.cursor < content_start + min_height {
            self.cursor = content_start + min_height;
        }
        self.cursor += padding[2] + border[2];
        self.flush_destinations();

        if let Some(block) = self.open.pop() {
            if !block.hidden && block.decoration.is_visible() && self.cursor > block.top {
                self.page.fragments.push(Fragment {
                    depth: block.depth,
                    top: block.top,
                    bottom: self.cursor,
                    left: block.left,
                    right: block.right,
                    decoration: block.decoration,
                    first: block.first_fragment,
                    last: true,
                });
                self.page.has_content = true;
            }
        }
        self.cursor += margin[2];
    }

    fn layout_children(&mut self, element: &LayoutElement, depth: usize, hidden: bool) {
        let children = &element.children;
        let mut start = 0;
        for (i, child) in children.iter().enumerate() {
            match child.kind {
                LayoutKind::AreaBreak(policy) => {
                    self.paragraph(&children[start..i], &element.props, hidden);
                    self.apply_break(policy);
                    start = i + 1;
                }
                LayoutKind::Block | LayoutKind::Document => {
                    self.paragraph(&children[start..i], &element.props, hidden);
                    self.layout_block(child, depth + 1, hidden);
                    start = i + 1;
                }
                _ => {}
            }
        }
        self.paragraph(&children[start..], &element.props, hidden);
    }

    fn paragraph(&mut self, elements: &[LayoutElement], container: &PropertyMap, hidden: bool) {
        if elements.is_empty() {
            return;
        }
        let mut atoms = Vec::new();
        {
            let late = |text: &RunText| self.estimate(text);
            collect_atoms(elements, self.fonts, &late, &mut atoms);
        }
        if atoms.is_empty() {
            return;
        }
        let (left, right) = self.content_insets();
        let width = (self.content_box().width - left - right).max(Pt::ZERO);
        let align = TextAlign::from_css(container.text(property::TEXT_ALIGN).unwrap_or("left"));
        let indent = container.length(property::TEXT_INDENT).unwrap_or(Pt::ZERO);
        for line in build_lines(atoms, width, align, indent) {
            self.place_line(line, hidden);
        }
    }

    fn place_line(&mut self, line: Line, hidden: bool) {
        let visible = line.is_visible();
        if visible && self.page.has_content && self.cursor + line.height > self.content_box().bottom() {
            self.new_page();
        }
        self.flush_destinations();
        let index = self.index();
        let first_on_page = !self.page.has_content;
        for marker in &line.markers {
            match marker {
                LineMarker::Running(id) => self.running.record_occurrence(*id, index, first_on_page),
                LineMarker::String { name, value } => {
                    self.running.record_string(name, value, index, first_on_page)
                }
                LineMarker::Destination(name) => self.destinations.push(PlacedDestination {
                    name: name.clone(),
                    page: index,
                    y: self.cursor,
                }),
            }
        }
        if !visible {
            return;
        }
        let height = line.height;
        if !hidden {
            let (left, _) = self.content_insets();
            let x = self.content_box().x + left;
            self.page.lines.push(PlacedLine {
                x,
                y: self.cursor,
                line,
            });
            self.page.has_content = true;
        }
        self.cursor += height;
    }

    fn flush_destinations(&mut self) {
        let index = self.index();
        for name in std::mem::take(&mut self.pending_destinations) {
            self.destinations.push(PlacedDestination {
                name,
                page: index,
                y: self.cursor,
            });
        }
    }

    fn estimate(&self, text: &RunText) -> String {
        let index = self.index();
        match text {
            RunText::Literal(text) => text.clone(),
            RunText::PageNumber { total: false, style } => format_counter(index as i32 + 1, style),
            RunText::PageNumber { total: true, style } => {
                format_counter(self.feedback.page_total.max(index + 1) as i32, style)
            }
            RunText::TargetPage { target, style } => self
                .feedback
                .targets
                .get(target)
                .map(|page| format_counter(*page as i32 + 1, style))
                .unwrap_or_default(),
            RunText::NamedString { name, policy } => self
                .running
                .select_string(name, index, *policy)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn finish(mut self) -> PassResult {
        self.flush_destinations();
        self.done.push(self.page);
        PassResult {
            pages: self.done,
            destinations: self.destinations,
        }
    }
}

fn final_text(
    text: &RunText,
    index: usize,
    total: usize,
    destinations: &[PlacedDestination],
    running: &RunningRegistry,
) -> String {
    match text {
        RunText::Literal(text) => text.clone(),
        RunText::PageNumber { total: false, style } => format_counter(index as i32 + 1, style),
        RunText::PageNumber { total: true, style } => format_counter(total as i32, style),
        RunText::TargetPage { target, style } => destinations
            .iter()
            .find(|destination| destination.name == *target)
            .map(|destination| format_counter(destination.page as i32 + 1, style))
            .unwrap_or_default(),
        RunText::NamedString { name, policy } => running
            .select_string(name, index, *policy)
            .unwrap_or_default()
            .to_string(),
    }
}

fn substitute_running(element: &mut LayoutElement, page: usize, running: &RunningRegistry) {
    for child in &mut element.children {
        if let LayoutKind::RunningSlot { name, policy } = &child.kind {
            *child = match running.select(name, page, *policy) {
                Some(found) => found.clone(),
                None => LayoutElement::new(LayoutKind::Inline),
            };
        } else {
            substitute_running(child, page, running);
        }
    }
}

#[derive(Default)]
struct ImageTable {
    ids: BTreeMap<String, String>,
    resources: BTreeMap<String, ImageResource>,
}

impl ImageTable {
    fn id_for(&mut self, resource: &ImageResource) -> String {
        if let Some(id) = self.ids.get(&resource.uri) {
            return id.clone();
        }
        let id = format!("Im{}", self.ids.len() + 1);
        self.ids.insert(resource.uri.clone(), id.clone());
        self.resources.insert(id.clone(), resource.clone());
        id
    }
}

fn draw_line(
    canvas: &mut Canvas,
    x0: Pt,
    y0: Pt,
    line: &Line,
    resolve: &dyn Fn(&RunText) -> String,
    images: &mut ImageTable,
) {
    let mut pending: Option<(Pt, TextStyle, String, Pt)> = None;
    for item in &line.items {
        match item {
            LineItem::Run(run) => {
                let text = resolve(&run.text);
                let end = x0 + run.x + run.width;
                let same_style = matches!(&pending, Some((_, style, _, _)) if *style == run.style);
                if same_style {
                    if let Some((_, _, buffer, pending_end)) = pending.as_mut() {
                        buffer.push_str(&text);
                        *pending_end = end;
                    }
                } else {
                    if let Some((x, style, buffer, end)) = pending.take() {
                        draw_text(canvas, x, y0, line.height, &style, &buffer, end);
                    }
                    pending = Some((x0 + run.x, run.style.clone(), text, end));
                }
            }
            LineItem::Image {
                x,
                width,
                height,
                resource,
            } => {
                if let Some((px, style, buffer, end)) = pending.take() {
                    draw_text(canvas, px, y0, line.height, &style, &buffer, end);
                }
                let id = images.id_for(resource);
                canvas.draw_image(x0 + *x, y0 + line.height - *height, *width, *height, id);
            }
        }
    }
    if let Some((x, style, buffer, end)) = pending {
        draw_text(canvas, x, y0, line.height, &style, &buffer, end);
    }
}

fn draw_text(canvas: &mut Canvas, x: Pt, line_top: Pt, line_height: Pt, style: &TextStyle, text: &str, end: Pt) {
    let text = text.trim_end();
    if text.trim().is_empty() {
        return;
    }
    let y = line_top + (line_height - style.size) / 2;
    canvas.set_fill_color(style.color);
    canvas.set_font_name(style.font.pdf_name);
    canvas.set_font_size(style.size);
    canvas.draw_string(x, y, text);
    if style.underline {
        let underline_y = y + style.size * 1.05f32;
        canvas.set_stroke_color(style.color);
        canvas.set_line_width(style.size / 18);
        canvas.line(x, underline_y, end, underline_y);
    }
}

fn draw_borders(canvas: &mut Canvas, rect: Rect, decoration: &Decoration, top: bool, bottom: bool) {
    let widths = decoration.borders;
    let half = |w: Pt| w / 2;
    let mut edge = |enabled: bool, width: Pt, color: Color, from: (Pt, Pt), to: (Pt, Pt)| {
        if !enabled || width <= Pt::ZERO {
            return;
        }
        canvas.set_stroke_color(color);
        canvas.set_line_width(width);
        canvas.line(from.0, from.1, to.0, to.1);
    };
    let y_top = rect.y + half(widths.top);
    let y_bottom = rect.bottom() - half(widths.bottom);
    let x_left = rect.x + half(widths.left);
    let x_right = rect.right() - half(widths.right);
    edge(top, widths.top, decoration.colors[0], (rect.x, y_top), (rect.right(), y_top));
    edge(true, widths.right, decoration.colors[1], (x_right, rect.y), (x_right, rect.bottom()));
    edge(bottom, widths.bottom, decoration.colors[2], (rect.x, y_bottom), (rect.right(), y_bottom));
    edge(true, widths.left, decoration.colors[3], (x_left, rect.y), (x_left, rect.bottom()));
}

fn draw_fragment(canvas: &mut Canvas, content: Rect, fragment: &Fragment) {
    let width = (content.width - fragment.left - fragment.right).max(Pt::ZERO);
    let rect = Rect::new(
        content.x + fragment.left,
        fragment.top,
        width,
        (fragment.bottom - fragment.top).max(Pt::ZERO),
    );
    if rect.width <= Pt::ZERO || rect.height <= Pt::ZERO {
        return;
    }
    if let Some(background) = fragment.decoration.background {
        canvas.set_fill_color(background);
        canvas.draw_rect(rect.x, rect.y, rect.width, rect.height);
    }
    draw_borders(canvas, rect, &fragment.decoration, fragment.first, fragment.last);
}

fn draw_page_box(canvas: &mut Canvas, context: &PageContext) {
    let size = context.size;
    let bleed = context.bleed;
    if let Some(background) = context.background {
        canvas.set_fill_color(background);
        canvas.draw_rect(-bleed, -bleed, size.width + bleed * 2, size.height + bleed * 2);
    }
    let decoration = Decoration {
        background: None,
        borders: context.borders,
        colors: context.border_colors,
    };
    if decoration.is_visible() {
        draw_borders(canvas, context.border_box(), &decoration, true, true);
    }
    if bleed <= Pt::ZERO || !context.marks.any() {
        return;
    }
    canvas.set_stroke_color(Color::BLACK);
    canvas.set_line_width(Pt::from_f32(0.25));
    let gap = bleed / 3;
    if context.marks.crop {
        for (cx, cy, dx, dy) in [
            (Pt::ZERO, Pt::ZERO, -1, -1),
            (size.width, Pt::ZERO, 1, -1),
            (Pt::ZERO, size.height, -1, 1),
            (size.width, size.height, 1, 1),
        ] {
            canvas.line(cx + gap * dx, cy, cx + bleed * dx, cy);
            canvas.line(cx, cy + gap * dy, cx, cy + bleed * dy);
        }
    }
    if context.marks.cross {
        let arm = bleed / 4;
        let half_bleed = bleed / 2;
        for (cx, cy) in [
            (size.width / 2, -half_bleed),
            (size.width / 2, size.height + half_bleed),
            (-half_bleed, size.height / 2),
            (size.width + half_bleed, size.height / 2),
        ] {
            canvas.line(cx - arm, cy, cx + arm, cy);
            canvas.line(cx, cy - arm, cx, cy + arm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::handler::HandlerRegistry;
    use crate::resources::DataUriResolver;
    use crate::stylesheet::MediaDevice;
    use crate::types::Size;

    fn render(html: &str, css: &str, max_passes: usize) -> RenderOutput {
        let resolver = StyleResolver::new(css, &MediaDevice::default());
        let handlers = HandlerRegistry::with_defaults();
        let dispatcher = Dispatcher::new(&resolver, &handlers, &DataUriResolver);
        let fonts = FontRegistry::new(true);
        let mut tree = DomTree::parse_html(html);
        let mut ctx = ConversionContext::new(Pt::from_i32(12), "d-");
        let root = tree.root();
        let layout = dispatcher.process(&mut tree, root, &mut ctx);
        let mut pages = PageContextProcessor::new(
            resolver.sheet().page_rules.clone(),
            Size::new(Pt::from_i32(200), Pt::from_i32(200)),
            Margins::all(20.0),
        );
        let renderer = Renderer::new(&fonts, &resolver, &dispatcher, max_passes);
        renderer.render(&layout, &mut tree, &mut ctx, &mut pages)
    }

    fn rect_count(page: &Page) -> usize {
        page.commands
            .iter()
            .filter(|command| matches!(command, Command::DrawRect { .. }))
            .count()
    }

    #[test]
    fn long_flow_spills_onto_new_pages() {
        let body = "<p>line</p>".repeat(30);
        let output = render(&body, "p { margin: 0 }", 4);
        assert!(output.document.page_count() > 1);
        assert!(output.converged);
        assert_eq!(output.passes, 1);
    }

    #[test]
    fn backgrounds_are_fragmented_per_page() {
        let body = format!("<div class='bg'>{}</div>", "<p>x</p>".repeat(30));
        let output = render(&body, ".bg { background-color: yellow } p { margin: 0 }", 4);
        let pages = &output.document.pages;
        assert!(pages.len() >= 2);
        assert!(pages.iter().all(|page| rect_count(page) == 1));
    }

    #[test]
    fn right_break_inserts_blank_page() {
        let output = render(
            "<div>A</div><div style='break-before: right'>B</div>",
            "@page :blank { @top-center { content: 'blank' } }",
            4,
        );
        let pages = &output.document.pages;
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains_text("A"));
        assert!(pages[1].contains_text("blank"));
        assert!(!pages[1].contains_text("B"));
        assert!(pages[2].contains_text("B"));
    }

    #[test]
    fn leading_left_break_flips_parity() {
        let output = render(
            "<div style='break-before: left'>A</div><div style='break-before: left'>B</div>",
            "",
            4,
        );
        let pages = &output.document.pages;
        // A lands on the first page, which now counts as a left page, so B
        // needs a blank right page before it.
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains_text("A"));
        assert!(pages[2].contains_text("B"));
    }

    #[test]
    fn trailing_blank_page_is_removed() {
        let output = render("<div style='break-after: always'>A</div>", "", 4);
        assert_eq!(output.document.page_count(), 1);
    }

    #[test]
    fn sole_blank_page_is_kept() {
        let output = render("", "", 4);
        assert_eq!(output.document.page_count(), 1);
    }

    #[test]
    fn running_headers_follow_occurrences() {
        let output = render(
            "<h1 class='t'>One</h1><p>a</p><div style='break-before: always'><h1 class='t'>Two</h1><p>b</p></div>",
            ".t { position: running(title) } @page { @top-center { content: element(title) } }",
            4,
        );
        let pages = &output.document.pages;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains_text("One"));
        assert!(pages[1].contains_text("Two"));
        assert!(!pages[1].contains_text("One"));
    }

    #[test]
    fn page_totals_relayout_and_converge() {
        let output = render(
            "<p>a</p><p style='break-before: page'>b</p>",
            "@page { @bottom-center { content: counter(page) ' / ' counter(pages) } } p::after { content: ' of ' counter(pages) }",
            4,
        );
        let pages = &output.document.pages;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains_text("1 / 2"));
        assert!(pages[1].contains_text("2 / 2"));
        assert!(pages[0].contains_text("a of 2"));
        assert!(output.converged);
        assert_eq!(output.passes, 2);
    }

    #[test]
    fn relayout_cap_is_not_fatal() {
        let output = render(
            "<p>a</p><p style='break-before: page'>b</p>",
            "p::after { content: counter(pages) }",
            1,
        );
        assert!(!output.converged);
        assert_eq!(output.document.page_count(), 2);
    }

    #[test]
    fn destinations_resolve_to_pages() {
        let output = render(
            "<p id='first'>a</p><h2 style='break-before: always'>Second</h2>",
            "",
            4,
        );
        let first = output
            .destinations
            .iter()
            .find(|d| d.name == "first")
            .expect("id destination");
        assert_eq!(first.page, 0);
        let heading = output
            .destinations
            .iter()
            .find(|d| d.name == "d-0")
            .expect("outline destination");
        assert_eq!(heading.page, 1);
    }

    #[test]
    fn target_counter_pages_use_previous_pass() {
        let output = render(
            "<p><a href='#end'>see</a></p><p id='end' style='break-before: always'>end</p>",
            "a::after { content: ' p.' target-counter(attr(href), page) }",
            4,
        );
        assert!(output.document.pages[0].contains_text("see p.2"));
    }

    #[test]
    fn crop_marks_draw_in_bleed() {
        let output = render("<p>x</p>", "@page { marks: crop }", 4);
        let page = &output.document.pages[0];
        assert_eq!(page.bleed, Pt::from_i32(6));
        let lines = page
            .commands
            .iter()
            .filter(|command| matches!(command, Command::LineTo { .. }))
            .count();
        assert_eq!(lines, 8);
    }
}
