use crate::dom::OccurrencePolicy;
use crate::fonts::{FontChoice, FontRegistry};
use crate::layout::{property, LayoutElement, LayoutKind, PropertyMap};
use crate::resources::ImageResource;
use crate::running::RunningId;
use crate::types::{Color, Pt};

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontChoice,
    pub size: Pt,
    pub color: Color,
    pub underline: bool,
    pub line_height: Pt,
}

impl TextStyle {
    pub fn from_props(props: &PropertyMap, fonts: &FontRegistry) -> Self {
        let family = props.text(property::FONT_FAMILY).unwrap_or("helvetica");
        let font = fonts.select(
            family,
            props.flag(property::BOLD),
            props.flag(property::ITALIC),
        );
        let size = props
            .length(property::FONT_SIZE)
            .filter(|size| *size > Pt::ZERO)
            .unwrap_or(Pt::from_i32(12));
        let line_height = props
            .length(property::LINE_HEIGHT)
            .filter(|height| *height > Pt::ZERO)
            .unwrap_or_else(|| fonts.line_height(&font, size));
        Self {
            font,
            size,
            color: props.color(property::COLOR).unwrap_or(Color::BLACK),
            underline: props.flag(property::UNDERLINE),
            line_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunText {
    Literal(String),
    PageNumber { total: bool, style: String },
    TargetPage { target: String, style: String },
    NamedString { name: String, policy: OccurrencePolicy },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineMarker {
    Running(RunningId),
    String { name: String, value: String },
    Destination(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Word {
        text: RunText,
        style: TextStyle,
        width: Pt,
    },
    Space {
        style: TextStyle,
        width: Pt,
        preserved: bool,
    },
    Image {
        resource: ImageResource,
        width: Pt,
        height: Pt,
    },
    Break {
        line_height: Pt,
    },
    Marker(LineMarker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn from_css(raw: &str) -> TextAlign {
        match raw.trim() {
            "center" => TextAlign::Center,
            "right" | "end" => TextAlign::Right,
            _ => TextAlign::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub x: Pt,
    pub width: Pt,
    pub text: RunText,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineItem {
    Run(Run),
    Image {
        x: Pt,
        width: Pt,
        height: Pt,
        resource: ImageResource,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub items: Vec<LineItem>,
    pub markers: Vec<LineMarker>,
    pub width: Pt,
    pub height: Pt,
}

impl Line {
    pub fn is_visible(&self) -> bool {
        !self.items.is_empty() || self.height > Pt::ZERO
    }
}

pub fn collect_atoms(
    elements: &[LayoutElement],
    fonts: &FontRegistry,
    late: &dyn Fn(&RunText) -> String,
    atoms: &mut Vec<Atom>,
) {
    for element in elements {
        collect_element(element, fonts, late, atoms);
    }
}

fn collect_element(
    element: &LayoutElement,
    fonts: &FontRegistry,
    late: &dyn Fn(&RunText) -> String,
    atoms: &mut Vec<Atom>,
) {
    if let Some(name) = element.props.text(property::DESTINATION) {
        atoms.push(Atom::Marker(LineMarker::Destination(name.to_string())));
    }
    match &element.kind {
        LayoutKind::Text(text) => {
            let style = TextStyle::from_props(&element.props, fonts);
            push_text_atoms(
                text,
                &style,
                element.props.flag(property::PRESERVE_WHITESPACE),
                fonts,
                atoms,
            );
        }
        LayoutKind::Image(resource) => {
            let width = element.props.length(property::WIDTH).unwrap_or(Pt::ZERO);
            let height = element.props.length(property::HEIGHT).unwrap_or(Pt::ZERO);
            if width > Pt::ZERO && height > Pt::ZERO {
                atoms.push(Atom::Image {
                    resource: resource.clone(),
                    width,
                    height,
                });
            } else {
                log::debug!("image {} suppressed: zero size", resource.uri);
            }
        }
        LayoutKind::LineBreak => {
            let style = TextStyle::from_props(&element.props, fonts);
            atoms.push(Atom::Break {
                line_height: style.line_height,
            });
        }
        LayoutKind::PageNumber { total, style } => push_late(
            RunText::PageNumber {
                total: *total,
                style: style.clone(),
            },
            element,
            fonts,
            late,
            atoms,
        ),
        LayoutKind::TargetPage { target, style } => push_late(
            RunText::TargetPage {
                target: target.clone(),
                style: style.clone(),
            },
            element,
            fonts,
            late,
            atoms,
        ),
        LayoutKind::NamedString { name, policy } => push_late(
            RunText::NamedString {
                name: name.clone(),
                policy: *policy,
            },
            element,
            fonts,
            late,
            atoms,
        ),
        LayoutKind::RunningMarker(id) => atoms.push(Atom::Marker(LineMarker::Running(*id))),
        LayoutKind::StringMarker { name, value } => {
            atoms.push(Atom::Marker(LineMarker::String {
                name: name.clone(),
                value: value.clone(),
            }))
        }
        LayoutKind::RunningSlot { name, .. } => {
            log::debug!("element({name}) outside a margin box ignored");
        }
        LayoutKind::AreaBreak(_) => {}
        LayoutKind::Document | LayoutKind::Block | LayoutKind::Inline => {
            if element.props.flag(property::HIDDEN) {
                return;
            }
            collect_atoms(&element.children, fonts, late, atoms);
        }
    }
}

fn push_late(
    text: RunText,
    element: &LayoutElement,
    fonts: &FontRegistry,
    late: &dyn Fn(&RunText) -> String,
    atoms: &mut Vec<Atom>,
) {
    let style = TextStyle::from_props(&element.props, fonts);
    let width = fonts.measure(&style.font, style.size, &late(&text));
    atoms.push(Atom::Word { text, style, width });
}

fn push_text_atoms(
    text: &str,
    style: &TextStyle,
    preserve: bool,
    fonts: &FontRegistry,
    atoms: &mut Vec<Atom>,
) {
    let space_width = fonts.measure(&style.font, style.size, " ");
    let mut word = String::new();
    let flush = |word: &mut String, atoms: &mut Vec<Atom>| {
        if word.is_empty() {
            return;
        }
        let width = fonts.measure(&style.font, style.size, word);
        atoms.push(Atom::Word {
            text: RunText::Literal(std::mem::take(word)),
            style: style.clone(),
            width,
        });
    };
    for ch in text.chars() {
        match ch {
            '\n' if preserve => {
                flush(&mut word, atoms);
                atoms.push(Atom::Break {
                    line_height: style.line_height,
                });
            }
            ' ' | '\t' | '\n' => {
                flush(&mut word, atoms);
                atoms.push(Atom::Space {
                    style: style.clone(),
                    width: space_width,
                    preserved: preserve,
                });
            }
            _ => word.push(ch),
        }
    }
    flush(&mut word, atoms);
}

pub fn measure_atoms(atoms: &[Atom]) -> (Pt, Pt) {
    let mut min = Pt::ZERO;
    let mut max = Pt::ZERO;
    let mut line = Pt::ZERO;
    for atom in atoms {
        match atom {
            Atom::Word { width, .. } | Atom::Image { width, .. } => {
                min = min.max(*width);
                line += *width;
            }
            Atom::Space { width, .. } => line += *width,
            Atom::Break { .. } => {
                max = max.max(line);
                line = Pt::ZERO;
            }
            Atom::Marker(_) => {}
        }
    }
    (min, max.max(line))
}

struct LineBuilder {
    lines: Vec<Line>,
    current: Line,
    pending_spaces: Vec<(TextStyle, Pt)>,
    available: Pt,
    first_indent: Pt,
    align: TextAlign,
}

impl LineBuilder {
    fn start(&self) -> Pt {
        if self.lines.is_empty() {
            self.first_indent
        } else {
            Pt::ZERO
        }
    }

    fn has_content(&self) -> bool {
        !self.current.items.is_empty()
    }

    fn cursor(&self) -> Pt {
        self.start() + self.current.width
    }

    fn pending_width(&self) -> Pt {
        self.pending_spaces.iter().map(|(_, width)| *width).sum()
    }

    fn flush_spaces(&mut self) {
        for (style, width) in std::mem::take(&mut self.pending_spaces) {
            let x = self.cursor();
            self.current.height = self.current.height.max(style.line_height);
            self.current.items.push(LineItem::Run(Run {
                x,
                width,
                text: RunText::Literal(" ".to_string()),
                style,
            }));
            self.current.width += width;
        }
    }

    fn fits(&self, width: Pt) -> bool {
        self.cursor() + self.pending_width() + width <= self.available
    }

    fn place(&mut self, item: LineItem, width: Pt, height: Pt) {
        if self.has_content() && !self.fits(width) {
            self.pending_spaces.clear();
            self.finish(false);
        }
        self.flush_spaces();
        self.current.height = self.current.height.max(height);
        self.current.items.push(item);
        self.current.width += width;
    }

    fn finish(&mut self, forced: bool) {
        self.pending_spaces.clear();
        let mut line = std::mem::take(&mut self.current);
        if line.items.is_empty() && !forced && line.markers.is_empty() {
            return;
        }
        let start = if self.lines.is_empty() {
            self.first_indent
        } else {
            Pt::ZERO
        };
        let slack = (self.available - start - line.width).max(Pt::ZERO);
        let offset = match self.align {
            TextAlign::Left => Pt::ZERO,
            TextAlign::Center => slack / 2,
            TextAlign::Right => slack,
        };
        if offset > Pt::ZERO {
            for item in &mut line.items {
                match item {
                    LineItem::Run(run) => run.x += offset,
                    LineItem::Image { x, .. } => *x += offset,
                }
            }
        }
        self.lines.push(line);
    }
}

// Breaks atoms into lines no wider than `available` where possible. Words
// wider than the line overflow on a line of their own. Whitespace-only
// input produces no line.
pub fn build_lines(atoms: Vec<Atom>, available: Pt, align: TextAlign, first_indent: Pt) -> Vec<Line> {
    let mut builder = LineBuilder {
        lines: Vec::new(),
        current: Line::default(),
        pending_spaces: Vec::new(),
        available,
        first_indent,
        align,
    };
    for atom in atoms {
        match atom {
            Atom::Word { text, style, width } => {
                let height = style.line_height;
                builder.place(
                    LineItem::Run(Run {
                        x: Pt::ZERO,
                        width,
                        text,
                        style,
                    }),
                    width,
                    height,
                );
                fix_last_x(&mut builder, width);
            }
            Atom::Image {
                resource,
                width,
                height,
            } => {
                builder.place(
                    LineItem::Image {
                        x: Pt::ZERO,
                        width,
                        height,
                        resource,
                    },
                    width,
                    height,
                );
                fix_last_x(&mut builder, width);
            }
            Atom::Space {
                style,
                width,
                preserved,
            } => {
                if builder.has_content() || preserved {
                    builder.pending_spaces.push((style, width));
                    if preserved && !builder.has_content() {
                        builder.flush_spaces();
                    }
                }
            }
            Atom::Break { line_height } => {
                builder.current.height = builder.current.height.max(line_height);
                builder.finish(true);
            }
            Atom::Marker(marker) => builder.current.markers.push(marker),
        }
    }
    builder.finish(false);
    builder.lines
}

fn fix_last_x(builder: &mut LineBuilder, width: Pt) {
    let x = builder.start() + builder.current.width - width;
    match builder.current.items.last_mut() {
        Some(LineItem::Run(run)) => run.x = x,
        Some(LineItem::Image { x: item_x, .. }) => *item_x = x,
        None => {}
    }
}
