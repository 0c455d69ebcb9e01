use crate::resources::ImageResource;
use crate::types::{Color, Pt, Size};
use std::collections::BTreeMap;

// Drawing command in top-left page coordinates. Text `y` is the top of the
// em box; the PDF writer derives the baseline from the current font size.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub size: Size,
    pub bleed: Pt,
    pub commands: Vec<Command>,
}

impl Page {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            bleed: Pt::ZERO,
            commands: Vec::new(),
        }
    }

    pub fn strings(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawString { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.strings().iter().any(|text| text.contains(needle))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub pages: Vec<Page>,
    pub images: BTreeMap<String, ImageResource>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: "Helvetica".to_string(),
        }
    }
}

// Command recorder for one layer of one page. State setters are elided
// when they would not change the current graphics state.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    commands: Vec<Command>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.commands.push(Command::RestoreState);
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.commands
            .push(Command::SetFontName(self.current_state.font_name.clone()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.commands.push(Command::SetFontSize(size));
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.commands.push(Command::LineTo { x, y });
    }

    pub fn stroke(&mut self) {
        self.commands.push(Command::Stroke);
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.stroke();
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_commands(self) -> Vec<Command> {
        if self.commands.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.commands.len() + 2);
        out.push(Command::SaveState);
        out.extend(self.commands);
        out.push(Command::RestoreState);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_elided() {
        let mut canvas = Canvas::new();
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font_size(Pt::from_i32(12));
        assert!(canvas.is_empty());
        canvas.set_fill_color(Color::WHITE);
        canvas.set_fill_color(Color::WHITE);
        assert_eq!(canvas.command_count(), 1);
    }

    #[test]
    fn restore_returns_previous_state() {
        let mut canvas = Canvas::new();
        canvas.save_state();
        canvas.set_font_name("Courier");
        canvas.restore_state();
        canvas.set_font_name("Helvetica");
        assert_eq!(canvas.command_count(), 3);
    }

    #[test]
    fn layers_are_wrapped() {
        let mut canvas = Canvas::new();
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "x");
        let commands = canvas.into_commands();
        assert_eq!(commands.first(), Some(&Command::SaveState));
        assert_eq!(commands.last(), Some(&Command::RestoreState));
        assert!(Canvas::new().into_commands().is_empty());
    }

    #[test]
    fn page_strings() {
        let mut page = Page::new(Size::a4());
        page.commands.push(Command::DrawString {
            x: Pt::ZERO,
            y: Pt::ZERO,
            text: "Page 1 of 3".to_string(),
        });
        assert!(page.contains_text("1 of 3"));
        assert_eq!(page.strings(), vec!["Page 1 of 3"]);
    }
}
