use crate::types::{Color, Pt, Rect, Size};

/// Drawing operations in top-left-origin coordinates.
///
/// Coordinates are relative to the innermost open frame (or the page when no
/// frame is open); the PDF writer flips them into bottom-left space.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Opens a local coordinate space of the given height. `matrix` maps local
    // PDF space into the parent's PDF space.
    BeginFrame {
        matrix: [f32; 6],
        height: Pt,
    },
    EndFrame,
    SetFillColor(Color),
    SetFontName(String),
    SetFontSize(Pt),
    SetCharSpacing(Pt),
    ClipRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
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
        fit: ImageFit,
    },
}

/// How an image is scaled into its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFit {
    /// Stretch to the box.
    #[default]
    Fill,
    /// Scale to cover the box, keeping aspect ratio, and crop the overflow.
    Cover,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: Option<String>,
    pub page_size: Size,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    font_size: Pt,
    font_name: String,
    char_spacing: Pt,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            font_size: Pt::from_f32(12.0),
            font_name: "Helvetica".to_string(),
            char_spacing: Pt::ZERO,
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    frame_depth: usize,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::default(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
            frame_depth: 0,
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    /// Opens a local frame; graphics state set inside is discarded by
    /// [`Canvas::end_frame`].
    pub fn begin_frame(&mut self, matrix: [f32; 6], height: Pt) {
        self.state_stack.push(self.current_state.clone());
        self.frame_depth += 1;
        self.current
            .commands
            .push(Command::BeginFrame { matrix, height });
    }

    pub fn end_frame(&mut self) {
        if self.frame_depth == 0 {
            return;
        }
        self.frame_depth -= 1;
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
        }
        self.current.commands.push(Command::EndFrame);
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.current
            .commands
            .push(Command::SetFontName(self.current_state.font_name.clone()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.commands.push(Command::SetFontSize(size));
    }

    pub fn set_char_spacing(&mut self, spacing: Pt) {
        if self.current_state.char_spacing == spacing {
            return;
        }
        self.current_state.char_spacing = spacing;
        self.current.commands.push(Command::SetCharSpacing(spacing));
    }

    pub fn clip_rect(&mut self, rect: Rect) {
        self.current.commands.push(Command::ClipRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current
            .commands
            .push(Command::DrawString { x, y, text });
    }

    pub fn draw_rect(&mut self, rect: Rect) {
        self.current.commands.push(Command::DrawRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }

    pub fn draw_image(&mut self, rect: Rect, resource_id: impl Into<String>) {
        self.draw_image_fit(rect, resource_id, ImageFit::Fill);
    }

    pub fn draw_image_fit(&mut self, rect: Rect, resource_id: impl Into<String>, fit: ImageFit) {
        self.current.commands.push(Command::DrawImage {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            resource_id: resource_id.into(),
            fit,
        });
    }

    pub fn show_page(&mut self) {
        while self.frame_depth > 0 {
            self.end_frame();
        }
        let current = std::mem::take(&mut self.current);
        self.pages.push(current);
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn finish(mut self, title: Option<String>) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            title,
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_elided() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font_size(Pt::from_f32(6.0));
        canvas.set_font_size(Pt::from_f32(6.0));
        canvas.set_fill_color(Color::BLACK);
        assert_eq!(canvas.current_command_count(), 1);
    }

    #[test]
    fn frame_restores_font_state_on_close() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font_name("Arimo-Bold");
        canvas.begin_frame([1.0, 0.0, 0.0, 1.0, 0.0, 0.0], Pt::from_f32(10.0));
        canvas.set_font_name("CanvaSans");
        canvas.end_frame();
        canvas.set_font_name("Arimo-Bold");
        let doc = canvas.finish(None);
        let names = doc.pages[0]
            .commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::SetFontName(_)))
            .count();
        assert_eq!(names, 2);
    }

    #[test]
    fn show_page_closes_open_frames() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.begin_frame([1.0, 0.0, 0.0, 1.0, 0.0, 0.0], Pt::from_f32(10.0));
        canvas.show_page();
        let doc = canvas.finish(Some("t".into()));
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages[0].commands.last(), Some(&Command::EndFrame));
    }
}
