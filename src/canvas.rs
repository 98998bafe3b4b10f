use crate::style::FontDescriptor;
use crate::types::{Color, LinearShading, Px, Rect, Size};

/// Vertical anchor of a `DrawString` origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    /// `y` is the top of the em box.
    Top,
    /// `y` is the alphabetic baseline.
    Alphabetic,
}

/// Horizontal anchor of a `DrawString` origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Soft shadow painted under every fill while set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub opacity: f32,
    pub blur: Px,
    pub offset_x: Px,
    pub offset_y: Px,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered metadata, ignored by the rasterizer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    // Values outside 0..1 are clamped.
    SetOpacity(f32),
    SetFont(FontDescriptor),
    SetShadow(Shadow),
    ClearShadow,
    // Paints the whole surface with the shading.
    ShadingFill(LinearShading),
    MoveTo {
        x: Px,
        y: Px,
    },
    LineTo {
        x: Px,
        y: Px,
    },
    QuadTo {
        x1: Px,
        y1: Px,
        x: Px,
        y: Px,
    },
    ClosePath,
    // Fills and consumes the current path.
    Fill,
    DrawRect {
        x: Px,
        y: Px,
        width: Px,
        height: Px,
    },
    DrawString {
        x: Px,
        y: Px,
        text: String,
        align: TextAlign,
        baseline: TextBaseline,
    },
}

/// The recorded drawing of one card, in surface pixels with y pointing down.
#[derive(Debug, Clone, PartialEq)]
pub struct CardScene {
    pub size: Size,
    pub commands: Vec<Command>,
}

impl CardScene {
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.commands.iter().find_map(|command| match command {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Text of every `DrawString`, in drawing order.
    pub fn strings(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawString { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    opacity: f32,
    font: Option<FontDescriptor>,
    shadow: Option<Shadow>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            opacity: 1.0,
            font: None,
            shadow: None,
        }
    }
}

/// Records drawing commands for a single card. Redundant state changes are
/// dropped so scenes compare equal regardless of how they were issued.
pub struct Canvas {
    size: Size,
    commands: Vec<Command>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
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

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.commands.push(Command::SetFillColor(color));
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        let opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if self.current_state.opacity == opacity {
            return;
        }
        self.current_state.opacity = opacity;
        self.commands.push(Command::SetOpacity(opacity));
    }

    pub fn set_font(&mut self, font: &FontDescriptor) {
        if self.current_state.font.as_ref() == Some(font) {
            return;
        }
        self.current_state.font = Some(font.clone());
        self.commands.push(Command::SetFont(font.clone()));
    }

    pub fn set_shadow(&mut self, shadow: Shadow) {
        if self.current_state.shadow == Some(shadow) {
            return;
        }
        self.current_state.shadow = Some(shadow);
        self.commands.push(Command::SetShadow(shadow));
    }

    pub fn clear_shadow(&mut self) {
        if self.current_state.shadow.is_none() {
            return;
        }
        self.current_state.shadow = None;
        self.commands.push(Command::ClearShadow);
    }

    pub fn shading_fill(&mut self, shading: LinearShading) {
        self.commands.push(Command::ShadingFill(shading));
    }

    pub fn move_to(&mut self, x: Px, y: Px) {
        self.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Px, y: Px) {
        self.commands.push(Command::LineTo { x, y });
    }

    pub fn quad_to(&mut self, x1: Px, y1: Px, x: Px, y: Px) {
        self.commands.push(Command::QuadTo { x1, y1, x, y });
    }

    pub fn close_path(&mut self) {
        self.commands.push(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.commands.push(Command::Fill);
    }

    /// Appends a rounded rectangle path whose corners are quadratic curves
    /// through the rectangle's corner points.
    pub fn rounded_rect(&mut self, rect: Rect, radius: Px) {
        let half = rect.width.min(rect.height) / 2;
        let r = radius.max(Px::ZERO).min(half);
        let (x, y, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());
        self.move_to(x + r, y);
        self.line_to(right - r, y);
        self.quad_to(right, y, right, y + r);
        self.line_to(right, bottom - r);
        self.quad_to(right, bottom, right - r, bottom);
        self.line_to(x + r, bottom);
        self.quad_to(x, bottom, x, bottom - r);
        self.line_to(x, y + r);
        self.quad_to(x, y, x + r, y);
        self.close_path();
    }

    pub fn draw_rect(&mut self, rect: Rect) {
        self.commands.push(Command::DrawRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }

    pub fn draw_string(
        &mut self,
        x: Px,
        y: Px,
        text: impl Into<String>,
        align: TextAlign,
        baseline: TextBaseline,
    ) {
        self.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
            align,
            baseline,
        });
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn finish(self) -> CardScene {
        CardScene {
            size: self.size,
            commands: self.commands,
        }
    }
}
