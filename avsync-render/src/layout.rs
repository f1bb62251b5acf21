use avsync_core::{PointerPosition, UserResponse};
use tiny_skia::Rect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Button {
    pub response: UserResponse,
    pub label: &'static str,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Button {
    pub fn contains(&self, pos: PointerPosition) -> bool {
        let (x, y) = (pos.x as f32, pos.y as f32);
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn rect(&self) -> Option<Rect> {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

/// The two response controls, side by side below the stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseLayout {
    buttons: [Button; 2],
}

impl ResponseLayout {
    pub const BUTTON_WIDTH: f32 = 220.0;
    pub const BUTTON_HEIGHT: f32 = 64.0;
    pub const GAP: f32 = 40.0;
    /// Distance from the screen center to the top of the buttons.
    pub const OFFSET_Y: f32 = 160.0;

    pub fn new(width: u32, height: u32) -> Self {
        let (cx, cy) = (width as f32 * 0.5, height as f32 * 0.5);
        let top = (cy + Self::OFFSET_Y).min(height as f32 - Self::BUTTON_HEIGHT).max(0.0);
        let button = |response, label, x| Button {
            response,
            label,
            x,
            y: top,
            width: Self::BUTTON_WIDTH,
            height: Self::BUTTON_HEIGHT,
        };
        Self {
            buttons: [
                button(
                    UserResponse::Together,
                    "Together",
                    cx - Self::GAP * 0.5 - Self::BUTTON_WIDTH,
                ),
                button(UserResponse::Delay, "Delay", cx + Self::GAP * 0.5),
            ],
        }
    }

    pub fn buttons(&self) -> &[Button; 2] {
        &self.buttons
    }

    /// Which control, if any, lies under the pointer.
    pub fn hit(&self, pos: PointerPosition) -> Option<UserResponse> {
        self.buttons
            .iter()
            .find(|b| b.contains(pos))
            .map(|b| b.response)
    }
}
