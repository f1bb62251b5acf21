use crate::audio::ToneEmitter;
use avsync_core::Element;
use avsync_experiment::{StimulusOutput, VisibleSet};
use std::sync::Arc;
use winit::window::Window;

/// Screen and speaker as seen by the stimulus clock. Visibility changes are
/// picked up by the next redraw.
pub struct ScreenOutput {
    visible: VisibleSet,
    tone: ToneEmitter,
    window: Option<Arc<Window>>,
}

impl ScreenOutput {
    pub fn new(tone: ToneEmitter) -> Self {
        Self {
            visible: VisibleSet::default(),
            tone,
            window: None,
        }
    }

    pub fn attach(&mut self, window: Arc<Window>) {
        self.window = Some(window);
    }

    pub fn visible(&self) -> VisibleSet {
        self.visible
    }

    fn set(&mut self, element: Element, visible: bool) {
        if self.visible.is_visible(element) != visible {
            self.visible.set(element, visible);
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }
}

impl StimulusOutput for ScreenOutput {
    fn show(&mut self, element: Element) {
        self.set(element, true);
    }

    fn hide(&mut self, element: Element) {
        self.set(element, false);
    }

    fn emit_tone(&mut self) {
        self.tone.beep();
    }
}
