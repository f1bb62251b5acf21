use avsync_core::Element;
use avsync_timing::Timer;

/// Presentation side the stimulus clock drives. Calls happen on the
/// clock's tick and must return promptly.
pub trait StimulusOutput {
    fn show(&mut self, element: Element);
    fn hide(&mut self, element: Element);
    fn emit_tone(&mut self);
}

/// Which elements are currently on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibleSet {
    pub fixation: bool,
    pub stimulus: bool,
    pub response_controls: bool,
}

impl VisibleSet {
    pub fn set(&mut self, element: Element, visible: bool) {
        match element {
            Element::Fixation => self.fixation = visible,
            Element::Stimulus => self.stimulus = visible,
            Element::ResponseControls => self.response_controls = visible,
        }
    }

    pub fn is_visible(&self, element: Element) -> bool {
        match element {
            Element::Fixation => self.fixation,
            Element::Stimulus => self.stimulus,
            Element::ResponseControls => self.response_controls,
        }
    }

    pub fn is_blank(&self) -> bool {
        !(self.fixation || self.stimulus || self.response_controls)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Show(Element),
    Hide(Element),
    Tone,
}

/// Output that stamps every cue with the time it was issued.
#[derive(Debug, Clone)]
pub struct RecordingOutput<T: Timer> {
    timer: T,
    pub visible: VisibleSet,
    pub cues: Vec<(u64, Cue)>,
}

impl<T: Timer> RecordingOutput<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            visible: VisibleSet::default(),
            cues: Vec::new(),
        }
    }

    /// Times (ns) at which `cue` was issued, oldest first.
    pub fn times_of(&self, cue: Cue) -> Vec<u64> {
        self.cues
            .iter()
            .filter(|(_, c)| *c == cue)
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn tones(&self) -> usize {
        self.times_of(Cue::Tone).len()
    }

    pub fn clear(&mut self) {
        self.cues.clear();
    }
}

impl<T: Timer> StimulusOutput for RecordingOutput<T> {
    fn show(&mut self, element: Element) {
        self.visible.set(element, true);
        self.cues.push((self.timer.now(), Cue::Show(element)));
    }

    fn hide(&mut self, element: Element) {
        self.visible.set(element, false);
        self.cues.push((self.timer.now(), Cue::Hide(element)));
    }

    fn emit_tone(&mut self) {
        self.cues.push((self.timer.now(), Cue::Tone));
    }
}
