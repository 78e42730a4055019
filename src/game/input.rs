//! Input Capture
//!
//! Device-independent input frames, the controller table and recorded input
//! playback. Device polling itself lives behind [`InputSource`].

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

/// Number of controller slots.
pub const MAX_CONTROLLERS: usize = 4;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Input state for a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Horizontal movement: -1 (left) to +1 (right)
    pub move_x: f32,

    /// Vertical movement: -1 (up) to +1 (down), screen coordinates
    pub move_y: f32,

    /// Button flags (packed bits):
    /// - Bit 0: Pause held
    /// - Bit 1: Next player held
    /// - Bit 2: Previous player held
    pub flags: u8,
}

impl InputFrame {
    /// Pause flag bit
    pub const FLAG_PAUSE: u8 = 0x01;

    /// Next player flag bit
    pub const FLAG_NEXT: u8 = 0x02;

    /// Previous player flag bit
    pub const FLAG_PREV: u8 = 0x04;

    /// Create an idle frame.
    pub const fn new() -> Self {
        Self {
            move_x: 0.0,
            move_y: 0.0,
            flags: 0,
        }
    }

    /// Create input with a movement direction.
    pub const fn with_movement(move_x: f32, move_y: f32) -> Self {
        Self {
            move_x,
            move_y,
            flags: 0,
        }
    }

    /// Movement vector with each axis clamped to `[-1, 1]`.
    ///
    /// Non-finite axes read as zero.
    #[inline]
    pub fn move_direction(&self) -> Vec2 {
        Vec2::new(clamp_axis(self.move_x), clamp_axis(self.move_y))
    }

    /// Check if pause is held.
    #[inline]
    pub fn pause_pressed(&self) -> bool {
        self.flags & Self::FLAG_PAUSE != 0
    }

    /// Check if next player is held.
    #[inline]
    pub fn next_held(&self) -> bool {
        self.flags & Self::FLAG_NEXT != 0
    }

    /// Check if previous player is held.
    #[inline]
    pub fn prev_held(&self) -> bool {
        self.flags & Self::FLAG_PREV != 0
    }

    /// Set or clear a flag bit.
    #[inline]
    pub fn set_flag(&mut self, flag: u8, held: bool) {
        if held {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// Check if this is an idle frame (no movement, no buttons).
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.move_direction().is_zero() && self.flags == 0
    }
}

fn clamp_axis(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Input errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Controller index outside the table (reported 1-based).
    #[error("Player {} is an invalid player.", .0 + 1)]
    InvalidPlayer(usize),
}

// =============================================================================
// INPUT SOURCES
// =============================================================================

/// Something that produces one input frame per tick.
pub trait InputSource: Send {
    /// Read the input for the current tick.
    fn poll(&mut self) -> InputFrame;
}

/// Source that never produces input.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn poll(&mut self) -> InputFrame {
        InputFrame::new()
    }
}

/// Fires once per press: true on the first held poll, false until released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeLatch {
    held: bool,
}

impl EdgeLatch {
    /// Feed the current button state; returns true on a rising edge.
    pub fn rising(&mut self, down: bool) -> bool {
        let fired = down && !self.held;
        self.held = down;
        fired
    }
}

/// A controller slot: an input source plus edge-latched buttons.
pub struct Controller {
    source: Box<dyn InputSource>,
    frame: InputFrame,
    next: EdgeLatch,
    prev: EdgeLatch,
    next_fired: bool,
    prev_fired: bool,
}

impl Controller {
    /// Wrap an input source.
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            frame: InputFrame::new(),
            next: EdgeLatch::default(),
            prev: EdgeLatch::default(),
            next_fired: false,
            prev_fired: false,
        }
    }

    /// Poll the source once for this tick.
    pub fn update(&mut self) -> InputFrame {
        self.frame = self.source.poll();
        self.next_fired = self.next.rising(self.frame.next_held());
        self.prev_fired = self.prev.rising(self.frame.prev_held());
        self.frame
    }

    /// Frame read by the last [`update`](Self::update).
    pub fn frame(&self) -> InputFrame {
        self.frame
    }

    /// Movement vector of the last frame.
    pub fn move_direction(&self) -> Vec2 {
        self.frame.move_direction()
    }

    /// Whether pause is held.
    pub fn pause_pressed(&self) -> bool {
        self.frame.pause_pressed()
    }

    /// Next player was pressed this tick.
    pub fn next_player(&self) -> bool {
        self.next_fired
    }

    /// Previous player was pressed this tick.
    pub fn prev_player(&self) -> bool {
        self.prev_fired
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Box::new(IdleInput))
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("frame", &self.frame)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .finish()
    }
}

/// Fixed table of controller slots, indexed from 0.
#[derive(Debug, Default)]
pub struct ControllerTable {
    slots: [Controller; MAX_CONTROLLERS],
}

impl ControllerTable {
    /// Create a table of idle controllers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source behind a slot.
    pub fn attach(&mut self, index: usize, source: Box<dyn InputSource>) -> Result<(), InputError> {
        let slot = self.get_mut(index)?;
        *slot = Controller::new(source);
        Ok(())
    }

    /// Get a controller.
    pub fn get(&self, index: usize) -> Result<&Controller, InputError> {
        self.slots.get(index).ok_or(InputError::InvalidPlayer(index))
    }

    /// Get a controller mutably.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut Controller, InputError> {
        self.slots.get_mut(index).ok_or(InputError::InvalidPlayer(index))
    }

    /// Poll every slot.
    pub fn update_all(&mut self) {
        for slot in &mut self.slots {
            slot.update();
        }
    }
}

// =============================================================================
// RECORDING
// =============================================================================

/// Input change recorded at a tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputDelta {
    /// Tick when this input state began
    pub tick: u32,
    /// The new input state
    pub frame: InputFrame,
}

/// Input recording that stores only the ticks where input changed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputRecording {
    /// Last recorded tick
    pub end_tick: u32,

    deltas: Vec<InputDelta>,

    #[serde(skip)]
    last_frame: InputFrame,
}

impl InputRecording {
    /// Create an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame per tick, starting at tick 0.
    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = InputFrame>,
    {
        let mut recording = Self::new();
        for (tick, frame) in frames.into_iter().enumerate() {
            recording.record(tick as u32, frame);
        }
        recording
    }

    /// Record input for a tick. Stored only when it differs from the last one.
    pub fn record(&mut self, tick: u32, frame: InputFrame) {
        self.end_tick = tick;

        if frame != self.last_frame {
            self.deltas.push(InputDelta { tick, frame });
            self.last_frame = frame;
        }
    }

    /// Input in effect at a tick.
    pub fn get_input_at(&self, tick: u32) -> InputFrame {
        // Last delta at or before this tick
        let idx = self.deltas.partition_point(|d| d.tick <= tick);
        match idx {
            0 => InputFrame::new(),
            _ => self.deltas[idx - 1].frame,
        }
    }

    /// Stored changes.
    pub fn deltas(&self) -> &[InputDelta] {
        &self.deltas
    }
}

/// Plays back a recording, one tick per poll. Holds the last frame after the
/// recording ends.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    recording: InputRecording,
    tick: u32,
}

impl ScriptedInput {
    /// Play back a recording from tick 0.
    pub fn new(recording: InputRecording) -> Self {
        Self { recording, tick: 0 }
    }

    /// Play back one frame per tick.
    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = InputFrame>,
    {
        Self::new(InputRecording::from_frames(frames))
    }

    /// Tick the next poll will read.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Check if playback passed the last recorded tick.
    pub fn is_finished(&self) -> bool {
        self.tick > self.recording.end_tick
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputFrame {
        let frame = self.recording.get_input_at(self.tick);
        self.tick = self.tick.saturating_add(1);
        frame
    }
}

// =============================================================================
// TESTS
// =============================================================================
