use std::collections::BTreeMap;
use std::fmt;

use cc_core::Point2d;
use cc_snake::Snake;
use serde::{Deserialize, Serialize};

use crate::Seed;

/// Identifier assigned by [`crate::Nest`], never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerState {
    Alive,
    Dead { frame: usize },
}

/// Progress of one handler through the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameState {
    Seeded,
    Iterating,
    Converged,
    Aborted,
    Finalized,
    Dead,
}

/// Tracks one cell across frames.
///
/// `segmented` holds contours before the filter chain, `finals` after it.
/// Both only change through [`SnakeHandler::store`] and
/// [`SnakeHandler::truncate_from`].
#[derive(Debug, Clone)]
pub struct SnakeHandler {
    id: HandlerId,
    seed: Seed,
    start_frame: usize,
    end_frame: Option<usize>,
    live: Option<Snake>,
    segmented: BTreeMap<usize, Snake>,
    finals: BTreeMap<usize, Snake>,
    state: HandlerState,
    frame_state: Option<FrameState>,
}

impl SnakeHandler {
    pub fn new(id: HandlerId, seed: Seed, start_frame: usize) -> Self {
        Self {
            id,
            seed,
            start_frame,
            end_frame: None,
            live: None,
            segmented: BTreeMap::new(),
            finals: BTreeMap::new(),
            state: HandlerState::Alive,
            frame_state: None,
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    /// Last frame with a stored result.
    pub fn end_frame(&self) -> Option<usize> {
        self.end_frame
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == HandlerState::Alive
    }

    /// Whether the handler takes part in `frame`. A handler that died at or
    /// after `frame` takes part again when that frame is re-segmented.
    pub fn is_active_at(&self, frame: usize) -> bool {
        frame >= self.start_frame
            && match self.state {
                HandlerState::Alive => true,
                HandlerState::Dead { frame: died } => died >= frame,
            }
    }

    pub fn frame_state(&self) -> Option<FrameState> {
        self.frame_state
    }

    pub fn set_frame_state(&mut self, state: FrameState) {
        self.frame_state = Some(state);
    }

    pub fn live(&self) -> Option<&Snake> {
        self.live.as_ref()
    }

    pub fn live_mut(&mut self) -> Option<&mut Snake> {
        self.live.as_mut()
    }

    pub fn set_live(&mut self, snake: Option<Snake>) {
        self.live = snake;
    }

    pub fn segmented(&self, frame: usize) -> Option<&Snake> {
        self.segmented.get(&frame)
    }

    pub fn final_snake(&self, frame: usize) -> Option<&Snake> {
        self.finals.get(&frame)
    }

    pub fn final_polygon(&self, frame: usize) -> Option<Vec<Point2d>> {
        self.finals.get(&frame).map(Snake::as_polygon)
    }

    /// Final contours in frame order.
    pub fn finals(&self) -> impl Iterator<Item = (usize, &Snake)> {
        self.finals.iter().map(|(&f, s)| (f, s))
    }

    /// Records the results of `frame`, replacing anything stored from
    /// `frame` on.
    pub fn store(&mut self, frame: usize, segmented: Snake, final_snake: Snake) {
        self.truncate_from(frame);
        self.segmented.insert(frame, segmented);
        self.finals.insert(frame, final_snake);
        self.end_frame = Some(frame);
    }

    /// Marks the handler dead at `frame`, dropping results from `frame` on.
    pub fn kill(&mut self, frame: usize) {
        self.truncate_from(frame);
        self.state = HandlerState::Dead { frame };
        self.frame_state = Some(FrameState::Dead);
        if let Some(s) = self.live.as_mut() {
            s.kill();
        }
    }

    /// Drops results from `frame` on. A handler that died at or after
    /// `frame` comes back alive.
    pub fn truncate_from(&mut self, frame: usize) {
        self.segmented.retain(|&f, _| f < frame);
        self.finals.retain(|&f, _| f < frame);
        self.end_frame = self.finals.keys().next_back().copied();
        if let HandlerState::Dead { frame: died } = self.state
            && died >= frame
        {
            self.state = HandlerState::Alive;
        }
    }

    /// Brings a dead handler back; it resumes from its last final contour,
    /// or from the seed.
    pub fn revive(&mut self) {
        self.state = HandlerState::Alive;
        self.frame_state = None;
    }
}
