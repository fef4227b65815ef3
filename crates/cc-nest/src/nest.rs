use cc_snake::Snake;
use log::debug;

use crate::{HandlerId, Seed, SnakeHandler};

/// All tracked cells of one sequence.
#[derive(Debug, Clone, Default)]
pub struct Nest {
    handlers: Vec<SnakeHandler>,
    next_id: u64,
}

impl Nest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, seed: Seed, start_frame: usize) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push(SnakeHandler::new(id, seed, start_frame));
        debug!("handler {id} added, starting at frame {start_frame}");
        id
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> Option<SnakeHandler> {
        let idx = self.handlers.iter().position(|h| h.id() == id)?;
        Some(self.handlers.remove(idx))
    }

    /// Drops dead handlers; returns how many were removed.
    pub fn clean(&mut self) -> usize {
        let before = self.handlers.len();
        self.handlers.retain(SnakeHandler::is_alive);
        before - self.handlers.len()
    }

    pub fn revive_all(&mut self) {
        for h in &mut self.handlers {
            h.revive();
        }
    }

    pub fn truncate_from(&mut self, frame: usize) {
        for h in &mut self.handlers {
            h.truncate_from(frame);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.handlers.iter().filter(|h| h.is_alive()).count()
    }

    pub fn get(&self, id: HandlerId) -> Option<&SnakeHandler> {
        self.handlers.iter().find(|h| h.id() == id)
    }

    pub fn get_mut(&mut self, id: HandlerId) -> Option<&mut SnakeHandler> {
        self.handlers.iter_mut().find(|h| h.id() == id)
    }

    pub fn handlers(&self) -> &[SnakeHandler] {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut [SnakeHandler] {
        &mut self.handlers
    }

    /// Live snakes of handlers taking part in `frame`, in handler order.
    pub fn live_snakes_mut(&mut self, frame: usize) -> Vec<&mut Snake> {
        self.handlers
            .iter_mut()
            .filter(|h| h.is_active_at(frame))
            .filter_map(SnakeHandler::live_mut)
            .collect()
    }
}
