use super::grid::Direction;
use std::collections::HashMap;

/// Double-buffered move intake.
///
/// Handlers write into `current`; the tick engine swaps `current` into
/// `pending` exactly once at the start of each tick and executes from
/// `pending`. A command submitted during round R therefore always executes
/// at the R -> R+1 boundary, no matter which worker received it.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    current: HashMap<String, Direction>,
    pending: HashMap<String, Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCommand;

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// At most one command per player per round; the first submission wins.
    pub fn submit(
        &mut self,
        player_id: &str,
        direction: Direction,
    ) -> Result<(), DuplicateCommand> {
        if self.current.contains_key(player_id) {
            return Err(DuplicateCommand);
        }
        self.current.insert(player_id.to_string(), direction);
        Ok(())
    }

    /// First step of every tick: promote this round's intake for execution.
    pub fn swap(&mut self) {
        self.pending = std::mem::take(&mut self.current);
    }

    /// Drain the commands promoted by the last `swap`.
    pub fn take_pending(&mut self) -> HashMap<String, Direction> {
        std::mem::take(&mut self.pending)
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn forget(&mut self, player_id: &str) {
        self.current.remove(player_id);
        self.pending.remove(player_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submission_in_a_round_is_rejected() {
        let mut buffer = CommandBuffer::new();
        assert!(buffer.submit("p1", Direction::Up).is_ok());
        assert_eq!(buffer.submit("p1", Direction::Down), Err(DuplicateCommand));
        assert!(buffer.submit("p2", Direction::Left).is_ok());
        assert_eq!(buffer.current_len(), 2);

        buffer.swap();
        let pending = buffer.take_pending();
        // The first submission won.
        assert_eq!(pending.get("p1"), Some(&Direction::Up));
    }

    #[test]
    fn swap_opens_a_fresh_round() {
        let mut buffer = CommandBuffer::new();
        buffer.submit("p1", Direction::Up).unwrap();
        buffer.swap();
        assert_eq!(buffer.current_len(), 0);
        assert_eq!(buffer.pending_len(), 1);
        // Same player may submit again for the next round.
        assert!(buffer.submit("p1", Direction::Left).is_ok());
        let pending = buffer.take_pending();
        assert_eq!(pending.get("p1"), Some(&Direction::Up));
        assert_eq!(buffer.current_len(), 1);
    }

    #[test]
    fn forget_clears_both_buffers() {
        let mut buffer = CommandBuffer::new();
        buffer.submit("p1", Direction::Up).unwrap();
        buffer.swap();
        buffer.submit("p1", Direction::Down).unwrap();
        buffer.forget("p1");
        assert_eq!(buffer.current_len(), 0);
        assert!(buffer.take_pending().is_empty());
    }
}
