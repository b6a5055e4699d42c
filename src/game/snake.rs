use super::grid::{Direction, Point};
use std::collections::VecDeque;

/// Result of advancing a snake by one cell.
#[derive(Debug, Clone, Copy)]
pub struct MoveOutcome {
    pub new_head: Point,
    pub freed_tail: Point,
}

/// A snake body on the grid. The front of the deque is the head.
///
/// Growth duplicates the tail cell in place, so every move pops exactly one
/// tail cell and the occupancy refcount at the duplicated cell stays
/// balanced. Spawning builds the initial body the same way: `length` copies
/// of the spawn cell.
#[derive(Debug, Clone)]
pub struct Snake {
    blocks: VecDeque<Point>,
    facing: Option<Direction>,
    invincible_rounds: u32,
}

impl Snake {
    pub fn spawn(at: Point, length: usize, invincible_rounds: u32) -> Self {
        let length = length.max(1);
        let mut blocks = VecDeque::with_capacity(length);
        for _ in 0..length {
            blocks.push_back(at);
        }
        Self {
            blocks,
            facing: None,
            invincible_rounds,
        }
    }

    /// Test-only: a snake with an explicit body layout.
    #[cfg(test)]
    pub(crate) fn from_cells(
        cells: &[Point],
        facing: Option<Direction>,
        invincible_rounds: u32,
    ) -> Self {
        Self {
            blocks: cells.iter().copied().collect(),
            facing,
            invincible_rounds,
        }
    }

    pub fn head(&self) -> Point {
        // The body is never empty: spawn inserts at least one cell and
        // advance() pushes before popping.
        *self.blocks.front().unwrap_or(&Point::new(0, 0))
    }

    pub fn blocks(&self) -> impl Iterator<Item = Point> + '_ {
        self.blocks.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn facing(&self) -> Option<Direction> {
        self.facing
    }

    pub fn set_facing(&mut self, direction: Direction) {
        self.facing = Some(direction);
    }

    /// The cell the head enters on the next move, if the snake is moving.
    pub fn next_head(&self) -> Option<Point> {
        self.facing.map(|dir| self.head().step(dir))
    }

    /// Pre-move self-collision check against the full current body,
    /// including the tail cell that is about to vacate.
    pub fn bites_self(&self, next_head: Point) -> bool {
        self.blocks.contains(&next_head)
    }

    /// Advance one cell in the facing direction. Returns `None` when the
    /// snake has not started moving yet.
    pub fn advance(&mut self) -> Option<MoveOutcome> {
        let next_head = self.next_head()?;
        self.blocks.push_front(next_head);
        let freed_tail = self.blocks.pop_back()?;
        Some(MoveOutcome {
            new_head: next_head,
            freed_tail,
        })
    }

    /// Grow by one cell by duplicating the current tail. The duplicate is
    /// consumed by the tail pop of the next move. Returns the duplicated
    /// cell so the caller can bump its occupancy refcount.
    pub fn grow(&mut self) -> Option<Point> {
        let tail = self.blocks.back().copied()?;
        self.blocks.push_back(tail);
        Some(tail)
    }

    pub fn invincible_rounds(&self) -> u32 {
        self.invincible_rounds
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_rounds > 0
    }

    pub fn decay_invincibility(&mut self) -> u32 {
        if self.invincible_rounds > 0 {
            self.invincible_rounds -= 1;
        }
        self.invincible_rounds
    }
}
