//! Shadow: rides beside the longest snake at a stable side offset, eating
//! whatever its host flushes out.

use super::{any_safe_direction, choose_direction_toward, infer_move_vector, is_safe_direction};
use crate::client::ClientState;
use crate::game::grid::{Direction, Point};
use crate::protocol::PlayerState;

const SIDE_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone)]
pub struct Parasite {
    last_host_id: Option<String>,
    preferred_offset: (i32, i32),
}

impl Default for Parasite {
    fn default() -> Self {
        Self {
            last_host_id: None,
            preferred_offset: (1, 0),
        }
    }
}

impl Parasite {
    pub fn new() -> Self {
        Self::default()
    }

    fn choose_host<'a>(&self, state: &'a ClientState) -> Option<&'a PlayerState> {
        state.other_players().max_by_key(|snake| snake.length)
    }

    pub fn decide(&mut self, state: &ClientState) -> Direction {
        let Some(me) = state.my_snake() else {
            return Direction::Right;
        };
        let Some(host) = self.choose_host(state) else {
            return Direction::Right;
        };

        // A new host resets the preferred side, which keeps the bot from
        // zig-zagging between equivalent flanks.
        if self.last_host_id.as_deref() != Some(host.id.as_str()) {
            self.preferred_offset = (1, 0);
            self.last_host_id = Some(host.id.clone());
        }

        let (dx, dy) = infer_move_vector(host, (0, 0));
        let mut predicted_head = Point::new(host.head.x + dx, host.head.y + dy);
        if !state.is_valid_pos(predicted_head) {
            predicted_head = host.head;
        }

        // Candidate flank cells around the predicted head, preferred side
        // first.
        let mut side_targets = Vec::with_capacity(SIDE_OFFSETS.len() + 1);
        side_targets.push((
            Point::new(
                predicted_head.x + self.preferred_offset.0,
                predicted_head.y + self.preferred_offset.1,
            ),
            self.preferred_offset,
        ));
        for offset in SIDE_OFFSETS {
            if offset == self.preferred_offset {
                continue;
            }
            side_targets.push((
                Point::new(predicted_head.x + offset.0, predicted_head.y + offset.1),
                offset,
            ));
        }

        let mut best = predicted_head;
        let mut best_dist = i32::MAX;
        let mut best_offset = self.preferred_offset;
        for (cell, offset) in side_targets {
            if !state.is_valid_pos(cell) || state.has_obstacle(cell) {
                continue;
            }
            let dist = me.head.manhattan_distance(cell);
            if dist < best_dist {
                best_dist = dist;
                best = cell;
                best_offset = offset;
            }
        }
        if best_dist != i32::MAX {
            self.preferred_offset = best_offset;
        }

        let direction = choose_direction_toward(state, me.head, best, true);
        if is_safe_direction(state, me.head, direction) {
            return direction;
        }
        any_safe_direction(state, me.head)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn follows_the_longest_snake() {
        let host = player(
            "host",
            vec![Point::new(10, 10), Point::new(9, 10), Point::new(8, 10)],
        );
        let state = arena(
            player("me", vec![Point::new(5, 10), Point::new(4, 10)]),
            vec![host],
            vec![],
        );
        let mut parasite = Parasite::new();
        let direction = parasite.decide(&state);
        assert_eq!(direction, Direction::Right);
        assert_eq!(parasite.last_host_id.as_deref(), Some("host"));
    }

    #[test]
    fn host_switch_resets_the_preferred_side() {
        let first_host = player(
            "a",
            vec![Point::new(10, 10), Point::new(9, 10), Point::new(8, 10)],
        );
        let state = arena(
            player("me", vec![Point::new(5, 10)]),
            vec![first_host],
            vec![],
        );
        let mut parasite = Parasite::new();
        parasite.preferred_offset = (0, 1);
        parasite.decide(&state);

        let bigger_host = player(
            "b",
            vec![
                Point::new(3, 3),
                Point::new(2, 3),
                Point::new(1, 3),
                Point::new(0, 3),
            ],
        );
        let state = arena(
            player("me", vec![Point::new(5, 10)]),
            vec![bigger_host],
            vec![],
        );
        parasite.decide(&state);
        assert_eq!(parasite.last_host_id.as_deref(), Some("b"));
    }
}
