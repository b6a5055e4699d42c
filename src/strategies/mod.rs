//! Demo bot strategies and the direction utilities they share.

pub mod glutton;
pub mod interceptor;
pub mod parasite;
pub mod patroller;

use crate::client::ClientState;
use crate::game::grid::{Direction, Point, ALL_DIRECTIONS};
use crate::protocol::PlayerState;

/// A direction is safe when the next cell is inside the map and free of
/// snake bodies.
pub fn is_safe_direction(state: &ClientState, head: Point, direction: Direction) -> bool {
    let next = head.step(direction);
    state.is_valid_pos(next) && !state.has_obstacle(next)
}

/// Greedy step selection toward a target, optionally restricted to safe
/// cells.
pub fn choose_direction_toward(
    state: &ClientState,
    from: Point,
    target: Point,
    safe_only: bool,
) -> Direction {
    let mut best = Direction::Right;
    let mut best_dist = i32::MAX;
    for direction in ALL_DIRECTIONS {
        let next = from.step(direction);
        if !state.is_valid_pos(next) {
            continue;
        }
        if safe_only && state.has_obstacle(next) {
            continue;
        }
        let dist = next.manhattan_distance(target);
        if dist < best_dist {
            best_dist = dist;
            best = direction;
        }
    }
    best
}

/// Last-move vector inferred from head and neck.
pub(crate) fn infer_move_vector(snake: &PlayerState, fallback: (i32, i32)) -> (i32, i32) {
    if snake.blocks.len() < 2 {
        return fallback;
    }
    let head = snake.blocks[0];
    let neck = snake.blocks[1];
    (head.x - neck.x, head.y - neck.y)
}

/// Any safe direction, falling back to `Right` when boxed in.
pub(crate) fn any_safe_direction(state: &ClientState, head: Point) -> Direction {
    for direction in ALL_DIRECTIONS {
        if is_safe_direction(state, head, direction) {
            return direction;
        }
    }
    Direction::Right
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::protocol::MapState;

    pub fn player(id: &str, blocks: Vec<Point>) -> PlayerState {
        PlayerState {
            id: id.to_string(),
            name: id.to_string(),
            color: "#fff".to_string(),
            head: blocks.first().copied().unwrap_or_default(),
            length: blocks.len() as u32,
            blocks,
            invincible_rounds: 0,
        }
    }

    pub fn arena(me: PlayerState, others: Vec<PlayerState>, foods: Vec<Point>) -> ClientState {
        let my_id = me.id.clone();
        let mut players = vec![me];
        players.extend(others);
        let mut state = ClientState::new();
        state.set_my_id(&my_id);
        state.set_map_size(20, 20);
        state.apply_full(MapState {
            round: 1,
            next_round_timestamp: 0,
            timestamp: 0,
            players,
            foods,
        });
        state
    }
}
