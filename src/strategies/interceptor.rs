//! Hunter: locks onto the longest rival, projects its heading four steps
//! out, and cuts the corner to that point.

use super::{choose_direction_toward, infer_move_vector, is_safe_direction};
use crate::client::ClientState;
use crate::game::grid::{Direction, Point, ALL_DIRECTIONS};

const LOOKAHEAD_STEPS: i32 = 4;

pub fn decide(state: &ClientState) -> Direction {
    let Some(me) = state.my_snake() else {
        return Direction::Right;
    };
    let Some(target) = state
        .other_players()
        .max_by_key(|snake| snake.length)
    else {
        return Direction::Right;
    };

    let (dx, dy) = infer_move_vector(target, (1, 0));
    let predicted = Point::new(
        target.head.x + dx * LOOKAHEAD_STEPS,
        target.head.y + dy * LOOKAHEAD_STEPS,
    );

    // Prefer a safe step that closes on the intercept point.
    let mut best_safe: Option<(Direction, i32)> = None;
    for direction in ALL_DIRECTIONS {
        if !is_safe_direction(state, me.head, direction) {
            continue;
        }
        let dist = me.head.step(direction).manhattan_distance(predicted);
        if best_safe.is_none_or(|(_, best)| dist < best) {
            best_safe = Some((direction, dist));
        }
    }
    if let Some((direction, _)) = best_safe {
        return direction;
    }

    // Boxed in: charge the intercept point regardless.
    choose_direction_toward(state, me.head, predicted, false)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn cuts_ahead_of_the_longest_rival() {
        // Rival moving right along y=10; its projected point is (14,10).
        let rival = player(
            "rival",
            vec![Point::new(10, 10), Point::new(9, 10), Point::new(8, 10)],
        );
        let shrimp = player("shrimp", vec![Point::new(1, 1)]);
        let state = arena(
            player("me", vec![Point::new(12, 5), Point::new(12, 4)]),
            vec![rival, shrimp],
            vec![],
        );
        let direction = decide(&state);
        assert!(matches!(direction, Direction::Down | Direction::Right));
    }

    #[test]
    fn alone_in_the_arena_defaults_right() {
        let state = arena(player("me", vec![Point::new(5, 5)]), vec![], vec![]);
        assert_eq!(decide(&state), Direction::Right);
    }
}
