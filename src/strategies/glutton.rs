//! Aggressive food racer: scores every food by how contested it is and
//! sprints for the best one with almost no obstacle avoidance.

use super::{choose_direction_toward, infer_move_vector, is_safe_direction};
use crate::client::ClientState;
use crate::game::grid::{Direction, Point};
use crate::protocol::PlayerState;

/// One-step lookahead for a rival: if its inferred next cell is legal, use
/// the closer of the current and projected distances.
fn estimate_one_step_dist(state: &ClientState, snake: &PlayerState, target: Point) -> i32 {
    let now_dist = snake.head.manhattan_distance(target);
    let (dx, dy) = infer_move_vector(snake, (0, 0));
    let next = Point::new(snake.head.x + dx, snake.head.y + dy);
    if !state.is_valid_pos(next) || state.has_obstacle(next) {
        return now_dist;
    }
    now_dist.min(next.manhattan_distance(target))
}

pub fn decide(state: &ClientState) -> Direction {
    let Some(me) = state.my_snake() else {
        return Direction::Right;
    };
    let foods: Vec<Point> = state.foods().collect();
    if foods.is_empty() {
        return Direction::Right;
    }

    let mut best_food = foods[0];
    let mut best_score = i32::MIN;
    let mut best_my_dist = i32::MAX;

    for &food in &foods {
        let my_dist = me.head.manhattan_distance(food);
        let mut other_min_dist = i32::MAX;
        for other in state.other_players() {
            other_min_dist = other_min_dist.min(estimate_one_step_dist(state, other, food));
        }
        // With no rivals, treat the contest distance as large.
        if other_min_dist == i32::MAX {
            other_min_dist = 200;
        }

        let mut score = -my_dist;
        if my_dist < other_min_dist {
            score += 100;
        }
        // Hot foods that rivals are close to are worth contesting.
        score += 100 - other_min_dist;

        let toward = choose_direction_toward(state, me.head, food, false);
        if !is_safe_direction(state, me.head, toward) {
            score -= 25;
        }

        if score > best_score || (score == best_score && my_dist < best_my_dist) {
            best_score = score;
            best_my_dist = my_dist;
            best_food = food;
        }
    }

    choose_direction_toward(state, me.head, best_food, false)
}
