//! Territorial: claims a quadrant rectangle derived from its own id and
//! walks the perimeter, using BFS for the shortest way back on course.

use super::{any_safe_direction, choose_direction_toward, is_safe_direction};
use crate::client::ClientState;
use crate::game::grid::{Direction, Point, ALL_DIRECTIONS};
use std::collections::VecDeque;

const PATROL_MARGIN: i32 = 4;

#[derive(Debug, Clone)]
struct PatrolRect {
    min_x: i32,
    max_x: i32,
    min_y: i32,
    max_y: i32,
    index: usize,
}

impl PatrolRect {
    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }
}

/// FNV-1a over the player id: every snake gets a stable quadrant of its
/// own.
fn hash_id(id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in id.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn build_rect(id: &str, map_width: i32, map_height: i32) -> PatrolRect {
    let width = map_width.max(20);
    let height = map_height.max(20);
    let hash = hash_id(id);
    let quad_x = (hash & 1) as i32;
    let quad_y = ((hash >> 1) & 1) as i32;

    let half_w = width / 2;
    let half_h = height / 2;
    let x0 = if quad_x == 0 { 0 } else { half_w };
    let x1 = if quad_x == 0 { half_w - 1 } else { width - 1 };
    let y0 = if quad_y == 0 { 0 } else { half_h };
    let y1 = if quad_y == 0 { half_h - 1 } else { height - 1 };

    let mut rect = PatrolRect {
        min_x: (x0 + PATROL_MARGIN).clamp(0, width - 1),
        max_x: (x1 - PATROL_MARGIN).clamp(0, width - 1),
        min_y: (y0 + PATROL_MARGIN).clamp(0, height - 1),
        max_y: (y1 - PATROL_MARGIN).clamp(0, height - 1),
        index: 0,
    };
    if rect.min_x >= rect.max_x {
        rect.min_x = x0.max(0);
        rect.max_x = x1.min(width - 1);
    }
    if rect.min_y >= rect.max_y {
        rect.min_y = y0.max(0);
        rect.max_y = y1.min(height - 1);
    }
    rect
}

/// First step of a shortest path from `start` to `target`. The target cell
/// itself is allowed to be occupied so the search cannot become eternally
/// unreachable.
fn bfs_first_step(state: &ClientState, start: Point, target: Point) -> Direction {
    if start == target {
        return Direction::Right;
    }
    let width = state.map_width();
    let height = state.map_height();
    if width <= 0 || height <= 0 {
        return Direction::Right;
    }
    let index = |point: Point| (point.y * width + point.x) as usize;

    let mut prev = vec![usize::MAX; (width * height) as usize];
    let mut queue = VecDeque::new();
    queue.push_back(start);
    prev[index(start)] = index(start);

    while let Some(current) = queue.pop_front() {
        for direction in ALL_DIRECTIONS {
            let next = current.step(direction);
            if !state.is_valid_pos(next) {
                continue;
            }
            if next != target && state.has_obstacle(next) {
                continue;
            }
            let next_id = index(next);
            if prev[next_id] != usize::MAX {
                continue;
            }
            prev[next_id] = index(current);

            if next == target {
                // Walk back to the step adjacent to the start.
                let start_id = index(start);
                let mut cursor = next_id;
                let mut parent = prev[cursor];
                while parent != start_id {
                    cursor = parent;
                    parent = prev[cursor];
                    if parent == usize::MAX {
                        return Direction::Right;
                    }
                }
                let step = Point::new(cursor as i32 % width, cursor as i32 / width);
                return match (step.x - start.x, step.y - start.y) {
                    (0, -1) => Direction::Up,
                    (0, 1) => Direction::Down,
                    (-1, 0) => Direction::Left,
                    (1, 0) => Direction::Right,
                    _ => Direction::Right,
                };
            }
            queue.push_back(next);
        }
    }
    Direction::Right
}

#[derive(Debug, Clone, Default)]
pub struct Patroller {
    rect: Option<PatrolRect>,
}

impl Patroller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decide(&mut self, state: &ClientState) -> Direction {
        let Some(me) = state.my_snake() else {
            return Direction::Right;
        };
        let head = me.head;
        let rect = self
            .rect
            .get_or_insert_with(|| build_rect(&me.id, state.map_width(), state.map_height()));

        let corners = rect.corners();
        let mut target = corners[rect.index];
        if head == target {
            rect.index = (rect.index + 1) % corners.len();
            target = corners[rect.index];
        }

        let mut direction = bfs_first_step(state, head, target);
        if !is_safe_direction(state, head, direction) {
            // Shortest path is blocked right now; fall back to local greed.
            direction = choose_direction_toward(state, head, target, true);
        }
        if is_safe_direction(state, head, direction) {
            return direction;
        }
        any_safe_direction(state, head)
    }
}
