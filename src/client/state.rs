//! Client-side view of the arena, advanced by full snapshots or delta
//! journals. Incoming records are defensively normalized: a player with an
//! empty block list is restored as a lone head.

use crate::game::grid::Point;
use crate::protocol::{DeltaState, MapState, PlayerState};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Applied,
    /// The journal skipped at least one round; a full refresh is required.
    RoundGap,
}

#[derive(Debug, Default, Clone)]
pub struct ClientState {
    players: HashMap<String, PlayerState>,
    foods: BTreeSet<Point>,
    my_id: String,
    map_width: i32,
    map_height: i32,
    round: u64,
    next_round_timestamp: i64,
}

fn normalize(mut player: PlayerState) -> PlayerState {
    if player.blocks.is_empty() {
        player.blocks.push(player.head);
    }
    player
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            map_width: 50,
            map_height: 50,
            ..Self::default()
        }
    }

    pub fn set_my_id(&mut self, id: &str) {
        self.my_id = id.to_string();
    }

    pub fn my_id(&self) -> &str {
        &self.my_id
    }

    pub fn set_map_size(&mut self, width: i32, height: i32) {
        self.map_width = width;
        self.map_height = height;
    }

    pub fn map_width(&self) -> i32 {
        self.map_width
    }

    pub fn map_height(&self) -> i32 {
        self.map_height
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn next_round_timestamp(&self) -> i64 {
        self.next_round_timestamp
    }

    pub fn my_snake(&self) -> Option<&PlayerState> {
        self.players.get(&self.my_id)
    }

    pub fn contains_me(&self) -> bool {
        self.players.contains_key(&self.my_id)
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn all_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn other_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players
            .values()
            .filter(move |player| player.id != self.my_id)
    }

    pub fn foods(&self) -> impl Iterator<Item = Point> + '_ {
        self.foods.iter().copied()
    }

    pub fn has_food(&self, cell: Point) -> bool {
        self.foods.contains(&cell)
    }

    pub fn is_valid_pos(&self, cell: Point) -> bool {
        cell.x >= 0 && cell.x < self.map_width && cell.y >= 0 && cell.y < self.map_height
    }

    /// Any snake body cell counts as an obstacle.
    pub fn has_obstacle(&self, cell: Point) -> bool {
        self.players.values().any(|player| player.contains(cell))
    }

    pub fn apply_full(&mut self, state: MapState) {
        self.round = state.round;
        self.next_round_timestamp = state.next_round_timestamp;
        self.players = state
            .players
            .into_iter()
            .map(|player| (player.id.clone(), normalize(player)))
            .collect();
        self.foods = state.foods.into_iter().collect();
    }

    pub fn apply_delta(&mut self, delta: DeltaState) -> DeltaOutcome {
        if delta.round > self.round + 1 {
            return DeltaOutcome::RoundGap;
        }
        self.round = delta.round;
        self.next_round_timestamp = delta.next_round_timestamp;

        for id in &delta.died_players {
            self.players.remove(id);
        }
        for player in delta.joined_players {
            self.players.insert(player.id.clone(), normalize(player));
        }
        for update in delta.players {
            let Some(player) = self.players.get_mut(&update.id) else {
                continue;
            };
            let target_length = update.length as usize;
            if player.head != update.head {
                // Head moved: the old tail vacates, and any growth shows up
                // as the new tail cell duplicated in place.
                player.blocks.insert(0, update.head);
                player.blocks.pop();
                while player.blocks.len() < target_length {
                    let tail = *player.blocks.last().unwrap_or(&update.head);
                    player.blocks.push(tail);
                }
                while player.blocks.len() > target_length {
                    player.blocks.pop();
                }
            } else if player.blocks.len() != target_length {
                // Length changed in place (food eaten): duplicate the tail.
                if player.blocks.is_empty() {
                    player.blocks.push(player.head);
                }
                while player.blocks.len() < target_length {
                    let tail = *player.blocks.last().unwrap_or(&player.head);
                    player.blocks.push(tail);
                }
                while player.blocks.len() > target_length {
                    player.blocks.pop();
                }
            }
            player.head = update.head;
            player.length = update.length;
            player.invincible_rounds = update.invincible_rounds;
        }
        for cell in &delta.removed_foods {
            self.foods.remove(cell);
        }
        for cell in delta.added_foods {
            self.foods.insert(cell);
        }
        DeltaOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, blocks: Vec<Point>) -> PlayerState {
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

    fn full_state(round: u64, players: Vec<PlayerState>, foods: Vec<Point>) -> MapState {
        MapState {
            round,
            next_round_timestamp: 1000,
            timestamp: 900,
            players,
            foods,
        }
    }

    #[test]
    fn empty_block_list_is_restored_to_a_lone_head() {
        let mut state = ClientState::new();
        let mut broken = player("p1", vec![Point::new(4, 4)]);
        broken.blocks.clear();
        state.apply_full(full_state(1, vec![broken], vec![]));
        let restored = state.player("p1").unwrap();
        assert_eq!(restored.blocks, vec![Point::new(4, 4)]);
    }

    #[test]
    fn delta_with_round_gap_is_refused() {
        let mut state = ClientState::new();
        state.apply_full(full_state(5, vec![], vec![]));
        let delta = DeltaState {
            round: 7,
            next_round_timestamp: 0,
            timestamp: 0,
            died_players: vec![],
            joined_players: vec![],
            players: vec![],
            added_foods: vec![],
            removed_foods: vec![],
        };
        assert_eq!(state.apply_delta(delta), DeltaOutcome::RoundGap);
        assert_eq!(state.round(), 5);
    }

    #[test]
    fn head_move_update_shifts_the_body() {
        let mut state = ClientState::new();
        state.apply_full(full_state(
            1,
            vec![player(
                "p1",
                vec![Point::new(5, 5), Point::new(4, 5), Point::new(3, 5)],
            )],
            vec![],
        ));
        let delta = DeltaState {
            round: 2,
            next_round_timestamp: 2000,
            timestamp: 1900,
            died_players: vec![],
            joined_players: vec![],
            players: vec![crate::protocol::PlayerDelta {
                id: "p1".to_string(),
                head: Point::new(6, 5),
                length: 3,
                invincible_rounds: 0,
            }],
            added_foods: vec![],
            removed_foods: vec![],
        };
        assert_eq!(state.apply_delta(delta), DeltaOutcome::Applied);
        let snake = state.player("p1").unwrap();
        assert_eq!(
            snake.blocks,
            vec![Point::new(6, 5), Point::new(5, 5), Point::new(4, 5)]
        );
    }

    #[test]
    fn growth_while_moving_duplicates_the_new_tail() {
        // Server-side the move pops the old tail and growth duplicates the
        // new one; the reconstruction must land on the same cells.
        let mut state = ClientState::new();
        state.apply_full(full_state(
            1,
            vec![player("p1", vec![Point::new(5, 5), Point::new(4, 5)])],
            vec![],
        ));
        let delta = DeltaState {
            round: 2,
            next_round_timestamp: 0,
            timestamp: 0,
            died_players: vec![],
            joined_players: vec![],
            players: vec![crate::protocol::PlayerDelta {
                id: "p1".to_string(),
                head: Point::new(6, 5),
                length: 3,
                invincible_rounds: 0,
            }],
            added_foods: vec![],
            removed_foods: vec![Point::new(6, 5)],
        };
        assert_eq!(state.apply_delta(delta), DeltaOutcome::Applied);
        let snake = state.player("p1").unwrap();
        assert_eq!(
            snake.blocks,
            vec![Point::new(6, 5), Point::new(5, 5), Point::new(5, 5)]
        );
    }

    #[test]
    fn growth_without_head_move_duplicates_the_tail() {
        let mut state = ClientState::new();
        state.apply_full(full_state(
            1,
            vec![player("p1", vec![Point::new(5, 5), Point::new(4, 5)])],
            vec![],
        ));
        let delta = DeltaState {
            round: 2,
            next_round_timestamp: 0,
            timestamp: 0,
            died_players: vec![],
            joined_players: vec![],
            players: vec![crate::protocol::PlayerDelta {
                id: "p1".to_string(),
                head: Point::new(5, 5),
                length: 3,
                invincible_rounds: 0,
            }],
            added_foods: vec![],
            removed_foods: vec![],
        };
        state.apply_delta(delta);
        let snake = state.player("p1").unwrap();
        assert_eq!(
            snake.blocks,
            vec![Point::new(5, 5), Point::new(4, 5), Point::new(4, 5)]
        );
    }

    #[test]
    fn deaths_and_food_changes_apply() {
        let mut state = ClientState::new();
        state.set_my_id("me");
        state.apply_full(full_state(
            1,
            vec![
                player("me", vec![Point::new(1, 1)]),
                player("p2", vec![Point::new(8, 8)]),
            ],
            vec![Point::new(3, 3)],
        ));
        let delta = DeltaState {
            round: 2,
            next_round_timestamp: 0,
            timestamp: 0,
            died_players: vec!["p2".to_string()],
            joined_players: vec![],
            players: vec![],
            added_foods: vec![Point::new(8, 8)],
            removed_foods: vec![Point::new(3, 3)],
        };
        state.apply_delta(delta);
        assert!(state.player("p2").is_none());
        assert!(state.contains_me());
        assert!(state.has_food(Point::new(8, 8)));
        assert!(!state.has_food(Point::new(3, 3)));
    }
}
