use super::grid::{Bounds, Point};
use super::snake::Snake;
use crate::protocol::{DeltaState, MapState, PlayerDelta, PlayerState};
use crate::shared::time::now_millis;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub uid: String,
    pub name: String,
    pub color: String,
    pub in_game: bool,
    pub snake: Snake,
}

/// Changes produced by the most recent tick, plus joins recorded while the
/// round was current. Cleared at the start of the next tick, after the
/// command swap.
#[derive(Debug, Default)]
pub struct DeltaJournal {
    joined: BTreeSet<String>,
    died: Vec<String>,
    updated: BTreeSet<String>,
    added_foods: BTreeSet<Point>,
    removed_foods: BTreeSet<Point>,
}

impl DeltaJournal {
    fn clear(&mut self) {
        self.joined.clear();
        self.died.clear();
        self.updated.clear();
        self.added_foods.clear();
        self.removed_foods.clear();
    }

    /// Food add/remove cancel per cell so that replaying the journal always
    /// reproduces the fresh snapshot, even when a cell is emptied and
    /// refilled within one round.
    fn track_food_added(&mut self, cell: Point) {
        if !self.removed_foods.remove(&cell) {
            self.added_foods.insert(cell);
        }
    }

    fn track_food_removed(&mut self, cell: Point) {
        if !self.added_foods.remove(&cell) {
            self.removed_foods.insert(cell);
        }
    }
}

/// Authoritative world state. Guarded by the engine's state lock; request
/// handlers only ever see it through `snapshot` and `delta_state`.
#[derive(Debug)]
pub struct World {
    bounds: Bounds,
    players: BTreeMap<String, Player>,
    foods: BTreeSet<Point>,
    occupancy: HashMap<Point, u32>,
    round: u64,
    next_round_timestamp: i64,
    journal: DeltaJournal,
}

impl World {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            players: BTreeMap::new(),
            foods: BTreeSet::new(),
            occupancy: HashMap::new(),
            round: 0,
            next_round_timestamp: 0,
            journal: DeltaJournal::default(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn next_round_timestamp(&self) -> i64 {
        self.next_round_timestamp
    }

    pub fn set_next_round_timestamp(&mut self, timestamp: i64) {
        self.next_round_timestamp = timestamp;
    }

    pub fn increment_round(&mut self) {
        self.round += 1;
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    pub fn in_game_count(&self) -> usize {
        self.players.values().filter(|player| player.in_game).count()
    }

    /// Insert a freshly spawned player, index its body, and record the join
    /// in the current journal.
    pub fn insert_player(&mut self, player: Player) {
        debug_assert!(player.in_game);
        self.occupy_snake_cells(&player.snake);
        self.journal.joined.insert(player.id.clone());
        self.players.insert(player.id.clone(), player);
    }

    /// Drop a stale session record (re-join replacement). Not a death: no
    /// journal entry and no food drops, but a still-occupying body is
    /// released.
    pub fn remove_player(&mut self, id: &str) {
        if let Some(player) = self.players.remove(id) {
            if player.in_game {
                self.release_snake_cells(&player.snake);
            }
            self.journal.joined.remove(id);
            self.journal.updated.remove(id);
        }
    }

    /// Kill resolution: the player leaves the game, its body cells become
    /// food where no living snake still covers them, and the death is
    /// journaled.
    pub fn resolve_death(&mut self, id: &str) {
        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        if !player.in_game {
            return;
        }
        player.in_game = false;
        let snake = player.snake.clone();
        self.release_snake_cells(&snake);
        let drop_cells: Vec<Point> = snake
            .blocks()
            .filter(|cell| self.bounds.contains(*cell) && self.occupancy_count(*cell) == 0)
            .collect();
        for cell in drop_cells {
            self.add_food(cell);
        }
        if !self.journal.joined.remove(id) {
            self.journal.died.push(id.to_string());
        }
        self.journal.updated.remove(id);
    }

    pub fn track_update(&mut self, id: &str) {
        self.journal.updated.insert(id.to_string());
    }

    pub fn occupancy_count(&self, cell: Point) -> u32 {
        self.occupancy.get(&cell).copied().unwrap_or(0)
    }

    pub fn is_cell_occupied(&self, cell: Point) -> bool {
        self.occupancy_count(cell) > 0
    }

    pub fn occupy_cell(&mut self, cell: Point) {
        *self.occupancy.entry(cell).or_insert(0) += 1;
    }

    pub fn release_cell(&mut self, cell: Point) {
        if let Some(count) = self.occupancy.get_mut(&cell) {
            *count -= 1;
            if *count == 0 {
                self.occupancy.remove(&cell);
            }
        }
    }

    fn occupy_snake_cells(&mut self, snake: &Snake) {
        for cell in snake.blocks() {
            self.occupy_cell(cell);
        }
    }

    fn release_snake_cells(&mut self, snake: &Snake) {
        for cell in snake.blocks() {
            self.release_cell(cell);
        }
    }

    pub fn food_count(&self) -> usize {
        self.foods.len()
    }

    pub fn has_food(&self, cell: Point) -> bool {
        self.foods.contains(&cell)
    }

    pub fn add_food(&mut self, cell: Point) {
        if self.foods.insert(cell) {
            self.journal.track_food_added(cell);
        }
    }

    pub fn remove_food(&mut self, cell: Point) {
        if self.foods.remove(&cell) {
            self.journal.track_food_removed(cell);
        }
    }

    fn player_state(player: &Player) -> PlayerState {
        PlayerState {
            id: player.id.clone(),
            name: player.name.clone(),
            color: player.color.clone(),
            head: player.snake.head(),
            blocks: player.snake.blocks().collect(),
            length: player.snake.len() as u32,
            invincible_rounds: player.snake.invincible_rounds(),
        }
    }

    /// Internally consistent full snapshot of the current round.
    pub fn snapshot(&self) -> MapState {
        MapState {
            round: self.round,
            next_round_timestamp: self.next_round_timestamp,
            timestamp: now_millis(),
            players: self
                .players
                .values()
                .filter(|player| player.in_game)
                .map(Self::player_state)
                .collect(),
            foods: self.foods.iter().copied().collect(),
        }
    }

    /// The journal for the most recently completed round. Simplified player
    /// records are read from live state so that applying the delta to the
    /// previous snapshot reproduces the current one exactly.
    pub fn delta_state(&self) -> DeltaState {
        DeltaState {
            round: self.round,
            next_round_timestamp: self.next_round_timestamp,
            timestamp: now_millis(),
            died_players: self.journal.died.clone(),
            joined_players: self
                .journal
                .joined
                .iter()
                .filter_map(|id| self.players.get(id))
                .filter(|player| player.in_game)
                .map(Self::player_state)
                .collect(),
            players: self
                .journal
                .updated
                .iter()
                .filter(|id| !self.journal.joined.contains(*id))
                .filter_map(|id| self.players.get(id))
                .filter(|player| player.in_game)
                .map(|player| PlayerDelta {
                    id: player.id.clone(),
                    head: player.snake.head(),
                    length: player.snake.len() as u32,
                    invincible_rounds: player.snake.invincible_rounds(),
                })
                .collect(),
            added_foods: self.journal.added_foods.iter().copied().collect(),
            removed_foods: self.journal.removed_foods.iter().copied().collect(),
        }
    }

    /// Debug check: the occupancy index must equal the per-cell sum of all
    /// in-game bodies.
    #[cfg(test)]
    pub fn occupancy_is_consistent(&self) -> bool {
        let mut expected: HashMap<Point, u32> = HashMap::new();
        for player in self.players.values().filter(|player| player.in_game) {
            for cell in player.snake.blocks() {
                *expected.entry(cell).or_insert(0) += 1;
            }
        }
        expected == self.occupancy
    }

    /// Debug check: no food under any in-game body.
    #[cfg(test)]
    pub fn foods_clear_of_bodies(&self) -> bool {
        self.foods.iter().all(|cell| !self.is_cell_occupied(*cell))
    }
}
