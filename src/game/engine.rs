use super::commands::CommandBuffer;
use super::grid::{Bounds, Direction, Point, ALL_DIRECTIONS};
use super::snake::Snake;
use super::spawn;
use super::state::{Player, World};
use crate::config::GameConfig;
use crate::leaderboard::StatsEvent;
use crate::metrics::Metrics;
use crate::protocol::{DeltaState, MapState};
use crate::shared::time::now_millis;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    PlayerNotInGame,
    DuplicateCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    AlreadyInGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollisionCause {
    Wall,
    SelfCollision,
    OtherSnake,
}

impl CollisionCause {
    fn as_str(&self) -> &'static str {
        match self {
            CollisionCause::Wall => "hit wall",
            CollisionCause::SelfCollision => "hit self",
            CollisionCause::OtherSnake => "hit other snake",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinTicket {
    pub player_id: String,
    pub uid: String,
    pub name: String,
    pub color: String,
    /// Previous player id for this uid, replaced on re-join.
    pub replaces: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub initial_direction: Direction,
    pub map_state: MapState,
}

/// The deterministic tick engine.
///
/// Two locks guard everything: the command-buffer lock (held briefly by
/// `submit_move` and the swap step) and the state lock (held per pipeline
/// phase, released in between so request handlers can read a consistent
/// snapshot mid-tick). Where both are needed the command-buffer lock is
/// acquired first.
pub struct Engine {
    config: GameConfig,
    state: Mutex<World>,
    moves: Mutex<CommandBuffer>,
    running: AtomicBool,
    stats: mpsc::UnboundedSender<StatsEvent>,
    metrics: Arc<Metrics>,
}

impl Engine {
    pub fn new(
        config: GameConfig,
        stats: mpsc::UnboundedSender<StatsEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let bounds = Bounds::new(config.map_width, config.map_height);
        Self {
            config,
            state: Mutex::new(World::new(bounds)),
            moves: Mutex::new(CommandBuffer::new()),
            running: AtomicBool::new(false),
            stats,
            metrics,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Launch the ticker task. Idempotent: only the caller that flips the
    /// running flag spawns the loop.
    pub fn start(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let period = Duration::from_millis(engine.config.round_time_ms);
            {
                let mut world = engine.state.lock().await;
                world.set_next_round_timestamp(now_millis() + period.as_millis() as i64);
            }
            tracing::info!(
                round_time_ms = engine.config.round_time_ms,
                "tick engine started"
            );
            while engine.running.load(Ordering::SeqCst) {
                let started = Instant::now();
                engine.tick().await;
                let elapsed = started.elapsed();
                engine.metrics.observe_tick(elapsed);
                if elapsed < period {
                    tokio::time::sleep(period - elapsed).await;
                } else {
                    tracing::warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        round_time_ms = engine.config.round_time_ms,
                        "tick exceeded round time"
                    );
                }
            }
            tracing::info!("tick engine stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One full pipeline pass. Each phase holds the state lock on its own,
    /// so readers interleave between phases but never observe a half-applied
    /// phase.
    pub async fn tick(&self) {
        // 1. Swap command buffers: this round's intake becomes executable.
        let pending = {
            let mut moves = self.moves.lock().await;
            moves.swap();
            self.metrics.set_moves_current(0);
            self.metrics.set_moves_pending(moves.pending_len());
            moves.take_pending()
        };

        // 2. Open a fresh delta journal for the round being produced.
        {
            let mut world = self.state.lock().await;
            world.clear_journal();
        }

        // 3-5. Apply directions, predict self-collisions against the
        // pre-move bodies, then move every snake.
        let self_collisions = {
            let mut world = self.state.lock().await;
            Self::apply_directions(&mut world, pending);
            let predicted = Self::predict_self_collisions(&world);
            Self::move_snakes(&mut world);
            predicted
        };

        // 6. Collision detection and death resolution.
        {
            let mut world = self.state.lock().await;
            self.detect_collisions(&mut world, &self_collisions);
        }

        // 7. Food collection.
        {
            let mut world = self.state.lock().await;
            self.collect_food(&mut world);
        }

        // 8. Food replenishment.
        {
            let mut world = self.state.lock().await;
            spawn::replenish_foods(&mut world, self.config.food_target(), &mut rand::thread_rng());
        }

        // 9. Age invincibility at the end of the round, so one granted
        // round protects for the whole round.
        {
            let mut world = self.state.lock().await;
            Self::age_invincibility(&mut world);
        }

        // 10. Publish the new round.
        {
            let mut world = self.state.lock().await;
            world.increment_round();
            world.set_next_round_timestamp(now_millis() + self.config.round_time_ms as i64);
            self.metrics.set_round(world.round());
            self.metrics.set_player_count(world.in_game_count());
        }
    }

    fn apply_directions(world: &mut World, pending: HashMap<String, Direction>) {
        for (player_id, direction) in pending {
            let Some(player) = world.player_mut(&player_id) else {
                continue;
            };
            if !player.in_game {
                continue;
            }
            if let Some(current) = player.snake.facing() {
                if current.is_opposite(direction) {
                    tracing::debug!(player_id, "rejected reversal move");
                    continue;
                }
            }
            player.snake.set_facing(direction);
        }
    }

    /// The "will I bite myself" check runs before anyone moves: the next
    /// head is tested against the full current body, including the tail
    /// cell that vacates this tick. A post-move check would miss exactly
    /// that tail cell.
    fn predict_self_collisions(world: &World) -> HashSet<String> {
        let mut predicted = HashSet::new();
        for player in world.players() {
            if !player.in_game {
                continue;
            }
            let Some(next_head) = player.snake.next_head() else {
                continue;
            };
            if player.snake.bites_self(next_head) {
                predicted.insert(player.id.clone());
            }
        }
        predicted
    }

    fn move_snakes(world: &mut World) {
        for id in world.player_ids() {
            let outcome = {
                let Some(player) = world.player_mut(&id) else {
                    continue;
                };
                if !player.in_game {
                    continue;
                }
                player.snake.advance()
            };
            if let Some(outcome) = outcome {
                world.occupy_cell(outcome.new_head);
                world.release_cell(outcome.freed_tail);
                world.track_update(&id);
            }
        }
    }

    fn detect_collisions(&self, world: &mut World, self_collisions: &HashSet<String>) {
        // Invincible bodies are not obstacles: the occupancy filter and the
        // killer index only see non-invincible, in-game snakes.
        let mut occupants: HashMap<Point, Vec<String>> = HashMap::new();
        for player in world.players() {
            if !player.in_game || player.snake.is_invincible() {
                continue;
            }
            for cell in player.snake.blocks() {
                occupants.entry(cell).or_default().push(player.id.clone());
            }
        }

        let mut collisions: Vec<(String, CollisionCause)> = Vec::new();
        for player in world.players() {
            if !player.in_game || player.snake.is_invincible() {
                continue;
            }
            let head = player.snake.head();
            let cause = if !world.bounds().contains(head) {
                Some(CollisionCause::Wall)
            } else if self_collisions.contains(&player.id) {
                Some(CollisionCause::SelfCollision)
            } else if occupants.get(&head).map_or(0, Vec::len) > 1 {
                Some(CollisionCause::OtherSnake)
            } else {
                None
            };
            if let Some(cause) = cause {
                collisions.push((player.id.clone(), cause));
            }
        }

        for (player_id, cause) in collisions {
            let Some(player) = world.player(&player_id) else {
                continue;
            };
            if !player.in_game {
                continue;
            }
            let uid = player.uid.clone();
            let name = player.name.clone();
            let head = player.snake.head();
            let final_length = player.snake.len();

            if cause == CollisionCause::OtherSnake {
                self.attribute_kill(world, &player_id, head);
            }

            let _ = self.stats.send(StatsEvent::Death {
                uid,
                name: name.clone(),
                round: world.round(),
                final_length,
            });
            world.resolve_death(&player_id);
            tracing::info!(player_id, name, reason = cause.as_str(), "player died");
        }
    }

    /// Credit the first non-self occupant of the fatal cell that is still
    /// in the game. A player resolved earlier in the same tick no longer
    /// qualifies.
    fn attribute_kill(&self, world: &World, victim_id: &str, head: Point) {
        for killer in world.players() {
            if killer.id == victim_id || !killer.in_game || killer.snake.is_invincible() {
                continue;
            }
            if killer.snake.blocks().any(|cell| cell == head) {
                let _ = self.stats.send(StatsEvent::Round {
                    uid: killer.uid.clone(),
                    name: killer.name.clone(),
                    round: world.round(),
                    length: killer.snake.len(),
                    food_delta: 0,
                    kill_delta: 1,
                });
                return;
            }
        }
    }

    fn collect_food(&self, world: &mut World) {
        for id in world.player_ids() {
            let head = match world.player(&id) {
                Some(player) if player.in_game => player.snake.head(),
                _ => continue,
            };
            if !world.has_food(head) {
                continue;
            }
            let (duplicated_tail, uid, name, length) = {
                let Some(player) = world.player_mut(&id) else {
                    continue;
                };
                let tail = player.snake.grow();
                (
                    tail,
                    player.uid.clone(),
                    player.name.clone(),
                    player.snake.len(),
                )
            };
            if let Some(tail) = duplicated_tail {
                world.occupy_cell(tail);
            }
            world.remove_food(head);
            world.track_update(&id);
            let _ = self.stats.send(StatsEvent::Round {
                uid,
                name,
                round: world.round(),
                length,
                food_delta: 1,
                kill_delta: 0,
            });
        }
    }

    fn age_invincibility(world: &mut World) {
        for id in world.player_ids() {
            let Some(player) = world.player_mut(&id) else {
                continue;
            };
            if !player.in_game || !player.snake.is_invincible() {
                continue;
            }
            let remaining = player.snake.decay_invincibility();
            world.track_update(&id);
            if remaining == 0 {
                tracing::debug!(player_id = id, "invincibility expired");
            }
        }
    }

    /// Queue a move for the boundary of the current round. The reversal
    /// check is deferred to the tick engine so intake stays independent of
    /// snake state.
    pub async fn submit_move(
        &self,
        player_id: &str,
        direction: Direction,
    ) -> Result<(), SubmitError> {
        {
            let world = self.state.lock().await;
            match world.player(player_id) {
                Some(player) if player.in_game => {}
                _ => return Err(SubmitError::PlayerNotInGame),
            }
        }
        let mut moves = self.moves.lock().await;
        moves
            .submit(player_id, direction)
            .map_err(|_| SubmitError::DuplicateCommand)?;
        self.metrics.set_moves_current(moves.current_len());
        Ok(())
    }

    /// Join (and re-join after death, which is the same path with a fresh
    /// identity): safe spawn, full invincibility, random initial facing.
    pub async fn join_player(&self, ticket: JoinTicket) -> Result<JoinOutcome, JoinError> {
        // Command-buffer lock before state lock.
        let mut moves = self.moves.lock().await;
        let mut world = self.state.lock().await;
        if let Some(old_id) = &ticket.replaces {
            if world.player(old_id).is_some_and(|player| player.in_game) {
                return Err(JoinError::AlreadyInGame);
            }
            world.remove_player(old_id);
            moves.forget(old_id);
        }
        drop(moves);

        let mut rng = rand::thread_rng();
        let spawn_at = spawn::safe_spawn_position(&world, self.config.safe_spawn_radius, &mut rng);
        let mut snake = Snake::spawn(
            spawn_at,
            self.config.initial_snake_length,
            self.config.invincible_rounds,
        );
        let initial_direction = ALL_DIRECTIONS[rng.gen_range(0..ALL_DIRECTIONS.len())];
        snake.set_facing(initial_direction);
        let length = snake.len();

        world.insert_player(Player {
            id: ticket.player_id.clone(),
            uid: ticket.uid.clone(),
            name: ticket.name.clone(),
            color: ticket.color,
            in_game: true,
            snake,
        });
        self.metrics.set_player_count(world.in_game_count());
        let _ = self.stats.send(StatsEvent::Round {
            uid: ticket.uid,
            name: ticket.name,
            round: world.round(),
            length,
            food_delta: 0,
            kill_delta: 0,
        });

        Ok(JoinOutcome {
            initial_direction,
            map_state: world.snapshot(),
        })
    }

    pub async fn snapshot(&self) -> MapState {
        self.state.lock().await.snapshot()
    }

    pub async fn delta(&self) -> DeltaState {
        self.state.lock().await.delta_state()
    }

    pub async fn in_game_count(&self) -> usize {
        self.state.lock().await.in_game_count()
    }

    #[cfg(test)]
    pub async fn with_world<R>(&self, inspect: impl FnOnce(&World) -> R) -> R {
        inspect(&*self.state.lock().await)
    }

    #[cfg(test)]
    pub async fn with_world_mut<R>(&self, mutate: impl FnOnce(&mut World) -> R) -> R {
        mutate(&mut *self.state.lock().await)
    }
}
