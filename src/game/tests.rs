use super::engine::{Engine, JoinError, JoinTicket, SubmitError};
use super::grid::{Direction, Point, ALL_DIRECTIONS};
use super::snake::Snake;
use super::state::Player;
use crate::client::state::{ClientState, DeltaOutcome};
use crate::config::GameConfig;
use crate::leaderboard::StatsEvent;
use crate::metrics::Metrics;
use crate::protocol::MapState;
use std::sync::Arc;
use tokio::sync::mpsc;

fn arena_config() -> GameConfig {
    GameConfig {
        map_width: 10,
        map_height: 10,
        round_time_ms: 1000,
        initial_snake_length: 3,
        invincible_rounds: 5,
        // Most scenarios want a board without random food spawns.
        food_density: 0.0,
        safe_spawn_radius: 5,
    }
}

fn make_engine(config: GameConfig) -> (Arc<Engine>, mpsc::UnboundedReceiver<StatsEvent>) {
    let (stats_tx, stats_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(Engine::new(config, stats_tx, Arc::new(Metrics::new(true))));
    (engine, stats_rx)
}

async fn place_snake(
    engine: &Engine,
    id: &str,
    cells: &[Point],
    facing: Direction,
    invincible_rounds: u32,
) {
    let player = Player {
        id: id.to_string(),
        uid: format!("uid-{id}"),
        name: id.to_string(),
        color: "#ffffff".to_string(),
        in_game: true,
        snake: Snake::from_cells(cells, Some(facing), invincible_rounds),
    };
    engine
        .with_world_mut(move |world| world.insert_player(player))
        .await;
}

async fn blocks_of(engine: &Engine, id: &str) -> Vec<Point> {
    engine
        .with_world(|world| {
            world
                .player(id)
                .map(|player| player.snake.blocks().collect())
                .unwrap_or_default()
        })
        .await
}

async fn is_in_game(engine: &Engine, id: &str) -> bool {
    engine
        .with_world(|world| world.player(id).is_some_and(|player| player.in_game))
        .await
}

#[tokio::test]
async fn rounds_increment_by_one_per_tick() {
    let (engine, _stats) = make_engine(arena_config());
    for expected in 1..=5u64 {
        engine.tick().await;
        let round = engine.with_world(|world| world.round()).await;
        assert_eq!(round, expected);
    }
    let next_ts = engine.with_world(|world| world.next_round_timestamp()).await;
    assert!(next_ts > 0);
}

#[tokio::test]
async fn single_snake_walks_into_food_and_grows() {
    // 10x10, snake spawned at (5,5) facing right, food at (7,5).
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[Point::new(5, 5), Point::new(5, 5), Point::new(5, 5)],
        Direction::Right,
        0,
    )
    .await;
    engine
        .with_world_mut(|world| world.add_food(Point::new(7, 5)))
        .await;

    engine.tick().await;
    engine.tick().await;
    // Second tick ate the food at (7,5).
    let mid = blocks_of(&engine, "s1").await;
    assert_eq!(mid.len(), 4);
    assert_eq!(mid[0], Point::new(7, 5));

    engine.tick().await;
    let blocks = blocks_of(&engine, "s1").await;
    assert_eq!(
        blocks,
        vec![
            Point::new(8, 5),
            Point::new(7, 5),
            Point::new(6, 5),
            Point::new(5, 5)
        ]
    );
    let (round, food_count) = engine
        .with_world(|world| (world.round(), world.food_count()))
        .await;
    assert_eq!(round, 3);
    assert_eq!(food_count, 0);
    assert!(engine.with_world(|world| world.occupancy_is_consistent()).await);
}

#[tokio::test]
async fn head_on_collision_kills_both_and_drops_food() {
    let (engine, mut stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[Point::new(4, 5), Point::new(3, 5), Point::new(2, 5)],
        Direction::Right,
        0,
    )
    .await;
    place_snake(
        &engine,
        "s2",
        &[Point::new(5, 5), Point::new(6, 5), Point::new(7, 5)],
        Direction::Left,
        0,
    )
    .await;

    engine.tick().await;

    assert!(!is_in_game(&engine, "s1").await);
    assert!(!is_in_game(&engine, "s2").await);

    // Union of both post-move bodies becomes food.
    let snapshot = engine.snapshot().await;
    assert!(snapshot.players.is_empty());
    let expected_food = vec![
        Point::new(3, 5),
        Point::new(4, 5),
        Point::new(5, 5),
        Point::new(6, 5),
    ];
    assert_eq!(snapshot.foods, expected_food);

    let delta = engine.delta().await;
    assert_eq!(delta.died_players.len(), 2);
    assert!(delta.died_players.contains(&"s1".to_string()));
    assert!(delta.died_players.contains(&"s2".to_string()));

    // One kill is attributed to the snake resolved second; both deaths are
    // reported.
    let mut kills = 0;
    let mut deaths = 0;
    while let Ok(event) = stats.try_recv() {
        match event {
            StatsEvent::Round { kill_delta, .. } => kills += kill_delta,
            StatsEvent::Death { .. } => deaths += 1,
        }
    }
    assert_eq!(kills, 1);
    assert_eq!(deaths, 2);
    assert!(engine.with_world(|world| world.occupancy_is_consistent()).await);
}

#[tokio::test]
async fn reverse_move_is_silently_ignored() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[
            Point::new(5, 5),
            Point::new(5, 6),
            Point::new(5, 7),
            Point::new(5, 8),
        ],
        Direction::Up,
        0,
    )
    .await;

    assert!(engine.submit_move("s1", Direction::Down).await.is_ok());
    engine.tick().await;

    // Still heading up: the reversal was dropped at the apply phase.
    let blocks = blocks_of(&engine, "s1").await;
    assert_eq!(blocks[0], Point::new(5, 4));
    assert!(is_in_game(&engine, "s1").await);
}

#[tokio::test]
async fn u_turn_into_own_body_is_fatal() {
    // Head (5,5) facing right; turning down targets (5,6), which is body.
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[
            Point::new(5, 5),
            Point::new(5, 6),
            Point::new(5, 7),
            Point::new(4, 7),
        ],
        Direction::Right,
        0,
    )
    .await;

    assert!(engine.submit_move("s1", Direction::Down).await.is_ok());
    engine.tick().await;

    assert!(!is_in_game(&engine, "s1").await);
    let delta = engine.delta().await;
    assert_eq!(delta.died_players, vec!["s1".to_string()]);
}

#[tokio::test]
async fn biting_the_vacating_tail_cell_is_still_death() {
    // A 2x2 loop: the next head is the current tail cell, which vacates
    // this very tick. Only the pre-move prediction catches this.
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[
            Point::new(5, 5),
            Point::new(6, 5),
            Point::new(6, 6),
            Point::new(5, 6),
        ],
        Direction::Down,
        0,
    )
    .await;

    engine.tick().await;
    assert!(!is_in_game(&engine, "s1").await);
}

#[tokio::test]
async fn wall_collision_kills_and_drops_only_in_bounds_cells() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[Point::new(0, 4), Point::new(1, 4), Point::new(2, 4)],
        Direction::Left,
        0,
    )
    .await;

    engine.tick().await;
    assert!(!is_in_game(&engine, "s1").await);
    let snapshot = engine.snapshot().await;
    assert!(snapshot
        .foods
        .iter()
        .all(|cell| cell.x >= 0 && cell.x < 10 && cell.y >= 0 && cell.y < 10));
    assert_eq!(
        snapshot.foods,
        vec![Point::new(0, 4), Point::new(1, 4)]
    );
}

#[tokio::test]
async fn invincible_snake_passes_through_without_killing() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "ghost",
        &[Point::new(5, 5), Point::new(4, 5)],
        Direction::Right,
        5,
    )
    .await;
    place_snake(
        &engine,
        "wall",
        &[Point::new(6, 6), Point::new(6, 5), Point::new(6, 4)],
        Direction::Down,
        0,
    )
    .await;

    engine.tick().await;

    // Ghost head now overlaps the other body; neither snake dies.
    assert!(is_in_game(&engine, "ghost").await);
    assert!(is_in_game(&engine, "wall").await);
    let ghost = blocks_of(&engine, "ghost").await;
    assert_eq!(ghost[0], Point::new(6, 5));
    assert!(engine.with_world(|world| world.occupancy_is_consistent()).await);
}

#[tokio::test]
async fn duplicate_move_in_one_round_is_rejected() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[Point::new(5, 5), Point::new(4, 5)],
        Direction::Right,
        0,
    )
    .await;

    assert!(engine.submit_move("s1", Direction::Up).await.is_ok());
    assert_eq!(
        engine.submit_move("s1", Direction::Down).await,
        Err(SubmitError::DuplicateCommand)
    );

    engine.tick().await;
    // A new round accepts a new command.
    assert!(engine.submit_move("s1", Direction::Up).await.is_ok());
}

#[tokio::test]
async fn moves_for_dead_or_unknown_players_are_not_found() {
    let (engine, _stats) = make_engine(arena_config());
    assert_eq!(
        engine.submit_move("nobody", Direction::Up).await,
        Err(SubmitError::PlayerNotInGame)
    );

    place_snake(
        &engine,
        "s1",
        &[Point::new(0, 4), Point::new(1, 4)],
        Direction::Left,
        0,
    )
    .await;
    engine.tick().await;
    assert!(!is_in_game(&engine, "s1").await);
    assert_eq!(
        engine.submit_move("s1", Direction::Up).await,
        Err(SubmitError::PlayerNotInGame)
    );
}

#[tokio::test]
async fn join_spawns_clear_of_other_snakes() {
    let mut config = arena_config();
    config.map_width = 20;
    config.map_height = 20;
    let (engine, mut stats) = make_engine(config);
    place_snake(
        &engine,
        "resident",
        &[Point::new(10, 10), Point::new(10, 11), Point::new(10, 12)],
        Direction::Up,
        0,
    )
    .await;

    let outcome = engine
        .join_player(JoinTicket {
            player_id: "p-new".to_string(),
            uid: "u-new".to_string(),
            name: "Newcomer".to_string(),
            color: "#4dabf7".to_string(),
            replaces: None,
        })
        .await
        .expect("join succeeds");

    assert!(ALL_DIRECTIONS.contains(&outcome.initial_direction));
    let me = outcome
        .map_state
        .players
        .iter()
        .find(|player| player.id == "p-new")
        .expect("joined player listed");
    assert_eq!(me.invincible_rounds, 5);
    assert_eq!(me.length, 3);
    assert!(me.blocks.iter().all(|cell| *cell == me.head));

    // The whole safety neighborhood is clear of the resident.
    let resident = blocks_of(&engine, "resident").await;
    for cell in resident {
        assert!(me.head.chebyshev_distance(cell) > 5);
    }

    match stats.try_recv() {
        Ok(StatsEvent::Round { uid, length, .. }) => {
            assert_eq!(uid, "u-new");
            assert_eq!(length, 3);
        }
        other => panic!("expected join round event, got {other:?}"),
    }
}

#[tokio::test]
async fn rejoining_while_alive_is_a_conflict() {
    let (engine, _stats) = make_engine(arena_config());
    let first = engine
        .join_player(JoinTicket {
            player_id: "p1".to_string(),
            uid: "u1".to_string(),
            name: "Ana".to_string(),
            color: "#fff".to_string(),
            replaces: None,
        })
        .await;
    assert!(first.is_ok());

    let second = engine
        .join_player(JoinTicket {
            player_id: "p2".to_string(),
            uid: "u1".to_string(),
            name: "Ana".to_string(),
            color: "#fff".to_string(),
            replaces: Some("p1".to_string()),
        })
        .await;
    assert_eq!(second.unwrap_err(), JoinError::AlreadyInGame);
    assert!(is_in_game(&engine, "p1").await);
}

#[tokio::test]
async fn rejoin_after_death_replaces_the_old_player() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "p1",
        &[Point::new(0, 4), Point::new(1, 4)],
        Direction::Left,
        0,
    )
    .await;
    engine.tick().await;
    assert!(!is_in_game(&engine, "p1").await);

    let outcome = engine
        .join_player(JoinTicket {
            player_id: "p2".to_string(),
            uid: "uid-p1".to_string(),
            name: "p1".to_string(),
            color: "#fff".to_string(),
            replaces: Some("p1".to_string()),
        })
        .await
        .expect("rejoin succeeds");
    assert!(outcome
        .map_state
        .players
        .iter()
        .any(|player| player.id == "p2"));
    let old = engine.with_world(|world| world.player("p1").is_none()).await;
    assert!(old);
}

#[tokio::test]
async fn food_replenishes_to_the_density_target() {
    let mut config = arena_config();
    config.food_density = 0.05;
    let (engine, _stats) = make_engine(config);

    engine.tick().await;
    let food_count = engine.with_world(|world| world.food_count()).await;
    assert_eq!(food_count, 5);
    assert!(engine.with_world(|world| world.foods_clear_of_bodies()).await);
}

#[tokio::test]
async fn invincibility_ages_once_per_round() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[Point::new(5, 5), Point::new(4, 5)],
        Direction::Right,
        2,
    )
    .await;

    engine.tick().await;
    let remaining = engine
        .with_world(|world| world.player("s1").map(|p| p.snake.invincible_rounds()))
        .await;
    assert_eq!(remaining, Some(1));
    engine.tick().await;
    engine.tick().await;
    let remaining = engine
        .with_world(|world| world.player("s1").map(|p| p.snake.invincible_rounds()))
        .await;
    assert_eq!(remaining, Some(0));
}

fn canonical(state: &ClientState) -> (Vec<(String, Vec<Point>, u32, u32)>, Vec<Point>) {
    let mut players: Vec<(String, Vec<Point>, u32, u32)> = state
        .all_players()
        .map(|player| {
            (
                player.id.clone(),
                player.blocks.clone(),
                player.length,
                player.invincible_rounds,
            )
        })
        .collect();
    players.sort();
    (players, state.foods().collect())
}

fn from_snapshot(snapshot: MapState) -> ClientState {
    let mut state = ClientState::new();
    state.apply_full(snapshot);
    state
}

#[tokio::test]
async fn replaying_deltas_reproduces_full_snapshots() {
    let mut config = arena_config();
    config.food_density = 0.05;
    let (engine, _stats) = make_engine(config);
    place_snake(
        &engine,
        "s1",
        &[Point::new(2, 2), Point::new(2, 2), Point::new(2, 2)],
        Direction::Right,
        3,
    )
    .await;
    place_snake(
        &engine,
        "s2",
        &[Point::new(8, 8), Point::new(8, 8), Point::new(8, 8)],
        Direction::Left,
        0,
    )
    .await;

    let mut tracked = from_snapshot(engine.snapshot().await);
    for _ in 0..6 {
        engine.tick().await;
        let delta = engine.delta().await;
        assert_eq!(tracked.apply_delta(delta), DeltaOutcome::Applied);
        let fresh = from_snapshot(engine.snapshot().await);
        assert_eq!(canonical(&tracked), canonical(&fresh));
    }
}

#[tokio::test]
async fn commands_submitted_this_round_execute_next_round() {
    let (engine, _stats) = make_engine(arena_config());
    place_snake(
        &engine,
        "s1",
        &[Point::new(5, 5), Point::new(4, 5)],
        Direction::Right,
        0,
    )
    .await;

    // Submitted before the tick boundary: applied at it.
    engine.submit_move("s1", Direction::Up).await.unwrap();
    engine.tick().await;
    assert_eq!(blocks_of(&engine, "s1").await[0], Point::new(5, 4));

    // No new command: the facing persists.
    engine.tick().await;
    assert_eq!(blocks_of(&engine, "s1").await[0], Point::new(5, 3));
}
