//! SQLite-backed player statistics, keyed by `(uid, season_id)`.
//!
//! The tick engine never talks to the database directly: it emits
//! `StatsEvent`s over an unbounded channel and a spawned writer task owns
//! the pool, so no pipeline phase ever awaits a disk write.

use crate::config::LeaderboardConfig;
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum StatsEvent {
    /// Per-event update while a game is running: joins, food, kills.
    Round {
        uid: String,
        name: String,
        round: u64,
        length: usize,
        food_delta: i64,
        kill_delta: i64,
    },
    /// Game over for one player: deaths and games_played advance.
    Death {
        uid: String,
        name: String,
        round: u64,
        final_length: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardKind {
    Kd,
    MaxLength,
    AvgLengthPerGame,
}

impl LeaderboardKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kd" => Some(Self::Kd),
            "max_length" => Some(Self::MaxLength),
            "avg_length_per_game" => Some(Self::AvgLengthPerGame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kd => "kd",
            Self::MaxLength => "max_length",
            Self::AvgLengthPerGame => "avg_length_per_game",
        }
    }

    fn order_expr(&self) -> &'static str {
        match self {
            Self::Kd => {
                "CASE WHEN deaths > 0 THEN CAST(kills AS REAL) / deaths ELSE CAST(kills AS REAL) END"
            }
            Self::MaxLength => "max_length",
            Self::AvgLengthPerGame => {
                "CASE WHEN games_played > 0 THEN 3.0 + CAST(total_food AS REAL) / games_played ELSE 0 END"
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaderboardEntry {
    pub uid: String,
    pub name: String,
    pub season_id: String,
    pub now_length: i64,
    pub max_length: i64,
    pub kills: i64,
    pub deaths: i64,
    pub games_played: i64,
    pub total_food: i64,
    pub last_round: i64,
    pub timestamp: i64,
    pub rank: i64,
}

impl LeaderboardEntry {
    pub fn kd(&self) -> f64 {
        if self.deaths > 0 {
            self.kills as f64 / self.deaths as f64
        } else {
            self.kills as f64
        }
    }

    pub fn avg_length_per_game(&self) -> f64 {
        if self.games_played > 0 {
            3.0 + self.total_food as f64 / self.games_played as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardStore {
    pool: SqlitePool,
    config: LeaderboardConfig,
}

impl LeaderboardStore {
    pub fn new(pool: SqlitePool, config: LeaderboardConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    /// Spawn the writer task draining engine events into the store.
    pub fn spawn_writer(self, mut events: mpsc::UnboundedReceiver<StatsEvent>) {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(error) = self.apply(event).await {
                    tracing::warn!(?error, "leaderboard update failed");
                }
            }
        });
    }

    pub async fn apply(&self, event: StatsEvent) -> anyhow::Result<()> {
        match event {
            StatsEvent::Round {
                uid,
                name,
                round,
                length,
                food_delta,
                kill_delta,
            } => {
                self.apply_delta(
                    &uid,
                    &name,
                    round as i64,
                    length as i64,
                    food_delta.max(0),
                    kill_delta.max(0),
                    0,
                    0,
                )
                .await
            }
            StatsEvent::Death {
                uid,
                name,
                round,
                final_length,
            } => {
                self.apply_delta(&uid, &name, round as i64, final_length as i64, 0, 0, 1, 1)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_delta(
        &self,
        uid: &str,
        name: &str,
        round: i64,
        length: i64,
        food_delta: i64,
        kill_delta: i64,
        death_delta: i64,
        games_delta: i64,
    ) -> anyhow::Result<()> {
        let now = crate::shared::time::now_millis();
        sqlx::query(
            "INSERT INTO leaderboard \
             (uid, player_name, season_id, now_length, max_length, kills, deaths, \
              games_played, total_food, last_round, timestamp, season_start, season_end) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0) \
             ON CONFLICT(uid, season_id) DO UPDATE SET \
               player_name = excluded.player_name, \
               now_length = excluded.now_length, \
               max_length = MAX(max_length, excluded.max_length), \
               kills = kills + excluded.kills, \
               deaths = deaths + excluded.deaths, \
               games_played = games_played + excluded.games_played, \
               total_food = total_food + excluded.total_food, \
               last_round = excluded.last_round, \
               timestamp = excluded.timestamp",
        )
        .bind(uid)
        .bind(if name.is_empty() { uid } else { name })
        .bind(&self.config.season_id)
        .bind(length)
        .bind(length)
        .bind(kill_delta)
        .bind(death_delta)
        .bind(games_delta)
        .bind(food_delta)
        .bind(round)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Paged ranking query. `start_time`/`end_time` of 0 mean unbounded;
    /// rank numbering continues from the offset.
    pub async fn top_players(
        &self,
        kind: LeaderboardKind,
        limit: i64,
        offset: i64,
        start_time: i64,
        end_time: i64,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let offset = offset.max(0);

        let mut sql = String::from(
            "SELECT uid, player_name, season_id, now_length, max_length, kills, deaths, \
             games_played, total_food, last_round, timestamp \
             FROM leaderboard WHERE season_id = ?",
        );
        if start_time > 0 {
            sql.push_str(" AND timestamp >= ?");
        }
        if end_time > 0 {
            sql.push_str(" AND timestamp <= ?");
        }
        sql.push_str(&format!(
            " ORDER BY {} DESC, timestamp ASC LIMIT ? OFFSET ?",
            kind.order_expr()
        ));

        let mut query = sqlx::query(&sql).bind(&self.config.season_id);
        if start_time > 0 {
            query = query.bind(start_time);
        }
        if end_time > 0 {
            query = query.bind(end_time);
        }
        let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            entries.push(LeaderboardEntry {
                uid: row.try_get("uid")?,
                name: row.try_get("player_name")?,
                season_id: row.try_get("season_id")?,
                now_length: row.try_get("now_length")?,
                max_length: row.try_get("max_length")?,
                kills: row.try_get("kills")?,
                deaths: row.try_get("deaths")?,
                games_played: row.try_get("games_played")?,
                total_food: row.try_get("total_food")?,
                last_round: row.try_get("last_round")?,
                timestamp: row.try_get("timestamp")?,
                rank: offset + index as i64 + 1,
            });
        }
        Ok(entries)
    }
}
