//! JSON wire format shared by the server handlers and the polling client.
//!
//! Every endpoint speaks the `{code, msg, data}` envelope: code 0 is
//! success, codes in [400, 599] mirror the HTTP status, anything else is
//! treated as 500 by readers.

use crate::game::grid::Point;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const CODE_SUCCESS: i32 = 0;
pub const MSG_SUCCESS: &str = "success";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub code: i32,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: MSG_SUCCESS.to_string(),
            data: Some(data),
        }
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Extract `data` from a success envelope, or surface `msg` otherwise.
    pub fn into_data(self) -> anyhow::Result<T> {
        if self.code != CODE_SUCCESS {
            anyhow::bail!("server error {}: {}", self.code, self.msg);
        }
        self.data
            .ok_or_else(|| anyhow::anyhow!("success envelope without data"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub uid: String,
    pub paste: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinData {
    pub token: String,
    pub id: String,
    pub initial_direction: String,
    pub map_state: MapState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub token: String,
    pub direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapData {
    pub map_state: MapState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaData {
    pub delta_state: DeltaState,
}

/// Full snake record as published in snapshots and `joined_players`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub color: String,
    pub head: Point,
    pub blocks: Vec<Point>,
    pub length: u32,
    #[serde(default)]
    pub invincible_rounds: u32,
}

impl PlayerState {
    pub fn contains(&self, cell: Point) -> bool {
        self.blocks.contains(&cell)
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_rounds > 0
    }
}

/// Simplified per-player record carried by the delta journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDelta {
    pub id: String,
    pub head: Point,
    pub length: u32,
    #[serde(default)]
    pub invincible_rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapState {
    pub round: u64,
    pub next_round_timestamp: i64,
    pub timestamp: i64,
    pub players: Vec<PlayerState>,
    pub foods: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaState {
    pub round: u64,
    pub next_round_timestamp: i64,
    pub timestamp: i64,
    #[serde(default)]
    pub died_players: Vec<String>,
    #[serde(default)]
    pub joined_players: Vec<PlayerState>,
    #[serde(default)]
    pub players: Vec<PlayerDelta>,
    #[serde(default)]
    pub added_foods: Vec<Point>,
    #[serde(default)]
    pub removed_foods: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub status: String,
    pub player_count: usize,
    pub map_size: MapSize,
    pub round_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntryPayload {
    pub uid: String,
    pub name: String,
    pub season_id: String,
    pub now_length: i64,
    pub max_length: i64,
    pub kills: i64,
    pub deaths: i64,
    pub kd: f64,
    pub games_played: i64,
    pub avg_length_per_game: f64,
    pub total_food: i64,
    pub last_round: i64,
    pub timestamp: i64,
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardData {
    #[serde(rename = "type")]
    pub board_type: String,
    pub limit: i64,
    pub offset: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub refresh_interval_rounds: u32,
    pub cache_ttl_seconds: u32,
    pub entries: Vec<LeaderboardEntryPayload>,
}
