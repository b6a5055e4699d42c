//! Round-synchronized polling client: login, join, then a wait/fetch/
//! decide/submit loop aligned to the server's tick boundaries through the
//! clock estimator.

pub mod clock;
pub mod config;
pub mod state;

pub use config::{BotSettings, ClientConfig};
pub use state::ClientState;

use crate::game::grid::Direction;
use crate::protocol::{
    DeltaData, Envelope, JoinData, JoinRequest, LoginData, LoginRequest, MapData, MoveRequest,
    StatusData,
};
use crate::shared::time::now_millis;
use anyhow::Context;
use clock::ClockSync;
use serde::de::DeserializeOwned;
use serde::Serialize;
use state::DeltaOutcome;
use std::time::Duration;

pub struct ArenaClient {
    config: ClientConfig,
    http: reqwest::Client,
    state: ClientState,
    clock: ClockSync,
    key: Option<String>,
    token: Option<String>,
    player_id: Option<String>,
    player_name: String,
    player_color: Option<String>,
    round_time_ms: u64,
    last_full_refresh: u64,
    in_game: bool,
}

/// One response body plus the local send/receive times of the request that
/// carried it, for the clock estimator.
struct Timed<T> {
    envelope: Envelope<T>,
    request_start_ms: i64,
    response_recv_ms: i64,
}

impl ArenaClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            config,
            http,
            state: ClientState::new(),
            clock: ClockSync::new(),
            key: None,
            token: None,
            player_id: None,
            player_name: String::new(),
            player_color: None,
            round_time_ms: 1000,
            last_full_refresh: 0,
            in_game: false,
        })
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn is_in_game(&self) -> bool {
        self.in_game
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn get_timed<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Timed<T>> {
        let request_start_ms = now_millis();
        let response = self.http.get(self.url(path)).send().await?;
        let envelope = response.json::<Envelope<T>>().await?;
        Ok(Timed {
            envelope,
            request_start_ms,
            response_recv_ms: now_millis(),
        })
    }

    async fn post_timed<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> anyhow::Result<Timed<T>> {
        let request_start_ms = now_millis();
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let envelope = response.json::<Envelope<T>>().await?;
        Ok(Timed {
            envelope,
            request_start_ms,
            response_recv_ms: now_millis(),
        })
    }

    /// Exchange uid + paste for a login key.
    pub async fn login(&mut self, uid: &str, paste: &str) -> anyhow::Result<()> {
        let timed: Timed<LoginData> = self
            .post_timed(
                "/api/game/login",
                &LoginRequest {
                    uid: uid.to_string(),
                    paste: paste.to_string(),
                },
            )
            .await
            .context("login request failed")?;
        let data = timed.envelope.into_data().context("login refused")?;
        self.key = Some(data.key);
        tracing::info!(uid, "login successful");
        Ok(())
    }

    /// Join the arena and pull the map geometry from the status endpoint.
    pub async fn join(&mut self, name: &str, color: Option<&str>) -> anyhow::Result<()> {
        self.player_name = name.to_string();
        self.player_color = color.map(str::to_string);
        self.join_internal().await?;
        self.fetch_status().await;
        Ok(())
    }

    async fn join_internal(&mut self) -> anyhow::Result<()> {
        let key = self.key.clone().context("login() must succeed before join()")?;
        let request = JoinRequest {
            key,
            name: self.player_name.clone(),
            color: self.player_color.clone(),
        };
        let timed: Timed<JoinData> = self
            .post_timed("/api/game/join", &request)
            .await
            .context("join request failed")?;
        let (start, recv) = (timed.request_start_ms, timed.response_recv_ms);
        let data = timed.envelope.into_data().context("join refused")?;

        self.clock.observe(data.map_state.timestamp, start, recv);
        self.token = Some(data.token);
        self.player_id = Some(data.id.clone());
        self.state.set_my_id(&data.id);
        self.state.apply_full(data.map_state);
        self.last_full_refresh = self.state.round();
        self.in_game = true;
        tracing::info!(player_id = data.id, "joined the arena");
        Ok(())
    }

    async fn fetch_status(&mut self) {
        match self.get_timed::<StatusData>("/api/status").await {
            Ok(timed) => {
                if let Ok(status) = timed.envelope.into_data() {
                    self.state
                        .set_map_size(status.map_size.width, status.map_size.height);
                    self.round_time_ms = status.round_time;
                    tracing::info!(
                        width = status.map_size.width,
                        height = status.map_size.height,
                        round_time_ms = status.round_time,
                        "server status"
                    );
                }
            }
            Err(error) => tracing::warn!(?error, "unable to fetch server status"),
        }
    }

    async fn fetch_full_map(&mut self) -> bool {
        let timed: Timed<MapData> = match self.get_timed("/api/game/map").await {
            Ok(timed) => timed,
            Err(error) => {
                tracing::warn!(?error, "full map fetch failed");
                return false;
            }
        };
        let (start, recv) = (timed.request_start_ms, timed.response_recv_ms);
        let Ok(data) = timed.envelope.into_data() else {
            return false;
        };
        self.clock.observe(data.map_state.timestamp, start, recv);
        self.state.apply_full(data.map_state);
        self.last_full_refresh = self.state.round();
        self.in_game = self.state.contains_me();
        true
    }

    async fn fetch_delta_map(&mut self) -> bool {
        let timed: Timed<DeltaData> = match self.get_timed("/api/game/map/delta").await {
            Ok(timed) => timed,
            Err(error) => {
                tracing::warn!(?error, "delta fetch failed, refreshing full map");
                return self.fetch_full_map().await;
            }
        };
        let (start, recv) = (timed.request_start_ms, timed.response_recv_ms);
        let Ok(data) = timed.envelope.into_data() else {
            return self.fetch_full_map().await;
        };
        self.clock.observe(data.delta_state.timestamp, start, recv);
        match self.state.apply_delta(data.delta_state) {
            DeltaOutcome::Applied => {
                self.in_game = self.state.contains_me();
                true
            }
            DeltaOutcome::RoundGap => {
                tracing::warn!("round gap detected, refreshing full map");
                self.fetch_full_map().await
            }
        }
    }

    async fn update_map_state(&mut self) -> bool {
        let stale = self
            .state
            .round()
            .saturating_sub(self.last_full_refresh)
            >= self.config.full_map_refresh_rounds;
        if stale {
            self.fetch_full_map().await
        } else {
            self.fetch_delta_map().await
        }
    }

    /// Submit one move. Returns false when the move was not accepted; a 404
    /// additionally flips the in-game flag.
    async fn send_move(&mut self, direction: Direction) -> bool {
        let Some(token) = self.token.clone() else {
            return false;
        };
        let request = MoveRequest {
            token,
            direction: direction.as_str().to_string(),
        };
        let timed: Timed<serde_json::Value> =
            match self.post_timed("/api/game/move", &request).await {
                Ok(timed) => timed,
                Err(error) => {
                    tracing::warn!(?error, "move submission failed");
                    return false;
                }
            };
        match timed.envelope.code {
            0 => true,
            404 => {
                self.in_game = false;
                false
            }
            code => {
                tracing::debug!(code, msg = timed.envelope.msg, "move rejected");
                false
            }
        }
    }

    /// Sleep until just before the next tick: the published boundary minus
    /// the safety margin, measured on the estimated server clock.
    async fn wait_for_round_window(&self) {
        let next_ts = self.state.next_round_timestamp();
        if next_ts <= 0 {
            let fallback = (self.round_time_ms / 3).max(50);
            tokio::time::sleep(Duration::from_millis(fallback)).await;
            return;
        }
        let server_now = self.clock.estimated_server_now(now_millis());
        let wait_ms = next_ts - server_now - self.config.safety_margin_ms;
        if wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(wait_ms as u64)).await;
        } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn respawn(&mut self) -> anyhow::Result<()> {
        self.join_internal().await?;
        tokio::time::sleep(Duration::from_millis(self.config.respawn_delay_ms)).await;
        Ok(())
    }

    /// The round loop. Runs until death with auto-respawn disabled, or
    /// until an unrecoverable join failure.
    pub async fn run(
        &mut self,
        mut decide: impl FnMut(&ClientState) -> anyhow::Result<Direction>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(self.token.is_some(), "join() must succeed before run()");
        let mut last_decided_round: Option<u64> = None;

        loop {
            self.wait_for_round_window().await;

            if !self.update_map_state().await {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }

            if !self.in_game {
                if self.config.auto_respawn {
                    tracing::info!("snake died, respawning");
                    self.respawn().await?;
                    last_decided_round = None;
                    continue;
                }
                tracing::info!("snake died, stopping");
                return Ok(());
            }

            let current_round = self.state.round();
            if last_decided_round == Some(current_round) {
                continue;
            }

            let direction = match decide(&self.state) {
                Ok(direction) => direction,
                Err(error) => {
                    tracing::error!(?error, "decision function failed, using default");
                    self.config.default_direction
                }
            };

            // Count the round as handled even when the submit fails, so a
            // rejected move does not turn into a retry storm.
            self.send_move(direction).await;
            last_decided_round = Some(current_round);
        }
    }
}
