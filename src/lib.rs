pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod game;
pub mod leaderboard;
pub mod metrics;
pub mod protocol;
pub mod rate_limit;
pub mod server;
pub mod session;
pub mod shared;
pub mod strategies;
