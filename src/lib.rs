pub mod adjust;
pub mod aggregate;
pub mod cfbd;
pub mod config;
pub mod engine;
pub mod export;
pub mod extract;
pub mod fill;
pub mod games;
pub mod games_store;
pub mod http_cache;
pub mod http_client;
pub mod metrics;
pub mod payload;
pub mod plays;
pub mod rate_limit;
pub mod team_names;
