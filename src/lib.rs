pub mod backend_fetch;
pub mod config;
pub mod fake_feed;
pub mod feed;
pub mod http_cache;
pub mod http_client;
pub mod leaderboard;
pub mod ledger;
pub mod member_status;
pub mod merge;
pub mod odds;
pub mod persist;
pub mod provider;
pub mod rounds;
pub mod scheduler;
pub mod settlement;
pub mod state;
