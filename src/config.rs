use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub group_id: String,
    pub backend_url: Option<String>,
    pub live_poll: Duration,
    pub likely_finished_hours: i64,
    pub rounds_past: usize,
    pub rounds_future: usize,
    pub rounds_step: usize,
    pub persist: bool,
    pub run_for: Option<Duration>,
}

impl PoolConfig {
    pub fn from_env() -> Self {
        let group_id = env::var("POOL_GROUP_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "demo".to_string());
        let backend_url = env::var("POOL_BACKEND_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        Self {
            group_id,
            backend_url,
            live_poll: Duration::from_secs(env_u64("LIVE_POLL_SECS", 60).clamp(5, 600)),
            likely_finished_hours: env_u64("LIKELY_FINISHED_HOURS", 3).clamp(1, 24) as i64,
            rounds_past: env_u64("ROUNDS_PAST", 1).min(50) as usize,
            rounds_future: env_u64("ROUNDS_FUTURE", 1).min(50) as usize,
            rounds_step: env_u64("ROUNDS_STEP", 2).clamp(1, 20) as usize,
            persist: env_bool("POOL_PERSIST", true),
            run_for: env::var("POOL_RUN_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            group_id: "demo".to_string(),
            backend_url: None,
            live_poll: Duration::from_secs(60),
            likely_finished_hours: 3,
            rounds_past: 1,
            rounds_future: 1,
            rounds_step: 2,
            persist: false,
            run_for: None,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
