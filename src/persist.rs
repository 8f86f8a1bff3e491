use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rounds::RoundPager;
use crate::state::{Match, PoolState};

const CACHE_DIR: &str = "kickoff_pool";
const CACHE_FILE: &str = "cache.json";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    groups: HashMap<String, GroupCache>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupCache {
    pager: RoundPager,
    #[serde(default)]
    matches: Vec<Match>,
    #[serde(default)]
    saved_at: Option<u64>,
}

/// Restores the window sizes and the last known matches so the first paint
/// does not wait on the network. Unreadable or stale-version caches are ignored.
pub fn load_into_state(state: &mut PoolState) {
    let Some(path) = cache_path() else {
        return;
    };
    load_from_path(state, &path);
}

pub fn save_from_state(state: &PoolState) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    save_to_path(state, &path)
}

pub fn load_from_path(state: &mut PoolState, path: &Path) -> bool {
    let Some(cache) = load_cache_file(path) else {
        return false;
    };
    let Some(group) = cache.groups.get(&state.group_id) else {
        return false;
    };
    state.pager = group.pager;
    if state.matches.is_empty() {
        state.matches = group.matches.clone();
    }
    true
}

pub fn save_to_path(state: &PoolState, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("create cache dir")?;
    }
    let mut cache = load_cache_file(path).unwrap_or_default();
    cache.version = CACHE_VERSION;
    cache.groups.insert(
        state.group_id.clone(),
        GroupCache {
            pager: state.pager,
            matches: state.matches.clone(),
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_secs()),
        },
    );

    let json = serde_json::to_string(&cache).context("serialize pool cache")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write pool cache")?;
    fs::rename(&tmp, path).context("swap pool cache")?;
    Ok(())
}

fn load_cache_file(path: &Path) -> Option<CacheFile> {
    let raw = fs::read_to_string(path).ok()?;
    let cache = serde_json::from_str::<CacheFile>(&raw).ok()?;
    (cache.version == CACHE_VERSION).then_some(cache)
}

fn cache_path() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(CACHE_DIR)
            .join(CACHE_FILE),
    )
}
