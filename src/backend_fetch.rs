use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::http_cache::ConditionalCache;
use crate::http_client::http_client;
use crate::odds::OddsTable;
use crate::provider::{MatchProvider, OddsSource};
use crate::state::{Elapsed, Match, MatchResult, MatchStatus, OddsEntry, Period, TeamRef};

/// Match Provider and Odds Source backed by the pool's REST backend.
#[derive(Debug)]
pub struct HttpMatchProvider {
    base_url: String,
    cache: ConditionalCache,
    /// Odds embedded in list payloads; answers `get_odds` without another request.
    listed_odds: OddsTable,
}

impl HttpMatchProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: ConditionalCache::default(),
            listed_odds: OddsTable::default(),
        }
    }

    fn remember_odds(
        &mut self,
        group_id: &str,
        parsed: Vec<(Match, Option<OddsEntry>)>,
    ) -> Vec<Match> {
        parsed
            .into_iter()
            .map(|(fixture, odds)| {
                if let Some(entry) = odds {
                    self.listed_odds.insert(&fixture.id, group_id, entry);
                }
                fixture
            })
            .collect()
    }

    fn get(&self, path: &str) -> Result<String> {
        let client = http_client()?;
        let url = format!("{}{path}", self.base_url);
        self.cache
            .fetch(client, &url)
            .with_context(|| format!("GET {path}"))
    }
}

impl MatchProvider for HttpMatchProvider {
    fn list_matches(&mut self, group_id: &str) -> Result<Vec<Match>> {
        let body = self.get(&format!("/groups/{group_id}/matches"))?;
        let parsed = parse_matches_with_odds_json(&body)?;
        Ok(self.remember_odds(group_id, parsed))
    }

    fn refresh_live(&mut self, group_id: &str) -> Result<Vec<Match>> {
        let body = self.get(&format!("/groups/{group_id}/matches/live"))?;
        let parsed = parse_matches_with_odds_json(&body)?;
        Ok(self.remember_odds(group_id, parsed))
    }

    fn refresh_one(&mut self, match_id: &str, group_id: Option<&str>) -> Result<Match> {
        let path = match group_id {
            Some(group_id) => format!("/matches/{match_id}?groupId={group_id}"),
            None => format!("/matches/{match_id}"),
        };
        let body = self.get(&path)?;
        parse_match_json(&body).map(|(fixture, _)| fixture)
    }
}

impl OddsSource for HttpMatchProvider {
    fn get_odds(&self, match_id: &str, group_id: &str) -> Result<Option<OddsEntry>> {
        if let Some(entry) = self.listed_odds.get(match_id, group_id) {
            return Ok(Some(*entry));
        }
        let body = self.get(&format!("/matches/{match_id}/odds?groupId={group_id}"))?;
        parse_odds_json(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchesEnvelope {
    List(Vec<WireMatch>),
    Wrapped {
        #[serde(default)]
        matches: Vec<WireMatch>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatch {
    id: WireId,
    #[serde(default)]
    external_id: Option<WireId>,
    home_team: WireTeam,
    away_team: WireTeam,
    kickoff: DateTime<Utc>,
    status: String,
    #[serde(default)]
    score: Option<WireScore>,
    #[serde(default)]
    round: Option<String>,
    #[serde(default)]
    minute: Option<u16>,
    #[serde(default)]
    injury_time: Option<u16>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    odds: Option<WireOdds>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Num(u64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Num(n) => n.to_string(),
            WireId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTeam {
    #[serde(default)]
    id: Option<u32>,
    name: String,
    #[serde(default)]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireScore {
    home: Option<u8>,
    away: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOdds {
    home_win: Option<f64>,
    draw: Option<f64>,
    away_win: Option<f64>,
}

impl WireOdds {
    /// Missing multipliers default to 1.0; invalid ones drop the whole entry.
    fn into_entry(self) -> Option<OddsEntry> {
        let entry = OddsEntry {
            home_win: self.home_win.unwrap_or(1.0),
            draw: self.draw.unwrap_or(1.0),
            away_win: self.away_win.unwrap_or(1.0),
        };
        entry.is_valid().then_some(entry)
    }
}

pub fn parse_matches_json(raw: &str) -> Result<Vec<Match>> {
    Ok(parse_matches_with_odds_json(raw)?
        .into_iter()
        .map(|(fixture, _)| fixture)
        .collect())
}

/// Like [`parse_matches_json`], keeping the odds block each match carries.
pub fn parse_matches_with_odds_json(raw: &str) -> Result<Vec<(Match, Option<OddsEntry>)>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let envelope: MatchesEnvelope =
        serde_json::from_str(trimmed).context("invalid matches json")?;
    let wire = match envelope {
        MatchesEnvelope::List(items) => items,
        MatchesEnvelope::Wrapped { matches } => matches,
    };
    Ok(wire.into_iter().filter_map(build_match).collect())
}

pub fn parse_match_json(raw: &str) -> Result<(Match, Option<OddsEntry>)> {
    let wire: WireMatch = serde_json::from_str(raw.trim()).context("invalid match json")?;
    let status = wire.status.clone();
    build_match(wire).ok_or_else(|| anyhow!("unsupported match status {status:?}"))
}

pub fn parse_odds_json(raw: &str) -> Result<Option<OddsEntry>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let wire: WireOdds = serde_json::from_str(trimmed).context("invalid odds json")?;
    Ok(wire.into_entry())
}

pub fn parse_status(raw: &str) -> Option<MatchStatus> {
    let status = match raw.trim().to_ascii_uppercase().as_str() {
        "SCHEDULED" | "TIMED" | "NS" => MatchStatus::Scheduled,
        "LIVE" | "IN_PLAY" | "PAUSED" | "HT" => MatchStatus::Live,
        "FINISHED" | "AWARDED" | "FT" => MatchStatus::Finished,
        "POSTPONED" | "SUSPENDED" => MatchStatus::Postponed,
        "CANCELLED" | "CANCELED" => MatchStatus::Cancelled,
        _ => return None,
    };
    Some(status)
}

fn parse_period(raw: Option<&str>, status: &str) -> Period {
    let key = raw.unwrap_or(status).trim().to_ascii_uppercase();
    match key.as_str() {
        "HALF_TIME" | "PAUSED" | "HT" => Period::HalfTime,
        "SECOND_HALF" | "2H" => Period::SecondHalf,
        "EXTRA_TIME" | "ET" => Period::ExtraTime,
        "PENALTY_SHOOTOUT" | "PENALTIES" | "PEN" => Period::Penalties,
        "FULL_TIME" | "FT" => Period::FullTime,
        _ => Period::FirstHalf,
    }
}

fn build_match(wire: WireMatch) -> Option<(Match, Option<OddsEntry>)> {
    let status = parse_status(&wire.status)?;
    let result = wire.score.map(|s| MatchResult {
        home_score: s.home,
        away_score: s.away,
    });
    let elapsed = match (status, wire.minute) {
        (MatchStatus::Live, Some(minute)) => Some(Elapsed {
            minute,
            extra: wire.injury_time,
            period: parse_period(wire.period.as_deref(), &wire.status),
        }),
        _ => None,
    };
    let fixture = Match {
        id: wire.id.into_string(),
        external_id: wire.external_id.map(WireId::into_string),
        home: TeamRef {
            id: wire.home_team.id,
            name: wire.home_team.name,
            short_name: wire.home_team.short_name,
        },
        away: TeamRef {
            id: wire.away_team.id,
            name: wire.away_team.name,
            short_name: wire.away_team.short_name,
        },
        kickoff: wire.kickoff,
        status,
        result,
        round: wire.round.filter(|r| !r.trim().is_empty()),
        elapsed,
    }
    .normalized();
    Some((fixture, wire.odds.and_then(WireOdds::into_entry)))
}
