use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::provider::{MatchProvider, MemoryBackend, OddsSource, WagerStore};
use crate::state::{
    Elapsed, Group, GroupMode, Match, MatchResult, MatchStatus, OddsEntry, Outcome, Period,
    SettlementState, TeamRef, Wager,
};

const TEAMS: [(&str, &str); 10] = [
    ("Northbridge United", "NBU"),
    ("Harbour City", "HBC"),
    ("Redmoor Athletic", "RMA"),
    ("Eastvale Rovers", "EVR"),
    ("Kingsport FC", "KSP"),
    ("Old Mill Town", "OMT"),
    ("Ashford Wanderers", "ASW"),
    ("Crestwood Albion", "CRA"),
    ("Lakeside Rangers", "LKR"),
    ("Stonegate Villa", "SGV"),
];

/// Simulated Match Provider: a short season of weekly rounds around `now`,
/// with the current round playing out a few minutes per live refresh.
#[derive(Debug)]
pub struct SimulatedFeed {
    rng: StdRng,
    matches: HashMap<String, Vec<Match>>,
    odds: HashMap<(String, String), OddsEntry>,
    minutes_per_refresh: u16,
}

impl SimulatedFeed {
    pub fn new(group_id: &str, rounds: u32, seed: u64, now: DateTime<Utc>) -> Self {
        let mut feed = Self {
            rng: StdRng::seed_from_u64(seed),
            matches: HashMap::new(),
            odds: HashMap::new(),
            minutes_per_refresh: 5,
        };
        let season = feed.build_season(group_id, rounds, now);
        feed.matches.insert(group_id.to_string(), season);
        feed
    }

    pub fn matches(&self, group_id: &str) -> &[Match] {
        self.matches
            .get(group_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn build_season(&mut self, group_id: &str, rounds: u32, now: DateTime<Utc>) -> Vec<Match> {
        let mut out = Vec::new();
        // The last round kicks off around now; earlier ones are a week apart.
        let first_kickoff = now - ChronoDuration::days(7 * i64::from(rounds.saturating_sub(2)));
        for round in 1..=rounds {
            let round_start = first_kickoff + ChronoDuration::days(7 * i64::from(round - 1));
            for slot in 0..(TEAMS.len() / 2) {
                let home_idx = (slot + round as usize) % TEAMS.len();
                let away_idx = (TEAMS.len() - 1 - slot + round as usize) % TEAMS.len();
                if home_idx == away_idx {
                    continue;
                }
                let kickoff = round_start + ChronoDuration::minutes(45 * slot as i64 - 60);
                let id = format!("r{round}-m{slot}");
                let mut fixture = Match {
                    id: id.clone(),
                    external_id: Some(format!("sim-{round:02}{slot:02}")),
                    home: team(home_idx),
                    away: team(away_idx),
                    kickoff,
                    status: MatchStatus::Scheduled,
                    result: None,
                    round: Some(format!("Round {round}")),
                    elapsed: None,
                };
                let played = now - kickoff;
                if played >= ChronoDuration::minutes(110) {
                    fixture.status = MatchStatus::Finished;
                    fixture.result = Some(MatchResult::new(
                        self.rng.gen_range(0..4),
                        self.rng.gen_range(0..4),
                    ));
                } else if played >= ChronoDuration::zero() {
                    fixture.status = MatchStatus::Live;
                    fixture.result = Some(MatchResult::new(0, 0));
                    fixture.elapsed = Some(Elapsed {
                        minute: (played.num_minutes() as u16).clamp(1, 90),
                        extra: None,
                        period: Period::FirstHalf,
                    });
                }
                let entry = OddsEntry {
                    home_win: self.rng.gen_range(1.4..3.2),
                    draw: self.rng.gen_range(2.8..3.8),
                    away_win: self.rng.gen_range(1.8..5.0),
                };
                self.odds.insert((id, group_id.to_string()), entry);
                out.push(fixture);
            }
        }
        out
    }

    fn advance(&mut self, fixture: &mut Match, now: DateTime<Utc>) -> bool {
        match fixture.status {
            MatchStatus::Scheduled if fixture.kickoff <= now => {
                fixture.status = MatchStatus::Live;
                fixture.result = Some(MatchResult::new(0, 0));
                fixture.elapsed = Some(Elapsed {
                    minute: 1,
                    extra: None,
                    period: Period::FirstHalf,
                });
                true
            }
            MatchStatus::Live => {
                let minute = fixture
                    .elapsed
                    .map(|e| e.minute)
                    .unwrap_or(1)
                    .saturating_add(self.minutes_per_refresh);
                if let Some(result) = fixture.result.as_mut() {
                    if self.rng.gen_bool(0.08) {
                        result.home_score = result.home_score.map(|s| s + 1);
                    }
                    if self.rng.gen_bool(0.06) {
                        result.away_score = result.away_score.map(|s| s + 1);
                    }
                }
                if minute >= 90 {
                    fixture.status = MatchStatus::Finished;
                    fixture.elapsed = None;
                } else {
                    fixture.elapsed = Some(Elapsed {
                        minute,
                        extra: None,
                        period: if minute > 45 {
                            Period::SecondHalf
                        } else {
                            Period::FirstHalf
                        },
                    });
                }
                true
            }
            _ => false,
        }
    }
}

fn team(idx: usize) -> TeamRef {
    let (name, short) = TEAMS[idx];
    TeamRef {
        id: Some(idx as u32 + 1),
        name: name.to_string(),
        short_name: Some(short.to_string()),
    }
}

impl MatchProvider for SimulatedFeed {
    fn list_matches(&mut self, group_id: &str) -> Result<Vec<Match>> {
        Ok(self.matches.get(group_id).cloned().unwrap_or_default())
    }

    fn refresh_live(&mut self, group_id: &str) -> Result<Vec<Match>> {
        let now = Utc::now();
        let Some(mut list) = self.matches.remove(group_id) else {
            return Ok(Vec::new());
        };
        let mut changed = Vec::new();
        for fixture in list.iter_mut() {
            if self.advance(fixture, now) {
                let mut partial = fixture.clone();
                partial.round = None;
                changed.push(partial);
            }
        }
        self.matches.insert(group_id.to_string(), list);
        Ok(changed)
    }

    fn refresh_one(&mut self, match_id: &str, group_id: Option<&str>) -> Result<Match> {
        self.matches
            .iter()
            .filter(|(gid, _)| group_id.is_none_or(|g| g == gid.as_str()))
            .flat_map(|(_, list)| list.iter())
            .find(|m| m.id == match_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown simulated match {match_id}"))
    }
}

impl OddsSource for SimulatedFeed {
    fn get_odds(&self, match_id: &str, group_id: &str) -> Result<Option<OddsEntry>> {
        Ok(self
            .odds
            .get(&(match_id.to_string(), group_id.to_string()))
            .copied())
    }
}

/// A relative group with a handful of members and open wagers on the live and upcoming rounds.
pub fn seed_store(
    feed: &SimulatedFeed,
    group_id: &str,
    now: DateTime<Utc>,
) -> Result<MemoryBackend> {
    let mut store = MemoryBackend::default();
    let group = Group {
        id: group_id.to_string(),
        name: "Sunday League Sharps".to_string(),
        mode: GroupMode::Relative,
        starting_credits: 100,
        goal_credits: Some(500),
    };
    let members = ["ana", "ben", "chidi", "dara"];
    store.add_group(group, &members);

    let predictions = [Outcome::Home, Outcome::Draw, Outcome::Away];
    for (idx, fixture) in feed
        .matches(group_id)
        .iter()
        .filter(|m| matches!(m.status, MatchStatus::Live | MatchStatus::Scheduled))
        .enumerate()
    {
        let member = members[idx % members.len()];
        store.place_wager(Wager {
            id: Wager::key(&fixture.id, group_id, member),
            match_id: fixture.id.clone(),
            group_id: group_id.to_string(),
            member_id: member.to_string(),
            prediction: predictions[idx % predictions.len()],
            stake: Some(10 + 5 * (idx as i64 % 4)),
            state: SettlementState::Pending,
            points: None,
            placed_at: now,
        })?;
    }
    Ok(store)
}
