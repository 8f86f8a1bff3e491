use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;
use crate::leaderboard::{self, LeaderboardRow};
use crate::member_status::{self, MemberStatus};
use crate::merge::{self, MergeReport};
use crate::odds::OddsTable;
use crate::rounds::{self, MatchFilter, RoundPager, RoundView};
use crate::scheduler::{LiveRefreshScheduler, RefreshRequest};
use crate::settlement;

pub const UNKNOWN_ROUND: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn label(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Postponed => "POSTPONED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }

    /// Results are only carried while the ball is (or was) in play.
    pub fn carries_result(self) -> bool {
        matches!(self, MatchStatus::Live | MatchStatus::Finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

impl TeamRef {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            short_name: None,
        }
    }

    pub fn display(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub home_score: Option<u8>,
    pub away_score: Option<u8>,
}

impl MatchResult {
    pub fn new(home_score: u8, away_score: u8) -> Self {
        Self {
            home_score: Some(home_score),
            away_score: Some(away_score),
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        let (home, away) = (self.home_score?, self.away_score?);
        Some(match home.cmp(&away) {
            std::cmp::Ordering::Greater => Outcome::Home,
            std::cmp::Ordering::Equal => Outcome::Draw,
            std::cmp::Ordering::Less => Outcome::Away,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    FirstHalf,
    HalfTime,
    SecondHalf,
    ExtraTime,
    Penalties,
    FullTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elapsed {
    pub minute: u16,
    #[serde(default)]
    pub extra: Option<u16>,
    pub period: Period,
}

impl Elapsed {
    pub fn display(&self) -> String {
        match self.period {
            Period::HalfTime => "HT".to_string(),
            Period::FullTime => "FT".to_string(),
            Period::Penalties => "PEN".to_string(),
            _ => match self.extra {
                Some(extra) if extra > 0 => format!("{}+{}'", self.minute, extra),
                _ => format!("{}'", self.minute),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub home: TeamRef,
    pub away: TeamRef,
    pub kickoff: DateTime<Utc>,
    pub status: MatchStatus,
    #[serde(default)]
    pub result: Option<MatchResult>,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default)]
    pub elapsed: Option<Elapsed>,
}

impl Match {
    pub fn scheduled(id: &str, home: &str, away: &str, kickoff: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            external_id: None,
            home: TeamRef::named(home),
            away: TeamRef::named(away),
            kickoff,
            status: MatchStatus::Scheduled,
            result: None,
            round: None,
            elapsed: None,
        }
    }

    /// Drops fields the current status cannot carry (a scheduled match has no score).
    pub fn normalized(mut self) -> Self {
        if !self.status.carries_result() {
            self.result = None;
        }
        if self.status != MatchStatus::Live {
            self.elapsed = None;
        }
        self
    }

    pub fn outcome(&self) -> Option<Outcome> {
        if !self.status.carries_result() {
            return None;
        }
        self.result.as_ref().and_then(MatchResult::outcome)
    }

    /// Grouping key: the provider's label verbatim, or `Unknown` when blank.
    pub fn round_label(&self) -> &str {
        self.round
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(UNKNOWN_ROUND)
    }

    pub fn score_line(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        Some(format!("{}-{}", result.home_score?, result.away_score?))
    }

    /// Wagers may be placed or edited only before kickoff on a match that can still be played.
    pub fn is_open_for_wagers(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, MatchStatus::Scheduled | MatchStatus::Postponed) && self.kickoff > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsEntry {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

impl OddsEntry {
    /// 1:1 on every outcome; used whenever a group has no entry for a match.
    pub const EVEN: OddsEntry = OddsEntry {
        home_win: 1.0,
        draw: 1.0,
        away_win: 1.0,
    };

    pub fn multiplier(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home_win,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away_win,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.home_win, self.draw, self.away_win]
            .iter()
            .all(|m| m.is_finite() && *m > 0.0)
    }
}

impl Default for OddsEntry {
    fn default() -> Self {
        Self::EVEN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementState {
    Pending,
    Settled,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerDraft {
    pub match_id: String,
    pub group_id: String,
    pub member_id: String,
    pub prediction: Outcome,
    #[serde(default)]
    pub stake: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub id: String,
    pub match_id: String,
    pub group_id: String,
    pub member_id: String,
    pub prediction: Outcome,
    #[serde(default)]
    pub stake: Option<i64>,
    pub state: SettlementState,
    #[serde(default)]
    pub points: Option<i64>,
    pub placed_at: DateTime<Utc>,
}

impl Wager {
    pub fn key(match_id: &str, group_id: &str, member_id: &str) -> String {
        format!("{match_id}:{group_id}:{member_id}")
    }

    pub fn is_pending(&self) -> bool {
        self.state == SettlementState::Pending
    }

    /// Credits this wager holds back from the member's balance until it settles.
    pub fn committed_stake(&self) -> i64 {
        if self.is_pending() {
            self.stake.unwrap_or(0).max(0)
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    Classic,
    Relative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub mode: GroupMode,
    pub starting_credits: i64,
    #[serde(default)]
    pub goal_credits: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub group_id: String,
    pub member_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub current: i64,
    pub starting: i64,
    #[serde(default)]
    pub goal: Option<i64>,
}

impl MemberBalance {
    pub fn opening(group: &Group, member_id: &str) -> Self {
        Self {
            group_id: group.id.clone(),
            member_id: member_id.to_string(),
            display_name: None,
            current: group.starting_credits,
            starting: group.starting_credits,
            goal: group.goal_credits,
        }
    }

    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.member_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub wager_id: String,
    pub member_id: String,
    pub state: SettlementState,
    pub points_delta: i64,
    pub new_balance: i64,
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    LoadGroup {
        group_id: String,
    },
    ListMatches {
        group_id: String,
    },
    RefreshLive {
        group_id: String,
        generation: u64,
    },
    RefreshOne {
        match_id: String,
        group_id: Option<String>,
    },
    PlaceWager(WagerDraft),
    SettleMatch {
        match_id: String,
        group_id: String,
    },
}

#[derive(Debug, Clone)]
pub enum Delta {
    Log(String),
    SetGroup(Group),
    SetMatches {
        group_id: String,
        matches: Vec<Match>,
        /// Odds the provider quotes for this group, keyed by match id.
        odds: Vec<(String, OddsEntry)>,
    },
    LiveRefreshed {
        group_id: String,
        generation: u64,
        matches: Vec<Match>,
    },
    LiveRefreshFailed {
        group_id: String,
        generation: u64,
        error: String,
    },
    MatchRefreshed {
        group_id: Option<String>,
        fixture: Match,
        odds: Option<OddsEntry>,
    },
    SetBalances {
        group_id: String,
        balances: Vec<MemberBalance>,
    },
    SetWagers {
        group_id: String,
        wagers: Vec<Wager>,
    },
    WagerPlaced(Wager),
    WagerRejected {
        draft: WagerDraft,
        reason: String,
    },
    MatchSettled {
        group_id: String,
        match_id: String,
        records: Vec<SettlementRecord>,
    },
}

/// Client-side projection of one group: authoritative matches, derived rounds,
/// wagers, balances and the live refresh loop that keeps them current.
#[derive(Debug)]
pub struct PoolState {
    pub group_id: String,
    pub group: Option<Group>,
    pub matches: Vec<Match>,
    pub odds: OddsTable,
    pub wagers: Vec<Wager>,
    pub balances: Vec<MemberBalance>,
    pub leaderboard: Vec<LeaderboardRow>,
    pub filter: MatchFilter,
    pub pager: RoundPager,
    pub view: RoundView,
    pub scheduler: LiveRefreshScheduler,
    pub visible: bool,
    pub logs: VecDeque<String>,
    outbox: Vec<ProviderCommand>,
}

impl PoolState {
    pub fn new(group_id: &str, cfg: &PoolConfig) -> Self {
        Self {
            group_id: group_id.to_string(),
            group: None,
            matches: Vec::new(),
            odds: OddsTable::default(),
            wagers: Vec::new(),
            balances: Vec::new(),
            leaderboard: Vec::new(),
            filter: MatchFilter::default(),
            pager: RoundPager::new(cfg.rounds_past, cfg.rounds_future, cfg.rounds_step),
            view: RoundView::default(),
            scheduler: LiveRefreshScheduler::new(
                group_id,
                cfg.live_poll,
                ChronoDuration::hours(cfg.likely_finished_hours),
            ),
            visible: true,
            logs: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        let msg = msg.into();
        if msg.starts_with("[ERROR]") {
            log::error!("{msg}");
        } else if msg.starts_with("[WARN]") {
            log::warn!("{msg}");
        } else {
            log::info!("{msg}");
        }
        self.logs.push_back(msg);
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Commands queued for the provider worker since the last drain.
    pub fn drain_commands(&mut self) -> Vec<ProviderCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn mode(&self) -> GroupMode {
        self.group
            .as_ref()
            .map(|g| g.mode)
            .unwrap_or(GroupMode::Classic)
    }

    pub fn find_match(&self, match_id: &str) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    pub fn regroup(&mut self, now: DateTime<Utc>) {
        self.view = rounds::visible_rounds(
            &self.matches,
            &self.filter,
            &self.wagers,
            &self.pager,
            now,
        );
    }

    pub fn mount(&mut self, now: DateTime<Utc>, at: Instant) {
        self.outbox.push(ProviderCommand::LoadGroup {
            group_id: self.group_id.clone(),
        });
        let request = self.scheduler.mount(&self.matches, self.visible, now, at);
        self.queue_refresh(request);
    }

    pub fn unmount(&mut self) {
        self.scheduler.unmount();
        self.outbox.clear();
    }

    pub fn set_visible(&mut self, visible: bool, now: DateTime<Utc>, at: Instant) {
        self.visible = visible;
        let request = self
            .scheduler
            .set_visible(visible, &self.matches, now, at);
        self.queue_refresh(request);
    }

    pub fn tick(&mut self, now: DateTime<Utc>, at: Instant) {
        let request = self.scheduler.tick(&self.matches, now, at);
        self.queue_refresh(request);
    }

    pub fn set_filter(&mut self, filter: MatchFilter, now: DateTime<Utc>) {
        self.filter = filter;
        self.regroup(now);
    }

    pub fn load_more_past(&mut self, now: DateTime<Utc>) {
        self.pager.load_more_past();
        self.regroup(now);
    }

    pub fn load_more_future(&mut self, now: DateTime<Utc>) {
        self.pager.load_more_future();
        self.regroup(now);
    }

    pub fn request_match(&mut self, match_id: &str) {
        self.outbox.push(ProviderCommand::RefreshOne {
            match_id: match_id.to_string(),
            group_id: Some(self.group_id.clone()),
        });
    }

    pub fn place_wager(&mut self, draft: WagerDraft) {
        self.outbox.push(ProviderCommand::PlaceWager(draft));
    }

    /// Preview of what a correct prediction would pay; `None` for unknown matches.
    pub fn payout_preview(
        &self,
        match_id: &str,
        prediction: Outcome,
        stake: Option<i64>,
    ) -> Option<i64> {
        self.find_match(match_id)?;
        match (self.mode(), stake) {
            (GroupMode::Classic, _) | (GroupMode::Relative, None) => {
                Some(settlement::CLASSIC_POINTS)
            }
            (GroupMode::Relative, Some(stake)) => Some(settlement::potential_payout(
                stake,
                prediction,
                self.odds.get(match_id, &self.group_id),
            )),
        }
    }

    pub fn member_status(&self, member_id: &str) -> Option<MemberStatus> {
        let balance = self.balances.iter().find(|b| b.member_id == member_id)?;
        Some(member_status::member_status(balance, self.mode(), &self.wagers))
    }

    fn queue_refresh(&mut self, request: Option<RefreshRequest>) {
        if let Some(request) = request {
            self.outbox.push(ProviderCommand::RefreshLive {
                group_id: request.group_id,
                generation: request.generation,
            });
        }
    }

    fn recompute_leaderboard(&mut self) {
        if let Some(group) = self.group.as_ref() {
            self.leaderboard = leaderboard::compute_leaderboard(group, &self.balances, &self.wagers);
        }
    }

    fn absorb_merge(&mut self, report: &MergeReport) {
        for id in report.finished.iter().chain(report.closed.iter()) {
            self.outbox.push(ProviderCommand::SettleMatch {
                match_id: id.clone(),
                group_id: self.group_id.clone(),
            });
        }
    }
}

pub fn apply_delta(state: &mut PoolState, delta: Delta) {
    apply_delta_at(state, delta, Utc::now(), Instant::now());
}

pub fn apply_delta_at(state: &mut PoolState, delta: Delta, now: DateTime<Utc>, at: Instant) {
    match delta {
        Delta::Log(msg) => state.push_log(msg),
        Delta::SetGroup(group) => {
            if group.id != state.group_id {
                return;
            }
            state.group = Some(group);
            state.recompute_leaderboard();
        }
        Delta::SetMatches {
            group_id,
            matches,
            odds,
        } => {
            if group_id != state.group_id {
                return;
            }
            for (match_id, entry) in odds {
                state.odds.insert(&match_id, &group_id, entry);
            }
            state.matches = matches.into_iter().map(Match::normalized).collect();
            state.regroup(now);
            let request = state.scheduler.sync(&state.matches, now, at);
            state.queue_refresh(request);
        }
        Delta::LiveRefreshed {
            group_id,
            generation,
            matches,
        } => {
            if group_id != state.group_id {
                return;
            }
            let outcome =
                state
                    .scheduler
                    .complete(generation, Ok(matches), &mut state.matches, now, at);
            if !outcome.applied {
                return;
            }
            if !outcome.report.updated.is_empty() {
                state.regroup(now);
            }
            if let Some(finished) = state.scheduler.take_leaderboard_dirty() {
                state.push_log(format!(
                    "[INFO] {} match(es) finished; settling wagers",
                    finished.len()
                ));
                for id in finished {
                    state.outbox.push(ProviderCommand::SettleMatch {
                        match_id: id,
                        group_id: state.group_id.clone(),
                    });
                }
            }
            for id in &outcome.report.closed {
                state.outbox.push(ProviderCommand::SettleMatch {
                    match_id: id.clone(),
                    group_id: state.group_id.clone(),
                });
            }
        }
        Delta::LiveRefreshFailed {
            group_id,
            generation,
            error,
        } => {
            if group_id != state.group_id {
                return;
            }
            let outcome = state.scheduler.complete(
                generation,
                Err(error.clone()),
                &mut state.matches,
                now,
                at,
            );
            if outcome.applied {
                state.push_log(format!("[WARN] Live refresh failed: {error}"));
            }
        }
        Delta::MatchRefreshed {
            group_id,
            fixture,
            odds,
        } => {
            let match_id = fixture.id.clone();
            let report = merge::merge_refreshed(&mut state.matches, vec![fixture]);
            if report.updated.is_empty() {
                return;
            }
            if let (Some(group_id), Some(entry)) = (group_id.as_deref(), odds)
                && group_id == state.group_id
            {
                state.odds.insert(&match_id, group_id, entry);
            }
            state.absorb_merge(&report);
            state.regroup(now);
        }
        Delta::SetBalances { group_id, balances } => {
            if group_id != state.group_id {
                return;
            }
            state.balances = balances;
            state.recompute_leaderboard();
        }
        Delta::SetWagers { group_id, wagers } => {
            if group_id != state.group_id {
                return;
            }
            state.wagers = wagers;
            state.recompute_leaderboard();
            if state.filter.member.is_some() {
                state.regroup(now);
            }
        }
        Delta::WagerPlaced(wager) => {
            if wager.group_id != state.group_id {
                return;
            }
            state.push_log(format!(
                "[INFO] Wager placed: {} on {} ({:?})",
                wager.member_id, wager.match_id, wager.prediction
            ));
            if let Some(existing) = state.wagers.iter_mut().find(|w| w.id == wager.id) {
                *existing = wager;
            } else {
                state.wagers.push(wager);
            }
        }
        Delta::WagerRejected { draft, reason } => {
            state.push_log(format!(
                "[WARN] Wager on {} rejected: {reason}",
                draft.match_id
            ));
        }
        Delta::MatchSettled {
            group_id,
            match_id,
            records,
        } => {
            if group_id != state.group_id {
                return;
            }
            for record in &records {
                if let Some(wager) = state.wagers.iter_mut().find(|w| w.id == record.wager_id) {
                    wager.state = record.state;
                    if record.state != SettlementState::Pending {
                        wager.points = Some(record.points_delta);
                    }
                }
                if let Some(balance) = state
                    .balances
                    .iter_mut()
                    .find(|b| b.member_id == record.member_id)
                {
                    balance.current = record.new_balance;
                }
            }
            if !records.is_empty() {
                state.push_log(format!(
                    "[INFO] Settled {} wager(s) on {match_id}",
                    records.len()
                ));
            }
            state.recompute_leaderboard();
        }
    }
}
