use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::merge::{MergeReport, merge_refreshed};
use crate::state::{Match, MatchStatus};

pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(60);
pub const LIKELY_FINISHED_AFTER_HOURS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub group_id: String,
    pub live_ids: Vec<String>,
    /// Mount generation the request was issued under; echo it back to `complete`.
    pub generation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// False when the result arrived after teardown, or belongs to an earlier mount, and was dropped.
    pub applied: bool,
    pub report: MergeReport,
    pub error: Option<String>,
}

/// Started-but-unfinished check. A SCHEDULED match that kicked off more than
/// `likely_finished_after` ago is assumed over and no longer keeps polling alive.
pub fn is_live_for_refresh(
    m: &Match,
    now: DateTime<Utc>,
    likely_finished_after: ChronoDuration,
) -> bool {
    match m.status {
        MatchStatus::Live => true,
        MatchStatus::Scheduled => m.kickoff <= now && now - m.kickoff <= likely_finished_after,
        _ => false,
    }
}

pub fn live_match_ids(
    matches: &[Match],
    now: DateTime<Utc>,
    likely_finished_after: ChronoDuration,
) -> HashSet<String> {
    matches
        .iter()
        .filter(|m| is_live_for_refresh(m, now, likely_finished_after))
        .map(|m| m.id.clone())
        .collect()
}

/// Visibility-aware polling loop for one group's live matches.
///
/// The host owns the clock: it calls [`tick`](Self::tick) as often as it
/// likes and the scheduler decides when a period has elapsed. Requests it
/// returns must be answered with [`complete`](Self::complete); until then
/// further requests are skipped, not queued.
#[derive(Debug)]
pub struct LiveRefreshScheduler {
    group_id: String,
    period: Duration,
    likely_finished_after: ChronoDuration,
    mounted: bool,
    visible: bool,
    next_due: Option<Instant>,
    refreshing: bool,
    live_ids: HashSet<String>,
    finished_ids: Vec<String>,
    leaderboard_dirty: bool,
    fetches_issued: u64,
    generation: u64,
}

impl LiveRefreshScheduler {
    pub fn new(group_id: &str, period: Duration, likely_finished_after: ChronoDuration) -> Self {
        Self {
            group_id: group_id.to_string(),
            period,
            likely_finished_after,
            mounted: false,
            visible: false,
            next_due: None,
            refreshing: false,
            live_ids: HashSet::new(),
            finished_ids: Vec::new(),
            leaderboard_dirty: false,
            fetches_issued: 0,
            generation: 0,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.next_due.is_some() {
            SchedulerPhase::Active
        } else {
            SchedulerPhase::Idle
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn live_ids(&self) -> &HashSet<String> {
        &self.live_ids
    }

    pub fn fetches_issued(&self) -> u64 {
        self.fetches_issued
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mount(
        &mut self,
        matches: &[Match],
        visible: bool,
        now: DateTime<Utc>,
        at: Instant,
    ) -> Option<RefreshRequest> {
        self.generation += 1;
        self.mounted = true;
        self.visible = visible;
        self.next_due = None;
        self.refreshing = false;
        self.evaluate(matches, now, at)
    }

    /// Teardown: drops the timer and makes any outstanding result a no-op.
    pub fn unmount(&mut self) {
        self.generation += 1;
        self.mounted = false;
        self.next_due = None;
        self.refreshing = false;
        self.live_ids.clear();
    }

    pub fn set_visible(
        &mut self,
        visible: bool,
        matches: &[Match],
        now: DateTime<Utc>,
        at: Instant,
    ) -> Option<RefreshRequest> {
        self.visible = visible;
        if !visible {
            self.next_due = None;
            return None;
        }
        self.evaluate(matches, now, at)
    }

    /// Re-evaluates after the match set changed outside of a refresh.
    pub fn sync(
        &mut self,
        matches: &[Match],
        now: DateTime<Utc>,
        at: Instant,
    ) -> Option<RefreshRequest> {
        self.evaluate(matches, now, at)
    }

    pub fn tick(
        &mut self,
        matches: &[Match],
        now: DateTime<Utc>,
        at: Instant,
    ) -> Option<RefreshRequest> {
        let Some(due) = self.next_due else {
            // Idle: a scheduled match may have kicked off since the last look.
            if self.mounted && self.visible {
                return self.evaluate(matches, now, at);
            }
            return None;
        };
        if at < due {
            return None;
        }
        self.live_ids = live_match_ids(matches, now, self.likely_finished_after);
        if !self.mounted || !self.visible || self.live_ids.is_empty() {
            self.next_due = None;
            return None;
        }
        self.next_due = Some(at + self.period);
        self.begin_refresh()
    }

    /// Applies the answer to the outstanding request and clears the in-flight flag.
    /// Failures leave the match list and the timer untouched. Answers tagged
    /// with an older generation are dropped without touching the in-flight flag.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Vec<Match>, String>,
        matches: &mut [Match],
        now: DateTime<Utc>,
        at: Instant,
    ) -> RefreshOutcome {
        if !self.mounted || generation != self.generation {
            return RefreshOutcome::default();
        }
        self.refreshing = false;

        let refreshed = match result {
            Ok(refreshed) => refreshed,
            Err(error) => {
                return RefreshOutcome {
                    applied: true,
                    report: MergeReport::default(),
                    error: Some(error),
                };
            }
        };

        let report = merge_refreshed(matches, refreshed);
        if !report.finished.is_empty() {
            self.finished_ids.extend(report.finished.iter().cloned());
            self.leaderboard_dirty = true;
        }
        self.live_ids = live_match_ids(matches, now, self.likely_finished_after);
        if self.live_ids.is_empty() {
            self.next_due = None;
        } else if self.next_due.is_none() && self.visible {
            self.next_due = Some(at + self.period);
        }

        RefreshOutcome {
            applied: true,
            report,
            error: None,
        }
    }

    /// One-shot: the matches that finished since the last call, if any.
    pub fn take_leaderboard_dirty(&mut self) -> Option<Vec<String>> {
        if !self.leaderboard_dirty {
            return None;
        }
        self.leaderboard_dirty = false;
        Some(std::mem::take(&mut self.finished_ids))
    }

    fn evaluate(
        &mut self,
        matches: &[Match],
        now: DateTime<Utc>,
        at: Instant,
    ) -> Option<RefreshRequest> {
        self.live_ids = live_match_ids(matches, now, self.likely_finished_after);
        if !self.mounted || !self.visible || self.live_ids.is_empty() {
            self.next_due = None;
            return None;
        }
        if self.next_due.is_some() {
            return None;
        }
        self.next_due = Some(at + self.period);
        self.begin_refresh()
    }

    fn begin_refresh(&mut self) -> Option<RefreshRequest> {
        if self.refreshing {
            return None;
        }
        self.refreshing = true;
        self.fetches_issued += 1;
        let mut live_ids: Vec<String> = self.live_ids.iter().cloned().collect();
        live_ids.sort();
        Some(RefreshRequest {
            group_id: self.group_id.clone(),
            live_ids,
            generation: self.generation,
        })
    }
}
