use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Match, MatchStatus, UNKNOWN_ROUND, Wager};

#[derive(Debug, Clone, PartialEq)]
pub struct RoundGroup {
    pub label: String,
    pub ordinal: u32,
    pub min_date: DateTime<Utc>,
    pub max_date: DateTime<Utc>,
    pub matches: Vec<Match>,
}

impl RoundGroup {
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.min_date + (self.max_date - self.min_date) / 2
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_ROUND
    }

    pub fn live_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| m.status == MatchStatus::Live)
            .count()
    }
}

/// First run of ASCII digits in a round label ("Round 14" -> 14); 0 when there is none.
pub fn extract_ordinal(label: &str) -> u32 {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u32>().unwrap_or(u32::MAX)
}

/// Buckets matches by round label, most advanced round first, "Unknown" last.
/// The input is left untouched.
pub fn group_by_round(matches: &[Match]) -> Vec<RoundGroup> {
    let mut buckets: HashMap<&str, Vec<&Match>> = HashMap::new();
    for m in matches {
        buckets.entry(m.round_label()).or_default().push(m);
    }

    let mut rounds: Vec<RoundGroup> = buckets
        .into_iter()
        .filter_map(|(label, mut members)| {
            members.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.id.cmp(&b.id)));
            let min_date = members.first()?.kickoff;
            let max_date = members.last()?.kickoff;
            Some(RoundGroup {
                label: label.to_string(),
                ordinal: extract_ordinal(label),
                min_date,
                max_date,
                matches: members.into_iter().cloned().collect(),
            })
        })
        .collect();

    rounds.sort_by(compare_rounds);
    rounds
}

fn compare_rounds(a: &RoundGroup, b: &RoundGroup) -> Ordering {
    a.is_unknown()
        .cmp(&b.is_unknown())
        .then_with(|| Reverse(a.ordinal).cmp(&Reverse(b.ordinal)))
        .then_with(|| Reverse(a.max_date).cmp(&Reverse(b.max_date)))
        .then_with(|| a.label.cmp(&b.label))
}

/// Index of the round whose date midpoint is nearest to `now`; the earliest index wins ties.
pub fn current_round_index(rounds: &[RoundGroup], now: DateTime<Utc>) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (idx, round) in rounds.iter().enumerate() {
        let distance = (round.midpoint() - now).num_milliseconds().abs();
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundWindow {
    pub current: usize,
    pub start: usize,
    /// Inclusive.
    pub end: usize,
    pub has_more_future_rounds: bool,
    pub has_more_past_rounds: bool,
}

impl RoundWindow {
    pub fn slice<'a>(&self, rounds: &'a [RoundGroup]) -> &'a [RoundGroup] {
        &rounds[self.start..=self.end]
    }
}

/// Rounds are ordered newest first, so future rounds sit before `current` and
/// past rounds after it. The window is clamped to the list bounds.
pub fn window_around_current(
    rounds: &[RoundGroup],
    current: usize,
    past_count: usize,
    future_count: usize,
) -> Option<RoundWindow> {
    if rounds.is_empty() {
        return None;
    }
    let last = rounds.len() - 1;
    let current = current.min(last);
    let start = current.saturating_sub(future_count);
    let end = current.saturating_add(past_count).min(last);
    Some(RoundWindow {
        current,
        start,
        end,
        has_more_future_rounds: start > 0,
        has_more_past_rounds: end < last,
    })
}

pub fn window_around_now(
    rounds: &[RoundGroup],
    now: DateTime<Utc>,
    past_count: usize,
    future_count: usize,
) -> Option<RoundWindow> {
    let current = current_round_index(rounds, now)?;
    window_around_current(rounds, current, past_count, future_count)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of either team's name.
    pub team: Option<String>,
    /// Only matches this member has a wager on.
    pub member: Option<String>,
    /// Exact score line such as "2-1".
    pub score: Option<String>,
}

impl MatchFilter {
    pub fn is_active(&self) -> bool {
        self.status.is_some()
            || self.date.is_some()
            || self.team.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.member.is_some()
            || self.score.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn accepts(&self, m: &Match, wagers: &[Wager]) -> bool {
        if let Some(status) = self.status
            && m.status != status
        {
            return false;
        }
        if let Some(date) = self.date
            && m.kickoff.date_naive() != date
        {
            return false;
        }
        if let Some(team) = self.team.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = team.to_lowercase();
            let hit = [&m.home, &m.away].iter().any(|side| {
                side.name.to_lowercase().contains(&needle)
                    || side
                        .short_name
                        .as_deref()
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
            });
            if !hit {
                return false;
            }
        }
        if let Some(member) = self.member.as_deref()
            && !wagers
                .iter()
                .any(|w| w.match_id == m.id && w.member_id == member)
        {
            return false;
        }
        if let Some(score) = self.score.as_deref().map(str::trim).filter(|s| !s.is_empty())
            && m.score_line().as_deref() != Some(score)
        {
            return false;
        }
        true
    }
}

/// Caller's window size choices; these survive every regroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPager {
    pub past: usize,
    pub future: usize,
    pub step: usize,
}

impl RoundPager {
    pub fn new(past: usize, future: usize, step: usize) -> Self {
        Self {
            past,
            future,
            step: step.max(1),
        }
    }

    pub fn load_more_past(&mut self) {
        self.past = self.past.saturating_add(self.step);
    }

    pub fn load_more_future(&mut self) {
        self.future = self.future.saturating_add(self.step);
    }
}

impl Default for RoundPager {
    fn default() -> Self {
        Self::new(1, 1, 2)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundView {
    pub rounds: Vec<RoundGroup>,
    /// Index of the current round inside `rounds`.
    pub current: Option<usize>,
    pub has_more_future_rounds: bool,
    pub has_more_past_rounds: bool,
    pub paginated: bool,
}

/// Recomputes what to show from the full match set: every matching round when
/// a filter is active, otherwise the pager's window around the current round.
pub fn visible_rounds(
    matches: &[Match],
    filter: &MatchFilter,
    wagers: &[Wager],
    pager: &RoundPager,
    now: DateTime<Utc>,
) -> RoundView {
    if filter.is_active() {
        let selected: Vec<Match> = matches
            .iter()
            .filter(|m| filter.accepts(m, wagers))
            .cloned()
            .collect();
        let rounds = group_by_round(&selected);
        let current = current_round_index(&rounds, now);
        return RoundView {
            rounds,
            current,
            has_more_future_rounds: false,
            has_more_past_rounds: false,
            paginated: false,
        };
    }

    let rounds = group_by_round(matches);
    let Some(window) = window_around_now(&rounds, now, pager.past, pager.future) else {
        return RoundView {
            paginated: true,
            ..RoundView::default()
        };
    };
    RoundView {
        rounds: window.slice(&rounds).to_vec(),
        current: Some(window.current - window.start),
        has_more_future_rounds: window.has_more_future_rounds,
        has_more_past_rounds: window.has_more_past_rounds,
        paginated: true,
    }
}
