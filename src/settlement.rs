use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::state::{
    GroupMode, Match, MatchStatus, MemberBalance, OddsEntry, Outcome, SettlementState, Wager,
    WagerDraft,
};

/// Points for a correct prediction in a classic group.
pub const CLASSIC_POINTS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WagerError {
    #[error("stake must be positive, got {stake}")]
    InvalidStake { stake: i64 },
    #[error("a stake is required in a relative group")]
    MissingStake,
    #[error("match {match_id} has already started")]
    MatchStarted { match_id: String },
    #[error("match {match_id} is {status} and takes no wagers")]
    MatchClosed { match_id: String, status: &'static str },
    #[error("stake {stake} exceeds the {available} credits available")]
    InsufficientCredits { available: i64, stake: i64 },
    #[error("wager {wager_id} is already settled")]
    AlreadySettled { wager_id: String },
    #[error("match {match_id} has no final outcome yet")]
    OutcomeUnavailable { match_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub state: SettlementState,
    pub points_delta: i64,
    pub new_balance: i64,
}

/// Round half up to a whole credit. Inputs are non-negative (stake * positive multiplier).
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// What a correct prediction pays back, stake included.
pub fn potential_payout(stake: i64, predicted: Outcome, odds: Option<&OddsEntry>) -> i64 {
    let multiplier = odds.copied().unwrap_or_default().multiplier(predicted);
    round_half_up(stake.max(0) as f64 * multiplier)
}

/// Computes the effect of a match result on one wager without mutating anything.
///
/// A cancelled match refunds the wager for good. A postponed match refunds
/// nothing but leaves the wager pending so it can be re-predicted once the
/// fixture is rescheduled.
pub fn settle(
    wager: &Wager,
    fixture: &Match,
    odds: Option<&OddsEntry>,
    mode: GroupMode,
    balance: i64,
) -> Result<Settlement, WagerError> {
    if !wager.is_pending() {
        return Err(WagerError::AlreadySettled {
            wager_id: wager.id.clone(),
        });
    }

    let unchanged = |state| Settlement {
        state,
        points_delta: 0,
        new_balance: balance,
    };

    let actual = match fixture.status {
        MatchStatus::Cancelled => return Ok(unchanged(SettlementState::Refunded)),
        MatchStatus::Postponed => return Ok(unchanged(SettlementState::Pending)),
        MatchStatus::Finished => fixture.outcome(),
        MatchStatus::Scheduled | MatchStatus::Live => None,
    };
    let Some(actual) = actual else {
        return Err(WagerError::OutcomeUnavailable {
            match_id: fixture.id.clone(),
        });
    };

    let correct = wager.prediction == actual;
    let points_delta = match (mode, wager.stake) {
        (GroupMode::Classic, _) => {
            if correct {
                CLASSIC_POINTS
            } else {
                0
            }
        }
        (GroupMode::Relative, None) => return Err(WagerError::MissingStake),
        (GroupMode::Relative, Some(stake)) => {
            if correct {
                potential_payout(stake, wager.prediction, odds) - stake
            } else {
                // A loss never takes more than the member holds.
                -stake.min(balance.max(0))
            }
        }
    };

    Ok(Settlement {
        state: SettlementState::Settled,
        points_delta,
        new_balance: balance + points_delta,
    })
}

/// Records a computed settlement on the wager. Pending results leave it untouched.
pub fn apply_settlement(wager: &mut Wager, settlement: &Settlement) {
    if settlement.state == SettlementState::Pending {
        return;
    }
    wager.state = settlement.state;
    wager.points = Some(settlement.points_delta);
}

/// Validates a draft and turns it into the single pending wager for its
/// (match, group, member) tuple. `existing` holds the member's wagers in the group.
pub fn place_wager(
    draft: WagerDraft,
    fixture: &Match,
    mode: GroupMode,
    balance: &MemberBalance,
    existing: &[Wager],
    now: DateTime<Utc>,
) -> Result<Wager, WagerError> {
    match fixture.status {
        MatchStatus::Scheduled | MatchStatus::Postponed => {}
        MatchStatus::Live => {
            return Err(WagerError::MatchStarted {
                match_id: fixture.id.clone(),
            });
        }
        status => {
            return Err(WagerError::MatchClosed {
                match_id: fixture.id.clone(),
                status: status.label(),
            });
        }
    }
    if !fixture.is_open_for_wagers(now) {
        return Err(WagerError::MatchStarted {
            match_id: fixture.id.clone(),
        });
    }

    let id = Wager::key(&draft.match_id, &draft.group_id, &draft.member_id);
    if let Some(prior) = existing.iter().find(|w| w.id == id)
        && !prior.is_pending()
    {
        return Err(WagerError::AlreadySettled { wager_id: id });
    }

    let stake = match mode {
        GroupMode::Classic => None,
        GroupMode::Relative => {
            let stake = draft.stake.ok_or(WagerError::MissingStake)?;
            if stake <= 0 {
                return Err(WagerError::InvalidStake { stake });
            }
            let committed: i64 = existing
                .iter()
                .filter(|w| w.id != id)
                .map(Wager::committed_stake)
                .sum();
            let available = balance.current - committed;
            if stake > available {
                return Err(WagerError::InsufficientCredits {
                    available: available.max(0),
                    stake,
                });
            }
            Some(stake)
        }
    };

    Ok(Wager {
        id,
        match_id: draft.match_id,
        group_id: draft.group_id,
        member_id: draft.member_id,
        prediction: draft.prediction,
        stake,
        state: SettlementState::Pending,
        points: None,
        placed_at: now,
    })
}
