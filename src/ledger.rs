use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::provider::{MemberStore, OddsSource, WagerStore};
use crate::settlement::{self, WagerError};
use crate::state::{Match, MatchStatus, SettlementRecord, SettlementState, Wager, WagerDraft};

/// Outcome of a placement attempt: validation failures are kept apart from
/// collaborator failures so the caller can surface them differently.
#[derive(Debug)]
pub enum Placement {
    Placed(Wager),
    Rejected(WagerError),
}

/// Validates a draft against the authoritative match and balance, then stores it.
pub fn place<S: WagerStore + MemberStore>(
    store: &mut S,
    draft: WagerDraft,
    fixture: &Match,
    now: DateTime<Utc>,
) -> Result<Placement> {
    let group = store.get_group(&draft.group_id)?;
    let balance = store
        .get_members(&draft.group_id)?
        .into_iter()
        .find(|b| b.member_id == draft.member_id)
        .with_context(|| format!("{} is not a member of {}", draft.member_id, draft.group_id))?;
    let existing: Vec<Wager> = store
        .group_wagers(&draft.group_id)?
        .into_iter()
        .filter(|w| w.member_id == draft.member_id)
        .collect();

    match settlement::place_wager(draft, fixture, group.mode, &balance, &existing, now) {
        Ok(wager) => Ok(Placement::Placed(store.place_wager(wager)?)),
        Err(err) => Ok(Placement::Rejected(err)),
    }
}

/// Settles every pending wager of `fixture` in one group.
///
/// Each wager is marked in the store first and the balance is only adjusted
/// when the store reports a fresh transition, so replaying this for the same
/// match never applies a delta twice.
pub fn settle_match<S, O>(
    store: &mut S,
    odds: &O,
    fixture: &Match,
    group_id: &str,
) -> Result<Vec<SettlementRecord>>
where
    S: WagerStore + MemberStore,
    O: OddsSource + ?Sized,
{
    if !matches!(
        fixture.status,
        MatchStatus::Finished | MatchStatus::Cancelled | MatchStatus::Postponed
    ) {
        return Ok(Vec::new());
    }

    let group = store.get_group(group_id)?;
    let entry = odds
        .get_odds(&fixture.id, group_id)
        .context("odds lookup failed")?;
    let pending = store.pending_wagers(&fixture.id, group_id)?;
    let members = store.get_members(group_id)?;

    let mut records = Vec::with_capacity(pending.len());
    for wager in pending {
        let balance = members
            .iter()
            .find(|b| b.member_id == wager.member_id)
            .map(|b| b.current)
            .unwrap_or(0);
        let outcome = match settlement::settle(&wager, fixture, entry.as_ref(), group.mode, balance)
        {
            Ok(outcome) => outcome,
            Err(WagerError::AlreadySettled { .. }) => continue,
            Err(err) => return Err(err).context(format!("settling wager {}", wager.id)),
        };

        if outcome.state == SettlementState::Pending {
            records.push(SettlementRecord {
                wager_id: wager.id.clone(),
                member_id: wager.member_id.clone(),
                state: SettlementState::Pending,
                points_delta: 0,
                new_balance: balance,
            });
            continue;
        }

        let receipt = store.settle_wager(&wager.id, outcome.state, outcome.points_delta)?;
        if !receipt.transitioned {
            continue;
        }
        let updated = if outcome.points_delta != 0 {
            store.adjust_balance(group_id, &wager.member_id, outcome.points_delta)?
        } else {
            members
                .iter()
                .find(|b| b.member_id == wager.member_id)
                .cloned()
                .with_context(|| format!("unknown member {}", wager.member_id))?
        };
        records.push(SettlementRecord {
            wager_id: receipt.wager.id,
            member_id: wager.member_id,
            state: outcome.state,
            points_delta: outcome.points_delta,
            new_balance: updated.current,
        });
    }
    Ok(records)
}
