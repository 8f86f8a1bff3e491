use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use chrono::Utc;

use crate::ledger::{self, Placement};
use crate::provider::{MatchProvider, MemberStore, OddsSource, WagerStore};
use crate::state::{Delta, ProviderCommand};

/// Runs collaborator calls off the UI thread. Results come back as [`Delta`]s;
/// the worker never touches client state. It exits once either channel closes.
pub fn spawn_provider<M, S>(
    mut matches: M,
    mut store: S,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> JoinHandle<()>
where
    M: MatchProvider + OddsSource + Send + 'static,
    S: WagerStore + MemberStore + Send + 'static,
{
    thread::spawn(move || {
        for cmd in cmd_rx {
            if !handle_command(&mut matches, &mut store, cmd, &tx) {
                break;
            }
        }
    })
}

/// Executes one command. Returns false when the receiving side is gone.
pub fn handle_command<M, S>(
    matches: &mut M,
    store: &mut S,
    cmd: ProviderCommand,
    tx: &Sender<Delta>,
) -> bool
where
    M: MatchProvider + OddsSource,
    S: WagerStore + MemberStore,
{
    let mut out: Vec<Delta> = Vec::new();
    match cmd {
        ProviderCommand::LoadGroup { group_id } => {
            match store.get_group(&group_id) {
                Ok(group) => out.push(Delta::SetGroup(group)),
                Err(err) => out.push(warn(format!("Group load error: {err:#}"))),
            }
            match store.get_members(&group_id) {
                Ok(balances) => out.push(Delta::SetBalances {
                    group_id: group_id.clone(),
                    balances,
                }),
                Err(err) => out.push(warn(format!("Members load error: {err:#}"))),
            }
            match store.group_wagers(&group_id) {
                Ok(wagers) => out.push(Delta::SetWagers {
                    group_id: group_id.clone(),
                    wagers,
                }),
                Err(err) => out.push(warn(format!("Wagers load error: {err:#}"))),
            }
            list_with_odds(matches, group_id, &mut out);
        }
        ProviderCommand::ListMatches { group_id } => list_with_odds(matches, group_id, &mut out),
        ProviderCommand::RefreshLive {
            group_id,
            generation,
        } => match matches.refresh_live(&group_id) {
            Ok(list) => out.push(Delta::LiveRefreshed {
                group_id,
                generation,
                matches: list,
            }),
            Err(err) => out.push(Delta::LiveRefreshFailed {
                group_id,
                generation,
                error: format!("{err:#}"),
            }),
        },
        ProviderCommand::RefreshOne { match_id, group_id } => {
            match matches.refresh_one(&match_id, group_id.as_deref()) {
                Ok(fixture) => {
                    let odds = match group_id.as_deref() {
                        Some(group_id) => match matches.get_odds(&match_id, group_id) {
                            Ok(odds) => odds,
                            Err(err) => {
                                out.push(warn(format!("Odds lookup error: {err:#}")));
                                None
                            }
                        },
                        None => None,
                    };
                    out.push(Delta::MatchRefreshed {
                        group_id,
                        fixture,
                        odds,
                    });
                }
                Err(err) => out.push(warn(format!("Match refresh error: {err:#}"))),
            }
        }
        ProviderCommand::PlaceWager(draft) => {
            match matches.refresh_one(&draft.match_id, Some(&draft.group_id)) {
                Ok(fixture) => match ledger::place(store, draft.clone(), &fixture, Utc::now()) {
                    Ok(Placement::Placed(wager)) => out.push(Delta::WagerPlaced(wager)),
                    Ok(Placement::Rejected(reason)) => out.push(Delta::WagerRejected {
                        draft,
                        reason: reason.to_string(),
                    }),
                    Err(err) => out.push(warn(format!("Wager store error: {err:#}"))),
                },
                Err(err) => out.push(warn(format!("Wager match lookup error: {err:#}"))),
            }
        }
        ProviderCommand::SettleMatch { match_id, group_id } => {
            match matches.refresh_one(&match_id, Some(&group_id)) {
                Ok(fixture) => match ledger::settle_match(store, &*matches, &fixture, &group_id) {
                    Ok(records) => out.push(Delta::MatchSettled {
                        group_id,
                        match_id,
                        records,
                    }),
                    Err(err) => out.push(Delta::Log(format!(
                        "[ERROR] Settlement of {match_id} failed: {err:#}"
                    ))),
                },
                Err(err) => out.push(warn(format!("Settlement lookup error: {err:#}"))),
            }
        }
    }

    out.into_iter().all(|delta| tx.send(delta).is_ok())
}

/// Lists the group's matches along with the odds quoted for the ones still open to wagers.
/// An odds failure is logged once and leaves the remaining matches at even odds.
fn list_with_odds<M>(matches: &mut M, group_id: String, out: &mut Vec<Delta>)
where
    M: MatchProvider + OddsSource,
{
    let list = match matches.list_matches(&group_id) {
        Ok(list) => list,
        Err(err) => {
            out.push(warn(format!("Match list error: {err:#}")));
            return;
        }
    };
    let now = Utc::now();
    let mut odds = Vec::new();
    for fixture in list.iter().filter(|m| m.is_open_for_wagers(now)) {
        match matches.get_odds(&fixture.id, &group_id) {
            Ok(Some(entry)) => odds.push((fixture.id.clone(), entry)),
            Ok(None) => {}
            Err(err) => {
                out.push(warn(format!("Odds lookup error: {err:#}")));
                break;
            }
        }
    }
    out.push(Delta::SetMatches {
        group_id,
        matches: list,
        odds,
    });
}

fn warn(msg: String) -> Delta {
    Delta::Log(format!("[WARN] {msg}"))
}
