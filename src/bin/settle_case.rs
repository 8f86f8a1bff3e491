use std::fs;
use std::path::PathBuf;

use kickoff_pool::ledger;
use kickoff_pool::member_status::member_status;
use kickoff_pool::provider::{MemberStore, MemoryBackend, WagerStore};
use kickoff_pool::settlement::potential_payout;
use kickoff_pool::state::{Group, Match, MemberBalance, OddsEntry, Wager};

#[derive(Debug, serde::Deserialize)]
struct SettleCase {
    group: Group,
    balances: Vec<MemberBalance>,
    #[serde(default)]
    wagers: Vec<Wager>,
    #[serde(default)]
    odds: Option<OddsEntry>,
    fixture: Match,
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/settle_case.json"));

    let raw = fs::read_to_string(&path)?;
    let case: SettleCase = serde_json::from_str(&raw)?;

    // Offline replay of one finished match: no network, everything in memory.
    let mut store = MemoryBackend::default();
    let group_id = case.group.id.clone();
    let mode = case.group.mode;
    store.groups.insert(group_id.clone(), case.group);
    store.balances = case.balances;
    if let Some(odds) = case.odds {
        store.odds.insert(&case.fixture.id, &group_id, odds);
    }
    for wager in case.wagers {
        if let Some(stake) = wager.stake {
            println!(
                "{} stakes {} on {:?}, pays {} if right",
                wager.member_id,
                stake,
                wager.prediction,
                potential_payout(stake, wager.prediction, case.odds.as_ref())
            );
        }
        store.place_wager(wager)?;
    }

    let odds = store.odds.clone();
    let records = ledger::settle_match(&mut store, &odds, &case.fixture, &group_id)?;
    println!(
        "{} v {} ({}): {} wager(s) settled",
        case.fixture.home.name,
        case.fixture.away.name,
        case.fixture.score_line().unwrap_or_else(|| "-".to_string()),
        records.len()
    );
    for record in &records {
        println!(
            "  {:<10} {:?} {:+} -> {}",
            record.member_id, record.state, record.points_delta, record.new_balance
        );
    }

    let wagers = store.group_wagers(&group_id)?;
    for balance in store.get_members(&group_id)? {
        println!(
            "{:<10} {:>6} {}",
            balance.name(),
            balance.current,
            member_status(&balance, mode, &wagers).label()
        );
    }
    Ok(())
}
