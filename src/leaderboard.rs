use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::member_status::{MemberStatus, member_status};
use crate::state::{Group, MemberBalance, Wager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub member_id: String,
    pub name: String,
    pub credits: i64,
    pub net: i64,
    pub status: MemberStatus,
}

/// Members of `group` ranked by credits, highest first. Equal credits share a rank.
pub fn compute_leaderboard(
    group: &Group,
    balances: &[MemberBalance],
    wagers: &[Wager],
) -> Vec<LeaderboardRow> {
    let mut members: Vec<&MemberBalance> = balances
        .iter()
        .filter(|b| b.group_id == group.id)
        .collect();
    members.sort_by_key(|b| (Reverse(b.current), b.member_id.clone()));

    let mut rows: Vec<LeaderboardRow> = Vec::with_capacity(members.len());
    for (idx, balance) in members.into_iter().enumerate() {
        let rank = match rows.last() {
            Some(prev) if prev.credits == balance.current => prev.rank,
            _ => idx + 1,
        };
        rows.push(LeaderboardRow {
            rank,
            member_id: balance.member_id.clone(),
            name: balance.name().to_string(),
            credits: balance.current,
            net: balance.current - balance.starting,
            status: member_status(balance, group.mode, wagers),
        });
    }
    rows
}
