use serde::{Deserialize, Serialize};

use crate::state::{GroupMode, MemberBalance, Wager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    Winner,
    Eliminated,
    Active,
}

impl MemberStatus {
    pub fn label(self) -> &'static str {
        match self {
            MemberStatus::Winner => "WINNER",
            MemberStatus::Eliminated => "ELIMINATED",
            MemberStatus::Active => "ACTIVE",
        }
    }
}

/// Derives a member's standing from their balance; never stored.
///
/// Classic groups have no credits economy, so everyone stays active. A member
/// at zero credits is only out once no staked wager of theirs is still open,
/// since that wager could restore the balance.
pub fn member_status(balance: &MemberBalance, mode: GroupMode, wagers: &[Wager]) -> MemberStatus {
    if mode == GroupMode::Classic {
        return MemberStatus::Active;
    }

    if let Some(goal) = balance.goal
        && balance.current >= goal
    {
        return MemberStatus::Winner;
    }

    if balance.current <= 0 && !has_open_stake(balance, wagers) {
        return MemberStatus::Eliminated;
    }

    MemberStatus::Active
}

fn has_open_stake(balance: &MemberBalance, wagers: &[Wager]) -> bool {
    wagers.iter().any(|w| {
        w.group_id == balance.group_id
            && w.member_id == balance.member_id
            && w.is_pending()
            && w.stake.unwrap_or(0) != 0
    })
}
