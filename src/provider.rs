use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use crate::odds::OddsTable;
use crate::state::{
    Group, Match, MatchStatus, MemberBalance, OddsEntry, SettlementState, Wager,
};

pub trait MatchProvider {
    fn list_matches(&mut self, group_id: &str) -> Result<Vec<Match>>;
    /// Only matches whose state needs updating; usually a small subset.
    fn refresh_live(&mut self, group_id: &str) -> Result<Vec<Match>>;
    fn refresh_one(&mut self, match_id: &str, group_id: Option<&str>) -> Result<Match>;
}

pub trait OddsSource {
    fn get_odds(&self, match_id: &str, group_id: &str) -> Result<Option<OddsEntry>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleReceipt {
    pub wager: Wager,
    /// False when the wager had already left the pending state.
    pub transitioned: bool,
}

pub trait WagerStore {
    fn place_wager(&mut self, wager: Wager) -> Result<Wager>;
    fn find_wager(&self, match_id: &str, group_id: &str, member_id: &str) -> Result<Option<Wager>>;
    fn pending_wagers(&self, match_id: &str, group_id: &str) -> Result<Vec<Wager>>;
    fn group_wagers(&self, group_id: &str) -> Result<Vec<Wager>>;
    /// Idempotent: a wager that is no longer pending is returned unchanged.
    fn settle_wager(
        &mut self,
        wager_id: &str,
        state: SettlementState,
        points: i64,
    ) -> Result<SettleReceipt>;
}

pub trait MemberStore {
    fn get_group(&self, group_id: &str) -> Result<Group>;
    fn get_members(&self, group_id: &str) -> Result<Vec<MemberBalance>>;
    fn adjust_balance(&mut self, group_id: &str, member_id: &str, delta: i64)
    -> Result<MemberBalance>;
}

/// Everything in process memory. Backs tests and the simulated runner.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pub groups: HashMap<String, Group>,
    pub balances: Vec<MemberBalance>,
    pub matches: HashMap<String, Vec<Match>>,
    pub odds: OddsTable,
    wagers: Vec<Wager>,
}

impl MemoryBackend {
    pub fn add_group(&mut self, group: Group, member_ids: &[&str]) {
        for member_id in member_ids {
            self.balances.push(MemberBalance::opening(&group, member_id));
        }
        self.groups.insert(group.id.clone(), group);
    }

    pub fn set_matches(&mut self, group_id: &str, matches: Vec<Match>) {
        self.matches.insert(group_id.to_string(), matches);
    }

    /// Stands in for the upstream feed changing a match.
    pub fn update_match(&mut self, group_id: &str, fixture: Match) -> bool {
        let Some(list) = self.matches.get_mut(group_id) else {
            return false;
        };
        match list.iter_mut().find(|m| m.id == fixture.id) {
            Some(existing) => {
                *existing = fixture;
                true
            }
            None => false,
        }
    }

    pub fn balance(&self, group_id: &str, member_id: &str) -> Option<&MemberBalance> {
        self.balances
            .iter()
            .find(|b| b.group_id == group_id && b.member_id == member_id)
    }

    pub fn wagers(&self) -> &[Wager] {
        &self.wagers
    }
}

impl MatchProvider for MemoryBackend {
    fn list_matches(&mut self, group_id: &str) -> Result<Vec<Match>> {
        Ok(self.matches.get(group_id).cloned().unwrap_or_default())
    }

    fn refresh_live(&mut self, group_id: &str) -> Result<Vec<Match>> {
        let now = Utc::now();
        let list = self.matches.get(group_id).cloned().unwrap_or_default();
        Ok(list
            .into_iter()
            .filter(|m| m.status != MatchStatus::Scheduled || m.kickoff <= now)
            .map(|mut m| {
                m.round = None;
                m
            })
            .collect())
    }

    fn refresh_one(&mut self, match_id: &str, group_id: Option<&str>) -> Result<Match> {
        let found = match group_id {
            Some(group_id) => self
                .matches
                .get(group_id)
                .and_then(|list| list.iter().find(|m| m.id == match_id)),
            None => self
                .matches
                .values()
                .flat_map(|list| list.iter())
                .find(|m| m.id == match_id),
        };
        found
            .cloned()
            .ok_or_else(|| anyhow!("unknown match {match_id}"))
    }
}

impl OddsSource for MemoryBackend {
    fn get_odds(&self, match_id: &str, group_id: &str) -> Result<Option<OddsEntry>> {
        self.odds.get_odds(match_id, group_id)
    }
}

impl WagerStore for MemoryBackend {
    fn place_wager(&mut self, wager: Wager) -> Result<Wager> {
        match self.wagers.iter_mut().find(|w| w.id == wager.id) {
            Some(existing) if !existing.is_pending() => {
                Err(anyhow!("wager {} is already settled", wager.id))
            }
            Some(existing) => {
                *existing = wager.clone();
                Ok(wager)
            }
            None => {
                self.wagers.push(wager.clone());
                Ok(wager)
            }
        }
    }

    fn find_wager(&self, match_id: &str, group_id: &str, member_id: &str) -> Result<Option<Wager>> {
        let id = Wager::key(match_id, group_id, member_id);
        Ok(self.wagers.iter().find(|w| w.id == id).cloned())
    }

    fn pending_wagers(&self, match_id: &str, group_id: &str) -> Result<Vec<Wager>> {
        Ok(self
            .wagers
            .iter()
            .filter(|w| w.match_id == match_id && w.group_id == group_id && w.is_pending())
            .cloned()
            .collect())
    }

    fn group_wagers(&self, group_id: &str) -> Result<Vec<Wager>> {
        Ok(self
            .wagers
            .iter()
            .filter(|w| w.group_id == group_id)
            .cloned()
            .collect())
    }

    fn settle_wager(
        &mut self,
        wager_id: &str,
        state: SettlementState,
        points: i64,
    ) -> Result<SettleReceipt> {
        let wager = self
            .wagers
            .iter_mut()
            .find(|w| w.id == wager_id)
            .with_context(|| format!("unknown wager {wager_id}"))?;
        if !wager.is_pending() || state == SettlementState::Pending {
            return Ok(SettleReceipt {
                wager: wager.clone(),
                transitioned: false,
            });
        }
        wager.state = state;
        wager.points = Some(points);
        Ok(SettleReceipt {
            wager: wager.clone(),
            transitioned: true,
        })
    }
}

impl MemberStore for MemoryBackend {
    fn get_group(&self, group_id: &str) -> Result<Group> {
        self.groups
            .get(group_id)
            .cloned()
            .with_context(|| format!("unknown group {group_id}"))
    }

    fn get_members(&self, group_id: &str) -> Result<Vec<MemberBalance>> {
        Ok(self
            .balances
            .iter()
            .filter(|b| b.group_id == group_id)
            .cloned()
            .collect())
    }

    fn adjust_balance(
        &mut self,
        group_id: &str,
        member_id: &str,
        delta: i64,
    ) -> Result<MemberBalance> {
        let balance = self
            .balances
            .iter_mut()
            .find(|b| b.group_id == group_id && b.member_id == member_id)
            .with_context(|| format!("unknown member {member_id} in group {group_id}"))?;
        balance.current += delta;
        Ok(balance.clone())
    }
}
