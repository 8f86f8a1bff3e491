use std::collections::HashMap;

use crate::state::{Match, MatchStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub updated: Vec<String>,
    /// Matches that moved into FINISHED with this merge.
    pub finished: Vec<String>,
    /// Matches that moved into CANCELLED or POSTPONED with this merge.
    pub closed: Vec<String>,
    /// Returned ids with no local copy; refresh never adds matches.
    pub ignored: Vec<String>,
}

/// Applies a partial refresh to the authoritative list.
///
/// Every field of a returned match overwrites the local copy except `round`,
/// which the refresh feed does not know about. Local matches missing from
/// `incoming` are left as they are.
pub fn merge_refreshed(local: &mut [Match], incoming: Vec<Match>) -> MergeReport {
    let index: HashMap<String, usize> = local
        .iter()
        .enumerate()
        .map(|(idx, m)| (m.id.clone(), idx))
        .collect();

    let mut report = MergeReport::default();
    for mut fresh in incoming {
        let Some(&idx) = index.get(&fresh.id) else {
            report.ignored.push(fresh.id);
            continue;
        };
        let existing = &mut local[idx];
        let previous = existing.status;
        fresh.round = existing.round.take();
        let fresh = fresh.normalized();

        if previous != fresh.status {
            match fresh.status {
                MatchStatus::Finished => report.finished.push(fresh.id.clone()),
                MatchStatus::Cancelled | MatchStatus::Postponed => {
                    report.closed.push(fresh.id.clone())
                }
                _ => {}
            }
        }
        report.updated.push(fresh.id.clone());
        *existing = fresh;
    }
    report
}
