use std::sync::mpsc;
use std::time::Instant;

use chrono::{DateTime, Duration, TimeZone, Utc};

use kickoff_pool::config::PoolConfig;
use kickoff_pool::fake_feed::{SimulatedFeed, seed_store};
use kickoff_pool::feed::handle_command;
use kickoff_pool::member_status::MemberStatus;
use kickoff_pool::merge::merge_refreshed;
use kickoff_pool::provider::{MemoryBackend, OddsSource};
use kickoff_pool::rounds::MatchFilter;
use kickoff_pool::scheduler::SchedulerPhase;
use kickoff_pool::settlement::potential_payout;
use kickoff_pool::state::{
    Delta, Group, GroupMode, Match, MatchResult, MatchStatus, MemberBalance, OddsEntry, Outcome,
    PoolState, ProviderCommand, SettlementRecord, SettlementState, Wager, WagerDraft,
    apply_delta_at,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 15, 0, 0).unwrap()
}

fn group() -> Group {
    Group {
        id: "g1".to_string(),
        name: "Office Pool".to_string(),
        mode: GroupMode::Relative,
        starting_credits: 100,
        goal_credits: Some(500),
    }
}

fn in_round(mut m: Match, round: &str) -> Match {
    m.round = Some(round.to_string());
    m
}

fn live(id: &str) -> Match {
    let mut m = Match::scheduled(id, "Home", "Away", now() - Duration::minutes(40));
    m.status = MatchStatus::Live;
    m.result = Some(MatchResult::new(1, 0));
    m
}

fn matches() -> Vec<Match> {
    vec![
        in_round(live("m1"), "Round 3"),
        in_round(
            Match::scheduled("m2", "Kingsport", "Old Mill", now() + Duration::days(1)),
            "Round 3",
        ),
        in_round(
            Match::scheduled("m0", "Redmoor", "Eastvale", now() - Duration::days(7)),
            "Round 2",
        ),
    ]
}

fn loaded_state(at: Instant) -> PoolState {
    let mut state = PoolState::new("g1", &PoolConfig::default());
    state.mount(now(), at);
    apply_delta_at(&mut state, Delta::SetGroup(group()), now(), at);
    apply_delta_at(
        &mut state,
        Delta::SetBalances {
            group_id: "g1".to_string(),
            balances: vec![
                MemberBalance::opening(&group(), "ana"),
                MemberBalance::opening(&group(), "ben"),
            ],
        },
        now(),
        at,
    );
    apply_delta_at(
        &mut state,
        Delta::SetMatches {
            group_id: "g1".to_string(),
            matches: matches(),
            odds: Vec::new(),
        },
        now(),
        at,
    );
    state
}

#[test]
fn merge_keeps_local_round() {
    let mut local = vec![in_round(live("m1"), "Round 3")];
    let mut fresh = live("m1");
    fresh.result = Some(MatchResult::new(2, 0));
    let report = merge_refreshed(&mut local, vec![fresh]);

    assert_eq!(report.updated, vec!["m1".to_string()]);
    assert_eq!(local[0].round.as_deref(), Some("Round 3"));
    assert_eq!(local[0].score_line().as_deref(), Some("2-0"));
}

#[test]
fn merge_never_adds_matches() {
    let mut local = vec![live("m1")];
    let report = merge_refreshed(&mut local, vec![live("stranger")]);
    assert_eq!(local.len(), 1);
    assert_eq!(report.ignored, vec!["stranger".to_string()]);
    assert!(report.updated.is_empty());
}

#[test]
fn merge_reports_closed_transitions() {
    let mut local = vec![live("m1"), Match::scheduled("m2", "A", "B", now())];
    let mut cancelled = Match::scheduled("m2", "A", "B", now());
    cancelled.status = MatchStatus::Cancelled;
    let report = merge_refreshed(&mut local, vec![cancelled]);
    assert_eq!(report.closed, vec!["m2".to_string()]);
    assert!(report.finished.is_empty());
}

#[test]
fn mount_loads_group_and_starts_polling_once_matches_arrive() {
    let t0 = Instant::now();
    let mut state = PoolState::new("g1", &PoolConfig::default());
    state.mount(now(), t0);
    let first = state.drain_commands();
    assert!(matches!(first.as_slice(), [ProviderCommand::LoadGroup { group_id }] if group_id == "g1"));

    apply_delta_at(
        &mut state,
        Delta::SetMatches {
            group_id: "g1".to_string(),
            matches: matches(),
            odds: Vec::new(),
        },
        now(),
        t0,
    );
    let queued = state.drain_commands();
    assert!(matches!(queued.as_slice(), [ProviderCommand::RefreshLive { .. }]));
    assert_eq!(state.scheduler.phase(), SchedulerPhase::Active);
    assert_eq!(state.view.rounds.len(), 2);
    assert_eq!(state.view.rounds[0].label, "Round 3");
}

#[test]
fn finished_refresh_queues_settlement_and_keeps_round() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    state.drain_commands();
    let generation = state.scheduler.generation();

    let mut done = live("m1");
    done.status = MatchStatus::Finished;
    done.result = Some(MatchResult::new(2, 1));
    apply_delta_at(
        &mut state,
        Delta::LiveRefreshed {
            group_id: "g1".to_string(),
            generation,
            matches: vec![done, live("not-ours")],
        },
        now(),
        t0,
    );

    let fixture = state.find_match("m1").unwrap();
    assert_eq!(fixture.status, MatchStatus::Finished);
    assert_eq!(fixture.round.as_deref(), Some("Round 3"));
    assert!(state.find_match("not-ours").is_none());
    assert_eq!(state.matches.len(), 3);
    assert_eq!(state.scheduler.phase(), SchedulerPhase::Idle);

    let queued = state.drain_commands();
    assert!(matches!(
        queued.as_slice(),
        [ProviderCommand::SettleMatch { match_id, .. }] if match_id == "m1"
    ));
    assert!(state.logs.iter().any(|l| l.contains("finished")));
}

#[test]
fn deltas_for_other_groups_are_ignored() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    apply_delta_at(
        &mut state,
        Delta::SetMatches {
            group_id: "g2".to_string(),
            matches: Vec::new(),
            odds: vec![(
                "m2".to_string(),
                OddsEntry {
                    home_win: 9.0,
                    draw: 9.0,
                    away_win: 9.0,
                },
            )],
        },
        now(),
        t0,
    );
    assert_eq!(state.matches.len(), 3);
    assert_eq!(state.payout_preview("m2", Outcome::Home, Some(10)), Some(10));
    apply_delta_at(
        &mut state,
        Delta::SetBalances {
            group_id: "g2".to_string(),
            balances: Vec::new(),
        },
        now(),
        t0,
    );
    assert_eq!(state.balances.len(), 2);
}

#[test]
fn refresh_after_unmount_is_a_no_op() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    let generation = state.scheduler.generation();
    state.unmount();
    assert!(state.drain_commands().is_empty());

    let mut done = live("m1");
    done.status = MatchStatus::Finished;
    apply_delta_at(
        &mut state,
        Delta::LiveRefreshed {
            group_id: "g1".to_string(),
            generation,
            matches: vec![done],
        },
        now(),
        t0,
    );
    assert_eq!(state.find_match("m1").unwrap().status, MatchStatus::Live);
    assert!(state.drain_commands().is_empty());
}

#[test]
fn failed_refresh_logs_a_warning() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    let generation = state.scheduler.generation();
    apply_delta_at(
        &mut state,
        Delta::LiveRefreshFailed {
            group_id: "g1".to_string(),
            generation,
            error: "timeout".to_string(),
        },
        now(),
        t0,
    );
    assert!(state.logs.back().unwrap().starts_with("[WARN]"));
    assert!(!state.scheduler.is_refreshing());
}

#[test]
fn settlement_updates_wagers_balances_and_leaderboard() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    let wager = Wager {
        id: Wager::key("m1", "g1", "ana"),
        match_id: "m1".to_string(),
        group_id: "g1".to_string(),
        member_id: "ana".to_string(),
        prediction: Outcome::Home,
        stake: Some(50),
        state: SettlementState::Pending,
        points: None,
        placed_at: now() - Duration::days(1),
    };
    apply_delta_at(
        &mut state,
        Delta::SetWagers {
            group_id: "g1".to_string(),
            wagers: vec![wager.clone()],
        },
        now(),
        t0,
    );
    apply_delta_at(
        &mut state,
        Delta::MatchSettled {
            group_id: "g1".to_string(),
            match_id: "m1".to_string(),
            records: vec![SettlementRecord {
                wager_id: wager.id.clone(),
                member_id: "ana".to_string(),
                state: SettlementState::Settled,
                points_delta: 100,
                new_balance: 200,
            }],
        },
        now(),
        t0,
    );

    assert_eq!(state.wagers[0].state, SettlementState::Settled);
    assert_eq!(state.wagers[0].points, Some(100));
    assert_eq!(state.leaderboard[0].member_id, "ana");
    assert_eq!(state.leaderboard[0].credits, 200);
    assert_eq!(state.member_status("ana"), Some(MemberStatus::Active));
    assert_eq!(state.member_status("nobody"), None);
}

#[test]
fn payout_preview_follows_group_mode_and_odds() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    assert_eq!(state.payout_preview("m2", Outcome::Home, Some(50)), Some(50));

    let mut fresh = state.find_match("m2").unwrap().clone();
    fresh.round = None;
    apply_delta_at(
        &mut state,
        Delta::MatchRefreshed {
            group_id: Some("g1".to_string()),
            fixture: fresh,
            odds: Some(OddsEntry {
                home_win: 1.25,
                draw: 3.3,
                away_win: 4.1,
            }),
        },
        now(),
        t0,
    );
    assert_eq!(state.find_match("m2").unwrap().round.as_deref(), Some("Round 3"));
    assert_eq!(state.payout_preview("m2", Outcome::Home, Some(50)), Some(63));
    assert_eq!(state.payout_preview("m2", Outcome::Away, Some(10)), Some(41));
    assert_eq!(state.payout_preview("missing", Outcome::Home, Some(10)), None);

    let mut classic = group();
    classic.mode = GroupMode::Classic;
    apply_delta_at(&mut state, Delta::SetGroup(classic), now(), t0);
    assert_eq!(state.payout_preview("m2", Outcome::Home, Some(50)), Some(1));
}

#[test]
fn filters_and_paging_regroup_the_view() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    state.set_filter(
        MatchFilter {
            team: Some("kingsport".to_string()),
            ..MatchFilter::default()
        },
        now(),
    );
    assert!(!state.view.paginated);
    assert_eq!(state.view.rounds.len(), 1);
    assert_eq!(state.view.rounds[0].matches[0].id, "m2");

    state.set_filter(MatchFilter::default(), now());
    let past = state.pager.past;
    state.load_more_past(now());
    assert_eq!(state.pager.past, past + state.pager.step);
    assert!(state.view.paginated);
}

#[test]
fn log_ring_is_bounded() {
    let mut state = PoolState::new("g1", &PoolConfig::default());
    for i in 0..250 {
        state.push_log(format!("[INFO] line {i}"));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().unwrap(), "[INFO] line 50");
}

/// Drives commands through the worker synchronously and feeds every delta back.
fn pump(state: &mut PoolState, backend: &mut MemoryBackend, at: Instant) {
    let (tx, rx) = mpsc::channel();
    loop {
        let commands = state.drain_commands();
        if commands.is_empty() {
            break;
        }
        for cmd in commands {
            let mut provider = backend.clone();
            handle_command(&mut provider, &mut *backend, cmd, &tx);
        }
        while let Ok(delta) = rx.try_recv() {
            apply_delta_at(state, delta, now(), at);
        }
    }
}

#[test]
fn place_then_settle_round_trip_through_worker() {
    let t0 = Instant::now();
    let mut backend = MemoryBackend::default();
    backend.add_group(group(), &["ana", "ben"]);
    backend.set_matches("g1", matches());
    backend.odds.insert(
        "m2",
        "g1",
        OddsEntry {
            home_win: 3.0,
            draw: 2.0,
            away_win: 2.5,
        },
    );

    let mut state = PoolState::new("g1", &PoolConfig::default());
    state.mount(now(), t0);
    pump(&mut state, &mut backend, t0);
    assert_eq!(state.balances.len(), 2);
    assert_eq!(state.matches.len(), 3);

    // Placement is validated against the wall clock.
    let mut upcoming = backend.matches["g1"][1].clone();
    upcoming.kickoff = Utc::now() + Duration::days(1);
    backend.update_match("g1", upcoming);
    state.place_wager(WagerDraft {
        match_id: "m2".to_string(),
        group_id: "g1".to_string(),
        member_id: "ana".to_string(),
        prediction: Outcome::Home,
        stake: Some(50),
    });
    pump(&mut state, &mut backend, t0);
    assert_eq!(state.wagers.len(), 1);

    // The match is played and finishes; a targeted refresh picks it up.
    let mut played = backend.matches["g1"][1].clone();
    played.status = MatchStatus::Finished;
    played.result = Some(MatchResult::new(1, 0));
    backend.update_match("g1", played);
    state.request_match("m2");
    pump(&mut state, &mut backend, t0);

    assert_eq!(state.find_match("m2").unwrap().status, MatchStatus::Finished);
    assert_eq!(state.wagers[0].state, SettlementState::Settled);
    let ana = state.balances.iter().find(|b| b.member_id == "ana").unwrap();
    assert_eq!(ana.current, 200);
    assert_eq!(state.leaderboard[0].member_id, "ana");
}

#[test]
fn loaded_group_previews_with_provider_odds() {
    let t0 = Instant::now();
    let wall = Utc::now();
    let mut feed = SimulatedFeed::new("g1", 4, 7, wall);
    let mut store = seed_store(&feed, "g1", wall).expect("seed");

    let mut state = PoolState::new("g1", &PoolConfig::default());
    state.mount(wall, t0);
    let (tx, rx) = mpsc::channel();
    for cmd in state.drain_commands() {
        assert!(handle_command(&mut feed, &mut store, cmd, &tx));
    }
    while let Ok(delta) = rx.try_recv() {
        apply_delta_at(&mut state, delta, wall, t0);
    }
    assert_eq!(state.mode(), GroupMode::Relative);

    let open = state
        .matches
        .iter()
        .find(|m| m.is_open_for_wagers(wall))
        .expect("an upcoming match")
        .id
        .clone();
    let quoted = feed.get_odds(&open, "g1").unwrap().expect("quoted odds");
    assert_eq!(
        state.payout_preview(&open, Outcome::Away, Some(100)),
        Some(potential_payout(100, Outcome::Away, Some(&quoted)))
    );
    assert_ne!(quoted, OddsEntry::EVEN);
}

#[test]
fn kickoff_after_mount_starts_polling_on_tick() {
    let t0 = Instant::now();
    let mut state = PoolState::new("g1", &PoolConfig::default());
    state.mount(now(), t0);
    apply_delta_at(
        &mut state,
        Delta::SetMatches {
            group_id: "g1".to_string(),
            matches: vec![Match::scheduled("m5", "Home", "Away", now() + Duration::minutes(5))],
            odds: Vec::new(),
        },
        now(),
        t0,
    );
    state.drain_commands();
    assert_eq!(state.scheduler.phase(), SchedulerPhase::Idle);

    state.tick(now() + Duration::minutes(2), t0 + std::time::Duration::from_secs(120));
    assert!(state.drain_commands().is_empty());

    state.tick(now() + Duration::minutes(6), t0 + std::time::Duration::from_secs(360));
    let queued = state.drain_commands();
    assert!(matches!(
        queued.as_slice(),
        [ProviderCommand::RefreshLive { group_id, .. }] if group_id == "g1"
    ));
    assert_eq!(state.scheduler.phase(), SchedulerPhase::Active);
}

#[test]
fn refresh_issued_before_remount_is_ignored() {
    let t0 = Instant::now();
    let mut state = loaded_state(t0);
    let stale = state.scheduler.generation();
    state.unmount();
    state.mount(now(), t0);
    state.drain_commands();

    let mut done = live("m1");
    done.status = MatchStatus::Finished;
    apply_delta_at(
        &mut state,
        Delta::LiveRefreshed {
            group_id: "g1".to_string(),
            generation: stale,
            matches: vec![done],
        },
        now(),
        t0,
    );
    assert_eq!(state.find_match("m1").unwrap().status, MatchStatus::Live);
    assert!(state.drain_commands().is_empty());
    assert!(state.scheduler.is_refreshing());
}
