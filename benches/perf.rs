use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::{DateTime, Duration, TimeZone, Utc};

use kickoff_pool::backend_fetch::parse_matches_json;
use kickoff_pool::fake_feed::SimulatedFeed;
use kickoff_pool::merge::merge_refreshed;
use kickoff_pool::rounds::{MatchFilter, RoundPager, group_by_round, visible_rounds};
use kickoff_pool::settlement::settle;
use kickoff_pool::state::{
    GroupMode, Match, MatchResult, MatchStatus, OddsEntry, Outcome, SettlementState, Wager,
};

const SEASON_ROUNDS: u32 = 38;

fn bench_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 15, 0, 0).unwrap()
}

fn season() -> Vec<Match> {
    SimulatedFeed::new("bench", SEASON_ROUNDS, 11, bench_now())
        .matches("bench")
        .to_vec()
}

fn bench_group_by_round(c: &mut Criterion) {
    let matches = season();
    c.bench_function("group_by_round_season", |b| {
        b.iter(|| {
            let rounds = group_by_round(black_box(&matches));
            black_box(rounds.len());
        })
    });
}

fn bench_visible_rounds(c: &mut Criterion) {
    let matches = season();
    let pager = RoundPager::default();
    let filter = MatchFilter {
        team: Some("harbour".to_string()),
        ..MatchFilter::default()
    };
    c.bench_function("visible_rounds_paged", |b| {
        b.iter(|| {
            let view = visible_rounds(
                black_box(&matches),
                &MatchFilter::default(),
                &[],
                &pager,
                bench_now(),
            );
            black_box(view.rounds.len());
        })
    });
    c.bench_function("visible_rounds_filtered", |b| {
        b.iter(|| {
            let view = visible_rounds(black_box(&matches), &filter, &[], &pager, bench_now());
            black_box(view.rounds.len());
        })
    });
}

fn bench_merge_refresh(c: &mut Criterion) {
    let matches = season();
    let refreshed: Vec<Match> = matches
        .iter()
        .rev()
        .take(10)
        .cloned()
        .map(|mut m| {
            m.round = None;
            m.status = MatchStatus::Live;
            m.result = Some(MatchResult::new(1, 1));
            m
        })
        .collect();
    c.bench_function("merge_live_refresh", |b| {
        b.iter(|| {
            let mut local = matches.clone();
            let report = merge_refreshed(&mut local, black_box(refreshed.clone()));
            black_box(report.updated.len());
        })
    });
}

fn bench_settle(c: &mut Criterion) {
    let mut fixture = Match::scheduled("m1", "Home", "Away", bench_now() - Duration::hours(2));
    fixture.status = MatchStatus::Finished;
    fixture.result = Some(MatchResult::new(2, 1));
    let odds = OddsEntry {
        home_win: 2.35,
        draw: 3.1,
        away_win: 2.9,
    };
    let wagers: Vec<Wager> = (0..200)
        .map(|i| Wager {
            id: Wager::key("m1", "g1", &format!("member{i}")),
            match_id: "m1".to_string(),
            group_id: "g1".to_string(),
            member_id: format!("member{i}"),
            prediction: [Outcome::Home, Outcome::Draw, Outcome::Away][i % 3],
            stake: Some(5 + (i as i64 % 40)),
            state: SettlementState::Pending,
            points: None,
            placed_at: bench_now() - Duration::days(1),
        })
        .collect();
    c.bench_function("settle_200_wagers", |b| {
        b.iter(|| {
            let total: i64 = wagers
                .iter()
                .filter_map(|w| settle(w, &fixture, Some(&odds), GroupMode::Relative, 100).ok())
                .map(|s| s.points_delta)
                .sum();
            black_box(total);
        })
    });
}

fn bench_matches_parse(c: &mut Criterion) {
    c.bench_function("matches_json_parse", |b| {
        b.iter(|| {
            let matches = parse_matches_json(black_box(MATCHES_JSON)).unwrap();
            black_box(matches.len());
        })
    });
}

criterion_group!(
    perf,
    bench_group_by_round,
    bench_visible_rounds,
    bench_merge_refresh,
    bench_settle,
    bench_matches_parse
);
criterion_main!(perf);

const MATCHES_JSON: &str = r#"{"matches":[
{"id":1,"homeTeam":{"name":"Northbridge United","shortName":"NBU"},"awayTeam":{"name":"Harbour City","shortName":"HBC"},"kickoff":"2026-10-10T14:00:00Z","status":"FINISHED","score":{"home":2,"away":1},"round":"Round 7","odds":{"homeWin":1.9,"draw":3.4,"awayWin":4.2}},
{"id":2,"homeTeam":{"name":"Redmoor Athletic"},"awayTeam":{"name":"Eastvale Rovers"},"kickoff":"2026-10-16T14:00:00Z","status":"IN_PLAY","score":{"home":0,"away":0},"round":"Round 8","minute":61},
{"id":3,"homeTeam":{"name":"Kingsport FC"},"awayTeam":{"name":"Old Mill Town"},"kickoff":"2026-10-24T14:00:00Z","status":"TIMED","round":"Round 9"},
{"id":4,"homeTeam":{"name":"Ashford Wanderers"},"awayTeam":{"name":"Crestwood Albion"},"kickoff":"2026-10-24T16:00:00Z","status":"POSTPONED","round":"Round 9"}
]}"#;
