use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;

use kickoff_pool::backend_fetch::HttpMatchProvider;
use kickoff_pool::config::PoolConfig;
use kickoff_pool::fake_feed::{self, SimulatedFeed};
use kickoff_pool::feed::spawn_provider;
use kickoff_pool::persist;
use kickoff_pool::provider::MemoryBackend;
use kickoff_pool::state::{Delta, Group, GroupMode, PoolState, ProviderCommand, apply_delta};

const SIM_ROUNDS: u32 = 6;
const SIM_SEED: u64 = 2026;

struct App {
    state: PoolState,
    cfg: PoolConfig,
    cmd_tx: mpsc::Sender<ProviderCommand>,
    last_view: String,
}

impl App {
    fn new(cfg: PoolConfig, cmd_tx: mpsc::Sender<ProviderCommand>) -> Self {
        let mut state = PoolState::new(&cfg.group_id, &cfg);
        if cfg.persist {
            persist::load_into_state(&mut state);
        }
        Self {
            state,
            cfg,
            cmd_tx,
            last_view: String::new(),
        }
    }

    fn flush_commands(&mut self) {
        for cmd in self.state.drain_commands() {
            if self.cmd_tx.send(cmd).is_err() {
                self.state.push_log("[ERROR] Provider worker is gone");
            }
        }
    }

    fn print_updates(&mut self) {
        for line in self.state.logs.drain(..) {
            println!("{line}");
        }

        let view = render_view(&self.state);
        if view != self.last_view {
            println!("{view}");
            self.last_view = view;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let cfg = PoolConfig::from_env();

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let now = Utc::now();
    let worker = match cfg.backend_url.as_deref() {
        Some(url) => {
            let mut store = MemoryBackend::default();
            store.add_group(
                Group {
                    id: cfg.group_id.clone(),
                    name: cfg.group_id.clone(),
                    mode: GroupMode::Relative,
                    starting_credits: 100,
                    goal_credits: None,
                },
                &[],
            );
            spawn_provider(HttpMatchProvider::new(url), store, tx, cmd_rx)
        }
        None => {
            let feed = SimulatedFeed::new(&cfg.group_id, SIM_ROUNDS, SIM_SEED, now);
            let store = fake_feed::seed_store(&feed, &cfg.group_id, now)?;
            spawn_provider(feed, store, tx, cmd_rx)
        }
    };

    let mut app = App::new(cfg, cmd_tx);
    app.state.regroup(now);
    app.state.mount(now, Instant::now());
    run_app(&mut app, rx);

    app.state.unmount();
    if app.cfg.persist
        && let Err(err) = persist::save_from_state(&app.state)
    {
        eprintln!("error: {err:#}");
    }
    drop(app);
    let _ = worker.join();
    Ok(())
}

fn run_app(app: &mut App, rx: mpsc::Receiver<Delta>) {
    let tick_rate = Duration::from_millis(250);
    let started = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        app.state.tick(Utc::now(), Instant::now());
        app.flush_commands();
        app.print_updates();

        if app.cfg.run_for.is_some_and(|limit| started.elapsed() >= limit) {
            return;
        }
        thread::sleep(tick_rate);
    }
}

fn render_view(state: &PoolState) -> String {
    let mut out = String::new();
    let group = state
        .group
        .as_ref()
        .map(|g| g.name.as_str())
        .unwrap_or(state.group_id.as_str());
    out.push_str(&format!(
        "---- {group} | polling: {:?} | live: {} ----\n",
        state.scheduler.phase(),
        state.scheduler.live_ids().len()
    ));
    if state.view.has_more_future_rounds {
        out.push_str("   ... more upcoming rounds\n");
    }
    for (idx, round) in state.view.rounds.iter().enumerate() {
        let marker = if state.view.current == Some(idx) { ">" } else { " " };
        out.push_str(&format!(
            "{marker} {} ({} - {})\n",
            round.label,
            round.min_date.format("%d %b"),
            round.max_date.format("%d %b")
        ));
        for m in &round.matches {
            let score = m.score_line().unwrap_or_else(|| "v".to_string());
            let clock = m
                .elapsed
                .map(|e| e.display())
                .unwrap_or_else(|| m.kickoff.format("%a %H:%M").to_string());
            out.push_str(&format!(
                "    {:<4} {:^5} {:<4} {:<10} {}\n",
                m.home.display(),
                score,
                m.away.display(),
                m.status.label(),
                clock
            ));
        }
    }
    if state.view.has_more_past_rounds {
        out.push_str("   ... more past rounds\n");
    }
    for row in &state.leaderboard {
        out.push_str(&format!(
            "  #{:<2} {:<8} {:>5} ({:+}) {}\n",
            row.rank,
            row.name,
            row.credits,
            row.net,
            row.status.label()
        ));
    }
    out
}
