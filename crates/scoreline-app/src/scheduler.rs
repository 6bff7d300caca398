// Periodic job loop for `scoreline run`.
//
// Every tick evaluates pending matches and runs the real-time ranking pass.
// The first tick inside each new UTC hour also runs the scheduled pass, which
// decides per competition whether it is due. A failing job is logged and does
// not stop the jobs after it. Jobs run one at a time on the
// blocking pool, so no two passes ever touch the same match or competition
// concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tracing::{error, info};

use scoreline_core::config::Config;
use scoreline_core::db::Database;
use scoreline_core::jobs::{self, JobReport};

/// The hour a scheduled pass last ran in, so it runs once per hour.
#[derive(Debug, Default)]
pub struct LoopState {
    last_scheduled: Option<(NaiveDate, u32)>,
}

/// What one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub evaluated: usize,
    pub realtime: usize,
    /// `None` when the scheduled pass was not due this tick.
    pub scheduled: Option<usize>,
}

/// Run the job loop until `shutdown` resolves.
pub async fn run<F>(db: Arc<Database>, config: Arc<Config>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    info!(
        "Scheduler started, ticking every {}s",
        config.schedule.tick_seconds
    );
    let mut interval = tokio::time::interval(Duration::from_secs(config.schedule.tick_seconds));
    let mut state = LoopState::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = tick(&db, &config, Utc::now(), &mut state).await;
                info!(
                    "Tick: {} predictions evaluated, {} matches ranked, scheduled pass {:?}",
                    report.evaluated, report.realtime, report.scheduled
                );
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                break;
            }
        }
    }

    Ok(())
}

/// Run one round of jobs at `now`. A failed job counts as zero; a failed
/// scheduled pass is retried on the next tick.
pub async fn tick(
    db: &Arc<Database>,
    config: &Arc<Config>,
    now: DateTime<Utc>,
    state: &mut LoopState,
) -> TickReport {
    let mut report = TickReport::default();

    let evaluated = run_job(db, config, move |db, config| {
        jobs::evaluate_matches(db, config, None, false)
    })
    .await;
    if let Some(done) = logged("Evaluation", evaluated) {
        report.evaluated = done.processed_count;
    }

    let realtime = run_job(db, config, move |db, config| {
        jobs::realtime_rankings(db, config, None, now)
    })
    .await;
    if let Some(done) = logged("Real-time ranking", realtime) {
        report.realtime = done.processed_count;
    }

    let hour = (now.date_naive(), now.hour());
    if state.last_scheduled != Some(hour) {
        let scheduled = run_job(db, config, move |db, config| {
            jobs::recalculate_rankings(db, config, None, false, now)
        })
        .await;
        if let Some(done) = logged("Scheduled ranking", scheduled) {
            state.last_scheduled = Some(hour);
            report.scheduled = Some(done.processed_count);
        }
    }

    report
}

fn logged(job: &str, outcome: anyhow::Result<JobReport>) -> Option<JobReport> {
    match outcome {
        Ok(report) => Some(report),
        Err(e) => {
            error!("{} job failed: {:#}", job, e);
            None
        }
    }
}

async fn run_job<J>(db: &Arc<Database>, config: &Arc<Config>, job: J) -> anyhow::Result<JobReport>
where
    J: FnOnce(&Database, &Config) -> scoreline_core::error::Result<JobReport> + Send + 'static,
{
    let db = Arc::clone(db);
    let config = Arc::clone(config);
    let report = tokio::task::spawn_blocking(move || job(&db, &config))
        .await
        .context("job task panicked")??;
    Ok(report)
}
