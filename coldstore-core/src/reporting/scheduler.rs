//! Timed report generation
//!
//! Each named schedule fires on its own interval. Reports go to an in-memory
//! ring of recent reports or to JSON files under the reporter's report
//! directory.

use super::{ReportDestination, ReportFormat, ReportSchedule, Reporter};
use crate::metrics::CompressionReport;
use crate::types::to_chrono;
use crate::{ColdStoreError, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct ScheduleState {
    schedule: ReportSchedule,
    last_run: Option<DateTime<Utc>>,
    next_run: DateTime<Utc>,
    runs: u64,
}

impl ScheduleState {
    fn new(schedule: ReportSchedule, now: DateTime<Utc>) -> Self {
        let next_run = advance(now, &schedule);
        Self {
            schedule,
            last_run: None,
            next_run,
            runs: 0,
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.enabled && now >= self.next_run
    }
}

fn advance(from: DateTime<Utc>, schedule: &ReportSchedule) -> DateTime<Utc> {
    from.checked_add_signed(to_chrono(schedule.interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Public view of a schedule and its run history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStatus {
    #[serde(flatten)]
    pub schedule: ReportSchedule,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub runs: u64,
}

/// A report produced by a schedule
#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub id: Uuid,
    pub schedule: String,
    pub generated_at: DateTime<Utc>,
    /// Set for file destinations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub report: CompressionReport,
}

/// Runs named reports on fixed intervals
///
/// Due schedules are checked every `check_interval` by the task returned from
/// [`ReportScheduler::start`]; the task exits when its token is cancelled.
#[derive(Debug)]
pub struct ReportScheduler {
    reporter: Arc<Reporter>,
    report_dir: PathBuf,
    schedules: RwLock<BTreeMap<String, ScheduleState>>,
    recent: Mutex<VecDeque<StoredReport>>,
}

impl ReportScheduler {
    /// Create a scheduler seeded with the reporter's configured schedules
    pub fn new(reporter: Arc<Reporter>) -> Result<Self> {
        let scheduler = Self {
            report_dir: reporter.config().report_dir.clone(),
            reporter,
            schedules: RwLock::new(BTreeMap::new()),
            recent: Mutex::new(VecDeque::new()),
        };

        for schedule in scheduler.reporter.config().schedules.clone() {
            scheduler.add_schedule(schedule)?;
        }

        Ok(scheduler)
    }

    /// Add or replace a schedule; its first run is one interval from now
    pub fn add_schedule(&self, schedule: ReportSchedule) -> Result<()> {
        schedule.validate()?;
        let name = schedule.name.clone();
        self.schedules
            .write()
            .insert(name.clone(), ScheduleState::new(schedule, Utc::now()));
        debug!(schedule = %name, "Report schedule added");
        Ok(())
    }

    pub fn remove_schedule(&self, name: &str) -> bool {
        self.schedules.write().remove(name).is_some()
    }

    pub fn schedules(&self) -> Vec<ScheduleStatus> {
        self.schedules
            .read()
            .values()
            .map(|state| ScheduleStatus {
                schedule: state.schedule.clone(),
                last_run: state.last_run,
                next_run: state.next_run,
                runs: state.runs,
            })
            .collect()
    }

    /// Reports kept by memory-destination schedules, oldest first
    pub fn recent_reports(&self) -> Vec<StoredReport> {
        self.recent.lock().iter().cloned().collect()
    }

    /// Run every enabled schedule due at `now`
    ///
    /// A schedule whose output fails to write is still advanced to its next
    /// interval.
    pub async fn run_due_at(&self, now: DateTime<Utc>) -> Vec<StoredReport> {
        let due: Vec<ReportSchedule> = self
            .schedules
            .read()
            .values()
            .filter(|state| state.is_due(now))
            .map(|state| state.schedule.clone())
            .collect();

        let mut produced = Vec::with_capacity(due.len());
        for schedule in due {
            match self.execute(&schedule, now).await {
                Ok(stored) => produced.push(stored),
                Err(e) => warn!(schedule = %schedule.name, error = %e, "Scheduled report failed"),
            }
            self.mark_run(&schedule.name, now);
        }

        produced
    }

    pub async fn run_due(&self) -> Vec<StoredReport> {
        self.run_due_at(Utc::now()).await
    }

    /// Run a schedule immediately, regardless of its next run time
    pub async fn run_schedule(&self, name: &str) -> Result<StoredReport> {
        let schedule = self
            .schedules
            .read()
            .get(name)
            .map(|state| state.schedule.clone());
        let schedule = schedule.ok_or_else(|| {
            ColdStoreError::ConfigInvalid(format!("unknown report schedule: {}", name))
        })?;

        let now = Utc::now();
        let result = self.execute(&schedule, now).await;
        self.mark_run(name, now);
        result
    }

    /// Spawn the periodic check loop
    pub fn start(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let check_interval = self.reporter.config().check_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            info!(interval = ?check_interval, "Report scheduler started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let produced = self.run_due().await;
                        if !produced.is_empty() {
                            debug!(count = produced.len(), "Scheduled reports generated");
                        }
                    }
                }
            }
            info!("Report scheduler stopped");
        })
    }

    async fn execute(&self, schedule: &ReportSchedule, now: DateTime<Utc>) -> Result<StoredReport> {
        let report = self.reporter.report();

        let path = match schedule.destination {
            ReportDestination::File => Some(self.write_file(schedule, &report, now).await?),
            ReportDestination::Memory => None,
        };

        let stored = StoredReport {
            id: Uuid::new_v4(),
            schedule: schedule.name.clone(),
            generated_at: now,
            path,
            report,
        };

        if schedule.destination == ReportDestination::Memory {
            let mut recent = self.recent.lock();
            if recent.len() >= crate::config::RECENT_REPORTS {
                recent.pop_front();
            }
            recent.push_back(stored.clone());
        }

        debug!(schedule = %schedule.name, id = %stored.id, "Report generated");
        Ok(stored)
    }

    async fn write_file(
        &self,
        schedule: &ReportSchedule,
        report: &CompressionReport,
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let body = match schedule.format {
            ReportFormat::Json => serde_json::to_vec_pretty(report)?,
        };

        tokio::fs::create_dir_all(&self.report_dir).await?;
        let path = self
            .report_dir
            .join(format!("{}-{}.json", schedule.name, now.timestamp()));
        tokio::fs::write(&path, body).await?;

        info!(schedule = %schedule.name, path = %path.display(), "Report written");
        Ok(path)
    }

    fn mark_run(&self, name: &str, now: DateTime<Utc>) {
        if let Some(state) = self.schedules.write().get_mut(name) {
            state.last_run = Some(now);
            state.next_run = advance(now, &state.schedule);
            state.runs += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::CompressionMonitor;
    use crate::reporting::ReporterConfig;
    use std::time::Duration;

    fn scheduler(config: ReporterConfig) -> ReportScheduler {
        let monitor = Arc::new(CompressionMonitor::new());
        monitor.record_compression("lz4", 4096, 1024);
        let reporter = Arc::new(Reporter::new(monitor, config).unwrap());
        ReportScheduler::new(reporter).unwrap()
    }

    #[tokio::test]
    async fn test_default_schedules() {
        let before = Utc::now();
        let scheduler = scheduler(ReporterConfig::default());

        let schedules = scheduler.schedules();
        assert_eq!(schedules.len(), 2);
        assert!(schedules.iter().all(|s| s.runs == 0 && s.next_run > before));

        // Nothing is due yet
        assert!(scheduler.run_due().await.is_empty());
    }

    #[tokio::test]
    async fn test_due_memory_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(ReporterConfig {
            report_dir: dir.path().to_path_buf(),
            ..Default::default()
        });

        let later = Utc::now() + chrono::Duration::hours(2);
        let produced = scheduler.run_due_at(later).await;
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].schedule, "hourly_summary");
        assert!(produced[0].path.is_none());
        assert_eq!(produced[0].report.global_metrics.total_data_compressed, 4096);

        assert_eq!(scheduler.recent_reports().len(), 1);

        let hourly = scheduler
            .schedules()
            .into_iter()
            .find(|s| s.schedule.name == "hourly_summary")
            .unwrap();
        assert_eq!(hourly.runs, 1);
        assert_eq!(hourly.last_run, Some(later));
        assert_eq!(hourly.next_run, later + chrono::Duration::hours(1));

        // Already advanced past `later`
        assert!(scheduler.run_due_at(later).await.is_empty());
    }

    #[tokio::test]
    async fn test_file_destination() {
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join("nested");
        let scheduler = scheduler(ReporterConfig {
            report_dir: report_dir.clone(),
            ..Default::default()
        });

        let stored = scheduler.run_schedule("daily_detailed").await.unwrap();
        let path = stored.path.unwrap();
        assert!(path.starts_with(&report_dir));
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("daily_detailed-"));
        assert!(file_name.ends_with(".json"));

        let body = std::fs::read(&path).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["global_metrics"]["total_data_compressed"], 4096);

        // File reports are not kept in memory
        assert!(scheduler.recent_reports().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_management() {
        let scheduler = scheduler(ReporterConfig {
            schedules: Vec::new(),
            ..Default::default()
        });

        let err = scheduler
            .add_schedule(ReportSchedule::new("bad", Duration::ZERO, ReportDestination::Memory))
            .unwrap_err();
        assert!(matches!(err, ColdStoreError::ConfigInvalid(_)));
        assert!(scheduler
            .add_schedule(ReportSchedule::new("", Duration::from_secs(1), ReportDestination::Memory))
            .is_err());

        scheduler
            .add_schedule(ReportSchedule::new(
                "minutely",
                Duration::from_secs(60),
                ReportDestination::Memory,
            ))
            .unwrap();
        assert_eq!(scheduler.schedules().len(), 1);

        assert!(scheduler.run_schedule("missing").await.is_err());
        assert!(scheduler.remove_schedule("minutely"));
        assert!(!scheduler.remove_schedule("minutely"));
        assert!(scheduler.schedules().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_schedule_not_due() {
        let mut schedule = ReportSchedule::new("off", Duration::from_secs(1), ReportDestination::Memory);
        schedule.enabled = false;
        let scheduler = scheduler(ReporterConfig {
            schedules: vec![schedule],
            ..Default::default()
        });

        let later = Utc::now() + chrono::Duration::hours(1);
        assert!(scheduler.run_due_at(later).await.is_empty());
    }

    #[tokio::test]
    async fn test_recent_reports_bounded() {
        let scheduler = scheduler(ReporterConfig::default());
        for _ in 0..crate::config::RECENT_REPORTS + 5 {
            scheduler.run_schedule("hourly_summary").await.unwrap();
        }
        assert_eq!(scheduler.recent_reports().len(), crate::config::RECENT_REPORTS);
    }

    #[tokio::test]
    async fn test_background_loop_stops_on_cancel() {
        let scheduler = Arc::new(scheduler(ReporterConfig {
            check_interval: Duration::from_millis(10),
            schedules: vec![ReportSchedule::new(
                "fast",
                Duration::from_millis(1),
                ReportDestination::Memory,
            )],
            ..Default::default()
        }));

        let token = CancellationToken::new();
        let handle = Arc::clone(&scheduler).start(token.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(!scheduler.recent_reports().is_empty());
    }
}
