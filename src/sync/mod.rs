//! One end-to-end sync pass: resolve every enabled source, parse what loads,
//! merge, build the trailing window and publish it for the widget. A pass
//! tolerates individual sources failing but publishes all-or-nothing, so the
//! store only ever holds a series from a fully completed pass.

pub mod accessor;
pub mod intensity;
pub mod merge;
pub mod payload;
pub mod store;
pub mod window;

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::{StreamExt, stream};
use thiserror::Error;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::{ConfigStore, DataSource},
    utils::clock::Clock,
};

use self::{
    accessor::{AccessError, SourceAccessor},
    merge::merge_sources,
    payload::{MalformedPayload, RawDailyUsage, parse_payload},
    store::{UsageSeries, UsageStore},
    window::build_window,
};

/// Pass-level failures. Nothing is published when a pass fails; whatever a
/// previous successful pass wrote stays visible to readers.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no enabled sources are configured")]
    NoEnabledSources,
    #[error("all {0} enabled sources failed to load")]
    AllSourcesFailed(usize),
    #[error("failed to publish usage series")]
    PublishFailed(#[source] anyhow::Error),
    #[error("failed to load configuration")]
    Config(#[source] anyhow::Error),
}

/// Per-source failures. These are recovered locally: the source is logged and
/// excluded from the merge, the pass carries on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Malformed(#[from] MalformedPayload),
}

#[derive(Debug)]
pub struct SyncReport {
    pub sources_loaded: usize,
    pub sources_skipped: usize,
    pub days_published: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was already in flight; this trigger was dropped. The next
    /// timer tick or user trigger gets a fresh attempt.
    Coalesced,
}

pub struct SyncEngine<C, A, S> {
    config: C,
    accessor: A,
    store: S,
    clock: Box<dyn Clock>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<C: ConfigStore, A: SourceAccessor, S: UsageStore> SyncEngine<C, A, S> {
    pub fn new(config: C, accessor: A, store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            accessor,
            store,
            clock,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs a pass against the local calendar day.
    pub async fn sync_now(&self) -> Result<SyncOutcome, SyncError> {
        let today = self.clock.time().with_timezone(&Local).date_naive();
        self.sync_as_of(today).await
    }

    /// Runs a pass against an explicit reference day. Two passes never
    /// interleave: a trigger that arrives while one is running is dropped so
    /// concurrent passes can't race on the store.
    pub async fn sync_as_of(&self, today: NaiveDate) -> Result<SyncOutcome, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Sync already in flight, dropping trigger");
            return Ok(SyncOutcome::Coalesced);
        };
        self.run_pass(today).await.map(SyncOutcome::Completed)
    }

    #[instrument(skip(self))]
    async fn run_pass(&self, today: NaiveDate) -> Result<SyncReport, SyncError> {
        let config = self.config.load().map_err(SyncError::Config)?;

        let enabled = config.enabled_sources().cloned().collect::<Vec<_>>();
        if enabled.is_empty() {
            return Err(SyncError::NoEnabledSources);
        }

        info!("Loading {} enabled sources", enabled.len());
        let loaded = self.load_sources(&enabled).await;
        let skipped = enabled.len() - loaded.len();
        if loaded.is_empty() {
            return Err(SyncError::AllSourcesFailed(enabled.len()));
        }

        debug!("Merging {} loaded sources", loaded.len());
        let sources_loaded = loaded.len();
        let unified = merge_sources(loaded);

        let thresholds = config.threshold_table();
        let days = build_window(&unified, config.window_length, &thresholds, today);

        let series = UsageSeries {
            days,
            last_updated: self.clock.time(),
        };
        self.store
            .publish(&series)
            .await
            .map_err(SyncError::PublishFailed)?;
        info!(
            "Published {} days ending {today}, {} of {} sources contributed",
            series.days.len(),
            sources_loaded,
            enabled.len()
        );

        Ok(SyncReport {
            sources_loaded,
            sources_skipped: skipped,
            days_published: series.days.len(),
            last_updated: series.last_updated,
        })
    }

    async fn load_sources(&self, sources: &[DataSource]) -> Vec<RawDailyUsage> {
        let loads = stream::iter(sources)
            .map(|source| async move { (source, self.load_source(source).await) })
            .buffered(4)
            .collect::<Vec<_>>()
            .await;

        loads
            .into_iter()
            .filter_map(|(source, result)| match result {
                Ok(usage) => {
                    debug!("Loaded {} days from source '{}'", usage.len(), source.name);
                    Some(usage)
                }
                Err(e) => {
                    warn!("Skipping source '{}': {e}", source.name);
                    None
                }
            })
            .collect()
    }

    async fn load_source(&self, source: &DataSource) -> Result<RawDailyUsage, SourceError> {
        let bytes = self.accessor.resolve(&source.path).await?;
        let payload = parse_payload(&bytes)?;
        Ok(payload.daily_data)
    }
}

/// Periodic sync loop for the `watch` command. Each tick is a full pass;
/// failed passes are logged and retried on the next tick.
pub async fn run_watch<C: ConfigStore, A: SourceAccessor, S: UsageStore>(
    engine: &SyncEngine<C, A, S>,
    interval: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut next_pass = engine.clock.instant();
    loop {
        next_pass += interval;

        match engine.sync_now().await {
            Ok(SyncOutcome::Completed(report)) => {
                info!(
                    "Sync pass finished, {} days published from {} sources",
                    report.days_published, report.sources_loaded
                )
            }
            Ok(SyncOutcome::Coalesced) => debug!("Previous pass still running, skipped a tick"),
            Err(e) => error!("Sync pass failed {e:?}"),
        }

        select! {
            _ = shutdown.cancelled() => {
                return Ok(())
            }
            _ = engine.clock.sleep_until(next_pass) => ()
        }
    }
}

pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
    };
}

#[cfg(test)]
mod sync_tests {
    use std::path::PathBuf;

    use anyhow::{Result, anyhow};
    use chrono::NaiveDate;

    use crate::{
        config::{AppConfig, DataSource, MockConfigStore},
        sync::accessor::AccessError,
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    use super::{
        SyncEngine, SyncError, SyncOutcome, accessor::MockSourceAccessor, store::MockUsageStore,
    };

    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payload(entries: &[(&str, u64)]) -> Vec<u8> {
        let days: serde_json::Value = entries
            .iter()
            .map(|(date, seconds)| {
                (
                    (*date).to_string(),
                    serde_json::json!({ "totalTime": seconds }),
                )
            })
            .collect::<serde_json::Map<_, _>>()
            .into();
        serde_json::to_vec(&serde_json::json!({ "dailyData": days })).unwrap()
    }

    fn config_store(sources: Vec<DataSource>) -> MockConfigStore {
        let mut config = MockConfigStore::new();
        config.expect_load().returning(move || {
            Ok(AppConfig {
                sources: sources.clone(),
                first_launch: false,
                ..Default::default()
            })
        });
        config
    }

    fn engine(
        config: MockConfigStore,
        accessor: MockSourceAccessor,
        store: MockUsageStore,
    ) -> SyncEngine<MockConfigStore, MockSourceAccessor, MockUsageStore> {
        SyncEngine::new(config, accessor, store, Box::new(DefaultClock))
    }

    #[tokio::test]
    async fn failing_source_is_skipped_not_fatal() -> Result<()> {
        *TEST_LOGGING;
        let good = DataSource::new("good".into(), PathBuf::from("/srv/good.json"));
        let bad = DataSource::new("bad".into(), PathBuf::from("/srv/bad.json"));

        let mut accessor = MockSourceAccessor::new();
        accessor.expect_resolve().returning(|path| {
            if path.ends_with("good.json") {
                Ok(payload(&[("2025-01-01", 1800)]))
            } else {
                Err(AccessError::NotFound)
            }
        });

        let mut store = MockUsageStore::new();
        store
            .expect_publish()
            .withf(|series| {
                series.days.len() == 30
                    && series
                        .days
                        .iter()
                        .any(|d| d.date == date(2025, 1, 1) && d.seconds == 1800)
            })
            .times(1)
            .returning(|_| Ok(()));

        let engine = engine(config_store(vec![good, bad]), accessor, store);

        let SyncOutcome::Completed(report) = engine.sync_as_of(TODAY).await? else {
            panic!("pass should complete");
        };
        assert_eq!(report.sources_loaded, 1);
        assert_eq!(report.sources_skipped, 1);
        assert_eq!(report.days_published, 30);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_source_is_skipped_not_fatal() -> Result<()> {
        let good = DataSource::new("good".into(), PathBuf::from("/srv/good.json"));
        let garbled = DataSource::new("garbled".into(), PathBuf::from("/srv/garbled.json"));

        let mut accessor = MockSourceAccessor::new();
        accessor.expect_resolve().returning(|path| {
            if path.ends_with("good.json") {
                Ok(payload(&[("2025-01-05", 600)]))
            } else {
                Ok(b"{ half a docum".to_vec())
            }
        });

        let mut store = MockUsageStore::new();
        store.expect_publish().times(1).returning(|_| Ok(()));

        let engine = engine(config_store(vec![good, garbled]), accessor, store);

        let SyncOutcome::Completed(report) = engine.sync_as_of(TODAY).await? else {
            panic!("pass should complete");
        };
        assert_eq!(report.sources_loaded, 1);
        assert_eq!(report.sources_skipped, 1);
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_sources_are_summed() -> Result<()> {
        let a = DataSource::new("a".into(), PathBuf::from("/srv/a.json"));
        let b = DataSource::new("b".into(), PathBuf::from("/srv/b.json"));

        let mut accessor = MockSourceAccessor::new();
        accessor.expect_resolve().returning(|path| {
            if path.ends_with("a.json") {
                Ok(payload(&[("2025-01-01", 1800)]))
            } else {
                Ok(payload(&[("2025-01-01", 5400), ("2025-01-02", 0)]))
            }
        });

        let mut store = MockUsageStore::new();
        store
            .expect_publish()
            .withf(|series| {
                let on = |d: NaiveDate| {
                    series
                        .days
                        .iter()
                        .find(|day| day.date == d)
                        .map(|day| day.seconds)
                };
                on(date(2025, 1, 1)) == Some(7200) && on(date(2025, 1, 2)) == Some(0)
            })
            .times(1)
            .returning(|_| Ok(()));

        let engine = engine(config_store(vec![a, b]), accessor, store);
        engine.sync_as_of(TODAY).await?;
        Ok(())
    }

    #[tokio::test]
    async fn zero_enabled_sources_aborts_without_publishing() -> Result<()> {
        let mut disabled = DataSource::new("off".into(), PathBuf::from("/srv/off.json"));
        disabled.enabled = false;

        let accessor = MockSourceAccessor::new();
        let mut store = MockUsageStore::new();
        store.expect_publish().times(0);

        let engine = engine(config_store(vec![disabled]), accessor, store);

        let result = engine.sync_as_of(TODAY).await;
        assert!(matches!(result, Err(SyncError::NoEnabledSources)));
        Ok(())
    }

    #[tokio::test]
    async fn every_source_failing_aborts_the_pass() -> Result<()> {
        let a = DataSource::new("a".into(), PathBuf::from("/srv/a.json"));
        let b = DataSource::new("b".into(), PathBuf::from("/srv/b.json"));

        let mut accessor = MockSourceAccessor::new();
        accessor
            .expect_resolve()
            .returning(|_| Err(AccessError::AccessDenied));

        let mut store = MockUsageStore::new();
        store.expect_publish().times(0);

        let engine = engine(config_store(vec![a, b]), accessor, store);

        let result = engine.sync_as_of(TODAY).await;
        assert!(matches!(result, Err(SyncError::AllSourcesFailed(2))));
        Ok(())
    }

    #[tokio::test]
    async fn publish_failure_fails_the_whole_pass() -> Result<()> {
        let source = DataSource::new("a".into(), PathBuf::from("/srv/a.json"));

        let mut accessor = MockSourceAccessor::new();
        accessor
            .expect_resolve()
            .returning(|_| Ok(payload(&[("2025-01-01", 60)])));

        let mut store = MockUsageStore::new();
        store
            .expect_publish()
            .times(1)
            .returning(|_| Err(anyhow!("disk full")));

        let engine = engine(config_store(vec![source]), accessor, store);

        let result = engine.sync_as_of(TODAY).await;
        assert!(matches!(result, Err(SyncError::PublishFailed(_))));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_trigger_is_dropped() -> Result<()> {
        let mut config = MockConfigStore::new();
        config.expect_load().times(0);

        let engine = engine(config, MockSourceAccessor::new(), MockUsageStore::new());

        let _running = engine.in_flight.lock().await;
        let outcome = engine.sync_as_of(TODAY).await?;
        assert!(matches!(outcome, SyncOutcome::Coalesced));
        Ok(())
    }
}
