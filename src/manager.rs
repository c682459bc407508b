/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::manager
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Update aggregator: owns the canonical update list, fans out
    refresh and install requests to every registered source,
    and reports progress through the event bridge.

  Security / Safety Notes:
    Holds no credentials; elevation is encapsulated inside the
    source adapters.

  Dependencies:
    tokio for detached worker tasks; bridge for event delivery.

  Operational Scope:
    One instance per session. Single-flight guards ensure at
    most one refresh and one install batch run at a time;
    concurrent callers are dropped, never queued.

  Revision History:
    2025-08-29 COD  Authored update aggregation core.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic source order for reproducible merges
    - Per-item result tracking, never a coarse batch flag
    - Workers always emit their terminal event
============================================================*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::bridge::{EventBus, UpdateEvent};
use crate::logger::Logger;
use crate::record::{UpdateCounts, UpdateRecord};
use crate::source::UpdateSource;

/// Central manager for updates from every registered source.
pub struct UpdateManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    sources: Vec<Arc<dyn UpdateSource>>,
    updates: Mutex<Vec<UpdateRecord>>,
    refreshing: AtomicBool,
    installing: AtomicBool,
    bus: EventBus,
    logger: Arc<Logger>,
}

impl UpdateManager {
    /// Sources are consulted in registration order; the merged list
    /// and install batches preserve that order deterministically.
    pub fn new(sources: Vec<Arc<dyn UpdateSource>>, bus: EventBus, logger: Arc<Logger>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                sources,
                updates: Mutex::new(Vec::new()),
                refreshing: AtomicBool::new(false),
                installing: AtomicBool::new(false),
                bus,
                logger,
            }),
        }
    }

    /// Refresh available updates on a detached worker. Returns false
    /// when a refresh is already in flight; the caller is dropped,
    /// not queued, and no duplicate events are emitted.
    pub fn refresh(&self) -> bool {
        let inner = self.inner.clone();
        if inner
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            inner
                .logger
                .debug("REFRESH", "Refresh already in progress; caller dropped");
            return false;
        }

        tokio::spawn(async move {
            inner.logger.info("REFRESH", "Refreshing update information...");

            let mut merged = Vec::new();
            for source in &inner.sources {
                merged.extend(source.fetch_updates().await);
            }

            inner.logger.info(
                "REFRESH",
                format!("Found {} available updates", merged.len()),
            );
            {
                let mut updates = inner.updates.lock().expect("updates lock");
                *updates = merged.clone();
            }
            inner.bus.emit(UpdateEvent::UpdatesFound(merged)).await;

            // The guard clears and the terminal event fires even when
            // every source came back empty-handed.
            inner.refreshing.store(false, Ordering::SeqCst);
            inner.bus.emit(UpdateEvent::RefreshComplete).await;
        });
        true
    }

    /// Install the selected records on a detached worker, grouped by
    /// owning source in registration order. One progress event fires
    /// after every attempt; a failed item never halts the batch.
    pub fn install(&self, selected: Vec<UpdateRecord>) -> bool {
        let inner = self.inner.clone();
        if inner
            .installing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            inner
                .logger
                .debug("INSTALL", "Install already in progress; caller dropped");
            return false;
        }

        tokio::spawn(async move {
            inner
                .logger
                .info("INSTALL", format!("Installing {} updates...", selected.len()));

            let total = selected.len();
            let mut completed = 0usize;
            let mut failed: Vec<String> = Vec::new();

            for source in &inner.sources {
                for record in selected.iter().filter(|r| r.source == source.id()) {
                    let ok = source.install(record).await;
                    if !ok {
                        failed.push(record.name.clone());
                    }
                    completed += 1;
                    let percent = (completed as f64 / total as f64) * 100.0;
                    inner
                        .bus
                        .emit(UpdateEvent::UpdateProgress {
                            percent,
                            name: record.name.clone(),
                        })
                        .await;
                }
            }

            let success = failed.is_empty();
            if success {
                inner
                    .logger
                    .info("INSTALL", "All updates installed successfully");
            } else {
                inner.logger.error(
                    "INSTALL",
                    format!("{} of {total} updates failed: {}", failed.len(), failed.join(", ")),
                );
            }

            inner.installing.store(false, Ordering::SeqCst);
            inner
                .bus
                .emit(UpdateEvent::UpdateComplete { success, failed })
                .await;
        });
        true
    }

    /// Read-only projection over the current update list.
    pub fn counts(&self) -> UpdateCounts {
        let updates = self.inner.updates.lock().expect("updates lock");
        UpdateCounts::from_records(&updates)
    }

    /// Snapshot of the current update list.
    pub fn current_updates(&self) -> Vec<UpdateRecord> {
        self.inner.updates.lock().expect("updates lock").clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::bridge::{event_channel, EventLoop};
    use crate::record::SourceId;

    struct StubSource {
        id: SourceId,
        records: Vec<UpdateRecord>,
        fetch_delay: Duration,
        fail_installs: Vec<&'static str>,
        installed: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(id: SourceId, records: Vec<UpdateRecord>) -> Arc<Self> {
            Arc::new(Self {
                id,
                records,
                fetch_delay: Duration::ZERO,
                fail_installs: Vec::new(),
                installed: Mutex::new(Vec::new()),
            })
        }

        fn slow(id: SourceId, records: Vec<UpdateRecord>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                records,
                fetch_delay: delay,
                fail_installs: Vec::new(),
                installed: Mutex::new(Vec::new()),
            })
        }

        fn failing(id: SourceId, fail_installs: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                id,
                records: Vec::new(),
                fetch_delay: Duration::ZERO,
                fail_installs,
                installed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl UpdateSource for StubSource {
        fn id(&self) -> SourceId {
            self.id
        }

        async fn fetch_updates(&self) -> Vec<UpdateRecord> {
            if self.fetch_delay > Duration::ZERO {
                tokio::time::sleep(self.fetch_delay).await;
            }
            self.records.clone()
        }

        async fn install(&self, record: &UpdateRecord) -> bool {
            self.installed
                .lock()
                .expect("installed lock")
                .push(record.name.clone());
            !self.fail_installs.contains(&record.name.as_str())
        }
    }

    fn apt_record(name: &str, security: bool) -> UpdateRecord {
        UpdateRecord::apt(
            name.into(),
            "1.0".into(),
            "2.0".into(),
            security,
            "desc".into(),
            "1.0 MB".into(),
        )
    }

    fn flatpak_record(name: &str, app_id: &str) -> UpdateRecord {
        UpdateRecord::flatpak(
            name.into(),
            app_id.into(),
            "1.0".into(),
            "2.0".into(),
            "desc".into(),
            "10 MB".into(),
            "stable".into(),
            "flathub".into(),
        )
    }

    fn quiet_logger() -> Arc<Logger> {
        Arc::new(Logger::new(None, false).expect("logger"))
    }

    async fn drain_until_refresh_complete(event_loop: &mut EventLoop) -> Vec<UpdateEvent> {
        let mut seen = Vec::new();
        while let Some(event) = event_loop.dispatch_next().await {
            let done = matches!(event, UpdateEvent::RefreshComplete);
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    }

    #[tokio::test]
    async fn refresh_merges_sources_in_registration_order() {
        let apt = StubSource::new(
            SourceId::Apt,
            vec![apt_record("a", false), apt_record("b", false)],
        );
        let flatpak = StubSource::new(
            SourceId::Flatpak,
            vec![flatpak_record("App", "org.example.App")],
        );
        let (bus, mut event_loop) = event_channel();
        let manager = UpdateManager::new(vec![apt, flatpak], bus, quiet_logger());

        assert!(manager.refresh());
        let events = drain_until_refresh_complete(&mut event_loop).await;

        let UpdateEvent::UpdatesFound(records) = &events[0] else {
            panic!("expected updates_found first");
        };
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "App"]);
        assert!(matches!(events[1], UpdateEvent::RefreshComplete));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn second_refresh_call_in_flight_is_a_noop() {
        let apt = StubSource::slow(
            SourceId::Apt,
            vec![apt_record("a", false)],
            Duration::from_millis(100),
        );
        let flatpak = StubSource::new(SourceId::Flatpak, vec![]);
        let (bus, mut event_loop) = event_channel();
        let manager = UpdateManager::new(vec![apt, flatpak], bus, quiet_logger());

        assert!(manager.refresh());
        // The worker is sleeping inside the first fetch; this call
        // must be dropped without spawning a second worker.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!manager.refresh());

        let events = drain_until_refresh_complete(&mut event_loop).await;
        let completes = events
            .iter()
            .filter(|e| matches!(e, UpdateEvent::RefreshComplete))
            .count();
        assert_eq!(completes, 1);

        // Once the worker finished, a new refresh is accepted again.
        assert!(manager.refresh());
        drain_until_refresh_complete(&mut event_loop).await;
    }

    #[tokio::test]
    async fn counts_project_the_merged_list() {
        let apt = StubSource::new(
            SourceId::Apt,
            vec![
                apt_record("a", true),
                apt_record("b", false),
                apt_record("c", false),
            ],
        );
        let flatpak = StubSource::new(
            SourceId::Flatpak,
            vec![
                flatpak_record("One", "org.example.One"),
                flatpak_record("Two", "org.example.Two"),
            ],
        );
        let (bus, mut event_loop) = event_channel();
        let manager = UpdateManager::new(vec![apt, flatpak], bus, quiet_logger());

        manager.refresh();
        drain_until_refresh_complete(&mut event_loop).await;

        assert_eq!(
            manager.counts(),
            UpdateCounts {
                total: 5,
                apt: 3,
                flatpak: 2,
                security: 1,
            }
        );
    }

    #[tokio::test]
    async fn install_emits_monotonic_progress_then_one_complete() {
        let apt = StubSource::new(SourceId::Apt, vec![]);
        let flatpak = StubSource::new(SourceId::Flatpak, vec![]);
        let (bus, mut event_loop) = event_channel();
        let manager =
            UpdateManager::new(vec![apt.clone(), flatpak.clone()], bus, quiet_logger());

        let selection = vec![
            apt_record("a", false),
            flatpak_record("App", "org.example.App"),
            apt_record("b", false),
            flatpak_record("Other", "org.example.Other"),
        ];
        assert!(manager.install(selection));

        let mut progress = Vec::new();
        let mut completes = Vec::new();
        while let Some(event) = event_loop.dispatch_next().await {
            match event {
                UpdateEvent::UpdateProgress { percent, name } => progress.push((percent, name)),
                UpdateEvent::UpdateComplete { success, failed } => {
                    completes.push((success, failed));
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(progress.len(), 4);
        for pair in progress.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
        }
        assert_eq!(progress.last().map(|p| p.0), Some(100.0));
        assert_eq!(completes, vec![(true, vec![])]);

        // Partitioned: both apt records install before any flatpak one.
        let apt_order = apt.installed.lock().expect("installed lock").clone();
        assert_eq!(apt_order, vec!["a", "b"]);
        let progress_names: Vec<&str> = progress.iter().map(|p| p.1.as_str()).collect();
        assert_eq!(progress_names, vec!["a", "b", "App", "Other"]);
    }

    #[tokio::test]
    async fn failed_items_do_not_halt_the_batch() {
        let apt = StubSource::failing(SourceId::Apt, vec!["bad"]);
        let flatpak = StubSource::new(SourceId::Flatpak, vec![]);
        let (bus, mut event_loop) = event_channel();
        let manager = UpdateManager::new(vec![apt.clone(), flatpak], bus, quiet_logger());

        manager.install(vec![
            apt_record("good", false),
            apt_record("bad", false),
            apt_record("also-good", false),
        ]);

        let mut outcome = None;
        let mut progress_count = 0usize;
        while let Some(event) = event_loop.dispatch_next().await {
            match event {
                UpdateEvent::UpdateProgress { .. } => progress_count += 1,
                UpdateEvent::UpdateComplete { success, failed } => {
                    outcome = Some((success, failed));
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(progress_count, 3);
        assert_eq!(outcome, Some((false, vec!["bad".to_string()])));
        let attempted = apt.installed.lock().expect("installed lock").len();
        assert_eq!(attempted, 3);
    }

    #[tokio::test]
    async fn concurrent_install_callers_are_dropped() {
        let apt = StubSource::new(SourceId::Apt, vec![]);
        let flatpak = StubSource::new(SourceId::Flatpak, vec![]);
        let (bus, mut event_loop) = event_channel();
        let manager = UpdateManager::new(vec![apt, flatpak], bus, quiet_logger());

        assert!(manager.install(vec![apt_record("a", false)]));
        // Guard is set synchronously before the worker runs.
        assert!(!manager.install(vec![apt_record("b", false)]));

        let mut completes = 0usize;
        while let Some(event) = event_loop.dispatch_next().await {
            if matches!(event, UpdateEvent::UpdateComplete { .. }) {
                completes += 1;
                break;
            }
        }
        assert_eq!(completes, 1);
    }
}
