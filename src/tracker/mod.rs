//! Session tracking: samples the foreground window, classifies it, and
//! accumulates per-window durations into the active session.

mod observer;

pub use observer::{describe_window, display_name, simplify_title, WindowObserver};

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::ClassificationEngine;
use crate::db::Database;
use crate::models::{Session, SessionStatus, WindowDetail, WindowDetails};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Foreground-window sampling cadence. Accumulation is debounced to
    /// whole elapsed seconds regardless of cadence.
    pub poll_interval: Duration,

    /// Consecutive sampling/persistence failures tolerated before the
    /// session is abandoned as interrupted.
    pub max_consecutive_errors: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_consecutive_errors: 5,
        }
    }
}

/// In-memory totals for the running session, flushed to storage every
/// processed tick.
#[derive(Debug, Default)]
struct SessionLedger {
    productive_secs: u64,
    unproductive_secs: u64,
    window_details: WindowDetails,
}

impl SessionLedger {
    fn apply(&mut self, window_info: &str, is_productive: bool, elapsed_secs: u64) {
        if is_productive {
            self.productive_secs += elapsed_secs;
        } else {
            self.unproductive_secs += elapsed_secs;
        }

        let detail = self
            .window_details
            .entry(window_info.to_string())
            .or_insert(WindowDetail {
                productive: is_productive,
                active_secs: 0,
            });
        detail.active_secs += elapsed_secs;
    }
}

struct ActiveSession {
    session_id: String,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the classification engine and one polling loop per active session.
pub struct ProductivityTracker {
    db: Database,
    engine: Arc<Mutex<ClassificationEngine>>,
    observer: Arc<Mutex<Box<dyn WindowObserver>>>,
    config: TrackerConfig,
    active: Option<ActiveSession>,
}

impl ProductivityTracker {
    pub fn new(
        db: Database,
        engine: ClassificationEngine,
        observer: Box<dyn WindowObserver>,
    ) -> Self {
        Self::with_config(db, engine, observer, TrackerConfig::default())
    }

    pub fn with_config(
        db: Database,
        engine: ClassificationEngine,
        observer: Box<dyn WindowObserver>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            db,
            engine: Arc::new(Mutex::new(engine)),
            observer: Arc::new(Mutex::new(observer)),
            config,
            active: None,
        }
    }

    /// Start a named session and its polling loop. Fails when one is active.
    pub async fn start_session(&mut self, name: &str) -> Result<String> {
        if self.active.is_some() {
            bail!("a session is already active");
        }

        let started_at = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            started_at,
            ended_at: None,
            status: SessionStatus::Running,
            productive_secs: 0,
            unproductive_secs: 0,
            created_at: started_at,
            updated_at: started_at,
        };

        self.db.insert_session(&session).await?;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tracking_loop(
            session.id.clone(),
            self.db.clone(),
            self.engine.clone(),
            self.observer.clone(),
            cancel_token.clone(),
            self.config.clone(),
        ));

        info!("Started session {} ('{}')", session.id, name);
        self.active = Some(ActiveSession {
            session_id: session.id.clone(),
            cancel_token,
            handle,
        });

        Ok(session.id)
    }

    /// Stop the polling loop and mark the session completed.
    pub async fn end_session(&mut self) -> Result<Session> {
        let session_id = self.stop_active_loop().await?;
        let ended_at = Utc::now();

        self.db
            .mark_session_status(&session_id, SessionStatus::Completed, Some(ended_at), ended_at)
            .await?;

        self.db
            .get_session(&session_id)
            .await?
            .ok_or_else(|| anyhow!("session {session_id} vanished from storage"))
    }

    /// Stop the polling loop and discard the session as cancelled.
    pub async fn cancel_session(&mut self) -> Result<()> {
        let session_id = self.stop_active_loop().await?;
        let cancelled_at = Utc::now();

        self.db
            .mark_session_status(
                &session_id,
                SessionStatus::Cancelled,
                Some(cancelled_at),
                cancelled_at,
            )
            .await
    }

    /// Forward an explicit user correction to the engine.
    pub async fn record_feedback(&self, window_info: &str, is_productive: bool) {
        self.engine
            .lock()
            .await
            .record_feedback(window_info, is_productive);
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    async fn stop_active_loop(&mut self) -> Result<String> {
        let active = self
            .active
            .take()
            .ok_or_else(|| anyhow!("no active session"))?;

        active.cancel_token.cancel();
        if let Err(err) = active.handle.await {
            error!("tracking loop task failed to join: {err}");
        }

        Ok(active.session_id)
    }
}

async fn tracking_loop(
    session_id: String,
    db: Database,
    engine: Arc<Mutex<ClassificationEngine>>,
    observer: Arc<Mutex<Box<dyn WindowObserver>>>,
    cancel_token: CancellationToken,
    config: TrackerConfig,
) {
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ledger = SessionLedger::default();
    let mut last_update = Instant::now();
    let mut consecutive_errors: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed_secs = last_update.elapsed().as_secs();
                if elapsed_secs == 0 {
                    continue;
                }

                match process_tick(&session_id, &db, &engine, &observer, &mut ledger, elapsed_secs).await {
                    Ok(()) => consecutive_errors = 0,
                    Err(err) => {
                        warn!("tracking tick failed for session {session_id}: {err:#}");
                        consecutive_errors += 1;
                        if consecutive_errors > config.max_consecutive_errors {
                            error!(
                                "too many consecutive errors, abandoning session {session_id}"
                            );
                            let now = Utc::now();
                            if let Err(err) = db
                                .mark_session_status(
                                    &session_id,
                                    SessionStatus::Interrupted,
                                    Some(now),
                                    now,
                                )
                                .await
                            {
                                error!("failed to mark session interrupted: {err:#}");
                            }
                            break;
                        }
                    }
                }

                last_update = Instant::now();
            }
            _ = cancel_token.cancelled() => {
                info!("tracking loop for session {session_id} shutting down");
                break;
            }
        }
    }
}

async fn process_tick(
    session_id: &str,
    db: &Database,
    engine: &Arc<Mutex<ClassificationEngine>>,
    observer: &Arc<Mutex<Box<dyn WindowObserver>>>,
    ledger: &mut SessionLedger,
    elapsed_secs: u64,
) -> Result<()> {
    let sample = observer.lock().await.active_window()?;

    // Excluded windows drop the sample without accumulating time.
    let Some(window_info) = sample else {
        return Ok(());
    };

    let is_productive = engine.lock().await.classify(&window_info).await;
    ledger.apply(&window_info, is_productive, elapsed_secs);

    db.update_session_progress(
        session_id,
        ledger.productive_secs,
        ledger.unproductive_secs,
        ledger.window_details.clone(),
        Utc::now(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::InferenceClient;
    use crate::config::EngineConfig;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct NoNetwork;

    #[async_trait]
    impl InferenceClient for NoNetwork {
        async fn classify_window(&self, _app: &str, _title: &str) -> Result<String> {
            panic!("tracker tests must not reach the network");
        }
    }

    struct ScriptedObserver {
        samples: Vec<Option<String>>,
        cursor: usize,
    }

    impl ScriptedObserver {
        fn cycling(samples: Vec<Option<String>>) -> Self {
            Self { samples, cursor: 0 }
        }
    }

    impl WindowObserver for ScriptedObserver {
        fn active_window(&mut self) -> Result<Option<String>> {
            let sample = self.samples[self.cursor % self.samples.len()].clone();
            self.cursor += 1;
            Ok(sample)
        }
    }

    fn test_engine() -> ClassificationEngine {
        ClassificationEngine::new(EngineConfig::default(), Box::new(NoNetwork)).unwrap()
    }

    #[test]
    fn ledger_buckets_time_by_label_and_window() {
        let mut ledger = SessionLedger::default();
        ledger.apply("Visual Studio Code: main.py", true, 2);
        ledger.apply("Visual Studio Code: main.py", true, 3);
        ledger.apply("Steam: store", false, 4);

        assert_eq!(ledger.productive_secs, 5);
        assert_eq!(ledger.unproductive_secs, 4);
        assert_eq!(
            ledger.window_details["Visual Studio Code: main.py"].active_secs,
            5
        );
        assert_eq!(ledger.window_details["Steam: store"].active_secs, 4);
        assert!(!ledger.window_details["Steam: store"].productive);
    }

    #[tokio::test]
    async fn only_one_session_at_a_time() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let observer = ScriptedObserver::cycling(vec![None]);
        let mut tracker = ProductivityTracker::new(db, test_engine(), Box::new(observer));

        tracker.start_session("first").await.unwrap();
        assert!(tracker.start_session("second").await.is_err());
        tracker.cancel_session().await.unwrap();
        assert!(!tracker.is_active());
    }

    #[tokio::test]
    async fn session_accumulates_classified_time() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let observer = ScriptedObserver::cycling(vec![Some(
            "code.exe: main.py - myproj - Visual Studio Code".to_string(),
        )]);
        let mut tracker = ProductivityTracker::with_config(
            db.clone(),
            test_engine(),
            Box::new(observer),
            TrackerConfig {
                poll_interval: Duration::from_millis(100),
                max_consecutive_errors: 5,
            },
        );

        let session_id = tracker.start_session("focus block").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let session = tracker.end_session().await.unwrap();

        assert_eq!(session.id, session_id);
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.ended_at.is_some());
        // ~2.5s of wall clock debounced to whole seconds; allow slack.
        assert!(session.productive_secs >= 1, "accumulated {}", session.productive_secs);
        assert_eq!(session.unproductive_secs, 0);

        let details = db.get_window_details(&session_id).await.unwrap();
        let detail = &details["code.exe: main.py - myproj - Visual Studio Code"];
        assert!(detail.productive);
        assert!(detail.active_secs >= 1);
    }

    #[tokio::test]
    async fn unproductive_windows_land_in_the_other_bucket() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let observer =
            ScriptedObserver::cycling(vec![Some("steam.exe: Counter-Strike 2".to_string())]);
        let mut tracker = ProductivityTracker::with_config(
            db,
            test_engine(),
            Box::new(observer),
            TrackerConfig {
                poll_interval: Duration::from_millis(100),
                max_consecutive_errors: 5,
            },
        );

        tracker.start_session("slacking").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let session = tracker.end_session().await.unwrap();

        assert_eq!(session.productive_secs, 0);
        assert!(session.unproductive_secs >= 1);
    }

    #[tokio::test]
    async fn repeated_errors_interrupt_the_session() {
        struct FailingObserver;
        impl WindowObserver for FailingObserver {
            fn active_window(&mut self) -> Result<Option<String>> {
                Err(anyhow!("platform API unavailable"))
            }
        }

        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let mut tracker = ProductivityTracker::with_config(
            db.clone(),
            test_engine(),
            Box::new(FailingObserver),
            TrackerConfig {
                poll_interval: Duration::from_millis(100),
                max_consecutive_errors: 2,
            },
        );

        let session_id = tracker.start_session("doomed").await.unwrap();
        tokio::time::sleep(Duration::from_millis(4000)).await;

        let stored = db.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Interrupted);

        // The loop already exited; ending just flips the status.
        let ended = tracker.end_session().await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
    }
}
