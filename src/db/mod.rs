use std::{
    collections::HashMap,
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{DailySummary, Session, SessionStatus, WindowActivity, WindowDetails};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} is negative"))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn status_from_str(value: &str) -> Result<SessionStatus> {
    match value {
        "Running" => Ok(SessionStatus::Running),
        "Completed" => Ok(SessionStatus::Completed),
        "Cancelled" => Ok(SessionStatus::Cancelled),
        "Interrupted" => Ok(SessionStatus::Interrupted),
        _ => Err(anyhow!("unknown session status '{value}'")),
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        started_at: parse_datetime(&row.get::<_, String>(2)?)?,
        ended_at: row
            .get::<_, Option<String>>(3)?
            .map(|s| parse_datetime(&s))
            .transpose()?,
        status: status_from_str(&row.get::<_, String>(4)?)?,
        productive_secs: to_u64(row.get::<_, i64>(5)?)?,
        unproductive_secs: to_u64(row.get::<_, i64>(6)?)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, name, started_at, ended_at, status, productive_secs, unproductive_secs, created_at, updated_at";

/// Handle to the SQLite store. All access runs on a dedicated worker thread
/// that owns the connection; callers await replies over oneshot channels.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("worklens-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, name, started_at, ended_at, status, productive_secs, unproductive_secs, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.name,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    to_i64(record.productive_secs)?,
                    to_i64(record.unproductive_secs)?,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert session")?;
            Ok(())
        })
        .await
    }

    /// Persist the tracking loop's running totals and per-window buckets.
    pub async fn update_session_progress(
        &self,
        session_id: &str,
        productive_secs: u64,
        unproductive_secs: u64,
        window_details: WindowDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE sessions
                 SET productive_secs = ?1,
                     unproductive_secs = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    to_i64(productive_secs)?,
                    to_i64(unproductive_secs)?,
                    updated_at.to_rfc3339(),
                    session_id,
                ],
            )
            .with_context(|| "failed to update session progress")?;

            for (window, detail) in &window_details {
                tx.execute(
                    "INSERT INTO window_details (session_id, window, productive, active_secs)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(session_id, window)
                     DO UPDATE SET productive = excluded.productive,
                                   active_secs = excluded.active_secs",
                    params![
                        session_id,
                        window,
                        detail.productive,
                        to_i64(detail.active_secs)?,
                    ],
                )
                .with_context(|| format!("failed to upsert window detail '{window}'"))?;
            }

            tx.commit().context("failed to commit progress update")?;
            Ok(())
        })
        .await
    }

    pub async fn mark_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        ended_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    status.as_str(),
                    ended_at.map(|dt| dt.to_rfc3339()),
                    updated_at.to_rfc3339(),
                    session_id,
                ],
            )
            .with_context(|| "failed to update session status")?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            if let Some(row) = rows.next()? {
                Ok(Some(session_from_row(row)?))
            } else {
                Ok(None)
            }
        })
        .await
    }

    pub async fn get_window_details(&self, session_id: &str) -> Result<WindowDetails> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT window, productive, active_secs
                 FROM window_details
                 WHERE session_id = ?1",
            )?;

            let mut details = WindowDetails::new();
            let mut rows = stmt.query(params![session_id])?;
            while let Some(row) = rows.next()? {
                let window: String = row.get(0)?;
                details.insert(
                    window,
                    crate::models::WindowDetail {
                        productive: row.get(1)?,
                        active_secs: to_u64(row.get::<_, i64>(2)?)?,
                    },
                );
            }

            Ok(details)
        })
        .await
    }

    pub async fn get_incomplete_sessions(&self) -> Result<Vec<Session>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = 'Running'
                 ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(session_from_row(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Mark sessions left `Running` by a crashed process as interrupted.
    /// Returns how many were recovered.
    pub async fn recover_interrupted_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let incomplete = self.get_incomplete_sessions().await?;
        for session in &incomplete {
            warn!(
                "Recovered incomplete session {}; marking as Interrupted",
                session.id
            );
            self.mark_session_status(
                &session.id,
                SessionStatus::Interrupted,
                Some(now),
                now,
            )
            .await?;
        }
        Ok(incomplete.len())
    }

    /// Aggregate all sessions that started on `day` into a daily summary and
    /// persist the resulting score row.
    pub async fn daily_summary(&self, day: NaiveDate) -> Result<DailySummary> {
        let day_start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid day {day}"))?
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        self.execute(move |conn| {
            let mut totals_stmt = conn.prepare(
                "SELECT COALESCE(SUM(productive_secs), 0), COALESCE(SUM(unproductive_secs), 0)
                 FROM sessions
                 WHERE started_at >= ?1 AND started_at < ?2",
            )?;
            let (productive, unproductive): (i64, i64) = totals_stmt.query_row(
                params![day_start.to_rfc3339(), day_end.to_rfc3339()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let total_productive_secs = to_u64(productive)?;
            let total_unproductive_secs = to_u64(unproductive)?;

            let mut windows_stmt = conn.prepare(
                "SELECT wd.window, wd.productive, wd.active_secs
                 FROM window_details wd
                 JOIN sessions s ON s.id = wd.session_id
                 WHERE s.started_at >= ?1 AND s.started_at < ?2",
            )?;

            // Per-window totals across sessions; the first-seen label sticks.
            let mut window_times: HashMap<String, (bool, u64)> = HashMap::new();
            let mut rows =
                windows_stmt.query(params![day_start.to_rfc3339(), day_end.to_rfc3339()])?;
            while let Some(row) = rows.next()? {
                let window: String = row.get(0)?;
                let productive: bool = row.get(1)?;
                let active_secs = to_u64(row.get::<_, i64>(2)?)?;
                let entry = window_times.entry(window).or_insert((productive, 0));
                entry.1 += active_secs;
            }

            let mut productive_windows: Vec<WindowActivity> = window_times
                .into_iter()
                .map(|(window, (productive, active_secs))| WindowActivity {
                    window,
                    active_secs,
                    productive,
                })
                .collect();
            productive_windows.sort_by(|a, b| b.active_secs.cmp(&a.active_secs));

            let total_secs = total_productive_secs + total_unproductive_secs;
            let productivity_score = if total_secs > 0 {
                total_productive_secs as f64 / total_secs as f64 * 100.0
            } else {
                0.0
            };

            conn.execute(
                "INSERT INTO daily_scores (date, productivity_score, productive_secs, unproductive_secs, total_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(date)
                 DO UPDATE SET productivity_score = excluded.productivity_score,
                               productive_secs = excluded.productive_secs,
                               unproductive_secs = excluded.unproductive_secs,
                               total_secs = excluded.total_secs",
                params![
                    day.to_string(),
                    productivity_score,
                    to_i64(total_productive_secs)?,
                    to_i64(total_unproductive_secs)?,
                    to_i64(total_secs)?,
                ],
            )
            .with_context(|| "failed to upsert daily score")?;

            Ok(DailySummary {
                total_productive_secs,
                total_unproductive_secs,
                productivity_score,
                productive_windows,
            })
        })
        .await
    }
}
