//! Worklens: productivity tracking backend.
//!
//! The crate centers on the window classification engine
//! ([`classifier::ClassificationEngine`]), which labels foreground-window
//! observations as productive or not, and the session tracker
//! ([`tracker::ProductivityTracker`]), which turns a stream of labeled
//! observations into persisted per-session time aggregates.
//!
//! OS integration (window enumeration, screenshots) stays behind the
//! [`tracker::WindowObserver`] seam; HTTP and report rendering live in the
//! embedding application.

pub mod classifier;
pub mod config;
pub mod db;
pub mod models;
pub mod settings;
pub mod tracker;

pub use classifier::ClassificationEngine;
pub use config::EngineConfig;
pub use db::Database;
pub use models::{DailySummary, Session, SessionStatus};
pub use settings::{PrivacySettings, SettingsStore};
pub use tracker::{ProductivityTracker, TrackerConfig, WindowObserver};
