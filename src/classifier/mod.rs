//! Window classification engine.
//!
//! Maps one foreground-window observation ("app: title") to a productivity
//! label through a fixed strategy chain: curated corrections, user feedback,
//! static app sets, domain patterns, activity patterns, productivity
//! keywords, the label cache, and finally rate-limited remote inference with
//! a keyword default when the service is unreachable.

mod cache;
mod feedback;
mod inference;
mod rate_limiter;
mod rules;

pub use cache::{CacheEntry, CacheSource, ClassificationCache};
pub use feedback::FeedbackStore;
pub use inference::{
    build_classification_prompt, reply_is_productive, GeminiClient, InferenceClient,
};
pub use rate_limiter::RateLimiter;
pub use rules::RuleTables;

use anyhow::Result;
use log::{error, warn};
use tokio::time::{sleep, Duration};

use crate::config::EngineConfig;

/// One parsed foreground-window sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub app_name: String,
    pub window_title: String,
}

impl Observation {
    /// Split at the first colon; everything before is the app identifier,
    /// everything after is the title. No colon means an empty title.
    pub fn parse(window_info: &str) -> Self {
        match window_info.split_once(':') {
            Some((app, title)) => Self {
                app_name: app.trim().to_string(),
                window_title: title.trim().to_string(),
            },
            None => Self {
                app_name: window_info.trim().to_string(),
                window_title: String::new(),
            },
        }
    }

    /// Lower-cased, trimmed identifier used for cache and feedback lookups.
    pub fn clean_app(&self) -> String {
        self.app_name.to_lowercase().trim().to_string()
    }
}

/// Owns all classification state. Not safe for concurrent callers; wrap in a
/// mutex (or keep to one polling task) when shared.
pub struct ClassificationEngine {
    config: EngineConfig,
    client: Box<dyn InferenceClient>,
    rules: RuleTables,
    feedback: FeedbackStore,
    cache: ClassificationCache,
    limiter: RateLimiter,
}

impl ClassificationEngine {
    pub fn new(config: EngineConfig, client: Box<dyn InferenceClient>) -> Result<Self> {
        Ok(Self {
            rules: RuleTables::new()?,
            feedback: FeedbackStore::new(),
            cache: ClassificationCache::new(config.cache_ttl, config.cache_sweep_every),
            limiter: RateLimiter::new(config.requests_per_minute),
            config,
            client,
        })
    }

    /// Engine backed by the production Gemini client. Fails when the API
    /// credential is absent.
    pub fn from_env(config: EngineConfig) -> Result<Self> {
        let client = GeminiClient::from_env()?;
        Self::new(config, Box::new(client))
    }

    /// Classify one observation. Total: every input resolves to a boolean,
    /// and failures degrade to a conservative label instead of surfacing.
    pub async fn classify(&mut self, window_info: &str) -> bool {
        let observation = Observation::parse(window_info);
        let clean_app = observation.clean_app();

        // Strategy 1: curated correction map, raw-cased exact match.
        if let Some(label) = self.rules.known_correction(&observation.app_name) {
            return label;
        }

        // Strategy 2: explicit user feedback.
        if let Some(label) = self.feedback.get(&clean_app) {
            return label;
        }

        // Strategy 3: curated sets, both identifier forms.
        if let Some(label) = self
            .rules
            .static_label(&clean_app, &observation.app_name)
        {
            return label;
        }

        // Strategy 4: domain patterns in the title, productive list first.
        if let Some(label) = self.rules.domain_label(&observation.window_title) {
            return label;
        }

        // Strategy 5: concrete productive activities in the title.
        if self.rules.is_productive_activity(&observation.window_title) {
            return true;
        }

        // Strategy 6: word-bounded productivity keywords.
        if self.rules.has_productivity_keyword(&observation.window_title) {
            return true;
        }

        // Strategy 7: cached label, if not expired.
        if let Some(label) = self.cache.get(&clean_app) {
            return label;
        }

        // Strategy 8: remote inference, last resort.
        self.classify_remote(&observation, &clean_app).await
    }

    /// Bounded retry loop around the remote call. Each attempt waits for
    /// rate-limiter admission first; a failed non-final attempt backs off
    /// exponentially (1s, 2s, ...). Exhausted retries fall back to the
    /// keyword default rather than propagating.
    async fn classify_remote(&mut self, observation: &Observation, clean_app: &str) -> bool {
        let max_attempts = self.config.max_inference_attempts;

        for attempt in 0..max_attempts {
            self.limiter.acquire().await;

            match self
                .client
                .classify_window(&observation.app_name, &observation.window_title)
                .await
            {
                Ok(reply) => {
                    let is_productive = reply_is_productive(&reply);
                    self.cache
                        .insert(clean_app, is_productive, CacheSource::Ai);
                    self.cache.maybe_sweep();
                    return is_productive;
                }
                Err(err) => {
                    if attempt + 1 == max_attempts {
                        error!(
                            "inference failed after {max_attempts} attempts for '{}': {err:#}",
                            observation.app_name
                        );
                        return default_label(clean_app);
                    }
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!(
                        "inference attempt {} failed ({err}); retrying in {}s",
                        attempt + 1,
                        backoff.as_secs()
                    );
                    sleep(backoff).await;
                }
            }
        }

        default_label(clean_app)
    }

    /// Record an explicit user correction. Takes precedence over every
    /// strategy except the curated correction map, writes a feedback-sourced
    /// cache entry, and migrates the app between the static sets.
    pub fn record_feedback(&mut self, window_info: &str, is_productive: bool) {
        let observation = Observation::parse(window_info);
        let clean_app = observation.clean_app();

        self.feedback.set(&clean_app, is_productive);
        self.cache
            .insert(&clean_app, is_productive, CacheSource::UserFeedback);
        self.rules.apply_feedback(&clean_app, is_productive);
    }
}

/// Heuristic used when the remote service stays unreachable: give
/// development-flavored identifiers the benefit of the doubt.
fn default_label(clean_app: &str) -> bool {
    clean_app.contains("code") || clean_app.contains("develop") || clean_app.contains("studio")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    enum MockBehavior {
        Reply(&'static str),
        Fail,
    }

    struct MockClient {
        behavior: MockBehavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl InferenceClient for MockClient {
        async fn classify_window(&self, _app: &str, _title: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                MockBehavior::Reply(text) => Ok(text.to_string()),
                MockBehavior::Fail => Err(anyhow::anyhow!("service unavailable")),
            }
        }
    }

    fn engine_with(behavior: MockBehavior) -> (ClassificationEngine, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = MockClient {
            behavior,
            calls: calls.clone(),
        };
        let engine =
            ClassificationEngine::new(EngineConfig::default(), Box::new(client)).unwrap();
        (engine, calls)
    }

    #[test]
    fn observation_parsing_splits_at_first_colon() {
        let obs = Observation::parse("ssh: user@host:22");
        assert_eq!(obs.app_name, "ssh");
        assert_eq!(obs.window_title, "user@host:22");

        let bare = Observation::parse("Spotify");
        assert_eq!(bare.app_name, "Spotify");
        assert_eq!(bare.window_title, "");
        assert_eq!(bare.clean_app(), "spotify");
    }

    #[tokio::test]
    async fn static_productive_entries_skip_the_network() {
        let (mut engine, calls) = engine_with(MockBehavior::Fail);
        assert!(
            engine
                .classify("code.exe: main.py - myproj - Visual Studio Code")
                .await
        );
        assert!(engine.classify("Slack: #general").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn static_unproductive_entries_skip_the_network() {
        let (mut engine, calls) = engine_with(MockBehavior::Fail);
        assert!(!engine.classify("steam.exe: Counter-Strike 2").await);
        assert!(!engine.classify("Netflix: Continue watching").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn browser_with_github_title_is_productive() {
        // A non-listed browser-like identifier bypasses the static browser
        // entries and exercises the title heuristics instead.
        let (mut engine, calls) = engine_with(MockBehavior::Fail);
        assert!(
            engine
                .classify("qutebrowser.exe: GitHub - Pull Request #42")
                .await
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn known_corrections_beat_everything() {
        let (mut engine, calls) = engine_with(MockBehavior::Fail);
        // Feedback says unproductive, but the raw-cased correction map is
        // consulted first.
        engine.record_feedback("GitKraken: repo view", false);
        assert!(engine.classify("GitKraken: repo view").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ai_result_is_cached_and_idempotent() {
        let (mut engine, calls) = engine_with(MockBehavior::Reply("yes"));
        assert!(engine.classify("unknownapp.exe: something benign").await);
        assert!(engine.classify("unknownapp.exe: something benign").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let entry = engine.cache.get("unknownapp.exe");
        assert_eq!(entry, Some(true));
    }

    #[tokio::test]
    async fn ambiguous_reply_counts_as_unproductive() {
        let (mut engine, _) = engine_with(MockBehavior::Reply("No, but yes it could be"));
        assert!(!engine.classify("unknownapp.exe: something benign").await);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cache_entry_forces_a_remote_call() {
        let (mut engine, calls) = engine_with(MockBehavior::Reply("no"));
        engine.cache.insert_at(
            "unknownapp.exe",
            true,
            CacheSource::Ai,
            Utc::now() - ChronoDuration::hours(25),
        );

        assert!(!engine.classify("unknownapp.exe: something benign").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn feedback_overrides_static_sets_and_migrates_them() {
        let (mut engine, calls) = engine_with(MockBehavior::Fail);
        assert!(!engine.classify("steam: library").await);

        engine.record_feedback("steam: library", true);
        assert!(engine.classify("steam: library").await);

        // The app moved between the curated sets too.
        assert_eq!(engine.rules.static_label("steam", "steam"), Some(true));
        assert_eq!(engine.cache.get("steam"), Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back_to_the_keyword_default() {
        let (mut engine, calls) = engine_with(MockBehavior::Fail);

        assert!(!engine.classify("unknownapp.exe: random noise").await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(engine.classify("mycodepad.exe: random noise").await);
        assert!(engine.classify("devstudio.exe: random noise").await);
    }

    #[tokio::test]
    async fn activity_and_keyword_strategies_label_titles() {
        let (mut engine, calls) = engine_with(MockBehavior::Fail);
        assert!(engine.classify("someapp.exe: notes.md - drafts").await);
        assert!(engine.classify("someapp.exe: quarterly planning").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn titleless_observation_still_resolves() {
        let (mut engine, _) = engine_with(MockBehavior::Reply("yes"));
        assert!(engine.classify("mystery-app").await);
    }
}
