use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Per-user privacy controls for the capture pipeline. The tracker core only
/// reads these; enforcement happens in the capture layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub enable_screenshots: bool,
    pub screenshot_interval_minutes: u32,
    pub enable_text_extraction: bool,
    pub enable_ai_analysis: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            enable_screenshots: true,
            screenshot_interval_minutes: 15,
            enable_text_extraction: true,
            enable_ai_analysis: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    privacy: PrivacySettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn privacy(&self) -> PrivacySettings {
        self.data.read().unwrap().privacy.clone()
    }

    pub fn update_privacy(&self, settings: PrivacySettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.privacy = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
