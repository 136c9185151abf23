use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent";

/// Seam to the external generative-text service. The engine only needs the
/// raw reply text; parsing is done on this side of the boundary.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn classify_window(&self, app_name: &str, window_title: &str) -> Result<String>;
}

/// The reply contract is substring-based, not structured: productive iff the
/// lower-cased text contains "yes" and does not contain "no". A reply holding
/// both tokens counts as unproductive.
pub fn reply_is_productive(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    lowered.contains("yes") && !lowered.contains("no")
}

pub fn build_classification_prompt(app_name: &str, window_title: &str) -> String {
    format!(
        "Classify if the application '{app_name}' with window title '{window_title}' \
         is used for productive work purposes.\n\
         \n\
         Productive applications include:\n\
         - Development tools (VSCode, PyCharm, IntelliJ, Sublime, etc.)\n\
         - Office suites (Word, Excel, PowerPoint, etc.)\n\
         - Browsers when used for work/research\n\
         - Communication tools (Teams, Slack, Zoom, etc.)\n\
         - Design tools (Figma, Photoshop, etc.)\n\
         - Project management (Jira, Asana, etc.)\n\
         - Terminal/command line applications\n\
         - Database tools\n\
         - Learning platforms\n\
         \n\
         Unproductive applications include:\n\
         - Games and gaming platforms\n\
         - Social media platforms\n\
         - Streaming entertainment\n\
         - Non-work-related video platforms\n\
         - Messaging apps when not work-related\n\
         \n\
         Consider both the application name AND the window title context.\n\
         For example, VS Code showing a Python file would be productive.\n\
         \n\
         Respond with ONLY 'yes' if productive, 'no' if unproductive."
    )
}

/// Gemini client. The API credential is read once at construction and the
/// same client is shared for the life of the engine.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("Gemini API key is empty"));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }

    /// Reads `GEMINI_API_KEY`; a missing key is fatal at construction.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").context(
            "GEMINI_API_KEY not set; add it to the environment or a .env file \
             (keys are issued at https://makersuite.google.com/app/apikey)",
        )?;
        Self::new(api_key)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn classify_window(&self, app_name: &str, window_title: &str) -> Result<String> {
        let prompt = build_classification_prompt(app_name, window_title);

        let response = self
            .http
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .context("inference request failed")?
            .error_for_status()
            .context("inference service returned an error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("inference response was not valid JSON")?;

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("inference response had no text candidate"))?;

        debug!("inference reply: {text}");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_replies_are_productive() {
        assert!(reply_is_productive("yes"));
        assert!(reply_is_productive("Yes."));
        assert!(reply_is_productive("YES, definitely productive"));
    }

    #[test]
    fn negative_or_mixed_replies_are_unproductive() {
        assert!(!reply_is_productive("no"));
        assert!(!reply_is_productive("No, but yes it could be"));
        assert!(!reply_is_productive("maybe"));
        // "not" contains the "no" token, by the substring contract
        assert!(!reply_is_productive("yes, why not"));
    }

    #[test]
    fn prompt_embeds_the_observation() {
        let prompt = build_classification_prompt("chrome.exe", "GitHub - Pull Request #42");
        assert!(prompt.contains("'chrome.exe'"));
        assert!(prompt.contains("'GitHub - Pull Request #42'"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(GeminiClient::new(String::new()).is_err());
        assert!(GeminiClient::new("  ".to_string()).is_err());
    }
}
