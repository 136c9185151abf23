use anyhow::Result;

/// Seam to the OS-level foreground-window collector. Implementations wrap
/// platform APIs; tests use scripted fakes. `None` means the current sample
/// should be excluded from tracking.
pub trait WindowObserver: Send {
    fn active_window(&mut self) -> Result<Option<String>>;
}

/// Window titles containing any of these are our own surfaces and are never
/// tracked.
const EXCLUDED_TERMS: &[&str] = &["Worklens"];

/// Known process names mapped to friendlier display names.
const APP_NAME_MAPPING: &[(&str, &str)] = &[
    ("code.exe", "Visual Studio Code"),
    ("chrome.exe", "Google Chrome"),
    ("firefox.exe", "Mozilla Firefox"),
    ("msedge.exe", "Microsoft Edge"),
    ("slack.exe", "Slack"),
    ("teams.exe", "Microsoft Teams"),
    ("discord.exe", "Discord"),
    ("notion.exe", "Notion"),
    ("rider64.exe", "JetBrains Rider"),
    ("pycharm64.exe", "PyCharm"),
    ("webstorm64.exe", "WebStorm"),
    ("devenv.exe", "Visual Studio"),
    ("notepad.exe", "Notepad"),
    ("notepad++.exe", "Notepad++"),
    ("explorer.exe", "File Explorer"),
];

pub fn display_name(process_name: &str) -> Option<&'static str> {
    let lowered = process_name.to_lowercase();
    APP_NAME_MAPPING
        .iter()
        .find(|(process, _)| *process == lowered)
        .map(|(_, name)| *name)
}

/// Build the observation string handed to the classifier from one raw
/// platform sample. Returns `None` for excluded windows.
pub fn describe_window(process_name: &str, window_title: &str) -> Option<String> {
    if EXCLUDED_TERMS
        .iter()
        .any(|term| window_title.contains(term))
    {
        return None;
    }

    let app = display_name(process_name)
        .map(str::to_string)
        .unwrap_or_else(|| simplify_title(window_title, process_name));

    if window_title.is_empty() {
        Some(app)
    } else {
        Some(format!("{app}: {window_title}"))
    }
}

/// Reduce a raw window title to its most meaningful part: split on common
/// separators and take the first part that looks like an app or document
/// name, skipping chrome like "Untitled" or "about:" pages.
pub fn simplify_title(window_title: &str, process_name: &str) -> String {
    let title = window_title.replace(process_name, "");
    let title = title.trim();

    const SEPARATORS: &[&str] = &[" - ", " | ", " \u{2022} "];
    for separator in SEPARATORS {
        let parts: Vec<&str> = title.split(separator).collect();
        if parts.len() > 1 {
            let meaningful: Vec<&str> = parts
                .iter()
                .map(|part| part.trim())
                .filter(|part| {
                    let lowered = part.to_lowercase();
                    part.len() > 2
                        && !lowered.starts_with("file:")
                        && !lowered.starts_with("about:")
                        && !lowered.starts_with("new")
                        && !lowered.starts_with("untitled")
                })
                .collect();

            if let Some(first) = meaningful.first() {
                return first.to_string();
            }
        }
    }

    if title.is_empty() {
        process_name.trim_end_matches(".exe").to_string()
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_processes_map_to_display_names() {
        assert_eq!(display_name("code.exe"), Some("Visual Studio Code"));
        assert_eq!(display_name("CODE.EXE"), Some("Visual Studio Code"));
        assert_eq!(display_name("unknown.exe"), None);
    }

    #[test]
    fn excluded_windows_are_dropped() {
        assert_eq!(describe_window("chrome.exe", "Worklens Dashboard"), None);
        assert!(describe_window("chrome.exe", "GitHub").is_some());
    }

    #[test]
    fn observation_keeps_the_title_for_heuristics() {
        let observation = describe_window("code.exe", "main.py - myproj").unwrap();
        assert_eq!(observation, "Visual Studio Code: main.py - myproj");
    }

    #[test]
    fn titleless_samples_are_just_the_app() {
        assert_eq!(
            describe_window("slack.exe", "").as_deref(),
            Some("Slack")
        );
    }

    #[test]
    fn simplify_prefers_meaningful_middle_parts() {
        assert_eq!(
            simplify_title("authControllers.js - tracker-app - Visual Studio Code", "code.exe"),
            "authControllers.js"
        );
        assert_eq!(
            simplify_title("Untitled - Notepad", "notepad.exe"),
            "Notepad"
        );
        assert_eq!(simplify_title("WhatsApp", "whatsapp.exe"), "WhatsApp");
    }

    #[test]
    fn simplify_falls_back_to_the_process_name() {
        assert_eq!(simplify_title("", "spotify.exe"), "spotify");
    }
}
