use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// Curated identifiers and title heuristics used before any remote call.
///
/// The app sets intentionally mix casings: some entries come from process
/// names (`code.exe`), others from display names (`Visual Studio Code`).
/// Membership is checked with both the raw and the normalized identifier,
/// so the tables themselves are never normalized.
pub struct RuleTables {
    productive_apps: HashSet<String>,
    unproductive_apps: HashSet<String>,
    known_corrections: HashMap<String, bool>,
    productive_domains: Vec<Regex>,
    unproductive_domains: Vec<Regex>,
    activity_patterns: Vec<Regex>,
    keyword_pattern: Regex,
}

const PRODUCTIVE_APPS: &[&str] = &[
    // Development tools
    "code", "Code", "vscode", "code.exe", "Visual Studio Code", "codium", "vscodium",
    "sublime_text", "SublimeText", "atom", "notepad++", "Notepad++",
    "intellij", "IntelliJ", "pycharm", "PyCharm", "webstorm", "WebStorm", "phpstorm", "PhpStorm",
    "android studio", "AndroidStudio", "eclipse", "Eclipse", "netbeans", "NetBeans",
    "vim", "neovim", "emacs", "xcode", "XCode", "Xcode",
    "git", "git-bash", "github desktop", "GitHubDesktop", "sourcetree", "SourceTree",
    // Browsers (productive by default)
    "chrome", "Chrome", "firefox", "Firefox", "edge", "Edge", "msedge",
    "safari", "Safari", "opera", "Opera", "brave", "Brave",
    // Office suites
    "word", "Word", "WINWORD", "winword.exe", "excel", "Excel", "EXCEL", "excel.exe",
    "powerpoint", "PowerPoint", "POWERPNT", "powerpnt.exe",
    "outlook", "Outlook", "OUTLOOK", "outlook.exe",
    "onenote", "OneNote", "access", "Access", "publisher", "Publisher",
    "libreoffice", "LibreOffice", "openoffice", "OpenOffice",
    "pages", "Pages", "numbers", "Numbers", "keynote", "Keynote",
    // Communication tools
    "teams", "Teams", "microsoft teams", "slack", "Slack", "zoom", "Zoom", "skype", "Skype",
    "meet", "Meet", "google meet", "webex", "Webex", "discord", "Discord",
    // Design tools
    "figma", "Figma", "sketch", "Sketch", "photoshop", "Photoshop",
    "illustrator", "Illustrator", "indesign", "InDesign", "xd", "XD", "adobe xd", "Adobe XD",
    "gimp", "GIMP", "inkscape", "Inkscape", "blender", "Blender",
    "unity", "Unity", "unreal", "Unreal",
    // Note-taking and organization
    "notion", "Notion", "evernote", "Evernote", "trello", "Trello",
    "asana", "Asana", "jira", "Jira", "confluence", "Confluence",
    // Terminals
    "terminal", "Terminal", "cmd", "cmd.exe", "Command Prompt",
    "powershell", "PowerShell", "powershell.exe",
    "bash", "zsh", "windowsterminal", "WindowsTerminal", "iterm", "iTerm",
    // Database tools
    "mysql workbench", "MySQLWorkbench", "pgadmin", "PGAdmin", "dbeaver", "DBeaver",
    "sqlitestudio", "SQLiteStudio", "mongodb compass", "MongoDBCompass",
    // Remote access
    "ssh", "putty", "PuTTY", "teamviewer", "TeamViewer", "anydesk", "AnyDesk",
    // Document readers
    "acrobat", "Acrobat", "adobe reader", "AdobeReader", "foxit", "Foxit",
    "preview", "Preview", "drawboard", "Drawboard",
    // Presentation and research tools
    "zoomit", "ZoomIt", "prezi", "Prezi", "zotero", "Zotero", "mendeley", "Mendeley",
];

const UNPRODUCTIVE_APPS: &[&str] = &[
    // Streaming services
    "netflix", "Netflix", "hulu", "Hulu", "disney+", "Disney+", "prime video", "Prime Video",
    "hbo max", "HBO Max", "peacock", "Peacock", "paramount+", "Paramount+", "appletv", "AppleTV",
    // Video platforms
    "youtube", "YouTube", "twitch", "Twitch", "tiktok", "TikTok", "vimeo", "Vimeo",
    // Gaming
    "steam", "Steam", "epic games", "Epic Games", "battle.net", "Battle.net",
    "origin", "Origin", "uplay", "Uplay", "xbox", "Xbox", "playstation", "PlayStation",
    "ea desktop", "EA Desktop", "lol.launcher", "LeagueClient", "valorant", "Valorant",
    "fortnite", "Fortnite", "minecraft", "Minecraft", "roblox", "Roblox",
    "apex legends", "Apex Legends", "counter-strike", "Counter-Strike", "csgo", "CSGO",
    "dota", "Dota", "among us", "Among Us", "genshin impact", "Genshin Impact",
    "warzone", "Warzone", "cod", "CoD",
    // Social media
    "facebook", "Facebook", "instagram", "Instagram", "twitter", "Twitter", "reddit", "Reddit",
    "pinterest", "Pinterest", "snapchat", "Snapchat", "whatsapp", "WhatsApp",
    "telegram", "Telegram", "messenger", "Messenger", "signal", "Signal",
    "linkedin", "LinkedIn",
    // Music and entertainment
    "spotify", "Spotify", "apple music", "Apple Music", "itunes", "iTunes",
    "pandora", "Pandora", "deezer", "Deezer", "tidal", "Tidal", "vlc", "VLC", "mpv", "MPV",
    // Casual games
    "solitaire", "Solitaire", "minesweeper", "Minesweeper", "candy crush", "Candy Crush",
    "chess.com", "Chess.com", "lichess", "Lichess",
];

/// Apps the remote model has historically mislabeled; raw-cased exact match.
const KNOWN_CORRECTIONS: &[(&str, bool)] = &[
    ("vscode", true),
    ("code.exe", true),
    ("VS Code", true),
    ("Visual Studio Code", true),
    ("IntelliJ IDEA", true),
    ("PyCharm", true),
    ("Android Studio", true),
    ("github", true),
    ("GitKraken", true),
];

const PRODUCTIVE_DOMAINS: &[&str] = &[
    r"github\.com",
    r"gitlab\.com",
    r"bitbucket\.org",
    r"stackoverflow\.com",
    r"docs\.python\.org",
    r"developer\.mozilla\.org",
    r"w3schools\.com",
    r"medium\.com",
    r"dev\.to",
    r"learn\.microsoft\.com",
    r"aws\.amazon\.com",
    r"cloud\.google\.com",
    r"docs\.aws\.amazon\.com",
    r"azure\.microsoft\.com",
    r"jira\.com",
    r"atlassian\.com",
    r"codepen\.io",
    r"replit\.com",
    r"kaggle\.com",
    r"freecodecamp\.org",
    r"udemy\.com",
    r"coursera\.org",
    r"edx\.org",
    r"linkedin\.com/learning",
    r"pluralsight\.com",
    r"educative\.io",
];

const UNPRODUCTIVE_DOMAINS: &[&str] = &[
    r"facebook\.com",
    r"instagram\.com",
    r"twitter\.com",
    r"reddit\.com",
    r"netflix\.com",
    r"hulu\.com",
    r"disney\.com",
    r"disneyplus\.com",
    r"youtube\.com/(?!.*tutorial|.*learn|.*education|.*programming|.*code|.*development)",
    r"twitch\.tv",
    r"tiktok\.com",
    r"pinterest\.com",
    r"snapchat\.com",
    r"tumblr\.com",
    r"9gag\.com",
    r"buzzfeed\.com",
    r"espn\.com",
    r"nfl\.com",
    r"nba\.com",
    r"mlb\.com",
];

const ACTIVITY_PATTERNS: &[&str] = &[
    // Source files
    r"\.py\b",
    r"\.js\b",
    r"\.html\b",
    r"\.css\b",
    r"\.java\b",
    r"\.cpp\b|\.c\b|\.h\b",
    r"\.php\b",
    r"\.sql\b",
    r"\.md\b",
    r"\.json\b",
    r"\.xml\b",
    r"\.yml\b|\.yaml\b",
    r"\.sh\b|\.bat\b|\.ps1\b",
    // Version control
    r"pull request|PR #|issue #|commit",
    // Development activity
    r"debug|breakpoint|console|terminal",
    r"localhost|127\.0\.0\.1|0\.0\.0\.0",
    r"ssh:|ftp:|sftp:",
    r"database|db connection|query",
    // Work artifacts
    r"meeting notes|agenda|minutes",
    r"report|analysis|dashboard",
    r"project plan|roadmap|sprint",
    r"presentation|slides|deck",
    r"document|specification|requirements",
    r"learning|tutorial|course|training",
];

const PRODUCTIVE_KEYWORDS: &[&str] = &[
    "work", "project", "task", "meeting", "email", "code", "develop", "write", "edit",
    "design", "create", "build", "research", "learn", "study", "review", "analyse", "analyze",
    "report", "document", "presentation", "client", "customer", "planning", "debug",
    "test", "implement", "deploy", "database", "server", "api", "cloud", "git", "terminal",
    "console", "editor", "ide", "notebook", "programming", "development",
];

fn compile_list(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid rule pattern '{pattern}'"))
        })
        .collect()
}

impl RuleTables {
    pub fn new() -> Result<Self> {
        // The YouTube entry needs look-ahead, which the regex crate does not
        // support. It is handled separately in `youtube_label`.
        let unproductive_domains: Vec<&str> = UNPRODUCTIVE_DOMAINS
            .iter()
            .filter(|pattern| !pattern.starts_with(r"youtube\.com"))
            .copied()
            .collect();

        let keyword_alternation = PRODUCTIVE_KEYWORDS
            .iter()
            .map(|keyword| regex::escape(keyword))
            .collect::<Vec<_>>()
            .join("|");
        let keyword_pattern = RegexBuilder::new(&format!(r"\b(?:{keyword_alternation})\b"))
            .case_insensitive(true)
            .build()
            .context("invalid productivity keyword pattern")?;

        Ok(Self {
            productive_apps: PRODUCTIVE_APPS.iter().map(|s| s.to_string()).collect(),
            unproductive_apps: UNPRODUCTIVE_APPS.iter().map(|s| s.to_string()).collect(),
            known_corrections: KNOWN_CORRECTIONS
                .iter()
                .map(|(app, productive)| (app.to_string(), *productive))
                .collect(),
            productive_domains: compile_list(PRODUCTIVE_DOMAINS)?,
            unproductive_domains: compile_list(&unproductive_domains)?,
            activity_patterns: compile_list(ACTIVITY_PATTERNS)?,
            keyword_pattern,
        })
    }

    /// Exact raw-cased lookup in the correction map.
    pub fn known_correction(&self, raw_app: &str) -> Option<bool> {
        self.known_corrections.get(raw_app).copied()
    }

    /// Membership in the curated sets, checked with both identifier forms.
    pub fn static_label(&self, clean_app: &str, raw_app: &str) -> Option<bool> {
        if self.productive_apps.contains(clean_app) || self.productive_apps.contains(raw_app) {
            return Some(true);
        }
        if self.unproductive_apps.contains(clean_app) || self.unproductive_apps.contains(raw_app) {
            return Some(false);
        }
        None
    }

    /// First matching domain list wins; productive list is checked first.
    pub fn domain_label(&self, window_title: &str) -> Option<bool> {
        for pattern in &self.productive_domains {
            if pattern.is_match(window_title) {
                return Some(true);
            }
        }

        // YouTube is unproductive unless the title signals learning content
        // (stand-in for the look-ahead in the original pattern).
        if let Some(label) = self.youtube_label(window_title) {
            return Some(label);
        }

        for pattern in &self.unproductive_domains {
            if pattern.is_match(window_title) {
                return Some(false);
            }
        }

        None
    }

    fn youtube_label(&self, window_title: &str) -> Option<bool> {
        let lowered = window_title.to_lowercase();
        if !lowered.contains("youtube.com") {
            return None;
        }
        const EDUCATIONAL: &[&str] = &[
            "tutorial", "learn", "education", "programming", "code", "development",
        ];
        if EDUCATIONAL.iter().any(|term| lowered.contains(term)) {
            None // fall through to later strategies
        } else {
            Some(false)
        }
    }

    /// Concrete productive activities visible in the title.
    pub fn is_productive_activity(&self, window_title: &str) -> bool {
        self.activity_patterns
            .iter()
            .any(|pattern| pattern.is_match(window_title))
    }

    /// Word-bounded productivity keyword anywhere in the title.
    pub fn has_productivity_keyword(&self, window_title: &str) -> bool {
        self.keyword_pattern.is_match(window_title)
    }

    /// Move `clean_app` into the set matching the user's correction and out
    /// of the opposite one, so exact-membership checks agree with feedback.
    pub fn apply_feedback(&mut self, clean_app: &str, is_productive: bool) {
        if is_productive {
            self.productive_apps.insert(clean_app.to_string());
            self.unproductive_apps.remove(clean_app);
        } else {
            self.unproductive_apps.insert(clean_app.to_string());
            self.productive_apps.remove(clean_app);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_sets_match_both_casings() {
        let rules = RuleTables::new().unwrap();
        assert_eq!(rules.static_label("code.exe", "code.exe"), Some(true));
        assert_eq!(
            rules.static_label("visual studio code", "Visual Studio Code"),
            Some(true)
        );
        assert_eq!(rules.static_label("steam", "Steam"), Some(false));
        assert_eq!(rules.static_label("unknownapp.exe", "unknownapp.exe"), None);
    }

    #[test]
    fn known_corrections_are_raw_cased() {
        let rules = RuleTables::new().unwrap();
        assert_eq!(rules.known_correction("VS Code"), Some(true));
        assert_eq!(rules.known_correction("vs code"), None);
    }

    #[test]
    fn productive_domains_win_over_unproductive() {
        let rules = RuleTables::new().unwrap();
        assert_eq!(rules.domain_label("github.com - pull requests"), Some(true));
        assert_eq!(rules.domain_label("reddit.com - front page"), Some(false));
        assert_eq!(rules.domain_label("weather forecast"), None);
    }

    #[test]
    fn youtube_educational_titles_fall_through() {
        let rules = RuleTables::new().unwrap();
        assert_eq!(rules.domain_label("youtube.com - cat compilation"), Some(false));
        assert_eq!(rules.domain_label("youtube.com - rust tutorial"), None);
    }

    #[test]
    fn activity_patterns_detect_dev_work() {
        let rules = RuleTables::new().unwrap();
        assert!(rules.is_productive_activity("main.py - editor"));
        assert!(rules.is_productive_activity("Pull Request #42"));
        assert!(rules.is_productive_activity("localhost:3000"));
        assert!(!rules.is_productive_activity("holiday photos"));
    }

    #[test]
    fn keywords_require_word_boundaries() {
        let rules = RuleTables::new().unwrap();
        assert!(rules.has_productivity_keyword("Sprint planning for Q3"));
        assert!(rules.has_productivity_keyword("DEBUG output"));
        // "workaround" must not match "work"
        assert!(!rules.has_productivity_keyword("workaround"));
    }

    #[test]
    fn feedback_moves_entries_between_sets() {
        let mut rules = RuleTables::new().unwrap();
        assert_eq!(rules.static_label("steam", "steam"), Some(false));
        rules.apply_feedback("steam", true);
        assert_eq!(rules.static_label("steam", "steam"), Some(true));
        rules.apply_feedback("steam", false);
        assert_eq!(rules.static_label("steam", "steam"), Some(false));
    }
}
