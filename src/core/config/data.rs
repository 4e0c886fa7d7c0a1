use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TICK_MS: u64 = 16;
pub const DEFAULT_OPENROUTER_REFERER: &str = "https://supercharge.local/";
pub const DEFAULT_OPENROUTER_TITLE: &str = "Supercharge";

/// How streamed text is paced onto the screen.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Milliseconds between reveal ticks.
    pub tick_ms: Option<u64>,
    /// Keep revealing after the network stream ends until the text catches up.
    pub wait_for_reveal: Option<bool>,
}

/// Attribution headers OpenRouter asks calling apps to send.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct OpenRouterSettings {
    pub referer: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub openrouter: OpenRouterSettings,
    #[serde(default)]
    pub http: HttpSettings,
    /// Where chat history is stored. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl RenderSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.unwrap_or(DEFAULT_TICK_MS).max(1))
    }

    pub fn wait_for_reveal(&self) -> bool {
        self.wait_for_reveal.unwrap_or(true)
    }
}

impl OpenRouterSettings {
    pub fn referer(&self) -> &str {
        self.referer.as_deref().unwrap_or(DEFAULT_OPENROUTER_REFERER)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_OPENROUTER_TITLE)
    }
}

impl HttpSettings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
