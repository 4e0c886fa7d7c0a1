//! Key-addressed access to individual config fields, for `config set/unset`.

use crate::core::config::data::{path_display, Config};
use crate::core::config::io::ConfigError;
use std::path::PathBuf;

type Setter = fn(&mut Config, Option<&str>) -> Result<(), String>;
type Getter = fn(&Config) -> String;

pub struct Setting {
    pub key: &'static str,
    pub description: &'static str,
    set: Setter,
    get: Getter,
}

pub const SETTINGS: &[Setting] = &[
    Setting {
        key: "render.tick_ms",
        description: "milliseconds between reveal ticks",
        set: |config, value| {
            config.render.tick_ms = value.map(parse_positive).transpose()?;
            Ok(())
        },
        get: |config| format!("{}ms", config.render.tick_interval().as_millis()),
    },
    Setting {
        key: "render.wait_for_reveal",
        description: "finish revealing text after the stream ends",
        set: |config, value| {
            config.render.wait_for_reveal = value.map(parse_bool_value).transpose()?;
            Ok(())
        },
        get: |config| format_bool(config.render.wait_for_reveal()).to_string(),
    },
    Setting {
        key: "openrouter.referer",
        description: "HTTP-Referer sent to OpenRouter",
        set: |config, value| {
            config.openrouter.referer = value.map(str::to_owned);
            Ok(())
        },
        get: |config| config.openrouter.referer().to_string(),
    },
    Setting {
        key: "openrouter.title",
        description: "X-Title sent to OpenRouter",
        set: |config, value| {
            config.openrouter.title = value.map(str::to_owned);
            Ok(())
        },
        get: |config| config.openrouter.title().to_string(),
    },
    Setting {
        key: "http.connect_timeout_secs",
        description: "connect timeout for provider requests",
        set: |config, value| {
            config.http.connect_timeout_secs = value.map(parse_positive).transpose()?;
            Ok(())
        },
        get: |config| match config.http.connect_timeout_secs {
            Some(secs) => format!("{secs}s"),
            None => "(none)".to_string(),
        },
    },
    Setting {
        key: "data_dir",
        description: "where chat history is stored",
        set: |config, value| {
            config.data_dir = value.map(PathBuf::from);
            Ok(())
        },
        get: |config| path_display(config.chats_dir()),
    },
];

/// Accepts: on/off, true/false, yes/no (case-insensitive).
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn parse_bool_value(input: &str) -> Result<bool, String> {
    parse_bool(input).ok_or_else(|| "expected on/off".to_string())
}

fn parse_positive(input: &str) -> Result<u64, String> {
    match input.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err("expected a positive integer".to_string()),
        Ok(value) => Ok(value),
    }
}

/// Finds a setting by key; dashes are accepted in place of underscores.
pub fn find_setting(key: &str) -> Option<&'static Setting> {
    let normalized = key.trim().to_lowercase().replace('-', "_");
    SETTINGS.iter().find(|s| s.key == normalized)
}

impl Setting {
    pub fn current(&self, config: &Config) -> String {
        (self.get)(config)
    }
}

impl Config {
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let setting = find_setting(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        (setting.set)(self, Some(value.trim())).map_err(|reason| ConfigError::InvalidValue {
            key: setting.key.to_string(),
            value: value.to_string(),
            reason,
        })
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        let setting = find_setting(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        (setting.set)(self, None).map_err(|reason| ConfigError::InvalidValue {
            key: setting.key.to_string(),
            value: String::new(),
            reason,
        })
    }
}
