use crate::core::config::data::{path_display, Config};
use crate::core::config::settings::SETTINGS;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration ({}):", path_display(Config::get_config_path()));
        let width = SETTINGS.iter().map(|s| s.key.len()).max().unwrap_or(0);
        for setting in SETTINGS {
            println!(
                "  {:width$}  {}",
                setting.key,
                setting.current(self),
                width = width
            );
        }
    }
}
