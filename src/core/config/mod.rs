pub mod data;
pub mod io;
pub mod orchestrator;
pub mod printing;
pub mod settings;


pub use data::{path_display, Config, HttpSettings, OpenRouterSettings, RenderSettings};
pub use io::{config_dir, write_atomically, ConfigError};
