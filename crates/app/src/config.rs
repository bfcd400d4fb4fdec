use jukebox_core::JukeboxConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub jukebox: JukeboxConfig,
    /// Length of `jukebox render` output when `--seconds` is not given.
    #[serde(default = "default_render_secs")]
    pub render_secs: f64,
}

fn default_render_secs() -> f64 {
    180.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jukebox: JukeboxConfig::default(),
            render_secs: default_render_secs(),
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("infinite-jukebox").join("config.toml"))
    }

    /// Load from `path`, or from the user config directory. A missing file
    /// means defaults; a broken one is reported and ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::config_path) else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!("loaded config from {}", path.display());
                    config
                }
                Err(err) => {
                    warn!("ignoring {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nested_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "render_secs = 30.0\n\n[jukebox]\njump_probability = 0.8\nclosure_window = 4\n",
        )
        .unwrap();

        let config = Config::load(Some(&path));

        assert_eq!(config.render_secs, 30.0);
        assert_eq!(config.jukebox.jump_probability, 0.8);
        assert_eq!(config.jukebox.closure_window, 4);
        assert_eq!(config.jukebox.min_jump_separation, 16);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/jukebox.toml")));
        assert_eq!(config.render_secs, 180.0);
        assert_eq!(config.jukebox, JukeboxConfig::default());
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[jukebox\njump_probability = ").unwrap();

        let config = Config::load(Some(&path));
        assert_eq!(config.jukebox, JukeboxConfig::default());
    }
}
