use notify::{Event, EventKind, RecursiveMode, Watcher, event::ModifyKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::pattern::NamePattern;
use crate::sorting::SortSpec;

const DEFAULT_LOCALE: &str = "en";
const CONFIG_DIR_NAME: &str = "fsnav";
const CONFIG_FILE_NAME: &str = "fsnav.json";

// Resolved once so concurrent tests do not race on the home directory lookup
static CONFIG_DIR: LazyLock<Option<PathBuf>> = LazyLock::new(dirs::config_dir);

fn get_config_dir() -> Result<PathBuf, Box<dyn Error>> {
    match CONFIG_DIR.as_ref() {
        Some(dir) => Ok(dir.clone()),
        None => Err("Could not determine config directory".into()),
    }
}

/// Defaults applied to every listing the CLI opens.
#[derive(Serialize, Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ListingConfig {
    pub sort: SortSpec,
    pub show_hidden: bool,
    /// Glob applied to entry names; empty matches everything.
    pub pattern: String,
}

impl ListingConfig {
    pub fn name_pattern(&self) -> NamePattern {
        NamePattern::new(&self.pattern)
    }
}

#[derive(Serialize, Debug, Clone, Deserialize, PartialEq)]
pub struct FsnavConfig {
    #[serde(default)]
    pub listing: ListingConfig,
    pub locale: Option<String>,
}

impl Default for FsnavConfig {
    fn default() -> Self {
        Self {
            listing: ListingConfig::default(),
            locale: Some(DEFAULT_LOCALE.to_string()),
        }
    }
}

impl FsnavConfig {
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Reads the config at `config_path`, replacing a missing or unreadable
    /// file with the defaults.
    pub fn load_from(config_path: &Path) -> Result<Self, Box<dyn Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            match serde_json::from_str::<FsnavConfig>(&contents) {
                Ok(config) => {
                    log::debug!("Loaded config from: {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => log::warn!("Ignoring invalid config {:?}: {}", config_path, e),
            }
        }

        Self::create_default_config(config_path)
    }

    fn create_default_config(config_path: &Path) -> Result<Self, Box<dyn Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let default_config = Self::default();
        Self::save_config(config_path, &default_config)?;
        log::info!("Created default config file: {:?}", config_path);

        Ok(default_config)
    }

    pub fn save_config(config_path: &Path, config: &FsnavConfig) -> Result<(), Box<dyn Error>> {
        let json_content = serde_json::to_string_pretty(config)?;
        fs::write(config_path, json_content)?;
        Ok(())
    }

    pub fn get_locale(&self) -> String {
        self.locale
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
    }

    pub fn get_config_path() -> Result<PathBuf, Box<dyn Error>> {
        let config_dir = get_config_dir()?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn try_reload_from_file(config_path: &Path) -> Result<FsnavConfig, Box<dyn Error>> {
        if !config_path.exists() {
            return Err("Config file does not exist".into());
        }

        let contents = fs::read_to_string(config_path)?;

        // Plain JSON errors first, so syntax problems are reported as such
        let _json_value: serde_json::Value = serde_json::from_str(&contents)?;

        let config = serde_json::from_str::<FsnavConfig>(&contents)?;
        Ok(config)
    }

    pub fn start_config_watcher()
    -> Result<mpsc::Receiver<Result<FsnavConfig, String>>, Box<dyn Error>> {
        let config_path = Self::get_config_path()?;
        Self::watch_config(config_path)
    }

    /// Streams a freshly parsed config every time the file at `config_path`
    /// is written.
    pub fn watch_config(
        config_path: PathBuf,
    ) -> Result<mpsc::Receiver<Result<FsnavConfig, String>>, Box<dyn Error>> {
        let (tx, rx) = mpsc::channel();
        let config_path_clone = config_path.clone();
        let tx_clone = tx.clone();

        thread::spawn(move || {
            let mut watcher =
                match notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
                    match res {
                        Ok(event) => {
                            let relevant = matches!(
                                event.kind,
                                EventKind::Modify(ModifyKind::Data(_)) | EventKind::Create(_)
                            ) && event.paths.iter().any(|p| p == &config_path_clone);
                            if !relevant {
                                return;
                            }

                            // Give the writer time to finish
                            thread::sleep(Duration::from_millis(100));

                            let message = FsnavConfig::try_reload_from_file(&config_path_clone)
                                .map_err(|e| format!("Failed to reload config: {}", e));
                            if tx_clone.send(message).is_err() {
                                // Channel closed, exit watcher
                            }
                        }
                        Err(e) => {
                            if tx_clone.send(Err(format!("Watch error: {}", e))).is_err() {
                                // Channel closed, exit watcher
                            }
                        }
                    }
                }) {
                    Ok(watcher) => watcher,
                    Err(e) => {
                        let _ = tx.send(Err(format!("Failed to create watcher: {}", e)));
                        return;
                    }
                };

            // Watch the directory, editors often replace the file instead of writing it
            if let Some(config_dir) = config_path.parent()
                && let Err(e) = watcher.watch(config_dir, RecursiveMode::NonRecursive)
            {
                let _ = tx.send(Err(format!("Failed to watch config directory: {}", e)));
                return;
            }

            // Keep the watcher alive
            loop {
                thread::sleep(Duration::from_secs(1));
            }
        });

        Ok(rx)
    }
}
