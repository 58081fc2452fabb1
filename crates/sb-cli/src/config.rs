//! Run configuration: game paths and output settings

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sb_engine::DEFAULT_PROGRESS_EVERY;
use sb_output::DEFAULT_COMPRESSION_LEVEL;

/// Default root holding one directory per game
pub const DEFAULT_GAMES_PATH: &str = "games";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Contents of the optional JSON config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Root holding one directory per game
    pub path_to_games: String,

    /// Replaces `<game>/library` as the output root
    pub output_dir: Option<String>,

    /// zstd level (1-22)
    pub compression_level: i32,

    /// Log batch progress every N batches per thread
    pub progress_every: usize,

    /// Seed for the demo kernel
    pub seed: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            path_to_games: DEFAULT_GAMES_PATH.to_string(),
            output_dir: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            progress_every: DEFAULT_PROGRESS_EVERY,
            seed: 0,
        }
    }
}

impl ConfigFile {
    /// Read a config file
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved configuration of one run
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub game_id: String,
    pub mode: String,
    /// `<path_to_games>/<game>`
    pub game_dir: PathBuf,
    /// Reel strips of the game
    pub reels_dir: PathBuf,
    /// Batch files, one subdirectory per mode
    pub books_dir: PathBuf,
    /// Merged books and manifests
    pub publish_dir: PathBuf,
    pub compression_level: i32,
    pub progress_every: usize,
    pub seed: u64,
}

impl SimConfig {
    /// Resolve paths for a game and mode, reading `config_path` if given
    pub fn load(
        game_id: &str,
        mode: &str,
        config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };
        Self::from_file(game_id, mode, file)
    }

    /// Resolve paths from already-parsed settings
    pub fn from_file(game_id: &str, mode: &str, file: ConfigFile) -> Result<Self, ConfigError> {
        if !(1..=22).contains(&file.compression_level) {
            return Err(ConfigError::Invalid(format!(
                "compression_level must be 1-22, got {}",
                file.compression_level
            )));
        }
        if file.progress_every == 0 {
            return Err(ConfigError::Invalid("progress_every must be at least 1".into()));
        }

        let games = if file.path_to_games.is_empty() {
            DEFAULT_GAMES_PATH
        } else {
            file.path_to_games.as_str()
        };
        let game_dir = Path::new(games).join(game_id);
        let library = match &file.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => game_dir.join("library"),
        };

        Ok(Self {
            game_id: game_id.to_string(),
            mode: mode.to_string(),
            reels_dir: game_dir.join("reels"),
            books_dir: library.join("books"),
            publish_dir: library.join("publish_files"),
            game_dir,
            compression_level: file.compression_level,
            progress_every: file.progress_every,
            seed: file.seed,
        })
    }

    /// Create the books and publish directories
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.books_dir, &self.publish_dir] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
