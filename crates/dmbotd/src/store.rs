//! In-memory configuration store backed by a pluggable persistence layer.
//!
//! The store is owned by the router and only mutated while a command holds
//! the router lock. Every mutation builds a new [`BotConfig`], persists it,
//! and only then swaps it in, so a failed write leaves memory untouched.
//! Backend calls made while serving commands run on the blocking pool.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;

use crate::config::SETTINGS_FILE_NAME;
use crate::settings::{BotConfig, NotReady, Section};

/// Errors raised by a [`ConfigBackend`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or removing persisted data failed.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The persisted settings could not be encoded or decoded.
    #[error("{}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// The blocking task running the backend call panicked.
    #[error("settings task failed: {0}")]
    Task(#[from] JoinError),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable storage for the bot configuration.
pub trait ConfigBackend: Send + Sync {
    /// Read the persisted configuration, or defaults when none exists.
    fn load(&self) -> Result<BotConfig, StoreError>;
    /// Persist `config`, replacing what was stored before.
    fn save(&self, config: &BotConfig) -> Result<(), StoreError>;
    /// Remove everything this backend has written.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Stores the configuration as YAML in a data directory.
#[derive(Debug, Clone)]
pub struct YamlFileBackend {
    dir: PathBuf,
}

impl YamlFileBackend {
    /// Create a backend rooted at `dir`. Nothing is touched until first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the settings file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }
}

impl ConfigBackend for YamlFileBackend {
    fn load(&self) -> Result<BotConfig, StoreError> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BotConfig::default()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_yaml::from_str(&text).map_err(|source| StoreError::Yaml { path, source })
    }

    fn save(&self, config: &BotConfig) -> Result<(), StoreError> {
        let path = self.path();
        let text = serde_yaml::to_string(config).map_err(|source| StoreError::Yaml {
            path: path.clone(),
            source,
        })?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        // Write then rename so readers never observe a half-written file.
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.dir, e)),
        }
    }
}

/// The daemon's current configuration and its persistence collaborator.
pub struct ConfigStore {
    backend: Arc<dyn ConfigBackend>,
    current: Arc<BotConfig>,
}

impl ConfigStore {
    /// Open the store, loading whatever the backend has persisted.
    ///
    /// Called once at startup, before any command is served.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the persisted data cannot be read.
    pub fn open(backend: Arc<dyn ConfigBackend>) -> Result<Self, StoreError> {
        let current = Arc::new(backend.load()?);
        Ok(Self { backend, current })
    }

    /// Replace memory with the persisted configuration.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; memory is unchanged in that case.
    pub async fn reload(&mut self) -> Result<(), StoreError> {
        let loaded = self.on_backend(|backend| backend.load()).await?;
        self.current = Arc::new(loaded);
        Ok(())
    }

    /// Restore built-in defaults and persist them.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; memory is unchanged in that case.
    pub async fn reset(&mut self) -> Result<(), StoreError> {
        self.commit(BotConfig::default()).await
    }

    /// Replace exactly one section and persist the result.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; memory is unchanged in that case.
    pub async fn replace_section(&mut self, section: Section) -> Result<(), StoreError> {
        let mut next = BotConfig::clone(&self.current);
        next.replace(section);
        self.commit(next).await
    }

    /// Remove all persisted data, then fall back to defaults in memory.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; memory keeps the previous configuration.
    pub async fn clear_persisted_data(&mut self) -> Result<(), StoreError> {
        self.on_backend(|backend| backend.clear()).await?;
        self.current = Arc::new(BotConfig::default());
        Ok(())
    }

    /// See [`BotConfig::readiness`].
    ///
    /// # Errors
    ///
    /// Returns the first missing piece of configuration.
    pub fn readiness(&self) -> Result<(), NotReady> {
        self.current.readiness()
    }

    /// `true` when the configuration can launch the bot.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current.is_ready()
    }

    /// Immutable snapshot handed to the bot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BotConfig> {
        Arc::clone(&self.current)
    }

    async fn commit(&mut self, next: BotConfig) -> Result<(), StoreError> {
        let next = Arc::new(next);
        let written = Arc::clone(&next);
        self.on_backend(move |backend| backend.save(&written)).await?;
        self.current = next;
        Ok(())
    }

    /// Run `f` against the backend on the blocking pool.
    async fn on_backend<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ConfigBackend) -> Result<T, StoreError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || f(backend.as_ref())).await?
    }
}
