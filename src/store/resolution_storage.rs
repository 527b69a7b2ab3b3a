use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, bail, Context, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, info, instrument, warn};

use super::entities::{LogValue, ResolutionStore};

/// Interface for abstracting storage of resolutions. Both operations work on the whole store,
/// there are no partial updates.
pub trait ResolutionStorage {
    /// Reads every resolution. A store that doesn't exist yet is empty.
    fn load(&self) -> impl Future<Output = Result<ResolutionStore>>;

    /// Replaces the persisted store with `store`.
    fn save(&self, store: &ResolutionStore) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> ResolutionStorage for T
where
    T::Target: ResolutionStorage,
{
    fn load(&self) -> impl Future<Output = Result<ResolutionStore>> {
        self.deref().load()
    }

    fn save(&self, store: &ResolutionStore) -> impl Future<Output = Result<()>> {
        self.deref().save(store)
    }
}

/// The main realization of [ResolutionStorage]. Keeps the store as one pretty printed json
/// document.
pub struct JsonResolutionStorage {
    path: PathBuf,
}

impl JsonResolutionStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_contents(path: &Path) -> std::result::Result<String, std::io::Error> {
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut contents = String::new();
        let result = file.read_to_string(&mut contents).await;
        file.unlock_async().await?;
        result.map(|_| contents)
    }
}

impl ResolutionStorage for JsonResolutionStorage {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load(&self) -> Result<ResolutionStore> {
        let contents = match Self::read_contents(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No store found, starting with an empty one");
                return Ok(ResolutionStore::new());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        };

        if contents.trim().is_empty() {
            return Ok(ResolutionStore::new());
        }

        let store: ResolutionStore = serde_json::from_str(&contents)
            .with_context(|| format!("Store {:?} is malformed", self.path))?;
        validate_store(&store)?;
        debug!("Loaded {} resolutions", store.len());
        Ok(store)
    }

    #[instrument(skip(self, store), fields(path = ?self.path))]
    async fn save(&self, store: &ResolutionStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let buffer = serde_json::to_vec_pretty(store)?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Truncating only after the lock is taken, a reader holding a shared lock keeps seeing the
        // previous version.
        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.write_all(&buffer).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result.with_context(|| format!("Failed to write {:?}", self.path))?;

        debug!("Saved {} resolutions", store.len());
        Ok(())
    }
}

/// In memory [ResolutionStorage]. Lets the tracker run without touching the disk.
#[derive(Default)]
pub struct MemoryResolutionStorage {
    store: Mutex<ResolutionStore>,
}

impl MemoryResolutionStorage {
    pub fn new(store: ResolutionStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn snapshot(&self) -> Result<ResolutionStore> {
        self.store
            .lock()
            .map(|v| v.clone())
            .map_err(|_| anyhow!("Store lock was poisoned"))
    }
}

impl ResolutionStorage for MemoryResolutionStorage {
    async fn load(&self) -> Result<ResolutionStore> {
        self.snapshot()
    }

    async fn save(&self, store: &ResolutionStore) -> Result<()> {
        let mut current = self
            .store
            .lock()
            .map_err(|_| anyhow!("Store lock was poisoned"))?;
        *current = store.clone();
        Ok(())
    }
}

/// Catches data that would break export later on. Binary resolutions can't hold codes, while
/// codes without a description are only reported.
pub fn validate_store(store: &ResolutionStore) -> Result<()> {
    for (id, resolution) in store.iter() {
        if resolution.is_binary {
            if let Some((date, _)) = resolution
                .data
                .iter()
                .find(|(_, v)| matches!(v, LogValue::Codes(_)))
            {
                bail!("Binary resolution `{id}` holds detail codes on {date}");
            }
        } else {
            let missing = resolution.undefined_codes();
            if !missing.is_empty() {
                warn!("Resolution `{id}` uses codes without a description: {missing:?}");
            }
        }
    }
    Ok(())
}
