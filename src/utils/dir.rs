use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

use crate::export::range::DateRange;

const STORE_FILE_NAME: &str = "resolutions.json";
const HEATMAP_FILE_NAME: &str = "heatmap.svg";
const MINIMAPS_FILE_NAME: &str = "minimaps.svg";

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path = env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))?;
            path.push("resolve");
            path
        }
        #[cfg(not(windows))]
        {
            let mut path = env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/share");
                        path
                    })
                })
                .map_err(|_| anyhow!("Couldn't find neither XDG_DATA_HOME nor HOME"))?;
            path.push("resolve");
            path
        }
    };

    create_dir(&path)?;
    Ok(path)
}

fn create_dir(path: &Path) -> Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(_) => Ok(()),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(v) => Err(v.into()),
    }
}

/// Layout of everything resolve keeps on disk. Every artifact is addressed by a path derived from
/// the root directory, there is no index of exports or renders.
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Creates the root and the export directories if they are missing.
    pub fn ensure_layout(&self) -> Result<()> {
        create_dir(&self.root)?;
        create_dir(&self.exports_dir())?;
        create_dir(&self.cleaned_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> PathBuf {
        self.root.join(STORE_FILE_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.root.join("cleaned")
    }

    pub fn export_csv(&self, range: &DateRange) -> PathBuf {
        self.exports_dir().join(range.file_name())
    }

    pub fn cleaned_csv(&self, range: &DateRange) -> PathBuf {
        self.cleaned_dir().join(range.file_name())
    }

    /// Notable days are looked up by name, `holidays` resolves to `<root>/holidays.json`.
    pub fn notable_days(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    pub fn heatmap(&self) -> PathBuf {
        self.exports_dir().join(HEATMAP_FILE_NAME)
    }

    pub fn minimaps(&self) -> PathBuf {
        self.exports_dir().join(MINIMAPS_FILE_NAME)
    }
}
