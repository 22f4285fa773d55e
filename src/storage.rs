use anyhow::{Context, Result};
use directories::BaseDirs;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const CATALOG_KEY: &str = "catalog";
pub const HISTORY_KEY: &str = "history";
pub const CONFIG_KEY: &str = "config";

pub trait KvStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, blob: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).context("create data dir")?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(&base_data_dir()?)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {key}.json"))?;
        Ok(Some(raw))
    }

    fn save(&self, key: &str, blob: &str) -> Result<()> {
        fs::write(self.path_for(key), blob).with_context(|| format!("write {key}.json"))?;
        Ok(())
    }
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("galpost"))
}

#[cfg(test)]
pub use memory::MemoryStore;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_returns_none_for_missing_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        assert!(store.load(HISTORY_KEY).expect("load").is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        store.save(CATALOG_KEY, "{\"platform\":[]}").expect("save");

        let reopened = FileStore::open(temp.path()).expect("reopen");
        assert_eq!(
            reopened.load(CATALOG_KEY).expect("load").as_deref(),
            Some("{\"platform\":[]}")
        );
        assert!(temp.path().join("catalog.json").exists());
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.save(CONFIG_KEY, "a").expect("save");
        store.save(CONFIG_KEY, "b").expect("save");
        assert_eq!(store.load(CONFIG_KEY).expect("load").as_deref(), Some("b"));
    }
}
