use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::loader::Sources;
use crate::store::{insert_entry, Config, Layer};

pub type ReloadCallback = Box<dyn FnMut(&Config)>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileFingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

/// Polling state. Nothing runs in the background; callers drive
/// `Config::check_and_reload` from their own loop.
pub struct HotReload {
    watched: Vec<(PathBuf, Option<FileFingerprint>)>,
    callback: Option<ReloadCallback>,
}

impl fmt::Debug for HotReload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotReload")
            .field("watched", &self.watched)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl HotReload {
    fn changed(&self) -> bool {
        self.watched
            .iter()
            .any(|(path, previous)| fingerprint(path) != *previous)
    }
}

impl Config {
    /// Starts tracking every file source of the previous loads. Files that
    /// do not exist yet are tracked too; their appearance counts as a change.
    pub fn enable_hot_reload(&mut self, callback: Option<ReloadCallback>) {
        let watched = snapshot(&self.sources);
        tracing::debug!(files = watched.len(), "hot reload enabled");
        self.hot_reload = Some(HotReload { watched, callback });
    }

    pub fn disable_hot_reload(&mut self) {
        self.hot_reload = None;
    }

    pub fn hot_reload_enabled(&self) -> bool {
        self.hot_reload.is_some()
    }

    /// Reloads when a watched file changed since the last check. Returns
    /// whether a reload happened; always `false` while hot reload is off.
    pub fn check_and_reload(&mut self) -> Result<bool> {
        let changed = self
            .hot_reload
            .as_ref()
            .is_some_and(HotReload::changed);
        if !changed {
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    /// Rebuilds the data layer from the recorded sources. The new layer is
    /// swapped in only after every source loaded; on error the previous
    /// data stays in place. Defaults are never touched.
    pub fn reload(&mut self) -> Result<()> {
        let watched = snapshot(&self.sources);
        let entries = self.sources.collect().inspect_err(|err| {
            tracing::warn!(%err, "reload failed; keeping previous configuration");
        })?;

        let mut data = Layer::new();
        for (path, value) in entries {
            insert_entry(&mut data, path, value);
        }
        self.data = data;
        tracing::info!(keys = self.data.len(), "configuration reloaded");

        let callback = self.hot_reload.as_mut().and_then(|state| {
            state.watched = watched;
            state.callback.take()
        });
        if let Some(mut callback) = callback {
            callback(self);
            if let Some(state) = self.hot_reload.as_mut() {
                state.callback = Some(callback);
            }
        }
        Ok(())
    }
}

fn snapshot(sources: &Sources) -> Vec<(PathBuf, Option<FileFingerprint>)> {
    sources
        .files
        .iter()
        .map(|source| (source.path.clone(), fingerprint(&source.path)))
        .collect()
}

fn fingerprint(path: &Path) -> Option<FileFingerprint> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(FileFingerprint {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs::File;
    use std::rc::Rc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;
    use crate::loader::{EnvSource, FileSource};

    fn rewrite(path: &Path, content: &str, bump_secs: u64) {
        std::fs::write(path, content).expect("write");
        let file = File::options().write(true).open(path).expect("open");
        file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
            .expect("set mtime");
    }

    #[test]
    fn reload_swaps_data_and_keeps_defaults() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, r#"{"v":1}"#).expect("write");

        let mut config =
            Config::from_sources(&Sources::new().file(FileSource::required(&path))).expect("load");
        config.set_default("d", "k").expect("default");

        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        config.enable_hot_reload(Some(Box::new(move |config: &Config| {
            assert_eq!(config.get_int("v").expect("v"), 2);
            seen.set(seen.get() + 1);
        })));

        assert!(!config.check_and_reload().expect("no change"));

        rewrite(&path, r#"{"v":2}"#, 5);
        assert!(config.check_and_reload().expect("reload"));
        assert_eq!(config.get_int("v").expect("v"), 2);
        assert_eq!(config.get_string("d").expect("d"), "k");
        assert_eq!(calls.get(), 1);

        assert!(!config.check_and_reload().expect("settled"));
    }

    #[test]
    fn failed_reload_keeps_previous_data() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, r#"{"v":1}"#).expect("write");

        let mut config =
            Config::from_sources(&Sources::new().file(FileSource::required(&path))).expect("load");
        config.enable_hot_reload(None);

        rewrite(&path, "{broken", 5);
        let error = config.check_and_reload().expect_err("parse failure");
        assert!(matches!(error, Error::Parse(_)));
        assert_eq!(config.get_int("v").expect("v"), 1);
    }

    #[test]
    fn appearing_optional_file_triggers_reload() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("late.toml");

        let mut config =
            Config::from_sources(&Sources::new().file(FileSource::optional(&path))).expect("load");
        config.enable_hot_reload(None);
        assert!(config.get("late").is_none());

        std::fs::write(&path, "late = true\n").expect("write");
        assert!(config.check_and_reload().expect("reload"));
        assert!(config.get_bool("late").expect("late"));
    }

    #[test]
    fn reload_reapplies_env_and_args_and_drops_manual_sets() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, r#"{"x": 1, "y": 1}"#).expect("write");

        let sources = Sources::new()
            .file(FileSource::required(&path))
            .env(EnvSource::new("APP").with_vars([("APP_X", "2")]))
            .args(["--y=3"]);
        let mut config = Config::from_sources(&sources).expect("load");
        config.set("manual", true).expect("set");

        config.reload().expect("reload");
        assert_eq!(config.get_int("x").expect("x"), 2);
        assert_eq!(config.get_int("y").expect("y"), 3);
        assert!(config.get("manual").is_none());
    }

    #[test]
    fn check_without_enabling_is_a_no_op() {
        let mut config = Config::new();
        assert!(!config.hot_reload_enabled());
        assert!(!config.check_and_reload().expect("disabled"));
    }
}
