use super::document::StrategyDocument;
use super::standard::{standard_strategy, STANDARD_KEY};
use super::{Strategy, StrategyLoadError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Resolves strategy references (`"standard"`, a key under the strategy
/// directory, or an explicit path) and caches what it has loaded.
pub struct StrategyCatalog {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Strategy>>>,
}

impl StrategyCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn standard() -> Strategy {
        standard_strategy()
    }

    pub fn load(&self, reference: &str) -> Result<Arc<Strategy>, StrategyLoadError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(StrategyLoadError::UnknownKey(reference.to_string()));
        }

        if let Some(cached) = self
            .cache
            .lock()
            .expect("strategy cache mutex poisoned")
            .get(reference)
        {
            debug!(strategy = reference, "strategy served from cache");
            return Ok(cached.clone());
        }

        let strategy = if reference == STANDARD_KEY {
            standard_strategy()
        } else {
            let path = self.resolve_path(reference)?;
            let fallback_key = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(reference)
                .to_string();
            Self::load_path(&path, &fallback_key)?
        };

        info!(
            strategy = %strategy.key,
            version = %strategy.version,
            "strategy loaded"
        );

        let strategy = Arc::new(strategy);
        self.cache
            .lock()
            .expect("strategy cache mutex poisoned")
            .insert(reference.to_string(), strategy.clone());
        Ok(strategy)
    }

    /// Like [`StrategyCatalog::load`], but only bare keys are accepted. Used for
    /// references that arrive from untrusted input.
    pub fn load_key(&self, key: &str) -> Result<Arc<Strategy>, StrategyLoadError> {
        if looks_like_path(key.trim()) {
            return Err(StrategyLoadError::UnknownKey(key.to_string()));
        }
        self.load(key)
    }

    /// Read and validate a strategy document from disk without caching it.
    pub fn load_path(path: &Path, fallback_key: &str) -> Result<Strategy, StrategyLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| StrategyLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        StrategyDocument::from_json(&raw)?.validate(fallback_key)
    }

    /// Keys that [`StrategyCatalog::load`] can resolve without an explicit path.
    pub fn available(&self) -> Vec<String> {
        let mut keys = vec![STANDARD_KEY.to_string()];
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            let mut discovered: Vec<String> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .filter_map(|path| {
                    path.file_stem()
                        .and_then(|stem| stem.to_str())
                        .map(str::to_string)
                })
                .filter(|key| key != STANDARD_KEY)
                .collect();
            discovered.sort();
            keys.extend(discovered);
        }
        keys
    }

    fn resolve_path(&self, reference: &str) -> Result<PathBuf, StrategyLoadError> {
        let path = if looks_like_path(reference) {
            PathBuf::from(reference)
        } else {
            self.dir.join(format!("{reference}.json"))
        };

        if path.is_file() {
            Ok(path)
        } else {
            Err(StrategyLoadError::UnknownKey(reference.to_string()))
        }
    }
}

fn looks_like_path(reference: &str) -> bool {
    reference.contains('/') || reference.contains('\\') || reference.ends_with(".json")
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::new("strategies")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "trait-affinity-catalog-{name}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    const MINIMAL: &str = r#"{
        "ratingOptions": [{"label": "No", "value": 1}, {"label": "Yes", "value": 3}],
        "scoringParameters": {
            "minReliableCount": 1,
            "genderAdjustmentFactor": 1.0,
            "lowSamplePenalty": {"tiers": []},
            "variancePenalty": {"threshold": 1.0, "maxEffectThreshold": 2.0, "maxPenaltyRatio": 0.5},
            "consistencyBonus": {"meanThreshold": 0.5, "lowVarianceThreshold": 0.5, "bonusFactor": 1.0}
        }
    }"#;

    #[test]
    fn standard_key_needs_no_files() {
        let catalog = StrategyCatalog::new("/definitely/not/here");
        let strategy = catalog.load("standard").expect("built-in strategy");
        assert_eq!(strategy.key, "standard");
        assert_eq!(catalog.available(), vec!["standard".to_string()]);
    }

    #[test]
    fn loads_keys_from_directory_and_caches_them() {
        let dir = scratch_dir("keys");
        fs::write(dir.join("binary.json"), MINIMAL).expect("write strategy");
        let catalog = StrategyCatalog::new(&dir);

        let first = catalog.load("binary").expect("loads from dir");
        let second = catalog.load("binary").expect("served from cache");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.key, "binary");
        assert_eq!(first.midpoint(), 2);
        assert!(catalog.available().contains(&"binary".to_string()));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn unknown_keys_are_reported() {
        let catalog = StrategyCatalog::new(scratch_dir("unknown"));
        match catalog.load("missing") {
            Err(StrategyLoadError::UnknownKey(key)) => assert_eq!(key, "missing"),
            other => panic!("expected unknown key, got {other:?}"),
        }
    }

    #[test]
    fn explicit_paths_bypass_the_directory() {
        let dir = scratch_dir("paths");
        let path = dir.join("custom.json");
        fs::write(&path, MINIMAL).expect("write strategy");

        let catalog = StrategyCatalog::new("/elsewhere");
        let strategy = catalog
            .load(path.to_str().expect("utf-8 path"))
            .expect("loads explicit path");
        assert_eq!(strategy.key, "custom");
        assert!(matches!(
            catalog.load_key(path.to_str().expect("utf-8 path")),
            Err(StrategyLoadError::UnknownKey(_))
        ));

        fs::remove_dir_all(dir).ok();
    }
}
