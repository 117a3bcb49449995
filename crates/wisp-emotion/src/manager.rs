// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Hot-reload config chain manager (spec §4.7 "Hot-reload manager", §9
//! "Hot-reload via mtime"). Per character, composes `base.yaml → plugin
//! overlay globs → <character>.yaml` and caches the resulting pipeline,
//! invalidating it when any contributing file's mtime changes or the set
//! of contributing files changes — checked lazily on each
//! [`EmotionConfigManager::get_pipeline`] call, no background watcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tracing::debug;
use wisp_config::EmotionFilesConfig;

use crate::config::EmotionConfig;
use crate::pipeline::EmotionPipeline;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("reading emotion config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parsing emotion config {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

/// One contributing file and the mtime it had when last loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Source {
    path: PathBuf,
    mtime: Option<SystemTime>,
}

struct CacheEntry {
    pipeline: Arc<EmotionPipeline>,
    sources: Vec<Source>,
}

/// Loads and caches one [`EmotionPipeline`] per character, rebuilding only
/// when the character's config chain actually changed on disk.
pub struct EmotionConfigManager {
    data_dir: PathBuf,
    files: EmotionFilesConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl EmotionConfigManager {
    pub fn new(data_dir: impl Into<PathBuf>, files: EmotionFilesConfig) -> Self {
        Self { data_dir: data_dir.into(), files, cache: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached pipeline for `character`, rebuilding it first if
    /// any contributing file is new, removed, or modified since the last
    /// build (spec §8 "Hot-reload invalidation").
    pub fn get_pipeline(&self, character: &str) -> Result<Arc<EmotionPipeline>, ManagerError> {
        let current_sources = self.resolve_sources(character);

        let mut cache = self.cache.lock().expect("emotion config cache poisoned");
        if let Some(entry) = cache.get(character) {
            if entry.sources == current_sources {
                return Ok(entry.pipeline.clone());
            }
            debug!(character, "emotion config chain changed, rebuilding pipeline");
        }

        let config = self.load_chain(character, &current_sources)?;
        let pipeline = Arc::new(EmotionPipeline::from_config(&config));
        cache.insert(character.to_string(), CacheEntry { pipeline: pipeline.clone(), sources: current_sources });
        Ok(pipeline)
    }

    /// The base config path, every `stars/*/emotion.yaml`-style overlay
    /// that currently exists, and the character overlay path — in overlay
    /// order, whether or not each file actually exists on disk (a missing
    /// file still counts as a "source" whose absence flips the cache when
    /// it's later created).
    fn resolve_sources(&self, character: &str) -> Vec<Source> {
        let mut paths = vec![self.data_dir.join(&self.files.base_config_path)];
        paths.extend(self.resolve_plugin_globs());
        paths.push(self.data_dir.join(&self.files.characters_dir).join(format!("{character}.yaml")));

        paths
            .into_iter()
            .map(|path| {
                let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
                Source { path, mtime }
            })
            .collect()
    }

    /// Resolves `plugin_config_glob` (e.g. `stars/*/emotion.yaml`) against
    /// the data directory. Only a single `*` wildcard occupying one whole
    /// path segment is supported — sufficient for the one shape the
    /// pattern takes (spec §4.7 doesn't require a general glob engine).
    fn resolve_plugin_globs(&self) -> Vec<PathBuf> {
        let pattern = Path::new(&self.files.plugin_config_glob);
        let mut matches = vec![self.data_dir.clone()];

        for component in pattern.components() {
            let seg = component.as_os_str().to_string_lossy();
            let mut next = Vec::new();
            if seg == "*" {
                for base in &matches {
                    let Ok(entries) = std::fs::read_dir(base) else { continue };
                    let mut dirs: Vec<PathBuf> = entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.path())
                        .filter(|p| p.is_dir())
                        .collect();
                    dirs.sort();
                    next.extend(dirs);
                }
            } else {
                for base in &matches {
                    next.push(base.join(seg.as_ref()));
                }
            }
            matches = next;
        }

        matches.retain(|p| p.is_file());
        matches.sort();
        matches
    }

    fn load_chain(&self, character: &str, sources: &[Source]) -> Result<EmotionConfig, ManagerError> {
        let mut composed = EmotionConfig::default();
        for source in sources {
            if !source.path.is_file() {
                continue;
            }
            let layer = Self::load_one(&source.path)?;
            composed = composed.overlay(layer);
        }
        debug!(character, rules = composed.rules.len(), "composed emotion config chain");
        Ok(composed)
    }

    fn load_one(path: &Path) -> Result<EmotionConfig, ManagerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ManagerError::Io { path: path.to_path_buf(), source })?;
        serde_yaml::from_str(&text)
            .map_err(|source| ManagerError::Parse { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread::sleep;
    use std::time::Duration;

    fn write_file(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn files_cfg() -> EmotionFilesConfig {
        EmotionFilesConfig {
            base_config_path: PathBuf::from("emotion.yaml"),
            plugin_config_glob: "stars/*/emotion.yaml".to_string(),
            characters_dir: PathBuf::from("characters"),
        }
    }

    #[test]
    fn missing_files_compose_to_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let manager = EmotionConfigManager::new(dir.path(), files_cfg());
        let pipeline = manager.get_pipeline("alice").unwrap();
        let result = pipeline.analyze("hello");
        assert_eq!(result.primary, crate::Emotion::Neutral);
    }

    #[test]
    fn character_overlay_shifts_primary_emotion() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("emotion.yaml"),
            "lexicon:\n  keywords:\n    Happy:\n      sunny: 1.0\n",
        );
        write_file(
            &dir.path().join("characters/alice.yaml"),
            "lexicon:\n  keywords:\n    Sad:\n      sunny: 1.0\n",
        );
        let manager = EmotionConfigManager::new(dir.path(), files_cfg());

        let default_pipeline = manager.get_pipeline("bob").unwrap();
        assert_eq!(default_pipeline.analyze("sunny day").primary, crate::Emotion::Happy);

        let alice_pipeline = manager.get_pipeline("alice").unwrap();
        assert_eq!(alice_pipeline.analyze("sunny day").primary, crate::Emotion::Sad);
    }

    #[test]
    fn touching_base_file_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("emotion.yaml");
        write_file(&base, "lexicon:\n  keywords:\n    Happy:\n      sunny: 1.0\n");
        let manager = EmotionConfigManager::new(dir.path(), files_cfg());

        let first = manager.get_pipeline("alice").unwrap();
        assert_eq!(first.analyze("sunny").primary, crate::Emotion::Happy);

        // mtime resolution on some filesystems is coarse (1s); sleep to guarantee a change.
        sleep(Duration::from_millis(1100));
        write_file(&base, "lexicon:\n  keywords:\n    Sad:\n      sunny: 1.0\n");

        let second = manager.get_pipeline("alice").unwrap();
        assert_eq!(second.analyze("sunny").primary, crate::Emotion::Sad);
    }

    #[test]
    fn unchanged_files_return_the_same_cached_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("emotion.yaml"), "lexicon: {}\n");
        let manager = EmotionConfigManager::new(dir.path(), files_cfg());
        let first = manager.get_pipeline("alice").unwrap();
        let second = manager.get_pipeline("alice").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn plugin_glob_overlays_between_base_and_character() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("emotion.yaml"), "lexicon:\n  keywords:\n    Happy:\n      x: 1.0\n");
        write_file(&dir.path().join("stars/helper/emotion.yaml"), "lexicon:\n  keywords:\n    Sad:\n      x: 2.0\n");
        let manager = EmotionConfigManager::new(dir.path(), files_cfg());
        let pipeline = manager.get_pipeline("nobody").unwrap();
        // Plugin layer's weight for "x" under Sad wins since it's a distinct
        // emotion bucket; both contribute, Sad's weight (2.0) dominates.
        assert_eq!(pipeline.analyze("x").primary, crate::Emotion::Sad);
    }
}
