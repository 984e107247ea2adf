//! Profile Registry - Store and reuse custom report profiles
//!
//! Custom profiles live as JSON files next to the data. Built-in profiles are
//! always listed first and cannot be shadowed, replaced or deleted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineResult, RegistryError, RegistryResult, ReportError};
use crate::profiles::{builtin_profiles, ReportProfile};

/// Directory where custom profiles are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".stockreport/profiles";

/// A stored profile with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    pub profile: ReportProfile,
    /// Creation timestamp
    pub created_at: String,
    /// Last time a report was run with this profile
    pub last_used: Option<String>,
    /// Number of report runs
    pub use_count: u32,
}

/// Registry for built-in and custom report profiles
pub struct ProfileRegistry {
    registry_dir: PathBuf,
    /// Custom profiles (id -> profile)
    custom: HashMap<String, StoredProfile>,
}

impl ProfileRegistry {
    /// Create a registry in the default directory, loading existing profiles
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            custom: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all custom profiles. Unreadable files are skipped with a warning.
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let stored = fs::read_to_string(&path)
                .map_err(RegistryError::from)
                .and_then(|content| Ok(serde_json::from_str::<StoredProfile>(&content)?));
            match stored {
                Ok(stored) if is_builtin(&stored.profile.id) => {
                    tracing::warn!(id = %stored.profile.id, "ignoring stored profile that shadows a built-in");
                }
                Ok(stored) if !is_valid_id(&stored.profile.id) => {
                    tracing::warn!(id = %stored.profile.id, "ignoring stored profile with an invalid id");
                }
                Ok(stored) => {
                    self.custom.insert(stored.profile.id.clone(), stored);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable profile");
                }
            }
        }
    }

    /// Built-in profiles followed by custom ones sorted by id
    pub fn list(&self) -> Vec<ReportProfile> {
        let mut custom: Vec<&StoredProfile> = self.custom.values().collect();
        custom.sort_by(|a, b| a.profile.id.cmp(&b.profile.id));

        builtin_profiles()
            .into_iter()
            .chain(custom.into_iter().map(|s| s.profile.clone()))
            .collect()
    }

    /// Custom profiles with their usage metadata
    pub fn stored(&self) -> Vec<&StoredProfile> {
        let mut stored: Vec<&StoredProfile> = self.custom.values().collect();
        stored.sort_by(|a, b| a.profile.id.cmp(&b.profile.id));
        stored
    }

    /// Get a profile by id, built-ins first
    pub fn get(&self, id: &str) -> RegistryResult<ReportProfile> {
        ReportProfile::builtin(id)
            .or_else(|| self.custom.get(id).map(|s| s.profile.clone()))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Like [`get`](Self::get), reporting a missing id as an unknown profile
    pub fn resolve(&self, id: &str) -> PipelineResult<ReportProfile> {
        self.get(id).map_err(|e| match e {
            RegistryError::NotFound(id) => ReportError::UnknownProfile(id),
            other => ReportError::Registry(other),
        })
    }

    /// Save a custom profile, replacing any custom profile with the same id
    pub fn save(&mut self, mut profile: ReportProfile) -> RegistryResult<String> {
        if profile.id.trim().is_empty() {
            profile.id = slugify(&profile.title);
        }
        if !is_valid_id(&profile.id) {
            return Err(RegistryError::InvalidId(profile.id));
        }
        if is_builtin(&profile.id) {
            return Err(RegistryError::BuiltIn(profile.id));
        }

        fs::create_dir_all(&self.registry_dir)?;

        let id = profile.id.clone();
        let stored = match self.custom.remove(&id) {
            Some(previous) => StoredProfile {
                profile,
                ..previous
            },
            None => StoredProfile {
                profile,
                created_at: chrono::Utc::now().to_rfc3339(),
                last_used: None,
                use_count: 0,
            },
        };

        self.write(&stored)?;
        self.custom.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a profile from a JSON file (a bare profile, not a stored one)
    pub fn import(&mut self, path: &Path) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let profile = ReportProfile::from_json(&content)?;
        self.save(profile)
    }

    /// Record a report run against a custom profile
    pub fn record_use(&mut self, id: &str) {
        let path = self.path_for(id);
        let Some(stored) = self.custom.get_mut(id) else {
            return;
        };
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        if let Ok(content) = serde_json::to_string_pretty(stored) {
            if let Err(e) = fs::write(&path, content) {
                tracing::warn!(id, error = %e, "failed to persist profile usage");
            }
        }
    }

    /// Delete a custom profile
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if is_builtin(id) {
            return Err(RegistryError::BuiltIn(id.to_string()));
        }
        if self.custom.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn write(&self, stored: &StoredProfile) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.profile.id), content)?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_builtin(id: &str) -> bool {
    ReportProfile::builtin(id).is_some()
}

/// An id is valid when it is already its own slug.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && slugify(id) == id
}

/// Lowercase, non-alphanumerics collapsed to single dashes
fn slugify(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        format!("profile-{}", chrono::Utc::now().timestamp_millis())
    } else {
        slug
    }
}
