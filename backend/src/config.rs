//! Runtime configuration from the environment.
//!
//! | Variable                  | Default                  |
//! |---------------------------|--------------------------|
//! | `STOCKREPORT_PORT`        | `3000`                   |
//! | `STOCKREPORT_PROFILE_DIR` | `.stockreport/profiles`  |
//! | `STOCKREPORT_SOURCES`     | none (comma-separated)   |
//! | `STOCKREPORT_DATA_DIR`    | none                     |
//! | `STOCKREPORT_CACHE_SIZE`  | `8`                      |
//!
//! A `.env` file in the working directory is loaded first. Command-line
//! flags override everything here.
//!
//! The HTTP server only reads sources that are configured in
//! `STOCKREPORT_SOURCES` or lie under `STOCKREPORT_DATA_DIR`.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::cache::DEFAULT_CAPACITY;
use crate::error::{ServerError, ServerResult};
use crate::parser::SourceSpec;
use crate::profiles::registry::DEFAULT_REGISTRY_DIR;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub profile_dir: PathBuf,
    /// Sources used when a command or request names none
    pub sources: Vec<SourceSpec>,
    /// Root under which requests may name their own sources
    pub data_dir: Option<PathBuf>,
    /// Source lists kept in the server's row set cache
    pub cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            profile_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            sources: Vec::new(),
            data_dir: None,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("STOCKREPORT_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!(value = %raw, "invalid STOCKREPORT_PORT, using {}", DEFAULT_PORT),
            }
        }

        if let Some(dir) = lookup("STOCKREPORT_PROFILE_DIR").filter(|d| !d.trim().is_empty()) {
            config.profile_dir = PathBuf::from(dir.trim());
        }

        if let Some(list) = lookup("STOCKREPORT_SOURCES") {
            config.sources = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(SourceSpec::parse)
                .collect();
        }

        if let Some(dir) = lookup("STOCKREPORT_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir.trim()));
        }

        if let Some(raw) = lookup("STOCKREPORT_CACHE_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.cache_capacity = size,
                _ => tracing::warn!(value = %raw, "invalid STOCKREPORT_CACHE_SIZE, using {}", DEFAULT_CAPACITY),
            }
        }

        config
    }

    /// `explicit` when non-empty, otherwise the configured sources.
    pub fn sources_or(&self, explicit: Vec<SourceSpec>) -> Vec<SourceSpec> {
        if explicit.is_empty() {
            self.sources.clone()
        } else {
            explicit
        }
    }
}

impl AppConfig {
    /// Sources a remote request may read.
    ///
    /// An empty request gets the configured sources. Otherwise every entry
    /// must name a configured source file, or a relative path inside the
    /// data directory.
    pub fn request_sources(&self, requested: Vec<SourceSpec>) -> ServerResult<Vec<SourceSpec>> {
        if requested.is_empty() {
            return Ok(self.sources.clone());
        }
        requested
            .into_iter()
            .map(|spec| self.authorize(spec))
            .collect()
    }

    fn authorize(&self, spec: SourceSpec) -> ServerResult<SourceSpec> {
        if self.sources.iter().any(|s| s.path == spec.path) {
            return Ok(spec);
        }

        let denied = || ServerError::BadRequest(format!("source not allowed: {}", spec));
        let root = self.data_dir.as_deref().ok_or_else(denied)?;
        if !is_plain_relative(&spec.path) {
            return Err(denied());
        }

        let path = root.join(&spec.path);
        // Symlinks must not lead out of the data directory.
        if let (Ok(real), Ok(real_root)) = (path.canonicalize(), root.canonicalize()) {
            if !real.starts_with(real_root) {
                return Err(denied());
            }
        }
        Ok(SourceSpec {
            path,
            sheet: spec.sheet,
        })
    }
}

/// Relative, with no `..`, root or prefix components
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STOCKREPORT_PORT", "8080"),
            ("STOCKREPORT_PROFILE_DIR", "/srv/profiles"),
            ("STOCKREPORT_SOURCES", "dead_stock1.xlsx, dead_stock2.xlsx#Sheet2,"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.profile_dir, PathBuf::from("/srv/profiles"));
        assert_eq!(
            config.sources,
            vec![
                SourceSpec::new("dead_stock1.xlsx"),
                SourceSpec::parse("dead_stock2.xlsx#Sheet2"),
            ]
        );
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = AppConfig::from_lookup(lookup(&[("STOCKREPORT_PORT", "http")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_data_dir_and_cache_size() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STOCKREPORT_DATA_DIR", "/srv/data"),
            ("STOCKREPORT_CACHE_SIZE", "3"),
        ]));
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/data")));
        assert_eq!(config.cache_capacity, 3);

        let config = AppConfig::from_lookup(lookup(&[("STOCKREPORT_CACHE_SIZE", "0")]));
        assert_eq!(config.cache_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_request_sources_are_restricted() {
        let config = AppConfig::from_lookup(lookup(&[("STOCKREPORT_SOURCES", "exports/a.csv")]));

        assert_eq!(
            config.request_sources(Vec::new()).unwrap(),
            vec![SourceSpec::new("exports/a.csv")]
        );
        assert!(config
            .request_sources(vec![SourceSpec::parse("exports/a.csv#Sheet1")])
            .is_ok());
        assert!(matches!(
            config.request_sources(vec![SourceSpec::new("/etc/passwd.csv")]),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_request_sources_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..AppConfig::default()
        };

        let allowed = config
            .request_sources(vec![SourceSpec::parse("march/stock.xlsx#Sheet1")])
            .unwrap();
        assert_eq!(allowed[0].path, dir.path().join("march/stock.xlsx"));
        assert_eq!(allowed[0].sheet.as_deref(), Some("Sheet1"));

        for escaping in ["../secret.csv", "/etc/hosts.csv", "march/../../x.csv"] {
            assert!(
                matches!(
                    config.request_sources(vec![SourceSpec::new(escaping)]),
                    Err(ServerError::BadRequest(_))
                ),
                "{escaping}"
            );
        }
    }

    #[test]
    fn test_explicit_sources_win() {
        let config = AppConfig::from_lookup(lookup(&[("STOCKREPORT_SOURCES", "a.csv")]));
        assert_eq!(config.sources_or(Vec::new()), vec![SourceSpec::new("a.csv")]);
        assert_eq!(
            config.sources_or(vec![SourceSpec::new("b.csv")]),
            vec![SourceSpec::new("b.csv")]
        );
    }
}
