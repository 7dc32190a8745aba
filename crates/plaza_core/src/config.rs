use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlazaConfig {
    pub store: StoreConfig,
    pub trace: TraceConfig,
}

impl PlazaConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: PlazaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.trace = config.trace.bounded();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg.trace = cfg.trace.bounded();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PLAZA_DB_PATH") {
            self.store.db_path = v;
        }
        if let Ok(v) = std::env::var("PLAZA_MAX_CONNECTIONS") {
            if let Ok(n) = v.parse() {
                self.store.max_connections = n;
            }
        }
        if let Ok(v) = std::env::var("PLAZA_BUSY_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.store.busy_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("PLAZA_TRACE_LOOKBACK_HOURS") {
            if let Ok(n) = v.parse() {
                self.trace.lookback_hours = n;
            }
        }
        if let Ok(v) = std::env::var("PLAZA_TRACE_WINDOW_HOURS") {
            if let Ok(n) = v.parse() {
                self.trace.window_hours = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file path, or ":memory:" for a throwaway database.
    pub db_path: String,
    pub max_connections: u32,
    /// How long a writer waits on another writer's lock before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "plaza.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Bounds of the intervention → consequence scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub lookback_hours: i64,
    pub max_interventions: i64,
    pub window_hours: i64,
    pub max_consequences: i64,
}

/// Longest lookback or consequence window accepted, in hours.
pub const MAX_TRACE_HOURS: i64 = 24 * 366;
/// Largest per-report row cap accepted.
pub const MAX_TRACE_ROWS: i64 = 1_000;

impl TraceConfig {
    /// Copy with every field forced into `[0, MAX_TRACE_*]`.
    pub fn bounded(self) -> Self {
        Self {
            lookback_hours: self.lookback_hours.clamp(0, MAX_TRACE_HOURS),
            max_interventions: self.max_interventions.clamp(0, MAX_TRACE_ROWS),
            window_hours: self.window_hours.clamp(0, MAX_TRACE_HOURS),
            max_consequences: self.max_consequences.clamp(0, MAX_TRACE_ROWS),
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 48,
            max_interventions: 20,
            window_hours: 24,
            max_consequences: 5,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = PlazaConfig::default();
        assert_eq!(cfg.store.db_path, "plaza.db");
        assert_eq!(cfg.trace.lookback_hours, 48);
        assert_eq!(cfg.trace.max_interventions, 20);
        assert_eq!(cfg.trace.window_hours, 24);
        assert_eq!(cfg.trace.max_consequences, 5);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[store]
db_path = "data/plaza.db"
"#;
        let cfg: PlazaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.store.db_path, "data/plaza.db");
        // Defaults for unspecified fields
        assert_eq!(cfg.store.max_connections, 8);
        assert_eq!(cfg.trace, TraceConfig::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[store]
db_path = ":memory:"
max_connections = 1
busy_timeout_ms = 250

[trace]
lookback_hours = 72
max_interventions = 10
window_hours = 12
max_consequences = 3
"#;
        let cfg: PlazaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.store.db_path, ":memory:");
        assert_eq!(cfg.store.max_connections, 1);
        assert_eq!(cfg.store.busy_timeout_ms, 250);
        assert_eq!(cfg.trace.lookback_hours, 72);
        assert_eq!(cfg.trace.max_interventions, 10);
        assert_eq!(cfg.trace.window_hours, 12);
        assert_eq!(cfg.trace.max_consequences, 3);
    }

    #[test]
    fn test_trace_bounds() {
        let cfg = TraceConfig {
            lookback_hours: i64::MAX / 1000,
            max_interventions: -3,
            window_hours: -24,
            max_consequences: i64::MAX,
        }
        .bounded();
        assert_eq!(cfg.lookback_hours, MAX_TRACE_HOURS);
        assert_eq!(cfg.max_interventions, 0);
        assert_eq!(cfg.window_hours, 0);
        assert_eq!(cfg.max_consequences, MAX_TRACE_ROWS);

        assert_eq!(TraceConfig::default().bounded(), TraceConfig::default());
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        // Part 1: env overrides
        std::env::set_var("PLAZA_DB_PATH", "/tmp/override.db");
        std::env::set_var("PLAZA_TRACE_WINDOW_HOURS", "6");
        std::env::set_var("PLAZA_MAX_CONNECTIONS", "not-a-number");

        let mut cfg = PlazaConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.store.db_path, "/tmp/override.db");
        assert_eq!(cfg.trace.window_hours, 6);
        assert_eq!(cfg.store.max_connections, 8);

        std::env::remove_var("PLAZA_DB_PATH");
        std::env::remove_var("PLAZA_TRACE_WINDOW_HOURS");
        std::env::remove_var("PLAZA_MAX_CONNECTIONS");

        // Part 2: nonexistent path returns defaults
        let cfg = PlazaConfig::load_or_default("/nonexistent/plaza.toml");
        assert_eq!(cfg.store.db_path, "plaza.db");
    }
}
