//! Persisted state: station cache and external-service backoff.
//!
//! Minimal, file-based, human-readable JSON. Writes go through a temp
//! file plus rename so a crash mid-write cannot corrupt existing state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol_constants::{
    BACKOFF_FACTOR, BACKOFF_INITIAL_HOURS, BACKOFF_MAX_HOURS, STATION_CACHE_TTL_MS,
};
use crate::utils::now_millis;

const STATION_CACHE_FILE: &str = "station_cache.json";
const BACKOFF_FILE: &str = "service_backoff.json";

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, contents)?;
    std::fs::rename(&temp_path, path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Station Cache
// ─────────────────────────────────────────────────────────────────────────────

/// One cached favorite station.
///
/// Stations carry provider-specific extras beyond id and name; those are
/// kept verbatim in `extra` so the cache is transparent to providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedStation {
    pub station_id: String,
    pub station_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Cache of browsed favorite stations with a 24 h TTL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StationCache {
    pub stations: Vec<CachedStation>,
    /// Unix millis of the last refresh.
    pub timestamp: u64,
}

impl StationCache {
    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(STATION_CACHE_FILE)
    }

    /// Loads the cache; a missing or unreadable file is an empty cache.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        match std::fs::read_to_string(Self::path(data_dir)) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Saves the cache.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(&Self::path(data_dir), &contents)
    }

    /// Replaces the station list, stamping the refresh time.
    pub fn refresh(&mut self, stations: Vec<CachedStation>) {
        self.stations = stations;
        self.timestamp = now_millis();
    }

    /// Returns true while the cache is younger than its TTL.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        !self.stations.is_empty()
            && now_millis().saturating_sub(self.timestamp) < STATION_CACHE_TTL_MS
    }

    /// Finds a station by case-insensitive name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CachedStation> {
        self.stations
            .iter()
            .find(|s| s.station_name.eq_ignore_ascii_case(name))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Backoff
// ─────────────────────────────────────────────────────────────────────────────

/// Login backoff for bot-detected external services.
///
/// Starts at 24 h on the first failure, grows ×1.5 per successive
/// failure, caps at 48 h, and clears entirely on success.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBackoff {
    /// Unix millis of the last login failure; 0 when clear.
    pub last_login_failure: u64,
    /// Current backoff window in hours; 0 when clear.
    pub backoff_hours: f64,
    /// ISO-8601 timestamp of the last update, for humans reading the file.
    pub last_update: String,
}

impl ServiceBackoff {
    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(BACKOFF_FILE)
    }

    /// Loads the backoff state; missing file means no backoff.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        match std::fs::read_to_string(Self::path(data_dir)) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Saves the backoff state.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(&Self::path(data_dir), &contents)
    }

    fn stamp(&mut self) {
        self.last_update = chrono::Utc::now().to_rfc3339();
    }

    /// Records a login failure, growing the backoff window.
    pub fn record_failure(&mut self) {
        self.backoff_hours = if self.backoff_hours == 0.0 {
            BACKOFF_INITIAL_HOURS
        } else {
            (self.backoff_hours * BACKOFF_FACTOR).min(BACKOFF_MAX_HOURS)
        };
        self.last_login_failure = now_millis();
        self.stamp();
    }

    /// Clears the backoff after a successful login.
    pub fn record_success(&mut self) {
        self.last_login_failure = 0;
        self.backoff_hours = 0.0;
        self.stamp();
    }

    /// Returns true while logins should be withheld.
    #[must_use]
    pub fn is_backed_off(&self) -> bool {
        if self.last_login_failure == 0 || self.backoff_hours == 0.0 {
            return false;
        }
        let window_ms = (self.backoff_hours * 3600.0 * 1000.0) as u64;
        now_millis().saturating_sub(self.last_login_failure) < window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, name: &str) -> CachedStation {
        CachedStation {
            station_id: id.into(),
            station_name: name.into(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn station_cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();

        let mut cache = StationCache::default();
        cache.refresh(vec![station("s1", "FIP"), station("s2", "Radio Paradise")]);
        cache.save(dir.path()).unwrap();

        let loaded = StationCache::load(dir.path());
        assert_eq!(loaded.stations.len(), 2);
        assert!(loaded.is_fresh());
        assert_eq!(loaded.find("fip").map(|s| s.station_id.as_str()), Some("s1"));
        assert!(loaded.find("WNYC").is_none());
    }

    #[test]
    fn missing_cache_file_is_empty_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StationCache::load(dir.path());
        assert!(cache.stations.is_empty());
        assert!(!cache.is_fresh());
    }

    #[test]
    fn expired_cache_is_stale() {
        let mut cache = StationCache::default();
        cache.refresh(vec![station("s1", "FIP")]);
        // Backdate past the TTL.
        cache.timestamp = now_millis() - STATION_CACHE_TTL_MS - 1;
        assert!(!cache.is_fresh());
    }

    #[test]
    fn station_extra_fields_survive_round_trip() {
        let json = r#"{"stations": [{"stationId": "s1", "stationName": "FIP", "genre": "eclectic"}], "timestamp": 5}"#;
        let cache: StationCache = serde_json::from_str(json).unwrap();
        assert_eq!(
            cache.stations[0].extra.get("genre").and_then(Value::as_str),
            Some("eclectic")
        );

        let out = serde_json::to_string(&cache).unwrap();
        assert!(out.contains("eclectic"));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let mut backoff = ServiceBackoff::default();
        assert!(!backoff.is_backed_off());

        backoff.record_failure();
        assert_eq!(backoff.backoff_hours, 24.0);
        assert!(backoff.is_backed_off());

        backoff.record_failure();
        assert_eq!(backoff.backoff_hours, 36.0);

        backoff.record_failure();
        assert_eq!(backoff.backoff_hours, 48.0);

        // Capped.
        backoff.record_failure();
        assert_eq!(backoff.backoff_hours, 48.0);
    }

    #[test]
    fn backoff_clears_on_success() {
        let mut backoff = ServiceBackoff::default();
        backoff.record_failure();
        assert!(backoff.is_backed_off());

        backoff.record_success();
        assert!(!backoff.is_backed_off());
        assert_eq!(backoff.backoff_hours, 0.0);
        assert_eq!(backoff.last_login_failure, 0);
    }

    #[test]
    fn backoff_persists_with_iso_timestamp() {
        let dir = tempfile::tempdir().unwrap();

        let mut backoff = ServiceBackoff::default();
        backoff.record_failure();
        backoff.save(dir.path()).unwrap();

        let loaded = ServiceBackoff::load(dir.path());
        assert_eq!(loaded.backoff_hours, 24.0);
        // RFC 3339 timestamps parse back.
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.last_update).is_ok());
    }

    #[test]
    fn expired_backoff_window_allows_login() {
        let mut backoff = ServiceBackoff::default();
        backoff.record_failure();
        // Pretend the failure happened 25 hours ago.
        backoff.last_login_failure = now_millis() - 25 * 3600 * 1000;
        assert!(!backoff.is_backed_off());
    }
}
