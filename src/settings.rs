use std::time::Duration;

use anyhow::{Context, Result};

use crate::sample_cache;

const DEFAULT_CACHE_CAPACITY: u64 = sample_cache::DEFAULT_CAPACITY as u64;

/// Process-wide configuration, assembled once at startup and passed by
/// reference into session construction. Operation callbacks never consult
/// any ambient configuration source.
///
/// All values come from environment variables; anything malformed is a fatal
/// error before the first session starts, never at runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the collection every session writes to and reads from.
    pub collection_name: String,

    /// Relative frequency of single-document inserts, per entity type.
    pub insert_weight: u64,
    /// Relative frequency of point lookups, per entity type.
    pub find_weight: u64,
    /// Relative frequency of each bulk-insert variant (10/100/1000),
    /// per entity type. The variants are weighted independently of each
    /// other, all with this value.
    pub bulk_insert_weight: u64,
    /// Relative frequency of the aggregation pipeline.
    pub agg_pipe_weight: u64,

    /// Number of concurrently simulated users.
    pub users: u64,
    /// Run length; unlimited when `None`.
    pub max_duration: Option<Duration>,
    /// Operations per second across the whole run; unthrottled when `None`.
    pub rate_limit_per_second: Option<f64>,

    /// Capacity of each per-entity sample cache.
    pub cache_capacity: usize,

    /// Runs the aggregation pipeline against the primary handle instead of
    /// the secondary. This changes what is measured - replica read latency
    /// is no longer separated from primary write latency - so it is an
    /// explicit switch, never a silent fallback.
    pub aggregate_on_primary: bool,

    /// Whether to record latency histograms.
    pub measure_latency: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the settings from an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settings = Self {
            collection_name: lookup("COLLECTION_NAME")
                .unwrap_or_else(|| String::from("sample_workload")),
            insert_weight: parse_weight(&lookup, "INSERT_WEIGHT", 10)?,
            find_weight: parse_weight(&lookup, "FIND_WEIGHT", 10)?,
            bulk_insert_weight: parse_weight(&lookup, "BULK_INSERT_WEIGHT", 1)?,
            agg_pipe_weight: parse_weight(&lookup, "AGG_PIPE_WEIGHT", 1)?,
            users: parse_integer(&lookup, "USERS", 10)?,
            max_duration: parse_optional_integer(&lookup, "DURATION_SECS")?
                .map(Duration::from_secs),
            rate_limit_per_second: parse_rate_limit(&lookup)?,
            cache_capacity: parse_integer(&lookup, "CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?
                as usize,
            aggregate_on_primary: parse_bool(&lookup, "AGG_ON_PRIMARY", false)?,
            measure_latency: parse_bool(&lookup, "MEASURE_LATENCY", true)?,
        };

        anyhow::ensure!(settings.users > 0, "USERS must be positive");
        anyhow::ensure!(settings.cache_capacity > 0, "CACHE_CAPACITY must be positive");
        anyhow::ensure!(
            !settings.collection_name.is_empty(),
            "COLLECTION_NAME must not be empty"
        );

        Ok(settings)
    }

    pub fn print_settings(&self) {
        println!("******************** Workload Settings ********************");
        println!("Collection: {}", self.collection_name);
        println!(
            "Weights: insert={} find={} bulk_insert={} aggregation={}",
            self.insert_weight, self.find_weight, self.bulk_insert_weight, self.agg_pipe_weight
        );
        println!("Users: {}", self.users);
        match self.max_duration {
            Some(duration) => println!("Duration: {}s", duration.as_secs()),
            None => println!("Duration: unlimited"),
        }
        match self.rate_limit_per_second {
            Some(rate) => println!("Rate limit: {rate} op/s"),
            None => println!("Rate limit: none"),
        }
        println!("Sample cache capacity: {}", self.cache_capacity);
        println!(
            "Aggregation target: {}",
            if self.aggregate_on_primary {
                "primary"
            } else {
                "secondary"
            }
        );
        println!();
    }
}

// Weights must parse as non-negative integers; a negative or non-integer
// value aborts startup.
fn parse_weight(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<u64> {
    parse_integer(lookup, name, default)
}

fn parse_integer(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}")),
    }
}

fn parse_optional_integer(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<u64>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}")),
    }
}

fn parse_rate_limit(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<f64>> {
    let Some(raw) = lookup("RATE_LIMIT") else {
        return Ok(None);
    };
    let rate = raw
        .trim()
        .parse::<f64>()
        .with_context(|| format!("RATE_LIMIT must be a number of operations per second, got {raw:?}"))?;
    anyhow::ensure!(rate > 0.0, "RATE_LIMIT must be positive, got {raw:?}");
    Ok(Some(rate))
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool> {
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => anyhow::bail!("{name} must be a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = from_vars(&[]).unwrap();
        assert_eq!(settings.collection_name, "sample_workload");
        assert_eq!(settings.insert_weight, 10);
        assert_eq!(settings.find_weight, 10);
        assert_eq!(settings.bulk_insert_weight, 1);
        assert_eq!(settings.agg_pipe_weight, 1);
        assert_eq!(settings.users, 10);
        assert_eq!(settings.cache_capacity, 1000);
        assert_eq!(settings.max_duration, None);
        assert_eq!(settings.rate_limit_per_second, None);
        assert!(!settings.aggregate_on_primary);
        assert!(settings.measure_latency);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let settings = from_vars(&[
            ("COLLECTION_NAME", "orders_load"),
            ("INSERT_WEIGHT", "30"),
            ("FIND_WEIGHT", "0"),
            ("BULK_INSERT_WEIGHT", "5"),
            ("AGG_PIPE_WEIGHT", "2"),
            ("USERS", "64"),
            ("DURATION_SECS", "120"),
            ("RATE_LIMIT", "2500.5"),
            ("CACHE_CAPACITY", "50"),
            ("AGG_ON_PRIMARY", "true"),
        ])
        .unwrap();

        assert_eq!(settings.collection_name, "orders_load");
        assert_eq!(settings.insert_weight, 30);
        assert_eq!(settings.find_weight, 0);
        assert_eq!(settings.bulk_insert_weight, 5);
        assert_eq!(settings.agg_pipe_weight, 2);
        assert_eq!(settings.users, 64);
        assert_eq!(settings.max_duration, Some(Duration::from_secs(120)));
        assert_eq!(settings.rate_limit_per_second, Some(2500.5));
        assert_eq!(settings.cache_capacity, 50);
        assert!(settings.aggregate_on_primary);
    }

    #[test]
    fn malformed_weights_are_fatal() {
        assert!(from_vars(&[("INSERT_WEIGHT", "-1")]).is_err());
        assert!(from_vars(&[("FIND_WEIGHT", "2.5")]).is_err());
        assert!(from_vars(&[("BULK_INSERT_WEIGHT", "lots")]).is_err());
        assert!(from_vars(&[("AGG_PIPE_WEIGHT", "")]).is_err());
    }

    #[test]
    fn malformed_run_controls_are_fatal() {
        assert!(from_vars(&[("USERS", "0")]).is_err());
        assert!(from_vars(&[("CACHE_CAPACITY", "0")]).is_err());
        assert!(from_vars(&[("COLLECTION_NAME", "")]).is_err());
        assert!(from_vars(&[("RATE_LIMIT", "-5")]).is_err());
        assert!(from_vars(&[("AGG_ON_PRIMARY", "maybe")]).is_err());
    }
}
