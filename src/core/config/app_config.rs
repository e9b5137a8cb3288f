use std::{
    collections::BTreeMap,
    env,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, FixedOffset, Offset, Utc};
use tracing::{info, warn};
use validator::Validate;

use crate::core::state::alerts::alert_state::{
    FlapSettings, DEFAULT_FLAP_INTERVAL_SECS, DEFAULT_FLAP_THRESHOLD,
};
use crate::core::state::window::timestamp::parse_reference_offset;
use crate::core::state::window::windowed_state_store::{DEFAULT_CAPACITY, DEFAULT_RETENTION_SECS};
use crate::domain::aggregation::aggregation_config::AggregationConfig;
use crate::domain::alert::alert_classifier::AlertClassifier;
use crate::domain::facility::camera_directory::CameraDirectory;
use crate::domain::facility::facility_state_processor::DEFAULT_FACILITY_KEY;
use crate::domain::schedule::no_show_rule::NoShowRule;

pub const DEFAULT_CONFIG_PATH: &str = "vismon.rci";

/// Numeric knobs of the windowing and flap logic.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct CoreSettings {
    /// Age bound of each entity window, in seconds.
    #[validate(range(min = 1, max = 86400))]
    pub retention_secs: i64,
    /// Hard count bound of each entity window.
    #[validate(range(min = 1, max = 100000))]
    pub capacity: usize,
    /// Number of value changes considered when looking for flapping.
    #[validate(range(min = 1, max = 100))]
    pub flap_threshold: usize,
    /// Span within which `flap_threshold` changes count as flapping, in seconds.
    #[validate(range(min = 1, max = 86400))]
    pub flap_interval_secs: i64,
    /// Entity key of the facility-wide pseudo camera.
    #[validate(length(min = 1, max = 128))]
    pub facility_key: String,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            capacity: DEFAULT_CAPACITY,
            flap_threshold: DEFAULT_FLAP_THRESHOLD,
            flap_interval_secs: DEFAULT_FLAP_INTERVAL_SECS,
            facility_key: DEFAULT_FACILITY_KEY.to_string(),
        }
    }
}

impl CoreSettings {
    pub fn retention(&self) -> Duration {
        Duration::seconds(self.retention_secs)
    }

    pub fn flap_settings(&self) -> FlapSettings {
        FlapSettings {
            threshold: self.flap_threshold,
            interval: Duration::seconds(self.flap_interval_secs),
        }
    }
}

/// Full runtime configuration, fixed after startup.
#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub core: CoreSettings,
    pub reference_offset: FixedOffset,
    pub aggregation: AggregationConfig,
    pub classifier: AlertClassifier,
    pub cameras: CameraDirectory,
    pub no_show_rules: Vec<NoShowRule>,
    /// Optional Discord webhook for alert delivery.
    #[validate(url)]
    pub discord_webhook_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            core: CoreSettings::default(),
            reference_offset: Utc.fix(),
            aggregation: AggregationConfig::default(),
            classifier: AlertClassifier::default(),
            cameras: CameraDirectory::default(),
            no_show_rules: Vec::new(),
            discord_webhook_url: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env`, then the settings file named by `VISMON_CONFIG_PATH`, then
    /// env overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path = env::var("VISMON_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::read_from_path(&path)?
        } else {
            warn!(path = %path.display(), "Config file not found; using defaults");
            Self::default()
        };

        if let Ok(url) = env::var("DISCORD_WEBHOOK_URL") {
            config.discord_webhook_url = normalize_string_opt(&url);
        }
        if let Ok(offset) = env::var("VISMON_REFERENCE_UTC_OFFSET") {
            config.reference_offset = parse_reference_offset(&offset)?;
        }

        config.validate().context("Invalid configuration")?;
        info!(
            overrides = config.aggregation.overrides.len(),
            cameras = config.cameras.len(),
            no_show_rules = config.no_show_rules.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn read_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses `KEY: value` lines. Global keys are applied before indexed per-entity
    /// keys regardless of their order in the file.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut config = Self::default();
        let mut indexed: BTreeMap<String, String> = BTreeMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, val)) = line.split_once(':') else {
                return Err(anyhow!("line {}: expected 'KEY: value'", line_no + 1));
            };
            let key = key.trim().to_uppercase();
            let val = val.trim();
            let ctx = || format!("line {}: {}", line_no + 1, key);

            match key.as_str() {
                "RETENTION_SECS" => config.core.retention_secs = val.parse().with_context(ctx)?,
                "CAPACITY" => config.core.capacity = val.parse().with_context(ctx)?,
                "FLAP_THRESHOLD" => config.core.flap_threshold = val.parse().with_context(ctx)?,
                "FLAP_INTERVAL_SECS" => {
                    config.core.flap_interval_secs = val.parse().with_context(ctx)?
                }
                "FACILITY_KEY" => config.core.facility_key = val.to_string(),
                "REFERENCE_UTC_OFFSET" => {
                    config.reference_offset = parse_reference_offset(val).with_context(ctx)?
                }
                "RELEVANCE_PHRASES" => {
                    config.aggregation.default.relevance_phrases.clear();
                    for phrase in split_list(val) {
                        config.aggregation.default.add_relevance_phrase(&phrase);
                    }
                }
                "ALERT_PHRASES" => config.classifier = AlertClassifier::new(split_list(val)),
                "DISCORD_WEBHOOK_URL" => config.discord_webhook_url = normalize_string_opt(val),
                k if is_indexed(k) => {
                    indexed.insert(key.clone(), val.to_string());
                }
                other => warn!(key = other, "Unknown config key ignored"),
            }
        }

        for (key, val) in &indexed {
            config
                .apply_indexed(key, val)
                .with_context(|| format!("{key}: '{val}'"))?;
        }

        Ok(config)
    }

    fn apply_indexed(&mut self, key: &str, val: &str) -> Result<()> {
        let fields: Vec<&str> = val.split('|').map(str::trim).collect();

        if key.starts_with("ENTITY_RELEVANCE_") {
            let [entity, phrases] = fields.as_slice() else {
                return Err(anyhow!("expected 'entity | phrases'"));
            };
            let profile = self.aggregation.override_mut(entity);
            profile.relevance_phrases.clear();
            for phrase in split_list(phrases) {
                profile.add_relevance_phrase(&phrase);
            }
        } else if key.starts_with("ENTITY_WEIGHT_") {
            let [entity, substring, weight] = fields.as_slice() else {
                return Err(anyhow!("expected 'entity | substring | weight'"));
            };
            let weight: f64 = weight.parse().context("weight")?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(anyhow!("weight must be a non-negative number"));
            }
            self.aggregation.override_mut(entity).set_weight(substring, weight);
        } else if key.starts_with("ENTITY_ALERT_") {
            let [entity, phrases] = fields.as_slice() else {
                return Err(anyhow!("expected 'entity | phrases'"));
            };
            self.classifier.set_entity_phrases(entity, split_list(phrases));
        } else if key.starts_with("CAMERA_NAME_") {
            let [entity, name] = fields.as_slice() else {
                return Err(anyhow!("expected 'entity | name'"));
            };
            self.cameras.insert(entity, name);
        } else if key.starts_with("NO_SHOW_") {
            self.no_show_rules.push(NoShowRule::parse(val)?);
        }
        Ok(())
    }
}

const INDEXED_PREFIXES: [&str; 5] = [
    "ENTITY_RELEVANCE_",
    "ENTITY_WEIGHT_",
    "ENTITY_ALERT_",
    "CAMERA_NAME_",
    "NO_SHOW_",
];

fn is_indexed(key: &str) -> bool {
    INDEXED_PREFIXES.iter().any(|p| key.starts_with(p))
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn normalize_string_opt(v: &str) -> Option<String> {
    let v = v.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}
