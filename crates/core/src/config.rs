use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::item::ItemId;

pub const CONFIG_FILE_NAME: &str = "cobuy.toml";

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub basket: BasketConfig,
    pub cooccurrence: CooccurrenceConfig,
    pub rules: RuleMinerConfig,
    pub brand: BrandMatchConfig,
    pub embedding: EmbeddingConfig,
    pub hybrid: HybridConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub transactions: String,
    pub available: String,
    pub attributes: String,
    pub embeddings: Option<String>,
}

impl PathsConfig {
    pub fn input(&self, file_name: &str) -> PathBuf {
        self.input_dir.join(file_name)
    }

    pub fn output(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Item ids known to be corrupt upstream; subtracted from every transactions read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Denylist(BTreeSet<ItemId>);

impl Denylist {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        self.0.contains(item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.0.iter()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasketConfig {
    pub denylist: Denylist,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CooccurrenceConfig {
    pub enabled: bool,
    pub min_item_support: u32,
    pub min_pair_support: u32,
    /// Per-item cap applied before catalog and threshold filtering.
    pub k_neighbors: usize,
    pub score_threshold: f64,
    pub topk: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuleMinerConfig {
    pub enabled: bool,
    pub lower_q: f64,
    pub upper_q: f64,
    /// Relative support in `[0, 1]`.
    pub min_support: f64,
    pub min_confidence: f64,
    pub top_k: usize,
    pub max_itemset_len: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrandMatchConfig {
    pub enabled: bool,
    pub unknown_sentinel: String,
    pub gender_tags: BTreeSet<String>,
    pub bestseller_quantile: f64,
    pub min_recs: usize,
    pub max_recs: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilaritySource {
    Disabled,
    ItemCosine,
    VectorCosine,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingConfig {
    pub source: SimilaritySource,
    pub min_score: Option<f64>,
    /// Fraction of the row maximum a neighbor must reach.
    pub relative_min: Option<f64>,
    pub positive_only: bool,
    pub k_min: usize,
    pub k_max: usize,
    pub min_pair_support: Option<u32>,
    pub q_low: f64,
    pub q_high: f64,
    pub min_price: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridSource {
    pub name: String,
    pub weight: f64,
    /// Wide table file for this source; defaults to `<name>.csv` in the output dir.
    #[serde(default)]
    pub path: Option<String>,
}

impl HybridSource {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self { name: name.into(), weight, path: None }
    }

    pub fn file_name(&self) -> String {
        self.path.clone().unwrap_or_else(|| format!("{}.csv", self.name))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HybridConfig {
    pub k: usize,
    pub sources: Vec<HybridSource>,
}

impl HybridConfig {
    pub fn weight_of(&self, name: &str) -> Option<f64> {
        self.sources.iter().find(|source| source.name == name).map(|source| source.weight)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub hybrid_k: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for CooccurrenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_item_support: 2,
            min_pair_support: 2,
            k_neighbors: 50,
            score_threshold: 0.0,
            topk: 10,
        }
    }
}

impl Default for RuleMinerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lower_q: 0.50,
            upper_q: 0.97,
            min_support: 0.001,
            min_confidence: 0.10,
            top_k: 10,
            max_itemset_len: 2,
        }
    }
}

impl Default for BrandMatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unknown_sentinel: "unknown".to_string(),
            gender_tags: ["dam", "herr"].into_iter().map(str::to_string).collect(),
            bestseller_quantile: 0.95,
            min_recs: 1,
            max_recs: 10,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            source: SimilaritySource::ItemCosine,
            min_score: None,
            relative_min: Some(0.50),
            positive_only: true,
            k_min: 4,
            k_max: 10,
            min_pair_support: None,
            q_low: 0.0,
            q_high: 0.96,
            min_price: None,
        }
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            k: 10,
            sources: vec![
                HybridSource::new("cooccurrence", 10.0),
                HybridSource::new("rules", 1.0),
                HybridSource::new("embedding", 0.1),
            ],
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                input_dir: PathBuf::from("data/processed"),
                output_dir: PathBuf::from("data/recs"),
                transactions: "transactions.csv".to_string(),
                available: "available_items.csv".to_string(),
                attributes: "item_attributes.csv".to_string(),
                embeddings: None,
            },
            basket: BasketConfig::default(),
            cooccurrence: CooccurrenceConfig::default(),
            rules: RuleMinerConfig::default(),
            brand: BrandMatchConfig::default(),
            embedding: EmbeddingConfig::default(),
            hybrid: HybridConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for SimilaritySource {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "item_cosine" => Ok(Self::ItemCosine),
            "vector_cosine" => Ok(Self::VectorCosine),
            other => Err(ConfigError::Validation(format!(
                "unsupported similarity source `{other}` (expected disabled|item_cosine|vector_cosine)"
            ))),
        }
    }
}

impl PipelineConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(paths) = patch.paths {
            if let Some(input_dir) = paths.input_dir {
                self.paths.input_dir = input_dir;
            }
            if let Some(output_dir) = paths.output_dir {
                self.paths.output_dir = output_dir;
            }
            if let Some(transactions) = paths.transactions {
                self.paths.transactions = transactions;
            }
            if let Some(available) = paths.available {
                self.paths.available = available;
            }
            if let Some(attributes) = paths.attributes {
                self.paths.attributes = attributes;
            }
            if let Some(embeddings) = paths.embeddings {
                self.paths.embeddings = Some(embeddings);
            }
        }

        if let Some(basket) = patch.basket {
            if let Some(denylist) = basket.denylist {
                self.basket.denylist = Denylist::new(denylist);
            }
        }

        if let Some(cooc) = patch.cooccurrence {
            let target = &mut self.cooccurrence;
            if let Some(enabled) = cooc.enabled {
                target.enabled = enabled;
            }
            if let Some(min_item_support) = cooc.min_item_support {
                target.min_item_support = min_item_support;
            }
            if let Some(min_pair_support) = cooc.min_pair_support {
                target.min_pair_support = min_pair_support;
            }
            if let Some(k_neighbors) = cooc.k_neighbors {
                target.k_neighbors = k_neighbors;
            }
            if let Some(score_threshold) = cooc.score_threshold {
                target.score_threshold = score_threshold;
            }
            if let Some(topk) = cooc.topk {
                target.topk = topk;
            }
        }

        if let Some(rules) = patch.rules {
            let target = &mut self.rules;
            if let Some(enabled) = rules.enabled {
                target.enabled = enabled;
            }
            if let Some(lower_q) = rules.lower_q {
                target.lower_q = lower_q;
            }
            if let Some(upper_q) = rules.upper_q {
                target.upper_q = upper_q;
            }
            if let Some(min_support) = rules.min_support {
                target.min_support = min_support;
            }
            if let Some(min_confidence) = rules.min_confidence {
                target.min_confidence = min_confidence;
            }
            if let Some(top_k) = rules.top_k {
                target.top_k = top_k;
            }
            if let Some(max_itemset_len) = rules.max_itemset_len {
                target.max_itemset_len = max_itemset_len;
            }
        }

        if let Some(brand) = patch.brand {
            let target = &mut self.brand;
            if let Some(enabled) = brand.enabled {
                target.enabled = enabled;
            }
            if let Some(unknown_sentinel) = brand.unknown_sentinel {
                target.unknown_sentinel = unknown_sentinel;
            }
            if let Some(gender_tags) = brand.gender_tags {
                target.gender_tags =
                    gender_tags.into_iter().map(|tag| tag.trim().to_lowercase()).collect();
            }
            if let Some(bestseller_quantile) = brand.bestseller_quantile {
                target.bestseller_quantile = bestseller_quantile;
            }
            if let Some(min_recs) = brand.min_recs {
                target.min_recs = min_recs;
            }
            if let Some(max_recs) = brand.max_recs {
                target.max_recs = max_recs;
            }
        }

        if let Some(embedding) = patch.embedding {
            let target = &mut self.embedding;
            if let Some(source) = embedding.source {
                target.source = source;
            }
            if let Some(min_score) = embedding.min_score {
                target.min_score = Some(min_score);
            }
            if let Some(relative_min) = embedding.relative_min {
                target.relative_min = Some(relative_min);
            }
            if let Some(positive_only) = embedding.positive_only {
                target.positive_only = positive_only;
            }
            if let Some(k_min) = embedding.k_min {
                target.k_min = k_min;
            }
            if let Some(k_max) = embedding.k_max {
                target.k_max = k_max;
            }
            if let Some(min_pair_support) = embedding.min_pair_support {
                target.min_pair_support = Some(min_pair_support);
            }
            if let Some(q_low) = embedding.q_low {
                target.q_low = q_low;
            }
            if let Some(q_high) = embedding.q_high {
                target.q_high = q_high;
            }
            if let Some(min_price) = embedding.min_price {
                target.min_price = Some(min_price);
            }
        }

        if let Some(hybrid) = patch.hybrid {
            if let Some(k) = hybrid.k {
                self.hybrid.k = k;
            }
            if let Some(sources) = hybrid.sources {
                self.hybrid.sources = sources;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COBUY_INPUT_DIR") {
            self.paths.input_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("COBUY_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("COBUY_DENYLIST") {
            self.basket.denylist =
                Denylist::new(value.split(',').map(str::trim).filter(|id| !id.is_empty()));
        }
        if let Some(value) = read_env("COBUY_COOCCURRENCE_TOPK") {
            self.cooccurrence.topk = parse_usize("COBUY_COOCCURRENCE_TOPK", &value)?;
        }
        if let Some(value) = read_env("COBUY_COOCCURRENCE_MIN_PAIR_SUPPORT") {
            self.cooccurrence.min_pair_support =
                parse_u32("COBUY_COOCCURRENCE_MIN_PAIR_SUPPORT", &value)?;
        }
        if let Some(value) = read_env("COBUY_RULES_MIN_SUPPORT") {
            self.rules.min_support = parse_f64("COBUY_RULES_MIN_SUPPORT", &value)?;
        }
        if let Some(value) = read_env("COBUY_RULES_MIN_CONFIDENCE") {
            self.rules.min_confidence = parse_f64("COBUY_RULES_MIN_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("COBUY_EMBEDDING_SOURCE") {
            self.embedding.source = value.parse()?;
        }
        if let Some(value) = read_env("COBUY_HYBRID_K") {
            self.hybrid.k = parse_usize("COBUY_HYBRID_K", &value)?;
        }

        let log_level = read_env("COBUY_LOGGING_LEVEL").or_else(|| read_env("COBUY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COBUY_LOGGING_FORMAT").or_else(|| read_env("COBUY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(input_dir) = overrides.input_dir {
            self.paths.input_dir = input_dir;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.paths.output_dir = output_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(k) = overrides.hybrid_k {
            self.hybrid.k = k;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_paths(&self.paths)?;
        self.cooccurrence.validate()?;
        self.rules.validate()?;
        self.brand.validate()?;
        self.embedding.validate()?;
        self.hybrid.validate()?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl CooccurrenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_item_support == 0 || self.min_pair_support == 0 {
            return Err(ConfigError::Validation(
                "cooccurrence.min_item_support and min_pair_support must be at least 1"
                    .to_string(),
            ));
        }
        if self.k_neighbors == 0 || self.topk == 0 {
            return Err(ConfigError::Validation(
                "cooccurrence.k_neighbors and cooccurrence.topk must be greater than zero"
                    .to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::Validation(
                "cooccurrence.score_threshold must be in range 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }
}

impl RuleMinerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_quantile_band("rules", self.lower_q, self.upper_q)?;
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(ConfigError::Validation(
                "rules.min_support must be in range (0.0, 1.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Validation(
                "rules.min_confidence must be in range 0.0..=1.0".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Validation(
                "rules.top_k must be greater than zero".to_string(),
            ));
        }
        if self.max_itemset_len < 2 {
            return Err(ConfigError::Validation(
                "rules.max_itemset_len must be at least 2 to produce pair rules".to_string(),
            ));
        }
        Ok(())
    }
}

impl BrandMatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unknown_sentinel.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand.unknown_sentinel must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.bestseller_quantile) {
            return Err(ConfigError::Validation(
                "brand.bestseller_quantile must be in range 0.0..=1.0".to_string(),
            ));
        }
        if self.max_recs == 0 || self.min_recs > self.max_recs {
            return Err(ConfigError::Validation(
                "brand.max_recs must be positive and brand.min_recs <= brand.max_recs"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_quantile_band("embedding", self.q_low, self.q_high)?;
        if self.k_max == 0 || self.k_min > self.k_max {
            return Err(ConfigError::Validation(
                "embedding.k_max must be positive and embedding.k_min <= embedding.k_max"
                    .to_string(),
            ));
        }
        if let Some(relative_min) = self.relative_min {
            if !(0.0..=1.0).contains(&relative_min) {
                return Err(ConfigError::Validation(
                    "embedding.relative_min must be in range 0.0..=1.0".to_string(),
                ));
            }
        }
        if self.min_score.is_some_and(|score| !score.is_finite()) {
            return Err(ConfigError::Validation(
                "embedding.min_score must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::Validation("hybrid.k must be greater than zero".to_string()));
        }
        if self.sources.len() < 2 {
            return Err(ConfigError::Validation(
                "hybrid.sources must list at least two sources".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "hybrid.sources entries need a non-empty name".to_string(),
                ));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "hybrid.sources lists `{}` more than once",
                    source.name
                )));
            }
            if !source.weight.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "hybrid weight for `{}` must be a finite number",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_quantile_band(section: &str, low: f64, high: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low > high {
        return Err(ConfigError::Validation(format!(
            "{section} quantile bounds must satisfy 0.0 <= low <= high <= 1.0"
        )));
    }
    Ok(())
}

fn validate_paths(paths: &PathsConfig) -> Result<(), ConfigError> {
    let names = [
        ("paths.transactions", paths.transactions.as_str()),
        ("paths.available", paths.available.as_str()),
        ("paths.attributes", paths.attributes.as_str()),
    ];
    for (key, value) in names {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }
    if paths.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("paths.output_dir must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from("config").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    paths: Option<PathsPatch>,
    basket: Option<BasketPatch>,
    cooccurrence: Option<CooccurrencePatch>,
    rules: Option<RulesPatch>,
    brand: Option<BrandPatch>,
    embedding: Option<EmbeddingPatch>,
    hybrid: Option<HybridPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PathsPatch {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    transactions: Option<String>,
    available: Option<String>,
    attributes: Option<String>,
    embeddings: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BasketPatch {
    denylist: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CooccurrencePatch {
    enabled: Option<bool>,
    min_item_support: Option<u32>,
    min_pair_support: Option<u32>,
    k_neighbors: Option<usize>,
    score_threshold: Option<f64>,
    topk: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RulesPatch {
    enabled: Option<bool>,
    lower_q: Option<f64>,
    upper_q: Option<f64>,
    min_support: Option<f64>,
    min_confidence: Option<f64>,
    top_k: Option<usize>,
    max_itemset_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BrandPatch {
    enabled: Option<bool>,
    unknown_sentinel: Option<String>,
    gender_tags: Option<Vec<String>>,
    bestseller_quantile: Option<f64>,
    min_recs: Option<usize>,
    max_recs: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    source: Option<SimilaritySource>,
    min_score: Option<f64>,
    relative_min: Option<f64>,
    positive_only: Option<bool>,
    k_min: Option<usize>,
    k_max: Option<usize>,
    min_pair_support: Option<u32>,
    q_low: Option<f64>,
    q_high: Option<f64>,
    min_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct HybridPatch {
    k: Option<usize>,
    sources: Option<Vec<HybridSource>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
