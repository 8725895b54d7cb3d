use std::env;
use std::fs;
use std::path::Path;

use cobuy_core::config::{resolve_config_path, LoadOptions, PipelineConfig};
use toml::Value;

/// One reported setting: dotted key, rendered value, env keys that can set it, CLI flag.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    cli_flag: Option<(&'static str, bool)>,
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self { key, value: value.into(), env_keys: &[], cli_flag: None }
    }

    fn env(mut self, env_keys: &'static [&'static str]) -> Self {
        self.env_keys = env_keys;
        self
    }

    fn cli(mut self, flag: &'static str, set: bool) -> Self {
        self.cli_flag = Some((flag, set));
        self
    }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match PipelineConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let fields = vec![
        Field::new("paths.input_dir", config.paths.input_dir.display().to_string())
            .env(&["COBUY_INPUT_DIR"])
            .cli("--input-dir", overrides.input_dir.is_some()),
        Field::new("paths.output_dir", config.paths.output_dir.display().to_string())
            .env(&["COBUY_OUTPUT_DIR"])
            .cli("--output-dir", overrides.output_dir.is_some()),
        Field::new("paths.transactions", config.paths.transactions.clone()),
        Field::new("paths.available", config.paths.available.clone()),
        Field::new("paths.attributes", config.paths.attributes.clone()),
        Field::new("paths.embeddings", config.paths.embeddings.as_deref().unwrap_or("<unset>")),
        Field::new("basket.denylist", join(config.basket.denylist.iter().map(|id| id.as_str())))
            .env(&["COBUY_DENYLIST"]),
        Field::new("cooccurrence.enabled", config.cooccurrence.enabled.to_string()),
        Field::new(
            "cooccurrence.min_pair_support",
            config.cooccurrence.min_pair_support.to_string(),
        )
        .env(&["COBUY_COOCCURRENCE_MIN_PAIR_SUPPORT"]),
        Field::new("cooccurrence.topk", config.cooccurrence.topk.to_string())
            .env(&["COBUY_COOCCURRENCE_TOPK"]),
        Field::new("rules.enabled", config.rules.enabled.to_string()),
        Field::new("rules.min_support", config.rules.min_support.to_string())
            .env(&["COBUY_RULES_MIN_SUPPORT"]),
        Field::new("rules.min_confidence", config.rules.min_confidence.to_string())
            .env(&["COBUY_RULES_MIN_CONFIDENCE"]),
        Field::new("brand.enabled", config.brand.enabled.to_string()),
        Field::new("brand.bestseller_quantile", config.brand.bestseller_quantile.to_string()),
        Field::new("embedding.source", format!("{:?}", config.embedding.source))
            .env(&["COBUY_EMBEDDING_SOURCE"]),
        Field::new("embedding.k_max", config.embedding.k_max.to_string()),
        Field::new("hybrid.k", config.hybrid.k.to_string())
            .env(&["COBUY_HYBRID_K"])
            .cli("--k", overrides.hybrid_k.is_some()),
        Field::new(
            "hybrid.sources",
            join(
                config
                    .hybrid
                    .sources
                    .iter()
                    .map(|source| format!("{}*{}", source.name, source.weight)),
            ),
        ),
        Field::new("logging.level", config.logging.level.clone())
            .env(&["COBUY_LOGGING_LEVEL", "COBUY_LOG_LEVEL"])
            .cli("--log-level", overrides.log_level.is_some()),
        Field::new("logging.format", format!("{:?}", config.logging.format))
            .env(&["COBUY_LOGGING_FORMAT", "COBUY_LOG_FORMAT"])
            .cli("--log-format", overrides.log_format.is_some()),
    ];

    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn join<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = values.into_iter().map(|value| value.as_ref().to_owned()).collect::<Vec<_>>();
    if joined.is_empty() {
        "<empty>".to_string()
    } else {
        joined.join(",")
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some((flag, true)) = field.cli_flag {
        return format!("cli ({flag})");
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
