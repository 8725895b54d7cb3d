use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use cobuy_cli::commands::score::Stage;
use cobuy_cli::commands::{classify, config, hybrid, pipeline, score};
use cobuy_core::config::{LoadOptions, PipelineConfig};
use cobuy_core::domain::item::ItemId;
use cobuy_core::hybrid::HybridOutput;
use cobuy_core::pipeline::{PipelineOutputs, PipelineReport};
use cobuy_core::table::RecommendationTable;
use serde_json::Value;
use tempfile::TempDir;

const TRANSACTIONS: &str = "order_id,item_id,created,customer_id\n\
o1,A,2024-01-01 10:00:00,c1\n\
o1,B,2024-01-01 10:00:00,c1\n\
o2,A,2024-01-02 10:00:00,c2\n\
o2,B,2024-01-02 10:00:00,c2\n\
o3,A,2024-01-03 10:00:00,c3\n\
o3,C,2024-01-03 10:00:00,c3\n\
o4,B,2024-01-04 10:00:00,c4\n\
o4,C,2024-01-04 10:00:00,c4\n";

const AVAILABLE: &str = "item_id\nA\nB\nC\n";

const ATTRIBUTES: &str = "item_id,brand,category,audience\n\
A,Acme,\"Dam, Skor\",Vuxen\n\
B,Acme,\"Dam, Skor\",Vuxen\n\
C,Acme,\"Herr, Skor\",Vuxen\n";

#[test]
fn cooccurrence_writes_wide_table_and_reports_ok() {
    let (_dir, config) = fixture(TRANSACTIONS);

    let result = score::run(&config, Stage::Cooccurrence);
    assert_eq!(result.exit_code, 0, "expected success, got {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "cooccurrence");
    assert_eq!(payload["status"], "ok");

    let written = read(&config.paths.output("cooccurrence.csv"));
    let lines: Vec<&str> = written.lines().collect();
    assert!(lines[0].starts_with("Product ID,Top 1,Score 1,Top 2,Score 2"));
    assert!(lines[1].starts_with("A,B,0.5,"), "unexpected row: {}", lines[1]);
    assert!(lines[2].starts_with("B,A,0.5,"), "unexpected row: {}", lines[2]);
}

#[test]
fn run_writes_every_source_and_the_hybrid_outputs() {
    let (_dir, config) = fixture(TRANSACTIONS);

    let result = pipeline::run(&config);
    assert_eq!(result.exit_code, 0, "expected success, got {}", result.output);
    assert_eq!(parse_payload(&result.output)["command"], "run");

    for name in ["cooccurrence.csv", "rules.csv", "brand.csv", "embedding.csv", "hybrid.csv"] {
        assert!(config.paths.output(name).exists(), "{name} should be written");
    }

    let fused = read(&config.paths.output(hybrid::HYBRID_FILE));
    let row_a = fused.lines().find(|line| line.starts_with("A,")).unwrap_or_default();
    assert!(row_a.starts_with("A,B,"), "B should lead A's fused ranking: {row_a}");

    let edges = read(&config.paths.output(hybrid::HYBRID_EDGES_FILE));
    assert_eq!(
        edges.lines().next(),
        Some("product_id,rec_id,score_cooccurrence,score_rules,score_embedding,hybrid_score")
    );
}

#[test]
fn run_writes_nothing_when_a_later_table_is_invalid() {
    let (_dir, config) = fixture(TRANSACTIONS);
    let edge = |from: &str, to: &str, score: f64| {
        let neighbors = vec![(ItemId::from(to), score)];
        RecommendationTable::from_ranked(10, vec![(ItemId::from(from), neighbors)])
    };
    // brand sorts first and is valid; rules carries a self edge
    let tables = BTreeMap::from([
        ("brand".to_owned(), edge("A", "B", 3.0)),
        ("rules".to_owned(), edge("B", "B", 1.0)),
    ]);
    let outputs = PipelineOutputs {
        tables,
        hybrid: HybridOutput {
            sources: vec!["brand".to_owned(), "rules".to_owned()],
            table: edge("A", "B", 3.0),
            edges: Vec::new(),
        },
        report: PipelineReport::default(),
    };

    let error = match pipeline::write_outputs(&config, &outputs) {
        Ok(summary) => panic!("invalid rules table was written: {summary}"),
        Err(error) => error,
    };
    assert_eq!(classify(&error), ("invariant_violation", 1));
    assert!(!config.paths.output_dir.exists(), "no output may be written before validation");
}

#[test]
fn hybrid_fuses_previously_written_sources() {
    let (_dir, config) = fixture(TRANSACTIONS);
    for stage in [Stage::Cooccurrence, Stage::Rules, Stage::Embedding] {
        let result = score::run(&config, stage);
        assert_eq!(result.exit_code, 0, "stage {stage:?} failed: {}", result.output);
    }

    let result = hybrid::run(&config);
    assert_eq!(result.exit_code, 0, "expected success, got {}", result.output);
    assert_eq!(parse_payload(&result.output)["status"], "ok");
    assert!(config.paths.output(hybrid::HYBRID_FILE).exists());
}

#[test]
fn hybrid_without_source_tables_is_an_io_failure() {
    let (_dir, config) = fixture(TRANSACTIONS);

    let result = hybrid::run(&config);
    assert_eq!(result.exit_code, 4, "expected io failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "io");
}

#[test]
fn missing_column_is_a_data_validation_failure() {
    let (_dir, config) = fixture("order_id,item_id\no1,A\n");

    let result = score::run(&config, Stage::Rules);
    assert_eq!(result.exit_code, 3, "expected data validation failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "rules");
    assert_eq!(payload["error_class"], "data_validation");
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.contains("created"), "message should name the column: {message}");
}

#[test]
fn unknown_hybrid_source_is_a_config_failure() {
    let (_dir, mut config) = fixture(TRANSACTIONS);
    config.hybrid.sources[0].name = "popularity".to_owned();

    let result = score::run(&config, Stage::Cooccurrence);
    assert_eq!(result.exit_code, 2, "expected config validation failure code");
    assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
}

#[test]
fn config_reports_env_attribution() {
    with_env(&[("COBUY_HYBRID_K", "7")], || {
        let output = config::run(&LoadOptions::default());
        assert!(output.starts_with("effective config"));
        assert!(output.contains("- hybrid.k = 7 (source: env (COBUY_HYBRID_K))"), "{output}");
        assert!(output.contains("- cooccurrence.topk = 10 (source: default)"), "{output}");
    });
}

#[test]
fn config_reports_invalid_env_override() {
    with_env(&[("COBUY_HYBRID_K", "ten")], || {
        let output = config::run(&LoadOptions::default());
        assert!(output.starts_with("config validation failed"), "{output}");
    });
}

fn fixture(transactions: &str) -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let input = dir.path().join("input");
    fs::create_dir_all(&input).expect("input dir should be created");
    fs::write(input.join("transactions.csv"), transactions).expect("transactions written");
    fs::write(input.join("available_items.csv"), AVAILABLE).expect("available written");
    fs::write(input.join("item_attributes.csv"), ATTRIBUTES).expect("attributes written");

    let mut config = PipelineConfig::default();
    config.paths.input_dir = input;
    config.paths.output_dir = dir.path().join("recs");
    (dir, config)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|error| panic!("{} unreadable: {error}", path.display()))
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "COBUY_INPUT_DIR",
        "COBUY_OUTPUT_DIR",
        "COBUY_DENYLIST",
        "COBUY_COOCCURRENCE_TOPK",
        "COBUY_COOCCURRENCE_MIN_PAIR_SUPPORT",
        "COBUY_RULES_MIN_SUPPORT",
        "COBUY_RULES_MIN_CONFIDENCE",
        "COBUY_EMBEDDING_SOURCE",
        "COBUY_HYBRID_K",
        "COBUY_LOGGING_LEVEL",
        "COBUY_LOGGING_FORMAT",
        "COBUY_LOG_LEVEL",
        "COBUY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
