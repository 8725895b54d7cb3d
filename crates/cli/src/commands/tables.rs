use std::path::PathBuf;

use anyhow::Context;
use cobuy_core::config::{PipelineConfig, SimilaritySource};
use cobuy_core::pipeline::Inputs;
use cobuy_core::table::RecommendationTable;
use cobuy_io::{
    read_attributes, read_available, read_embeddings, read_transactions, stage_wide, StagedTable,
};

/// Load the configured input tables. Embedding vectors are read only when the vector
/// collaborator is selected.
pub fn read_inputs(config: &PipelineConfig) -> anyhow::Result<Inputs> {
    let paths = &config.paths;
    let transactions = paths.input(&paths.transactions);
    let available = paths.input(&paths.available);
    let attributes = paths.input(&paths.attributes);

    let lines = read_transactions(&transactions)
        .with_context(|| format!("reading {}", transactions.display()))?;
    let available_items =
        read_available(&available).with_context(|| format!("reading {}", available.display()))?;
    let attribute_rows = read_attributes(&attributes)
        .with_context(|| format!("reading {}", attributes.display()))?;

    let embeddings = match (config.embedding.source, paths.embeddings.as_deref()) {
        (SimilaritySource::VectorCosine, Some(file_name)) => {
            let path = paths.input(file_name);
            Some(read_embeddings(&path).with_context(|| format!("reading {}", path.display()))?)
        }
        _ => None,
    };

    Ok(Inputs { lines, available: available_items, attributes: attribute_rows, embeddings })
}

/// Output file for a named source: the hybrid entry's `path` when configured, else `<name>.csv`.
pub fn source_path(config: &PipelineConfig, name: &str) -> PathBuf {
    let file_name = config
        .hybrid
        .sources
        .iter()
        .find(|source| source.name == name)
        .map(|source| source.file_name())
        .unwrap_or_else(|| format!("{name}.csv"));
    config.paths.output(&file_name)
}

/// Check the table's invariants and encode it in wide form without touching disk.
pub fn stage_source_table(
    config: &PipelineConfig,
    name: &str,
    table: &RecommendationTable,
) -> anyhow::Result<StagedTable> {
    table.validate(name)?;
    Ok(stage_wide(&source_path(config, name), &table.to_wide())?)
}

pub fn write_source_table(
    config: &PipelineConfig,
    name: &str,
    table: &RecommendationTable,
) -> anyhow::Result<PathBuf> {
    let staged = stage_source_table(config, name, table)?;
    staged.commit()?;
    Ok(staged.path)
}

pub fn summary_line(name: &str, table: &RecommendationTable, path: &std::path::Path) -> String {
    format!(
        "{name}: {items} items, {edges} edges -> {path}",
        items = table.len(),
        edges = table.edge_count(),
        path = path.display()
    )
}
