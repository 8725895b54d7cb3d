use std::collections::BTreeMap;

use anyhow::Context;
use cobuy_core::config::PipelineConfig;
use cobuy_core::hybrid::{HybridFuser, HybridOutput};
use cobuy_io::{read_wide, stage_hybrid_edges, stage_wide, StagedTable};
use tracing::warn;

use crate::commands::tables::source_path;
use crate::commands::CommandResult;

pub const HYBRID_FILE: &str = "hybrid.csv";
pub const HYBRID_EDGES_FILE: &str = "hybrid_edges.csv";

/// Fuse the wide tables already present in the output directory.
pub fn run(config: &PipelineConfig) -> CommandResult {
    CommandResult::capture("hybrid", || {
        let fuser = HybridFuser::new(config.hybrid.clone())?;

        let mut tables = BTreeMap::new();
        for source in &config.hybrid.sources {
            let path = source_path(config, &source.name);
            let table = read_wide(&path)
                .with_context(|| format!("reading source `{}` table", source.name))?;
            if !table.has_scores {
                warn!(
                    event_name = "cli.hybrid.scoreless_source",
                    source = %source.name,
                    path = %path.display(),
                    "source table has no score columns and contributes nothing"
                );
            }
            tables.insert(source.name.clone(), table);
        }

        let output = fuser.fuse(&tables)?;
        let (staged, summary) = stage_hybrid_outputs(config, &output)?;
        for table in &staged {
            table.commit()?;
        }
        Ok(summary)
    })
}

/// Validate and encode the fused wide table and its long edge table, plus a summary line.
pub fn stage_hybrid_outputs(
    config: &PipelineConfig,
    output: &HybridOutput,
) -> anyhow::Result<(Vec<StagedTable>, String)> {
    output.table.validate("hybrid")?;
    let wide_path = config.paths.output(HYBRID_FILE);
    let edges_path = config.paths.output(HYBRID_EDGES_FILE);
    let wide = stage_wide(&wide_path, &output.wide())?;
    let edges = stage_hybrid_edges(&edges_path, &output.sources, &output.edges)?;

    let summary = format!(
        "hybrid: {items} items, {kept} ranked edges ({joined} joined) from {sources} -> {path}",
        items = output.table.len(),
        kept = output.table.edge_count(),
        joined = output.edges.len(),
        sources = output.sources.join("+"),
        path = wide_path.display()
    );
    Ok((vec![wide, edges], summary))
}
