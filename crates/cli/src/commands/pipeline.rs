use cobuy_core::config::PipelineConfig;
use cobuy_core::pipeline::{Pipeline, PipelineOutputs};

use crate::commands::hybrid::stage_hybrid_outputs;
use crate::commands::tables::{read_inputs, stage_source_table, summary_line};
use crate::commands::CommandResult;

/// Every enabled source plus the fused ranking, one line per written table.
pub fn run(config: &PipelineConfig) -> CommandResult {
    CommandResult::capture("run", || {
        let pipeline = Pipeline::new(config.clone())?;
        let inputs = read_inputs(config)?;
        let outputs = pipeline.run(&inputs)?;
        write_outputs(config, &outputs)
    })
}

/// Validate and encode every table first; the output directory is only touched once all
/// of them are ready.
pub fn write_outputs(
    config: &PipelineConfig,
    outputs: &PipelineOutputs,
) -> anyhow::Result<String> {
    let mut staged = Vec::with_capacity(outputs.tables.len() + 2);
    let mut lines = Vec::with_capacity(outputs.tables.len() + 1);
    for (name, table) in &outputs.tables {
        let source = stage_source_table(config, name, table)?;
        lines.push(summary_line(name, table, &source.path));
        staged.push(source);
    }
    let (hybrid, summary) = stage_hybrid_outputs(config, &outputs.hybrid)?;
    staged.extend(hybrid);
    lines.push(summary);

    for table in &staged {
        table.commit()?;
    }
    Ok(lines.join("\n"))
}
