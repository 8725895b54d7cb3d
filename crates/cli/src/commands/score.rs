use cobuy_core::config::PipelineConfig;
use cobuy_core::pipeline::{
    Pipeline, SOURCE_BRAND, SOURCE_COOCCURRENCE, SOURCE_EMBEDDING, SOURCE_RULES,
};
use tracing::info;

use crate::commands::tables::{read_inputs, summary_line, write_source_table};
use crate::commands::CommandResult;

/// Single scoring source run on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Cooccurrence,
    Rules,
    Brand,
    Embedding,
}

impl Stage {
    pub fn source_name(self) -> &'static str {
        match self {
            Self::Cooccurrence => SOURCE_COOCCURRENCE,
            Self::Rules => SOURCE_RULES,
            Self::Brand => SOURCE_BRAND,
            Self::Embedding => SOURCE_EMBEDDING,
        }
    }
}

pub fn run(config: &PipelineConfig, stage: Stage) -> CommandResult {
    let name = stage.source_name();
    CommandResult::capture(name, || {
        let pipeline = Pipeline::new(config.clone())?;
        let inputs = read_inputs(config)?;
        let prepared = pipeline.prepare(&inputs);

        let table = match stage {
            Stage::Cooccurrence => pipeline.cooccurrence(&prepared).0,
            Stage::Rules => pipeline.rules(&prepared).0,
            Stage::Brand => pipeline.brand(&prepared)?.0,
            Stage::Embedding => match pipeline.embedding(&prepared, inputs.embeddings.as_ref())? {
                Some((table, _)) => table,
                None => return Ok("embedding source is disabled; nothing written".to_string()),
            },
        };

        let path = write_source_table(config, name, &table)?;
        info!(
            event_name = "cli.source.written",
            source = name,
            items = table.len(),
            path = %path.display(),
            "source table written"
        );
        Ok(summary_line(name, &table, &path))
    })
}
