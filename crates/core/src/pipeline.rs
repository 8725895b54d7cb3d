//! End-to-end wiring: one validated config in, every enabled source plus the fused
//! ranking out.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::basket::{BasketBuilder, BasketReport, BasketSet};
use crate::brand::{BrandMatchReport, CategoryBrandMatcher};
use crate::catalog::{item_aggregates, AttributeRow, Catalog};
use crate::config::{BasketConfig, ConfigError, PipelineConfig, SimilaritySource};
use crate::cooccurrence::{CooccurrenceReport, CooccurrenceScorer};
use crate::domain::item::ItemId;
use crate::domain::order::OrderLine;
use crate::embedding::{
    EmbeddingNeighborAdapter, EmbeddingReport, InteractionLog, ItemCosine, VectorCosine,
};
use crate::errors::PipelineError;
use crate::hybrid::{HybridFuser, HybridOutput};
use crate::rules::{RuleMiner, RuleReport};
use crate::table::RecommendationTable;

pub const SOURCE_COOCCURRENCE: &str = "cooccurrence";
pub const SOURCE_RULES: &str = "rules";
pub const SOURCE_BRAND: &str = "brand";
pub const SOURCE_EMBEDDING: &str = "embedding";

pub const SCORER_SOURCES: [&str; 4] =
    [SOURCE_COOCCURRENCE, SOURCE_RULES, SOURCE_BRAND, SOURCE_EMBEDDING];

/// Raw tables the pipeline runs on.
#[derive(Clone, Debug, Default)]
pub struct Inputs {
    pub lines: Vec<OrderLine>,
    pub available: Vec<ItemId>,
    pub attributes: Vec<AttributeRow>,
    pub embeddings: Option<VectorCosine>,
}

/// Shared intermediate state every scorer reads from.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub catalog: Catalog,
    /// Every non-denylisted line.
    pub baskets: BasketSet,
    /// Lines restricted to the available catalog.
    pub catalog_lines: Vec<OrderLine>,
    pub catalog_baskets: BasketSet,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineReport {
    pub baskets: BasketReport,
    pub cooccurrence: Option<CooccurrenceReport>,
    pub rules: Option<RuleReport>,
    pub brand: Option<BrandMatchReport>,
    pub embedding: Option<EmbeddingReport>,
}

#[derive(Clone, Debug)]
pub struct PipelineOutputs {
    /// One table per enabled scorer, keyed by source name.
    pub tables: BTreeMap<String, RecommendationTable>,
    pub hybrid: HybridOutput,
    pub report: PipelineReport,
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    fuser: HybridFuser,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(unknown) = config
            .hybrid
            .sources
            .iter()
            .find(|source| !SCORER_SOURCES.contains(&source.name.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "hybrid source `{}` is not produced by the pipeline (expected one of {})",
                unknown.name,
                SCORER_SOURCES.join("|")
            )));
        }
        let fuser = HybridFuser::new(config.hybrid.clone())?;
        Ok(Self { config, fuser })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn prepare(&self, inputs: &Inputs) -> Prepared {
        let denylist = &self.config.basket.denylist;
        let catalog = Catalog::new(inputs.available.iter().cloned(), &inputs.attributes);
        let builder = BasketBuilder::new(BasketConfig { denylist: denylist.clone() });

        let baskets = builder.build(&inputs.lines);
        let catalog_lines = catalog.restrict_lines(&inputs.lines, denylist);
        let catalog_baskets = builder.build(&catalog_lines);

        Prepared { catalog, baskets, catalog_lines, catalog_baskets }
    }

    pub fn cooccurrence(&self, prepared: &Prepared) -> (RecommendationTable, CooccurrenceReport) {
        let denylist = self.config.basket.denylist.clone();
        CooccurrenceScorer::new(self.config.cooccurrence.clone(), denylist)
            .score_with_report(&prepared.baskets, prepared.catalog.available())
    }

    pub fn rules(&self, prepared: &Prepared) -> (RecommendationTable, RuleReport) {
        RuleMiner::new(self.config.rules.clone()).mine_with_report(&prepared.catalog_baskets)
    }

    pub fn brand(
        &self,
        prepared: &Prepared,
    ) -> Result<(RecommendationTable, BrandMatchReport), PipelineError> {
        let denylist = &self.config.basket.denylist;
        let aggregates = item_aggregates(&prepared.catalog_lines, &prepared.catalog, denylist);
        Ok(CategoryBrandMatcher::new(self.config.brand.clone()).match_with_report(&aggregates)?)
    }

    /// `Ok(None)` when the similarity source is disabled.
    pub fn embedding(
        &self,
        prepared: &Prepared,
        vectors: Option<&VectorCosine>,
    ) -> Result<Option<(RecommendationTable, EmbeddingReport)>, PipelineError> {
        let config = &self.config.embedding;
        let adapter =
            EmbeddingNeighborAdapter::new(config.clone(), self.config.basket.denylist.clone());
        let log = InteractionLog::from_lines(&prepared.catalog_lines);
        let pair_stats = &prepared.catalog_baskets.pair_stats;
        let available = prepared.catalog.available();

        let ranked = match config.source {
            SimilaritySource::Disabled => return Ok(None),
            SimilaritySource::ItemCosine => {
                adapter.neighbors(&ItemCosine, &log, pair_stats, available)?
            }
            SimilaritySource::VectorCosine => {
                let vectors = vectors.cloned().ok_or_else(|| {
                    ConfigError::Validation(
                        "embedding.source = vector_cosine requires paths.embeddings".to_string(),
                    )
                })?;
                let vectors = match config.min_price {
                    Some(min_price) => {
                        vectors.restricted_to(&prepared.catalog.priced_at_least(min_price))
                    }
                    None => vectors,
                };
                adapter.neighbors(&vectors, &log, pair_stats, available)?
            }
        };
        Ok(Some(ranked))
    }

    /// Fuse named tables; configured sources without a table fuse as empty.
    pub fn fuse(
        &self,
        tables: &BTreeMap<String, RecommendationTable>,
    ) -> Result<HybridOutput, PipelineError> {
        let mut wide = BTreeMap::new();
        for name in self.fuser.source_names() {
            let table = match tables.get(name) {
                Some(table) => table.to_wide(),
                None => {
                    warn!(
                        event_name = "pipeline.hybrid.source_missing",
                        source = name,
                        "fusing a disabled source as empty"
                    );
                    RecommendationTable::empty(self.fuser.k()).to_wide()
                }
            };
            wide.insert(name.to_owned(), table);
        }
        self.fuser.fuse(&wide)
    }

    pub fn run(&self, inputs: &Inputs) -> Result<PipelineOutputs, PipelineError> {
        let started = Instant::now();
        info!(
            event_name = "pipeline.run.started",
            lines = inputs.lines.len(),
            available = inputs.available.len(),
            attribute_rows = inputs.attributes.len(),
            "pipeline run started"
        );

        let prepared = self.prepare(inputs);
        let mut report =
            PipelineReport { baskets: prepared.baskets.report.clone(), ..Default::default() };
        let mut tables = BTreeMap::new();

        if self.config.cooccurrence.enabled {
            let (table, stage) = self.cooccurrence(&prepared);
            tables.insert(SOURCE_COOCCURRENCE.to_owned(), table);
            report.cooccurrence = Some(stage);
        }
        if self.config.rules.enabled {
            let (table, stage) = self.rules(&prepared);
            tables.insert(SOURCE_RULES.to_owned(), table);
            report.rules = Some(stage);
        }
        if self.config.brand.enabled {
            let (table, stage) = self.brand(&prepared)?;
            tables.insert(SOURCE_BRAND.to_owned(), table);
            report.brand = Some(stage);
        }
        if let Some((table, stage)) = self.embedding(&prepared, inputs.embeddings.as_ref())? {
            tables.insert(SOURCE_EMBEDDING.to_owned(), table);
            report.embedding = Some(stage);
        }

        let hybrid = self.fuse(&tables)?;

        info!(
            event_name = "pipeline.run.completed",
            sources = tables.len(),
            hybrid_items = hybrid.table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run completed"
        );

        Ok(PipelineOutputs { tables, hybrid, report })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Inputs, Pipeline, SOURCE_BRAND, SOURCE_COOCCURRENCE};
    use crate::catalog::AttributeRow;
    use crate::config::{ConfigError, HybridSource, PipelineConfig, SimilaritySource};
    use crate::domain::item::ItemId;
    use crate::domain::order::OrderLine;
    use crate::errors::PipelineError;

    fn inputs() -> Inputs {
        let created = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        let orders: [(&str, &[&str]); 3] =
            [("o1", &["X", "Y"]), ("o2", &["X", "Y"]), ("o3", &["X", "Z"])];
        let lines = orders
            .iter()
            .flat_map(|(order, items)| {
                items.iter().map(move |item| OrderLine::new(*order, *item, created))
            })
            .collect();
        Inputs {
            lines,
            available: ["X", "Y", "Z"].into_iter().map(ItemId::from).collect(),
            attributes: Vec::<AttributeRow>::new(),
            embeddings: None,
        }
    }

    fn loose_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.cooccurrence.min_item_support = 1;
        config.cooccurrence.min_pair_support = 1;
        config
    }

    #[test]
    fn run_produces_every_enabled_source_and_fuses() -> Result<(), String> {
        let pipeline = Pipeline::new(loose_config()).map_err(|err| err.to_string())?;
        let outputs = pipeline.run(&inputs()).map_err(|err| err.to_string())?;

        assert_eq!(outputs.report.baskets.baskets, 3);
        let cooccurrence = &outputs.tables[SOURCE_COOCCURRENCE];
        let top = cooccurrence.get(&ItemId::from("X")).map(|edges| edges[0].target.clone());
        assert_eq!(top, Some(ItemId::from("Y")));
        assert!(outputs.tables[SOURCE_BRAND].is_empty(), "no attributes, no brand edges");

        let fused = outputs.hybrid.table.get(&ItemId::from("X")).unwrap_or_default();
        assert_eq!(fused[0].target, ItemId::from("Y"));
        Ok(())
    }

    #[test]
    fn disabled_sources_fuse_as_empty() -> Result<(), String> {
        let mut config = loose_config();
        config.rules.enabled = false;
        config.embedding.source = SimilaritySource::Disabled;
        let pipeline = Pipeline::new(config).map_err(|err| err.to_string())?;
        let outputs = pipeline.run(&inputs()).map_err(|err| err.to_string())?;

        assert!(!outputs.tables.contains_key("rules"));
        assert!(outputs.report.embedding.is_none());
        assert!(!outputs.hybrid.table.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_hybrid_source_is_rejected_up_front() {
        let mut config = PipelineConfig::default();
        config.hybrid.sources.push(HybridSource::new("popularity", 1.0));
        assert!(matches!(Pipeline::new(config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn vector_source_without_vectors_is_a_config_error() -> Result<(), String> {
        let mut config = loose_config();
        config.embedding.source = SimilaritySource::VectorCosine;
        let pipeline = Pipeline::new(config).map_err(|err| err.to_string())?;
        let result = pipeline.run(&inputs());
        assert!(matches!(result, Err(PipelineError::Config(_))));
        Ok(())
    }
}
