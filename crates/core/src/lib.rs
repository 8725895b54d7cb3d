pub mod basket;
pub mod brand;
pub mod catalog;
pub mod config;
pub mod cooccurrence;
pub mod domain;
pub mod embedding;
pub mod errors;
pub mod hybrid;
pub mod pipeline;
pub mod reduce;
pub mod rules;
pub mod stats;
pub mod table;

pub use basket::{BasketBuilder, BasketReport, BasketSet, ItemPair, ItemStats, PairStats};
pub use brand::{BrandMatchReport, CategoryBrandMatcher};
pub use catalog::{AttributeRow, Catalog, ItemAggregate};
pub use config::{ConfigError, LoadOptions, PipelineConfig};
pub use cooccurrence::{CooccurrenceReport, CooccurrenceScorer};
pub use domain::edge::{HybridEdge, NeighborEdge, ScoredPair};
pub use domain::item::{Item, ItemId};
pub use domain::order::{Basket, OrderLine};
pub use embedding::{
    EmbeddingNeighborAdapter, EmbeddingReport, InteractionLog, ItemCosine, SimilarityCollaborator,
    SimilarityMatrix, VectorCosine,
};
pub use errors::{DataError, DomainError, PipelineError};
pub use hybrid::{HybridFuser, HybridOutput};
pub use pipeline::{Inputs, Pipeline, PipelineOutputs, PipelineReport};
pub use rules::{PairRule, RuleMiner, RuleReport};
pub use table::{RecommendationTable, TieOrder, WideRow, WideSlot, WideTable};
