use std::path::{Path, PathBuf};

use cobuy_core::domain::edge::HybridEdge;
use cobuy_core::table::WideTable;
use csv::Writer;
use tracing::debug;

use crate::atomic::write_atomic;
use crate::errors::TableIoError;

pub const HYBRID_ITEM_COLUMN: &str = "product_id";
pub const HYBRID_NEIGHBOR_COLUMN: &str = "rec_id";
pub const HYBRID_SCORE_COLUMN: &str = "hybrid_score";

/// A fully encoded table waiting to be committed to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedTable {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl StagedTable {
    pub fn commit(&self) -> Result<(), TableIoError> {
        write_atomic(&self.path, &self.bytes)
    }
}

/// `Product ID, Top 1, Score 1, …`; absent ranks are written as empty cells.
pub fn stage_wide(path: &Path, table: &WideTable) -> Result<StagedTable, TableIoError> {
    let bytes = encode_wide(table).map_err(|source| encode_error(path, source))?;
    debug!(
        event_name = "io.wide.staged",
        path = %path.display(),
        rows = table.len(),
        k = table.k,
        "wide table encoded"
    );
    Ok(StagedTable { path: path.to_path_buf(), bytes })
}

pub fn encode_wide(table: &WideTable) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for row in &table.rows {
        let mut record = Vec::with_capacity(1 + table.k * 2);
        record.push(row.item.as_ref().map(|item| item.as_str().to_owned()).unwrap_or_default());
        for rank in 0..table.k {
            let slot = row.slots.get(rank);
            record.push(
                slot.and_then(|slot| slot.top.as_ref())
                    .map(|top| top.as_str().to_owned())
                    .unwrap_or_default(),
            );
            if table.has_scores {
                record.push(
                    slot.and_then(|slot| slot.score).map(format_score).unwrap_or_default(),
                );
            }
        }
        writer.write_record(&record)?;
    }
    into_bytes(writer)
}

/// Long fused edges with one `score_<source>` column per source, in source order.
pub fn stage_hybrid_edges(
    path: &Path,
    sources: &[String],
    edges: &[HybridEdge],
) -> Result<StagedTable, TableIoError> {
    let bytes = encode_hybrid_edges(sources, edges).map_err(|source| encode_error(path, source))?;
    debug!(
        event_name = "io.hybrid_edges.staged",
        path = %path.display(),
        edges = edges.len(),
        "hybrid edges encoded"
    );
    Ok(StagedTable { path: path.to_path_buf(), bytes })
}

pub fn encode_hybrid_edges(
    sources: &[String],
    edges: &[HybridEdge],
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    let mut header = vec![HYBRID_ITEM_COLUMN.to_owned(), HYBRID_NEIGHBOR_COLUMN.to_owned()];
    header.extend(sources.iter().map(|source| format!("score_{source}")));
    header.push(HYBRID_SCORE_COLUMN.to_owned());
    writer.write_record(&header)?;

    for edge in edges {
        let mut record = vec![edge.item.as_str().to_owned(), edge.neighbor.as_str().to_owned()];
        record.extend((0..sources.len()).map(|slot| {
            edge.source_scores.get(slot).copied().flatten().map(format_score).unwrap_or_default()
        }));
        record.push(format_score(edge.combined_score));
        writer.write_record(&record)?;
    }
    into_bytes(writer)
}

fn format_score(score: f64) -> String {
    score.to_string()
}

fn into_bytes(writer: Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer.into_inner().map_err(|err| csv::Error::from(err.into_error()))
}

fn encode_error(path: &Path, source: csv::Error) -> TableIoError {
    TableIoError::Encode { path: path.to_path_buf(), source }
}
