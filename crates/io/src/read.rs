//! CSV readers for the pipeline's input tables and for previously written wide tables.
//!
//! Every reader checks its required columns up front so a malformed file fails before
//! any row is parsed.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use cobuy_core::catalog::AttributeRow;
use cobuy_core::domain::item::ItemId;
use cobuy_core::domain::order::OrderLine;
use cobuy_core::embedding::VectorCosine;
use cobuy_core::errors::DataError;
use cobuy_core::table::{WideRow, WideSlot, WideTable, ID_COLUMN, SCORE_PREFIX, TOP_PREFIX};
use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::Array2;
use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::TableIoError;

pub const TRANSACTIONS_TABLE: &str = "transactions";
pub const AVAILABLE_TABLE: &str = "available_items";
pub const ATTRIBUTES_TABLE: &str = "item_attributes";
pub const EMBEDDINGS_TABLE: &str = "item_embeddings";

/// Header-indexed view over one CSV source.
struct Table<R> {
    name: String,
    reader: csv::Reader<R>,
    headers: StringRecord,
}

impl<R: Read> Table<R> {
    fn new(name: impl Into<String>, source: R) -> Result<Self, TableIoError> {
        let name = name.into();
        let mut reader = ReaderBuilder::new().trim(Trim::All).flexible(false).from_reader(source);
        let headers = reader
            .headers()
            .map_err(|source| TableIoError::Read { table: name.clone(), source })?
            .clone();
        Ok(Self { name, reader, headers })
    }

    fn required(&self, column: &str) -> Result<usize, DataError> {
        self.optional(column).ok_or_else(|| DataError::MissingColumn {
            table: self.name.clone(),
            column: column.to_owned(),
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }

    /// Data rows with their 1-based row number.
    fn rows(&mut self) -> impl Iterator<Item = Result<(usize, StringRecord), TableIoError>> + '_ {
        let name = self.name.clone();
        self.reader.records().enumerate().map(move |(index, record)| {
            record
                .map(|record| (index + 1, record))
                .map_err(|source| TableIoError::Read { table: name.clone(), source })
        })
    }

    fn price(&self, row: usize, raw: Option<&str>) -> Result<Option<Decimal>, DataError> {
        raw.map(|raw| Decimal::from_str(raw).map_err(|_| self.invalid(row, "price", raw)))
            .transpose()
    }

    fn invalid(&self, row: usize, column: &str, value: &str) -> DataError {
        DataError::InvalidValue {
            table: self.name.clone(),
            row,
            column: column.to_owned(),
            value: value.to_owned(),
        }
    }
}

fn open(path: &Path) -> Result<File, TableIoError> {
    File::open(path).map_err(|source| TableIoError::Open {
        path: path.to_path_buf(),
        source: csv::Error::from(source),
    })
}

fn cell(record: &StringRecord, index: usize) -> Option<&str> {
    record.get(index).filter(|value| !value.is_empty())
}

fn optional_cell(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index.and_then(|index| cell(record, index))
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` or a bare date; naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn read_transactions(path: &Path) -> Result<Vec<OrderLine>, TableIoError> {
    parse_transactions(open(path)?)
}

/// Columns `order_id, item_id, created` plus optional `customer_id` and `price`.
pub fn parse_transactions<R: Read>(source: R) -> Result<Vec<OrderLine>, TableIoError> {
    let mut table = Table::new(TRANSACTIONS_TABLE, source)?;
    let order_col = table.required("order_id")?;
    let item_col = table.required("item_id")?;
    let created_col = table.required("created")?;
    let customer_col = table.optional("customer_id");
    let price_col = table.optional("price");

    let mut lines = Vec::new();
    let mut skipped = 0usize;
    let rows: Vec<(usize, StringRecord)> = table.rows().collect::<Result<_, _>>()?;
    for (row, record) in rows {
        let (Some(order_id), Some(item_id)) = (cell(&record, order_col), cell(&record, item_col))
        else {
            skipped += 1;
            continue;
        };
        let raw_created = cell(&record, created_col).unwrap_or_default();
        let created = parse_timestamp(raw_created)
            .ok_or_else(|| table.invalid(row, "created", raw_created))?;
        let price = table.price(row, optional_cell(&record, price_col))?;

        let mut line = OrderLine::new(order_id, item_id, created);
        line.customer_id = optional_cell(&record, customer_col).map(str::to_owned);
        line.price = price;
        lines.push(line);
    }

    debug!(
        event_name = "io.transactions.read",
        lines = lines.len(),
        skipped_missing_ids = skipped,
        "transactions read"
    );
    Ok(lines)
}

pub fn read_available(path: &Path) -> Result<Vec<ItemId>, TableIoError> {
    parse_available(open(path)?)
}

/// Column `item_id`; blank ids are skipped.
pub fn parse_available<R: Read>(source: R) -> Result<Vec<ItemId>, TableIoError> {
    let mut table = Table::new(AVAILABLE_TABLE, source)?;
    let item_col = table.required("item_id")?;

    let mut items = Vec::new();
    for row in table.rows() {
        let (_, record) = row?;
        if let Some(item) = cell(&record, item_col) {
            items.push(ItemId::from(item));
        }
    }
    Ok(items)
}

pub fn read_attributes(path: &Path) -> Result<Vec<AttributeRow>, TableIoError> {
    parse_attributes(open(path)?)
}

/// Columns `item_id, brand, category, audience` plus optional `price`. Items may repeat.
pub fn parse_attributes<R: Read>(source: R) -> Result<Vec<AttributeRow>, TableIoError> {
    let mut table = Table::new(ATTRIBUTES_TABLE, source)?;
    let item_col = table.required("item_id")?;
    let brand_col = table.required("brand")?;
    let category_col = table.required("category")?;
    let audience_col = table.required("audience")?;
    let price_col = table.optional("price");

    let rows: Vec<(usize, StringRecord)> = table.rows().collect::<Result<_, _>>()?;
    let mut attributes = Vec::with_capacity(rows.len());
    for (row, record) in rows {
        let Some(item_id) = cell(&record, item_col) else {
            continue;
        };
        let price = table.price(row, optional_cell(&record, price_col))?;
        attributes.push(AttributeRow {
            item_id: ItemId::from(item_id),
            brand: cell(&record, brand_col).map(str::to_owned),
            category: cell(&record, category_col).map(str::to_owned),
            audience: cell(&record, audience_col).map(str::to_owned),
            price,
        });
    }
    Ok(attributes)
}

pub fn read_embeddings(path: &Path) -> Result<VectorCosine, TableIoError> {
    parse_embeddings(open(path)?)
}

/// Column `item_id` followed by one numeric column per embedding dimension.
pub fn parse_embeddings<R: Read>(source: R) -> Result<VectorCosine, TableIoError> {
    let mut table = Table::new(EMBEDDINGS_TABLE, source)?;
    let item_col = table.required("item_id")?;
    let dimensions: Vec<(usize, String)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != item_col)
        .map(|(index, name)| (index, name.to_owned()))
        .collect();
    if dimensions.is_empty() {
        return Err(DataError::ShapeMismatch(format!(
            "table `{EMBEDDINGS_TABLE}` has no dimension columns"
        ))
        .into());
    }

    let rows: Vec<(usize, StringRecord)> = table.rows().collect::<Result<_, _>>()?;
    let mut ids = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len() * dimensions.len());
    for (row, record) in rows {
        let raw_id = cell(&record, item_col).unwrap_or_default();
        if raw_id.is_empty() {
            return Err(table.invalid(row, "item_id", raw_id).into());
        }
        ids.push(ItemId::from(raw_id));
        for (index, name) in &dimensions {
            let raw = cell(&record, *index).unwrap_or_default();
            let value = raw.parse::<f64>().map_err(|_| table.invalid(row, name, raw))?;
            values.push(value);
        }
    }

    let vectors = Array2::from_shape_vec((ids.len(), dimensions.len()), values)
        .map_err(|err| DataError::ShapeMismatch(err.to_string()))?;
    Ok(VectorCosine::new(ids, vectors)?)
}

pub fn read_wide(path: &Path) -> Result<WideTable, TableIoError> {
    let name = path.display().to_string();
    parse_wide(name, open(path)?)
}

/// `Product ID, Top 1[, Score 1], …`. Ranks without a `Score r` column carry no scores.
pub fn parse_wide<R: Read>(name: impl Into<String>, source: R) -> Result<WideTable, TableIoError> {
    let mut table = Table::new(name, source)?;
    let id_col = table.required(ID_COLUMN)?;

    let mut tops: BTreeMap<usize, usize> = BTreeMap::new();
    let mut scores: BTreeMap<usize, usize> = BTreeMap::new();
    for (index, header) in table.headers.iter().enumerate() {
        if let Some(rank) = rank_suffix(header, TOP_PREFIX) {
            tops.insert(rank, index);
        } else if let Some(rank) = rank_suffix(header, SCORE_PREFIX) {
            scores.insert(rank, index);
        }
    }
    let k = tops.keys().next_back().copied().unwrap_or(0);
    let has_scores = !tops.is_empty() && tops.keys().all(|rank| scores.contains_key(rank));

    let rows: Vec<(usize, StringRecord)> = table.rows().collect::<Result<_, _>>()?;
    let mut wide_rows = Vec::with_capacity(rows.len());
    for (row, record) in rows {
        let mut slots = Vec::with_capacity(k);
        for rank in 1..=k {
            let top = tops.get(&rank).and_then(|&index| cell(&record, index)).map(ItemId::from);
            let score = match scores.get(&rank).and_then(|&index| cell(&record, index)) {
                Some(raw) => Some(
                    raw.parse::<f64>()
                        .map_err(|_| table.invalid(row, &format!("{SCORE_PREFIX}{rank}"), raw))?,
                ),
                None => None,
            };
            slots.push(WideSlot { top, score });
        }
        wide_rows.push(WideRow { item: cell(&record, id_col).map(ItemId::from), slots });
    }

    Ok(WideTable { k, has_scores, rows: wide_rows })
}

fn rank_suffix(header: &str, prefix: &str) -> Option<usize> {
    header.strip_prefix(prefix)?.parse::<usize>().ok().filter(|rank| *rank > 0)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use cobuy_core::domain::item::ItemId;
    use cobuy_core::errors::DataError;
    use rust_decimal::Decimal;

    use super::{
        parse_attributes, parse_available, parse_embeddings, parse_timestamp, parse_transactions,
        parse_wide,
    };
    use crate::errors::TableIoError;

    #[test]
    fn timestamps_accept_common_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single();
        assert_eq!(parse_timestamp("2024-03-01T09:30:00Z"), expected);
        assert_eq!(parse_timestamp("2024-03-01 09:30:00"), expected);
        assert_eq!(parse_timestamp("2024-03-01 09:30:00.000"), expected);
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single()
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn transactions_parse_optional_columns() -> Result<(), String> {
        let csv = "order_id,item_id,created,customer_id,price\n\
                   o1, A ,2024-03-01 09:30:00,c1,199.00\n\
                   o1,B,2024-03-01 09:31:00,,\n\
                   ,C,2024-03-01 09:31:00,,\n";
        let lines = parse_transactions(csv.as_bytes()).map_err(|err| err.to_string())?;

        assert_eq!(lines.len(), 2, "rows without an order id are skipped");
        assert_eq!(lines[0].item_id, ItemId::from("A"));
        assert_eq!(lines[0].customer_id.as_deref(), Some("c1"));
        assert_eq!(lines[0].price, Some(Decimal::new(19900, 2)));
        assert_eq!(lines[1].customer_id, None);
        Ok(())
    }

    #[test]
    fn missing_required_column_is_reported() {
        let result = parse_transactions("order_id,item_id\no1,A\n".as_bytes());
        assert!(matches!(
            result,
            Err(TableIoError::Data(DataError::MissingColumn { ref column, .. }))
                if column == "created"
        ));
    }

    #[test]
    fn bad_timestamp_names_row_and_column() {
        let result = parse_transactions("order_id,item_id,created\no1,A,not-a-date\n".as_bytes());
        match result {
            Err(TableIoError::Data(DataError::InvalidValue { row, column, .. })) => {
                assert_eq!(row, 1);
                assert_eq!(column, "created");
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn available_skips_blank_ids() -> Result<(), String> {
        let items =
            parse_available("item_id\nA\n\n B\n".as_bytes()).map_err(|err| err.to_string())?;
        assert_eq!(items, vec![ItemId::from("A"), ItemId::from("B")]);
        Ok(())
    }

    #[test]
    fn attributes_keep_repeated_items() -> Result<(), String> {
        let csv = "item_id,brand,category,audience,price\n\
                   A,Acme,\"Dam, Skor\",Vuxen,100\n\
                   A,Acme,\"Dam, Skor\",Vuxen,\n";
        let rows = parse_attributes(csv.as_bytes()).map_err(|err| err.to_string())?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category.as_deref(), Some("Dam, Skor"));
        assert_eq!(rows[1].price, None);
        Ok(())
    }

    #[test]
    fn embeddings_build_a_vector_collaborator() -> Result<(), String> {
        let csv = "item_id,d0,d1\nA,1.0,0.0\nB,0.0,1.0\n";
        let vectors = parse_embeddings(csv.as_bytes()).map_err(|err| err.to_string())?;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.dimension(), 2);
        Ok(())
    }

    #[test]
    fn duplicate_embedding_ids_are_rejected() {
        let csv = "item_id,d0\nA,1.0\nA,2.0\n";
        assert!(matches!(
            parse_embeddings(csv.as_bytes()),
            Err(TableIoError::Data(DataError::DuplicateKey { .. }))
        ));
    }

    #[test]
    fn wide_reader_detects_ranks_and_nulls() -> Result<(), String> {
        let csv = "Product ID,Top 1,Score 1,Top 2,Score 2\n\
                   A,B,0.9,,\n\
                   ,C,0.5,D,0.4\n";
        let table = parse_wide("rules.csv", csv.as_bytes()).map_err(|err| err.to_string())?;

        assert_eq!(table.k, 2);
        assert!(table.has_scores);
        assert_eq!(table.rows[0].slots[1].top, None);
        assert_eq!(table.rows[1].item, None);
        assert_eq!(table.to_long().len(), 1, "null ids and null slots are dropped");
        Ok(())
    }

    #[test]
    fn wide_reader_without_scores_marks_table() -> Result<(), String> {
        let csv = "Product ID,Top 1,Top 2\nA,B,C\n";
        let table = parse_wide("brand.csv", csv.as_bytes()).map_err(|err| err.to_string())?;
        assert!(!table.has_scores);
        assert!(table.to_long().is_empty());
        Ok(())
    }
}
