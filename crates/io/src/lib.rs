pub mod atomic;
pub mod errors;
pub mod read;
pub mod write;

pub use atomic::write_atomic;
pub use errors::TableIoError;
pub use read::{
    parse_timestamp, read_attributes, read_available, read_embeddings, read_transactions,
    read_wide,
};
pub use write::{stage_hybrid_edges, stage_wide, StagedTable};
