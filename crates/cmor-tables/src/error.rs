use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("no table registered for {table}; the following options are available: {known}")]
    UnknownTable { table: String, known: String },

    #[error("variable {short_name} for mip {mip} not found in table {table} nor in the custom table")]
    UnknownVariable {
        table: String,
        mip: String,
        short_name: String,
    },

    #[error("failed to parse table JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("table JSON has no table_id header")]
    MissingTableId,
}
