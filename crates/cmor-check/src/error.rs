use thiserror::Error;

use cmor_tables::TableError;

#[derive(Debug, Error)]
pub enum CheckError {
    /// One or more compliance failures. Fatal to the calling pipeline
    /// stage; there is no partial success.
    #[error("there were errors in variable {var_name}:\n{messages}\nin cube:\n{cube}")]
    Compliance {
        var_name: String,
        messages: String,
        cube: String,
    },

    #[error("no checker implemented for table {table}; the following options are available: {known}")]
    UnknownTable { table: String, known: String },

    #[error(transparent)]
    Table(#[from] TableError),
}
