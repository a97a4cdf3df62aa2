use thiserror::Error;

/// Invalid or missing configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// A spreadsheet row that does not carry a column the pipeline reads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{table} row {row} is missing column {column} ({field})")]
    MissingColumn {
        table: &'static str,
        row: usize,
        column: usize,
        field: &'static str,
    },
}
