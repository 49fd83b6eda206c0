//! Configuration for coercion and the Parquet backend.

use serde::{Deserialize, Serialize};

/// Top-level configuration bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Value coercion settings used by both conversion directions
    pub coercion: CoercionConfig,
    /// Parquet reader and writer settings
    pub parquet: ParquetConfig,
}

/// Settings for coercing values to their declared types
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoercionConfig {
    /// Date format configuration for string-to-date conversions
    pub date_format: DateFormatConfig,
    /// Allow dropping sub-unit precision when converting times and timestamps
    /// to a coarser unit
    pub allow_truncation: bool,
}

/// Configuration for date format handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFormatConfig {
    /// List of date format strings to try when parsing dates
    pub date_formats: Vec<String>,
    /// Default date format to use when converting dates to strings
    pub default_format: String,
    /// Enable heuristic format detection
    pub enable_format_detection: bool,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(), // ISO format: 2023-01-15
                "%d-%m-%Y".to_string(), // European: 15-01-2023
                "%m/%d/%Y".to_string(), // US: 01/15/2023
                "%d/%m/%Y".to_string(), // UK: 15/01/2023
                "%d.%m.%Y".to_string(), // 15.01.2023
                "%Y%m%d".to_string(),   // Compact: 20230115
                "%d %b %Y".to_string(), // 15 Jan 2023
                "%d %B %Y".to_string(), // 15 January 2023
            ],
            default_format: "%Y-%m-%d".to_string(),
            enable_format_detection: true,
        }
    }
}

/// Configuration for the Parquet backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetConfig {
    /// Rows decoded per record batch when reading
    pub batch_size: usize,
    /// Maximum rows per row group when writing
    pub max_row_group_size: usize,
    /// Derive observed nullability from column-chunk statistics
    pub use_statistics: bool,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            max_row_group_size: 1024 * 1024,
            use_statistics: true,
        }
    }
}
