//! Temporal GIS Library
//!
//! A Rust library for managing space-time datasets of raster, 3D raster and
//! vector maps, and for evaluating map algebra over their time series.
//!
//! This library provides tools for:
//! - Modelling absolute and relative time stamps, intervals and calendar increments
//! - Classifying the temporal relation between maps (Allen interval algebra)
//! - Computing the common temporal granularity of a series
//! - Sampling several datasets onto a shared sequence of time slots
//! - Parsing and evaluating expressions such as `D = A[-1] + A[1]`, one backend
//!   computation per time slot, with the results registered into a new dataset
//! - Persisting dataset and map metadata in an SQLite metadata store

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod algebra;
        pub mod granularity;
        pub mod metadata_store;
        pub mod sampling;
        pub mod topology;
    }
    pub mod adapters {
        pub mod backend;
        pub mod map_registry;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::time::{Increment, TemporalExtent, TimeInstant};
pub use app::models::{DatasetKind, MapEntry, SpaceTimeDataset, SpatialExtent, TemporalType};
pub use app::services::metadata_store::TemporalDatabaseConnection;
pub use config::Config;

/// Result type alias for temporal GIS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for temporal GIS operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Two time values of different kinds (absolute/relative, or relative units) were combined
    #[error("Temporal type mismatch: expected {expected}, found {found}")]
    TemporalTypeMismatch { expected: String, found: String },

    /// A temporal extent violates its invariants
    #[error("Invalid temporal extent: {message}")]
    InvalidExtent { message: String },

    /// A value is outside the accepted domain
    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    /// Granularity could not be derived or validated
    #[error("Granularity error: {message}")]
    Granularity { message: String },

    /// Malformed algebra expression
    #[error("Syntax error at position {position} near '{token}': {message}")]
    Syntax {
        token: String,
        position: usize,
        message: String,
    },

    /// Reference to a space-time dataset that is not registered
    #[error("Unknown space time dataset: {name}")]
    UnknownDataset { name: String },

    /// The external per-slot computation failed
    #[error("Backend computation failed for slot {slot} ({extent}): {message}")]
    Backend {
        slot: usize,
        extent: String,
        message: String,
    },

    /// Metadata store error
    #[error("Metadata store error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Registration would leave the metadata store inconsistent
    #[error("Registration error: {message}")]
    Registration { message: String },

    /// Map registry lookup failed
    #[error("Map registry error: {message}")]
    MapRegistry { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Date/time parsing error
    #[error("Date/time parsing error: {message}")]
    DateTimeParsing {
        message: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Processing interrupted
    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a temporal type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TemporalTypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid extent error
    pub fn invalid_extent(message: impl Into<String>) -> Self {
        Self::InvalidExtent {
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Create a granularity error
    pub fn granularity(message: impl Into<String>) -> Self {
        Self::Granularity {
            message: message.into(),
        }
    }

    /// Create a syntax error for the token at `position`
    pub fn syntax(token: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            token: token.into(),
            position,
            message: message.into(),
        }
    }

    /// Create an unknown dataset error
    pub fn unknown_dataset(name: impl Into<String>) -> Self {
        Self::UnknownDataset { name: name.into() }
    }

    /// Create a backend failure error for a slot
    pub fn backend(slot: usize, extent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            slot,
            extent: extent.into(),
            message: message.into(),
        }
    }

    /// Create a metadata store error with context
    pub fn database(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }

    /// Create a registration error
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    /// Create a map registry error
    pub fn map_registry(message: impl Into<String>) -> Self {
        Self::MapRegistry {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a date/time parsing error
    pub fn datetime_parsing(message: impl Into<String>, source: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: message.into(),
            source,
        }
    }

    /// Create a processing interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }

    /// Errors raised while parsing or planning, before any backend call or write
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Error::Syntax { .. }
                | Error::UnknownDataset { .. }
                | Error::TemporalTypeMismatch { .. }
                | Error::InvalidExtent { .. }
                | Error::InvalidValue { .. }
                | Error::Granularity { .. }
        )
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(error: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: "Date/time parsing failed".to_string(),
            source: error,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database {
            message: "SQLite operation failed".to_string(),
            source: error,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration {
            message: format!("Invalid TOML configuration: {}", error),
        }
    }
}
