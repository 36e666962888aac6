//! Heatmap Library - Clustering of Georeferenced Points for Heat-Map Rendering
//!
//! This library reduces a stream of georeferenced records to a smaller set of weighted
//! points: nearby points are progressively merged so that dense regions collapse into a
//! single, heavier marker instead of thousands of overlapping ones.
//!
//! # Architecture
//!
//! - **[`ClusterTree`]**: Insertion-order dependent quad-style tree with merge-on-insert
//! - **[`Heatmap`]**: High-level manager feeding records into the tree and writing rows
//! - **[`RecordReader`]** / **[`RecordWriter`]**: Tabular (CSV) point records
//! - **[`DumpExtractor`]**: Georeferenced page extraction from an XML markup dump
//! - **[`parse_coord_template`]**: Inline coordinate markers to decimal degrees
//!
//! # Performance Characteristics
//!
//! - **Insertion**: O(D) per point where D is the current tree depth (no rebalancing)
//! - **Traversal**: O(N) over the N nodes, lazily
//! - **Memory**: O(N) nodes, N <= number of inserted points

pub mod cluster;
mod coord;
mod extract;
mod heatmap;
mod record;
pub mod utils;

// Public API exports
pub use cluster::{
    ClusterConfig, ClusterNode, ClusterStats, ClusterTree, Placement, Quadrant, Traversal,
    WeightedPoint,
};
pub use coord::parse_coord_template;
pub use extract::{
    DumpExtractor, ExtractedDumpReader, ExtractedPage, ITEM_SEPARATOR, count_articles,
    find_georeference, write_extracted,
};
pub use heatmap::{Heatmap, HeatmapConfig, HeatmapInfo, OUTPUT_HEADER};
pub use record::{GeoRecord, RECORD_HEADER, RecordReader, RecordWriter};

/// Error types for the data module
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid UTF-8 in input: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DataError>;
