//! Heatmap - Top-level manager for records, cluster tree and output
//!
//! This module provides the high-level API for reading point records, feeding them
//! into the cluster tree in input order, and writing the weighted heat-map rows.

use crate::record::format_degrees;
use crate::{ClusterConfig, ClusterTree, GeoRecord, Placement, RecordReader, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Header of the heat-map output: latitude, longitude and aggregate weight
pub const OUTPUT_HEADER: [&str; 3] = ["lat", "lon", "value"];

/// Configuration for the heatmap
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeatmapConfig {
    /// Clustering parameters
    pub cluster: ClusterConfig,
    /// Only cluster records with this language code (all records when `None`)
    pub lang: Option<String>,
    /// Stop reading after this many records; what was read so far is kept
    pub max_records: Option<usize>,
}

/// Information about the heatmap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeatmapInfo {
    /// Number of records read from the input
    pub records_read: usize,
    /// Number of records skipped by the language filter
    pub records_filtered: usize,
    /// Number of points inserted into the tree
    pub points_inserted: usize,
    /// Number of insertions merged into an existing node
    pub merges: usize,
    /// Number of nodes (output rows)
    pub node_count: usize,
    /// Depth of the deepest node
    pub max_depth: usize,
}

/// Top-level manager for clustering records into heat-map points
pub struct Heatmap {
    /// Cluster tree fed in input order
    tree: ClusterTree,
    /// Configuration settings
    config: HeatmapConfig,
    records_read: usize,
    records_filtered: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Heatmap {
    /// Create an empty heatmap with the given configuration
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            tree: ClusterTree::new(config.cluster),
            config,
            records_read: 0,
            records_filtered: 0,
        }
    }

    /// Add a single record
    ///
    /// Returns where the point was placed, or `None` if the language filter skipped it.
    pub fn add_record(&mut self, record: &GeoRecord) -> Option<Placement> {
        self.records_read += 1;

        if let Some(lang) = &self.config.lang
            && record.lang != *lang
        {
            self.records_filtered += 1;
            return None;
        }

        Some(self.tree.insert(record.point()))
    }

    /// Read CSV records and add them in order
    ///
    /// The first malformed record aborts loading with its error. Records added before
    /// it stay in the tree.
    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("heatmap::load_from_reader");

        let mut records = RecordReader::new(reader);
        loop {
            if let Some(max) = self.config.max_records
                && self.records_read >= max
            {
                tracing::info!(max, "Record limit reached, ignoring the rest of the input");
                break;
            }
            let Some(record) = records.next() else {
                break;
            };
            let record = record?;
            self.add_record(&record);
        }

        let info = self.info();
        tracing::info!(
            records = info.records_read,
            filtered = info.records_filtered,
            nodes = info.node_count,
            merges = info.merges,
            max_depth = info.max_depth,
            "Clustered records"
        );
        Ok(())
    }

    /// Load records from a CSV file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())?;
        tracing::debug!("Reading records from {}", path.as_ref().display());
        self.load_from_reader(BufReader::new(file))
    }

    /// Write the header and one `lat,lon,value` row per tree node, in traversal order
    ///
    /// Returns the number of rows written (excluding the header).
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<usize> {
        #[cfg(feature = "profiling")]
        profiling::scope!("heatmap::write_csv");

        let mut out = csv::Writer::from_writer(writer);
        out.write_record(OUTPUT_HEADER)?;

        let mut rows = 0;
        for point in self.tree.traverse() {
            let lat = format_degrees(point.lat);
            let lon = format_degrees(point.lon);
            let weight = point.weight.to_string();
            out.write_record([lat.as_str(), lon.as_str(), weight.as_str()])?;
            rows += 1;
        }
        out.flush()?;

        tracing::debug!(rows, "Wrote heat-map rows");
        Ok(rows)
    }

    pub fn tree(&self) -> &ClusterTree {
        &self.tree
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    /// Get information about the heatmap
    pub fn info(&self) -> HeatmapInfo {
        let stats = self.tree.stats();
        HeatmapInfo {
            records_read: self.records_read,
            records_filtered: self.records_filtered,
            points_inserted: stats.points_inserted,
            merges: stats.merges,
            node_count: self.tree.node_count(),
            max_depth: stats.max_depth,
        }
    }
}
