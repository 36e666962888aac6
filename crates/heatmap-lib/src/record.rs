//! Tabular point records
//!
//! The input is CSV with a header row followed by records of at least four fields:
//! language code, title, latitude and longitude (degrees). Extra trailing fields are
//! ignored. A record that does not fit this shape aborts the run.

use crate::{DataError, Result, utils};
use geo::Point;
use std::io::{Read, Write};

/// Header written in front of point records
pub const RECORD_HEADER: [&str; 4] = ["lang", "title", "lat", "lon"];

/// A georeferenced record, as read from or written to the tabular format
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoRecord {
    /// Language code of the source (only used by caller-side filters)
    pub lang: String,
    pub title: String,
    pub lat: f64,
    pub lon: f64,
}

impl GeoRecord {
    /// Position of the record (x = longitude, y = latitude)
    pub fn point(&self) -> Point<f64> {
        utils::lat_lon(self.lat, self.lon)
    }

    /// Parse a CSV record, `line` being its 1-based line in the source
    pub fn from_csv(record: &csv::StringRecord, line: u64) -> Result<Self> {
        if record.len() < RECORD_HEADER.len() {
            return Err(DataError::MalformedRecord {
                line,
                reason: format!(
                    "expected at least {} fields, found {}",
                    RECORD_HEADER.len(),
                    record.len()
                ),
            });
        }

        Ok(Self {
            lang: record[0].to_string(),
            title: record[1].to_string(),
            lat: parse_degrees(&record[2], "latitude", line)?,
            lon: parse_degrees(&record[3], "longitude", line)?,
        })
    }
}

fn parse_degrees(field: &str, what: &str, line: u64) -> Result<f64> {
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|e| DataError::MalformedRecord {
            line,
            reason: format!("{what} {field:?} is not a number: {e}"),
        })?;
    if !value.is_finite() {
        return Err(DataError::MalformedRecord {
            line,
            reason: format!("{what} {field:?} is not finite"),
        });
    }
    Ok(value)
}

/// Format degrees as the shortest text that reads back to the same value
pub(crate) fn format_degrees(value: f64) -> String {
    format!("{value:?}")
}

/// Streaming reader of [`GeoRecord`]s, skipping the header row
pub struct RecordReader<R: Read> {
    inner: csv::Reader<R>,
    record: csv::StringRecord,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self {
            inner,
            record: csv::StringRecord::new(),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<GeoRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.record.position().map_or(0, |pos| pos.line());
                Some(GeoRecord::from_csv(&self.record, line))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Writer of [`GeoRecord`]s in the same format [`RecordReader`] consumes
pub struct RecordWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> RecordWriter<W> {
    /// Create the writer and emit the header row
    pub fn new(writer: W) -> Result<Self> {
        let mut inner = csv::Writer::from_writer(writer);
        inner.write_record(RECORD_HEADER)?;
        Ok(Self { inner })
    }

    pub fn write(&mut self, record: &GeoRecord) -> Result<()> {
        let lat = format_degrees(record.lat);
        let lon = format_degrees(record.lon);
        self.inner
            .write_record([record.lang.as_str(), record.title.as_str(), lat.as_str(), lon.as_str()])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
