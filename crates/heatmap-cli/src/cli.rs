use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parses the command line arguments.
pub fn parse_args<T: Parser>() -> Result<T, clap::Error> {
    T::try_parse()
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Wiki Heatmap - Turn georeferenced wiki pages into weighted heat-map points
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Cluster point records (lang,title,lat,lon) into heat-map rows (lat,lon,value)
    Cluster(ClusterArgs),
    /// Extract the georeferenced pages of an XML dump
    Extract(ExtractArgs),
    /// Convert an extracted dump into point records
    Coords(CoordsArgs),
    /// Count the pages of an extracted dump
    Count(CountArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// CSV file with a header row followed by lang,title,lat,lon records
    #[clap(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (stdout when omitted)
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Points closer than this many kilometers to a cluster are merged into it
    #[clap(
        short,
        long,
        default_value = "50.0",
        env = "HEATMAP_DISTANCE_LIMIT",
        allow_negative_numbers = true
    )]
    pub distance_limit: f64,

    /// Only cluster records with this language code
    #[clap(long, value_name = "CODE")]
    pub lang: Option<String>,

    /// Stop after reading this many records and write what was clustered so far
    #[clap(long, value_name = "N")]
    pub max_records: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// XML dump to scan
    #[clap(value_name = "DUMP")]
    pub dump: PathBuf,

    /// Extracted dump to write (default: <DUMP>.extracted)
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CoordsArgs {
    /// Extracted dump written by `extract`
    #[clap(value_name = "EXTRACTED")]
    pub extracted: PathBuf,

    /// Output file (stdout when omitted)
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Language code written in every record
    #[clap(long, value_name = "CODE", default_value = "en")]
    pub lang: String,
}

#[derive(Args, Debug, Clone)]
pub struct CountArgs {
    /// Extracted dump written by `extract`
    #[clap(value_name = "EXTRACTED")]
    pub extracted: PathBuf,
}
