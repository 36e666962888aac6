//! Command implementations
//!
//! Stages exchange files: `extract` turns a dump into an extracted dump, `coords`
//! turns that into point records, and `cluster` turns point records into heat-map rows.

use crate::cli::{ClusterArgs, Cli, Command, CoordsArgs, CountArgs, ExtractArgs};
use heatmap_lib::{
    ClusterConfig, DataError, DumpExtractor, ExtractedDumpReader, GeoRecord, Heatmap,
    HeatmapConfig, RecordWriter, count_articles, parse_coord_template, write_extracted,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Error types for the command line
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Cannot create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("{}: {source}", path.display())]
    Input { path: PathBuf, source: DataError },

    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::Data(DataError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Run the selected command
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Cluster(args) => cluster(args),
        Command::Extract(args) => extract(args),
        Command::Coords(args) => coords(args),
        Command::Count(args) => count(args),
    }
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CliError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Open the output file, or stdout when no path is given
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|source| CliError::Create {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn with_path(path: &Path) -> impl FnOnce(DataError) -> CliError + '_ {
    move |source| CliError::Input {
        path: path.to_path_buf(),
        source,
    }
}

fn cluster(args: ClusterArgs) -> Result<()> {
    let config = HeatmapConfig {
        cluster: ClusterConfig::new(args.distance_limit)?,
        lang: args.lang,
        max_records: args.max_records,
    };
    // A missing input is reported before anything is processed
    let input = open_input(&args.input)?;

    tracing::info!(
        "Clustering {} (distance limit {} km)",
        args.input.display(),
        config.cluster.distance_limit_km
    );
    let mut heatmap = Heatmap::new(config);
    heatmap
        .load_from_reader(input)
        .map_err(with_path(&args.input))?;

    let mut output = open_output(args.output.as_deref())?;
    let rows = heatmap.write_csv(&mut output)?;
    output.flush()?;

    let info = heatmap.info();
    tracing::info!(
        "Wrote {} heat-map points from {} records ({} merged)",
        rows,
        info.points_inserted,
        info.merges
    );
    Ok(())
}

/// `<DUMP>.extracted` next to the dump
fn default_extracted_path(dump: &Path) -> PathBuf {
    let mut path = dump.as_os_str().to_owned();
    path.push(".extracted");
    PathBuf::from(path)
}

fn extract(args: ExtractArgs) -> Result<()> {
    let input = open_input(&args.dump)?;
    let output_path = args
        .output
        .unwrap_or_else(|| default_extracted_path(&args.dump));
    let mut output = open_output(Some(&output_path))?;

    tracing::info!("Parsing {}...", args.dump.display());
    let mut extractor = DumpExtractor::new(input);
    let mut extracted = 0;
    for page in extractor.by_ref() {
        let page = page.map_err(with_path(&args.dump))?;
        write_extracted(&page, &mut output)?;
        extracted += 1;
        tracing::info!("[{:8}] Extracted {}", extracted, page.title);
    }
    output.flush()?;

    tracing::info!(
        "Job completed: {} of {} pages extracted to {}",
        extracted,
        extractor.pages_seen(),
        output_path.display()
    );
    Ok(())
}

fn coords(args: CoordsArgs) -> Result<()> {
    let input = open_input(&args.extracted)?;
    let mut writer = RecordWriter::new(open_output(args.output.as_deref())?)?;

    let mut written = 0;
    let mut skipped = 0;
    for page in ExtractedDumpReader::new(input) {
        let page = page.map_err(with_path(&args.extracted))?;
        match parse_coord_template(&page.coord) {
            Ok(point) => {
                writer.write(&GeoRecord {
                    lang: args.lang.clone(),
                    title: page.title,
                    lat: point.y(),
                    lon: point.x(),
                })?;
                written += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", page.title, e);
                skipped += 1;
            }
        }
    }
    writer.flush()?;

    tracing::info!("Wrote {} point records ({} skipped)", written, skipped);
    Ok(())
}

fn count(args: CountArgs) -> Result<()> {
    let input = open_input(&args.extracted)?;
    let count = count_articles(input).map_err(with_path(&args.extracted))?;
    println!(
        "There are {} articles in {}",
        count,
        args.extracted.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DUMP: &str = r#"<mediawiki>
  <page>
    <title>Turin</title>
    <revision><text>{{coord|45|4|N|7|42|E|display=title}}</text></revision>
  </page>
  <page>
    <title>Moncalieri</title>
    <revision><text>{{coord|45|0|N|7|41|E|display=title}}</text></revision>
  </page>
  <page>
    <title>Broken</title>
    <revision><text>{{coord|display=title}}</text></revision>
  </page>
  <page>
    <title>Not georeferenced</title>
    <revision><text>Nothing here</text></revision>
  </page>
  <page>
    <title>Sydney</title>
    <revision><text>{{coord|33|52|S|151|12|E|display=title}}</text></revision>
  </page>
</mediawiki>
"#;

    #[test]
    fn test_default_extracted_path() {
        assert_eq!(
            default_extracted_path(Path::new("/data/dump.xml")),
            PathBuf::from("/data/dump.xml.extracted")
        );
    }

    #[test]
    fn test_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("dump.xml");
        fs::write(&dump, DUMP).unwrap();

        extract(ExtractArgs {
            dump: dump.clone(),
            output: None,
        })
        .unwrap();
        let extracted = default_extracted_path(&dump);
        assert_eq!(
            count_articles(open_input(&extracted).unwrap()).unwrap(),
            4
        );

        let points = dir.path().join("points.csv");
        coords(CoordsArgs {
            extracted: extracted.clone(),
            output: Some(points.clone()),
            lang: "en".to_string(),
        })
        .unwrap();
        let records = fs::read_to_string(&points).unwrap();
        assert!(records.starts_with("lang,title,lat,lon\n"));
        // The broken marker is skipped
        assert_eq!(records.lines().count(), 4);

        let heatmap = dir.path().join("heatmap.csv");
        cluster(ClusterArgs {
            input: points,
            output: Some(heatmap.clone()),
            distance_limit: 50.0,
            lang: None,
            max_records: None,
        })
        .unwrap();
        let output = fs::read_to_string(&heatmap).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        // Turin and Moncalieri (~10 km apart) merge, Sydney stays alone
        assert_eq!(lines[0], "lat,lon,value");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",2"));
        assert!(lines[2].ends_with(",1"));
    }

    #[test]
    fn test_missing_input_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        let err = cluster(ClusterArgs {
            input: missing.clone(),
            output: None,
            distance_limit: 50.0,
            lang: None,
            max_records: None,
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Open { .. }));
        assert!(err.to_string().contains("missing.csv"));
    }

    #[test]
    fn test_malformed_record_names_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.csv");
        fs::write(&input, "lang,title,lat,lon\nen,A,1.0,1.0\nen,B\n").unwrap();
        let output = dir.path().join("heatmap.csv");

        let err = cluster(ClusterArgs {
            input,
            output: Some(output.clone()),
            distance_limit: 50.0,
            lang: None,
            max_records: None,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Input {
                source: DataError::MalformedRecord { line: 3, .. },
                ..
            }
        ));
        // Nothing is written for an aborted run
        assert!(!output.exists());
    }

    #[test]
    fn test_invalid_distance_limit() {
        let err = cluster(ClusterArgs {
            input: PathBuf::from("unused.csv"),
            output: None,
            distance_limit: -5.0,
            lang: None,
            max_records: None,
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Data(DataError::InvalidConfig(_))));
    }
}
