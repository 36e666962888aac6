//! Extraction of georeferenced pages from an XML markup dump
//!
//! [`DumpExtractor`] walks the element events of the dump, collecting the `title`
//! and `text` of every `page`, and yields the pages whose text carries a coordinate
//! marker displayed next to the title. The result is stored in a plain text format
//! (see [`write_extracted`]) that [`ExtractedDumpReader`] reads back.

use crate::{DataError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::collections::VecDeque;
use std::io::{BufRead, Lines, Write};
use std::sync::OnceLock;

/// Line closing every page of an extracted dump
pub const ITEM_SEPARATOR: &str = "--------------------";

const TITLE_PREFIX: &str = "Title: ";
const COORD_PREFIX: &str = "Coord: ";

/// Coordinate marker with `display=title`, e.g. `{{coord|45|4|N|7|42|E|display=title}}`
fn georeference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{coord([A-z0-9_:|=.()]*)\|display=title([A-z0-9_:|=.()]*)\}\}")
            .expect("georeference pattern is valid")
    })
}

/// First coordinate marker of a page text, if the page is georeferenced
pub fn find_georeference(text: &str) -> Option<&str> {
    georeference_pattern().find(text).map(|m| m.as_str())
}

/// A georeferenced page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    /// The matched coordinate marker
    pub coord: String,
    pub text: String,
}

/// Element whose character data is currently being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Title,
    Text,
}

/// Streaming extractor of georeferenced pages from an XML dump
pub struct DumpExtractor<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    field: Field,
    title: Option<String>,
    text: Option<String>,
    pages_seen: usize,
    finished: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<R: BufRead> DumpExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::new(),
            field: Field::None,
            title: None,
            text: None,
            pages_seen: 0,
            finished: false,
        }
    }

    /// Number of pages read so far, georeferenced or not
    pub fn pages_seen(&self) -> usize {
        self.pages_seen
    }

    fn next_page(&mut self) -> Result<Option<ExtractedPage>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(element) => {
                    self.field = match element.name().as_ref() {
                        b"title" => Field::Title,
                        b"text" => Field::Text,
                        _ => Field::None,
                    };
                }
                Event::Empty(_) => self.field = Field::None,
                Event::Text(data) => {
                    let target = match self.field {
                        Field::Title => &mut self.title,
                        Field::Text => &mut self.text,
                        Field::None => continue,
                    };
                    target
                        .get_or_insert_with(String::new)
                        .push_str(&data.unescape()?);
                }
                Event::CData(data) => {
                    let target = match self.field {
                        Field::Title => &mut self.title,
                        Field::Text => &mut self.text,
                        Field::None => continue,
                    };
                    target
                        .get_or_insert_with(String::new)
                        .push_str(std::str::from_utf8(&data)?);
                }
                Event::End(element) => {
                    self.field = Field::None;
                    if !element.name().as_ref().eq_ignore_ascii_case(b"page") {
                        continue;
                    }

                    self.pages_seen += 1;
                    let title = self.title.take().unwrap_or_default().trim().to_string();
                    let text = self.text.take().unwrap_or_default();
                    match find_georeference(&text) {
                        Some(coord) => {
                            let coord = coord.to_string();
                            return Ok(Some(ExtractedPage { title, coord, text }));
                        }
                        None => tracing::trace!(%title, "Page is not georeferenced"),
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for DumpExtractor<R> {
    type Item = Result<ExtractedPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let page = self.next_page().transpose();
        if !matches!(page, Some(Ok(_))) {
            self.finished = true;
        }
        page
    }
}

/// Append a page to an extracted dump
pub fn write_extracted<W: Write>(page: &ExtractedPage, writer: &mut W) -> Result<()> {
    write!(
        writer,
        "{TITLE_PREFIX}{}\n{COORD_PREFIX}{}\n{}\n\n{ITEM_SEPARATOR}\n\n",
        page.title, page.coord, page.text
    )?;
    Ok(())
}

/// Reader of the pages of an extracted dump
///
/// A separator line only closes a page when it is followed by a blank line and
/// then the next title (or the end of the input), so page texts may contain
/// separator lines of their own. A text containing that exact three-line
/// sequence still splits the page.
pub struct ExtractedDumpReader<R: BufRead> {
    lines: Lines<R>,
    lookahead: VecDeque<String>,
    line: u64,
    finished: bool,
}

impl<R: BufRead> ExtractedDumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            lookahead: VecDeque::new(),
            line: 0,
            finished: false,
        }
    }

    /// Buffer up to `count` upcoming lines
    fn fill(&mut self, count: usize) -> Result<()> {
        while self.lookahead.len() < count {
            match self.lines.next().transpose()? {
                Some(line) => self.lookahead.push_back(line),
                None => break,
            }
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.fill(1)?;
        let line = self.lookahead.pop_front();
        if line.is_some() {
            self.line += 1;
        }
        Ok(line)
    }

    /// Whether the separator just read closes the current page
    fn separator_closes_page(&mut self) -> Result<bool> {
        self.fill(2)?;
        Ok(match (self.lookahead.front(), self.lookahead.get(1)) {
            (None, _) => true,
            (Some(blank), next) if blank.is_empty() => {
                next.is_none_or(|line| line.starts_with(TITLE_PREFIX))
            }
            _ => false,
        })
    }

    fn next_page(&mut self) -> Result<Option<ExtractedPage>> {
        let title = loop {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            if let Some(title) = line.strip_prefix(TITLE_PREFIX) {
                break title.to_string();
            }
        };

        let coord = self
            .next_line()?
            .as_deref()
            .and_then(|line| line.strip_prefix(COORD_PREFIX))
            .map(str::to_string)
            .ok_or_else(|| DataError::MalformedRecord {
                line: self.line,
                reason: format!("expected a {COORD_PREFIX:?} line after the title"),
            })?;

        let mut body = Vec::new();
        while let Some(line) = self.next_line()? {
            if line == ITEM_SEPARATOR && self.separator_closes_page()? {
                break;
            }
            body.push(line);
        }
        // Drop the blank line written between the text and the separator
        if body.last().is_some_and(|line| line.is_empty()) {
            body.pop();
        }

        Ok(Some(ExtractedPage {
            title,
            coord,
            text: body.join("\n"),
        }))
    }
}

impl<R: BufRead> Iterator for ExtractedDumpReader<R> {
    type Item = Result<ExtractedPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let page = self.next_page().transpose();
        if !matches!(page, Some(Ok(_))) {
            self.finished = true;
        }
        page
    }
}

/// Count the pages of an extracted dump by their title lines
pub fn count_articles<R: BufRead>(reader: R) -> Result<usize> {
    let mut count = 0;
    for line in reader.lines() {
        if line?.starts_with("Title:") {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DUMP: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.3/">
  <siteinfo><sitename>Wikipedia</sitename></siteinfo>
  <page>
    <title>  Turin  </title>
    <id>1</id>
    <revision>
      <id>10</id>
      <text xml:space="preserve">'''Turin''' {{coord|45|04|N|7|42|E|type:city|display=title}} Fiat &amp; Juventus</text>
    </revision>
  </page>
  <page>
    <title>Inline only</title>
    <revision><text>{{coord|1|2|display=inline}}</text></revision>
  </page>
  <page>
    <title>No coordinates</title>
    <revision><text>Just words.</text></revision>
  </page>
  <page>
    <title>Empty text</title>
    <revision><text /></revision>
  </page>
  <PAGE>
    <title>Ocean</title>
    <revision><text>{{coord|0|N|160|W|display=title}}</text></revision>
  </PAGE>
</mediawiki>
"#;

    #[test]
    fn test_find_georeference() {
        assert_eq!(
            find_georeference("x {{coord|1.5|2.5|display=title}} y"),
            Some("{{coord|1.5|2.5|display=title}}")
        );
        assert_eq!(
            find_georeference("{{coord|10|N|20|E|region:IT|display=title|name=x}}"),
            Some("{{coord|10|N|20|E|region:IT|display=title|name=x}}")
        );
        assert_eq!(find_georeference("{{coord|1|2|display=inline}}"), None);
        assert_eq!(find_georeference("{{Coord|1|2|display=title}}"), None);
        assert_eq!(find_georeference("{{coord|-1|2|display=title}}"), None);
    }

    #[test]
    fn test_extracts_georeferenced_pages() {
        let mut extractor = DumpExtractor::new(Cursor::new(DUMP.as_bytes()));
        let pages: Vec<ExtractedPage> = extractor.by_ref().map(|p| p.unwrap()).collect();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Turin");
        assert_eq!(
            pages[0].coord,
            "{{coord|45|04|N|7|42|E|type:city|display=title}}"
        );
        assert!(pages[0].text.ends_with("Fiat & Juventus"));
        assert_eq!(pages[1].title, "Ocean");
        assert_eq!(extractor.pages_seen(), 5);
    }

    #[test]
    fn test_invalid_xml_is_an_error() {
        let mut extractor =
            DumpExtractor::new(Cursor::new("<page><title>A</title></oops>".as_bytes()));
        assert!(matches!(extractor.next(), Some(Err(DataError::Xml(_)))));
        assert!(extractor.next().is_none());
    }

    #[test]
    fn test_extracted_dump_reads_back() {
        let pages = vec![
            ExtractedPage {
                title: "Turin".to_string(),
                coord: "{{coord|45|04|N|7|42|E|display=title}}".to_string(),
                text: "line one\n\nline two".to_string(),
            },
            ExtractedPage {
                title: "Ocean".to_string(),
                coord: "{{coord|0|N|160|W|display=title}}".to_string(),
                text: "ends with newline\n".to_string(),
            },
        ];

        let mut dump = Vec::new();
        for page in &pages {
            write_extracted(page, &mut dump).unwrap();
        }
        let text = String::from_utf8(dump.clone()).unwrap();
        assert!(text.starts_with("Title: Turin\nCoord: {{coord|45|04|N|7|42|E|display=title}}\n"));

        let back: Vec<ExtractedPage> = ExtractedDumpReader::new(Cursor::new(dump.clone()))
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(back, pages);
        assert_eq!(count_articles(Cursor::new(dump)).unwrap(), 2);
    }

    #[test]
    fn test_separator_lines_inside_text() {
        let pages = vec![
            ExtractedPage {
                title: "Rule".to_string(),
                coord: "{{coord|1|2|display=title}}".to_string(),
                text: format!("x\n{ITEM_SEPARATOR}\ny"),
            },
            ExtractedPage {
                title: "Spaced rule".to_string(),
                coord: "{{coord|3|4|display=title}}".to_string(),
                text: format!("a\n{ITEM_SEPARATOR}\n\nb"),
            },
            ExtractedPage {
                title: "Trailing rule".to_string(),
                coord: "{{coord|5|6|display=title}}".to_string(),
                text: format!("c\n{ITEM_SEPARATOR}"),
            },
        ];

        let mut dump = Vec::new();
        for page in &pages {
            write_extracted(page, &mut dump).unwrap();
        }
        let back: Vec<ExtractedPage> = ExtractedDumpReader::new(Cursor::new(dump))
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(back, pages);
    }

    #[test]
    fn test_cdata_text() {
        let dump = "<page><title>Ocean</title><text><![CDATA[<b>{{coord|0|N|160|W|display=title}}</b>]]></text></page>";
        let pages: Vec<ExtractedPage> = DumpExtractor::new(Cursor::new(dump.as_bytes()))
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "<b>{{coord|0|N|160|W|display=title}}</b>");
    }

    #[test]
    fn test_invalid_utf8_in_cdata_is_an_error() {
        let dump: &[u8] = b"<page><title>A</title><text><![CDATA[\xff\xfe]]></text></page>";
        let mut extractor = DumpExtractor::new(Cursor::new(dump));
        assert!(matches!(extractor.next(), Some(Err(DataError::Utf8(_)))));
        assert!(extractor.next().is_none());
    }

    #[test]
    fn test_extracted_dump_missing_coord_line() {
        let dump = "Title: A\nnot a coord\n";
        let mut reader = ExtractedDumpReader::new(Cursor::new(dump.as_bytes()));
        assert!(matches!(
            reader.next(),
            Some(Err(DataError::MalformedRecord { line: 2, .. }))
        ));
        assert!(reader.next().is_none());
    }
}
