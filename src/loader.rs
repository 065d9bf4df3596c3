//! Raw dataset loading.
//!
//! Each dataset kind is spread over several CSV files (one per export
//! period). Files are read in the order given, tagged with a `source_date`
//! taken from the file name and concatenated into one [`RawTable`].

use csv::{ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::records::DatasetKind;

/// Name of the column attached to every row by the loader.
pub const SOURCE_DATE_COLUMN: &str = "source_date";

/// Name given to an input column that clashes with [`SOURCE_DATE_COLUMN`].
pub const SOURCE_DATE_INPUT_COLUMN: &str = "source_date_input";

#[derive(Debug, Clone)]
pub struct RawRow {
    /// File the row was read from.
    pub source: Arc<Path>,
    pub source_date: String,
    /// Cells aligned with [`RawTable::columns`].
    pub fields: StringRecord,
}

/// All rows of one dataset kind, in file order then row order.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub kind: DatasetKind,
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns including the attached `source_date`.
    pub fn column_count(&self) -> usize {
        self.columns.len() + 1
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterates over the cells of `column`, or nothing if it is absent.
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a str> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .filter_map(move |row| idx.map(|i| row.fields.get(i).unwrap_or("")))
    }

    /// Appends `other`, matching columns by name. Columns that only one side
    /// has read as empty for the other side's rows.
    pub fn append(&mut self, other: RawTable) {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = other.columns;
            self.rows = other.rows;
            return;
        }

        let before = self.columns.len();
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|name| match self.column_index(name) {
                Some(i) => i,
                None => {
                    self.columns.push(name.clone());
                    self.columns.len() - 1
                }
            })
            .collect();

        let width = self.columns.len();
        if width > before {
            for row in &mut self.rows {
                while row.fields.len() < width {
                    row.fields.push_field("");
                }
            }
        }

        let identity = mapping.iter().enumerate().all(|(i, &j)| i == j) && mapping.len() == width;
        self.rows.reserve(other.rows.len());
        for row in other.rows {
            let fields = if identity {
                row.fields
            } else {
                let mut cells = vec![""; width];
                for (src, &dst) in mapping.iter().enumerate() {
                    cells[dst] = row.fields.get(src).unwrap_or("");
                }
                StringRecord::from(cells)
            };
            self.rows.push(RawRow {
                source: row.source,
                source_date: row.source_date,
                fields,
            });
        }
    }

    /// Deserializes every row into `T` by column name, with `source_date`
    /// exposed as an extra column. Consumes the table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Load`] naming the row's source file when a
    /// row does not fit `T`.
    pub fn into_records<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        let mut headers = StringRecord::from(self.columns.clone());
        headers.push_field(SOURCE_DATE_COLUMN);

        let mut records = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            let mut fields = row.fields;
            fields.push_field(&row.source_date);
            let record = fields
                .deserialize(Some(&headers))
                .map_err(|e| PipelineError::load(&row.source, e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Reads one delimited table from `reader`. `source` names the input in
/// errors and is kept on every row.
///
/// An input column called `source_date` is renamed to
/// [`SOURCE_DATE_INPUT_COLUMN`] so the file-name date always wins. Repeated
/// header names are rejected.
pub fn read_table<R: Read>(
    kind: DatasetKind,
    reader: R,
    source: &Path,
    source_date: &str,
    delimiter: u8,
) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::load(source, e.to_string()))?
        .clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PipelineError::load(source, "file has no columns"));
    }
    let mut columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    for column in &mut columns {
        if column == SOURCE_DATE_COLUMN {
            warn!(source = %source.display(), renamed = SOURCE_DATE_INPUT_COLUMN, "Input column clashes with source_date");
            *column = SOURCE_DATE_INPUT_COLUMN.to_string();
        }
    }
    let mut seen = HashSet::with_capacity(columns.len());
    if let Some(repeated) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(PipelineError::load(
            source,
            format!("column {repeated} appears more than once in the header"),
        ));
    }
    let width = columns.len();
    let source_path: Arc<Path> = Arc::from(source);

    let mut rows = Vec::new();
    let mut ragged = 0usize;
    for result in rdr.records() {
        let mut fields = result.map_err(|e| PipelineError::load(source, e.to_string()))?;
        if fields.len() != width {
            ragged += 1;
            if fields.len() > width {
                fields.truncate(width);
            }
            while fields.len() < width {
                fields.push_field("");
            }
        }
        rows.push(RawRow {
            source: Arc::clone(&source_path),
            source_date: source_date.to_string(),
            fields,
        });
    }

    if ragged > 0 {
        warn!(source = %source.display(), ragged, "Rows with unexpected field count were padded or truncated");
    }

    Ok(RawTable {
        kind,
        columns,
        rows,
    })
}

/// Loads a single file of the given kind.
pub fn load_file(kind: DatasetKind, path: &Path, prefix: &str, delimiter: u8) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| PipelineError::load(path, e.to_string()))?;
    let source_date = source_date_from_path(path, prefix);
    let table = read_table(kind, file, path, &source_date, delimiter)?;
    info!(path = %path.display(), rows = table.len(), source_date, "Loaded file");
    Ok(table)
}

/// Loads and concatenates `paths` in the order given.
#[tracing::instrument(skip(kind, paths, config), fields(dataset = %kind, files = paths.len()))]
pub fn load_raw_set(kind: DatasetKind, paths: &[PathBuf], config: &PipelineConfig) -> Result<RawTable> {
    let prefix = match kind {
        DatasetKind::Trips => &config.trip_file_prefix,
        DatasetKind::GpsPoints => &config.gps_file_prefix,
    };

    let mut table = RawTable::new(kind);
    for path in paths {
        let part = load_file(kind, path, prefix, config.delimiter_byte())?;
        table.append(part);
    }

    info!(rows = table.len(), columns = table.column_count(), "Dataset loaded");
    Ok(table)
}

/// Lists every `<prefix>*.csv` file in `dir`, sorted by file name.
pub fn discover_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::load(dir, e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::load(dir, e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with(prefix) && name.ends_with(".csv") {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        return Err(PipelineError::load(
            dir,
            format!("no {}*.csv files found", prefix),
        ));
    }

    files.sort();
    debug!(dir = %dir.display(), prefix, count = files.len(), "Discovered input files");
    Ok(files)
}

/// Extracts the date-like part of a file name, e.g. `2019-07-18` from
/// `routes_2019-07-18.csv`. Falls back to the stem without `prefix`.
pub fn source_date_from_path(path: &Path, prefix: &str) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    if let Some(start) = stem.find(|c: char| c.is_ascii_digit()) {
        let run: String = stem[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
            .collect();
        return run.trim_end_matches(['-', '_', '.']).to_string();
    }

    stem.strip_prefix(prefix).unwrap_or(stem).to_string()
}

/// Counts how often each value of `column` occurs more than once.
pub fn duplicate_count(table: &RawTable, column: &str) -> usize {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for value in table.column_values(column) {
        *seen.entry(value).or_default() += 1;
    }
    seen.values().map(|n| n - 1).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn table(csv: &str, source_date: &str) -> RawTable {
        read_table(
            DatasetKind::Trips,
            csv.as_bytes(),
            Path::new("memory.csv"),
            source_date,
            b',',
        )
        .unwrap()
    }

    #[test]
    fn test_source_date_from_path() {
        assert_eq!(
            source_date_from_path(Path::new("data/routes_2019-07-18.csv"), "routes_"),
            "2019-07-18"
        );
        assert_eq!(
            source_date_from_path(Path::new("locations_20190718_part.csv"), "locations_"),
            "20190718"
        );
        assert_eq!(
            source_date_from_path(Path::new("routes_july.csv"), "routes_"),
            "july"
        );
    }

    #[test]
    fn test_read_table_rejects_empty_file() {
        let result = read_table(
            DatasetKind::Trips,
            "".as_bytes(),
            Path::new("empty.csv"),
            "x",
            b',',
        );
        assert!(matches!(result, Err(PipelineError::Load { .. })));
    }

    #[test]
    fn test_read_table_pads_short_rows() {
        let t = table("a,b,c\n1,2\n4,5,6\n", "d1");
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows[0].fields.get(2), Some(""));
        assert_eq!(t.rows[1].source_date, "d1");
    }

    #[test]
    fn test_append_preserves_order_and_aligns_columns() {
        let mut t = table("a,b\n1,2\n3,4\n", "first");
        t.append(table("b,c\n5,6\n", "second"));

        assert_eq!(t.columns, vec!["a", "b", "c"]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.rows[0].fields, StringRecord::from(vec!["1", "2", ""]));
        assert_eq!(t.rows[2].fields, StringRecord::from(vec!["", "5", "6"]));
        assert_eq!(t.rows[2].source_date, "second");
    }

    #[test]
    fn test_source_date_input_column_is_renamed() {
        let t = table("route_code,source_date\nT1,1999-01-01\n", "2019-07-18");
        assert_eq!(t.columns, vec!["route_code", SOURCE_DATE_INPUT_COLUMN]);
        assert_eq!(t.column_values(SOURCE_DATE_INPUT_COLUMN).collect::<Vec<_>>(), vec!["1999-01-01"]);
        assert_eq!(t.rows[0].source_date, "2019-07-18");
    }

    #[test]
    fn test_repeated_header_is_load_error() {
        let result = read_table(
            DatasetKind::Trips,
            "route_code,length,route_code\nT1,2.0,T1\n".as_bytes(),
            Path::new("routes_2019-07.csv"),
            "2019-07",
            b',',
        );
        match result {
            Err(err @ PipelineError::Load { .. }) => {
                let msg = err.to_string();
                assert!(msg.contains("routes_2019-07.csv"));
                assert!(msg.contains("route_code"));
            }
            other => panic!("expected load error, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_into_records_failure_names_source_file() {
        let mut t = read_table(
            DatasetKind::GpsPoints,
            "cyclenumber\nB1\n".as_bytes(),
            Path::new("locations_a.csv"),
            "a",
            b',',
        )
        .unwrap();
        t.append(
            read_table(
                DatasetKind::GpsPoints,
                "cyclenumber\nB2\n".as_bytes(),
                Path::new("locations_b.csv"),
                "b",
                b',',
            )
            .unwrap(),
        );
        assert_eq!(t.rows[1].source.as_ref(), Path::new("locations_b.csv"));

        let err = t.into_records::<crate::records::GpsRecord>().unwrap_err();
        assert_eq!(err.stage(), "load");
        assert!(err.to_string().contains("locations_a.csv"));
    }

    #[derive(Clone, Default)]
    struct SpanFields(std::sync::Arc<std::sync::Mutex<Vec<(String, Vec<String>)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanFields {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let names = attrs.metadata().fields().iter().map(|f| f.name().to_string()).collect();
            self.0
                .lock()
                .unwrap()
                .push((attrs.metadata().name().to_string(), names));
        }
    }

    #[test]
    fn test_load_span_names_dataset_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let spans = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(spans.clone());
        tracing::subscriber::with_default(subscriber, || {
            load_raw_set(DatasetKind::Trips, &[], &PipelineConfig::default()).unwrap();
        });

        let spans = spans.0.lock().unwrap();
        let (_, fields) = spans
            .iter()
            .find(|(name, _)| name == "load_raw_set")
            .unwrap();
        assert!(fields.contains(&"dataset".to_string()));
        assert!(!fields.contains(&"kind".to_string()));
    }

    #[test]
    fn test_duplicate_count_counts_extra_rows() {
        let t = table("route_code\nT1\nT1\nT1\nT2\n", "d");
        assert_eq!(duplicate_count(&t, "route_code"), 2);
        assert_eq!(duplicate_count(&t, "missing"), 0);
    }

    #[test]
    fn test_load_file_missing_is_load_error() {
        let path = env::temp_dir().join("bikeshare_prep_does_not_exist.csv");
        let err = load_file(DatasetKind::Trips, &path, "routes_", b',').unwrap_err();
        assert_eq!(err.stage(), "load");
        assert!(err.to_string().contains("bikeshare_prep_does_not_exist.csv"));
    }

    #[test]
    fn test_discover_files_sorts_and_filters() {
        let dir = env::temp_dir().join("bikeshare_prep_discover");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        for name in ["routes_2019-08.csv", "routes_2019-07.csv", "locations_2019-07.csv", "notes.txt"] {
            fs::write(dir.join(name), "a\n1\n").unwrap();
        }

        let files = discover_files(&dir, "routes_").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["routes_2019-07.csv", "routes_2019-08.csv"]);

        assert!(discover_files(&dir, "trips_").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
