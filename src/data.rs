// Row sources: where chart rows come from

use crate::error::RowSourceError;
use log::info;
use serde_json::{Map, Number, Value};
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

/// One row object, column name to value, in source key order
pub type Row = Map<String, Value>;

/// Query flag asking a row source for a plain JSON array of rows
pub const ARRAY_SHAPE_FLAG: &str = "_shape=array";

/// Location that yields the array-shaped rows for a source URL
pub fn data_url(source_url: &str) -> String {
    let joiner = if source_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", source_url, joiner, ARRAY_SHAPE_FLAG)
}

/// Remove the array-shape flag again (for sources that do not understand it)
pub fn strip_shape_flag(url: &str) -> &str {
    url.strip_suffix(ARRAY_SHAPE_FLAG)
        .and_then(|rest| rest.strip_suffix(&['?', '&'][..]))
        .unwrap_or(url)
}

/// Collaborator that supplies a dataset as an array of row objects
pub trait RowSource {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError>;
}

impl<S: RowSource + ?Sized> RowSource for Rc<S> {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        (**self).fetch_rows(url)
    }
}

impl<S: RowSource + ?Sized> RowSource for &S {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        (**self).fetch_rows(url)
    }
}

/// Parse a JSON document that must be an array of objects
pub fn rows_from_json(value: Value, location: &str) -> Result<Vec<Row>, RowSourceError> {
    let Value::Array(items) = value else {
        return Err(RowSourceError::Shape(location.to_string()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            _ => Err(RowSourceError::Shape(location.to_string())),
        })
        .collect()
}

/// Read CSV into rows; numeric-looking cells become JSON numbers, empty cells null
pub fn rows_from_csv<R: Read>(reader: R, location: &str) -> Result<Vec<Row>, RowSourceError> {
    let csv_err = |source| RowSourceError::Csv {
        location: location.to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), csv_cell(cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn csv_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    match cell.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}

/// Rows from a local file, or stdin for `-`
#[derive(Debug, Clone, Default)]
pub struct FileRowSource;

impl FileRowSource {
    fn read_all(location: &str) -> Result<Vec<u8>, RowSourceError> {
        let io_err = |source| RowSourceError::Io {
            location: location.to_string(),
            source,
        };
        let mut buf = Vec::new();
        if location == "-" {
            std::io::stdin().lock().read_to_end(&mut buf).map_err(io_err)?;
        } else {
            buf = std::fs::read(location).map_err(io_err)?;
        }
        Ok(buf)
    }
}

impl RowSource for FileRowSource {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        let location = strip_shape_flag(url);
        let bytes = Self::read_all(location)?;
        let is_csv = Path::new(location)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        let rows = if is_csv {
            rows_from_csv(bytes.as_slice(), location)?
        } else {
            let value: Value =
                serde_json::from_slice(&bytes).map_err(|source| RowSourceError::Json {
                    location: location.to_string(),
                    source,
                })?;
            rows_from_json(value, location)?
        };
        info!("Loaded {} rows from {}", rows.len(), location);
        Ok(rows)
    }
}

/// Rows fetched over HTTP(S)
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpRowSource {
    timeout: std::time::Duration,
}

#[cfg(feature = "http")]
impl Default for HttpRowSource {
    fn default() -> Self {
        Self {
            timeout: std::time::Duration::from_secs(60),
        }
    }
}

#[cfg(feature = "http")]
impl HttpRowSource {
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "http")]
impl RowSource for HttpRowSource {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        let response = ureq::get(url)
            .timeout(self.timeout)
            .call()
            .map_err(|e| RowSourceError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let value: Value =
            serde_json::from_reader(response.into_reader()).map_err(|source| {
                RowSourceError::Json {
                    location: url.to_string(),
                    source,
                }
            })?;
        let rows = rows_from_json(value, url)?;
        info!("Fetched {} rows from {}", rows.len(), url);
        Ok(rows)
    }
}

fn is_http(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Dispatches HTTP(S) URLs to the network and everything else to the filesystem
#[derive(Debug, Clone, Default)]
pub struct AnySource {
    files: FileRowSource,
    #[cfg(feature = "http")]
    http: HttpRowSource,
}

impl AnySource {
    /// Same dispatch, with a custom timeout for HTTP fetches
    #[cfg(feature = "http")]
    pub fn with_http_timeout(timeout: std::time::Duration) -> Self {
        Self {
            files: FileRowSource,
            http: HttpRowSource::with_timeout(timeout),
        }
    }
}

impl RowSource for AnySource {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        if is_http(url) {
            #[cfg(feature = "http")]
            return self.http.fetch_rows(url);
            #[cfg(not(feature = "http"))]
            return Err(RowSourceError::Unsupported(url.to_string()));
        }
        self.files.fetch_rows(url)
    }
}

/// Fixed rows served for exactly one location
#[derive(Debug, Clone)]
pub struct StaticRowSource {
    url: String,
    rows: Vec<Row>,
}

impl StaticRowSource {
    pub fn new(url: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            url: url.into(),
            rows,
        }
    }
}

impl RowSource for StaticRowSource {
    fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, RowSourceError> {
        if url == self.url || strip_shape_flag(url) == self.url {
            Ok(self.rows.clone())
        } else {
            Err(RowSourceError::Unsupported(url.to_string()))
        }
    }
}
