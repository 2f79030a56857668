/// Title list loading
use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open workbook {path}: {reason}")]
    Workbook { path: PathBuf, reason: String },

    #[error("workbook {0} has no worksheets")]
    NoWorksheet(PathBuf),

    #[error("column '{column}' not found in {path}")]
    MissingColumn { path: PathBuf, column: String },
}

/// Loads the ordered list of titles from a spreadsheet column or a text file
#[derive(Debug, Clone)]
pub struct TitleLoader {
    path: PathBuf,
    column: String,
}

impl TitleLoader {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Titles in input order. Rows without a value are skipped.
    pub fn load(&self) -> Result<Vec<String>, InputError> {
        if !self.path.exists() {
            return Err(InputError::NotFound(self.path.clone()));
        }

        let is_text = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);

        let titles = if is_text {
            self.load_text()?
        } else {
            self.load_workbook()?
        };
        info!("📋 Loaded {} titles from {}", titles.len(), self.path.display());
        Ok(titles)
    }

    /// One title per line; blank lines and `#` comments are ignored
    fn load_text(&self) -> Result<Vec<String>, InputError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| InputError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    /// First worksheet, header row first, values from the configured column
    fn load_workbook(&self) -> Result<Vec<String>, InputError> {
        let mut workbook = open_workbook_auto(&self.path).map_err(|e| InputError::Workbook {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| InputError::NoWorksheet(self.path.clone()))?
            .map_err(|e| InputError::Workbook {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let mut rows = range.rows();
        let header = rows.next().unwrap_or(&[]);
        let column = header
            .iter()
            .position(|cell| cell_text(cell).as_deref() == Some(self.column.as_str()))
            .ok_or_else(|| InputError::MissingColumn {
                path: self.path.clone(),
                column: self.column.clone(),
            })?;
        debug!("Column '{}' is at index {}", self.column, column);

        Ok(rows
            .filter_map(|row| row.get(column).and_then(cell_text))
            .collect())
    }
}

/// Trimmed cell text, `None` for empty cells
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(value) => value.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn test_text_list() {
        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "# watch list\nInception\n\n  The Matrix  \nNonexistent Movie XYZ").unwrap();

        let titles = TitleLoader::new(file.path(), "Movies").load().unwrap();
        assert_eq!(titles, vec!["Inception", "The Matrix", "Nonexistent Movie XYZ"]);
    }

    const WORKBOOK: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/movies.xlsx");

    #[test]
    fn test_workbook_column_in_row_order() {
        let titles = TitleLoader::new(WORKBOOK, "Movies").load().unwrap();
        // Row 3 has no title; numeric titles are read as text
        assert_eq!(titles, vec!["Inception", "Dune", "1917", "Dune: Part Two"]);
    }

    #[test]
    fn test_workbook_other_column() {
        let notes = TitleLoader::new(WORKBOOK, "Notes").load().unwrap();
        assert_eq!(notes, vec!["no title in this row"]);
    }

    #[test]
    fn test_workbook_missing_column() {
        match TitleLoader::new(WORKBOOK, "Title").load() {
            Err(InputError::MissingColumn { column, .. }) => assert_eq!(column, "Title"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = TitleLoader::new("/nonexistent/movies.xlsx", "Movies").load();
        assert!(matches!(result, Err(InputError::NotFound(_))));
    }

    #[test]
    fn test_corrupt_workbook() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"definitely not a zip archive").unwrap();

        let result = TitleLoader::new(file.path(), "Movies").load();
        assert!(matches!(result, Err(InputError::Workbook { .. })));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::String("  ".to_string())), None);
        assert_eq!(cell_text(&Data::String(" Up ".to_string())).as_deref(), Some("Up"));
        assert_eq!(cell_text(&Data::Float(1917.0)).as_deref(), Some("1917"));
    }

    #[test]
    fn test_unknown_extension_is_read_as_workbook() {
        let file = NamedTempFile::new().unwrap();
        let result = TitleLoader::new(file.path(), "Movies").load();
        assert!(result.is_err());
    }
}
