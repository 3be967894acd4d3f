//! Workbook loading: Excel-family sheets (via calamine) and CSV files into
//! polars DataFrames, one per sheet, in declared sheet order.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tracing::{debug, info};

use crate::dates::{days_since_epoch, STAMP_DATE, STAMP_DATETIME};
use crate::error::LoadError;
use crate::normalize::normalize_header;
use crate::source::{WorkbookFormat, WorkbookSource};

/// Which sheets to read from a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SheetSelection {
    First,
    All,
    Named(String),
    /// 0-based position in declared sheet order
    Index(usize),
}

impl SheetSelection {
    /// `"2"` selects by index, anything else by name.
    pub fn parse(sheet: &str) -> Self {
        match sheet.parse::<usize>() {
            Ok(idx) => SheetSelection::Index(idx),
            Err(_) => SheetSelection::Named(sheet.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub frame: DataFrame,
}

#[derive(Debug, Clone)]
pub struct Workbook {
    source_name: String,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Read the selected sheets of `source`. Any failure is fatal: no partial
    /// workbook is returned.
    pub fn load(source: &WorkbookSource, selection: &SheetSelection) -> Result<Self, LoadError> {
        let data = source.read()?;
        let format = source.format(&data);
        let sheets = match format {
            WorkbookFormat::Excel => load_excel(data.into_owned(), selection)?,
            WorkbookFormat::Csv => {
                let name = source.stem();
                match selection {
                    SheetSelection::Named(wanted) if *wanted != name => {
                        return Err(LoadError::SheetNotFound(wanted.clone()))
                    }
                    SheetSelection::Index(idx) if *idx != 0 => {
                        return Err(LoadError::SheetNotFound(idx.to_string()))
                    }
                    _ => {}
                }
                vec![Sheet {
                    name,
                    frame: load_csv(data.into_owned())?,
                }]
            }
        };
        info!(
            source = %source.display_name(),
            sheets = sheets.len(),
            "workbook loaded"
        );
        Ok(Self {
            source_name: source.display_name(),
            sheets,
        })
    }

    /// Build a workbook from frames already in memory.
    pub fn from_sheets(source_name: impl Into<String>, sheets: Vec<Sheet>) -> Self {
        Self {
            source_name: source_name.into(),
            sheets,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn first(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn get(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Sheet for a logical role: the sheet named exactly `name` if present,
    /// otherwise the first sheet in declared order whose normalized headers
    /// contain every `required` column. None when nothing matches.
    pub fn find_sheet(&self, name: &str, required: &[&str]) -> Option<&Sheet> {
        if let Some(sheet) = self.get(name) {
            debug!(sheet = name, "sheet matched by name");
            return Some(sheet);
        }
        let found = self.sheets.iter().find(|s| has_columns(&s.frame, required));
        if let Some(sheet) = found {
            debug!(role = name, sheet = %sheet.name, "sheet auto-detected by columns");
        }
        found
    }
}

fn has_columns(df: &DataFrame, required: &[&str]) -> bool {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| normalize_header(c.as_str()))
        .collect();
    required
        .iter()
        .all(|r| present.iter().any(|p| *p == normalize_header(r)))
}

fn load_excel(data: Vec<u8>, selection: &SheetSelection) -> Result<Vec<Sheet>, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| LoadError::Format(e.to_string()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(LoadError::NoSheets);
    }
    let picked: Vec<String> = match selection {
        SheetSelection::First => vec![sheet_names[0].clone()],
        SheetSelection::All => sheet_names.clone(),
        SheetSelection::Named(name) => {
            if !sheet_names.contains(name) {
                return Err(LoadError::SheetNotFound(name.clone()));
            }
            vec![name.clone()]
        }
        SheetSelection::Index(idx) => vec![sheet_names
            .get(*idx)
            .cloned()
            .ok_or_else(|| LoadError::SheetNotFound(idx.to_string()))?],
    };
    let mut sheets = Vec::with_capacity(picked.len());
    for name in picked {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| LoadError::Format(format!("{}: {}", name, e)))?;
        let frame = range_to_frame(&range)?;
        debug!(sheet = %name, rows = frame.height(), cols = frame.width(), "sheet read");
        sheets.push(Sheet { name, frame });
    }
    Ok(sheets)
}

/// CSV is read with every column as text; typing happens in the pipeline.
fn load_csv(data: Vec<u8>) -> Result<DataFrame, LoadError> {
    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0));
    let df = CsvReader::new(Cursor::new(data))
        .with_options(read_options)
        .finish()?;
    Ok(df)
}

/// First row is the header. Empty headers become `column_<n>`; repeated
/// headers get a `.1`, `.2`, ... suffix.
fn range_to_frame(range: &Range<Data>) -> Result<DataFrame, LoadError> {
    let rows: Vec<&[Data]> = range.rows().collect();
    if rows.is_empty() {
        return Ok(DataFrame::new(vec![])?);
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    let headers: Vec<String> = rows[0]
        .iter()
        .enumerate()
        .map(|(idx, data)| {
            let base = Cell::read(data)
                .text()
                .unwrap_or_else(|| format!("column_{}", idx + 1));
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect();
    let mut columns = Vec::with_capacity(headers.len());
    for (col_idx, header) in headers.iter().enumerate() {
        let cells: Vec<Cell> = rows[1..]
            .iter()
            .map(|row| row.get(col_idx).map(Cell::read).unwrap_or(Cell::Empty))
            .collect();
        let kind = ColumnKind::of(&cells);
        columns.push(kind.series(header, &cells)?.into());
    }
    Ok(DataFrame::new(columns)?)
}

/// A worksheet cell reduced to what the dashboards care about.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    /// Date-formatted cell, or text spelled as an ISO date
    Stamp(NaiveDateTime),
    Number(f64),
    Flag(bool),
    Text(String),
}

impl Cell {
    fn read(data: &Data) -> Self {
        use calamine::DataType as _;
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(value) => Cell::Number(*value as f64),
            Data::Float(value) => Cell::Number(*value),
            Data::Bool(value) => Cell::Flag(*value),
            Data::String(text) if text.trim().is_empty() => Cell::Empty,
            Data::String(text) => match iso_stamp(text) {
                Some(stamp) => Cell::Stamp(stamp),
                None => Cell::Text(text.clone()),
            },
            Data::DateTime(_) | Data::DateTimeIso(_) => match data.as_datetime() {
                Some(stamp) => Cell::Stamp(stamp),
                None => Cell::Text(data.to_string()),
            },
            other => Cell::Text(other.to_string()),
        }
    }

    /// Text form used when a column mixes kinds. Dates are written in the
    /// stamp spellings every `DateFormat` accepts; whole numbers lose their
    /// `.0` so `force_numeric` reads them back unchanged.
    fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Stamp(stamp) if stamp.time() == NaiveTime::MIN => {
                Some(stamp.format(STAMP_DATE).to_string())
            }
            Cell::Stamp(stamp) => Some(stamp.format(STAMP_DATETIME).to_string()),
            Cell::Number(value) if is_whole(*value) => Some(format!("{}", *value as i64)),
            Cell::Number(value) => Some(value.to_string()),
            Cell::Flag(value) => Some(value.to_string()),
            Cell::Text(text) => Some(text.clone()),
        }
    }
}

fn is_whole(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

fn iso_stamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, STAMP_DATE)
        .map(|date| date.and_time(NaiveTime::MIN))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Column type chosen from the non-empty cells below the header.
///
/// A column only gets a typed representation when every cell agrees. Any
/// disagreement, such as a header row repeated halfway down a date column or
/// "10+" among counts, makes it text; the pipeline parses and coerces text
/// columns itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Dates { with_time: bool },
    Whole,
    Decimal,
    Flags,
    Text,
}

impl ColumnKind {
    fn of(cells: &[Cell]) -> Self {
        let mut kind: Option<ColumnKind> = None;
        for cell in cells {
            let this = match cell {
                Cell::Empty => continue,
                Cell::Stamp(stamp) => ColumnKind::Dates {
                    with_time: stamp.time() != NaiveTime::MIN,
                },
                Cell::Number(value) if is_whole(*value) => ColumnKind::Whole,
                Cell::Number(_) => ColumnKind::Decimal,
                Cell::Flag(_) => ColumnKind::Flags,
                Cell::Text(_) => return ColumnKind::Text,
            };
            kind = Some(match (kind, this) {
                (None, this) => this,
                (
                    Some(ColumnKind::Dates { with_time: a }),
                    ColumnKind::Dates { with_time: b },
                ) => ColumnKind::Dates {
                    with_time: a || b,
                },
                (Some(ColumnKind::Whole), ColumnKind::Whole) => ColumnKind::Whole,
                (
                    Some(ColumnKind::Whole | ColumnKind::Decimal),
                    ColumnKind::Whole | ColumnKind::Decimal,
                ) => ColumnKind::Decimal,
                (Some(ColumnKind::Flags), ColumnKind::Flags) => ColumnKind::Flags,
                _ => return ColumnKind::Text,
            });
        }
        kind.unwrap_or(ColumnKind::Text)
    }

    fn series(self, name: &str, cells: &[Cell]) -> PolarsResult<Series> {
        let name = PlSmallStr::from(name);
        match self {
            ColumnKind::Dates { with_time: false } => {
                let days: Vec<Option<i32>> = cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Stamp(stamp) => Some(days_since_epoch(stamp.date()) as i32),
                        _ => None,
                    })
                    .collect();
                Series::new(name, days).cast(&DataType::Date)
            }
            ColumnKind::Dates { with_time: true } => {
                let micros: Vec<Option<i64>> = cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Stamp(stamp) => Some(stamp.and_utc().timestamp_micros()),
                        _ => None,
                    })
                    .collect();
                Series::new(name, micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            }
            ColumnKind::Whole => {
                let values: Vec<Option<i64>> = cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Number(value) => Some(*value as i64),
                        _ => None,
                    })
                    .collect();
                Ok(Series::new(name, values))
            }
            ColumnKind::Decimal => {
                let values: Vec<Option<f64>> = cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Number(value) => Some(*value),
                        _ => None,
                    })
                    .collect();
                Ok(Series::new(name, values))
            }
            ColumnKind::Flags => {
                let values: Vec<Option<bool>> = cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Flag(value) => Some(*value),
                        _ => None,
                    })
                    .collect();
                Ok(Series::new(name, values))
            }
            ColumnKind::Text => {
                let values: Vec<Option<String>> = cells.iter().map(Cell::text).collect();
                Ok(Series::new(name, values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_selection_parse() {
        assert_eq!(SheetSelection::parse("0"), SheetSelection::Index(0));
        assert_eq!(
            SheetSelection::parse("ClientWise"),
            SheetSelection::Named("ClientWise".to_string())
        );
    }

    fn kind_of(data: &[Data]) -> ColumnKind {
        let cells: Vec<Cell> = data.iter().map(Cell::read).collect();
        ColumnKind::of(&cells)
    }

    fn excel_date(serial: f64) -> Data {
        Data::DateTime(calamine::ExcelDateTime::new(
            serial,
            calamine::ExcelDateTimeType::DateTime,
            false,
        ))
    }

    #[test]
    fn column_kinds() {
        assert_eq!(kind_of(&[Data::Int(3), Data::Float(4.0)]), ColumnKind::Whole);
        assert_eq!(kind_of(&[Data::Float(1.5), Data::Empty]), ColumnKind::Decimal);
        assert_eq!(
            kind_of(&[Data::Float(10.0), Data::String("10+".to_string())]),
            ColumnKind::Text
        );
        assert_eq!(
            kind_of(&[
                Data::String("2024-03-01".to_string()),
                Data::String("2024-03-02".to_string()),
            ]),
            ColumnKind::Dates { with_time: false }
        );
        assert_eq!(
            kind_of(&[excel_date(45356.0), excel_date(45357.5)]),
            ColumnKind::Dates { with_time: true }
        );
        assert_eq!(kind_of(&[Data::Bool(true), Data::Int(1)]), ColumnKind::Text);
        assert_eq!(kind_of(&[Data::Empty]), ColumnKind::Text);
    }

    #[test]
    fn dates_mixed_with_header_row_become_parseable_text() {
        let mut range: Range<Data> = Range::new((0, 0), (3, 1));
        range.set_value((0, 0), Data::String("Req Received Date".to_string()));
        range.set_value((0, 1), Data::String("Open".to_string()));
        range.set_value((1, 0), excel_date(45356.0));
        range.set_value((1, 1), Data::Float(10.0));
        range.set_value((2, 0), Data::String("Req Received Date".to_string()));
        range.set_value((2, 1), Data::String("Open".to_string()));
        range.set_value((3, 0), excel_date(45357.0));
        range.set_value((3, 1), Data::Float(3.0));
        let df = range_to_frame(&range).unwrap();

        let dates: Vec<Option<&str>> = df
            .column("Req Received Date")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            dates,
            vec![Some("2024-03-05"), Some("Req Received Date"), Some("2024-03-06")]
        );
        let open: Vec<Option<&str>> = df.column("Open").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(open, vec![Some("10"), Some("Open"), Some("3")]);

        let parsed = crate::dates::parse_date_column(
            &df,
            "Req Received Date",
            &crate::dates::DateFormat::fixed("%d-%b-%y"),
        )
        .unwrap();
        assert_eq!(parsed.frame.height(), 2);
        assert_eq!(parsed.warning.unwrap().dropped_rows, 1);
    }

    #[test]
    fn typed_date_column() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 0));
        range.set_value((0, 0), Data::String("Date".to_string()));
        range.set_value((1, 0), excel_date(45292.0));
        range.set_value((2, 0), Data::Empty);
        let df = range_to_frame(&range).unwrap();
        let column = df.column("Date").unwrap();
        assert_eq!(column.dtype(), &DataType::Date);
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn range_with_duplicate_and_blank_headers() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 2));
        range.set_value((0, 0), Data::String("Total".to_string()));
        range.set_value((0, 1), Data::String("Total".to_string()));
        range.set_value((0, 2), Data::Empty);
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::Int(2));
        range.set_value((1, 2), Data::String("x".to_string()));
        let df = range_to_frame(&range).unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["Total", "Total.1", "column_3"]);
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn find_sheet_prefers_exact_name_then_first_superset() {
        let rec = df!(
            "Date" => &["2024-01-01"],
            "Recruiter" => &["Asha"],
            "Total" => &[1i64],
            "Subcon" => &[0i64],
            "Permanent" => &[1i64]
        )
        .unwrap();
        let workbook = Workbook::from_sheets(
            "test",
            vec![
                Sheet {
                    name: "Notes".to_string(),
                    frame: df!("text" => &["hello"]).unwrap(),
                },
                Sheet {
                    name: "Daily".to_string(),
                    frame: rec.clone(),
                },
                Sheet {
                    name: "Daily copy".to_string(),
                    frame: rec,
                },
            ],
        );
        let required = ["date", "recruiter", "total", "subcon", "permanent"];
        let found = workbook.find_sheet("RecruiterData", &required).unwrap();
        assert_eq!(found.name, "Daily");

        let by_name = workbook.find_sheet("Notes", &required).unwrap();
        assert_eq!(by_name.name, "Notes");

        assert!(workbook.find_sheet("ClientWise", &["client"]).is_none());
    }

    #[test]
    fn csv_bytes_load_as_text_columns() {
        let source = WorkbookSource::bytes(
            "RecruiterData.csv",
            b"Date,Recruiter,Total\n2024-01-01,Asha,10+\n".to_vec(),
        );
        let workbook = Workbook::load(&source, &SheetSelection::All).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["RecruiterData"]);
        let frame = &workbook.first().unwrap().frame;
        assert_eq!(frame.column("Total").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn csv_named_sheet_mismatch_is_error() {
        let source = WorkbookSource::bytes("book.csv", b"a\n1\n".to_vec());
        let result = Workbook::load(&source, &SheetSelection::Named("Other".to_string()));
        assert!(matches!(result, Err(LoadError::SheetNotFound(_))));
    }

    #[test]
    fn garbage_excel_is_format_error() {
        let source = WorkbookSource::bytes("broken.xlsx", b"PK\x03\x04not a zip".to_vec());
        let result = Workbook::load(&source, &SheetSelection::First);
        assert!(matches!(result, Err(LoadError::Format(_))));
    }
}
