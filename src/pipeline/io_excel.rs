use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::pipeline::config_reader::FileSource;
use crate::pipeline::*;

/// Reads a worksheet of an Excel file. The first non-empty row (after the
/// skipped rows) holds the column names.
pub fn read_excel_table(path: &str, cfs: &FileSource) -> AnalysisResult<Table> {
    let wrange = get_range(path, cfs)?;
    let skip = cfs.skip_rows_int()?.unwrap_or(0);

    let mut rows = wrange
        .rows()
        .skip(skip)
        .skip_while(|r| r.iter().all(|c| matches!(c, DataType::Empty)));
    let header = rows.next().context(EmptyFileSnafu { path })?;
    debug!("read_excel_table: header: {:?}", header);
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, c)| match cell_value(c) {
            Value::Null => format!("Column{}", idx + 1),
            v => v.to_string(),
        })
        .collect();
    let mut table = Table::with_columns(columns).context(TableSnafu {
        step: format!("reading the header of {}", path),
    })?;

    for r in rows {
        if r.iter().all(|c| matches!(c, DataType::Empty)) {
            continue;
        }
        table
            .push_row(r.iter().map(cell_value).collect())
            .context(TableSnafu {
                step: format!("reading {}", path),
            })?;
    }
    Ok(table)
}

fn get_range(path: &str, cfs: &FileSource) -> AnalysisResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, &cfs.excel_worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    match cfs.excel_worksheet_name.as_deref() {
        // A worksheet name was provided, use it.
        Some(sheet) => workbook
            .worksheet_range(sheet)
            .context(MissingWorksheetSnafu { path, sheet })?
            .context(OpeningExcelSnafu { path }),
        None => workbook
            .worksheet_range_at(0)
            .context(MissingWorksheetSnafu { path, sheet: "0" })?
            .context(OpeningExcelSnafu { path }),
    }
}

/// Converts a cell to a table value. Booleans become the AEC-style Y / N flags.
pub fn cell_value(cell: &DataType) -> Value {
    match cell {
        DataType::Empty => Value::Null,
        DataType::Int(i) => Value::Number(*i as f64),
        DataType::Float(f) | DataType::DateTime(f) if f.is_finite() => Value::Number(*f),
        DataType::Float(_) | DataType::DateTime(_) => Value::Null,
        DataType::String(s) => Value::parse(s),
        DataType::Bool(b) => Value::from(if *b { "Y" } else { "N" }),
        other => {
            warn!("cell_value: cell {:?} read as empty", other);
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(cell_value(&DataType::Int(3)), Value::Number(3.0));
        assert_eq!(cell_value(&DataType::Float(0.25)), Value::Number(0.25));
        assert_eq!(
            cell_value(&DataType::String(" 1,2 ".to_string())),
            Value::Text("1,2".to_string())
        );
        assert_eq!(
            cell_value(&DataType::String("1500".to_string())),
            Value::Number(1500.0)
        );
        assert_eq!(cell_value(&DataType::String("  ".to_string())), Value::Null);
        assert_eq!(cell_value(&DataType::Bool(true)), Value::from("Y"));
        assert_eq!(cell_value(&DataType::Empty), Value::Null);
    }

    #[test]
    fn missing_workbook() {
        let cfs = FileSource::from_path("xlsx", "/nonexistent/abs.xlsx");
        let res = read_excel_table("/nonexistent/abs.xlsx", &cfs);
        assert!(matches!(res, Err(AnalysisError::OpeningExcel { .. })));
    }
}
