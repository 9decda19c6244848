// Primitives for reading and writing CSV files.

use std::fs::File;

use crate::pipeline::config_reader::{FileSource, Provider};
use crate::pipeline::*;

pub fn read_csv_table(path: &str, cfs: &FileSource) -> AnalysisResult<Table> {
    let skip_rows = cfs.skip_rows_int()?;
    let skip_titles = skip_rows.is_none() && cfs.provider()? == Provider::Aec;
    let (mut records, mut lineno) = get_records(path, skip_rows.unwrap_or(0))?;

    // The header, after the title lines of the AEC downloads.
    let header: csv::StringRecord = loop {
        lineno += 1;
        match records.next() {
            None => return EmptyFileSnafu { path }.fail(),
            Some(line_r) => {
                let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
                if skip_titles && line.len() <= 1 {
                    debug!("read_csv_table: skipping title line {}: {:?}", lineno, line);
                    continue;
                }
                break line;
            }
        }
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let s = if idx == 0 { s.trim_start_matches('\u{feff}') } else { s };
            s.trim().to_string()
        })
        .collect();
    let num_columns = columns.len();
    let mut table = Table::with_columns(columns).context(TableSnafu {
        step: format!("reading the header of {}", path),
    })?;

    for line_r in records {
        lineno += 1;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if line.len() > num_columns {
            return CsvLineTooLongSnafu { path, lineno }.fail();
        }
        let mut row: Vec<Value> = line.iter().map(Value::parse).collect();
        row.resize(num_columns, Value::Null);
        table.push_row(row).context(TableSnafu {
            step: format!("reading line {} of {}", lineno, path),
        })?;
    }
    Ok(table)
}

fn get_records(
    path: &str,
    skip: usize,
) -> AnalysisResult<(csv::StringRecordsIntoIter<File>, usize)> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();
    for _ in 0..skip {
        _ = records.next();
    }
    Ok((records, skip))
}

pub fn write_csv_table(path: &str, table: &Table) -> AnalysisResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path })?;
    wtr.write_record(table.columns())
        .context(CsvWriteSnafu { path })?;
    for r in table.rows().iter() {
        wtr.write_record(r.iter().map(|v| v.to_string()))
            .context(CsvWriteSnafu { path })?;
    }
    wtr.flush().context(WritingFileSnafu { path })?;
    debug!("write_csv_table: {} rows written to {}", table.num_rows(), path);
    Ok(())
}
