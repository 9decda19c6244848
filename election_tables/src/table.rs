use log::debug;
use std::collections::HashSet;

use crate::config::*;

/// A rectangular table of values with named columns.
///
/// Tables are never mutated once built by the pipeline: operations return new
/// tables with the derived columns appended.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: &[&str]) -> TableResult<Table> {
        Table::with_columns(columns.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_columns(columns: Vec<String>) -> TableResult<Table> {
        let mut seen: HashSet<&str> = HashSet::new();
        for c in columns.iter() {
            if !seen.insert(c.as_str()) {
                return Err(TableErrors::DuplicateColumn(c.clone()));
            }
        }
        Ok(Table {
            columns,
            rows: Vec::new(),
        })
    }

    /// Builds a table from raw string cells, parsing every cell.
    pub fn from_strings(columns: &[&str], rows: &[Vec<&str>]) -> TableResult<Table> {
        let mut t = Table::new(columns)?;
        for r in rows {
            t.push_row(r.iter().map(|s| Value::parse(s)).collect())?;
        }
        Ok(t)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> TableResult<()> {
        if row.len() != self.columns.len() {
            return Err(TableErrors::RowArity {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> TableResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TableErrors::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> TableResult<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// The numeric values of a column. Nulls are kept as `None`.
    pub fn numbers(&self, name: &str) -> TableResult<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        let mut res = Vec::with_capacity(self.rows.len());
        for (row, r) in self.rows.iter().enumerate() {
            match &r[idx] {
                Value::Null => res.push(None),
                Value::Number(x) => res.push(Some(*x)),
                Value::Text(_) => {
                    return Err(TableErrors::NotNumeric {
                        column: name.to_string(),
                        row,
                    })
                }
            }
        }
        Ok(res)
    }

    pub fn value(&self, row: usize, name: &str) -> TableResult<&Value> {
        let idx = self.column_index(name)?;
        self.rows
            .get(row)
            .map(|r| &r[idx])
            .ok_or(TableErrors::RowOutOfRange {
                row,
                rows: self.rows.len(),
            })
    }

    /// Returns a new table with the given column appended, or replaced if a
    /// column with that name already exists.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> TableResult<Table> {
        if values.len() != self.rows.len() {
            return Err(TableErrors::RowArity {
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        let mut res = self.clone();
        match self.column_index(name) {
            Ok(idx) => {
                for (r, v) in res.rows.iter_mut().zip(values) {
                    r[idx] = v;
                }
            }
            Err(_) => {
                res.columns.push(name.to_string());
                for (r, v) in res.rows.iter_mut().zip(values) {
                    r.push(v);
                }
            }
        }
        Ok(res)
    }

    /// Adds a constant column if it is not present yet.
    pub fn with_default_column(&self, name: &str, value: Value) -> TableResult<Table> {
        if self.has_column(name) {
            return Ok(self.clone());
        }
        self.with_column(name, vec![value; self.rows.len()])
    }

    /// Replaces the nulls of a column.
    pub fn fill_null(&self, name: &str, value: Value) -> TableResult<Table> {
        let idx = self.column_index(name)?;
        let mut res = self.clone();
        for r in res.rows.iter_mut() {
            if r[idx].is_null() {
                r[idx] = value.clone();
            }
        }
        Ok(res)
    }

    pub fn rename_column(&self, from: &str, to: &str) -> TableResult<Table> {
        let idx = self.column_index(from)?;
        if from != to && self.has_column(to) {
            return Err(TableErrors::DuplicateColumn(to.to_string()));
        }
        let mut res = self.clone();
        res.columns[idx] = to.to_string();
        Ok(res)
    }

    /// Keeps the rows for which the predicate holds.
    pub fn filter<F>(&self, pred: F) -> Table
    where
        F: Fn(&RowView) -> bool,
    {
        let rows: Vec<Vec<Value>> = self
            .rows
            .iter()
            .filter(|r| {
                pred(&RowView {
                    columns: &self.columns,
                    values: r,
                })
            })
            .cloned()
            .collect();
        debug!("filter: kept {} of {} rows", rows.len(), self.rows.len());
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn select(&self, names: &[&str]) -> TableResult<Table> {
        let idxs: Vec<usize> = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<TableResult<Vec<usize>>>()?;
        let mut res = Table::new(names)?;
        for r in self.rows.iter() {
            res.rows.push(idxs.iter().map(|i| r[*i].clone()).collect());
        }
        Ok(res)
    }

    /// The columns in which every non-null value is a number, and at least one
    /// value is present.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| {
                let mut any = false;
                for r in self.rows.iter() {
                    match r[*idx] {
                        Value::Number(_) => any = true,
                        Value::Null => {}
                        Value::Text(_) => return false,
                    }
                }
                any
            })
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// The distinct key texts of a column, in order of first appearance.
    pub fn distinct(&self, name: &str) -> TableResult<Vec<String>> {
        let idx = self.column_index(name)?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut res = Vec::new();
        for r in self.rows.iter() {
            if let Some(k) = r[idx].key_text() {
                if seen.insert(k.clone()) {
                    res.push(k);
                }
            }
        }
        Ok(res)
    }

    /// Sorts rows by a numeric column. Nulls go last.
    pub fn sort_by_number(&self, name: &str, descending: bool) -> TableResult<Table> {
        let idx = self.column_index(name)?;
        let mut res = self.clone();
        res.rows.sort_by(|a, b| {
            let (x, y) = (a[idx].as_f64(), b[idx].as_f64());
            match (x, y) {
                (Some(x), Some(y)) if descending => y.total_cmp(&x),
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        Ok(res)
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub(crate) fn key_indexes(&self, keys: &[&str]) -> TableResult<Vec<usize>> {
        keys.iter().map(|k| self.column_index(k)).collect()
    }
}

/// Builds the composite key of a row. None if any part of the key is null.
pub(crate) fn row_key(row: &[Value], idxs: &[usize]) -> Option<String> {
    let mut parts: Vec<String> = Vec::with_capacity(idxs.len());
    for i in idxs {
        parts.push(row[*i].key_text()?);
    }
    Some(parts.join("\u{1f}"))
}

/// Read access to one row by column name.
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_f64())
    }

    pub fn text(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_strings(
            &["DivisionNm", "TotalVotes", "Note"],
            &[
                vec!["Adelaide", "1000", "x"],
                vec!["Banks", "", "y"],
                vec!["Chisholm", "250.5", ""],
            ],
        )
        .unwrap()
    }

    #[test]
    fn parse_values() {
        assert_eq!(Value::parse(" 12 "), Value::Number(12.0));
        assert_eq!(Value::parse(""), Value::Null);
        assert_eq!(Value::parse("Y"), Value::Text("Y".to_string()));
        assert_eq!(Value::parse("NaN"), Value::Text("NaN".to_string()));
    }

    #[test]
    fn key_text_normalises() {
        assert_eq!(
            Value::parse("McMillan").key_text(),
            Value::parse("MCMILLAN ").key_text()
        );
        assert_eq!(Value::Number(1234.0).key_text(), Some("1234".to_string()));
        assert_eq!(Value::Null.key_text(), None);
    }

    #[test]
    fn duplicate_columns_rejected() {
        assert_eq!(
            Table::new(&["a", "a"]),
            Err(TableErrors::DuplicateColumn("a".to_string()))
        );
    }

    #[test]
    fn push_row_checks_arity() {
        let mut t = Table::new(&["a", "b"]).unwrap();
        assert!(t.push_row(vec![Value::Null]).is_err());
        assert!(t.push_row(vec![Value::Null, Value::Null]).is_ok());
    }

    #[test]
    fn with_column_appends_without_touching_source() {
        let t = sample();
        let t2 = t
            .with_column("Year", vec![Value::Number(2016.0); 3])
            .unwrap();
        assert_eq!(t.columns().len(), 3);
        assert_eq!(t2.columns().len(), 4);
        assert_eq!(t2.value(2, "Year").unwrap(), &Value::Number(2016.0));

        let t3 = t2.with_column("Year", vec![Value::Null; 3]).unwrap();
        assert_eq!(t3.columns().len(), 4);
        assert!(t3.value(0, "Year").unwrap().is_null());
    }

    #[test]
    fn numeric_columns_skip_text() {
        let t = sample();
        assert_eq!(t.numeric_columns(), vec!["TotalVotes".to_string()]);
    }

    #[test]
    fn filter_and_select() {
        let t = sample();
        let big = t.filter(|r| r.number("TotalVotes").map(|x| x > 500.0).unwrap_or(false));
        assert_eq!(big.num_rows(), 1);
        let s = big.select(&["DivisionNm"]).unwrap();
        assert_eq!(s.columns(), &["DivisionNm".to_string()]);
        assert_eq!(s.value(0, "DivisionNm").unwrap().as_str(), Some("Adelaide"));
    }

    #[test]
    fn sort_puts_nulls_last() {
        let t = sample().sort_by_number("TotalVotes", false).unwrap();
        let names: Vec<String> = t
            .column("DivisionNm")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(names, vec!["Chisholm", "Adelaide", "Banks"]);
    }

    #[test]
    fn value_out_of_range() {
        let t = sample();
        assert_eq!(
            t.value(3, "DivisionNm"),
            Err(TableErrors::RowOutOfRange { row: 3, rows: 3 })
        );
        assert!(t.value(0, "Missing").is_err());
    }

    #[test]
    fn numbers_rejects_text() {
        let t = sample();
        assert!(t.numbers("Note").is_err());
        assert_eq!(t.numbers("TotalVotes").unwrap()[1], None);
    }
}
