use log::debug;
use std::collections::HashMap;

use crate::config::*;
use crate::table::{row_key, Table};

/// Groups the rows of a table by the given keys and computes the aggregations
/// for every group.
///
/// Groups appear in the order in which they are first seen. The key columns
/// keep the value of the first row of the group. Rows with a null key are
/// dropped.
pub fn group_by(table: &Table, keys: &[&str], aggs: &[Aggregation]) -> TableResult<Table> {
    let key_idxs = table.key_indexes(keys)?;

    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<usize>> = HashMap::new();
    for (ridx, r) in table.rows().iter().enumerate() {
        if let Some(k) = row_key(r, &key_idxs) {
            members
                .entry(k.clone())
                .or_insert_with(|| {
                    order.push(k);
                    Vec::new()
                })
                .push(ridx);
        }
    }

    let mut columns: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    columns.extend(aggs.iter().map(|a| a.output_name().to_string()));
    let mut res = Table::with_columns(columns)?;

    for k in order.iter() {
        let ridxs = &members[k];
        let first = &table.rows()[ridxs[0]];
        let mut row: Vec<Value> = key_idxs.iter().map(|i| first[*i].clone()).collect();
        for agg in aggs.iter() {
            row.push(aggregate_group(table, ridxs, agg)?);
        }
        res.push_row(row)?;
    }
    debug!(
        "group_by {:?}: {} rows -> {} groups",
        keys,
        table.num_rows(),
        res.num_rows()
    );
    Ok(res)
}

fn group_numbers(table: &Table, ridxs: &[usize], column: &str) -> TableResult<Vec<f64>> {
    let idx = table.column_index(column)?;
    let mut res = Vec::with_capacity(ridxs.len());
    for ridx in ridxs {
        match &table.rows()[*ridx][idx] {
            Value::Number(x) => res.push(*x),
            Value::Null => {}
            Value::Text(_) => {
                return Err(TableErrors::NotNumeric {
                    column: column.to_string(),
                    row: *ridx,
                })
            }
        }
    }
    Ok(res)
}

fn aggregate_group(table: &Table, ridxs: &[usize], agg: &Aggregation) -> TableResult<Value> {
    let res = match agg {
        Aggregation::Count { .. } => Value::Number(ridxs.len() as f64),
        Aggregation::Sum { column, .. } => {
            Value::Number(group_numbers(table, ridxs, column)?.iter().sum())
        }
        Aggregation::Mean { column, .. } => {
            let xs = group_numbers(table, ridxs, column)?;
            if xs.is_empty() {
                Value::Null
            } else {
                Value::Number(xs.iter().sum::<f64>() / xs.len() as f64)
            }
        }
        Aggregation::Max { column, .. } => group_numbers(table, ridxs, column)?
            .into_iter()
            .reduce(f64::max)
            .into(),
        Aggregation::Min { column, .. } => group_numbers(table, ridxs, column)?
            .into_iter()
            .reduce(f64::min)
            .into(),
        Aggregation::First { column, .. } => {
            let idx = table.column_index(column)?;
            ridxs
                .iter()
                .map(|r| &table.rows()[*r][idx])
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)
        }
    };
    Ok(res)
}

/// Counts, per group, the rows in which `column` holds `expected`.
///
/// Typically used to count the seats won by each party from the `Elected` flag.
/// Groups with no matching row are not reported.
pub fn count_where(
    table: &Table,
    keys: &[&str],
    column: &str,
    expected: &str,
    into: &str,
) -> TableResult<Table> {
    table.column_index(column)?;
    let wanted = Value::parse(expected).key_text();
    let matching = table.filter(|r| r.get(column).and_then(|v| v.key_text()) == wanted);
    group_by(&matching, keys, &[Aggregation::count(into)])
}

/// Finds the name with the strictly highest value.
///
/// Several names sharing the highest value are reported as a tie.
pub fn leader(counts: &[(String, f64)]) -> Leader {
    let best = counts
        .iter()
        .map(|(_, c)| *c)
        .fold(f64::NEG_INFINITY, f64::max);
    if counts.is_empty() || !best.is_finite() {
        return Leader::Empty;
    }
    let names: Vec<String> = counts
        .iter()
        .filter(|(_, c)| *c == best)
        .map(|(n, _)| n.clone())
        .collect();
    if names.len() == 1 {
        Leader::Unique(names[0].clone(), best)
    } else {
        Leader::Tied(names, best)
    }
}

/// Reads two columns of a table as (name, value) pairs, skipping nulls.
pub fn named_values(
    table: &Table,
    name_column: &str,
    value_column: &str,
) -> TableResult<Vec<(String, f64)>> {
    let names = table.column(name_column)?;
    let values = table.numbers(value_column)?;
    Ok(names
        .into_iter()
        .zip(values)
        .filter_map(|(n, v)| match (n, v) {
            (Value::Null, _) | (_, None) => None,
            (n, Some(v)) => Some((n.to_string(), v)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Table {
        Table::from_strings(
            &["StateAb", "DivisionNm", "PartyAb", "TotalVotes", "Elected"],
            &[
                vec!["NSW", "Banks", "LP", "40000", "Y"],
                vec!["NSW", "Banks", "ALP", "38000", "N"],
                vec!["NSW", "Banks", "GRN", "", "N"],
                vec!["VIC", "Chisholm", "LP", "42000", "Y"],
                vec!["VIC", "Chisholm", "ALP", "41000", "N"],
                vec!["SA", "Adelaide", "ALP", "45000", "Y"],
                vec!["SA", "Adelaide", "LP", "39000", "N"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn sums_per_party() {
        let t = group_by(&candidates(), &["PartyAb"], &[Aggregation::sum("TotalVotes")]).unwrap();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(
            named_values(&t, "PartyAb", "TotalVotes").unwrap(),
            vec![
                ("LP".to_string(), 121000.0),
                ("ALP".to_string(), 124000.0),
                ("GRN".to_string(), 0.0)
            ]
        );
    }

    #[test]
    fn multiple_keys_and_aggregations() {
        let t = group_by(
            &candidates(),
            &["StateAb", "PartyAb"],
            &[
                Aggregation::count("n"),
                Aggregation::Max {
                    column: "TotalVotes".to_string(),
                    into: "best".to_string(),
                },
                Aggregation::Mean {
                    column: "TotalVotes".to_string(),
                    into: "mean".to_string(),
                },
            ],
        )
        .unwrap();
        assert_eq!(t.num_rows(), 7);
        // GRN in NSW only has a null vote count.
        assert!(t.value(2, "best").unwrap().is_null());
        assert!(t.value(2, "mean").unwrap().is_null());
        assert_eq!(t.value(2, "n").unwrap(), &Value::Number(1.0));
    }

    #[test]
    fn seats_won() {
        let seats = count_where(&candidates(), &["PartyAb"], "Elected", "Y", "Seats").unwrap();
        let counts = named_values(&seats, "PartyAb", "Seats").unwrap();
        assert_eq!(
            counts,
            vec![("LP".to_string(), 2.0), ("ALP".to_string(), 1.0)]
        );
        assert_eq!(leader(&counts), Leader::Unique("LP".to_string(), 2.0));
    }

    #[test]
    fn ties_are_reported_not_resolved() {
        let counts = vec![
            ("LP".to_string(), 3.0),
            ("ALP".to_string(), 3.0),
            ("GRN".to_string(), 1.0),
        ];
        assert_eq!(
            leader(&counts),
            Leader::Tied(vec!["LP".to_string(), "ALP".to_string()], 3.0)
        );
        assert_eq!(leader(&[]), Leader::Empty);
    }

    #[test]
    fn text_in_numeric_aggregation() {
        let err = group_by(&candidates(), &["StateAb"], &[Aggregation::sum("PartyAb")])
            .unwrap_err();
        assert!(matches!(err, TableErrors::NotNumeric { .. }));
    }
}
