use log::{debug, info};
use std::collections::HashMap;

use crate::config::*;
use crate::table::{row_key, Table};

/// Joins two tables on shared key columns.
///
/// The result holds every column of `primary` followed by the non-key columns
/// of `secondary`. Secondary keys must be unique, so a left join returns
/// exactly one row per primary row.
pub fn join(
    primary: &Table,
    secondary: &Table,
    keys: &[&str],
    options: &JoinOptions,
) -> TableResult<Table> {
    let p_idxs = primary.key_indexes(keys)?;
    let s_idxs = secondary.key_indexes(keys)?;

    let mut index: HashMap<String, usize> = HashMap::new();
    for (ridx, r) in secondary.rows().iter().enumerate() {
        if let Some(k) = row_key(r, &s_idxs) {
            if index.insert(k.clone(), ridx).is_some() {
                return Err(TableErrors::DuplicateKey(k.replace('\u{1f}', "/")));
            }
        }
    }

    // The secondary columns carried over, and their names in the output.
    let carried: Vec<usize> = (0..secondary.columns().len())
        .filter(|i| !s_idxs.contains(i))
        .collect();
    let mut columns: Vec<String> = primary.columns().to_vec();
    for i in carried.iter() {
        let name = &secondary.columns()[*i];
        let out_name = if columns.contains(name) {
            format!("{}{}", name, options.suffix)
        } else {
            name.clone()
        };
        columns.push(out_name);
    }

    let mut res = Table::with_columns(columns)?;
    let mut unmatched = 0usize;
    for r in primary.rows().iter() {
        let matched = row_key(r, &p_idxs).and_then(|k| index.get(&k).cloned());
        let mut row = r.clone();
        match matched {
            Some(sidx) => {
                let srow = &secondary.rows()[sidx];
                row.extend(carried.iter().map(|i| srow[*i].clone()));
            }
            None => {
                unmatched += 1;
                if options.kind == JoinKind::Inner {
                    continue;
                }
                row.extend(carried.iter().map(|_| Value::Null));
            }
        }
        res.push_row(row)?;
    }

    if unmatched > 0 {
        info!(
            "join on {:?}: {} of {} primary rows have no match ({:?} join)",
            keys,
            unmatched,
            primary.num_rows(),
            options.kind
        );
    }
    debug!(
        "join on {:?}: {} rows x {} columns",
        keys,
        res.num_rows(),
        res.columns().len()
    );
    Ok(res)
}

/// The primary key values that have no counterpart in the secondary table.
pub fn anti_join_keys(primary: &Table, secondary: &Table, key: &str) -> TableResult<Vec<String>> {
    let known: Vec<String> = secondary.distinct(key)?;
    Ok(primary
        .distinct(key)?
        .into_iter()
        .filter(|k| !known.contains(k))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divisions() -> Table {
        Table::from_strings(
            &["DivisionNm", "StateAb", "TotalVotes"],
            &[
                vec!["Adelaide", "SA", "90000"],
                vec!["Banks", "NSW", "85000"],
                vec!["Lingiari", "NT", "40000"],
            ],
        )
        .unwrap()
    }

    fn census() -> Table {
        Table::from_strings(
            &["DivisionNm", "StateAb", "MedianIncome"],
            &[
                vec!["ADELAIDE", "SA", "700"],
                vec!["Banks", "NSW", "650"],
                vec!["Solomon", "NT", "900"],
            ],
        )
        .unwrap()
    }

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn left_join_keeps_primary_rows() {
        init_logs();
        let p = divisions();
        let j = join(&p, &census(), &["DivisionNm"], &JoinOptions::left()).unwrap();
        assert_eq!(j.num_rows(), p.num_rows());
        assert_eq!(
            j.columns(),
            &["DivisionNm", "StateAb", "TotalVotes", "StateAb.y", "MedianIncome"]
        );
        assert_eq!(j.value(0, "MedianIncome").unwrap(), &Value::Number(700.0));
        assert!(j.value(2, "MedianIncome").unwrap().is_null());
        assert!(j.value(2, "StateAb.y").unwrap().is_null());
    }

    #[test]
    fn inner_join_drops_unmatched() {
        let j = join(&divisions(), &census(), &["DivisionNm"], &JoinOptions::inner()).unwrap();
        assert_eq!(j.num_rows(), 2);
        assert_eq!(j.distinct("DivisionNm").unwrap(), vec!["ADELAIDE", "BANKS"]);
    }

    #[test]
    fn composite_keys() {
        let j = join(
            &divisions(),
            &census(),
            &["DivisionNm", "StateAb"],
            &JoinOptions::left(),
        )
        .unwrap();
        assert_eq!(j.columns().len(), 4);
        assert_eq!(j.value(1, "MedianIncome").unwrap(), &Value::Number(650.0));
    }

    #[test]
    fn duplicate_secondary_key_is_an_error() {
        let mut c = census();
        c.push_row(vec!["Banks".into(), "NSW".into(), Value::Number(1.0)])
            .unwrap();
        let err = join(&divisions(), &c, &["DivisionNm"], &JoinOptions::left()).unwrap_err();
        assert_eq!(err, TableErrors::DuplicateKey("BANKS".to_string()));
    }

    #[test]
    fn missing_key_column() {
        let err = join(&divisions(), &census(), &["Year"], &JoinOptions::left()).unwrap_err();
        assert_eq!(err, TableErrors::MissingColumn("Year".to_string()));
    }

    #[test]
    fn null_keys_never_match() {
        let mut p = divisions();
        p.push_row(vec![Value::Null, "ACT".into(), Value::Number(1.0)])
            .unwrap();
        let mut s = census();
        s.push_row(vec![Value::Null, "ACT".into(), Value::Number(5.0)])
            .unwrap();
        let j = join(&p, &s, &["DivisionNm"], &JoinOptions::left()).unwrap();
        assert_eq!(j.num_rows(), 4);
        assert!(j.value(3, "MedianIncome").unwrap().is_null());
    }

    #[test]
    fn anti_join() {
        let missing = anti_join_keys(&divisions(), &census(), "DivisionNm").unwrap();
        assert_eq!(missing, vec!["LINGIARI".to_string()]);
    }
}
