//! Consistency checks on the source data.
//!
//! The checks never modify a table. They report the rows that break an
//! expectation about the AEC files.

use log::warn;
use std::collections::HashMap;

use crate::config::*;
use crate::join::anti_join_keys;
use crate::table::{row_key, Table};

fn violation(check: &str, key: String, detail: String) -> CheckViolation {
    warn!("check {} failed for {}: {}", check, key, detail);
    CheckViolation {
        check: check.to_string(),
        key,
        detail,
    }
}

/// Every division of the polling places must be a known electorate.
pub fn divisions_known(
    polling: &Table,
    electorates: &Table,
    key: &str,
) -> TableResult<Vec<CheckViolation>> {
    Ok(anti_join_keys(polling, electorates, key)?
        .into_iter()
        .map(|k| {
            violation(
                "divisions_known",
                k,
                "polling place division is missing from the electorate table".to_string(),
            )
        })
        .collect())
}

/// The two-party-preferred percentages of every row must add up to 100.
pub fn two_party_sums(
    table: &Table,
    key: &str,
    first_percent: &str,
    second_percent: &str,
    tolerance: f64,
) -> TableResult<Vec<CheckViolation>> {
    let keys = table.column(key)?;
    let a = table.numbers(first_percent)?;
    let b = table.numbers(second_percent)?;
    let mut res = Vec::new();
    for ((k, a), b) in keys.iter().zip(a.iter()).zip(b.iter()) {
        if let (Some(a), Some(b)) = (a, b) {
            let sum = a + b;
            if (sum - 100.0).abs() > tolerance {
                res.push(violation(
                    "two_party_sums",
                    k.to_string(),
                    format!("{} + {} = {}", a, b, sum),
                ));
            }
        }
    }
    Ok(res)
}

/// In every group, the row flagged as elected must hold the highest percentage.
///
/// Groups without an elected row are reported as well.
pub fn winner_is_max(
    table: &Table,
    group_keys: &[&str],
    percent_column: &str,
    elected_column: &str,
) -> TableResult<Vec<CheckViolation>> {
    let gidxs = table.key_indexes(group_keys)?;
    let pct = table.numbers(percent_column)?;
    let elected = table.column(elected_column)?;

    let mut order: Vec<String> = Vec::new();
    // (best percentage, elected percentage)
    let mut groups: HashMap<String, (f64, Option<f64>)> = HashMap::new();
    for ((r, p), e) in table.rows().iter().zip(pct.iter()).zip(elected.iter()) {
        let (k, p) = match (row_key(r, &gidxs), p) {
            (Some(k), Some(p)) => (k, *p),
            _ => continue,
        };
        let entry = groups.entry(k.clone()).or_insert_with(|| {
            order.push(k);
            (f64::NEG_INFINITY, None)
        });
        entry.0 = entry.0.max(p);
        if e.key_text().as_deref() == Some("Y") {
            entry.1 = Some(p);
        }
    }

    let mut res = Vec::new();
    for k in order {
        let (best, elected_pct) = groups[&k];
        let name = k.replace('\u{1f}', "/");
        match elected_pct {
            None => res.push(violation(
                "winner_is_max",
                name,
                "no elected candidate".to_string(),
            )),
            Some(p) if p < best => res.push(violation(
                "winner_is_max",
                name,
                format!("elected candidate has {} but the maximum is {}", p, best),
            )),
            Some(_) => {}
        }
    }
    Ok(res)
}
