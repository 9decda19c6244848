use log::{debug, info, warn};
use std::collections::HashMap;

use crate::aggregate::group_by;
use crate::config::*;
use crate::table::{row_key, Table};

/// The margin of a winner holding `winning_percent` of `total_votes`.
///
/// The margin in percentage points is twice the distance to 50%. It is turned
/// back into an approximate number of votes in proportion to the total.
pub fn margin(winning_percent: f64, total_votes: f64) -> Margin {
    let percent = 2.0 * (winning_percent - 50.0);
    Margin {
        percent,
        votes: (percent * total_votes / 100.0).round(),
    }
}

/// Adds the winner and margin of every row of a two-party-preferred table.
///
/// The winner is the party with at least 50% of the vote. An exact 50/50 split
/// has no winner and is flagged in the `Tied` column.
pub fn two_party_outcome(table: &Table, spec: &TwoPartySpec) -> TableResult<Table> {
    let first = table.numbers(&spec.first.percent_column)?;
    let second = table.numbers(&spec.second.percent_column)?;
    let totals = table.numbers(&spec.total_column)?;

    let mut winners: Vec<Value> = Vec::with_capacity(table.num_rows());
    let mut tied: Vec<Value> = Vec::with_capacity(table.num_rows());
    let mut margin_pct: Vec<Value> = Vec::with_capacity(table.num_rows());
    let mut margin_votes: Vec<Value> = Vec::with_capacity(table.num_rows());
    for ((a, b), total) in first.iter().zip(second.iter()).zip(totals.iter()) {
        let outcome = match (a, b) {
            (Some(a), Some(b)) if a > b && *a >= 50.0 => Some((&spec.first.label, *a)),
            (Some(a), Some(b)) if b > a && *b >= 50.0 => Some((&spec.second.label, *b)),
            _ => None,
        };
        let is_tie = matches!((a, b), (Some(a), Some(b)) if a == b);
        match (outcome, total) {
            (Some((label, pct)), Some(total)) => {
                let m = margin(pct, *total);
                winners.push(Value::from(label.as_str()));
                margin_pct.push(Value::Number(m.percent));
                margin_votes.push(Value::Number(m.votes));
            }
            (Some((label, _)), None) => {
                winners.push(Value::from(label.as_str()));
                margin_pct.push(Value::Null);
                margin_votes.push(Value::Null);
            }
            (None, _) => {
                winners.push(Value::Null);
                margin_pct.push(if is_tie { Value::Number(0.0) } else { Value::Null });
                margin_votes.push(if is_tie { Value::Number(0.0) } else { Value::Null });
            }
        }
        tied.push(Value::from(if is_tie { "Y" } else { "N" }));
    }

    table
        .with_column(WINNER, winners)?
        .with_column(TIED, tied)?
        .with_column(MARGIN_PERCENT, margin_pct)?
        .with_column(MARGIN_VOTES, margin_votes)
}

/// Aggregates a two-party-preferred table (usually by polling place) to one
/// row per division, then derives the winner and margin of every division.
///
/// Percentages are recomputed from the summed votes. Divisions without any
/// vote are dropped before any proportion is computed.
pub fn two_party_by_division(
    booths: &Table,
    spec: &TwoPartySpec,
    division_keys: &[&str],
) -> TableResult<Table> {
    let mut aggs: Vec<Aggregation> = vec![
        Aggregation::sum(&spec.first.votes_column),
        Aggregation::sum(&spec.second.votes_column),
    ];
    for c in ["StateAb", "Year"] {
        if booths.has_column(c) && !division_keys.contains(&c) {
            aggs.push(Aggregation::first(c));
        }
    }
    let summed = group_by(booths, division_keys, &aggs)?;

    let a = summed.numbers(&spec.first.votes_column)?;
    let b = summed.numbers(&spec.second.votes_column)?;
    let totals: Vec<Value> = a
        .iter()
        .zip(b.iter())
        .map(|(a, b)| Value::Number(a.unwrap_or(0.0) + b.unwrap_or(0.0)))
        .collect();
    let with_totals = summed.with_column(&spec.total_column, totals)?;

    let non_empty = with_totals.filter(|r| r.number(&spec.total_column).unwrap_or(0.0) > 0.0);
    let dropped = with_totals.num_rows() - non_empty.num_rows();
    if dropped > 0 {
        warn!(
            "two_party_by_division: dropping {} divisions with zero votes",
            dropped
        );
    }

    let totals = non_empty.numbers(&spec.total_column)?;
    let pct = |votes: Vec<Option<f64>>| -> Vec<Value> {
        votes
            .iter()
            .zip(totals.iter())
            .map(|(v, t)| match (v, t) {
                (Some(v), Some(t)) => Value::Number(100.0 * v / t),
                _ => Value::Null,
            })
            .collect()
    };
    let first_pct = pct(non_empty.numbers(&spec.first.votes_column)?);
    let second_pct = pct(non_empty.numbers(&spec.second.votes_column)?);
    let res = non_empty
        .with_column(&spec.first.percent_column, first_pct)?
        .with_column(&spec.second.percent_column, second_pct)?;
    info!(
        "two_party_by_division: {} booths -> {} divisions",
        booths.num_rows(),
        res.num_rows()
    );
    two_party_outcome(&res, spec)
}

/// Computes, per group, the share of each candidate and the winning party.
///
/// The input has one row per candidate (and possibly per polling place). Votes
/// are summed per candidate when `candidate_column` is given and present, and
/// per party otherwise, so two independents stay apart when they have their
/// own ids. The output has one row per group: the party of the winner, its
/// percentage, its share of the top two and the derived margin. Groups with no
/// votes are dropped. A group in which several candidates share the top count
/// has no winner.
pub fn candidate_outcome(
    table: &Table,
    group_keys: &[&str],
    candidate_column: Option<&str>,
    party_column: &str,
    votes_column: &str,
) -> TableResult<Table> {
    let mut keys: Vec<&str> = group_keys.to_vec();
    let by_party = match candidate_column.filter(|c| table.has_column(c)) {
        Some(candidate) => {
            keys.push(candidate);
            group_by(
                table,
                &keys,
                &[
                    Aggregation::sum(votes_column),
                    Aggregation::first(party_column),
                ],
            )?
        }
        None => {
            keys.push(party_column);
            group_by(table, &keys, &[Aggregation::sum(votes_column)])?
        }
    };

    let gidxs = by_party.key_indexes(group_keys)?;
    let pidx = by_party.column_index(party_column)?;
    let vidx = by_party.column_index(votes_column)?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (ridx, r) in by_party.rows().iter().enumerate() {
        if let Some(k) = row_key(r, &gidxs) {
            groups
                .entry(k.clone())
                .or_insert_with(|| {
                    order.push(k);
                    Vec::new()
                })
                .push(ridx);
        }
    }

    let mut columns: Vec<String> = group_keys.iter().map(|s| s.to_string()).collect();
    for c in [
        WINNER,
        PERCENT,
        TOP_TWO_PERCENT,
        TIED,
        "TotalVotes",
        MARGIN_PERCENT,
        MARGIN_VOTES,
    ] {
        columns.push(c.to_string());
    }
    let mut res = Table::with_columns(columns)?;

    for k in order.iter() {
        let ridxs = &groups[k];
        let mut entries: Vec<(String, f64)> = ridxs
            .iter()
            .map(|r| {
                let row = &by_party.rows()[*r];
                (row[pidx].to_string(), row[vidx].as_f64().unwrap_or(0.0))
            })
            .collect();
        let total: f64 = entries.iter().map(|(_, v)| v).sum();
        if total <= 0.0 {
            warn!("candidate_outcome: group {:?} has no votes, dropping it", k);
            continue;
        }
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (top_name, top_votes) = entries[0].clone();
        let runner_up = entries.get(1).map(|e| e.1).unwrap_or(0.0);
        let is_tie = entries.len() > 1 && runner_up == top_votes;

        let pct = 100.0 * top_votes / total;
        let top_two_pct = 100.0 * top_votes / (top_votes + runner_up);
        let m = margin(top_two_pct, top_votes + runner_up);

        let first = &by_party.rows()[ridxs[0]];
        let mut row: Vec<Value> = gidxs.iter().map(|i| first[*i].clone()).collect();
        if is_tie {
            debug!("candidate_outcome: group {:?} is tied at {}", k, top_votes);
            row.extend([
                Value::Null,
                Value::Number(pct),
                Value::Number(50.0),
                Value::from("Y"),
                Value::Number(total),
                Value::Number(0.0),
                Value::Number(0.0),
            ]);
        } else {
            row.extend([
                Value::from(top_name),
                Value::Number(pct),
                Value::Number(top_two_pct),
                Value::from("N"),
                Value::Number(total),
                Value::Number(m.percent),
                Value::Number(m.votes),
            ]);
        }
        res.push_row(row)?;
    }
    Ok(res)
}

/// Adds the share (in percent) of each row within its group.
///
/// Rows of groups whose total is zero are removed, so no proportion is ever
/// computed against an empty total.
pub fn proportions(
    table: &Table,
    group_keys: &[&str],
    votes_column: &str,
    into: &str,
) -> TableResult<Table> {
    let gidxs = table.key_indexes(group_keys)?;
    let votes = table.numbers(votes_column)?;
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (r, v) in table.rows().iter().zip(votes.iter()) {
        if let Some(k) = row_key(r, &gidxs) {
            *totals.entry(k).or_insert(0.0) += v.unwrap_or(0.0);
        }
    }

    let mut keep: Vec<bool> = Vec::with_capacity(table.num_rows());
    let mut shares: Vec<Value> = Vec::new();
    for (r, v) in table.rows().iter().zip(votes.iter()) {
        let total = row_key(r, &gidxs).and_then(|k| totals.get(&k).cloned());
        match total {
            Some(t) if t > 0.0 => {
                keep.push(true);
                shares.push(v.map(|v| 100.0 * v / t).into());
            }
            _ => keep.push(false),
        }
    }

    let mut res = Table::with_columns(table.columns().to_vec())?;
    for (r, k) in table.rows().iter().zip(keep.iter()) {
        if *k {
            res.push_row(r.clone())?;
        }
    }
    if res.num_rows() < table.num_rows() {
        warn!(
            "proportions: dropped {} rows of groups with zero {}",
            table.num_rows() - res.num_rows(),
            votes_column
        );
    }
    res.with_column(into, shares)
}

/// Recodes the values of a text column into a new column.
///
/// Values absent from the mapping are kept as they are.
pub fn map_values(
    table: &Table,
    column: &str,
    mapping: &HashMap<String, String>,
    into: &str,
) -> TableResult<Table> {
    let normalised: HashMap<String, &String> = mapping
        .iter()
        .map(|(k, v)| (k.trim().to_uppercase(), v))
        .collect();
    let values: Vec<Value> = table
        .column(column)?
        .into_iter()
        .map(|v| match v.key_text().and_then(|k| normalised.get(&k).cloned()) {
            Some(target) => Value::from(target.as_str()),
            None => v.clone(),
        })
        .collect();
    table.with_column(into, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TwoPartySpec {
        TwoPartySpec {
            first: PartyColumns {
                label: "LNP".to_string(),
                votes_column: "LNP_Votes".to_string(),
                percent_column: "LNP_Percent".to_string(),
            },
            second: PartyColumns {
                label: "ALP".to_string(),
                votes_column: "ALP_Votes".to_string(),
                percent_column: "ALP_Percent".to_string(),
            },
            total_column: "TotalVotes".to_string(),
        }
    }

    #[test]
    fn margin_is_proportional_to_total() {
        let m = margin(50.04, 85000.0);
        assert!((m.percent - 0.08).abs() < 1e-9);
        assert_eq!(m.votes, 68.0);
    }

    #[test]
    fn two_party_winner_and_tie() {
        let t = Table::from_strings(
            &["DivisionNm", "LNP_Percent", "ALP_Percent", "TotalVotes"],
            &[
                vec!["Banks", "51.44", "48.56", "90000"],
                vec!["Herbert", "49.98", "50.02", "86000"],
                vec!["Even", "50", "50", "1000"],
            ],
        )
        .unwrap();
        let out = two_party_outcome(&t, &spec()).unwrap();
        assert_eq!(out.value(0, WINNER).unwrap().as_str(), Some("LNP"));
        assert_eq!(out.value(1, WINNER).unwrap().as_str(), Some("ALP"));
        assert_eq!(out.value(1, MARGIN_VOTES).unwrap(), &Value::Number(34.0));
        assert!(out.value(2, WINNER).unwrap().is_null());
        assert_eq!(out.value(2, TIED).unwrap().as_str(), Some("Y"));
    }

    #[test]
    fn booths_aggregate_to_divisions() {
        let booths = Table::from_strings(
            &["DivisionNm", "PollingPlaceID", "LNP_Votes", "ALP_Votes"],
            &[
                vec!["Banks", "1", "600", "400"],
                vec!["Banks", "2", "300", "700"],
                vec!["Ghost", "3", "0", "0"],
                vec!["Adelaide", "4", "250", "750"],
            ],
        )
        .unwrap();
        let d = two_party_by_division(&booths, &spec(), &["DivisionNm"]).unwrap();
        assert_eq!(d.num_rows(), 2);
        assert_eq!(d.distinct("DivisionNm").unwrap(), vec!["BANKS", "ADELAIDE"]);
        // Banks: 900 / 2000
        assert_eq!(d.value(0, "LNP_Percent").unwrap(), &Value::Number(45.0));
        assert_eq!(d.value(0, WINNER).unwrap().as_str(), Some("ALP"));
        assert_eq!(d.value(0, MARGIN_VOTES).unwrap(), &Value::Number(200.0));
        for r in d.rows() {
            let (a, b) = (
                d.columns().iter().position(|c| c == "LNP_Percent").unwrap(),
                d.columns().iter().position(|c| c == "ALP_Percent").unwrap(),
            );
            let sum = r[a].as_f64().unwrap() + r[b].as_f64().unwrap();
            assert!((sum - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn candidate_winner_has_maximum() {
        let tcp = Table::from_strings(
            &["DivisionNm", "PollingPlaceID", "PartyAb", "OrdinaryVotes"],
            &[
                vec!["Banks", "1", "ALP", "21000"],
                vec!["Banks", "1", "LP", "21010"],
                vec!["Banks", "2", "ALP", "21534"],
                vec!["Banks", "2", "LP", "21456"],
                vec!["Empty", "3", "ALP", "0"],
                vec!["Empty", "3", "LP", "0"],
                vec!["Level", "4", "ALP", "10"],
                vec!["Level", "4", "IND", "10"],
            ],
        )
        .unwrap();
        let out =
            candidate_outcome(&tcp, &["DivisionNm"], None, "PartyAb", "OrdinaryVotes").unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.value(0, WINNER).unwrap().as_str(), Some("ALP"));
        // 42534 / 85000 = 50.04%, margin of 68 votes.
        assert_eq!(out.value(0, MARGIN_VOTES).unwrap(), &Value::Number(68.0));
        assert!(out.value(1, WINNER).unwrap().is_null());
        assert_eq!(out.value(1, TIED).unwrap().as_str(), Some("Y"));
    }

    #[test]
    fn independents_are_counted_apart() {
        let tcp = Table::from_strings(
            &["DivisionNm", "CandidateID", "PartyAb", "TotalVotes"],
            &[
                vec!["Indi", "1", "IND", "21000"],
                vec!["Indi", "2", "IND", "21010"],
                vec!["Indi", "1", "IND", "21534"],
                vec!["Indi", "2", "IND", "21456"],
            ],
        )
        .unwrap();
        let out = candidate_outcome(
            &tcp,
            &["DivisionNm"],
            Some("CandidateID"),
            "PartyAb",
            "TotalVotes",
        )
        .unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.value(0, WINNER).unwrap().as_str(), Some("IND"));
        assert_eq!(out.value(0, "TotalVotes").unwrap(), &Value::Number(85000.0));
        // 42534 against 42466.
        assert_eq!(out.value(0, MARGIN_VOTES).unwrap(), &Value::Number(68.0));
        let pct = out.value(0, MARGIN_PERCENT).unwrap().as_f64().unwrap();
        assert!((pct - 0.08).abs() < 1e-9);
        assert_eq!(out.value(0, TIED).unwrap().as_str(), Some("N"));

        // Without the ids both are merged into a single entry.
        let merged =
            candidate_outcome(&tcp, &["DivisionNm"], None, "PartyAb", "TotalVotes").unwrap();
        assert_eq!(merged.value(0, MARGIN_PERCENT).unwrap(), &Value::Number(100.0));
    }

    #[test]
    fn proportions_skip_empty_groups() {
        let t = Table::from_strings(
            &["DivisionNm", "PartyAb", "Votes"],
            &[
                vec!["Banks", "ALP", "30"],
                vec!["Banks", "LP", "70"],
                vec!["Empty", "ALP", "0"],
            ],
        )
        .unwrap();
        let p = proportions(&t, &["DivisionNm"], "Votes", "Share").unwrap();
        assert_eq!(p.num_rows(), 2);
        assert_eq!(p.value(1, "Share").unwrap(), &Value::Number(70.0));
    }

    #[test]
    fn party_groups() {
        let t = Table::from_strings(&["PartyAb"], &[vec!["LP"], vec!["np"], vec!["ALP"], vec![""]])
            .unwrap();
        let mapping: HashMap<String, String> = [("LP", "LNP"), ("NP", "LNP")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let out = map_values(&t, "PartyAb", &mapping, "PartyGroup").unwrap();
        let groups: Vec<String> = out
            .column("PartyGroup")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(groups, vec!["LNP", "LNP", "ALP", ""]);
    }
}
