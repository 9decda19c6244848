// Rendering the results: markdown, CSV and JSON.

use crate::pipeline::*;

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn value_to_json(v: &Value) -> JSValue {
    match v {
        Value::Null => JSValue::Null,
        Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => json!(*x as i64),
        Value::Number(x) => json!(round4(*x)),
        Value::Text(s) => json!(s),
    }
}

/// A table as a list of JSON objects, one per row.
pub fn table_to_json(table: &Table) -> JSValue {
    let rows: Vec<JSValue> = table
        .rows()
        .iter()
        .map(|r| {
            let obj: JSMap<String, JSValue> = table
                .columns()
                .iter()
                .zip(r.iter())
                .map(|(c, v)| (c.clone(), value_to_json(v)))
                .collect();
            JSValue::Object(obj)
        })
        .collect();
    JSValue::Array(rows)
}

pub fn fit_to_json(fit: &RegressionFit, alpha: f64) -> JSValue {
    let coefficients: Vec<JSValue> = fit
        .coefficients
        .iter()
        .map(|c| {
            json!({
                "term": c.term,
                "estimate": c.estimate,
                "stdError": c.std_error,
                "tValue": c.t_value,
                "pValue": c.p_value,
            })
        })
        .collect();
    let significant: Vec<&str> = fit
        .significant(alpha)
        .iter()
        .map(|c| c.term.as_str())
        .collect();
    json!({
        "response": fit.response,
        "observations": fit.observations,
        "residualDf": fit.residual_df,
        "rSquared": fit.r_squared,
        "adjRSquared": fit.adj_r_squared,
        "residualStdError": fit.residual_std_error,
        "coefficients": coefficients,
        "aliased": fit.aliased,
        "significanceLevel": alpha,
        "significant": significant,
    })
}

pub fn violations_to_json(violations: &[CheckViolation]) -> JSValue {
    JSValue::Array(
        violations
            .iter()
            .map(|v| json!({ "check": v.check, "key": v.key, "detail": v.detail }))
            .collect(),
    )
}

fn format_cell(v: &Value) -> String {
    match v {
        Value::Number(x) if x.fract() != 0.0 => format!("{:.2}", x),
        v => v.to_string().replace('|', "\\|"),
    }
}

/// Renders the first `max_rows` rows of a table in markdown.
pub fn to_markdown(table: &Table, max_rows: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("| {} |", table.columns().join(" | ")));
    lines.push(format!(
        "|{}",
        table.columns().iter().map(|_| "---|").collect::<String>()
    ));
    for r in table.rows().iter().take(max_rows) {
        let cells: Vec<String> = r.iter().map(format_cell).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    if table.num_rows() > max_rows {
        lines.push(format!("\n({} more rows)", table.num_rows() - max_rows));
    }
    lines.join("\n")
}

/// Writes every table as `<name>.csv` in the directory.
pub fn write_tables(dir: &Path, tables: &[(String, Table)]) -> AnalysisResult<()> {
    fs::create_dir_all(dir).context(WritingFileSnafu {
        path: dir.display().to_string(),
    })?;
    for (name, table) in tables.iter() {
        let p = dir.join(format!("{}.csv", name));
        crate::pipeline::io_csv::write_csv_table(&p.display().to_string(), table)?;
    }
    info!("Wrote {} tables to {}", tables.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_strings(
            &["DivisionNm", "MarginPercent", "Winner"],
            &[
                vec!["Chisholm", "0.0800001", "LNP"],
                vec!["Level", "0", ""],
                vec!["Higgins", "33.333333", "A|B"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn markdown() {
        let md = to_markdown(&sample(), 2);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| DivisionNm | MarginPercent | Winner |");
        assert_eq!(lines[1], "|---|---|---|");
        assert_eq!(lines[2], "| Chisholm | 0.08 | LNP |");
        assert_eq!(lines[3], "| Level | 0 |  |");
        assert_eq!(lines[5], "(1 more rows)");
        assert!(to_markdown(&sample(), 5).contains("A\\|B"));
    }

    #[test]
    fn json_rows() {
        let js = table_to_json(&sample());
        assert_eq!(js[0]["MarginPercent"], json!(0.08));
        assert_eq!(js[1]["MarginPercent"], json!(0));
        assert_eq!(js[1]["Winner"], JSValue::Null);
        assert_eq!(js[2]["MarginPercent"], json!(33.3333));
    }

    #[test]
    fn violations() {
        let js = violations_to_json(&[CheckViolation {
            check: "two_party_sums".to_string(),
            key: "9".to_string(),
            detail: "40 + 50 = 90".to_string(),
        }]);
        assert_eq!(js[0]["key"], json!("9"));
    }

    #[test]
    fn tables_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("tables");
        write_tables(&out, &[("division_tpp".to_string(), sample())]).unwrap();
        assert!(out.join("division_tpp.csv").exists());
    }
}
