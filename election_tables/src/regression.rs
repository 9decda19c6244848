use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::config::*;
use crate::table::Table;

pub const INTERCEPT: &str = "(Intercept)";

/// Which columns never enter a model as predictors.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Exclusions {
    pub suffixes: Vec<String>,
    pub prefixes: Vec<String>,
    pub columns: Vec<String>,
}

impl Default for Exclusions {
    fn default() -> Self {
        Exclusions {
            suffixes: vec!["NotStated".to_string()],
            prefixes: vec!["Age".to_string()],
            columns: vec!["Year".to_string()],
        }
    }
}

impl Exclusions {
    pub fn excludes(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
            || self.suffixes.iter().any(|s| column.ends_with(s.as_str()))
            || self.prefixes.iter().any(|p| column.starts_with(p.as_str()))
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RegressionFit {
    pub response: String,
    pub coefficients: Vec<Coefficient>,
    /// Predictors that are linear combinations of the previous terms. They get
    /// no coefficient.
    pub aliased: Vec<String>,
    pub observations: usize,
    pub residual_df: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_std_error: f64,
}

impl RegressionFit {
    /// The terms (intercept excluded) whose p-value is below `alpha`.
    pub fn significant(&self, alpha: f64) -> Vec<&Coefficient> {
        self.coefficients
            .iter()
            .filter(|c| c.term != INTERCEPT && c.p_value < alpha)
            .collect()
    }

    /// The coefficient table, one row per term.
    pub fn to_table(&self) -> TableResult<Table> {
        let mut t = Table::new(&["term", "estimate", "std_error", "t_value", "p_value"])?;
        for c in self.coefficients.iter() {
            t.push_row(vec![
                Value::from(c.term.as_str()),
                Value::Number(c.estimate),
                Value::Number(c.std_error),
                Value::Number(c.t_value),
                Value::Number(c.p_value),
            ])?;
        }
        Ok(t)
    }
}

/// The numeric columns of `table` usable as predictors of `response`.
///
/// Drops the response itself, the excluded columns and the columns without any
/// variation.
pub fn predictor_columns(table: &Table, response: &str, exclusions: &Exclusions) -> Vec<String> {
    table
        .numeric_columns()
        .into_iter()
        .filter(|c| c != response && !exclusions.excludes(c))
        .filter(|c| {
            let xs: Vec<f64> = table
                .numbers(c)
                .map(|v| v.into_iter().flatten().collect())
                .unwrap_or_default();
            let varies = xs.windows(2).any(|w| w[0] != w[1]);
            if !varies {
                debug!("predictor_columns: {} is constant, skipping it", c);
            }
            varies
        })
        .collect()
}

/// Fits `response ~ predictors` by ordinary least squares, with an intercept.
///
/// Rows with a missing value in any of the columns are left out. The model is
/// solved through a QR decomposition of the design matrix. A predictor whose
/// column is a linear combination of the previous terms is aliased and gets
/// no coefficient.
pub fn ols(table: &Table, response: &str, predictors: &[String]) -> TableResult<RegressionFit> {
    let y_col = table.numbers(response)?;
    let x_cols: Vec<Vec<Option<f64>>> = predictors
        .iter()
        .map(|p| table.numbers(p))
        .collect::<TableResult<Vec<_>>>()?;

    // Complete cases only.
    let mut xs: Vec<Vec<f64>> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    for (ridx, y) in y_col.iter().enumerate() {
        let row: Option<Vec<f64>> = x_cols.iter().map(|c| c[ridx]).collect();
        if let (Some(y), Some(row)) = (y, row) {
            let mut full = Vec::with_capacity(predictors.len() + 1);
            full.push(1.0);
            full.extend(row);
            xs.push(full);
            ys.push(*y);
        }
    }
    let n = ys.len();
    let p = predictors.len() + 1;
    debug!(
        "ols: {} of {} rows are complete for {} predictors",
        n,
        table.num_rows(),
        predictors.len()
    );
    if n <= p {
        return Err(TableErrors::NotEnoughObservations {
            observations: n,
            parameters: p,
        });
    }

    let (kept, aliased) = independent_terms(&xs, predictors);
    if !aliased.is_empty() {
        info!("ols: aliased predictors without coefficient: {:?}", aliased);
    }
    let q = kept.len();
    let df = n - q;

    let x = DMatrix::from_fn(n, q, |i, j| xs[i][kept[j]]);
    let y = DVector::from_vec(ys);
    let qr = x.clone().qr();
    let r = qr.r();
    let qty = qr.q().transpose() * &y;
    let beta = r
        .solve_upper_triangular(&qty)
        .ok_or(TableErrors::SingularDesign)?;
    // (X'X)^-1 = R^-1 R^-T
    let r_inv = r
        .solve_upper_triangular(&DMatrix::identity(q, q))
        .ok_or(TableErrors::SingularDesign)?;

    let residuals = &y - &x * &beta;
    let rss = residuals.norm_squared();
    let sigma2 = rss / df as f64;
    let y_mean = y.mean();
    let tss: f64 = y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df as f64;

    let mut coefficients = Vec::with_capacity(q);
    for (j, k) in kept.iter().enumerate() {
        let estimate = beta[j];
        let std_error = (sigma2 * r_inv.row(j).norm_squared()).sqrt();
        let (t_value, p_value) = if std_error > 0.0 {
            let t = estimate / std_error;
            (t, student_t_two_sided(t, df as f64))
        } else if estimate == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(estimate), 0.0)
        };
        let term = if *k == 0 {
            INTERCEPT.to_string()
        } else {
            predictors[*k - 1].clone()
        };
        coefficients.push(Coefficient {
            term,
            estimate,
            std_error,
            t_value,
            p_value,
        });
    }

    info!(
        "ols: {} ~ {} predictors, n = {}, R^2 = {:.4}",
        response,
        q - 1,
        n,
        r_squared
    );
    Ok(RegressionFit {
        response: response.to_string(),
        coefficients,
        aliased,
        observations: n,
        residual_df: df,
        r_squared,
        adj_r_squared,
        residual_std_error: sigma2.sqrt(),
    })
}

/// Relative size under which a pivot of R marks its column as aliased.
const ALIAS_TOLERANCE: f64 = 1e-7;

// Adds the design columns one at a time and keeps those that are not a linear
// combination of the columns already kept. Column 0 is the intercept.
fn independent_terms(xs: &[Vec<f64>], predictors: &[String]) -> (Vec<usize>, Vec<String>) {
    let n = xs.len();
    let mut kept: Vec<usize> = Vec::new();
    let mut aliased: Vec<String> = Vec::new();
    for k in 0..=predictors.len() {
        let column = DVector::from_fn(n, |i, _| xs[i][k]);
        let scale = column.norm();
        let mut trial = kept.clone();
        trial.push(k);
        let m = DMatrix::from_fn(n, trial.len(), |i, j| xs[i][trial[j]]);
        let r = m.qr().r();
        let last = trial.len() - 1;
        if scale > 0.0 && r[(last, last)].abs() > ALIAS_TOLERANCE * scale {
            kept.push(k);
        } else if k > 0 {
            aliased.push(predictors[k - 1].clone());
        }
    }
    (kept, aliased)
}

/// Two-sided p-value of a Student t statistic.
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|d| (2.0 * d.sf(t.abs())).clamp(0.0, 1.0))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn t_distribution_p_values() {
        // With one degree of freedom, P(|T| > 1) = 1/2.
        assert!(approx(student_t_two_sided(1.0, 1.0), 0.5, 1e-9));
        assert!(approx(student_t_two_sided(0.0, 7.0), 1.0, 1e-12));
        // Two-sided 5% critical value for 10 degrees of freedom.
        assert!(approx(student_t_two_sided(2.228_139, 10.0), 0.05, 1e-5));
        assert!(approx(student_t_two_sided(-2.228_139, 10.0), 0.05, 1e-5));
    }

    #[test]
    fn simple_regression() {
        let t = Table::from_strings(
            &["x", "y"],
            &[
                vec!["1", "2"],
                vec!["2", "4"],
                vec!["3", "5"],
                vec!["4", "4"],
                vec!["5", "5"],
            ],
        )
        .unwrap();
        let fit = ols(&t, "y", &["x".to_string()]).unwrap();
        assert_eq!(fit.observations, 5);
        assert_eq!(fit.residual_df, 3);
        assert!(approx(fit.coefficients[0].estimate, 2.2, 1e-9));
        assert!(approx(fit.coefficients[1].estimate, 0.6, 1e-9));
        assert!(approx(fit.coefficients[1].std_error, (0.08f64).sqrt(), 1e-9));
        assert!(approx(fit.r_squared, 0.6, 1e-9));
        assert!(approx(fit.coefficients[1].p_value, 0.1241, 0.005));
        assert!(fit.significant(0.05).is_empty());
    }

    #[test]
    fn multiple_regression_recovers_coefficients() {
        let mut t = Table::new(&["x1", "x2", "twice_x1", "Age15_19", "y"]).unwrap();
        for i in 0..30 {
            let x1 = i as f64;
            let x2 = ((i * i) % 7) as f64;
            let noise = if i % 2 == 0 { 0.1 } else { -0.1 };
            t.push_row(vec![
                Value::Number(x1),
                Value::Number(x2),
                Value::Number(2.0 * x1),
                Value::Number(x2 * 3.0 + 1.0),
                Value::Number(1.0 + 2.0 * x1 - 3.0 * x2 + noise),
            ])
            .unwrap();
        }
        // One incomplete row is ignored.
        t.push_row(vec![
            Value::Null,
            Value::Number(1.0),
            Value::Number(1.0),
            Value::Number(1.0),
            Value::Number(1.0),
        ])
        .unwrap();

        let predictors = predictor_columns(&t, "y", &Exclusions::default());
        assert_eq!(predictors, vec!["x1", "x2", "twice_x1"]);

        let fit = ols(&t, "y", &predictors).unwrap();
        assert_eq!(fit.observations, 30);
        assert_eq!(fit.aliased, vec!["twice_x1".to_string()]);
        assert_eq!(fit.coefficients.len(), 3);
        assert!(approx(fit.coefficients[1].estimate, 2.0, 0.01));
        assert!(approx(fit.coefficients[2].estimate, -3.0, 0.05));
        assert!(fit.r_squared > 0.999);
        let sig: Vec<&str> = fit
            .significant(0.05)
            .iter()
            .map(|c| c.term.as_str())
            .collect();
        assert_eq!(sig, vec!["x1", "x2"]);
    }

    #[test]
    fn too_few_rows() {
        let t = Table::from_strings(&["x", "y"], &[vec!["1", "2"], vec!["2", "3"]]).unwrap();
        let err = ols(&t, "y", &["x".to_string()]).unwrap_err();
        assert_eq!(
            err,
            TableErrors::NotEnoughObservations {
                observations: 2,
                parameters: 2
            }
        );
    }

    #[test]
    fn exclusions() {
        let e = Exclusions::default();
        assert!(e.excludes("Age00_04"));
        assert!(e.excludes("TenureNotStated"));
        assert!(e.excludes("Year"));
        assert!(!e.excludes("MedianIncome"));
    }
}
