// ********* Cell values ***********

use std::error::Error;
use std::fmt::Display;

/// The content of one cell of a table.
///
/// Every source file is read into this representation. Empty cells are `Null`,
/// cells that parse as a number are `Number`, everything else is `Text`.
#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Parses the raw content of a cell.
    pub fn parse(raw: &str) -> Value {
        let s = raw.trim();
        if s.is_empty() {
            return Value::Null;
        }
        match s.parse::<f64>() {
            Ok(x) if x.is_finite() => Value::Number(x),
            _ => Value::Text(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The text used to compare keys across tables.
    ///
    /// Text is trimmed and upper-cased, integral numbers lose their fraction.
    /// Null has no key.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                Some(format!("{}", *x as i64))
            }
            Value::Number(x) => Some(x.to_string()),
            Value::Text(s) => Some(s.trim().to_uppercase()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            Value::Number(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(x: Option<T>) -> Self {
        match x {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// ******** Errors *********

/// Errors that prevent a table operation from completing.
#[derive(PartialEq, Debug, Clone)]
pub enum TableErrors {
    MissingColumn(String),
    DuplicateColumn(String),
    RowArity { expected: usize, found: usize },
    /// The secondary table of a join has the same key on several rows.
    DuplicateKey(String),
    NotNumeric { column: String, row: usize },
    RowOutOfRange { row: usize, rows: usize },
    NotEnoughObservations { observations: usize, parameters: usize },
    /// The least squares system has no unique solution.
    SingularDesign,
}

impl Error for TableErrors {}

impl Display for TableErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableErrors::MissingColumn(c) => write!(f, "missing column {:?}", c),
            TableErrors::DuplicateColumn(c) => write!(f, "duplicate column {:?}", c),
            TableErrors::RowArity { expected, found } => {
                write!(f, "row has {} values, expected {}", found, expected)
            }
            TableErrors::DuplicateKey(k) => {
                write!(f, "key {:?} appears more than once in the secondary table", k)
            }
            TableErrors::NotNumeric { column, row } => {
                write!(f, "column {:?} is not numeric at row {}", column, row)
            }
            TableErrors::RowOutOfRange { row, rows } => {
                write!(f, "row {} is out of range for a table of {} rows", row, rows)
            }
            TableErrors::NotEnoughObservations {
                observations,
                parameters,
            } => write!(
                f,
                "{} complete observations are not enough to fit {} parameters",
                observations, parameters
            ),
            TableErrors::SingularDesign => write!(f, "the design matrix is singular"),
        }
    }
}

pub type TableResult<T> = Result<T, TableErrors>;

// ********* Options **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum JoinKind {
    /// Keeps every primary row. Unmatched rows get null secondary columns.
    Left,
    /// Keeps only the primary rows with a match.
    Inner,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct JoinOptions {
    pub kind: JoinKind,
    /// Appended to secondary columns whose name is already taken.
    pub suffix: String,
}

impl JoinOptions {
    pub fn left() -> JoinOptions {
        JoinOptions {
            kind: JoinKind::Left,
            suffix: ".y".to_string(),
        }
    }

    pub fn inner() -> JoinOptions {
        JoinOptions {
            kind: JoinKind::Inner,
            suffix: ".y".to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Aggregation {
    Sum { column: String, into: String },
    Mean { column: String, into: String },
    Max { column: String, into: String },
    Min { column: String, into: String },
    /// The first non-null value of the group.
    First { column: String, into: String },
    Count { into: String },
}

impl Aggregation {
    pub fn sum(column: &str) -> Aggregation {
        Aggregation::Sum {
            column: column.to_string(),
            into: column.to_string(),
        }
    }

    pub fn first(column: &str) -> Aggregation {
        Aggregation::First {
            column: column.to_string(),
            into: column.to_string(),
        }
    }

    pub fn count(into: &str) -> Aggregation {
        Aggregation::Count {
            into: into.to_string(),
        }
    }

    pub fn output_name(&self) -> &str {
        match self {
            Aggregation::Sum { into, .. }
            | Aggregation::Mean { into, .. }
            | Aggregation::Max { into, .. }
            | Aggregation::Min { into, .. }
            | Aggregation::First { into, .. }
            | Aggregation::Count { into } => into.as_str(),
        }
    }
}

/// One side of a two-party-preferred table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PartyColumns {
    /// Short label used in derived column names and as the winner name.
    pub label: String,
    pub votes_column: String,
    pub percent_column: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TwoPartySpec {
    pub first: PartyColumns,
    pub second: PartyColumns,
    pub total_column: String,
}

impl TwoPartySpec {
    /// The column names used in the AEC two-party-preferred downloads.
    pub fn aec() -> TwoPartySpec {
        TwoPartySpec {
            first: PartyColumns {
                label: "LNP".to_string(),
                votes_column: "Liberal/National Coalition Votes".to_string(),
                percent_column: "Liberal/National Coalition Percentage".to_string(),
            },
            second: PartyColumns {
                label: "ALP".to_string(),
                votes_column: "Australian Labor Party Votes".to_string(),
                percent_column: "Australian Labor Party Percentage".to_string(),
            },
            total_column: "TotalVotes".to_string(),
        }
    }
}

// ******** Derived column names *********

pub const WINNER: &str = "Winner";
pub const TIED: &str = "Tied";
pub const MARGIN_PERCENT: &str = "MarginPercent";
pub const MARGIN_VOTES: &str = "MarginVotes";
pub const PERCENT: &str = "Percent";
pub const TOP_TWO_PERCENT: &str = "TopTwoPercent";

/// The margin of a winner, in percentage points and approximate votes.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Margin {
    pub percent: f64,
    pub votes: f64,
}

/// The outcome of looking for the strictly highest count.
#[derive(PartialEq, Debug, Clone)]
pub enum Leader {
    Unique(String, f64),
    /// Several names share the highest count. No rule resolves this.
    Tied(Vec<String>, f64),
    Empty,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CheckViolation {
    pub check: String,
    pub key: String,
    pub detail: String,
}
