use log::{debug, info, warn};

use election_tables::checks;
use election_tables::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::pipeline::config_reader::*;
use crate::pipeline::report::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_download;
mod io_excel;
mod report;

const DIVISION: &str = "DivisionNm";
const POLLING_PLACE: &str = "PollingPlaceID";
const YEAR: &str = "Year";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AnalysisError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error parsing JSON number"))]
    ParsingJsonNumber {},
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet {sheet}"))]
    MissingWorksheet { path: String, sheet: String },
    #[snafu(display("No header row found in {path}"))]
    EmptyFile { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Line {lineno} of {path} has more values than the header"))]
    CsvLineTooLong { path: String, lineno: usize },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error downloading {url}"))]
    Download { source: reqwest::Error, url: String },
    #[snafu(display("Table operation failed while {step}: {source}"))]
    Table { source: TableErrors, step: String },
    #[snafu(display("Missing parent directory"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Command line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<String>,
    pub census: Option<String>,
    pub year: Option<u32>,
    pub output_directory: Option<String>,
}

/// The tables read from the sources, after renaming and tagging with the year.
#[derive(Debug, Clone, Default)]
struct LoadedSources {
    polling_places: Option<Table>,
    two_party: Option<Table>,
    two_candidate: Option<Table>,
    first_preferences: Option<Table>,
    census: Option<Table>,
}

/// The outcome of the analysis: the JSON summary and the derived tables.
struct Analysis {
    summary: JSMap<String, JSValue>,
    tables: Vec<(String, Table)>,
}

impl Analysis {
    fn add_table(&mut self, name: &str, table: Table) {
        self.tables.push((name.to_string(), table));
    }
}

fn load_source(
    root: &Path,
    name: &str,
    cfs: &FileSource,
    year: Option<u32>,
    division_column: Option<&str>,
) -> AnalysisResult<Table> {
    let p: PathBuf = root.join(&cfs.file_path);
    if let Some(url) = cfs.url.as_deref() {
        io_download::fetch_if_missing(url, &p)?;
    }
    let path = p.as_path().display().to_string();
    info!("Attempting to read {} file {:?}", name, path);
    let table = match cfs.provider()? {
        Provider::Aec | Provider::Csv => io_csv::read_csv_table(&path, cfs)?,
        Provider::Xlsx => io_excel::read_excel_table(&path, cfs)?,
    };
    info!(
        "Read {} rows and {} columns from {}",
        table.num_rows(),
        table.columns().len(),
        io_common::simplify_file_name(&path)
    );

    let table = match cfs.division_column.as_deref().or(division_column) {
        Some(c) if c != DIVISION && !table.has_column(c) => {
            debug!("load_source: no column {} in {}", c, name);
            table
        }
        Some(c) if c != DIVISION => table
            .rename_column(c, DIVISION)
            .context(TableSnafu {
                step: format!("renaming the division column of {}", name),
            })?,
        _ => table,
    };
    match year {
        Some(y) => table
            .with_default_column(YEAR, Value::Number(y as f64))
            .context(TableSnafu { step: "adding the year" }),
        None => Ok(table),
    }
}

fn load_sources(
    root: &Path,
    sources: &Sources,
    year: Option<u32>,
    division_column: Option<&str>,
) -> AnalysisResult<LoadedSources> {
    let load = |name: &str, cfs: &Option<FileSource>| -> AnalysisResult<Option<Table>> {
        cfs.as_ref()
            .map(|cfs| load_source(root, name, cfs, year, division_column))
            .transpose()
    };
    Ok(LoadedSources {
        polling_places: load("polling places", &sources.polling_places)?,
        two_party: load("two-party-preferred", &sources.two_party_preferred)?,
        two_candidate: load("two-candidate-preferred", &sources.two_candidate_preferred)?,
        first_preferences: load("first preferences", &sources.first_preferences)?,
        census: load("census", &sources.census)?,
    })
}

/// The join keys shared by two tables: the division, and the year when both
/// tables carry it.
fn division_keys(a: &Table, b: &Table) -> Vec<&'static str> {
    if a.has_column(YEAR) && b.has_column(YEAR) {
        vec![DIVISION, YEAR]
    } else {
        vec![DIVISION]
    }
}

/// Counts the divisions won by each winner. Tied divisions are not counted.
fn count_seats(
    outcomes: &Table,
    party_groups: &std::collections::HashMap<String, String>,
) -> AnalysisResult<(Vec<(String, f64)>, usize)> {
    let grouped = map_values(outcomes, WINNER, party_groups, "WinnerGroup")
        .context(TableSnafu { step: "grouping the winners" })?;
    let seats = group_by(&grouped, &["WinnerGroup"], &[Aggregation::count("Seats")])
        .context(TableSnafu { step: "counting seats" })?;
    let mut counts = named_values(&seats, "WinnerGroup", "Seats")
        .context(TableSnafu { step: "counting seats" })?;
    counts.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let tied = outcomes
        .filter(|r| r.text(TIED) == Some("Y"))
        .num_rows();
    Ok((counts, tied))
}

fn closest_divisions(outcomes: &Table, n: usize) -> AnalysisResult<Table> {
    let decided = outcomes.filter(|r| r.get(WINNER).map(|v| !v.is_null()).unwrap_or(false));
    let mut cols = vec![DIVISION, WINNER, MARGIN_PERCENT, MARGIN_VOTES];
    if decided.has_column("StateAb") {
        cols.insert(1, "StateAb");
    }
    Ok(decided
        .sort_by_number(MARGIN_PERCENT, false)
        .and_then(|t| t.select(&cols))
        .context(TableSnafu { step: "sorting the closest divisions" })?
        .head(n))
}

fn leader_to_json(counts: &[(String, f64)]) -> JSValue {
    match leader(counts) {
        Leader::Unique(name, _) => json!(name),
        Leader::Tied(names, _) => json!({ "tied": names }),
        Leader::Empty => JSValue::Null,
    }
}

fn seats_summary(counts: &[(String, f64)], tied: usize, closest: &Table) -> JSValue {
    let mut seats: JSMap<String, JSValue> = JSMap::new();
    for (name, count) in counts.iter() {
        seats.insert(name.clone(), json!(*count as u64));
    }
    json!({
        "seats": seats,
        "tied": tied,
        "mostSeats": leader_to_json(counts),
        "closest": table_to_json(closest),
    })
}

fn analyse_two_party(
    tpp: &Table,
    settings: &AnalysisSettings,
    polling_places: Option<&Table>,
    res: &mut Analysis,
    violations: &mut Vec<CheckViolation>,
) -> AnalysisResult<Table> {
    let spec = settings.two_party_spec();
    let booth_level = tpp.has_column(POLLING_PLACE);
    let tolerance = settings.tolerance();

    if tpp.has_column(&spec.first.percent_column) && tpp.has_column(&spec.second.percent_column) {
        let key = if booth_level { POLLING_PLACE } else { DIVISION };
        violations.extend(
            checks::two_party_sums(
                &tpp.filter(|r| r.number(&spec.total_column).unwrap_or(0.0) > 0.0),
                key,
                &spec.first.percent_column,
                &spec.second.percent_column,
                tolerance,
            )
            .context(TableSnafu { step: "checking the two-party percentages" })?,
        );
    }

    let mut keys = vec![DIVISION];
    if tpp.has_column(YEAR) {
        keys.push(YEAR);
    }
    let divisions = if booth_level {
        two_party_by_division(tpp, &spec, &keys)
    } else {
        let non_empty = tpp.filter(|r| r.number(&spec.total_column).unwrap_or(0.0) > 0.0);
        two_party_outcome(&non_empty, &spec)
    }
    .context(TableSnafu { step: "deriving the two-party winners" })?;

    violations.extend(
        checks::two_party_sums(
            &divisions,
            DIVISION,
            &spec.first.percent_column,
            &spec.second.percent_column,
            tolerance,
        )
        .context(TableSnafu { step: "checking the division percentages" })?,
    );

    if booth_level {
        let booths = two_party_outcome(
            &tpp.filter(|r| r.number(&spec.total_column).unwrap_or(0.0) > 0.0),
            &spec,
        )
        .context(TableSnafu { step: "deriving the booth winners" })?;
        let points = match polling_places {
            Some(pp) => {
                violations.extend(
                    checks::divisions_known(pp, &divisions, DIVISION)
                        .context(TableSnafu { step: "checking the polling place divisions" })?,
                );
                let mut keys = vec![DIVISION, POLLING_PLACE];
                if booths.has_column(YEAR) && pp.has_column(YEAR) {
                    keys.push(YEAR);
                }
                join(&booths, pp, &keys, &JoinOptions::left())
                    .context(TableSnafu { step: "locating the polling places" })?
            }
            None => booths,
        };
        res.summary.insert(
            "boothPoints".to_string(),
            json!({
                "booths": points.num_rows(),
                "located": points.filter(|r| r.number("Latitude").is_some()).num_rows(),
            }),
        );
        res.add_table("booth_points", points);
    }

    let (counts, tied) = count_seats(&divisions, &settings.party_groups())?;
    let closest = closest_divisions(&divisions, 10)?;
    let mut js = seats_summary(&counts, tied, &closest);
    js["divisions"] = json!(divisions.num_rows());
    res.summary.insert("twoParty".to_string(), js);
    res.add_table("division_tpp", divisions.clone());
    Ok(divisions)
}

fn analyse_two_candidate(
    tcp: &Table,
    settings: &AnalysisSettings,
    res: &mut Analysis,
    violations: &mut Vec<CheckViolation>,
) -> AnalysisResult<()> {
    let votes_column = if tcp.has_column("TotalVotes") {
        "TotalVotes"
    } else {
        "OrdinaryVotes"
    };
    let tcp = tcp
        .fill_null("PartyAb", Value::from("IND"))
        .context(TableSnafu { step: "reading the two-candidate parties" })?;

    let mut keys = vec![DIVISION];
    if tcp.has_column(YEAR) {
        keys.push(YEAR);
    }
    let divisions = candidate_outcome(&tcp, &keys, Some("CandidateID"), "PartyAb", votes_column)
        .context(TableSnafu { step: "deriving the two-candidate winners" })?;

    if tcp.has_column("Elected") {
        let candidate = if tcp.has_column("CandidateID") {
            "CandidateID"
        } else {
            "PartyAb"
        };
        let mut cand_keys = keys.clone();
        cand_keys.push(candidate);
        let by_candidate = group_by(
            &tcp,
            &cand_keys,
            &[Aggregation::sum(votes_column), Aggregation::first("Elected")],
        )
        .and_then(|t| proportions(&t, &keys, votes_column, PERCENT))
        .context(TableSnafu { step: "computing the candidate shares" })?;
        violations.extend(
            checks::winner_is_max(&by_candidate, &keys, PERCENT, "Elected")
                .context(TableSnafu { step: "checking the elected candidates" })?,
        );
    }

    let (counts, tied) = count_seats(&divisions, &settings.party_groups())?;
    let closest = closest_divisions(&divisions, 10)?;
    let mut js = seats_summary(&counts, tied, &closest);
    js["divisions"] = json!(divisions.num_rows());
    res.summary.insert("twoCandidate".to_string(), js);
    res.add_table("division_tcp", divisions);
    Ok(())
}

fn analyse_first_preferences(
    fp: &Table,
    settings: &AnalysisSettings,
    res: &mut Analysis,
) -> AnalysisResult<()> {
    let informal = settings.informal_label().to_uppercase();
    let votes_column = if fp.has_column("TotalVotes") {
        "TotalVotes"
    } else {
        "OrdinaryVotes"
    };
    let formal = fp.filter(|r| {
        r.get("Surname")
            .and_then(|v| v.key_text())
            .map(|s| s != informal)
            .unwrap_or(true)
    });
    debug!(
        "analyse_first_preferences: {} informal rows removed",
        fp.num_rows() - formal.num_rows()
    );
    let grouped = formal
        .fill_null("PartyAb", Value::from("IND"))
        .and_then(|t| map_values(&t, "PartyAb", &settings.party_groups(), "PartyGroup"))
        .context(TableSnafu { step: "grouping the parties" })?;

    let national = group_by(&grouped, &["PartyGroup"], &[Aggregation::sum(votes_column)])
        .and_then(|t| proportions(&t, &[], votes_column, PERCENT))
        .and_then(|t| t.sort_by_number(votes_column, true))
        .context(TableSnafu { step: "summing the votes per party" })?;

    let mut parties: Vec<JSValue> = Vec::new();
    for r in national.rows().iter() {
        parties.push(json!({
            "party": r[0].to_string(),
            "votes": r[1].as_f64().map(|x| x as u64),
            "percent": r[2].as_f64().map(round4),
        }));
    }
    res.add_table("party_votes", national);

    if grouped.has_column("StateAb") {
        let by_state = group_by(
            &grouped,
            &["StateAb", "PartyGroup"],
            &[Aggregation::sum(votes_column)],
        )
        .and_then(|t| proportions(&t, &["StateAb"], votes_column, PERCENT))
        .context(TableSnafu { step: "summing the votes per state" })?;
        res.add_table("party_votes_by_state", by_state);
    }

    let mut js = json!({ "parties": parties });
    if grouped.has_column("Elected") {
        let seats = count_where(&grouped, &["PartyGroup"], "Elected", "Y", "Seats")
            .and_then(|t| t.sort_by_number("Seats", true))
            .context(TableSnafu { step: "counting the seats won" })?;
        let counts = named_values(&seats, "PartyGroup", "Seats")
            .context(TableSnafu { step: "counting the seats won" })?;
        let mut seats_js: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in counts.iter() {
            seats_js.insert(name.clone(), json!(*count as u64));
        }
        js["seatsWon"] = JSValue::Object(seats_js);
        js["mostSeats"] = leader_to_json(&counts);
        res.add_table("seats", seats);
    }
    res.summary.insert("firstPreferences".to_string(), js);
    Ok(())
}

fn analyse_census(
    divisions: &Table,
    census: &Table,
    settings: &AnalysisSettings,
    res: &mut Analysis,
    violations: &mut Vec<CheckViolation>,
) -> AnalysisResult<()> {
    let keys = division_keys(divisions, census);
    let options = settings.join_options()?;
    let joined = join(divisions, census, &keys, &options)
        .context(TableSnafu { step: "joining the census" })?;
    if options.kind == JoinKind::Left && joined.num_rows() != divisions.num_rows() {
        whatever!(
            "left join changed the number of divisions: {} -> {}",
            divisions.num_rows(),
            joined.num_rows()
        )
    }
    for k in anti_join_keys(divisions, census, DIVISION)
        .context(TableSnafu { step: "matching the census divisions" })?
    {
        warn!("analyse_census: no census data for division {}", k);
        violations.push(CheckViolation {
            check: "census_known".to_string(),
            key: k,
            detail: "division is missing from the census table".to_string(),
        });
    }

    let response = settings.response();
    let mut exclusions = settings.exclusions();
    exclusions.columns.extend(keys.iter().map(|k| k.to_string()));
    let predictors: Vec<String> = predictor_columns(census, &response, &exclusions)
        .into_iter()
        .filter(|p| joined.has_column(p) && !divisions.has_column(p))
        .collect();
    info!(
        "analyse_census: regressing {} on {} census columns",
        response,
        predictors.len()
    );
    let fit = ols(&joined, &response, &predictors)
        .context(TableSnafu { step: "fitting the census model" })?;

    let alpha = settings.significance_level();
    res.summary
        .insert("regression".to_string(), fit_to_json(&fit, alpha));
    res.add_table("census_joined", joined);
    res.add_table(
        "regression",
        fit.to_table()
            .context(TableSnafu { step: "tabulating the coefficients" })?,
    );
    Ok(())
}

fn analyse(config: &AnalysisConfig, sources: &LoadedSources) -> AnalysisResult<Analysis> {
    let settings = config.analysis.clone().unwrap_or_default();
    let mut res = Analysis {
        summary: JSMap::new(),
        tables: Vec::new(),
    };
    let mut violations: Vec<CheckViolation> = Vec::new();

    res.summary.insert(
        "config".to_string(),
        json!({
            "analysis": config.output_settings.analysis_name,
            "year": config.output_settings.year,
        }),
    );

    if let Some(fp) = sources.first_preferences.as_ref() {
        analyse_first_preferences(fp, &settings, &mut res)?;
    }

    let tpp_divisions = match sources.two_party.as_ref() {
        Some(tpp) => Some(analyse_two_party(
            tpp,
            &settings,
            sources.polling_places.as_ref(),
            &mut res,
            &mut violations,
        )?),
        None => None,
    };

    if let Some(tcp) = sources.two_candidate.as_ref() {
        analyse_two_candidate(tcp, &settings, &mut res, &mut violations)?;
    }

    match (tpp_divisions.as_ref(), sources.census.as_ref()) {
        (Some(divisions), Some(census)) => {
            analyse_census(divisions, census, &settings, &mut res, &mut violations)?
        }
        (None, Some(_)) => {
            warn!("analyse: census data given without two-party-preferred results, no model")
        }
        _ => {}
    }

    res.summary
        .insert("checks".to_string(), violations_to_json(&violations));
    Ok(res)
}

fn read_config(config_path: &str) -> AnalysisResult<(AnalysisConfig, PathBuf)> {
    let config_p = Path::new(config_path);
    let config_str = fs::read_to_string(config_path).context(OpeningFileSnafu {
        path: config_path.to_string(),
    })?;
    let config: AnalysisConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    let root = config_p.parent().context(MissingParentDirSnafu {})?;
    Ok((config, root.to_path_buf()))
}

fn write_outputs(root: &Path, config: &AnalysisConfig, analysis: &Analysis) -> AnalysisResult<()> {
    if let Some(dir) = config.output_settings.output_directory.as_deref() {
        write_tables(&root.join(dir), &analysis.tables)?;
    }
    if config.output_settings.print_tables.unwrap_or(false) {
        for (name, table) in analysis.tables.iter() {
            println!("## {}\n\n{}\n", name, to_markdown(table, 20));
        }
    }
    Ok(())
}

/// Runs the full analysis described by a configuration file (or by the command
/// line alone) and returns the summary.
pub fn run_analysis(
    config_path: Option<String>,
    check_summary_path: Option<String>,
    out: Option<String>,
    overrides: &Overrides,
) -> AnalysisResult<JSValue> {
    let (config, root) = match config_path.as_deref() {
        Some(p) => read_config(p)?,
        None => (AnalysisConfig::default(), PathBuf::from(".")),
    };
    let config = config.with_overrides(overrides);
    info!("config: {:?}", config);

    if config.sources.is_empty() {
        whatever!("No source given: use --input, --census or a configuration file")
    }

    let division_column = config
        .analysis
        .as_ref()
        .and_then(|a| a.division_column.clone());
    let sources = load_sources(
        &root,
        &config.sources,
        config.output_settings.year,
        division_column.as_deref(),
    )?;
    let analysis = analyse(&config, &sources)?;
    write_outputs(&root, &config, &analysis)?;

    let result_js = JSValue::Object(analysis.summary);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    match out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(p) => {
            fs::write(p, &pretty_js_stats).context(WritingFileSnafu { path: p.to_string() })?;
            info!("Summary written to {}", p);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(result_js)
}
