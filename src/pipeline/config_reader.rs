use crate::pipeline::io_common::{provider_for_path, resolve_path};
use crate::pipeline::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "analysisName")]
    pub analysis_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    pub year: Option<u32>,
    #[serde(rename = "printTables")]
    pub print_tables: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    /// AEC download: a CSV file with a one-line title before the header.
    Aec,
    Csv,
    Xlsx,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub url: Option<String>,
    #[serde(rename = "skipRows")]
    pub skip_rows: Option<JSValue>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "divisionColumn")]
    pub division_column: Option<String>,
}

impl FileSource {
    pub fn from_path(provider: &str, path: &str) -> FileSource {
        FileSource {
            provider: provider.to_string(),
            file_path: path.to_string(),
            url: None,
            skip_rows: None,
            excel_worksheet_name: None,
            division_column: None,
        }
    }

    pub fn provider(&self) -> AnalysisResult<Provider> {
        match self.provider.as_str() {
            "aec" => Ok(Provider::Aec),
            "csv" => Ok(Provider::Csv),
            "xlsx" | "excel" => Ok(Provider::Xlsx),
            x => whatever!("Provider not understood: {}", x),
        }
    }

    /// The number of rows before the header, if given explicitly.
    pub fn skip_rows_int(&self) -> AnalysisResult<Option<usize>> {
        if self.skip_rows.is_some() {
            read_js_int(&self.skip_rows).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sources {
    #[serde(rename = "pollingPlaces")]
    pub polling_places: Option<FileSource>,
    #[serde(rename = "twoPartyPreferred")]
    pub two_party_preferred: Option<FileSource>,
    #[serde(rename = "twoCandidatePreferred")]
    pub two_candidate_preferred: Option<FileSource>,
    #[serde(rename = "firstPreferences")]
    pub first_preferences: Option<FileSource>,
    pub census: Option<FileSource>,
}

impl Sources {
    pub fn is_empty(&self) -> bool {
        self.polling_places.is_none()
            && self.two_party_preferred.is_none()
            && self.two_candidate_preferred.is_none()
            && self.first_preferences.is_none()
            && self.census.is_none()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartySettings {
    pub label: String,
    #[serde(rename = "votesColumn")]
    pub votes_column: String,
    #[serde(rename = "percentColumn")]
    pub percent_column: String,
}

impl PartySettings {
    fn to_columns(&self) -> PartyColumns {
        PartyColumns {
            label: self.label.clone(),
            votes_column: self.votes_column.clone(),
            percent_column: self.percent_column.clone(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionSettings {
    pub response: Option<String>,
    #[serde(rename = "excludeSuffixes")]
    pub exclude_suffixes: Option<Vec<String>>,
    #[serde(rename = "excludePrefixes")]
    pub exclude_prefixes: Option<Vec<String>>,
    #[serde(rename = "excludeColumns")]
    pub exclude_columns: Option<Vec<String>>,
    #[serde(rename = "significanceLevel")]
    pub significance_level: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(rename = "joinKind")]
    pub join_kind: Option<String>,
    #[serde(rename = "divisionColumn")]
    pub division_column: Option<String>,
    #[serde(rename = "firstParty")]
    pub first_party: Option<PartySettings>,
    #[serde(rename = "secondParty")]
    pub second_party: Option<PartySettings>,
    #[serde(rename = "totalColumn")]
    pub total_column: Option<String>,
    #[serde(rename = "partyGroups")]
    pub party_groups: Option<HashMap<String, String>>,
    #[serde(rename = "informalLabel")]
    pub informal_label: Option<String>,
    pub tolerance: Option<f64>,
    pub regression: Option<RegressionSettings>,
}

impl AnalysisSettings {
    pub fn join_options(&self) -> AnalysisResult<JoinOptions> {
        match self.join_kind.as_deref() {
            None | Some("left") => Ok(JoinOptions::left()),
            Some("inner") => Ok(JoinOptions::inner()),
            Some(x) => whatever!("unknown join kind: {}", x),
        }
    }

    pub fn two_party_spec(&self) -> TwoPartySpec {
        let mut spec = TwoPartySpec::aec();
        if let Some(p) = self.first_party.as_ref() {
            spec.first = p.to_columns();
        }
        if let Some(p) = self.second_party.as_ref() {
            spec.second = p.to_columns();
        }
        if let Some(t) = self.total_column.as_ref() {
            spec.total_column = t.clone();
        }
        spec
    }

    /// Maps party abbreviations to the group they are counted with. The
    /// members of the Coalition are counted together by default.
    pub fn party_groups(&self) -> HashMap<String, String> {
        match self.party_groups.as_ref() {
            Some(m) => m.clone(),
            None => ["LP", "LNP", "NP", "CLP", "LNQ", "NAT"]
                .iter()
                .map(|p| (p.to_string(), "LNP".to_string()))
                .collect(),
        }
    }

    pub fn informal_label(&self) -> &str {
        self.informal_label.as_deref().unwrap_or("Informal")
    }

    /// Allowed distance to 100 for the sum of the two-party percentages.
    pub fn tolerance(&self) -> f64 {
        self.tolerance.unwrap_or(0.1)
    }

    /// The modelled column. Defaults to the percentage of the first party.
    pub fn response(&self) -> String {
        self.regression
            .as_ref()
            .and_then(|r| r.response.clone())
            .unwrap_or_else(|| self.two_party_spec().first.percent_column)
    }

    pub fn exclusions(&self) -> Exclusions {
        let mut ex = Exclusions::default();
        if let Some(r) = self.regression.as_ref() {
            if let Some(s) = r.exclude_suffixes.as_ref() {
                ex.suffixes = s.clone();
            }
            if let Some(p) = r.exclude_prefixes.as_ref() {
                ex.prefixes = p.clone();
            }
            if let Some(c) = r.exclude_columns.as_ref() {
                ex.columns = c.clone();
            }
        }
        ex
    }

    pub fn significance_level(&self) -> f64 {
        self.regression
            .as_ref()
            .and_then(|r| r.significance_level)
            .unwrap_or(0.05)
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub sources: Sources,
    pub analysis: Option<AnalysisSettings>,
}

impl AnalysisConfig {
    /// Applies the command line values. Paths given on the command line are
    /// relative to the working directory.
    pub fn with_overrides(self, overrides: &Overrides) -> AnalysisConfig {
        let mut res = self;
        if res.output_settings.analysis_name.is_empty() {
            res.output_settings.analysis_name = "auselect".to_string();
        }
        if let Some(input) = overrides.input.as_deref() {
            let p = resolve_path(input);
            let mut fs = res
                .sources
                .two_party_preferred
                .take()
                .unwrap_or_else(|| FileSource::from_path("aec", &p));
            fs.file_path = p;
            fs.url = None;
            res.sources.two_party_preferred = Some(fs);
        }
        if let Some(census) = overrides.census.as_deref() {
            let p = resolve_path(census);
            let mut fs = res
                .sources
                .census
                .take()
                .unwrap_or_else(|| FileSource::from_path(provider_for_path(&p), &p));
            fs.file_path = p;
            fs.url = None;
            res.sources.census = Some(fs);
        }
        if let Some(y) = overrides.year {
            res.output_settings.year = Some(y);
        }
        if let Some(d) = overrides.output_directory.as_deref() {
            res.output_settings.output_directory = Some(resolve_path(d));
        }
        res
    }
}

pub fn read_summary(path: String) -> AnalysisResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn read_js_int(x: &Option<JSValue>) -> AnalysisResult<usize> {
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu {}),
        Some(JSValue::String(s)) => s.parse::<usize>().ok().context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}
