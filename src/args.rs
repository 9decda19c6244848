use clap::Parser;

/// Joins Australian federal election results with census data and summarizes them.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the sources and the analysis.
    /// See the manual of election_tables for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, auselect will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format
    /// to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) An AEC two-party-preferred download (by polling place or by division).
    /// Overrides the source given in the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path) A census table by division, in CSV or Excel format.
    /// Overrides the source given in the configuration.
    #[clap(long, value_parser)]
    pub census: Option<String>,

    /// The election year of the input files.
    #[clap(long, value_parser)]
    pub year: Option<u32>,

    /// (directory) Where to write the derived tables in CSV format.
    #[clap(long, value_parser)]
    pub output_directory: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
