use clap::Parser;

/// This program tabulates an ABIF election under several voting methods at
/// once and emits a combined JSON summary.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path or empty) The ABIF file containing the election data.
    /// Reads standard input when not specified.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the election
    /// will be written in JSON format to the given location. Defaults to the
    /// standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the summary of an election in
    /// JSON format. If provided, abifcond will check that the tabulated output
    /// matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (repeatable) Restrict tabulation to the given method(s): fptp, irv,
    /// pairwise, star, approval. All five run when not specified.
    #[clap(long, value_parser)]
    pub methods: Vec<String>,

    /// If passed as an argument, a plain-text report is written instead of the
    /// JSON summary.
    #[clap(long, takes_value = false)]
    pub text: bool,

    /// If passed as an argument, requests per-round transfer diagnostics from
    /// the IRV engine.
    #[clap(long, takes_value = false)]
    pub irv_extra: bool,

    /// If passed as an argument, stray whitespace around tokens and rank
    /// separators is cleaned up before parsing.
    #[clap(long, takes_value = false)]
    pub cleanws: bool,

    /// If passed as an argument, will turn on verbose logging to the standard
    /// output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
