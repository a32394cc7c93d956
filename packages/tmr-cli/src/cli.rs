use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tmr_rs::TimeRange;

#[derive(Parser)]
#[command(
    name = "tmrlab",
    version,
    about = "Sleep and TMR study analysis tool",
    long_about = "Run the BCT/TMR study analyses: lucid-dream chi-square, sleep staging,\n\
                  REM detection, cue-locked respiration variability and breath-counting accuracy.\n\
                  Input files are read from --data-dir, results are written to --results-dir."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding recordings and behavioural tables
    #[arg(long, env = "TMR_DATA_DIR", default_value = "../data", global = true)]
    pub data_dir: PathBuf,

    /// Directory results and figures are written to (created on demand)
    #[arg(long, env = "TMR_RESULTS_DIR", default_value = "../results", global = true)]
    pub results_dir: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Chi-square test of lucid dreaming against the TMR condition
    ChiSquare(ChiSquareArgs),
    /// Stage one subject's night into 30 s epochs
    Stage(StageArgs),
    /// Detect rapid eye movements during REM sleep
    Rem(RemArgs),
    /// Respiration and RRV tables for every cue trial
    Respiration(RespirationArgs),
    /// Paired t-test of RRV after cues against before cues
    RrvTtest(RrvTtestArgs),
    /// Breath-counting accuracy before and after the night
    BctAccuracy(BctAccuracyArgs),
    /// Show recording metadata
    Info(InfoArgs),
}

#[derive(Args)]
pub struct ChiSquareArgs {
    /// Participant table (default: <data-dir>/bct_tmr_data.csv)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Skip the bar chart
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct StageArgs {
    /// Subject number, e.g. 001
    #[arg(long)]
    pub subject: String,

    /// Recording file (default: <data-dir>/sub-<subject>_ses-001_eeg.cnt)
    #[arg(long)]
    pub recording: Option<PathBuf>,

    /// Event code marked as a cue on the hypnogram
    #[arg(long, default_value_t = 22)]
    pub cue_code: i32,

    /// Skip the hypnogram figures
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RemArgs {
    /// Subject number, e.g. 001
    #[arg(long)]
    pub subject: String,

    /// Recording file (default: <data-dir>/sub-<subject>_ses-001_eeg.cnt)
    #[arg(long)]
    pub recording: Option<PathBuf>,

    /// Hypnogram CSV (default: the staging output of the subject)
    #[arg(long)]
    pub hypnogram: Option<PathBuf>,

    /// Zoomed EOG figure as "name:start:end" in seconds; repeatable
    #[arg(long = "window", value_name = "NAME:START:END")]
    pub windows: Vec<TimeRange>,

    /// Skip the EOG figures
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RespirationArgs {
    /// Process one recording instead of every subject in the data directory
    #[arg(long)]
    pub recording: Option<PathBuf>,

    /// Event code of the task start
    #[arg(long, default_value_t = 23)]
    pub task_start_code: i32,

    /// Annotation labels of the cues; the first must be present
    #[arg(long = "cue-label", default_values_t = vec!["227".to_string(), "228".to_string()])]
    pub cue_labels: Vec<String>,

    /// Respiration channel name
    #[arg(long, default_value = "RESP")]
    pub channel: String,

    /// Log failing subjects and keep going
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Draw the processed cue window of every trial
    #[arg(long, default_value_t = false)]
    pub plot: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RrvTtestArgs {
    /// RRV measure row to compare (default: the first row of each table)
    #[arg(long)]
    pub measure: Option<String>,

    /// Skip the bar chart
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BctAccuracyArgs {
    /// Aggregated task table (default: <data-dir>/task-bct_agg.csv)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Skip the bar chart
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Recording file path (EDF, CNT)
    #[arg(long)]
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON to a file instead of stdout
    #[arg(short, long, requires = "json")]
    pub output: Option<PathBuf>,
}
