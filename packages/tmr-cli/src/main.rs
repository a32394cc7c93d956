use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;
use tmr_rs::AnalysisPaths;

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let paths = AnalysisPaths::new(&cli.data_dir, &cli.results_dir);
    log::debug!(
        "data dir {}, results dir {}",
        paths.data_dir.display(),
        paths.results_dir.display()
    );

    let exit_code = match cli.command {
        cli::Command::ChiSquare(args) => commands::chi_square::execute(args, &paths),
        cli::Command::Stage(args) => commands::stage::execute(args, &paths),
        cli::Command::Rem(args) => commands::rem::execute(args, &paths),
        cli::Command::Respiration(args) => commands::respiration::execute(args, &paths),
        cli::Command::RrvTtest(args) => commands::rrv_ttest::execute(args, &paths),
        cli::Command::BctAccuracy(args) => commands::bct_accuracy::execute(args, &paths),
        cli::Command::Info(args) => commands::info::execute(args),
    };

    std::process::exit(exit_code);
}
