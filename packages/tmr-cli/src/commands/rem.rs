use super::{fail, print_json};
use crate::cli::RemArgs;
use crate::exit_codes;
use tmr_rs::analyses::rem::{self, RemAnalysisOptions};
use tmr_rs::AnalysisPaths;

pub fn execute(args: RemArgs, paths: &AnalysisPaths) -> i32 {
    let mut options = RemAnalysisOptions {
        recording: args.recording,
        hypnogram: args.hypnogram,
        plot: !args.no_plot,
        ..Default::default()
    };
    if !args.windows.is_empty() {
        options.windows = args.windows;
    }

    let summary = match rem::run(paths, &args.subject, &options) {
        Ok(summary) => summary,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&summary, args.output.as_deref());
    }
    match &summary.events_file {
        Some(file) => {
            println!("Subject {}: {} REM events", summary.subject, summary.events);
            println!("Events: {}", file.display());
            for figure in &summary.figures {
                println!("Figure: {}", figure.display());
            }
        }
        None => println!("Subject {}: no REM found", summary.subject),
    }
    exit_codes::SUCCESS
}
