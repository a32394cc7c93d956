use super::{fail, print_json};
use crate::cli::RespirationArgs;
use crate::exit_codes;
use tmr_rs::analyses::respiration::{self, RespirationOptions};
use tmr_rs::AnalysisPaths;

pub fn execute(args: RespirationArgs, paths: &AnalysisPaths) -> i32 {
    if args.cue_labels.is_empty() {
        eprintln!("Error: at least one --cue-label is required");
        return exit_codes::INPUT_ERROR;
    }

    let mut options = RespirationOptions {
        recording: args.recording,
        channel: args.channel,
        continue_on_error: args.continue_on_error,
        plot: args.plot,
        ..Default::default()
    };
    options.windows.task_start_code = args.task_start_code;
    options.windows.cue_labels = args.cue_labels;

    let summary = match respiration::run(paths, &options) {
        Ok(summary) => summary,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&summary, args.output.as_deref());
    }
    for subject in &summary.subjects {
        println!("{}: {} trials", subject.subject, subject.trials);
    }
    if !summary.failed.is_empty() {
        println!("Failed: {}", summary.failed.join(", "));
    }
    println!("Tables written to {}", paths.results_dir.display());
    exit_codes::SUCCESS
}
