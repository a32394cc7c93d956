use super::{fail, print_json};
use crate::cli::StageArgs;
use crate::exit_codes;
use tmr_rs::analyses::staging::{self, StagingOptions};
use tmr_rs::AnalysisPaths;

pub fn execute(args: StageArgs, paths: &AnalysisPaths) -> i32 {
    let options = StagingOptions {
        recording: args.recording,
        cue_code: args.cue_code,
        plot: !args.no_plot,
        ..Default::default()
    };

    let summary = match staging::run(paths, &args.subject, &options) {
        Ok(summary) => summary,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&summary, args.output.as_deref());
    }
    println!("Subject {}: {} epochs", summary.subject, summary.epochs);
    for (stage, count) in &summary.stage_counts {
        println!("  {:<3} {}", stage, count);
    }
    println!("Hypnogram: {}", summary.hypnogram_file.display());
    exit_codes::SUCCESS
}
