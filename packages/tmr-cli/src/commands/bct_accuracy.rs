use super::{fail, print_json};
use crate::cli::BctAccuracyArgs;
use crate::exit_codes;
use tmr_rs::analyses::bct_accuracy::{self, BctAccuracyOptions};
use tmr_rs::AnalysisPaths;

pub fn execute(args: BctAccuracyArgs, paths: &AnalysisPaths) -> i32 {
    let options = BctAccuracyOptions {
        input: args.input,
        plot: !args.no_plot,
        ..Default::default()
    };

    let summary = match bct_accuracy::run(paths, &options) {
        Ok(summary) => summary,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&summary, args.output.as_deref());
    }
    println!("Participants: {}", summary.participants);
    println!(
        "T-test:   T = {:.4}, p-value = {:.4}",
        summary.ttest.t, summary.ttest.p_value
    );
    println!(
        "Wilcoxon: W = {:.1}, p-value = {:.4}",
        summary.wilcoxon.w, summary.wilcoxon.p_value
    );
    println!("Results: {}", paths.bct_ttest_results().display());
    exit_codes::SUCCESS
}
