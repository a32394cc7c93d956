use super::{fail, print_json};
use crate::cli::RrvTtestArgs;
use crate::exit_codes;
use tmr_rs::analyses::rrv_ttest::{self, RrvTTestOptions};
use tmr_rs::AnalysisPaths;

pub fn execute(args: RrvTtestArgs, paths: &AnalysisPaths) -> i32 {
    let options = RrvTTestOptions {
        measure: args.measure,
        plot: !args.no_plot,
        ..Default::default()
    };

    let summary = match rrv_ttest::run(paths, &options) {
        Ok(summary) => summary,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&summary, args.output.as_deref());
    }
    println!(
        "{}: {} tables from {} subjects",
        summary.measure,
        summary.tables,
        summary.subjects.len()
    );
    println!(
        "T = {:.4}, dof = {}, p-value = {:.4}",
        summary.ttest.t, summary.ttest.dof, summary.ttest.p_value
    );
    println!("Results: {}", paths.rrv_ttest_results().display());
    exit_codes::SUCCESS
}
