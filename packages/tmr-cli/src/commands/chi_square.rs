use super::{fail, print_json};
use crate::cli::ChiSquareArgs;
use crate::exit_codes;
use tmr_rs::analyses::chi_square::{self, ChiSquareOptions};
use tmr_rs::AnalysisPaths;

pub fn execute(args: ChiSquareArgs, paths: &AnalysisPaths) -> i32 {
    let options = ChiSquareOptions {
        input: args.input,
        plot: !args.no_plot,
        ..Default::default()
    };

    let summary = match chi_square::run(paths, &options) {
        Ok(summary) => summary,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&summary, args.output.as_deref());
    }
    println!(
        "Chi-square: {:.4} (dof {}, n = {})",
        summary.statistic, summary.dof, summary.sample_size
    );
    println!("p-value: {:.4}", summary.p_value);
    println!("Results: {}", summary.results_file.display());
    exit_codes::SUCCESS
}
