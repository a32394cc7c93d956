use super::{fail, print_json};
use crate::cli::InfoArgs;
use crate::exit_codes;
use tmr_rs::recording::RecordingReaderFactory;

pub fn execute(args: InfoArgs) -> i32 {
    let info = match RecordingReaderFactory::create_reader(&args.file).and_then(|r| r.metadata()) {
        Ok(info) => info,
        Err(e) => return fail(&e),
    };

    if args.json {
        return print_json(&info, args.output.as_deref());
    }
    println!("File: {} ({})", info.file_name, info.file_type);
    println!("Size: {} bytes", info.file_size);
    if let Some(ref start) = info.start_time {
        println!("Start: {}", start);
    }
    println!("Sample rate: {} Hz", info.sample_rate);
    println!("Samples: {} ({:.1} s)", info.num_samples, info.duration);
    println!("Channels ({}): {}", info.num_channels, info.channels.join(", "));
    println!("Annotations: {}", info.num_annotations);

    exit_codes::SUCCESS
}
