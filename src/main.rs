mod args;
mod pipeline;

use clap::Parser;
use log::{info, warn, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();

    info!("args: {:?}", args);

    let res = pipeline::run_analysis(
        args.config.clone(),
        args.reference.clone(),
        args.out.clone(),
        &pipeline::Overrides {
            input: args.input.clone(),
            census: args.census.clone(),
            year: args.year,
            output_directory: args.output_directory.clone(),
        },
    );

    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
