use clap::Parser;
use log::{info, LevelFilter};
use snafu::ErrorCompat;

use objection_dashboard::args::Args;
use objection_dashboard::dashboard::{error_chain, run};

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();

    info!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occurred: {}", error_chain(&e));
        if let Some(backtrace) = ErrorCompat::backtrace(&e) {
            eprintln!("{}", backtrace);
        }
        std::process::exit(1);
    }
}
