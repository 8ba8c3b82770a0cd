use clap::Parser;
use office_bridge::cli;

fn main() {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
