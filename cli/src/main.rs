use clap::Parser;

use notegen_lib::cli::Args;

fn main() {
    let args = Args::parse();
    let completed = notegen_lib::run(args);

    if !completed {
        std::process::exit(1);
    }
}
