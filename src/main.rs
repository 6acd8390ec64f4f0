use clap::Parser;

fn main() {
    let cli = teamdesk::cli::Cli::parse();
    if let Err(err) = teamdesk::run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
