//! Webchef CLI: runs declarative browser recipes.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "webchef",
    version,
    about = "Declarative recipe runner for browser sessions"
)]
struct Cli {
    /// Log at debug level regardless of WEBCHEF_LOGLEVEL
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: webchef::cli::Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = webchef::logging::init(cli.verbose) {
        eprintln!("warning: logging disabled: {}", e);
    }
    match webchef::cli::dispatch(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
