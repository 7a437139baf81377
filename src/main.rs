use clap::Parser;
use transferlog::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = transferlog::app::run(cli.into_config()).await;
    std::process::exit(code);
}
