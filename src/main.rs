use std::env;
use std::path::PathBuf;

use clap::Parser;

#[tokio::main]
async fn main() {
    maxdd::logging::init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let data_dir = raw_args.get(3).map(PathBuf::from);
        let source = match maxdd::api::build_source(data_dir) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = maxdd::api::run_http_server(port, source).await {
            eprintln!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let cli = maxdd::api::Cli::parse();
    match maxdd::api::run_cli(cli).await {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
