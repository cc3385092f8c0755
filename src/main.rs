use anyhow::Result;
use clap::Parser;

use adserver::config::{StaticConfig, init_config};
use adserver::runtime::modes::run_server;
use adserver::system::logging::init_logging;

/// Video ad server: VAST waterfall, tracking and OpenRTB
#[derive(Debug, Parser)]
#[command(name = "adserver", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Print a sample configuration with all defaults and exit
    #[arg(long)]
    print_config: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    }

    let config = init_config(&args.config);

    // guard 需要活到进程结束
    let _log_guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    run_server(&config).await
}
