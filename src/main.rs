#[macro_use] extern crate log;

pub mod config;
pub mod context;
pub mod handlers;
pub mod logger;
pub mod request;
pub mod response;
pub mod server;
pub mod site;
pub mod utils;
pub mod worker;

use clap::Parser;

use crate::config::Settings;
use crate::server::Server;
use crate::utils::ResultV;


const MODULE: &str = "MAIN";

pub const NO_SITES_ERROR: &str = "no sites configured";

/// Minimal multi-site HTTP host: static directories and worker-backed sites
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the configurational file
    config_fn: String,
}

fn main() -> ResultV {
    let args = Args::parse();
    let cfg = Settings::load(&args.config_fn)?;
    logger::init_logger(&cfg.log);

    info!("[{}] Config loaded from {}", MODULE, args.config_fn);

    let sites = config::load_sites(&cfg.server.sites)?;
    if sites.is_empty() {
        error!("[{}] Site definition file {} holds no sites", MODULE, cfg.server.sites);
        return Err(NO_SITES_ERROR);
    }
    info!("[{}] Loaded {} site(s) from {}", MODULE, sites.len(), cfg.server.sites);

    let server = Server::new(&cfg);
    server.start(sites)?;
    info!("[{}] Staring sitehost with a pool of {} handler(s)", MODULE, cfg.server.workers);

    server.join();
    Ok(())
}
