use std::fs;

use config::Config;
use serde_derive::Deserialize;

use crate::logger::get_reporter;
use crate::site::SiteConfig;
use crate::utils::Result;


const MODULE: &str = "CONFIG";

pub const LOAD_SETTINGS_ERROR: &str = "could not load settings file";
pub const PARSE_SETTINGS_ERROR: &str = "could not parse settings file";
pub const READ_SITES_ERROR: &str = "could not read site definition file";


#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,

    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Path to the site definition file, one `host;port;root;...` line per
    /// site.
    pub sites: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Size of the connection handler pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Idle read timeout per connection; 0 disables it.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// File served as the body of every static-site 404.
    #[serde(default = "default_not_found_page")]
    pub not_found_page: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_kind")]
    pub kind: String,

    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LogSettings {
    fn default() -> LogSettings {
        LogSettings {
            kind: default_log_kind(),
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_chunk_size() -> usize { 1024 }
fn default_workers() -> usize { 16 }
fn default_read_timeout_ms() -> u64 { 30_000 }
fn default_not_found_page() -> String { "404.html".to_string() }
fn default_log_kind() -> String { "console".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> String { "sitehost.log".to_string() }


impl Settings {
    pub fn load(path: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(get_reporter(MODULE, "Load", LOAD_SETTINGS_ERROR))?;

        config.try_deserialize::<Settings>()
            .map_err(get_reporter(MODULE, "Parse", PARSE_SETTINGS_ERROR))
    }
}

/// Reads the site definition file. Blank lines and `#` comments are
/// skipped; any malformed line rejects the whole file, so a typo cannot
/// silently drop a site.
pub fn load_sites(path: &str) -> Result<Vec<SiteConfig>> {
    let content = fs::read_to_string(path)
        .map_err(get_reporter(MODULE, "Sites", READ_SITES_ERROR))?;

    let mut sites = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        sites.push(SiteConfig::from_line(line)?);
    }
    Ok(sites)
}
