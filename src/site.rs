use crate::utils::{Result, ResultV};


const MODULE: &str = "SITE";

pub const SITE_FIELDS_ERROR: &str = "site definition needs at least host;port;root";
pub const SITE_PORT_ERROR: &str = "invalid site port";
pub const SITE_KIND_ERROR: &str = "unknown site kind";
pub const SITE_BACKLOG_ERROR: &str = "invalid site backlog";
pub const SITE_ROOT_ERROR: &str = "static site needs a root path";
pub const SITE_COMMAND_ERROR: &str = "dynamic site needs a worker command";

const KIND_STATIC: &str = "static";
const KIND_DYNAMIC: &str = "dynamic";

const DEFAULT_BACKLOG: usize = 10;


/// Immutable description of one hosted site. Static sites serve files from
/// `root_path`; dynamic sites proxy requests to the process launched by
/// `worker_command`. `backlog` bounds concurrent connections for the site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub host: String,
    pub port: u16,
    pub root_path: String,
    pub worker_command: String,
    pub is_static: bool,
    pub backlog: usize,
}

impl SiteConfig {
    /// One site per semicolon-delimited line:
    /// `host;port;root[;command[;kind[;backlog]]]`. The three trailing
    /// fields default to an empty command, a kind inferred from the
    /// command's presence, and a backlog of 10.
    pub fn from_line(line: &str) -> Result<SiteConfig> {
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields.len() < 3 {
            error!("[{}] Not enough fields in site definition: `{}`", MODULE, line);
            return Err(SITE_FIELDS_ERROR);
        }

        let port = fields[1].parse::<u16>().map_err(|e| {
            error!("[{}] Bad port `{}` in site definition: {}", MODULE, fields[1], e);
            SITE_PORT_ERROR
        })?;

        let worker_command = fields.get(3).copied().unwrap_or("").to_string();

        let is_static = match fields.get(4).copied() {
            None | Some("") => worker_command.is_empty(),
            Some(KIND_STATIC) => true,
            Some(KIND_DYNAMIC) => false,
            Some(kind) => {
                error!("[{}] Unknown site kind `{}` in `{}`", MODULE, kind, line);
                return Err(SITE_KIND_ERROR);
            }
        };

        let backlog = match fields.get(5).copied() {
            None | Some("") => DEFAULT_BACKLOG,
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                error!("[{}] Bad backlog `{}` in site definition: {}", MODULE, raw, e);
                SITE_BACKLOG_ERROR
            })?,
        };

        let site = SiteConfig {
            host: fields[0].to_string(),
            port,
            root_path: fields[2].to_string(),
            worker_command,
            is_static,
            backlog,
        };
        site.validate()?;
        Ok(site)
    }

    /// A static site needs a root directory, a dynamic one a worker
    /// command. Port 0 is accepted and means "any free port".
    pub fn validate(&self) -> ResultV {
        if self.is_static && self.root_path.is_empty() {
            error!("[{}] Static site {} has no root path", MODULE, self.address());
            return Err(SITE_ROOT_ERROR);
        }
        if !self.is_static && self.worker_command.is_empty() {
            error!("[{}] Dynamic site {} has no worker command", MODULE, self.address());
            return Err(SITE_COMMAND_ERROR);
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
