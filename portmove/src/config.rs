use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "portmove.yaml";
pub const DEFAULT_STORE_DIR: &str = "switchports";
pub const DEFAULT_STORE_FILE: &str = "switchports.yaml";
pub const DEFAULT_RUNSHEET_DIR: &str = "rundir";
pub const DEFAULT_RUNSHEET_FILE: &str = "runsheet.csv";

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub dir: Option<PathBuf>,
    pub file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunsheetConfig {
    pub dir: Option<PathBuf>,
    pub file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    pub min_switches: Option<usize>,
    pub max_skew: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MovesConfig {
    pub include_noncritical: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    pub critical_vlans: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CommandsConfig {
    pub extra_access_lines: Option<Vec<String>>,
    pub port_security: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    pub path: Option<PathBuf>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub store: Option<StoreConfig>,
    pub runsheet: Option<RunsheetConfig>,
    pub resilience: Option<ResilienceConfig>,
    pub moves: Option<MovesConfig>,
    pub import: Option<ImportConfig>,
    pub commands: Option<CommandsConfig>,
    pub audit: Option<AuditConfig>,
    pub log: Option<LogConfig>,
}

/// Explicit path must exist; otherwise `./portmove.yaml` is used if present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if !p.exists() {
                return Ok(Config::default());
            }
            p.to_path_buf()
        }
    };
    let s = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

impl Config {
    pub fn store_path(&self) -> PathBuf {
        let s = self.store.clone().unwrap_or_default();
        let dir = s.dir.unwrap_or_else(|| DEFAULT_STORE_DIR.into());
        dir.join(s.file.unwrap_or_else(|| DEFAULT_STORE_FILE.into()))
    }

    pub fn runsheet_path(&self) -> PathBuf {
        let r = self.runsheet.clone().unwrap_or_default();
        let dir = r.dir.unwrap_or_else(|| DEFAULT_RUNSHEET_DIR.into());
        dir.join(r.file.unwrap_or_else(|| DEFAULT_RUNSHEET_FILE.into()))
    }

    /// Audit database, beside the store unless configured.
    pub fn audit_path(&self) -> PathBuf {
        match self.audit.as_ref().and_then(|a| a.path.clone()) {
            Some(p) => p,
            None => self.store_path().with_file_name("audit.sqlite"),
        }
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit.as_ref().and_then(|a| a.enabled).unwrap_or(true)
    }

    pub fn critical_vlans(&self) -> Vec<String> {
        self.import.as_ref().and_then(|i| i.critical_vlans.clone()).unwrap_or_default()
    }

    pub fn include_noncritical(&self) -> bool {
        self.moves.as_ref().and_then(|m| m.include_noncritical).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log.as_ref().and_then(|l| l.level.as_deref())
    }
}
