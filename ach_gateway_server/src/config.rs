use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use ach_gateway_engine::{
    file_transfer::{
        ControllerConfig,
        DEFAULT_FILE_TRANSFER_INTERVAL,
        DEFAULT_FORCED_UPLOAD_DELTA,
        DEFAULT_MAX_LINES,
        DEFAULT_TEMP_DOWNLOAD_DIR,
        DEFAULT_TRANSFER_BATCH_SIZE,
    },
    ledger::DEFAULT_ACCOUNTS_TIMEOUT,
};
use agw_common::helpers::parse_boolean_flag;
use log::*;

const DEFAULT_AGW_HOST: &str = "127.0.0.1";
const DEFAULT_AGW_PORT: u16 = 8200;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/ach_gateway.db?mode=rwc";
const DEFAULT_STORAGE_DIR: &str = "./storage";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Merged files are kept under `<storage_dir>/merged`, downloads under `<storage_dir>/<temp_download_dir>`.
    pub storage_dir: PathBuf,
    pub file_transfer_interval: Duration,
    pub max_lines_per_file: usize,
    /// Open files are uploaded once their routing number is this close to its cutoff.
    pub forced_upload_delta: chrono::Duration,
    pub transfer_batch_size: u32,
    pub temp_download_dir: String,
    pub delete_remote_files: bool,
    /// Base URL of the accounts service. When unset, returned transfers are not reversed in the ledger.
    pub accounts_endpoint: Option<String>,
    pub accounts_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_AGW_HOST.to_string(),
            port: DEFAULT_AGW_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            file_transfer_interval: DEFAULT_FILE_TRANSFER_INTERVAL,
            max_lines_per_file: DEFAULT_MAX_LINES,
            forced_upload_delta: DEFAULT_FORCED_UPLOAD_DELTA,
            transfer_batch_size: DEFAULT_TRANSFER_BATCH_SIZE,
            temp_download_dir: DEFAULT_TEMP_DOWNLOAD_DIR.to_string(),
            delete_remote_files: true,
            accounts_endpoint: None,
            accounts_timeout: DEFAULT_ACCOUNTS_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("AGW_HOST").ok().unwrap_or(defaults.host);
        let port = parse_env("AGW_PORT", defaults.port);
        let database_url = env::var("AGW_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ AGW_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            defaults.database_url
        });
        let storage_dir = env::var("AGW_STORAGE_DIR").map(PathBuf::from).unwrap_or(defaults.storage_dir);
        let file_transfer_interval = parse_env_with("AGW_FILE_TRANSFER_INTERVAL", defaults.file_transfer_interval, |s| {
            s.parse::<u64>().ok().filter(|&secs| secs > 0).map(Duration::from_secs)
        });
        let max_lines_per_file = parse_env_with("AGW_MAX_LINES_PER_FILE", defaults.max_lines_per_file, |s| {
            s.parse::<usize>().ok().filter(|&n| n > 0)
        });
        let forced_upload_delta = parse_env_with("AGW_FORCED_CUTOFF_UPLOAD_DELTA", defaults.forced_upload_delta, |s| {
            s.parse::<i64>().ok().filter(|&m| m >= 0).map(chrono::Duration::minutes)
        });
        let transfer_batch_size = parse_env_with("AGW_TRANSFER_BATCH_SIZE", defaults.transfer_batch_size, |s| {
            s.parse::<u32>().ok().filter(|&n| n > 0)
        });
        let temp_download_dir = env::var("AGW_TEMP_DOWNLOAD_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.temp_download_dir);
        let delete_remote_files = parse_boolean_flag(env::var("AGW_DELETE_REMOTE_FILES").ok(), true);
        let accounts_endpoint = env::var("AGW_ACCOUNTS_ENDPOINT").ok().filter(|s| !s.trim().is_empty());
        if accounts_endpoint.is_none() {
            warn!("🪛️ AGW_ACCOUNTS_ENDPOINT is not set. Returned transfers will not be reversed in the ledger.");
        }
        let accounts_timeout = parse_env_with("AGW_ACCOUNTS_TIMEOUT", defaults.accounts_timeout, |s| {
            s.parse::<u64>().ok().filter(|&secs| secs > 0).map(Duration::from_secs)
        });
        Self {
            host,
            port,
            database_url,
            storage_dir,
            file_transfer_interval,
            max_lines_per_file,
            forced_upload_delta,
            transfer_batch_size,
            temp_download_dir,
            delete_remote_files,
            accounts_endpoint,
            accounts_timeout,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            root_dir: self.storage_dir.clone(),
            interval: self.file_transfer_interval,
            max_lines: self.max_lines_per_file,
            batch_size: self.transfer_batch_size,
            temp_download_dir: self.temp_download_dir.clone(),
            forced_upload_delta: self.forced_upload_delta,
            delete_remote_files: self.delete_remote_files,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn parse_env_with<T, F>(name: &str, default: T, parse: F) -> T
where
    T: std::fmt::Debug,
    F: FnOnce(&str) -> Option<T>,
{
    match env::var(name) {
        Ok(s) => parse(s.trim()).unwrap_or_else(|| {
            warn!("🪛️ {s} is not a valid value for {name}. Using the default, {default:?}, instead.");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Environment variables are process-wide, so everything that touches them lives in one test.
    #[test]
    fn config_from_env() {
        let _ = env_logger::try_init();
        let config = GatewayConfig::from_env_or_default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8200);
        assert_eq!(config.max_lines_per_file, 10_000);

        env::set_var("AGW_PORT", "9000");
        env::set_var("AGW_MAX_LINES_PER_FILE", "0");
        env::set_var("AGW_FILE_TRANSFER_INTERVAL", "30");
        env::set_var("AGW_FORCED_CUTOFF_UPLOAD_DELTA", "fifteen");
        env::set_var("AGW_ACCOUNTS_ENDPOINT", "http://accounts:8085");
        env::set_var("AGW_DELETE_REMOTE_FILES", "no");
        let config = GatewayConfig::from_env_or_default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_lines_per_file, 10_000);
        assert_eq!(config.file_transfer_interval, Duration::from_secs(30));
        assert_eq!(config.forced_upload_delta, chrono::Duration::minutes(5));
        assert_eq!(config.accounts_endpoint.as_deref(), Some("http://accounts:8085"));
        assert!(!config.delete_remote_files);

        env::set_var("AGW_PORT", "not-a-port");
        let config = GatewayConfig::from_env_or_default();
        assert_eq!(config.port, 8200);
        let controller = config.controller_config();
        assert_eq!(controller.root_dir, PathBuf::from("./storage"));
        assert_eq!(controller.interval, Duration::from_secs(30));
        for name in [
            "AGW_PORT",
            "AGW_MAX_LINES_PER_FILE",
            "AGW_FILE_TRANSFER_INTERVAL",
            "AGW_FORCED_CUTOFF_UPLOAD_DELTA",
            "AGW_ACCOUNTS_ENDPOINT",
            "AGW_DELETE_REMOTE_FILES",
        ] {
            env::remove_var(name);
        }
    }
}
