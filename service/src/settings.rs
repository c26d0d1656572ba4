use std::{env, path::PathBuf, time::Duration};

use convert::libre::{DEFAULT_LIBRE_TIMEOUT, LIBRE};

pub struct Settings {
    pub port: u16,
    pub base_url: String,
    pub storage_root: PathBuf,
    pub libre_path: PathBuf,
    pub libre_timeout: Duration,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    pub deduplicate: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        let port = get_port();
        Settings {
            port,
            base_url: get_base_url(port),
            storage_root: get_storage_root(),
            libre_path: get_libre_path(),
            libre_timeout: get_seconds("LIBRE_TIMEOUT_SECONDS", DEFAULT_LIBRE_TIMEOUT.as_secs()),
            request_timeout: get_seconds("REQUEST_TIMEOUT_SECONDS", 59),
            max_upload_bytes: get_max_upload_bytes(),
            deduplicate: get_deduplicate(),
        }
    }
}

fn get_port() -> u16 {
    match env::var("PORT").map(|port| port.parse::<u16>()) {
        Ok(Ok(port)) => port,
        _ => 4000,
    }
}

fn get_base_url(port: u16) -> String {
    env::var("BASE_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| format!("http://localhost:{}", port))
}

fn get_storage_root() -> PathBuf {
    env::var("STORAGE_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

fn get_libre_path() -> PathBuf {
    env::var("LIBRE_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(LIBRE))
}

fn get_seconds(key: &str, default: u64) -> Duration {
    let seconds = env::var(key).map(|seconds| seconds.parse::<u64>());

    let seconds = match seconds {
        Ok(Ok(seconds)) if seconds > 0 => seconds,
        _ => default,
    };
    Duration::from_secs(seconds)
}

fn get_max_upload_bytes() -> usize {
    match env::var("MAX_UPLOAD_BYTES").map(|bytes| bytes.parse::<usize>()) {
        Ok(Ok(bytes)) => bytes,
        _ => 100 * 1024 * 1024,
    }
}

fn get_deduplicate() -> bool {
    !matches!(env::var("DEDUPLICATE_CONVERSIONS").as_deref(), Ok("false" | "0" | "no" | "off"))
}
