//! Server configuration
//!
//! Everything the server binary can be told on its command line. The library
//! types (`SessionManager`, `Database`) only need `data_dir`.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Settings for a GetSomeDB server
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the store; database `name` lives at `{data_dir}/{name}.json`
    pub data_dir: PathBuf,

    /// Address the TCP listener binds (`host:port`, port 0 picks one)
    pub listen_addr: String,

    /// Threads serving accepted connections
    pub worker_threads: usize,

    /// Accepted connections allowed to queue for a free worker
    pub max_connections: usize,

    /// Idle time before a connection is dropped, 0 disables
    pub read_timeout_ms: u64,

    /// 0 disables
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./storage"),
            listen_addr: String::from("127.0.0.1:8080"),
            worker_threads: 8,
            max_connections: 1024,
            read_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(StoreError::Config("listen_addr is empty".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(StoreError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Read timeout for connection sockets, `None` when disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    /// Write timeout for connection sockets, `None` when disabled
    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builds a [`Config`] starting from the defaults
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Bound of the accept queue
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
