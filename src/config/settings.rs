use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Defines the host and port the WebSocket server binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Where the queue store keeps its data.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub path: String,
    /// Skip the disk entirely; everything is lost on exit.
    pub in_memory: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// How often a subscription re-checks the store when no notification
    /// arrives.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
    pub in_memory: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageSettings {
                path: "popq_data".to_string(),
                in_memory: false,
            },
            broker: BrokerSettings {
                poll_interval_ms: 1000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let storage = self.storage;
        let broker = self.broker;
        let logging = self.logging;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            storage: StorageSettings {
                path: storage
                    .as_ref()
                    .and_then(|s| s.path.clone())
                    .unwrap_or(default.storage.path),
                in_memory: storage
                    .as_ref()
                    .and_then(|s| s.in_memory)
                    .unwrap_or(default.storage.in_memory),
            },
            broker: BrokerSettings {
                poll_interval_ms: broker
                    .as_ref()
                    .and_then(|b| b.poll_interval_ms)
                    .unwrap_or(default.broker.poll_interval_ms),
            },
            logging: LoggingSettings {
                level: logging
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
