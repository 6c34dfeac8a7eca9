use serde::Deserialize;

/// Top-level configuration settings for the service.
///
/// One section per collaborator the bootstrap wires together.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub broker: BrokerSettings,
    pub cache: CacheSettings,
    pub store: StoreSettings,
    #[serde(rename = "static")]
    pub static_files: StaticSettings,
    pub realtime: RealtimeSettings,
    pub log: LogSettings,
}

/// Identity and listen address of the service.
///
/// `version` doubles as the URL prefix every route module is mounted under.
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
}

/// Broker connection and retry policy.
///
/// `delay` and `timeout` are in milliseconds. `retries` is the lifetime
/// retry budget and is never replenished.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub uri: String,
    pub retries: u32,
    pub delay: u64,
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub uri: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StaticSettings {
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub path: String,
}

/// Logging level and the optional file sink.
#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub app: Option<PartialAppSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub cache: Option<PartialCacheSettings>,
    pub store: Option<PartialStoreSettings>,
    #[serde(rename = "static")]
    pub static_files: Option<PartialStaticSettings>,
    pub realtime: Option<PartialRealtimeSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialAppSettings {
    pub name: Option<String>,
    pub version: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBrokerSettings {
    pub uri: Option<String>,
    pub retries: Option<u32>,
    pub delay: Option<u64>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialCacheSettings {
    pub uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialStaticSettings {
    pub root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialRealtimeSettings {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Settings {
    /// Fills every value missing from `partial` with the default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();

        let app = partial.app.unwrap_or_default();
        let broker = partial.broker.unwrap_or_default();
        let cache = partial.cache.unwrap_or_default();
        let store = partial.store.unwrap_or_default();
        let static_files = partial.static_files.unwrap_or_default();
        let realtime = partial.realtime.unwrap_or_default();
        let log = partial.log.unwrap_or_default();

        Settings {
            app: AppSettings {
                name: app.name.unwrap_or(default.app.name),
                version: app.version.unwrap_or(default.app.version),
                host: app.host.unwrap_or(default.app.host),
                port: app.port.unwrap_or(default.app.port),
            },
            broker: BrokerSettings {
                uri: broker.uri.unwrap_or(default.broker.uri),
                retries: broker.retries.unwrap_or(default.broker.retries),
                delay: broker.delay.unwrap_or(default.broker.delay),
                timeout: broker.timeout.or(default.broker.timeout),
            },
            cache: CacheSettings {
                uri: cache.uri.unwrap_or(default.cache.uri),
            },
            store: StoreSettings {
                path: store.path.unwrap_or(default.store.path),
            },
            static_files: StaticSettings {
                root: static_files.root.unwrap_or(default.static_files.root),
            },
            realtime: RealtimeSettings {
                path: realtime.path.unwrap_or(default.realtime.path),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
                file: log.file.or(default.log.file),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// The service boots with these when neither a config file nor the
/// environment says otherwise.
impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: "corelink".to_string(),
                version: "v1".to_string(),
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            broker: BrokerSettings {
                uri: "amqp://127.0.0.1:5672/%2f".to_string(),
                retries: 5,
                delay: 3000,
                timeout: None,
            },
            cache: CacheSettings {
                uri: "redis://127.0.0.1:6379".to_string(),
            },
            store: StoreSettings {
                path: "data/store".to_string(),
            },
            static_files: StaticSettings {
                root: "public".to_string(),
            },
            realtime: RealtimeSettings {
                path: "/socket".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
                file: Some("logs/access.log".to_string()),
            },
        }
    }
}
