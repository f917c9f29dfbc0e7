use anyhow::{anyhow, Result};
use clap::Parser;
use lib_webcast::{
    AckFormat, ConnectTarget, DiscoveryOptions, ReadErrorPolicy, RoomInfo, SessionConfig, UnknownMethodPolicy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "server_webcast.conf";

const DEFAULT_WS_URL_TEMPLATE: &str = "wss://webcast5-ws-web-lf.douyin.com/webcast/im/push/v2/?app_name=douyin_web&version_code=180800&webcast_sdk_version=1.0.12&compress=gzip&device_platform=web&host=https://live.douyin.com&aid=6383&live_id=1&identity=audience&room_id=%s&heartbeatDuration=0";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Live webcast room ingestion server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "WEBCAST_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "WEBCAST_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "WEBCAST_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "WEBCAST_LIVE_URL", help = "Public live page of the room to ingest.")]
    pub live_url: Option<String>,

    #[clap(long, env = "WEBCAST_WS_URL", help = "Push endpoint URL template; %s is replaced by the room id.")]
    pub ws_url_template: Option<String>,

    #[clap(long, env = "WEBCAST_USER_AGENT", help = "User agent sent on discovery and on the WebSocket handshake.")]
    pub user_agent: Option<String>,

    #[clap(long, env = "WEBCAST_ACCEPT", help = "Accept header for the live page request.")]
    pub accept_header: Option<String>,

    #[clap(long, env = "WEBCAST_HEARTBEAT_SECONDS", help = "Seconds between keep-alive frames.")]
    pub heartbeat_seconds: Option<u64>,

    #[clap(long, env = "WEBCAST_UNKNOWN_METHOD", help = "Unknown sub-message handling (ignore, report).")]
    pub unknown_method: Option<String>,

    #[clap(long, env = "WEBCAST_MAX_READ_ERRORS", help = "Consecutive read errors before the session closes (0 = never).")]
    pub max_read_errors: Option<u32>,

    #[clap(long, env = "WEBCAST_ACK_FORMAT", help = "Acknowledgment frame shape (ext_as_payload_type, tagged_payload).")]
    pub ack_format: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            live_url: other.live_url.or(self.live_url),
            ws_url_template: other.ws_url_template.or(self.ws_url_template),
            user_agent: other.user_agent.or(self.user_agent),
            accept_header: other.accept_header.or(self.accept_header),
            heartbeat_seconds: other.heartbeat_seconds.or(self.heartbeat_seconds),
            unknown_method: other.unknown_method.or(self.unknown_method),
            max_read_errors: other.max_read_errors.or(self.max_read_errors),
            ack_format: other.ack_format.or(self.ack_format),
        }
    }

    fn defaults() -> Config {
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            live_url: Some("https://live.douyin.com/7003418886".to_string()),
            ws_url_template: Some(DEFAULT_WS_URL_TEMPLATE.to_string()),
            user_agent: Some(lib_webcast::connections::ws_connector::DEFAULT_USER_AGENT.to_string()),
            heartbeat_seconds: Some(10),
            unknown_method: Some("ignore".to_string()),
            max_read_errors: Some(0),
            ack_format: Some("ext_as_payload_type".to_string()),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn live_url(&self) -> Result<&str> {
        self.live_url.as_deref().ok_or_else(|| anyhow!("no live url configured"))
    }

    /// Builds the session tuning from the policy fields.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut session = SessionConfig::default();
        if let Some(secs) = self.heartbeat_seconds {
            if secs == 0 {
                return Err(anyhow!("heartbeat interval must be at least one second"));
            }
            session.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(policy) = self.unknown_method.as_deref() {
            session.unknown_method = match policy.to_lowercase().as_str() {
                "ignore" => UnknownMethodPolicy::Ignore,
                "report" => UnknownMethodPolicy::Report,
                other => return Err(anyhow!("unknown method policy {:?}", other)),
            };
        }
        session.read_errors = match self.max_read_errors {
            None | Some(0) => ReadErrorPolicy::Unbounded,
            Some(max_consecutive) => ReadErrorPolicy::Bounded { max_consecutive },
        };
        if let Some(format) = self.ack_format.as_deref() {
            session.ack_format = match format.to_lowercase().as_str() {
                "ext_as_payload_type" => AckFormat::ExtAsPayloadType,
                "tagged_payload" => AckFormat::TaggedPayload,
                other => return Err(anyhow!("unknown ack format {:?}", other)),
            };
        }
        Ok(session)
    }

    /// Discovery headers, with configured user agent and accept values replacing the built-in ones.
    pub fn discovery_options(&self) -> DiscoveryOptions {
        let mut options = DiscoveryOptions::default();
        for (name, value) in options.headers.iter_mut() {
            match name.as_str() {
                "user-agent" => {
                    if let Some(ua) = &self.user_agent {
                        *value = ua.clone();
                    }
                }
                "accept" => {
                    if let Some(accept) = &self.accept_header {
                        *value = accept.clone();
                    }
                }
                _ => {}
            }
        }
        options
    }

    pub fn connect_target(&self, room: RoomInfo) -> ConnectTarget {
        let template = self.ws_url_template.as_deref().unwrap_or(DEFAULT_WS_URL_TEMPLATE);
        let target = ConnectTarget::new(room, template);
        match &self.user_agent {
            Some(ua) => target.with_user_agent(ua.clone()),
            None => target,
        }
    }
}

pub fn load_config() -> Config {
    // Parse CLI early to pick up a config_path override; env vars are included.
    resolve(Config::parse())
}

/// Layers defaults, then the JSON file, then `cli` (CLI flags and environment).
fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                log::warn!("Failed to parse config file: {}. Falling back to other sources.", config_file_path.display());
            }
        } else {
            log::warn!("Failed to read config file: {}. Falling back to other sources.", config_file_path.display());
        }
    } else {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", config_file_path.display());
    }

    current_config.merge(cli)
}
