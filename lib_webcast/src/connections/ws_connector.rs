//! # Webcast WebSocket Connector
//!
//! Turns a discovered room into an open push connection. The URL template's
//! `%s` placeholder is replaced by the room id, and the handshake carries the
//! session cookie plus a browser user agent. Failure is fatal for the attempt.

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, COOKIE, USER_AGENT};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::core::errors::WebcastError;
use crate::retrieve::room_discovery::RoomInfo;

/// The concrete connection type produced by [`connect`].
pub type WebcastStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Placeholder in the URL template that receives the room id.
pub const ROOM_ID_PLACEHOLDER: &str = "%s";

/// Name of the cookie carrying the discovery session token.
pub const SESSION_COOKIE_NAME: &str = "ttwid";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// Everything needed to open the push connection for one room.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub room: RoomInfo,
    pub url_template: String,
    pub user_agent: String,
}

impl ConnectTarget {
    pub fn new(room: RoomInfo, url_template: impl Into<String>) -> Self {
        Self {
            room,
            url_template: url_template.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The template with every placeholder replaced by the room id.
    pub fn url(&self) -> String {
        self.url_template.replace(ROOM_ID_PLACEHOLDER, &self.room.room_id)
    }

    /// Builds the WebSocket handshake request with cookie and user-agent headers.
    pub fn build_request(&self) -> Result<Request, WebcastError> {
        let mut request = self
            .url()
            .into_client_request()
            .map_err(|e| WebcastError::InvalidTarget(e.to_string()))?;

        let cookie = format!("{}={}", SESSION_COOKIE_NAME, self.room.session_cookie);
        let headers = request.headers_mut();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&cookie)
                .map_err(|e| WebcastError::InvalidTarget(format!("cookie header: {}", e)))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| WebcastError::InvalidTarget(format!("user-agent header: {}", e)))?,
        );
        Ok(request)
    }
}

/// Opens the push connection. No retry is attempted.
pub async fn connect(target: &ConnectTarget) -> Result<WebcastStream, WebcastError> {
    let request = target.build_request()?;
    log::info!("Connecting to room {} push endpoint", target.room.room_id);

    let (stream, response) = connect_async(request).await.map_err(WebcastError::Connect)?;
    log::info!(
        "Connected to room {} (handshake status {})",
        target.room.room_id,
        response.status()
    );
    Ok(stream)
}
