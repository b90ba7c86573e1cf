use crate::cli::Args;
use crate::error::ChatError;
use crate::models::api::ChartType;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Typed view of the command line the library works from.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub ws_url: Url,
    pub request_timeout: Option<Duration>,
    pub session: SessionSettings,
    pub storage_path: PathBuf,
    pub profile_namespace: String,
}

/// Per-send parameters forwarded to the service untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub user_id: String,
    pub chart_type: ChartType,
    pub context_window: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_id: "user-123".to_string(),
            chart_type: ChartType::Vedic,
            context_window: 10,
        }
    }
}

fn parse_url(raw: &str, what: &str) -> Result<Url, ChatError> {
    Url::parse(raw).map_err(|e| ChatError::validation(format!("Invalid {} '{}': {}", what, raw, e)))
}

/// Maps http(s) to ws(s), keeping host, port and path.
pub fn derive_ws_url(base: &Url) -> Result<Url, ChatError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ChatError::validation(format!("Unsupported URL scheme '{}'", other)));
        }
    };
    let mut ws = base.clone();
    ws
        .set_scheme(scheme)
        .map_err(|_| ChatError::validation(format!("Cannot derive stream URL from '{}'", base)))?;
    Ok(ws)
}

impl ClientConfig {
    pub fn from_args(args: &Args) -> Result<Self, ChatError> {
        let base_url = parse_url(&args.base_url, "base URL")?;
        let ws_url = match args.ws_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(raw) => parse_url(raw, "stream URL")?,
            None => derive_ws_url(&base_url)?,
        };
        let chart_type = args.chart_type
            .parse::<ChartType>()
            .map_err(|e| ChatError::validation(e.to_string()))?;
        if args.user_id.trim().is_empty() {
            return Err(ChatError::validation("User id must not be empty"));
        }

        Ok(Self {
            base_url,
            ws_url,
            request_timeout: (args.request_timeout_secs > 0).then(||
                Duration::from_secs(args.request_timeout_secs)
            ),
            session: SessionSettings {
                user_id: args.user_id.trim().to_string(),
                chart_type,
                context_window: args.context_window,
            },
            storage_path: PathBuf::from(&args.storage_path),
            profile_namespace: args.profile_namespace.clone(),
        })
    }
}
