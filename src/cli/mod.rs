use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Remote Service Args ---
    /// Base URL of the consultation API (e.g., http://localhost:8000)
    #[arg(long, env = "ASTRO_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Base URL of the streaming channel. Derived from --base-url (http -> ws, https -> wss) if not set.
    #[arg(long, env = "ASTRO_WS_URL")]
    pub ws_url: Option<String>,

    /// Timeout in seconds for HTTP requests. 0 disables it. The stream itself never times out.
    #[arg(long, env = "ASTRO_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    // --- Consultation Args ---
    /// User identifier sent when creating and listing chats.
    #[arg(long, env = "ASTRO_USER_ID", default_value = "user-123")]
    pub user_id: String,

    /// Chart used for follow-up questions (vedic, western)
    #[arg(long, env = "ASTRO_CHART_TYPE", default_value = "vedic")]
    pub chart_type: String,

    /// How much prior conversation the service should consider. Passed through as-is.
    #[arg(long, env = "ASTRO_CONTEXT_WINDOW", default_value = "10")]
    pub context_window: u32,

    // --- Local Storage Args ---
    /// Path of the local key-value storage file holding the birth profile.
    #[arg(long, env = "ASTRO_STORAGE_PATH", default_value = ".vedic-chat/storage.json")]
    pub storage_path: String,

    /// Prefix for the profile key inside the storage file.
    #[arg(long, env = "ASTRO_PROFILE_NAMESPACE", default_value = "")]
    pub profile_namespace: String,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive consultation (default)
    Chat,
    /// Show or replace the stored birth profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Print the chat list for the configured user
    Sessions,
    /// Print one chat's transcript
    Show {
        id: i64,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ProfileAction {
    Show,
    Set {
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Local birth time (HH:MM)
        #[arg(long)]
        time: String,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
    },
}
