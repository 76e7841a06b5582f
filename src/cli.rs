use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::clients::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::clients::{
    DEFAULT_TIMEOUT_SECS, GeminiClient, GeminiConfig, create_github_client, create_youtube_client,
};
use crate::error::{ServiceError, ServiceResult};
use crate::generate::LiveBackend;
use crate::metadata::{BIN_NAME, PKG_DESCRIPTION, PKG_VERSION};
use crate::roadmap::CuratedTable;
use crate::storage::PlanStore;
use crate::types::PlanKind;

#[derive(Parser, Debug, Clone)]
#[command(name = BIN_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the MCP server
    Serve(ServeArguments),
    /// Generate a weekly roadmap for a topic
    Generate(GenerateArguments),
    /// Parse a freeform roadmap (JSON or text) into weekly records
    Parse(ParseArguments),
    /// Parse a response into a basic topic plan
    Topics(TopicsArguments),
    /// Show completion progress of a saved plan
    Progress(PlanArguments),
    /// Toggle completion of a week or topic
    Toggle(EntryArguments),
    /// Attach a project link to a week or topic
    Link(LinkArguments),
    /// Save a reflection for a week
    Reflect(ReflectArguments),
    /// Print a week as plain text
    Export(EntryArguments),
    /// Forget a saved plan
    Reset(ResetArguments),
    /// Print version information
    Version,
}

/// Upstream providers used for generation and the tutor.
#[derive(Args, Debug, Clone)]
pub struct ProviderArguments {
    /// Generative-AI API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// Token for repository search (unauthenticated when absent)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Key for playlist search (no playlist pool when absent)
    #[arg(long, env = "YT_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    #[arg(long, env = "SYNCVERSE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

impl ProviderArguments {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn gemini(&self) -> ServiceResult<GeminiClient> {
        GeminiClient::new(GeminiConfig {
            api_key: self.gemini_api_key.clone(),
            model: self.gemini_model.clone(),
            base_url: self.gemini_base_url.clone(),
            timeout: self.timeout(),
        })
    }

    pub fn backend(&self) -> ServiceResult<LiveBackend> {
        let timeout_secs = Some(self.timeout().as_secs());
        Ok(LiveBackend {
            gemini: self.gemini()?,
            github: create_github_client(self.github_token.clone(), timeout_secs),
            youtube: create_youtube_client(self.youtube_api_key.clone(), timeout_secs),
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct StoreArguments {
    /// Plan store file (defaults to ~/.syncverse/plans.json)
    #[arg(long, env = "SYNCVERSE_STORE")]
    pub store_path: Option<PathBuf>,

    /// TOML file that extends the curated keyword table
    #[arg(long, env = "SYNCVERSE_CURATED")]
    pub curated_table: Option<PathBuf>,
}

impl StoreArguments {
    pub fn open_store(&self) -> ServiceResult<PlanStore> {
        PlanStore::open(self.store_path.as_deref())
    }

    pub fn curated(&self) -> ServiceResult<CuratedTable> {
        match &self.curated_table {
            Some(path) => CuratedTable::load(path),
            None => Ok(CuratedTable::builtin()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArguments {
    #[command(flatten)]
    pub providers: ProviderArguments,

    #[command(flatten)]
    pub store: StoreArguments,

    /// Enable stdio transport
    #[arg(long, env = "SYNCVERSE_ENABLE_STDIO", default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_stdio: bool,

    /// Enable streamable HTTP transport
    #[arg(long, env = "SYNCVERSE_ENABLE_HTTP", default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_http: bool,

    /// HTTP bind address (streamable HTTP)
    #[arg(long, env = "SYNCVERSE_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    pub http_addr: String,
}

impl ServeArguments {
    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable_stdio && !self.enable_http {
            return Err("Enable at least one transport (stdio or http)".to_string());
        }
        if self.enable_http {
            self.http_addr
                .parse::<SocketAddr>()
                .map_err(|e| format!("Invalid SYNCVERSE_HTTP_ADDR '{}': {e}", self.http_addr))?;
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArguments {
    /// What to learn (defaults to frontend development)
    pub topic: Option<String>,

    /// What the learner already knows
    #[arg(long)]
    pub knowledge: Option<String>,

    /// Generate the deeper premium plan
    #[arg(long)]
    pub premium: bool,

    /// Save the plan to the store (free or premium key)
    #[arg(long)]
    pub save: bool,

    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub providers: ProviderArguments,

    #[command(flatten)]
    pub store: StoreArguments,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArguments {
    /// Input file; stdin when omitted
    pub file: Option<PathBuf>,

    /// Topic used for placeholder resources
    #[arg(long, default_value = "")]
    pub topic: String,

    /// Save the result under this plan
    #[arg(long, value_enum)]
    pub save_as: Option<PlanKind>,

    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub store: StoreArguments,
}

#[derive(Args, Debug, Clone)]
pub struct TopicsArguments {
    /// Input file; stdin when omitted
    pub file: Option<PathBuf>,

    /// The learner's query, used when nothing parses and for enrichment
    #[arg(long, default_value = "")]
    pub query: String,

    #[arg(long)]
    pub knowledge: Option<String>,

    /// Save the topics as the basic plan
    #[arg(long)]
    pub save: bool,

    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub store: StoreArguments,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArguments {
    #[arg(long, value_enum, default_value_t = PlanKind::Free)]
    pub kind: PlanKind,

    #[command(flatten)]
    pub store: StoreArguments,
}

#[derive(Args, Debug, Clone)]
pub struct EntryArguments {
    /// 1-based week or topic position
    pub position: usize,

    #[command(flatten)]
    pub plan: PlanArguments,
}

impl EntryArguments {
    pub fn index(&self) -> ServiceResult<usize> {
        self.position
            .checked_sub(1)
            .ok_or_else(|| ServiceError::Other("positions start at 1".to_string()))
    }
}

#[derive(Args, Debug, Clone)]
pub struct LinkArguments {
    #[command(flatten)]
    pub entry: EntryArguments,

    /// Project URL; an empty string clears it
    pub url: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReflectArguments {
    #[command(flatten)]
    pub entry: EntryArguments,

    pub text: String,
}

#[derive(Args, Debug, Clone)]
pub struct ResetArguments {
    #[command(flatten)]
    pub plan: PlanArguments,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}
