use std::sync::Arc;

use rmcp::{
    ErrorData,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cli::ProviderArguments;
use crate::error::{ServiceError, ServiceResult};
use crate::generate::generate_roadmap;
use crate::prompts::{tutor_prompt, week_export_text, week_roadmap_context};
use crate::roadmap::{
    CuratedTable, SYNTHESIZED_WEEKS, build_topic_plan, build_weekly_plan, distribute_resources,
    expand_sections, finalize_weeks, outline_from_model, synthesize_weeks,
};
use crate::storage::PlanStore;
use crate::types::{GenerateRequest, PlanKind, WeekRecord};

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct GenerateArgs {
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "currentKnowledge")]
    pub current_knowledge: Option<String>,
    #[serde(default)]
    pub premium: bool,
    /// Store the result as the free or premium plan
    #[serde(default)]
    pub save: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ParseRoadmapArgs {
    /// Any model response: JSON value, wrapped payload or plain text
    pub input: Value,
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "saveAs")]
    pub save_as: Option<PlanKind>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ParseTopicsArgs {
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "currentKnowledge")]
    pub current_knowledge: Option<String>,
    #[serde(default)]
    pub save: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ExpandOutlineArgs {
    /// `{ title, duration_weeks, sections: [{ section_title, weeks_allotted, topics }] }`
    pub outline: Value,
    #[serde(default)]
    pub topic: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct DistributeArgs {
    pub weeks: Vec<WeekRecord>,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub playlists: Vec<String>,
    pub topic: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SynthesizeArgs {
    pub topic: String,
    #[serde(default)]
    pub weeks: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct PlanArgs {
    pub kind: PlanKind,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateWeekArgs {
    pub kind: PlanKind,
    /// 0-based week index
    pub index: usize,
    #[serde(default)]
    pub toggle_completed: bool,
    #[serde(default, rename = "projectLink")]
    pub project_link: Option<String>,
    #[serde(default)]
    pub reflection: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateTopicArgs {
    /// 0-based topic index in the basic plan
    pub index: usize,
    #[serde(default)]
    pub toggle_completed: bool,
    #[serde(default, rename = "projectLink")]
    pub project_link: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ExportWeekArgs {
    pub kind: PlanKind,
    pub index: usize,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct AskTutorArgs {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub week: Option<String>,
    #[serde(default, rename = "weekTitle")]
    pub week_title: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    /// Take week, title and context from a saved weekly plan
    #[serde(default)]
    pub kind: Option<PlanKind>,
    #[serde(default)]
    pub index: Option<usize>,
}

fn json_content(value: &impl Serialize) -> Result<CallToolResult, ErrorData> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn error_content(err: &ServiceError) -> Result<CallToolResult, ErrorData> {
    json_content(&json!({ "error": err.to_string() }))
}

#[derive(Clone)]
pub struct RoadmapServer {
    providers: ProviderArguments,
    store: Arc<Mutex<PlanStore>>,
    writes: Arc<Mutex<()>>,
    curated: Arc<CuratedTable>,
    pub tool_router: ToolRouter<RoadmapServer>,
}

#[tool_router]
impl RoadmapServer {
    pub fn new(providers: ProviderArguments, store: PlanStore, curated: CuratedTable) -> Self {
        Self {
            providers,
            store: Arc::new(Mutex::new(store)),
            writes: Arc::new(Mutex::new(())),
            curated: Arc::new(curated),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Generate a weekly learning roadmap for a topic, with repositories, playlists and project ideas per week")]
    async fn generate_roadmap(
        &self,
        Parameters(args): Parameters<GenerateArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let backend = match self.providers.backend() {
            Ok(b) => b,
            Err(e) => return error_content(&e),
        };
        let request = GenerateRequest {
            topic: args.topic,
            current_knowledge: args.current_knowledge,
            premium: args.premium,
        };
        let result = tokio::task::spawn_blocking(move || generate_roadmap(&request, &backend))
            .await
            .map_err(|e| ErrorData::internal_error(format!("generation task failed: {e}"), None))?;
        let response = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "roadmap generation failed");
                return error_content(&e);
            }
        };
        if args.save {
            let kind = if response.meta.premium { PlanKind::Premium } else { PlanKind::Free };
            self.persist(|store| store.put_weeks(kind, &response.weeks))
                .await
                .map_err(ServiceError::into_rpc)?;
            info!(%kind, weeks = response.weeks.len(), "saved generated roadmap");
        }
        json_content(&response)
    }

    #[tool(description = "Parse any model response (JSON, wrapped JSON or plain text) into a normalized weekly plan")]
    async fn parse_roadmap(
        &self,
        Parameters(args): Parameters<ParseRoadmapArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let weeks = build_weekly_plan(Some(&args.input), &args.topic);
        if let Some(kind) = args.save_as.filter(PlanKind::is_weekly) {
            self.persist(|store| store.put_weeks(kind, &weeks))
                .await
                .map_err(ServiceError::into_rpc)?;
        }
        json_content(&json!({ "weeks": weeks }))
    }

    #[tool(description = "Parse a response into a basic topic list enriched with curated descriptions")]
    async fn parse_topics(
        &self,
        Parameters(args): Parameters<ParseTopicsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let topics = build_topic_plan(
            args.input.as_ref(),
            &args.query,
            args.current_knowledge.as_deref(),
            &self.curated,
        );
        if args.save {
            self.persist(|store| store.put_topics(PlanKind::Basic, &topics))
                .await
                .map_err(ServiceError::into_rpc)?;
        }
        json_content(&json!({ "topics": topics }))
    }

    #[tool(description = "Validate an outline of sections and expand it into consecutive week records")]
    async fn expand_outline(
        &self,
        Parameters(args): Parameters<ExpandOutlineArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let outline = outline_from_model(&args.outline, &args.topic);
        let weeks = expand_sections(&outline.sections);
        json_content(&json!({
            "title": outline.title,
            "duration_weeks": outline.duration_weeks,
            "weeks": weeks,
        }))
    }

    #[tool(description = "Assign repositories, a playlist and project suggestions to each week")]
    async fn distribute_resources(
        &self,
        Parameters(args): Parameters<DistributeArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let weeks = distribute_resources(args.weeks, &args.repos, &args.playlists, &args.topic);
        json_content(&json!({ "weeks": weeks }))
    }

    #[tool(description = "Build a placeholder weekly plan for a topic without calling any provider")]
    async fn synthesize_plan(
        &self,
        Parameters(args): Parameters<SynthesizeArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let count = args.weeks.unwrap_or(SYNTHESIZED_WEEKS);
        let weeks = finalize_weeks(synthesize_weeks(&args.topic, count), &args.topic);
        json_content(&json!({ "weeks": weeks }))
    }

    #[tool(description = "Show a saved plan with its completion percentage and next active entry")]
    async fn plan_progress(
        &self,
        Parameters(args): Parameters<PlanArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let store = self.store.lock().await;
        let progress = store.progress(args.kind);
        let entries = if args.kind.is_weekly() {
            serde_json::to_value(store.load_weeks(args.kind))
        } else {
            serde_json::to_value(store.load_topics(args.kind))
        }
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        json_content(&json!({ "progress": progress, "entries": entries }))
    }

    #[tool(description = "Toggle completion, set the project link or save a reflection for a saved week")]
    async fn update_week(
        &self,
        Parameters(args): Parameters<UpdateWeekArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        if !args.kind.is_weekly() {
            return Err(ErrorData::invalid_params(
                "update_week works on free and premium plans; use update_topic for the basic plan",
                None,
            ));
        }
        let (kind, index) = (args.kind, args.index);
        let (week, progress) = self
            .persist(|store| {
                if args.toggle_completed {
                    store.toggle_completed(kind, index)?;
                }
                if let Some(link) = &args.project_link {
                    store.set_project_link(kind, index, link)?;
                }
                if let Some(reflection) = &args.reflection {
                    store.set_reflection(kind, index, reflection)?;
                }
                let weeks = store.load_weeks(kind);
                let len = weeks.len();
                let week = weeks
                    .into_iter()
                    .nth(index)
                    .ok_or(ServiceError::IndexOutOfRange { index, len })?;
                Ok((week, store.progress(kind)))
            })
            .await
            .map_err(ServiceError::into_rpc)?;
        json_content(&json!({ "week": week, "progress": progress }))
    }

    #[tool(description = "Toggle completion or set the project link of a topic in the basic plan")]
    async fn update_topic(
        &self,
        Parameters(args): Parameters<UpdateTopicArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let index = args.index;
        let (topic, progress) = self
            .persist(|store| {
                if args.toggle_completed {
                    store.toggle_completed(PlanKind::Basic, index)?;
                }
                if let Some(link) = &args.project_link {
                    store.set_project_link(PlanKind::Basic, index, link)?;
                }
                let topics = store.load_topics(PlanKind::Basic);
                let len = topics.len();
                let topic = topics
                    .into_iter()
                    .nth(index)
                    .ok_or(ServiceError::IndexOutOfRange { index, len })?;
                Ok((topic, store.progress(PlanKind::Basic)))
            })
            .await
            .map_err(ServiceError::into_rpc)?;
        json_content(&json!({ "topic": topic, "progress": progress }))
    }

    #[tool(description = "Render a saved week as shareable plain text")]
    async fn export_week(
        &self,
        Parameters(args): Parameters<ExportWeekArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let week = self.saved_week(args.kind, args.index).await?;
        Ok(CallToolResult::success(vec![Content::text(week_export_text(&week))]))
    }

    #[tool(description = "Ask the AI mentor about a week of the roadmap")]
    async fn ask_tutor(
        &self,
        Parameters(args): Parameters<AskTutorArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let saved = match (args.kind, args.index) {
            (Some(kind), Some(index)) => Some(self.saved_week(kind, index).await?),
            _ => None,
        };
        let week_number = args.week.clone().or_else(|| saved.as_ref().map(|w| w.week.to_string()));
        let week_title = args.week_title.clone().or_else(|| saved.as_ref().map(|w| w.title.clone()));
        let context = args.context.clone().or_else(|| saved.as_ref().map(week_roadmap_context));
        if args.question.as_deref().unwrap_or_default().trim().is_empty()
            && context.as_deref().unwrap_or_default().trim().is_empty()
        {
            return Err(ErrorData::invalid_params(
                "Type a question or point at a week with roadmap content",
                None,
            ));
        }
        let prompt = tutor_prompt(
            args.topic.as_deref(),
            week_number.as_deref(),
            week_title.as_deref(),
            context.as_deref(),
            args.question.as_deref(),
        );
        let client = match self.providers.gemini() {
            Ok(c) => c,
            Err(e) => return error_content(&e),
        };
        let answer = tokio::task::spawn_blocking(move || client.generate_text(&prompt))
            .await
            .map_err(|e| ErrorData::internal_error(format!("tutor task failed: {e}"), None))?;
        match answer {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => error_content(&e),
        }
    }
}

impl RoadmapServer {
    /// Apply `change` under the store lock, then write a snapshot with the
    /// lock released. Writes are serialized so the file ends with the latest
    /// state.
    async fn persist<T>(
        &self,
        change: impl FnOnce(&mut PlanStore) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let value = change(&mut *self.store.lock().await)?;
        let _writing = self.writes.lock().await;
        let (path, data) = self.store.lock().await.snapshot_for_save();
        PlanStore::save_snapshot_async(path, data).await?;
        Ok(value)
    }

    async fn saved_week(&self, kind: PlanKind, index: usize) -> Result<WeekRecord, ErrorData> {
        if !kind.is_weekly() {
            return Err(ErrorData::invalid_params(
                format!("{kind} plans have no weeks"),
                None,
            ));
        }
        let weeks = self.store.lock().await.load_weeks(kind);
        if weeks.is_empty() {
            return Err(ServiceError::PlanNotFound(kind.to_string()).into_rpc());
        }
        let len = weeks.len();
        weeks
            .into_iter()
            .nth(index)
            .ok_or_else(|| ServiceError::IndexOutOfRange { index, len }.into_rpc())
    }
}

#[tool_handler]
impl rmcp::ServerHandler for RoadmapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "SyncVerse roadmap server: generate, parse and track learning roadmaps".to_string(),
            ),
        }
    }
}
