//! Data models for session usage statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::usage::pricing::CostBreakdown;

/// Model id Claude Code writes for locally generated placeholder replies
pub const SYNTHETIC_MODEL: &str = "<synthetic>";

/// One line of a session JSONL log
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub timestamp: Option<String>,
    pub cwd: Option<String>,
    pub slug: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "gitBranch")]
    pub git_branch: Option<String>,
    pub message: Option<Message>,
}

impl SessionEvent {
    /// Model of an assistant reply that counts towards usage
    pub fn billable_model(&self) -> Option<&str> {
        if self.event_type.as_deref() != Some("assistant") {
            return None;
        }
        self.message
            .as_ref()?
            .model
            .as_deref()
            .filter(|m| !m.is_empty() && *m != SYNTHETIC_MODEL)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub model: Option<String>,
    pub usage: Option<Usage>,
    #[serde(default)]
    pub content: MessageContent,
}

/// Message body: user prompts are plain strings, assistant replies are block lists
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    /// Anything else, so one odd block never drops the whole record
    Other(serde_json::Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Other(serde_json::Value::Null)
    }
}

impl MessageContent {
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            MessageContent::Blocks(blocks) => blocks,
            _ => &[],
        }
    }
}

/// Content block inside a message; unknown block types are kept as `Other`.
///
/// Field values stay untyped so a block with an odd `name` or `input` still
/// counts as a tool call.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    ToolUse {
        #[serde(default)]
        name: Option<serde_json::Value>,
        #[serde(default)]
        input: Option<serde_json::Value>,
    },
    Text {
        #[serde(default)]
        text: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

impl ContentBlock {
    /// Tool name of a `tool_use` block, if it is a non-empty string
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ContentBlock::ToolUse { name, .. } => {
                name.as_ref().and_then(|n| n.as_str()).filter(|n| !n.is_empty())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}

/// Per-model message and token counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub messages: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ModelUsage {
    pub fn add(&mut self, other: &ModelUsage) {
        self.messages += other.messages;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Normalized summary of one session log file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub id: String,
    pub slug: String,
    pub project: String,
    pub messages: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_create_tokens: u64,
    pub tool_calls: u64,
    pub tool_usage: BTreeMap<String, u64>,
    /// ISO timestamp of the earliest timestamped reply, empty when none
    pub first_active: String,
    pub last_active: String,
    pub hourly: BTreeMap<u32, u64>,
    pub daily: BTreeMap<String, u64>,
    pub model_usage: BTreeMap<String, ModelUsage>,
    pub primary_model: String,
    pub branch: String,
    pub version: String,
}

/// Optional filters for the aggregated statistics, all AND-combined
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatsFilters {
    /// Inclusive `YYYY-MM-DD` lower bound on the session start date
    pub from: Option<String>,
    pub to: Option<String>,
    pub project: Option<String>,
    pub model: Option<String>,
}

impl StatsFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Treat empty query values as absent
    pub fn without_blanks(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        Self {
            from: keep(self.from),
            to: keep(self.to),
            project: keep(self.project),
            model: keep(self.model),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.project.is_none() && self.model.is_none()
    }

    /// Check if a session passes every active filter
    pub fn matches(&self, session: &SessionData) -> bool {
        let start_date = session.first_active.get(..10).unwrap_or(&session.first_active);

        if let Some(from) = &self.from {
            if session.first_active.is_empty() || start_date < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if session.first_active.is_empty() || start_date > to.as_str() {
                return false;
            }
        }
        if let Some(project) = &self.project {
            if session.project.to_lowercase() != project.to_lowercase() {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if !session
                .primary_model
                .to_lowercase()
                .contains(&model.to_lowercase())
            {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub days_active: u32,
    pub most_active_day: String,
    pub most_active_day_messages: u64,
    pub avg_messages_per_day: u64,
    pub avg_session_duration_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEfficiency {
    pub total_cache_reads: u64,
    pub total_cache_creates: u64,
    pub total_input_tokens: u64,
    pub hit_rate: f64,
    pub estimated_savings: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimelineEntry {
    pub id: String,
    pub slug: String,
    pub project: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
    pub messages: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost: f64,
    pub model: String,
    pub branch: String,
    pub version: String,
    pub tool_usage: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTimelineEntry {
    pub name: String,
    pub first_active: String,
    pub last_active: String,
    pub sessions: u64,
    pub messages: u64,
    pub estimated_cost: f64,
    pub daily_activity: BTreeMap<String, u64>,
}

/// Statistics for a single project
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStat {
    pub name: String,
    pub messages: u64,
    pub sessions: u64,
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_create_tokens: u64,
    pub estimated_cost: f64,
    pub last_active: String,
}

/// Statistics across every (filtered) session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaudeStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_create_tokens: u64,
    pub total_tool_calls: u64,
    pub estimated_cost: f64,
    pub cost_by_model: BTreeMap<String, CostBreakdown>,
    pub total_hours_estimate: f64,
    pub hourly_activity: BTreeMap<u32, u64>,
    pub daily_activity: BTreeMap<String, u64>,
    pub model_usage: BTreeMap<String, ModelUsage>,
    pub project_stats: Vec<ProjectStat>,
    pub streak_stats: StreakStats,
    pub cache_efficiency: CacheEfficiency,
    pub tool_usage: BTreeMap<String, u64>,
    pub session_timeline: Vec<SessionTimelineEntry>,
    pub project_timeline: Vec<ProjectTimelineEntry>,
    pub generated_at: String,
}

/// Statistics for one canonical project
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetailStats {
    pub name: String,
    pub messages: u64,
    pub sessions: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_create_tokens: u64,
    pub estimated_cost: f64,
    pub cost_by_model: BTreeMap<String, CostBreakdown>,
    pub total_tool_calls: u64,
    pub total_hours_estimate: f64,
    pub hourly_activity: BTreeMap<u32, u64>,
    pub daily_activity: BTreeMap<String, u64>,
    pub model_usage: BTreeMap<String, ModelUsage>,
    pub session_history: Vec<SessionTimelineEntry>,
    pub generated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(project: &str, model: &str, first_active: &str) -> SessionData {
        SessionData {
            project: project.to_string(),
            primary_model: model.to_string(),
            first_active: first_active.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_event_schema_deserializes_assistant_reply() {
        let line = r#"{"type":"assistant","timestamp":"2026-03-10T10:00:00.000Z","cwd":"/Users/me/Code/app","gitBranch":"main","message":{"model":"claude-sonnet-4-6","usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":3},"content":[{"type":"text","text":"hi"},{"type":"tool_use","name":"Read","input":{"file_path":"/x"}},{"type":"thinking","thinking":"..."}]}}"#;
        let event: SessionEvent = serde_json::from_str(line).unwrap();

        assert_eq!(event.billable_model(), Some("claude-sonnet-4-6"));
        assert_eq!(event.git_branch.as_deref(), Some("main"));
        let message = event.message.unwrap();
        let usage = message.usage.unwrap();
        assert_eq!(usage.cache_read_input_tokens, Some(3));
        assert_eq!(usage.cache_creation_input_tokens, None);
        let blocks = message.content.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].tool_name(), Some("Read"));
        assert!(matches!(blocks[2], ContentBlock::Other));
    }

    #[test]
    fn test_odd_tool_use_fields_keep_the_block_list() {
        let line = r#"{"type":"assistant","message":{"model":"m","content":[{"type":"tool_use","name":7,"input":"raw"},{"type":"tool_use","name":"Bash","input":[1]},{"type":"text","text":null}]}}"#;
        let event: SessionEvent = serde_json::from_str(line).unwrap();
        let message = event.message.unwrap();
        let blocks = message.content.blocks();

        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[0], ContentBlock::ToolUse { .. }));
        assert_eq!(blocks[0].tool_name(), None);
        assert_eq!(blocks[1].tool_name(), Some("Bash"));
    }

    #[test]
    fn test_string_content_and_synthetic_model() {
        let line = r#"{"type":"assistant","message":{"model":"<synthetic>","content":"No response requested."}}"#;
        let event: SessionEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.billable_model(), None);
        assert!(matches!(event.message.unwrap().content, MessageContent::Text(_)));

        let user: SessionEvent =
            serde_json::from_str(r#"{"type":"user","message":{"model":"claude-sonnet-4-6"}}"#).unwrap();
        assert_eq!(user.billable_model(), None);
    }

    #[test]
    fn test_filters_date_bounds_are_inclusive() {
        let filters = StatsFilters::new()
            .with_date_range(Some("2026-03-01".to_string()), Some("2026-03-10".to_string()));

        assert!(filters.matches(&session("a", "m", "2026-03-01T00:00:00Z")));
        assert!(filters.matches(&session("a", "m", "2026-03-10T23:59:59Z")));
        assert!(!filters.matches(&session("a", "m", "2026-03-11T00:00:00Z")));
        assert!(!filters.matches(&session("a", "m", "")));
    }

    #[test]
    fn test_filters_project_and_model_are_case_insensitive() {
        let s = session("MyApp", "claude-sonnet-4-6", "2026-03-01T00:00:00Z");

        assert!(StatsFilters::new().with_project(Some("myapp".into())).matches(&s));
        assert!(!StatsFilters::new().with_project(Some("myap".into())).matches(&s));
        assert!(StatsFilters::new().with_model(Some("SONNET".into())).matches(&s));
        assert!(!StatsFilters::new().with_model(Some("opus".into())).matches(&s));
        // No date filter means sessions without timestamps still pass
        assert!(StatsFilters::new().matches(&session("x", "m", "")));
    }

    #[test]
    fn test_blank_filter_values_are_dropped() {
        let filters = StatsFilters::new()
            .with_project(Some(String::new()))
            .with_model(Some("opus".into()))
            .without_blanks();
        assert_eq!(filters.project, None);
        assert_eq!(filters.model.as_deref(), Some("opus"));
        assert!(StatsFilters::new().with_date_range(Some(String::new()), None).without_blanks().is_empty());
    }
}
