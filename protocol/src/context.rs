use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::message::Message;

/// A research note kept in `ArticleContext::research_material`. Fields are
/// exactly what the Context Compressor's scoring formula (spec §4.6 item 2)
/// reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub reference_count: u32,
    pub relevance_score: f64,
    /// Populated by the compressor; `None` until first compression pass.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_sentences: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub title: String,
    pub body: String,
    pub relevance_score: f64,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub summary: String,
    /// Raw body, dropped down to just the four summary fields above once
    /// the compressor's pass 5 runs (spec §4.6 item 5).
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionEvent {
    pub original_tokens: f64,
    pub compressed_tokens: f64,
    pub ratio: f64,
    pub items_removed: u32,
    pub duration_ms: u64,
}

/// The compressible workspace (spec §3, ArticleContext). `current_article`,
/// `active_outline`, `writing_goals`, and `user_preferences` are the core
/// fields the compressor must never alter (invariant I4/P5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleContext {
    pub current_article: Option<String>,
    pub active_outline: Option<String>,
    pub writing_goals: Option<String>,
    pub user_preferences: Option<String>,

    pub research_material: Vec<ResearchItem>,
    pub dialogue_history: Vec<Message>,
    pub reference_articles: Vec<Reference>,
    pub tool_usage_history: Vec<ToolUsage>,

    pub token_count: f64,
    pub compression_level: u32,
    pub last_updated: DateTime<Utc>,
}

impl ArticleContext {
    pub fn new() -> Self {
        Self {
            last_updated: Utc::now(),
            ..Default::default()
        }
    }

    /// The four fields invariant I4/P5 require untouched by compression.
    pub fn core_fields(&self) -> (&Option<String>, &Option<String>, &Option<String>, &Option<String>) {
        (
            &self.current_article,
            &self.active_outline,
            &self.writing_goals,
            &self.user_preferences,
        )
    }
}
