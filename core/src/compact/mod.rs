//! Context Compressor (spec §4.6): deterministic single-pass pruning of
//! an `ArticleContext` once its token count crosses a threshold.

pub mod scoring;

use std::time::Instant;

use chrono::Utc;
use writeflow_common::text::head_tail_summary;
use writeflow_common::text::key_sentences;
use writeflow_common::text::truncate_chars;
use writeflow_common::tokens::estimate_tokens;
use writeflow_common::tokens::estimate_tokens_json;
use writeflow_common::tokens::estimate_tokens_many;
use writeflow_protocol::ArticleContext;
use writeflow_protocol::CompressionEvent;

pub const DEFAULT_THRESHOLD: f64 = 0.92;
pub const DEFAULT_MAX_CONTEXT_TOKENS: f64 = 128_000.0;
pub const DEFAULT_PRESERVE_RATIO: f64 = 0.3;
pub const DEFAULT_MAX_RESEARCH_ITEMS: usize = 20;
pub const DEFAULT_MAX_DIALOGUE_HISTORY: usize = 50;
pub const DEFAULT_MAX_REFERENCE_ARTICLES: usize = 10;
pub const MAX_TOOL_USAGE_HISTORY: usize = 20;
const RESEARCH_SUMMARY_LEN: usize = 200;
const REFERENCE_BODY_LEN: usize = 500;
const REFERENCE_KEY_POINTS: usize = 5;
const RESEARCH_KEY_SENTENCES: usize = 3;

pub struct Compressor {
    pub threshold: f64,
    pub max_context_tokens: f64,
    pub preserve_ratio: f64,
    pub max_research_items: usize,
    pub max_dialogue_history: usize,
    pub max_reference_articles: usize,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            preserve_ratio: DEFAULT_PRESERVE_RATIO,
            max_research_items: DEFAULT_MAX_RESEARCH_ITEMS,
            max_dialogue_history: DEFAULT_MAX_DIALOGUE_HISTORY,
            max_reference_articles: DEFAULT_MAX_REFERENCE_ARTICLES,
        }
    }
}

impl Compressor {
    /// `tokens(context) ≥ threshold × maxContextTokens` (spec §4.6).
    pub fn should_compress(&self, ctx: &ArticleContext) -> bool {
        context_tokens(ctx) >= self.threshold * self.max_context_tokens
    }

    /// Runs the six-step pass in place and returns the resulting
    /// `CompressionEvent`. Core fields (current article, outline, goals,
    /// preferences) are never touched (invariant I4).
    pub fn compress(&self, ctx: &mut ArticleContext) -> CompressionEvent {
        let start = Instant::now();
        let original_tokens = context_tokens(ctx);
        let items_before =
            ctx.research_material.len() + ctx.dialogue_history.len() + ctx.reference_articles.len() + ctx.tool_usage_history.len();

        self.compress_research_material(&mut ctx.research_material);
        self.compress_dialogue_history(&mut ctx.dialogue_history);
        self.compress_reference_articles(&mut ctx.reference_articles);
        self.compress_tool_usage_history(&mut ctx.tool_usage_history);

        let items_after =
            ctx.research_material.len() + ctx.dialogue_history.len() + ctx.reference_articles.len() + ctx.tool_usage_history.len();

        let compressed_tokens = context_tokens(ctx);
        ctx.token_count = compressed_tokens;
        ctx.compression_level += 1;
        ctx.last_updated = Utc::now();

        CompressionEvent {
            original_tokens,
            compressed_tokens,
            ratio: if original_tokens > 0.0 { compressed_tokens / original_tokens } else { 1.0 },
            items_removed: (items_before - items_after) as u32,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn compress_research_material(&self, items: &mut Vec<writeflow_protocol::ResearchItem>) {
        let now = Utc::now();
        let max_reference_count = items.iter().map(|i| i.reference_count).max().unwrap_or(0);
        let max_body_len = items.iter().map(|i| i.body.chars().count()).max().unwrap_or(0);

        let keep = (items.len() as f64 * self.preserve_ratio).ceil() as usize;
        let keep = keep.min(self.max_research_items);

        let mut scored: Vec<(f64, usize)> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (scoring::research_item_score(item, now, max_reference_count, max_body_len), idx))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let keep_indices: std::collections::HashSet<usize> = scored.into_iter().take(keep).map(|(_, idx)| idx).collect();

        let mut idx = 0usize;
        items.retain(|_| {
            let keep = keep_indices.contains(&idx);
            idx += 1;
            keep
        });

        for item in items.iter_mut() {
            item.summary = Some(head_tail_summary(&item.body, RESEARCH_SUMMARY_LEN));
            item.key_sentences = key_sentences(&item.body, RESEARCH_KEY_SENTENCES);
        }
    }

    fn compress_dialogue_history(&self, messages: &mut Vec<writeflow_protocol::Message>) {
        let mut scored: Vec<(f64, writeflow_protocol::Message)> =
            messages.drain(..).map(|m| (scoring::dialogue_importance(&m), m)).collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
        });
        *messages = scored.into_iter().take(self.max_dialogue_history).map(|(_, m)| m).collect();
    }

    fn compress_reference_articles(&self, refs: &mut Vec<writeflow_protocol::Reference>) {
        refs.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));
        refs.truncate(self.max_reference_articles);
        for r in refs.iter_mut() {
            r.body = truncate_chars(&r.body, REFERENCE_BODY_LEN);
            r.key_points.truncate(REFERENCE_KEY_POINTS);
        }
    }

    fn compress_tool_usage_history(&self, usages: &mut Vec<writeflow_protocol::ToolUsage>) {
        usages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        usages.truncate(MAX_TOOL_USAGE_HISTORY);
        for u in usages.iter_mut() {
            u.detail = None;
        }
    }
}

/// Sums estimated tokens across the core fields and the four compressible
/// arrays (spec §4.6, "Token estimation … used everywhere tokens are
/// reported").
pub fn context_tokens(ctx: &ArticleContext) -> f64 {
    let core = [&ctx.current_article, &ctx.active_outline, &ctx.writing_goals, &ctx.user_preferences]
        .iter()
        .filter_map(|f| f.as_deref())
        .map(estimate_tokens)
        .sum::<f64>();

    let research: f64 = ctx.research_material.iter().map(|i| estimate_tokens(&i.body)).sum();
    let dialogue: f64 = ctx.dialogue_history.iter().map(|m| estimate_tokens_json(m.token_payload())).sum();
    let references: f64 = estimate_tokens_many(ctx.reference_articles.iter().map(|r| r.body.as_str()));
    let tools: f64 = ctx
        .tool_usage_history
        .iter()
        .map(|t| estimate_tokens(&t.summary) + t.detail.as_deref().map(estimate_tokens).unwrap_or(0.0))
        .sum();

    core + research + dialogue + references + tools
}
