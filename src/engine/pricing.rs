//! Token estimation and dollar accounting for provider calls.

use crate::provider::TokenUsage;

/// Per-1K-token rates for one chat model family, matched by substring.
#[derive(Debug, Clone, Copy)]
pub struct ModelRate {
    pub name_fragment: &'static str,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Chat pricing, first substring match wins. "gpt-4o-mini" must stay
/// ahead of "gpt-4o" or the mini models would bill at full rates.
/// The first entry doubles as the fallback for unknown model names.
/// Data, not code. New models = new entries.
pub const CHAT_RATES: &[ModelRate] = &[
    ModelRate {
        name_fragment: "gpt-4o-mini",
        input_per_1k: 0.000_15,
        output_per_1k: 0.000_6,
    },
    ModelRate {
        name_fragment: "gpt-4o",
        input_per_1k: 0.002_5,
        output_per_1k: 0.01,
    },
    ModelRate {
        name_fragment: "gpt-3.5",
        input_per_1k: 0.000_5,
        output_per_1k: 0.001_5,
    },
];

/// text-embedding-3-small, per 1K tokens.
pub const EMBEDDING_PRICE_PER_1K: f64 = 0.000_02;

/// Look up the rate pair for a model name.
pub fn rate_for_model(model: &str) -> &'static ModelRate {
    CHAT_RATES
        .iter()
        .find(|rate| model.contains(rate.name_fragment))
        .unwrap_or(&CHAT_RATES[0])
}

/// Approximate token count for cost display, roughly four characters
/// per token. Not suitable for truncation or context-window budgeting.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(4) as u32
}

/// Dollar cost of one embedding call.
pub fn embedding_cost(tokens: u32) -> f64 {
    f64::from(tokens) / 1000.0 * EMBEDDING_PRICE_PER_1K
}

/// Dollar cost of accumulated chat tokens under a model's rates.
pub fn chat_cost(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    let rate = rate_for_model(model);
    f64::from(prompt_tokens) / 1000.0 * rate.input_per_1k
        + f64::from(completion_tokens) / 1000.0 * rate.output_per_1k
}

/// Round to 8 decimal places for stable display.
pub fn round_cost(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

/// Running totals for one question. Created per request, finalized once
/// into a [`CostBreakdown`], then discarded.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    pub search_tokens: u32,
    pub search_cost: f64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl CostLedger {
    /// Record one embedding call, initial or tool-triggered.
    pub fn record_search(&mut self, tokens: u32, cost: f64) {
        self.search_tokens += tokens;
        self.search_cost += cost;
    }

    /// Record the usage one chat turn reported.
    pub fn record_chat(&mut self, usage: TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
    }

    /// Convert the totals into dollar figures under the given model.
    pub fn finalize(&self, model: &str) -> CostBreakdown {
        let completion_cost = chat_cost(model, self.prompt_tokens, self.completion_tokens);
        CostBreakdown {
            search_tokens: self.search_tokens,
            search_cost: round_cost(self.search_cost),
            completion_tokens: self.prompt_tokens + self.completion_tokens,
            completion_cost: round_cost(completion_cost),
            total_cost: round_cost(self.search_cost + completion_cost),
        }
    }
}

/// Final dollar figures for one answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub search_tokens: u32,
    pub search_cost: f64,
    /// Chat tokens across all turns, prompt and output combined.
    pub completion_tokens: u32,
    pub completion_cost: f64,
    pub total_cost: f64,
}
