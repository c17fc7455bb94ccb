//! Pricing calculation for Claude models

use serde::{Deserialize, Serialize};

/// Pricing per million tokens (USD)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_creation: f64,
    pub cache_read: f64,
}

impl ModelPricing {
    pub const fn new(input: f64, output: f64, cache_creation: f64, cache_read: f64) -> Self {
        Self {
            input,
            output,
            cache_creation,
            cache_read,
        }
    }
}

/// Sonnet tier, used for unknown models and as the cache-savings baseline
pub const SONNET_PRICING: ModelPricing = ModelPricing::new(3.0, 15.0, 3.75, 0.30);
const OPUS_PRICING: ModelPricing = ModelPricing::new(15.0, 75.0, 18.75, 1.50);
const HAIKU_PRICING: ModelPricing = ModelPricing::new(0.80, 4.0, 1.0, 0.08);

/// Dollar cost of a token bundle, split by tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub cache_read_cost: f64,
    pub cache_write_cost: f64,
    pub total_cost: f64,
}

impl CostBreakdown {
    pub fn add(&mut self, other: &CostBreakdown) {
        self.input_cost += other.input_cost;
        self.output_cost += other.output_cost;
        self.cache_read_cost += other.cache_read_cost;
        self.cache_write_cost += other.cache_write_cost;
        self.total_cost += other.total_cost;
    }
}

/// Calculator for API costs based on token usage
pub struct PricingCalculator {
    /// Lookup order matters for prefix matching
    pricing: Vec<(&'static str, ModelPricing)>,
    default_pricing: ModelPricing,
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingCalculator {
    pub fn new() -> Self {
        let pricing = vec![
            ("claude-opus-4-6", OPUS_PRICING),
            ("claude-sonnet-4-6", SONNET_PRICING),
            ("claude-sonnet-4-20250514", SONNET_PRICING),
            ("claude-3-5-sonnet-20241022", SONNET_PRICING),
            ("claude-3-5-haiku-20241022", HAIKU_PRICING),
            ("claude-haiku-4-5-20251001", HAIKU_PRICING),
        ];

        Self {
            pricing,
            default_pricing: SONNET_PRICING,
        }
    }

    /// Get pricing for a model: exact id, then family prefix, then Sonnet
    pub fn get_pricing(&self, model: &str) -> &ModelPricing {
        if let Some((_, pricing)) = self.pricing.iter().find(|(key, _)| *key == model) {
            return pricing;
        }

        self.pricing
            .iter()
            .find(|(key, _)| model.starts_with(&family_prefix(key)))
            .map(|(_, pricing)| pricing)
            .unwrap_or(&self.default_pricing)
    }

    /// Estimate cost for token usage.
    ///
    /// Cache token counts are fractional because a session's cache usage is
    /// split across its models by message share.
    pub fn estimate_cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: f64,
        cache_create_tokens: f64,
    ) -> CostBreakdown {
        let pricing = self.get_pricing(model);

        let input_cost = (input_tokens as f64 / 1_000_000.0) * pricing.input;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * pricing.output;
        let cache_read_cost = (cache_read_tokens / 1_000_000.0) * pricing.cache_read;
        let cache_write_cost = (cache_create_tokens / 1_000_000.0) * pricing.cache_creation;

        CostBreakdown {
            input_cost,
            output_cost,
            cache_read_cost,
            cache_write_cost,
            total_cost: input_cost + output_cost + cache_read_cost + cache_write_cost,
        }
    }
}

/// First three dash-separated segments, e.g. `claude-sonnet-4`
fn family_prefix(model: &str) -> String {
    model.split('-').take(3).collect::<Vec<_>>().join("-")
}

/// Format a dollar amount for display
pub fn format_cost(dollars: f64) -> String {
    if dollars < 0.01 {
        return "<$0.01".to_string();
    }
    format!("${:.2}", dollars)
}
