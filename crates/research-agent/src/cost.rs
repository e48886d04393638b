//! LLM spend estimation.

use crate::ai::TokenUsage;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Input (prompt) tokens.
    pub input: f64,
    /// Output (completion) tokens.
    pub output: f64,
}

/// Known prices, most specific name first.
const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    ("gemini-1.5-flash-8b", ModelPricing { input: 0.0375, output: 0.15 }),
    ("gemini-1.5-flash", ModelPricing { input: 0.075, output: 0.30 }),
    ("gemini-1.5-pro", ModelPricing { input: 1.25, output: 5.0 }),
    ("gemini-2.0-flash", ModelPricing { input: 0.10, output: 0.40 }),
    ("gemini-2.5-flash", ModelPricing { input: 0.30, output: 2.50 }),
    ("gemini-2.5-pro", ModelPricing { input: 1.25, output: 10.0 }),
    ("opus", ModelPricing { input: 15.0, output: 75.0 }),
    ("sonnet", ModelPricing { input: 3.0, output: 15.0 }),
    ("haiku", ModelPricing { input: 0.80, output: 4.0 }),
];

/// Pricing for a model, matched by name substring.
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model.contains(name))
        .map(|(_, pricing)| *pricing)
}

/// Estimated USD for `usage` on `model`; zero for unknown models.
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let Some(pricing) = get_model_pricing(model) else {
        tracing::debug!(model, "No pricing for model, reporting zero cost");
        return 0.0;
    };

    (f64::from(usage.input_tokens) * pricing.input
        + f64::from(usage.output_tokens) * pricing.output)
        / 1_000_000.0
}
