//! Per-model token prices.

use std::collections::BTreeMap;

use crate::config::{default_pricing, ModelPrice};

/// Model family used when a deployment name matches nothing known.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// USD per 1K tokens, keyed by model family.
#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    prices: BTreeMap<String, ModelPrice>,
}

impl Default for Pricing {
    fn default() -> Self {
        Self::new(default_pricing())
    }
}

impl Pricing {
    pub fn new(prices: BTreeMap<String, ModelPrice>) -> Self {
        Self { prices }
    }

    /// Price for a deployment or model name, falling back to [`DEFAULT_MODEL`].
    pub fn price_for(&self, model: &str) -> ModelPrice {
        let family = normalize_model(model);
        self.prices
            .get(family)
            .or_else(|| self.prices.get(DEFAULT_MODEL))
            .copied()
            .unwrap_or(ModelPrice { input: 0.0, output: 0.0 })
    }

    /// Estimated USD cost of one call.
    pub fn calculate_cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let price = self.price_for(model);
        f64::from(prompt_tokens) / 1000.0 * price.input
            + f64::from(completion_tokens) / 1000.0 * price.output
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ModelPrice)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Map a deployment name onto a model family by substring, most specific first.
pub fn normalize_model(model: &str) -> &'static str {
    let lower = model.to_lowercase();
    if lower.contains("gpt-4o-mini") {
        "gpt-4o-mini"
    } else if lower.contains("gpt-4o") {
        "gpt-4o"
    } else if lower.contains("gpt-4") {
        "gpt-4"
    } else if lower.contains("gpt-35") || lower.contains("gpt-3.5") {
        "gpt-35-turbo"
    } else {
        DEFAULT_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_names_normalize_by_substring() {
        assert_eq!(normalize_model("my-gpt-4o-mini-deploy"), "gpt-4o-mini");
        assert_eq!(normalize_model("GPT-4o"), "gpt-4o");
        assert_eq!(normalize_model("gpt-4-32k"), "gpt-4");
        assert_eq!(normalize_model("gpt-3.5-turbo"), "gpt-35-turbo");
        assert_eq!(normalize_model("mystery"), "gpt-4o");
    }

    #[test]
    fn cost_uses_per_thousand_prices() {
        let pricing = Pricing::default();
        let cost = pricing.calculate_cost("gpt-4o", 1000, 500);
        assert!((cost - (0.03 + 0.03)).abs() < 1e-9);

        let mini = pricing.calculate_cost("gpt-4o-mini", 2000, 1000);
        assert!((mini - (0.003 + 0.006)).abs() < 1e-9);
    }

    #[test]
    fn unknown_family_falls_back_to_default_price() {
        let pricing = Pricing::default();
        assert_eq!(pricing.price_for("claude"), pricing.price_for("gpt-4o"));
    }
}
