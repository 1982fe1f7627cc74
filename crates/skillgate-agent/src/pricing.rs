//! Per-model token prices used to report `total_cost_usd`.

use skillgate_core::Usage;
use tracing::debug;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pricing {
    input: f64,
    output: f64,
}

impl Pricing {
    const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    // Cache writes cost 1.25x input, cache reads 0.1x.
    fn cost(&self, usage: &Usage) -> f64 {
        let per_token = |price: f64, tokens: u64| price * tokens as f64 / 1_000_000.0;

        per_token(self.input, usage.input_tokens)
            + per_token(self.output, usage.output_tokens)
            + per_token(self.input * 1.25, usage.cache_creation_input_tokens.unwrap_or(0))
            + per_token(self.input * 0.1, usage.cache_read_input_tokens.unwrap_or(0))
    }
}

fn pricing_for(model: &str) -> Option<Pricing> {
    let model = model.to_ascii_lowercase();
    let price = if model.contains("opus-4-5") || model.contains("opus-4-6") {
        Pricing::new(5.0, 25.0)
    } else if model.contains("opus") {
        Pricing::new(15.0, 75.0)
    } else if model.contains("sonnet") {
        Pricing::new(3.0, 15.0)
    } else if model.contains("haiku-4") {
        Pricing::new(1.0, 5.0)
    } else if model.contains("haiku-3-5") {
        Pricing::new(0.8, 4.0)
    } else if model.contains("haiku") {
        Pricing::new(0.25, 1.25)
    } else {
        return None;
    };
    Some(price)
}

/// Estimated cost of a run; unknown models cost nothing.
pub fn cost_usd(model: &str, usage: &Usage) -> f64 {
    match pricing_for(model) {
        Some(pricing) => pricing.cost(usage),
        None => {
            debug!("No pricing for model {}, reporting zero cost", model);
            0.0
        }
    }
}
