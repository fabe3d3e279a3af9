//! Overview: a short narrative summary of the coarsest-level labels.

use bl_core::BlError;
use bl_llm::LlmGateway;
use tracing::warn;

use crate::config::Config;
use crate::context::Context;

pub fn run(ctx: &mut Context, config: &Config, gateway: &dyn LlmGateway) -> Result<(), BlError> {
    let coarsest = match ctx.cluster_results.sorted_levels().first() {
        Some(&level) => level,
        None => {
            ctx.overview = String::new();
            return Ok(());
        }
    };

    let count = ctx.cluster_results.cluster_count(coarsest);
    let bullets: Vec<String> = (0..count)
        .filter_map(|num| ctx.cluster_labels.get(&bl_core::cluster_id(coarsest, num)))
        .map(|label| format!("- {}: {}", label.label, label.description))
        .collect();

    match gateway.chat(&config.prompts.overview, &bullets.join("\n"), false) {
        Ok((content, usage)) => {
            ctx.overview = content.trim().to_string();
            ctx.add_usage(usage);
        }
        Err(err) => {
            warn!(error = %err, "overview call failed, storing empty overview");
            ctx.overview = String::new();
        }
    }
    Ok(())
}
