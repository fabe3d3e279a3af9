//! Initial labelling: one label per finest-level cluster from a sample of
//! its member arguments.

use std::sync::Mutex;

use bl_core::{BlError, ClusterLabel, ErrorInfo, TokenUsage};
use bl_llm::{parse_label_payload, LlmGateway};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::warn;

use crate::config::Config;
use crate::context::Context;
use crate::progress::Progress;
use crate::stages::worker_pool;

const SAMPLE_CAP: usize = 30;

pub fn run(
    ctx: &mut Context,
    config: &Config,
    gateway: &dyn LlmGateway,
    progress: &dyn Progress,
) -> Result<(), BlError> {
    let finest = ctx.cluster_results.finest_level().ok_or_else(|| {
        BlError::Stage(ErrorInfo::new(
            "labelling-no-clusters",
            "initial labelling requires clustering results",
        ))
    })?;
    let assignments = ctx.cluster_results.level(finest).unwrap_or(&[]);
    let count = ctx.cluster_results.cluster_count(finest);

    let mut member_texts: Vec<Vec<String>> = vec![Vec::new(); count];
    for (idx, &cluster) in assignments.iter().enumerate() {
        member_texts[cluster].push(ctx.arguments[idx].argument.clone());
    }

    let processed = Mutex::new(0usize);
    let pool = worker_pool(config.workers)?;
    let mut labelled: Vec<(usize, ClusterLabel, TokenUsage)> = pool.install(|| {
        member_texts
            .par_iter()
            .enumerate()
            .map(|(num, texts)| {
                let joined = sample_texts(texts, SAMPLE_CAP).join("\n");
                let (label, description, usage) =
                    label_cluster(gateway, &config.prompts.initial_labelling, &joined, num);
                if let Ok(mut done) = processed.lock() {
                    *done += 1;
                    progress.notify_progress("initial_labelling", *done, count);
                }
                (
                    num,
                    ClusterLabel {
                        cluster_id: bl_core::cluster_id(finest, num),
                        level: finest,
                        label,
                        description,
                    },
                    usage,
                )
            })
            .collect()
    });
    labelled.sort_by_key(|(num, ..)| *num);

    let mut usage_total = TokenUsage::zero();
    for (_, label, usage) in labelled {
        usage_total += usage;
        ctx.cluster_labels.insert(label.cluster_id.clone(), label);
    }
    ctx.add_usage(usage_total);
    Ok(())
}

/// Asks the gateway for `{label, description}`; any failure falls back to
/// the numbered default.
pub(crate) fn label_cluster(
    gateway: &dyn LlmGateway,
    prompt: &str,
    body: &str,
    num: usize,
) -> (String, String, TokenUsage) {
    match gateway.chat(prompt, body, true) {
        Ok((content, usage)) => match parse_label_payload(&content) {
            Some((label, description)) => (label, description, usage),
            None => {
                warn!(cluster = num, "unparseable label payload, using default");
                (format!("グループ{num}"), String::new(), usage)
            }
        },
        Err(err) => {
            warn!(cluster = num, error = %err, "labelling call failed, using default");
            (format!("グループ{num}"), String::new(), TokenUsage::zero())
        }
    }
}

/// Samples up to `cap` member texts without replacement. Clusters at or
/// below the cap pass through untouched, so the process RNG only influences
/// oversized clusters.
fn sample_texts(texts: &[String], cap: usize) -> Vec<String> {
    if texts.len() <= cap {
        return texts.to_vec();
    }
    let mut rng = StdRng::from_entropy();
    texts
        .choose_multiple(&mut rng, cap)
        .cloned()
        .collect()
}
