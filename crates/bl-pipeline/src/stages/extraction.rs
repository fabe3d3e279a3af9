//! Extraction: one LLM call per non-empty comment, opinions become arguments.

use std::sync::Mutex;

use bl_core::{Argument, BlError, Comment, Relation, TokenUsage};
use bl_llm::{parse_opinion_list, LlmGateway};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::Config;
use crate::context::Context;
use crate::progress::Progress;
use crate::stages::worker_pool;

pub fn run(
    ctx: &mut Context,
    config: &Config,
    gateway: &dyn LlmGateway,
    progress: &dyn Progress,
) -> Result<(), BlError> {
    let selected: Vec<Comment> = {
        let window: &[Comment] = if config.limit > 0 && config.limit < ctx.comments.len() {
            &ctx.comments[..config.limit]
        } else {
            &ctx.comments
        };
        window.iter().filter(|c| !c.is_empty()).cloned().collect()
    };

    let total = selected.len();
    let processed = Mutex::new(0usize);
    let pool = worker_pool(config.workers)?;

    // One result slot per comment; collected out of order, reassembled by
    // index so argument ids stay deterministic.
    let mut outcomes: Vec<(usize, Vec<String>, TokenUsage)> = pool.install(|| {
        selected
            .par_iter()
            .enumerate()
            .map(|(index, comment)| {
                let (opinions, usage) =
                    match gateway.chat(&config.prompts.extraction, &comment.body, true) {
                        Ok((content, usage)) => (parse_opinion_list(&content), usage),
                        Err(err) => {
                            warn!(comment_id = %comment.id, error = %err, "extraction failed, comment yields no arguments");
                            (Vec::new(), TokenUsage::zero())
                        }
                    };
                if let Ok(mut count) = processed.lock() {
                    *count += 1;
                    progress.notify_progress("extraction", *count, total);
                }
                (index, opinions, usage)
            })
            .collect()
    });
    outcomes.sort_by_key(|(index, ..)| *index);

    let mut arguments = Vec::new();
    let mut relations = Vec::new();
    let mut usage_total = TokenUsage::zero();
    for (index, opinions, usage) in outcomes {
        let comment = &selected[index];
        for (opinion_index, text) in opinions.iter().enumerate() {
            let argument = Argument::extracted(comment, opinion_index, text.as_str());
            relations.push(Relation {
                arg_id: argument.arg_id.clone(),
                comment_id: comment.id.clone(),
            });
            arguments.push(argument);
        }
        usage_total += usage;
    }

    debug!(
        comments = total,
        arguments = arguments.len(),
        "extraction complete"
    );
    ctx.arguments = arguments;
    ctx.relations = relations;
    ctx.add_usage(usage_total);
    Ok(())
}
