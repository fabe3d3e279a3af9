//! Embedding: batched embed calls, vectors stored in argument order.

use bl_core::{BlError, ErrorInfo};
use bl_llm::LlmGateway;
use tracing::debug;

use crate::context::Context;
use crate::progress::Progress;

const BATCH_SIZE: usize = 1000;

pub fn run(
    ctx: &mut Context,
    gateway: &dyn LlmGateway,
    progress: &dyn Progress,
) -> Result<(), BlError> {
    let texts: Vec<String> = ctx
        .arguments
        .iter()
        .map(|arg| arg.argument.clone())
        .collect();
    let total = texts.len();

    let mut vectors: Vec<Vec<f64>> = Vec::with_capacity(total);
    for batch in texts.chunks(BATCH_SIZE) {
        let embedded = gateway.embed(batch)?;
        vectors.extend(embedded);
        progress.notify_progress("embedding", vectors.len(), total);
    }

    if vectors.len() != total {
        return Err(BlError::Stage(
            ErrorInfo::new("embedding-count", "embedding count does not match argument count")
                .with_context("expected", total.to_string())
                .with_context("received", vectors.len().to_string()),
        ));
    }

    for (argument, vector) in ctx.arguments.iter_mut().zip(vectors) {
        argument.embedding = vector;
    }
    debug!(arguments = total, "embedding complete");
    Ok(())
}
