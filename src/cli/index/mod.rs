//! Index command - re-embeds the knowledge base and persists the index

use std::time::Instant;

use tracing::info;

use crate::PipelineContext;

pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let start = Instant::now();

    let context = PipelineContext::build(&config).await?;
    let entries = context.rebuild_index().await?;

    info!(
        entries,
        index_dir = %config.knowledge.index_dir,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Vector index rebuilt"
    );
    println!("Indexed {} entries into {}", entries, config.knowledge.index_dir);

    Ok(())
}
