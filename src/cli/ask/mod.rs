//! Ask command - answers one query from the command line

use clap::Args;
use tracing::info;

use crate::PipelineContext;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Query text
    pub text: String,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let context = PipelineContext::build(&config).await?;
    context.load_index().await?;

    let result = context.pipeline.process(&args.text).await?;
    info!(
        decision = %result.judge_decision.decision.as_str(),
        processing_time_ms = result.processing_time_ms,
        "Query answered"
    );

    let output = if args.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", output);

    Ok(())
}
