use clap::Args;

use super::LlmArgs;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Transport type: stdio
    #[arg(long, default_value = "stdio")]
    pub transport: String,

    #[command(flatten)]
    pub llm: LlmArgs,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.llm.load_config()?;
    let provider = args.llm.provider(&config)?;

    match args.transport.as_str() {
        "stdio" => {
            docsift_mcp::serve_stdio(config, provider)
                .await
                .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
        }
        other => {
            anyhow::bail!("Unsupported transport: {other}. Supported: stdio");
        }
    }

    Ok(())
}
