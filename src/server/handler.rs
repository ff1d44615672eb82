use rmcp::{
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::{self, JsonSchema},
    tool, Error as McpError, ServerHandler,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::application::RagPipeline;
use crate::domain::{AnswerResult, Category};

/// Handler for the MCP server logic.
#[derive(Clone)]
pub struct FundReportHandler {
    pipeline: Arc<RagPipeline>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskArgs {
    #[schemars(description = "Question about the Fund Manager Reports")]
    pub question: String,
    #[schemars(description = "Optional fund category: All (default), Islamic or Conventional")]
    #[serde(default)]
    pub category: Option<String>,
}

/// Answer text followed by a bulleted `Sources:` list when the answer cites any.
pub fn render_answer(result: &AnswerResult) -> String {
    if result.sources.is_empty() {
        return result.answer.clone();
    }
    let bullets: Vec<String> = result.sources.iter().map(|s| format!("- {}", s)).collect();
    format!("{}\n\nSources:\n{}", result.answer, bullets.join("\n"))
}

#[tool(tool_box)]
impl FundReportHandler {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }

    #[tool(description = "Answer a question from the indexed Fund Manager Reports, citing the source documents.")]
    async fn ask_fund_reports(&self, #[tool(aggr)] args: AskArgs) -> Result<CallToolResult, McpError> {
        let category = match args.category.as_deref() {
            None => Category::All,
            Some(raw) => match raw.parse::<Category>() {
                Ok(category) => category,
                Err(e) => {
                    log::warn!("Rejected ask_fund_reports call: {}", e);
                    return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
                }
            },
        };

        let result = self.pipeline.answer(&args.question, category).await;
        log::debug!("Answer cites {} sources", result.sources.len());
        Ok(CallToolResult::success(vec![Content::text(render_answer(&result))]))
    }
}

#[tool(tool_box)]
impl ServerHandler for FundReportHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Answers questions about Islamic and Conventional funds using the December 2025 Fund Manager Reports."
                    .into(),
            ),
        }
    }
}
