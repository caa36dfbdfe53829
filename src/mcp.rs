use std::sync::{Arc, OnceLock};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    data_dir::{DataDir, DocRoots},
    doc_index::DocIndex,
    docs,
    engine::QueryEngine,
    error::{self, Error},
    error_store::{ErrorStore, NewError},
    formatter::{self, Mode},
    report,
};

const DEFAULT_ERROR_LIMIT: usize = 10;

struct HelpState {
    store: ErrorStore,
    roots: DocRoots,
    index: OnceLock<std::result::Result<DocIndex, String>>,
}

impl HelpState {
    fn new(store: ErrorStore, roots: DocRoots) -> Self {
        Self {
            store,
            roots,
            index: OnceLock::new(),
        }
    }

    /// The documentation index, built on first use.
    fn index(&self) -> error::Result<&DocIndex> {
        self.index
            .get_or_init(|| {
                DocIndex::build(&self.roots).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|e| Error::IndexUnavailable(e.clone()))
    }
}

#[derive(Clone)]
pub struct HelpMcpServer {
    state: Arc<HelpState>,
    tool_router: ToolRouter<Self>,
}

impl HelpMcpServer {
    fn new(state: Arc<HelpState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl HelpMcpServer {
    /// Answer an error message, function name or question in one step.
    #[tool(
        name = "smart_query",
        description = "Recommended. Give an error message (e.g. \"error 256: undeclared identifier ResultCode\"), a function or class name (e.g. \"OrderSend\", \"CTrade\") or a question (e.g. \"how to send order\") and get a condensed answer. Known errors are answered from the local error database."
    )]
    pub async fn smart_query(
        &self,
        params: Parameters<SmartQueryParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let mode = params.mode.unwrap_or_default();

        let result = self.state.index().and_then(|index| {
            QueryEngine::new(index, &self.state.store).query(&params.query, mode)
        });
        let result = match result {
            Ok(result) => result,
            Err(e) => return Ok(tool_error(e)),
        };

        let text = formatter::render_text(&result, &params.query);
        Ok(tool_ok(text, serde_json::to_value(&result).ok()))
    }

    #[tool(
        name = "search",
        description = "Search the documentation by function name, class name or keyword. Returns document names; use get to read one, or smart_query for a direct answer."
    )]
    pub async fn search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let index = match self.state.index() {
            Ok(index) => index,
            Err(e) => return Ok(tool_error(e)),
        };

        let limit = params.limit.unwrap_or(docs::DEFAULT_SEARCH_LIMIT);
        let search = docs::search_docs(index, &params.query, limit);
        Ok(tool_ok(search.render(), serde_json::to_value(&search).ok()))
    }

    #[tool(
        name = "get",
        description = "Read one documentation page by name (extension optional). HTML pages are returned as plain text."
    )]
    pub async fn get(
        &self,
        params: Parameters<GetParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let text = self
            .state
            .index()
            .and_then(|index| docs::get_doc(index, &params.0.filename));
        Ok(match text {
            Ok(text) => tool_ok(text, None),
            Err(e) => tool_error(e),
        })
    }

    #[tool(
        name = "browse",
        description = "Browse documentation categories: trading, indicators, math, array, string, datetime, files, chart, objects, onnx."
    )]
    pub async fn browse(
        &self,
        params: Parameters<BrowseParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let text = docs::browse_categories(params.0.category.as_deref());
        Ok(tool_ok(text, None))
    }

    #[tool(
        name = "log_error",
        description = "Record a compiler error, optionally with its fix, in the local error database so the next occurrence can be answered directly."
    )]
    pub async fn log_error(
        &self,
        params: Parameters<LogErrorParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let new = NewError {
            error_code: params.error_code,
            error_message: params.error_message,
            file_path: params.file_path,
            solution: params.solution,
            related_docs: params.related_docs,
        };

        let record = match self.state.store.add_error(new) {
            Ok(record) => record,
            Err(e) => return Ok(tool_error(e)),
        };
        tracing::info!(
            code = %record.error_code,
            occurrences = record.occurrence_count,
            "error logged"
        );

        let location = self.state.store.path().display().to_string();
        let text = report::render_logged(&record, &location);
        Ok(tool_ok(text, serde_json::to_value(&record).ok()))
    }

    #[tool(
        name = "list_common_errors",
        description = "List the most frequent compiler errors in the local error database."
    )]
    pub async fn list_common_errors(
        &self,
        params: Parameters<ListErrorsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let limit = params.0.limit.unwrap_or(DEFAULT_ERROR_LIMIT);
        let store = &self.state.store;

        let listed = store
            .list_common_errors(limit)
            .and_then(|records| Ok((records, store.stats()?)));
        Ok(match listed {
            Ok((records, stats)) => {
                let text = report::render_common(&records, &stats);
                tool_ok(text, serde_json::to_value(&records).ok())
            }
            Err(e) => tool_error(e),
        })
    }

    #[tool(
        name = "manage_error_db",
        description = "Export the error database as JSON (optionally without file paths), import a JSON export, or show statistics."
    )]
    pub async fn manage_error_db(
        &self,
        params: Parameters<ManageParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let store = &self.state.store;

        let outcome = match params.action {
            DbAction::Export => {
                let anonymize = params.anonymize.unwrap_or(false);
                store
                    .export_errors(anonymize)
                    .map(|json| report::render_export(&json, anonymize))
            }
            DbAction::Import => {
                let Some(data) = params.data else {
                    return Ok(tool_error(
                        "import requires the data parameter (a JSON array)",
                    ));
                };
                store.import_errors(&data).and_then(|summary| {
                    Ok(report::render_import(&summary, &store.stats()?))
                })
            }
            DbAction::Stats => store.stats().map(|s| report::render_stats(&s)),
        };

        Ok(match outcome {
            Ok(text) => tool_ok(text, None),
            Err(e) => tool_error(e),
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for HelpMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation::new("mqlhelp", env!("CARGO_PKG_VERSION"))
            .with_title("MQL5 help");
        info.instructions = Some(
            "Use smart_query first. Use search and get to read full pages, and log_error to remember fixes for compiler errors."
                .to_string(),
        );
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SmartQueryParams {
    /// Error message, function or class name, or a question.
    pub query: String,
    /// "quick" (~500 tokens, default) or "detailed" (~1500 tokens).
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Keyword or error text.
    pub query: String,
    /// Maximum number of results (default: 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetParams {
    /// Document name, extension optional.
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BrowseParams {
    /// Category name. Omit to list all categories.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogErrorParams {
    /// Compiler error code, e.g. E512.
    pub error_code: String,
    /// Full error message.
    pub error_message: String,
    /// Source file the error came from.
    pub file_path: Option<String>,
    /// How the error was fixed.
    pub solution: Option<String>,
    /// Related document names as a JSON array.
    pub related_docs: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListErrorsParams {
    /// Number of errors to list (default: 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbAction {
    Export,
    Import,
    Stats,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageParams {
    pub action: DbAction,
    /// JSON array to import (required for import).
    pub data: Option<String>,
    /// Drop file paths from the export (default: false).
    pub anonymize: Option<bool>,
}

fn tool_ok(text: String, structured: Option<serde_json::Value>) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(text)]);
    result.structured_content = structured;
    result
}

fn tool_error(error: impl std::fmt::Display) -> CallToolResult {
    tracing::warn!(error = %error, "tool call failed");
    CallToolResult::error(vec![Content::text(format!("Error: {error}"))])
}

pub fn run_mcp(data_dir: &DataDir, roots: DocRoots) -> error::Result<()> {
    let store = ErrorStore::new(data_dir.errors_db());
    // Open eagerly so a broken store fails startup.
    let stats = store.stats()?;
    tracing::info!(docs = %roots.describe(), "documentation roots");
    tracing::info!(
        records = stats.total_errors,
        path = %stats.store_location,
        "error store ready"
    );

    let state = Arc::new(HelpState::new(store, roots));
    let server = HelpMcpServer::new(Arc::clone(&state));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    let served = runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        tracing::info!("MCP server ready");
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    });

    state.store.close()?;
    tracing::info!("MCP server stopped");
    served
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    fn test_server() -> (tempfile::TempDir, HelpMcpServer) {
        let tmp = tempfile::tempdir().unwrap();
        let help = tmp.path().join("docs/MQL5_HELP");
        fs::create_dir_all(&help).unwrap();
        fs::write(
            help.join("ordersend.htm"),
            "<p>Sends trade requests to a server.</p><p>bool OrderSend(MqlTradeRequest& request)</p>",
        )
        .unwrap();

        let store = ErrorStore::new(tmp.path().join("errors.redb"));
        let roots = DocRoots::under(&tmp.path().join("docs"));
        let server = HelpMcpServer::new(Arc::new(HelpState::new(store, roots)));
        (tmp, server)
    }

    #[tokio::test]
    async fn smart_query_returns_text_and_structure() {
        let (_tmp, server) = test_server();

        let result = server
            .smart_query(Parameters(SmartQueryParams {
                query: "OrderSend".into(),
                mode: None,
            }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(false));
        let structured = result.structured_content.clone().expect("structured");
        assert_eq!(structured["mode"], "quick");
        assert_eq!(structured["reference"], "ordersend.htm");
        assert!(text_of(&result).contains("Answer:\nbool OrderSend"));
    }

    #[tokio::test]
    async fn logged_errors_answer_later_queries() {
        let (_tmp, server) = test_server();

        for _ in 0..2 {
            server
                .log_error(Parameters(LogErrorParams {
                    error_code: "E512".into(),
                    error_message: "undeclared identifier 'ResultCode'".into(),
                    file_path: None,
                    solution: Some("Use ResultRetcode()".into()),
                    related_docs: None,
                }))
                .await
                .unwrap();
        }

        let listed = server
            .list_common_errors(Parameters(ListErrorsParams { limit: None }))
            .await
            .unwrap();
        assert!(text_of(&listed).contains("occurrences: 2"));

        let answer = server
            .smart_query(Parameters(SmartQueryParams {
                query: "E512: undeclared identifier 'ResultCode'".into(),
                mode: Some(Mode::Quick),
            }))
            .await
            .unwrap();
        let structured = answer.structured_content.as_ref().expect("structured");
        assert_eq!(structured["reference"], "error database");
        assert!(text_of(&answer).contains("Use ResultRetcode()"));
    }

    #[tokio::test]
    async fn import_faults_are_tool_errors() {
        let (_tmp, server) = test_server();

        let missing = server
            .manage_error_db(Parameters(ManageParams {
                action: DbAction::Import,
                data: None,
                anonymize: None,
            }))
            .await
            .unwrap();
        assert_eq!(missing.is_error, Some(true));

        let malformed = server
            .manage_error_db(Parameters(ManageParams {
                action: DbAction::Import,
                data: Some("{not json".into()),
                anonymize: None,
            }))
            .await
            .unwrap();
        assert_eq!(malformed.is_error, Some(true));
        assert!(text_of(&malformed).starts_with("Error: failed to parse import payload"));

        let stats = server
            .manage_error_db(Parameters(ManageParams {
                action: DbAction::Stats,
                data: None,
                anonymize: None,
            }))
            .await
            .unwrap();
        assert!(text_of(&stats).contains("distinct errors: 0"));
    }

    #[tokio::test]
    async fn browse_and_get() {
        let (_tmp, server) = test_server();

        let browse = server
            .browse(Parameters(BrowseParams {
                category: Some("math".into()),
            }))
            .await
            .unwrap();
        assert!(text_of(&browse).contains("mathabs.htm"));

        let page = server
            .get(Parameters(GetParams {
                filename: "ordersend".into(),
            }))
            .await
            .unwrap();
        assert!(text_of(&page).contains("Sends trade requests to a server."));
    }
}
