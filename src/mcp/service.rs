//! MCP service implementation using rmcp.
//!
//! Tools are served from the operation catalog rather than a macro-generated
//! router: every call is forwarded to the [`OperationGateway`] and the result
//! envelope comes back as pretty-printed JSON text.

use crate::gateway::OperationGateway;
use crate::tools::Operation;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use tracing::debug;

const INSTRUCTIONS: &str = "PostgreSQL administration tools.\n\
\n\
## Result shape\n\
Every tool returns a JSON object with `success`, and either `error` or the tool's data \
(often with a `message`).\n\
\n\
## Parameters\n\
- `execute_query`, `update_data` and `delete_data` accept `%s` placeholders bound from \
`params` / `where_params`. Use `%%` for a literal percent sign.\n\
- Strings bind as text: cast them in SQL for other column types, e.g. `%s::date`.\n\
- Table, column and index names must be plain identifiers; `schema` defaults to `public`.\n\
\n\
## Transactions\n\
Each call runs in its own transaction and is rolled back on error. `bulk_insert` is all or \
nothing. `vacuum_analyze` runs outside a transaction.\n\
\n\
## Maintenance\n\
`backup_database` and `restore_database` run the server's pg_dump / pg_restore. \
Use `test_connection` to check connectivity and pool state.";

#[derive(Debug, Clone)]
pub struct PgService {
    gateway: OperationGateway,
}

impl PgService {
    pub fn new(gateway: OperationGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &OperationGateway {
        &self.gateway
    }

    /// Tool descriptors for every catalog operation.
    pub fn tools() -> Vec<Tool> {
        Operation::ALL
            .iter()
            .map(|op| Tool::new(op.name(), op.description(), op.input_schema()))
            .collect()
    }
}

impl ServerHandler for PgService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pg-mcp-server".to_owned(),
                title: Some("PostgreSQL MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = Self::tools();
        debug!(count = tools.len(), "Listing tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request.arguments.unwrap_or_default();
        let envelope = self.gateway.invoke(&request.name, args).await;
        let content = vec![Content::text(envelope.to_pretty_json())];

        if envelope.success {
            Ok(CallToolResult::success(content))
        } else {
            Ok(CallToolResult::error(content))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_cover_catalog() {
        let tools = PgService::tools();
        assert_eq!(tools.len(), Operation::ALL.len());
        assert!(tools.iter().any(|t| t.name == "execute_query"));
        assert!(tools.iter().any(|t| t.name == "vacuum_analyze"));
    }

    #[test]
    fn test_tool_schema_lists_required_keys() {
        let tools = PgService::tools();
        let insert = tools.iter().find(|t| t.name == "insert_data").unwrap();
        let required = insert.input_schema.get("required").unwrap();
        assert!(required.as_array().unwrap().iter().any(|v| v == "table_name"));
    }
}
