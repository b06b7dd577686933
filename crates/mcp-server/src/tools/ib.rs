//! Built-in broker tools
//!
//! These are thin passthroughs: each one issues an opaque gateway operation
//! through the shared session proxy. The gateway owns the market semantics;
//! this layer only declares names and input schemas.

use crate::protocol::McpTool;

use super::registry::{
    handler, json_schema_number, json_schema_object, json_schema_string, RegistryBuilder,
    RegistryError, ToolRegistry,
};

fn tool(name: &str, description: &str, schema: crate::protocol::McpInputSchema) -> McpTool {
    McpTool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: schema,
    }
}

/// Build the default tool registry. Fails if a name is registered twice.
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let registry = RegistryBuilder::new()
        .register(
            tool(
                "connection_status",
                "Report the broker session's host, port, client id and connection state",
                json_schema_object(vec![], vec![]),
            ),
            handler(|_args, session| async move {
                Ok(serde_json::to_value(session.info())?)
            }),
        )?
        .register(
            tool(
                "get_quote",
                "Fetch a market data snapshot for a symbol",
                json_schema_object(
                    vec![
                        ("symbol", json_schema_string("Ticker symbol, e.g. AAPL")),
                        ("exchange", json_schema_string("Exchange routing, e.g. SMART")),
                        ("currency", json_schema_string("Currency, e.g. USD")),
                    ],
                    vec!["symbol"],
                ),
            ),
            handler(|args, session| async move {
                Ok(session.request("market_data", args).await?)
            }),
        )?
        .register(
            tool(
                "get_positions",
                "List open positions for the connected account",
                json_schema_object(vec![], vec![]),
            ),
            handler(|args, session| async move {
                Ok(session.request("positions", args).await?)
            }),
        )?
        .register(
            tool(
                "get_account_summary",
                "Fetch account summary values",
                json_schema_object(
                    vec![(
                        "tags",
                        json_schema_string("Comma-separated summary tags, e.g. NetLiquidation"),
                    )],
                    vec![],
                ),
            ),
            handler(|args, session| async move {
                Ok(session.request("account_summary", args).await?)
            }),
        )?
        .register(
            tool(
                "place_order",
                "Place an order through the gateway",
                json_schema_object(
                    vec![
                        ("symbol", json_schema_string("Ticker symbol")),
                        ("action", json_schema_string("BUY or SELL")),
                        ("quantity", json_schema_number("Number of shares")),
                        ("order_type", json_schema_string("Order type, e.g. MKT or LMT")),
                        ("limit_price", json_schema_number("Limit price for LMT orders")),
                    ],
                    vec!["symbol", "action", "quantity"],
                ),
            ),
            handler(|args, session| async move {
                Ok(session.request("place_order", args).await?)
            }),
        )?;

    Ok(registry.build())
}
