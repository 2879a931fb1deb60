use async_trait::async_trait;
use serde_json::Value as JsonValue;
use serde_json::json;
use writeflow_protocol::PermissionLevel;
use writeflow_protocol::RuntimeError;

use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolEvent;
use crate::tools::ToolEventSender;
use crate::tools::invalid_input;

/// Fetches a URL for research purposes. `NetworkAccess` level.
pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn concurrency_safe(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::NetworkAccess
    }

    fn validate(&self, input: &JsonValue) -> Result<(), RuntimeError> {
        let url = input
            .get("url")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid_input("fetch_url requires a string 'url'"))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid_input("fetch_url 'url' must be http(s)"));
        }
        Ok(())
    }

    async fn call(&self, input: JsonValue, _ctx: &ToolContext, events: ToolEventSender) {
        let url = input["url"].as_str().unwrap_or_default();
        let _ = events.send(ToolEvent::Progress {
            progress: Some(20),
            step: format!("fetching {url}"),
        });

        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.text().await {
                    Ok(body) => {
                        let _ = events.send(ToolEvent::Result(json!({
                            "status": status,
                            "body": body,
                        })));
                    }
                    Err(err) => {
                        let _ = events.send(ToolEvent::Error(invalid_input(format!("failed to read body: {err}"))));
                    }
                }
            }
            Err(err) => {
                let _ = events.send(ToolEvent::Error(invalid_input(format!("request failed: {err}"))));
            }
        }
    }
}
