//! VPC data-plane transport: a direct HTTP GET to the session's own
//! network interface, bypassing the control plane entirely (spec.md §4.3,
//! §6).

use std::time::Duration;

use serde_json::Value;

use ab_domain::error::{Error, Result};

pub struct VpcHttpTransport {
    client: reqwest::Client,
}

impl VpcHttpTransport {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Transport(format!("failed to build VPC client: {e}")))?;
        Ok(Self { client })
    }

    /// `GET http://{ip}:{port}/callTool?server=..&tool=..&args=..&token=..&requestId=..`
    ///
    /// Returns the parsed JSON response body. Transport errors and non-2xx
    /// statuses are surfaced with the exact wording spec.md §4.3 specifies
    /// so dispatch can pass them straight through as `errorMessage`.
    pub async fn call_tool(
        &self,
        ip: &str,
        port: &str,
        server: &str,
        tool: &str,
        args_json: &str,
        token: &str,
        request_id: &str,
    ) -> Result<Value> {
        let url = format!("http://{ip}:{port}/callTool");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("server", server),
                ("tool", tool),
                ("args", args_json),
                ("token", token),
                ("requestId", request_id),
            ])
            .send()
            .await
            .map_err(|e| Error::Transport(format!("VPC request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "VPC request failed with status: {}",
                status.as_u16()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("VPC request failed: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::Transport(format!("VPC request failed: malformed body: {e}")))
    }
}

/// Build a locally-generated correlation id for VPC calls (logging only —
/// the VPC reply carries no request id of its own).
pub fn vpc_request_id(epoch_millis: u128, random: u32) -> String {
    format!("vpc-{epoch_millis}-{random:08x}")
}
