use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceReport {
    #[serde(rename = "XRPID")]
    pub xrp_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "BLE", skip_serializing_if = "Option::is_none")]
    pub ble: Option<Value>,
}
