use crate::errors::{Error, Result};
use serde_json::Value;

pub const DEVICE_ID_FIELD: &str = "XRPID";
pub const PLATFORM_FIELD: &str = "platform";
pub const BLE_FIELD: &str = "BLE";

/// Fields extracted from a `POST /data` body
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub xrp_id: String,
    pub platform: Option<String>,
    pub ble: Option<Value>,
}

/// Extracts a device report from a JSON body.
///
/// Only the presence of the device identifier is checked; field types are
/// not. Non-string identifiers and platforms, `null` included, are kept as
/// their JSON text.
pub fn parse_report(body: &Value) -> Result<DeviceReport> {
    let fields = body
        .as_object()
        .ok_or_else(|| Error::Validation("Request body must be a JSON object".to_string()))?;

    let xrp_id = fields
        .get(DEVICE_ID_FIELD)
        .map(as_text)
        .ok_or_else(|| Error::Validation(format!("{} is required", DEVICE_ID_FIELD)))?;

    let platform = fields
        .get(PLATFORM_FIELD)
        .filter(|value| !value.is_null())
        .map(as_text);

    let ble = fields.get(BLE_FIELD).filter(|value| !value.is_null()).cloned();

    Ok(DeviceReport {
        xrp_id,
        platform,
        ble,
    })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
