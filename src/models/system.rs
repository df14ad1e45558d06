use serde::{Deserialize, Serialize};

/// Aggregated device health as shown on the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// Seconds since the device booted
    pub uptime: u64,
    /// SoC temperature in degrees Celsius
    pub temperature: f64,
    pub load: LoadAverage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadAverage {
    pub avg1: f64,
    pub avg5: f64,
    pub avg15: f64,
}
