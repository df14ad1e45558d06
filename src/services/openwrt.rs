use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::clients::{Endpoint, LuciClient};
use crate::error::{AppError, AppResult};
use crate::models::{LoadAverage, SystemStatus};

const THERMAL_ZONE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
const LOADAVG_PATH: &str = "/proc/loadavg";

/// Actions supported for init.d service management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitAction {
    Start,
    Stop,
    Enable,
    Disable,
}

impl InitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitAction::Start => "start",
            InitAction::Stop => "stop",
            InitAction::Enable => "enable",
            InitAction::Disable => "disable",
        }
    }
}

/// Domain operations against the OpenWRT router, built on [`LuciClient`].
///
/// Every client failure is wrapped into `AppError::Internal` here; the RPC
/// error codes never leak past this boundary.
pub struct OpenWrtService {
    client: LuciClient,
}

impl OpenWrtService {
    pub fn new(client: LuciClient) -> Self {
        Self { client }
    }

    /// Fetch uptime, temperature and load in one shot. All three sub-calls
    /// run concurrently and a single failure fails the whole fetch.
    pub async fn get_system_status(&self) -> AppResult<SystemStatus> {
        let (uptime, temp_base64, load_base64) = tokio::try_join!(
            self.client.call::<u64>(Endpoint::Sys, "uptime", vec![]),
            self.client
                .call::<String>(Endpoint::Fs, "readfile", vec![json!(THERMAL_ZONE_PATH)]),
            self.client
                .call::<String>(Endpoint::Fs, "readfile", vec![json!(LOADAVG_PATH)]),
        )
        .map_err(|e| {
            error!("Failed to fetch system status: {}", e);
            AppError::Internal(format!("Failed to fetch system status: {}", e))
        })?;

        let temperature = parse_temperature(&decode_file(&temp_base64)?)?;
        let load = parse_load_average(&decode_file(&load_base64)?)?;

        Ok(SystemStatus {
            uptime,
            temperature,
            load,
        })
    }

    /// Fire-and-forget reboot; success is silent.
    pub async fn reboot_router(&self) -> AppResult<()> {
        self.client
            .call::<JsonValue>(Endpoint::Sys, "reboot", vec![])
            .await
            .map_err(|e| {
                error!("Failed to reboot router: {}", e);
                AppError::Internal(format!("Failed to reboot router: {}", e))
            })?;
        info!("Router reboot initiated");
        Ok(())
    }

    /// Check whether a process is running on the device via a pgrep shell
    /// predicate. The remote result is the shell exit code: 0 means found.
    pub async fn is_process_running(&self, process_name: &str) -> AppResult<bool> {
        let result: JsonValue = self
            .client
            .call(
                Endpoint::Sys,
                "call",
                vec![json!(format!("pgrep {} >/dev/null 2>&1", process_name))],
            )
            .await
            .map_err(|e| {
                error!("Failed to check process status for {}: {}", process_name, e);
                AppError::Internal(format!("Failed to check process status for {}", process_name))
            })?;
        Ok(pgrep_found(parse_exit_code(&result)?))
    }

    /// Start/stop/enable/disable an init.d service on the device.
    pub async fn manage_initd_process(&self, process_name: &str, action: InitAction) -> AppResult<()> {
        let method = format!("init.{}", action.as_str());
        self.client
            .call::<JsonValue>(Endpoint::Sys, &method, vec![json!(process_name)])
            .await
            .map_err(|e| {
                error!(
                    "Failed to manage init.d process {} {}: {}",
                    process_name,
                    action.as_str(),
                    e
                );
                AppError::Internal(format!(
                    "Failed to manage init.d process {} {}",
                    process_name,
                    action.as_str()
                ))
            })?;
        info!("Init.d process {} {}d", process_name, action.as_str());
        Ok(())
    }
}

fn decode_file(contents_base64: &str) -> AppResult<String> {
    let bytes = BASE64
        .decode(contents_base64.trim())
        .map_err(|e| AppError::Internal(format!("Invalid base64 file contents: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("File contents are not UTF-8: {}", e)))
}

/// Thermal zone files report millidegrees Celsius
fn parse_temperature(raw: &str) -> AppResult<f64> {
    let millidegrees: f64 = raw
        .trim()
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid temperature reading {:?}: {}", raw, e)))?;
    Ok(millidegrees / 1000.0)
}

/// /proc/loadavg starts with the 1/5/15 minute averages
fn parse_load_average(raw: &str) -> AppResult<LoadAverage> {
    let mut fields = raw.split_whitespace();
    let mut next = |name: &str| -> AppResult<f64> {
        fields
            .next()
            .ok_or_else(|| AppError::Internal(format!("loadavg missing {} field", name)))?
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid loadavg {} field: {}", name, e)))
    };
    Ok(LoadAverage {
        avg1: next("avg1")?,
        avg5: next("avg5")?,
        avg15: next("avg15")?,
    })
}

/// Some LuCI builds report the shell exit code as a JSON string, others as a
/// number; accept both.
fn parse_exit_code(value: &JsonValue) -> AppResult<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| AppError::Internal(format!("Non-integer exit code: {}", n))),
        JsonValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| AppError::Internal(format!("Invalid exit code {:?}", s))),
        other => Err(AppError::Internal(format!("Unexpected exit code value: {}", other))),
    }
}

fn pgrep_found(exit_code: i64) -> bool {
    exit_code == 0
}
