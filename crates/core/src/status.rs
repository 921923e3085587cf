//! Telemetry snapshot model.
//!
//! [`PrinterStatus`] mirrors the device's native report JSON: snake_case
//! field names, sparse population (every field defaults), and a flattened
//! catch-all map so fields this crate does not model survive a decode /
//! encode round trip unchanged. Snapshots are immutable once received and
//! shared as `Arc<PrinterStatus>` between consumers.

use serde::{Deserialize, Serialize};

use crate::ams::Ams;

/// One full status report from the device.
///
/// Only the fields the monitor reads are typed; everything else the
/// firmware reports is carried verbatim in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrinterStatus {
    /// Print-head state as reported by the device, e.g. `"RUNNING"`.
    /// Decode with [`PrinterStatus::gcode_state`].
    #[serde(default, rename = "gcode_state")]
    pub gcode_state_raw: String,

    /// Device-side path of the file being printed, e.g.
    /// `"/data/Metadata/plate_1.gcode"`.
    #[serde(default)]
    pub gcode_file: String,

    /// Human-facing name of the print (the sliced project name).
    #[serde(default)]
    pub subtask_name: String,

    /// Print progress in percent (0-100).
    #[serde(default)]
    pub mc_percent: i64,

    /// Estimated minutes remaining.
    #[serde(default)]
    pub mc_remaining_time: i64,

    /// Non-zero while the device reports a print error.
    #[serde(default)]
    pub print_error: i64,

    /// Readiness / capability bitfield; decode with [`crate::HomeFlag`].
    #[serde(default)]
    pub home_flag: u32,

    /// Packed filament-system status code; decode with
    /// [`crate::ams::describe_status`].
    #[serde(default)]
    pub ams_status: u32,

    /// Filament system state, when one is attached.
    #[serde(default)]
    pub ams: Option<Ams>,

    /// Chamber camera descriptor, when the device advertises one.
    #[serde(default)]
    pub ipcam: Option<IpCam>,

    /// Chamber / work lights.
    #[serde(default)]
    pub lights_report: Vec<LightReport>,

    #[serde(default)]
    pub nozzle_temper: f64,
    #[serde(default)]
    pub bed_temper: f64,
    #[serde(default)]
    pub chamber_temper: f64,

    #[serde(default)]
    pub layer_num: i64,
    #[serde(default)]
    pub total_layer_num: i64,

    #[serde(default)]
    pub wifi_signal: String,

    /// Every reported field the monitor does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PrinterStatus {
    /// Decoded print-head state.
    pub fn gcode_state(&self) -> GcodeState {
        GcodeState::parse(&self.gcode_state_raw)
    }

    /// Filament-system status code truncated to the wire's 16-bit width.
    pub fn ams_status_code(&self) -> u16 {
        self.ams_status as u16
    }

    /// Whether the report names a print file (by project name or path).
    pub fn has_print_file(&self) -> bool {
        !self.subtask_name.is_empty() || !self.gcode_file.is_empty()
    }

    /// Human-facing name of the current print: the project name when the
    /// device reports one, otherwise the file path.
    pub fn print_name(&self) -> &str {
        if self.subtask_name.is_empty() {
            &self.gcode_file
        } else {
            &self.subtask_name
        }
    }

    /// The camera stream locator, empty when none is advertised.
    pub fn stream_locator(&self) -> &str {
        self.ipcam.as_ref().map(|c| c.rtsp_url.as_str()).unwrap_or("")
    }
}

/// Chamber camera descriptor reported under `ipcam`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpCam {
    #[serde(default)]
    pub ipcam_dev: String,
    #[serde(default)]
    pub ipcam_record: String,
    #[serde(default)]
    pub timelapse: String,
    #[serde(default)]
    pub resolution: String,
    /// Stream locator; empty when the camera is disabled.
    #[serde(default)]
    pub rtsp_url: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of `lights_report`, e.g. `{"node": "chamber_light", "mode": "on"}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LightReport {
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub mode: String,
}

/// Decoded `gcode_state` values.
///
/// Firmware reports these as uppercase strings; anything unrecognized maps
/// to [`GcodeState::Unknown`] rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcodeState {
    Idle,
    Prepare,
    Running,
    Pause,
    Finish,
    Failed,
    Unknown,
}

impl GcodeState {
    /// Decode the raw state string.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "IDLE" => Self::Idle,
            "PREPARE" => Self::Prepare,
            "RUNNING" => Self::Running,
            "PAUSE" => Self::Pause,
            "FINISH" => Self::Finish,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether this state means a print is in flight (running or paused).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Prepare | Self::Running | Self::Pause)
    }
}
