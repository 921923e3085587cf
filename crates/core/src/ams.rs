//! Filament-system (AMS) state model and status codec.
//!
//! The device reports AMS state two ways: a nested `ams` object carrying
//! per-unit humidity/temperature and per-tray filament identity, and a set
//! of packed fields — a 16-bit status code plus hexadecimal bitstrings with
//! one bit per tray. This module decodes both. Decoders never fail:
//! undocumented codes render as explicit unknowns, and unparseable
//! bitstrings read as all-clear, since firmware revisions add codes faster
//! than anyone documents them.

use serde::{Deserialize, Serialize};

/// Trays per AMS unit. Slot index `i` addresses unit `i / 4`, tray `i % 4`.
pub const TRAYS_PER_UNIT: usize = 4;

/// Tray-index sentinel meaning "no tray", as reported in `tray_now` etc.
pub const TRAY_NONE: &str = "255";

// ---------------------------------------------------------------------------
// Reported state
// ---------------------------------------------------------------------------

/// The `ams` object of a status report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ams {
    /// Attached AMS units in index order.
    #[serde(default)]
    pub ams: Vec<AmsInstance>,
    #[serde(default)]
    pub ams_exist_bits: String,
    #[serde(default)]
    pub ams_exist_bits_raw: String,
    #[serde(default)]
    pub insert_flag: bool,
    #[serde(default)]
    pub power_on_flag: bool,
    /// Bit set: the corresponding tray has filament in it.
    #[serde(default)]
    pub tray_exist_bits: String,
    /// Bit set: the filament in the corresponding tray is vendor-original.
    #[serde(default)]
    pub tray_is_bbl_bits: String,
    /// Currently loaded tray index; [`TRAY_NONE`] when none.
    #[serde(default)]
    pub tray_now: String,
    /// Previously loaded tray index; [`TRAY_NONE`] when none.
    #[serde(default)]
    pub tray_pre: String,
    /// Target tray index during a switch; [`TRAY_NONE`] when none.
    #[serde(default)]
    pub tray_tar: String,
    /// Bit set: the corresponding tray has been fully identified.
    #[serde(default)]
    pub tray_read_done_bits: String,
    /// Bit set: the corresponding tray is still being read.
    #[serde(default)]
    pub tray_reading_bits: String,
    #[serde(default)]
    pub version: i64,
}

/// One AMS unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AmsInstance {
    #[serde(default)]
    pub humidity: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub temp: String,
    #[serde(default)]
    pub tray: Vec<Tray>,
}

/// One filament tray of an AMS unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tray {
    #[serde(default)]
    pub id: String,
    /// Remaining filament in percent.
    #[serde(default)]
    pub remain: i64,
    #[serde(default)]
    pub cali_idx: i64,
    #[serde(default)]
    pub c_type: i64,
    /// RGBA hex colors for multi-color spools.
    #[serde(default)]
    pub cols: Vec<String>,
    #[serde(default)]
    pub bed_temp: String,
    #[serde(default)]
    pub bed_temp_type: String,
    #[serde(default)]
    pub drying_temp: String,
    #[serde(default)]
    pub drying_time: String,
    #[serde(default)]
    pub nozzle_temp_max: String,
    #[serde(default)]
    pub nozzle_temp_min: String,
    #[serde(default)]
    pub tag_uid: String,
    /// RGBA hex, e.g. `"8E9089FF"`.
    #[serde(default)]
    pub tray_color: String,
    #[serde(default)]
    pub tray_diameter: String,
    /// Vendor spool id, e.g. `"A00-D0"`.
    #[serde(default)]
    pub tray_id_name: String,
    /// Vendor family id, e.g. `"GFA00"`.
    #[serde(default)]
    pub tray_info_idx: String,
    /// Vendor family name, e.g. `"PLA Basic"`.
    #[serde(default)]
    pub tray_sub_brands: String,
    /// Material, e.g. `"PLA"`.
    #[serde(default)]
    pub tray_type: String,
    #[serde(default)]
    pub tray_uuid: String,
    /// Spool weight in grams, as a string.
    #[serde(default)]
    pub tray_weight: String,
    #[serde(default)]
    pub xcam_info: String,
}

impl Ams {
    /// Resolve a global slot index to the tray it addresses, if present.
    pub fn tray_at(&self, index: usize) -> Option<&Tray> {
        let (unit, tray) = slot_address(index);
        self.ams.get(unit)?.tray.get(tray)
    }

    /// Vendor family name for the slot (`tray_sub_brands`), `""` if unknown.
    pub fn tray_brand_family(&self, index: usize) -> &str {
        self.tray_at(index).map(|t| t.tray_sub_brands.as_str()).unwrap_or("")
    }

    /// Vendor family id for the slot (`tray_info_idx`), `""` if unknown.
    pub fn tray_brand_family_id(&self, index: usize) -> &str {
        self.tray_at(index).map(|t| t.tray_info_idx.as_str()).unwrap_or("")
    }

    /// Vendor spool id for the slot (`tray_id_name`), `""` if unknown.
    pub fn tray_brand_id(&self, index: usize) -> &str {
        self.tray_at(index).map(|t| t.tray_id_name.as_str()).unwrap_or("")
    }

    /// Spool UUID for the slot, `""` if unknown.
    pub fn tray_uuid(&self, index: usize) -> &str {
        self.tray_at(index).map(|t| t.tray_uuid.as_str()).unwrap_or("")
    }

    /// Whether the slot holds filament at all.
    pub fn tray_exists(&self, index: usize) -> bool {
        bit_set(&self.tray_exist_bits, index)
    }

    /// Whether the slot holds vendor-original filament.
    pub fn tray_is_bbl(&self, index: usize) -> bool {
        bit_set(&self.tray_is_bbl_bits, index)
    }
}

// ---------------------------------------------------------------------------
// Packed-field decoding
// ---------------------------------------------------------------------------

/// Map a global slot index to `(unit, tray)` — four trays per unit.
pub fn slot_address(index: usize) -> (usize, usize) {
    (index / TRAYS_PER_UNIT, index % TRAYS_PER_UNIT)
}

/// Test bit `index` of a hexadecimal bitstring such as `tray_exist_bits`.
///
/// An unparseable string or an out-of-range index reads as clear.
pub fn bit_set(bits_hex: &str, index: usize) -> bool {
    if index >= u64::BITS as usize {
        return false;
    }
    match u64::from_str_radix(bits_hex, 16) {
        Ok(bits) => bits & (1 << index) != 0,
        Err(_) => false,
    }
}

/// High byte of the packed status code: the main category.
pub fn status_main(code: u16) -> u8 {
    (code >> 8) as u8
}

/// Low byte of the packed status code: the category-specific step.
pub fn status_sub(code: u16) -> u8 {
    (code & 0xff) as u8
}

/// Main AMS status categories (high byte of `ams_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmsStatusMain {
    Idle,
    FilamentChange,
    RfidIdentifying,
    Assist,
    Calibration,
    SelfCheck,
    Debug,
    Unknown,
}

impl AmsStatusMain {
    /// Decode the high byte of the status code.
    pub fn from_code(main: u8) -> Self {
        match main {
            0x00 => Self::Idle,
            0x01 => Self::FilamentChange,
            0x02 => Self::RfidIdentifying,
            0x03 => Self::Assist,
            0x04 => Self::Calibration,
            0x10 => Self::SelfCheck,
            0x20 => Self::Debug,
            _ => Self::Unknown,
        }
    }

    /// The device-facing category label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::FilamentChange => "FILAMENT_CHANGE",
            Self::RfidIdentifying => "RFID_IDENTIFYING",
            Self::Assist => "ASSIST",
            Self::Calibration => "CALIBRATION",
            Self::SelfCheck => "SELF_CHECK",
            Self::Debug => "DEBUG",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Sub-steps of a filament change (main category `0x01`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilamentStep {
    Idle,
    HeatNozzle,
    CutFilament,
    PullCurrFilament,
    PushNewFilament,
    PurgeOldFilament,
    FeedFilament,
    ConfirmExtruded,
    CheckPosition,
}

impl FilamentStep {
    /// Decode a sub-code; `None` for undocumented steps.
    pub fn from_sub(sub: u8) -> Option<Self> {
        Some(match sub {
            0 => Self::Idle,
            1 => Self::HeatNozzle,
            2 => Self::CutFilament,
            3 => Self::PullCurrFilament,
            4 => Self::PushNewFilament,
            5 => Self::PurgeOldFilament,
            6 => Self::FeedFilament,
            7 => Self::ConfirmExtruded,
            8 => Self::CheckPosition,
            _ => return None,
        })
    }

    /// The device-facing step label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::HeatNozzle => "HEAT_NOZZLE",
            Self::CutFilament => "CUT_FILAMENT",
            Self::PullCurrFilament => "PULL_CURR_FILAMENT",
            Self::PushNewFilament => "PUSH_NEW_FILAMENT",
            Self::PurgeOldFilament => "PURGE_OLD_FILAMENT",
            Self::FeedFilament => "FEED_FILAMENT",
            Self::ConfirmExtruded => "CONFIRM_EXTRUDED",
            Self::CheckPosition => "CHECK_POSITION",
        }
    }
}

/// Sub-steps of an RFID identification pass (main category `0x02`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfidStatus {
    Idle,
    Reading,
    GcodeTrans,
    GcodeRunning,
    Assistant,
    SwitchFilament,
    HasFilament,
}

impl RfidStatus {
    /// Decode a sub-code; `None` for undocumented steps.
    pub fn from_sub(sub: u8) -> Option<Self> {
        Some(match sub {
            0 => Self::Idle,
            1 => Self::Reading,
            2 => Self::GcodeTrans,
            3 => Self::GcodeRunning,
            4 => Self::Assistant,
            5 => Self::SwitchFilament,
            6 => Self::HasFilament,
            _ => return None,
        })
    }

    /// The device-facing step label ("ASSITANT" is the vendor's spelling).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Reading => "READING",
            Self::GcodeTrans => "GCODE_TRANS",
            Self::GcodeRunning => "GCODE_RUNNING",
            Self::Assistant => "ASSITANT",
            Self::SwitchFilament => "SWITCH_FILAMENT",
            Self::HasFilament => "HAS_FILAMENT",
        }
    }
}

/// Render a packed status code as the label the viewer displays.
///
/// Code `0` is the canonical idle state. Filament-change and RFID
/// categories resolve their sub-step tables; unknown sub-codes render as
/// `"Unknown filament step (N)"` / `"Unknown RFID status (N)"`; every
/// other category renders as `"CATEGORY:sub"`.
pub fn describe_status(code: u16) -> String {
    if code == 0 {
        return "IDLE".to_string();
    }

    let main = status_main(code);
    let sub = status_sub(code);

    match AmsStatusMain::from_code(main) {
        AmsStatusMain::FilamentChange => match FilamentStep::from_sub(sub) {
            Some(step) => step.as_str().to_string(),
            None => format!("Unknown filament step ({sub})"),
        },
        AmsStatusMain::RfidIdentifying => match RfidStatus::from_sub(sub) {
            Some(step) => step.as_str().to_string(),
            None => format!("Unknown RFID status ({sub})"),
        },
        other => format!("{}:{sub}", other.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- slot addressing ----

    #[test]
    fn slot_maps_to_unit_and_tray() {
        assert_eq!(slot_address(0), (0, 0));
        assert_eq!(slot_address(3), (0, 3));
        assert_eq!(slot_address(4), (1, 0));
        assert_eq!(slot_address(7), (1, 3));
        assert_eq!(slot_address(9), (2, 1));
    }

    // ---- bitstrings ----

    #[test]
    fn bit_set_reads_hex_strings() {
        assert!(bit_set("f", 0));
        assert!(bit_set("f", 3));
        assert!(!bit_set("f", 4));
        assert!(bit_set("10", 4));
        assert!(!bit_set("0", 0));
    }

    #[test]
    fn bit_set_tolerates_garbage() {
        assert!(!bit_set("", 0));
        assert!(!bit_set("zz", 0));
        assert!(!bit_set("f", 64));
    }

    // ---- status code ----

    #[test]
    fn code_splits_into_main_and_sub() {
        assert_eq!(status_main(0x0103), 0x01);
        assert_eq!(status_sub(0x0103), 0x03);
        assert_eq!(status_main(0x2005), 0x20);
        assert_eq!(status_sub(0x2005), 0x05);
    }

    #[test]
    fn zero_code_is_idle() {
        assert_eq!(describe_status(0x0000), "IDLE");
    }

    #[test]
    fn filament_change_resolves_step_table() {
        assert_eq!(describe_status(0x0103), "PULL_CURR_FILAMENT");
        assert_eq!(describe_status(0x0108), "CHECK_POSITION");
        assert_eq!(describe_status(0x0109), "Unknown filament step (9)");
    }

    #[test]
    fn rfid_resolves_step_table() {
        assert_eq!(describe_status(0x0201), "READING");
        assert_eq!(describe_status(0x0206), "HAS_FILAMENT");
        assert_eq!(describe_status(0x0207), "Unknown RFID status (7)");
    }

    #[test]
    fn other_categories_render_main_and_sub() {
        assert_eq!(describe_status(0x0400), "CALIBRATION:0");
        assert_eq!(describe_status(0x1002), "SELF_CHECK:2");
        assert_eq!(describe_status(0x3001), "UNKNOWN:1");
    }

    // ---- tray lookups ----

    fn two_unit_ams() -> Ams {
        let mut ams = Ams {
            tray_exist_bits: "93".into(),   // trays 0, 1, 4, 7
            tray_is_bbl_bits: "13".into(),  // trays 0, 1, 4
            ..Default::default()
        };
        for unit_id in 0..2 {
            let mut unit = AmsInstance {
                id: unit_id.to_string(),
                ..Default::default()
            };
            for tray_id in 0..TRAYS_PER_UNIT {
                unit.tray.push(Tray {
                    id: tray_id.to_string(),
                    tray_sub_brands: format!("PLA Basic u{unit_id}t{tray_id}"),
                    tray_info_idx: "GFA00".into(),
                    tray_id_name: format!("A0{unit_id}-D{tray_id}"),
                    tray_uuid: format!("uuid-{unit_id}-{tray_id}"),
                    ..Default::default()
                });
            }
            ams.ams.push(unit);
        }
        ams
    }

    #[test]
    fn tray_lookup_crosses_unit_boundary() {
        let ams = two_unit_ams();
        assert_eq!(ams.tray_brand_family(7), "PLA Basic u1t3");
        assert_eq!(ams.tray_brand_id(4), "A01-D0");
        assert_eq!(ams.tray_uuid(0), "uuid-0-0");
    }

    #[test]
    fn tray_lookup_out_of_range_is_empty() {
        let ams = two_unit_ams();
        assert_eq!(ams.tray_brand_family(8), "");
        assert_eq!(ams.tray_uuid(12), "");
        assert!(ams.tray_at(8).is_none());
    }

    #[test]
    fn tray_bit_helpers_follow_bitstrings() {
        let ams = two_unit_ams();
        assert!(ams.tray_exists(0));
        assert!(ams.tray_exists(7));
        assert!(!ams.tray_exists(2));
        assert!(ams.tray_is_bbl(4));
        assert!(!ams.tray_is_bbl(7));
    }
}
