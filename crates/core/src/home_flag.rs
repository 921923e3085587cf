//! Readiness / capability bitfield decoding.
//!
//! The `home_flag` field packs axis-homing state, electrical configuration
//! and SD-card presence into one integer. [`HomeFlag`] exposes the bits as
//! predicates plus the composite [`SdCardState`] the viewer displays.

use serde::Serialize;

/// Wrapper over the raw `home_flag` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeFlag(u32);

impl HomeFlag {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn x_axis_homed(self) -> bool {
        self.bit(0)
    }

    pub fn y_axis_homed(self) -> bool {
        self.bit(1)
    }

    pub fn z_axis_homed(self) -> bool {
        self.bit(2)
    }

    /// Whether the device reports a 220 V mains supply.
    pub fn is_220v(self) -> bool {
        self.bit(3)
    }

    /// First-layer inspection auto-recovery (step loss) enabled.
    pub fn xcam_auto_recovery(self) -> bool {
        self.bit(4)
    }

    /// Chamber camera is recording while printing.
    pub fn camera_recording(self) -> bool {
        self.bit(5)
    }

    pub fn sdcard_present(self) -> bool {
        self.bit(8)
    }

    pub fn sdcard_abnormal(self) -> bool {
        self.bit(9)
    }

    /// Composite SD-card state derived from the presence/abnormal bits.
    pub fn sdcard_state(self) -> SdCardState {
        if !self.sdcard_present() {
            SdCardState::NoCard
        } else if self.sdcard_abnormal() {
            SdCardState::Abnormal
        } else {
            SdCardState::Normal
        }
    }

    fn bit(self, index: u32) -> bool {
        self.0 & (1 << index) != 0
    }
}

impl From<u32> for HomeFlag {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

/// SD-card state as shown to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SdCardState {
    NoCard,
    Normal,
    Abnormal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_bits_decode_independently() {
        let flag = HomeFlag::new(0b101);
        assert!(flag.x_axis_homed());
        assert!(!flag.y_axis_homed());
        assert!(flag.z_axis_homed());
    }

    #[test]
    fn no_card_without_presence_bit() {
        // Abnormal bit without presence still means no card.
        assert_eq!(HomeFlag::new(0).sdcard_state(), SdCardState::NoCard);
        assert_eq!(HomeFlag::new(1 << 9).sdcard_state(), SdCardState::NoCard);
    }

    #[test]
    fn present_card_is_normal_or_abnormal() {
        assert_eq!(HomeFlag::new(1 << 8).sdcard_state(), SdCardState::Normal);
        assert_eq!(
            HomeFlag::new((1 << 8) | (1 << 9)).sdcard_state(),
            SdCardState::Abnormal
        );
    }

    #[test]
    fn unrelated_bits_do_not_leak() {
        let flag = HomeFlag::new((1 << 3) | (1 << 5));
        assert!(flag.is_220v());
        assert!(flag.camera_recording());
        assert!(!flag.sdcard_present());
        assert_eq!(flag.sdcard_state(), SdCardState::NoCard);
    }
}
