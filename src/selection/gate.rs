//! Image validation gate
//!
//! Decides whether a candidate may be selected outright, must be refused,
//! or needs the user to confirm before it replaces the current selection.

use std::fmt;

use super::ModalOptions;
use crate::images::{formats, Image};

/// Conditions that ask the user before committing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    LooksLikeWindowsImage,
    MissingPartitionTable,
}

impl Warning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LooksLikeWindowsImage => "looks-like-windows-image",
            Self::MissingPartitionTable => "missing-partition-table",
        }
    }

    /// Analytics event name logged when the warning fires
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::LooksLikeWindowsImage => "Possibly Windows image",
            Self::MissingPartitionTable => "Missing partition table",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LooksLikeWindowsImage => {
                "It looks like you are trying to flash a Windows image.\n\n\
                 Windows installation media needs special processing to become bootable. \
                 A tool made for that purpose is usually the better choice."
            }
            Self::MissingPartitionTable => {
                "It looks like this is not a bootable image.\n\n\
                 The image does not appear to contain a partition table, \
                 and might not be recognized or bootable by your device."
            }
        }
    }

    /// `display()` resolves true for "Change". "Continue" sits on the
    /// rejection side so dismissing the modal keeps the new image.
    pub fn modal_options(&self) -> ModalOptions {
        ModalOptions {
            confirmation_label: "Change".to_string(),
            rejection_label: "Continue".to_string(),
            description: self.description().to_string(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnsupportedFormat,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported-format",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
    NeedsConfirmation(Warning),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageValidationGate;

impl ImageValidationGate {
    /// Checks run in order and the first match wins: format, then the
    /// Windows heuristic, then the partition table.
    pub fn validate(&self, image: &Image) -> Verdict {
        if !formats::is_supported_image(&image.path) {
            return Verdict::Rejected(Rejection::UnsupportedFormat);
        }

        // Picker-supplied candidates skip extraction, so the flag may be unset.
        if image.looks_like_windows_image || formats::looks_like_windows_image(&image.path) {
            return Verdict::NeedsConfirmation(Warning::LooksLikeWindowsImage);
        }

        if !image.has_mbr {
            return Verdict::NeedsConfirmation(Warning::MissingPartitionTable);
        }

        Verdict::Accepted
    }
}
