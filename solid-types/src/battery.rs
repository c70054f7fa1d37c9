// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryType {
    #[default]
    Unknown,
    Primary,
    Mouse,
    Keyboard,
    KeyboardMouse,
    Camera,
    Phone,
    Monitor,
    Gaming,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeState {
    #[default]
    NoCharge,
    Charging,
    Discharging,
    FullyCharged,
}
