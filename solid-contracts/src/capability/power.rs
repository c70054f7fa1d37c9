// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use solid_types::{BatteryType, ChargeState};

#[async_trait]
pub trait Processor: Send + Sync {
    async fn number(&self) -> u32;
    /// Maximum frequency in MHz, 0 when unknown.
    async fn max_speed(&self) -> u32;
    async fn can_change_frequency(&self) -> bool;
}

#[async_trait]
pub trait Battery: Send + Sync {
    async fn is_present(&self) -> bool;
    async fn battery_type(&self) -> BatteryType;
    async fn charge_percent(&self) -> u32;
    async fn capacity(&self) -> u32;
    async fn is_rechargeable(&self) -> bool;
    async fn is_power_supply(&self) -> bool;
    async fn charge_state(&self) -> ChargeState;
}
