// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use solid_contracts::Processor;

use crate::UdevDevice;

pub struct UdevProcessor {
    device: UdevDevice,
}

impl UdevProcessor {
    pub fn new(device: UdevDevice) -> Self {
        Self { device }
    }
}

#[async_trait]
impl Processor for UdevProcessor {
    async fn number(&self) -> u32 {
        self.device
            .name()
            .trim_start_matches("cpu")
            .parse()
            .unwrap_or(0)
    }

    async fn max_speed(&self) -> u32 {
        // kHz in sysfs
        self.device
            .sysfs_attr::<u32>("cpufreq/cpuinfo_max_freq")
            .map(|khz| khz / 1000)
            .unwrap_or(0)
    }

    async fn can_change_frequency(&self) -> bool {
        if let Some(governors) = self
            .device
            .sysfs_attr::<String>("cpufreq/scaling_available_governors")
        {
            return governors.split_whitespace().count() > 1;
        }

        let min = self.device.sysfs_attr::<u32>("cpufreq/cpuinfo_min_freq");
        let max = self.device.sysfs_attr::<u32>("cpufreq/cpuinfo_max_freq");
        matches!((min, max), (Some(min), Some(max)) if min != max)
    }
}
