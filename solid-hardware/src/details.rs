// SPDX-License-Identifier: GPL-3.0-only

use serde::Serialize;
use serde_json::Value;
use solid::{
    BatteryType, Bus, ChargeState, Device, DeviceInterfaceType, DriveType, ShareType, UsageType,
};

#[derive(Debug, Serialize)]
pub struct DeviceDetails {
    pub udi: String,
    pub parent: String,
    pub vendor: String,
    pub product: String,
    pub description: String,
    pub icon: String,
    pub emblems: Vec<String>,
    pub interfaces: Vec<DeviceInterfaceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_access: Option<AccessDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_drive: Option<DriveDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_volume: Option<VolumeDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_share: Option<ShareDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<ProcessorDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryDetails>,
}

#[derive(Debug, Serialize)]
pub struct AccessDetails {
    pub accessible: bool,
    pub file_path: String,
    pub ignored: bool,
    pub encrypted: bool,
}

#[derive(Debug, Serialize)]
pub struct DriveDetails {
    pub size: u64,
    pub hotpluggable: bool,
    pub removable: bool,
    pub drive_type: DriveType,
    pub bus: Bus,
}

#[derive(Debug, Serialize)]
pub struct VolumeDetails {
    pub fs_type: String,
    pub label: String,
    pub uuid: String,
    pub size: u64,
    pub usage: UsageType,
    pub ignored: bool,
    pub encrypted_container_udi: String,
}

#[derive(Debug, Serialize)]
pub struct BlockDetails {
    pub device: String,
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Serialize)]
pub struct ShareDetails {
    pub share_type: ShareType,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessorDetails {
    pub number: u32,
    pub max_speed: u32,
    pub can_change_frequency: bool,
}

#[derive(Debug, Serialize)]
pub struct BatteryDetails {
    pub present: bool,
    pub battery_type: BatteryType,
    pub charge_percent: u32,
    pub capacity: u32,
    pub rechargeable: bool,
    pub power_supply: bool,
    pub charge_state: ChargeState,
}

impl DeviceDetails {
    pub async fn collect(device: &Device) -> Self {
        let mut interfaces = Vec::new();
        for interface in DeviceInterfaceType::ALL {
            if interface != DeviceInterfaceType::Unknown
                && device.is_device_interface(interface).await
            {
                interfaces.push(interface);
            }
        }

        let storage_access = match device.storage_access().await {
            Some(access) => Some(AccessDetails {
                accessible: access.is_accessible().await,
                file_path: access.file_path().await,
                ignored: access.is_ignored().await,
                encrypted: access.is_encrypted().await,
            }),
            None => None,
        };

        let storage_drive = match device.storage_drive().await {
            Some(drive) => Some(DriveDetails {
                size: drive.size().await,
                hotpluggable: drive.is_hotpluggable().await,
                removable: drive.is_removable().await,
                drive_type: drive.drive_type().await,
                bus: drive.bus().await,
            }),
            None => None,
        };

        let storage_volume = match device.storage_volume().await {
            Some(volume) => Some(VolumeDetails {
                fs_type: volume.fs_type().await,
                label: volume.label().await,
                uuid: volume.uuid().await,
                size: volume.size().await,
                usage: volume.usage().await,
                ignored: volume.is_ignored().await,
                encrypted_container_udi: volume.encrypted_container_udi().await,
            }),
            None => None,
        };

        let block = match device.block().await {
            Some(block) => Some(BlockDetails {
                device: block.device().await,
                major: block.major().await,
                minor: block.minor().await,
            }),
            None => None,
        };

        let network_share = match device.network_share().await {
            Some(share) => Some(ShareDetails {
                share_type: share.share_type().await,
                url: share.url().await,
            }),
            None => None,
        };

        let processor = match device.processor().await {
            Some(processor) => Some(ProcessorDetails {
                number: processor.number().await,
                max_speed: processor.max_speed().await,
                can_change_frequency: processor.can_change_frequency().await,
            }),
            None => None,
        };

        let battery = match device.battery().await {
            Some(battery) => Some(BatteryDetails {
                present: battery.is_present().await,
                battery_type: battery.battery_type().await,
                charge_percent: battery.charge_percent().await,
                capacity: battery.capacity().await,
                rechargeable: battery.is_rechargeable().await,
                power_supply: battery.is_power_supply().await,
                charge_state: battery.charge_state().await,
            }),
            None => None,
        };

        Self {
            udi: device.udi().to_string(),
            parent: device.parent_udi().await,
            vendor: device.vendor().await,
            product: device.product().await,
            description: device.description().await,
            icon: device.icon().await,
            emblems: device.emblems().await,
            interfaces,
            storage_access,
            storage_drive,
            storage_volume,
            block,
            network_share,
            processor,
            battery,
        }
    }

    /// One `key = value` line per property, nested ones as `outer.inner`.
    pub fn to_text(&self) -> anyhow::Result<String> {
        let mut lines = vec![format!("udi = '{}'", self.udi)];
        if let Value::Object(fields) = serde_json::to_value(self)? {
            for (key, value) in fields {
                if key != "udi" {
                    flatten(&key, &value, &mut lines);
                }
            }
        }
        Ok(lines.join("\n"))
    }
}

fn flatten(key: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(fields) => {
            for (inner, value) in fields {
                flatten(&format!("{key}.{inner}"), value, lines);
            }
        }
        Value::String(s) => lines.push(format!("  {key} = '{s}'")),
        Value::Null => lines.push(format!("  {key} = (none)")),
        other => lines.push(format!("  {key} = {other}")),
    }
}
