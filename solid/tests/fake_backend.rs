// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;
use std::time::Duration;

use solid::{
    BatteryType, ChargeState, DeviceEvent, DeviceInterfaceType, DeviceManager, DeviceNotifier,
    ErrorType, ShareType, StorageAccessEvent, Subscription,
};
use solid_fake::{FAKE_COMPUTER, FakeHardware, FakeManager};

const COMPUTER: &str = "/org/kde/solid/fakehw/computer";
const CPU0: &str = "/org/kde/solid/fakehw/cpu0";
const HOME: &str = "/org/kde/solid/fakehw/volume_uuid_feedface";
const STICK: &str = "/org/kde/solid/fakehw/volume_uuid_c0ffee";
const NFS: &str = "/org/kde/solid/fakehw/nfs_share";

fn setup() -> (Arc<FakeManager>, DeviceNotifier) {
    let manager = Arc::new(FakeManager::new(
        FakeHardware::from_toml(FAKE_COMPUTER).expect("bundled description"),
    ));
    let notifier = DeviceNotifier::new(vec![manager.clone() as Arc<dyn DeviceManager>]);
    (manager, notifier)
}

async fn next<E>(events: &mut Subscription<E>) -> E {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event within timeout")
        .expect("notifier alive")
}

fn udis(devices: &[solid::Device]) -> Vec<&str> {
    devices.iter().map(|d| d.udi()).collect()
}

#[tokio::test]
async fn lists_devices_by_interface_and_parent() {
    let (_manager, notifier) = setup();

    let all = notifier.all_devices().await;
    assert_eq!(all.len(), 7);
    assert!(all.iter().all(|device| device.is_valid()));

    let volumes = notifier.list_from_type(DeviceInterfaceType::StorageVolume).await;
    assert_eq!(udis(&volumes), vec![HOME, STICK]);

    let processors = notifier
        .list_from_type_under(DeviceInterfaceType::Processor, COMPUTER)
        .await;
    assert_eq!(udis(&processors), vec![CPU0]);
    assert!(
        notifier
            .list_from_type_under(DeviceInterfaceType::Processor, HOME)
            .await
            .is_empty()
    );

    let cpu = notifier.find_device_by_udi(CPU0).await;
    let parent = notifier.parent(&cpu).await;
    assert_eq!(parent.udi(), COMPUTER);
    assert_eq!(parent.description().await, "Computer");
    let processor = cpu.processor().await.expect("processor");
    assert_eq!(processor.max_speed().await, 3200);
    assert!(processor.can_change_frequency().await);
}

#[tokio::test]
async fn handles_are_shared_until_the_device_goes_away() {
    let (manager, notifier) = setup();
    let mut events = notifier.subscribe();

    let before = notifier.find_device_by_udi(STICK).await;
    let access = before.storage_access().await.expect("access");
    let again = notifier.find_device_by_udi(STICK).await;
    assert!(Arc::ptr_eq(
        &access,
        &again.storage_access().await.expect("access")
    ));

    manager.unplug(STICK).expect("unplug");
    assert_eq!(next(&mut events).await, DeviceEvent::Removed(STICK.to_string()));
    assert!(!notifier.find_device_by_udi(STICK).await.is_valid());

    manager.plug(STICK).expect("plug");
    assert_eq!(next(&mut events).await, DeviceEvent::Added(STICK.to_string()));
    let after = notifier.find_device_by_udi(STICK).await;
    assert!(after.is_valid());
    assert!(!Arc::ptr_eq(
        &access,
        &after.storage_access().await.expect("access")
    ));
}

#[tokio::test]
async fn mounting_the_stick_reports_every_step() {
    let (_manager, notifier) = setup();
    let stick = notifier.find_device_by_udi(STICK).await;
    let access = stick.storage_access().await.expect("access");
    let mut events = access.subscribe();

    assert!(!access.is_accessible().await);
    assert!(access.setup().await);

    assert_eq!(
        next(&mut events).await,
        StorageAccessEvent::SetupRequested {
            udi: STICK.to_string()
        }
    );
    assert_eq!(
        next(&mut events).await,
        StorageAccessEvent::AccessibilityChanged {
            accessible: true,
            udi: STICK.to_string()
        }
    );
    assert_eq!(
        next(&mut events).await,
        StorageAccessEvent::SetupDone {
            error: ErrorType::NoError,
            message: String::new(),
            udi: STICK.to_string()
        }
    );
    assert_eq!(access.file_path().await, "/run/media/user/STICK");
    assert_eq!(stick.emblems().await, vec!["emblem-mounted"]);

    // already mounted
    assert!(!access.setup().await);
    assert!(access.teardown().await);
    assert_eq!(access.file_path().await, "");
}

#[tokio::test]
async fn broken_share_fails_to_mount() {
    let (manager, notifier) = setup();
    manager.set_broken(NFS, true).expect("break");

    let share = notifier.find_device_by_udi(NFS).await;
    let network = share.network_share().await.expect("network share");
    assert_eq!(network.share_type().await, ShareType::Nfs);
    assert_eq!(network.url().await.as_deref(), Some("nfs://fileserver/export"));

    let access = share.storage_access().await.expect("access");
    let mut events = access.subscribe();
    assert!(access.setup().await);

    let done = loop {
        let event = next(&mut events).await;
        if event.is_done() {
            break event;
        }
    };
    assert_eq!(
        done,
        StorageAccessEvent::SetupDone {
            error: ErrorType::OperationFailed,
            message: "Device is broken".to_string(),
            udi: NFS.to_string()
        }
    );
    assert!(!access.is_accessible().await);
}

#[tokio::test]
async fn property_changes_reach_subscribers() {
    let (manager, notifier) = setup();
    let mut events = notifier.subscribe();
    let battery_device = notifier
        .find_device_by_udi("/org/kde/solid/fakehw/acpi_BAT0")
        .await;
    let battery = battery_device.battery().await.expect("battery");
    assert_eq!(battery.battery_type().await, BatteryType::Primary);
    assert_eq!(battery.charge_state().await, ChargeState::Discharging);
    assert_eq!(battery.charge_percent().await, 84);

    manager
        .set_property(
            "/org/kde/solid/fakehw/acpi_BAT0",
            "chargeState",
            toml::Value::String("charging".into()),
        )
        .expect("set property");

    assert_eq!(
        next(&mut events).await,
        DeviceEvent::Changed("/org/kde/solid/fakehw/acpi_BAT0".to_string())
    );
    assert_eq!(battery.charge_state().await, ChargeState::Charging);
}
