// SPDX-License-Identifier: GPL-3.0-only

//! solid-hardware - query and control hardware devices from the shell

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use enumflags2::BitFlags;
use solid::config::SolidConfig;
use solid::power::Power;
use solid::{
    DeviceInterfaceType, DeviceNotifier, ErrorType, InhibitionType, SolidError,
    StorageAccessEvent,
};
use tracing::debug;

mod details;

use details::DeviceDetails;

#[derive(Parser, Debug)]
#[command(name = "solid-hardware")]
#[command(about = "Query and control hardware devices")]
#[command(version)]
struct Args {
    /// Configuration file to use instead of the per-user one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve the devices described in this file instead of the real ones
    #[arg(long, global = true)]
    fake: Option<PathBuf>,

    /// Print JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List every device
    List {
        /// Print all properties of each device
        #[arg(long)]
        details: bool,
    },

    /// Show the properties of a device
    Details {
        udi: String,
    },

    /// List devices providing an interface (e.g. StorageAccess)
    Query {
        interface: String,
        /// Only devices directly below this one
        #[arg(long)]
        parent: Option<String>,
    },

    /// Mount a device, unlocking it first when it is encrypted
    Mount {
        udi: String,
    },

    /// Unmount a device and lock or eject what holds it
    Unmount {
        udi: String,
    },

    /// Print device events until interrupted
    Listen,

    /// Block sleep and/or shutdown until interrupted
    Inhibit {
        #[arg(long)]
        sleep: bool,
        #[arg(long)]
        shutdown: bool,
        /// Reason reported to the session
        #[arg(long, default_value = "Requested from the command line")]
        reason: String,
        /// Release the lock after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SolidConfig::load_from(path)?,
        None => SolidConfig::load()?,
    };
    if let Some(fake) = args.fake {
        config.fake_hardware = Some(fake);
    }
    solid::logging::init(&config);

    if let Command::Inhibit {
        sleep,
        shutdown,
        reason,
        seconds,
    } = args.command
    {
        return inhibit(&config, inhibition_states(sleep, shutdown), reason, seconds).await;
    }

    let notifier = DeviceNotifier::from_config(&config).await?;
    match args.command {
        Command::List { details } => list(&notifier, details, args.json).await,
        Command::Details { udi } => show_details(&notifier, &udi, args.json).await,
        Command::Query { interface, parent } => {
            let interface = parse_interface(&interface)?;
            let devices = notifier
                .list_from_type_under(interface, parent.as_deref().unwrap_or(""))
                .await;
            print_udis(devices.iter().map(|d| d.udi()), args.json)
        }
        Command::Mount { udi } => storage_action(&notifier, &udi, true).await,
        Command::Unmount { udi } => storage_action(&notifier, &udi, false).await,
        Command::Listen => listen(&notifier, args.json).await,
        Command::Inhibit { .. } => Ok(()),
    }
}

/// Interface names are matched without regard to case.
fn parse_interface(name: &str) -> Result<DeviceInterfaceType> {
    DeviceInterfaceType::ALL
        .into_iter()
        .filter(|ty| *ty != DeviceInterfaceType::Unknown)
        .find(|ty| ty.type_to_string().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("Unknown device interface '{name}'"))
}

/// Sleep when nothing is asked for explicitly.
fn inhibition_states(sleep: bool, shutdown: bool) -> BitFlags<InhibitionType> {
    let mut states = BitFlags::empty();
    if sleep || !shutdown {
        states.insert(InhibitionType::Sleep);
    }
    if shutdown {
        states.insert(InhibitionType::Shutdown);
    }
    states
}

fn print_udis<'a>(udis: impl Iterator<Item = &'a str>, json: bool) -> Result<()> {
    if json {
        let udis: Vec<&str> = udis.collect();
        println!("{}", serde_json::to_string_pretty(&udis)?);
    } else {
        for udi in udis {
            println!("udi = '{udi}'");
        }
    }
    Ok(())
}

async fn list(notifier: &DeviceNotifier, details: bool, json: bool) -> Result<()> {
    let devices = notifier.all_devices().await;
    if !details {
        return print_udis(devices.iter().map(|d| d.udi()), json);
    }

    let mut all = Vec::with_capacity(devices.len());
    for device in &devices {
        all.push(DeviceDetails::collect(device).await);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        for details in &all {
            println!("{}\n", details.to_text()?);
        }
    }
    Ok(())
}

async fn show_details(notifier: &DeviceNotifier, udi: &str, json: bool) -> Result<()> {
    let device = notifier.find_device_by_udi(udi).await;
    if !device.is_valid() {
        bail!("No device {udi}");
    }

    let details = DeviceDetails::collect(&device).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        println!("{}", details.to_text()?);
    }
    Ok(())
}

async fn storage_action(notifier: &DeviceNotifier, udi: &str, mount: bool) -> Result<()> {
    let device = notifier.find_device_by_udi(udi).await;
    if !device.is_valid() {
        bail!("No device {udi}");
    }
    let access = device
        .storage_access()
        .await
        .with_context(|| format!("{udi} cannot be mounted"))?;

    let mut events = access.subscribe();
    let started = if mount {
        access.setup().await
    } else {
        access.teardown().await
    };
    if !started {
        bail!("{udi} is busy or already {}", if mount { "mounted" } else { "unmounted" });
    }

    loop {
        let event = tokio::select! {
            event = events.recv() => event.context("Device went away")?,
            _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
        };
        debug!("{event:?}");

        match event {
            StorageAccessEvent::SetupDone { error, message, .. }
            | StorageAccessEvent::TeardownDone { error, message, .. } => {
                if error != ErrorType::NoError {
                    return Err(SolidError::action(error, message).into());
                }
                if mount {
                    println!("{}", access.file_path().await);
                }
                return Ok(());
            }
            _ => {}
        }
    }
}

async fn listen(notifier: &DeviceNotifier, json: bool) -> Result<()> {
    let mut events = notifier.subscribe();
    loop {
        let event = tokio::select! {
            event = events.recv() => event.context("Event stream ended")?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            let kind = match &event {
                solid::DeviceEvent::Added(_) => "added",
                solid::DeviceEvent::Removed(_) => "removed",
                solid::DeviceEvent::Changed(_) => "changed",
            };
            println!("{kind}: {}", event.udi());
        }
    }
}

async fn inhibit(
    config: &SolidConfig,
    states: BitFlags<InhibitionType>,
    reason: String,
    seconds: Option<u64>,
) -> Result<()> {
    let power = Power::system(config.app_id.clone()).await?;
    let inhibition = power.inhibit(states, reason).start().await?;
    println!("Inhibiting {}", InhibitionType::logind_what(inhibition.states()));

    match seconds {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }
    inhibition.stop();
    Ok(())
}
