//! Runtime and device catalogs as reported by `simctl list ... --json`.
//!
//! The two listings key things differently: runtimes carry an `identifier` and a
//! display `name`, while the device listing groups devices under a key that may be
//! either of those, or a display name with an extra build qualifier
//! (`"iOS 17.2 (21C62)"`). Group order is kept as emitted.

use crate::error::ControlError;
use crate::simctl::InstanceControl;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

/// Display-name prefix of the runtime family we benchmark.
pub const RUNTIME_FAMILY: &str = "iOS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runtime {
    pub identifier: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub version: String,
    #[serde(default)]
    pub is_available: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    #[serde(rename = "udid")]
    pub instance_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub is_available: bool,
}

/// Devices listed under one key of the device catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceGroup {
    pub key: String,
    pub devices: Vec<Device>,
}

#[derive(Deserialize)]
struct RuntimeList {
    runtimes: Vec<Runtime>,
}

#[derive(Deserialize)]
struct DeviceList {
    devices: serde_json::Map<String, serde_json::Value>,
}

/// Parse `simctl list runtimes --json`, keeping only the benchmarked family.
pub fn parse_runtimes(json: &str) -> Result<Vec<Runtime>, serde_json::Error> {
    let list: RuntimeList = serde_json::from_str(json)?;
    Ok(list
        .runtimes
        .into_iter()
        .filter(|r| r.display_name.starts_with(RUNTIME_FAMILY))
        .collect())
}

/// Parse `simctl list devices --json` into groups, in listing order.
pub fn parse_devices(json: &str) -> Result<Vec<DeviceGroup>, serde_json::Error> {
    let list: DeviceList = serde_json::from_str(json)?;
    list.devices
        .into_iter()
        .map(|(key, value)| {
            let devices: Vec<Device> = serde_json::from_value(value)?;
            Ok(DeviceGroup { key, devices })
        })
        .collect()
}

/// Snapshot of both listings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    pub runtimes: Vec<Runtime>,
    pub groups: Vec<DeviceGroup>,
}

impl Catalog {
    pub fn fetch<C: InstanceControl>(control: &C) -> Result<Self, ControlError> {
        let runtimes = control.list_runtimes()?;
        let groups = control.list_devices()?;
        tracing::debug!(
            runtimes = runtimes.len(),
            groups = groups.len(),
            "fetched simulator catalog"
        );
        Ok(Self { runtimes, groups })
    }

    pub fn group(&self, key: &str) -> Option<&DeviceGroup> {
        self.groups.iter().find(|g| g.key == key)
    }
}

/// Fetch-once holder for the catalog.
///
/// The first successful fetch is kept for the lifetime of the cache and never
/// invalidated. A failed fetch leaves the cache empty.
#[derive(Debug, Default)]
pub struct CatalogCache {
    cell: OnceCell<Catalog>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_fetch<C: InstanceControl>(&self, control: &C) -> Result<&Catalog, ControlError> {
        if let Some(catalog) = self.cell.get() {
            return Ok(catalog);
        }
        let catalog = Catalog::fetch(control)?;
        Ok(self.cell.get_or_init(|| catalog))
    }

    pub fn is_populated(&self) -> bool {
        self.cell.get().is_some()
    }
}
