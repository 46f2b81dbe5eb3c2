//! Maps a human-supplied `(version, device name)` pair to a simulator instance id.
//!
//! Runtime selection scans runtimes in catalog order and takes the first one that
//! satisfies any of:
//!
//! 1. its version equals the requested version exactly,
//! 2. its display name contains the requested version,
//! 3. the request is a bare two-character major version (`"17"`) and the runtime
//!    version starts with it.
//!
//! Device selection is strict first (the group keyed exactly by the runtime's
//! identifier or display name), then loose (every group whose key mentions the
//! runtime's version or display name). Only available devices with an exact name
//! match qualify.

use crate::catalog::{Catalog, CatalogCache, Device, Runtime};
use crate::error::BenchError;
use crate::simctl::InstanceControl;

fn is_bare_major(version_spec: &str) -> bool {
    version_spec.chars().count() == 2 && !version_spec.contains('.')
}

fn runtime_matches(runtime: &Runtime, version_spec: &str) -> bool {
    runtime.version == version_spec
        || runtime.display_name.contains(version_spec)
        || (is_bare_major(version_spec) && runtime.version.starts_with(version_spec))
}

pub fn select_runtime<'a>(catalog: &'a Catalog, version_spec: &str) -> Option<&'a Runtime> {
    catalog
        .runtimes
        .iter()
        .find(|r| runtime_matches(r, version_spec))
}

fn find_available<'a>(devices: &'a [Device], device_name: &str) -> Option<&'a Device> {
    devices
        .iter()
        .find(|d| d.name == device_name && d.is_available)
}

pub fn select_device<'a>(
    catalog: &'a Catalog,
    runtime: &Runtime,
    device_name: &str,
) -> Option<&'a Device> {
    let strict = [runtime.identifier.as_str(), runtime.display_name.as_str()]
        .into_iter()
        .filter_map(|key| catalog.group(key))
        .find_map(|group| find_available(&group.devices, device_name));
    if strict.is_some() {
        return strict;
    }

    catalog
        .groups
        .iter()
        .filter(|g| {
            g.key.contains(&runtime.version) || g.key.contains(&runtime.display_name)
        })
        .find_map(|group| find_available(&group.devices, device_name))
}

/// Resolve against an already fetched catalog.
pub fn resolve_in_catalog<'a>(
    catalog: &'a Catalog,
    version_spec: &str,
    device_name: &str,
) -> Result<&'a Device, BenchError> {
    let runtime = select_runtime(catalog, version_spec).ok_or_else(|| {
        BenchError::Recoverable(format!("no runtime matches version `{version_spec}`"))
    })?;

    select_device(catalog, runtime, device_name).ok_or_else(|| {
        BenchError::Recoverable(format!(
            "no available device named `{device_name}` for runtime `{}` ({})",
            runtime.display_name, runtime.identifier
        ))
    })
}

/// Resolver backed by a fetch-once catalog cache.
#[derive(Debug, Default)]
pub struct DeviceResolver {
    cache: CatalogCache,
}

impl DeviceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `Recoverable` on a miss; catalog fetch problems are `Unexpected`.
    pub fn resolve<C: InstanceControl>(
        &self,
        control: &C,
        version_spec: &str,
        device_name: &str,
    ) -> Result<String, BenchError> {
        let catalog = self
            .cache
            .get_or_fetch(control)
            .map_err(BenchError::Unexpected)?;
        let device = resolve_in_catalog(catalog, version_spec, device_name)?;
        tracing::debug!(
            version = version_spec,
            device = device_name,
            instance_id = %device.instance_id,
            state = %device.state,
            "resolved instance"
        );
        Ok(device.instance_id.clone())
    }
}
