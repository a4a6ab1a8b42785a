//! Device hot-plug monitoring.
//!
//! [`UsbPollMonitor`] polls the kernel's USB device listing
//! (`/sys/bus/usb/devices` on Linux) and emits attach/detach events for
//! devices that appear or disappear between polls. Devices present when
//! monitoring starts are not reported.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use mtpdock_core::HotplugEvent;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Result};
use crate::event::{EventSender, LifecycleEvent};

/// Default sysfs directory listing USB devices.
pub const DEFAULT_USB_SYSFS_ROOT: &str = "/sys/bus/usb/devices";

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of device attach/detach notifications.
pub trait DeviceMonitor: Send {
    /// Starts monitoring, delivering events to `events`.
    fn start(&mut self, events: EventSender) -> Result<()>;

    /// Stops monitoring. No events are delivered after this returns.
    fn stop(&mut self);

    /// Whether monitoring is active.
    fn is_monitoring(&self) -> bool;
}

/// Attached devices keyed by bus path.
pub type DeviceSnapshot = BTreeMap<String, Value>;

/// Polling USB hot-plug monitor.
pub struct UsbPollMonitor {
    root: PathBuf,
    interval: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for UsbPollMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbPollMonitor")
            .field("root", &self.root)
            .field("interval", &self.interval)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for UsbPollMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_USB_SYSFS_ROOT, DEFAULT_POLL_INTERVAL)
    }
}

impl UsbPollMonitor {
    /// Creates a monitor over `root`, polling every `interval`.
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl DeviceMonitor for UsbPollMonitor {
    fn start(&mut self, events: EventSender) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let root = self.root.clone();
        let interval = self.interval;
        let running = self.running.clone();

        let worker = std::thread::Builder::new()
            .name("usb-hotplug".into())
            .spawn(move || {
                let mut known = scan(&root);
                debug!(devices = known.len(), "USB monitor baseline taken");

                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(interval);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }

                    let current = scan(&root);
                    for event in diff(&known, &current) {
                        if !running.load(Ordering::SeqCst) {
                            return;
                        }
                        if events.send(LifecycleEvent::Hotplug(event)).is_err() {
                            running.store(false, Ordering::SeqCst);
                            return;
                        }
                    }
                    known = current;
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                LifecycleError::Monitor(e.to_string())
            })?;

        self.worker = Some(worker);
        info!(root = %self.root.display(), "USB hot-plug monitoring started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("USB hot-plug monitoring stopped");
        }
        // The worker exits on its next wake-up.
        self.worker.take();
    }

    fn is_monitoring(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Reads the attached USB devices under `root`.
///
/// Only entries with an `idVendor` attribute are devices; interfaces and
/// unreadable entries are ignored.
pub fn scan(root: &Path) -> DeviceSnapshot {
    let mut devices = DeviceSnapshot::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %root.display(), error = %e, "USB device listing unavailable");
            return devices;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(vendor_id) = read_attr(&path, "idVendor") else {
            continue;
        };
        let bus_path = entry.file_name().to_string_lossy().into_owned();

        let descriptor = json!({
            "busPath": bus_path,
            "vendorId": vendor_id,
            "productId": read_attr(&path, "idProduct"),
            "manufacturer": read_attr(&path, "manufacturer"),
            "product": read_attr(&path, "product"),
            "serialNumber": read_attr(&path, "serial"),
        });
        devices.insert(bus_path, descriptor);
    }

    devices
}

/// Events needed to go from `before` to `after`. Detaches come first.
pub fn diff(before: &DeviceSnapshot, after: &DeviceSnapshot) -> Vec<HotplugEvent> {
    let detached = before
        .iter()
        .filter(|(key, _)| !after.contains_key(*key))
        .map(|(_, device)| HotplugEvent::detach(device.clone()));

    let attached = after
        .iter()
        .filter(|(key, device)| before.get(*key) != Some(*device))
        .map(|(_, device)| HotplugEvent::attach(device.clone()));

    detached.chain(attached).collect()
}

fn read_attr(device: &Path, name: &str) -> Option<String> {
    match fs::read_to_string(device.join(name)) {
        Ok(value) => Some(value.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(
                device = %device.display(),
                attr = name,
                error = %e,
                "Failed to read USB attribute"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use mtpdock_core::HotplugKind;
    use tempfile::TempDir;

    fn sysfs_root(dir: &TempDir) -> PathBuf {
        let root = dir.path().join("devices");
        fs::create_dir_all(&root).unwrap();
        root
    }

    // Builds the device next to `root` and moves it in so a poll never sees
    // a half-written device.
    fn add_device(root: &Path, bus: &str, vendor: &str, product: &str) {
        let staging = root.parent().unwrap().join(format!("staging-{bus}"));
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("idVendor"), format!("{vendor}\n")).unwrap();
        fs::write(staging.join("idProduct"), format!("{product}\n")).unwrap();
        fs::write(staging.join("product"), "Galaxy S21\n").unwrap();
        fs::rename(&staging, root.join(bus)).unwrap();
    }

    #[test]
    fn test_scan_reads_devices_and_skips_interfaces() {
        let dir = TempDir::new().unwrap();
        let root = sysfs_root(&dir);
        add_device(&root, "1-1", "04e8", "6860");
        fs::create_dir_all(root.join("1-1:1.0")).unwrap();

        let devices = scan(&root);

        assert_eq!(devices.len(), 1);
        let device = &devices["1-1"];
        assert_eq!(device["vendorId"], "04e8");
        assert_eq!(device["productId"], "6860");
        assert_eq!(device["product"], "Galaxy S21");
        assert!(device["manufacturer"].is_null());
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(scan(&dir.path().join("nope")).is_empty());
    }

    #[test]
    fn test_diff_reports_attach_and_detach() {
        let mut before = DeviceSnapshot::new();
        before.insert("1-1".into(), json!({"busPath": "1-1"}));
        let mut after = DeviceSnapshot::new();
        after.insert("1-2".into(), json!({"busPath": "1-2"}));

        let events = diff(&before, &after);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, HotplugKind::Detach);
        assert_eq!(events[0].device["busPath"], "1-1");
        assert_eq!(events[1].kind, HotplugKind::Attach);
        assert_eq!(events[1].device["busPath"], "1-2");
        assert!(diff(&after, &after).is_empty());
    }

    #[tokio::test]
    async fn test_monitor_emits_attach_and_stops() {
        let dir = TempDir::new().unwrap();
        let root = sysfs_root(&dir);
        let (tx, mut rx) = event::channel();
        let mut monitor = UsbPollMonitor::new(&root, Duration::from_millis(20));

        monitor.start(tx).unwrap();
        assert!(monitor.is_monitoring());
        tokio::time::sleep(Duration::from_millis(50)).await;

        add_device(&root, "2-1", "18d1", "4ee1");
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            LifecycleEvent::Hotplug(hotplug) => {
                assert_eq!(hotplug.kind, HotplugKind::Attach);
                assert_eq!(hotplug.device["vendorId"], "18d1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        monitor.stop();
        assert!(!monitor.is_monitoring());
    }
}
