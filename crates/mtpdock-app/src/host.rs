//! A window host speaking JSON lines over stdio.
//!
//! The renderer process owns the actual windows. Commands and UI messages go
//! out on stdout, one JSON object per line, tagged by `type`. Window and
//! device-session signals come back on stdin in the same shape.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mtpdock_core::{DeviceInfo, DeviceState, UiMessage};
use mtpdock_lifecycle::{
    EventSender, LifecycleError, LifecycleEvent, Result, WindowHost, WindowOptions,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Window commands sent to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostCommand {
    CreateWindow { minimized: bool },
    ShowRecoveryWindow,
    RestoreWindow,
    FocusWindow,
}

/// Signals received from the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostSignal {
    WindowClosed,
    Activate,
    ThemeUpdated { dark: bool },
    WindowMinimized { minimized: bool },
    /// A device session opened; `info` is what the device reported.
    DeviceInfo { info: DeviceInfo },
    DeviceDisconnected,
    Quit,
}

impl HostSignal {
    /// Maps the signal to a lifecycle event. Minimize state and the device
    /// session are tracked locally and produce no event.
    pub fn into_event(
        self,
        minimized: &AtomicBool,
        device: &DeviceState,
    ) -> Option<LifecycleEvent> {
        match self {
            Self::WindowClosed => Some(LifecycleEvent::WindowClosed),
            Self::Activate => Some(LifecycleEvent::Activate),
            Self::ThemeUpdated { dark } => Some(LifecycleEvent::ThemeUpdated { dark }),
            Self::WindowMinimized { minimized: value } => {
                minimized.store(value, Ordering::SeqCst);
                None
            }
            Self::DeviceInfo { info } => {
                device.set(info);
                None
            }
            Self::DeviceDisconnected => {
                device.clear();
                None
            }
            Self::Quit => Some(LifecycleEvent::BeforeQuit),
        }
    }
}

/// Writes window commands and UI messages as JSON lines.
pub struct StdioHost<W: Write + Send> {
    out: W,
    minimized: Arc<AtomicBool>,
}

impl StdioHost<io::Stdout> {
    /// Creates a host writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StdioHost<W> {
    /// Creates a host writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            minimized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Minimize state shared with the signal reader.
    pub fn minimized_flag(&self) -> Arc<AtomicBool> {
        self.minimized.clone()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let line =
            serde_json::to_string(value).map_err(|e| LifecycleError::Window(e.to_string()))?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> WindowHost for StdioHost<W> {
    fn create_main_window(&mut self, options: &WindowOptions) -> Result<()> {
        self.write_line(&HostCommand::CreateWindow {
            minimized: options.start_minimized,
        })?;
        self.minimized.store(options.start_minimized, Ordering::SeqCst);
        Ok(())
    }

    fn show_recovery_window(&mut self) -> Result<()> {
        self.write_line(&HostCommand::ShowRecoveryWindow)
    }

    fn is_minimized(&self) -> bool {
        self.minimized.load(Ordering::SeqCst)
    }

    fn restore(&mut self) -> Result<()> {
        self.write_line(&HostCommand::RestoreWindow)?;
        self.minimized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        self.write_line(&HostCommand::FocusWindow)
    }

    fn send(&mut self, message: UiMessage) -> Result<()> {
        self.write_line(&message)
    }
}

/// Reads host signals and forwards them to the event loop.
///
/// When the input closes the renderer is gone, so a quit is requested.
pub async fn forward_signals<R>(
    reader: R,
    events: EventSender,
    minimized: Arc<AtomicBool>,
    device: DeviceState,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let signal = match serde_json::from_str::<HostSignal>(line) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed host signal");
                continue;
            }
        };

        debug!(?signal, "Host signal");
        if let Some(event) = signal.into_event(&minimized, &device) {
            if events.send(event).is_err() {
                return Ok(());
            }
        }
    }

    debug!("Host input closed");
    let _ = events.send(LifecycleEvent::BeforeQuit);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtpdock_core::{DeviceInfoProvider, HotplugEvent};
    use serde_json::{json, Value};
    use tokio::io::BufReader;

    fn lines(host: StdioHost<Vec<u8>>) -> Vec<Value> {
        String::from_utf8(host.into_inner())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_commands_written_as_json_lines() {
        let mut host = StdioHost::new(Vec::new());

        host.create_main_window(&WindowOptions {
            start_minimized: true,
        })
        .unwrap();
        assert!(host.is_minimized());
        host.restore().unwrap();
        assert!(!host.is_minimized());
        host.focus().unwrap();
        host.send(HotplugEvent::attach(json!({"vendorId": "04e8"})).to_ui_message())
            .unwrap();

        let out = lines(host);
        assert_eq!(out[0], json!({"type": "createWindow", "minimized": true}));
        assert_eq!(out[1], json!({"type": "restoreWindow"}));
        assert_eq!(out[2], json!({"type": "focusWindow"}));
        assert_eq!(out[3]["type"], "usbHotplug");
        assert_eq!(out[3]["eventName"], "attach");
    }

    #[test]
    fn test_recovery_window_command() {
        let mut host = StdioHost::new(Vec::new());
        host.show_recovery_window().unwrap();
        assert_eq!(lines(host), vec![json!({"type": "showRecoveryWindow"})]);
    }

    #[tokio::test]
    async fn test_signals_forwarded_in_order() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"themeUpdated\",\"dark\":true}\n")
            .read(b"{\"type\":\"windowMinimized\",\"minimized\":true}\n")
            .read(b"not json\n\n")
            .read(b"{\"type\":\"activate\"}\n{\"type\":\"windowClosed\"}\n")
            .build();
        let (tx, mut rx) = mtpdock_lifecycle::event::channel();
        let minimized = Arc::new(AtomicBool::new(false));

        forward_signals(BufReader::new(input), tx, minimized.clone(), DeviceState::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(LifecycleEvent::ThemeUpdated { dark: true }));
        assert_eq!(rx.recv().await, Some(LifecycleEvent::Activate));
        assert_eq!(rx.recv().await, Some(LifecycleEvent::WindowClosed));
        // input closed
        assert_eq!(rx.recv().await, Some(LifecycleEvent::BeforeQuit));
        assert!(minimized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_quit_signal_requests_shutdown() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"quit\"}\n")
            .build();
        let (tx, mut rx) = mtpdock_lifecycle::event::channel();

        forward_signals(
            BufReader::new(input),
            tx,
            Arc::new(AtomicBool::new(false)),
            DeviceState::new(),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await, Some(LifecycleEvent::BeforeQuit));
    }

    #[tokio::test]
    async fn test_device_session_signals_update_shared_state() {
        let connected = concat!(
            r#"{"type":"deviceInfo","info":{"Manufacturer":"Samsung","Model":"SM-G991B","#,
            r#""MTPVersion":"100"}}"#,
            "\n"
        );
        let input = tokio_test::io::Builder::new()
            .read(connected.as_bytes())
            .read(b"{\"type\":\"activate\"}\n")
            .build();
        let (tx, mut rx) = mtpdock_lifecycle::event::channel();
        let device = DeviceState::new();

        forward_signals(
            BufReader::new(input),
            tx,
            Arc::new(AtomicBool::new(false)),
            device.clone(),
        )
        .await
        .unwrap();

        // device signals produce no lifecycle event
        assert_eq!(rx.recv().await, Some(LifecycleEvent::Activate));
        let info = device.device_info();
        assert_eq!(info.manufacturer.as_deref(), Some("Samsung"));
        assert_eq!(info.model.as_deref(), Some("SM-G991B"));
        assert_eq!(info.mtp_version.as_deref(), Some("100"));

        let input = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"deviceDisconnected\"}\n")
            .build();
        let (tx, _rx) = mtpdock_lifecycle::event::channel();
        forward_signals(
            BufReader::new(input),
            tx,
            Arc::new(AtomicBool::new(false)),
            device.clone(),
        )
        .await
        .unwrap();

        assert!(device.device_info().is_empty());
    }
}
