//! Single-instance lock and second-instance signalling.
//!
//! On Unix the lock is an advisory `flock` on `instance.lock` inside the
//! profile root; on Windows it is a session-local named mutex. Whoever holds
//! the lock also listens on a loopback port recorded in `instance.port`, and
//! a launch that loses the race connects there so the running instance can
//! raise its window.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mtpdock_profile::ProfilePaths;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Result};
use crate::event::{EventSender, LifecycleEvent};

/// Line written by a colliding launch.
pub const SECOND_INSTANCE_MESSAGE: &str = "second-instance";

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Process-wide single-instance guard. Released on drop.
pub struct InstanceLock {
    _file: File,
    port_file: PathBuf,
    #[cfg(target_os = "windows")]
    mutex: windows_sys::Win32::Foundation::HANDLE,
}

// SAFETY: the mutex handle is only closed once, in Drop, and is never shared.
#[cfg(target_os = "windows")]
unsafe impl Send for InstanceLock {}

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLock")
            .field("port_file", &self.port_file)
            .finish_non_exhaustive()
    }
}

impl InstanceLock {
    /// Tries to become the single running instance.
    ///
    /// Returns `Ok(None)` if another process already holds the lock.
    pub fn acquire(paths: &ProfilePaths) -> Result<Option<Self>> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&paths.instance_lock)?;

        #[cfg(target_os = "windows")]
        let mutex = match acquire_named_mutex(&paths.root)? {
            Some(handle) => handle,
            None => return Ok(None),
        };

        if !try_lock_exclusive(&file)? {
            debug!(path = %paths.instance_lock.display(), "Instance lock held elsewhere");
            return Ok(None);
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        info!(pid = std::process::id(), "Acquired single-instance lock");

        Ok(Some(Self {
            _file: file,
            port_file: paths.instance_port.clone(),
            #[cfg(target_os = "windows")]
            mutex,
        }))
    }

    /// Starts accepting second-instance notifications.
    ///
    /// Each valid notification is forwarded as [`LifecycleEvent::SecondInstance`].
    pub async fn listen(&self, events: EventSender) -> Result<JoinHandle<()>> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let port = listener.local_addr()?.port();
        fs::write(&self.port_file, port.to_string())?;
        debug!(port, "Listening for second-instance notifications");

        Ok(tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept second-instance connection");
                        continue;
                    }
                };

                let mut line = String::new();
                let mut reader = BufReader::new(stream);
                match tokio::time::timeout(NOTIFY_TIMEOUT, reader.read_line(&mut line)).await {
                    Ok(Ok(_)) if line.trim() == SECOND_INSTANCE_MESSAGE => {
                        info!(%peer, "Second instance requested");
                        if events.send(LifecycleEvent::SecondInstance).is_err() {
                            break;
                        }
                    }
                    Ok(Ok(_)) => debug!(%peer, "Ignoring unknown instance message"),
                    Ok(Err(e)) => debug!(%peer, error = %e, "Instance connection failed"),
                    Err(_) => debug!(%peer, "Instance connection timed out"),
                }
            }
        }))
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.port_file);

        #[cfg(target_os = "windows")]
        {
            // SAFETY: handle came from CreateMutexW and is closed exactly once.
            unsafe {
                windows_sys::Win32::Foundation::CloseHandle(self.mutex);
            }
        }
    }
}

/// Tells the running instance that another launch happened.
///
/// Returns `Ok(false)` when no running instance advertised a port.
pub async fn notify_running_instance(paths: &ProfilePaths) -> Result<bool> {
    let Some(port) = read_port(&paths.instance_port) else {
        return Ok(false);
    };

    let send = async {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await?;
        stream
            .write_all(format!("{SECOND_INSTANCE_MESSAGE}\n").as_bytes())
            .await?;
        stream.shutdown().await?;
        Ok::<_, io::Error>(())
    };

    tokio::time::timeout(NOTIFY_TIMEOUT, send)
        .await
        .map_err(|_| LifecycleError::Lock("timed out notifying running instance".into()))??;

    Ok(true)
}

fn read_port(path: &Path) -> Option<u16> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: fd is a valid descriptor owned by `file` for the duration of the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

#[cfg(not(unix))]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    // Exclusion comes from the named mutex on Windows.
    let _ = file;
    Ok(true)
}

#[cfg(target_os = "windows")]
fn acquire_named_mutex(root: &Path) -> Result<Option<windows_sys::Win32::Foundation::HANDLE>> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS};
    use windows_sys::Win32::System::Threading::CreateMutexW;

    let mut hasher = DefaultHasher::new();
    root.hash(&mut hasher);
    let name = format!("Local\\MtpDockSingleInstance-{:016x}", hasher.finish());
    let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

    // SAFETY: `wide` is a NUL-terminated UTF-16 string that outlives the call.
    let handle = unsafe { CreateMutexW(std::ptr::null(), 0, wide.as_ptr()) };
    if handle.is_null() {
        // SAFETY: plain FFI call with no arguments.
        let code = unsafe { GetLastError() };
        return Err(LifecycleError::Lock(format!(
            "CreateMutexW failed with error {code}"
        )));
    }

    // SAFETY: plain FFI call with no arguments.
    if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
        // SAFETY: handle is valid and not used afterwards.
        unsafe {
            CloseHandle(handle);
        }
        return Ok(None);
    }

    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use tempfile::TempDir;

    fn profile(dir: &TempDir) -> ProfilePaths {
        let paths = ProfilePaths::from_root(dir.path());
        fs::create_dir_all(&paths.root).unwrap();
        paths
    }

    #[test]
    fn test_only_one_holder() {
        let dir = TempDir::new().unwrap();
        let paths = profile(&dir);

        let first = InstanceLock::acquire(&paths).unwrap();
        let second = InstanceLock::acquire(&paths).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let paths = profile(&dir);

        let first = InstanceLock::acquire(&paths).unwrap();
        drop(first);

        assert!(InstanceLock::acquire(&paths).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_acquire_has_one_winner() {
        let dir = TempDir::new().unwrap();
        let paths = profile(&dir);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let paths = paths.clone();
                std::thread::spawn(move || {
                    let lock = InstanceLock::acquire(&paths).unwrap();
                    let won = lock.is_some();
                    // hold until both attempts have run
                    std::thread::sleep(Duration::from_millis(200));
                    drop(lock);
                    won
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_second_instance_notification() {
        let dir = TempDir::new().unwrap();
        let paths = profile(&dir);
        let lock = InstanceLock::acquire(&paths).unwrap().unwrap();
        let (tx, mut rx) = event::channel();

        let _listener = lock.listen(tx).await.unwrap();
        assert!(notify_running_instance(&paths).await.unwrap());

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(LifecycleEvent::SecondInstance));
    }

    #[tokio::test]
    async fn test_notify_without_running_instance() {
        let dir = TempDir::new().unwrap();
        let paths = profile(&dir);
        assert!(!notify_running_instance(&paths).await.unwrap());
    }
}
