//! Recording host for lifecycle tests

use crate::platform::{PlatformError, Presence, TunnelHost};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeHost {
    pub calls: Mutex<Vec<String>>,
    /// Operation names that fail when called
    pub failing: Vec<&'static str>,
    pub interface: Mutex<Option<Presence>>,
    pub files: Mutex<HashMap<PathBuf, String>>,
    /// Overrides the file probe result when set
    pub file_probe: Option<Presence>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.push(op);
        self
    }

    pub fn with_interface(self, presence: Presence) -> Self {
        *self.interface.lock().unwrap() = Some(presence);
        self
    }

    pub fn with_file(self, path: &Path, contents: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        self
    }

    pub fn with_file_probe(mut self, presence: Presence) -> Self {
        self.file_probe = Some(presence);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn record(&self, op: &'static str, detail: &str) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(format!("{} {}", op, detail));
        if self.failing.contains(&op) {
            return Err(PlatformError::CommandFailed {
                command: op.to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("{} failed", op),
            });
        }
        Ok(())
    }
}

impl TunnelHost for FakeHost {
    async fn refresh_package_index(&self) -> Result<(), PlatformError> {
        self.record("refresh", "")
    }

    async fn install_packages(&self, packages: &[String]) -> Result<(), PlatformError> {
        self.record("install", &packages.join(" "))
    }

    async fn ensure_directory(&self, dir: &Path) -> Result<(), PlatformError> {
        self.record("mkdir", &dir.display().to_string())
    }

    async fn install_file(&self, contents: &str, dest: &Path) -> Result<(), PlatformError> {
        self.record("write", &dest.display().to_string())?;
        self.files
            .lock()
            .unwrap()
            .insert(dest.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), PlatformError> {
        self.record("rm", &path.display().to_string())?;
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn tunnel_up(&self, config_path: &Path) -> Result<(), PlatformError> {
        self.record("up", &config_path.display().to_string())?;
        *self.interface.lock().unwrap() = Some(Presence::Present);
        Ok(())
    }

    async fn tunnel_down(&self, config_path: &Path) -> Result<(), PlatformError> {
        self.record("down", &config_path.display().to_string())?;
        *self.interface.lock().unwrap() = Some(Presence::Absent);
        Ok(())
    }

    async fn tunnel_status(&self, interface: &str) -> Result<String, PlatformError> {
        self.record("show", interface)?;
        Ok(format!("interface: {}\n", interface))
    }

    async fn probe_interface(&self, interface: &str) -> Presence {
        let _ = self.record("probe-interface", interface);
        self.interface
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Presence::Absent)
    }

    async fn probe_file(&self, path: &Path) -> Presence {
        let _ = self.record("probe-file", &path.display().to_string());
        if let Some(presence) = &self.file_probe {
            return presence.clone();
        }
        if self.files.lock().unwrap().contains_key(path) {
            Presence::Present
        } else {
            Presence::Absent
        }
    }
}
