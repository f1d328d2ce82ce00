//! Linux host: apt-get, wg-quick and coreutils
//!
//! Commands are spawned as argument vectors, never through a shell. When the
//! process is not running as root, privileged commands are prefixed with
//! `sudo -n` (runners grant passwordless sudo; anything else fails fast
//! instead of waiting on a password prompt).

use super::{PlatformError, Presence, TunnelHost};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::debug;

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
    privileged: bool,
}

impl Invocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            privileged: false,
        }
    }

    /// Command that needs root
    pub fn privileged(program: &str) -> Self {
        Self {
            privileged: true,
            ..Self::new(program)
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Full argv, with `sudo -n` in front when elevation is needed
    pub fn argv(&self, use_sudo: bool) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 3);
        if self.privileged && use_sudo {
            argv.push(OsString::from("sudo"));
            argv.push(OsString::from("-n"));
        }
        argv.push(OsString::from(&self.program));
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn command(&self, use_sudo: bool) -> Command {
        let argv = self.argv(use_sudo);
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).stdin(Stdio::null());
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

pub struct LinuxHost {
    staging_dir: PathBuf,
    use_sudo: bool,
}

impl LinuxHost {
    pub fn new(staging_dir: PathBuf) -> Self {
        Self::with_sudo(staging_dir, !running_as_root())
    }

    pub fn with_sudo(staging_dir: PathBuf, use_sudo: bool) -> Self {
        Self {
            staging_dir,
            use_sudo,
        }
    }

    async fn spawn(&self, invocation: &Invocation) -> Result<Output, PlatformError> {
        debug!("Running: {}", invocation);
        invocation
            .command(self.use_sudo)
            .output()
            .await
            .map_err(|source| PlatformError::SpawnError {
                command: invocation.to_string(),
                source,
            })
    }

    /// Run to completion; a non-zero exit is an error
    async fn run(&self, invocation: Invocation) -> Result<Output, PlatformError> {
        let output = self.spawn(&invocation).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformError::CommandFailed {
                command: invocation.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

impl TunnelHost for LinuxHost {
    async fn refresh_package_index(&self) -> Result<(), PlatformError> {
        self.run(Invocation::privileged("apt-get").args(["-q", "update"]))
            .await?;
        Ok(())
    }

    async fn install_packages(&self, packages: &[String]) -> Result<(), PlatformError> {
        self.run(
            Invocation::privileged("apt-get")
                .args(["-q", "-y", "install"])
                .args(packages),
        )
        .await?;
        Ok(())
    }

    async fn ensure_directory(&self, dir: &Path) -> Result<(), PlatformError> {
        self.run(Invocation::privileged("mkdir").arg("-p").arg(dir))
            .await?;
        Ok(())
    }

    async fn install_file(&self, contents: &str, dest: &Path) -> Result<(), PlatformError> {
        // Dropping the staged path cleans up if the move never happens
        let staged = stage_file(&self.staging_dir, contents)?;

        self.run(Invocation::privileged("mv").arg(&*staged).arg(dest))
            .await?;
        self.run(Invocation::privileged("chmod").arg("600").arg(dest))
            .await?;
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), PlatformError> {
        self.run(Invocation::privileged("rm").arg(path)).await?;
        Ok(())
    }

    async fn tunnel_up(&self, config_path: &Path) -> Result<(), PlatformError> {
        self.run(Invocation::privileged("wg-quick").arg("up").arg(config_path))
            .await?;
        Ok(())
    }

    async fn tunnel_down(&self, config_path: &Path) -> Result<(), PlatformError> {
        self.run(Invocation::privileged("wg-quick").arg("down").arg(config_path))
            .await?;
        Ok(())
    }

    async fn tunnel_status(&self, interface: &str) -> Result<String, PlatformError> {
        let output = self
            .run(Invocation::privileged("wg").arg("show").arg(interface))
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn probe_interface(&self, interface: &str) -> Presence {
        let invocation = Invocation::new("ip").args(["link", "show"]).arg(interface);
        match self.spawn(&invocation).await {
            Ok(output) => interface_presence(&output),
            Err(e) => Presence::Indeterminate(e.to_string()),
        }
    }

    async fn probe_file(&self, path: &Path) -> Presence {
        let invocation = Invocation::privileged("test").arg("-f").arg(path);
        match self.spawn(&invocation).await {
            Ok(output) => file_presence(&output),
            Err(e) => Presence::Indeterminate(e.to_string()),
        }
    }
}

/// `ip link show` exits 1 with "does not exist" for a missing device
fn interface_presence(output: &Output) -> Presence {
    if output.status.success() {
        return Presence::Present;
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("does not exist") {
        Presence::Absent
    } else {
        Presence::Indeterminate(format!("{}: {}", output.status, stderr.trim()))
    }
}

/// `test -f` exits 1 silently for false and greater than 1 on error.
///
/// `sudo` also exits 1 when it cannot elevate, but it always says why on
/// stderr, so exit 1 only means absent when stderr is empty.
fn file_presence(output: &Output) -> Presence {
    let stderr_empty = output.stderr.iter().all(u8::is_ascii_whitespace);
    match output.status.code() {
        Some(0) => Presence::Present,
        Some(1) if stderr_empty => Presence::Absent,
        _ => Presence::Indeterminate(format!(
            "{}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )),
    }
}

/// Write `contents` to a fresh owner-only file under `dir`
fn stage_file(dir: &Path, contents: &str) -> std::io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(".wg-action-")
        .suffix(".conf")
        .tempfile_in(dir)?;
    set_owner_only(file.path())?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    Ok(file.into_temp_path())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::TempDir;

    fn output(code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn unprivileged_host(dir: &TempDir) -> LinuxHost {
        LinuxHost::with_sudo(dir.path().to_path_buf(), false)
    }

    #[test]
    fn test_argv_with_and_without_sudo() {
        let inv = Invocation::privileged("wg-quick")
            .arg("up")
            .arg(Path::new("/etc/wireguard/wg0.conf"));

        assert_eq!(
            inv.argv(true),
            vec!["sudo", "-n", "wg-quick", "up", "/etc/wireguard/wg0.conf"]
        );
        assert_eq!(inv.argv(false), vec!["wg-quick", "up", "/etc/wireguard/wg0.conf"]);
        assert_eq!(inv.to_string(), "wg-quick up /etc/wireguard/wg0.conf");
    }

    #[test]
    fn test_unprivileged_never_uses_sudo() {
        let inv = Invocation::new("ip").args(["link", "show", "wg0"]);
        assert_eq!(inv.argv(true), vec!["ip", "link", "show", "wg0"]);
    }

    #[test]
    fn test_interface_presence() {
        assert_eq!(interface_presence(&output(0, "")), Presence::Present);
        assert_eq!(
            interface_presence(&output(1, "Device \"wg0\" does not exist.\n")),
            Presence::Absent
        );
        assert!(matches!(
            interface_presence(&output(255, "RTNETLINK answers: Operation not permitted")),
            Presence::Indeterminate(_)
        ));
    }

    #[test]
    fn test_file_presence() {
        assert_eq!(file_presence(&output(0, "")), Presence::Present);
        assert_eq!(file_presence(&output(1, "")), Presence::Absent);
        assert!(matches!(
            file_presence(&output(2, "test: extra argument")),
            Presence::Indeterminate(_)
        ));
    }

    #[test]
    fn test_file_presence_sudo_failure_is_not_absent() {
        for stderr in [
            "sudo: a terminal is required to read the password; either use the -S option to read from standard input or configure an askpass helper",
            "sudo: a password is required\n",
        ] {
            match file_presence(&output(1, stderr)) {
                Presence::Indeterminate(reason) => assert!(reason.contains("sudo:")),
                other => panic!("{:?} classified as {:?}", stderr, other),
            }
        }
    }

    #[test]
    fn test_file_probe_argv_never_prompts() {
        let inv = Invocation::privileged("test")
            .arg("-f")
            .arg(Path::new("/etc/wireguard/wg0.conf"));
        assert_eq!(
            inv.argv(true),
            vec!["sudo", "-n", "test", "-f", "/etc/wireguard/wg0.conf"]
        );
    }

    #[test]
    fn test_stage_file_is_owner_only() {
        let dir = TempDir::new().unwrap();
        let staged = stage_file(dir.path(), "[Interface]\n").unwrap();

        let meta = std::fs::metadata(&staged).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&staged).unwrap(), "[Interface]\n");

        let path = staged.to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_install_file_moves_into_place() {
        let stage = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let dest = target.path().join("wg0.conf");
        let host = unprivileged_host(&stage);

        host.install_file("[Interface]\nPrivateKey = x\n", &dest)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "[Interface]\nPrivateKey = x\n"
        );
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_dir(stage.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_install_file_overwrites() {
        let stage = TempDir::new().unwrap();
        let dest = stage.path().join("sub").join("wg0.conf");
        let host = unprivileged_host(&stage);

        host.ensure_directory(dest.parent().unwrap()).await.unwrap();
        host.install_file("first", &dest).await.unwrap();
        host.install_file("second", &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_probe_and_remove_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wg0.conf");
        std::fs::write(&path, "x").unwrap();
        let host = unprivileged_host(&dir);

        assert_eq!(host.probe_file(&path).await, Presence::Present);
        host.remove_file(&path).await.unwrap();
        assert_eq!(host.probe_file(&path).await, Presence::Absent);
    }

    #[tokio::test]
    async fn test_remove_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let host = unprivileged_host(&dir);

        let err = host
            .remove_file(&dir.path().join("missing.conf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let host = unprivileged_host(&dir);

        let err = host
            .run(Invocation::new("definitely-not-a-real-binary-wg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::SpawnError { .. }));
    }
}
