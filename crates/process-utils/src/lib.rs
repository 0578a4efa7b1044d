//! Helpers for the external tools the recorder drives (`rtmpdump`, `swfextract`).
//!
//! Child processes are created without a console window on Windows and killed
//! when their handle is dropped, so an abandoned connection never leaves an
//! orphaned dumper behind.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` for an external tool.
///
/// The command has no console window on Windows and the child is killed when
/// the returned `Child` is dropped.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd.kill_on_drop(true);
    cmd
}

/// Resolve a tool name or path to an executable file.
///
/// A value containing a path separator is checked as-is; a bare name is
/// searched in every `PATH` entry. Returns `None` when nothing executable is
/// found.
pub fn find_executable(program: impl AsRef<Path>) -> Option<PathBuf> {
    let program = program.as_ref();

    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
}

fn candidates(dir: &Path, program: &Path) -> Vec<PathBuf> {
    let plain = dir.join(program);
    #[cfg(windows)]
    {
        if program.extension().is_none() {
            return vec![plain.with_extension("exe"), plain];
        }
    }
    vec![plain]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
