//! Writing the rendered document.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::BootstrapError;

/// Mode of the written kubeadm file.
pub const KUBEADM_FILE_MODE: u32 = 0o644;

/// Where the document ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Written to this path.
    Written(PathBuf),
    /// Printed to the given writer (dry-run).
    Printed,
}

/// Print `document` to `stdout` on dry-run, otherwise write it to `path`.
///
/// The parent directory must already exist.
pub fn write_document<W: Write>(
    document: &str,
    path: &Path,
    dry_run: bool,
    stdout: &mut W,
) -> Result<Outcome, BootstrapError> {
    if dry_run {
        writeln!(stdout, "{document}")
            .map_err(|e| BootstrapError::io("Error printing kubeadm config", e))?;
        stdout
            .flush()
            .map_err(|e| BootstrapError::io("Error printing kubeadm config", e))?;
        return Ok(Outcome::Printed);
    }

    let context = || format!("Error writing kubeadm file {}", path.display());
    std::fs::write(path, document).map_err(|e| BootstrapError::io(context(), e))?;
    set_mode(path).map_err(|e| BootstrapError::io(context(), e))?;

    info!("Wrote kubeadm file to {}", path.display());
    Ok(Outcome::Written(path.to_path_buf()))
}

#[cfg(unix)]
fn set_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(KUBEADM_FILE_MODE))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
