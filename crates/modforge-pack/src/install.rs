//! Hand a generated module to the runtime installer.

use modforge_client::{InstallResult, Installer};

use crate::archive::Archive;
use crate::error::{ArchiveError, GenerationError};
use crate::module::{tree_digest, GeneratedModule};

/// Re-verify `module`, encode it as an archive and install it.
///
/// A module whose files no longer match its digest is never sent.
pub async fn install_module(installer: &Installer, module: &GeneratedModule) -> Result<InstallResult, GenerationError> {
    let computed = tree_digest(&module.files).map_err(ArchiveError::from)?;
    if computed != module.digest {
        return Err(ArchiveError::DigestMismatch {
            declared: module.digest.to_string(),
            computed: computed.to_string(),
        }
        .into());
    }
    install_archive(installer, &Archive::from_module(module)).await
}

/// Install an archive that was decoded (and so verified) earlier.
pub async fn install_archive(installer: &Installer, archive: &Archive) -> Result<InstallResult, GenerationError> {
    let bytes = archive.encode()?;
    tracing::debug!(module = %archive.module, digest = %archive.digest.short(), bytes = bytes.len(), "archive encoded");
    Ok(installer.install_package(&archive.module, &bytes).await?)
}
