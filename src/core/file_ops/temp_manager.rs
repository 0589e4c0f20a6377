use tempfile::TempDir;
use std::path::{Path, PathBuf};
use std::fs;
use crate::models::ArchiveError;

/// Hidden scratch directory next to an archive destination
///
/// Archives are built at [`StagingArea::artifact_path`] and moved over
/// the destination by [`StagingArea::commit`]. Because the scratch
/// directory shares the destination's parent, the final move is a plain
/// rename on the same filesystem: readers see either the old file or the
/// complete new one. Dropping the area without committing removes
/// everything it holds and leaves the destination untouched.
pub struct StagingArea {
    temp_dir: TempDir,
    artifact_path: PathBuf,
}

impl StagingArea {
    /// Create a staging area in the directory that will hold `destination`
    pub fn beside(destination: &Path) -> Result<Self, ArchiveError> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let file_name = destination
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ArchiveError::DestinationUnwritable(
                format!("{} is not a file path", destination.display())
            ))?;

        let temp_dir = tempfile::Builder::new()
            .prefix(".iarchive_")
            .tempdir_in(&parent)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create staging directory in {}: {}", parent.display(), e)
            ))?;

        let artifact_path = temp_dir.path().join(file_name);

        Ok(Self {
            temp_dir,
            artifact_path,
        })
    }

    /// Where the new artifact must be written (does not exist yet)
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    #[cfg(test)]
    fn base_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Move the finished artifact over `destination`
    pub fn commit(self, destination: &Path) -> Result<(), ArchiveError> {
        if !self.artifact_path.is_file() {
            return Err(ArchiveError::DestinationUnwritable(
                format!("No artifact was produced for {}", destination.display())
            ));
        }

        fs::rename(&self.artifact_path, destination)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to move archive into {}: {}", destination.display(), e)
            ))?;

        log::debug!("committed staged artifact to {}", destination.display());
        Ok(())
    }
}
