use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use crate::models::ArchiveError;

/// Fixed-size block reader over a file or any `Read` source
///
/// Memory use is bounded by the chunk size, whatever the source size.
/// Every chunk handed to the consumer is full except possibly the last,
/// so a source of `S` bytes yields exactly `ceil(S / chunk_size)` chunks.
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Open `source` read-only and feed it to `consume` chunk by chunk
    ///
    /// The file handle is dropped on every exit path, including when
    /// `consume` fails. Returns the number of bytes read.
    pub fn for_each_chunk<F>(&self, source: &Path, consume: F) -> Result<u64, ArchiveError>
    where
        F: FnMut(&[u8]) -> Result<(), ArchiveError>,
    {
        let file = File::open(source)
            .map_err(|e| ArchiveError::SourceUnreadable(
                format!("{}: {}", source.display(), e)
            ))?;

        self.drive(file, consume, |e| ArchiveError::SourceUnreadable(
            format!("Failed to read {}: {}", source.display(), e)
        ))
    }

    /// Same as [`Chunker::for_each_chunk`] over an already open reader
    ///
    /// Read failures surface as `ArchiveError::Io`.
    pub fn for_each_chunk_from<R, F>(&self, reader: R, consume: F) -> Result<u64, ArchiveError>
    where
        R: Read,
        F: FnMut(&[u8]) -> Result<(), ArchiveError>,
    {
        self.drive(reader, consume, ArchiveError::Io)
    }

    /// Stream an archive payload into `writer` one chunk at a time
    ///
    /// Read failures mean the archive data is damaged (`CorruptArchive`),
    /// write failures mean the destination is (`DestinationUnwritable`).
    pub fn copy_payload<R: Read, W: Write>(
        &self,
        name: &str,
        reader: R,
        writer: &mut W,
    ) -> Result<u64, ArchiveError> {
        self.drive(
            reader,
            |chunk| {
                writer.write_all(chunk).map_err(|e| ArchiveError::DestinationUnwritable(
                    format!("Failed to write {}: {}", name, e)
                ))
            },
            |e| ArchiveError::CorruptArchive(format!("Failed to read {}: {}", name, e)),
        )
    }

    fn drive<R, F, E>(&self, mut reader: R, mut consume: F, on_read_error: E) -> Result<u64, ArchiveError>
    where
        R: Read,
        F: FnMut(&[u8]) -> Result<(), ArchiveError>,
        E: Fn(io::Error) -> ArchiveError,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;

        loop {
            let n = fill_chunk(&mut reader, &mut buf).map_err(&on_read_error)?;
            if n == 0 {
                break;
            }
            consume(&buf[..n])?;
            total += n as u64;
            if n < buf.len() {
                break;
            }
        }

        Ok(total)
    }

    /// Open `source` behind a buffer sized to the chunk
    pub fn open(&self, source: &Path) -> Result<BufReader<File>, ArchiveError> {
        let file = File::open(source)
            .map_err(|e| ArchiveError::SourceUnreadable(
                format!("{}: {}", source.display(), e)
            ))?;
        Ok(BufReader::with_capacity(self.chunk_size, file))
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_CHUNK_SIZE)
    }
}

/// Read until `buf` is full or the source is exhausted
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
