use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap2::MmapMut;
use tracing::debug;

use super::EditBuffer;

/// A file opened read-write and mapped into memory.
///
/// Resizing flushes and drops the current mapping, changes the file length
/// with [`File::set_len`], and maps the file again.  The mapping and the
/// descriptor are released when the value is dropped, whichever way the
/// caller exits.
pub struct MappedFile {
    file: File,
    map:  Option<MmapMut>,
}

impl MappedFile {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let map = Self::map(&file)?;
        Ok(Self { file, map })
    }

    fn map(file: &File) -> io::Result<Option<MmapMut>> {
        if file.metadata()?.len() == 0 {
            return Ok(None);
        }
        // SAFETY: the file is opened by this process for exclusive editing;
        // concurrent external modification is unsupported.
        let map = unsafe { MmapMut::map_mut(file)? };
        Ok(Some(map))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Write dirty pages back to the file.
    pub fn flush(&self) -> io::Result<()> {
        match &self.map {
            Some(m) => m.flush(),
            None    => Ok(()),
        }
    }
}

impl EditBuffer for MappedFile {
    fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.map.as_deref_mut().unwrap_or(&mut [])
    }

    fn resize(&mut self, new_len: usize) -> io::Result<()> {
        let old_len = self.len();
        if let Some(map) = self.map.take() {
            map.flush()?;
        }
        self.file.set_len(new_len as u64)?;
        self.map = Self::map(&self.file)?;
        debug!(old_len, new_len, "resized mapped file");
        Ok(())
    }
}
