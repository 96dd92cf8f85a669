//! Fixed-page-size file I/O.
//!
//! Pages are addressed by integer page number. The file grows by whole
//! pages; nothing here knows about page contents or the log. Writes
//! reach this layer only after the records covering them are durable.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::wal::PageNo;

/// A store file sliced into fixed-size pages.
pub struct PagedFile {
    path: PathBuf,
    file: File,
    page_size: usize,
    page_count: PageNo,
}

impl PagedFile {
    /// Opens or creates a paged file.
    pub fn open(path: &Path, page_size: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let len = file.metadata()?.len();
        let page_count = (len / page_size as u64) as PageNo;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            page_size,
            page_count,
        })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages the file currently holds, allocated included.
    pub fn page_count(&self) -> PageNo {
        self.page_count
    }

    /// Configured page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reserves the next page number. The page materializes on disk on
    /// its first write.
    pub fn allocate(&mut self) -> PageNo {
        let no = self.page_count;
        self.page_count += 1;
        no
    }

    /// Reads one page. The page must have been written before.
    pub fn read_page(&mut self, page_no: PageNo) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.page_size];
        self.file
            .seek(SeekFrom::Start(page_no as u64 * self.page_size as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes one page image.
    pub fn write_page(&mut self, page_no: PageNo, data: &[u8]) -> io::Result<()> {
        debug_assert_eq!(data.len(), self.page_size);
        self.file
            .seek(SeekFrom::Start(page_no as u64 * self.page_size as u64))?;
        self.file.write_all(data)?;
        if page_no >= self.page_count {
            self.page_count = page_no + 1;
        }
        Ok(())
    }

    /// fsyncs the file.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}
