use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use bytes::{Bytes, BytesMut};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

/// Creates the enclosing directory for `path`, recursively and idempotently.
pub(crate) fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Opens `path` for positional read-write, creating it if missing, without truncating.
pub(crate) fn open_rw_create(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).create(true).open(path)
}

/// Drops `file`, modeling the worker's "close" step. No fsync policy: crash
/// durability is out of scope, and this store's whole point is cheap,
/// frequent open/close churn under FD pressure.
pub(crate) fn close(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

/// Reads exactly `size` bytes from `offset`. Returns `Ok(bytes)` only when the
/// OS delivered exactly `size` bytes; any other outcome is the caller's concern.
#[cfg(unix)]
pub(crate) fn read_exact_at(file: &File, offset: u64, size: u32) -> io::Result<(Bytes, usize)> {
    let mut buf = BytesMut::zeroed(size as usize);
    let n = file.read_at(&mut buf, offset)?;
    buf.truncate(n);
    Ok((buf.freeze(), n))
}

#[cfg(windows)]
pub(crate) fn read_exact_at(file: &File, offset: u64, size: u32) -> io::Result<(Bytes, usize)> {
    let mut buf = BytesMut::zeroed(size as usize);
    let n = file.seek_read(&mut buf, offset)?;
    buf.truncate(n);
    Ok((buf.freeze(), n))
}

#[cfg(unix)]
pub(crate) fn write_at(file: &File, offset: u64, data: &[u8]) -> io::Result<usize> {
    file.write_at(data, offset)
}

#[cfg(windows)]
pub(crate) fn write_at(file: &File, offset: u64, data: &[u8]) -> io::Result<usize> {
    file.seek_write(data, offset)
}
