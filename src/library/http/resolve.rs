use crate::library::http::types::RequestOutcome;
use memmap2::Mmap;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::trace;

/// A resolved file ready for zero-copy transmission. The mapping is
/// released on drop, on every exit path. Zero-length files carry no
/// mapping at all (mapping an empty file is an EINVAL).
#[derive(Debug)]
pub struct MappedFile {
    map: Option<Mmap>,
    len: usize,
}

impl MappedFile {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

/// Resolve a request target against the document root.
///
/// Outcomes in priority order: metadata unavailable, not world-readable,
/// directory, mappable file. The raw target is joined as-is; there is no
/// normalization of the path.
pub fn resolve(doc_root: &Path, target: &[u8]) -> Result<MappedFile, RequestOutcome> {
    // The parser guarantees a leading '/'; strip it so the join stays
    // under the root instead of replacing it.
    let relative = target.strip_prefix(b"/").unwrap_or(target);
    let path: PathBuf = doc_root.join(Path::new(std::ffi::OsStr::from_bytes(relative)));
    trace!("resolving {:?}", path);

    let meta = match std::fs::metadata(&path) {
        Ok(meta) => meta,
        Err(_) => return Err(RequestOutcome::NoResource),
    };
    if meta.mode() & libc::S_IROTH as u32 == 0 {
        return Err(RequestOutcome::ForbiddenRequest);
    }
    if meta.is_dir() {
        return Err(RequestOutcome::BadRequest);
    }

    let len = meta.len() as usize;
    if len == 0 {
        return Ok(MappedFile { map: None, len: 0 });
    }
    let file = File::open(&path).map_err(|_| RequestOutcome::NoResource)?;
    let map = unsafe { Mmap::map(&file) }.map_err(|_| RequestOutcome::InternalError)?;
    Ok(MappedFile {
        map: Some(map),
        len,
    })
}
