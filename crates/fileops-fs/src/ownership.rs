//! Ownership changes through `chownat`.

use std::io;
use std::path::Path;

use rustix::fs::{AtFlags, CWD, Gid, Uid, chownat};

use crate::FsError;

/// Effective user and group of this process.
pub fn current_owner() -> Option<(u32, u32)> {
    Some((rustix::process::geteuid().as_raw(), rustix::process::getegid().as_raw()))
}

/// Change the owner of `path`, leaving the group untouched when `gid` is `None`.
///
/// Symbolic links are followed.
pub(crate) fn chown(path: &Path, uid: u32, gid: Option<u32>) -> Result<(), FsError> {
    let owner = Some(Uid::from_raw(uid));
    let group = gid.map(Gid::from_raw);

    chownat(CWD, path, owner, group, AtFlags::empty())
        .map_err(|errno| FsError::io(path, io::Error::from(errno)))?;

    tracing::trace!(path = %path.display(), uid, ?gid, "ownership changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chown_to_current_owner_succeeds() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("owned.txt");
        std::fs::write(&file, b"data").unwrap();

        let (uid, gid) = current_owner().unwrap();
        chown(&file, uid, Some(gid)).unwrap();
        chown(&file, uid, None).unwrap();
    }

    #[test]
    fn test_chown_missing_path() {
        let result = chown(Path::new("/no/such/file/for/chown"), 0, None);
        assert!(matches!(result, Err(FsError::NotFound { .. })));
    }
}
