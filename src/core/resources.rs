//! Tracking of file-backed stage outputs.
//!
//! Files whose name starts with the engine's temporary prefix are deleted at
//! the end of a run; every other file is closed but left on disk. Both lists
//! are released in registration order.

use std::fs;
use std::io::ErrorKind;

use crate::error::{Error, Result};
use crate::value::FileHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Temporary,
    Persistent,
}

pub fn classify(handle: &FileHandle, temp_prefix: &str) -> ResourceClass {
    if handle.file_name().starts_with(temp_prefix) {
        ResourceClass::Temporary
    } else {
        ResourceClass::Persistent
    }
}

/// Outcome of releasing every tracked resource.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub closed: usize,
    pub deleted: usize,
    pub failures: Vec<Error>,
}

impl ReleaseReport {
    /// The first failed release step, in release order.
    pub fn first_error(&self) -> Option<&Error> {
        self.failures.first()
    }
}

#[derive(Debug)]
pub struct ResourceTracker {
    temp_prefix: String,
    persistent: Vec<FileHandle>,
    temporary: Vec<FileHandle>,
}

impl ResourceTracker {
    pub fn new(temp_prefix: impl Into<String>) -> Self {
        Self {
            temp_prefix: temp_prefix.into(),
            persistent: Vec::new(),
            temporary: Vec::new(),
        }
    }

    /// Register `handle` for release. Returns `None` if a handle to the same
    /// path is already tracked; each path is released once.
    pub fn track(&mut self, handle: &FileHandle) -> Option<ResourceClass> {
        if self.is_tracked(handle) {
            return None;
        }
        let class = classify(handle, &self.temp_prefix);
        match class {
            ResourceClass::Temporary => self.temporary.push(handle.clone()),
            ResourceClass::Persistent => self.persistent.push(handle.clone()),
        }
        Some(class)
    }

    pub fn is_tracked(&self, handle: &FileHandle) -> bool {
        self.persistent
            .iter()
            .chain(self.temporary.iter())
            .any(|tracked| tracked.path() == handle.path())
    }

    pub fn persistent(&self) -> &[FileHandle] {
        &self.persistent
    }

    pub fn temporary(&self) -> &[FileHandle] {
        &self.temporary
    }

    /// Close persistent handles, then delete temporary files.
    ///
    /// A failed step does not stop the remaining ones; every failure is
    /// collected in the report.
    pub fn release(self) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        for handle in self.persistent {
            match close(handle) {
                Ok(()) => report.closed += 1,
                Err(err) => report.failures.push(err),
            }
        }

        for handle in self.temporary {
            let path = handle.display_path();
            match delete(handle) {
                Ok(()) => {
                    log_status!("cleanup", "Removed {}", path);
                    report.deleted += 1;
                }
                Err(err) => report.failures.push(err),
            }
        }

        report
    }
}

fn close(handle: FileHandle) -> Result<()> {
    let path = handle.display_path();
    if let Some(file) = handle.take_file() {
        if let Err(e) = file.sync_all() {
            // Read-only descriptors and special files may refuse to sync.
            if !matches!(
                e.kind(),
                ErrorKind::InvalidInput | ErrorKind::Unsupported | ErrorKind::PermissionDenied
            ) {
                return Err(Error::resource_close(path, e.to_string()));
            }
        }
    }
    Ok(())
}

fn delete(handle: FileHandle) -> Result<()> {
    drop(handle.take_file());
    fs::remove_file(handle.path())
        .map_err(|e| Error::resource_delete(handle.display_path(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    const PREFIX: &str = "pipewright-temporary-file";

    #[test]
    fn classify_uses_final_path_component() {
        let temp = FileHandle::closed(format!("/tmp/{}123", PREFIX));
        let named = FileHandle::closed(format!("/tmp/{}/out.txt", PREFIX));
        assert_eq!(classify(&temp, PREFIX), ResourceClass::Temporary);
        assert_eq!(classify(&named, PREFIX), ResourceClass::Persistent);
    }

    #[test]
    fn release_deletes_temporary_and_keeps_persistent() {
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join(format!("{}abc", PREFIX));
        let kept_path = dir.path().join("kept.txt");
        fs::write(&temp_path, "t").unwrap();
        fs::write(&kept_path, "k").unwrap();

        let mut tracker = ResourceTracker::new(PREFIX);
        tracker.track(&FileHandle::closed(&temp_path));
        tracker.track(&FileHandle::open(&kept_path, File::open(&kept_path).unwrap()));
        assert_eq!(tracker.temporary().len(), 1);
        assert_eq!(tracker.persistent().len(), 1);

        let report = tracker.release();
        assert!(report.failures.is_empty());
        assert_eq!(report.closed, 1);
        assert_eq!(report.deleted, 1);
        assert!(!temp_path.exists());
        assert!(kept_path.exists());
    }

    #[test]
    fn failed_delete_does_not_stop_later_releases() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(format!("{}missing", PREFIX));
        let present = dir.path().join(format!("{}present", PREFIX));
        fs::write(&present, "x").unwrap();

        let mut tracker = ResourceTracker::new(PREFIX);
        tracker.track(&FileHandle::closed(&missing));
        tracker.track(&FileHandle::closed(&present));

        let report = tracker.release();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.first_error().unwrap().code.as_str(),
            "resource.delete_failed"
        );
        assert!(!present.exists());
    }

    #[test]
    fn same_path_is_tracked_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}twice", PREFIX));
        fs::write(&path, "x").unwrap();
        let handle = FileHandle::closed(&path);

        let mut tracker = ResourceTracker::new(PREFIX);
        assert_eq!(tracker.track(&handle), Some(ResourceClass::Temporary));
        assert_eq!(tracker.track(&handle.clone()), None);
        assert_eq!(tracker.track(&FileHandle::closed(&path)), None);

        let report = tracker.release();
        assert!(report.failures.is_empty());
        assert_eq!(report.deleted, 1);
        assert!(!path.exists());
    }

    #[test]
    fn closing_releases_descriptor_for_every_clone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.txt");
        fs::write(&path, "k").unwrap();
        let handle = FileHandle::open(&path, File::open(&path).unwrap());
        let returned = handle.clone();

        let mut tracker = ResourceTracker::new(PREFIX);
        tracker.track(&handle);
        let report = tracker.release();

        assert_eq!(report.closed, 1);
        assert!(!returned.is_open());
        assert!(path.exists());
    }
}
