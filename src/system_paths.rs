use std::path::{Path, PathBuf};

// Centralized helpers for folders rooted at the database root.

#[inline]
pub fn system_root(db_root: &Path) -> PathBuf { db_root.join(".system") }

/// Integrity reports written by `membership-admin integrity --output`.
#[inline]
pub fn integrity_reports_dir(db_root: &Path) -> PathBuf { system_root(db_root).join("integrity") }

#[inline]
pub fn integrity_report_file(db_root: &Path, run_id: u64) -> PathBuf {
    integrity_reports_dir(db_root).join(format!("run_{:06}.txt", run_id))
}

/// Bucket used for user avatars, namespaced by deployment prefix.
#[inline]
pub fn user_image_bucket(prefix: &str) -> String { format!("{}-user-images", prefix) }
