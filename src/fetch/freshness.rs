// src/fetch/freshness.rs

use std::{io::ErrorKind, path::Path, time::SystemTime};
use tracing::warn;

use crate::cache;

/// True when `local` is missing or older than `expire_hour` hours.
///
/// A file whose age equals the window is still fresh. Metadata errors other
/// than "not found" are logged and answered with `true`, so an unreadable
/// cache entry is refreshed rather than trusted.
pub fn needs_fetch(local: &Path, expire_hour: f64) -> bool {
    let modified = match cache::modified(local) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return true,
        Err(e) => {
            warn!(path = %local.display(), error = %e, "cannot stat cached file, refetching");
            return true;
        }
    };

    // mtime in the future: treat as just written
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default()
        .as_secs_f64();

    age > expire_hour * 3600.0
}
