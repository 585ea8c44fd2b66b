//! Definition sources: the I/O collaborators a [`crate::refresh::Refresher`]
//! drives to keep the cached definition set current.

use crate::config::SourceSpec;
use crate::model::DefinitionSet;
use crate::refresh::RefreshTask;
use anyhow::Result;
use std::time::Duration;

mod file_source;
mod http_source;

pub use file_source::FileSource;
pub use http_source::HttpSource;

/// Build the fetch task for a parsed source address.
///
/// Returns `None` for a disabled source; the caller constructs a no-op client
/// in that case.
pub fn definition_source(
    spec: &SourceSpec,
    timeout: Duration,
) -> Result<Option<Box<dyn RefreshTask<Output = DefinitionSet>>>> {
    match spec {
        SourceSpec::Disabled => Ok(None),
        SourceSpec::Http(base_url) => Ok(Some(Box::new(HttpSource::new(base_url, timeout)?))),
        SourceSpec::File(path) => Ok(Some(Box::new(FileSource::new(path.clone())))),
    }
}
