use crate::model::DefinitionSet;
use crate::refresh::{RefreshOutcome, RefreshTask};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;

/// Local file fetch gated on the file's modification time.
///
/// The file is re-read and re-parsed in full only when its mtime moves past
/// the last observed one.
pub struct FileSource {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }
}

#[async_trait]
impl RefreshTask for FileSource {
    type Output = DefinitionSet;

    async fn run(&mut self) -> Result<RefreshOutcome<DefinitionSet>> {
        let modified = tokio::fs::metadata(&self.path).await?.modified()?;
        if let Some(last) = self.last_modified
            && modified <= last
        {
            return Ok(RefreshOutcome::Unchanged);
        }
        tracing::debug!(path = %self.path.display(), "reading definitions file");
        let body = tokio::fs::read_to_string(&self.path).await?;
        let definitions: DefinitionSet = serde_json::from_str(&body)?;
        self.last_modified = Some(modified);
        Ok(RefreshOutcome::Updated(definitions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"{"features": [{"name": "featureX", "enabled": true, "strategies": []}]}"#;

    #[tokio::test]
    async fn reads_once_until_mtime_moves() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(BODY.as_bytes())?;
        file.flush()?;

        let mut source = FileSource::new(file.path());
        match source.run().await? {
            RefreshOutcome::Updated(set) => assert_eq!(set.features.len(), 1),
            RefreshOutcome::Unchanged => panic!("first read must produce a value"),
        }
        assert!(matches!(source.run().await?, RefreshOutcome::Unchanged));
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_reported_as_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut source = FileSource::new(dir.path().join("absent.json"));
        assert!(source.run().await.is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_reported_as_failure() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"{not json")?;
        file.flush()?;

        let mut source = FileSource::new(file.path());
        assert!(source.run().await.is_err());
        Ok(())
    }
}
