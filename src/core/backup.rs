use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use super::models::ResumeRecord;

const BACKUP_SUBDIR: &str = "resume_files";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// Archives resume files referenced by imported records under
/// `<root>/resume_files/<source>/`. Best-effort by contract: the import
/// pipeline treats every error here as a warning, never as a failed row.
pub struct BackupStore {
    root: PathBuf,
    client: Client,
}

impl BackupStore {
    pub fn new(root: PathBuf, client: Client) -> Self {
        Self { root, client }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy or download the record's resume file into the backup tree.
    /// Returns the backup path, or `None` when the record references nothing
    /// retrievable (no reference at all, or a bare filename with no matching
    /// local file).
    pub async fn backup(
        &self,
        record: &ResumeRecord,
        search_dir: Option<&Path>,
    ) -> anyhow::Result<Option<PathBuf>> {
        let Some(reference) = record
            .resume_file
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };

        if let Some(url) = record.resume_file_url() {
            let target = self.target_path(record, &file_name_from_url(&url)).await?;
            self.download(url.as_str(), &target).await?;
            return Ok(Some(target));
        }

        let Some(local) = locate_local_file(reference, search_dir) else {
            debug!(reference, "no retrievable resume file; skipping backup");
            return Ok(None);
        };

        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| reference.to_string());
        let target = self.target_path(record, &name).await?;
        tokio::fs::copy(&local, &target).await?;
        Ok(Some(target))
    }

    async fn download(&self, url: &str, target: &Path) -> anyhow::Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("download failed with status {status}: {url}");
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(target, &bytes).await?;
        Ok(())
    }

    /// `<root>/resume_files/<source>/<source>_<timestamp>_<name>`, nudged
    /// with a counter suffix in the unlikely case two copies land within the
    /// same millisecond.
    async fn target_path(
        &self,
        record: &ResumeRecord,
        original_name: &str,
    ) -> anyhow::Result<PathBuf> {
        let dir = self
            .root
            .join(BACKUP_SUBDIR)
            .join(record.source.as_str());
        tokio::fs::create_dir_all(&dir).await?;

        let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
        let name = sanitize_file_name(original_name);
        let mut target = dir.join(format!("{}_{}_{}", record.source.as_str(), timestamp, name));

        let mut attempt = 1u32;
        while tokio::fs::try_exists(&target).await.unwrap_or(false) {
            target = dir.join(format!(
                "{}_{}_{}_{}",
                record.source.as_str(),
                timestamp,
                attempt,
                name
            ));
            attempt += 1;
        }

        Ok(target)
    }
}

fn locate_local_file(reference: &str, search_dir: Option<&Path>) -> Option<PathBuf> {
    let reference_path = Path::new(reference);

    if reference_path.is_absolute() {
        return reference_path.is_file().then(|| reference_path.to_path_buf());
    }

    if let Some(dir) = search_dir {
        let candidate = dir.join(reference_path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    reference_path.is_file().then(|| reference_path.to_path_buf())
}

fn file_name_from_url(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .last()
                .map(|segment| segment.to_string())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "resume".to_string())
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "resume".to_string()
    } else {
        cleaned
    }
}
