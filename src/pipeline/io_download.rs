// Fetching the AEC and ABS downloads.

use crate::pipeline::*;

/// Downloads `url` into `path`, unless the file is already there.
///
/// There is no retry: a failed request stops the analysis.
pub fn fetch_if_missing(url: &str, path: &Path) -> AnalysisResult<bool> {
    if path.exists() {
        debug!("fetch_if_missing: {} already present", path.display());
        return Ok(false);
    }
    info!("Downloading {} to {}", url, path.display());
    let resp = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .context(DownloadSnafu { url })?;
    let bytes = resp.bytes().context(DownloadSnafu { url })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(WritingFileSnafu {
            path: parent.display().to_string(),
        })?;
    }
    fs::write(path, &bytes).context(WritingFileSnafu {
        path: path.display().to_string(),
    })?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tpp.csv");
        fs::write(&p, "a,b\n").unwrap();
        // The URL is never contacted.
        let fetched = fetch_if_missing("http://127.0.0.1:9/tpp.csv", &p).unwrap();
        assert!(!fetched);
        assert_eq!(fs::read_to_string(&p).unwrap(), "a,b\n");
    }

    #[test]
    fn failed_download() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("missing.csv");
        let res = fetch_if_missing("http://127.0.0.1:9/missing.csv", &p);
        assert!(matches!(res, Err(AnalysisError::Download { .. })));
        assert!(!p.exists());
    }
}
