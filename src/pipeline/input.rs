//! Input resolution: turn a path or URL into a local PDF file.
//!
//! pdfium opens files by path, so URLs are downloaded into a [`TempDir`]
//! that lives as long as the returned [`SourceInput`]. Both paths check the
//! `%PDF` magic up front so a wrong file fails with [`PdfMorphError::NotAPdf`]
//! instead of an opaque pdfium load error.

use crate::error::PdfMorphError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A local PDF ready to be opened.
#[derive(Debug)]
pub enum SourceInput {
    Local(PathBuf),
    /// Downloaded from a URL; the directory is removed on drop.
    Downloaded { path: PathBuf, _dir: TempDir },
}

impl SourceInput {
    pub fn path(&self) -> &Path {
        match self {
            SourceInput::Local(p) => p,
            SourceInput::Downloaded { path, .. } => path,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF, downloading it when it is a URL.
pub async fn resolve(input: &str, download_timeout_secs: u64) -> Result<SourceInput, PdfMorphError> {
    if is_url(input) {
        download(input, download_timeout_secs).await
    } else {
        resolve_local(Path::new(input)).map(SourceInput::Local)
    }
}

fn resolve_local(path: &Path) -> Result<PathBuf, PdfMorphError> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PdfMorphError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PdfMorphError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    if file.metadata().map(|m| m.is_dir()).unwrap_or(false) {
        return Err(PdfMorphError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut head = Vec::with_capacity(4);
    file.by_ref()
        .take(4)
        .read_to_end(&mut head)
        .map_err(|e| PdfMorphError::CorruptPdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    check_magic(path, &head)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(path.to_path_buf())
}

/// Fail with [`PdfMorphError::NotAPdf`] unless `head` starts with `%PDF`.
fn check_magic(path: &Path, head: &[u8]) -> Result<(), PdfMorphError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(PdfMorphError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download(url: &str, timeout_secs: u64) -> Result<SourceInput, PdfMorphError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| PdfMorphError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfMorphError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            PdfMorphError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let dir = TempDir::new().map_err(|e| PdfMorphError::Internal(e.to_string()))?;
    let path = dir.path().join(file_name_for(url));
    check_magic(&path, &bytes)?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| PdfMorphError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(SourceInput::Downloaded { path, _dir: dir })
}

/// Last URL path segment when it looks like a file name.
fn file_name_for(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| last.contains('.') && !last.contains(['/', '\\']))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn file_name_from_url() {
        assert_eq!(file_name_for("https://x.org/papers/a.pdf"), "a.pdf");
        assert_eq!(file_name_for("https://x.org/papers/"), "downloaded.pdf");
        assert_eq!(file_name_for("https://x.org/get?id=3"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, PdfMorphError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn wrong_magic_is_not_a_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"GIF89a...").unwrap();
        let err = resolve(tmp.path().to_str().unwrap(), 5).await.unwrap_err();
        match err {
            PdfMorphError::NotAPdf { magic, .. } => assert_eq!(&magic, b"GIF8"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn short_file_is_not_a_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%P").unwrap();
        let err = resolve(tmp.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, PdfMorphError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn pdf_magic_resolves_locally() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), tmp.path());
    }
}
