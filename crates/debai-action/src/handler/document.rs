//! Document generation collaborator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::CollaboratorError;
use crate::handler::render;
use crate::types::{ActionDetail, DocumentFormat, DocumentRequest};

const MAX_STEM_LEN: usize = 80;

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Write the document under `output_dir` and return its path.
    async fn generate(
        &self,
        request: &DocumentRequest,
        output_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError>;
}

/// Reduce a requested name to a safe file stem: letters, digits, `-` and
/// `_` only, spaces become underscores, any extension is dropped.
pub fn sanitize_stem(name: &str) -> String {
    let name = name.trim();
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if ext.parse::<DocumentFormat>().is_ok() => stem,
        _ => name,
    };

    let mut out = String::new();
    for c in stem.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else if (c.is_whitespace() || c == '.') && !out.ends_with('_') {
            out.push('_');
        }
    }
    let out: String = out.trim_matches('_').chars().take(MAX_STEM_LEN).collect();
    if out.is_empty() {
        "document".to_string()
    } else {
        out
    }
}

/// File name for a request: the requested name, else one derived from
/// the title, with the format's extension.
pub fn file_name_for(request: &DocumentRequest) -> String {
    let stem = sanitize_stem(request.filename.as_deref().unwrap_or(&request.title));
    format!("{}.{}", stem, request.format.extension())
}

/// Renders documents to local files.
#[derive(Debug, Default)]
pub struct FileRenderer;

impl FileRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentRenderer for FileRenderer {
    async fn generate(
        &self,
        request: &DocumentRequest,
        output_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?;
        let path = output_dir.join(file_name_for(request));

        let job = request.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || render::render(&job, &target))
            .await
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?;
        Ok(path)
    }
}

/// Generate one document.
pub async fn create_document(
    renderer: &dyn DocumentRenderer,
    request: &DocumentRequest,
    output_dir: &Path,
) -> Result<ActionDetail, CollaboratorError> {
    let path = renderer.generate(request, output_dir).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!(path = %path.display(), format = %request.format, "Document created");
    Ok(ActionDetail::DocumentCreated {
        title: request.title.clone(),
        format: request.format,
        filename,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Section;

    fn request(format: DocumentFormat, filename: Option<&str>) -> DocumentRequest {
        DocumentRequest {
            format,
            title: "Q3 Summary".to_string(),
            filename: filename.map(str::to_string),
            sections: vec![Section {
                heading: None,
                body: "Revenue grew.".to_string(),
            }],
        }
    }

    // ---- filenames ----

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("Q3 Summary"), "Q3_Summary");
        assert_eq!(sanitize_stem("report.pdf"), "report");
        assert_eq!(sanitize_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_stem("a  b!!c"), "a_bc");
        assert_eq!(sanitize_stem("v1.2 notes"), "v1_2_notes");
        assert_eq!(sanitize_stem("***"), "document");
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(
            file_name_for(&request(DocumentFormat::Pdf, None)),
            "Q3_Summary.pdf"
        );
        assert_eq!(
            file_name_for(&request(DocumentFormat::Xlsx, Some("budget"))),
            "budget.xlsx"
        );
    }

    // ---- rendering ----

    #[tokio::test]
    async fn test_create_document_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("generated").join("s1");
        let detail = create_document(&FileRenderer::new(), &request(DocumentFormat::Txt, None), &out)
            .await
            .unwrap();
        match detail {
            ActionDetail::DocumentCreated { filename, path, .. } => {
                assert_eq!(filename, "Q3_Summary.txt");
                let text = std::fs::read_to_string(path).unwrap();
                assert!(text.starts_with("Q3 Summary\n"));
                assert!(text.contains("Revenue grew."));
            }
            other => panic!("unexpected detail: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = FileRenderer::new()
            .generate(&request(DocumentFormat::Docx, None), &blocker.join("sub"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Generation(_)));
    }
}
