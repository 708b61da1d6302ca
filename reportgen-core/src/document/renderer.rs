//! External document rendering and all-or-nothing output.

use super::PageSetup;
use crate::{ReportError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

/// Turns report markup into a paginated document.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Writes the document for `markup` to `output`.
    ///
    /// The markup already carries an `@page` rule matching `page`.
    ///
    /// # Errors
    /// Returns `ReportError::DocumentRender` on failure.
    async fn render(&self, markup: &str, page: &PageSetup, output: &Path) -> Result<()>;
}

/// Runs an external program with the markup on stdin.
///
/// The default is `weasyprint - <output>`.
#[derive(Debug, Clone)]
pub struct CommandDocumentRenderer {
    program: String,
    args: Vec<String>,
}

impl Default for CommandDocumentRenderer {
    fn default() -> Self {
        Self::new("weasyprint").with_args(["-"])
    }
}

impl CommandDocumentRenderer {
    /// Runs `program <output>`; add arguments with [`Self::with_args`].
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Builder method to set the arguments placed before the output path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program this renderer runs.
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl DocumentRenderer for CommandDocumentRenderer {
    async fn render(&self, markup: &str, page: &PageSetup, output: &Path) -> Result<()> {
        tracing::debug!(
            "Running {} for a {} page ({})",
            self.program,
            page.paper_size,
            page.orientation
        );

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReportError::document_failed(format!("failed to run '{}': {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(markup.as_bytes()).await {
                Ok(()) => {}
                // The exit status below explains why the program stopped reading
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("'{}' closed stdin early", self.program);
                }
                Err(e) => {
                    return Err(ReportError::document_failed(format!(
                        "failed to send markup to '{}': {}",
                        self.program, e
                    )));
                }
            }
        }

        let result = child.wait_with_output().await.map_err(|e| {
            ReportError::document_failed(format!("'{}' did not finish: {}", self.program, e))
        })?;

        if !result.status.success() {
            return Err(ReportError::document_failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Renders into a temporary file next to `output`, then moves it into place.
///
/// On any failure the temporary file is removed and `output` is left as it
/// was: no partial document is ever written.
///
/// # Errors
/// Returns `ReportError::DocumentRender` if the renderer fails or produces
/// an empty file, and `ReportError::Io` if the file cannot be staged or
/// persisted.
pub async fn write_document(
    renderer: &dyn DocumentRenderer,
    markup: &str,
    page: &PageSetup,
    output: &Path,
) -> Result<()> {
    let parent = output
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let suffix = output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let staged = tempfile::Builder::new()
        .prefix(".reportgen-")
        .suffix(&suffix)
        .tempfile_in(parent)
        .map_err(|e| {
            ReportError::io(
                format!("Failed to create temporary file in {}", parent.display()),
                e,
            )
        })?;

    renderer.render(markup, page, staged.path()).await?;

    let written = tokio::fs::metadata(staged.path())
        .await
        .map_err(|e| ReportError::io("Failed to inspect rendered document", e))?;
    if written.len() == 0 {
        return Err(ReportError::document_failed(
            "renderer exited successfully but produced an empty document",
        ));
    }

    // Staged files are created owner-only; published documents are not
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o644))
            .await
            .map_err(|e| ReportError::io("Failed to set document permissions", e))?;
    }

    staged.persist(output).map_err(|e| {
        ReportError::io(format!("Failed to persist {}", output.display()), e.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Orientation, PaperSize};

    struct WritesBytes(&'static [u8]);

    #[async_trait]
    impl DocumentRenderer for WritesBytes {
        async fn render(&self, _markup: &str, _page: &PageSetup, output: &Path) -> Result<()> {
            tokio::fs::write(output, self.0)
                .await
                .map_err(|e| ReportError::io("write", e))
        }
    }

    struct Fails;

    #[async_trait]
    impl DocumentRenderer for Fails {
        async fn render(&self, _markup: &str, _page: &PageSetup, output: &Path) -> Result<()> {
            tokio::fs::write(output, b"partial").await.ok();
            Err(ReportError::document_failed("boom"))
        }
    }

    fn page() -> PageSetup {
        PageSetup::new(PaperSize::A4, Orientation::Portrait, 36.0)
    }

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_success_persists_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.pdf");
        write_document(&WritesBytes(b"%PDF-1.7"), "<html/>", &page(), &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.7");
        assert_eq!(entries(dir.path()), vec!["report.pdf".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_persisted_output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.pdf");
        write_document(&WritesBytes(b"%PDF-1.7"), "<html/>", &page(), &output)
            .await
            .unwrap();
        let mode = std::fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.pdf");
        let result = write_document(&Fails, "<html/>", &page(), &output).await;
        assert!(matches!(result, Err(ReportError::DocumentRender { .. })));
        assert!(!output.exists());
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.pdf");
        let result = write_document(&WritesBytes(b""), "<html/>", &page(), &output).await;
        assert!(matches!(result, Err(ReportError::DocumentRender { .. })));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CommandDocumentRenderer::new("reportgen-test-no-such-program");
        let result = renderer
            .render("<html/>", &page(), &dir.path().join("out.pdf"))
            .await;
        assert!(matches!(result, Err(ReportError::DocumentRender { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_receives_markup_on_stdin() {
        // `sh -c 'cat > "$0"' <output>` copies stdin to the output path
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.html");
        let renderer = CommandDocumentRenderer::new("sh").with_args(["-c", "cat > \"$0\""]);
        write_document(&renderer, "<p>hello</p>", &page(), &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "<p>hello</p>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let renderer =
            CommandDocumentRenderer::new("sh").with_args(["-c", "echo bad markup >&2; exit 3"]);
        let dir = tempfile::tempdir().unwrap();
        let result = renderer
            .render("<p/>", &page(), &dir.path().join("x.pdf"))
            .await;
        match result {
            Err(ReportError::DocumentRender { context }) => assert!(context.contains("bad markup")),
            other => panic!("expected document error, got {:?}", other),
        }
    }
}
