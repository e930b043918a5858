// Tesseract-backed OCR engine. Images go through `tesseract` directly;
// PDFs are rasterized page by page with `pdftoppm` first.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::OcrSection;
use crate::error::OcrError;

use super::OcrEngine;
use super::preprocess::prepare_image;

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    tesseract_bin: String,
    pdftoppm_bin: String,
    language: String,
    psm: u8,
    dpi: u32,
    grayscale: bool,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::from_config(&OcrSection::default())
    }
}

impl TesseractEngine {
    pub fn from_config(config: &OcrSection) -> Self {
        Self {
            tesseract_bin: config.tesseract_bin.clone(),
            pdftoppm_bin: config.pdftoppm_bin.clone(),
            language: config.language.clone(),
            psm: config.psm,
            dpi: config.dpi,
            grayscale: config.grayscale,
        }
    }

    fn tesseract_args(&self, image: &Path) -> Vec<String> {
        vec![
            image.display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            self.psm.to_string(),
        ]
    }

    fn pdftoppm_args(&self, pdf: &Path, prefix: &Path) -> Vec<String> {
        vec![
            "-r".to_string(),
            self.dpi.to_string(),
            "-png".to_string(),
            pdf.display().to_string(),
            prefix.display().to_string(),
        ]
    }

    /// Run tesseract on a file that is already in a readable raster format.
    async fn recognize_raster(&self, image: &Path) -> Result<String, OcrError> {
        let out = run_tool(&self.tesseract_bin, &self.tesseract_args(image)).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn rasterize_pdf(&self, pdf: &Path, dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = dir.join("page");
        run_tool(&self.pdftoppm_bin, &self.pdftoppm_args(pdf, &prefix)).await?;
        collect_pages(dir)
    }
}

/// Page images written by pdftoppm, in page order. pdftoppm zero-pads page
/// numbers to a common width, so lexical order is page order.
fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let mut pages: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    pages.sort();
    Ok(pages)
}

/// Spawn an external tool and return its stdout.
async fn run_tool(bin: &str, args: &[String]) -> Result<Vec<u8>, OcrError> {
    debug!(bin, ?args, "Running OCR tool");
    let output = Command::new(bin).args(args).output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::ToolMissing(format!("{bin} (is it installed and on PATH?)"))
        } else {
            OcrError::Io(e)
        }
    })?;

    if !output.status.success() {
        return Err(OcrError::ToolFailed {
            tool: bin.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn recognize_image(&self, path: &Path) -> Result<String, OcrError> {
        let staging = tempfile::tempdir()?;
        let prepared = staging.path().join("input.png");

        let src = path.to_path_buf();
        let dst = prepared.clone();
        let grayscale = self.grayscale;
        let (width, height) =
            tokio::task::spawn_blocking(move || prepare_image(&src, &dst, grayscale))
                .await
                .map_err(|e| OcrError::ImageRead(e.to_string()))??;
        debug!(width, height, grayscale, "Image prepared");

        let text = self.recognize_raster(&prepared).await?;
        Ok(text.trim().to_string())
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn recognize_pdf(&self, path: &Path) -> Result<String, OcrError> {
        let staging = tempfile::tempdir()?;
        let pages = match self.rasterize_pdf(path, staging.path()).await {
            Ok(pages) => pages,
            Err(e @ OcrError::ToolMissing(_)) => return Err(e),
            Err(e) => return Err(OcrError::Pdf(e.to_string())),
        };
        if pages.is_empty() {
            return Err(OcrError::Pdf("no pages rendered".into()));
        }
        info!(pages = pages.len(), "PDF rasterized");

        let mut text = String::new();
        for page in &pages {
            let page_text = self.recognize_raster(page).await.map_err(|e| match e {
                OcrError::ToolMissing(_) => e,
                other => OcrError::Pdf(other.to_string()),
            })?;
            text.push_str(&page_text);
            text.push('\n');
        }
        Ok(text.trim().to_string())
    }
}
