//! Document rasterisation and text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking thread
//! pool so Tokio worker threads never stall during CPU-heavy rendering.
//!
//! ## Page ordering
//!
//! Rasterised pages are written as `page_<n>.jpg` with 1-based numbering.
//! Downstream consumers must never rely on directory-listing order:
//! [`sorted_page_images`] re-derives the numeric page index from each
//! filename and sorts on it, so question numbering stays deterministic.

use crate::error::PrepscanError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Points-per-inch of the PDF coordinate space.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Rasterise every page of a PDF into `<out_dir>/page_<n>.jpg`.
///
/// Creates `out_dir` if absent. Returns the written paths in page order.
/// Pages already serialized when a later page fails are not rolled back;
/// the only atomicity unit is the individual file write.
pub async fn rasterize_pdf(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PrepscanError> {
    validate_pdf_magic(pdf_path)?;

    let path = pdf_path.to_path_buf();
    let dir = out_dir.to_path_buf();

    tokio::task::spawn_blocking(move || rasterize_blocking(&path, &dir, dpi))
        .await
        .map_err(|e| PrepscanError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rasterisation.
fn rasterize_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PrepscanError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PrepscanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    std::fs::create_dir_all(out_dir)?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("PDF loaded: {} pages", total);

    let mut written = Vec::with_capacity(total);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        // Scale page points to pixels at the requested DPI.
        let width_px = (page.width().value / PDF_POINTS_PER_INCH * dpi as f32) as i32;
        let height_px = (page.height().value / PDF_POINTS_PER_INCH * dpi as f32) as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px.max(1))
            .set_maximum_height(height_px.max(1));

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            PrepscanError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        let out_path = out_dir.join(format!("page_{}.jpg", page_num));
        image
            .to_rgb8()
            .save_with_format(&out_path, image::ImageFormat::Jpeg)
            .map_err(|e| PrepscanError::RasterisationFailed {
                page: page_num,
                detail: format!("JPEG encoding failed: {}", e),
            })?;

        debug!(
            "Rendered page {} → {}x{} px → {}",
            page_num,
            image.width(),
            image.height(),
            out_path.display()
        );
        written.push(out_path);
    }

    info!("Saved {} page images to {}", written.len(), out_dir.display());
    Ok(written)
}

/// Extract concatenated text from every page, each preceded by a
/// `--- Page N ---` delimiter.
pub async fn extract_document_text(pdf_path: &Path) -> Result<String, PrepscanError> {
    validate_pdf_magic(pdf_path)?;

    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text_blocking(&path))
        .await
        .map_err(|e| PrepscanError::Internal(format!("Text task panicked: {}", e)))?
}

fn extract_text_blocking(pdf_path: &Path) -> Result<String, PrepscanError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PrepscanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let mut extracted = String::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map(|t| t.all())
            .unwrap_or_default();
        extracted.push_str(&format!("\n--- Page {} ---\n{}", idx + 1, text));
    }

    Ok(extracted)
}

/// Check existence and `%PDF` magic bytes before handing the file to pdfium.
fn validate_pdf_magic(path: &Path) -> Result<(), PrepscanError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(|_| PrepscanError::FileNotFound {
        path: path.to_path_buf(),
    })?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(PrepscanError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// List a page-image directory sorted by the numeric page index embedded in
/// each `page_<n>.jpg` filename.
///
/// Files without a parseable index are ignored.
pub fn sorted_page_images(dir: &Path) -> Result<Vec<PathBuf>, PrepscanError> {
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(n) = page_index(&path) {
            pages.push((n, path));
        }
    }

    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

/// Parse the `<n>` out of a `page_<n>.<ext>` filename.
fn page_index(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("page_")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_index_parses_filename() {
        assert_eq!(page_index(Path::new("/x/page_12.jpg")), Some(12));
        assert_eq!(page_index(Path::new("page_1.png")), Some(1));
        assert_eq!(page_index(Path::new("cover.jpg")), None);
        assert_eq!(page_index(Path::new("page_.jpg")), None);
    }

    #[test]
    fn sorted_listing_is_numeric_not_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        // Lexicographic order would be 1, 10, 2.
        for n in [10, 2, 1] {
            std::fs::write(dir.path().join(format!("page_{}.jpg", n)), b"x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let sorted = sorted_page_images(dir.path()).unwrap();
        let names: Vec<String> = sorted
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page_1.jpg", "page_2.jpg", "page_10.jpg"]);
    }

    #[test]
    fn missing_pdf_fails_before_pdfium() {
        let err = validate_pdf_magic(Path::new("/nonexistent/paper.pdf")).unwrap_err();
        assert!(matches!(err, PrepscanError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a..").unwrap();
        let err = validate_pdf_magic(&path).unwrap_err();
        assert!(matches!(err, PrepscanError::NotAPdf { .. }));
    }
}
