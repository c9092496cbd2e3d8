//! MuPDF-backed implementation of the PDF backend

use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Pixmap, TextPageFlags};

use super::backend::{BackendError, PdfBackend, PdfDocument, check_page};
use super::types::{PageBitmap, Rect, Size, TextItem};

const PDF_MAGIC: &str = "application/pdf";

/// Backend decoding documents with MuPDF
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfBackend;

impl PdfBackend for MupdfBackend {
    fn load(&self, source: &[u8]) -> Result<Box<dyn PdfDocument>, BackendError> {
        let doc =
            Document::from_bytes(source, PDF_MAGIC).map_err(|e| BackendError::decode(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| BackendError::decode(e.to_string()))?;
        Ok(Box::new(MupdfDocument {
            doc,
            page_count: page_count.max(0) as usize,
        }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load_page(&self, page: usize) -> Result<mupdf::Page, BackendError> {
        check_page(page, self.page_count)?;
        self.doc
            .load_page((page - 1) as i32)
            .map_err(|e| BackendError::render(page, e.to_string()))
    }
}

impl PdfDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<Size, BackendError> {
        let bounds = self
            .load_page(page)?
            .bounds()
            .map_err(|e| BackendError::render(page, e.to_string()))?;
        Ok(Size::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<PageBitmap, BackendError> {
        let loaded = self.load_page(page)?;
        let rgb = Colorspace::device_rgb();
        let pixmap = loaded
            .to_pixmap(&Matrix::new_scale(scale, scale), &rgb, false, false)
            .map_err(|e| BackendError::render(page, e.to_string()))?;
        let pixels = pixmap_to_rgb(&pixmap).map_err(|detail| BackendError::render(page, detail))?;
        Ok(PageBitmap {
            pixels,
            width_px: pixmap.width(),
            height_px: pixmap.height(),
        })
    }

    fn text_content(&self, page: usize) -> Result<Vec<TextItem>, BackendError> {
        let loaded = self.load_page(page)?;
        let text_page = loaded
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| BackendError::text(page, e.to_string()))?;

        let mut items = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let mut text: String = line.chars().filter_map(|ch| ch.char()).collect();
                if text.is_empty() {
                    continue;
                }
                // MuPDF lines carry no trailing whitespace; keep words of
                // adjacent lines apart once runs are concatenated.
                text.push(' ');
                let bbox = line.bounds();
                items.push(TextItem::new(
                    text,
                    Rect::new(
                        bbox.x0.min(bbox.x1),
                        bbox.y0.min(bbox.y1),
                        (bbox.x1 - bbox.x0).abs(),
                        (bbox.y1 - bbox.y0).abs(),
                    ),
                ));
            }
        }
        Ok(items)
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, String> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(format!("Unsupported pixmap format: {n} channels"));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;

    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err("Pixmap buffer size mismatch".to_string());
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    Ok(out)
}
