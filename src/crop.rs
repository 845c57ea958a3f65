use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Axis, GeometryError};
use crate::pages::PageEntry;
use crate::rectangle::BoundaryBox;
use crate::{Document, Error, ObjectId, Result};

/// Margins in points, measured inward from each page edge.
///
/// `right` falls back to `left` and `bottom` to `top` when not given.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Margins {
    pub left: f64,
    pub top: f64,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
}

impl Margins {
    pub fn new(left: f64, top: f64) -> Margins {
        Margins {
            left,
            top,
            right: None,
            bottom: None,
        }
    }

    pub fn with_right(mut self, right: f64) -> Margins {
        self.right = Some(right);
        self
    }

    pub fn with_bottom(mut self, bottom: f64) -> Margins {
        self.bottom = Some(bottom);
        self
    }

    pub fn right(&self) -> f64 {
        self.right.unwrap_or(self.left)
    }

    pub fn bottom(&self) -> f64 {
        self.bottom.unwrap_or(self.top)
    }

    pub fn validate(&self) -> Result<()> {
        for value in [self.left, self.top, self.right(), self.bottom()] {
            if !value.is_finite() {
                return Err(Error::InvalidMargin(value));
            }
        }
        Ok(())
    }

    /// Shrink `media_box` by the margins, or report which dimension they exhaust.
    pub fn apply(&self, page_index: usize, media_box: &BoundaryBox) -> std::result::Result<BoundaryBox, GeometryError> {
        let cropped = BoundaryBox {
            lower_left_x: media_box.lower_left_x + self.left,
            lower_left_y: media_box.lower_left_y + self.bottom(),
            upper_right_x: media_box.upper_right_x - self.right(),
            upper_right_y: media_box.upper_right_y - self.top,
        };
        if cropped.lower_left_x >= cropped.upper_right_x {
            return Err(GeometryError {
                page_index,
                axis: Axis::Width,
                leading: self.left,
                trailing: self.right(),
                available: media_box.width(),
            });
        }
        if cropped.lower_left_y >= cropped.upper_right_y {
            return Err(GeometryError {
                page_index,
                axis: Axis::Height,
                leading: self.bottom(),
                trailing: self.top,
                available: media_box.height(),
            });
        }
        Ok(cropped)
    }
}

/// Old and new geometry of one cropped page.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropReport {
    /// Zero-based position in page order.
    pub page_index: usize,
    /// Number of pages in the crop.
    pub page_count: usize,
    pub page_id: ObjectId,
    pub original: BoundaryBox,
    pub cropped: BoundaryBox,
}

/// Compute the new box of every page without touching any document.
pub fn plan_crop(pages: &[PageEntry], margins: &Margins) -> Result<Vec<CropReport>> {
    margins.validate()?;
    pages
        .iter()
        .enumerate()
        .map(|(page_index, page)| -> Result<CropReport> {
            let cropped = margins.apply(page_index, &page.media_box)?;
            Ok(CropReport {
                page_index,
                page_count: pages.len(),
                page_id: page.id,
                original: page.media_box,
                cropped,
            })
        })
        .collect()
}

impl Document {
    /// Crop every page of the document, see [`Document::crop_pages`].
    pub fn crop(&mut self, margins: &Margins) -> Result<Vec<CropReport>> {
        let pages = self.page_entries()?;
        self.crop_pages(&pages, margins, |_| {})
    }

    /// Write a shrunk `MediaBox` on each page's own dictionary.
    ///
    /// Every page is validated first; if any page cannot take the margins
    /// the document is left untouched. `progress` is called once per page
    /// after its box has been written.
    pub fn crop_pages<F>(&mut self, pages: &[PageEntry], margins: &Margins, mut progress: F) -> Result<Vec<CropReport>>
    where
        F: FnMut(&CropReport),
    {
        let plan = plan_crop(pages, margins)?;
        for report in &plan {
            self.get_object(report.page_id)?.as_dict()?;
        }

        for report in &plan {
            let page = self.get_object_mut(report.page_id)?.as_dict_mut()?;
            page.set("MediaBox", report.cropped.to_object());
            info!(
                "page {}: {} -> {}",
                report.page_index + 1,
                report.original,
                report.cropped
            );
            progress(report);
        }
        Ok(plan)
    }
}

/// Output path for a cropped copy: `name.ext` becomes `name_cropped.ext`.
pub fn cropped_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let mut file_name = OsString::from(path.file_stem().unwrap_or_default());
    file_name.push("_cropped");
    if let Some(extension) = path.extension() {
        file_name.push(".");
        file_name.push(extension);
    }
    path.with_file_name(file_name)
}

/// Result of [`crop_file`].
#[derive(Debug, Clone)]
pub struct CropSummary {
    pub output: PathBuf,
    pub pages: Vec<CropReport>,
}

/// Load `path`, crop all pages and save next to it as [`cropped_path`].
///
/// Nothing is written unless every page accepts the margins.
pub fn crop_file<P, F>(path: P, margins: &Margins, progress: F) -> Result<CropSummary>
where
    P: AsRef<Path>,
    F: FnMut(&CropReport),
{
    let path = path.as_ref();
    margins.validate()?;
    let mut document = Document::load(path)?;
    let pages = document.page_entries()?;
    debug!("{} pages in {}", pages.len(), path.display());
    let reports = document.crop_pages(&pages, margins, progress)?;

    let output = cropped_path(path);
    document.save(&output)?;
    Ok(CropSummary { output, pages: reports })
}
