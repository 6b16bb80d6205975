//! Configuration types for a convert-and-merge job.
//!
//! All pipeline behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across render workers (renderers hold no mutable state of
//! their own) and to log exactly which settings produced a given output.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field. The
//! builder lets callers set only what they care about and rely on documented
//! defaults for the rest.

use crate::error::DocfuseError;
use crate::job::CancelFlag;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical page size used for generated pages (images, spreadsheets,
/// documents, presentations). Passthrough PDFs keep their own page sizes.
///
/// Dimensions are PDF points (1 pt = 1/72 inch), portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm. (default)
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
    /// Caller-specified portrait dimensions in points.
    Custom { width_pt: f32, height_pt: f32 },
}

impl PageSize {
    /// Portrait `(width, height)` in points.
    pub fn portrait_pt(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.276, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Custom {
                width_pt,
                height_pt,
            } => (*width_pt, *height_pt),
        }
    }

    /// Landscape `(width, height)` in points — the portrait pair swapped.
    pub fn landscape_pt(&self) -> (f32, f32) {
        let (w, h) = self.portrait_pt();
        (h, w)
    }
}

/// Configuration for one conversion job.
///
/// Built via [`JobConfig::builder()`] or [`JobConfig::default()`].
///
/// # Example
/// ```rust
/// use docfuse::{JobConfig, PageSize};
///
/// let config = JobConfig::builder()
///     .page_size(PageSize::Letter)
///     .concurrency(4)
///     .render_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct JobConfig {
    /// Page size for all generated pages. Default: [`PageSize::A4`].
    pub page_size: PageSize,

    /// Margin around generated page content, in points. Default: 36 (0.5 in).
    pub margin_pt: f32,

    /// JPEG quality (1–100) used when embedding raster images. Default: 95.
    ///
    /// 95 matches the quality the upstream tool used when flattening
    /// transparency; it is visually lossless for photos while keeping the
    /// embedded stream a fraction of the raw pixel size.
    pub jpeg_quality: u8,

    /// Body text size in points for generated text pages. Default: 11.
    pub font_size_pt: f32,

    /// Number of files rendered in parallel. Default: available CPU cores.
    ///
    /// Rendering is CPU-bound and each file is independent, so the sweet
    /// spot is one worker per core. Raising it further only grows peak
    /// memory; lowering it bounds memory on very large batches.
    pub concurrency: usize,

    /// Per-file render timeout in seconds. Default: 30.
    ///
    /// A render that exceeds this fails with
    /// [`crate::RenderError::Timeout`] instead of hanging the whole job.
    /// The blocking worker is not interrupted; its result is discarded.
    pub render_timeout_secs: u64,

    /// Progress callback invoked per file and at job boundaries.
    pub progress_callback: Option<ProgressCallback>,

    /// Cooperative cancel flag checked before each render is dispatched.
    pub cancel: CancelFlag,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin_pt: 36.0,
            jpeg_quality: 95,
            font_size_pt: 11.0,
            concurrency: default_concurrency(),
            render_timeout_secs: 30,
            progress_callback: None,
            cancel: CancelFlag::new(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("page_size", &self.page_size)
            .field("margin_pt", &self.margin_pt)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("font_size_pt", &self.font_size_pt)
            .field("concurrency", &self.concurrency)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`JobConfig`].
#[derive(Debug)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn margin_pt(mut self, pt: f32) -> Self {
        self.config.margin_pt = pt.max(0.0);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn font_size_pt(mut self, pt: f32) -> Self {
        self.config.font_size_pt = pt.clamp(6.0, 32.0);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = flag;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, DocfuseError> {
        let c = &self.config;
        let (w, h) = c.page_size.portrait_pt();
        if w < 72.0 || h < 72.0 {
            return Err(DocfuseError::InvalidConfig(format!(
                "Page size must be at least 72×72 pt, got {w}×{h}"
            )));
        }
        if c.margin_pt * 2.0 >= w.min(h) {
            return Err(DocfuseError::InvalidConfig(format!(
                "Margin {} pt leaves no printable area on a {w}×{h} pt page",
                c.margin_pt
            )));
        }
        if c.concurrency == 0 {
            return Err(DocfuseError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
