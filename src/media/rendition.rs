//! Image renditions: filter specs, output geometry and file generation.

use image::imageops::FilterType;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::MediaError;
use crate::db::models::Image;

/// Small variant returned as `thumbnail` in image representations.
pub const THUMBNAIL: Filter = Filter::Max {
    width: 500,
    height: 500,
};
/// Large variant returned as `large` in image representations.
pub const LARGE: Filter = Filter::Max {
    width: 1920,
    height: 1080,
};
/// Full-bleed crop used for hero backgrounds.
pub const HERO: Filter = Filter::Fill {
    width: 1920,
    height: 1080,
    closeness: 0,
};

/// Renditions generated eagerly for every imported image.
pub const STANDARD: &[Filter] = &[THUMBNAIL, LARGE, HERO];

const RENDITION_DIR: &str = "images";
const MAX_STEM_CHARS: usize = 59;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Original,
    Max { width: u32, height: u32 },
    Min { width: u32, height: u32 },
    Fill { width: u32, height: u32, closeness: u32 },
    Width(u32),
    Height(u32),
    Scale(u32),
}

/// A parsed filter spec such as `max-500x500` or `fill-1920x1080-c50`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    spec: String,
    filter: Filter,
}

/// Source crop box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How to turn a source image into a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionPlan {
    pub crop: Option<Crop>,
    pub width: u32,
    pub height: u32,
}

/// A rendition's location (relative to the media root) and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub file: String,
    pub width: u32,
    pub height: u32,
}

impl FilterSpec {
    pub fn as_str(&self) -> &str {
        &self.spec
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Output geometry for a source of the given size. Never upscales.
    pub fn plan(&self, src_width: u32, src_height: u32) -> RenditionPlan {
        let (w, h) = (src_width.max(1), src_height.max(1));
        let keep = RenditionPlan {
            crop: None,
            width: w,
            height: h,
        };

        match self.filter {
            Filter::Original => keep,
            Filter::Max { width, height } => {
                if w <= width && h <= height {
                    return keep;
                }
                let scale = f64::min(width as f64 / w as f64, height as f64 / h as f64);
                scaled(w, h, scale)
            }
            Filter::Min { width, height } => {
                if w <= width || h <= height {
                    return keep;
                }
                let scale = f64::max(width as f64 / w as f64, height as f64 / h as f64);
                scaled(w, h, scale)
            }
            Filter::Width(width) => {
                if w <= width {
                    return keep;
                }
                scaled(w, h, width as f64 / w as f64)
            }
            Filter::Height(height) => {
                if h <= height {
                    return keep;
                }
                scaled(w, h, height as f64 / h as f64)
            }
            Filter::Scale(percent) => {
                if percent >= 100 {
                    return keep;
                }
                scaled(w, h, percent as f64 / 100.0)
            }
            Filter::Fill { width, height, .. } => {
                let target_aspect = width as f64 / height as f64;
                let (crop_w, crop_h) = if (w as f64 / h as f64) > target_aspect {
                    (round_dim(h as f64 * target_aspect).min(w), h)
                } else {
                    (w, round_dim(w as f64 / target_aspect).min(h))
                };
                let crop = Crop {
                    x: (w - crop_w) / 2,
                    y: (h - crop_h) / 2,
                    width: crop_w,
                    height: crop_h,
                };
                let (out_w, out_h) = if crop_w > width {
                    (width, height)
                } else {
                    (crop_w, crop_h)
                };
                RenditionPlan {
                    crop: Some(crop),
                    width: out_w,
                    height: out_h,
                }
            }
        }
    }
}

impl FromStr for FilterSpec {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MediaError::InvalidFilter(s.to_string());
        let spec = s.trim();
        if spec == "original" {
            return Ok(Self {
                spec: spec.to_string(),
                filter: Filter::Original,
            });
        }

        let mut parts = spec.split('-');
        let method = parts.next().ok_or_else(invalid)?;
        let size = parts.next().ok_or_else(invalid)?;
        let extra = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let filter = match method {
            "max" | "min" | "fill" => {
                let (width, height) = parse_size(size).ok_or_else(invalid)?;
                match (method, extra) {
                    ("max", None) => Filter::Max { width, height },
                    ("min", None) => Filter::Min { width, height },
                    ("fill", None) => Filter::Fill {
                        width,
                        height,
                        closeness: 0,
                    },
                    ("fill", Some(c)) => {
                        let closeness = c
                            .strip_prefix('c')
                            .and_then(|n| n.parse::<u32>().ok())
                            .filter(|n| *n <= 100)
                            .ok_or_else(invalid)?;
                        Filter::Fill {
                            width,
                            height,
                            closeness,
                        }
                    }
                    _ => return Err(invalid()),
                }
            }
            "width" | "height" | "scale" if extra.is_none() => {
                let n = parse_positive(size).ok_or_else(invalid)?;
                match method {
                    "width" => Filter::Width(n),
                    "height" => Filter::Height(n),
                    _ => Filter::Scale(n),
                }
            }
            _ => return Err(invalid()),
        };

        Ok(Self {
            spec: spec.to_string(),
            filter,
        })
    }
}

impl From<Filter> for FilterSpec {
    fn from(filter: Filter) -> Self {
        let spec = match filter {
            Filter::Original => "original".to_string(),
            Filter::Max { width, height } => format!("max-{}x{}", width, height),
            Filter::Min { width, height } => format!("min-{}x{}", width, height),
            Filter::Fill {
                width,
                height,
                closeness: 0,
            } => format!("fill-{}x{}", width, height),
            Filter::Fill {
                width,
                height,
                closeness,
            } => format!("fill-{}x{}-c{}", width, height, closeness),
            Filter::Width(n) => format!("width-{}", n),
            Filter::Height(n) => format!("height-{}", n),
            Filter::Scale(n) => format!("scale-{}", n),
        };
        Self { spec, filter }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Rendition of `image` for `spec`, computed without touching the filesystem.
pub fn rendition_for(image: &Image, spec: &FilterSpec) -> Rendition {
    let plan = spec.plan(image.width.max(1) as u32, image.height.max(1) as u32);
    Rendition {
        file: rendition_name(image.id, &image.file, spec),
        width: plan.width,
        height: plan.height,
    }
}

/// `images/{stem}.{id}.{spec}.{ext}` for image `id` stored at `original_file`.
///
/// The stem is truncated, so the id keeps names of different images apart.
pub fn rendition_name(id: i64, original_file: &str, spec: &FilterSpec) -> String {
    let name = original_file.rsplit('/').next().unwrap_or(original_file);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext.to_ascii_lowercase()),
        _ => (name, String::new()),
    };
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    format!(
        "{}/{}.{}.{}.{}",
        RENDITION_DIR,
        stem,
        id,
        spec.as_str(),
        output_extension(&ext)
    )
}

fn output_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "jpg",
        "webp" => "webp",
        "gif" => "gif",
        _ => "png",
    }
}

/// Write the rendition described by `plan` from `source` to `dest`. Blocking.
pub fn render(source: &Path, dest: &Path, plan: &RenditionPlan) -> Result<(), MediaError> {
    let mut img = image::open(source)?;

    if let Some(crop) = plan.crop {
        img = img.crop_imm(crop.x, crop.y, crop.width, crop.height);
    }
    if img.width() != plan.width || img.height() != plan.height {
        img = img.resize_exact(plan.width, plan.height, FilterType::Lanczos3);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // JPEG has no alpha channel
    let is_jpeg = dest
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg"))
        .unwrap_or(false);
    if is_jpeg {
        img.to_rgb8().save(dest)?;
    } else {
        img.save(dest)?;
    }
    Ok(())
}

/// Generate the given renditions for `image` on the blocking pool.
///
/// Existing files are kept unless `force` is set.
pub async fn generate(
    media_root: &Path,
    image: &Image,
    specs: &[FilterSpec],
    force: bool,
) -> Result<Vec<Rendition>, MediaError> {
    let source: PathBuf = media_root.join(&image.file);
    let jobs: Vec<(PathBuf, RenditionPlan, Rendition)> = specs
        .iter()
        .map(|spec| {
            let rendition = rendition_for(image, spec);
            let plan = spec.plan(image.width.max(1) as u32, image.height.max(1) as u32);
            (media_root.join(&rendition.file), plan, rendition)
        })
        .collect();

    tokio::task::spawn_blocking(move || {
        let mut done = Vec::with_capacity(jobs.len());
        for (dest, plan, rendition) in jobs {
            if force || !dest.exists() {
                render(&source, &dest, &plan)?;
                tracing::debug!(file = %rendition.file, "rendition written");
            }
            done.push(rendition);
        }
        Ok::<_, MediaError>(done)
    })
    .await
    .map_err(|e| MediaError::Task(e.to_string()))?
}

pub fn standard_specs() -> Vec<FilterSpec> {
    STANDARD.iter().copied().map(FilterSpec::from).collect()
}

fn scaled(w: u32, h: u32, scale: f64) -> RenditionPlan {
    RenditionPlan {
        crop: None,
        width: round_dim(w as f64 * scale),
        height: round_dim(h as f64 * scale),
    }
}

fn round_dim(v: f64) -> u32 {
    (v.round() as u32).max(1)
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((parse_positive(w)?, parse_positive(h)?))
}

fn parse_positive(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn spec(s: &str) -> FilterSpec {
        s.parse().unwrap()
    }

    fn image(file: &str, width: i32, height: i32) -> Image {
        Image {
            id: 7,
            title: "Robot".into(),
            file: file.into(),
            width,
            height,
            file_size: None,
            file_hash: String::new(),
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_filter_specs() {
        assert_eq!(
            spec("max-500x500").filter(),
            Filter::Max {
                width: 500,
                height: 500
            }
        );
        assert_eq!(
            spec("fill-1920x1080-c75").filter(),
            Filter::Fill {
                width: 1920,
                height: 1080,
                closeness: 75
            }
        );
        assert_eq!(spec("width-300").filter(), Filter::Width(300));
        assert_eq!(spec("original").filter(), Filter::Original);
    }

    #[test]
    fn test_reject_invalid_filter_specs() {
        for bad in ["", "max", "max-0x10", "max-10", "blur-5", "width-0", "fill-10x10-z3", "max-1x1-c5"] {
            assert!(bad.parse::<FilterSpec>().is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn test_max_scales_down_preserving_aspect() {
        let plan = spec("max-500x500").plan(2000, 1000);
        assert_eq!((plan.width, plan.height), (500, 250));
        assert!(plan.crop.is_none());
    }

    #[test]
    fn test_max_never_upscales() {
        let plan = spec("max-1920x1080").plan(800, 600);
        assert_eq!((plan.width, plan.height), (800, 600));
    }

    #[test]
    fn test_min_covers_target() {
        let plan = spec("min-200x200").plan(1000, 500);
        assert_eq!((plan.width, plan.height), (400, 200));
        let plan = spec("min-200x200").plan(150, 800);
        assert_eq!((plan.width, plan.height), (150, 800));
    }

    #[test]
    fn test_width_height_and_scale() {
        assert_eq!(spec("width-400").plan(1600, 900).height, 225);
        assert_eq!(spec("height-90").plan(1600, 900).width, 160);
        let plan = spec("scale-50").plan(640, 480);
        assert_eq!((plan.width, plan.height), (320, 240));
        let plan = spec("scale-200").plan(640, 480);
        assert_eq!((plan.width, plan.height), (640, 480));
    }

    #[test]
    fn test_fill_crops_to_aspect_then_resizes() {
        let plan = spec("fill-1920x1080").plan(4000, 3000);
        let crop = plan.crop.unwrap();
        assert_eq!((crop.width, crop.height), (4000, 2250));
        assert_eq!((crop.x, crop.y), (0, 375));
        assert_eq!((plan.width, plan.height), (1920, 1080));
    }

    #[test]
    fn test_fill_on_small_image_keeps_crop_size() {
        let plan = spec("fill-1920x1080").plan(800, 800);
        let crop = plan.crop.unwrap();
        assert_eq!((crop.width, crop.height), (800, 450));
        assert_eq!((plan.width, plan.height), (800, 450));
    }

    #[test]
    fn test_rendition_name() {
        assert_eq!(
            rendition_name(7, "original_images/team_photo.JPEG", &spec("max-500x500")),
            "images/team_photo.7.max-500x500.jpg"
        );
        assert_eq!(
            rendition_name(7, "original_images/logo.svg", &spec("original")),
            "images/logo.7.original.png"
        );
        let long = format!("original_images/{}.png", "a".repeat(80));
        let name = rendition_name(12, &long, &spec("width-10"));
        assert_eq!(name, format!("images/{}.12.width-10.png", "a".repeat(59)));
    }

    #[test]
    fn test_long_names_sharing_a_prefix_get_distinct_renditions() {
        let prefix = "a".repeat(60);
        let mut team = image(&format!("original_images/{}_team.png", prefix), 800, 600);
        let mut sponsor = image(&format!("original_images/{}_sponsor.png", prefix), 800, 600);
        team.id = 1;
        sponsor.id = 2;

        let thumbnail = FilterSpec::from(THUMBNAIL);
        assert_ne!(
            rendition_for(&team, &thumbnail).file,
            rendition_for(&sponsor, &thumbnail).file
        );
    }

    #[test]
    fn test_rendition_for_image() {
        let r = rendition_for(
            &image("original_images/stage.png", 3000, 2000),
            &FilterSpec::from(THUMBNAIL),
        );
        assert_eq!(r.file, "images/stage.7.max-500x500.png");
        assert_eq!((r.width, r.height), (500, 333));
    }

    #[test]
    fn test_spec_strings_round_trip_through_parse() {
        let names: Vec<String> = standard_specs().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["max-500x500", "max-1920x1080", "fill-1920x1080"]);
        for spec in standard_specs() {
            assert_eq!(spec.as_str().parse::<FilterSpec>().unwrap(), spec);
        }
        assert_eq!(
            FilterSpec::from(Filter::Fill {
                width: 10,
                height: 20,
                closeness: 40
            })
            .as_str(),
            "fill-10x20-c40"
        );
    }

    #[tokio::test]
    async fn test_generate_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("original_images/grid.png");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        image::RgbImage::from_pixel(1000, 800, image::Rgb([200, 30, 30]))
            .save(&source)
            .unwrap();

        let img = image("original_images/grid.png", 1000, 800);
        let done = generate(dir.path(), &img, &standard_specs(), false)
            .await
            .unwrap();

        assert_eq!(done.len(), 3);
        for rendition in &done {
            let path = dir.path().join(&rendition.file);
            assert!(path.exists(), "{} missing", rendition.file);
            let (w, h) = image::image_dimensions(&path).unwrap();
            assert_eq!((w, h), (rendition.width, rendition.height));
        }
    }
}
