//! Screenshot comparison against a stored baseline.
//!
//! The element's screenshot has every `excludeXPaths` element painted black,
//! then is compared pixel for pixel with the baseline the storage hooks hand
//! back. Storage is entirely plugin provided: with no backend registered the
//! validation fails with a report instead of raising.

use std::io::Cursor;

use image::{DynamicImage, GenericImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use serde_json::{Map, Value};

use super::ValidationCore;
use crate::driver::{Driver, ElementRef};
use crate::enums::ImageKind;
use crate::report::{Report, VisualParityReport};
use crate::spec::StepDef;
use crate::step::{StepCore, missing_parameter};
use crate::{Error, Result};

const NO_STORAGE: &str = "No baseline storage mechanism configured";
const UPDATE_FAILED: &str = "Unable to update the baseline image";
const UPDATED: &str = "Successfully updated baseline URI";
const NO_BASELINE: &str = "No baseline image found";

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

#[derive(Debug, Clone)]
pub struct VisualParity {
    /// As declared; resolved when the comparison runs
    baseline_id: String,
}

#[derive(Debug, Default)]
struct Images {
    baseline: Option<String>,
    treatment: Option<String>,
    delta: Option<String>,
}

impl VisualParity {
    pub fn new(def: &StepDef) -> Result<Self> {
        let baseline_id = def.parameter("baselineID").ok_or_else(|| {
            Error::InvalidSpec(missing_parameter("baselineID", &def.action))
        })?;
        Ok(Self {
            baseline_id: match baseline_id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
    }

    pub fn perform(&self, core: &ValidationCore) -> Result<Report> {
        let step = &core.step;
        let params = step.parameters()?;
        let baseline_id = step.ctx.resolve(&self.baseline_id)?;
        let settings = &step.ctx.settings;
        let hooks = &step.ctx.hooks;
        debug!("{}: visual parity against {baseline_id}", step.target_name()?);

        let treatment = self.capture(step, &params)?;
        let treatment_png = encode_png(&treatment)?;

        if settings.should_update_baseline(&baseline_id) {
            return self.update_baseline(core, &baseline_id, &treatment_png);
        }

        let baseline_png = match hooks.baseline_bytes(&baseline_id) {
            None => return report(core, &baseline_id, false, NO_STORAGE, Images::default()),
            Some(bytes) if bytes.is_empty() => {
                if settings.create_baseline_if_absent {
                    info!("creating missing baseline {baseline_id}");
                    return self.update_baseline(core, &baseline_id, &treatment_png);
                }
                return report(core, &baseline_id, false, NO_BASELINE, Images::default());
            }
            Some(bytes) => bytes,
        };
        let baseline = image::load_from_memory(&baseline_png).map_err(Error::from)?;
        if images_equal(&baseline, &treatment) {
            return report(core, &baseline_id, true, "", Images::default());
        }

        let run_id = &settings.run_id;
        let treatment_uri =
            hooks.store_image(run_id, &baseline_id, &treatment_png, ImageKind::Treatment);
        let delta_uri = match delta_image(&baseline, &treatment) {
            Some(delta) => {
                let png = encode_png(&delta)?;
                hooks.store_image(run_id, &baseline_id, &png, ImageKind::Delta)
            }
            None => None,
        };
        let baseline_uri = hooks.baseline_uri(run_id, &baseline_id);
        report(
            core,
            &baseline_id,
            false,
            "",
            Images {
                baseline: baseline_uri,
                treatment: treatment_uri,
                delta: delta_uri,
            },
        )
    }

    fn update_baseline(&self, core: &ValidationCore, baseline_id: &str, png: &[u8]) -> Result<Report> {
        let hooks = &core.step.ctx.hooks;
        let run_id = &core.step.ctx.settings.run_id;
        match hooks.store_image(run_id, baseline_id, png, ImageKind::Baseline) {
            None => report(core, baseline_id, false, NO_STORAGE, Images::default()),
            Some(uri) if uri.is_empty() => {
                report(core, baseline_id, false, UPDATE_FAILED, Images::default())
            }
            Some(uri) => {
                info!("updated baseline {baseline_id}: {uri}");
                let images = Images {
                    baseline: Some(uri),
                    ..Default::default()
                };
                report(core, baseline_id, true, UPDATED, images)
            }
        }
    }

    /// Screenshot of the target element with exclusions painted out
    fn capture(&self, step: &StepCore, params: &Map<String, Value>) -> Result<DynamicImage> {
        let driver = step.driver()?;
        let target = step.required_target()?;
        let element = driver.find_element(&target)?;
        let png = driver.screenshot(&element)?;
        let mut image = image::load_from_memory(&png).map_err(Error::from)?;
        for exclusion in exclusions(params) {
            exclude(driver.as_ref(), &target, &element, &exclusion, &mut image)?;
        }
        Ok(image)
    }
}

fn exclusions(params: &Map<String, Value>) -> Vec<String> {
    match params.get("excludeXPaths") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => vec![],
    }
}

/// Blacks out the bounding box of `exclusion`, which must lie entirely inside
/// the target element. The screenshot's origin is the target's top left.
fn exclude(
    driver: &dyn Driver,
    target: &str,
    element: &ElementRef,
    exclusion: &str,
    image: &mut DynamicImage,
) -> Result<()> {
    let excluded = driver.find_element(exclusion)?;
    let outer = driver.rect(element)?;
    let inner = driver.rect(&excluded)?;
    if !outer.contains(&inner) {
        return Err(Error::InvalidExclusion {
            target: target.to_string(),
            exclusion: exclusion.to_string(),
        }
        .into());
    }
    let outer = outer.pixel_box();
    let inner = inner.pixel_box();
    let left = (inner.x - outer.x).max(0) as u32;
    let top = (inner.y - outer.y).max(0) as u32;
    let (width, height) = image.dimensions();
    trace!("excluding {exclusion} at {left},{top} {}x{}", inner.width, inner.height);
    for y in top..(top + inner.height).min(height) {
        for x in left..(left + inner.width).min(width) {
            image.put_pixel(x, y, BLACK);
        }
    }
    Ok(())
}

/// Same color type, same dimensions and identical pixel data
fn images_equal(a: &DynamicImage, b: &DynamicImage) -> bool {
    a.color() == b.color() && a.dimensions() == b.dimensions() && a.as_bytes() == b.as_bytes()
}

/// Differing pixels in red over a dimmed copy of the treatment. Only produced
/// for images of the same size.
fn delta_image(baseline: &DynamicImage, treatment: &DynamicImage) -> Option<DynamicImage> {
    if baseline.dimensions() != treatment.dimensions() {
        return None;
    }
    let (width, height) = treatment.dimensions();
    let baseline = baseline.to_rgba8();
    let treatment = treatment.to_rgba8();
    let mut delta = RgbaImage::new(width, height);
    for (x, y, pixel) in treatment.enumerate_pixels() {
        if baseline.get_pixel(x, y) != pixel {
            delta.put_pixel(x, y, RED);
        } else {
            let [r, g, b, _] = pixel.0;
            delta.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
        }
    }
    Some(DynamicImage::ImageRgba8(delta))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(vec![]);
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(Error::from)?;
    Ok(buf.into_inner())
}

fn report(
    core: &ValidationCore,
    baseline_id: &str,
    success: bool,
    msg: &str,
    images: Images,
) -> Result<Report> {
    Ok(VisualParityReport {
        validation: core.validation_report(success, msg)?,
        baseline_id: baseline_id.to_string(),
        baseline_image_uri: images.baseline,
        treatment_image_uri: images.treatment,
        delta_image_uri: images.delta,
    }
    .into())
}
