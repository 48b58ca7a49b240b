//! Camera configuration as exchanged with the settings surface.
//!
//! A [`CameraConfiguration`] is always replaced wholesale: bulk edits arrive as JSON
//! text ([`CameraConfiguration::parse`]), single-control edits arrive as a
//! [`FieldEdit`] that is applied to the last configuration to produce a new full
//! value. Either way the result is validated before anything reaches the engine.
//!
//! # Settings text
//!
//! ```json
//! {
//!   "width": 700,
//!   "aspect_ratio": 1.7777777777777777,
//!   "vfov": 20.0,
//!   "lookfrom": [13.0, 2.0, 3.0],
//!   "lookat": [0.0, 0.0, 0.0],
//!   "vup": [0.0, 1.0, 0.0],
//!   "defocus_angle": 0.0,
//!   "focus_dist": 12.0
//! }
//! ```
//!
//! Unknown keys are ignored; every key above is required.

use crate::error::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Image height for a given width and aspect ratio.
///
/// Truncates toward zero and never returns less than one row, so
/// `image_height(1000, 16.0 / 9.0) == 562`.
pub fn image_height(width: u32, aspect_ratio: f64) -> u32 {
    let height = (f64::from(width) / aspect_ratio) as u32;
    height.max(1)
}

/// Largest image, in pixels, an engine is asked to allocate (8K UHD).
pub const MAX_IMAGE_PIXELS: u32 = 7680 * 4320;

/// Pixels in a `width` wide image at `aspect_ratio`, or `None` past [`MAX_IMAGE_PIXELS`].
pub fn pixel_count(width: u32, aspect_ratio: f64) -> Option<u32> {
    width
        .checked_mul(image_height(width, aspect_ratio))
        .filter(|pixels| *pixels <= MAX_IMAGE_PIXELS)
}

/// Full camera state forwarded to the compute engine.
///
/// The serde derive (used for config files) fills missing keys from
/// [`Default`]; settings text goes through [`CameraConfiguration::parse`], which
/// requires every key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfiguration {
    /// Output width in pixels
    pub width: u32,
    /// Output width / height
    pub aspect_ratio: f64,
    /// Vertical field of view in degrees
    pub vfov: f64,
    /// Eye position
    pub lookfrom: [f64; 3],
    /// Point the camera looks at
    pub lookat: [f64; 3],
    /// Camera-relative up direction
    pub vup: [f64; 3],
    /// Variation angle of rays through each pixel (degrees)
    pub defocus_angle: f64,
    /// Distance from `lookfrom` to the plane of perfect focus
    pub focus_dist: f64,
}

impl Default for CameraConfiguration {
    fn default() -> Self {
        Self {
            width: 400,
            aspect_ratio: 16.0 / 9.0,
            vfov: 20.0,
            lookfrom: [13.0, 2.0, 3.0],
            lookat: [0.0, 0.0, 0.0],
            vup: [0.0, 1.0, 0.0],
            defocus_angle: 0.0,
            focus_dist: 12.0,
        }
    }
}

impl CameraConfiguration {
    /// Parse settings text into a validated configuration.
    ///
    /// # Errors
    ///
    /// - [`RenderError::ConfigurationParse`] if the text is not well-formed JSON
    /// - [`RenderError::ConfigurationField`] if a field is missing, non-numeric or
    ///   out of domain
    pub fn parse(text: &str) -> RenderResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RenderError::ConfigurationParse(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| RenderError::field("camera", "expected a JSON object"))?;

        let config = Self {
            width: width_field(object)?,
            aspect_ratio: number_field(object, "aspect_ratio")?,
            vfov: number_field(object, "vfov")?,
            lookfrom: vector_field(object, "lookfrom")?,
            lookat: vector_field(object, "lookat")?,
            vup: vector_field(object, "vup")?,
            defocus_angle: number_field(object, "defocus_angle")?,
            focus_dist: number_field(object, "focus_dist")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its domain.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 {
            return Err(RenderError::field("width", "must be greater than 0"));
        }
        positive("aspect_ratio", self.aspect_ratio)?;
        if pixel_count(self.width, self.aspect_ratio).is_none() {
            return Err(RenderError::field(
                "width",
                format!("image exceeds {MAX_IMAGE_PIXELS} pixels"),
            ));
        }
        positive("vfov", self.vfov)?;
        if self.vfov >= 180.0 {
            return Err(RenderError::field("vfov", "must be below 180 degrees"));
        }
        finite_vector("lookfrom", &self.lookfrom)?;
        finite_vector("lookat", &self.lookat)?;
        finite_vector("vup", &self.vup)?;
        if self.vup.iter().all(|c| *c == 0.0) {
            return Err(RenderError::field("vup", "must not be the zero vector"));
        }
        if self.lookfrom == self.lookat {
            return Err(RenderError::field("lookat", "must differ from lookfrom"));
        }
        if !self.defocus_angle.is_finite() || self.defocus_angle < 0.0 {
            return Err(RenderError::field("defocus_angle", "must be >= 0"));
        }
        positive("focus_dist", self.focus_dist)?;
        Ok(())
    }

    /// Image height derived from `width` and `aspect_ratio`.
    pub fn image_height(&self) -> u32 {
        image_height(self.width, self.aspect_ratio)
    }

    /// Whether switching from `other` to `self` changes the output dimensions.
    pub fn changes_dimensions(&self, other: &CameraConfiguration) -> bool {
        self.width != other.width || self.image_height() != other.image_height()
    }

    /// Copy of this configuration with exactly one field overwritten, validated.
    pub fn with_edit(&self, edit: &FieldEdit) -> RenderResult<Self> {
        let mut next = self.clone();
        let value = edit.value;
        if !value.is_finite() {
            return Err(RenderError::field(edit.field.to_string(), "must be a finite number"));
        }
        match edit.field {
            CameraField::Width => {
                if value <= 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
                    return Err(RenderError::field("width", "must be a positive integer"));
                }
                next.width = value as u32;
            }
            CameraField::AspectRatio => next.aspect_ratio = value,
            CameraField::Vfov => next.vfov = value,
            CameraField::LookFrom(axis) => next.lookfrom[axis.index()] = value,
            CameraField::LookAt(axis) => next.lookat[axis.index()] = value,
            CameraField::Vup(axis) => next.vup[axis.index()] = value,
            CameraField::DefocusAngle => next.defocus_angle = value,
            CameraField::FocusDist => next.focus_dist = value,
        }
        next.validate()?;
        Ok(next)
    }

    /// Render this configuration back into settings text for display or editing.
    pub fn to_settings_text(&self) -> String {
        let value = json!({
            "width": self.width,
            "aspect_ratio": self.aspect_ratio,
            "vfov": self.vfov,
            "lookfrom": self.lookfrom,
            "lookat": self.lookat,
            "vup": self.vup,
            "defocus_angle": self.defocus_angle,
            "focus_dist": self.focus_dist,
        });
        format!("{value:#}")
    }
}

fn width_field(object: &Map<String, Value>) -> RenderResult<u32> {
    let value = object
        .get("width")
        .ok_or_else(|| RenderError::field("width", "missing"))?;
    if let Some(width) = value.as_u64() {
        return u32::try_from(width).map_err(|_| RenderError::field("width", "too large"));
    }
    match value.as_f64() {
        Some(w) if w.fract() == 0.0 && w > 0.0 && w <= f64::from(u32::MAX) => Ok(w as u32),
        Some(_) => Err(RenderError::field("width", "must be a positive integer")),
        None => Err(RenderError::field("width", "must be numeric")),
    }
}

fn number_field(object: &Map<String, Value>, name: &str) -> RenderResult<f64> {
    object
        .get(name)
        .ok_or_else(|| RenderError::field(name, "missing"))?
        .as_f64()
        .ok_or_else(|| RenderError::field(name, "must be numeric"))
}

fn vector_field(object: &Map<String, Value>, name: &str) -> RenderResult<[f64; 3]> {
    let items = object
        .get(name)
        .ok_or_else(|| RenderError::field(name, "missing"))?
        .as_array()
        .ok_or_else(|| RenderError::field(name, "must be an array of 3 numbers"))?;
    if items.len() != 3 {
        return Err(RenderError::field(name, "must be an array of 3 numbers"));
    }
    let mut out = [0.0; 3];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .ok_or_else(|| RenderError::field(name, "must be an array of 3 numbers"))?;
    }
    Ok(out)
}

fn positive(name: &str, value: f64) -> RenderResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RenderError::field(name, "must be greater than 0"))
    }
}

fn finite_vector(name: &str, v: &[f64; 3]) -> RenderResult<()> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(RenderError::field(name, "must contain finite numbers"))
    }
}

/// Component of a 3-vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A single editable camera field, as driven by a discrete control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CameraField {
    Width,
    AspectRatio,
    Vfov,
    LookFrom(Axis),
    LookAt(Axis),
    Vup(Axis),
    DefocusAngle,
    FocusDist,
}

impl fmt::Display for CameraField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = |a: &Axis| match a {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        match self {
            CameraField::Width => write!(f, "width"),
            CameraField::AspectRatio => write!(f, "aspect_ratio"),
            CameraField::Vfov => write!(f, "vfov"),
            CameraField::LookFrom(a) => write!(f, "lookfrom.{}", axis(a)),
            CameraField::LookAt(a) => write!(f, "lookat.{}", axis(a)),
            CameraField::Vup(a) => write!(f, "vup.{}", axis(a)),
            CameraField::DefocusAngle => write!(f, "defocus_angle"),
            CameraField::FocusDist => write!(f, "focus_dist"),
        }
    }
}

impl FromStr for CameraField {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, component) = match s.split_once('.') {
            Some((base, component)) => (base, Some(component)),
            None => (s, None),
        };
        let axis = match component {
            None => None,
            Some("x") => Some(Axis::X),
            Some("y") => Some(Axis::Y),
            Some("z") => Some(Axis::Z),
            Some(other) => {
                return Err(RenderError::field(s, format!("unknown component '{other}'")))
            }
        };
        let field = match (base, axis) {
            ("width", None) => CameraField::Width,
            ("aspect_ratio", None) => CameraField::AspectRatio,
            ("vfov", None) => CameraField::Vfov,
            ("lookfrom", Some(a)) => CameraField::LookFrom(a),
            ("lookat", Some(a)) => CameraField::LookAt(a),
            ("vup", Some(a)) => CameraField::Vup(a),
            ("defocus_angle", None) => CameraField::DefocusAngle,
            ("focus_dist", None) => CameraField::FocusDist,
            _ => return Err(RenderError::field(s, "unknown camera field")),
        };
        Ok(field)
    }
}

/// One discrete control value: overwrite `field` with `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldEdit {
    /// Field to overwrite
    pub field: CameraField,
    /// New value (`width` must be a positive integer)
    pub value: f64,
}

impl FieldEdit {
    /// Edit setting `field` to `value`.
    pub fn new(field: CameraField, value: f64) -> Self {
        Self { field, value }
    }
}

/// Parses `field=value`, e.g. `vfov=35` or `lookfrom.x = -4.5`.
impl FromStr for FieldEdit {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, raw) = s
            .split_once('=')
            .ok_or_else(|| RenderError::ConfigurationParse(format!("expected field=value, got '{s}'")))?;
        let field: CameraField = name.trim().parse()?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| RenderError::field(field.to_string(), "must be numeric"))?;
        Ok(Self { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_b_text() -> &'static str {
        r#"{
            "width": 700,
            "aspect_ratio": 1.7777777777777777,
            "vfov": 20,
            "lookfrom": [13, 2, 3],
            "lookat": [0, 0, 0],
            "vup": [0, 1, 0],
            "defocus_angle": 0,
            "focus_dist": 10
        }"#
    }

    #[test]
    fn height_truncates_aspect_division() {
        assert_eq!(image_height(1000, 16.0 / 9.0), 562);
        assert_eq!(image_height(700, 16.0 / 9.0), 393);
        assert_eq!(image_height(400, 16.0 / 9.0), 225);
        assert_eq!(image_height(1, 16.0 / 9.0), 1);
    }

    #[test]
    fn parses_complete_settings_text() {
        let config = CameraConfiguration::parse(scenario_b_text()).unwrap();
        assert_eq!(config.width, 700);
        assert_eq!(config.vfov, 20.0);
        assert_eq!(config.lookfrom, [13.0, 2.0, 3.0]);
        assert_eq!(config.focus_dist, 10.0);
        assert_eq!(config.image_height(), 393);
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let err = CameraConfiguration::parse("{ width: 700,").unwrap_err();
        assert!(matches!(err, RenderError::ConfigurationParse(_)));
    }

    #[test]
    fn missing_field_is_a_field_error() {
        let err = CameraConfiguration::parse(r#"{"width": 700}"#).unwrap_err();
        match err {
            RenderError::ConfigurationField { field, .. } => assert_eq!(field, "aspect_ratio"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_and_out_of_domain_fields_are_rejected() {
        let text = scenario_b_text().replace("\"vfov\": 20", "\"vfov\": \"wide\"");
        match CameraConfiguration::parse(&text).unwrap_err() {
            RenderError::ConfigurationField { field, .. } => assert_eq!(field, "vfov"),
            other => panic!("unexpected error: {other:?}"),
        }

        let text = scenario_b_text().replace("\"width\": 700", "\"width\": 0");
        match CameraConfiguration::parse(&text).unwrap_err() {
            RenderError::ConfigurationField { field, .. } => assert_eq!(field, "width"),
            other => panic!("unexpected error: {other:?}"),
        }

        let text = scenario_b_text().replace("\"width\": 700", "\"width\": -3");
        assert!(matches!(
            CameraConfiguration::parse(&text),
            Err(RenderError::ConfigurationField { .. })
        ));

        let text = scenario_b_text().replace("[13, 2, 3]", "[13, 2]");
        assert!(matches!(
            CameraConfiguration::parse(&text),
            Err(RenderError::ConfigurationField { .. })
        ));
    }

    #[test]
    fn non_object_json_is_a_field_error() {
        assert!(matches!(
            CameraConfiguration::parse("[1, 2, 3]"),
            Err(RenderError::ConfigurationField { .. })
        ));
    }

    #[test]
    fn settings_text_round_trips() {
        let config = CameraConfiguration {
            width: 640,
            defocus_angle: 0.6,
            ..CameraConfiguration::default()
        };
        let text = config.to_settings_text();
        assert_eq!(CameraConfiguration::parse(&text).unwrap(), config);
    }

    #[test]
    fn field_edit_overwrites_exactly_one_field() {
        let base = CameraConfiguration::default();
        let edited = base
            .with_edit(&"lookfrom.y = 4.5".parse::<FieldEdit>().unwrap())
            .unwrap();
        assert_eq!(edited.lookfrom, [13.0, 4.5, 3.0]);
        assert_eq!(
            CameraConfiguration {
                lookfrom: base.lookfrom,
                ..edited.clone()
            },
            base
        );
    }

    #[test]
    fn oversized_images_are_rejected() {
        assert_eq!(pixel_count(7680, 16.0 / 9.0), Some(7680 * 4320));
        assert_eq!(pixel_count(4_000_000_000, 1.0), None);
        assert_eq!(pixel_count(100_000, 1.0), None);
        assert_eq!(pixel_count(1, 1e-12), None);

        let text = scenario_b_text().replace("\"width\": 700", "\"width\": 4000000000");
        match CameraConfiguration::parse(&text).unwrap_err() {
            RenderError::ConfigurationField { field, .. } => assert_eq!(field, "width"),
            other => panic!("unexpected error: {other}"),
        }

        let base = CameraConfiguration::default();
        assert!(base
            .with_edit(&FieldEdit::new(CameraField::AspectRatio, 1e-9))
            .is_err());
    }

    #[test]
    fn field_edit_validates_domain() {
        let base = CameraConfiguration::default();
        assert!(base.with_edit(&FieldEdit::new(CameraField::Vfov, -1.0)).is_err());
        assert!(base.with_edit(&FieldEdit::new(CameraField::Width, 12.5)).is_err());
        assert!(base
            .with_edit(&FieldEdit::new(CameraField::FocusDist, f64::NAN))
            .is_err());
        assert_eq!(
            base.with_edit(&FieldEdit::new(CameraField::Width, 800.0))
                .unwrap()
                .width,
            800
        );
    }

    #[test]
    fn field_edit_parsing() {
        assert!(matches!(
            "vfov".parse::<FieldEdit>(),
            Err(RenderError::ConfigurationParse(_))
        ));
        assert!(matches!(
            "zoom=2".parse::<FieldEdit>(),
            Err(RenderError::ConfigurationField { .. })
        ));
        assert!(matches!(
            "vfov=abc".parse::<FieldEdit>(),
            Err(RenderError::ConfigurationField { .. })
        ));
        assert!("lookfrom=1".parse::<FieldEdit>().is_err());
        let edit: FieldEdit = "vup.z=1".parse().unwrap();
        assert_eq!(edit.field, CameraField::Vup(Axis::Z));
        assert_eq!(edit.field.to_string(), "vup.z");
    }

    #[test]
    fn dimension_change_detection() {
        let base = CameraConfiguration::default();
        let same_size = CameraConfiguration { vfov: 45.0, ..base.clone() };
        assert!(!same_size.changes_dimensions(&base));
        let wider = CameraConfiguration { width: 800, ..base.clone() };
        assert!(wider.changes_dimensions(&base));
        let taller = CameraConfiguration { aspect_ratio: 1.0, ..base.clone() };
        assert!(taller.changes_dimensions(&base));
    }
}
