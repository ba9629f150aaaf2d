// ============================================================================
// LAYER MODEL — layer struct, content variants, blend modes, filters
// ============================================================================

use crate::color::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ============================================================================
// IDENTITY
// ============================================================================

/// Stable layer identity. Assigned by the document at creation, monotonic,
/// never reused and never renumbered when other layers are deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u64);

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
        ]
    }

    /// Wire name, matching the canvas compositing operator strings.
    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
        }
    }

    /// Unknown names fall back to Normal so old or hand-edited documents
    /// still load.
    pub fn from_name(s: &str) -> BlendMode {
        match s {
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            "color-dodge" => BlendMode::ColorDodge,
            "color-burn" => BlendMode::ColorBurn,
            "hard-light" => BlendMode::HardLight,
            "soft-light" => BlendMode::SoftLight,
            "difference" => BlendMode::Difference,
            "exclusion" => BlendMode::Exclusion,
            _ => BlendMode::Normal,
        }
    }
}

impl Serialize for BlendMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for BlendMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<BlendMode, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(BlendMode::from_name(&s))
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Non-destructive per-layer filter stack. Every layer carries its own copy,
/// taken from the session defaults at creation time.
///
/// Applied in a fixed order: grayscale, sepia, invert, hue shift, saturation,
/// brightness, contrast, blur, emboss.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    /// Gaussian blur radius in pixels. 0 disables the pass.
    pub blur_radius: f32,
    /// Multiplier, 1.0 is neutral.
    pub brightness: f32,
    /// Multiplier, 1.0 is neutral.
    pub contrast: f32,
    /// Multiplier, 1.0 is neutral, 0 fully desaturates.
    pub saturation: f32,
    /// Degrees, 0 is neutral.
    pub hue_shift: f32,
    pub grayscale: bool,
    pub sepia: bool,
    pub invert: bool,
    pub emboss: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            blur_radius: 0.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            hue_shift: 0.0,
            grayscale: false,
            sepia: false,
            invert: false,
            emboss: false,
        }
    }
}

impl FilterSettings {
    pub fn is_neutral(&self) -> bool {
        *self == FilterSettings::default()
    }
}

// ============================================================================
// TRANSFORM
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Clockwise degrees.
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub skew_x: f32,
    pub skew_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
        }
    }
}

// ============================================================================
// CONTENT VARIANTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Triangle,
    Star,
    Polygon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    Horizontal,
    Vertical,
    Diagonal,
    Radial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Stripes,
    Dots,
}

/// The closed set of things a layer can be. All polymorphism in the editor
/// runs through this one tagged union; there is no open plugin surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerContent {
    Background {
        color: Color,
    },
    Text {
        text: String,
        #[serde(rename = "fontFamily")]
        font_family: String,
        #[serde(rename = "fontSize")]
        font_size: f32,
        color: Color,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        italic: bool,
        #[serde(default)]
        align: TextAlign,
    },
    Shape {
        shape: ShapeKind,
        fill: Color,
        #[serde(rename = "strokeColor")]
        stroke_color: Color,
        #[serde(rename = "strokeWidth", default)]
        stroke_width: f32,
        /// Polygon vertex count; ignored by the other shapes.
        #[serde(default = "default_sides")]
        sides: u32,
    },
    Gradient {
        colors: Vec<Color>,
        direction: GradientDirection,
    },
    Pattern {
        pattern: PatternKind,
        color1: Color,
        color2: Color,
        size: f32,
    },
    Image {
        /// Opaque source reference (file path or data URI). The decoded
        /// bitmap lives in the cache keyed by layer id, never here.
        source: String,
        #[serde(rename = "originalWidth", default)]
        original_width: u32,
        #[serde(rename = "originalHeight", default)]
        original_height: u32,
        #[serde(default = "default_scale")]
        scale: f32,
    },
}

fn default_sides() -> u32 {
    6
}

fn default_scale() -> f32 {
    1.0
}

impl LayerContent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LayerContent::Background { .. } => "background",
            LayerContent::Text { .. } => "text",
            LayerContent::Shape { .. } => "shape",
            LayerContent::Gradient { .. } => "gradient",
            LayerContent::Pattern { .. } => "pattern",
            LayerContent::Image { .. } => "image",
        }
    }
}

// ============================================================================
// LAYER
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    /// 0..=100.
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Paint order, kept equal to the layer's index in the document vec.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub filters: FilterSettings,
    #[serde(flatten)]
    pub transform: Transform,
    #[serde(flatten)]
    pub content: LayerContent,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    100.0
}

impl Layer {
    pub fn new(id: LayerId, name: impl Into<String>, content: LayerContent) -> Layer {
        Layer {
            id,
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 100.0,
            blend_mode: BlendMode::Normal,
            order: 0,
            filters: FilterSettings::default(),
            transform: Transform::default(),
            content,
        }
    }

    pub fn set_opacity(&mut self, value: f32) {
        self.opacity = value.clamp(0.0, 100.0);
    }

    /// Update one named property from an untyped value.
    ///
    /// Keys cover the shared transform/appearance fields plus the fields of
    /// the layer's own content kind. Unknown keys and wrong-typed values are
    /// ignored and return false; out-of-range numbers are clamped. Property
    /// bags written by newer versions therefore degrade instead of failing.
    pub fn set_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "x" => set_f32(&mut self.transform.x, value),
            "y" => set_f32(&mut self.transform.y, value),
            "width" => set_f32_min(&mut self.transform.width, value, 0.0),
            "height" => set_f32_min(&mut self.transform.height, value, 0.0),
            "rotation" => set_f32(&mut self.transform.rotation, value),
            "scaleX" => set_f32(&mut self.transform.scale_x, value),
            "scaleY" => set_f32(&mut self.transform.scale_y, value),
            "skewX" => set_f32(&mut self.transform.skew_x, value),
            "skewY" => set_f32(&mut self.transform.skew_y, value),
            "opacity" => {
                let Some(v) = value.as_f64() else { return false };
                self.set_opacity(v as f32);
                true
            }
            "blendMode" => {
                let Some(s) = value.as_str() else { return false };
                self.blend_mode = BlendMode::from_name(s);
                true
            }
            "visible" => set_bool(&mut self.visible, value),
            "locked" => set_bool(&mut self.locked, value),
            "name" => {
                let Some(s) = value.as_str() else { return false };
                self.name = s.to_string();
                true
            }
            _ => self.set_content_property(key, value),
        }
    }

    fn set_content_property(&mut self, key: &str, value: &Value) -> bool {
        match &mut self.content {
            LayerContent::Background { color } => match key {
                "color" => set_color(color, value),
                _ => false,
            },
            LayerContent::Text {
                text,
                font_family,
                font_size,
                color,
                bold,
                italic,
                align,
            } => match key {
                "text" => set_string(text, value),
                "fontFamily" => set_string(font_family, value),
                "fontSize" => set_f32_min(font_size, value, 1.0),
                "color" => set_color(color, value),
                "bold" => set_bool(bold, value),
                "italic" => set_bool(italic, value),
                "align" => {
                    let Some(s) = value.as_str() else { return false };
                    *align = match s {
                        "left" => TextAlign::Left,
                        "center" => TextAlign::Center,
                        "right" => TextAlign::Right,
                        _ => return false,
                    };
                    true
                }
                _ => false,
            },
            LayerContent::Shape {
                fill,
                stroke_color,
                stroke_width,
                sides,
                ..
            } => match key {
                "fill" => set_color(fill, value),
                "strokeColor" => set_color(stroke_color, value),
                "strokeWidth" => set_f32_min(stroke_width, value, 0.0),
                "sides" => {
                    let Some(v) = value.as_u64() else { return false };
                    *sides = (v as u32).clamp(3, 32);
                    true
                }
                _ => false,
            },
            LayerContent::Gradient { colors, direction } => match key {
                "colors" => {
                    let Some(arr) = value.as_array() else { return false };
                    let parsed: Option<Vec<Color>> = arr
                        .iter()
                        .map(|v| v.as_str().and_then(Color::from_hex))
                        .collect();
                    match parsed {
                        Some(cs) if !cs.is_empty() => {
                            *colors = cs;
                            true
                        }
                        _ => false,
                    }
                }
                "direction" => {
                    let Some(s) = value.as_str() else { return false };
                    *direction = match s {
                        "horizontal" => GradientDirection::Horizontal,
                        "vertical" => GradientDirection::Vertical,
                        "diagonal" => GradientDirection::Diagonal,
                        "radial" => GradientDirection::Radial,
                        _ => return false,
                    };
                    true
                }
                _ => false,
            },
            LayerContent::Pattern {
                pattern,
                color1,
                color2,
                size,
            } => match key {
                "pattern" => {
                    let Some(s) = value.as_str() else { return false };
                    *pattern = match s {
                        "stripes" => PatternKind::Stripes,
                        "dots" => PatternKind::Dots,
                        _ => return false,
                    };
                    true
                }
                "color1" => set_color(color1, value),
                "color2" => set_color(color2, value),
                "size" => set_f32_min(size, value, 1.0),
                _ => false,
            },
            LayerContent::Image { scale, .. } => match key {
                "scale" => set_f32_min(scale, value, 0.01),
                _ => false,
            },
        }
    }
}

fn set_f32(slot: &mut f32, value: &Value) -> bool {
    match value.as_f64() {
        Some(v) => {
            *slot = v as f32;
            true
        }
        None => false,
    }
}

fn set_f32_min(slot: &mut f32, value: &Value, min: f32) -> bool {
    match value.as_f64() {
        Some(v) => {
            *slot = (v as f32).max(min);
            true
        }
        None => false,
    }
}

fn set_bool(slot: &mut bool, value: &Value) -> bool {
    match value.as_bool() {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

fn set_string(slot: &mut String, value: &Value) -> bool {
    match value.as_str() {
        Some(s) => {
            *slot = s.to_string();
            true
        }
        None => false,
    }
}

fn set_color(slot: &mut Color, value: &Value) -> bool {
    match value.as_str().and_then(Color::from_hex) {
        Some(c) => {
            *slot = c;
            true
        }
        None => false,
    }
}
