use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};

/// Mesh format of a build-plate asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Stl,
    Obj,
}

impl AssetFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
        }
    }

    /// Detect the format from a path's extension (case-insensitive).
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1;
        if ext.eq_ignore_ascii_case("stl") {
            Some(Self::Stl)
        } else if ext.eq_ignore_ascii_case("obj") {
            Some(Self::Obj)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stl => write!(f, "STL"),
            Self::Obj => write!(f, "OBJ"),
        }
    }
}

/// Build-plate mesh shown under the models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlateAsset {
    pub path: String,
    pub format: AssetFormat,
}

/// Printable area in millimetres.
///
/// In the logical frame the plate is centred on the origin: X spans the
/// width, Y the depth and Z the height above the plate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PrintableArea {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl PrintableArea {
    pub fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    pub fn half_depth(&self) -> f64 {
        self.depth / 2.0
    }

    /// Size as `[width, depth, height]`.
    pub fn size(&self) -> [f64; 3] {
        [self.width, self.depth, self.height]
    }
}

impl std::fmt::Display for PrintableArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}×{} mm", self.width, self.depth, self.height)
    }
}

/// A printer's build volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildVolume {
    pub printer_id: String,
    pub printer_name: String,
    pub asset: PlateAsset,
    pub printable_area: PrintableArea,
}

impl BuildVolume {
    /// Entry whose asset lives at `/build-plates/<id>.<ext>`.
    pub fn new(id: &str, name: &str, format: AssetFormat, area: PrintableArea) -> Self {
        Self {
            printer_id: id.to_string(),
            printer_name: name.to_string(),
            asset: PlateAsset {
                path: format!("/build-plates/{}.{}", id, format.extension()),
                format,
            },
            printable_area: area,
        }
    }

    /// Check ids, dimensions and the asset format.
    pub fn validate(&self) -> ProfileResult<()> {
        if self.printer_id.trim().is_empty() {
            return Err(ProfileError::MissingField("printer_id".to_string()));
        }
        if self.printer_name.trim().is_empty() {
            return Err(ProfileError::MissingField("printer_name".to_string()));
        }
        if self.asset.path.trim().is_empty() {
            return Err(ProfileError::MissingField("asset.path".to_string()));
        }

        let area = &self.printable_area;
        for (field, value) in [
            ("width", area.width),
            ("depth", area.depth),
            ("height", area.height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ProfileError::InvalidDimension {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if AssetFormat::from_path(&self.asset.path) != Some(self.asset.format) {
            return Err(ProfileError::AssetFormatMismatch {
                path: self.asset.path.clone(),
                format: self.asset.format.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for BuildVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.printer_name, self.printable_area)
    }
}
