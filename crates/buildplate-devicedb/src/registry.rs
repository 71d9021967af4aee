//! Build-volume registry.
//!
//! The built-in table is compiled into the binary. Lookups of unknown
//! printer ids fall back to the first entry without surfacing an error.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{RegistryError, RegistryResult};
use crate::model::{AssetFormat, BuildVolume, PrintableArea};

/// Printer selected when nothing else is configured.
pub const DEFAULT_PRINTER_ID: &str = "ultimaker-s7";

fn builtin_table() -> &'static [BuildVolume] {
    static TABLE: OnceLock<Vec<BuildVolume>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            BuildVolume::new(
                "ultimaker-s7",
                "Ultimaker S7",
                AssetFormat::Obj,
                PrintableArea::new(330.0, 240.0, 300.0),
            ),
            BuildVolume::new(
                "ultimaker-s3",
                "Ultimaker S3",
                AssetFormat::Obj,
                PrintableArea::new(230.0, 190.0, 200.0),
            ),
            BuildVolume::new(
                "ultimaker-method-x",
                "Ultimaker Method X",
                AssetFormat::Stl,
                PrintableArea::new(294.0, 190.0, 200.0),
            ),
            BuildVolume::new(
                "ultimaker-method-xl",
                "Ultimaker Method XL",
                AssetFormat::Stl,
                PrintableArea::new(294.0, 190.0, 300.0),
            ),
            BuildVolume::new(
                "ultimaker-factor4",
                "Ultimaker Factor 4",
                AssetFormat::Obj,
                PrintableArea::new(330.0, 240.0, 300.0),
            ),
            BuildVolume::new(
                "makerbot-sketch-sprint",
                "MakerBot Sketch Sprint",
                AssetFormat::Obj,
                PrintableArea::new(200.0, 200.0, 200.0),
            ),
        ]
    })
}

/// Ordered, non-empty set of build volumes keyed by printer id.
#[derive(Debug, Clone)]
pub struct BuildVolumeRegistry {
    volumes: Vec<BuildVolume>,
}

impl BuildVolumeRegistry {
    /// The compiled-in printer table.
    pub fn builtin() -> Self {
        Self {
            volumes: builtin_table().to_vec(),
        }
    }

    /// Build a registry from explicit entries.
    ///
    /// The first entry becomes the default. Entries must be valid and
    /// have unique ids.
    pub fn new(volumes: Vec<BuildVolume>) -> RegistryResult<Self> {
        if volumes.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for volume in &volumes {
            volume.validate()?;
            if !seen.insert(volume.printer_id.as_str()) {
                return Err(RegistryError::DuplicateId(volume.printer_id.clone()));
            }
        }
        Ok(Self { volumes })
    }

    /// Exact lookup by printer id.
    pub fn lookup(&self, printer_id: &str) -> Option<&BuildVolume> {
        self.volumes.iter().find(|v| v.printer_id == printer_id)
    }

    /// The first entry.
    pub fn default_volume(&self) -> &BuildVolume {
        &self.volumes[0]
    }

    /// Lookup with silent fallback to the default entry.
    pub fn resolve(&self, printer_id: &str) -> &BuildVolume {
        match self.lookup(printer_id) {
            Some(volume) => volume,
            None => {
                let fallback = self.default_volume();
                tracing::debug!(
                    "Unknown printer '{}', using {}",
                    printer_id,
                    fallback.printer_id
                );
                fallback
            }
        }
    }

    pub fn printer_ids(&self) -> Vec<&str> {
        self.volumes.iter().map(|v| v.printer_id.as_str()).collect()
    }

    pub fn volumes(&self) -> &[BuildVolume] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Always false; a registry is never empty.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

impl Default for BuildVolumeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
