//! Printer build volumes.
//!
//! A compiled-in table of supported printers with their printable area and
//! the build-plate asset rendered under the models, plus a short list of
//! sample models.

pub mod error;
pub mod model;
pub mod registry;
pub mod samples;

pub use error::{ProfileError, ProfileResult, RegistryError, RegistryResult};
pub use model::{AssetFormat, BuildVolume, PlateAsset, PrintableArea};
pub use registry::{BuildVolumeRegistry, DEFAULT_PRINTER_ID};
pub use samples::{default_sample, lookup_sample, sample_ids, sample_models, SampleModel};
