//! Headless preview session driven from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use buildplate_core::ModelId;
use buildplate_settings::{default_config_path, ViewportConfig};
use buildplate_viewport::{AssetLoader, HeadlessBackend, RendererStats, ValidationError, Viewport};
use clap::Parser;

/// Preview models on a printer's build plate and report placement problems
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(
    name = "buildplate",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_DATE"), ")"),
    about,
    long_about = None
)]
pub struct SessionOptions {
    /// Printer id; unknown ids fall back to the default printer
    #[arg(long, value_name = "ID")]
    pub printer: Option<String>,

    /// Viewport config file (TOML or JSON)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root for `/build-plates/...` and `/models/...` asset paths
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Start from a built-in sample model
    #[arg(long, value_name = "ID")]
    pub sample: Option<String>,

    /// STL or OBJ files to place
    #[arg(value_name = "FILE", required_unless_present = "sample")]
    pub files: Vec<String>,
}

impl SessionOptions {
    /// Config from `--config`, or the platform default when it exists.
    pub fn load_config(&self) -> anyhow::Result<ViewportConfig> {
        let mut config = match (&self.config, default_config_path()) {
            (Some(path), _) => ViewportConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            (None, Some(path)) => ViewportConfig::load_or_default(&path)?,
            (None, None) => ViewportConfig::default(),
        };
        if let Some(printer) = &self.printer {
            config.printer.default_printer = printer.clone();
        }
        Ok(config)
    }
}

/// Outcome of one model in the session.
#[derive(Debug, Clone)]
pub struct ModelReport {
    pub id: ModelId,
    pub path: String,
    pub loaded: bool,
    pub failure: Option<String>,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub printer: String,
    pub models: Vec<ModelReport>,
    pub stats: RendererStats,
}

impl SessionReport {
    pub fn all_placed(&self) -> bool {
        self.models.iter().all(|m| m.loaded && m.errors.is_empty())
    }
}

/// Load every file onto the plate, wait for the loads and validate.
pub async fn run(options: &SessionOptions, config: &ViewportConfig) -> SessionReport {
    let loader = match &options.assets {
        Some(root) => AssetLoader::with_root(root),
        None => AssetLoader::new(),
    };
    let mut viewport = Viewport::new(config, HeadlessBackend::new(), Arc::new(loader));
    tracing::info!("Active printer: {}", viewport.store().build_volume());

    let mut ids: Vec<(ModelId, String)> = Vec::new();
    if let Some(sample_id) = &options.sample {
        match viewport.load_sample(sample_id) {
            Some(id) => ids.push((id, sample_id.clone())),
            None => tracing::warn!("Unknown sample model {}", sample_id),
        }
    }
    ids.extend(
        options
            .files
            .iter()
            .filter_map(|path| viewport.add_model(path, None).map(|id| (id, path.clone()))),
    );
    viewport.settle().await;

    for toast in viewport.take_notifications() {
        tracing::warn!("{}: {}", toast.title, toast.description);
    }

    let models = ids
        .into_iter()
        .map(|(id, path)| ModelReport {
            id,
            loaded: viewport.renderer().has_instance(id),
            failure: viewport.renderer().load_failure(id).map(str::to_string),
            errors: viewport.store().errors_for(id).cloned().collect(),
            path,
        })
        .collect();

    SessionReport {
        printer: viewport.store().active_printer().to_string(),
        models,
        stats: viewport.renderer().stats(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_FACES: [[[f32; 3]; 3]; 2] = [
        [[0.0, 0.0, 0.0], [10.0, 10.0, 0.0], [10.0, 0.0, 0.0]],
        [[0.0, 0.0, 10.0], [10.0, 0.0, 10.0], [10.0, 10.0, 10.0]],
    ];

    fn binary_stl(faces: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&(faces.len() as u32).to_le_bytes());
        for face in faces {
            // Zero normal, three vertices, empty attribute
            data.extend_from_slice(&[0u8; 12]);
            for vertex in face {
                for c in vertex {
                    data.extend_from_slice(&c.to_le_bytes());
                }
            }
            data.extend_from_slice(&[0u8; 2]);
        }
        data
    }

    #[test]
    fn test_parse_flags_and_files() {
        let options = SessionOptions::try_parse_from([
            "buildplate",
            "--printer",
            "ultimaker-s3",
            "a.stl",
            "--config",
            "/tmp/viewport.toml",
            "b.obj",
        ])
        .expect("Should parse");
        assert_eq!(options.printer.as_deref(), Some("ultimaker-s3"));
        assert_eq!(options.config, Some(PathBuf::from("/tmp/viewport.toml")));
        assert_eq!(options.files, vec!["a.stl", "b.obj"]);
    }

    #[test]
    fn test_parse_rejects_missing_value_and_unknown_flags() {
        let parse = |args: &[&str]| SessionOptions::try_parse_from(args.iter().copied());
        assert!(parse(&["buildplate", "a.stl", "--printer"]).is_err());
        assert!(parse(&["buildplate", "--frobnicate", "a.stl"]).is_err());
        assert!(parse(&["buildplate"]).is_err());
        assert_eq!(
            parse(&["buildplate", "--help"]).map_err(|e| e.kind()),
            Err(clap::error::ErrorKind::DisplayHelp)
        );
    }

    #[test]
    fn test_sample_stands_in_for_files() {
        let options = SessionOptions::try_parse_from(["buildplate", "--sample", "boom-bracket"])
            .expect("Should parse");
        assert_eq!(options.sample.as_deref(), Some("boom-bracket"));
        assert!(options.files.is_empty());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        SessionOptions::command().debug_assert();
    }

    #[test]
    fn test_printer_flag_overrides_config() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("viewport.toml");
        ViewportConfig::default()
            .save_to_file(&path)
            .expect("Should save");

        let options = SessionOptions {
            printer: Some("makerbot-sketch-sprint".to_string()),
            config: Some(path),
            files: vec!["a.stl".to_string()],
            ..Default::default()
        };
        let config = options.load_config().expect("Should load");
        assert_eq!(config.printer.default_printer, "makerbot-sketch-sprint");
    }

    #[tokio::test]
    async fn test_run_loads_and_validates() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("cube.stl");
        std::fs::write(&path, binary_stl(&CUBE_FACES)).expect("Should write");

        let options = SessionOptions {
            files: vec![
                path.display().to_string(),
                dir.path().join("missing.stl").display().to_string(),
            ],
            ..Default::default()
        };
        let report = run(&options, &ViewportConfig::default()).await;

        assert_eq!(report.printer, "ultimaker-s7");
        assert_eq!(report.models.len(), 2);
        assert!(report.models[0].loaded, "{:?}", report.models[0].failure);
        assert!(report.models[0].errors.is_empty());
        assert!(!report.models[1].loaded);
        assert!(report.models[1].failure.is_some());
        assert!(!report.all_placed());
    }

    #[tokio::test]
    async fn test_run_places_sample_from_assets() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        std::fs::create_dir(dir.path().join("models")).expect("Should create models dir");
        std::fs::write(
            dir.path().join("models").join("boomBracket.stl"),
            binary_stl(&CUBE_FACES),
        )
        .expect("Should write");

        let options = SessionOptions {
            assets: Some(dir.path().to_path_buf()),
            sample: Some("boom-bracket".to_string()),
            ..Default::default()
        };
        let report = run(&options, &ViewportConfig::default()).await;

        assert_eq!(report.models.len(), 1);
        assert_eq!(report.models[0].path, "boom-bracket");
        assert!(report.models[0].loaded, "{:?}", report.models[0].failure);
        assert!(report.all_placed());
    }
}
