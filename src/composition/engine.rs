use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::{
    composition::chain::{process_image, video_plan, ProcessRequest},
    config::Config,
    encoder::{
        EncoderPaths, EncoderRunner, InvocationBuilder, InvocationPlan, OutputOverrides, Progress,
    },
    error::{ComposerError, ConfigError, ResourceError, Result},
    imaging::{ImageOperation, ImageTool},
    resource::{
        classify, ensure_exists, is_remote, kind_for_extension, kind_from_extension, url_extension,
        Downloader, ResourceDescriptor, ResourceKind, ResourceSpec, StagedFiles,
    },
    storage::Storage,
};

/// Stem used when a request does not name its output
const DEFAULT_OUTPUT_NAME: &str = "composition";

/// Container every composition is written to
const OUTPUT_EXTENSION: &str = "mp4";

/// A compose request as read from a JSON or TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    /// Resources in playback order; their position is their encoder input index
    pub resources: Vec<ResourceSpec>,

    #[serde(default)]
    pub output: OutputOverrides,

    #[serde(default)]
    pub output_name: Option<String>,
}

impl ComposeRequest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_request(path.as_ref())
    }
}

impl ProcessRequest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_request(path.as_ref())
    }
}

/// Parse a request file; `.toml` files are TOML, everything else JSON
fn load_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let parse_failed = |reason: String| ConfigError::ParseFailed {
        path: path.display().to_string(),
        reason,
    };

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&content).map_err(|e| parse_failed(e.to_string()).into())
    } else {
        serde_json::from_str(&content).map_err(|e| parse_failed(e.to_string()).into())
    }
}

/// Result of a finished composition or processing chain
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub output_path: PathBuf,

    /// Encoder command line, shell-quoted
    pub command_line: String,

    pub expected_duration: Option<f64>,
}

/// Main engine that turns requests into encoder runs
///
/// A compose request goes through a fixed pipeline:
/// 1. Resolve - download remote sources into staging
/// 2. Classify - decide image/video/audio and check files exist
/// 3. Plan - assemble the filter graph and encoder arguments
/// 4. Encode - run ffmpeg with progress reporting
/// 5. Cleanup - remove staged downloads, whatever the outcome
pub struct CompositionEngine {
    config: Config,
    paths: EncoderPaths,
    storage: Storage,
    runner: EncoderRunner,
}

impl CompositionEngine {
    /// Create an engine with already located tools
    pub fn new(config: Config, paths: EncoderPaths) -> Self {
        let storage = Storage::new(&config.storage);
        let runner = EncoderRunner::new()
            .with_timeout(config.encoder.timeout_secs.map(Duration::from_secs));
        Self {
            config,
            paths,
            storage,
            runner,
        }
    }

    /// Run a compose request end to end
    pub async fn compose(
        &self,
        request: &ComposeRequest,
        progress: Option<Sender<Progress>>,
    ) -> Result<ComposeOutcome> {
        info!("🎬 Starting composition");
        info!("   Resources: {}", request.resources.len());

        self.storage.ensure_dirs()?;
        let mut staged = StagedFiles::new();

        let outcome = self.compose_staged(request, progress, &mut staged).await;

        // Pipeline Step 5: Cleanup
        if !staged.is_empty() {
            info!("🧹 Step 5: Removing {} staged downloads", staged.len());
        }
        staged.cleanup();

        match &outcome {
            Ok(done) => info!("🎉 Composition complete! Output saved to: {:?}", done.output_path),
            Err(e) => warn!("Composition failed: {}", e),
        }
        outcome
    }

    async fn compose_staged(
        &self,
        request: &ComposeRequest,
        progress: Option<Sender<Progress>>,
        staged: &mut StagedFiles,
    ) -> Result<ComposeOutcome> {
        // Pipeline Step 1: Resolve
        let local = self.resolve_sources(&request.resources, staged).await?;

        // Pipeline Step 2: Classify
        let resources = self.classify_resources(&request.resources, &local, true)?;

        // Pipeline Step 3: Plan
        let output_path = self.output_path(request.output_name.as_deref(), None)?;
        let plan = self.build_plan(request, &resources, &output_path)?;

        // Pipeline Step 4: Encode
        info!("🎞️  Step 4: Encoding {:?}", output_path);
        let run = self.runner.run(&plan, progress).await?;

        Ok(ComposeOutcome {
            output_path,
            command_line: run.command_line,
            expected_duration: plan.expected_duration,
        })
    }

    /// Build the encoder invocation without running it
    ///
    /// Remote sources are not downloaded; they are passed to the encoder as
    /// URLs and classified by the extension of the URL path, query aside.
    pub fn plan(&self, request: &ComposeRequest) -> Result<InvocationPlan> {
        let local: Vec<PathBuf> = request
            .resources
            .iter()
            .map(|spec| {
                if is_remote(&spec.source) {
                    PathBuf::from(&spec.source)
                } else {
                    self.storage.resolve_source(&spec.source)
                }
            })
            .collect();

        let resources = self.classify_resources(&request.resources, &local, false)?;
        let output_path = self.output_path(request.output_name.as_deref(), None)?;
        self.build_plan(request, &resources, &output_path)
    }

    // ==========================================
    // PIPELINE STEP 1: RESOLVE
    // ==========================================

    /// Local file for every request entry, downloading remote ones
    async fn resolve_sources(
        &self,
        specs: &[ResourceSpec],
        staged: &mut StagedFiles,
    ) -> Result<Vec<PathBuf>> {
        info!("📥 Step 1: Resolving sources...");

        let remote = specs.iter().filter(|spec| is_remote(&spec.source)).count();
        let downloader = if remote > 0 {
            Some(Downloader::new(&self.config.download, self.storage.staging_dir())?)
        } else {
            None
        };

        let mut local = Vec::with_capacity(specs.len());
        for spec in specs {
            match &downloader {
                Some(downloader) if is_remote(&spec.source) => {
                    let path = downloader.fetch(&spec.source).await?;
                    staged.track(&path);
                    local.push(path);
                }
                _ => local.push(self.storage.resolve_source(&spec.source)),
            }
        }

        info!("   ✅ {} sources resolved ({} downloaded)", local.len(), remote);
        Ok(local)
    }

    // ==========================================
    // PIPELINE STEP 2: CLASSIFY
    // ==========================================

    fn classify_resources(
        &self,
        specs: &[ResourceSpec],
        local: &[PathBuf],
        check_files: bool,
    ) -> Result<Vec<ResourceDescriptor>> {
        info!("🔎 Step 2: Classifying resources...");

        let mut resources = Vec::with_capacity(specs.len());
        for (index, (spec, path)) in specs.iter().zip(local).enumerate() {
            let kind = if is_remote(&path.to_string_lossy()) {
                // only `plan` keeps URLs; the query string is not part of the extension
                spec.kind
                    .or_else(|| url_extension(&spec.source).and_then(|e| kind_for_extension(&e)))
            } else {
                classify(spec, path)
            };
            let kind = kind.ok_or_else(|| {
                ComposerError::invalid_resource(
                    index,
                    format!("cannot tell the type of '{}'", spec.source),
                )
            })?;
            let resource = ResourceDescriptor::from_spec(spec, kind, path);

            if check_files && !is_remote(&path.to_string_lossy()) {
                ensure_exists(&resource)?;
            }
            debug!("      #{} {} {:?}", index, kind.as_str(), path);
            resources.push(resource);
        }

        Ok(resources)
    }

    // ==========================================
    // PIPELINE STEP 3: PLAN
    // ==========================================

    fn build_plan(
        &self,
        request: &ComposeRequest,
        resources: &[ResourceDescriptor],
        output_path: &Path,
    ) -> Result<InvocationPlan> {
        info!("🧩 Step 3: Building filter graph...");

        let options = self.config.output.with_overrides(&request.output);
        let plan = InvocationBuilder::new(&self.paths.ffmpeg, &options)
            .threads(self.config.encoder.threads)
            .build(resources, output_path)?;

        info!("   ✅ {} encoder arguments", plan.args.len());
        if let Some(total) = plan.expected_duration {
            info!("      Expected length: {:.1}s", total);
        }
        Ok(plan)
    }

    fn output_path(&self, name: Option<&str>, extension: Option<&str>) -> Result<PathBuf> {
        self.storage
            .output_path(name.unwrap_or(DEFAULT_OUTPUT_NAME), extension.unwrap_or(OUTPUT_EXTENSION))
    }

    // ==========================================
    // PROCESSING CHAIN
    // ==========================================

    /// Apply an operation chain to one image or video
    pub async fn process(&self, request: &ProcessRequest) -> Result<ComposeOutcome> {
        info!("🛠️  Processing {} ({} operations)", request.source, request.operations.len());
        request.validate()?;
        self.storage.ensure_dirs()?;

        let mut staged = StagedFiles::new();
        let outcome = self.process_staged(request, &mut staged).await;
        staged.cleanup();

        if let Ok(done) = &outcome {
            info!("🎉 Processing complete! Output saved to: {:?}", done.output_path);
        }
        outcome
    }

    /// Local path for a processing input: uploads lookup, or a staged download
    async fn resolve_local(&self, source: &str, staged: &mut StagedFiles) -> Result<PathBuf> {
        if is_remote(source) {
            let downloader = Downloader::new(&self.config.download, self.storage.staging_dir())?;
            let path = downloader.fetch(source).await?;
            staged.track(&path);
            Ok(path)
        } else {
            Ok(self.storage.resolve_source(source))
        }
    }

    /// Point every image watermark at a local file
    async fn resolve_watermarks(
        &self,
        operations: &[ImageOperation],
        staged: &mut StagedFiles,
    ) -> Result<Vec<ImageOperation>> {
        let mut resolved = Vec::with_capacity(operations.len());
        for operation in operations {
            match operation {
                ImageOperation::ImageWatermark(mark) => {
                    let source = mark.source.to_string_lossy().into_owned();
                    let path = self.resolve_local(&source, staged).await?;
                    if !path.is_file() {
                        return Err(ResourceError::NotFound {
                            path: path.display().to_string(),
                        }
                        .into());
                    }
                    let mut mark = mark.clone();
                    mark.source = path;
                    resolved.push(ImageOperation::ImageWatermark(mark));
                }
                other => resolved.push(other.clone()),
            }
        }
        Ok(resolved)
    }

    async fn process_staged(
        &self,
        request: &ProcessRequest,
        staged: &mut StagedFiles,
    ) -> Result<ComposeOutcome> {
        let input = self.resolve_local(&request.source, staged).await?;

        let kind = kind_from_extension(&input).ok_or_else(|| {
            ComposerError::invalid_resource(
                0,
                format!("cannot tell the type of '{}'", request.source),
            )
        })?;
        let resource = ResourceDescriptor::new(kind, &input);
        ensure_exists(&resource)?;
        let operations = self.resolve_watermarks(&request.operations, staged).await?;

        let stem = request
            .output_name
            .clone()
            .or_else(|| {
                Path::new(&request.source)
                    .file_stem()
                    .map(|s| format!("{}_processed", s.to_string_lossy()))
            })
            .unwrap_or_else(|| "processed".to_string());

        match kind {
            ResourceKind::Image => {
                let magick = self.paths.require_magick()?;
                let extension = input.extension().and_then(|e| e.to_str()).unwrap_or("png");
                let output_path = self.storage.output_path(&stem, extension)?;

                let staging_dir = self.storage.staging_dir();
                let tool = ImageTool::new(magick, staging_dir, self.runner.clone());
                process_image(&tool, &operations, &input, &output_path, staging_dir).await?;

                Ok(ComposeOutcome {
                    command_line: format!("{} ({} steps)", magick.display(), request.operations.len()),
                    output_path,
                    expected_duration: None,
                })
            }
            ResourceKind::Video => {
                let output_path = self.storage.output_path(&stem, OUTPUT_EXTENSION)?;
                let plan = video_plan(
                    &self.paths.ffmpeg,
                    &operations,
                    &input,
                    &output_path,
                    &self.config.output,
                )?;
                let run = self.runner.run(&plan, None).await?;

                Ok(ComposeOutcome {
                    output_path,
                    command_line: run.command_line,
                    expected_duration: None,
                })
            }
            ResourceKind::Audio => Err(ComposerError::invalid_resource(
                0,
                "audio resources cannot be processed; use an image or a video",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::{CompositionError, EncoderError, ResourceError};
    use tempfile::{tempdir, TempDir};

    fn engine(root: &TempDir, ffmpeg: &str) -> CompositionEngine {
        let mut config = Config::default();
        config.storage = StorageConfig {
            upload_dir: root.path().join("uploads"),
            output_dir: root.path().join("outputs"),
            staging_dir: root.path().join("uploads/staging"),
        };
        config.encoder.threads = 0;
        CompositionEngine::new(config, EncoderPaths::new(ffmpeg))
    }

    fn upload(root: &TempDir, name: &str) {
        let uploads = root.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join(name), b"not really media").unwrap();
    }

    fn request(json: &str) -> ComposeRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_load_request_by_extension() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("request.json");
        std::fs::write(&json, r#"{"resources": [{"source": "a.png", "duration": 2}], "outputName": "demo"}"#)
            .unwrap();
        let toml_path = dir.path().join("request.toml");
        std::fs::write(
            &toml_path,
            "outputName = \"demo\"\n[[resources]]\nsource = \"a.png\"\nduration = 2.0\n[output]\nwidth = 640\n",
        )
        .unwrap();

        let from_json = ComposeRequest::from_file(&json).unwrap();
        let from_toml = ComposeRequest::from_file(&toml_path).unwrap();
        assert_eq!(from_json.resources[0].duration, Some(2.0));
        assert_eq!(from_toml.resources[0].source, "a.png");
        assert_eq!(from_toml.output.width, Some(640));
        assert_eq!(from_json.output_name.as_deref(), Some("demo"));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(matches!(
            ComposeRequest::from_file(&broken),
            Err(ComposerError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn test_demo_requests_parse() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");

        let compose = ComposeRequest::from_file(demos.join("compose_request.json")).unwrap();
        assert_eq!(compose.resources.len(), 4);
        assert_eq!(compose.output.fps, Some(30.0));

        let process = ProcessRequest::from_file(demos.join("process_request.toml")).unwrap();
        assert!(process.validate().is_ok());

        let config = Config::from_file(demos.join("config.toml")).unwrap();
        assert_eq!(config.encoder.timeout_secs, Some(900));
    }

    #[test]
    fn test_plan_resolves_uploads_and_applies_overrides() {
        let root = tempdir().unwrap();
        let engine = engine(&root, "ffmpeg");
        let plan = engine
            .plan(&request(
                r#"{
                    "resources": [
                        {"source": "a.png", "duration": 3, "transition": "fade", "transitionDuration": 0.5},
                        {"source": "b.png", "duration": 3, "transition": "fade", "transitionDuration": 0.5},
                        {"source": "music.mp3", "volume": 50}
                    ],
                    "output": {"width": 640, "height": 360}
                }"#,
            ))
            .unwrap();

        let first_input = root.path().join("uploads").join("a.png").to_string_lossy().into_owned();
        assert_eq!(plan.value_of("-i"), Some(first_input.as_str()));
        let graph = plan.value_of("-filter_complex").unwrap();
        assert!(graph.contains("w=640:h=360"));
        assert!(graph.contains("[2:a]volume=0.5[a2]"));
        assert_eq!(plan.expected_duration, Some(6.0));
        assert!(plan.args.last().unwrap().ends_with(".mp4"));
        assert_eq!(plan.value_of("-threads"), None);
    }

    #[test]
    fn test_plan_keeps_remote_urls() {
        let root = tempdir().unwrap();
        let engine = engine(&root, "ffmpeg");
        let plan = engine
            .plan(&request(r#"{"resources": [{"source": "https://cdn.example.com/clip.mp4"}]}"#))
            .unwrap();
        assert_eq!(plan.value_of("-i"), Some("https://cdn.example.com/clip.mp4"));
    }

    #[test]
    fn test_plan_classifies_signed_urls_by_path() {
        let root = tempdir().unwrap();
        let engine = engine(&root, "ffmpeg");
        let plan = engine
            .plan(&request(
                r#"{"resources": [
                    {"source": "https://cdn.example.com/clip.mp4?sig=abc&exp=1700000000"},
                    {"source": "https://cdn.example.com/theme.MP3#intro"}
                ]}"#,
            ))
            .unwrap();

        let graph = plan.value_of("-filter_complex").unwrap();
        assert!(graph.starts_with("[0:v]scale="));
        assert!(!graph.contains("loop="));
        assert!(plan.args.iter().any(|a| a == "1:a"));
    }

    #[test]
    fn test_unknown_kind_is_invalid_parameters() {
        let root = tempdir().unwrap();
        let engine = engine(&root, "ffmpeg");
        let result = engine.plan(&request(r#"{"resources": [{"source": "notes.txt"}]}"#));
        assert!(matches!(
            result,
            Err(ComposerError::Resource(ResourceError::InvalidParameters { index: 0, .. }))
        ));
    }

    #[tokio::test]
    async fn test_compose_missing_file_is_not_found() {
        let root = tempdir().unwrap();
        let engine = engine(&root, "ffmpeg");
        let result = engine
            .compose(&request(r#"{"resources": [{"source": "missing.mp4"}]}"#), None)
            .await;
        assert!(matches!(result, Err(ComposerError::Resource(ResourceError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn test_compose_rejects_audio_only() {
        let root = tempdir().unwrap();
        upload(&root, "music.mp3");
        let engine = engine(&root, "ffmpeg");
        let result = engine
            .compose(&request(r#"{"resources": [{"source": "music.mp3"}]}"#), None)
            .await;
        assert!(matches!(
            result,
            Err(ComposerError::Composition(CompositionError::NoVisualContent))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compose_runs_encoder() {
        let root = tempdir().unwrap();
        upload(&root, "clip.mp4");
        // `true` stands in for an encoder that succeeds
        let engine = engine(&root, "true");

        let outcome = engine
            .compose(&request(r#"{"resources": [{"source": "clip.mp4"}], "outputName": "result"}"#), None)
            .await
            .unwrap();

        assert!(outcome.command_line.starts_with("true -y -hide_banner"));
        assert_eq!(outcome.output_path.parent().unwrap(), root.path().join("outputs"));
        assert!(outcome
            .output_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("result_"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compose_reports_encoder_failure() {
        let root = tempdir().unwrap();
        upload(&root, "clip.mp4");
        let engine = engine(&root, "false");

        let result = engine
            .compose(&request(r#"{"resources": [{"source": "clip.mp4"}]}"#), None)
            .await;
        assert!(matches!(
            result,
            Err(ComposerError::Encoder(EncoderError::ProcessFailed { code: Some(1), .. }))
        ));
    }

    #[tokio::test]
    async fn test_process_image_needs_magick() {
        let root = tempdir().unwrap();
        upload(&root, "photo.jpg");
        let engine = engine(&root, "ffmpeg");

        let request: ProcessRequest =
            serde_json::from_str(r#"{"source": "photo.jpg", "operations": [{"type": "grayscale"}]}"#).unwrap();
        assert!(matches!(
            engine.process(&request).await,
            Err(ComposerError::Encoder(EncoderError::NotInstalled { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_resolves_watermark_from_uploads() {
        let root = tempdir().unwrap();
        upload(&root, "clip.mp4");
        upload(&root, "logo.png");
        let engine = engine(&root, "true");

        let request: ProcessRequest = serde_json::from_str(
            r#"{"source": "clip.mp4", "operations": [{"type": "imageWatermark", "source": "logo.png"}]}"#,
        )
        .unwrap();
        let outcome = engine.process(&request).await.unwrap();

        let logo = root.path().join("uploads").join("logo.png");
        assert!(outcome.command_line.contains(logo.to_string_lossy().as_ref()));
    }

    #[tokio::test]
    async fn test_process_missing_watermark_is_not_found() {
        let root = tempdir().unwrap();
        upload(&root, "clip.mp4");
        let engine = engine(&root, "ffmpeg");

        let request: ProcessRequest = serde_json::from_str(
            r#"{"source": "clip.mp4", "operations": [{"type": "imageWatermark", "source": "nope.png"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            engine.process(&request).await,
            Err(ComposerError::Resource(ResourceError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_process_rejects_audio() {
        let root = tempdir().unwrap();
        upload(&root, "music.mp3");
        let engine = engine(&root, "ffmpeg");

        let request: ProcessRequest =
            serde_json::from_str(r#"{"source": "music.mp3", "operations": [{"type": "flip"}]}"#).unwrap();
        assert!(matches!(
            engine.process(&request).await,
            Err(ComposerError::Resource(ResourceError::InvalidParameters { .. }))
        ));
    }
}
