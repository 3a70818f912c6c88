use crate::{
    config::{ApiConfig, Backend},
    encoder::{self, OutputFormat},
    error::{GenImgError, Result},
    logger::{self, LoggerConfig},
    models::{Capability, GenerationRequest, ImageSize, Quality},
    providers::{self, ImageProvider},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Every flag is optional here; defaults are applied once in
/// [`Cli::resolve`] from the backend's [`crate::config::Defaults`].
#[derive(Parser, Debug, Default)]
#[command(version)]
pub struct Cli {
    /// API key. Falls back to the backend's API key environment variable.
    #[arg(short = 'k', long = "api-key")]
    pub api_key: Option<String>,

    /// Prompt for image generation.
    #[arg(short, long, required_unless_present = "list_models")]
    pub prompt: Option<String>,

    /// Model to use for image generation.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Aspect ratio ("1:1", "16:9") or pixel size ("1024x1024") of the image.
    #[arg(short, long)]
    pub size: Option<String>,

    /// Quality of the generated image: "standard" or "hd".
    #[arg(short, long)]
    pub quality: Option<String>,

    /// Number of images to generate.
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub number: Option<u32>,

    /// Override the API base URL.
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Request shape for models missing from the catalog: "content" or "predict".
    #[arg(long, value_name = "MODE")]
    pub api_mode: Option<String>,

    /// How to print the pseudo-URLs.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::List)]
    pub format: OutputFormat,

    /// Also write the decoded images into this directory.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// List the models the API key can see and exit.
    #[arg(long)]
    pub list_models: bool,

    /// Log progress to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Generate(GenerationRequest),
    ListModels,
}

/// A fully resolved run: where to connect and what to do.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub backend: Backend,
    pub api: ApiConfig,
    pub action: Action,
    pub format: OutputFormat,
    pub output_dir: Option<PathBuf>,
}

fn non_empty(flag: &str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(GenImgError::ValidationError(format!(
            "The --{} argument must not be empty.",
            flag
        ))),
        other => Ok(other),
    }
}

impl Cli {
    pub fn command_for(backend: Backend) -> clap::Command {
        Self::command()
            .name(backend.bin_name())
            .bin_name(backend.bin_name())
            .about(backend.about())
    }

    pub fn parse_from_args<I, T>(backend: Backend, args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command_for(backend).try_get_matches_from(args)?;
        Self::from_arg_matches(&matches)
    }

    /// Merge flags over `env` and the backend defaults. Fails before any
    /// network call when the run cannot be valid.
    pub fn resolve(self, backend: Backend, env: ApiConfig) -> Result<Invocation> {
        let defaults = backend.defaults();

        let api_key = non_empty("api-key", self.api_key)?
            .or(env.api_key)
            .ok_or_else(|| {
                GenImgError::ValidationError(format!(
                    "The --api-key argument is required if {} environment variable is not set.",
                    backend.api_key_env()
                ))
            })?;
        let base_url = non_empty("base-url", self.base_url)?.or(env.base_url);
        let api = ApiConfig {
            api_key: Some(api_key),
            base_url,
        };

        let action = if self.list_models {
            Action::ListModels
        } else {
            let prompt = non_empty("prompt", self.prompt)?.ok_or_else(|| {
                GenImgError::ValidationError("The --prompt argument is required.".into())
            })?;
            let model = non_empty("model", self.model)?.unwrap_or(defaults.model);
            let size: ImageSize = non_empty("size", self.size)?
                .unwrap_or(defaults.size)
                .parse()?;
            let quality = match non_empty("quality", self.quality)? {
                Some(q) => q.parse::<Quality>()?,
                None => defaults.quality,
            };
            let explicit_mode = non_empty("api-mode", self.api_mode)?
                .map(|mode| mode.parse::<Capability>())
                .transpose()?;
            let capability = providers::resolve_capability(backend, &model, explicit_mode)?;

            let request = GenerationRequest {
                prompt,
                model: model.trim().to_string(),
                capability,
                size,
                quality,
                count: self.number.unwrap_or(defaults.number),
            };
            providers::check_size(backend, &request)?;
            Action::Generate(request)
        };

        Ok(Invocation {
            backend,
            api,
            action,
            format: self.format,
            output_dir: self.output_dir,
        })
    }
}

/// Perform the resolved action against `provider`, writing results to `out`.
pub async fn run<W: Write>(
    invocation: &Invocation,
    provider: &dyn ImageProvider,
    out: &mut W,
) -> Result<()> {
    match &invocation.action {
        Action::Generate(request) => {
            let payloads = {
                let _timer = logger::timer(&format!("{} image generation", provider.name()));
                provider.generate(request).await?
            };
            log::info!("Received {} image(s)", payloads.len());

            let urls = encoder::encode_all(payloads)?;
            if let Some(dir) = &invocation.output_dir {
                save_images(dir, &urls)?;
            }
            writeln!(out, "{}", encoder::render(&urls, invocation.format))?;
        }
        Action::ListModels => {
            for model in provider.list_models().await? {
                if model.methods.is_empty() {
                    writeln!(out, "{}", model.name)?;
                } else {
                    writeln!(out, "{} ({})", model.name, model.methods.join(", "))?;
                }
            }
        }
    }
    Ok(())
}

/// Write each image behind `urls` to `dir/image-{index}.{ext}`.
pub fn save_images(dir: &Path, urls: &[String]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(urls.len());
    for url in urls {
        let record = encoder::decode_pseudo_url(url)?;
        let bytes = BASE64
            .decode(record.b64_json.as_bytes())
            .map_err(|e| GenImgError::SerializationError(e.to_string()))?;
        let path = dir.join(format!("image-{}.{}", record.index, extension_for(&bytes)));
        fs::write(&path, &bytes)?;
        log::info!("💾 Image saved to: {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn extension_for(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "png"
    }
}

/// Entry point shared by both binaries. Every failure maps to exit code 1.
pub async fn run_cli<I, T>(backend: Backend, args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::parse_from_args(backend, args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let dotenv_loaded = dotenv::dotenv().is_ok();
    let log_config = if cli.verbose {
        LoggerConfig::verbose()
    } else {
        LoggerConfig::default()
    };
    let _ = logger::init_with_config(log_config.with_env_override());
    if dotenv_loaded {
        log::debug!("✅ .env file loaded");
    }

    let invocation = match cli.resolve(backend, ApiConfig::from_env(backend)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!(
                "error: {}\n\n{}",
                e,
                Cli::command_for(backend).render_usage()
            );
            return ExitCode::FAILURE;
        }
    };

    let provider = match providers::build_provider(invocation.backend, &invocation.api) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&invocation, provider.as_ref(), &mut std::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("Received an error while generating images: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImagePayload, RemoteModel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        images: Vec<ImagePayload>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn with_images(images: Vec<ImagePayload>) -> Self {
            Self {
                images,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<ImagePayload>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.images.clone())
        }

        async fn list_models(&self) -> Result<Vec<RemoteModel>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                RemoteModel {
                    name: "models/imagen-3.0-generate-002".into(),
                    methods: vec!["predict".into()],
                },
                RemoteModel {
                    name: "dall-e-3".into(),
                    methods: vec![],
                },
            ])
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ImageProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<ImagePayload>> {
            Err(GenImgError::TransportError("connection refused".into()))
        }

        async fn list_models(&self) -> Result<Vec<RemoteModel>> {
            Err(GenImgError::TransportError("connection refused".into()))
        }
    }

    fn parse(backend: Backend, args: &[&str]) -> Cli {
        let mut argv = vec![backend.bin_name()];
        argv.extend_from_slice(args);
        Cli::parse_from_args(backend, argv).unwrap()
    }

    fn keyed() -> ApiConfig {
        ApiConfig::new().with_api_key("env-key")
    }

    #[test]
    fn test_defaults_applied_once() {
        let invocation = parse(Backend::Gemini, &["-p", "a red balloon"])
            .resolve(Backend::Gemini, keyed())
            .unwrap();

        assert_eq!(invocation.api.api_key.as_deref(), Some("env-key"));
        let Action::Generate(request) = invocation.action else {
            panic!("expected a generation request");
        };
        assert_eq!(request.model, "gemini-2.0-flash-exp-image-generation");
        assert_eq!(request.capability, Capability::MultimodalContent);
        assert_eq!(
            request.size,
            ImageSize::AspectRatio {
                width: 1,
                height: 1
            }
        );
        assert_eq!(request.quality, Quality::Standard);
        assert_eq!(request.count, 1);
    }

    #[test]
    fn test_flags_override_environment() {
        let invocation = parse(
            Backend::OpenAi,
            &[
                "-k", "flag-key", "-p", "cat", "-m", "dall-e-3", "-s", "1792x1024", "-q",
                "hd", "-n", "3",
            ],
        )
        .resolve(Backend::OpenAi, keyed())
        .unwrap();

        assert_eq!(invocation.api.api_key.as_deref(), Some("flag-key"));
        let Action::Generate(request) = invocation.action else {
            panic!("expected a generation request");
        };
        assert_eq!(request.model, "dall-e-3");
        assert_eq!(request.quality, Quality::Hd);
        assert_eq!(request.count, 3);
        assert_eq!(request.size.to_string(), "1792x1024");
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let err = parse(Backend::Gemini, &["-p", "a red balloon"])
            .resolve(Backend::Gemini, ApiConfig::new())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_empty_values_are_not_replaced_by_defaults() {
        let err = parse(Backend::Gemini, &["-p", "a red balloon", "-m", ""])
            .resolve(Backend::Gemini, keyed())
            .unwrap_err();
        assert_eq!(err.to_string(), "The --model argument must not be empty.");

        let err = parse(Backend::Gemini, &["-p", "   "])
            .resolve(Backend::Gemini, keyed())
            .unwrap_err();
        assert!(err.is_validation());

        let err = parse(Backend::Gemini, &["-p", "x", "-k", ""])
            .resolve(Backend::Gemini, keyed())
            .unwrap_err();
        assert!(err.to_string().contains("--api-key"));
    }

    #[test]
    fn test_number_must_be_positive_integer() {
        for bad in ["two", "0", "-1", "1.5", ""] {
            let argv = ["genimg-gemini", "-p", "x", "-n", bad];
            assert!(
                Cli::parse_from_args(Backend::Gemini, argv).is_err(),
                "accepted --number {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_prompt_required_unless_listing() {
        assert!(Cli::parse_from_args(Backend::Gemini, ["genimg-gemini"]).is_err());
        let invocation = parse(Backend::Gemini, &["--list-models"])
            .resolve(Backend::Gemini, keyed())
            .unwrap();
        assert_eq!(invocation.action, Action::ListModels);
    }

    #[test]
    fn test_unknown_gemini_model_needs_mode() {
        let err = parse(Backend::Gemini, &["-p", "x", "-m", "gemini-9-image"])
            .resolve(Backend::Gemini, keyed())
            .unwrap_err();
        assert!(err.to_string().contains("--api-mode"));

        let invocation = parse(
            Backend::Gemini,
            &["-p", "x", "-m", "gemini-9-image", "--api-mode", "content"],
        )
        .resolve(Backend::Gemini, keyed())
        .unwrap();
        let Action::Generate(request) = invocation.action else {
            panic!("expected a generation request");
        };
        assert_eq!(request.capability, Capability::MultimodalContent);
    }

    #[test]
    fn test_wrong_size_form_for_backend() {
        let err = parse(Backend::OpenAi, &["-p", "x", "-s", "16:9"])
            .resolve(Backend::OpenAi, keyed())
            .unwrap_err();
        assert!(err.is_validation());

        let err = parse(
            Backend::Gemini,
            &["-p", "x", "-m", "imagen-3.0-generate-002", "-s", "1024x1024"],
        )
        .resolve(Backend::Gemini, keyed())
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_red_balloon_single_image() {
        let invocation = parse(Backend::Gemini, &["-p", "a red balloon", "-n", "1"])
            .resolve(Backend::Gemini, keyed())
            .unwrap();
        let provider = FakeProvider::with_images(vec![ImagePayload::Bytes(b"\x89PNG".to_vec())]);
        let mut out = Vec::new();

        run(&invocation, &provider, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        let printed = printed.trim();
        assert!(printed.starts_with("['") && printed.ends_with("']"));
        let url = &printed[2..printed.len() - 2];
        assert!(!url.contains('\''));
        let record = encoder::decode_pseudo_url(url).unwrap();
        assert_eq!(record.index, 0);
        assert_eq!(BASE64.decode(record.b64_json).unwrap(), b"\x89PNG");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_k_images_keep_order() {
        let invocation = parse(
            Backend::OpenAi,
            &["-p", "x", "-n", "3", "--format", "lines"],
        )
        .resolve(Backend::OpenAi, keyed())
        .unwrap();
        let provider = FakeProvider::with_images(vec![
            ImagePayload::Base64(BASE64.encode("zero")),
            ImagePayload::Base64(BASE64.encode("one")),
            ImagePayload::Base64(BASE64.encode("two")),
        ]);
        let mut out = Vec::new();

        run(&invocation, &provider, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 3);
        for (position, (line, expected)) in lines.iter().zip(["zero", "one", "two"]).enumerate() {
            let record = encoder::decode_pseudo_url(line).unwrap();
            assert_eq!(record.index, position);
            assert_eq!(BASE64.decode(record.b64_json).unwrap(), expected.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_provider_error_writes_nothing() {
        let invocation = parse(Backend::Gemini, &["-p", "x"])
            .resolve(Backend::Gemini, keyed())
            .unwrap();
        let mut out = Vec::new();

        let err = run(&invocation, &FailingProvider, &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, GenImgError::TransportError(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_list_models_output() {
        let invocation = parse(Backend::Gemini, &["--list-models"])
            .resolve(Backend::Gemini, keyed())
            .unwrap();
        let provider = FakeProvider::with_images(vec![]);
        let mut out = Vec::new();

        run(&invocation, &provider, &mut out).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "models/imagen-3.0-generate-002 (predict)\ndall-e-3\n"
        );
    }

    struct ListingProvider {
        models: Vec<RemoteModel>,
    }

    #[async_trait]
    impl ImageProvider for ListingProvider {
        fn name(&self) -> &'static str {
            "listing"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<ImagePayload>> {
            Ok(vec![])
        }

        async fn list_models(&self) -> Result<Vec<RemoteModel>> {
            Ok(self.models.clone())
        }
    }

    #[tokio::test]
    async fn test_openai_listing_shows_ids_only() {
        let invocation = parse(Backend::OpenAi, &["--list-models"])
            .resolve(Backend::OpenAi, keyed())
            .unwrap();
        let listing = serde_json::from_value(serde_json::json!({
            "data": [{"id": "dall-e-3", "owned_by": "system"}]
        }))
        .unwrap();
        let provider = ListingProvider {
            models: crate::providers::OpenAiClient::models_from_listing(listing),
        };
        let mut out = Vec::new();

        run(&invocation, &provider, &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "dall-e-3\n");
    }

    #[tokio::test]
    async fn test_output_dir_receives_images() {
        let dir = std::env::temp_dir().join(format!("genimg-test-{}", std::process::id()));
        let invocation = parse(
            Backend::Gemini,
            &["-p", "x", "-o", dir.to_str().unwrap()],
        )
        .resolve(Backend::Gemini, keyed())
        .unwrap();
        let provider = FakeProvider::with_images(vec![
            ImagePayload::Bytes(b"\x89PNG-data".to_vec()),
            ImagePayload::Bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        ]);
        let mut out = Vec::new();

        run(&invocation, &provider, &mut out).await.unwrap();

        assert_eq!(fs::read(dir.join("image-0.png")).unwrap(), b"\x89PNG-data");
        assert_eq!(
            fs::read(dir.join("image-1.jpg")).unwrap(),
            vec![0xFF, 0xD8, 0xFF, 0xE0]
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_help_exits_zero_and_bad_args_exit_one() {
        let help = run_cli(Backend::Gemini, ["genimg-gemini", "--help"]).await;
        assert_eq!(format!("{:?}", help), format!("{:?}", ExitCode::SUCCESS));

        let bad = run_cli(Backend::Gemini, ["genimg-gemini", "-p", "x", "-n", "many"]).await;
        assert_eq!(format!("{:?}", bad), format!("{:?}", ExitCode::FAILURE));
    }
}
