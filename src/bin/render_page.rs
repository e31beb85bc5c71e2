use anyhow::{Context, Result, anyhow};
use clap::Parser;
use panelsmith::config::{ServiceConfig, setup_logging};
use panelsmith::references::RawReference;
use panelsmith::script::{PageScript, validate_script};
use panelsmith::service::{ComicService, CoverImageRequest, PageImageRequest, RetryOverride};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Render one storyboard page (or a cover) without running the server.
///
/// Minimal UX:
///   render_page story.json --page 2 --style ghibli
///   render_page --cover --style pixar --language ja
#[derive(Parser, Debug)]
#[command(name = "render_page")]
#[command(about = "Render a comic page or cover from a storyboard script via the Gemini image model")]
struct Args {
    /// Storyboard JSON: a single page, a list of pages, or `{"pages": [...]}`
    script: Option<PathBuf>,

    /// 1-based page to render when the script holds several
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Render a cover instead of a page
    #[arg(long, default_value_t = false)]
    cover: bool,

    /// Style key (doraemon, american, watercolor, disney, ghibli, pixar, shonen)
    #[arg(long, default_value = "doraemon")]
    style: String,

    /// Cover title language (zh, en, ja)
    #[arg(long, default_value = "en")]
    language: String,

    /// Reference image: URL, artifact path or data URI. Repeat for more.
    #[arg(long = "reference")]
    references: Vec<String>,

    /// Google API key
    #[arg(required = true, long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: String,

    /// Output directory for the rendered PNG
    #[arg(long, default_value = "./static/images", env = "PANELSMITH_ARTIFACT_DIR")]
    out_dir: PathBuf,

    /// Attempts before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn load_page(path: &Path, index: usize) -> Result<PageScript> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut script: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {} as JSON", path.display()))?;
    if let Some(pages) = script.get_mut("pages").map(Value::take) {
        script = pages;
    }
    validate_script(&script).map_err(|err| anyhow!("{}: {err}", path.display()))?;

    let page = match script {
        Value::Array(mut pages) => {
            if index == 0 || index > pages.len() {
                return Err(anyhow!(
                    "Page {index} out of range, script has {} page(s)",
                    pages.len()
                ));
            }
            pages.swap_remove(index - 1)
        }
        page => page,
    };
    serde_json::from_value(page).context("Failed to read page structure")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow!("Failed to set up logging: {err}"))?;

    let config = ServiceConfig {
        artifact_dir: args.out_dir.clone(),
        ..ServiceConfig::default()
    };
    let service = ComicService::new(reqwest::Client::new(), config);
    let references: Vec<RawReference> = args
        .references
        .iter()
        .map(|reference| RawReference::from(reference.as_str()))
        .collect();
    let retry = RetryOverride {
        max_retries: Some(args.max_attempts),
        retry_delay: None,
    };

    let generated = if args.cover {
        service
            .generate_cover_image(CoverImageRequest {
                style: args.style,
                language: args.language,
                references,
                google_api_key: Some(args.google_api_key),
                retry,
            })
            .await?
    } else {
        let path = args
            .script
            .as_ref()
            .ok_or_else(|| anyhow!("A script file is required unless --cover is set"))?;
        let page = load_page(path, args.page)?;
        service
            .generate_page_image(PageImageRequest {
                page,
                style: args.style,
                references: None,
                prior_pages: references,
                google_api_key: Some(args.google_api_key),
                retry,
            })
            .await?
    };

    let file_name = generated
        .artifact_id
        .rsplit('/')
        .next()
        .unwrap_or_default();
    eprintln!("Saved: {}", args.out_dir.join(file_name).display());
    println!("{}", generated.artifact_id);
    Ok(())
}
