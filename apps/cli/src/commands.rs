use axum::Router;
use chrono::{DateTime, Utc};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use quire_ssg::{BuildReport, SiteConfig, minify_output};
use std::fs;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::Duration;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

const DEBOUNCE_DURATION: Duration = Duration::from_millis(300);

type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn run_build(config_path: &Path) -> CommandResult<BuildReport> {
    let config = SiteConfig::load(config_path)?;
    Ok(quire_ssg::build(&config)?)
}

pub fn build_site(config_path: &Path) -> CommandResult {
    let report = run_build(config_path)?;
    println!(
        "Built {} posts, {} tags, {} categories ({} pages) in {:.2?}",
        report.posts, report.tags, report.categories, report.pages, report.elapsed
    );
    Ok(())
}

pub async fn serve_site(config_path: &Path, port: Option<u16>, open_browser: bool) -> CommandResult {
    let config = SiteConfig::load(config_path)?;
    build_site(config_path)?;

    let (notify_tx, notify_rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        notify_tx,
        Config::default().with_poll_interval(Duration::from_millis(200)),
    )?;

    for dir in [&config.content_dir, &config.source_dir] {
        if dir.exists() {
            watcher.watch(dir, RecursiveMode::Recursive)?;
        } else {
            warn!("Not watching missing directory {}", dir.display());
        }
    }
    watcher.watch(config_path, RecursiveMode::NonRecursive)?;

    let rebuild_config = config_path.to_path_buf();
    std::thread::spawn(move || {
        loop {
            match notify_rx.recv() {
                Ok(_event) => {
                    loop {
                        match notify_rx.recv_timeout(DEBOUNCE_DURATION) {
                            Ok(_) => continue,
                            Err(RecvTimeoutError::Timeout) => break,
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }

                    info!("Changes detected, rebuilding");
                    if let Err(rebuild_error) = run_build(&rebuild_config) {
                        error!("Rebuild failed: {rebuild_error}");
                    }
                }
                Err(watch_error) => {
                    error!("Watch error: {watch_error}");
                    break;
                }
            }
        }
    });

    let port = port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("Serving {} at http://{addr}", config.build_dir.display());
    println!("Press Ctrl+C to stop");

    if open_browser {
        let url = format!("http://localhost:{port}");
        if let Err(open_error) = open::that(&url) {
            warn!("Failed to open browser: {open_error}");
        }
    }

    let serve_dir = ServeDir::new(&config.build_dir).append_index_html_on_directories(true);
    let app = Router::new().fallback_service(serve_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    drop(watcher);
    Ok(())
}

/// Front matter and summary marker for a fresh post.
pub fn post_scaffold(title: &str, now: DateTime<Utc>) -> String {
    format!(
        "---\ntitle: \"{}\"\ndate: {}\ndraft: false\ntags: []\nimage: \"\"\ncover: \"\"\n---\n\n\n<!--more-->\n\n\n",
        title.replace('\\', "\\\\").replace('"', "\\\""),
        now.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// Where a new post at `relative` lands. Only plain relative paths inside
/// the content directory are accepted; `.md` is added when missing.
fn post_destination(content_dir: &Path, relative: &Path) -> CommandResult<PathBuf> {
    let is_plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !is_plain || relative.as_os_str().is_empty() {
        return Err(format!("'{}' must be a path inside the content directory", relative.display()).into());
    }

    let mut destination = content_dir.join(relative);
    if destination.extension().is_none_or(|extension| extension != "md") {
        let mut file_name = destination
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".md");
        destination.set_file_name(file_name);
    }
    Ok(destination)
}

pub fn new_post(config_path: &Path, relative: &Path) -> CommandResult {
    let config = SiteConfig::load(config_path)?;
    let destination = post_destination(&config.content_dir, relative)?;

    if destination.exists() {
        return Err(format!("'{}' already exists", destination.display()).into());
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let title = destination
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    fs::write(&destination, post_scaffold(&title, Utc::now()))?;

    println!("Created {}", destination.display());
    Ok(())
}

pub fn minify_site(config_path: &Path) -> CommandResult {
    let config = SiteConfig::load(config_path)?;
    if !config.build_dir.is_dir() {
        return Err(format!(
            "Build directory {} not found, run `quire build` first",
            config.build_dir.display()
        )
        .into());
    }

    let count = minify_output(&config.build_dir)?;
    println!("Minified {count} files in {}", config.build_dir.display());
    Ok(())
}
