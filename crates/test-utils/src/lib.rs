pub mod builders;
pub mod fake_executor;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use assetflow::config::model::{AssetConfig, BrowserTargets, ProjectMetadata};
use assetflow::fs::FileSystem;
use assetflow::pipeline::{Diagnostic, DiagnosticSink, StageContext};
use assetflow::types::AssetClass;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs are captured per test and only shown for failing tests (unless run
/// with `-- --nocapture`). Enable levels with e.g. `RUST_LOG=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Diagnostic sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }

    /// Rules reported, in order.
    pub fn rules(&self) -> Vec<&'static str> {
        self.diagnostics().iter().map(|d| d.rule).collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Project root used by in-memory fixtures.
pub const MOCK_ROOT: &str = "/proj";

pub fn sample_metadata() -> ProjectMetadata {
    ProjectMetadata {
        name: "site".to_string(),
        title: "Sample Site".to_string(),
        url: "https://example.org".to_string(),
        author: "Jo Doe".to_string(),
        version: "1.0.0".to_string(),
        license: "MIT".to_string(),
    }
}

/// Stage context for `class` with the classic layout below [`MOCK_ROOT`],
/// the classic browser matrix and a fixed banner year.
pub fn stage_context(
    class: AssetClass,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn DiagnosticSink>,
) -> Arc<StageContext> {
    Arc::new(StageContext {
        asset: AssetConfig::default_for(class, "src", "dist"),
        browsers: BrowserTargets::classic(),
        metadata: sample_metadata(),
        year: 2024,
        root: PathBuf::from(MOCK_ROOT),
        fs,
        sink,
    })
}
