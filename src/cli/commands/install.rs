//! Install command - resolve, download, materialize

use crate::cache::CacheKey;
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::{JavelinError, JavelinResult};
use crate::install::{downloads_for, registry_for, run_cancellable, InstallOptions, Installer};
use crate::project::Manifest;
use crate::resolver::Resolver;
use crate::ui::{self, DownloadProgress, TaskSpinner, UiContext};
use std::sync::Arc;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> JavelinResult<()> {
    let manifest = load_manifest(args.file.as_deref()).await?;

    let ctx = UiContext::detect();
    let progress = DownloadProgress::new(&ctx);

    let registry = registry_for(&manifest, config);
    let downloads = downloads_for(registry.clone(), config).with_progress({
        let progress = progress.clone();
        Arc::new(move |key: &CacheKey| progress.artifact_done(&key.filename()))
    });
    let installer = Installer::new(
        Resolver::new(registry, config.network.max_parallel),
        downloads,
    );

    let options = InstallOptions {
        production: args.production,
        force: args.force,
    };

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Resolving dependencies");

    let report = match run_cancellable(installer.install(&manifest, options)).await {
        Ok(report) => report,
        Err(e) => {
            progress.finish();
            spinner.stop_error("Install failed");
            return Err(e);
        }
    };

    progress.finish();
    if report.from_lock {
        spinner.stop(&format!(
            "Installed {} artifact(s) from lock ({} downloaded)",
            report.resolved, report.downloaded
        ));
    } else {
        spinner.stop(&format!(
            "Resolved {} artifact(s) ({} downloaded)",
            report.resolved, report.downloaded
        ));
        if report.lock_written {
            ui::step_info("javelin.lock updated");
        }
    }
    ui::step_done(&format!(
        "{} artifact(s) in {}",
        report.materialized.len(),
        manifest.lib_dir().display()
    ));

    Ok(())
}

/// Load the manifest from --file or the working directory.
pub async fn load_manifest(file: Option<&std::path::Path>) -> JavelinResult<Manifest> {
    match file {
        Some(path) => Manifest::load(path).await,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| JavelinError::io("getting current directory", e))?;
            Manifest::load_dir(&cwd).await
        }
    }
}
