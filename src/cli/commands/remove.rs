//! Remove command - drop a declared dependency

use crate::cli::args::RemoveArgs;
use crate::config::Config;
use crate::error::JavelinResult;
use crate::install::{downloads_for, registry_for, run_cancellable, InstallOptions, Installer};
use crate::model::Identity;
use crate::resolver::Resolver;
use crate::ui::{self, TaskSpinner, UiContext};

use super::install::load_manifest;

/// Execute the remove command
pub async fn execute(args: RemoveArgs, config: &Config) -> JavelinResult<()> {
    let identity: Identity = args.coordinate.parse()?;

    let mut manifest = load_manifest(None).await?;
    let scope = manifest.remove_dependency(&identity)?;
    manifest.save().await?;
    ui::step_info(&format!("Removed {} ({})", identity, scope));

    // Re-resolve so the lock and lib/ reflect the smaller declared set
    let registry = registry_for(&manifest, config);
    let installer = Installer::new(
        Resolver::new(registry.clone(), config.network.max_parallel),
        downloads_for(registry, config),
    );

    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Re-resolving dependencies");

    match run_cancellable(installer.install(&manifest, InstallOptions::default())).await {
        Ok(report) => {
            spinner.stop(&format!("Lock now pins {} artifact(s)", report.resolved));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Re-resolution failed");
            Err(e)
        }
    }
}
