//! Add command - declare a dependency and install

use crate::cli::args::AddArgs;
use crate::config::Config;
use crate::error::JavelinResult;
use crate::install::{downloads_for, registry_for, run_cancellable, InstallOptions, Installer};
use crate::model::{Coordinate, Scope};
use crate::resolver::Resolver;
use crate::ui::{self, TaskSpinner, UiContext};

use super::install::load_manifest;

/// Execute the add command
pub async fn execute(args: AddArgs, config: &Config) -> JavelinResult<()> {
    let coordinate: Coordinate = args.coordinate.parse()?;
    let scope: Scope = args.scope.parse()?;

    let mut manifest = load_manifest(None).await?;
    manifest.add_dependency(&coordinate.identity(), &coordinate.version, scope, args.optional)?;
    manifest.save().await?;
    ui::step_info(&format!("Added {} ({})", coordinate, scope));

    // The declared set changed, so the lock is stale by construction
    let registry = registry_for(&manifest, config);
    let installer = Installer::new(
        Resolver::new(registry.clone(), config.network.max_parallel),
        downloads_for(registry, config),
    );

    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Resolving dependencies");

    match run_cancellable(installer.install(&manifest, InstallOptions::default())).await {
        Ok(report) => {
            spinner.stop(&format!(
                "Resolved {} artifact(s) ({} downloaded)",
                report.resolved, report.downloaded
            ));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Install failed");
            Err(e)
        }
    }
}
