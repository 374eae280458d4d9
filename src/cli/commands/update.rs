//! Update command - bump manifest pins and re-resolve

use crate::cli::args::UpdateArgs;
use crate::config::Config;
use crate::error::JavelinResult;
use crate::install::{downloads_for, registry_for, run_cancellable, InstallOptions, Installer};
use crate::model::Identity;
use crate::resolver::Resolver;
use crate::ui::{self, TaskSpinner, UiContext};

use super::install::load_manifest;

/// Execute the update command
pub async fn execute(args: UpdateArgs, config: &Config) -> JavelinResult<()> {
    let mut manifest = load_manifest(None).await?;
    let registry = registry_for(&manifest, config);
    let resolver = Resolver::new(registry.clone(), config.network.max_parallel);

    if let Some(coordinate) = &args.coordinate {
        let identity: Identity = coordinate.parse()?;

        if args.latest {
            let latest = resolver.latest_version(&identity).await?;
            manifest.set_version(&identity, &latest)?;
            manifest.save().await?;
            ui::step_info(&format!("Pinned {} to {}", identity, latest));
        }
    }

    // A version bump changes the fingerprint; a bare `update` forces
    // re-resolution within the current pins
    let force = args.coordinate.is_none() || !args.latest;
    let installer = Installer::new(resolver, downloads_for(registry, config));

    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Re-resolving dependencies");

    match run_cancellable(installer.install(
        &manifest,
        InstallOptions {
            force,
            ..Default::default()
        },
    ))
    .await
    {
        Ok(report) => {
            spinner.stop(&format!(
                "Resolved {} artifact(s) ({} downloaded)",
                report.resolved, report.downloaded
            ));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Update failed");
            Err(e)
        }
    }
}
