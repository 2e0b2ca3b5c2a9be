//! Build command implementation.
//!
//! Resolves an [`AppConfig`] from the source (descriptor plus flag
//! overrides), runs the pipeline on a blocking thread and prints stage
//! progress as it arrives.

use crate::cli::{BuildArgs, RuntimeConfig};
use crate::config::{AppConfig, AppConfigBuilder};
use crate::error::{Error, Result};
use crate::pipeline::{BuildOutcome, BuildPipeline, ChannelProgress};
use crate::project::ProjectDescriptor;
use crate::sign::ApkSigner;
use crate::workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration plus where the package goes when `--output` is absent.
struct Resolved {
    config: AppConfig,
    default_output: PathBuf,
}

fn apply_overrides(mut builder: AppConfigBuilder, build: &BuildArgs) -> AppConfigBuilder {
    if let Some(name) = &build.app_name {
        builder = builder.app_name(name);
    }
    if let Some(package) = &build.package_name {
        builder = builder.package_name(package);
    }
    if let Some(version) = &build.version_name {
        builder = builder.version_name(version);
    }
    if let Some(code) = build.version_code {
        builder = builder.version_code(code);
    }
    if let Some(icon) = &build.icon {
        builder = builder.icon_path(icon);
    }
    for dir in &build.ignore {
        builder = builder.ignore_dir(dir);
    }
    builder
}

fn package_file_name(config: &AppConfig) -> String {
    format!("{}_v{}.apk", config.app_name(), config.version_name())
}

fn resolve_config(build: &BuildArgs) -> Result<Resolved> {
    let source = build.source.as_path();
    if source.is_dir() {
        let descriptor = ProjectDescriptor::load(source)?;
        let config = apply_overrides(AppConfig::from_project(source, &descriptor), build).build()?;
        let default_output = source
            .join(&descriptor.build_dir)
            .join(package_file_name(&config));
        return Ok(Resolved {
            config,
            default_output,
        });
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let builder = AppConfig::builder()
        .app_name(stem)
        .version_name("1.0.0")
        .version_code(1)
        .source_path(source);
    let config = apply_overrides(builder, build).build()?;
    let default_output = PathBuf::from(package_file_name(&config));
    Ok(Resolved {
        config,
        default_output,
    })
}

fn load_signer(key: Option<&Path>, config: &RuntimeConfig) -> Result<ApkSigner> {
    match key {
        Some(path) => {
            let signer = ApkSigner::from_key_file(path)?;
            config.verbose_println(&format!(
                "Signing with {} ({})",
                path.display(),
                signer.fingerprint()
            ));
            Ok(signer)
        }
        None => {
            let signer = ApkSigner::generate()?;
            config.warning_println(
                "No signing key given, using an ephemeral key (updates will not install over this build)",
            );
            Ok(signer)
        }
    }
}

/// Execute build command
pub(super) async fn execute_build(build: &BuildArgs, config: &RuntimeConfig) -> Result<()> {
    let Resolved {
        config: app_config,
        default_output,
    } = resolve_config(build)?;
    let output = build.output.clone().unwrap_or(default_output);
    let workspace = build
        .workspace
        .clone()
        .unwrap_or_else(workspace::default_workspace_dir);
    workspace::check_overlap(&workspace, &build.source)?;
    let signer = load_signer(build.key.as_deref(), config)?;

    config.verbose_println(&format!("Template: {}", build.template.display()));
    config.verbose_println(&format!("Workspace: {}", workspace.display()));
    config.println(&format!(
        "📦 Building {} ({} {})",
        app_config.package_name(),
        app_config.version_name(),
        app_config.version_code()
    ));

    let (progress, mut events) = ChannelProgress::channel();
    let printer_output = config.output().clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let _ = printer_output.stage(&event);
        }
    });

    let pipeline = BuildPipeline::new(&build.template, workspace, output)
        .with_progress(Arc::new(progress))
        .keep_workspace(build.keep_workspace);
    let result = tokio::task::spawn_blocking(move || -> Result<BuildOutcome> {
        pipeline
            .prepare()?
            .with_config(app_config)?
            .build()?
            .sign(&signer)?
            .clean_workspace()
    })
    .await
    .map_err(|e| Error::GenericError(format!("build task failed: {e}")));

    // The pipeline owned the only sender, so the printer ends once it is gone.
    if let Err(e) = printer.await {
        log::debug!("Progress printer ended abnormally: {e}");
    }
    let outcome = result??;

    report(&outcome, config);
    Ok(())
}

fn report(outcome: &BuildOutcome, config: &RuntimeConfig) {
    config.success_println(&format!("Built {}", outcome.output.display()));
    let out = config.output();
    let _ = out.field("sha256", &outcome.sha256);
    let _ = out.field("entries", &outcome.entries.to_string());
    let _ = out.field(
        "build",
        &format!(
            "#{} ({})",
            outcome.build_info.build_number, outcome.build_info.build_id
        ),
    );
    let _ = out.field(
        "scripts",
        &format!(
            "{} encrypted, {} copied",
            outcome.report.encrypted, outcome.report.copied
        ),
    );
    config.verbose_println(&format!(
        "Renamed template package {}",
        outcome.template_package
    ));
    if let Some(kept) = &outcome.kept_workspace {
        let _ = out.info(&format!("Workspace kept at {}", kept.display()));
    }
}
