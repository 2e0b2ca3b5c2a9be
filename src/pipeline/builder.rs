//! Typestate build pipeline.

use crate::apk::{self, ManifestIdentity, ICON_PATH, PROJECT_ASSETS_DIR};
use crate::config::AppConfig;
use crate::crypto::ScriptKey;
use crate::error::{Context, Error, ErrorExt, Result};
use crate::pipeline::{PipelineState, ProgressCallback, ProgressEvent, Stage};
use crate::project::{BuildInfo, ProjectDescriptor};
use crate::sign::{self, PackageSigner};
use crate::workspace::{self, StageReport, WorkspaceGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod sealed {
    pub trait Sealed {}
}

/// Marker for pipeline states.
pub trait PipelineStage: sealed::Sealed {
    /// Runtime view of the state.
    const STATE: PipelineState;
}

/// Nothing done yet.
#[derive(Debug)]
pub struct New;

/// Template extracted into the workspace.
#[derive(Debug)]
pub struct Prepared;

/// Scripts staged and manifest patched.
#[derive(Debug)]
pub struct Configured {
    config: AppConfig,
    descriptor: ProjectDescriptor,
    old_package: String,
    report: StageReport,
}

/// Icon written and resource table renamed.
#[derive(Debug)]
pub struct Built {
    descriptor: ProjectDescriptor,
    old_package: String,
    report: StageReport,
}

/// Package written and signed.
#[derive(Debug)]
pub struct Signed {
    descriptor: ProjectDescriptor,
    old_package: String,
    report: StageReport,
    entries: usize,
    sha256: String,
}

macro_rules! impl_stage {
    ($($ty:ident => $state:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl PipelineStage for $ty {
                const STATE: PipelineState = PipelineState::$state;
            }
        )*
    };
}

impl_stage! {
    New => New,
    Prepared => Prepared,
    Configured => Configured,
    Built => Built,
    Signed => Signed,
}

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Signed package
    pub output: PathBuf,
    /// Hex SHA-256 of the package
    pub sha256: String,
    /// Number of signed entries
    pub entries: usize,
    /// Build info used for this build's key derivation
    pub build_info: BuildInfo,
    /// Package name the template declared
    pub template_package: String,
    /// Script staging summary
    pub report: StageReport,
    /// Workspace left on disk, when it was kept
    pub kept_workspace: Option<PathBuf>,
}

/// Turns a template package and a script project into a signed package.
///
/// ```no_run
/// # fn main() -> scriptapk::Result<()> {
/// use scriptapk::{AppConfig, ApkSigner, BuildPipeline};
///
/// let config = AppConfig::builder()
///     .app_name("Tool")
///     .package_name("com.acme.tool")
///     .version_name("1.0")
///     .version_code(1)
///     .source_path("project")
///     .build()?;
/// let outcome = BuildPipeline::new("template.apk", "workspace", "Tool_v1.0.apk")
///     .prepare()?
///     .with_config(config)?
///     .build()?
///     .sign(&ApkSigner::generate()?)?
///     .clean_workspace()?;
/// println!("{}", outcome.sha256);
/// # Ok(())
/// # }
/// ```
pub struct BuildPipeline<S: PipelineStage> {
    template: PathBuf,
    output: PathBuf,
    workspace: WorkspaceGuard,
    progress: Option<Arc<dyn ProgressCallback>>,
    state: S,
}

impl<S: PipelineStage + std::fmt::Debug> std::fmt::Debug for BuildPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("template", &self.template)
            .field("output", &self.output)
            .field("workspace", &self.workspace)
            .field("state", &self.state)
            .finish()
    }
}

impl BuildPipeline<New> {
    /// New pipeline. Nothing touches the disk until [`prepare`](Self::prepare).
    pub fn new(
        template: impl Into<PathBuf>,
        workspace: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            template: template.into(),
            output: output.into(),
            workspace: WorkspaceGuard::new(workspace),
            progress: None,
            state: New,
        }
    }

    /// Receive stage notifications.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Leave the workspace on disk when the pipeline is dropped or cleaned.
    pub fn keep_workspace(mut self, keep: bool) -> Self {
        self.workspace.set_keep(keep);
        self
    }

    /// Extract the template into the workspace.
    ///
    /// The pipeline owns the workspace from here on. A non-empty directory
    /// that is not a scriptapk workspace is refused and never deleted.
    pub fn prepare(mut self) -> Result<BuildPipeline<Prepared>> {
        self.notify(Stage::Prepare);
        log::info!("Preparing workspace {}", self.workspace.path().display());
        let staged = workspace::stage(&self.template, self.workspace.path());
        // Arm even on failure so a half-extracted workspace is cleaned up.
        self.workspace.arm_if_owned();
        staged.map_err(|e| e.in_stage(Stage::Prepare))?;
        Ok(self.advance(|_| Prepared))
    }
}

impl BuildPipeline<Prepared> {
    /// Update the descriptor, stage the scripts and patch the manifest.
    ///
    /// Directory projects get their descriptor's build number incremented and
    /// written back to the project. Single scripts get a synthesized
    /// descriptor inside the package.
    pub fn with_config(self, config: AppConfig) -> Result<BuildPipeline<Configured>> {
        let configured = self
            .configure(config)
            .map_err(|e| e.in_stage(Stage::Configure))?;
        Ok(self.advance(|_| configured))
    }

    fn configure(&self, config: AppConfig) -> Result<Configured> {
        let source = config.source_path();
        workspace::check_overlap(self.workspace.path(), source)?;
        let target = self.workspace.path().join(PROJECT_ASSETS_DIR);

        let (descriptor, report) = if source.is_dir() {
            let mut descriptor = ProjectDescriptor::load(source)?;
            descriptor.bump_build();
            descriptor.save(source)?;
            let key = ScriptKey::for_descriptor(&descriptor);
            let report = workspace::copy_project_tree(&target, source, config.ignored_dirs(), &key)?;
            (descriptor, report)
        } else {
            let mut descriptor = ProjectDescriptor::new(config.app_name(), config.package_name());
            descriptor.version_name = config.version_name().to_string();
            descriptor.version_code = config.version_code();
            descriptor.build_info = BuildInfo::generate(u64::from(config.version_code()));
            let key = ScriptKey::for_descriptor(&descriptor);
            let report = workspace::stage_single_script(&target, source, &descriptor, &key)?;
            (descriptor, report)
        };
        log::info!(
            "Staged {} files for build {} ({} encrypted)",
            report.files(),
            descriptor.build_info.build_id,
            report.encrypted
        );

        let identity = ManifestIdentity {
            package_name: config.package_name().to_string(),
            version_name: config.version_name().to_string(),
            version_code: config.version_code(),
            app_label: config.app_name().to_string(),
        };
        let patched = apk::patch_manifest_file(self.workspace.path(), &identity)?;

        Ok(Configured {
            config,
            descriptor,
            old_package: patched.old_package,
            report,
        })
    }
}

impl BuildPipeline<Configured> {
    /// Write the launcher icon and rename the resource table package.
    pub fn build(self) -> Result<BuildPipeline<Built>> {
        self.notify(Stage::Build);
        self.finalize_resources()
            .map_err(|e| e.in_stage(Stage::Build))?;
        Ok(self.advance(|c| Built {
            descriptor: c.descriptor,
            old_package: c.old_package,
            report: c.report,
        }))
    }

    fn finalize_resources(&self) -> Result<()> {
        let ws = self.workspace.path();
        if let Some(icon) = self.state.config.icon() {
            match icon.load().context("loading launcher icon")? {
                Some(image) => {
                    let path = ws.join(ICON_PATH);
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).fs_context("creating icon directory", parent)?;
                    }
                    image
                        .save_with_format(&path, image::ImageFormat::Png)
                        .map_err(Error::from)
                        .with_context(|| format!("writing launcher icon {}", path.display()))?;
                    log::info!("Wrote launcher icon {}", path.display());
                }
                None => log::debug!("Icon producer returned nothing, keeping template icon"),
            }
        }
        apk::patch_resource_table_file(
            ws,
            Some(&self.state.old_package),
            self.state.config.package_name(),
        )?;
        Ok(())
    }
}

impl BuildPipeline<Built> {
    /// Archive the workspace into the output package and sign it.
    pub fn sign<K>(self, signer: &K) -> Result<BuildPipeline<Signed>>
    where
        K: PackageSigner + ?Sized,
    {
        self.notify(Stage::Sign);
        let (entries, sha256) = self
            .archive(signer)
            .map_err(|e| e.in_stage(Stage::Sign))?;
        log::info!("Signed package {} (sha256 {})", self.output.display(), sha256);

        Ok(self.advance(|b| Signed {
            descriptor: b.descriptor,
            old_package: b.old_package,
            report: b.report,
            entries,
            sha256,
        }))
    }

    fn archive<K>(&self, signer: &K) -> Result<(usize, String)>
    where
        K: PackageSigner + ?Sized,
    {
        let signed = sign::archive_and_sign(self.workspace.path(), &self.output, signer)?;
        Ok((signed.entries, sign::sha256_file(&signed.path)?))
    }
}

impl BuildPipeline<Signed> {
    /// Remove the workspace and report what was built.
    ///
    /// A workspace marked with [`keep_workspace`](BuildPipeline::keep_workspace)
    /// is left in place and reported in the outcome.
    pub fn clean_workspace(self) -> Result<BuildOutcome> {
        self.notify(Stage::Clean);
        let BuildPipeline {
            output,
            workspace,
            state,
            ..
        } = self;
        let kept_workspace = if workspace.is_kept() {
            let path = workspace.detach();
            log::info!("Keeping workspace {}", path.display());
            Some(path)
        } else {
            workspace.remove().map_err(|e| e.in_stage(Stage::Clean))?;
            None
        };
        Ok(BuildOutcome {
            output,
            sha256: state.sha256,
            entries: state.entries,
            build_info: state.descriptor.build_info,
            template_package: state.old_package,
            report: state.report,
            kept_workspace,
        })
    }
}

impl<S: PipelineStage> BuildPipeline<S> {
    /// Current state.
    pub fn state(&self) -> PipelineState {
        S::STATE
    }

    /// Workspace directory.
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Destination package.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Template package.
    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Stop owning the workspace and return its path; it stays on disk.
    pub fn detach_workspace(self) -> PathBuf {
        let BuildPipeline { workspace, .. } = self;
        workspace.detach()
    }

    fn event(&self, stage: Stage) -> ProgressEvent {
        ProgressEvent {
            stage,
            state: S::STATE,
            workspace: self.workspace.path().to_path_buf(),
            output: self.output.clone(),
        }
    }

    fn notify(&self, stage: Stage) {
        let Some(progress) = &self.progress else {
            return;
        };
        let event = self.event(stage);
        match stage {
            Stage::Prepare => progress.on_prepare(&event),
            Stage::Build => progress.on_build(&event),
            Stage::Sign => progress.on_sign(&event),
            Stage::Clean => progress.on_clean(&event),
            Stage::Configure => {}
        }
    }

    fn advance<T: PipelineStage>(self, next: impl FnOnce(S) -> T) -> BuildPipeline<T> {
        let BuildPipeline {
            template,
            output,
            workspace,
            progress,
            state,
        } = self;
        BuildPipeline {
            template,
            output,
            workspace,
            progress,
            state: next(state),
        }
    }
}

impl Signed {
    /// Build info of the signed build.
    pub fn build_info(&self) -> &BuildInfo {
        &self.descriptor.build_info
    }
}

impl BuildPipeline<Signed> {
    /// Build info of the signed build.
    pub fn build_info(&self) -> &BuildInfo {
        self.state.build_info()
    }

    /// Hex SHA-256 of the signed package.
    pub fn sha256(&self) -> &str {
        &self.state.sha256
    }
}

impl BuildPipeline<Configured> {
    /// Descriptor used for key derivation.
    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.state.descriptor
    }

    /// Package name the template declared.
    pub fn template_package(&self) -> &str {
        &self.state.old_package
    }
}
