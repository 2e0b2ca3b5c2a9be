//! End-to-end builds against a synthetic template package.

mod common;

use common::{TEMPLATE_PACKAGE, entry_names, project, read_entry, template_apk};
use scriptapk::apk::{ResourceTable, XmlDocument};
use scriptapk::{
    AppConfig, ApkSigner, BuildPipeline, ChannelProgress, Error, ExecutionMode, IconSource,
    PackageSigner, ProjectDescriptor, ScriptKey, Stage, ValidationError, decrypt_script, verify_apk,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn project_config(project: &Path) -> AppConfig {
    let descriptor = ProjectDescriptor::load(project).unwrap();
    AppConfig::from_project(project, &descriptor)
        .ignore_dir(project.join("res/../node_modules"))
        .build()
        .unwrap()
}

fn run(template: &Path, workspace: &Path, output: &Path, config: AppConfig) -> scriptapk::BuildOutcome {
    BuildPipeline::new(template, workspace, output)
        .prepare()
        .unwrap()
        .with_config(config)
        .unwrap()
        .build()
        .unwrap()
        .sign(&ApkSigner::generate().unwrap())
        .unwrap()
        .clean_workspace()
        .unwrap()
}

#[test]
fn test_project_build_produces_verifiable_package() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    std::fs::create_dir_all(project.join("node_modules/pkg")).unwrap();
    std::fs::write(project.join("node_modules/pkg/index.js"), "x").unwrap();
    let workspace = dir.path().join("ws");
    let output = dir.path().join("out/Tool_v1.0.0.apk");

    let outcome = run(&template, &workspace, &output, project_config(&project));

    assert_eq!(outcome.output, output);
    assert_eq!(outcome.template_package, TEMPLATE_PACKAGE);
    assert_eq!(outcome.build_info.build_number, 1);
    assert_eq!(outcome.report.encrypted, 2);
    assert!(outcome.kept_workspace.is_none());
    assert!(!workspace.exists());

    let verified = verify_apk(&output).unwrap();
    assert_eq!(verified.entries, outcome.entries);
    assert_eq!(outcome.sha256.len(), 64);

    let names = entry_names(&output);
    assert!(names.iter().any(|n| n == "classes.dex"));
    assert!(names.iter().any(|n| n == "assets/project/res/data.txt"));
    assert!(!names.iter().any(|n| n == "META-INF/CERT.RSA"));
    assert!(names.iter().any(|n| n == "META-INF/CERT.EC"));
    assert!(!names.iter().any(|n| n.starts_with("assets/project/build/")));
    assert!(!names.iter().any(|n| n.starts_with("assets/project/node_modules/")));

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
    let arsc = archive.by_name("resources.arsc").unwrap();
    assert_eq!(arsc.compression(), zip::CompressionMethod::Stored);
    assert_eq!(arsc.data_start() % 4, 0);
}

#[test]
fn test_scripts_decrypt_with_descriptor_key() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let output = dir.path().join("Tool.apk");

    let outcome = run(&template, &dir.path().join("ws"), &output, project_config(&project));

    // The project's descriptor was rewritten with this build's identity.
    let descriptor = ProjectDescriptor::load(&project).unwrap();
    assert_eq!(descriptor.build_info, outcome.build_info);
    let key = ScriptKey::for_descriptor(&descriptor);

    let (mode, plain) = decrypt_script(&read_entry(&output, "assets/project/main.js"), &key).unwrap();
    assert_eq!(mode, ExecutionMode::NORMAL);
    assert_eq!(plain, b"X");

    let (mode, _) = decrypt_script(&read_entry(&output, "assets/project/lib/util.js"), &key).unwrap();
    assert_eq!(mode, ExecutionMode::AUTO);

    assert_eq!(read_entry(&output, "assets/project/res/data.txt"), b"plain data");

    let bundled =
        ProjectDescriptor::from_json(&String::from_utf8(read_entry(&output, "assets/project/project.json")).unwrap())
            .unwrap();
    assert_eq!(bundled.build_info, outcome.build_info);
}

#[test]
fn test_identity_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let output = dir.path().join("Tool.apk");
    let config = AppConfig::from_project(&project, &ProjectDescriptor::load(&project).unwrap())
        .app_name("Acme Tool")
        .version_name("2.0")
        .version_code(20)
        .build()
        .unwrap();

    run(&template, &dir.path().join("ws"), &output, config);

    let manifest = XmlDocument::parse(&read_entry(&output, "AndroidManifest.xml")).unwrap();
    assert_eq!(manifest.package_name().unwrap(), "com.acme.tool");
    let table = ResourceTable::parse(&read_entry(&output, "resources.arsc")).unwrap();
    assert_eq!(table.package_name(), Some("com.acme.tool"));
}

#[test]
fn test_build_number_increases_per_build() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());

    let first = run(
        &template,
        &dir.path().join("ws1"),
        &dir.path().join("a.apk"),
        project_config(&project),
    );
    let second = run(
        &template,
        &dir.path().join("ws2"),
        &dir.path().join("b.apk"),
        project_config(&project),
    );

    assert_eq!(first.build_info.build_number, 1);
    assert_eq!(second.build_info.build_number, 2);
    assert_ne!(first.build_info.build_id, second.build_info.build_id);
    // Same plaintext, different iv.
    assert_ne!(
        read_entry(&first.output, "assets/project/main.js"),
        read_entry(&second.output, "assets/project/main.js")
    );
}

#[test]
fn test_single_script_source() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let script = dir.path().join("hello.js");
    std::fs::write(&script, "\"ui\";\ntoast('hi');").unwrap();
    let output = dir.path().join("hello.apk");
    let config = AppConfig::builder()
        .app_name("Hello")
        .package_name("com.acme.hello")
        .version_name("1.0")
        .version_code(3)
        .source_path(&script)
        .build()
        .unwrap();

    let outcome = run(&template, &dir.path().join("ws"), &output, config);
    assert_eq!(outcome.build_info.build_number, 3);

    let bundled = ProjectDescriptor::from_json(
        &String::from_utf8(read_entry(&output, "assets/project/project.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(bundled.main_script_file, "main.js");
    assert_eq!(bundled.package_name, "com.acme.hello");

    let (mode, plain) = decrypt_script(
        &read_entry(&output, "assets/project/main.js"),
        &ScriptKey::for_descriptor(&bundled),
    )
    .unwrap();
    assert_eq!(mode, ExecutionMode::UI);
    assert_eq!(plain, b"\"ui\";\ntoast('hi');");
}

#[test]
fn test_single_non_script_source_stays_plaintext() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let notes = dir.path().join("readme.txt");
    std::fs::write(&notes, "just text").unwrap();
    let output = dir.path().join("notes.apk");
    let config = AppConfig::builder()
        .app_name("Notes")
        .package_name("com.acme.notes")
        .version_name("1.0")
        .version_code(1)
        .source_path(&notes)
        .build()
        .unwrap();

    let outcome = run(&template, &dir.path().join("ws"), &output, config);
    assert_eq!((outcome.report.encrypted, outcome.report.copied), (0, 1));
    assert_eq!(read_entry(&output, "assets/project/main.js"), b"just text");
}

#[test]
fn test_icon_producer_replaces_launcher_icon() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let output = dir.path().join("Tool.apk");
    let config = AppConfig::from_project(&project, &ProjectDescriptor::load(&project).unwrap())
        .icon(IconSource::producer(|| {
            Ok(Some(image::DynamicImage::new_rgba8(4, 4)))
        }))
        .build()
        .unwrap();

    run(&template, &dir.path().join("ws"), &output, config);

    let icon = image::load_from_memory(&read_entry(&output, "res/mipmap/ic_launcher.png")).unwrap();
    assert_eq!((icon.width(), icon.height()), (4, 4));
}

#[test]
fn test_icon_failure_is_reported_with_context() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let workspace = dir.path().join("ws");
    let config = AppConfig::from_project(&project, &ProjectDescriptor::load(&project).unwrap())
        .icon(IconSource::producer(|| {
            Err(Error::GenericError("renderer crashed".into()))
        }))
        .build()
        .unwrap();

    let err = BuildPipeline::new(&template, &workspace, dir.path().join("Tool.apk"))
        .prepare()
        .unwrap()
        .with_config(config)
        .unwrap()
        .build()
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Build));
    assert!(err.to_string().contains("loading launcher icon: renderer crashed"));
    assert!(matches!(err.root(), Error::GenericError(_)));
    assert!(!workspace.exists());
}

#[test]
fn test_progress_is_reported_in_stage_order() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let (progress, mut events) = ChannelProgress::channel();

    BuildPipeline::new(&template, dir.path().join("ws"), dir.path().join("Tool.apk"))
        .with_progress(Arc::new(progress))
        .prepare()
        .unwrap()
        .with_config(project_config(&project))
        .unwrap()
        .build()
        .unwrap()
        .sign(&ApkSigner::generate().unwrap())
        .unwrap()
        .clean_workspace()
        .unwrap();

    let mut stages = Vec::new();
    while let Ok(event) = events.try_recv() {
        stages.push(event.stage);
    }
    assert_eq!(stages, [Stage::Prepare, Stage::Build, Stage::Sign, Stage::Clean]);
}

struct BrokenSigner;

impl PackageSigner for BrokenSigner {
    fn block_entry(&self) -> &'static str {
        "META-INF/CERT.EC"
    }

    fn sign(&self, _signature_file: &[u8]) -> scriptapk::Result<Vec<u8>> {
        Err(Error::Sign("hardware token unplugged".into()))
    }
}

#[test]
fn test_signing_failure_leaves_no_package() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let workspace = dir.path().join("ws");
    let output = dir.path().join("Tool.apk");

    let err = BuildPipeline::new(&template, &workspace, &output)
        .prepare()
        .unwrap()
        .with_config(project_config(&project))
        .unwrap()
        .build()
        .unwrap()
        .sign(&BrokenSigner)
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Sign));
    assert!(matches!(err.root(), Error::Sign(_)));
    assert!(!output.exists());
    // The dropped pipeline took its workspace with it.
    assert!(!workspace.exists());
}

#[test]
fn test_kept_workspace_survives_failed_sign() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let workspace = dir.path().join("ws");

    let err = BuildPipeline::new(&template, &workspace, dir.path().join("Tool.apk"))
        .keep_workspace(true)
        .prepare()
        .unwrap()
        .with_config(project_config(&project))
        .unwrap()
        .build()
        .unwrap()
        .sign(&BrokenSigner)
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Sign));
    // The staged tree is still there to inspect.
    assert!(workspace.join("assets/project/main.js").is_file());
    assert!(workspace.join("resources.arsc").is_file());
}

#[test]
fn test_kept_workspace_survives_clean() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let workspace = dir.path().join("ws");

    let outcome = BuildPipeline::new(&template, &workspace, dir.path().join("Tool.apk"))
        .keep_workspace(true)
        .prepare()
        .unwrap()
        .with_config(project_config(&project))
        .unwrap()
        .build()
        .unwrap()
        .sign(&ApkSigner::generate().unwrap())
        .unwrap()
        .clean_workspace()
        .unwrap();

    assert_eq!(outcome.kept_workspace.as_deref(), Some(workspace.as_path()));
    assert!(workspace.join("assets/project/main.js").is_file());
}

#[test]
fn test_bad_template_fails_in_prepare() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("template.apk");
    std::fs::write(&template, "not a zip").unwrap();

    let err = BuildPipeline::new(&template, dir.path().join("ws"), dir.path().join("out.apk"))
        .prepare()
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Prepare));
    assert!(matches!(err.root(), Error::ZipError(_)));
}

#[test]
fn test_unprepared_pipeline_never_touches_workspace() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let existing = dir.path().join("documents");
    std::fs::create_dir_all(&existing).unwrap();
    std::fs::write(existing.join("notes.txt"), "keep me").unwrap();

    let pipeline = BuildPipeline::new(&template, &existing, dir.path().join("out.apk"));
    assert_eq!(pipeline.workspace(), existing.as_path());
    drop(pipeline);

    assert_eq!(
        std::fs::read_to_string(existing.join("notes.txt")).unwrap(),
        "keep me"
    );
}

#[test]
fn test_foreign_workspace_is_refused() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let existing = dir.path().join("documents");
    std::fs::create_dir_all(existing.join("photos")).unwrap();
    std::fs::write(existing.join("photos/cat.jpg"), "meow").unwrap();

    let err = BuildPipeline::new(&template, &existing, dir.path().join("out.apk"))
        .prepare()
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Prepare));
    assert!(matches!(
        err.root(),
        Error::Validation(ValidationError::ForeignWorkspace(_))
    ));
    assert_eq!(std::fs::read(existing.join("photos/cat.jpg")).unwrap(), b"meow");
    assert!(!existing.join("AndroidManifest.xml").exists());
}

#[test]
fn test_workspace_inside_project_is_rejected() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let workspace = project.join("build/ws");
    let before = ProjectDescriptor::load(&project).unwrap();

    let err = BuildPipeline::new(&template, &workspace, dir.path().join("out.apk"))
        .prepare()
        .unwrap()
        .with_config(project_config(&project))
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Configure));
    assert!(matches!(
        err.root(),
        Error::Validation(ValidationError::WorkspaceOverlapsSource { .. })
    ));
    // Rejected before the build number was bumped.
    assert_eq!(ProjectDescriptor::load(&project).unwrap().build_info, before.build_info);
    // The workspace was ours, so the dropped pipeline removed it.
    assert!(!workspace.exists());
    assert!(project.join("build/Tool_v0.9.apk").is_file());
}

#[test]
fn test_detached_workspace_outlives_pipeline() {
    let dir = TempDir::new().unwrap();
    let template = template_apk(dir.path());
    let project = project(dir.path());
    let workspace = dir.path().join("ws");

    let configured = BuildPipeline::new(&template, &workspace, dir.path().join("Tool.apk"))
        .prepare()
        .unwrap()
        .with_config(project_config(&project))
        .unwrap();
    assert_eq!(configured.template_package(), TEMPLATE_PACKAGE);

    let detached = configured.detach_workspace();
    assert_eq!(detached, workspace);
    assert!(workspace.join("assets/project/main.js").is_file());
    assert!(workspace.join("AndroidManifest.xml").is_file());

    // A detached workspace can be reused by the next build.
    let outcome = run(&template, &workspace, &dir.path().join("Tool.apk"), project_config(&project));
    assert!(outcome.kept_workspace.is_none());
    assert!(!workspace.exists());
}
