use super::*;
use clap::error::ErrorKind;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn run_subcommand_parses_filters_and_flags() {
    let cli = Cli::try_parse_from([
        "pki-upgrade",
        "run",
        "--version",
        "10.1.0",
        "--index",
        "2",
        "--silent",
    ])
    .expect("must parse run command");

    match cli.command {
        Commands::Run {
            version,
            index,
            silent,
            verbose,
        } => {
            assert_eq!(version.as_deref(), Some("10.1.0"));
            assert_eq!(index, Some(2));
            assert!(silent);
            assert!(!verbose);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn index_flag_requires_version_flag() {
    let err = Cli::try_parse_from(["pki-upgrade", "run", "--index", "2"])
        .expect_err("index without version must fail");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn global_roots_parse_after_the_subcommand() {
    let cli = Cli::try_parse_from([
        "pki-upgrade",
        "status",
        "--instance-root",
        "/tmp/instance",
        "--upgrade-root",
        "/tmp/upgrade",
    ])
    .expect("must parse status command");

    assert_eq!(cli.instance_root.as_deref(), Some(Path::new("/tmp/instance")));
    assert_eq!(cli.upgrade_root.as_deref(), Some(Path::new("/tmp/upgrade")));
}

#[test]
fn build_options_parses_flags_and_filters() {
    let options = build_options(
        Some(PathBuf::from("/tmp/instance")),
        Some(PathBuf::from("/tmp/upgrade")),
        Some("10.5.0"),
        Some("10.1.0"),
        Some(2),
        true,
        true,
    )
    .expect("must build options");

    assert_eq!(options.instance_root, PathBuf::from("/tmp/instance"));
    assert_eq!(options.upgrade_root, PathBuf::from("/tmp/upgrade"));
    assert_eq!(options.target.to_string(), "10.5.0");
    assert_eq!(
        options.version_filter.map(|version| version.to_string()),
        Some("10.1.0".to_string())
    );
    assert_eq!(options.index_filter, Some(2));
    assert!(options.silent);
    assert!(options.verbose);
}

#[test]
fn build_options_targets_the_package_version_by_default() {
    let options = build_options(
        Some(PathBuf::from("/tmp/instance")),
        Some(PathBuf::from("/tmp/upgrade")),
        None,
        None,
        None,
        true,
        false,
    )
    .expect("must build options");

    assert_eq!(options.target.to_string(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn build_options_rejects_malformed_target_version() {
    let err = build_options(
        Some(PathBuf::from("/tmp/instance")),
        Some(PathBuf::from("/tmp/upgrade")),
        Some("not-a-version"),
        None,
        None,
        true,
        false,
    )
    .expect_err("must reject malformed target version");
    assert!(err.to_string().contains("invalid version number"));
}

#[test]
fn interpret_answer_accepts_defaults_and_spellings() {
    assert_eq!(console::interpret_answer("", true), Some(true));
    assert_eq!(console::interpret_answer("\n", false), Some(false));
    assert_eq!(console::interpret_answer("y\n", false), Some(true));
    assert_eq!(console::interpret_answer("YES", false), Some(true));
    assert_eq!(console::interpret_answer("n", true), Some(false));
    assert_eq!(console::interpret_answer(" No \n", true), Some(false));
    assert_eq!(console::interpret_answer("maybe", true), None);
}

#[test]
fn plain_status_lines_carry_a_bracketed_tag() {
    let line = render_status_line(OutputStyle::Plain, "done", "upgrade complete");
    assert_eq!(line, "[done] upgrade complete");
}

#[test]
fn rich_status_lines_colorize_the_tag() {
    let line = render_status_line(OutputStyle::Rich, "fail", "upgrade failed");
    assert!(line.contains("[fail]"));
    assert!(line.contains("upgrade failed"));
    assert!(line.contains('\u{1b}'));
}

#[test]
fn progress_line_renders_only_in_rich_style() {
    assert_eq!(
        render::render_progress_line(OutputStyle::Plain, "upgrade", 3, 4, None),
        None
    );

    let line = render::render_progress_line(OutputStyle::Rich, "upgrade", 3, 4, None)
        .expect("rich style must render a progress line");
    assert!(line.contains("3/4"));
    assert!(line.contains("75%"));
    assert!(line.contains("upgrade"));
}

#[test]
fn elapsed_renders_with_millisecond_precision() {
    assert_eq!(render::format_elapsed(Duration::from_millis(1234)), "1.234s");
    assert_eq!(render::format_elapsed(Duration::from_secs(60)), "60.000s");
}

#[test]
fn upgrade_command_advances_through_empty_versions() {
    let root = test_root("cli-empty-run");
    let instance_root = root.join("instance");
    let upgrade_root = root.join("upgrade");
    fs::create_dir_all(upgrade_root.join("10.0.0")).expect("must create version dir");
    fs::create_dir_all(upgrade_root.join("10.1.0")).expect("must create version dir");
    fs::create_dir_all(instance_root.join("conf")).expect("must create conf dir");
    fs::write(instance_root.join("conf/pki.version"), "PKI_VERSION=10.0.0\n")
        .expect("must write tracker fixture");

    let options = build_options(
        Some(instance_root.clone()),
        Some(upgrade_root),
        Some("10.2.0"),
        None,
        None,
        true,
        false,
    )
    .expect("must build options");
    run_upgrade_command(options).expect("must run upgrade");

    let raw = fs::read_to_string(instance_root.join("conf/pki.version"))
        .expect("must read tracker file");
    assert_eq!(raw, "PKI_VERSION=10.2.0\n");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn reset_tracker_command_records_the_target() {
    let root = test_root("cli-reset");
    let instance_root = root.join("instance");
    let upgrade_root = root.join("upgrade");
    fs::create_dir_all(&upgrade_root).expect("must create upgrade root");
    fs::create_dir_all(instance_root.join("conf")).expect("must create conf dir");
    fs::write(
        instance_root.join("conf/pki.version"),
        "# keep me\nPKI_VERSION=10.0.0\nPKI_UPGRADE_INDEX=3\n",
    )
    .expect("must write tracker fixture");

    let options = build_options(
        Some(instance_root.clone()),
        Some(upgrade_root),
        Some("10.2.0"),
        None,
        None,
        true,
        false,
    )
    .expect("must build options");
    run_reset_tracker_command(options).expect("must reset tracker");

    let raw = fs::read_to_string(instance_root.join("conf/pki.version"))
        .expect("must read tracker file");
    assert_eq!(raw, "# keep me\nPKI_VERSION=10.2.0\n");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn remove_tracker_command_wipes_tracked_keys() {
    let root = test_root("cli-remove");
    let instance_root = root.join("instance");
    let upgrade_root = root.join("upgrade");
    fs::create_dir_all(&upgrade_root).expect("must create upgrade root");
    fs::create_dir_all(instance_root.join("conf")).expect("must create conf dir");
    fs::write(
        instance_root.join("conf/pki.version"),
        "# keep me\nPKI_VERSION=10.0.0\n",
    )
    .expect("must write tracker fixture");

    let options = build_options(
        Some(instance_root.clone()),
        Some(upgrade_root),
        Some("10.2.0"),
        None,
        None,
        true,
        false,
    )
    .expect("must build options");
    run_remove_tracker_command(options).expect("must remove tracker state");

    let raw = fs::read_to_string(instance_root.join("conf/pki.version"))
        .expect("must read tracker file");
    assert_eq!(raw, "# keep me\n");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn status_command_never_mutates_the_tracker() {
    let root = test_root("cli-status");
    let instance_root = root.join("instance");
    let upgrade_root = root.join("upgrade");
    fs::create_dir_all(upgrade_root.join("10.1.0")).expect("must create version dir");
    fs::create_dir_all(instance_root.join("conf")).expect("must create conf dir");
    fs::write(instance_root.join("conf/pki.version"), "PKI_VERSION=10.0.0\n")
        .expect("must write tracker fixture");

    let options = build_options(
        Some(instance_root.clone()),
        Some(upgrade_root),
        Some("10.2.0"),
        None,
        None,
        true,
        false,
    )
    .expect("must build options");
    run_status_command(options).expect("status must succeed");

    let raw = fs::read_to_string(instance_root.join("conf/pki.version"))
        .expect("must read tracker file");
    assert_eq!(raw, "PKI_VERSION=10.0.0\n");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn doctor_command_rejects_malformed_step_names() {
    let root = test_root("cli-doctor");
    let instance_root = root.join("instance");
    let upgrade_root = root.join("upgrade");
    fs::create_dir_all(upgrade_root.join("10.1.0")).expect("must create version dir");
    fs::write(
        upgrade_root.join("10.1.0/abc-Bad.toml"),
        "message = \"Bad\"\naction = \"noop\"\n",
    )
    .expect("must write step manifest");
    fs::create_dir_all(instance_root.join("conf")).expect("must create conf dir");
    fs::write(instance_root.join("conf/pki.version"), "PKI_VERSION=10.1.0\n")
        .expect("must write tracker fixture");

    let options = build_options(
        Some(instance_root),
        Some(upgrade_root),
        Some("10.2.0"),
        None,
        None,
        true,
        false,
    )
    .expect("must build options");
    let err = run_doctor_command(options).expect_err("malformed step name must fail");
    assert!(format!("{err:#}").contains("invalid step index 'abc'"));

    let _ = fs::remove_dir_all(&root);
}

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root(tag: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "pkiup-cli-tests-{tag}-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
