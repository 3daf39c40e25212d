use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn png_size(path: &Path) -> (u32, u32) {
    let file = fs::File::open(path).expect("open png");
    let reader = png::Decoder::new(file).read_info().expect("decode png");
    let info = reader.info();
    (info.width, info.height)
}

#[test]
fn cli_renders_png_smoke() {
    let root = repo_root();
    let assets = root.join("assets");
    assert!(assets.exists(), "assets missing: {}", assets.display());

    let tmp = tempfile::tempdir().expect("tempdir");

    let exe = assert_cmd::cargo_bin!("statedag-cli");
    Command::new(exe)
        .current_dir(&root)
        .args([
            "render",
            "--format",
            "png",
            "--scenario",
            "all-built",
            "--assets",
            assets.to_string_lossy().as_ref(),
            "--out-dir",
            tmp.path().to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let out = tmp.path().join("all-built.png");
    let bytes = fs::read(&out).expect("read png");
    assert!(
        bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "output is not a PNG"
    );
    let (w, h) = png_size(&out);
    assert!(w > 0 && h > 0);
}

#[test]
fn cli_scale_controls_png_size() {
    let root = repo_root();
    let assets = root.join("assets");
    let tmp = tempfile::tempdir().expect("tempdir");

    let mut sizes = Vec::new();
    for scale in ["1", "2"] {
        let out_dir = tmp.path().join(scale);
        let exe = assert_cmd::cargo_bin!("statedag-cli");
        Command::new(exe)
            .current_dir(&root)
            .args([
                "render",
                "--scenario",
                "all-built",
                "--scale",
                scale,
                "--assets",
                assets.to_string_lossy().as_ref(),
                "--out-dir",
                out_dir.to_string_lossy().as_ref(),
            ])
            .assert()
            .success();
        sizes.push(png_size(&out_dir.join("all-built.png")));
    }

    let (w1, h1) = sizes[0];
    let (w2, h2) = sizes[1];
    assert!(w2 >= 2 * w1 - 1 && w2 <= 2 * w1 + 1, "{w1} -> {w2}");
    assert!(h2 >= 2 * h1 - 1 && h2 <= 2 * h1 + 1, "{h1} -> {h2}");
}

#[test]
fn cli_renders_svg_with_inlined_styles() {
    let root = repo_root();
    let tmp = tempfile::tempdir().expect("tempdir");

    let exe = assert_cmd::cargo_bin!("statedag-cli");
    Command::new(exe)
        .current_dir(&root)
        .args([
            "render",
            "--format",
            "svg",
            "--scenario",
            "slim-ci-pull-request",
            "--assets",
            root.join("assets").to_string_lossy().as_ref(),
            "--out-dir",
            tmp.path().to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let svg = fs::read_to_string(tmp.path().join("slim-ci-pull-request.svg")).expect("read svg");
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("<style"));
    assert!(svg.contains("foreignObject"));
    assert!(!svg.contains("@import"));
}

#[test]
fn cli_gallery_writes_index_and_pngs() {
    let root = repo_root();
    let tmp = tempfile::tempdir().expect("tempdir");

    let exe = assert_cmd::cargo_bin!("statedag-cli");
    Command::new(exe)
        .current_dir(&root)
        .args([
            "gallery",
            "--scenario",
            "all-built",
            "--scenario",
            "column-aware-testing",
            "--scale",
            "1",
            "--assets",
            root.join("assets").to_string_lossy().as_ref(),
            "--out-dir",
            tmp.path().to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let index = fs::read_to_string(tmp.path().join("index.html")).expect("read index");
    assert_eq!(index.matches("<section").count(), 2);
    assert_eq!(index.matches("Download PNG").count(), 2);
    assert!(index.contains("href=\"column-aware-testing.png\""));
    assert_eq!(index.matches("<svg").count(), 2);
    assert_eq!(index.matches("<link rel=\"stylesheet\" href=\"styles.css\">").count(), 1);
    assert_eq!(index.matches("<style").count(), 0);
    let css = fs::read_to_string(tmp.path().join("styles.css")).expect("read styles.css");
    assert!(!css.is_empty());
    assert!(!css.contains("@import"));
    assert!(tmp.path().join("all-built.png").exists());
    assert!(tmp.path().join("column-aware-testing.png").exists());
}

#[test]
fn cli_lists_builtin_scenarios() {
    let exe = assert_cmd::cargo_bin!("statedag-cli");
    let output = Command::new(exe).arg("list").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 5);
    assert!(stdout.lines().any(|l| l.starts_with("partial-build-with-sla\t")));
}

#[test]
fn cli_layout_prints_geometry_json() {
    let exe = assert_cmd::cargo_bin!("statedag-cli");
    let output = Command::new(exe)
        .args(["layout", "--scenario", "all-built"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let entries = json.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "all-built");
    assert!(entries[0]["geometry"]["width"].as_f64().expect("width") > 0.0);
}

#[test]
fn cli_rejects_bad_usage_and_unknown_scenarios() {
    let exe = assert_cmd::cargo_bin!("statedag-cli");
    Command::new(exe)
        .args(["render", "--format", "jpeg"])
        .assert()
        .code(2);

    let exe = assert_cmd::cargo_bin!("statedag-cli");
    Command::new(exe)
        .args(["layout", "--scenario", "no-such-run"])
        .assert()
        .code(1);
}
