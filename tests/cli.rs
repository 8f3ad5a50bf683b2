//! Integration tests for the `regdoc` binary.
//!
//! Each test writes a config into a temp dir and runs the compiled binary.
//! The `hash` embedder keeps everything offline.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn regdoc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_regdoc"))
}

/// Build a PDF with one page per entry of `pages`.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Temp workspace with `pdfs/`, `logs/` and a config using the hash embedder.
fn setup() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("pdfs")).unwrap();

    let config = format!(
        r#"
[index]
path = "{root}/index/regdoc.sqlite"

[data]
dir = "{root}/pdfs"

[embedding]
provider = "hash"

[llm]
api_key_env = "REGDOC_TEST_KEY_THAT_IS_NOT_SET"

[metrics]
log_path = "{root}/logs/metrics.csv"
plot_path = "{root}/metrics_plot.svg"
"#,
        root = root.display()
    );
    let config_path = root.join("regdoc.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(regdoc_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("failed to run regdoc binary");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config) = setup();
    let (stdout, stderr, ok) = run(&config, &["init"]);
    assert!(ok, "init failed: {stderr}");
    assert!(stdout.contains("Index initialized successfully."));
    let (_, stderr, ok) = run(&config, &["init"]);
    assert!(ok, "second init failed: {stderr}");
}

#[test]
fn test_ingest_empty_dir_then_query_refuses() {
    let (_tmp, config) = setup();
    let (stdout, stderr, ok) = run(&config, &["ingest"]);
    assert!(ok, "ingest failed: {stderr}");
    assert!(stdout.contains("Deduplicated to 0 unique chunks"), "{stdout}");
    assert!(stdout.contains("Index size:"), "{stdout}");

    let (_, stderr, ok) = run(&config, &["query", "CSRD thresholds"]);
    assert!(!ok);
    assert!(stderr.contains("regdoc ingest"), "{stderr}");
}

#[test]
fn test_ingest_skips_corrupt_pdf() {
    let (tmp, config) = setup();
    fs::write(tmp.path().join("pdfs").join("broken.pdf"), b"not a valid pdf").unwrap();

    let (stdout, stderr, ok) = run(&config, &["ingest"]);
    assert!(ok, "ingest must survive a corrupt file: {stderr}");
    assert!(stderr.contains("broken.pdf"), "{stderr}");
    assert!(stdout.contains("Loaded 0 pages total from 0 files"), "{stdout}");
}

#[test]
fn test_ingest_counts_pdf_pages() {
    let (tmp, config) = setup();
    fs::write(
        tmp.path().join("pdfs").join("csrd.pdf"),
        pdf_with_pages(&["CSRD reporting thresholds", "CSRD timelines"]),
    )
    .unwrap();

    let (stdout, stderr, ok) = run(&config, &["ingest", "--chunk-size", "1000", "--overlap", "100"]);
    assert!(ok, "ingest failed: {stderr}");
    assert!(stdout.contains("Successfully loaded 2 pages from"), "{stdout}");
    assert!(stdout.contains("from 1 files"), "{stdout}");

    let (stdout, stderr, ok) = run(&config, &["stats"]);
    assert!(ok, "stats failed: {stderr}");
    assert!(stdout.contains("Chunks:"), "{stdout}");
}

#[test]
fn test_overlap_not_below_chunk_size_rejected() {
    let (_tmp, config) = setup();
    let (_, _, ok) = run(&config, &["ingest", "--chunk-size", "100", "--overlap", "100"]);
    assert!(!ok);
}

#[test]
fn test_plot_without_metrics_is_noop() {
    let (tmp, config) = setup();
    let (stdout, stderr, ok) = run(&config, &["plot"]);
    assert!(ok, "plot failed: {stderr}");
    assert!(stdout.contains("No metrics file yet."), "{stdout}");
    assert!(!tmp.path().join("metrics_plot.svg").exists());
}
