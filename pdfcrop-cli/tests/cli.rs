use std::path::Path;
use std::process::{Command, Output};

use pdfcrop::{BoundaryBox, Document, Object, dictionary};

fn crop(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crop")).args(args).output().unwrap()
}

fn write_document(path: &Path, media_boxes: &[BoundaryBox]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = media_boxes
        .iter()
        .map(|media_box| {
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => media_box.to_object(),
            }))
        })
        .collect();
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
    doc.save(path).unwrap();
}

#[test]
fn crops_and_reports_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paper.pdf");
    write_document(&input, &[BoundaryBox::US_LETTER, BoundaryBox::new(0.0, 0.0, 200.0, 100.0)]);

    let output = crop(&[input.to_str().unwrap(), "10", "20"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Processing 2 pages...\n"));
    assert!(stdout.contains("Page 1: Original size 612.0x792.0 points"));
    assert!(stdout.contains("Page 1: Cropped size 592.0x752.0 points"));
    assert!(stdout.contains("Page 2: Cropped size 180.0x60.0 points"));
    assert!(stdout.contains("Successfully cropped PDF saved as:"));

    let cropped = Document::load(dir.path().join("paper_cropped.pdf")).unwrap();
    let pages = cropped.page_entries().unwrap();
    assert_eq!(pages[1].media_box, BoundaryBox::new(10.0, 20.0, 190.0, 80.0));
}

#[test]
fn explicit_right_and_bottom() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paper.pdf");
    write_document(&input, &[BoundaryBox::US_LETTER]);

    let output = crop(&["--quiet", input.to_str().unwrap(), "10", "20", "30", "40"]);
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Page 1"));

    let cropped = Document::load(dir.path().join("paper_cropped.pdf")).unwrap();
    assert_eq!(
        cropped.page_entries().unwrap()[0].media_box,
        BoundaryBox::new(10.0, 40.0, 582.0, 772.0)
    );
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nothing.pdf");

    let output = crop(&[input.to_str().unwrap(), "36", "36"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
    assert!(!dir.path().join("nothing_cropped.pdf").exists());
}

#[test]
fn oversized_margins_fail() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("small.pdf");
    write_document(&input, &[BoundaryBox::new(0.0, 0.0, 100.0, 100.0)]);

    let output = crop(&[input.to_str().unwrap(), "60", "0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
    assert!(!dir.path().join("small_cropped.pdf").exists());
}

#[test]
fn bad_arguments_fail() {
    let output = crop(&["only-a-file.pdf"]);
    assert_eq!(output.status.code(), Some(1));
}
