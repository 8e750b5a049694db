use std::fs;
use std::path::Path;

use fastbook_kaggle::links::GITHUB_RAW_BASE;
use fastbook_kaggle::notebook::Cell;
use fastbook_kaggle::setup_cell::{SETUP_CODE, SETUP_MARKER};
use fastbook_kaggle::{convert_notebook, process_all_notebooks, Notebook, Outcome};
use rstest::*;
use tempfile::TempDir;

const NEEDS_IMAGES: &str = r#"{
 "cells": [
  {
   "cell_type": "code",
   "execution_count": null,
   "metadata": {},
   "outputs": [],
   "source": ["!git clone https://github.com/fastai/fastbook.git\n", "%cd fastbook\n"]
  },
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": ["![Cat](images/cat.png)\n", "<img width=\"50\" src=\"../images/sub/dog.png\" alt=\"x\">"]
  }
 ],
 "metadata": {"kernelspec": {"name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 4
}"#;

const NEEDS_SETUP: &str = r#"{
 "cells": [
  {"cell_type": "markdown", "id": "m1", "metadata": {}, "source": "No images here"},
  {"cell_type": "code", "execution_count": 1, "id": "c1", "metadata": {}, "outputs": [], "source": "1 + 1"}
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}"#;

const ALREADY_DONE: &str = r#"{"cells": [{"cell_type": "code", "execution_count": null, "metadata": {},
  "outputs": [], "source": "!git clone https://github.com/fastai/fastbook.git\n%cd fastbook\n"}],
  "metadata": {}, "nbformat": 4, "nbformat_minor": 4}"#;

#[fixture]
fn book() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("clean")).unwrap();
    fs::write(dir.path().join("01_intro.ipynb"), NEEDS_IMAGES).unwrap();
    fs::write(dir.path().join("02_production.ipynb"), NEEDS_SETUP).unwrap();
    fs::write(dir.path().join("clean/03_done.ipynb"), ALREADY_DONE).unwrap();
    fs::write(dir.path().join("README.md"), "![Cat](images/cat.png)").unwrap();
    dir
}

fn markdown_source(nb: &Notebook, index: usize) -> String {
    match &nb.cells[index] {
        Cell::Markdown(cell) => cell.source.as_str().to_string(),
        other => panic!("expected markdown cell at {index}, got {other:?}"),
    }
}

fn code_source(nb: &Notebook, index: usize) -> String {
    match &nb.cells[index] {
        Cell::Code(cell) => cell.source.as_str().to_string(),
        other => panic!("expected code cell at {index}, got {other:?}"),
    }
}

fn run(root: &Path) -> String {
    let mut out = Vec::new();
    process_all_notebooks(root, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[rstest]
fn walker_reports_every_notebook(book: TempDir) {
    let output = run(book.path());
    let lines = output.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| l.starts_with("✅ Updated: ")).count(), 2);
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("✔ No changes needed: ")).count(),
        1
    );
    assert!(lines.iter().any(|l| l.ends_with("03_done.ipynb") && l.starts_with("✔")));

    // untouched files stay byte-identical
    assert_eq!(
        fs::read_to_string(book.path().join("clean/03_done.ipynb")).unwrap(),
        ALREADY_DONE
    );
    assert_eq!(
        fs::read_to_string(book.path().join("README.md")).unwrap(),
        "![Cat](images/cat.png)"
    );
}

#[rstest]
fn images_rewritten_on_disk(book: TempDir) {
    let path = book.path().join("01_intro.ipynb");
    assert_eq!(convert_notebook(&path).unwrap(), Outcome::Updated);

    let nb = Notebook::load(&path).unwrap();
    // setup already present, so no cell is added
    assert_eq!(nb.cells.len(), 2);
    assert_eq!(
        markdown_source(&nb, 1),
        format!(
            "![Cat]({GITHUB_RAW_BASE}cat.png?raw=true)\n\
             <img width=\"50\" src=\"{GITHUB_RAW_BASE}sub/dog.png?raw=true\" alt=\"x\">"
        )
    );
    assert_eq!(nb.metadata["kernelspec"]["name"], "python3");
}

#[rstest]
fn setup_cell_added_on_disk(book: TempDir) {
    let path = book.path().join("02_production.ipynb");
    assert_eq!(convert_notebook(&path).unwrap(), Outcome::Updated);

    let nb = Notebook::load(&path).unwrap();
    assert_eq!(nb.cells.len(), 3);
    assert_eq!(code_source(&nb, 0), SETUP_CODE);
    assert_eq!(markdown_source(&nb, 1), "No images here");
    assert_eq!(code_source(&nb, 2), "1 + 1");
}

#[rstest]
fn second_run_changes_nothing(book: TempDir) {
    run(book.path());
    let snapshot = ["01_intro.ipynb", "02_production.ipynb"]
        .map(|name| fs::read_to_string(book.path().join(name)).unwrap());

    let output = run(book.path());
    assert_eq!(output.lines().count(), 3);
    assert!(output.lines().all(|l| l.starts_with("✔ No changes needed: ")));

    let after = ["01_intro.ipynb", "02_production.ipynb"]
        .map(|name| fs::read_to_string(book.path().join(name)).unwrap());
    assert_eq!(snapshot, after);

    let nb = Notebook::load(&book.path().join("02_production.ipynb")).unwrap();
    let setup_cells = (0..nb.cells.len())
        .filter(|&i| matches!(&nb.cells[i], Cell::Code(c) if c.source.contains(SETUP_MARKER)))
        .count();
    assert_eq!(setup_cells, 1);
}

#[rstest]
fn broken_notebook_does_not_stop_the_walk(book: TempDir) {
    let broken = book.path().join("00_broken.ipynb");
    fs::write(&broken, "{\"cells\": [").unwrap();

    let output = run(book.path());
    let lines = output.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 4);
    let errors = lines
        .iter()
        .filter(|l| l.starts_with("❌ Error processing "))
        .collect::<Vec<_>>();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(&broken.display().to_string()));
    assert_eq!(fs::read_to_string(&broken).unwrap(), "{\"cells\": [");
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("✅ Updated: ")).count(),
        2
    );
}

#[rstest]
fn summary_counts_outcomes(book: TempDir) {
    fs::write(book.path().join("ancient.ipynb"), r#"{"nbformat": 2, "worksheets": []}"#).unwrap();
    let mut out = Vec::new();
    let summary = process_all_notebooks(book.path(), &mut out).unwrap();
    assert_eq!(
        (summary.updated, summary.unchanged, summary.failed),
        (2, 1, 1)
    );
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("unsupported nbformat version 2"));
}

#[rstest]
fn v3_notebook_is_written_back_as_v4() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.ipynb");
    fs::write(
        &path,
        r#"{"nbformat": 3, "nbformat_minor": 0, "metadata": {"name": "old"},
            "worksheets": [{"cells": [
              {"cell_type": "markdown", "metadata": {}, "source": ["![Cat](images/cat.png)"]},
              {"cell_type": "code", "language": "python", "metadata": {}, "input": "1 + 1",
               "prompt_number": 1, "outputs": []}]}]}"#,
    )
    .unwrap();

    assert_eq!(convert_notebook(&path).unwrap(), Outcome::Updated);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["nbformat"], 4);
    assert!(written.get("worksheets").is_none());

    let nb = Notebook::load(&path).unwrap();
    assert_eq!(nb.cells.len(), 3);
    assert_eq!(code_source(&nb, 0), SETUP_CODE);
    assert_eq!(
        markdown_source(&nb, 1),
        format!("![Cat]({GITHUB_RAW_BASE}cat.png?raw=true)")
    );
    assert_eq!(code_source(&nb, 2), "1 + 1");

    // already converted: the second pass leaves the file alone
    assert_eq!(convert_notebook(&path).unwrap(), Outcome::Unchanged);
}
