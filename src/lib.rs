//! # `fastbook-kaggle`
//!
//! This crate rewrites the [fastbook](https://github.com/fastai/fastbook) notebooks
//! so they run unmodified on hosted notebook platforms such as Kaggle or Colab.
//!
//! ## Basic Usage
//!
//! From the root of a fastbook checkout:
//!
//! ```sh
//! cargo install fastbook-kaggle
//! fastbook-kaggle            # or: fastbook-kaggle path/to/notebooks
//! ```
//!
//! Every `.ipynb` file below the directory gets two fixes:
//!
//! ```markdown
//! <!-- relative images are pointed at the upstream repository -->
//! ![A cat](images/cat.png)
//! ![A cat](https://github.com/fastai/fastbook/blob/master/images/cat.png?raw=true)
//! ```
//!
//! and a setup cell that clones the repository and `%cd`s into it is added as
//! the first cell, unless some code cell already clones it. Files are only
//! written when one of the fixes changed something, so running the tool twice
//! is harmless. Format 3 notebooks are upgraded to format 4 when read.

pub mod convert;
pub mod error;
pub mod links;
pub mod notebook;
pub mod setup_cell;
pub mod upgrade;

pub use convert::{
    convert_notebook, process_all_notebooks, process_notebook, Outcome, Status, Summary,
};
pub use error::NotebookError;
pub use notebook::Notebook;
