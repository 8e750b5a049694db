use log::debug;

use crate::notebook::{Cell, CodeCell, Notebook};

/// Presence of this command in any code cell means the notebook is already
/// bootstrapped.
pub const SETUP_MARKER: &str = "!git clone https://github.com/fastai/fastbook.git";

/// Clones the book repository and moves into it so relative paths resolve on
/// a hosted runtime.
pub const SETUP_CODE: &str = "\
# ✅ Kaggle/Colab/Local compatible setup
!git clone https://github.com/fastai/fastbook.git
%cd fastbook
";

pub fn setup_already_present(nb: &Notebook) -> bool {
    nb.cells
        .iter()
        .any(|cell| matches!(cell, Cell::Code(code) if code.source.contains(SETUP_MARKER)))
}

/// Insert the setup cell at the top of the notebook unless one exists.
/// Returns `true` if a cell was inserted.
pub fn add_setup_block(nb: &mut Notebook) -> bool {
    if setup_already_present(nb) {
        return false;
    }
    let setup_cell = CodeCell::new(SETUP_CODE, nb.wants_cell_ids());
    nb.cells.insert(0, Cell::Code(setup_cell));
    debug!("inserted setup cell");
    true
}
