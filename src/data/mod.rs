//! File formats at the edges: participant data in, retained rules out.

mod export;
mod load;

pub use export::{read_rows, read_rows_csv, write_rows, write_rows_csv, write_rows_json};
pub use load::{load_participants, read_participants_csv, read_participants_json};

use std::path::Path;

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
