use crate::{Element, ProjectError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read a document written by [`save_document`](crate::save_document).
///
/// JSON is tried first, then MessagePack.
pub fn load_document(path: &Path) -> Result<Element, ProjectError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).or_else(|_| {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        rmp_serde::decode::from_read(reader).map_err(ProjectError::from)
    })
}
