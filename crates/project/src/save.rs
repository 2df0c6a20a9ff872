use crate::{Element, ProjectError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentFormat {
    #[default]
    Json,
    MessagePack,
}

pub fn save_document(
    path: &Path,
    document: &Element,
    format: DocumentFormat,
) -> Result<(), ProjectError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        DocumentFormat::Json => serde_json::to_writer_pretty(&mut writer, document)?,
        // Named encoding keeps field names so skipped empty fields still decode
        DocumentFormat::MessagePack => {
            let bytes = rmp_serde::encode::to_vec_named(document)?;
            writer.write_all(&bytes)?;
        }
    }

    writer.flush()?;
    Ok(())
}
