//! JSON export of run summaries (`--json`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;

/// Pretty-print `value` to `path`, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create JSON output '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::io(format!("Failed to write JSON '{}': {e}", path.display())))?;
    writeln!(writer).map_err(|e| AppError::io(format!("Failed to write JSON '{}': {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Band, ExpectedBands};
    use crate::error::ErrorKind;

    #[test]
    fn writes_pretty_json_that_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bands.json");
        let bands = ExpectedBands {
            bands: vec![Band { prob: 0.5, limit: 3.25 }],
            toys: 10,
            failed: 1,
        };
        write_json(&path, &bands).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let back: ExpectedBands = serde_json::from_str(&text).unwrap();
        assert_eq!(back, bands);
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_json(&dir.path().join("no").join("x.json"), &1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
