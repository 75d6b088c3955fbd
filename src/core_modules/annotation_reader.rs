// THEORY:
// The `annotation_reader` is the entry point of the measurement pipeline. It turns
// one detector label artifact into an ordered list of `DetectionRecord`s.
//
// Key principles:
// 1.  **Order Preservation**: Records come out in file order. Position lists in
//     the statistics report are built from this order.
// 2.  **Fail Fast**: A line that is not exactly five finite numbers aborts the
//     whole artifact with its line number. Skipping it would drop an object and
//     quietly corrupt every statistic computed afterwards.
// 3.  **Stateless Utility**: Reading the same text twice produces the same
//     records. There is no parser state that survives a call.

use crate::core_modules::detection::DetectionRecord;
use crate::error::{AnalysisError, Result};

pub mod annotation_reader {
    use super::*;
    use std::path::Path;

    const TOKENS_PER_LINE: usize = 5;

    /// Reads and parses an annotation artifact from disk.
    pub fn read_annotations(path: &Path) -> Result<Vec<DetectionRecord>> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::AnnotationIo {
            path: path.to_path_buf(),
            source,
        })?;
        let records = parse_annotations(&text, path)?;
        log::debug!("read {} detections from {}", records.len(), path.display());
        Ok(records)
    }

    /// Parses annotation text. `source` is only used to label errors.
    pub fn parse_annotations(text: &str, source: &Path) -> Result<Vec<DetectionRecord>> {
        text.lines()
            .enumerate()
            .map(|(index, line)| {
                parse_line(line).map_err(|reason| AnalysisError::MalformedAnnotation {
                    path: source.to_path_buf(),
                    line: index + 1,
                    reason,
                })
            })
            .collect()
    }

    fn parse_line(line: &str) -> std::result::Result<DetectionRecord, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != TOKENS_PER_LINE {
            return Err(format!(
                "expected {TOKENS_PER_LINE} tokens, found {}",
                tokens.len()
            ));
        }

        let mut values = [0.0f64; TOKENS_PER_LINE];
        for (slot, token) in values.iter_mut().zip(&tokens) {
            let value: f64 = token
                .parse()
                .map_err(|_| format!("`{token}` is not a number"))?;
            if !value.is_finite() {
                return Err(format!("`{token}` is not a finite number"));
            }
            *slot = value;
        }

        let class = values[0];
        if class < 0.0 || class.fract() != 0.0 || class > u32::MAX as f64 {
            return Err(format!("class id `{}` is not a non-negative integer", tokens[0]));
        }

        Ok(DetectionRecord {
            class_id: class as u32,
            center_x_norm: values[1],
            center_y_norm: values[2],
            width_norm: values[3],
            height_norm: values[4],
        })
    }
}
