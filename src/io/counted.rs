//! Counted ensemble layout: explicit bin and draw counts, no header.
//!
//! ```text
//! # comment
//! 2                     <- number of bins
//! 3     5               <- observed counts
//! 2                     <- number of draws
//! 0.11  0.09            <- response draw 1
//! 1.2   2.4             <- background draw 1
//! 0.12  0.08            <- response draw 2
//! 1.1   2.5             <- background draw 2
//! ```

use std::path::Path;

use crate::error::AppError;
use crate::io::table::{Row, content_rows, in_file, parse_counts, parse_values, read_text};
use crate::models::{Draw, MultiPoisson};

pub fn read_counted_table(path: &Path) -> Result<MultiPoisson, AppError> {
    let text = read_text(path)?;
    parse_counted_table(&text).map_err(|e| in_file(path, e))
}

pub fn parse_counted_table(text: &str) -> Result<MultiPoisson, AppError> {
    let rows = content_rows(text);
    let mut rows = rows.iter();

    let nbins_row = rows
        .next()
        .ok_or_else(|| AppError::format("Input is empty; expected the number of bins."))?;
    let nbins = parse_size(nbins_row, "bin count")?;

    let counts_row = rows.next().ok_or_else(|| {
        AppError::format(format!("line {}: bin count is not followed by a counts line.", nbins_row.line))
    })?;
    let counts = parse_counts(counts_row, nbins)?;

    let size_row = rows.next().ok_or_else(|| {
        AppError::format(format!("line {}: counts are not followed by the number of draws.", counts_row.line))
    })?;
    let ndraws = parse_size(size_row, "draw count")?;

    let mut draws = Vec::with_capacity(ndraws);
    for t in 1..=ndraws {
        let (Some(resp_row), Some(bkg_row)) = (rows.next(), rows.next()) else {
            return Err(AppError::format(format!(
                "Draw {t} of {ndraws} is missing its response or background line."
            )));
        };
        let response = parse_values(resp_row, nbins, "response")?;
        let background = parse_values(bkg_row, nbins, "background")?;
        draws.push(Draw::new(response, background));
    }
    if let Some(extra) = rows.next() {
        return Err(AppError::format(format!(
            "line {}: unexpected line after {ndraws} declared draws.",
            extra.line
        )));
    }

    tracing::debug!(nbins, draws = ndraws, "counted table parsed");
    MultiPoisson::new(counts, draws)
}

/// A single positive integer on its own line.
fn parse_size(row: &Row<'_>, what: &str) -> Result<usize, AppError> {
    match row.tokens.as_slice() {
        [tok] => match tok.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AppError::format(format!(
                "line {}: {what} '{tok}' is not a positive integer.",
                row.line
            ))),
        },
        tokens => Err(AppError::format(format!(
            "line {}: {what} line has {} values; expected 1.",
            row.line,
            tokens.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::CountingModel;
    use std::io::Write;

    const TWO_DRAWS: &str = "# two bins, two draws\n2\n3 5\n2\n0.11 0.09\n1.2 2.4\n\n0.12 0.08\n1.1 2.5\n";

    #[test]
    fn counted_layout_parses() {
        let model = parse_counted_table(TWO_DRAWS).unwrap();
        assert_eq!(model.counts(), &[3, 5]);
        assert_eq!(model.labels(), &["bin1".to_string(), "bin2".to_string()]);
        assert_eq!(model.ndraws(), 2);
        assert_eq!(model.draws()[1], Draw::new(vec![0.12, 0.08], vec![1.1, 2.5]));
    }

    #[test]
    fn matches_the_headerless_table() {
        let counted = parse_counted_table(TWO_DRAWS).unwrap();
        let plain = crate::io::parse_table("3 5\n0.11 0.09\n1.2 2.4\n0.12 0.08\n1.1 2.5\n").unwrap();
        assert_eq!(counted.draws(), plain.draws());
        assert_eq!(
            counted.ln_likelihood_observed(2.0).unwrap(),
            plain.ln_likelihood_observed(2.0).unwrap()
        );
    }

    #[test]
    fn declared_sizes_are_enforced() {
        let cases = [
            ("", "empty"),
            ("2 3\n1 1\n1\n1 1\n1 1\n", "line 1"),
            ("0\n\n", "line 1"),
            ("2\n3\n", "line 2"),
            ("1\n3\n1.5\n1\n1\n", "line 3"),
            ("1\n3\n2\n1\n1\n1\n", "Draw 2 of 2"),
            ("1\n3\n1\n1\n1\n0.5\n", "line 6"),
            ("1\n3\n1\n1 2\n1\n", "line 4"),
        ];
        for (text, needle) in cases {
            let err = parse_counted_table(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{text:?}");
            assert!(err.message().contains(needle), "{text:?}: {}", err.message());
        }
    }

    #[test]
    fn read_prefixes_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"1\n3\n1\nx\n1\n").unwrap();
        let err = read_counted_table(file.path()).unwrap_err();
        assert!(err.message().starts_with(&file.path().display().to_string()));
        assert!(err.message().contains("line 4"));
    }
}
