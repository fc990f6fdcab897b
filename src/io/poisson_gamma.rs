//! Analytic Poisson-gamma input file.
//!
//! Same comment, header and counts conventions as the table format, followed
//! by either two lines (fixed responses, fixed backgrounds) or four lines
//! (response shapes, response rates, background shapes, background rates).

use std::path::Path;

use crate::error::AppError;
use crate::io::table::{Row, in_file, parse_preamble, parse_values, read_text};
use crate::models::{MultiPoissonGamma, Nuisance};

pub fn read_poisson_gamma(path: &Path) -> Result<MultiPoissonGamma, AppError> {
    let text = read_text(path)?;
    parse_poisson_gamma(&text).map_err(|e| in_file(path, e))
}

pub fn parse_poisson_gamma(text: &str) -> Result<MultiPoissonGamma, AppError> {
    let pre = parse_preamble(text)?;
    if pre.layout.lumi_column {
        return Err(AppError::format(
            "Poisson-gamma files take no luminosity column; use --lumi instead.",
        ));
    }
    let nbins = pre.layout.nbins();
    let rows = &pre.rows;

    let (response, background) = match rows.len() {
        2 => (
            fixed_line(&rows[0], nbins, "response")?,
            fixed_line(&rows[1], nbins, "background")?,
        ),
        4 => (
            gamma_lines(&rows[0], &rows[1], nbins, "response")?,
            gamma_lines(&rows[2], &rows[3], nbins, "background")?,
        ),
        n => {
            return Err(AppError::format(format!(
                "Expected 2 (fixed) or 4 (shape/rate) parameter lines after the counts, found {n}."
            )));
        }
    };

    MultiPoissonGamma::new(pre.layout.labels, pre.counts, response, background)
}

fn fixed_line(row: &Row<'_>, nbins: usize, what: &str) -> Result<Vec<Nuisance>, AppError> {
    parse_values(row, nbins, what)?
        .into_iter()
        .map(|v| Nuisance::fixed(v).map_err(|e| at_line(row, e)))
        .collect()
}

fn gamma_lines(shape: &Row<'_>, rate: &Row<'_>, nbins: usize, what: &str) -> Result<Vec<Nuisance>, AppError> {
    let shapes = parse_values(shape, nbins, &format!("{what} shape"))?;
    let rates = parse_values(rate, nbins, &format!("{what} rate"))?;
    shapes
        .into_iter()
        .zip(rates)
        .map(|(k, r)| Nuisance::gamma(k, r).map_err(|e| at_line(shape, e)))
        .collect()
}

fn at_line(row: &Row<'_>, e: AppError) -> AppError {
    AppError::new(e.kind(), format!("line {}: {}", row.line, e.message()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::CountingModel;
    use std::io::Write;

    #[test]
    fn two_line_file_gives_fixed_nuisances() {
        let model = parse_poisson_gamma("# fixed\nsr1 sr2\n2 4\n1.0 0.5\n0.3 1.2\n").unwrap();
        assert_eq!(model.labels(), &["sr1".to_string(), "sr2".to_string()]);
        assert_eq!(model.response(), &[Nuisance::Fixed(1.0), Nuisance::Fixed(0.5)]);
        assert_eq!(model.background(), &[Nuisance::Fixed(0.3), Nuisance::Fixed(1.2)]);
    }

    #[test]
    fn four_line_file_gives_gamma_nuisances() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "3\n10.5\n10\n4.5\n2\n").unwrap();
        let model = read_poisson_gamma(file.path()).unwrap();
        assert_eq!(model.counts(), &[3]);
        assert_eq!(model.response(), &[Nuisance::Gamma { shape: 10.5, rate: 10.0 }]);
        assert_eq!(model.background()[0].mean(), 2.25);
    }

    #[test]
    fn wrong_parameter_line_count_is_format_error() {
        for text in ["3\n1.0\n", "3\n1\n1\n1\n", "3\n1\n1\n1\n1\n1\n"] {
            let err = parse_poisson_gamma(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{text:?}");
        }
    }

    #[test]
    fn non_positive_shape_or_rate_is_format_error() {
        let err = parse_poisson_gamma("3\n0.0\n1.0\n1.0\n1.0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.message().contains("line 2"));
        let err = parse_poisson_gamma("3\n1.0\n1.0\n1.0\n-2\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_poisson_gamma(&dir.path().join("absent.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
