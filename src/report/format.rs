//! Formatted terminal output for run summaries.
//!
//! Formatting lives here so the statistics code never touches stdout and
//! output changes stay localized.

use crate::domain::{BayesSummary, ClsSummary, ExpectedSummary, Interval, RunInfo, WaldSummary};
use crate::models::{CountingModel, MultiPoisson};

pub fn format_bayes(s: &BayesSummary) -> String {
    let mut out = format_run_header("Bayes", &s.run);
    out.push_str(&format!("Upper limit ({}): {:.4}\n", fmt_cl(s.cl), s.upper_limit));
    out.push_str(&format!("Central interval: {}\n", fmt_interval(&s.interval)));
    match s.map_uncertainty {
        Some(u) => out.push_str(&format!("MAP estimate: {:.4} +/- {:.4}\n", s.map_estimate, u)),
        None => out.push_str(&format!("MAP estimate: {:.4}\n", s.map_estimate)),
    }
    if let Some(z) = s.z_map {
        out.push_str(&format!("Z (MAP vs 0): {z:.3}\n"));
    }
    out
}

pub fn format_wald(s: &WaldSummary) -> String {
    let mut out = format_run_header("Wald (asymptotic)", &s.run);
    out.push_str(&format!("Estimate: {:.4} +/- {:.4}\n", s.estimate, s.uncertainty));
    out.push_str(&format!("Upper limit ({}): {:.4}\n", fmt_cl(s.cl), s.upper_limit));
    out.push_str(&format!("Central interval: {}\n", fmt_interval(&s.interval)));
    if let (Some(z), Some(p)) = (s.z0, s.p0) {
        out.push_str(&format!("Z (vs 0): {z:.3} | p-value: {p:.3e}\n"));
    }
    out
}

pub fn format_cls(s: &ClsSummary) -> String {
    let mut out = format_run_header("CLs (asymptotic)", &s.run);
    out.push_str(&format!("Estimate: {:.4} +/- {:.4}\n", s.estimate, s.uncertainty));
    out.push_str(&format!("Upper limit ({}): {:.4}\n", fmt_cl(s.cl), s.upper_limit));
    out
}

pub fn format_expected(s: &ExpectedSummary) -> String {
    let mut out = format_run_header(&format!("Expected limits ({})", s.method.display_name()), &s.run);
    out.push_str(&format!(
        "Toys: {} (excluded {}) | true mu: {} | seed: {}\n",
        s.expected.toys, s.expected.failed, s.true_mu, s.seed
    ));
    out.push_str(&format!("Observed limit ({}): {:.4}\n\n", fmt_cl(s.cl), s.observed_limit));

    out.push_str(format!("{:>8} {:>12}", "prob", "limit").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<8} {:-<12}", "", "").trim_end());
    out.push('\n');
    for band in &s.expected.bands {
        out.push_str(&format!("{:>8.3} {:>12.4}\n", band.prob, band.limit));
    }
    out
}

/// One-paragraph description of a synthesized ensemble.
pub fn format_synth(model: &MultiPoisson, path: &std::path::Path) -> String {
    let mean_r = model.mean_response();
    let mean_b = model.mean_background();
    let mut out = format!("Wrote {} draws x {} bins to '{}'\n", model.ndraws(), model.nbins(), path.display());
    out.push_str(format!("{:<16} {:>8} {:>12} {:>12}", "bin", "count", "<response>", "<background>").trim_end());
    out.push('\n');
    for (i, label) in model.labels().iter().enumerate() {
        out.push_str(&format!(
            "{:<16} {:>8} {:>12.4} {:>12.4}\n",
            truncate(label, 16),
            model.counts()[i],
            mean_r[i],
            mean_b[i]
        ));
    }
    out
}

fn format_run_header(method: &str, run: &RunInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== limits - {method} ===\n"));
    out.push_str(&format!("Input: {} ({})\n", run.input.display(), run.model));
    out.push_str(&format!("Bins: {}\n", fmt_bins(&run.labels, &run.counts)));
    out.push_str(&format!("Scan range: [{}, {}]\n", run.mu_min, run.mu_max));
    out
}

fn fmt_cl(cl: f64) -> String {
    format!("{}% CL", fmt_percent(cl))
}

fn fmt_percent(p: f64) -> String {
    let s = format!("{:.2}", p * 100.0);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn fmt_interval(i: &Interval) -> String {
    format!("[{:.4}, {:.4}] ({})", i.lower, i.upper, fmt_cl(i.cl))
}

fn fmt_bins(labels: &[String], counts: &[u64]) -> String {
    let parts: Vec<String> = labels
        .iter()
        .zip(counts)
        .map(|(l, n)| format!("{}={n}", truncate(l, 16)))
        .collect();
    parts.join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Band, CalculatorKind, ExpectedBands};

    fn run() -> RunInfo {
        RunInfo {
            input: "in.txt".into(),
            model: "multi-poisson".into(),
            labels: vec!["sr1".into(), "a_very_long_signal_region".into()],
            counts: vec![3, 0],
            mu_min: 0.0,
            mu_max: 20.0,
        }
    }

    #[test]
    fn bayes_report_lists_limit_and_interval() {
        let s = BayesSummary {
            run: run(),
            cl: 0.9,
            upper_limit: 2.302585,
            interval: Interval { lower: 0.05, upper: 3.0, cl: 0.9 },
            map_estimate: 0.0,
            map_uncertainty: None,
            z_map: None,
        };
        let text = format_bayes(&s);
        assert!(text.contains("Upper limit (90% CL): 2.3026"));
        assert!(text.contains("[0.0500, 3.0000] (90% CL)"));
        assert!(text.contains("sr1=3 a_very_long_sig.=0"));
        assert!(!text.contains("Z (MAP"));
    }

    #[test]
    fn expected_report_has_one_row_per_band() {
        let s = ExpectedSummary {
            run: run(),
            method: CalculatorKind::Cls,
            cl: 0.95,
            true_mu: 0.0,
            seed: 1,
            observed_limit: 4.2,
            expected: ExpectedBands {
                bands: vec![Band { prob: 0.16, limit: 2.0 }, Band { prob: 0.5, limit: 3.0 }],
                toys: 10,
                failed: 2,
            },
        };
        let text = format_expected(&s);
        assert!(text.contains("CLs (asymptotic)"));
        assert!(text.contains("excluded 2"));
        assert!(text.contains("   0.160       2.0000"));
        assert!(text.contains("   0.500       3.0000"));
    }

    #[test]
    fn percent_formatting_drops_trailing_zeros() {
        assert_eq!(fmt_cl(0.95), "95% CL");
        assert_eq!(fmt_cl(0.6827), "68.27% CL");
        assert_eq!(truncate("abcdef", 4), "abc.");
    }
}
