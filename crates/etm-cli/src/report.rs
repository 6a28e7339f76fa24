//! Console tables for analysis results

use etm_insights::{
    runner::AnalysisReport,
    slice::{SliceMetric, SliceResult},
};

const TOP_ROWS: usize = 10;

fn percent(rate: Option<f64>) -> String {
    rate.map_or("N/A".to_string(), |r| format!("{:.1}%", r * 100.0))
}

fn truncated(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_owned()
    } else {
        let head = text.chars().take(width.saturating_sub(1)).collect::<String>();
        format!("{head}~")
    }
}

pub(crate) fn print_report(report: &AnalysisReport) {
    println!("Analysis Report (outcome={})", report.outcome);
    println!("==========================================\n");
    println!(
        "Students: {}  Outcome rate: {}",
        report.rows,
        percent(report.outcome_rate)
    );
    let normalization = &report.normalization;
    println!(
        "Normalized: {} missing sentinels blanked, {} columns read as numeric",
        normalization.sentinel_cells,
        normalization.retyped_numeric.len(),
    );
    if let Some(source) = &normalization.credit_window_source {
        println!("Credit window bands from: {source}");
    }
    let sanitizer = &report.sanitizer;
    if sanitizer.enabled {
        println!(
            "Sanitizer: {} dropped ({} name, {} sparse, {} outcome copies), {} flagged for review",
            sanitizer.dropped.len(),
            sanitizer.name_denied.len(),
            sanitizer.na_heavy.len(),
            sanitizer.outcome_equivalent.len(),
            sanitizer.warn_columns.len(),
        );
    } else {
        println!("Sanitizer: disabled");
    }
    println!();

    print_candidates(report);
    print_effects(report);
    print_risk_ratios(report);
    print_bucket_spreads(report);
    print_trajectory(report);
    print_slices(&report.slices);

    if !report.failures.is_empty() {
        println!("Skipped units: {}", report.failures.len());
        for failure in report.failures.iter().take(TOP_ROWS) {
            println!("  [{}] {}: {}", failure.engine, failure.unit, failure.reason);
        }
        println!();
    }
}

fn print_candidates(report: &AnalysisReport) {
    println!("Top Trend Candidates");
    println!(
        "  {:>3} {:<16} {:>10}  {}",
        "#", "Kind", "Score", "Summary"
    );
    println!("  {}", "-".repeat(100));
    for (rank, candidate) in report.candidates.iter().take(TOP_ROWS * 2).enumerate() {
        let marker = if candidate.low_confidence { "*" } else { "" };
        println!(
            "  {:>3} {:<16} {:>10.3}  {}{marker}",
            rank + 1,
            candidate.kind.to_string(),
            candidate.score,
            candidate.summary,
        );
    }
    println!("  (* low confidence)\n");
}

fn print_effects(report: &AnalysisReport) {
    println!("Numeric Effect Sizes (Cohen's d)");
    println!(
        "  {:<40} {:>8} {:>10} {:>6} {:>6}",
        "Feature", "d", "Score", "n1", "n0"
    );
    println!("  {}", "-".repeat(74));
    for effect in report.effects.iter().take(TOP_ROWS) {
        println!(
            "  {:<40} {:>8.3} {:>10.3} {:>6} {:>6}",
            truncated(&effect.feature, 40),
            effect.d,
            effect.score,
            effect.n1,
            effect.n0,
        );
    }
    println!();
}

fn print_risk_ratios(report: &AnalysisReport) {
    println!("Categorical Risk Ratios");
    println!(
        "  {:<32} {:<16} {:>7} {:>17} {:>6}",
        "Feature", "Level", "RR", "95% CI", "n"
    );
    println!("  {}", "-".repeat(82));
    for rr in report.risk_ratios.iter().take(TOP_ROWS) {
        println!(
            "  {:<32} {:<16} {:>7.2} {:>17} {:>6}",
            truncated(&rr.feature, 32),
            truncated(&rr.level, 16),
            rr.rr,
            format!("[{:.2}, {:.2}]", rr.ci_low, rr.ci_high),
            rr.n_level,
        );
    }
    println!();
}

fn print_bucket_spreads(report: &AnalysisReport) {
    println!("Bucketed Outcome Rates");
    println!(
        "  {:<40} {:>8} {:>8} {:>8} {:>6}",
        "Feature", "Min", "Max", "Spread", "n"
    );
    println!("  {}", "-".repeat(74));
    for spread in report.bucket_spreads.iter().take(TOP_ROWS) {
        println!(
            "  {:<40} {:>8} {:>8} {:>8} {:>6}",
            truncated(&spread.feature, 40),
            percent(Some(spread.min_rate)),
            percent(Some(spread.max_rate)),
            percent(Some(spread.spread)),
            spread.n_total,
        );
    }
    println!();
}

fn print_trajectory(report: &AnalysisReport) {
    let Some(trends) = &report.trajectory else {
        return;
    };
    println!("GPA Trajectory");
    println!("  Students with slope: {}", trends.n_students);
    println!(
        "  Median slope: {}",
        trends
            .median_slope
            .map_or("N/A".to_string(), |m| format!("{m:.4}"))
    );
    println!("  Positive slope: {}", percent(trends.pct_positive_slope));
    println!(
        "  Outcome rate: {} (slope > 0, n={}) vs {} (slope <= 0, n={})",
        percent(trends.positive.rate),
        trends.positive.n,
        percent(trends.non_positive.rate),
        trends.non_positive.n,
    );
    println!();
}

pub(crate) fn print_slices(slices: &[SliceResult]) {
    if slices.is_empty() {
        return;
    }
    println!("Slice Stability");
    println!(
        "  {:<32} {:<28} {:>10} {:>7} {:>10}",
        "Feature", "Confounder", "Overall", "Strata", "Agreement"
    );
    println!("  {}", "-".repeat(91));
    for slice in slices {
        let feature = match &slice.metric {
            SliceMetric::MeanDiff => slice.feature.clone(),
            SliceMetric::RiskRatio { level } => format!("{}={level}", slice.feature),
        };
        println!(
            "  {:<32} {:<28} {:>10.3} {:>7} {:>10}{}",
            truncated(&feature, 32),
            truncated(&slice.confounder, 28),
            slice.overall_effect,
            slice.strata.len(),
            percent(slice.agreement),
            if slice.unstable { "  UNSTABLE" } else { "" },
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated() {
        assert_eq!(truncated("short", 10), "short");
        assert_eq!(truncated("much_too_long_name", 8), "much_to~");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(Some(0.256)), "25.6%");
        assert_eq!(percent(None), "N/A");
    }
}
