use crate::analysis::{interpret, round_for_display};
use crate::models::{SummaryStatistics, ValidationReport};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print a validation report in the specified format
pub fn print_results(report: &ValidationReport, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(report),
        OutputFormat::Json => print_json(report),
    }
}

fn print_plain(report: &ValidationReport) {
    print!("{}", render_plain(report));
}

/// Print the report as pretty JSON
fn print_json(report: &ValidationReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

/// Statistics block, interpretation and per-comparison table
pub fn render_plain(report: &ValidationReport) -> String {
    let mut lines = vec![format!("=== Rubric Validation ({}) ===", report.criteria)];
    if let Some(prompt) = &report.prompt {
        lines.push(format!("Evaluation prompt: {} ({})", prompt.title, prompt.approach));
    }
    lines.push(String::new());
    lines.push(format!(
        "Sample: {} outputs, {} scored, {} pairs judged{}",
        report.sample.len(),
        report.batch_scores.len(),
        report.judgments.len(),
        if report.judge_completed { "" } else { " (session ended early)" }
    ));
    lines.push(String::new());

    lines.push("STATISTICS".to_string());
    lines.push("----------".to_string());
    match &report.statistics {
        Some(stats) => {
            lines.extend(summary_text(stats).lines().map(str::to_string));
            lines.push(String::new());
            lines.push(interpret(stats.correlation).describe().to_string());
        }
        None => lines.push("No comparisons available.".to_string()),
    }
    lines.push(String::new());

    if !report.comparisons.is_empty() {
        lines.push("COMPARISONS".to_string());
        lines.push("-----------".to_string());
        lines.push(format!("{:<8} {:<8} {:>8} {:>8}", "Item A", "Item B", "Human", "AI"));
        lines.push("-".repeat(35));
        lines.extend(report.comparisons.iter().map(|comparison| {
            format!(
                "{:<8} {:<8} {:>8.3} {:>8.3}",
                comparison.item_a_id, comparison.item_b_id, comparison.human_judgement, comparison.ai_judgement
            )
        }));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Statistics as the plain text block users copy out of a run
pub fn summary_text(stats: &SummaryStatistics) -> String {
    let rounded = round_for_display(stats);
    format!(
        "Number of comparisons: {}\n\
         Mean absolute difference: {:.3}\n\
         Human mean: {:.3}\n\
         AI mean: {:.3}\n\
         Correlation: {}\n\
         Regression: y = {:.3}x + {:.3}\n",
        rounded.count,
        rounded.mean_absolute_difference,
        rounded.human_mean,
        rounded.ai_mean,
        rounded.correlation,
        rounded.regression_slope,
        rounded.regression_intercept,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BatchScoreRecord, Correlation, NormalizedComparison, PairwiseJudgment, PromptSummary, RelativeScore,
        TestItem,
    };

    fn stats(correlation: Correlation) -> SummaryStatistics {
        SummaryStatistics {
            count: 3,
            mean_absolute_difference: 0.123456,
            human_mean: 0.5,
            ai_mean: 1.0 / 3.0,
            correlation,
            regression_slope: 0.75,
            regression_intercept: -0.05,
        }
    }

    fn create_test_report() -> ValidationReport {
        ValidationReport {
            rubric: "Count the puns.".to_string(),
            criteria: "witty".to_string(),
            prompt: None,
            sample: vec![
                TestItem { id: 1, text: "one".to_string() },
                TestItem { id: 2, text: "two".to_string() },
            ],
            batch_scores: vec![
                BatchScoreRecord { item_id: 1, score: 3 },
                BatchScoreRecord { item_id: 2, score: 10 },
            ],
            judgments: vec![PairwiseJudgment {
                item_a_id: 1,
                item_b_id: 2,
                relative_score: RelativeScore::MuchBetterB,
            }],
            comparisons: vec![NormalizedComparison {
                item_a_id: 1,
                item_b_id: 2,
                human_judgement: 1.0,
                ai_judgement: 1.0,
            }],
            statistics: Some(stats(Correlation::Value(0.81234))),
            rounded_statistics: Some(round_for_display(&stats(Correlation::Value(0.81234)))),
            best_fit_line: vec![],
            judge_completed: true,
        }
    }

    #[test]
    fn test_summary_text() {
        let text = summary_text(&stats(Correlation::Value(0.81234)));
        assert!(text.contains("Number of comparisons: 3"));
        assert!(text.contains("Mean absolute difference: 0.123"));
        assert!(text.contains("AI mean: 0.333"));
        assert!(text.contains("Correlation: 0.812"));
        assert!(text.contains("Regression: y = 0.750x + -0.050"));
    }

    #[test]
    fn test_summary_text_undefined_correlation() {
        let text = summary_text(&stats(Correlation::Undefined));
        assert!(text.contains("Correlation: N/A"));
    }

    #[test]
    fn test_render_plain() {
        let rendered = render_plain(&create_test_report());
        assert!(rendered.contains("=== Rubric Validation (witty) ==="));
        assert!(rendered.contains("2 outputs, 2 scored, 1 pairs judged\n"));
        assert!(rendered.contains("Strong alignment"));
        assert!(rendered.contains("1        2           1.000    1.000\n"));
        assert!(!rendered.contains("Evaluation prompt"));
    }

    #[test]
    fn test_render_plain_names_builder_prompt() {
        let mut report = create_test_report();
        report.prompt = Some(PromptSummary {
            title: "Minimalist Practitioner".to_string(),
            approach: "streamlined".to_string(),
        });

        let rendered = render_plain(&report);
        assert!(rendered.contains("Evaluation prompt: Minimalist Practitioner (streamlined)\n"));
    }

    #[test]
    fn test_render_plain_without_statistics() {
        let mut report = create_test_report();
        report.statistics = None;
        report.comparisons.clear();
        report.judge_completed = false;

        let rendered = render_plain(&report);
        assert!(rendered.contains("(session ended early)"));
        assert!(rendered.contains("No comparisons available."));
        assert!(!rendered.contains("COMPARISONS"));
    }

    #[test]
    fn test_json_output() {
        let report = create_test_report();
        // This test mainly ensures the JSON serialization doesn't panic
        print_json(&report);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["judgments"][0]["relative_score"], 1.0);
        assert_eq!(json["statistics"]["correlation"]["value"], 0.81234);
        assert_eq!(json["rounded_statistics"]["correlation"]["value"], 0.812);
        assert_eq!(json["rounded_statistics"]["mean_absolute_difference"], 0.123);
        assert!(json.get("prompt").is_none());
    }

    #[test]
    fn test_output_format_variants() {
        let report = create_test_report();
        print_results(&report, OutputFormat::Plain);
        print_results(&report, OutputFormat::Json);
    }
}
