//! Export formats for a finished analysis: CSV, JSON, a plain-text report and the MVP blueprint.

use serde::Serialize;
use synaptic_core::finding::{category_title, RANKED_CATEGORIES};
use synaptic_core::score::metric_name;
use synaptic_core::{AnalysisOutput, AnalysisResult, Finding, ResearchScore};

/// Known categories in display order, then anything else the result carries.
fn ordered(analysis: &AnalysisResult) -> Vec<(&str, &[Finding])> {
    let mut out: Vec<(&str, &[Finding])> = RANKED_CATEGORIES
        .iter()
        .filter_map(|k| analysis.iter().find(|(key, _)| key == k))
        .collect();
    out.extend(
        analysis
            .iter()
            .filter(|(k, _)| !RANKED_CATEGORIES.contains(k)),
    );
    out
}

fn csv_field(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn csv_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// `Category,Rank,Status,Tags,Finding,Score` rows, then a scoring-metrics block.
pub fn to_csv(analysis: &AnalysisResult, score: &ResearchScore) -> String {
    let mut out = String::from("Category,Rank,Status,Tags,Finding,Score\n");
    for (category, items) in ordered(analysis) {
        for item in items {
            let row = match item {
                Finding::Ranked(r) => {
                    let rank = r.rank.to_string();
                    let tags = r.tags.join(";");
                    csv_row(&[category, &rank, r.status.as_str(), &tags, &r.finding, ""])
                }
                Finding::Text(s) => csv_row(&[category, "", "", "", s, ""]),
            };
            out.push_str(&row);
            out.push('\n');
        }
    }
    out.push_str("\nScoring Metrics,,,,,\n");
    let overall = ("overall_quality", score.overall_quality);
    for (metric, value) in score.metrics().into_iter().chain(std::iter::once(overall)) {
        let name = metric_name(metric);
        let value = value.to_string();
        out.push_str(&csv_row(&[&name, "", "", "", "", &value]));
        out.push('\n');
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportMetadata<'a> {
    exported_at_epoch_s: u64,
    paper_title: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    metadata: ExportMetadata<'a>,
    scores: &'a ResearchScore,
    #[serde(flatten)]
    output: &'a AnalysisOutput,
}

pub fn to_json(
    url: &str,
    title: &str,
    output: &AnalysisOutput,
    score: &ResearchScore,
    exported_at_epoch_s: u64,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonExport {
        metadata: ExportMetadata {
            exported_at_epoch_s,
            paper_title: title,
            url,
        },
        scores: score,
        output,
    })
}

fn heading(category: &str) -> String {
    category.to_uppercase().replace('_', " ")
}

pub fn render_text(url: &str, title: &str, analysis: &AnalysisResult, score: &ResearchScore) -> String {
    let mut out = String::from("RESEARCH PAPER ANALYSIS REPORT\n");
    out.push_str(&format!("{}\n\n", "=".repeat(50)));
    out.push_str(&format!("Paper: {title}\n"));
    out.push_str(&format!("URL: {url}\n"));
    out.push_str(&format!(
        "Overall Quality Score: {}/100\n\n",
        score.overall_quality
    ));

    out.push_str("QUALITY METRICS:\n");
    out.push_str(&format!("{}\n", "-".repeat(20)));
    for (metric, value) in score.metrics() {
        out.push_str(&format!("{}: {value}/100\n", metric_name(metric)));
    }

    for (category, items) in ordered(analysis) {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{} ({}):\n", heading(category), category_title(category)));
        out.push_str(&format!("{}\n", "-".repeat(30)));
        for (i, item) in items.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, item.render()));
        }
    }

    out.push_str("\nRECOMMENDATIONS:\n");
    for r in score.recommendations() {
        out.push_str(&format!("* {r}\n"));
    }
    out
}

fn clip(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Roadmap for a legitimate MVP built on the top gap and opportunity, avoiding the top exploits.
pub fn blueprint(analysis: &AnalysisResult) -> String {
    let primary_gap = analysis
        .get("gaps")
        .first()
        .map(Finding::text)
        .unwrap_or("Lack of verifiable data");
    let primary_opportunity = analysis
        .get("opportunities")
        .first()
        .map(Finding::text)
        .unwrap_or("The underlying scientific principle");

    let mut top_exploits: Vec<_> = analysis
        .get("exploits")
        .iter()
        .filter_map(Finding::ranked)
        .collect();
    top_exploits.sort_by_key(|r| r.rank);
    top_exploits.truncate(3);

    let mut out = String::from(
        "Project Blueprint: A Legitimate MVP Approach\n\
         ============================================\n\n\
         Based on the analysis, here is a potential roadmap to build a Minimum Viable Product (MVP) \
         that addresses the identified gaps and leverages the core opportunities while avoiding the \
         exploits found.\n\n",
    );
    out.push_str("1. Core Problem to Solve:\n-------------------------\n");
    out.push_str(&format!(
        "Address the primary knowledge gap: \"{}...\".\n\n",
        clip(primary_gap, 200)
    ));
    out.push_str("2. Key Technology/Principle to Use:\n-----------------------------------\n");
    out.push_str(&format!(
        "Focus on the core legitimate opportunity: \"{}...\".\n\n",
        clip(primary_opportunity, 200)
    ));
    out.push_str("3. Critical Issues to Avoid:\n----------------------------\n");
    if top_exploits.is_empty() {
        out.push_str(
            "* Ensure all claims are backed by verifiable data\n\
             * Implement proper peer review processes\n\
             * Avoid overstated conclusions\n",
        );
    } else {
        for r in &top_exploits {
            out.push_str(&format!("* Issue #{}: {}...\n", r.rank, clip(&r.finding, 150)));
        }
    }
    out.push_str(
        "\n4. Proposed MVP Features:\n-------------------------\n\
         * A public data dashboard to transparently display experimental results.\n\
         * An open-source simulation model of the core scientific mechanism.\n\
         * A peer-review submission portal to gather external validation.\n\
         * Clear, documented methodology for replication.\n\
         * Bias detection and mitigation tools based on ethical concerns identified.\n\n\
         5. Key Metrics for Success:\n---------------------------\n\
         * Number of successful, independent replications of the core result.\n\
         * Correlation factor between simulation and real-world experimental data.\n\
         * Number of positive peer reviews received through the portal.\n\
         * Ethical compliance score based on identified concerns.",
    );
    out
}
