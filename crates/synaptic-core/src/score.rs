//! Research-quality score derived from an [`AnalysisResult`].

use crate::finding::{AnalysisResult, Finding, Status};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchScore {
    pub methodological_rigor: u32,
    pub reproducibility: u32,
    pub ethical_compliance: u32,
    pub statistical_validity: u32,
    pub transparency: u32,
    pub innovation_potential: u32,
    pub overall_quality: u32,
}

fn text_lc(f: &Finding) -> String {
    f.text().to_lowercase()
}

fn mentions_any(f: &Finding, words: &[&str]) -> bool {
    let t = text_lc(f);
    words.iter().any(|w| t.contains(w))
}

fn penalty(base: u32, count: usize, per: u32) -> u32 {
    base.saturating_sub((count as u32).saturating_mul(per))
}

impl ResearchScore {
    pub fn calculate(analysis: &AnalysisResult) -> Self {
        let exploits = analysis.get("exploits");
        let opportunities = analysis.get("opportunities");
        let gaps = analysis.get("gaps");
        let ethical = analysis.get("ethical_concerns");
        let repro = analysis.get("reproducibility_issues");

        let critical_exploits = exploits
            .iter()
            .filter(|f| match f {
                Finding::Ranked(r) => r.status == Status::Critical,
                Finding::Text(s) => s.contains("critical"),
            })
            .count();
        let method_gaps = gaps
            .iter()
            .filter(|f| mentions_any(f, &["control", "methodology", "sample"]))
            .count();
        let methodological_rigor = penalty(100, critical_exploits, 25)
            .saturating_sub((method_gaps as u32).saturating_mul(15));

        // Unranked items count as critical: the old prompt gave no severity to go on.
        let critical_repro = repro
            .iter()
            .filter(|f| match f {
                Finding::Ranked(r) => r.status == Status::Critical,
                Finding::Text(_) => true,
            })
            .count();
        let reproducibility = penalty(100, critical_repro, 20);

        let serious_ethical = ethical
            .iter()
            .filter(|f| match f {
                Finding::Ranked(r) => matches!(r.status, Status::Critical | Status::High),
                Finding::Text(_) => true,
            })
            .count();
        let ethical_compliance = penalty(100, serious_ethical, 18);

        let stat_gaps = gaps
            .iter()
            .filter(|f| mentions_any(f, &["statistical", "significance", "p-value"]))
            .count();
        let statistical_validity = penalty(100, stat_gaps, 20);

        let transparency_issues = repro
            .iter()
            .filter(|f| mentions_any(f, &["data", "code", "sharing"]))
            .count();
        let transparency = penalty(100, transparency_issues, 22);

        let high_value = opportunities
            .iter()
            .filter(|f| match f {
                Finding::Ranked(r) => r.status == Status::High || r.rank <= 2,
                Finding::Text(_) => true,
            })
            .count();
        let innovation_potential = (40 + 15 * high_value as u32).min(100);

        let overall = methodological_rigor as f64 * 0.25
            + reproducibility as f64 * 0.20
            + ethical_compliance as f64 * 0.15
            + statistical_validity as f64 * 0.20
            + transparency as f64 * 0.10
            + innovation_potential as f64 * 0.10;

        Self {
            methodological_rigor,
            reproducibility,
            ethical_compliance,
            statistical_validity,
            transparency,
            innovation_potential,
            overall_quality: overall.round() as u32,
        }
    }

    /// Per-metric scores (everything except the overall), in display order.
    pub fn metrics(&self) -> [(&'static str, u32); 6] {
        [
            ("methodological_rigor", self.methodological_rigor),
            ("reproducibility", self.reproducibility),
            ("ethical_compliance", self.ethical_compliance),
            ("statistical_validity", self.statistical_validity),
            ("transparency", self.transparency),
            ("innovation_potential", self.innovation_potential),
        ]
    }

    pub fn recommendations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.methodological_rigor < 70 {
            out.push("Strengthen methodology: add proper control groups, increase sample size, and clarify experimental design.");
        }
        if self.reproducibility < 60 {
            out.push("Improve reproducibility: share code, data, and detailed procedures. Provide clear replication instructions.");
        }
        if self.ethical_compliance < 80 {
            out.push("Address ethical concerns: implement bias mitigation, ensure diverse datasets, and conduct ethical review.");
        }
        if self.statistical_validity < 70 {
            out.push("Enhance statistical rigor: add significance testing, confidence intervals, and effect size reporting.");
        }
        if self.transparency < 60 {
            out.push("Increase transparency: make data publicly available, document all analysis steps, and disclose conflicts of interest.");
        }
        if out.is_empty() {
            out.push("Excellent work! This research demonstrates high quality across all evaluation metrics.");
        }
        out
    }
}

pub fn score_class(score: u32) -> &'static str {
    match score {
        80.. => "excellent",
        70..=79 => "good",
        60..=69 => "fair",
        40..=59 => "poor",
        _ => "critical",
    }
}

/// `methodological_rigor` -> `Methodological Rigor`.
pub fn metric_name(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(c) => c.to_uppercase().chain(cs).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::RankedFinding;

    fn ranked(rank: u8, status: Status, text: &str) -> Finding {
        Finding::Ranked(RankedFinding {
            rank,
            status,
            confidence: None,
            tags: Vec::new(),
            finding: text.to_string(),
        })
    }

    #[test]
    fn empty_analysis_scores_baseline() {
        let s = ResearchScore::calculate(&AnalysisResult::default());
        assert_eq!(s.methodological_rigor, 100);
        assert_eq!(s.innovation_potential, 40);
        assert_eq!(s.overall_quality, 94);
        assert_eq!(s.recommendations().len(), 1);
    }

    #[test]
    fn mixed_findings_apply_each_rule() {
        let mut a = AnalysisResult::default();
        a.insert(
            "exploits",
            vec![
                ranked(1, Status::Critical, "Secret formula"),
                Finding::Text("critical claims lack evidence".into()),
            ],
        );
        a.insert(
            "gaps",
            vec![
                Finding::Text("No control group".into()),
                Finding::Text("no statistical significance testing".into()),
            ],
        );
        a.insert(
            "reproducibility_issues",
            vec![ranked(3, Status::Low, "Code not released")],
        );
        a.insert("ethical_concerns", vec![ranked(2, Status::High, "Bias")]);
        a.insert(
            "opportunities",
            vec![
                ranked(1, Status::Moderate, "Core idea"),
                ranked(4, Status::Low, "Minor"),
                Finding::Text("Legacy opportunity".into()),
            ],
        );

        let s = ResearchScore::calculate(&a);
        assert_eq!(s.methodological_rigor, 35);
        assert_eq!(s.reproducibility, 100);
        assert_eq!(s.ethical_compliance, 82);
        assert_eq!(s.statistical_validity, 80);
        assert_eq!(s.transparency, 78);
        assert_eq!(s.innovation_potential, 70);
        assert_eq!(s.overall_quality, 72);
        assert!(s.recommendations()[0].starts_with("Strengthen methodology"));
    }

    #[test]
    fn scores_floor_at_zero_and_cap_at_hundred() {
        let mut a = AnalysisResult::default();
        a.insert(
            "exploits",
            (0..10)
                .map(|_| ranked(1, Status::Critical, "x"))
                .collect(),
        );
        a.insert(
            "opportunities",
            (0..10).map(|_| Finding::Text("y".into())).collect(),
        );
        let s = ResearchScore::calculate(&a);
        assert_eq!(s.methodological_rigor, 0);
        assert_eq!(s.innovation_potential, 100);
    }

    #[test]
    fn classes_and_names() {
        assert_eq!(score_class(80), "excellent");
        assert_eq!(score_class(79), "good");
        assert_eq!(score_class(60), "fair");
        assert_eq!(score_class(40), "poor");
        assert_eq!(score_class(39), "critical");
        assert_eq!(metric_name("methodological_rigor"), "Methodological Rigor");
    }
}
