//! Result Renderer: pure formatting of a `ScoreResult` into the gauge,
//! breakdown and insights views. Nothing here mutates or retains the result.

use std::fmt;

use crate::models::score::ScoreResult;

/// Colour band of the overall gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    /// low < 40 ≤ mid < 70 ≤ high
    pub fn for_percent(percent: u8) -> Self {
        if percent < 40 {
            Tier::Low
        } else if percent < 70 {
            Tier::Mid
        } else {
            Tier::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Mid => "mid",
            Tier::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeView {
    pub percent: u8,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub name: &'static str,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownView {
    pub bars: [Bar; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingKeywordsView {
    Flat(String),
    Grouped(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLine {
    pub name: String,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightsView {
    pub recommendations: Option<Vec<String>>,
    pub missing_keywords: Option<MissingKeywordsView>,
    pub sections: Option<Vec<SectionLine>>,
}

/// Everything the score view shows for one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub gauge: GaugeView,
    pub breakdown: Option<BreakdownView>,
    pub insights: Option<InsightsView>,
}

/// Scales a 0.0 – 1.0 score to a rounded, clamped integer percentage.
pub fn to_percent(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn render_gauge(result: &ScoreResult) -> GaugeView {
    let percent = to_percent(result.overall_score.unwrap_or(0.0));
    GaugeView {
        percent,
        tier: Tier::for_percent(percent),
    }
}

/// `None` when the backend sent no breakdown at all.
pub fn render_breakdown(result: &ScoreResult) -> Option<BreakdownView> {
    let breakdown = result.breakdown.as_ref()?;
    let bar = |name: &'static str, value: Option<f64>| Bar {
        name,
        percent: to_percent(value.unwrap_or(0.0)),
    };
    Some(BreakdownView {
        bars: [
            bar("Semantic", breakdown.semantic),
            bar("Keyword", breakdown.keyword),
            bar("Structure", breakdown.structure),
        ],
    })
}

/// `None` when there are no recommendations, missing keywords or section scores.
pub fn render_insights(result: &ScoreResult) -> Option<InsightsView> {
    let recommendations = result
        .recommendations
        .as_ref()
        .filter(|recs| !recs.is_empty())
        .cloned();

    // The flat list gates the whole group; the category map only picks the layout.
    let missing_keywords = if result.missing_keywords.is_empty() {
        None
    } else {
        match result
            .missing_keywords_by_category
            .as_ref()
            .filter(|by_category| !by_category.is_empty())
        {
            Some(by_category) => Some(MissingKeywordsView::Grouped(
                by_category
                    .iter()
                    .map(|(category, keywords)| (category.clone(), keywords.join(", ")))
                    .collect(),
            )),
            None => Some(MissingKeywordsView::Flat(result.missing_keywords.join(", "))),
        }
    };

    let sections = result
        .section_scores
        .as_ref()
        .filter(|scores| !scores.is_empty())
        .map(|scores| {
            scores
                .iter()
                .map(|(name, value)| SectionLine {
                    name: capitalize(name),
                    percent: to_percent(*value),
                })
                .collect()
        });

    if recommendations.is_none() && missing_keywords.is_none() && sections.is_none() {
        return None;
    }

    Some(InsightsView {
        recommendations,
        missing_keywords,
        sections,
    })
}

pub fn render_report(result: &ScoreResult) -> MatchReport {
    MatchReport {
        gauge: render_gauge(result),
        breakdown: render_breakdown(result),
        insights: render_insights(result),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for GaugeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Overall match: {}% ({})", self.percent, self.tier.label())
    }
}

impl fmt::Display for BreakdownView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Score breakdown")?;
        for bar in &self.bars {
            let filled = usize::from(bar.percent / 5);
            writeln!(
                f,
                "  {:<10} {:<20} {:>3}%",
                bar.name,
                "#".repeat(filled),
                bar.percent
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for InsightsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(recommendations) = &self.recommendations {
            writeln!(f, "Recommendations")?;
            for (i, rec) in recommendations.iter().enumerate() {
                writeln!(f, "  {}. {rec}", i + 1)?;
            }
        }
        match &self.missing_keywords {
            Some(MissingKeywordsView::Grouped(groups)) => {
                writeln!(f, "Missing keywords from job description")?;
                for (category, keywords) in groups {
                    writeln!(f, "  - {category}: {keywords}")?;
                }
            }
            Some(MissingKeywordsView::Flat(keywords)) => {
                writeln!(f, "Missing keywords from job description")?;
                writeln!(f, "  {keywords}")?;
            }
            None => {}
        }
        if let Some(sections) = &self.sections {
            writeln!(f, "Section match (vs job description)")?;
            for line in sections {
                writeln!(f, "  - {}: {}%", line.name, line.percent)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.gauge)?;
        if let Some(breakdown) = &self.breakdown {
            write!(f, "\n{breakdown}")?;
        }
        if let Some(insights) = &self.insights {
            write!(f, "\n{insights}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::score::Breakdown;
    use std::collections::BTreeMap;

    fn result_with_score(score: Option<f64>) -> ScoreResult {
        ScoreResult {
            filename: "cv.pdf".to_string(),
            candidate_name: "Ada".to_string(),
            overall_score: score,
            breakdown: None,
            section_scores: None,
            missing_keywords: vec![],
            missing_keywords_by_category: None,
            recommendations: None,
            status: None,
            db_id: None,
        }
    }

    #[test]
    fn test_gauge_tier_boundaries() {
        let cases = [
            (0.0, 0, Tier::Low),
            (0.39, 39, Tier::Low),
            (0.40, 40, Tier::Mid),
            (0.69, 69, Tier::Mid),
            (0.70, 70, Tier::High),
            (1.0, 100, Tier::High),
        ];
        for (score, percent, tier) in cases {
            let gauge = render_gauge(&result_with_score(Some(score)));
            assert_eq!(gauge.percent, percent, "percent for {score}");
            assert_eq!(gauge.tier, tier, "tier for {score}");
        }
    }

    #[test]
    fn test_missing_score_defaults_to_zero() {
        let gauge = render_gauge(&result_with_score(None));
        assert_eq!(gauge, GaugeView { percent: 0, tier: Tier::Low });
    }

    #[test]
    fn test_out_of_range_score_is_clamped() {
        assert_eq!(to_percent(1.2), 100);
        assert_eq!(to_percent(-0.3), 0);
        assert_eq!(to_percent(f64::NAN), 0);
    }

    #[test]
    fn test_breakdown_defaults_missing_bars_to_zero() {
        let mut result = result_with_score(Some(0.5));
        result.breakdown = Some(Breakdown {
            semantic: Some(0.814),
            keyword: None,
            structure: Some(0.5),
        });
        let view = render_breakdown(&result).unwrap();
        let percents: Vec<u8> = view.bars.iter().map(|b| b.percent).collect();
        assert_eq!(percents, vec![81, 0, 50]);
        assert_eq!(view.bars[0].name, "Semantic");
    }

    #[test]
    fn test_no_breakdown_object_omits_view() {
        assert!(render_breakdown(&result_with_score(Some(0.5))).is_none());
    }

    #[test]
    fn test_missing_keywords_flat_without_categories() {
        let mut result = result_with_score(Some(0.5));
        result.missing_keywords = vec!["A".to_string(), "B".to_string()];
        let insights = render_insights(&result).unwrap();
        assert_eq!(
            insights.missing_keywords,
            Some(MissingKeywordsView::Flat("A, B".to_string()))
        );
    }

    #[test]
    fn test_missing_keywords_grouped_when_categories_present() {
        let mut result = result_with_score(Some(0.5));
        result.missing_keywords = vec!["A".to_string(), "B".to_string()];
        result.missing_keywords_by_category = Some(BTreeMap::from([
            ("cloud".to_string(), vec!["A".to_string()]),
            ("languages".to_string(), vec!["B".to_string()]),
        ]));
        let insights = render_insights(&result).unwrap();
        assert_eq!(
            insights.missing_keywords,
            Some(MissingKeywordsView::Grouped(vec![
                ("cloud".to_string(), "A".to_string()),
                ("languages".to_string(), "B".to_string()),
            ]))
        );
    }

    #[test]
    fn test_empty_category_map_falls_back_to_flat() {
        let mut result = result_with_score(Some(0.5));
        result.missing_keywords = vec!["A".to_string()];
        result.missing_keywords_by_category = Some(BTreeMap::new());
        let insights = render_insights(&result).unwrap();
        assert!(matches!(
            insights.missing_keywords,
            Some(MissingKeywordsView::Flat(_))
        ));
    }

    #[test]
    fn test_section_scores_are_capitalized_percentages() {
        let mut result = result_with_score(Some(0.5));
        result.section_scores = Some(BTreeMap::from([
            ("experience".to_string(), 0.724),
            ("skills".to_string(), 0.6),
        ]));
        let insights = render_insights(&result).unwrap();
        let text = insights.to_string();
        assert!(text.contains("Experience: 72%"), "got {text}");
        assert!(text.contains("Skills: 60%"), "got {text}");
        assert!(insights.recommendations.is_none());
        assert!(insights.missing_keywords.is_none());
    }

    #[test]
    fn test_no_insight_data_omits_region() {
        let mut result = result_with_score(Some(0.5));
        result.recommendations = Some(vec![]);
        result.section_scores = Some(BTreeMap::new());
        assert!(render_insights(&result).is_none());
    }

    #[test]
    fn test_render_does_not_touch_input() {
        let mut result = result_with_score(Some(0.42));
        result.recommendations = Some(vec!["Quantify impact".to_string()]);
        let before = result.clone();
        let report = render_report(&result);
        assert_eq!(result, before);
        assert_eq!(report.gauge.tier, Tier::Mid);
        assert!(report.to_string().contains("1. Quantify impact"));
    }
}
