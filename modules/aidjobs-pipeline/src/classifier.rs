use scraper::{Html, Selector};

/// Keywords whose presence in page text raises the job score.
const JOB_KEYWORDS: [&str; 10] = [
    "job",
    "position",
    "vacancy",
    "career",
    "opportunity",
    "recruitment",
    "hiring",
    "opening",
    "posting",
    "role",
];

/// URL path fragments typical of job pages.
const JOB_URL_MARKERS: [&str; 5] = ["/job", "/career", "/position", "/vacancy", "/opportunity"];

/// Navigation/landing tokens that lower the score when they dominate the
/// top of the page.
const NEGATIVE_KEYWORDS: [&str; 5] = ["login", "sign in", "register", "homepage", "about us"];

/// Pages scoring below this are marked non-job (extraction still runs).
const JOB_THRESHOLD: f64 = 0.5;

/// Weight of the optional ML model in the final score.
const ML_WEIGHT: f64 = 0.3;

/// Hook for an optional learned classifier contributing 30% of the score.
pub trait MlScorer: Send + Sync {
    fn score(&self, text: &str) -> f64;
}

/// Rule-based job-page classifier.
pub struct JobPageClassifier {
    ml: Option<Box<dyn MlScorer>>,
}

impl JobPageClassifier {
    pub fn new() -> Self {
        Self { ml: None }
    }

    pub fn with_ml(ml: Box<dyn MlScorer>) -> Self {
        Self { ml: Some(ml) }
    }

    /// Classify a page. Returns `(is_job, score)` with score in [0, 1].
    pub fn classify(&self, document: &Html, url: &str) -> (bool, f64) {
        let text = page_text(document);
        let rule_score = self.rule_score(document, &text, url);

        let final_score = match &self.ml {
            Some(ml) => (1.0 - ML_WEIGHT) * rule_score + ML_WEIGHT * ml.score(&text),
            None => rule_score,
        };

        (final_score >= JOB_THRESHOLD, final_score)
    }

    fn rule_score(&self, document: &Html, text: &str, url: &str) -> f64 {
        let text_lower = text.to_lowercase();
        let mut score = 0.0;

        // Keyword hits, capped at 0.4.
        let keyword_hits = JOB_KEYWORDS
            .iter()
            .filter(|kw| text_lower.contains(*kw))
            .count() as f64;
        score += (keyword_hits * 0.1).min(0.4);

        // URL path markers.
        let url_lower = url.to_lowercase();
        if JOB_URL_MARKERS.iter().any(|m| url_lower.contains(m)) {
            score += 0.3;
        }

        // Job-listing structure in the DOM.
        if has_any_selector(
            document,
            &[".job-listing", ".job-item", ".position", ".vacancy", "[class*=\"job\"]", "[id*=\"job\"]"],
        ) {
            score += 0.1;
        }

        // Application buttons/links.
        if has_apply_control(document) {
            score += 0.2;
        }

        // Generic navigation tokens near the top of the page.
        let head: String = text_lower.chars().take(500).collect();
        if NEGATIVE_KEYWORDS.iter().any(|kw| head.contains(kw)) {
            score -= 0.2;
        }

        score.clamp(0.0, 1.0)
    }
}

impl Default for JobPageClassifier {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn page_text(document: &Html) -> String {
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

fn has_any_selector(document: &Html, selectors: &[&str]) -> bool {
    selectors.iter().any(|s| {
        Selector::parse(s)
            .map(|sel| document.select(&sel).next().is_some())
            .unwrap_or(false)
    })
}

fn has_apply_control(document: &Html) -> bool {
    let selector = Selector::parse("a, button").expect("valid selector");
    document.select(&selector).any(|el| {
        let text = el.text().collect::<String>().to_lowercase();
        text.contains("apply") || text.contains("submit") || text.contains("candidate")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_page_scores_above_threshold() {
        let html = Html::parse_document(
            r#"<html><body>
            <h1>Vacancy: WASH Officer</h1>
            <div class="job-listing">Position in Nairobi. Recruitment open.</div>
            <a href="/apply">Apply now</a>
            </body></html>"#,
        );
        let classifier = JobPageClassifier::new();
        let (is_job, score) = classifier.classify(&html, "https://example.org/jobs/wash-officer");
        assert!(is_job, "score was {score}");
        assert!(score >= 0.5);
    }

    #[test]
    fn landing_page_scores_below_threshold() {
        let html = Html::parse_document(
            r#"<html><body>
            <nav>Login | Sign in | About us</nav>
            <h1>Welcome to our homepage</h1>
            </body></html>"#,
        );
        let classifier = JobPageClassifier::new();
        let (is_job, score) = classifier.classify(&html, "https://example.org/");
        assert!(!is_job, "score was {score}");
    }

    #[test]
    fn score_always_in_unit_interval() {
        let html = Html::parse_document(
            r#"<html><body>job position vacancy career opportunity recruitment
            hiring opening posting role <a class="job" href="/apply">apply</a></body></html>"#,
        );
        let classifier = JobPageClassifier::new();
        let (_, score) = classifier.classify(&html, "https://example.org/jobs/vacancy/position");
        assert!((0.0..=1.0).contains(&score));
    }

    struct FixedMl(f64);
    impl MlScorer for FixedMl {
        fn score(&self, _text: &str) -> f64 {
            self.0
        }
    }

    #[test]
    fn ml_contributes_thirty_percent() {
        let html = Html::parse_document("<html><body>plain page</body></html>");
        let rules_only = JobPageClassifier::new();
        let (_, base) = rules_only.classify(&html, "https://example.org/");

        let with_ml = JobPageClassifier::with_ml(Box::new(FixedMl(1.0)));
        let (_, boosted) = with_ml.classify(&html, "https://example.org/");
        assert!((boosted - (0.7 * base + 0.3)).abs() < 1e-9);
    }
}
