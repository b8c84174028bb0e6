use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of technical skill categories used for question targeting and
/// resume tagging. Anything outside this set is discarded or remapped by `parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "Python")]
    Python,
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "Data Engineering")]
    DataEngineering,
    #[serde(rename = "Data Analysis")]
    DataAnalysis,
    #[serde(rename = "Machine Learning")]
    MachineLearning,
    #[serde(rename = "Deep Learning")]
    DeepLearning,
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "System Design")]
    SystemDesign,
    #[serde(rename = "Statistics")]
    Statistics,
}

impl Domain {
    pub const ALL: [Domain; 9] = [
        Domain::Python,
        Domain::Sql,
        Domain::DataEngineering,
        Domain::DataAnalysis,
        Domain::MachineLearning,
        Domain::DeepLearning,
        Domain::Ai,
        Domain::SystemDesign,
        Domain::Statistics,
    ];

    /// Used when neither the resume summary nor the classifier yields a usable domain.
    pub const DEFAULT_TRIPLE: [Domain; 3] = [Domain::Python, Domain::Sql, Domain::DataAnalysis];

    pub fn label(self) -> &'static str {
        match self {
            Domain::Python => "Python",
            Domain::Sql => "SQL",
            Domain::DataEngineering => "Data Engineering",
            Domain::DataAnalysis => "Data Analysis",
            Domain::MachineLearning => "Machine Learning",
            Domain::DeepLearning => "Deep Learning",
            Domain::Ai => "AI",
            Domain::SystemDesign => "System Design",
            Domain::Statistics => "Statistics",
        }
    }

    /// Case-insensitive label match, accepting the common long forms models produce.
    pub fn parse(raw: &str) -> Option<Domain> {
        let normalized = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .to_lowercase()
            .replace(['_', '-'], " ");
        let domain = match normalized.as_str() {
            "python" => Domain::Python,
            "sql" | "databases" | "database" => Domain::Sql,
            "data engineering" => Domain::DataEngineering,
            "data analysis" | "data analytics" | "analytics" => Domain::DataAnalysis,
            "machine learning" | "ml" => Domain::MachineLearning,
            "deep learning" | "dl" => Domain::DeepLearning,
            "ai" | "artificial intelligence" | "generative ai" | "genai" => Domain::Ai,
            "system design" | "systems design" => Domain::SystemDesign,
            "statistics" | "stats" => Domain::Statistics,
            _ => return None,
        };
        Some(domain)
    }

    /// Lowercase keywords whose presence in a text suggests this domain.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Domain::Python => &["python", "pandas", "numpy", "django", "flask", "fastapi"],
            Domain::Sql => &["sql", "postgres", "mysql", "query", "database", "oracle"],
            Domain::DataEngineering => &["etl", "pipeline", "spark", "airflow", "kafka", "hadoop"],
            Domain::DataAnalysis => &["analysis", "analytics", "dashboard", "tableau", "excel", "power bi"],
            Domain::MachineLearning => &["machine learning", "scikit", "regression", "classification", "xgboost", "model"],
            Domain::DeepLearning => &["deep learning", "neural", "tensorflow", "pytorch", "cnn", "transformer"],
            Domain::Ai => &["artificial intelligence", "llm", "nlp", "generative", "gpt", "agent"],
            Domain::SystemDesign => &["architecture", "microservice", "scalab", "distributed", "system design", "kubernetes"],
            Domain::Statistics => &["statistic", "hypothesis", "probability", "a/b test", "bayesian", "inference"],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
