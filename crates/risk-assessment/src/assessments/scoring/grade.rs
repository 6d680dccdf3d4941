use serde::{Deserialize, Serialize};

/// Letter grades, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeLetter {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA")]
    Aa,
    A,
    #[serde(rename = "BBB")]
    Bbb,
    #[serde(rename = "BB")]
    Bb,
    B,
    #[serde(rename = "CCC")]
    Ccc,
    #[serde(rename = "CC")]
    Cc,
    C,
    D,
}

impl GradeLetter {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeLetter::Aaa => "AAA",
            GradeLetter::Aa => "AA",
            GradeLetter::A => "A",
            GradeLetter::Bbb => "BBB",
            GradeLetter::Bb => "BB",
            GradeLetter::B => "B",
            GradeLetter::Ccc => "CCC",
            GradeLetter::Cc => "CC",
            GradeLetter::C => "C",
            GradeLetter::D => "D",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub min_percentage: f64,
    pub grade: GradeLetter,
    pub description: String,
    pub insurable: bool,
}

/// Optional letter classification carried next to the LOW/MEDIUM/HIGH rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeScale {
    pub bands: Vec<GradeBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskGrade {
    pub grade: GradeLetter,
    pub description: String,
    pub insurable: bool,
}

impl RiskGrade {
    pub fn insurance_decision(&self) -> &'static str {
        if self.insurable {
            "Даатгана"
        } else {
            "Даатгахгүй"
        }
    }
}

impl GradeScale {
    pub fn standard() -> Self {
        let band = |min_percentage: f64, grade, description: &str, insurable| GradeBand {
            min_percentage,
            grade,
            description: description.to_string(),
            insurable,
        };

        Self {
            bands: vec![
                band(95.0, GradeLetter::Aaa, "Minimal risk", true),
                band(90.0, GradeLetter::Aa, "Very low risk", true),
                band(80.0, GradeLetter::A, "Low risk", true),
                band(70.0, GradeLetter::Bbb, "Moderate risk", true),
                band(60.0, GradeLetter::Bb, "Elevated risk", true),
                band(50.0, GradeLetter::B, "Significant risk", true),
                band(40.0, GradeLetter::Ccc, "High risk", false),
                band(30.0, GradeLetter::Cc, "Very high risk", false),
                band(20.0, GradeLetter::C, "Severe risk", false),
                band(0.0, GradeLetter::D, "Critical risk", false),
            ],
        }
    }

    /// Picks the band with the highest `min_percentage` not above `percentage`.
    /// Falls back to the lowest band when nothing matches. `None` for an empty scale.
    pub fn classify(&self, percentage: f64) -> Option<RiskGrade> {
        let matched = self
            .bands
            .iter()
            .filter(|band| percentage >= band.min_percentage)
            .max_by(|a, b| a.min_percentage.total_cmp(&b.min_percentage));
        let band = matched.or_else(|| {
            self.bands
                .iter()
                .min_by(|a, b| a.min_percentage.total_cmp(&b.min_percentage))
        })?;

        Some(RiskGrade {
            grade: band.grade,
            description: band.description.clone(),
            insurable: band.insurable,
        })
    }
}
