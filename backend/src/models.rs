use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Les quatre catégories de sévérité connues du classifieur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityClass {
    NoWrinkle,
    MildWrinkle,
    ModerateWrinkle,
    SevereWrinkle,
}

impl SeverityClass {
    pub const ALL: [SeverityClass; 4] = [
        SeverityClass::NoWrinkle,
        SeverityClass::MildWrinkle,
        SeverityClass::ModerateWrinkle,
        SeverityClass::SevereWrinkle,
    ];

    /// Identifiant interne, partagé par le modèle et la table CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityClass::NoWrinkle => "no_wrinkle",
            SeverityClass::MildWrinkle => "mild_wrinkle",
            SeverityClass::ModerateWrinkle => "moderate_wrinkle",
            SeverityClass::SevereWrinkle => "severe_wrinkle",
        }
    }

    /// "moderate_wrinkle" -> "Moderate Wrinkle"
    pub fn display_label(&self) -> String {
        title_case(&self.as_str().replace('_', " "))
    }
}

impl fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeverityClass::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| format!("classe inconnue: {}", s))
    }
}

/// Majuscule en début de mot, minuscules ensuite. Tout caractère
/// non alphabétique sépare deux mots et reste inchangé.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_word = false;

    for c in input.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub severity: SeverityClass,
    pub display_label: String,
}

impl PredictionResult {
    pub fn new(severity: SeverityClass) -> Self {
        PredictionResult {
            severity,
            display_label: severity.display_label(),
        }
    }
}

/// Attributs saisis par l'utilisateur. Comparés uniquement par égalité exacte.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DemographicProfile {
    pub gender: String,
    pub age_bracket: String,
    pub skin_type: String,
}

impl DemographicProfile {
    pub fn new(
        gender: impl Into<String>,
        age_bracket: impl Into<String>,
        skin_type: impl Into<String>,
    ) -> Self {
        DemographicProfile {
            gender: gender.into(),
            age_bracket: age_bracket.into(),
            skin_type: skin_type.into(),
        }
    }

    /// Seule la présence des champs est vérifiée.
    pub fn validate(&self) -> Result<(), &'static str> {
        let fields = [
            ("gender", &self.gender),
            ("age", &self.age_bracket),
            ("skin_type", &self.skin_type),
        ];

        for (name, value) in fields.iter() {
            if value.is_empty() {
                return Err(*name);
            }
        }

        Ok(())
    }

    pub fn echo(&self) -> ProfileEcho {
        ProfileEcho {
            gender: title_case(&self.gender),
            age: self.age_bracket.clone(),
            skin_type: title_case(&self.skin_type),
        }
    }
}

/// Profil renvoyé pour l'affichage.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProfileEcho {
    pub gender: String,
    pub age: String,
    pub skin_type: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct ScanReport {
    pub prediction: String,
    pub severity: SeverityClass,
    pub display_label: String,
    pub recommendation: String,
    pub uploaded_image: String,
    pub profile: ProfileEcho,
}

impl ScanReport {
    pub fn new(
        prediction: PredictionResult,
        recommendation: String,
        uploaded_image: String,
        profile: &DemographicProfile,
    ) -> Self {
        ScanReport {
            prediction: format!("Predicted Wrinkle Severity: {}", prediction.display_label),
            severity: prediction.severity,
            display_label: prediction.display_label,
            recommendation,
            uploaded_image,
            profile: profile.echo(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn timed(mut self, elapsed_ms: u64) -> Self {
        self.execution_time_ms = Some(elapsed_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        assert_eq!(SeverityClass::NoWrinkle.display_label(), "No Wrinkle");
        assert_eq!(SeverityClass::MildWrinkle.display_label(), "Mild Wrinkle");
        assert_eq!(SeverityClass::ModerateWrinkle.display_label(), "Moderate Wrinkle");
        assert_eq!(SeverityClass::SevereWrinkle.display_label(), "Severe Wrinkle");
    }

    #[test]
    fn test_display_label_is_stable_and_clean() {
        for class in SeverityClass::ALL {
            let label = class.display_label();
            assert_eq!(label, class.display_label());
            assert_eq!(title_case(&label), label);
            assert!(!label.contains('_'));
            for word in label.split(' ') {
                let first = word.chars().next().unwrap();
                assert!(first.is_uppercase(), "{} dans {}", word, label);
                assert!(word.chars().skip(1).all(|c| c.is_lowercase()));
            }
        }
    }

    #[test]
    fn test_severity_parse_uses_identifiers_only() {
        for class in SeverityClass::ALL {
            assert_eq!(class.as_str().parse::<SeverityClass>(), Ok(class));
        }
        assert!("Mild Wrinkle".parse::<SeverityClass>().is_err());
        assert!("MILD_WRINKLE".parse::<SeverityClass>().is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("female"), "Female");
        assert_eq!(title_case("COMBINATION skin"), "Combination Skin");
        assert_eq!(title_case("20-30"), "20-30");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_profile_validation() {
        assert!(DemographicProfile::new("male", "30-40", "dry").validate().is_ok());
        assert_eq!(
            DemographicProfile::new("male", "", "dry").validate(),
            Err("age")
        );
    }

    #[test]
    fn test_scan_report_echo() {
        let profile = DemographicProfile::new("female", "20-30", "oily");
        let report = ScanReport::new(
            PredictionResult::new(SeverityClass::ModerateWrinkle),
            "Hydrate".to_string(),
            "/static/uploads/a.png".to_string(),
            &profile,
        );

        assert_eq!(report.prediction, "Predicted Wrinkle Severity: Moderate Wrinkle");
        assert_eq!(report.profile.gender, "Female");
        assert_eq!(report.profile.age, "20-30");
        assert_eq!(report.profile.skin_type, "Oily");
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::success("ok").timed(12);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "ok");
        assert_eq!(json["execution_time_ms"], 12);
    }
}
