use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::error::{StartupError, StartupResult};
use crate::models::{DemographicProfile, PredictionResult, SeverityClass};

pub const NO_WRINKLE_MESSAGE: &str =
    "Your skin looks amazing! 🌟 Keep up the good work and don’t forget to wear sunscreen every day ☀️";

/// Colonnes obligatoires de la table ; les autres sont ignorées.
pub const REQUIRED_COLUMNS: [&str; 5] = ["gender", "age", "skin_type", "wrinkle", "recommendation"];

pub const FALLBACK_MESSAGE: &str =
    "No specific routine found for this combination, but keep taking care of your skin! 💧";

/// Clé composite : les quatre champs sont comparés tels quels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecommendationKey {
    pub gender: String,
    pub age_bracket: String,
    pub skin_type: String,
    pub severity: SeverityClass,
}

impl RecommendationKey {
    pub fn new(profile: &DemographicProfile, severity: SeverityClass) -> Self {
        RecommendationKey {
            gender: profile.gender.clone(),
            age_bracket: profile.age_bracket.clone(),
            skin_type: profile.skin_type.clone(),
            severity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TableRow {
    gender: String,
    age: String,
    skin_type: String,
    wrinkle: String,
    recommendation: String,
}

impl TableRow {
    fn into_entry(self, row: usize) -> StartupResult<(RecommendationKey, String)> {
        let fields = [
            ("gender", &self.gender),
            ("age", &self.age),
            ("skin_type", &self.skin_type),
            ("recommendation", &self.recommendation),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(StartupError::MissingField { row, field });
            }
        }

        let severity = self
            .wrinkle
            .parse::<SeverityClass>()
            .map_err(|_| StartupError::UnknownSeverity {
                row,
                label: self.wrinkle.clone(),
            })?;

        let key = RecommendationKey {
            gender: self.gender,
            age_bracket: self.age,
            skin_type: self.skin_type,
            severity,
        };
        Ok((key, self.recommendation))
    }
}

/// Table en lecture seule, construite une fois au démarrage.
#[derive(Debug, Default, Clone)]
pub struct RecommendationTable {
    entries: HashMap<RecommendationKey, String>,
}

impl RecommendationTable {
    pub fn load<P: AsRef<Path>>(path: P) -> StartupResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::from_reader(file)?;
        info!(
            "Table de recommandations chargée: {} entrées ({})",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Toute ligne invalide fait échouer le chargement complet.
    pub fn from_reader<R: Read>(reader: R) -> StartupResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|source| StartupError::TableParse { row: 0, source })?;
        if headers.is_empty() {
            return Err(StartupError::EmptyTable);
        }
        if let Some(column) = REQUIRED_COLUMNS
            .iter()
            .find(|column| !headers.iter().any(|h| h == **column))
        {
            return Err(StartupError::MissingColumn(*column));
        }

        let mut entries = HashMap::new();
        let mut duplicates = 0usize;

        for (idx, result) in csv_reader.deserialize::<TableRow>().enumerate() {
            let row = idx + 1;
            let record = result.map_err(|source| StartupError::TableParse { row, source })?;
            let (key, text) = record.into_entry(row)?;
            if entries.insert(key, text).is_some() {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            warn!("{} lignes dupliquées écrasées par la dernière occurrence", duplicates);
        }
        if entries.is_empty() {
            warn!("Table de recommandations vide");
        }

        Ok(Self { entries })
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (RecommendationKey, String)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, key: &RecommendationKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// "No wrinkle" court-circuite la table ; sinon recherche exacte,
/// avec le message générique en cas d'absence.
pub fn resolve<'a>(
    profile: &DemographicProfile,
    prediction: &PredictionResult,
    table: &'a RecommendationTable,
) -> &'a str {
    if prediction.severity == SeverityClass::NoWrinkle {
        return NO_WRINKLE_MESSAGE;
    }

    let key = RecommendationKey::new(profile, prediction.severity);
    table.get(&key).unwrap_or(FALLBACK_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
gender,age,skin_type,wrinkle,recommendation
male,30-40,dry,mild_wrinkle,Use retinol cream nightly
female,20-30,oily,no_wrinkle,Should never be served
female,20-30,oily,moderate_wrinkle,\"Gel moisturizer, then SPF 50\"
";

    fn profile(gender: &str, age: &str, skin: &str) -> DemographicProfile {
        DemographicProfile::new(gender, age, skin)
    }

    #[test]
    fn test_load_from_csv() {
        let table = RecommendationTable::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let key = RecommendationKey::new(
            &profile("female", "20-30", "oily"),
            SeverityClass::ModerateWrinkle,
        );
        assert_eq!(table.get(&key), Some("Gel moisturizer, then SPF 50"));
    }

    #[test]
    fn test_no_wrinkle_never_consults_table() {
        let table = RecommendationTable::from_reader(CSV.as_bytes()).unwrap();
        let prediction = PredictionResult::new(SeverityClass::NoWrinkle);

        for p in [
            profile("female", "20-30", "oily"),
            profile("male", "30-40", "dry"),
            profile("x", "y", "z"),
        ] {
            assert_eq!(resolve(&p, &prediction, &table), NO_WRINKLE_MESSAGE);
        }
    }

    #[test]
    fn test_hits_return_exact_text() {
        let table = RecommendationTable::from_reader(CSV.as_bytes()).unwrap();
        let prediction = PredictionResult::new(SeverityClass::MildWrinkle);
        assert_eq!(
            resolve(&profile("male", "30-40", "dry"), &prediction, &table),
            "Use retinol cream nightly"
        );
    }

    #[test]
    fn test_misses_return_fallback() {
        let table = RecommendationTable::from_reader(CSV.as_bytes()).unwrap();
        let cases = [
            (profile("male", "30-40", "dry"), SeverityClass::SevereWrinkle),
            (profile("Male", "30-40", "dry"), SeverityClass::MildWrinkle),
            (profile("male", "30-40", "dry "), SeverityClass::MildWrinkle),
        ];
        for (p, severity) in cases {
            let prediction = PredictionResult::new(severity);
            assert_eq!(resolve(&p, &prediction, &table), FALLBACK_MESSAGE);
        }
        assert_ne!(FALLBACK_MESSAGE, NO_WRINKLE_MESSAGE);
    }

    #[test]
    fn test_separator_in_fields_does_not_collide() {
        let table = RecommendationTable::from_entries([(
            RecommendationKey::new(&profile("a_b", "c", "d"), SeverityClass::MildWrinkle),
            "first".to_string(),
        )]);
        let prediction = PredictionResult::new(SeverityClass::MildWrinkle);
        assert_eq!(resolve(&profile("a", "b_c", "d"), &prediction, &table), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_duplicate_rows_keep_last() {
        let csv = "\
gender,age,skin_type,wrinkle,recommendation
male,30-40,dry,mild_wrinkle,first
male,30-40,dry,mild_wrinkle,second
";
        let table = RecommendationTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        let key = RecommendationKey::new(&profile("male", "30-40", "dry"), SeverityClass::MildWrinkle);
        assert_eq!(table.get(&key), Some("second"));
    }

    #[test]
    fn test_display_label_is_rejected_as_severity() {
        let csv = "\
gender,age,skin_type,wrinkle,recommendation
male,30-40,dry,Mild Wrinkle,text
";
        assert!(matches!(
            RecommendationTable::from_reader(csv.as_bytes()),
            Err(StartupError::UnknownSeverity { row: 1, .. })
        ));
    }

    #[test]
    fn test_missing_column_fails() {
        let csv = "\
gender,age,wrinkle,recommendation
male,30-40,mild_wrinkle,text
";
        assert!(matches!(
            RecommendationTable::from_reader(csv.as_bytes()),
            Err(StartupError::MissingColumn("skin_type"))
        ));
    }

    #[test]
    fn test_empty_resource_fails() {
        assert!(matches!(
            RecommendationTable::from_reader("".as_bytes()),
            Err(StartupError::EmptyTable)
        ));
    }

    #[test]
    fn test_wrong_header_without_rows_fails() {
        for csv in ["name,value\n", "foo\n"] {
            assert!(matches!(
                RecommendationTable::from_reader(csv.as_bytes()),
                Err(StartupError::MissingColumn("gender"))
            ));
        }
    }

    #[test]
    fn test_ragged_row_fails_whole_load() {
        let csv = "\
gender,age,skin_type,wrinkle,recommendation
male,30-40,dry,mild_wrinkle,ok
female,20-30
";
        assert!(matches!(
            RecommendationTable::from_reader(csv.as_bytes()),
            Err(StartupError::TableParse { row: 2, .. })
        ));
    }

    #[test]
    fn test_empty_field_fails() {
        let csv = "\
gender,age,skin_type,wrinkle,recommendation
male,30-40,dry,mild_wrinkle,
";
        assert!(matches!(
            RecommendationTable::from_reader(csv.as_bytes()),
            Err(StartupError::MissingField { row: 1, field: "recommendation" })
        ));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table =
            RecommendationTable::from_reader("gender,age,skin_type,wrinkle,recommendation\n".as_bytes())
                .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RecommendationTable::load("/nonexistent/skincare.csv"),
            Err(StartupError::TableIo(_))
        ));
    }
}
