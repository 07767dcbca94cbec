use log::info;

use crate::config::ServerConfig;
use crate::error::{ScanError, StartupResult};
use crate::inference::{Classifier, ModelInfo, CLASS_ORDER, CLASS_ORDER_VERSION};
use crate::models::{DemographicProfile, PredictionResult, ScanReport};
use crate::recommendations::{resolve, RecommendationTable};
use crate::storage::{sanitize_filename, UploadStore};

/// Une soumission du formulaire.
#[derive(Debug, Clone)]
pub struct Submission {
    pub profile: DemographicProfile,
    pub filename: String,
    pub image: Vec<u8>,
}

/// État partagé, immuable une fois le démarrage terminé.
pub struct Pipeline {
    classifier: Classifier,
    table: RecommendationTable,
    store: UploadStore,
}

impl Pipeline {
    pub fn new(classifier: Classifier, table: RecommendationTable, store: UploadStore) -> Self {
        Pipeline {
            classifier,
            table,
            store,
        }
    }

    /// Séquence bloquante : la table puis le modèle. Toute erreur est fatale.
    pub fn startup(config: &ServerConfig) -> StartupResult<Self> {
        let table = RecommendationTable::load(&config.recommendations_path)?;

        let classifier = Classifier::load(&config.model_path)?;
        info!(
            "Modèle ONNX chargé: {} (ordre des classes {} {:?})",
            config.model_path.display(),
            CLASS_ORDER_VERSION,
            CLASS_ORDER
        );

        let store = UploadStore::new(&config.upload_dir, "/uploads");
        Ok(Self::new(classifier, table, store))
    }

    pub fn recommend(&self, profile: &DemographicProfile, prediction: &PredictionResult) -> &str {
        resolve(profile, prediction, &self.table)
    }

    pub fn scan(&self, submission: Submission) -> Result<ScanReport, ScanError> {
        let Submission {
            profile,
            filename,
            image,
        } = submission;

        profile.validate().map_err(ScanError::MissingField)?;
        if image.is_empty() {
            return Err(ScanError::MissingImage);
        }

        let name = sanitize_filename(&filename).ok_or(ScanError::InvalidFilename)?;

        // Rien n'est écrit sur disque si la classification échoue.
        let prediction = self.classifier.classify(&image)?;
        let uploaded_image = self.store.save(&name, &image)?;
        let recommendation = self.recommend(&profile, &prediction).to_string();

        Ok(ScanReport::new(prediction, recommendation, uploaded_image, &profile))
    }

    pub fn model_info(&self) -> ModelInfo {
        self.classifier.get_model_info()
    }

    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        self.store.dir()
    }
}
