use thiserror::Error;

/// Échecs de démarrage : le processus ne doit pas servir de trafic.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Impossible de charger le modèle {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Le modèle produit {actual} scores, {expected} classes attendues")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("Lecture de la table de recommandations impossible: {0}")]
    TableIo(#[from] std::io::Error),

    #[error("Table de recommandations vide (aucun en-tête)")]
    EmptyTable,

    #[error("Colonne '{0}' absente de la table de recommandations")]
    MissingColumn(&'static str),

    #[error("Ligne {row} de la table illisible: {source}")]
    TableParse {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Ligne {row}: classe de sévérité inconnue '{label}'")]
    UnknownSeverity { row: usize, label: String },

    #[error("Ligne {row}: champ '{field}' vide")]
    MissingField { row: usize, field: &'static str },
}

/// Échec de classification d'une image, isolé à la requête.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Image illisible: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Erreur d'inférence: {0}")]
    Inference(String),

    #[error("Sortie du modèle invalide: {actual} scores au lieu de {expected}")]
    OutputShape { expected: usize, actual: usize },
}

/// Erreurs d'une soumission de formulaire.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Champ '{0}' manquant")]
    MissingField(&'static str),

    #[error("Aucune image fournie")]
    MissingImage,

    #[error("Nom de fichier invalide")]
    InvalidFilename,

    #[error("Stockage de l'image impossible: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

pub type StartupResult<T> = std::result::Result<T, StartupError>;
