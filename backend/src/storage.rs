use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use uuid::Uuid;

use crate::error::ScanError;

/// Dépôt des images soumises, servies ensuite sous `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_prefix: String,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        UploadStore {
            dir: dir.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Écrit l'image sous un nom propre à la requête et renvoie son chemin web.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<String, ScanError> {
        let sanitized = sanitize_filename(filename).ok_or(ScanError::InvalidFilename)?;
        let name = format!("{}_{}", Uuid::new_v4().simple(), sanitized);
        fs::create_dir_all(&self.dir)?;

        let target = self.dir.join(&name);
        fs::write(&target, bytes)?;
        debug!("Image enregistrée: {}", target.display());

        Ok(format!("{}/{}", self.public_prefix, name))
    }
}

/// Ne garde que le dernier composant du nom fourni par le client.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let last = filename.rsplit(['/', '\\']).next()?;
    let name = Path::new(last).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
