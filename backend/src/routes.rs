use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use actix_files::{Files, NamedFile};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use futures_util::StreamExt;
use log::{error, info, warn};

use crate::error::{ClassificationError, ScanError};
use crate::models::{ApiResponse, DemographicProfile, ScanReport};
use crate::pipeline::{Pipeline, Submission};

/// Taille maximale acceptée pour une requête de formulaire complète.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

/// Champs texte attendus dans le formulaire ; les autres sont ignorés.
const FORM_FIELDS: [&str; 3] = ["gender", "age", "skin_type"];

/// Taille maximale d'un champ texte du formulaire.
const TEXT_FIELD_LIMIT: usize = 256;

/// Pages de l'interface : chemin web -> fichier dans le répertoire statique.
pub const PAGES: [(&str, &str); 4] = [
    ("/", "home.html"),
    ("/scan-method", "method_selection.html"),
    ("/qr-instructions", "qr_instructions.html"),
    ("/form", "form.html"),
];

/// Routes API, pages de l'interface, images déposées et fichiers statiques.
pub fn configure(cfg: &mut web::ServiceConfig, static_dir: &Path, upload_dir: &Path) {
    for (path, file) in PAGES {
        let page = static_dir.join(file);
        cfg.route(
            path,
            web::get().to(move || {
                let page = page.clone();
                async move { NamedFile::open_async(page).await }
            }),
        );
    }

    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_check))
            .route("/model-info", web::get().to(model_info))
            .route("/scan", web::post().to(scan))
            .default_service(web::route().to(|| async {
                HttpResponse::NotFound().json(ApiResponse::<String>::error("Endpoint non trouvé"))
            })),
    )
    .service(Files::new("/uploads", upload_dir))
    .service(Files::new("/static", static_dir).prefer_utf8(true));
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success("✅ API d'analyse des rides"))
}

async fn model_info(pipeline: web::Data<Arc<Pipeline>>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(pipeline.model_info()))
}

async fn scan(
    pipeline: web::Data<Arc<Pipeline>>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> impl Responder {
    let start_time = Instant::now();
    let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

    let submission = match read_form(payload, limit.0).await {
        Ok(submission) => submission,
        Err(message) => {
            warn!("Formulaire rejeté: {}", message);
            return HttpResponse::BadRequest()
                .json(ApiResponse::<ScanReport>::error(&message).timed(elapsed(start_time)));
        }
    };

    info!("Nouvelle analyse reçue: {} octets", submission.image.len());

    let pipeline = pipeline.clone();
    match web::block(move || pipeline.scan(submission)).await {
        Ok(Ok(report)) => {
            info!("Prédiction réussie: {}", report.display_label);
            HttpResponse::Ok().json(ApiResponse::success(report).timed(elapsed(start_time)))
        }
        Ok(Err(e)) => {
            error!("Analyse échouée: {}", e);
            let response = ApiResponse::<ScanReport>::error(&public_message(&e))
                .timed(elapsed(start_time));
            match e {
                ScanError::MissingField(_)
                | ScanError::MissingImage
                | ScanError::InvalidFilename => HttpResponse::BadRequest().json(response),
                ScanError::Classification(ClassificationError::Decode(_)) => {
                    HttpResponse::UnprocessableEntity().json(response)
                }
                ScanError::Classification(_) | ScanError::Storage(_) => {
                    HttpResponse::InternalServerError().json(response)
                }
            }
        }
        Err(e) => {
            error!("Erreur d'exécution bloquante: {}", e);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<ScanReport>::error("Erreur d'exécution").timed(elapsed(start_time)))
        }
    }
}

/// Message renvoyé au client : les détails internes restent dans les logs.
fn public_message(e: &ScanError) -> String {
    match e {
        ScanError::MissingField(_) | ScanError::MissingImage | ScanError::InvalidFilename => {
            e.to_string()
        }
        ScanError::Classification(ClassificationError::Decode(_)) => {
            "Image illisible".to_string()
        }
        ScanError::Classification(_) => "Erreur de classification".to_string(),
        ScanError::Storage(_) => "Erreur interne".to_string(),
    }
}

/// Lit le formulaire multipart. `max_bytes` borne la requête entière,
/// tous champs confondus.
async fn read_form(mut payload: Multipart, max_bytes: usize) -> Result<Submission, String> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut filename = String::new();
    let mut image = Vec::new();
    let mut total = 0usize;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| e.to_string())?;
        let disposition = field.content_disposition().clone();
        let name = disposition.get_name().unwrap_or_default().to_string();

        let is_file = name == "file";
        let keep = is_file || FORM_FIELDS.contains(&name.as_str());
        let field_limit = if is_file { max_bytes } else { TEXT_FIELD_LIMIT };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            total += chunk.len();
            if total > max_bytes {
                return Err(format!("Requête trop volumineuse (max {} octets)", max_bytes));
            }
            if !keep {
                continue;
            }
            if data.len() + chunk.len() > field_limit {
                return Err(format!("Champ '{}' trop long (max {} octets)", name, field_limit));
            }
            data.extend_from_slice(&chunk);
        }

        if is_file {
            filename = disposition.get_filename().unwrap_or_default().to_string();
            image = data;
        } else if keep {
            fields.insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    let mut take = |key: &str| fields.remove(key).unwrap_or_default();
    let profile = DemographicProfile::new(take("gender"), take("age"), take("skin_type"));

    Ok(Submission {
        profile,
        filename,
        image,
    })
}
