use std::process;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};

use wrinkle_scan::config::ServerConfig;
use wrinkle_scan::pipeline::Pipeline;
use wrinkle_scan::routes::{self, UploadLimit};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("🚀 Démarrage de l'API d'analyse des rides");

    let config = ServerConfig::from_env();

    // Aucun trafic tant que le modèle et la table ne sont pas chargés.
    let pipeline = match Pipeline::startup(&config) {
        Ok(pipeline) => {
            info!("✅ Modèle et table chargés ({} recommandations)", pipeline.table_len());
            Arc::new(pipeline)
        }
        Err(e) => {
            error!("❌ Démarrage impossible: {}", e);
            process::exit(1);
        }
    };

    std::fs::create_dir_all(pipeline.upload_dir())
        .with_context(|| format!("création de {}", pipeline.upload_dir().display()))?;

    let pipeline_data = web::Data::new(pipeline);
    let limit = web::Data::new(UploadLimit(config.max_upload_bytes));
    let bind_address = config.bind_address();
    let origin = format!("http://{}", bind_address);

    info!("🌐 Serveur démarré sur: http://{}", bind_address);
    info!("👷 Workers: {}", config.workers);
    info!("🔧 Endpoints:");
    info!("   GET  /                - Accueil");
    info!("   GET  /scan-method     - Choix de la méthode");
    info!("   GET  /qr-instructions - Instructions QR");
    info!("   GET  /form            - Formulaire");
    info!("   GET  /api/health      - Vérification santé");
    info!("   GET  /api/model-info  - Information modèle");
    info!("   POST /api/scan        - Analyse d'une photo");

    let static_dir = config.static_dir.clone();
    let upload_dir = config.upload_dir.clone();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&origin)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(pipeline_data.clone())
            .app_data(limit.clone())
            .configure(|cfg| routes::configure(cfg, &static_dir, &upload_dir))
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("liaison à {}", bind_address))?
    .run()
    .await
    .context("arrêt du serveur")
}
