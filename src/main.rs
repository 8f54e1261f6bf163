use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use detect_api::{
    cors, routes, Config, DetectionService, LabelSource, Labels, ModelError, Thresholds,
    YoloDetector,
};

fn load_labels(source: LabelSource) -> Result<Option<Labels>, ModelError> {
    match source {
        LabelSource::Coco => Ok(Some(Labels::coco())),
        LabelSource::Disabled => Ok(None),
        LabelSource::File(path) => Labels::from_file(&path).map(Some),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    let labels = load_labels(config.label_source())?;
    let thresholds = Thresholds {
        confidence: config.conf_threshold,
        iou: config.iou_threshold,
        max_detections: config.max_detections,
    };

    log::info!(
        "Loading model {} (input {})",
        config.model_path.display(),
        config.input_size
    );
    let detector = YoloDetector::load(&config.model_path, config.input_size, thresholds)
        .map_err(|e| {
            log::error!("{}", e);
            e
        })?;

    let service = web::Data::new(
        DetectionService::new(detector, labels).with_upload_limit(config.max_upload_bytes),
    );
    log::info!(
        "Model ready, {} class labels",
        service.labels().map_or(0, Labels::len)
    );

    let (host, port) = config.bind_addr();
    log::info!("Server running at http://{}:{}", host, port);

    let cors_origin = config.cors_origin.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(cors_origin.as_deref()))
            .wrap(Logger::default())
            .app_data(service.clone())
            .configure(routes)
    })
    .bind((host, port))?
    .run()
    .await
}
