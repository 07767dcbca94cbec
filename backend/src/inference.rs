use std::path::Path;

use image::imageops::{self, FilterType};
use log::debug;
use serde::Serialize;
use tract_onnx::prelude::*;

use crate::error::{ClassificationError, StartupError, StartupResult};
use crate::models::{PredictionResult, SeverityClass};

/// Côté du carré attendu en entrée du modèle.
pub const INPUT_SIZE: u32 = 150;

pub const CLASS_ORDER_VERSION: &str = "mobilenet-wrinkle-v1";

/// Index de sortie du modèle -> classe. Fixé par l'entraînement.
pub const CLASS_ORDER: [SeverityClass; 4] = [
    SeverityClass::MildWrinkle,
    SeverityClass::ModerateWrinkle,
    SeverityClass::NoWrinkle,
    SeverityClass::SevereWrinkle,
];

/// Tenseur NHWC `[1, 150, 150, 3]`, valeurs dans [0, 1].
pub type InputTensor = tract_ndarray::Array4<f32>;

/// Backend capable de scorer une image prétraitée.
pub trait SeverityModel: Send + Sync {
    /// Un score par classe, dans l'ordre de `CLASS_ORDER`.
    fn scores(&self, input: InputTensor) -> Result<Vec<f32>, ClassificationError>;
}

pub struct OnnxSeverityModel {
    model: TypedRunnableModel<TypedModel>,
}

impl OnnxSeverityModel {
    pub fn load<P: AsRef<Path>>(model_path: P) -> StartupResult<Self> {
        let path = model_path.as_ref();
        let load_err = |e: TractError| StartupError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let side = INPUT_SIZE as usize;

        let optimized = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, 3)),
            )
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?;

        let output_width = optimized
            .output_fact(0)
            .map_err(load_err)?
            .shape
            .as_concrete()
            .and_then(|dims| dims.last().copied());
        check_output_width(output_width).map_err(|e| match e {
            StartupError::ModelLoad { reason, .. } => StartupError::ModelLoad {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;

        let model = optimized.into_runnable().map_err(load_err)?;
        Ok(Self { model })
    }
}

impl SeverityModel for OnnxSeverityModel {
    fn scores(&self, input: InputTensor) -> Result<Vec<f32>, ClassificationError> {
        let tensor: Tensor = input.into();
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        let first = outputs
            .first()
            .ok_or_else(|| ClassificationError::Inference("Aucune sortie du modèle".to_string()))?;
        let view = first
            .to_array_view::<f32>()
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        Ok(view.iter().copied().collect())
    }
}

/// Vérifie au chargement que la sortie du modèle couvre exactement `CLASS_ORDER`.
pub fn check_output_width(width: Option<usize>) -> StartupResult<()> {
    match width {
        Some(actual) if actual == CLASS_ORDER.len() => Ok(()),
        Some(actual) => Err(StartupError::ClassCountMismatch {
            expected: CLASS_ORDER.len(),
            actual,
        }),
        None => Err(StartupError::ModelLoad {
            path: String::new(),
            reason: "dimension de sortie non déterminée".to_string(),
        }),
    }
}

/// Décodage, conversion RGB, redimensionnement direct (sans conserver
/// le ratio) puis normalisation sur [0, 1].
pub fn preprocess(image_bytes: &[u8]) -> Result<InputTensor, ClassificationError> {
    let decoded = image::load_from_memory(image_bytes)?;
    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Nearest);
    let side = INPUT_SIZE as usize;

    Ok(InputTensor::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    }))
}

/// Index du score maximal ; en cas d'égalité le plus petit index gagne.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top || score.is_nan() => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

pub struct Classifier {
    model: Box<dyn SeverityModel>,
}

impl Classifier {
    pub fn new<M: SeverityModel + 'static>(model: M) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    pub fn load<P: AsRef<Path>>(model_path: P) -> StartupResult<Self> {
        Ok(Self::new(OnnxSeverityModel::load(model_path)?))
    }

    pub fn classify(&self, image_bytes: &[u8]) -> Result<PredictionResult, ClassificationError> {
        let input = preprocess(image_bytes)?;
        let scores = self.model.scores(input)?;
        debug!("Scores bruts: {:?}", scores);
        decide(&scores)
    }

    pub fn get_model_info(&self) -> ModelInfo {
        let side = INPUT_SIZE as usize;
        ModelInfo {
            input_shape: vec![1, side, side, 3],
            classes: CLASS_ORDER.iter().map(|c| c.as_str().to_string()).collect(),
            class_order_version: CLASS_ORDER_VERSION.to_string(),
        }
    }
}

/// Applique la règle de décision à un vecteur de scores.
pub fn decide(scores: &[f32]) -> Result<PredictionResult, ClassificationError> {
    let shape_err = ClassificationError::OutputShape {
        expected: CLASS_ORDER.len(),
        actual: scores.len(),
    };
    if scores.len() != CLASS_ORDER.len() {
        return Err(shape_err);
    }

    let idx = argmax(scores).ok_or(shape_err)?;
    Ok(PredictionResult::new(CLASS_ORDER[idx]))
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub input_shape: Vec<usize>,
    pub classes: Vec<String>,
    pub class_order_version: String,
}
