use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tutor_core::model::{Checkpoint, Exercise, ExerciseError, ExerciseMetadata, Step};

/// Errors raised while reading an exercise document from disk or a string.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExerciseLoadError {
    #[error("exercise file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported exercise file extension {0:?} (expected .yaml, .yml or .json)")]
    UnsupportedExtension(String),

    #[error("failed to read exercise file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML exercise: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON exercise: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ExerciseError),
}

//
// ─── DOCUMENT SHAPE ────────────────────────────────────────────────────────────
//

/// On-disk shape of an exercise, shared by the YAML and JSON formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDocument {
    pub metadata: MetadataDocument,
    pub first_message: String,
    pub end_message: String,
    pub checkpoints: Vec<CheckpointDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub title: String,
    pub topic: String,
    pub level: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointDocument {
    pub checkpoint_number: u32,
    pub main_question: String,
    pub main_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_solution: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    pub step_number: u32,
    pub guiding_question: String,
    pub guiding_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ExerciseDocument {
    /// Validate the document and build the domain exercise.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError` if numbering is out of sequence or required text is blank.
    pub fn into_exercise(self) -> Result<Exercise, ExerciseError> {
        let meta = self.metadata;
        let mut metadata = ExerciseMetadata::new(meta.title, meta.topic, meta.level, meta.language);
        metadata.author = meta.author;
        metadata.tags = meta.tags.unwrap_or_default();
        if let Some(version) = meta.version {
            metadata.version = version;
        }
        metadata.date_created = meta.date_created;

        let checkpoints = self
            .checkpoints
            .into_iter()
            .map(|cp| {
                let steps = cp
                    .steps
                    .into_iter()
                    .map(|s| Step::new(s.step_number, s.guiding_question, s.guiding_answer, s.image))
                    .collect();
                Checkpoint::new(
                    cp.checkpoint_number,
                    cp.main_question,
                    cp.main_answer,
                    cp.image_solution,
                    steps,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Exercise::new(metadata, self.first_message, self.end_message, checkpoints)
    }

    #[must_use]
    pub fn from_exercise(exercise: &Exercise) -> Self {
        let meta = exercise.metadata();
        Self {
            metadata: MetadataDocument {
                title: meta.title.clone(),
                topic: meta.topic.clone(),
                level: meta.level.clone(),
                language: meta.language.clone(),
                author: meta.author.clone(),
                tags: Some(meta.tags.clone()),
                version: Some(meta.version.clone()),
                date_created: meta.date_created,
            },
            first_message: exercise.first_message().to_owned(),
            end_message: exercise.end_message().to_owned(),
            checkpoints: exercise
                .checkpoints()
                .iter()
                .map(|cp| CheckpointDocument {
                    checkpoint_number: cp.number(),
                    main_question: cp.main_question().to_owned(),
                    main_answer: cp.main_answer().to_owned(),
                    image_solution: cp.image_solution().map(str::to_owned),
                    steps: cp
                        .steps()
                        .iter()
                        .map(|s| StepDocument {
                            step_number: s.number(),
                            guiding_question: s.guiding_question().to_owned(),
                            guiding_answer: s.guiding_answer().to_owned(),
                            image: s.image().map(str::to_owned),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

//
// ─── LOADER ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, ExerciseLoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ExerciseLoadError::UnsupportedExtension(ext)),
        }
    }
}

/// Reads exercise documents; the format follows the file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExerciseLoader;

impl ExerciseLoader {
    /// Load and validate an exercise from a `.yaml`, `.yml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseLoadError::NotFound` for a missing file,
    /// `UnsupportedExtension` for other extensions, a parse error for
    /// malformed documents, and `Invalid` when the content fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Exercise, ExerciseLoadError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ExerciseLoadError::NotFound(path.to_path_buf()));
        }
        let format = Format::from_path(path)?;
        let raw = std::fs::read_to_string(path)?;
        let exercise = match format {
            Format::Yaml => Self::from_yaml_str(&raw)?,
            Format::Json => Self::from_json_str(&raw)?,
        };
        debug!(
            path = %path.display(),
            title = exercise.title(),
            checkpoints = exercise.checkpoint_count(),
            "exercise loaded"
        );
        Ok(exercise)
    }

    /// # Errors
    ///
    /// Returns `ExerciseLoadError` if the YAML is malformed or the exercise is invalid.
    pub fn from_yaml_str(raw: &str) -> Result<Exercise, ExerciseLoadError> {
        let doc: ExerciseDocument = serde_yaml::from_str(raw)?;
        Ok(doc.into_exercise()?)
    }

    /// # Errors
    ///
    /// Returns `ExerciseLoadError` if the JSON is malformed or the exercise is invalid.
    pub fn from_json_str(raw: &str) -> Result<Exercise, ExerciseLoadError> {
        let doc: ExerciseDocument = serde_json::from_str(raw)?;
        Ok(doc.into_exercise()?)
    }

    /// # Errors
    ///
    /// Returns `ExerciseLoadError::Yaml` if serialization fails.
    pub fn to_yaml_string(exercise: &Exercise) -> Result<String, ExerciseLoadError> {
        Ok(serde_yaml::to_string(&ExerciseDocument::from_exercise(exercise))?)
    }
}
