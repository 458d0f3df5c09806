#![forbid(unsafe_code)]

pub mod exercise_loader;
pub mod repository;
pub mod sqlite;

pub use exercise_loader::{ExerciseDocument, ExerciseLoadError, ExerciseLoader};
pub use repository::{
    InMemoryRepository, SessionRecord, SessionStore, Storage, StorageError, TranscriptRepository,
};
