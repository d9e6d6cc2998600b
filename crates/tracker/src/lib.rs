//! Crate `tracker` — motor de seguimiento de documentos físicos por QR
//!
//! Este crate define el contrato de persistencia `TrackRepository`, el
//! modelo de transiciones atómicas con bloqueo optimista (`Transition`,
//! `PersistResult`), el motor `WorkflowEngine` que deriva estado y valida
//! transiciones, la capa orquestadora `TrackService` y una implementación
//! en memoria útil para pruebas (`InMemoryTrackRepository`).
//!
//! Diseño resumido:
//! - Todo el estado vive en el repositorio: el motor no guarda estado en
//!   proceso y los handlers que lo invocan son independientes entre sí.
//! - Invariante central: a lo sumo una fila de escaneo abierta por
//!   documento; lo garantiza la atomicidad de `apply_transition` más la
//!   verificación de `expected_version`.
//! - Transiciones concurrentes sobre el mismo documento resuelven en
//!   exactamente un éxito; el perdedor recibe un error tipado, nunca se
//!   pierden actualizaciones ni quedan dos filas abiertas.
//!
//! Ejemplo rápido:
//! ```rust
//! use std::sync::Arc;
//! use tracker::engine::EngineConfig;
//! use tracker::stubs::InMemoryTrackRepository;
//! let repo = Arc::new(InMemoryTrackRepository::new());
//! let service = tracker::TrackService::new(repo, EngineConfig::default());
//! ```
pub mod domain;
pub mod engine;
pub mod errors;
pub mod repository;
pub mod service;
pub mod stubs;

pub use domain::*;
pub use engine::*;
pub use errors::*;
pub use repository::*;
pub use service::*;
pub use stubs::*;
