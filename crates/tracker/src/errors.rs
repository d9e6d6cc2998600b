// Archivo: errors.rs
// Propósito: definir los errores del motor de seguimiento y el alias
// Result<T> usado por las APIs del crate. Cada variante lleva los ids o
// nombres necesarios para que el llamador presente el error sin volver a
// consultar estado.
use doc_domain::DomainError;
use thiserror::Error;
use uuid::Uuid;

/// Errores del motor de flujo documental.
///
/// Todos se detectan de forma síncrona al validar precondiciones, antes de
/// cualquier mutación; ninguna operación se reintenta automáticamente: son
/// violaciones de regla de negocio que debe resolver una persona (volver a
/// escanear, avisar al administrador).
#[derive(Error, Debug)]
pub enum TrackError {
  /// El documento no existe.
  #[error("Documento no encontrado: {0}")]
  DocumentNotFound(Uuid),
  /// El proceso referido no existe.
  #[error("Proceso no encontrado: {0}")]
  ProcessNotFound(String),
  /// El administrador no existe.
  #[error("Administrador no encontrado: {0}")]
  AdminNotFound(String),
  /// El estado actual del documento no admite la operación pedida.
  #[error("Transición de estado inválida: {0}")]
  InvalidStateTransition(String),
  /// Ya hay una fila de actividad abierta para el documento.
  #[error("Ya hay una actividad en curso: {name}")]
  ActivityAlreadyInProgress { scan_id: Uuid, name: String },
  /// La actividad pedida no coincide con la siguiente según la plantilla.
  #[error("Actividad fuera de secuencia: se pidió '{requested}', corresponde '{expected}'")]
  OutOfSequence { requested: String, expected: String },
  /// La plantilla quedó agotada o el documento ya está en DONE.
  #[error("El proceso ya terminó para el documento {0}")]
  ProcessAlreadyDone(Uuid),
  /// No hay fila de actividad abierta que finalizar.
  #[error("No hay actividad activa para {0}")]
  NoActiveActivity(Uuid),
  /// La fila de actividad ya fue finalizada y es inmutable.
  #[error("La actividad ya fue finalizada: {0}")]
  ActivityAlreadyFinished(Uuid),
  /// Finalizar un punto de decisión exige un veredicto.
  #[error("Se requiere una decisión para finalizar '{0}'")]
  DecisionRequired(String),
  /// Defecto de configuración de la plantilla, no del documento.
  #[error("Plantilla inconsistente: {0}")]
  TemplateInconsistency(String),
  /// Conflicto de concurrencia (versión esperada no coincide).
  #[error("Conflicto: {0}")]
  Conflict(String),
  /// Error al acceder al almacenamiento externo.
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
}

impl From<DomainError> for TrackError {
  fn from(e: DomainError) -> Self {
    match e {
      DomainError::ValidationError(msg) => TrackError::TemplateInconsistency(msg),
      DomainError::SerializationError(msg) => TrackError::Storage(msg),
    }
  }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, TrackError>;
