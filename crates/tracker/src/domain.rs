// Archivo: domain.rs
// Propósito: tipos de valor que cruzan la frontera del motor: transiciones
// atómicas, resultado de persistencia, estado derivado y salidas de cada
// operación.
use chrono::{DateTime, Utc};
use doc_domain::{ActivityScan, Document, DocumentStatus, ProcessActivity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transición multi-sentencia sobre un documento. El repositorio la aplica
/// de forma atómica (una transacción): una escritura parcial — fila de
/// escaneo insertada sin actualizar el estado del documento, o viceversa —
/// nunca debe ser observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Transition {
  /// Recepción formal del documento. Fija `accepted_at` SOLO si aún es
  /// nulo (la primera aceptación gana) y pasa el estado a WAITING.
  Accept { accepted_at: DateTime<Utc> },
  /// Inserta la fila abierta y pasa el estado a IN_PROGRESS. La
  /// implementación debe rechazar con `Conflict` si ya existe una fila
  /// abierta para el documento, sin importar la versión.
  Start { scan: ActivityScan },
  /// Estampa fin, duración y destino sobre la fila abierta (que debe seguir
  /// abierta, si no `Conflict`) y fija el estado final del documento.
  Finish { scan_id: Uuid,
           end_time: DateTime<Utc>,
           duration_seconds: i64,
           next_activity_id: Option<Uuid>,
           new_status: DocumentStatus },
}

/// Resultado de aplicar una transición con bloqueo optimista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistResult {
  Ok { new_version: i64 },
  Conflict,
}

/// Actividad actualmente abierta, con la metadata de plantilla ya unida
/// para que el cliente pueda renderizar el punto de decisión sin otra
/// consulta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentActivity {
  pub scan_id: Uuid,
  pub activity_id: Option<Uuid>,
  pub name: String,
  pub is_decision: bool,
  pub decision_accept_label: Option<String>,
  pub decision_reject_label: Option<String>,
  pub started_at: DateTime<Utc>,
}

/// Estado derivado de un documento: la verdad reconstruida desde el
/// historial de escaneos más la plantilla, no la proyección gruesa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedState {
  pub status: DocumentStatus,
  pub current: Option<CurrentActivity>,
  pub next: Option<ProcessActivity>,
  /// Hueco desde el ancla (fin de la última actividad, o recepción, o alta)
  /// hasta ahora, repartido por el calendario. Cero cuando hay actividad en
  /// curso o el proceso terminó.
  pub waiting_now: i64,
  pub resting_now: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AcceptOutcome {
  pub status: DocumentStatus,
  pub accepted_at: DateTime<Utc>,
  /// false cuando la llamada fue un reintento idempotente sobre WAITING.
  pub newly_accepted: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StartOutcome {
  pub scan_id: Uuid,
  pub start_time: DateTime<Utc>,
  pub waiting_seconds: i64,
  pub resting_seconds: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FinishOutcome {
  pub scan_id: Uuid,
  pub end_time: DateTime<Utc>,
  pub duration_seconds: i64,
  pub done: bool,
  pub next_activity_id: Option<Uuid>,
}

/// Identificador para finalizar: o la fila de escaneo exacta, o el
/// documento (conveniencia que resuelve su única fila abierta). Un enum en
/// lugar de un id sobrecargado: nunca hay que adivinar qué significa.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FinishTarget {
  Scan(Uuid),
  Document(Uuid),
}

/// Filtro del listado administrativo de documentos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFilter {
  pub status: Option<DocumentStatus>,
  /// Subcadena buscada en id, tipo de documento o región.
  pub query: Option<String>,
  pub limit: i64,
  pub offset: i64,
}

impl Default for DocumentFilter {
  fn default() -> Self {
    Self { status: None, query: None, limit: 20, offset: 0 }
  }
}

/// Detalle de un documento para reportes: historial completo y totales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
  pub document: Document,
  pub process_name: String,
  pub scans: Vec<ActivityScan>,
  /// Alta del documento → fin de la última actividad finalizada.
  pub overall_seconds: Option<i64>,
  pub total_execution_seconds: i64,
  pub total_waiting_seconds: i64,
  pub total_resting_seconds: i64,
}

/// Fila del listado administrativo con totales por documento.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListItem {
  pub document: Document,
  pub process_name: String,
  pub current_activity: Option<String>,
  pub next_activity: Option<String>,
  pub total_execution_seconds: i64,
  pub total_waiting_seconds: i64,
  pub total_resting_seconds: i64,
}
