// scan.rs
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resultado de un punto de decisión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
  Accept,
  Reject,
}

impl Decision {
  pub fn as_str(&self) -> &'static str {
    match self {
      Decision::Accept => "accept",
      Decision::Reject => "reject",
    }
  }

  pub fn parse(s: &str) -> Result<Self, DomainError> {
    match s {
      "accept" => Ok(Decision::Accept),
      "reject" => Ok(Decision::Reject),
      other => Err(DomainError::ValidationError(format!("Decisión desconocida: {}", other))),
    }
  }
}

/// Una ejecución (escaneo) de una actividad para un documento concreto.
///
/// Se crea abierta (`end_time == None`) al iniciar la actividad y se muta
/// exactamente una vez, al finalizarla; después es inmutable. Invariante
/// central del sistema: a lo sumo una fila abierta por documento en todo
/// momento.
///
/// `waiting_seconds`/`resting_seconds` describen el hueco ANTERIOR al inicio
/// de esta actividad, repartido por el calendario de horas hábiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityScan {
  pub id: Uuid,
  pub document_id: Uuid,
  /// `None` para actividades ad hoc sin entrada en la plantilla.
  pub process_activity_id: Option<Uuid>,
  /// Nombre al momento del escaneo; la plantilla podría renombrarse después.
  pub activity_name: String,
  pub start_time: DateTime<Utc>,
  pub end_time: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i64>,
  pub waiting_seconds: i64,
  pub resting_seconds: i64,
  /// Destino registrado al finalizar un punto de decisión.
  pub next_activity_id: Option<Uuid>,
}

impl ActivityScan {
  /// Crea la fila abierta de una actividad que comienza ahora.
  pub fn open(document_id: Uuid,
              process_activity_id: Option<Uuid>,
              activity_name: &str,
              start_time: DateTime<Utc>,
              waiting_seconds: i64,
              resting_seconds: i64)
              -> Self {
    Self { id: Uuid::new_v4(),
           document_id,
           process_activity_id,
           activity_name: activity_name.to_string(),
           start_time,
           end_time: None,
           duration_seconds: None,
           waiting_seconds,
           resting_seconds,
           next_activity_id: None }
  }

  pub fn is_open(&self) -> bool {
    self.end_time.is_none()
  }
}
