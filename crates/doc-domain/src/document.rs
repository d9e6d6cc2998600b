// document.rs
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Estado grueso de un documento. Es una proyección desnormalizada del
/// historial de escaneos, mantenida consistente por cada transición del
/// motor para poder listar documentos sin reconstruir su historial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
  /// Registrado por un administrador, aún no recibido físicamente.
  Open,
  /// Recibido o entre actividades, a la espera de la siguiente.
  Waiting,
  /// Hay una actividad abierta en este momento.
  InProgress,
  /// Plantilla agotada; estado terminal.
  Done,
}

impl DocumentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      DocumentStatus::Open => "OPEN",
      DocumentStatus::Waiting => "WAITING",
      DocumentStatus::InProgress => "IN_PROGRESS",
      DocumentStatus::Done => "DONE",
    }
  }

  pub fn parse(s: &str) -> Result<Self, DomainError> {
    match s {
      "OPEN" => Ok(DocumentStatus::Open),
      "WAITING" => Ok(DocumentStatus::Waiting),
      "IN_PROGRESS" => Ok(DocumentStatus::InProgress),
      "DONE" => Ok(DocumentStatus::Done),
      other => Err(DomainError::ValidationError(format!("Estado de documento desconocido: {}", other))),
    }
  }
}

impl fmt::Display for DocumentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Un documento físico siguiendo un proceso. `version` es el contador de
/// bloqueo optimista: cada transición confirmada lo incrementa en uno.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub id: Uuid,
  pub process_id: Uuid,
  pub doc_type: String,
  pub office_type: String,
  pub region: String,
  pub status: DocumentStatus,
  /// Momento de la recepción formal; la primera aceptación gana y no se
  /// vuelve a escribir.
  pub accepted_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub version: i64,
}

impl Document {
  pub fn new(process_id: Uuid, doc_type: &str, office_type: &str, region: &str) -> Self {
    Self { id: Uuid::new_v4(),
           process_id,
           doc_type: doc_type.to_string(),
           office_type: office_type.to_string(),
           region: region.to_string(),
           status: DocumentStatus::Open,
           accepted_at: None,
           created_at: Utc::now(),
           version: 0 }
  }

  /// Ancla temporal para el cómputo del hueco previo a la primera actividad:
  /// la recepción formal si existe, si no el alta del documento.
  pub fn gap_anchor(&self) -> DateTime<Utc> {
    self.accepted_at.unwrap_or(self.created_at)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_roundtrips_through_wire_strings() {
    for st in [DocumentStatus::Open, DocumentStatus::Waiting, DocumentStatus::InProgress, DocumentStatus::Done] {
      assert_eq!(DocumentStatus::parse(st.as_str()).unwrap(), st);
    }
    assert!(DocumentStatus::parse("CLOSED").is_err());
  }

  #[test]
  fn gap_anchor_prefers_accepted_at() {
    let mut doc = Document::new(Uuid::new_v4(), "Expediente", "Central", "Capital");
    assert_eq!(doc.gap_anchor(), doc.created_at);
    let accepted = doc.created_at + chrono::Duration::hours(2);
    doc.accepted_at = Some(accepted);
    assert_eq!(doc.gap_anchor(), accepted);
  }
}
