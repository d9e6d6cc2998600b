// process.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Plantilla de proceso con nombre y código únicos. Una vez en uso es
/// inmutable: sus actividades solo se consultan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
  id: Uuid,
  code: String,
  name: String,
}

impl Process {
  pub fn new(code: &str, name: &str) -> Result<Self, DomainError> {
    Self::from_parts(Uuid::new_v4(), code, name)
  }

  /// Reconstruye un proceso ya persistido conservando su id.
  pub fn from_parts(id: Uuid, code: &str, name: &str) -> Result<Self, DomainError> {
    if code.trim().is_empty() {
      return Err(DomainError::ValidationError("El código del proceso no puede estar vacío".to_string()));
    }
    if name.trim().is_empty() {
      return Err(DomainError::ValidationError("El nombre del proceso no puede estar vacío".to_string()));
    }
    Ok(Self { id, code: code.trim().to_string(), name: name.trim().to_string() })
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for Process {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.code)
  }
}

/// Una actividad de la plantilla de un proceso. `order_no` define la
/// secuencia por defecto; una actividad de decisión puede además declarar
/// destinos explícitos para cada rama (incluida ella misma, para bucles de
/// reproceso).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessActivity {
  pub id: Uuid,
  pub process_id: Uuid,
  pub name: String,
  pub order_no: i32,
  pub is_mandatory: bool,
  pub is_decision: bool,
  pub decision_accept_label: Option<String>,
  pub decision_reject_label: Option<String>,
  pub next_on_accept: Option<Uuid>,
  pub next_on_reject: Option<Uuid>,
}

impl ProcessActivity {
  /// Actividad secuencial simple (sin decisión).
  pub fn step(process_id: Uuid, name: &str, order_no: i32) -> Self {
    Self { id: Uuid::new_v4(),
           process_id,
           name: name.to_string(),
           order_no,
           is_mandatory: true,
           is_decision: false,
           decision_accept_label: None,
           decision_reject_label: None,
           next_on_accept: None,
           next_on_reject: None }
  }

  /// Marca la actividad como punto de decisión con sus etiquetas visibles.
  pub fn as_decision(mut self, accept_label: &str, reject_label: &str) -> Self {
    self.is_decision = true;
    self.decision_accept_label = Some(accept_label.to_string());
    self.decision_reject_label = Some(reject_label.to_string());
    self
  }

  pub fn with_branches(mut self, next_on_accept: Option<Uuid>, next_on_reject: Option<Uuid>) -> Self {
    self.next_on_accept = next_on_accept;
    self.next_on_reject = next_on_reject;
    self
  }
}
