// template.rs
// Agregado Proceso + actividades ordenadas, con validación de integridad.
use crate::{DomainError, Process, ProcessActivity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Plantilla completa de un proceso: el proceso más sus actividades,
/// ordenadas por `order_no`.
///
/// El constructor valida la integridad estructural de la plantilla; un
/// defecto aquí es un problema de configuración, no del documento que la
/// recorre. El grafo de ramas NO se asume acíclico: una decisión puede
/// apuntar a sí misma (bucle de reproceso) o a una actividad anterior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTemplate {
  process: Process,
  activities: Vec<ProcessActivity>,
}

impl ProcessTemplate {
  pub fn new<I>(process: Process, activities: I) -> Result<Self, DomainError>
    where I: IntoIterator<Item = ProcessActivity>
  {
    let mut activities: Vec<ProcessActivity> = activities.into_iter().collect();
    if activities.is_empty() {
      return Err(DomainError::ValidationError(format!("El proceso {} no tiene actividades", process.code())));
    }

    let ids: HashSet<Uuid> = activities.iter().map(|a| a.id).collect();
    if ids.len() != activities.len() {
      return Err(DomainError::ValidationError("Actividades con id duplicado en la plantilla".to_string()));
    }

    let mut orders = HashSet::new();
    for act in &activities {
      if act.process_id != process.id() {
        return Err(DomainError::ValidationError(format!("La actividad '{}' no pertenece al proceso {}",
                                                        act.name,
                                                        process.code())));
      }
      if act.name.trim().is_empty() {
        return Err(DomainError::ValidationError("El nombre de la actividad no puede estar vacío".to_string()));
      }
      if !orders.insert(act.order_no) {
        return Err(DomainError::ValidationError(format!("order_no {} duplicado en el proceso {}",
                                                        act.order_no,
                                                        process.code())));
      }
      for next in [act.next_on_accept, act.next_on_reject].into_iter().flatten() {
        if !ids.contains(&next) {
          return Err(DomainError::ValidationError(format!("La rama de '{}' apunta a una actividad ajena al proceso",
                                                          act.name)));
        }
      }
      if !act.is_decision && (act.next_on_accept.is_some() || act.next_on_reject.is_some()) {
        return Err(DomainError::ValidationError(format!("La actividad '{}' declara ramas sin ser decisión", act.name)));
      }
    }

    activities.sort_by_key(|a| a.order_no);
    Ok(Self { process, activities })
  }

  pub fn process(&self) -> &Process {
    &self.process
  }

  /// Actividades ordenadas por `order_no` ascendente.
  pub fn activities(&self) -> &[ProcessActivity] {
    &self.activities
  }

  /// Primera actividad de la secuencia por defecto.
  pub fn first(&self) -> Option<&ProcessActivity> {
    self.activities.first()
  }

  pub fn by_id(&self, id: &Uuid) -> Option<&ProcessActivity> {
    self.activities.iter().find(|a| &a.id == id)
  }

  pub fn contains(&self, id: &Uuid) -> bool {
    self.by_id(id).is_some()
  }

  /// Actividad con el menor `order_no` estrictamente mayor al dado.
  /// `None` cuando la secuencia por defecto queda agotada.
  pub fn next_after(&self, order_no: i32) -> Option<&ProcessActivity> {
    // `activities` está ordenado, basta el primer match
    self.activities.iter().find(|a| a.order_no > order_no)
  }

  pub fn len(&self) -> usize {
    self.activities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.activities.is_empty()
  }
}
