// admin.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};

/// Operador administrativo. Es solo una búsqueda por id para estampar
/// oficina y región en los documentos que registra; no constituye una
/// frontera de seguridad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
  pub admin_id: String,
  pub name: String,
  pub office_type: String,
  pub region: String,
}

impl Admin {
  pub fn new(admin_id: &str, name: &str, office_type: &str, region: &str) -> Result<Self, DomainError> {
    if admin_id.trim().is_empty() {
      return Err(DomainError::ValidationError("El id de administrador no puede estar vacío".to_string()));
    }
    Ok(Self { admin_id: admin_id.trim().to_string(),
              name: name.to_string(),
              office_type: office_type.to_string(),
              region: region.to_string() })
  }
}
