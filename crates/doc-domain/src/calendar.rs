// calendar.rs
// Calendario de horas hábiles: reparte un intervalo en segundos "en espera"
// (dentro del horario laboral) y segundos "en reposo" (el resto).
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DAY_SECONDS: i64 = 24 * 3600;

/// Resultado de repartir un intervalo entre horas hábiles y no hábiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapSplit {
  pub waiting_seconds: i64,
  pub resting_seconds: i64,
}

/// Calendario civil de oficina con desplazamiento fijo respecto a UTC
/// (sin horario de verano). Las horas hábiles corren de `work_start_hour`
/// a `work_end_hour` en hora local, de lunes a viernes.
///
/// El cómputo es puro y exacto al segundo: no hace I/O y es determinista,
/// por lo que se puede probar de forma aislada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCalendar {
  utc_offset_seconds: i64,
  work_start_hour: i64,
  work_end_hour: i64,
}

impl Default for BusinessCalendar {
  /// Calendario de la operación: UTC+7, horario 08:00–17:00, lunes a viernes.
  fn default() -> Self {
    Self { utc_offset_seconds: 7 * 3600, work_start_hour: 8, work_end_hour: 17 }
  }
}

impl BusinessCalendar {
  pub fn new(utc_offset_seconds: i64, work_start_hour: i64, work_end_hour: i64) -> Result<Self, DomainError> {
    if utc_offset_seconds.abs() >= DAY_SECONDS {
      return Err(DomainError::ValidationError("El desplazamiento UTC debe ser menor a un día".to_string()));
    }
    if !(0..=24).contains(&work_start_hour) || !(0..=24).contains(&work_end_hour) {
      return Err(DomainError::ValidationError("Las horas hábiles deben estar entre 0 y 24".to_string()));
    }
    if work_start_hour >= work_end_hour {
      return Err(DomainError::ValidationError("La hora de inicio debe ser anterior a la de cierre".to_string()));
    }
    Ok(Self { utc_offset_seconds, work_start_hour, work_end_hour })
  }

  /// Reparte el intervalo `[start, end)` en segundos de espera y de reposo.
  ///
  /// - Espera: solo el solape con `[work_start, work_end)` de cada día hábil.
  /// - Reposo: el resto del intervalo (noches, fines de semana completos).
  /// - Si `end <= start` ambos acumuladores son cero.
  ///
  /// Algoritmo: se desplazan ambos instantes en `utc_offset_seconds` para que
  /// las medianoches locales coincidan con múltiplos de 86400 del epoch, y se
  /// itera sobre los días locales cubiertos por el intervalo acumulando el
  /// solape con la ventana hábil de cada día.
  pub fn split(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> GapSplit {
    let ls = start.timestamp() + self.utc_offset_seconds;
    let le = end.timestamp() + self.utc_offset_seconds;
    if le <= ls {
      return GapSplit::default();
    }

    // Medianoche local del primer y del último día tocados por el intervalo.
    let start_day = ls.div_euclid(DAY_SECONDS) * DAY_SECONDS;
    let end_day = (le - 1).div_euclid(DAY_SECONDS) * DAY_SECONDS;

    let mut waiting = 0i64;
    let mut day = start_day;
    while day <= end_day {
      if Self::is_business_day(day) {
        let work_start = day + self.work_start_hour * 3600;
        let work_end = day + self.work_end_hour * 3600;

        // Solape [ls, le) ∩ [work_start, work_end)
        let s = ls.max(work_start);
        let e = le.min(work_end);
        if e > s {
          waiting += e - s;
        }
      }
      day += DAY_SECONDS;
    }

    let total = le - ls;
    GapSplit { waiting_seconds: waiting, resting_seconds: total - waiting }
  }

  // El día 0 del epoch (1970-01-01) fue jueves; 0=domingo .. 6=sábado.
  fn is_business_day(day_local_midnight: i64) -> bool {
    let dow = (day_local_midnight.div_euclid(DAY_SECONDS) + 4).rem_euclid(7);
    (1..=5).contains(&dow)
  }
}
