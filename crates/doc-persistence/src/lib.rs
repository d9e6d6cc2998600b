//! Implementación Diesel del contrato `TrackRepository`.
//! Este crate expone el módulo `schema` y el repositorio `DieselTrackRepository`,
//! que corre sobre SQLite (pruebas y uso local) o Postgres (feature `pg`),
//! con migraciones embebidas y pool r2d2. La implementación detallada está
//! en `track_persistence.rs`.

mod track_persistence;
pub mod schema;

#[cfg(not(feature = "pg"))]
pub use track_persistence::new_sqlite_for_test;
pub use track_persistence::{new_from_env, DieselTrackRepository};
