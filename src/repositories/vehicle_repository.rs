//! Repositorio de vehículos

use crate::models::{NewVehicle, Vehicle};
use crate::utils::errors::StoreError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const VEHICLE_COLUMNS: &str = "id, registration, make, model, year, mot_expiry, customer_id, \
     last_verified_at, last_verification_attempt_at, created_at";

pub struct VehicleRepository {
    pool: PgPool,
}

impl VehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, vehicle: NewVehicle) -> Result<Vehicle, StoreError> {
        let query = format!(
            r#"
            INSERT INTO vehicles (registration, make, model, year, mot_expiry, customer_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        );

        sqlx::query_as::<_, Vehicle>(&query)
            .bind(&vehicle.registration)
            .bind(vehicle.make)
            .bind(vehicle.model)
            .bind(vehicle.year)
            .bind(vehicle.mot_expiry)
            .bind(vehicle.customer_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return StoreError::Conflict(format!(
                            "vehicle with registration '{}' already exists",
                            vehicle.registration
                        ));
                    }
                    if db.is_foreign_key_violation() {
                        return StoreError::NotFound(format!("customer {:?}", vehicle.customer_id));
                    }
                }
                StoreError::Database(e)
            })
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Vehicle>, StoreError> {
        let query = format!("SELECT {} FROM vehicles WHERE id = $1", VEHICLE_COLUMNS);
        let vehicle = sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    pub async fn list(&self) -> Result<Vec<Vehicle>, StoreError> {
        let query = format!("SELECT {} FROM vehicles ORDER BY registration", VEHICLE_COLUMNS);
        let vehicles = sqlx::query_as::<_, Vehicle>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(vehicles)
    }

    pub async fn update_mot_expiry(
        &self,
        id: i64,
        mot_expiry: Option<String>,
    ) -> Result<Vehicle, StoreError> {
        let query = format!(
            "UPDATE vehicles SET mot_expiry = $2 WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        );
        sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .bind(mot_expiry)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("vehicle {}", id)))
    }

    /// Guardar el resultado de una verificación correcta
    pub async fn record_verification(
        &self,
        id: i64,
        mot_expiry: Option<String>,
        verified_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET mot_expiry = COALESCE($2, mot_expiry),
                last_verified_at = $3,
                last_verification_attempt_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(mot_expiry)
        .bind(verified_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("vehicle {}", id)));
        }
        Ok(())
    }

    pub async fn record_attempt(&self, id: i64, attempted_at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE vehicles SET last_verification_attempt_at = $2 WHERE id = $1")
            .bind(id)
            .bind(attempted_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("vehicle {}", id)));
        }
        Ok(())
    }
}
