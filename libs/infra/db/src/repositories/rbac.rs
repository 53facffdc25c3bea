// [libs/infra/db/src/repositories/rbac.rs]
/*!
 * =================================================================
 * APARATO: RBAC REPOSITORY (V10.0 - SCOPE LATTICE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LIGADURAS ROL-OPERADOR Y RESOLUCIÓN DE PERMISOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE JOIN RESOLUTION: La lente de permisos se materializa en una
 *    sola ráfaga SQL (user_roles ⋈ role_permissions), lista para el
 *    modelo de cobertura del dominio.
 * 2. TENANT FENCING: Solo roles integrados (tenant_id NULL) o del propio
 *    tenant participan en la resolución.
 * =================================================================
 */

use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_optional_uuid, nullable_text};
use crate::SovereignDbClient;
use panoptes_domain_models::rbac::{Grant, ScopeType};

pub struct RbacRepository {
    database_client: SovereignDbClient,
}

impl RbacRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Resuelve las ligaduras efectivas de un operador como tuplas
     * (permiso, alcance, scope_id) para hidratar la lente de cobertura.
     */
    #[instrument(skip(self))]
    pub async fn resolved_bindings(
        &self,
        tenant_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Vec<(String, ScopeType, Option<Uuid>)>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT rp.permission_name, ur.scope_type, ur.scope_id
             FROM user_roles ur
             JOIN roles r ON r.id = ur.role_id
             JOIN role_permissions rp ON rp.role_id = ur.role_id
             WHERE ur.user_id = ?1 AND (r.tenant_id IS NULL OR r.tenant_id = ?2)",
            params![user_id.to_string(), tenant_id.to_string()],
        ).await?;

        let mut resolved_bindings = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let permission_name: String = data_row.get(0)?;
            let scope_label: String = data_row.get(1)?;

            let Some(scope_type) = ScopeType::from_label(&scope_label) else {
                // Ligadura corrupta: se ignora en lugar de contaminar la lente.
                continue;
            };

            resolved_bindings.push((
                permission_name,
                scope_type,
                extract_optional_uuid(&data_row, 2),
            ));
        }
        Ok(resolved_bindings)
    }

    /// Ligaduras crudas del operador, para el dashboard de gobernanza.
    pub async fn list_user_grants(&self, user_id: &Uuid) -> Result<Vec<Grant>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT role_id, scope_type, scope_id FROM user_roles WHERE user_id = ?1",
            params![user_id.to_string()],
        ).await?;

        let mut grants_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let role_identifier: String = data_row.get(0)?;
            let scope_label: String = data_row.get(1)?;

            let (Ok(role_id), Some(scope_type)) =
                (Uuid::parse_str(&role_identifier), ScopeType::from_label(&scope_label))
            else {
                continue;
            };

            grants_collection.push(Grant {
                role_id,
                scope_type,
                scope_id: extract_optional_uuid(&data_row, 2),
            });
        }
        Ok(grants_collection)
    }

    /// Nombres de permiso que otorga un rol concreto (guardia anti-escalación).
    pub async fn role_permission_names(&self, role_id: &Uuid) -> Result<Vec<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT permission_name FROM role_permissions WHERE role_id = ?1",
            params![role_id.to_string()],
        ).await?;

        let mut permission_names = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            permission_names.push(data_row.get(0)?);
        }
        Ok(permission_names)
    }

    /// El rol debe ser integrado o pertenecer al tenant del llamador.
    pub async fn role_exists_for_tenant(&self, role_id: &Uuid, tenant_id: &Uuid) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT count(*) FROM roles WHERE id = ?1 AND (tenant_id IS NULL OR tenant_id = ?2)",
            params![role_id.to_string(), tenant_id.to_string()],
        ).await?;

        let count: i64 = match query_results.next().await? {
            Some(data_row) => data_row.get(0)?,
            None => 0,
        };
        Ok(count > 0)
    }

    /**
     * Reemplaza el conjunto completo de ligaduras de un operador en una
     * secuencia transaccional (borrar + reinsertar).
     */
    #[instrument(skip(self, grants))]
    pub async fn replace_user_grants(
        &self,
        user_id: &Uuid,
        grants: &[Grant],
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute("BEGIN IMMEDIATE", ()).await
            .map_err(|fault| DbError::TransactionCollapse(fault.to_string()))?;

        let transactional_outcome = async {
            database_connection.execute(
                "DELETE FROM user_roles WHERE user_id = ?1",
                params![user_id.to_string()],
            ).await?;

            for grant in grants {
                database_connection.execute(
                    "INSERT OR IGNORE INTO user_roles (user_id, role_id, scope_type, scope_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        user_id.to_string(),
                        grant.role_id.to_string(),
                        grant.scope_type.as_label(),
                        nullable_text(grant.scope_id.map(|scope| scope.to_string()))
                    ],
                ).await?;
            }
            Ok::<(), libsql::Error>(())
        }.await;

        match transactional_outcome {
            Ok(()) => {
                database_connection.execute("COMMIT", ()).await
                    .map_err(|fault| DbError::TransactionCollapse(fault.to_string()))?;
                info!("🛡️ [RBAC]: {} grant(s) sealed for operator [{}].", grants.len(), user_id);
                Ok(())
            }
            Err(execution_fault) => {
                let _ = database_connection.execute("ROLLBACK", ()).await;
                Err(DbError::from_execution_fault(execution_fault))
            }
        }
    }
}
