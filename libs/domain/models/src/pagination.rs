// [libs/domain/models/src/pagination.rs]
/*!
 * =================================================================
 * APARATO: CURSOR PAGINATION CODEC (V3.0 - OPAQUE TOKEN)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: CODIFICACIÓN OPACA DE CURSORES DE LISTADO
 *
 * # Mathematical Proof (Stable Ordering):
 * El cursor captura (created_at, id) de la última fila servida. Como el
 * par es único y el ORDER BY lo respeta, la paginación es estable ante
 * inserciones concurrentes: ninguna fila se sirve dos veces ni se salta.
 * =================================================================
 */

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Techo duro de filas por página.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Parámetros crudos de listado tal como llegan en la query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl PageRequest {
    /// Tamaño efectivo, acotado a [1, MAX_PAGE_SIZE].
    pub fn effective_size(&self) -> u32 {
        self.page_size.unwrap_or(50).clamp(1, MAX_PAGE_SIZE)
    }
}

/// Cursor decodificado: la última fila ya servida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Codifica el cursor como token opaco URL-safe.
pub fn encode_page_token(created_at: &DateTime<Utc>, id: &Uuid) -> String {
    BASE64_URL.encode(format!("{}|{}", created_at.to_rfc3339(), id))
}

/// Decodifica un token opaco. Un token corrupto retorna None y el
/// llamador lo renderiza como 400 VALIDATION.
pub fn decode_page_token(opaque_token: &str) -> Option<PageCursor> {
    let decoded_bytes = BASE64_URL.decode(opaque_token).ok()?;
    let decoded_text = String::from_utf8(decoded_bytes).ok()?;
    let (timestamp_part, id_part) = decoded_text.split_once('|')?;

    Some(PageCursor {
        created_at: DateTime::parse_from_rfc3339(timestamp_part).ok()?.with_timezone(&Utc),
        id: Uuid::parse_str(id_part).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_cursor_round_trip() {
        let created_at = Utc::now();
        let id = Uuid::new_v4();

        let token = encode_page_token(&created_at, &id);
        let cursor = decode_page_token(&token).expect("El cursor debe rehidratar");

        assert_eq!(cursor.id, id);
        assert_eq!(cursor.created_at.timestamp(), created_at.timestamp());
    }

    #[test]
    fn certify_corrupt_token_rejection() {
        assert!(decode_page_token("not-base64!!!").is_none());
        assert!(decode_page_token(&BASE64_URL.encode("sin-separador")).is_none());
        assert!(decode_page_token(&BASE64_URL.encode("2020-01-01T00:00:00Z|not-a-uuid")).is_none());
    }

    #[test]
    fn certify_page_size_clamp() {
        assert_eq!(PageRequest { page_size: Some(500), page_token: None }.effective_size(), 100);
        assert_eq!(PageRequest { page_size: Some(0), page_token: None }.effective_size(), 1);
        assert_eq!(PageRequest::default().effective_size(), 50);
    }
}
