// [apps/control-plane/src/handlers/hls.rs]
/*!
 * =================================================================
 * APARATO: HLS DELIVERY GATEKEEPER (V20.0 - PATH FORTRESS)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: ENTREGA ESTÁTICA BLINDADA DE PLAYLISTS Y SEGMENTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORDERED DEFENSE: gramática de ruta -> confinamiento de filesystem
 *    -> igualdad de tenant (401, jamás 403) -> RBAC camera.view ->
 *    token/cookie -> entrega con Range.
 * 2. TOKEN TO COOKIE: El playlist valida el token HMAC de la query y
 *    acuña la cookie de sesión; los segmentos SOLO aceptan la cookie.
 * 3. meta.json NEVER: El manifiesto interno del plano de medios jamás
 *    se sirve.
 * =================================================================
 */

use std::collections::HashMap;
use std::path::{Component, Path as FsPath, PathBuf};

use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use panoptes_core_crypto::hls_token::HlsDeliveryToken;
use panoptes_domain_models::rbac::permissions;

/// Clases de archivo entregables por el gatekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsFileClass {
    Playlist,
    InitSegment,
    MediaSegment,
}

/// Token de ruta permitido: [A-Za-z0-9_-], no vacío.
pub fn is_safe_path_token(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/**
 * Gramática estricta del nombre de archivo:
 * index.m3u8 | init.mp4 | segment_<dígitos>.m4s. Todo lo demás (incluido
 * meta.json) se rechaza.
 */
pub fn classify_file_segment(file_name: &str) -> Option<HlsFileClass> {
    match file_name {
        "index.m3u8" => Some(HlsFileClass::Playlist),
        "init.mp4" => Some(HlsFileClass::InitSegment),
        _ => {
            let digits = file_name.strip_prefix("segment_")?.strip_suffix(".m4s")?;
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                Some(HlsFileClass::MediaSegment)
            } else {
                None
            }
        }
    }
}

/**
 * Confinamiento de filesystem: el camino resuelto se compone SOLO de
 * componentes normales (sin raíces, prefijos UNC ni '..') y permanece
 * bajo la raíz configurada por construcción.
 */
pub fn confine_to_root(
    hls_root: &FsPath,
    tenant_segment: &str,
    camera_segment: &str,
    session_segment: &str,
    file_segment: &str,
) -> Option<PathBuf> {
    let relative: PathBuf = ["live", tenant_segment, camera_segment, session_segment, file_segment]
        .iter()
        .collect();

    // Los segmentos validados por charset no pueden producir otra cosa,
    // pero el confinamiento se verifica igual: defensa por capas.
    let only_normal_components = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !only_normal_components {
        return None;
    }

    let resolved = hls_root.join(&relative);
    if !resolved.starts_with(hls_root) {
        return None;
    }
    Some(resolved)
}

/// Rango único satisfacible: (inicio, fin inclusivo).
pub fn parse_single_range(range_header: &str, file_length: u64) -> Result<Option<(u64, u64)>, ApiError> {
    let Some(range_specifier) = range_header.strip_prefix("bytes=") else {
        // Unidad desconocida: se ignora el header y se sirve completo.
        return Ok(None);
    };

    if range_specifier.contains(',') {
        return Err(ApiError::RangeNotSatisfiable);
    }

    let (start_fragment, end_fragment) = range_specifier
        .split_once('-')
        .ok_or(ApiError::RangeNotSatisfiable)?;

    if file_length == 0 {
        return Err(ApiError::RangeNotSatisfiable);
    }

    // Forma sufijo: "bytes=-N" (últimos N bytes).
    if start_fragment.is_empty() {
        let suffix_length: u64 = end_fragment.parse().map_err(|_| ApiError::RangeNotSatisfiable)?;
        if suffix_length == 0 {
            return Err(ApiError::RangeNotSatisfiable);
        }
        let start = file_length.saturating_sub(suffix_length);
        return Ok(Some((start, file_length - 1)));
    }

    let start: u64 = start_fragment.parse().map_err(|_| ApiError::RangeNotSatisfiable)?;
    if start >= file_length {
        return Err(ApiError::RangeNotSatisfiable);
    }

    let end = if end_fragment.is_empty() {
        file_length - 1
    } else {
        let requested_end: u64 = end_fragment.parse().map_err(|_| ApiError::RangeNotSatisfiable)?;
        if requested_end < start {
            return Err(ApiError::RangeNotSatisfiable);
        }
        requested_end.min(file_length - 1)
    };

    Ok(Some((start, end)))
}

fn content_type_for(file_class: HlsFileClass) -> &'static str {
    match file_class {
        HlsFileClass::Playlist => "application/vnd.apple.mpegurl",
        HlsFileClass::InitSegment => "video/mp4",
        HlsFileClass::MediaSegment => "video/iso.segment",
    }
}

fn session_cookie_name(session_segment: &str) -> String {
    format!("hls_token_{}", session_segment)
}

/**
 * Endpoint: GET /hls/live/{tenant}/{camera}/{session}/{file}
 */
#[instrument(skip_all, fields(file = %file_segment))]
pub async fn handle_hls_delivery(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path((tenant_segment, camera_segment, session_segment, file_segment)): Path<(String, String, String, String)>,
    Query(raw_query): Query<HashMap<String, String>>,
    jar: CookieJar,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    // --- PASO 1: GRAMÁTICA DE RUTA ---
    if !is_safe_path_token(&tenant_segment)
        || !is_safe_path_token(&camera_segment)
        || !is_safe_path_token(&session_segment)
    {
        return Err(ApiError::HlsBadPath);
    }
    let file_class = classify_file_segment(&file_segment).ok_or(ApiError::HlsBadPath)?;

    // --- PASO 2: CONFINAMIENTO DE FILESYSTEM ---
    let resolved_path = confine_to_root(
        &state.config.hls_root,
        &tenant_segment,
        &camera_segment,
        &session_segment,
        &file_segment,
    ).ok_or(ApiError::HlsBadPath)?;

    // --- PASO 3: IGUALDAD DE TENANT (401, jamás 403: no delatar existencia) ---
    let principal_tenant = state.tenant_repository
        .find_by_id(&context.tenant_id)
        .await?
        .ok_or(ApiError::AuthFailed)?;
    if principal_tenant.slug != tenant_segment {
        warn!("🚧 [HLS_FENCE]: Principal of [{}] probed tenant path [{}].",
            principal_tenant.slug, tenant_segment);
        return Err(ApiError::AuthFailed);
    }

    // --- PASO 4: RBAC camera.view (cámara ajena => 404 por resolución) ---
    let camera_identifier = Uuid::parse_str(&camera_segment).map_err(|_| ApiError::NotFound)?;
    state.authorize_camera_permission(&context, permissions::CAMERA_VIEW, &camera_identifier).await?;

    // --- PASO 5: TOKEN (playlist) O COOKIE (segmentos) ---
    let mut minted_session_cookie: Option<HeaderValue> = None;

    match file_class {
        HlsFileClass::Playlist => {
            let presented_token = HlsDeliveryToken {
                sub: raw_query.get("sub").cloned().ok_or(ApiError::HlsTokenInvalid)?,
                sid: raw_query.get("sid").cloned().ok_or(ApiError::HlsTokenInvalid)?,
                exp: raw_query.get("exp")
                    .and_then(|exp| exp.parse().ok())
                    .ok_or(ApiError::HlsTokenInvalid)?,
                scope: raw_query.get("scope").cloned().ok_or(ApiError::HlsTokenInvalid)?,
                kid: raw_query.get("kid").cloned().ok_or(ApiError::HlsTokenInvalid)?,
                sig: raw_query.get("sig").cloned().ok_or(ApiError::HlsTokenInvalid)?,
            };

            state.hls_token_forge.verify(&presented_token, Utc::now())?;

            // El token debe hablar de ESTA cámara y ESTA sesión.
            if presented_token.sub != camera_segment || presented_token.sid != session_segment {
                return Err(ApiError::HlsTokenInvalid);
            }

            let cookie_lifetime = (presented_token.exp - Utc::now().timestamp()).max(1);
            let cookie_value = format!(
                "{}={}; Path=/hls/live/{}/{}/{}/; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
                session_cookie_name(&session_segment),
                presented_token.to_opaque_cookie_value(),
                tenant_segment, camera_segment, session_segment,
                cookie_lifetime
            );
            minted_session_cookie = Some(
                HeaderValue::from_str(&cookie_value)
                    .map_err(|render_fault| ApiError::Internal(render_fault.to_string()))?,
            );
        }
        HlsFileClass::InitSegment | HlsFileClass::MediaSegment => {
            // Los segmentos jamás aceptan token por query: cookie o nada.
            let session_cookie = jar.get(&session_cookie_name(&session_segment))
                .ok_or(ApiError::HlsTokenInvalid)?;
            let rehydrated_token = HlsDeliveryToken::from_opaque_cookie_value(session_cookie.value())
                .ok_or(ApiError::HlsTokenInvalid)?;

            state.hls_token_forge.verify(&rehydrated_token, Utc::now())?;

            if rehydrated_token.sub != camera_segment || rehydrated_token.sid != session_segment {
                return Err(ApiError::HlsTokenInvalid);
            }
        }
    }

    // --- PASO 6: ENTREGA ESTÁTICA CON RANGE ---
    let file_metadata = tokio::fs::metadata(&resolved_path).await.map_err(|_| ApiError::NotFound)?;
    if !file_metadata.is_file() {
        return Err(ApiError::NotFound);
    }
    let file_length = file_metadata.len();

    let requested_range = request_headers
        .get(header::RANGE)
        .and_then(|range_value| range_value.to_str().ok())
        .map(|range_text| parse_single_range(range_text, file_length))
        .transpose()?
        .flatten();

    let file_body = tokio::fs::read(&resolved_path).await.map_err(|_| ApiError::NotFound)?;

    let (response_status, served_bytes, content_range_header) = match requested_range {
        Some((range_start, range_end)) => {
            let sliced = file_body[range_start as usize..=(range_end as usize)].to_vec();
            (
                StatusCode::PARTIAL_CONTENT,
                sliced,
                Some(format!("bytes {}-{}/{}", range_start, range_end, file_length)),
            )
        }
        None => (StatusCode::OK, file_body, None),
    };

    debug!("📦 [HLS_DELIVERY]: Served {} byte(s) of [{}].", served_bytes.len(), file_segment);

    let mut response = (response_status, served_bytes).into_response();
    let response_headers = response.headers_mut();

    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(file_class)),
    );
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(match file_class {
            HlsFileClass::Playlist => "no-store",
            _ => "public, max-age=60, immutable",
        }),
    );
    if let Some(content_range) = content_range_header {
        response_headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&content_range)
                .map_err(|render_fault| ApiError::Internal(render_fault.to_string()))?,
        );
    }
    if let Some(session_cookie) = minted_session_cookie {
        response_headers.append(header::SET_COOKIE, session_cookie);
    }

    Ok(response)
}
