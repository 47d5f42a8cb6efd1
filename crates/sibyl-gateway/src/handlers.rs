// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Every `/api` handler runs behind the auth middleware and reads the
//! resolved [`Identity`] from request extensions; the actor of a lifecycle
//! operation is always the authenticated party, never a field of the body.
//! Domain errors map onto HTTP statuses through [`ApiError`].

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use sibyl_core::error::SibylError;
use sibyl_core::types::{
    AdvisorProfile, AdvisorStatus, BillingKind, ChannelKind, ChannelRates, EarningsRecord,
    EarningsSummary, FixedOffering, Money, PartyId, Session, SessionId,
};

use crate::auth::Identity;
use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Wrapper giving [`SibylError`] an HTTP rendering.
///
/// Rejections map to 4xx by failure class; infrastructure faults collapse
/// into 500 and are logged here, once, at the boundary.
#[derive(Debug)]
pub struct ApiError(pub SibylError);

impl From<SibylError> for ApiError {
    fn from(err: SibylError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SibylError::InvalidTransition { .. } | SibylError::ProviderUnavailable { .. } => {
                StatusCode::CONFLICT
            }
            SibylError::Forbidden { .. } => StatusCode::FORBIDDEN,
            SibylError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            SibylError::PricingNotOffered { .. } | SibylError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            SibylError::NotFound { .. } => StatusCode::NOT_FOUND,
            SibylError::DeliveryFailure { .. }
            | SibylError::Config(_)
            | SibylError::Storage { .. }
            | SibylError::Transport { .. }
            | SibylError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Request body for `POST /api/sessions`.
#[derive(Debug, Deserialize)]
pub struct SessionRequestBody {
    /// Advisor the caller wants a session with.
    pub advisor_id: PartyId,
    pub channel: ChannelKind,
    pub billing: BillingKind,
    /// Required for fixed-duration sessions; must match an offering.
    #[serde(default)]
    pub scheduled_minutes: Option<u32>,
}

/// Response body for `GET /api/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<Session>,
}

/// Query parameters for `GET /api/sessions`.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Maximum number of sessions to return, newest first.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Response body for `GET /api/advisors`.
#[derive(Debug, Serialize)]
pub struct AdvisorListResponse {
    pub advisors: Vec<AdvisorProfile>,
}

/// Request body for `PUT /api/advisors/me`.
///
/// The profile id is always the authenticated party; presence is managed
/// through the status route and survives a profile update.
#[derive(Debug, Deserialize)]
pub struct AdvisorProfileBody {
    pub display_name: String,
    #[serde(default)]
    pub rates: ChannelRates,
    #[serde(default)]
    pub offerings: Vec<FixedOffering>,
}

/// Request body for `PUT /api/advisors/me/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: AdvisorStatus,
}

/// Response body for balance reads and top-ups.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub party: PartyId,
    /// Balance in cents.
    pub balance: Money,
}

/// Request body for `POST /api/balance/topup`.
#[derive(Debug, Deserialize)]
pub struct TopUpBody {
    /// Amount to credit, in cents. Must be positive.
    pub amount: Money,
}

/// Response body for `GET /api/earnings`.
#[derive(Debug, Serialize)]
pub struct EarningsResponse {
    pub summary: EarningsSummary,
    pub records: Vec<EarningsRecord>,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST /api/sessions
///
/// The authenticated party requests a session with an advisor. Nothing is
/// charged yet; the advisor is notified over the bus.
pub async fn post_sessions(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<SessionRequestBody>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state
        .sessions
        .request(
            &identity.0,
            &body.advisor_id,
            body.channel,
            body.billing,
            body.scheduled_minutes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/sessions/{id}/accept
pub async fn post_session_accept(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.sessions.accept(&id, &identity.0).await?))
}

/// POST /api/sessions/{id}/reject
pub async fn post_session_reject(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.sessions.reject(&id, &identity.0).await?))
}

/// POST /api/sessions/{id}/cancel
pub async fn post_session_cancel(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.sessions.cancel(&id, &identity.0).await?))
}

/// POST /api/sessions/{id}/end
pub async fn post_session_end(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.sessions.end(&id, &identity.0).await?))
}

/// GET /api/sessions/{id}
///
/// Only the two parties of a session may read it.
pub async fn get_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await?
        .ok_or_else(|| SibylError::NotFound {
            entity: "session".to_string(),
            id: id.to_string(),
        })?;
    if !session.is_party(&identity.0) {
        return Err(ApiError(SibylError::Forbidden {
            message: format!("{} is not a party to session {id}", identity.0),
        }));
    }
    Ok(Json(session))
}

/// GET /api/sessions
///
/// Sessions the caller is involved in, newest first.
pub async fn get_sessions(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.sessions.history(&identity.0, params.limit).await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /api/advisors
pub async fn get_advisors(
    State(state): State<GatewayState>,
) -> Result<Json<AdvisorListResponse>, ApiError> {
    Ok(Json(AdvisorListResponse {
        advisors: state.directory.list().await?,
    }))
}

/// GET /api/advisors/{id}
pub async fn get_advisor(
    State(state): State<GatewayState>,
    Path(id): Path<PartyId>,
) -> Result<Json<AdvisorProfile>, ApiError> {
    let profile = state
        .directory
        .get(&id)
        .await?
        .ok_or_else(|| SibylError::NotFound {
            entity: "advisor".to_string(),
            id: id.to_string(),
        })?;
    Ok(Json(profile))
}

/// PUT /api/advisors/me
///
/// Creates or replaces the caller's advisor profile, rates and offerings
/// included. A first-time profile starts `offline`.
pub async fn put_advisor_profile(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<AdvisorProfileBody>,
) -> Result<Json<AdvisorProfile>, ApiError> {
    let status = state
        .directory
        .get(&identity.0)
        .await?
        .map(|existing| existing.status)
        .unwrap_or(AdvisorStatus::Offline);
    let profile = AdvisorProfile {
        id: identity.0.clone(),
        display_name: body.display_name,
        status,
        rates: body.rates,
        offerings: body.offerings,
        updated_at: chrono::Utc::now(),
    };
    state.directory.upsert(&profile).await?;
    Ok(Json(profile))
}

/// PUT /api/advisors/me/status
pub async fn put_advisor_status(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<StatusBody>,
) -> Result<StatusCode, ApiError> {
    state.directory.set_status(&identity.0, body.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/balance
pub async fn get_balance(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balances.balance(&identity.0).await?;
    Ok(Json(BalanceResponse {
        party: identity.0,
        balance,
    }))
}

/// POST /api/balance/topup
///
/// Credits the caller's account. Payment capture happens upstream; by the
/// time this endpoint is called the money has already moved.
pub async fn post_topup(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<TopUpBody>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balances.credit(&identity.0, body.amount).await?;
    Ok(Json(BalanceResponse {
        party: identity.0,
        balance,
    }))
}

/// GET /api/earnings
pub async fn get_earnings(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<EarningsResponse>, ApiError> {
    let summary = state.earnings.summary_for(&identity.0).await?;
    let records = state.earnings.list_for(&identity.0).await?;
    Ok(Json(EarningsResponse { summary, records }))
}

/// GET /health
///
/// Unauthenticated; used by process supervisors.
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Unauthenticated Prometheus exposition. Answers 404 when no recorder was
/// installed (e.g. in tests).
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (StatusCode::OK, render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed\n").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use sibyl_core::types::SessionStatus;
    use sibyl_test_utils::{TestHarness, standard_advisor};

    use crate::auth::{AuthState, StaticTokenResolver};
    use crate::server::HealthState;

    fn gateway_over(harness: &TestHarness) -> GatewayState {
        GatewayState {
            sessions: harness.coordinator.clone(),
            directory: harness.directory.clone(),
            balances: harness.balances.clone(),
            earnings: harness.earnings.clone(),
            rooms: harness.rooms.clone(),
            notify: harness.notify.clone(),
            auth: AuthState {
                resolver: Arc::new(StaticTokenResolver::new([])),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: None,
            },
        }
    }

    fn client() -> Identity {
        Identity(PartyId::new("client-1"))
    }

    fn advisor() -> Identity {
        Identity(PartyId::new("advisor-1"))
    }

    fn seeded_harness() -> TestHarness {
        TestHarness::builder()
            .with_balance(&client().0, 500)
            .with_advisor(standard_advisor("advisor-1"))
            .build()
    }

    fn chat_request() -> SessionRequestBody {
        SessionRequestBody {
            advisor_id: advisor().0,
            channel: ChannelKind::Chat,
            billing: BillingKind::PerMinute,
            scheduled_minutes: None,
        }
    }

    #[tokio::test]
    async fn session_request_answers_created_with_the_pending_row() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let (status, Json(session)) =
            post_sessions(State(state), Extension(client()), Json(chat_request()))
                .await
                .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session.client_id, client().0);
        assert_eq!(session.advisor_id, advisor().0);
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_advisor_maps_to_conflict() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let body = SessionRequestBody {
            advisor_id: PartyId::new("advisor-ghost"),
            ..chat_request()
        };
        let err = post_sessions(State(state), Extension(client()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unpriced_channel_maps_to_bad_request() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let body = SessionRequestBody {
            channel: ChannelKind::Phone,
            ..chat_request()
        };
        let err = post_sessions(State(state), Extension(client()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_balance_maps_to_payment_required() {
        let harness = TestHarness::builder()
            .with_advisor(standard_advisor("advisor-1"))
            .build();
        let state = gateway_over(&harness);

        let err = post_sessions(State(state), Extension(client()), Json(chat_request()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn accept_by_the_wrong_party_maps_to_forbidden() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let (_, Json(session)) = post_sessions(
            State(state.clone()),
            Extension(client()),
            Json(chat_request()),
        )
        .await
        .unwrap();

        let err = post_session_accept(
            State(state),
            Extension(client()),
            Path(session.id.clone()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn double_accept_maps_to_conflict() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let (_, Json(session)) = post_sessions(
            State(state.clone()),
            Extension(client()),
            Json(chat_request()),
        )
        .await
        .unwrap();

        post_session_accept(
            State(state.clone()),
            Extension(advisor()),
            Path(session.id.clone()),
        )
        .await
        .unwrap();
        let err = post_session_accept(State(state), Extension(advisor()), Path(session.id))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn session_reads_are_restricted_to_the_parties() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let (_, Json(session)) = post_sessions(
            State(state.clone()),
            Extension(client()),
            Json(chat_request()),
        )
        .await
        .unwrap();

        let Json(read) = get_session(
            State(state.clone()),
            Extension(advisor()),
            Path(session.id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(read.id, session.id);

        let outsider = Identity(PartyId::new("client-2"));
        let err = get_session(
            State(state.clone()),
            Extension(outsider),
            Path(session.id),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = get_session(
            State(state),
            Extension(client()),
            Path(SessionId("s-missing".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_returns_the_callers_sessions() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        post_sessions(
            State(state.clone()),
            Extension(client()),
            Json(chat_request()),
        )
        .await
        .unwrap();

        let Json(listing) = get_sessions(
            State(state.clone()),
            Extension(client()),
            Query(HistoryParams { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(listing.sessions.len(), 1);

        let Json(other) = get_sessions(
            State(state),
            Extension(Identity(PartyId::new("client-2"))),
            Query(HistoryParams { limit: None }),
        )
        .await
        .unwrap();
        assert!(other.sessions.is_empty());
    }

    #[tokio::test]
    async fn advisor_listing_and_lookup() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let Json(listing) = get_advisors(State(state.clone())).await.unwrap();
        assert_eq!(listing.advisors.len(), 1);

        let Json(profile) = get_advisor(State(state.clone()), Path(advisor().0))
            .await
            .unwrap();
        assert_eq!(profile.id, advisor().0);

        let err = get_advisor(State(state), Path(PartyId::new("advisor-ghost")))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_update_keeps_the_stored_status() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let body = AdvisorProfileBody {
            display_name: "Cassandra".to_string(),
            rates: ChannelRates {
                chat: Some(Money::from_cents(150)),
                phone: None,
                video: None,
            },
            offerings: vec![],
        };
        let Json(profile) = put_advisor_profile(
            State(state.clone()),
            Extension(advisor()),
            Json(body),
        )
        .await
        .unwrap();

        // standard_advisor seeds as available; the update must not reset it.
        assert_eq!(profile.status, AdvisorStatus::Available);
        assert_eq!(profile.display_name, "Cassandra");
        let stored = harness.directory.get(&advisor().0).await.unwrap().unwrap();
        assert_eq!(stored.rates.chat, Some(Money::from_cents(150)));
    }

    #[tokio::test]
    async fn status_change_answers_no_content_and_reaches_connections() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);
        let watcher = harness.connect(&PartyId::new("client-1"));

        let status = put_advisor_status(
            State(state),
            Extension(advisor()),
            Json(StatusBody {
                status: AdvisorStatus::Busy,
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::NO_CONTENT);
        let events = watcher.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            sibyl_core::events::SessionEvent::AdvisorStatusChanged { advisor_id, status } => {
                assert_eq!(advisor_id, &advisor().0);
                assert_eq!(*status, AdvisorStatus::Busy);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn balance_read_and_topup_round_trip() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let Json(before) = get_balance(State(state.clone()), Extension(client()))
            .await
            .unwrap();
        assert_eq!(before.balance, Money::from_cents(500));

        let Json(after) = post_topup(
            State(state.clone()),
            Extension(client()),
            Json(TopUpBody {
                amount: Money::from_cents(250),
            }),
        )
        .await
        .unwrap();
        assert_eq!(after.balance, Money::from_cents(750));

        let err = post_topup(
            State(state),
            Extension(client()),
            Json(TopUpBody {
                amount: Money::ZERO,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn earnings_surface_reports_summary_and_records() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);
        harness
            .earnings
            .record_session_earnings(
                &SessionId("s-1".to_string()),
                &advisor().0,
                Money::from_cents(1_000),
            )
            .await
            .unwrap();

        let Json(earnings) = get_earnings(State(state), Extension(advisor()))
            .await
            .unwrap();
        assert_eq!(earnings.summary.entries, 1);
        assert_eq!(earnings.summary.pending, Money::from_cents(700));
        assert_eq!(earnings.records.len(), 1);
        assert_eq!(earnings.records[0].gross_amount, Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn health_reports_ok_with_the_crate_version() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let Json(health) = get_public_health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn metrics_answers_not_found_without_a_recorder() {
        let harness = seeded_harness();
        let state = gateway_over(&harness);

        let response = get_public_metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_renders_the_installed_recorder() {
        let harness = seeded_harness();
        let mut state = gateway_over(&harness);
        state.health.prometheus_render =
            Some(Arc::new(|| "# TYPE sibyl_sessions_started_total counter\n".to_string()));

        let response = get_public_metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn infrastructure_errors_collapse_to_internal_server_error() {
        let err = ApiError(SibylError::Internal("boom".to_string()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = ApiError(SibylError::Storage {
            source: "disk on fire".into(),
        });
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
