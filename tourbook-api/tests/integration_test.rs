use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tourbook_api::{
    app,
    metrics::Metrics,
    middleware::{AdminClaims, CustomerClaims},
    state::{AppState, AuthConfig},
};
use tourbook_booking::{InMemoryLedger, RecordingNotifier, ReservationService};
use tourbook_shared::BookingEvent;
use tourbook_store::app_config::RateLimitConfig;
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    notifier: RecordingNotifier,
}

impl TestApp {
    fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let notifier = RecordingNotifier::new();
        let reservations = ReservationService::new(ledger.clone(), Arc::new(notifier.clone()));

        let state = AppState {
            reservations: Arc::new(reservations),
            catalog: ledger,
            redis: None,
            auth: AuthConfig {
                secret: SECRET.to_string(),
            },
            rate_limit: RateLimitConfig {
                requests: 100,
                window_seconds: 60,
            },
            metrics: Arc::new(Metrics::new().unwrap()),
        };

        Self {
            router: app(state),
            notifier,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Creates a tour at adult 50 / child 20 with one date and returns the date id.
    async fn seed_date(&self, capacity: i32, price_override: Option<i64>) -> String {
        let admin = admin_token();
        let (status, tour) = self
            .send(
                Method::POST,
                "/v1/admin/tours",
                Some(&admin),
                Some(json!({ "name": "Harbour Lights", "adult_price": 50, "child_price": 20 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, date) = self
            .send(
                Method::POST,
                &format!("/v1/admin/tours/{}/dates", tour["id"].as_str().unwrap()),
                Some(&admin),
                Some(json!({
                    "starts_at": (Utc::now() + Duration::days(7)).to_rfc3339(),
                    "capacity": capacity,
                    "price_override": price_override,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        date["id"].as_str().unwrap().to_string()
    }
}

fn expiry() -> usize {
    (Utc::now() + Duration::hours(1)).timestamp() as usize
}

fn customer_token(sub: &str) -> String {
    let claims = CustomerClaims {
        sub: sub.to_string(),
        email: Some(format!("{}@example.com", sub)),
        role: "CUSTOMER".to_string(),
        exp: expiry(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn admin_token() -> String {
    let claims = AdminClaims {
        sub: "ops-1".to_string(),
        email: None,
        role: "ADMIN".to_string(),
        exp: expiry(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_reserve_returns_created_booking() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;
    let token = customer_token("alice");

    let (status, booking) = app
        .send(
            Method::POST,
            &format!("/v1/tour-dates/{}/bookings", date_id),
            Some(&token),
            Some(json!({ "adults": 2, "children": 1 })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["payment_status"], "PENDING");
    assert_eq!(booking["total_price"], 120);
    assert_eq!(booking["seats"], 3);
    assert_eq!(booking["customer_id"], "alice");
    assert_eq!(booking["contact_email"], "alice@example.com");

    let (_, availability) = app
        .send(Method::GET, &format!("/v1/tour-dates/{}/availability", date_id), None, None)
        .await;
    assert_eq!(availability["booked"], 3);
    assert_eq!(availability["available"], 7);

    assert!(matches!(
        app.notifier.events().first(),
        Some(BookingEvent::BookingReserved(_))
    ));
}

#[tokio::test]
async fn test_price_override_applies_to_adults() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, Some(40)).await;

    let (status, booking) = app
        .send(
            Method::POST,
            &format!("/v1/tour-dates/{}/bookings", date_id),
            Some(&customer_token("bob")),
            Some(json!({ "adults": 2, "children": 1 })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["total_price"], 100);
}

#[tokio::test]
async fn test_over_capacity_returns_conflict_with_available() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;
    let token = customer_token("carol");
    let uri = format!("/v1/tour-dates/{}/bookings", date_id);

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 8 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 3 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");
    assert_eq!(body["available"], 2);

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 2 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;
    let uri = format!("/v1/tour-dates/{}/bookings", date_id);

    let (status, _) = app
        .send(Method::POST, &uri, None, Some(json!({ "adults": 1 })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::POST, &uri, Some("not-a-jwt"), Some(json!({ "adults": 1 })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_cannot_use_admin_routes() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            Method::POST,
            "/v1/admin/tours",
            Some(&customer_token("dave")),
            Some(json!({ "name": "Sneaky", "adult_price": 1, "child_price": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_party_is_rejected() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/v1/tour-dates/{}/bookings", date_id),
            Some(&customer_token("erin")),
            Some(json!({ "adults": 0, "children": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancellation_frees_seats() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;
    let token = customer_token("frank");
    let uri = format!("/v1/tour-dates/{}/bookings", date_id);

    let (_, first) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 4 })))
        .await;
    app.send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 6 })))
        .await;

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 4 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cancelled) = app
        .send(
            Method::POST,
            &format!("/v1/bookings/{}/status", first["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "status": "CANCELLED" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["payment_status"], "CANCELLED");

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 4 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_customer_cannot_mark_paid_or_touch_others() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;
    let owner = customer_token("gina");

    let (_, booking) = app
        .send(
            Method::POST,
            &format!("/v1/tour-dates/{}/bookings", date_id),
            Some(&owner),
            Some(json!({ "adults": 1 })),
        )
        .await;
    let booking_uri = format!("/v1/bookings/{}", booking["id"].as_str().unwrap());

    let (status, _) = app
        .send(
            Method::POST,
            &format!("{}/status", booking_uri),
            Some(&owner),
            Some(json!({ "status": "PAID" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, &booking_uri, Some(&customer_token("henry")), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, fetched) = app.send(Method::GET, &booking_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], booking["id"]);
}

#[tokio::test]
async fn test_update_resizes_against_remaining_seats() {
    let app = TestApp::new();
    let date_id = app.seed_date(5, None).await;
    let token = customer_token("ivy");
    let uri = format!("/v1/tour-dates/{}/bookings", date_id);

    let (_, booking) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 2 })))
        .await;
    app.send(Method::POST, &uri, Some(&token), Some(json!({ "adults": 1 })))
        .await;
    let booking_uri = format!("/v1/bookings/{}", booking["id"].as_str().unwrap());

    let (status, updated) = app
        .send(
            Method::PUT,
            &booking_uri,
            Some(&token),
            Some(json!({ "adults": 1, "children": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["seats"], 4);
    assert_eq!(updated["total_price"], 110);

    let (status, body) = app
        .send(
            Method::PUT,
            &booking_uri,
            Some(&token),
            Some(json!({ "adults": 3, "children": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["available"], 4);
}

#[tokio::test]
async fn test_admin_capacity_and_status_rules() {
    let app = TestApp::new();
    let admin = admin_token();
    let date_id = app.seed_date(10, None).await;
    let token = customer_token("jack");

    let (_, booking) = app
        .send(
            Method::POST,
            &format!("/v1/tour-dates/{}/bookings", date_id),
            Some(&token),
            Some(json!({ "adults": 6 })),
        )
        .await;
    let booking_id = booking["id"].as_str().unwrap();

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/v1/admin/tour-dates/{}", date_id),
            Some(&admin),
            Some(json!({ "capacity": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAPACITY_BELOW_BOOKED");

    let (status, paid) = app
        .send(
            Method::POST,
            &format!("/v1/admin/bookings/{}/status", booking_id),
            Some(&admin),
            Some(json!({ "status": "PAID" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment_status"], "PAID");

    let (status, body) = app
        .send(Method::DELETE, &format!("/v1/admin/bookings/{}", booking_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PAID_BOOKING_DELETION");

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/v1/admin/bookings/{}/status", booking_id),
            Some(&admin),
            Some(json!({ "status": "PENDING" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listing) = app
        .send(
            Method::GET,
            &format!("/v1/admin/tour-dates/{}/bookings", date_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["availability"]["booked"], 6);
    assert_eq!(listing["bookings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inactive_date_refuses_reservations() {
    let app = TestApp::new();
    let date_id = app.seed_date(10, None).await;

    let (status, date) = app
        .send(
            Method::PATCH,
            &format!("/v1/admin/tour-dates/{}", date_id),
            Some(&admin_token()),
            Some(json!({ "status": "INACTIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(date["status"], "INACTIVE");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/tour-dates/{}/bookings", date_id),
            Some(&customer_token("kim")),
            Some(json!({ "adults": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TOUR_DATE_INACTIVE");
}

#[tokio::test]
async fn test_unknown_tour_date_is_not_found() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/v1/tour-dates/{}/availability", uuid::Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
