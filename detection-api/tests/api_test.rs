//! Integration tests for the detection API over HTTP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use detection_api::build_router;
use detection_api::test_util::{
    multipart_body, multipart_content_type, test_config, test_state, CountingStaging, MockDetector,
};
use detection_api::Config;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(config: Config, detector: MockDetector, staging: Arc<CountingStaging>) -> Router {
    build_router(test_state(config, Arc::new(detector), staging))
}

fn upload(uri: &str, filename: &str, content_type: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(multipart_body(filename, content_type, b"\xff\xd8\xff\xe0jpeg")))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_busy_queue_rejects_and_slow_job_times_out() {
    let staging = Arc::new(CountingStaging::new());
    let app = app(
        test_config(1, 0.1),
        MockDetector::delayed(
            json!({"class": "cumulus", "confidence": 0.9}),
            Duration::from_millis(500),
        ),
        staging.clone(),
    );

    let first = tokio::spawn(app.clone().oneshot(upload("/detect-clouds", "a.jpg", "image/jpeg")));
    tokio::time::sleep(Duration::from_millis(30)).await;

    let started = Instant::now();
    let second = app
        .clone()
        .oneshot(upload("/detect-clouds", "b.jpg", "image/jpeg"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(started.elapsed() < Duration::from_millis(250));
    let body = json_body(second).await;
    assert_eq!(body["error"]["type"], "server_busy");

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);

    // The rejected upload is released right away; the timed-out one once the
    // worker finishes with it.
    assert!(staging.wait_for_releases(2, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(staging.staged(), 2);
    assert_eq!(staging.released(), 2);
}

#[tokio::test]
async fn test_sequential_requests_succeed() {
    let staging = Arc::new(CountingStaging::new());
    let prediction = json!({"class": "altocumulus", "confidence": 0.77});
    let app = app(
        test_config(4, 5.0),
        MockDetector::instant(prediction.clone()),
        staging.clone(),
    );

    for i in 0..5 {
        let filename = format!("frame-{}.jpg", i);
        let response = app
            .clone()
            .oneshot(upload("/detect-clouds", &filename, "image/jpeg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["filename"], filename);
        assert_eq!(body["predictions"], prediction);
    }

    assert!(staging.wait_for_releases(5, Duration::from_secs(1)).await);
    assert_eq!(staging.staged(), 5);
}

#[tokio::test]
async fn test_inference_failure_is_500_and_upload_released_once() {
    let staging = Arc::new(CountingStaging::new());
    let app = app(
        test_config(4, 5.0),
        MockDetector::failing("model unavailable"),
        staging.clone(),
    );

    let response = app
        .oneshot(upload("/detect-clouds", "sky.png", "image/png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "inference_failed");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("model unavailable"));

    assert!(staging.wait_for_releases(1, Duration::from_secs(1)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(staging.released(), 1);
}

#[tokio::test]
async fn test_capacity_plus_one_concurrent_request_is_rejected() {
    let staging = Arc::new(CountingStaging::new());
    let app = app(
        test_config(2, 5.0),
        MockDetector::delayed(json!({}), Duration::from_millis(300)),
        staging.clone(),
    );

    let accepted: Vec<_> = (0..2)
        .map(|i| {
            let request = upload("/detect-clouds", &format!("{}.jpg", i), "image/jpeg");
            tokio::spawn(app.clone().oneshot(request))
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let rejected = app
        .clone()
        .oneshot(upload("/detect-clouds", "extra.jpg", "image/jpeg"))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);

    for handle in accepted {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let staging = Arc::new(CountingStaging::new());
    let app = app(test_config(4, 5.0), MockDetector::instant(json!({})), staging.clone());

    let response = app
        .oneshot(upload("/detect-clouds", "notes.txt", "text/plain"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "File must be an image");
    assert_eq!(staging.staged(), 0);
}

#[tokio::test]
async fn test_missing_file_field_is_rejected() {
    let app = app(
        test_config(4, 5.0),
        MockDetector::instant(json!({})),
        Arc::new(CountingStaging::new()),
    );

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = detection_api::test_util::MULTIPART_BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri("/detect-clouds")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["message"], "No file uploaded");
}

#[tokio::test]
async fn test_root_and_health() {
    let mut config = test_config(3, 5.0);
    config.weather.api_key.clear();
    let app = app(config, MockDetector::instant(json!({})), Arc::new(CountingStaging::new()));

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["service"], "cloud-detection");
    assert_eq!(body["healthy"], false);
    assert_eq!(body["missing_keys"], json!(["OPENWEATHER_API_KEY"]));
    assert_eq!(body["queue"], json!({"capacity": 3, "queued": 0, "in_flight": 0}));
}

#[tokio::test]
async fn test_forecast_days_out_of_range() {
    let app = app(
        test_config(4, 5.0),
        MockDetector::instant(json!({})),
        Arc::new(CountingStaging::new()),
    );

    for days in ["0", "6", "-2"] {
        let uri = format!("/weather/forecast?city=Bergen&days={}", days);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_weather_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Bergen,NO"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Bergen",
            "main": {"temp": 8.04},
            "weather": [{"description": "moderate rain"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("cnt", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "city": {"name": "Bergen"},
            "list": [{"dt": 1, "pop": 0.5}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Atlantis"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut config = test_config(4, 5.0);
    config.weather.base_url = server.uri();
    let app = app(config, MockDetector::instant(json!({})), Arc::new(CountingStaging::new()));

    let response = app
        .clone()
        .oneshot(get("/weather?city=Bergen&country=NO"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["location"], "Bergen,NO");
    assert_eq!(body["weather"]["current"]["temperature"], 8.0);
    assert_eq!(body["weather"]["current"]["description"], "Moderate Rain");

    let response = app
        .clone()
        .oneshot(get("/weather/forecast?city=Bergen&days=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["forecast"]["forecast_days"], 2);
    assert_eq!(body["forecast"]["forecast"][0]["precipitation"]["probability"], 50.0);

    let response = app.oneshot(get("/weather?city=Atlantis")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(
        body["error"]["message"],
        "Error fetching weather: Location 'Atlantis' not found"
    );
}

#[tokio::test]
async fn test_analyze_combines_detection_and_weather() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Quito"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Quito",
            "clouds": {"all": 90}
        })))
        .mount(&server)
        .await;

    let mut config = test_config(4, 5.0);
    config.weather.base_url = server.uri();
    let staging = Arc::new(CountingStaging::new());
    let app = app(
        config,
        MockDetector::instant(json!({"class": "nimbostratus"})),
        staging.clone(),
    );

    let response = app
        .oneshot(upload("/analyze?city=Quito", "quito.jpg", "image/jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "quito.jpg");
    assert_eq!(body["location"], "Quito");
    assert_eq!(body["cloud_detection"]["class"], "nimbostratus");
    assert_eq!(body["weather"]["clouds"]["coverage"], 90.0);
    assert!(staging.wait_for_releases(1, Duration::from_secs(1)).await);
}
