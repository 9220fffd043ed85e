//! Router-level tests: each request goes through the real axum stack and,
//! for the offer endpoint, the real webrtc negotiation.

use axum::body::Body;
use axum::Router;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use livecast_api::http::create_router;
use livecast_api::rooms::RoomHub;
use livecast_core::{AllowAllValidator, Config, StaticKeyValidator, StreamKeyValidator};
use livecast_relay::{BroadcastMap, RelayConfig, SessionRegistry, SignalingService};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

fn test_router(web_root: &str, validator: Arc<dyn StreamKeyValidator>) -> Router {
    let mut config = Config::default();
    config.server.web_root = web_root.to_string();

    let relay_config = RelayConfig {
        ice_servers: Vec::new(),
        ice_gathering_timeout: Duration::from_secs(2),
        ..RelayConfig::default()
    };
    let broadcasts = Arc::new(BroadcastMap::new());
    let registry =
        Arc::new(SessionRegistry::new(relay_config, broadcasts).expect("registry should build"));
    let signaling = Arc::new(SignalingService::new(registry, validator));

    create_router(signaling, Arc::new(RoomHub::new()), Arc::new(config))
}

async fn client_offer_sdp() -> String {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .expect("codecs should register");
    let api = APIBuilder::new().with_media_engine(media_engine).build();
    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .expect("client peer connection should build");
    pc.add_transceiver_from_kind(RTPCodecType::Audio, None)
        .await
        .expect("transceiver should attach");
    pc.add_transceiver_from_kind(RTPCodecType::Video, None)
        .await
        .expect("transceiver should attach");
    let offer = pc.create_offer(None).await.expect("offer should build");
    pc.close().await.ok();
    offer.sdp
}

fn offer_request(sdp: &str, sdp_type: &str, stream_key: &str, broadcaster: bool) -> Request<Body> {
    let body = serde_json::json!({
        "sdp": sdp,
        "type": sdp_type,
        "streamKey": stream_key,
        "broadcaster": broadcaster,
    });
    Request::builder()
        .method("POST")
        .uri("/offer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be json")
}

#[tokio::test]
async fn healthz_responds_ok() {
    let router = test_router("./web", Arc::new(AllowAllValidator));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn malformed_sdp_yields_400() {
    let router = test_router("./web", Arc::new(AllowAllValidator));
    let response = router
        .oneshot(offer_request("definitely not sdp", "offer", "abc", false))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_offer_type_yields_400() {
    let router = test_router("./web", Arc::new(AllowAllValidator));
    let sdp = client_offer_sdp().await;
    let response = router
        .oneshot(offer_request(&sdp, "answer", "abc", false))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn viewer_with_unknown_key_still_gets_an_answer() {
    let router = test_router("./web", Arc::new(AllowAllValidator));
    let sdp = client_offer_sdp().await;
    let response = router
        .oneshot(offer_request(&sdp, "offer", "missing", false))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "answer");
    assert!(body["sdp"]
        .as_str()
        .expect("sdp should be a string")
        .contains("m="));
}

#[tokio::test]
async fn broadcaster_with_rejected_key_yields_403() {
    let router = test_router(
        "./web",
        Arc::new(StaticKeyValidator::new(["good".to_string()])),
    );
    let sdp = client_offer_sdp().await;
    let response = router
        .oneshot(offer_request(&sdp, "offer", "revoked", true))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ice_servers_reports_configuration() {
    let router = test_router("./web", Arc::new(AllowAllValidator));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/ice-servers")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let urls = body["servers"][0]["urls"]
        .as_array()
        .expect("urls should be an array");
    assert!(urls
        .iter()
        .any(|u| u.as_str().is_some_and(|u| u.starts_with("stun:"))));
}

#[tokio::test]
async fn stats_starts_empty() {
    let router = test_router("./web", Arc::new(AllowAllValidator));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["broadcasts"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn missing_page_yields_404() {
    let dir = tempfile::tempdir().expect("tempdir");
    let router = test_router(
        dir.path().to_str().expect("utf8 path"),
        Arc::new(AllowAllValidator),
    );
    let response = router
        .oneshot(
            Request::builder()
                .uri("/view/abc")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pages_are_served_from_the_web_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("broadcast.html"), "<h1>go live</h1>")
        .expect("page should write");
    let router = test_router(
        dir.path().to_str().expect("utf8 path"),
        Arc::new(AllowAllValidator),
    );

    let response = router
        .oneshot(
            Request::builder()
                .uri("/broadcast")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("go live"));
}
