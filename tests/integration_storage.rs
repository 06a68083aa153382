use mission_client::config::StoreBackend;
use mission_client::domain::auth::LoginForm;
use mission_client::domain::route::LandingRoute;
use mission_client::domain::session::Credentials;
use mission_client::domain::user::UserProfile;

mod common;

fn profile(user_type: &str) -> UserProfile {
    UserProfile { email: Some("persist@example.org".into()), user_type: Some(user_type.into()), ..Default::default() }
}

#[tokio::test]
async fn test_file_session_survives_restart() {
    let app = common::TestApp::spawn().await;
    app.seed_account("persist@example.org", "secret123", "organization");

    let mut config = app.config();
    config.store.backend = StoreBackend::File;
    let path = config.store.path.clone();

    let first = mission_client::open_store(&config.store).await.unwrap();
    mission_client::Client::new(&config, first)
        .unwrap()
        .auth
        .login(&LoginForm::new("persist@example.org", "secret123"))
        .await
        .unwrap();
    assert!(path.exists());

    // A second process opening the same file sees the session.
    let second = mission_client::open_store(&config.store).await.unwrap();
    let client = mission_client::Client::new(&config, second).unwrap();
    assert_eq!(client.bootstrapper.resolve().await.route, LandingRoute::OrganizationHome);

    client.auth.logout().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_memory_backend_is_per_handle() {
    let mut config = common::config_for(None);
    config.store.backend = StoreBackend::Memory;

    let first = mission_client::open_store(&config.store).await.unwrap();
    first.set(&Credentials::new("a", "b"), &profile("volunteer")).await.unwrap();

    let second = mission_client::open_store(&config.store).await.unwrap();
    assert!(second.get().await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a redis server at REDIS_URL"]
async fn test_redis_session_round_trip() {
    common::setup_tracing();
    let mut config = common::config_for(None);
    config.store.backend = StoreBackend::Redis;
    config.store.redis_url.get_or_insert_with(|| "redis://127.0.0.1:6379".to_string());

    let store = mission_client::open_store(&config.store).await.unwrap();
    store.set(&Credentials::new("access", "refresh"), &profile("admin")).await.unwrap();

    let reopened = mission_client::open_store(&config.store).await.unwrap();
    let session = reopened.get().await.unwrap().unwrap();
    assert_eq!(session.access_token, "access");
    assert_eq!(session.user, profile("admin"));

    assert!(!reopened.clear_if_token(Some("stale")).await.unwrap());
    assert!(store.get().await.unwrap().is_some());

    assert!(reopened.clear_if_token(Some("access")).await.unwrap());
    assert!(store.get().await.unwrap().is_none());
}
