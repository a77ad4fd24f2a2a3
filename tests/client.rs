use std::sync::Arc;
use std::time::Duration;

use sharedocs::{
    autosave::{Autosaver, SaveStatus},
    client::{ApiClient, ClientError},
    config::Config,
    db, router,
    session::SessionState,
    AppState,
};

const PASSWORD: &str = "Passw0rd!";

async fn spawn_server() -> String {
    let config = Config::for_tests("client-test-secret");
    let conn = db::establish_connection(&config.database_path).unwrap();
    let app = router(AppState::new(conn, &config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn logged_in(base_url: &str, email: &str) -> ApiClient {
    let client = ApiClient::new(base_url);
    client.register(email, PASSWORD, None).await.unwrap();
    assert_eq!(client.login(email, PASSWORD).await.unwrap(), SessionState::Armed);
    client
}

#[tokio::test]
async fn sharing_flow_end_to_end() {
    let base_url = spawn_server().await;
    let alice = logged_in(&base_url, "alice@x.com").await;
    let bob = logged_in(&base_url, "bob@x.com").await;

    let doc = alice.new_file().await.unwrap();
    alice.save_file(doc.id, "<p>draft</p>").await.unwrap();
    alice.rename_file(doc.id, "Draft").await.unwrap();

    let err = bob.file(doc.id).await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(403));

    alice.give_access_to_file(doc.id, "bob@x.com").await.unwrap();
    bob.save_file(doc.id, "<p>edited by bob</p>").await.unwrap();
    assert_eq!(alice.file(doc.id).await.unwrap().content, "<p>edited by bob</p>");

    let listing = bob.folder_content().await.unwrap();
    assert!(listing.files.is_empty());
    assert_eq!(listing.files_with_edit_right[0].name, "Draft");

    let shared = alice.create_share_code(doc.id).await.unwrap();
    let code = shared.share_code.unwrap();
    let anonymous = ApiClient::new(&base_url);
    let view = anonymous.view_file_with_code(&code).await.unwrap();
    assert_eq!(view.content, "<p>edited by bob</p>");

    assert!(matches!(
        anonymous.save_file(doc.id, "nope").await,
        Err(ClientError::NotLoggedIn)
    ));

    let err = bob.delete_file(doc.id).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));
    alice.delete_file(doc.id).await.unwrap();
}

#[tokio::test]
async fn logout_stops_authenticated_calls() {
    let base_url = spawn_server().await;
    let client = logged_in(&base_url, "carol@x.com").await;

    client.logout();
    assert_eq!(client.session().state(), SessionState::Idle);
    assert!(matches!(
        client.folder_content().await,
        Err(ClientError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn autosave_persists_only_the_last_edit() {
    let base_url = spawn_server().await;
    let client = Arc::new(logged_in(&base_url, "dave@x.com").await);
    let doc = client.new_file().await.unwrap();

    let mut saver = Autosaver::with_window(
        doc.id,
        doc.content.clone(),
        Arc::clone(&client),
        Duration::from_millis(100),
    );
    let mut status = saver.subscribe();

    for content in ["a", "ab", "abc"] {
        saver.edit(content);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|status| *status == SaveStatus::Saved),
    )
    .await
    .expect("autosave finished")
    .unwrap();

    assert_eq!(client.file(doc.id).await.unwrap().content, "abc");
    assert_eq!(saver.content(), "abc");
}
