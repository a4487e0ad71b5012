use playlist_api::auth::Role;
use playlist_api::routes::songs;
use playlist_api::test_support::{
    test_auth_state, TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder,
};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;
use serde_json::{json, Value};

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping songs integration test: container runtime unavailable: {err}");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

async fn songs_client(test_db: &TestDatabase) -> Client {
    TestRocketBuilder::new()
        .manage_pg_pool(test_db.pool_clone())
        .mount_routes(routes![
            songs::list_songs,
            songs::get_song,
            songs::create_song,
            songs::update_song,
            songs::delete_song,
        ])
        .async_client()
        .await
}

fn bearer_for(user_id: i32, email: &str, role: Role) -> Header<'static> {
    let token = test_auth_state()
        .token_service
        .issue_access_token(user_id, email, role)
        .expect("access token");
    Header::new("Authorization", format!("Bearer {token}"))
}

#[tokio::test]
async fn songs_require_authentication() {
    let Some(test_db) = provision().await else { return };
    let client = songs_client(&test_db).await;

    let response = client.get("/songs").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"][0], "Non authentifié");

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn create_and_list_songs_with_creator() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let user_id = fixtures
        .insert_user("maker@example.com", "maker", "hunter42", "USER")
        .await
        .expect("insert user");

    let client = songs_client(&test_db).await;
    let auth = bearer_for(user_id, "maker@example.com", Role::User);

    let response = client
        .post("/songs")
        .header(ContentType::JSON)
        .header(auth.clone())
        .body(
            json!({
                "title": "Bohemian Rhapsody",
                "artist": "Queen",
                "album": "A Night at the Opera",
                "duration": 354,
                "releaseYear": 1975
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let created: Value = response.into_json().await.expect("json body");
    assert_eq!(created["title"], "Bohemian Rhapsody");
    assert_eq!(created["createdBy"], user_id);

    let response = client.get("/songs").header(auth).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let page: Value = response.into_json().await.expect("json body");
    assert_eq!(page["data"].as_array().expect("data array").len(), 1);
    assert_eq!(page["data"][0]["creator"]["username"], "maker");
    assert_eq!(page["meta"]["totalItems"], 1);
    assert_eq!(page["meta"]["currentPage"], 1);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn create_song_collects_validation_messages() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let user_id = fixtures
        .insert_user("val@example.com", "valerie", "hunter42", "USER")
        .await
        .expect("insert user");

    let client = songs_client(&test_db).await;

    let response = client
        .post("/songs")
        .header(ContentType::JSON)
        .header(bearer_for(user_id, "val@example.com", Role::User))
        .body(json!({"title": "  ", "artist": "", "duration": 0}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let payload: Value = response.into_json().await.expect("json body");
    let messages = payload["message"].as_array().expect("message array");
    assert!(messages.contains(&json!("Le titre est requis")));
    assert!(messages.contains(&json!("L'artiste est requis")));
    assert!(messages.contains(&json!("La durée doit être un nombre positif")));

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn song_mutation_is_restricted_to_creator_or_admin() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let creator_id = fixtures
        .insert_user("creator@example.com", "creator", "hunter42", "USER")
        .await
        .expect("insert creator");
    let other_id = fixtures
        .insert_user("other@example.com", "other", "hunter42", "USER")
        .await
        .expect("insert other");
    let admin_id = fixtures
        .insert_user("admin@example.com", "admin", "hunter42", "ADMIN")
        .await
        .expect("insert admin");
    let song_id = fixtures
        .insert_song("Kid A", "Radiohead", 284, Some(creator_id))
        .await
        .expect("insert song");

    let client = songs_client(&test_db).await;

    let response = client
        .put(format!("/songs/{song_id}"))
        .header(ContentType::JSON)
        .header(bearer_for(other_id, "other@example.com", Role::User))
        .body(json!({"title": "Hijacked"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(
        payload["message"][0],
        "Vous n'avez pas la permission de modifier cette chanson"
    );

    let response = client
        .put(format!("/songs/{song_id}"))
        .header(ContentType::JSON)
        .header(bearer_for(creator_id, "creator@example.com", Role::User))
        .body(json!({"genre": "Electronic"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let updated: Value = response.into_json().await.expect("json body");
    assert_eq!(updated["genre"], "Electronic");
    assert_eq!(updated["title"], "Kid A");

    let response = client
        .delete(format!("/songs/{song_id}"))
        .header(bearer_for(other_id, "other@example.com", Role::User))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    drop(response);

    // Admins may mutate songs they did not create.
    let response = client
        .delete(format!("/songs/{song_id}"))
        .header(bearer_for(admin_id, "admin@example.com", Role::Admin))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);
    drop(response);

    let response = client
        .get(format!("/songs/{song_id}"))
        .header(bearer_for(creator_id, "creator@example.com", Role::User))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"][0], "Chanson non trouvée");

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn song_list_paginates_and_clamps_limits() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let user_id = fixtures
        .insert_user("pager@example.com", "pager", "hunter42", "USER")
        .await
        .expect("insert user");

    for i in 0..12 {
        fixtures
            .insert_song(&format!("Track {i}"), "Various", 180 + i, Some(user_id))
            .await
            .expect("insert song");
    }

    let client = songs_client(&test_db).await;
    let auth = bearer_for(user_id, "pager@example.com", Role::User);

    let response = client
        .get("/songs?page=2&limit=5")
        .header(auth.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let page: Value = response.into_json().await.expect("json body");
    assert_eq!(page["data"].as_array().expect("data array").len(), 5);
    assert_eq!(page["meta"]["currentPage"], 2);
    assert_eq!(page["meta"]["itemsPerPage"], 5);
    assert_eq!(page["meta"]["totalItems"], 12);
    assert_eq!(page["meta"]["totalPages"], 3);
    assert_eq!(page["meta"]["hasNextPage"], true);
    assert_eq!(page["meta"]["hasPreviousPage"], true);

    // Oversized limits are clamped rather than rejected.
    let response = client.get("/songs?limit=500").header(auth).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let page: Value = response.into_json().await.expect("json body");
    assert_eq!(page["meta"]["itemsPerPage"], 100);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
