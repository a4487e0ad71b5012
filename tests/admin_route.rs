use playlist_api::auth::Role;
use playlist_api::routes::admin;
use playlist_api::test_support::{
    test_auth_state, TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder,
};
use rocket::http::{Header, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;
use serde_json::Value;

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping admin integration test: container runtime unavailable: {err}");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

async fn admin_client(test_db: &TestDatabase) -> Client {
    TestRocketBuilder::new()
        .manage_pg_pool(test_db.pool_clone())
        .mount_routes(routes![admin::ban_user, admin::unban_user, admin::make_admin])
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
async fn moderation_requires_the_admin_role() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let user_id = fixtures
        .insert_user("pleb@example.com", "pleb", "hunter42", "USER")
        .await
        .expect("insert user");
    let target_id = fixtures
        .insert_user("target@example.com", "target", "hunter42", "USER")
        .await
        .expect("insert target");

    let client = admin_client(&test_db).await;

    let response = client
        .post(format!("/admin/users/{target_id}/ban"))
        .header(bearer_for(user_id, "pleb@example.com", Role::User))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"][0], "Accès refusé");

    let banned: bool = sqlx::query_scalar("SELECT is_banned FROM users WHERE id = $1")
        .bind(target_id)
        .fetch_one(test_db.pool())
        .await
        .expect("fetch ban flag");
    assert!(!banned);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn admins_can_ban_unban_and_promote() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let admin_id = fixtures
        .insert_user("root@example.com", "root", "hunter42", "ADMIN")
        .await
        .expect("insert admin");
    let target_id = fixtures
        .insert_user("member@example.com", "member", "hunter42", "USER")
        .await
        .expect("insert target");

    let client = admin_client(&test_db).await;
    let auth = bearer_for(admin_id, "root@example.com", Role::Admin);

    let response = client
        .post(format!("/admin/users/{target_id}/ban"))
        .header(auth.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"], "Utilisateur banni avec succès");
    assert_eq!(payload["user"]["id"], target_id);

    let banned: bool = sqlx::query_scalar("SELECT is_banned FROM users WHERE id = $1")
        .bind(target_id)
        .fetch_one(test_db.pool())
        .await
        .expect("fetch ban flag");
    assert!(banned);

    let response = client
        .post(format!("/admin/users/{target_id}/unban"))
        .header(auth.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"], "Utilisateur débanni avec succès");

    let banned: bool = sqlx::query_scalar("SELECT is_banned FROM users WHERE id = $1")
        .bind(target_id)
        .fetch_one(test_db.pool())
        .await
        .expect("fetch ban flag");
    assert!(!banned);

    let response = client
        .post(format!("/admin/users/{target_id}/make-admin"))
        .header(auth)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"], "Utilisateur promu en ADMIN avec succès");
    assert_eq!(payload["user"]["role"], "ADMIN");

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn moderating_a_missing_user_is_not_found() {
    let Some(test_db) = provision().await else { return };
    let fixtures = TestFixtures::new(test_db.pool());
    let admin_id = fixtures
        .insert_user("root@example.com", "root", "hunter42", "ADMIN")
        .await
        .expect("insert admin");

    let client = admin_client(&test_db).await;

    let response = client
        .post("/admin/users/999999/ban")
        .header(bearer_for(admin_id, "root@example.com", Role::Admin))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    let payload: Value = response.into_json().await.expect("json body");
    assert_eq!(payload["message"][0], "Utilisateur non trouvé");

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
