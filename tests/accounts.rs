//! End-to-end account flows against a real Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use axum::http::StatusCode;
use common::{
    body_text, db_app, edit_body, get, location, post_form, post_multipart, session_cookie, PNG,
};
use sqlx::PgPool;

const PASSWORD: &str = "Xk9$dLp2!";

async fn register(app: &axum::Router, username: &str, email: &str) -> String {
    let res = post_form(
        app,
        "/register/",
        &[
            ("username", username),
            ("email", email),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ],
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");
    session_cookie(&res).expect("registration logs the user in")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn registration_creates_user_profile_and_session(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool.clone(), media.path());

    let cookie = register(&app, "alice", "a@example.com").await;

    let (profiles, email): (i64, Option<String>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(p.email) FROM profiles p JOIN users u ON u.id = p.user_id WHERE u.username = 'alice'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(profiles, 1);
    assert_eq!(email.as_deref(), Some("a@example.com"));

    let res = get(&app, "/dashboard/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("alice"));
    assert!(html.contains("a@example.com"));
    assert!(html.contains("default-avatar.svg"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_username_is_rejected_case_insensitively(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool.clone(), media.path());
    register(&app, "alice", "a@example.com").await;

    let res = post_form(
        &app,
        "/register/",
        &[
            ("username", "Alice"),
            ("email", "other@example.com"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ],
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_none());
    assert!(body_text(res).await.contains("A user with that username already exists."));

    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn login_logout_round(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool.clone(), media.path());
    register(&app, "bob", "bob@example.com").await;

    let res = post_form(&app, "/login/", &[("username", "bob"), ("password", "wrong-password")], None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_none());
    assert!(body_text(res).await.contains("Please enter a correct username and password."));

    let res = post_form(
        &app,
        "/login/",
        &[("username", "BOB"), ("password", PASSWORD), ("next", "/edit/")],
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/edit/");
    let cookie = session_cookie(&res).expect("login sets the session cookie");

    let (last_login,): (Option<time::OffsetDateTime>,) =
        sqlx::query_as("SELECT last_login FROM users WHERE username = 'bob'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(last_login.is_some());

    let res = get(&app, "/logout/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);

    // The old token is still well-signed but its session row is gone.
    let res = get(&app, "/dashboard/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login/?next=/dashboard/");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn offsite_next_is_ignored(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool, media.path());
    register(&app, "carol", "carol@example.com").await;

    let res = post_form(
        &app,
        "/login/",
        &[("username", "carol"), ("password", PASSWORD), ("next", "https://evil.example/")],
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn edit_saves_both_forms_together(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool.clone(), media.path());
    let cookie = register(&app, "dave", "dave@example.com").await;

    // A bad email blocks the otherwise valid picture.
    let res = post_multipart(&app, "/edit/", edit_body("not-an-email", Some(("me.png", PNG)), false), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Enter a valid email address."));

    let (user_email, profile_email, picture): (String, String, String) = sqlx::query_as(
        "SELECT u.email, p.email, p.picture FROM users u JOIN profiles p ON p.user_id = u.id WHERE u.username = 'dave'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(user_email, "dave@example.com");
    assert_eq!(profile_email, "dave@example.com");
    assert_eq!(picture, "default.jpg");

    let res = post_multipart(&app, "/edit/", edit_body("new@example.com", Some(("me.png", PNG)), false), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");

    let (user_email, profile_email, picture): (String, String, String) = sqlx::query_as(
        "SELECT u.email, p.email, p.picture FROM users u JOIN profiles p ON p.user_id = u.id WHERE u.username = 'dave'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(user_email, "new@example.com");
    assert_eq!(profile_email, "new@example.com");
    assert!(picture.starts_with("profile_pics/") && picture.ends_with(".png"));
    assert!(media.path().join(&picture).exists());

    // Clearing goes back to the default and removes the stored file.
    let res = post_multipart(&app, "/edit/", edit_body("new@example.com", None, true), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(!media.path().join(&picture).exists());

    let res = get(&app, "/dashboard/", Some(&cookie)).await;
    assert!(body_text(res).await.contains("default-avatar.svg"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn admin_delete_cascades_to_profile(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool.clone(), media.path());
    let member = register(&app, "erin", "erin@example.com").await;
    let admin = register(&app, "root", "root@example.com").await;

    // Plain members are refused.
    let res = get(&app, "/admin/", Some(&member)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    sqlx::query("UPDATE users SET is_staff = TRUE WHERE username = 'root'")
        .execute(&pool)
        .await
        .unwrap();
    let res = get(&app, "/admin/", Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("erin@example.com"));

    let (erin_id,): (uuid::Uuid,) = sqlx::query_as("SELECT id FROM users WHERE username = 'erin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let res = post_form(&app, &format!("/admin/users/{erin_id}/delete"), &[], Some(&admin)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/admin/");

    let (profiles,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE user_id = $1")
        .bind(erin_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(profiles, 0);

    // Deleted users' cookies stop working.
    let res = get(&app, "/dashboard/", Some(&member)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn registering_while_logged_in_replaces_the_session(pool: PgPool) {
    let media = tempfile::tempdir().unwrap();
    let app = db_app(pool.clone(), media.path());
    let first = register(&app, "frank", "frank@example.com").await;

    // A rejected form keeps showing who is signed in.
    let res = post_form(
        &app,
        "/register/",
        &[("username", "bad name!"), ("email", "g@example.com"), ("password1", PASSWORD), ("password2", PASSWORD)],
        Some(&first),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("Signed in as frank"));
    assert!(!html.contains("href=\"/login/\""));

    let res = post_form(
        &app,
        "/register/",
        &[("username", "grace"), ("email", "grace@example.com"), ("password1", PASSWORD), ("password2", PASSWORD)],
        Some(&first),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let second = session_cookie(&res).expect("new account is logged in");

    let (frank_sessions,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sessions s JOIN users u ON u.id = s.user_id WHERE u.username = 'frank'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(frank_sessions, 0);

    let res = get(&app, "/dashboard/", Some(&first)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let res = get(&app, "/dashboard/", Some(&second)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("grace"));
}
