mod common;

use common::spawn_app;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn protected_pages_redirect_anonymous_users_to_login() {
    let app = spawn_app().await;

    for path in ["/dashboard", "/bai/transactions", "/recon", "/admin/users"] {
        let response = app
            .client
            .get(format!("{}{}", app.address, path))
            .send()
            .await
            .expect("failed to execute request");

        assert_eq!(
            response.status(),
            reqwest::StatusCode::SEE_OTHER,
            "{path} should redirect anonymous users"
        );
        assert_eq!(
            response.headers()["location"],
            "/login",
            "{path} should redirect to /login"
        );
    }
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn admin_can_log_in_and_reach_the_dashboard() {
    let app = spawn_app().await;
    app.login_as_admin().await;

    let response = app
        .client
        .get(format!("{}/dashboard", app.address))
        .send()
        .await
        .expect("failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.expect("failed to read body");
    assert!(body.contains("Bank monitoring"));
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn wrong_password_stays_on_login_page() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/login", app.address))
        .form(&[("username", "admin"), ("password", "not-the-password")])
        .send()
        .await
        .expect("failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/login");

    // The session is still anonymous afterwards.
    let response = app
        .client
        .get(format!("{}/dashboard", app.address))
        .send()
        .await
        .expect("failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn logout_clears_the_session() {
    let app = spawn_app().await;
    app.login_as_admin().await;

    let response = app
        .client
        .get(format!("{}/logout", app.address))
        .send()
        .await
        .expect("failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/login");

    let response = app
        .client
        .get(format!("{}/dashboard", app.address))
        .send()
        .await
        .expect("failed to execute request");
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
}
