mod common;

use common::{body_text, TestApp};
use snippetbox::{models::SnippetModel, store::SessionStore, HttpRequestMethod, Request};

const PASSWORD: &str = "pa$$word123";

#[tokio::test]
async fn test_home_issues_csrf_cookie_without_session() {
    let app = TestApp::new();
    let mut client = app.client();
    let response = client.get("/").await;
    assert_eq!(response.status_code(), 200);
    assert!(body_text(&response).contains("nothing to see here"));
    assert!(client.cookie("csrf_token").is_some());
    // 未修改的会话不下发 Cookie，也不写入存储
    assert!(client.cookie("session").is_none());
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_ping_skips_dynamic_chain() {
    let app = TestApp::new();
    let mut client = app.client();
    let response = client.get("/ping").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(body_text(&response), "OK");
    assert!(response.header_values("Set-Cookie").is_empty());
    assert_eq!(response.header("X-Frame-Options"), Some("deny"));
}

#[tokio::test]
async fn test_post_without_token_is_forbidden() {
    let app = TestApp::new();
    let mut client = app.client();
    client.get("/user/login").await;
    let response = client
        .post_form("/user/login", &[("email", "a@b.com"), ("password", PASSWORD)])
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_signup_flow_and_flash_shown_once() {
    let app = TestApp::new();
    let mut client = app.client();
    let response = client.signup("Alice", "alice@example.com", PASSWORD).await;
    assert_eq!(response.status_code(), 303);
    assert_eq!(response.header("Location"), Some("/user/login"));
    assert!(client.cookie("session").is_some());

    let page = client.get("/user/login").await;
    assert!(body_text(&page).contains("Your signup was successful. Please log in."));
    let again = client.get("/user/login").await;
    assert!(!body_text(&again).contains("Your signup was successful"));
}

#[tokio::test]
async fn test_signup_validation_errors() {
    let app = TestApp::new();
    let mut client = app.client();
    let response = client.signup("", "not-an-email", "short").await;
    assert_eq!(response.status_code(), 422);
    let body = body_text(&response);
    assert!(body.contains("This field cannot be blank"));
    assert!(body.contains("This field must be a valid email address"));
    assert!(body.contains("This field must be at least 8 characters long"));
    // 表单回填，但不回填密码
    assert!(body.contains("not-an-email"));
    assert!(!body.contains("value=\"short\""));
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let app = TestApp::new();
    let mut client = app.client();
    assert_eq!(
        client.signup("Alice", "dup@example.com", PASSWORD).await.status_code(),
        303
    );
    let response = client.signup("Bob", "dup@example.com", PASSWORD).await;
    assert_eq!(response.status_code(), 422);
    assert!(body_text(&response).contains("Email address is already in use"));
}

#[tokio::test]
async fn test_bad_login_is_rejected() {
    let app = TestApp::new();
    let mut client = app.client();
    client.signup("Alice", "alice@example.com", PASSWORD).await;
    let response = client.login("alice@example.com", "wrong-password").await;
    assert_eq!(response.status_code(), 422);
    assert!(body_text(&response).contains("Email or password is incorrect"));

    let unknown = client.login("nobody@example.com", PASSWORD).await;
    assert_eq!(unknown.status_code(), 422);
}

#[tokio::test]
async fn test_login_renews_session_token() {
    let app = TestApp::new();
    let mut client = app.client();
    client.signup("Alice", "alice@example.com", PASSWORD).await;
    let before = client.cookie("session").unwrap().to_string();

    let response = client.login("alice@example.com", PASSWORD).await;
    assert_eq!(response.status_code(), 303);
    assert_eq!(response.header("Location"), Some("/snippet/create"));
    let after = client.cookie("session").unwrap().to_string();
    assert_ne!(before, after);
    assert!(app.store.find(&before).await.unwrap().is_none());
    assert!(app.store.find(&after).await.unwrap().is_some());
}

#[tokio::test]
async fn test_protected_routes_redirect_to_login() {
    let app = TestApp::new();
    let mut client = app.client();
    for path in ["/snippet/create", "/account/view", "/account/password/update"] {
        let response = client.get(path).await;
        assert_eq!(response.status_code(), 303, "{}", path);
        assert_eq!(response.header("Location"), Some("/user/login"));
    }
}

#[tokio::test]
async fn test_login_returns_to_requested_page() {
    let app = TestApp::new();
    let mut client = app.client();
    client.get("/account/view").await;
    let response = client.signup_and_login("alice@example.com", PASSWORD).await;
    assert_eq!(response.status_code(), 303);
    assert_eq!(response.header("Location"), Some("/account/view"));

    let account = client.get("/account/view").await;
    assert_eq!(account.status_code(), 200);
    let body = body_text(&account);
    assert!(body.contains("Test User"));
    assert!(body.contains("alice@example.com"));
}

#[tokio::test]
async fn test_authenticated_responses_are_not_cached() {
    let app = TestApp::new();
    let mut client = app.client();
    client.signup_and_login("alice@example.com", PASSWORD).await;
    let response = client.get("/snippet/create").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.header_values("Cache-Control").contains(&"no-store"));

    // 公开页面不受影响
    let home = client.get("/").await;
    assert!(!home.header_values("Cache-Control").contains(&"no-store"));
    assert!(body_text(&home).contains("Logout"));
}

#[tokio::test]
async fn test_snippet_create_and_view() {
    let app = TestApp::new();
    let mut client = app.client();
    client.signup_and_login("alice@example.com", PASSWORD).await;

    let invalid = client
        .submit(
            "/snippet/create",
            "/snippet/create",
            &[("title", ""), ("content", ""), ("expires", "30")],
        )
        .await;
    assert_eq!(invalid.status_code(), 422);
    let body = body_text(&invalid);
    assert!(body.contains("This field cannot be blank"));
    assert!(body.contains("This field must equal 1, 7 or 365"));

    let created = client
        .submit(
            "/snippet/create",
            "/snippet/create",
            &[
                ("title", "O snail"),
                ("content", "Climb Mount Fuji"),
                ("expires", "7"),
            ],
        )
        .await;
    assert_eq!(created.status_code(), 303);
    let location = created.header("Location").unwrap().to_string();
    assert!(location.starts_with("/snippet/view/"));

    let view = client.get(&location).await;
    assert_eq!(view.status_code(), 200);
    let body = body_text(&view);
    assert!(body.contains("O snail"));
    assert!(body.contains("Climb Mount Fuji"));
    assert!(body.contains("Snippet successfully created!"));

    let home = client.get("/").await;
    assert!(body_text(&home).contains("O snail"));
}

#[tokio::test]
async fn test_logout() {
    let app = TestApp::new();
    let mut client = app.client();
    client.signup_and_login("alice@example.com", PASSWORD).await;
    let before = client.cookie("session").unwrap().to_string();

    let response = client.submit("/", "/user/logout", &[]).await;
    assert_eq!(response.status_code(), 303);
    assert_eq!(response.header("Location"), Some("/"));
    assert_ne!(client.cookie("session").unwrap(), before);
    assert!(app.store.find(&before).await.unwrap().is_none());

    let home = client.get("/").await;
    let body = body_text(&home);
    assert!(body.contains("You&#39;ve been logged out successfully!")
        || body.contains("You've been logged out successfully!"));
    assert!(body.contains("Login"));

    let create = client.get("/snippet/create").await;
    assert_eq!(create.status_code(), 303);
}

#[tokio::test]
async fn test_password_update() {
    let app = TestApp::new();
    let mut client = app.client();
    client.signup_and_login("alice@example.com", PASSWORD).await;
    let page = "/account/password/update";

    let wrong = client
        .submit(
            page,
            page,
            &[
                ("currentPassword", "not-my-password"),
                ("newPassword", "brand-new-pass"),
                ("newPasswordConfirmation", "brand-new-pass"),
            ],
        )
        .await;
    assert_eq!(wrong.status_code(), 422);
    assert!(body_text(&wrong).contains("Current password is incorrect"));

    let mismatch = client
        .submit(
            page,
            page,
            &[
                ("currentPassword", PASSWORD),
                ("newPassword", "brand-new-pass"),
                ("newPasswordConfirmation", "different-pass"),
            ],
        )
        .await;
    assert_eq!(mismatch.status_code(), 422);
    assert!(body_text(&mismatch).contains("Passwords do not match"));

    let ok = client
        .submit(
            page,
            page,
            &[
                ("currentPassword", PASSWORD),
                ("newPassword", "brand-new-pass"),
                ("newPasswordConfirmation", "brand-new-pass"),
            ],
        )
        .await;
    assert_eq!(ok.status_code(), 303);
    assert_eq!(ok.header("Location"), Some("/account/view"));
    let account = client.get("/account/view").await;
    assert!(body_text(&account).contains("Your password has been updated!"));

    client.submit("/", "/user/logout", &[]).await;
    let old = client.login("alice@example.com", PASSWORD).await;
    assert_eq!(old.status_code(), 422);
    let new = client.login("alice@example.com", "brand-new-pass").await;
    assert_eq!(new.status_code(), 303);
}

#[tokio::test]
async fn test_not_found() {
    let app = TestApp::new();
    let mut client = app.client();
    for path in [
        "/snippet/view/abc",
        "/snippet/view/0",
        "/snippet/view/-1",
        "/snippet/view/99",
        "/missing",
    ] {
        assert_eq!(client.get(path).await.status_code(), 404, "{}", path);
    }
}

#[tokio::test]
async fn test_expired_snippet_is_not_found() {
    let app = TestApp::new();
    let expired = app.snippets.insert("Old news", "gone", -1).await.unwrap();
    let live = app.snippets.insert("Fresh", "still here", 7).await.unwrap();
    let mut client = app.client();

    let response = client.get(&format!("/snippet/view/{}", expired)).await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(
        client.get(&format!("/snippet/view/{}", live)).await.status_code(),
        200
    );

    let home = body_text(&client.get("/").await);
    assert!(home.contains("Fresh"));
    assert!(!home.contains("Old news"));
}

#[tokio::test]
async fn test_method_not_allowed() {
    let app = TestApp::new();
    let mut client = app.client();
    let response = client.post_form("/snippet/view/1", &[]).await;
    assert_eq!(response.status_code(), 405);
    assert_eq!(response.header("Allow"), Some("GET, HEAD, OPTIONS"));

    let logout = client.get("/user/logout").await;
    assert_eq!(logout.status_code(), 405);
    assert_eq!(logout.header("Allow"), Some("OPTIONS, POST"));

    let options = client
        .send(Request::new(HttpRequestMethod::Options, "/user/login"))
        .await;
    assert_eq!(options.status_code(), 204);
    assert_eq!(options.header("Allow"), Some("GET, HEAD, OPTIONS, POST"));
}

#[tokio::test]
async fn test_head_uses_get_route() {
    let app = TestApp::new();
    let mut client = app.client();
    let response = client
        .send(Request::new(HttpRequestMethod::Head, "/about"))
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_static_files() {
    let app = TestApp::new();
    let mut client = app.client();
    let css = client.get("/static/css/main.css").await;
    assert_eq!(css.status_code(), 200);
    assert!(css.content_type().unwrap().starts_with("text/css"));
    assert!(css.header_values("Set-Cookie").is_empty());

    let js = client.get("/static/js/main.js").await;
    assert_eq!(js.status_code(), 200);

    // 不提供目录列表，也不允许跳出静态目录
    assert_eq!(client.get("/static/css").await.status_code(), 404);
    assert_eq!(client.get("/static/missing.txt").await.status_code(), 404);
    assert_eq!(
        client.get("/static/../html/base.html").await.status_code(),
        404
    );
}
