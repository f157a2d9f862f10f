mod common;

use common::*;
use reqwest::Method;
use serde_json::json;

#[tokio::test]
async fn update_profile_changes_only_given_fields() {
    let app = spawn_app().await;
    let (_, token) = app.register("grace@example.com").await;

    let (status, body) = app
        .authed(
            Method::PUT,
            "/profiles/updateProfile",
            &token,
            Some(json!({
                "firstname": "Grace",
                "dateOfBirth": "1906-12-09",
                "about": "Compilers",
            })),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let details = &body["updatedUserDetails"];
    assert_eq!(details["firstname"], "Grace");
    assert_eq!(details["lastname"], "Lovelace");
    assert_eq!(details["additionalDetails"]["dateOfBirth"], "1906-12-09");
    assert_eq!(details["additionalDetails"]["about"], "Compilers");

    let (status, body) = app
        .authed(
            Method::PUT,
            "/profiles/updateProfile",
            &token,
            Some(json!({ "gender": "F" })),
        )
        .await;
    assert_eq!(status, 200);
    let details = &body["updatedUserDetails"];
    assert_eq!(details["firstname"], "Grace");
    assert_eq!(details["additionalDetails"]["about"], "Compilers");
    assert_eq!(details["additionalDetails"]["gender"], "F");

    let (status, _) = app
        .authed(
            Method::PUT,
            "/profiles/updateProfile",
            &token,
            Some(json!({ "dateOfBirth": "09/12/1906" })),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn profile_routes_require_a_session() {
    let app = spawn_app().await;
    let (status, body) = read(
        app.client
            .put(app.api("/profiles/updateProfile"))
            .json(&json!({ "about": "x" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["success"], false);

    let (status, _) = read(
        app.client
            .delete(app.api("/profiles/deleteProfile"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn display_picture_is_uploaded_and_stored() {
    let app = spawn_app().await;
    let (_, token) = app.register("pic@example.com").await;

    let part = reqwest::multipart::Part::bytes(b"fake jpeg bytes".to_vec())
        .file_name("me.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("displayPicture", part);
    let (status, body) = read(
        app.client
            .put(app.api("/profiles/updateDisplayPicture"))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200, "{}", body);

    let image = body["data"]["image"].as_str().unwrap();
    assert!(image.contains("/uploads/"));
    assert!(image.ends_with(".jpg"));
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 1);

    let form = reqwest::multipart::Form::new().text("somethingElse", "x");
    let (status, _) = read(
        app.client
            .put(app.api("/profiles/updateDisplayPicture"))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn deleting_an_account_removes_its_data_and_fixes_counters() {
    let app = spawn_app().await;
    let (_, owner_token) = app.register("stays@example.com").await;
    let (leaver_id, leaver_token) = app.register("leaves@example.com").await;

    let post_id = app.create_post(&owner_token, "still here").await;
    app.create_post(&leaver_token, "going away").await;
    app.authed(
        Method::POST,
        &format!("/posts/{}/like", post_id),
        &leaver_token,
        None,
    )
    .await;
    app.authed(
        Method::POST,
        &format!("/posts/{}/comment", post_id),
        &leaver_token,
        Some(json!({ "content": "bye" })),
    )
    .await;
    assert_eq!(app.counters(post_id).await, (1, 1));

    let (status, body) = app
        .authed(Method::DELETE, "/profiles/deleteProfile", &leaver_token, None)
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["message"], "Account deleted successfully");

    assert_eq!(app.counters(post_id).await, (0, 0));
    assert_eq!(
        app.count(&format!(
            "SELECT COUNT(*) FROM posts WHERE user_id = {}",
            leaver_id
        ))
        .await,
        0
    );
    assert_eq!(app.count("SELECT COUNT(*) FROM users").await, 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM profiles").await, 1);

    let (status, _) = app
        .post_json(
            "/login",
            json!({ "email": "leaves@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, 401);

    // The token still verifies but its user is gone.
    let (status, _) = app
        .authed(Method::DELETE, "/profiles/deleteProfile", &leaver_token, None)
        .await;
    assert_eq!(status, 404);
}
