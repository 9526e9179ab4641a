mod common;

use std::path::PathBuf;

use axum::http::StatusCode;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::{Value, json};

use common::Part;
use dramalist::{
    entities::{actor, movie_actor, review, session},
    upload::UploadKind,
};

fn photo_on_disk(t: &common::TestApp, path: &Value) -> PathBuf {
    t.state.uploads.resolve(UploadKind::ActorPhoto, path.as_str().unwrap()).unwrap()
}

fn photo<'a>() -> Part<'a> {
    Part::File {
        name: "profile_path",
        file_name: "face.jpg",
        content_type: "image/jpeg",
        bytes: b"\xff\xd8\xff-jpeg",
    }
}

#[tokio::test]
async fn actors_need_name_and_picture() {
    let t = common::spawn().await;
    let admin = t.admin_cookie().await;

    let reply = t.multipart("POST", "/api/actors", &[Part::Text("name", "Song Kang")], Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Please provide both a name and a profile picture.");

    let pdf = Part::File {
        name: "profile_path",
        file_name: "cv.pdf",
        content_type: "application/pdf",
        bytes: b"%PDF",
    };
    let reply = t
        .multipart("POST", "/api/actors", &[Part::Text("name", "Song Kang"), pdf], Some(&admin))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Only image files are allowed for the profile picture.");

    let reply = t
        .multipart("POST", "/api/actors", &[Part::Text("name", "Song Kang"), photo()], Some(&admin))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let path = reply.body["actor"]["profile_path"].as_str().unwrap().to_string();
    assert!(path.starts_with("uploads/actors/") && path.ends_with(".jpg"), "{path}");

    let reply = t
        .multipart(
            "POST",
            "/api/actors",
            &[Part::Text("name", "Kim Go-eun"), Part::Text("profile_path", "https://img.example/k.jpg")],
            Some(&admin),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = t.get("/api/actors?limit=1", None).await;
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["actors"].as_array().unwrap().len(), 1);
    assert_eq!(reply.body["actors"][0]["name"], "Kim Go-eun");

    let reply = t.get("/api/actors?search=song", None).await;
    assert_eq!(reply.body["actors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn actor_photo_replacement_and_delete() {
    let t = common::spawn().await;
    let admin = t.admin_cookie().await;
    let reply = t
        .multipart("POST", "/api/actors", &[Part::Text("name", "Lee Min-ho"), photo()], Some(&admin))
        .await;
    let id = reply.body["actor"]["id"].as_i64().unwrap();
    let first = photo_on_disk(&t, &reply.body["actor"]["profile_path"]);
    assert!(first.exists());

    let g = t.create_named("genres", "genre", "Action", &admin).await;
    let reply = t
        .multipart(
            "POST",
            "/api/movies",
            &[
                Part::Text("title", "City Hunter"),
                Part::Text("genres", &format!("[{g}]")),
                Part::Text("actors", &format!("[{id}]")),
                common::poster(),
            ],
            Some(&admin),
        )
        .await;
    assert_eq!(reply.body["movie"]["actors"][0]["name"], "Lee Min-ho");

    let uri = format!("/api/actors/{id}");
    let reply = t.multipart("PUT", &uri, &[Part::Text("name", "Lee Minho"), photo()], Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["actor"]["name"], "Lee Minho");
    assert!(!first.exists());
    let second = photo_on_disk(&t, &reply.body["actor"]["profile_path"]);

    let reply = t.multipart("PUT", &uri, &[photo()], Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = t.delete(&uri, Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(!second.exists());
    assert_eq!(movie_actor::Entity::find().count(&t.state.db).await.unwrap(), 0);

    let reply = t.delete(&uri, Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn actor_photo_cannot_point_at_stored_uploads() {
    let t = common::spawn().await;
    let admin = t.admin_cookie().await;
    let reply = t.create_movie("Hometown Cha-Cha-Cha", "[]", &admin).await;
    let poster = reply.body["movie"]["poster"].as_str().unwrap().to_string();
    let poster_file = t.state.uploads.resolve(UploadKind::Poster, &poster).unwrap();

    let reply = t
        .multipart(
            "POST",
            "/api/actors",
            &[Part::Text("name", "Shin Min-a"), Part::Text("profile_path", &poster)],
            Some(&admin),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Profile picture must be an uploaded image or an external link.");

    let reply = t
        .multipart("POST", "/api/actors", &[Part::Text("name", "Shin Min-a"), photo()], Some(&admin))
        .await;
    let id = reply.body["actor"]["id"].as_i64().unwrap();
    let uri = format!("/api/actors/{id}");
    let reply = t
        .multipart(
            "PUT",
            &uri,
            &[Part::Text("name", "Shin Min-a"), Part::Text("profile_path", &poster)],
            Some(&admin),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    // Rows written before the check existed still only clean up actor photos.
    let legacy = actor::ActiveModel {
        name: Set("Kim Seon-ho".to_string()),
        profile_path: Set(poster.clone()),
        ..Default::default()
    }
    .insert(&t.state.db)
    .await
    .unwrap();
    let reply = t.delete(&format!("/api/actors/{}", legacy.id), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(poster_file.exists());
}

#[tokio::test]
async fn reviews_wait_for_approval() {
    let t = common::spawn().await;
    let admin = t.admin_cookie().await;
    let member = t.member_cookie("critic@b.test").await;
    let reply = t.create_movie("Reply 1988", "[]", &admin).await;
    let movie = reply.body["movie"]["id"].as_i64().unwrap();
    let uri = format!("/api/movies/{movie}/reviews");

    let reply = t.json("POST", &uri, json!({ "rating": 5, "comment": "Great" }), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = t.json("POST", &uri, json!({ "rating": 6, "comment": "Great" }), Some(&member)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = t.json("POST", &uri, json!({ "rating": 4, "comment": "  " }), Some(&member)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Comment is required");
    let reply = t
        .json("POST", "/api/movies/999/reviews", json!({ "rating": 4, "comment": "?" }), Some(&member))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = t.json("POST", &uri, json!({ "rating": 5, "comment": "Great" }), Some(&member)).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["message"], "Review submitted for approval");
    assert_eq!(reply.body["review"]["approved"], false);
    let review = reply.body["review"]["id"].as_i64().unwrap();

    let reply = t.get(&uri, None).await;
    assert_eq!(reply.body["reviews"], json!([]));

    let reply = t.get("/api/reviews", Some(&member)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = t.get("/api/reviews", Some(&admin)).await;
    assert_eq!(reply.body["reviews"][0]["user_email"], "critic@b.test");
    assert_eq!(reply.body["reviews"][0]["movie_title"], "Reply 1988");

    let reply = t
        .json("PUT", &format!("/api/reviews/{review}/approve"), json!({}), Some(&admin))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["review"]["approved"], true);

    let reply = t.get(&uri, None).await;
    let listed = reply.body["reviews"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["user_name"], "Viewer");
    assert!(listed[0].get("user_email").is_none());

    let reply = t.delete(&format!("/api/reviews/{review}"), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = t.delete(&format!("/api/reviews/{review}"), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_manage_users() {
    let t = common::spawn().await;
    let admin = t.admin_cookie().await;
    let member = t.member_cookie("promote@b.test").await;

    let reply = t.get("/api/users", Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let users = reply.body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    let me = t.get("/api/auth/check-auth", Some(&admin)).await.body["user"]["id"].as_i64().unwrap();
    let other = t.get("/api/auth/check-auth", Some(&member)).await.body["user"]["id"].as_i64().unwrap();

    let reply = t.json("PUT", &format!("/api/users/{me}/role"), json!({ "role": "User" }), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "You cannot change your own role");

    let role_uri = format!("/api/users/{other}/role");
    let reply = t.json("PUT", &role_uri, json!({ "role": "Owner" }), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Role must be Admin or User");

    let reply = t.json("PUT", &role_uri, json!({ "role": "admin" }), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["user"]["role"], "Admin");

    // The promoted account passes admin gates on its existing session.
    let reply = t.get("/api/users", Some(&member)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = t.delete(&format!("/api/users/{me}"), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "You cannot delete your own account");

    let reply = t.delete(&format!("/api/users/{other}"), Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(session::Entity::find().count(&t.state.db).await.unwrap(), 1);
    assert_eq!(review::Entity::find().count(&t.state.db).await.unwrap(), 0);

    let reply = t.get("/api/users", Some(&member)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}
