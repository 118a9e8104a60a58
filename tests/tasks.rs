mod common;

use actix_web::{http::header, http::StatusCode, rt, test, web, App, HttpServer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::TcpListener;
use task_manager::models::{Task, TaskStatus};

use common::{auth_settings, bearer, init_app, login_new_user, test_pool};

const COMPLETED: &str = "%D0%B7%D0%B0%D0%B2%D0%B5%D1%80%D1%88%D0%B5%D0%BD%D0%B0";

#[actix_rt::test]
async fn test_access_requires_authentication() {
    let app = init_app(test_pool().await).await;
    let (_, token) = login_new_user(&app, "Auth User", "authuser@example.com").await;

    let req = test::TestRequest::get().uri("/api/tasks/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let req = test::TestRequest::get()
        .uri("/api/tasks/")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_task_crud_flow() {
    let app = init_app(test_pool().await).await;
    let (user_id, token) = login_new_user(&app, "Owner", "owner@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Write report", "description": "Quarterly numbers" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Task = test::read_body_json(resp).await;
    assert_eq!(created.title, "Write report");
    assert_eq!(created.status, TaskStatus::New);
    assert_eq!(created.user, user_id);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tasks/{}/", created.id))
        .insert_header(bearer(&token))
        .to_request();
    let fetched: Task = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched, created);

    let req = test::TestRequest::put()
        .uri(&format!("/api/tasks/{}/", created.id))
        .insert_header(bearer(&token))
        .set_json(json!({
            "title": "Write report",
            "description": "Quarterly numbers",
            "status": "в процессе"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "в процессе");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/tasks/{}/", created.id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tasks/{}/", created.id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_users_only_see_their_own_tasks() {
    let app = init_app(test_pool().await).await;
    let (alice_id, alice) = login_new_user(&app, "Alice", "alice@example.com").await;
    let (_, bob) = login_new_user(&app, "Bob", "bob@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&alice))
        .set_json(json!({ "title": "Alice's task", "description": "Private" }))
        .to_request();
    let alice_task: Task = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&bob))
        .set_json(json!({ "title": "Bob's task", "description": "Also private" }))
        .to_request();
    let bob_task: Task = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/api/tasks/")
        .insert_header(bearer(&alice))
        .to_request();
    let tasks: Vec<Task> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tasks, vec![alice_task.clone()]);
    assert!(tasks.iter().all(|task| task.user == alice_id));

    let uri = format!("/api/tasks/{}/", bob_task.id);
    let requests = [
        test::TestRequest::get().uri(&uri),
        test::TestRequest::put().uri(&uri).set_json(json!({
            "title": "Taken over",
            "description": "Not yours"
        })),
        test::TestRequest::delete().uri(&uri),
    ];
    for req in requests {
        let req = req.insert_header(bearer(&alice)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(&bob))
        .to_request();
    let still_there: Task = test::call_and_read_body_json(&app, req).await;
    assert_eq!(still_there.title, "Bob's task");
}

#[actix_rt::test]
async fn test_owner_cannot_be_assigned_through_the_api() {
    let app = init_app(test_pool().await).await;
    let (alice_id, alice) = login_new_user(&app, "Alice", "alice@example.com").await;
    let (bob_id, _) = login_new_user(&app, "Bob", "bob@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&alice))
        .set_json(json!({ "title": "Gift", "description": "For Bob", "user": bob_id }))
        .to_request();
    let task: Task = test::call_and_read_body_json(&app, req).await;
    assert_eq!(task.user, alice_id);
}

#[actix_rt::test]
async fn test_create_task_with_missing_fields() {
    let app = init_app(test_pool().await).await;
    let (_, token) = login_new_user(&app, "Validation User", "validationuser@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&token))
        .set_json(json!({ "description": "Missing title field" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body.get("title").is_some(), "body: {}", body);

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "No description" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body.get("description").is_some(), "body: {}", body);

    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Bad status", "description": "x", "status": "done" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "status": ["\"done\" is not a valid choice."] }));
}

#[actix_rt::test]
async fn test_list_filters_by_status_and_search() {
    let app = init_app(test_pool().await).await;
    let (_, token) = login_new_user(&app, "Filter", "filter@example.com").await;

    for (title, status) in [
        ("Buy milk", "новая"),
        ("Write report", "завершена"),
        ("Fix bike", "в процессе"),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/tasks/")
            .insert_header(bearer(&token))
            .set_json(json!({ "title": title, "description": "errand", "status": status }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/tasks/?status={}", COMPLETED))
        .insert_header(bearer(&token))
        .to_request();
    let tasks: Vec<Task> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Write report");

    let req = test::TestRequest::get()
        .uri("/api/tasks/?search=bike")
        .insert_header(bearer(&token))
        .to_request();
    let tasks: Vec<Task> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::InProgress);

    let req = test::TestRequest::get()
        .uri("/api/tasks/?status=unknown")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_create_task_unauthorized_over_http() {
    let pool = test_pool().await;

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let server_pool = pool.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server_pool.clone()))
            .app_data(web::Data::new(auth_settings()))
            .configure(task_manager::configure_app)
    })
    .workers(1)
    .bind(("127.0.0.1", port))
    .unwrap_or_else(|_| panic!("Failed to bind to port {}", port))
    .run();
    let handle = server.handle();
    rt::spawn(server);

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://127.0.0.1:{}/api/tasks/", port))
        .json(&json!({ "title": "Unauthorized Task", "description": "Nope" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("JSON error body");
    assert!(body["detail"].is_string());

    handle.stop(false).await;
}
