use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shelf_app::modules::reviews::models::ReviewDraft;
use shelf_app::{app_router, AppState};
use shelf_authz::Caller;
use shelf_kernel::settings::{AuthUser, Settings};
use tower::ServiceExt;

const ADA: &str = "ada-token";
const ALAN: &str = "alan-token";
const GRACE: &str = "grace-token";

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.users = [
        ("u-ada", "Ada Lovelace", ADA),
        ("u-alan", "Alan Turing", ALAN),
        ("u-grace", "Grace Hopper", GRACE),
    ]
    .into_iter()
    .map(|(id, name, token)| AuthUser {
        id: id.to_string(),
        name: name.to_string(),
        token: token.to_string(),
    })
    .collect();
    settings
}

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let settings = settings();
        let state = AppState::in_memory(&settings).await.unwrap();
        let router = app_router(&state, &settings);
        Self { router, state }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    async fn create_book(&self, token: &str, book: Value) -> String {
        let (status, body) = self
            .send(Method::POST, "/api/books", Some(token), Some(book))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn add_review(&self, token: &str, book_id: &str, rating: u8) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("/api/books/{book_id}/reviews"),
            Some(token),
            Some(json!({ "rating": rating, "title": "Thoughts", "text": "Worth reading" })),
        )
        .await
    }
}

fn book(title: &str, author: &str, genre: &str, year: i32) -> Value {
    json!({
        "title": title,
        "author": author,
        "genre": genre,
        "description": format!("{title} by {author}"),
        "publishedYear": year
    })
}

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_book_sets_owner_and_zero_rating() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/books",
            Some(ADA),
            Some(book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937)),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"], "u-ada");
    assert_eq!(body["data"]["averageRating"], 0.0);
    assert_eq!(body["data"]["genre"], "Fantasy");
}

#[tokio::test]
async fn create_book_requires_a_caller() {
    let app = TestApp::new().await;
    let payload = book("Dune", "Frank Herbert", "Fiction", 1965);

    let (status, body) = app
        .send(Method::POST, "/api/books", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not authorized to access this route");

    let (status, _) = app
        .send(Method::POST, "/api/books", Some("forged"), Some(payload))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, list) = app.get("/api/books").await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn invalid_book_reports_every_field() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/books",
            Some(ADA),
            Some(json!({ "title": "x".repeat(101), "genre": "Poetry" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["details"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let request = Request::post("/api/books")
        .header(header::AUTHORIZATION, format!("Bearer {ADA}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\":"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_sorts_and_pages() {
    let app = TestApp::new().await;
    for year in 1990..=2001 {
        app.create_book(ADA, book(&format!("Saga {year}"), "Someone", "Fantasy", year))
            .await;
    }
    for year in [1995, 1996, 1997] {
        app.create_book(ALAN, book(&format!("Novel {year}"), "Another", "Fiction", year))
            .await;
    }

    let (status, body) = app
        .get("/api/books?genre=Fantasy&sort=-publishedYear&limit=5&page=2")
        .await;

    assert_eq!(status, StatusCode::OK);
    let years: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["publishedYear"].as_i64().unwrap())
        .collect();
    assert_eq!(years, vec![1996, 1995, 1994, 1993, 1992]);
    assert_eq!(body["count"], 5);
    assert_eq!(body["total"], 12);
    assert_eq!(body["pagination"]["next"], json!({ "page": 3, "limit": 5 }));
    assert_eq!(body["pagination"]["prev"], json!({ "page": 1, "limit": 5 }));
}

#[tokio::test]
async fn list_supports_operators_and_projection() {
    let app = TestApp::new().await;
    for year in [1950, 1960, 1970, 1980] {
        app.create_book(ADA, book(&format!("Book {year}"), "Writer", "History", year))
            .await;
    }

    let (status, body) = app
        .get("/api/books?publishedYear%5Bgte%5D=1960&publishedYear.lt=1980&select=title&sort=publishedYear")
        .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["title"], "Book 1960");
    assert_eq!(data[1]["title"], "Book 1970");
    assert_eq!(data[0].as_object().unwrap().len(), 2);
    assert!(data[0]["id"].is_string());
    assert!(body["pagination"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn list_rejects_unknown_fields_and_operators() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/books?colour=red").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/books?sort=popularity").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/books?publishedYear%5Bnear%5D=1990").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/books?publishedYear=nineteen").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_matches_title_or_author() {
    let app = TestApp::new().await;
    app.create_book(ADA, book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937))
        .await;
    app.create_book(
        ADA,
        book("Tolkien: A Biography", "Humphrey Carpenter", "Biography", 1977),
    )
    .await;
    app.create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;

    let (status, body) = app.get("/api/search?query=tolkien").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = app.get("/api/search?query=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please provide a search query");

    let (status, _) = app.get("/api/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_search_query_uses_the_error_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/search?query=a&query=b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "bad_request");
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn reviews_drive_the_average_rating() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;

    let (status, first) = app.add_review(ALAN, &book_id, 5).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["user"], "u-alan");
    assert_eq!(first["data"]["book"], book_id.as_str());

    let (status, _) = app.add_review(GRACE, &book_id, 4).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, detail) = app.get(&format!("/api/books/{book_id}")).await;
    assert_eq!(detail["data"]["averageRating"], 4.5);
    assert_eq!(detail["data"]["reviewCount"], 2);

    let (status, body) = app.add_review(ALAN, &book_id, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already reviewed this book");

    let (_, list) = app.get("/api/books").await;
    assert_eq!(list["data"][0]["averageRating"], 4.5);
}

#[tokio::test]
async fn review_validation_and_missing_book() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;

    let (status, _) = app.add_review(ALAN, &book_id, 6).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.add_review(ALAN, "no-such-book", 3).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Book not found");
}

#[tokio::test]
async fn only_the_author_may_change_a_review() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;
    let (_, created) = app.add_review(ALAN, &book_id, 2).await;
    let review_id = created["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/reviews/{review_id}");

    let (status, _) = app
        .send(Method::PUT, &uri, Some(GRACE), Some(json!({ "rating": 5 })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::DELETE, &uri, Some(GRACE), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, detail) = app.get(&format!("/api/books/{book_id}")).await;
    assert_eq!(detail["data"]["reviews"][0]["rating"], 2);
    assert_eq!(detail["data"]["averageRating"], 2.0);

    let (status, updated) = app
        .send(Method::PUT, &uri, Some(ALAN), Some(json!({ "rating": 4 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["rating"], 4);
    assert_eq!(updated["data"]["title"], "Thoughts");

    let (_, detail) = app.get(&format!("/api/books/{book_id}")).await;
    assert_eq!(detail["data"]["averageRating"], 4.0);
}

#[tokio::test]
async fn deleting_the_last_review_resets_the_average() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;
    let (_, created) = app.add_review(ALAN, &book_id, 3).await;
    let review_id = created["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/reviews/{review_id}");

    let (status, body) = app.send(Method::DELETE, &uri, Some(ALAN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));

    let (_, list) = app.get("/api/books").await;
    assert_eq!(list["data"][0]["averageRating"], 0.0);

    let (status, _) = app.send(Method::DELETE, &uri, Some(ALAN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn book_detail_names_reviewers_and_pages_reviews() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;
    for (token, rating) in [(ALAN, 5), (GRACE, 3), (ADA, 4)] {
        let (status, _) = app.add_review(token, &book_id, rating).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .get(&format!("/api/books/{book_id}?page=1&limit=2"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["title"], "Dune");
    assert_eq!(data["averageRating"], 4.0);
    assert_eq!(data["reviewCount"], 3);
    assert_eq!(data["reviews"].as_array().unwrap().len(), 2);
    assert_eq!(data["reviews"][0]["user"]["name"], "Alan Turing");
    assert_eq!(data["reviews"][1]["user"]["name"], "Grace Hopper");
    assert_eq!(data["pagination"]["next"], json!({ "page": 2, "limit": 2 }));

    let (status, body) = app.get("/api/books/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn deleting_a_book_removes_its_reviews() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;
    let (_, created) = app.add_review(ALAN, &book_id, 4).await;
    let review_id = created["data"]["id"].as_str().unwrap().to_string();
    let book_uri = format!("/api/books/{book_id}");

    let (status, _) = app.send(Method::DELETE, &book_uri, Some(ALAN), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::DELETE, &book_uri, Some(ADA), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&book_uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/reviews/{review_id}"),
            Some(ALAN),
            Some(json!({ "rating": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_reviews_by_one_user_store_one() {
    let app = TestApp::new().await;
    let book_id = app
        .create_book(ADA, book("Dune", "Frank Herbert", "Fiction", 1965))
        .await;
    let caller = Caller {
        id: "u-alan".to_string(),
        name: "Alan Turing".to_string(),
    };

    let handles: Vec<_> = (1..=8u8)
        .map(|n| {
            let reviews = Arc::clone(&app.state.reviews);
            let caller = caller.clone();
            let book_id = book_id.clone();
            tokio::spawn(async move {
                let draft = ReviewDraft {
                    rating: Some(i64::from(n % 5 + 1)),
                    title: Some(format!("Take {n}")),
                    text: Some("Racing".to_string()),
                };
                reviews.add(&caller, &book_id, draft).await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);

    let (_, detail) = app.get(&format!("/api/books/{book_id}")).await;
    assert_eq!(detail["data"]["reviewCount"], 1);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api/books").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/books/{id}"]["delete"].is_object());
    assert!(body["paths"]["/api/reviews/{id}"]["put"].is_object());
    assert!(body["components"]["schemas"]["Review"].is_object());
}
