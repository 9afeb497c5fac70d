use crate::application::AppServices;
use crate::domain::DomainError;
use crate::presentation::http_handlers as h;
use crate::presentation::response::ApiError;
use actix_web::web;

/// Registers the services as app data and mounts every `/api` route.
pub fn configure(cfg: &mut web::ServiceConfig, services: &AppServices) {
    cfg.app_data(web::Data::new(services.jwt.clone()))
        .app_data(web::Data::new(services.auth.clone()))
        .app_data(web::Data::new(services.blog.clone()))
        .app_data(web::Data::new(services.comments.clone()))
        .app_data(web::Data::new(services.taxonomy.clone()))
        .app_data(web::Data::new(services.users.clone()))
        // malformed bodies and query strings get the failure envelope too
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            ApiError(DomainError::ValidationError(err.to_string())).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            ApiError(DomainError::ValidationError(err.to_string())).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|err, _req| {
            ApiError(DomainError::ValidationError(err.to_string())).into()
        }))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(h::register))
                        .route("/login", web::post().to(h::login))
                        .route("/me", web::get().to(h::me)),
                )
                .service(
                    web::scope("/posts")
                        .route("", web::get().to(h::list_posts))
                        .route("", web::post().to(h::create_post))
                        .route("/{slug}", web::get().to(h::get_post))
                        .route("/{slug}", web::put().to(h::update_post))
                        .route("/{slug}", web::delete().to(h::delete_post))
                        .route("/{slug}/comments", web::get().to(h::list_comments))
                        .route("/{slug}/comments", web::post().to(h::add_comment))
                        .route("/{slug}/like", web::post().to(h::like_post))
                        .route("/{slug}/like", web::delete().to(h::unlike_post))
                        .route("/{slug}/bookmark", web::post().to(h::bookmark_post))
                        .route("/{slug}/bookmark", web::delete().to(h::unbookmark_post)),
                )
                .service(
                    web::scope("/comments")
                        .route("/{id}", web::put().to(h::update_comment))
                        .route("/{id}", web::delete().to(h::delete_comment)),
                )
                .route("/categories", web::get().to(h::list_categories))
                .route("/categories", web::post().to(h::create_category))
                .route("/tags", web::get().to(h::list_tags))
                .route("/tags", web::post().to(h::create_tag))
                .service(
                    web::scope("/users")
                        .route("/{username}", web::get().to(h::get_profile))
                        .route("/{username}/followers", web::get().to(h::followers))
                        .route("/{username}/following", web::get().to(h::following))
                        .route("/{username}/follow", web::post().to(h::follow))
                        .route("/{username}/follow", web::delete().to(h::unfollow)),
                )
                .service(
                    web::scope("/me")
                        .route("/profile", web::put().to(h::update_profile))
                        .route("/posts", web::get().to(h::my_posts))
                        .route("/bookmarks", web::get().to(h::my_bookmarks)),
                )
                .route("/preview", web::post().to(h::preview)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Fixture;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    macro_rules! send {
        ($app:expr, $req:expr) => {{
            let resp = test::call_service(&$app, $req.to_request()).await;
            let status: StatusCode = resp.status();
            let body: Value = test::read_body_json(resp).await;
            (status, body)
        }};
    }

    macro_rules! register {
        ($app:expr, $username:expr) => {{
            let username: &str = $username;
            let (status, body) = send!(
                $app,
                test::TestRequest::post()
                    .uri("/api/auth/register")
                    .set_json(json!({
                        "email": format!("{}@example.com", username),
                        "password": "secret123",
                        "username": username,
                    }))
            );
            assert_eq!(status, StatusCode::CREATED);
            body["token"].as_str().unwrap().to_string()
        }};
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    #[actix_rt::test]
    async fn auth_flow_and_uniform_login_failure() {
        let services = Fixture::in_memory();
        let app =
            test::init_service(App::new().configure(|cfg| configure(cfg, &services))).await;

        let token = register!(app, "ann");

        let (status, body) = send!(
            app,
            test::TestRequest::get()
                .uri("/api/auth/me")
                .insert_header(bearer(&token))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "ann");
        assert!(body["user"].get("password_hash").is_none());

        let (wrong_status, wrong_body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({ "email": "ann@example.com", "password": "nope-nope" }))
        );
        let (unknown_status, unknown_body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({ "email": "zed@example.com", "password": "secret123" }))
        );

        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            wrong_body,
            json!({ "success": false, "error": "Invalid email or password" })
        );
        assert_eq!(wrong_body, unknown_body);
    }

    #[actix_rt::test]
    async fn protected_routes_need_a_valid_token() {
        let services = Fixture::in_memory();
        let app =
            test::init_service(App::new().configure(|cfg| configure(cfg, &services))).await;

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/posts")
                .set_json(json!({ "title": "t", "content": "c" }))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send!(
            app,
            test::TestRequest::get()
                .uri("/api/me/posts")
                .insert_header(bearer("garbage"))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn post_lifecycle_over_http() {
        let services = Fixture::in_memory();
        let app =
            test::init_service(App::new().configure(|cfg| configure(cfg, &services))).await;
        let ann = register!(app, "ann");
        let bob = register!(app, "bob");

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/posts")
                .insert_header(bearer(&ann))
                .set_json(json!({
                    "title": "First Post",
                    "content": "Hello **world**",
                    "tags": ["rust"],
                }))
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post"]["slug"], "first-post");
        assert_eq!(
            body["post"]["content_html"],
            "<p>Hello <strong>world</strong></p>\n"
        );

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/api/posts?page=1&limit=5&tag=rust")
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["totalPages"], 1);
        assert!(body["posts"][0].get("liked").is_none());

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/posts/first-post/like")
                .insert_header(bearer(&bob))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "liked": true, "like_count": 1 })
        );

        let (status, _) = send!(
            app,
            test::TestRequest::put()
                .uri("/api/posts/first-post")
                .insert_header(bearer(&bob))
                .set_json(json!({ "title": "Stolen" }))
        );
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send!(
            app,
            test::TestRequest::delete()
                .uri("/api/posts/first-post")
                .insert_header(bearer(&ann))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, body) = send!(app, test::TestRequest::get().uri("/api/posts/first-post"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Post not found");
    }

    #[actix_rt::test]
    async fn bad_input_gets_the_failure_envelope() {
        let services = Fixture::in_memory();
        let app =
            test::init_service(App::new().configure(|cfg| configure(cfg, &services))).await;
        let ann = register!(app, "ann");

        let (status, body) = send!(app, test::TestRequest::get().uri("/api/posts?limit=500"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/auth/login")
                .insert_header(("Content-Type", "application/json"))
                .set_payload("{not json")
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/users/ann/follow")
                .insert_header(bearer(&ann))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "You cannot follow yourself");
    }

    #[actix_rt::test]
    async fn out_of_range_pages() {
        let services = Fixture::in_memory();
        let app =
            test::init_service(App::new().configure(|cfg| configure(cfg, &services))).await;
        let ann = register!(app, "ann");

        let (status, _) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/posts")
                .insert_header(bearer(&ann))
                .set_json(json!({ "title": "Only Post", "content": "Body" }))
        );
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/api/posts?page=9223372036854775807&limit=10")
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Page is out of range");

        let (status, body) = send!(
            app,
            test::TestRequest::get()
                .uri("/api/me/posts?page=9223372036854775807")
                .insert_header(bearer(&ann))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = send!(app, test::TestRequest::get().uri("/api/posts?page=3&limit=10"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["posts"], json!([]));
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 3);
        assert_eq!(body["totalPages"], 1);
    }

    #[actix_rt::test]
    async fn preview_escapes_raw_html() {
        let services = Fixture::in_memory();
        let app =
            test::init_service(App::new().configure(|cfg| configure(cfg, &services))).await;

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/api/preview")
                .set_json(json!({ "content": "<b>hi</b> [x](javascript:alert(1))" }))
        );
        assert_eq!(status, StatusCode::OK);
        let html = body["html"].as_str().unwrap();
        assert!(html.starts_with("<p>&lt;b&gt;hi&lt;/b&gt;"));
        assert!(!html.contains("href"));
    }
}
