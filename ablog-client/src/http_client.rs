use crate::error::AblogClientError;
use crate::models::*;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Обертки над полезной нагрузкой ответа: { "success": true, "post": {...} }
#[derive(Debug, Deserialize)]
struct UserBody {
    user: User,
}

#[derive(Debug, Deserialize)]
struct PostBody {
    post: Post,
}

#[derive(Debug, Deserialize)]
struct PostsBody {
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    comment: Comment,
}

#[derive(Debug, Deserialize)]
struct CommentsBody {
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct CategoryBody {
    category: Category,
}

#[derive(Debug, Deserialize)]
struct CategoriesBody {
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct TagBody {
    tag: Tag,
}

#[derive(Debug, Deserialize)]
struct TagsBody {
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    profile: Profile,
}

#[derive(Debug, Deserialize)]
struct UsersBody {
    users: Vec<AuthorSummary>,
}

#[derive(Debug, Deserialize)]
struct HtmlBody {
    html: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[derive(Serialize)]
struct PageParams {
    page: i64,
    limit: i64,
}

#[derive(Serialize)]
struct ContentBody<'a> {
    content: &'a str,
}

/// Typed client for the ABlog REST API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn add_auth_header(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.add_auth_header(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.add_auth_header(self.client.post(self.url(path)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.add_auth_header(self.client.put(self.url(path)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.add_auth_header(self.client.delete(self.url(path)))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AblogClientError> {
        let response = request.send().await?;
        handle_response(response).await
    }

    // ==================== Аутентификация ====================

    /// Registers an account and keeps the returned token for later calls.
    pub async fn register(&mut self, req: RegisterRequest) -> Result<AuthResponse, AblogClientError> {
        let auth: AuthResponse = self.send(self.post("/api/auth/register").json(&req)).await?;
        self.set_token(auth.token.clone());
        Ok(auth)
    }

    /// Signs in and keeps the returned token for later calls.
    pub async fn login(&mut self, req: LoginRequest) -> Result<AuthResponse, AblogClientError> {
        let auth: AuthResponse = self.send(self.post("/api/auth/login").json(&req)).await?;
        self.set_token(auth.token.clone());
        Ok(auth)
    }

    pub async fn me(&self) -> Result<User, AblogClientError> {
        let body: UserBody = self.send(self.get("/api/auth/me")).await?;
        Ok(body.user)
    }

    // ==================== Посты ====================

    pub async fn list_posts(&self, query: &ListPostsQuery) -> Result<PostPage, AblogClientError> {
        self.send(self.get("/api/posts").query(query)).await
    }

    pub async fn get_post(&self, slug: &str) -> Result<Post, AblogClientError> {
        let body: PostBody = self.send(self.get(&format!("/api/posts/{}", slug))).await?;
        Ok(body.post)
    }

    pub async fn create_post(&self, req: &CreatePostRequest) -> Result<Post, AblogClientError> {
        let body: PostBody = self.send(self.post("/api/posts").json(req)).await?;
        Ok(body.post)
    }

    pub async fn update_post(
        &self,
        slug: &str,
        req: &UpdatePostRequest,
    ) -> Result<Post, AblogClientError> {
        let body: PostBody = self
            .send(self.put(&format!("/api/posts/{}", slug)).json(req))
            .await?;
        Ok(body.post)
    }

    pub async fn delete_post(&self, slug: &str) -> Result<(), AblogClientError> {
        let _: Empty = self.send(self.delete(&format!("/api/posts/{}", slug))).await?;
        Ok(())
    }

    pub async fn like_post(&self, slug: &str) -> Result<LikeStatus, AblogClientError> {
        self.send(self.post(&format!("/api/posts/{}/like", slug))).await
    }

    pub async fn unlike_post(&self, slug: &str) -> Result<LikeStatus, AblogClientError> {
        self.send(self.delete(&format!("/api/posts/{}/like", slug))).await
    }

    pub async fn bookmark_post(&self, slug: &str) -> Result<BookmarkStatus, AblogClientError> {
        self.send(self.post(&format!("/api/posts/{}/bookmark", slug))).await
    }

    pub async fn unbookmark_post(&self, slug: &str) -> Result<BookmarkStatus, AblogClientError> {
        self.send(self.delete(&format!("/api/posts/{}/bookmark", slug)))
            .await
    }

    pub async fn my_posts(&self, page: i64, limit: i64) -> Result<PostPage, AblogClientError> {
        self.send(self.get("/api/me/posts").query(&PageParams { page, limit }))
            .await
    }

    pub async fn my_bookmarks(&self) -> Result<Vec<Post>, AblogClientError> {
        let body: PostsBody = self.send(self.get("/api/me/bookmarks")).await?;
        Ok(body.posts)
    }

    /// Renders markdown the way the server renders post bodies.
    pub async fn preview(&self, content: &str) -> Result<String, AblogClientError> {
        let body: HtmlBody = self
            .send(self.post("/api/preview").json(&ContentBody { content }))
            .await?;
        Ok(body.html)
    }

    // ==================== Комментарии ====================

    pub async fn list_comments(&self, slug: &str) -> Result<Vec<Comment>, AblogClientError> {
        let body: CommentsBody = self
            .send(self.get(&format!("/api/posts/{}/comments", slug)))
            .await?;
        Ok(body.comments)
    }

    pub async fn add_comment(&self, slug: &str, content: &str) -> Result<Comment, AblogClientError> {
        let body: CommentBody = self
            .send(
                self.post(&format!("/api/posts/{}/comments", slug))
                    .json(&ContentBody { content }),
            )
            .await?;
        Ok(body.comment)
    }

    pub async fn update_comment(&self, id: i64, content: &str) -> Result<Comment, AblogClientError> {
        let body: CommentBody = self
            .send(
                self.put(&format!("/api/comments/{}", id))
                    .json(&ContentBody { content }),
            )
            .await?;
        Ok(body.comment)
    }

    pub async fn delete_comment(&self, id: i64) -> Result<(), AblogClientError> {
        let _: Empty = self.send(self.delete(&format!("/api/comments/{}", id))).await?;
        Ok(())
    }

    // ==================== Категории и теги ====================

    pub async fn list_categories(&self) -> Result<Vec<Category>, AblogClientError> {
        let body: CategoriesBody = self.send(self.get("/api/categories")).await?;
        Ok(body.categories)
    }

    pub async fn create_category(
        &self,
        req: &CreateCategoryRequest,
    ) -> Result<Category, AblogClientError> {
        let body: CategoryBody = self.send(self.post("/api/categories").json(req)).await?;
        Ok(body.category)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, AblogClientError> {
        let body: TagsBody = self.send(self.get("/api/tags")).await?;
        Ok(body.tags)
    }

    pub async fn create_tag(&self, req: &CreateTagRequest) -> Result<Tag, AblogClientError> {
        let body: TagBody = self.send(self.post("/api/tags").json(req)).await?;
        Ok(body.tag)
    }

    // ==================== Пользователи ====================

    pub async fn profile(&self, username: &str) -> Result<Profile, AblogClientError> {
        let body: ProfileBody = self.send(self.get(&format!("/api/users/{}", username))).await?;
        Ok(body.profile)
    }

    pub async fn followers(&self, username: &str) -> Result<Vec<AuthorSummary>, AblogClientError> {
        let body: UsersBody = self
            .send(self.get(&format!("/api/users/{}/followers", username)))
            .await?;
        Ok(body.users)
    }

    pub async fn following(&self, username: &str) -> Result<Vec<AuthorSummary>, AblogClientError> {
        let body: UsersBody = self
            .send(self.get(&format!("/api/users/{}/following", username)))
            .await?;
        Ok(body.users)
    }

    pub async fn follow(&self, username: &str) -> Result<FollowStatus, AblogClientError> {
        self.send(self.post(&format!("/api/users/{}/follow", username)))
            .await
    }

    pub async fn unfollow(&self, username: &str) -> Result<FollowStatus, AblogClientError> {
        self.send(self.delete(&format!("/api/users/{}/follow", username)))
            .await
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<User, AblogClientError> {
        let body: UserBody = self.send(self.put("/api/me/profile").json(req)).await?;
        Ok(body.user)
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, AblogClientError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::debug!("Request failed with HTTP {}: {}", status, text);
        return Err(AblogClientError::from_response(status, &text));
    }

    decode_success(&text)
}

/// Decodes the payload of a success envelope; `success` itself is ignored.
fn decode_success<T: DeserializeOwned>(text: &str) -> Result<T, AblogClientError> {
    serde_json::from_str(text).map_err(|e| AblogClientError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let client = HttpClient::new("http://localhost:3000/");
        assert_eq!(client.url("/api/posts"), "http://localhost:3000/api/posts");
        assert_eq!(client.url("api/tags"), "http://localhost:3000/api/tags");
    }

    #[test]
    fn bearer_token_is_attached_once_set() {
        let mut client = HttpClient::new("http://localhost:3000");
        let anonymous = client.get("/api/auth/me").build().unwrap();
        assert!(anonymous.headers().get("authorization").is_none());

        client.set_token("abc".into());
        let authed = client.get("/api/auth/me").build().unwrap();
        assert_eq!(authed.headers()["authorization"], "Bearer abc");

        client.clear_token();
        assert!(client.get_token().is_none());
    }

    #[test]
    fn list_query_uses_server_parameter_names() {
        let client = HttpClient::new("http://localhost:3000");
        let query = ListPostsQuery {
            page: Some(2),
            tag: Some("rust".into()),
            include_scheduled: true,
            ..Default::default()
        };
        let request = client.get("/api/posts").query(&query).build().unwrap();
        assert_eq!(
            request.url().query(),
            Some("page=2&tag=rust&includeScheduled=true")
        );
    }

    #[test]
    fn decodes_success_envelopes() {
        let page: PostPage = decode_success(
            r#"{"success":true,"posts":[],"total":0,"page":1,"limit":10,"totalPages":0}"#,
        )
        .unwrap();
        assert_eq!(page.total_pages, 0);

        let like: LikeStatus =
            decode_success(r#"{"success":true,"liked":true,"like_count":3}"#).unwrap();
        assert_eq!(
            like,
            LikeStatus {
                liked: true,
                like_count: 3
            }
        );

        let _: Empty = decode_success(r#"{"success":true}"#).unwrap();
    }

    #[test]
    fn decodes_wrapped_post() {
        let body: PostBody = decode_success(
            r#"{"success":true,"post":{"id":1,"title":"Hello","slug":"hello","content":"Hi",
            "content_html":"<p>Hi</p>","excerpt":"Hi","cover_image":null,"author_id":7,
            "author":{"id":7,"username":"ann","full_name":null,"avatar_url":null},
            "status":"published","scheduled_publish_date":null,"categories":[],
            "tags":[{"id":1,"name":"Rust","slug":"rust"}],"like_count":0,"comment_count":0,
            "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        assert_eq!(body.post.slug, "hello");
        assert_eq!(body.post.liked, None);
        assert_eq!(body.post.tags[0].slug, "rust");
    }

    /// Answers exactly one request with the given status line and JSON body.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // headers, then as many body bytes as content-length announces
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let expected = text[..end]
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + expected {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn login_keeps_the_returned_token() {
        let base = serve_once(
            "200 OK",
            r#"{"success":true,"token":"jwt-token","user":{"id":1,"email":"ann@example.com",
            "username":"ann","full_name":null,"avatar_url":null,"cover_image":null,"bio":null,
            "website":null,"location":null,"created_at":"2024-01-01T00:00:00Z"}}"#,
        )
        .await;
        let mut client = HttpClient::new(base);

        let auth = client
            .login(LoginRequest {
                email: "ann@example.com".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();

        assert_eq!(auth.user.username, "ann");
        assert_eq!(client.get_token().map(String::as_str), Some("jwt-token"));
    }

    #[tokio::test]
    async fn failure_envelope_becomes_typed_error() {
        let base = serve_once(
            "404 Not Found",
            r#"{"success":false,"error":"Post not found"}"#,
        )
        .await;
        let client = HttpClient::new(base);

        let err = client.get_post("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: Post not found");
    }

    #[tokio::test]
    async fn unwraps_list_payloads() {
        let base = serve_once(
            "200 OK",
            r#"{"success":true,"tags":[{"id":1,"name":"Rust","slug":"rust"},{"id":2,"name":"Web","slug":"web"}]}"#,
        )
        .await;
        let client = HttpClient::new(base);

        let tags = client.list_tags().await.unwrap();
        let slugs: Vec<&str> = tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["rust", "web"]);
    }

    #[tokio::test]
    async fn unreachable_server_is_an_http_error() {
        let client = HttpClient::new("http://127.0.0.1:9");
        let err = client.list_tags().await.unwrap_err();
        assert!(matches!(err, AblogClientError::HttpError(_)));
    }

    #[test]
    fn malformed_success_body_is_a_serialization_error() {
        let err = decode_success::<PostBody>(r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, AblogClientError::SerializationError(_)));
    }
}
