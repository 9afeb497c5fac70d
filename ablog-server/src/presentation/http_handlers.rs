use crate::application::markdown::render_markdown;
use crate::application::{AuthService, BlogService, CommentService, TaxonomyService, UserService};
use crate::domain::comment::{CreateCommentRequest, UpdateCommentRequest};
use crate::domain::post::{CreatePostRequest, PostListQuery, UpdatePostRequest};
use crate::domain::taxonomy::{CreateCategoryRequest, CreateTagRequest};
use crate::domain::user::{
    LoginUserRequest, RegisterUserRequest, UpdateProfileRequest, UserResponse,
};
use crate::presentation::middleware::AuthUser;
use crate::presentation::response::{created, ok, ApiError};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

type HandlerResult = Result<HttpResponse, ApiError>;

// Ответ на регистрацию и вход
#[derive(Serialize)]
struct AuthResponse {
    token: String,
    user: UserResponse,
}

// Пагинация для /api/me/posts
#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct PreviewRequest {
    pub content: String,
}

fn viewer_id(user: &Option<AuthUser>) -> Option<i64> {
    user.as_ref().map(|u| u.id)
}

// ============== Auth Handlers ==============

pub async fn register(
    auth_service: web::Data<Arc<AuthService>>,
    req: web::Json<RegisterUserRequest>,
) -> HandlerResult {
    let (token, user) = auth_service.register(req.into_inner()).await?;
    Ok(created(AuthResponse { token, user }))
}

pub async fn login(
    auth_service: web::Data<Arc<AuthService>>,
    req: web::Json<LoginUserRequest>,
) -> HandlerResult {
    let (token, user) = auth_service.login(req.into_inner()).await?;
    Ok(ok(AuthResponse { token, user }))
}

pub async fn me(auth_service: web::Data<Arc<AuthService>>, user: AuthUser) -> HandlerResult {
    let user = auth_service.current_user(user.id).await?;
    Ok(ok(json!({ "user": user })))
}

// ============== Post Handlers ==============

pub async fn list_posts(
    blog_service: web::Data<Arc<BlogService>>,
    query: web::Query<PostListQuery>,
    user: Option<AuthUser>,
) -> HandlerResult {
    let page = blog_service
        .list_posts(query.into_inner(), viewer_id(&user))
        .await?;
    Ok(ok(page))
}

pub async fn get_post(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<String>,
    user: Option<AuthUser>,
) -> HandlerResult {
    let slug = path.into_inner();
    tracing::debug!("Getting post with slug={}", slug);

    let post = blog_service.get_post(&slug, viewer_id(&user)).await?;
    Ok(ok(json!({ "post": post })))
}

pub async fn create_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    post_data: web::Json<CreatePostRequest>,
) -> HandlerResult {
    let post = blog_service
        .create_post(user.id, post_data.into_inner())
        .await?;
    Ok(created(json!({ "post": post })))
}

pub async fn update_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    path: web::Path<String>,
    post_data: web::Json<UpdatePostRequest>,
) -> HandlerResult {
    let post = blog_service
        .update_post(&path.into_inner(), user.id, post_data.into_inner())
        .await?;
    Ok(ok(json!({ "post": post })))
}

pub async fn delete_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    blog_service.delete_post(&path.into_inner(), user.id).await?;
    Ok(ok(json!({})))
}

pub async fn like_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    let status = blog_service.like_post(&path.into_inner(), user.id).await?;
    Ok(ok(status))
}

pub async fn unlike_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    let status = blog_service.unlike_post(&path.into_inner(), user.id).await?;
    Ok(ok(status))
}

pub async fn bookmark_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    let status = blog_service
        .bookmark_post(&path.into_inner(), user.id)
        .await?;
    Ok(ok(status))
}

pub async fn unbookmark_post(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    let status = blog_service
        .unbookmark_post(&path.into_inner(), user.id)
        .await?;
    Ok(ok(status))
}

pub async fn preview(req: web::Json<PreviewRequest>) -> HandlerResult {
    Ok(ok(json!({ "html": render_markdown(&req.content) })))
}

// ============== Comment Handlers ==============

pub async fn list_comments(
    comment_service: web::Data<Arc<CommentService>>,
    path: web::Path<String>,
    user: Option<AuthUser>,
) -> HandlerResult {
    let comments = comment_service
        .list_comments(&path.into_inner(), viewer_id(&user))
        .await?;
    Ok(ok(json!({ "comments": comments })))
}

pub async fn add_comment(
    comment_service: web::Data<Arc<CommentService>>,
    user: AuthUser,
    path: web::Path<String>,
    req: web::Json<CreateCommentRequest>,
) -> HandlerResult {
    let comment = comment_service
        .add_comment(&path.into_inner(), user.id, req.into_inner())
        .await?;
    Ok(created(json!({ "comment": comment })))
}

pub async fn update_comment(
    comment_service: web::Data<Arc<CommentService>>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<UpdateCommentRequest>,
) -> HandlerResult {
    let comment = comment_service
        .update_comment(path.into_inner(), user.id, req.into_inner())
        .await?;
    Ok(ok(json!({ "comment": comment })))
}

pub async fn delete_comment(
    comment_service: web::Data<Arc<CommentService>>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HandlerResult {
    comment_service
        .delete_comment(path.into_inner(), user.id)
        .await?;
    Ok(ok(json!({})))
}

// ============== Category / Tag Handlers ==============

pub async fn list_categories(taxonomy_service: web::Data<Arc<TaxonomyService>>) -> HandlerResult {
    let categories = taxonomy_service.list_categories().await?;
    Ok(ok(json!({ "categories": categories })))
}

pub async fn create_category(
    taxonomy_service: web::Data<Arc<TaxonomyService>>,
    _user: AuthUser,
    req: web::Json<CreateCategoryRequest>,
) -> HandlerResult {
    let category = taxonomy_service.create_category(req.into_inner()).await?;
    Ok(created(json!({ "category": category })))
}

pub async fn list_tags(taxonomy_service: web::Data<Arc<TaxonomyService>>) -> HandlerResult {
    let tags = taxonomy_service.list_tags().await?;
    Ok(ok(json!({ "tags": tags })))
}

pub async fn create_tag(
    taxonomy_service: web::Data<Arc<TaxonomyService>>,
    _user: AuthUser,
    req: web::Json<CreateTagRequest>,
) -> HandlerResult {
    let tag = taxonomy_service.create_tag(req.into_inner()).await?;
    Ok(created(json!({ "tag": tag })))
}

// ============== User Handlers ==============

pub async fn get_profile(
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<String>,
    user: Option<AuthUser>,
) -> HandlerResult {
    let profile = user_service
        .profile(&path.into_inner(), viewer_id(&user))
        .await?;
    Ok(ok(json!({ "profile": profile })))
}

pub async fn followers(
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<String>,
) -> HandlerResult {
    let users = user_service.followers(&path.into_inner()).await?;
    Ok(ok(json!({ "users": users })))
}

pub async fn following(
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<String>,
) -> HandlerResult {
    let users = user_service.following(&path.into_inner()).await?;
    Ok(ok(json!({ "users": users })))
}

pub async fn follow(
    user_service: web::Data<Arc<UserService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    let status = user_service.follow(user.id, &path.into_inner()).await?;
    Ok(ok(status))
}

pub async fn unfollow(
    user_service: web::Data<Arc<UserService>>,
    user: AuthUser,
    path: web::Path<String>,
) -> HandlerResult {
    let status = user_service.unfollow(user.id, &path.into_inner()).await?;
    Ok(ok(status))
}

// ============== Current User Handlers ==============

pub async fn update_profile(
    user_service: web::Data<Arc<UserService>>,
    user: AuthUser,
    req: web::Json<UpdateProfileRequest>,
) -> HandlerResult {
    let updated = user_service.update_profile(user.id, req.into_inner()).await?;
    Ok(ok(json!({ "user": updated })))
}

pub async fn my_posts(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
    query: web::Query<PageQuery>,
) -> HandlerResult {
    let page = blog_service
        .list_my_posts(user.id, query.page, query.limit)
        .await?;
    Ok(ok(page))
}

pub async fn my_bookmarks(
    blog_service: web::Data<Arc<BlogService>>,
    user: AuthUser,
) -> HandlerResult {
    let posts = blog_service.bookmarked_posts(user.id).await?;
    Ok(ok(json!({ "posts": posts })))
}
