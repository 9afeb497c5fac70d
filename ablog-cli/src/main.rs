use ablog_client::{
    AblogClientError, CreateCategoryRequest, CreatePostRequest, CreateTagRequest, HttpClient,
    ListPostsQuery, LoginRequest, Post, RegisterRequest, UpdatePostRequest, UpdateProfileRequest,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

mod token;

use token::TokenManager;

const DEFAULT_SERVER: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(author, version, about = "Command line client for the ABlog server", long_about = None)]
struct Cli {
    /// Server base URL (falls back to ABLOG_SERVER, then http://localhost:3000)
    #[arg(short, long)]
    server: Option<String>,

    /// Where the JWT is kept between runs (default ~/.ablog_token)
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and keep its token
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        full_name: Option<String>,
    },

    /// Sign in and keep the token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Show whether a token is stored
    Status,

    /// Forget the stored token
    Logout,

    /// Show the signed-in account
    Me,

    /// List published posts
    List {
        #[arg(short, long, default_value_t = 1)]
        page: i64,

        #[arg(short, long, default_value_t = 10)]
        limit: i64,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        search: Option<String>,

        /// Author id
        #[arg(long)]
        author: Option<i64>,

        /// Only my own posts, drafts included
        #[arg(long)]
        mine: bool,
    },

    /// Show a post by slug
    Get {
        #[arg(short, long)]
        slug: String,
    },

    Create {
        #[arg(short, long)]
        title: String,

        /// Markdown body
        #[arg(short, long)]
        content: Option<String>,

        /// Read the markdown body from a file
        #[arg(short, long, conflicts_with = "content")]
        file: Option<PathBuf>,

        #[arg(long)]
        excerpt: Option<String>,

        #[arg(long)]
        cover_image: Option<String>,

        /// published, draft or scheduled
        #[arg(long)]
        status: Option<String>,

        /// RFC 3339 timestamp for scheduled posts
        #[arg(long, value_parser = parse_datetime)]
        schedule: Option<DateTime<Utc>>,

        /// Category id, repeatable
        #[arg(long = "category")]
        categories: Vec<i64>,

        /// Tag name, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    Update {
        #[arg(short, long)]
        slug: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,

        #[arg(short, long, conflicts_with = "content")]
        file: Option<PathBuf>,

        #[arg(long)]
        excerpt: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long, value_parser = parse_datetime)]
        schedule: Option<DateTime<Utc>>,

        /// Replaces the categories when given
        #[arg(long = "category")]
        categories: Option<Vec<i64>>,

        /// Replaces the tags when given
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },

    Delete {
        #[arg(short, long)]
        slug: String,
    },

    /// List the comments of a post
    Comments {
        #[arg(short, long)]
        slug: String,
    },

    /// Comment on a post
    Comment {
        #[arg(short, long)]
        slug: String,

        #[arg(short, long)]
        content: String,
    },

    /// Edit one of your comments
    EditComment {
        #[arg(short, long)]
        id: i64,

        #[arg(short, long)]
        content: String,
    },

    DeleteComment {
        #[arg(short, long)]
        id: i64,
    },

    /// Like a post, or take the like back with --undo
    Like {
        #[arg(short, long)]
        slug: String,

        #[arg(long)]
        undo: bool,
    },

    /// Bookmark a post, or remove the bookmark with --undo
    Bookmark {
        #[arg(short, long)]
        slug: String,

        #[arg(long)]
        undo: bool,
    },

    /// List your bookmarked posts
    Bookmarks,

    /// Follow a user, or unfollow with --undo
    Follow {
        #[arg(short, long)]
        username: String,

        #[arg(long)]
        undo: bool,
    },

    /// Show a public profile with its followers
    Profile {
        #[arg(short, long)]
        username: String,
    },

    /// Update your own profile
    EditProfile {
        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        bio: Option<String>,

        #[arg(long)]
        website: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,
    },

    /// List categories, or create one with --name
    Categories {
        #[arg(long)]
        name: Option<String>,

        #[arg(long, requires = "name")]
        description: Option<String>,
    },

    /// List tags, or create one with --name
    Tags {
        #[arg(long)]
        name: Option<String>,
    },

    /// Render markdown through the server
    Preview {
        #[arg(short, long)]
        content: Option<String>,

        #[arg(short, long, conflicts_with = "content")]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let server = cli
        .server
        .clone()
        .or_else(|| std::env::var("ABLOG_SERVER").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let token_manager = TokenManager::new(cli.token_file.clone())?;
    let mut client = HttpClient::new(server);

    if let Some(token) = token_manager.load_token()? {
        client.set_token(token);
    }

    run(cli.command, cli.json, &mut client, &token_manager).await
}

async fn run(
    command: Commands,
    json: bool,
    client: &mut HttpClient,
    token_manager: &TokenManager,
) -> Result<()> {
    match command {
        Commands::Register {
            username,
            email,
            password,
            full_name,
        } => {
            println!("📝 Registering user: {}", username);

            let response = client
                .register(RegisterRequest {
                    email,
                    password,
                    username,
                    full_name,
                })
                .await
                .unwrap_or_else(|e| fail("Registration failed", e));

            token_manager.save_token(&response.token)?;
            println!("{}", "✅ Registration successful!".green());
            println!("   User ID: {}", response.user.id);
            println!("   Username: {}", response.user.username);
            println!("   Email: {}", response.user.email);
            println!("✓ Token saved to {:?}", token_manager.path());
        }

        Commands::Login { email, password } => {
            println!("🔑 Logging in as: {}", email);

            let response = client
                .login(LoginRequest { email, password })
                .await
                .unwrap_or_else(|e| fail("Login failed", e));

            token_manager.save_token(&response.token)?;
            println!("{}", "✅ Login successful!".green());
            println!("   User ID: {}", response.user.id);
            println!("   Username: {}", response.user.username);
            println!("✓ Token saved to {:?}", token_manager.path());
        }

        Commands::Status => match client.get_token() {
            Some(token) => {
                let preview: String = token.chars().take(20).collect();
                println!("🔑 Token file: {:?}", token_manager.path());
                println!("   Token: {}...", preview);
                println!("   Length: {} characters", token.len());
                println!("   Server: {}", client.base_url());
            }
            None => {
                println!("❌ No token found");
                println!("   Please login first: ablog-cli login --email <email> --password <password>");
            }
        },

        Commands::Logout => {
            client.clear_token();
            if token_manager.clear_token()? {
                println!("{}", "✅ Logged out, token file removed".green());
            } else {
                println!("Not logged in");
            }
        }

        Commands::Me => {
            let user = client.me().await.unwrap_or_else(|e| fail("Failed to load account", e));
            if json {
                return print_json(&user);
            }
            println!("👤 {} <{}>", user.username.bold(), user.email);
            if let Some(name) = &user.full_name {
                println!("   Name: {}", name);
            }
            println!("   Member since: {}", format_date(&user.created_at));
        }

        Commands::List {
            page,
            limit,
            category,
            tag,
            search,
            author,
            mine,
        } => {
            let result = if mine {
                client.my_posts(page, limit).await
            } else {
                let query = ListPostsQuery {
                    page: Some(page),
                    limit: Some(limit),
                    category,
                    tag,
                    search,
                    author,
                    include_scheduled: false,
                };
                client.list_posts(&query).await
            };
            let response = result.unwrap_or_else(|e| fail("Failed to list posts", e));

            if json {
                return print_json(&response.posts);
            }

            println!(
                "📋 Page {} of {} ({} posts total)",
                response.page,
                response.total_pages.max(1),
                response.total
            );
            println!();

            if response.posts.is_empty() {
                println!("   No posts found");
            } else {
                for post in &response.posts {
                    print_post_line(post);
                }
            }
        }

        Commands::Get { slug } => {
            let post = client
                .get_post(&slug)
                .await
                .unwrap_or_else(|e| fail(&format!("Failed to load post '{}'", slug), e));
            if json {
                return print_json(&post);
            }
            print_post(&post);

            let comments = client
                .list_comments(&slug)
                .await
                .unwrap_or_else(|e| fail("Failed to load comments", e));
            if !comments.is_empty() {
                println!();
                println!("💬 {} comments", comments.len());
                for comment in comments {
                    println!(
                        "   [{}] {} ({}): {}",
                        comment.id,
                        comment.author.username.bold(),
                        format_date(&comment.created_at),
                        truncate(&comment.content, 80)
                    );
                }
            }
        }

        Commands::Create {
            title,
            content,
            file,
            excerpt,
            cover_image,
            status,
            schedule,
            categories,
            tags,
        } => {
            let content = match read_content(content, file)? {
                Some(content) => content,
                None => bail!("Either --content or --file is required"),
            };

            println!("📝 Creating new post...");

            let post = client
                .create_post(&CreatePostRequest {
                    title,
                    content,
                    excerpt,
                    cover_image,
                    status,
                    scheduled_publish_date: schedule,
                    categories,
                    tags,
                })
                .await
                .unwrap_or_else(|e| fail("Failed to create post", e));

            if json {
                return print_json(&post);
            }
            println!("{}", "✅ Post created successfully!".green());
            println!("   Slug: {}", post.slug);
            println!("   Status: {}", post.status);
        }

        Commands::Update {
            slug,
            title,
            content,
            file,
            excerpt,
            status,
            schedule,
            categories,
            tags,
        } => {
            println!("✏️ Updating post '{}'", slug);

            let request = UpdatePostRequest {
                title,
                content: read_content(content, file)?,
                excerpt,
                cover_image: None,
                status,
                scheduled_publish_date: schedule,
                categories,
                tags,
            };

            let post = client
                .update_post(&slug, &request)
                .await
                .unwrap_or_else(|e| fail("Failed to update post", e));

            if json {
                return print_json(&post);
            }
            println!("{}", "✅ Post updated successfully!".green());
            println!("   Slug: {}", post.slug);
            println!("   Updated: {}", format_date(&post.updated_at));
        }

        Commands::Delete { slug } => {
            println!("🗑️ Deleting post '{}'", slug);

            client
                .delete_post(&slug)
                .await
                .unwrap_or_else(|e| fail("Failed to delete post", e));
            println!("{}", "✅ Post deleted successfully!".green());
        }

        Commands::Comments { slug } => {
            let comments = client
                .list_comments(&slug)
                .await
                .unwrap_or_else(|e| fail("Failed to load comments", e));
            if json {
                return print_json(&comments);
            }
            if comments.is_empty() {
                println!("   No comments yet");
            }
            for comment in comments {
                println!(
                    "[{}] {} ({})",
                    comment.id,
                    comment.author.username.bold(),
                    format_date(&comment.created_at)
                );
                println!("   {}", comment.content);
            }
        }

        Commands::Comment { slug, content } => {
            let comment = client
                .add_comment(&slug, &content)
                .await
                .unwrap_or_else(|e| fail("Failed to add comment", e));
            println!("{}", format!("✅ Comment #{} added", comment.id).green());
        }

        Commands::EditComment { id, content } => {
            client
                .update_comment(id, &content)
                .await
                .unwrap_or_else(|e| fail("Failed to update comment", e));
            println!("{}", format!("✅ Comment #{} updated", id).green());
        }

        Commands::DeleteComment { id } => {
            client
                .delete_comment(id)
                .await
                .unwrap_or_else(|e| fail("Failed to delete comment", e));
            println!("{}", format!("✅ Comment #{} deleted", id).green());
        }

        Commands::Like { slug, undo } => {
            let result = if undo {
                client.unlike_post(&slug).await
            } else {
                client.like_post(&slug).await
            };
            let status = result.unwrap_or_else(|e| fail("Failed to update like", e));
            let verb = if status.liked { "❤️ Liked" } else { "Unliked" };
            println!("{} '{}' ({} likes)", verb, slug, status.like_count);
        }

        Commands::Bookmark { slug, undo } => {
            let result = if undo {
                client.unbookmark_post(&slug).await
            } else {
                client.bookmark_post(&slug).await
            };
            let status = result.unwrap_or_else(|e| fail("Failed to update bookmark", e));
            if status.bookmarked {
                println!("🔖 Bookmarked '{}'", slug);
            } else {
                println!("Removed bookmark from '{}'", slug);
            }
        }

        Commands::Bookmarks => {
            let posts = client
                .my_bookmarks()
                .await
                .unwrap_or_else(|e| fail("Failed to load bookmarks", e));
            if json {
                return print_json(&posts);
            }
            if posts.is_empty() {
                println!("   No bookmarks yet");
            }
            for post in &posts {
                print_post_line(post);
            }
        }

        Commands::Follow { username, undo } => {
            let result = if undo {
                client.unfollow(&username).await
            } else {
                client.follow(&username).await
            };
            let status = result.unwrap_or_else(|e| fail("Failed to update follow", e));
            let verb = if status.following {
                "✅ Following"
            } else {
                "Unfollowed"
            };
            println!("{} {} ({} followers)", verb, username, status.follower_count);
        }

        Commands::Profile { username } => {
            let profile = client
                .profile(&username)
                .await
                .unwrap_or_else(|e| fail(&format!("Failed to load profile '{}'", username), e));
            if json {
                return print_json(&profile);
            }

            println!("👤 {}", profile.username.bold());
            if let Some(name) = &profile.full_name {
                println!("   Name: {}", name);
            }
            if let Some(bio) = &profile.bio {
                println!("   Bio: {}", bio);
            }
            if let Some(website) = &profile.website {
                println!("   Website: {}", website);
            }
            if let Some(location) = &profile.location {
                println!("   Location: {}", location);
            }
            println!(
                "   {} posts, {} followers, {} following",
                profile.post_count, profile.follower_count, profile.following_count
            );
            if let Some(following) = profile.is_following {
                println!("   You follow them: {}", if following { "yes" } else { "no" });
            }

            let followers = client
                .followers(&username)
                .await
                .unwrap_or_else(|e| fail("Failed to load followers", e));
            if !followers.is_empty() {
                let names: Vec<&str> = followers.iter().map(|u| u.username.as_str()).collect();
                println!("   Followers: {}", names.join(", "));
            }
        }

        Commands::EditProfile {
            full_name,
            bio,
            website,
            location,
            avatar_url,
        } => {
            let user = client
                .update_profile(&UpdateProfileRequest {
                    full_name,
                    avatar_url,
                    cover_image: None,
                    bio,
                    website,
                    location,
                })
                .await
                .unwrap_or_else(|e| fail("Failed to update profile", e));
            println!("{}", format!("✅ Profile of {} updated", user.username).green());
        }

        Commands::Categories { name, description } => {
            if let Some(name) = name {
                let category = client
                    .create_category(&CreateCategoryRequest { name, description })
                    .await
                    .unwrap_or_else(|e| fail("Failed to create category", e));
                println!(
                    "{}",
                    format!("✅ Category #{} '{}' created", category.id, category.slug).green()
                );
                return Ok(());
            }

            let categories = client
                .list_categories()
                .await
                .unwrap_or_else(|e| fail("Failed to list categories", e));
            if json {
                return print_json(&categories);
            }
            for category in categories {
                println!("   [{}] {} ({})", category.id, category.name, category.slug);
            }
        }

        Commands::Tags { name } => {
            if let Some(name) = name {
                let tag = client
                    .create_tag(&CreateTagRequest { name })
                    .await
                    .unwrap_or_else(|e| fail("Failed to create tag", e));
                println!("{}", format!("✅ Tag '{}' created", tag.slug).green());
                return Ok(());
            }

            let tags = client
                .list_tags()
                .await
                .unwrap_or_else(|e| fail("Failed to list tags", e));
            if json {
                return print_json(&tags);
            }
            let names: Vec<String> = tags.into_iter().map(|t| format!("#{}", t.slug)).collect();
            println!("   {}", names.join(" "));
        }

        Commands::Preview { content, file } => {
            let content = match read_content(content, file)? {
                Some(content) => content,
                None => bail!("Either --content or --file is required"),
            };
            let html = client
                .preview(&content)
                .await
                .unwrap_or_else(|e| fail("Preview failed", e));
            println!("{}", html);
        }
    }

    Ok(())
}

/// Prints the error with a hint and exits with status 1.
fn fail(action: &str, e: AblogClientError) -> ! {
    eprintln!("{} {}: {}", "❌".red(), action, e);
    if e.is_unauthorized() {
        eprintln!("   Please login first: ablog-cli login --email <email> --password <password>");
    } else if e.is_not_found() {
        eprintln!("   Tip: use 'list' to see available posts");
    }
    std::process::exit(1);
}

fn parse_datetime(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp such as 2025-01-31T09:00:00Z ({})", e))
}

fn read_content(content: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (content, file) {
        (Some(content), _) => Ok(Some(content)),
        (None, Some(path)) => fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {:?}", path)),
        (None, None) => Ok(None),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_post_line(post: &Post) {
    let author = post
        .author
        .as_ref()
        .map(|a| a.username.as_str())
        .unwrap_or("unknown");
    println!("   {} {}", post.title.bold(), format!("({})", post.slug).dimmed());
    println!(
        "      by {} on {} | ❤️ {} 💬 {}",
        author,
        format_date(&post.created_at),
        post.like_count,
        post.comment_count
    );
    if let Some(excerpt) = &post.excerpt {
        println!("      {}", truncate(excerpt, 80));
    }
    println!();
}

fn print_post(post: &Post) {
    println!("{}", post.title.bold());
    let author = post
        .author
        .as_ref()
        .map(|a| a.username.as_str())
        .unwrap_or("unknown");
    println!(
        "by {} on {} [{}]",
        author,
        format_date(&post.created_at),
        post.status
    );
    if let Some(date) = &post.scheduled_publish_date {
        println!("Scheduled for {}", format_date(date));
    }
    if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|t| format!("#{}", t.slug)).collect();
        println!("{}", tags.join(" ").cyan());
    }
    if !post.categories.is_empty() {
        let names: Vec<&str> = post.categories.iter().map(|c| c.name.as_str()).collect();
        println!("Categories: {}", names.join(", "));
    }
    println!();
    println!("{}", post.content);
    println!();
    println!("❤️ {}  💬 {}", post.like_count, post.comment_count);
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("привет мир", 6), "привет...");
    }

    #[test]
    fn schedule_must_be_rfc3339() {
        let parsed = parse_datetime("2025-01-31T12:00:00+03:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-01-31T09:00:00+00:00");
        assert!(parse_datetime("tomorrow").is_err());
    }

    #[test]
    fn repeatable_flags_collect_values() {
        let cli = Cli::try_parse_from([
            "ablog-cli", "create", "--title", "Hello", "--content", "Body", "--tag", "rust",
            "--tag", "web", "--category", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Create {
                tags, categories, ..
            } => {
                assert_eq!(tags, vec!["rust", "web"]);
                assert_eq!(categories, vec![2]);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn update_without_tags_leaves_them_alone() {
        let cli = Cli::try_parse_from(["ablog-cli", "update", "--slug", "hello", "--title", "New"])
            .unwrap();
        match cli.command {
            Commands::Update { tags, categories, .. } => {
                assert!(tags.is_none());
                assert!(categories.is_none());
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn content_comes_from_flag_or_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.md");
        fs::write(&path, "# From file").unwrap();

        assert_eq!(
            read_content(Some("inline".into()), None).unwrap().as_deref(),
            Some("inline")
        );
        assert_eq!(
            read_content(None, Some(path)).unwrap().as_deref(),
            Some("# From file")
        );
        assert_eq!(read_content(None, None).unwrap(), None);
    }
}
