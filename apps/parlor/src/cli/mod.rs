//! # Parlor CLI Module
//!
//! Command-line access to every engine operation.
//!
//! Commands act as the signed-in user (the current-session marker in the
//! store) unless `--as <user-id>` names someone else.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `register` / `login` / `logout` / `whoami` / `profile` / `edit-profile`
//! - `follow` / `discover` / `followers` / `following`
//! - `post` / `like` / `comment` / `view` / `feed`
//! - `videos` / `publish-video` / `bookmark`
//! - `chats` / `messages` / `send`
//! - `notifications` / `alert`
//! - `watch` - Poll for new messages and notifications
//! - `init` / `status` / `export` / `import` / `hash`

mod commands;

use clap::{Parser, Subcommand};
use parlor_core::ParlorError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Parlor - local-first social network
///
/// Profiles, follows, posts, videos, direct messages and notifications,
/// all kept in one local store.
#[derive(Parser, Debug)]
#[command(name = "parlor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database
    #[arg(short = 'D', long, global = true, default_value = "parlor.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "file" (snapshot file)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Optional TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Act as this user id instead of the signed-in one
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    pub as_user: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    // ---- identity ----------------------------------------------------------
    /// Create an account and sign in
    Register {
        name: String,
        email: String,
        password: String,
    },

    /// Sign in
    Login { email: String, password: String },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show a profile and its posts (default: yourself)
    Profile {
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Edit your profile; omitted fields stay unchanged
    EditProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },

    // ---- social graph ------------------------------------------------------
    /// Follow a user, or unfollow if already following
    Follow { target: String },

    /// Find users by name or id
    Discover {
        #[arg(default_value = "")]
        query: String,
    },

    /// List a user's followers (default: yours)
    Followers {
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List who a user follows (default: you)
    Following {
        #[arg(short, long)]
        user: Option<String>,
    },

    // ---- content -----------------------------------------------------------
    /// Publish a post
    Post {
        #[arg(default_value = "")]
        text: String,

        /// Image reference attached to the post
        #[arg(short, long)]
        image: Option<String>,
    },

    /// Like a post, or unlike if already liked
    Like { post: String },

    /// Comment on a post
    Comment { post: String, text: String },

    /// Count one impression of a post
    View { post: String },

    /// Show all posts, newest first
    Feed,

    /// Show the video catalogue
    Videos,

    /// Publish a video
    PublishVideo {
        title: String,
        video_ref: String,
        #[arg(short, long, default_value = "")]
        thumbnail: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Bookmark a video, or remove the bookmark
    Bookmark { video: String },

    // ---- conversations -----------------------------------------------------
    /// List conversations, optionally filtered by peer name
    Chats {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show the thread with one peer
    Messages { peer: String },

    /// Send a direct message
    Send { to: String, text: String },

    // ---- notifications -----------------------------------------------------
    /// List notifications
    Notifications {
        /// Mark everything read afterwards
        #[arg(long)]
        mark_read: bool,
    },

    /// Send a direct alert to a user
    Alert {
        recipient: String,
        title: String,
        body: String,
        #[arg(long)]
        icon: Option<String>,
    },

    /// Poll for new messages and notifications until Ctrl-C
    Watch {
        /// Interval in milliseconds (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many refreshes
        #[arg(long)]
        ticks: Option<u64>,
    },

    // ---- maintenance -------------------------------------------------------
    /// Show record counts per collection
    Status,

    /// Export all collections as a snapshot file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the store contents with a snapshot file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Compute BLAKE3 cryptographic hash of the store
    Hash,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ParlorError> {
    let ctx = CliContext::from_cli(&cli)?;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, host, port).await,
        Some(Commands::Register {
            name,
            email,
            password,
        }) => cmd_register(&ctx, &name, &email, &password).await,
        Some(Commands::Login { email, password }) => cmd_login(&ctx, &email, &password).await,
        Some(Commands::Logout) => cmd_logout(&ctx),
        Some(Commands::Whoami) => cmd_whoami(&ctx),
        Some(Commands::Profile { user }) => cmd_profile(&ctx, user.as_deref()),
        Some(Commands::EditProfile {
            name,
            bio,
            city,
            avatar,
        }) => cmd_edit_profile(&ctx, name, bio, city, avatar),
        Some(Commands::Follow { target }) => cmd_follow(&ctx, &target),
        Some(Commands::Discover { query }) => cmd_discover(&ctx, &query),
        Some(Commands::Followers { user }) => cmd_connections(&ctx, user.as_deref(), true),
        Some(Commands::Following { user }) => cmd_connections(&ctx, user.as_deref(), false),
        Some(Commands::Post { text, image }) => cmd_post(&ctx, &text, image.as_deref()),
        Some(Commands::Like { post }) => cmd_like(&ctx, &post),
        Some(Commands::Comment { post, text }) => cmd_comment(&ctx, &post, &text),
        Some(Commands::View { post }) => cmd_view(&ctx, &post),
        Some(Commands::Feed) => cmd_feed(&ctx),
        Some(Commands::Videos) => cmd_videos(&ctx),
        Some(Commands::PublishVideo {
            title,
            video_ref,
            thumbnail,
            description,
        }) => cmd_publish_video(&ctx, &title, &video_ref, &thumbnail, &description),
        Some(Commands::Bookmark { video }) => cmd_bookmark(&ctx, &video),
        Some(Commands::Chats { search }) => cmd_chats(&ctx, search.as_deref()),
        Some(Commands::Messages { peer }) => cmd_messages(&ctx, &peer),
        Some(Commands::Send { to, text }) => cmd_send(&ctx, &to, &text),
        Some(Commands::Notifications { mark_read }) => cmd_notifications(&ctx, mark_read),
        Some(Commands::Alert {
            recipient,
            title,
            body,
            icon,
        }) => cmd_alert(&ctx, &recipient, &title, &body, icon.as_deref()),
        Some(Commands::Watch { interval, ticks }) => cmd_watch(&ctx, interval, ticks).await,
        Some(Commands::Export { output }) => cmd_export(&ctx, &output),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Hash) => cmd_hash(&ctx),
        Some(Commands::Status) | None => cmd_status(&ctx),
    }
}
