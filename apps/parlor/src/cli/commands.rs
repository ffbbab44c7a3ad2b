//! # CLI Command Implementations
//!
//! Every command opens the store, runs one engine operation, persists the
//! result for the file backend, and prints either text or `--json-mode`
//! JSON.

use crate::alerts::console_sink;
use crate::api::{
    self, AppState, ConversationJson, FollowResponse, UserJson, UsersResponse, outcome_label,
};
use crate::config::ParlorConfig;
use crate::poll;
use parlor_core::primitives::{LOGIN_LATENCY, SIGNUP_LATENCY};
use parlor_core::{
    AlertMeta, Identity, MemoryStore, Network, ParlorError, Post, PostId, ProfileUpdate,
    StorageBackend, User, UserId, VideoId, export_snapshot, import_snapshot, snapshot_checksum,
    snapshot_crypto_hash,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum snapshot size accepted by `import` and the file backend (500 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 500 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), ParlorError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ParlorError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(ParlorError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, ParlorError> {
    let canonical = path.canonicalize().map_err(|e| {
        ParlorError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(ParlorError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Resolve the parent of `path`, which must be an existing directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, ParlorError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        ParlorError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(ParlorError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| ParlorError::IoError("Output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Where the store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// redb database file.
    Redb,
    /// In-memory store loaded from and saved to a snapshot file.
    File,
}

impl Backend {
    pub fn parse(name: &str) -> Result<Self, ParlorError> {
        match name {
            "redb" => Ok(Self::Redb),
            "file" => Ok(Self::File),
            other => Err(ParlorError::SerializationError(format!(
                "Unknown backend: {}. Use: redb, file",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
        }
    }
}

/// Global flags resolved once per invocation.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub database: PathBuf,
    pub backend: Backend,
    pub config: ParlorConfig,
    pub as_user: Option<UserId>,
    pub json_mode: bool,
    pub verbose: bool,
}

impl CliContext {
    pub fn from_cli(cli: &super::Cli) -> Result<Self, ParlorError> {
        Ok(Self {
            database: cli.database.clone(),
            backend: Backend::parse(&cli.backend)?,
            config: ParlorConfig::load(cli.config.as_deref())?,
            as_user: cli.as_user.as_deref().map(UserId::new),
            json_mode: cli.json_mode,
            verbose: cli.verbose,
        })
    }

    /// Open the store with the configured collaborators attached.
    pub fn open(&self) -> Result<Network, ParlorError> {
        let network = load_or_create_network(&self.database, self.backend)?;
        Ok(network
            .with_alerts(console_sink(self.config.alerts.enabled))
            .with_moderator(self.config.moderator()))
    }

    pub fn save(&self, network: &Network) -> Result<(), ParlorError> {
        save_network(network, &self.database)
    }

    /// The acting user: `--as`, else the signed-in user.
    pub fn actor(&self, network: &Network) -> Result<UserId, ParlorError> {
        if let Some(id) = &self.as_user {
            return Ok(id.clone());
        }
        network
            .current_user()?
            .map(|u| u.id)
            .ok_or(ParlorError::Unauthorized)
    }

    /// Like [`Self::actor`], but nobody signed in is `None` rather than an error.
    pub fn optional_actor(&self, network: &Network) -> Result<Option<UserId>, ParlorError> {
        match self.actor(network) {
            Ok(id) => Ok(Some(id)),
            Err(ParlorError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn pause(&self, latency: Duration) {
        if self.config.server.simulate_latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), ParlorError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ParlorError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_user(user: &User) {
    println!("{} ({})", user.name, user.id);
    if let Some(bio) = &user.bio {
        println!("  {}", bio);
    }
    if let Some(city) = &user.city {
        println!("  {}", city);
    }
    println!(
        "  {} followers, {} following",
        user.followers.len(),
        user.following.len()
    );
}

fn print_post(post: &Post) {
    println!("[{}] {} - {}", post.id, post.author.name, post.time);
    if !post.content.is_empty() {
        println!("  {}", post.content);
    }
    if let Some(image) = &post.image {
        println!("  image: {}", image);
    }
    println!(
        "  likes: {}  comments: {}  views: {}",
        post.likes,
        post.comments.len(),
        post.views
    );
    for comment in &post.comments {
        println!("    {}: {}", comment.author.name, comment.text);
    }
}

fn print_users(users: &[User]) {
    if users.is_empty() {
        println!("No users");
    }
    for user in users {
        println!("{}  {}", user.id, user.name);
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &CliContext,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), ParlorError> {
    let network = load_or_create_network(&ctx.database, ctx.backend)?;
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);

    println!("Parlor Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", ctx.backend.name());
    println!("  Database: {:?}", ctx.database);
    println!("  Alerts:   {}", if ctx.config.alerts.enabled { "on" } else { "off" });
    println!();
    if ctx.backend == Backend::File {
        println!("Note: the file backend keeps server changes in memory only.");
        println!();
    }
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::from_config(network, &ctx.config);
    api::run_server(&format!("{}:{}", host, port), state).await
}

// =============================================================================
// IDENTITY COMMANDS
// =============================================================================

pub async fn cmd_register(
    ctx: &CliContext,
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), ParlorError> {
    ctx.pause(SIGNUP_LATENCY).await;
    let mut network = ctx.open()?;
    let user = network.register(name, email, password)?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&UserJson::from(&user));
    }
    println!("Welcome, {}! Your id is {}", user.name, user.id);
    Ok(())
}

pub async fn cmd_login(ctx: &CliContext, email: &str, password: &str) -> Result<(), ParlorError> {
    ctx.pause(LOGIN_LATENCY).await;
    let mut network = ctx.open()?;
    let user = network.authenticate(email, password)?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&UserJson::from(&user));
    }
    println!("Signed in as {} ({})", user.name, user.id);
    Ok(())
}

pub fn cmd_logout(ctx: &CliContext) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    network.end_session()?;
    ctx.save(&network)?;
    if !ctx.json_mode {
        println!("Signed out");
    }
    Ok(())
}

pub fn cmd_whoami(ctx: &CliContext) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let user = network.current_user()?;

    if ctx.json_mode {
        return print_json(&user.as_ref().map(UserJson::from));
    }
    match user {
        Some(user) => print_user(&user),
        None => println!("Not signed in"),
    }
    Ok(())
}

pub fn cmd_profile(ctx: &CliContext, user: Option<&str>) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let id = match user {
        Some(id) => UserId::new(id),
        None => ctx.actor(&network)?,
    };
    let profile = network
        .find_user(&id)?
        .ok_or_else(|| ParlorError::NotFound(format!("user {}", id)))?;
    let posts = network.posts_by(&id)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "user": UserJson::from(&profile),
            "posts": posts,
        }));
    }
    print_user(&profile);
    println!();
    for post in &posts {
        print_post(post);
    }
    Ok(())
}

pub fn cmd_edit_profile(
    ctx: &CliContext,
    name: Option<String>,
    bio: Option<String>,
    city: Option<String>,
    avatar: Option<String>,
) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let actor = ctx.actor(&network)?;
    let update = ProfileUpdate {
        name,
        bio,
        city,
        avatar,
    };
    let user = network.update_profile(&actor, &update)?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&UserJson::from(&user));
    }
    print_user(&user);
    Ok(())
}

// =============================================================================
// SOCIAL COMMANDS
// =============================================================================

pub fn cmd_follow(ctx: &CliContext, target: &str) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let actor = ctx.actor(&network)?;
    let target = UserId::new(target);
    let outcome = network.toggle_follow(&actor, &target)?;
    let following = network.is_following(&actor, &target)?;
    ctx.save(&network)?;

    let response = FollowResponse::from_outcome(outcome, following);
    if ctx.json_mode {
        return print_json(&response);
    }
    println!("{} {}", response.outcome, target);
    Ok(())
}

pub fn cmd_discover(ctx: &CliContext, query: &str) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let viewer = ctx.actor(&network)?;
    let users = network.discover(&viewer, query)?;

    if ctx.json_mode {
        return print_json(&UsersResponse::from_users(users));
    }
    print_users(&users);
    Ok(())
}

/// `followers` when `incoming`, otherwise `following`.
pub fn cmd_connections(
    ctx: &CliContext,
    user: Option<&str>,
    incoming: bool,
) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let owner = match user {
        Some(id) => UserId::new(id),
        None => ctx.actor(&network)?,
    };
    let users = if incoming {
        network.followers(&owner)?
    } else {
        network.following(&owner)?
    };

    if ctx.json_mode {
        return print_json(&UsersResponse::from_users(users));
    }
    print_users(&users);
    Ok(())
}

// =============================================================================
// CONTENT COMMANDS
// =============================================================================

pub fn cmd_post(ctx: &CliContext, text: &str, image: Option<&str>) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let author = ctx.actor(&network)?;
    let post = match network.create_post(&author, text, image) {
        Err(ParlorError::ContentRejected { suggestions }) if !ctx.json_mode => {
            for suggestion in &suggestions {
                println!("Try instead: {}", suggestion);
            }
            return Err(ParlorError::ContentRejected { suggestions });
        }
        other => other?,
    };
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&post);
    }
    print_post(&post);
    Ok(())
}

pub fn cmd_like(ctx: &CliContext, post: &str) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let actor = ctx.actor(&network)?;
    let post = network.toggle_like(&actor, &PostId::new(post))?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&post);
    }
    let verb = if post.liked_by.contains(&actor) { "Liked" } else { "Unliked" };
    println!("{} {} ({} likes)", verb, post.id, post.likes);
    Ok(())
}

pub fn cmd_comment(ctx: &CliContext, post: &str, text: &str) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let actor = ctx.actor(&network)?;
    let comment = network.add_comment(&actor, &PostId::new(post), text)?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&comment);
    }
    match comment {
        Some(c) => println!("Commented on {}: {}", c.post_id, c.text),
        None => println!("Nothing to add"),
    }
    Ok(())
}

pub fn cmd_view(ctx: &CliContext, post: &str) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let views = network.record_view(&PostId::new(post))?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "views": views }));
    }
    println!("{} views", views);
    Ok(())
}

pub fn cmd_feed(ctx: &CliContext) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let posts = network.list_posts()?;

    if ctx.json_mode {
        return print_json(&posts);
    }
    if posts.is_empty() {
        println!("No posts yet");
    }
    for post in &posts {
        print_post(post);
        println!();
    }
    Ok(())
}

pub fn cmd_videos(ctx: &CliContext) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let videos = network.list_videos()?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&videos);
    }
    let viewer = ctx.actor(&network).ok();
    for video in &videos {
        let saved = match &viewer {
            Some(v) => network.is_bookmarked(v, &video.id)?,
            None => false,
        };
        println!(
            "[{}] {}{} - {} ({} views, {})",
            video.id,
            video.title,
            if saved { " *" } else { "" },
            video.author.name,
            video.views,
            video.time
        );
        if ctx.verbose && !video.description.is_empty() {
            println!("  {}", video.description);
        }
    }
    Ok(())
}

pub fn cmd_publish_video(
    ctx: &CliContext,
    title: &str,
    video_ref: &str,
    thumbnail: &str,
    description: &str,
) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let author = ctx.actor(&network)?;
    let video = network.create_video(&author, title, video_ref, thumbnail, description)?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&video);
    }
    println!("Published {} ({})", video.title, video.id);
    Ok(())
}

pub fn cmd_bookmark(ctx: &CliContext, video: &str) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let user = ctx.actor(&network)?;
    let bookmarked = network.toggle_bookmark(&user, &VideoId::new(video))?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "bookmarked": bookmarked }));
    }
    println!("{} {}", if bookmarked { "Saved" } else { "Removed" }, video);
    Ok(())
}

// =============================================================================
// CONVERSATION COMMANDS
// =============================================================================

pub fn cmd_chats(ctx: &CliContext, search: Option<&str>) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let me = ctx.actor(&network)?;
    let conversations = match search {
        Some(q) => network.search_conversations(&me, q)?,
        None => network.list_conversations(&me)?,
    };

    if ctx.json_mode {
        let listed: Vec<ConversationJson> =
            conversations.into_iter().map(ConversationJson::from).collect();
        return print_json(&listed);
    }
    if conversations.is_empty() {
        println!("No conversations");
    }
    for c in &conversations {
        let prefix = if c.last_message.sender == me { "you: " } else { "" };
        println!("{} ({})  {}{}", c.peer.name, c.peer.id, prefix, c.last_message.text);
    }
    Ok(())
}

pub fn cmd_messages(ctx: &CliContext, peer: &str) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let me = ctx.actor(&network)?;
    let messages = network.list_messages(&me, &UserId::new(peer))?;

    if ctx.json_mode {
        return print_json(&messages);
    }
    for m in &messages {
        let who = if m.sender == me { "you" } else { m.sender.as_str() };
        println!("{}: {}", who, m.text);
    }
    Ok(())
}

pub fn cmd_send(ctx: &CliContext, to: &str, text: &str) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let sender = ctx.actor(&network)?;
    let (message, outcome) = network.send_message(&sender, &UserId::new(to), text)?;
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "message": message,
            "alert": outcome_label(outcome),
        }));
    }
    println!("Sent to {} (alert {})", message.receiver, outcome_label(outcome));
    Ok(())
}

// =============================================================================
// NOTIFICATION COMMANDS
// =============================================================================

pub fn cmd_notifications(ctx: &CliContext, mark_read: bool) -> Result<(), ParlorError> {
    let mut network = ctx.open()?;
    let me = ctx.actor(&network)?;
    let notifications = network.list_notifications(&me)?;
    let unread = network.unread_count(&me)?;
    if mark_read {
        network.mark_all_read(&me)?;
        ctx.save(&network)?;
    }

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "notifications": notifications,
            "unread": unread,
        }));
    }
    println!("{} unread", unread);
    for n in &notifications {
        let marker = if n.read { " " } else { "*" };
        println!("{} {} {}", marker, n.actor_name, n.kind.phrase());
    }
    Ok(())
}

pub fn cmd_alert(
    ctx: &CliContext,
    recipient: &str,
    title: &str,
    body: &str,
    icon: Option<&str>,
) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let meta = AlertMeta {
        sender: ctx.optional_actor(&network)?,
        kind: "direct".to_string(),
    };
    let outcome =
        network.send_direct_alert(&UserId::new(recipient), title, body, icon, &meta)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "outcome": outcome_label(outcome) }));
    }
    println!("Alert {}", outcome_label(outcome));
    Ok(())
}

pub async fn cmd_watch(
    ctx: &CliContext,
    interval_ms: Option<u64>,
    ticks: Option<u64>,
) -> Result<(), ParlorError> {
    // Resolve the user, then release the store before polling.
    let user = {
        let network = ctx.open()?;
        ctx.actor(&network)?
    };
    let interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| ctx.config.poll_interval());

    poll::watch(|| ctx.open(), user, interval, ticks).await
}

// =============================================================================
// MAINTENANCE COMMANDS
// =============================================================================

pub fn cmd_status(ctx: &CliContext) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let sizes = network.collection_sizes()?;
    let current = network.current_user()?;

    if ctx.json_mode {
        let collections: serde_json::Map<String, serde_json::Value> = sizes
            .iter()
            .map(|(key, count)| (key.clone(), serde_json::Value::from(*count)))
            .collect();
        return print_json(&serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "backend": ctx.backend.name(),
            "signed_in": current.as_ref().map(|u| u.id.clone()),
            "collections": collections,
        }));
    }

    println!("Parlor Store Status");
    println!("===================");
    println!("Database:  {:?}", ctx.database);
    println!("Backend:   {}", ctx.backend.name());
    match &current {
        Some(user) => println!("Signed in: {} ({})", user.name, user.id),
        None => println!("Signed in: nobody"),
    }
    println!();
    if sizes.is_empty() {
        println!("Store is empty");
    }
    for (key, count) in &sizes {
        println!("  {:<16} {}", key, count);
    }
    Ok(())
}

pub fn cmd_export(ctx: &CliContext, output: &Path) -> Result<(), ParlorError> {
    let validated_output = validate_output_path(output)?;
    let network = ctx.open()?;

    let data = export_snapshot(network.backend())?;
    let checksum = snapshot_checksum(network.backend())?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| ParlorError::IoError(format!("Write file: {}", e)))?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "path": validated_output.to_string_lossy(),
            "bytes": data.len(),
            "checksum": checksum,
        }));
    }
    println!("Checksum: {}", checksum);
    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

pub fn cmd_import(ctx: &CliContext, input: &Path) -> Result<(), ParlorError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_SNAPSHOT_FILE_SIZE)?;
    let data = std::fs::read(&validated_path)
        .map_err(|e| ParlorError::IoError(format!("Read file: {}", e)))?;

    let mut network = ctx.open()?;
    let restored = import_snapshot(network.backend_mut(), &data)?;
    network.clear_presence();
    ctx.save(&network)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "collections": restored }));
    }
    println!("Imported {} collections", restored);
    Ok(())
}

pub fn cmd_init(ctx: &CliContext, force: bool) -> Result<(), ParlorError> {
    if ctx.database.exists() {
        if !force {
            return Err(ParlorError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| ParlorError::IoError(format!("Remove db: {}", e)))?;
    }

    let network = load_or_create_network(&ctx.database, ctx.backend)?;
    ctx.save(&network)?;
    println!(
        "Initialized new {} database at {:?}",
        ctx.backend.name(),
        ctx.database
    );
    Ok(())
}

pub fn cmd_hash(ctx: &CliContext) -> Result<(), ParlorError> {
    let network = ctx.open()?;
    let hash = snapshot_crypto_hash(network.backend())?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "hash": hash, "algorithm": "blake3" }));
    }
    println!("BLAKE3: {}", hash);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the store at `db_path`, creating it when missing.
pub fn load_or_create_network(db_path: &Path, backend: Backend) -> Result<Network, ParlorError> {
    match backend {
        Backend::Redb => Network::with_redb(db_path),
        Backend::File => {
            let mut store = MemoryStore::new();
            if db_path.exists() {
                validate_file_size(db_path, MAX_SNAPSHOT_FILE_SIZE)?;
                let data = std::fs::read(db_path)
                    .map_err(|e| ParlorError::IoError(format!("Read db: {}", e)))?;
                match import_snapshot(&mut store, &data) {
                    Ok(_) => {}
                    Err(ParlorError::SerializationError(reason)) => {
                        tracing::warn!(
                            path = %db_path.display(),
                            %reason,
                            "unreadable snapshot, starting from an empty store"
                        );
                        store = MemoryStore::new();
                    }
                    Err(e) => return Err(e),
                }
            }
            let mut network = Network::with_backend(StorageBackend::InMemory(store));
            Identity::restore(network.backend_mut())?;
            Ok(network)
        }
    }
}

/// Persist an in-memory store as a snapshot; redb commits on every write.
pub fn save_network(network: &Network, db_path: &Path) -> Result<(), ParlorError> {
    if network.is_persistent() {
        return Ok(());
    }
    let data = export_snapshot(network.backend())?;
    std::fs::write(db_path, &data).map_err(|e| ParlorError::IoError(format!("Write db: {}", e)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ctx_for(dir: &Path, backend: Backend) -> CliContext {
        CliContext {
            database: dir.join("parlor.db"),
            backend,
            config: ParlorConfig::default(),
            as_user: None,
            json_mode: true,
            verbose: false,
        }
    }

    #[test]
    fn backend_names() {
        assert_eq!(Backend::parse("redb").unwrap(), Backend::Redb);
        assert_eq!(Backend::parse("file").unwrap(), Backend::File);
        assert!(Backend::parse("memory").is_err());
    }

    #[test]
    fn file_backend_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path(), Backend::File);

        let mut network = ctx.open().unwrap();
        let user = network.register("Jane", "jane@x.io", "pw").unwrap();
        network.create_post(&user.id, "hello", None).unwrap();
        ctx.save(&network).unwrap();

        let reopened = ctx.open().unwrap();
        assert_eq!(reopened.current_user().unwrap().map(|u| u.id), Some(user.id));
        assert_eq!(reopened.list_posts().unwrap().len(), 1);
    }

    #[test]
    fn file_backend_recovers_from_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path(), Backend::File);
        std::fs::write(&ctx.database, b"garbage bytes that are not a snapshot").unwrap();

        let mut network = load_or_create_network(&ctx.database, Backend::File).unwrap();
        assert!(network.current_user().unwrap().is_none());
        assert!(network.list_posts().unwrap().is_empty());

        let user = network.register("Jane", "jane@x.io", "pw").unwrap();
        ctx.save(&network).unwrap();
        let reopened = ctx.open().unwrap();
        let found = reopened.find_user(&user.id).unwrap();
        assert_eq!(found.map(|u| u.name).as_deref(), Some("Jane"));
    }

    #[test]
    fn file_backend_rejects_oversized_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parlor.db");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_SNAPSHOT_FILE_SIZE + 1).unwrap();

        assert!(load_or_create_network(&path, Backend::File).is_err());
    }

    #[test]
    fn actor_prefers_as_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path(), Backend::File);
        let network = ctx.open().unwrap();
        assert!(matches!(ctx.actor(&network), Err(ParlorError::Unauthorized)));

        ctx.as_user = Some(UserId::new("u_other"));
        assert_eq!(ctx.actor(&network).unwrap(), UserId::new("u_other"));
    }

    #[test]
    fn optional_actor_only_absorbs_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path(), Backend::File);
        let mut network = ctx.open().unwrap();
        assert_eq!(ctx.optional_actor(&network).unwrap(), None);

        let user = network.register("Jane", "jane@x.io", "pw").unwrap();
        assert_eq!(ctx.optional_actor(&network).unwrap(), Some(user.id));

        ctx.as_user = Some(UserId::new("u_other"));
        assert_eq!(ctx.optional_actor(&network).unwrap(), Some(UserId::new("u_other")));
    }

    #[test]
    fn alert_without_session_is_sent_anonymously() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path(), Backend::File);
        let mut network = ctx.open().unwrap();
        let user = network.register("Jane", "jane@x.io", "pw").unwrap();
        network.end_session().unwrap();
        ctx.save(&network).unwrap();

        cmd_alert(&ctx, &user.id.0, "Hi", "body", None).unwrap();
    }

    #[test]
    fn export_then_import_into_redb() {
        let dir = tempfile::tempdir().unwrap();
        let file_ctx = ctx_for(dir.path(), Backend::File);
        let mut network = file_ctx.open().unwrap();
        network.register("Jane", "jane@x.io", "pw").unwrap();
        file_ctx.save(&network).unwrap();

        let snapshot = dir.path().join("snap.bin");
        cmd_export(&file_ctx, &snapshot).unwrap();

        let redb_ctx = CliContext {
            database: dir.path().join("parlor.redb"),
            ..ctx_for(dir.path(), Backend::Redb)
        };
        cmd_import(&redb_ctx, &snapshot).unwrap();
        let restored = redb_ctx.open().unwrap();
        assert_eq!(restored.all_users().unwrap().len(), 1);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path(), Backend::File);
        cmd_init(&ctx, false).unwrap();
        assert!(cmd_init(&ctx, false).is_err());
        cmd_init(&ctx, true).unwrap();
    }

    #[test]
    fn output_path_without_directory_uses_cwd() {
        let resolved = validate_output_path(Path::new("snapshot.bin")).unwrap();
        assert!(resolved.ends_with("snapshot.bin"));
    }
}
