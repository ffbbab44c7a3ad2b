//! # Content Engine
//!
//! Posts, likes, comments, impressions, videos and bookmarks.
//!
//! Posts and videos embed a `UserSnapshot` of their author taken at creation
//! time. Profile edits do not cascade into those copies; `list_posts` and
//! `posts_by` repair them from the live user on every read instead.

use crate::identity::Identity;
use crate::ids::{new_comment_id, new_post_id, new_video_id, now_millis};
use crate::moderation::{Moderator, Verdict};
use crate::notify::{AlertSink, Notifier};
use crate::primitives::{BOOKMARKS, JUST_NOW, POSTS, VIDEOS};
use crate::store::{RecordStore, load_collection, save_collection};
use crate::{
    Bookmark, Comment, NotificationKind, ParlorError, Post, PostId, User, UserId, UserSnapshot,
    Video, VideoId,
};

// =============================================================================
// SEED DATA
// =============================================================================

/// The video shown when the watch collection is empty.
fn seed_video() -> Video {
    Video {
        id: VideoId::new("v1"),
        title: "Future of Decentralized Networking".to_string(),
        video_ref: "https://www.facebook.com/plugins/video.php?height=314&href=https%3A%2F%2Fwww.facebook.com%2Ffacebook%2Fvideos%2F10153231379946729%2F&show_text=false&width=560&t=0".to_string(),
        thumbnail_ref: "https://picsum.photos/id/1/800/450".to_string(),
        author: UserSnapshot {
            id: UserId::new("a1"),
            name: "R Tech Insights".to_string(),
            avatar: "https://ui-avatars.com/api/?name=R+Tech&background=312E81&color=fff"
                .to_string(),
            bio: None,
            city: None,
        },
        views: "1.2M".to_string(),
        time: "2 hours ago".to_string(),
        description:
            "Exploring how R is redefining the way professionals connect across the globe."
                .to_string(),
    }
}

// =============================================================================
// READ-TIME REPAIR
// =============================================================================

/// Replace a stale snapshot with the live profile when the user still exists.
fn repair(snapshot: &mut UserSnapshot, users: &[User]) {
    if let Some(live) = users.iter().find(|u| u.id == snapshot.id) {
        *snapshot = live.snapshot();
    }
}

fn repair_post(post: &mut Post, users: &[User]) {
    repair(&mut post.author, users);
    for comment in &mut post.comments {
        repair(&mut comment.author, users);
    }
}

/// Sort newest first; among equal timestamps the later-stored post wins.
fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.reverse();
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    posts
}

fn require_user<S: RecordStore + ?Sized>(store: &S, id: &UserId) -> Result<User, ParlorError> {
    Identity::find_user(store, id)?.ok_or(ParlorError::Unauthorized)
}

// =============================================================================
// CONTENT ENGINE
// =============================================================================

/// The Content engine.
pub struct Content;

impl Content {
    /// Publish a post.
    ///
    /// Non-blank text is reviewed by `moderator` first; a rejection stores
    /// nothing.
    ///
    /// # Errors
    ///
    /// - `EmptyContent` if the text is blank and there is no image
    /// - `ContentRejected` if the moderator vetoes the text
    /// - `Unauthorized` if the author is not a registered user
    pub fn create_post<S: RecordStore + ?Sized>(
        store: &mut S,
        moderator: &dyn Moderator,
        author: &UserId,
        text: &str,
        image: Option<&str>,
    ) -> Result<Post, ParlorError> {
        let image = image.map(str::trim).filter(|i| !i.is_empty());
        if text.trim().is_empty() && image.is_none() {
            return Err(ParlorError::EmptyContent);
        }
        let author = require_user(store, author)?;

        if !text.trim().is_empty() {
            if let Verdict::Reject { suggestions } = moderator.review(text) {
                tracing::info!(author = %author.id, "post rejected by moderation");
                return Err(ParlorError::ContentRejected { suggestions });
            }
        }

        let now = now_millis();
        let post = Post {
            id: new_post_id(now),
            author: author.snapshot(),
            time: JUST_NOW.to_string(),
            timestamp: now,
            content: text.to_string(),
            image: image.map(str::to_string),
            likes: 0,
            liked_by: Vec::new(),
            comments: Vec::new(),
            shares: 0,
            views: 0,
        };

        let mut posts: Vec<Post> = load_collection(store, POSTS)?;
        posts.push(post.clone());
        save_collection(store, POSTS, &posts)?;

        tracing::debug!(post = %post.id, author = %author.id, "post created");
        Ok(post)
    }

    /// Like the post, or take the like back if `actor` already liked it.
    ///
    /// `likes` is recomputed from `liked_by`. Only a new like notifies the
    /// owner, and never when the owner is the actor.
    pub fn toggle_like<S: RecordStore + ?Sized>(
        store: &mut S,
        alerts: &dyn AlertSink,
        actor: &UserId,
        post_id: &PostId,
    ) -> Result<Post, ParlorError> {
        let mut posts: Vec<Post> = load_collection(store, POSTS)?;
        let post = posts
            .iter_mut()
            .find(|p| &p.id == post_id)
            .ok_or_else(|| ParlorError::NotFound(format!("post {post_id}")))?;
        let actor = require_user(store, actor)?;

        let liked = if post.liked_by.contains(&actor.id) {
            post.liked_by.retain(|id| id != &actor.id);
            false
        } else {
            post.liked_by.push(actor.id.clone());
            true
        };
        post.likes = post.liked_by.len() as u64;
        let updated = post.clone();

        save_collection(store, POSTS, &posts)?;

        if liked {
            Notifier::notify(
                store,
                alerts,
                &updated.author.id,
                NotificationKind::Like,
                &actor.snapshot(),
                Some(&updated.id),
            )?;
        }
        Ok(updated)
    }

    /// Append a comment to a post.
    ///
    /// Returns `None` and stores nothing when the text is blank or the post
    /// does not exist.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if the actor is not a registered user.
    pub fn add_comment<S: RecordStore + ?Sized>(
        store: &mut S,
        alerts: &dyn AlertSink,
        actor: &UserId,
        post_id: &PostId,
        text: &str,
    ) -> Result<Option<Comment>, ParlorError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let actor = require_user(store, actor)?;

        let mut posts: Vec<Post> = load_collection(store, POSTS)?;
        let Some(post) = posts.iter_mut().find(|p| &p.id == post_id) else {
            tracing::debug!(post = %post_id, "comment on unknown post ignored");
            return Ok(None);
        };

        let comment = Comment {
            id: new_comment_id(now_millis()),
            post_id: post_id.clone(),
            author: actor.snapshot(),
            text: text.to_string(),
            time: JUST_NOW.to_string(),
        };
        post.comments.push(comment.clone());
        let owner = post.author.id.clone();

        save_collection(store, POSTS, &posts)?;
        Notifier::notify(
            store,
            alerts,
            &owner,
            NotificationKind::Comment,
            &actor.snapshot(),
            Some(post_id),
        )?;
        Ok(Some(comment))
    }

    /// Count one impression. Returns the new view count.
    ///
    /// Repeated calls by the same viewer all count.
    pub fn record_view<S: RecordStore + ?Sized>(
        store: &mut S,
        post_id: &PostId,
    ) -> Result<u64, ParlorError> {
        let mut posts: Vec<Post> = load_collection(store, POSTS)?;
        let post = posts
            .iter_mut()
            .find(|p| &p.id == post_id)
            .ok_or_else(|| ParlorError::NotFound(format!("post {post_id}")))?;
        post.views = post.views.saturating_add(1);
        let views = post.views;
        save_collection(store, POSTS, &posts)?;
        Ok(views)
    }

    /// Every post, newest first, with author snapshots repaired.
    pub fn list_posts<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<Post>, ParlorError> {
        let users = Identity::all_users(store)?;
        let mut posts: Vec<Post> = load_collection(store, POSTS)?;
        for post in &mut posts {
            repair_post(post, &users);
        }
        Ok(newest_first(posts))
    }

    /// Posts written by `author`, newest first, with snapshots repaired.
    pub fn posts_by<S: RecordStore + ?Sized>(
        store: &S,
        author: &UserId,
    ) -> Result<Vec<Post>, ParlorError> {
        Ok(Self::list_posts(store)?
            .into_iter()
            .filter(|p| &p.author.id == author)
            .collect())
    }

    /// Publish a video. New videos go to the front of the watch list.
    pub fn create_video<S: RecordStore + ?Sized>(
        store: &mut S,
        author: &UserId,
        title: &str,
        video_ref: &str,
        thumbnail_ref: &str,
        description: &str,
    ) -> Result<Video, ParlorError> {
        if title.trim().is_empty() || video_ref.trim().is_empty() {
            return Err(ParlorError::EmptyContent);
        }
        let author = require_user(store, author)?;

        let video = Video {
            id: new_video_id(now_millis()),
            title: title.trim().to_string(),
            video_ref: video_ref.trim().to_string(),
            thumbnail_ref: thumbnail_ref.trim().to_string(),
            author: author.snapshot(),
            views: "0".to_string(),
            time: JUST_NOW.to_string(),
            description: description.to_string(),
        };

        let mut videos = Self::list_videos(store)?;
        videos.insert(0, video.clone());
        save_collection(store, VIDEOS, &videos)?;
        Ok(video)
    }

    /// The watch list in stored order, newest first.
    ///
    /// An empty collection is seeded with one default video, which is
    /// persisted.
    pub fn list_videos<S: RecordStore + ?Sized>(store: &mut S) -> Result<Vec<Video>, ParlorError> {
        let videos: Vec<Video> = load_collection(store, VIDEOS)?;
        if !videos.is_empty() {
            return Ok(videos);
        }
        let seeded = vec![seed_video()];
        save_collection(store, VIDEOS, &seeded)?;
        tracing::debug!("seeded watch list");
        Ok(seeded)
    }

    /// Save or unsave a video for one user. Returns whether it is now saved.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the user is not registered
    /// - `NotFound` if the video does not exist
    pub fn toggle_bookmark<S: RecordStore + ?Sized>(
        store: &mut S,
        user: &UserId,
        video: &VideoId,
    ) -> Result<bool, ParlorError> {
        require_user(store, user)?;
        if !Self::list_videos(store)?.iter().any(|v| &v.id == video) {
            return Err(ParlorError::NotFound(format!("video {video}")));
        }

        let mut bookmarks: Vec<Bookmark> = load_collection(store, BOOKMARKS)?;
        let before = bookmarks.len();
        bookmarks.retain(|b| !(&b.user == user && &b.video == video));
        let saved = bookmarks.len() == before;
        if saved {
            bookmarks.push(Bookmark {
                user: user.clone(),
                video: video.clone(),
            });
        }
        save_collection(store, BOOKMARKS, &bookmarks)?;
        Ok(saved)
    }

    /// Whether `user` saved `video`.
    pub fn is_bookmarked<S: RecordStore + ?Sized>(
        store: &S,
        user: &UserId,
        video: &VideoId,
    ) -> Result<bool, ParlorError> {
        let bookmarks: Vec<Bookmark> = load_collection(store, BOOKMARKS)?;
        Ok(bookmarks.iter().any(|b| &b.user == user && &b.video == video))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::{AllowAll, BlocklistModerator};
    use crate::notify::{AlertLog, NoAlerts};
    use crate::store::MemoryStore;
    use crate::ProfileUpdate;

    fn setup() -> (MemoryStore, User, User) {
        let mut store = MemoryStore::new();
        let a = Identity::register(&mut store, "Alice", "a@x.io", "pw").expect("register");
        let b = Identity::register(&mut store, "Bob", "b@x.io", "pw").expect("register");
        (store, a, b)
    }

    fn post_by(store: &mut MemoryStore, author: &User, text: &str) -> Post {
        Content::create_post(store, &AllowAll, &author.id, text, None).expect("post")
    }

    #[test]
    fn create_post_starts_empty() {
        let (mut store, a, _) = setup();
        let post = post_by(&mut store, &a, "Hello network");

        assert_eq!(post.likes, 0);
        assert_eq!(post.views, 0);
        assert_eq!(post.time, JUST_NOW);
        assert!(post.comments.is_empty());
        assert_eq!(Content::list_posts(&store).expect("list"), vec![post]);
    }

    #[test]
    fn blank_post_rejected_unless_image() {
        let (mut store, a, _) = setup();
        let result = Content::create_post(&mut store, &AllowAll, &a.id, "  ", None);
        assert!(matches!(result, Err(ParlorError::EmptyContent)));

        let post = Content::create_post(&mut store, &AllowAll, &a.id, "", Some("img.png"))
            .expect("image post");
        assert_eq!(post.image.as_deref(), Some("img.png"));
    }

    #[test]
    fn moderation_rejection_stores_nothing() {
        let (mut store, a, _) = setup();
        let moderator = BlocklistModerator::new(["spam"]);
        let result = Content::create_post(&mut store, &moderator, &a.id, "buy spam now", None);

        assert!(matches!(result, Err(ParlorError::ContentRejected { .. })));
        assert!(Content::list_posts(&store).expect("list").is_empty());
    }

    #[test]
    fn unknown_author_unauthorized() {
        let mut store = MemoryStore::new();
        let result =
            Content::create_post(&mut store, &AllowAll, &UserId::new("u_ghost"), "hi", None);
        assert!(matches!(result, Err(ParlorError::Unauthorized)));
    }

    #[test]
    fn like_toggle_keeps_count_in_step() {
        let (mut store, a, b) = setup();
        let post = post_by(&mut store, &a, "hi");

        let liked = Content::toggle_like(&mut store, &NoAlerts, &b.id, &post.id).expect("like");
        assert_eq!(liked.likes, 1);
        assert_eq!(liked.liked_by, vec![b.id.clone()]);

        let unliked = Content::toggle_like(&mut store, &NoAlerts, &b.id, &post.id).expect("unlike");
        assert_eq!(unliked.likes, 0);
        assert!(unliked.liked_by.is_empty());
    }

    #[test]
    fn like_notifies_owner_but_not_self() {
        let (mut store, a, b) = setup();
        let alerts = AlertLog::new();
        let post = post_by(&mut store, &a, "hi");

        Content::toggle_like(&mut store, &alerts, &a.id, &post.id).expect("self like");
        assert!(Notifier::list_for(&store, &a.id).expect("list").is_empty());

        Content::toggle_like(&mut store, &alerts, &b.id, &post.id).expect("like");
        let listed = Notifier::list_for(&store, &a.id).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].post.as_ref(), Some(&post.id));
        assert_eq!(alerts.drain_for(&a.id)[0].body, "Bob liked your post");
    }

    #[test]
    fn like_unknown_post_not_found() {
        let (mut store, a, _) = setup();
        let result = Content::toggle_like(&mut store, &NoAlerts, &a.id, &PostId::new("nope"));
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
    }

    #[test]
    fn blank_comment_is_noop() {
        let (mut store, a, b) = setup();
        let post = post_by(&mut store, &a, "hi");

        for text in ["", "   "] {
            let added = Content::add_comment(&mut store, &NoAlerts, &b.id, &post.id, text)
                .expect("comment");
            assert!(added.is_none());
        }
        let missing = Content::add_comment(&mut store, &NoAlerts, &b.id, &PostId::new("x"), "yo")
            .expect("comment");
        assert!(missing.is_none());
        assert!(Content::list_posts(&store).expect("list")[0].comments.is_empty());
    }

    #[test]
    fn comments_append_in_order_and_notify() {
        let (mut store, a, b) = setup();
        let post = post_by(&mut store, &a, "hi");

        Content::add_comment(&mut store, &NoAlerts, &b.id, &post.id, "first").expect("c1");
        Content::add_comment(&mut store, &NoAlerts, &b.id, &post.id, " second ").expect("c2");

        let stored = &Content::list_posts(&store).expect("list")[0];
        let texts: Vec<&str> = stored.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(Notifier::unread_count(&store, &a.id).expect("count"), 2);
    }

    #[test]
    fn every_view_counts() {
        let (mut store, a, _) = setup();
        let post = post_by(&mut store, &a, "hi");
        for expected in 1..=3 {
            assert_eq!(Content::record_view(&mut store, &post.id).expect("view"), expected);
        }
    }

    #[test]
    fn list_repairs_stale_author() {
        let (mut store, a, b) = setup();
        let post = post_by(&mut store, &a, "hi");
        Content::add_comment(&mut store, &NoAlerts, &b.id, &post.id, "yo").expect("comment");

        let rename = |name: &str| ProfileUpdate {
            name: Some(name.to_string()),
            ..ProfileUpdate::default()
        };
        Identity::update_profile(&mut store, &a.id, &rename("Alicia")).expect("update");
        Identity::update_profile(&mut store, &b.id, &rename("Robert")).expect("update");

        let listed = &Content::list_posts(&store).expect("list")[0];
        assert_eq!(listed.author.name, "Alicia");
        assert_eq!(listed.comments[0].author.name, "Robert");
        assert_eq!(Content::posts_by(&store, &a.id).expect("by").len(), 1);
        assert!(Content::posts_by(&store, &b.id).expect("by").is_empty());
    }

    #[test]
    fn videos_seed_then_prepend() {
        let (mut store, a, _) = setup();
        let seeded = Content::list_videos(&mut store).expect("videos");
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].id.as_str(), "v1");

        let video = Content::create_video(&mut store, &a.id, "Talk", "https://v", "https://t", "d")
            .expect("video");
        assert_eq!(video.views, "0");
        let listed = Content::list_videos(&mut store).expect("videos");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, video.id);
    }

    #[test]
    fn bookmarks_are_per_user() {
        let (mut store, a, b) = setup();
        let v1 = VideoId::new("v1");

        assert!(Content::toggle_bookmark(&mut store, &a.id, &v1).expect("save"));
        assert!(Content::toggle_bookmark(&mut store, &b.id, &v1).expect("save"));
        assert!(!Content::toggle_bookmark(&mut store, &a.id, &v1).expect("unsave"));

        assert!(!Content::is_bookmarked(&store, &a.id, &v1).expect("check"));
        assert!(Content::is_bookmarked(&store, &b.id, &v1).expect("check"));

        let missing = Content::toggle_bookmark(&mut store, &a.id, &VideoId::new("v404"));
        assert!(matches!(missing, Err(ParlorError::NotFound(_))));
    }
}
