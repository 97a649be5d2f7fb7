use std::sync::Arc;

use agent_social::{
    config::Config,
    models::{
        agent::Agent,
        engagement::{ActionClass, EngagementAction},
        notification::NotificationKind,
        post::Post,
    },
    services::{EngagementStore, InMemoryStore},
    state::AppState,
};
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn seeded(atlas_hook: Option<&str>) -> (Arc<InMemoryStore>, AppState) {
    let store = Arc::new(InMemoryStore::new());
    store.insert_agent(Agent::new("nova", "Nova", None));
    store.insert_agent(Agent::new("atlas", "Atlas", atlas_hook));

    let state = AppState::build(Config::default(), store.clone()).unwrap();
    (store, state)
}

async fn publish(store: &InMemoryStore, id: &str, author: &str) {
    let mut post = Post::new(author, "hello agents");
    post.id = id.to_string();
    store.insert_post(&post).await.unwrap();
}

fn like(actor: &str, post: &str) -> EngagementAction {
    EngagementAction::Like {
        actor_id: actor.to_string(),
        post_id: post.to_string(),
    }
}

#[tokio::test]
async fn repeated_likes_count_once_and_deliver_one_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("x-webhook-event", "like"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let hook = format!("{}/hook", server.uri());
    let (store, state) = seeded(Some(hook.as_str()));
    publish(&store, "p1", "atlas").await;

    let first = state.fanout.apply(like("nova", "p1")).await.unwrap();
    assert!(first.applied);
    for _ in 0..2 {
        let again = state.fanout.apply(like("nova", "p1")).await.unwrap();
        assert!(!again.applied);
    }

    let post = store.get_post("p1").await.unwrap().unwrap();
    assert_eq!(post.likes_count, 1);

    let notifications = store.notifications_for("atlas");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Like);
    assert_eq!(notifications[0].from_agent_id, "nova");

    let pending = state.webhook_dispatcher.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].target_url, hook);

    assert_eq!(state.webhook_dispatcher.drain_once().await, 1);
    assert_eq!(state.webhook_dispatcher.stats().delivered, 1);
}

#[tokio::test]
async fn self_like_counts_without_notifying() {
    let (store, state) = seeded(Some("https://atlas.example/hook"));
    publish(&store, "p1", "atlas").await;

    let outcome = state.fanout.apply(like("atlas", "p1")).await.unwrap();

    assert!(outcome.applied);
    assert_eq!(store.get_post("p1").await.unwrap().unwrap().likes_count, 1);
    assert!(store.notifications_for("atlas").is_empty());
    assert_eq!(state.webhook_dispatcher.queue_len(), 0);
}

#[tokio::test]
async fn self_comment_and_self_repost_count_without_notifying() {
    let (store, state) = seeded(Some("https://atlas.example/hook"));
    publish(&store, "p1", "atlas").await;

    let comment = state
        .fanout
        .apply(EngagementAction::Comment {
            actor_id: "atlas".to_string(),
            post_id: "p1".to_string(),
            content: "adding context".to_string(),
        })
        .await
        .unwrap();
    let repost = state
        .fanout
        .apply(EngagementAction::Repost {
            actor_id: "atlas".to_string(),
            post_id: "p1".to_string(),
        })
        .await
        .unwrap();

    assert!(comment.applied);
    assert!(repost.applied);
    let post = store.get_post("p1").await.unwrap().unwrap();
    assert_eq!(post.comments_count, 1);
    assert_eq!(post.reposts_count, 1);
    assert!(store.notifications_for("atlas").is_empty());
    assert_eq!(state.webhook_dispatcher.queue_len(), 0);
}

#[tokio::test]
async fn self_follow_counts_both_sides_without_notifying() {
    let (store, state) = seeded(None);

    let outcome = state
        .fanout
        .apply(EngagementAction::Follow {
            actor_id: "nova".to_string(),
            target_id: "nova".to_string(),
        })
        .await
        .unwrap();

    assert!(outcome.applied);
    let nova = store.get_agent("nova").unwrap();
    assert_eq!(nova.followers_count, 1);
    assert_eq!(nova.following_count, 1);
    assert!(store.notifications_for("nova").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_likes_apply_once() {
    let (store, state) = seeded(Some("https://atlas.example/hook"));
    publish(&store, "p1", "atlas").await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let fanout = state.fanout.clone();
            tokio::spawn(async move { fanout.apply(like("nova", "p1")).await.unwrap().applied })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap() {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(store.get_post("p1").await.unwrap().unwrap().likes_count, 1);
    assert_eq!(store.notifications_for("atlas").len(), 1);
    assert_eq!(state.webhook_dispatcher.queue_len(), 1);
}

#[tokio::test]
async fn comment_text_is_trimmed_before_fan_out() {
    let (store, state) = seeded(Some("https://atlas.example/hook"));
    publish(&store, "p1", "atlas").await;

    state
        .fanout
        .apply(EngagementAction::Comment {
            actor_id: "nova".to_string(),
            post_id: "p1".to_string(),
            content: "   well said  ".to_string(),
        })
        .await
        .unwrap();

    let pending = state.webhook_dispatcher.pending();
    assert_eq!(pending[0].payload["content"], json!("well said"));
    assert_eq!(
        store.notifications_for("atlas")[0].message,
        "nova commented on your post: well said"
    );
}

#[tokio::test]
async fn follow_updates_both_counters_and_notifies_without_hook() {
    let (store, state) = seeded(None);

    let outcome = state
        .fanout
        .apply(EngagementAction::Follow {
            actor_id: "nova".to_string(),
            target_id: "atlas".to_string(),
        })
        .await
        .unwrap();

    assert!(outcome.applied);
    assert_eq!(store.get_agent("atlas").unwrap().followers_count, 1);
    assert_eq!(store.get_agent("nova").unwrap().following_count, 1);

    let notifications = store.notifications_for("atlas");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Follow);
    assert_eq!(notifications[0].related_post_id, None);
    assert_eq!(state.webhook_dispatcher.queue_len(), 0);
}

#[tokio::test]
async fn every_comment_is_a_new_engagement() {
    let (store, state) = seeded(None);
    publish(&store, "p1", "atlas").await;

    for text in ["first", "second"] {
        let outcome = state
            .fanout
            .apply(EngagementAction::Comment {
                actor_id: "nova".to_string(),
                post_id: "p1".to_string(),
                content: text.to_string(),
            })
            .await
            .unwrap();
        assert!(outcome.applied);
    }

    assert_eq!(store.comment_count(), 2);
    assert_eq!(store.get_post("p1").await.unwrap().unwrap().comments_count, 2);
    assert_eq!(store.notifications_for("atlas").len(), 2);
}

#[tokio::test]
async fn engagement_on_missing_post_fails_without_side_effects() {
    let (store, state) = seeded(None);

    let result = state.fanout.apply(like("nova", "ghost")).await;

    assert!(result.is_err());
    assert!(store.notifications_for("atlas").is_empty());
    assert_eq!(state.webhook_dispatcher.queue_len(), 0);
}

#[tokio::test]
async fn fetching_notifications_marks_them_read_once() {
    let (store, state) = seeded(None);
    publish(&store, "p1", "atlas").await;
    state.fanout.apply(like("nova", "p1")).await.unwrap();
    state
        .fanout
        .apply(EngagementAction::Repost {
            actor_id: "nova".to_string(),
            post_id: "p1".to_string(),
        })
        .await
        .unwrap();

    let first = state.notification_service.fetch("atlas", 10).await.unwrap();
    assert_eq!(first.notifications.len(), 2);
    assert_eq!(first.newly_read, 2);

    let second = state.notification_service.fetch("atlas", 10).await.unwrap();
    assert_eq!(second.newly_read, 0);
    assert_eq!(state.notification_service.unread_count("atlas").await.unwrap(), 0);
}

#[tokio::test]
async fn limiter_gates_posts_and_actions_separately() {
    let (_store, state) = seeded(None);

    for _ in 0..5 {
        tokio_test::assert_ok!(state.admit("nova", ActionClass::Post));
    }
    assert!(state.admit("nova", ActionClass::Post).is_err());

    for _ in 0..30 {
        tokio_test::assert_ok!(state.admit("nova", ActionClass::Action));
    }
    assert!(state.admit("nova", ActionClass::Action).is_err());

    // 其他 agent 不受影响
    tokio_test::assert_ok!(state.admit("atlas", ActionClass::Post));
}

#[tokio::test]
async fn trending_feed_prefers_fresh_engagement() {
    let (store, state) = seeded(None);
    let now = Utc::now();

    for (id, likes, comments, age_hours) in [("old-viral", 200, 50, 72), ("fresh", 10, 2, 1), ("idle", 0, 0, 5)] {
        let mut post = Post::new("atlas", id);
        post.id = id.to_string();
        post.likes_count = likes;
        post.comments_count = comments;
        post.created_at = now - Duration::hours(age_hours);
        store.insert_post(&post).await.unwrap();
    }

    let ranked = state.feed_service.trending(10).await.unwrap();
    let ids: Vec<&str> = ranked.iter().map(|r| r.post.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh", "old-viral", "idle"]);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

    let body = serde_json::to_value(&ranked[0]).unwrap();
    assert_eq!(body["id"], json!("fresh"));
    assert!(body["score"].as_f64().unwrap() > 0.0);
}
