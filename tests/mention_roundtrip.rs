//! Mention encoding through the live user directory

use app_core::{ActivityKind, PostDraft};
use mentions::{MentionError, DELETED_PLACEHOLDER};
use std::collections::HashMap;
use storage::{posts, users, NewUser};
use threadline::{Platform, PlatformError};

async fn platform_with(names: &[&str]) -> (Platform, HashMap<String, i64>) {
    let platform = Platform::in_memory().await.unwrap();
    let mut conn = platform.database().pool().acquire().await.unwrap();
    let mut ids = HashMap::new();
    for name in names {
        let user = users::insert_user(&mut conn, &NewUser::new(*name)).await.unwrap();
        ids.insert(name.to_string(), user.id);
    }
    drop(conn);
    (platform, ids)
}

#[tokio::test]
async fn test_round_trip_is_display_equivalent() {
    let (platform, _) = platform_with(&["alice", "bob_99", "Carol"]).await;

    let texts = [
        "",
        "no mentions at all",
        "@alice",
        "(@alice, @bob_99!) and @Carol.",
        "mail bob_99@example.com, not @bob_99@home",
        "literal @{ braces @{{ stay }",
        "@alice@alice @alice",
        "unicode ✨ @alice ✨",
    ];

    for text in texts {
        let stored = platform.encode_for_storage(text).await.unwrap();
        let shown = platform.decode_for_display(&stored).await.unwrap();
        assert_eq!(shown.text, text);
    }
}

#[tokio::test]
async fn test_storage_form_holds_references_only() {
    let (platform, ids) = platform_with(&["alice", "Carol"]).await;

    let stored = platform.encode_for_storage("(@alice, @Carol!)").await.unwrap();
    assert_eq!(stored, format!("(@{{{}}}, @{{{}}}!)", ids["alice"], ids["Carol"]));
}

#[tokio::test]
async fn test_unknown_name_left_literal() {
    let (platform, _) = platform_with(&["alice"]).await;

    let stored = platform.encode_for_storage("hi @doesnotexist").await.unwrap();
    assert_eq!(stored, "hi @doesnotexist");

    // Usernames match exactly
    let stored = platform.encode_for_storage("@ALICE").await.unwrap();
    assert_eq!(stored, "@ALICE");
}

#[tokio::test]
async fn test_names_longer_than_limit_are_text() {
    let long = "a".repeat(31);
    let (platform, _) = platform_with(&[long.as_str()]).await;

    let text = format!("@{}", long);
    assert_eq!(platform.encode_for_storage(&text).await.unwrap(), text);
}

#[tokio::test]
async fn test_rename_and_deletion_are_rendered() {
    let (platform, ids) = platform_with(&["alice", "bob"]).await;
    let stored = platform.encode_for_storage("@alice meet @bob").await.unwrap();

    let mut conn = platform.database().pool().acquire().await.unwrap();
    users::rename(&mut conn, ids["alice"], "alicia").await.unwrap();
    users::delete_user(&mut conn, ids["bob"]).await.unwrap();
    drop(conn);

    let shown = platform.decode_for_display(&stored).await.unwrap();
    assert_eq!(shown.text, format!("@alicia meet {}", DELETED_PLACEHOLDER));
    assert_eq!(shown.mentioned_ids, vec![ids["alice"]]);
}

#[tokio::test]
async fn test_stored_text_is_never_reencoded() {
    let (platform, ids) = platform_with(&["alice"]).await;

    let stored = platform.encode_for_storage("@alice").await.unwrap();
    let shown = platform.decode_for_display(&stored).await.unwrap();
    assert_eq!(shown.text, "@alice");
    assert_eq!(shown.mentioned_ids, vec![ids["alice"]]);

    // A display-looking token inside storage text is plain text to decode
    let shown = platform.decode_for_display("@alice").await.unwrap();
    assert!(shown.mentioned_ids.is_empty());
}

#[tokio::test]
async fn test_corrupt_storage_text_surfaces_with_fallback() {
    let (platform, _) = platform_with(&[]).await;

    let err = platform.decode_for_display("oops @{12").await.unwrap_err();
    assert!(matches!(
        err,
        PlatformError::Mention(MentionError::CorruptContent { offset: 5, .. })
    ));
    assert_eq!(mentions::degraded_render("oops @{12"), "oops @{12");
}

#[tokio::test]
async fn test_post_write_path_encodes_and_notifies() {
    let (platform, ids) = platform_with(&["alice", "bob", "carol"]).await;

    let post = platform
        .posts()
        .create_post(ids["alice"], &PostDraft::new("hey @bob, @carol and @alice"))
        .await
        .unwrap();
    assert_eq!(post.content, "hey @bob, @carol and @alice");

    let mut conn = platform.database().pool().acquire().await.unwrap();
    let stored = posts::find_post(&mut conn, post.id).await.unwrap().unwrap();
    drop(conn);
    assert_eq!(
        stored.content,
        format!("hey @{{{}}}, @{{{}}} and @{{{}}}", ids["bob"], ids["carol"], ids["alice"])
    );

    let for_bob = platform.activity().list_for_user(ids["bob"], 10).await.unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].kind, ActivityKind::PostMention);
    assert_eq!(for_bob[0].source_user_id, ids["alice"]);
    assert!(platform.activity().list_for_user(ids["alice"], 10).await.unwrap().is_empty());

    platform
        .posts()
        .edit_post(ids["alice"], post.id, &PostDraft::new("just @carol now"))
        .await
        .unwrap();
    assert!(platform.activity().list_for_user(ids["bob"], 10).await.unwrap().is_empty());
    assert_eq!(platform.activity().list_for_user(ids["carol"], 10).await.unwrap().len(), 1);
}
