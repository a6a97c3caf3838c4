use std::time::Duration;

use uuid::Uuid;

use huddle_db::models::ReactionToggle;
use huddle_db::{Database, StoreError, format_rfc3339};
use huddle_types::models::{MessageScope, Role};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn register(db: &Database, name: &str) -> String {
    let id = new_id();
    db.create_user(&id, name, "argon2-hash").unwrap();
    id
}

/// Creates a workspace for `admin_user` and returns (workspace_id,
/// general_channel_id).
fn workspace(db: &Database, admin_user: &str) -> (String, String) {
    let ws = new_id();
    db.create_workspace(&ws, admin_user, "acme", "abc123").unwrap();
    let channels = db.list_channels(&ws, admin_user).unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "general");
    (ws, channels[0].id.clone())
}

fn channel_scope(channel_id: &str) -> MessageScope {
    MessageScope::Channel(channel_id.parse().unwrap())
}

fn post(db: &Database, user: &str, channel_id: &str, body: &str) -> String {
    let id = new_id();
    db.create_message(&id, user, &channel_scope(channel_id), body, None)
        .unwrap();
    // created_at has millisecond precision; keep inserts on distinct ticks
    // so newest-first body order is deterministic in assertions.
    std::thread::sleep(Duration::from_millis(2));
    id
}

#[test]
fn workspace_create_seeds_admin_and_general() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (ws, _) = workspace(&db, &alice);

    let member = db.current_member(&ws, &alice).unwrap().unwrap();
    assert!(member.is_admin());

    let roster = db.list_members(&ws, &alice).unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].username, "alice");
}

#[test]
fn membership_guard_rejects_strangers_without_writes() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let mallory = register(&db, "mallory");
    let (ws, general) = workspace(&db, &alice);
    let msg = post(&db, &alice, &general, "hello");

    // Every workspace-scoped operation fails Unauthorized for a user with
    // no membership row.
    assert!(matches!(
        db.toggle_reaction(&new_id(), &mallory, &msg, "👍"),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(
        db.create_message(&new_id(), &mallory, &channel_scope(&general), "hi", None),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(
        db.edit_message(&msg, &mallory, "pwned"),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(
        db.list_messages(&mallory, &channel_scope(&general), None, 10),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(
        db.get_workspace(&ws, &mallory),
        Err(StoreError::Unauthorized)
    ));

    // No partial writes happened.
    assert!(db.reactions_for_messages(&[msg.clone()]).unwrap().is_empty());
    let (page, _) = db.list_messages(&alice, &channel_scope(&general), None, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].body, "hello");
}

#[test]
fn reaction_toggle_is_idempotent_by_pairs() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (_, general) = workspace(&db, &alice);
    let msg = post(&db, &alice, &general, "hello");

    let first = db.toggle_reaction(&new_id(), &alice, &msg, "🎉").unwrap();
    let ReactionToggle::Added(reaction_id) = first else {
        panic!("first toggle must add");
    };
    assert_eq!(db.reactions_for_messages(&[msg.clone()]).unwrap().len(), 1);

    let second = db.toggle_reaction(&new_id(), &alice, &msg, "🎉").unwrap();
    assert_eq!(second, ReactionToggle::Removed(reaction_id));
    assert!(db.reactions_for_messages(&[msg.clone()]).unwrap().is_empty());
}

#[test]
fn reaction_toggle_keeps_distinct_values_apart() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (_, general) = workspace(&db, &alice);
    let msg = post(&db, &alice, &general, "hello");

    db.toggle_reaction(&new_id(), &alice, &msg, "🎉").unwrap();
    db.toggle_reaction(&new_id(), &alice, &msg, "👍").unwrap();
    assert_eq!(db.reactions_for_messages(&[msg.clone()]).unwrap().len(), 2);

    // Toggling one value off leaves the other row alone.
    db.toggle_reaction(&new_id(), &alice, &msg, "🎉").unwrap();
    let remaining = db.reactions_for_messages(&[msg.clone()]).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].value, "👍");
}

#[test]
fn reaction_toggle_missing_message_is_not_found() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    workspace(&db, &alice);

    assert!(matches!(
        db.toggle_reaction(&new_id(), &alice, &new_id(), "👍"),
        Err(StoreError::NotFound("message"))
    ));
}

#[test]
fn list_messages_pages_newest_first_with_cursor() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (_, general) = workspace(&db, &alice);

    for i in 0..7 {
        post(&db, &alice, &general, &format!("m{i}"));
    }

    let scope = channel_scope(&general);
    let (page1, more1) = db.list_messages(&alice, &scope, None, 3).unwrap();
    assert_eq!(page1.len(), 3);
    assert!(more1);
    assert_eq!(page1[0].body, "m6");
    assert_eq!(page1[2].body, "m4");

    let oldest = page1.last().unwrap();
    let cursor = (oldest.created_at.clone(), oldest.id.clone());
    let (page2, more2) = db
        .list_messages(&alice, &scope, Some((&cursor.0, &cursor.1)), 3)
        .unwrap();
    assert_eq!(page2.len(), 3);
    assert!(more2);
    assert_eq!(page2[0].body, "m3");

    let oldest = page2.last().unwrap();
    let cursor = (oldest.created_at.clone(), oldest.id.clone());
    let (page3, more3) = db
        .list_messages(&alice, &scope, Some((&cursor.0, &cursor.1)), 3)
        .unwrap();
    assert_eq!(page3.len(), 1);
    assert!(!more3);
    assert_eq!(page3[0].body, "m0");
}

/// A burst of inserts lands many messages on the same millisecond tick.
/// Walking the whole stream via the cursor must still yield every message
/// exactly once; the tie has to be broken by id, not dropped.
#[test]
fn cursor_pagination_survives_same_millisecond_bursts() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (_, general) = workspace(&db, &alice);

    let total = 200;
    let mut inserted = std::collections::HashSet::new();
    for i in 0..total {
        let id = new_id();
        db.create_message(&id, &alice, &channel_scope(&general), &format!("m{i}"), None)
            .unwrap();
        inserted.insert(id);
    }

    let scope = channel_scope(&general);
    let mut seen = std::collections::HashSet::new();
    let mut cursor: Option<(String, String)> = None;
    loop {
        let before = cursor.as_ref().map(|(ts, id)| (ts.as_str(), id.as_str()));
        let (page, has_more) = db.list_messages(&alice, &scope, before, 3).unwrap();
        for row in &page {
            assert!(seen.insert(row.id.clone()), "message served twice");
        }
        if !has_more {
            break;
        }
        let oldest = page.last().expect("has_more implies a non-empty page");
        cursor = Some((oldest.created_at.clone(), oldest.id.clone()));
    }

    assert_eq!(seen, inserted);
}

#[test]
fn replies_inherit_scope_and_feed_thread_summaries() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let (ws, general) = workspace(&db, &alice);
    db.join_workspace(&ws, &bob, "abc123").unwrap();

    let root = post(&db, &alice, &general, "root");
    let thread = MessageScope::Thread(root.parse().unwrap());
    db.create_message(&new_id(), &bob, &thread, "first reply", None).unwrap();
    std::thread::sleep(Duration::from_millis(2));
    db.create_message(&new_id(), &alice, &thread, "second reply", None).unwrap();

    let reply = db.list_messages(&bob, &thread, None, 10).unwrap().0;
    assert_eq!(reply.len(), 2);
    assert_eq!(reply[0].body, "second reply");
    assert_eq!(reply[0].channel_id.as_deref(), Some(general.as_str()));
    assert_eq!(reply[0].parent_message_id.as_deref(), Some(root.as_str()));

    // Replies do not appear in the channel's top-level stream.
    let (top, _) = db.list_messages(&alice, &channel_scope(&general), None, 10).unwrap();
    assert_eq!(top.len(), 1);

    let summaries = db.thread_summaries(&[root.clone()]).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].count, 2);
    assert_eq!(summaries[0].last_reply_author_name, "alice");
}

/// The API layer clones a fetched row to build both the HTTP response and
/// the gateway event from one lookup.
#[test]
fn fetched_rows_clone_for_event_fan_out() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (_, general) = workspace(&db, &alice);
    let msg = post(&db, &alice, &general, "hello");

    let row = db.get_message(&msg, &alice).unwrap();
    let copy = row.clone();
    assert_eq!(copy.id, row.id);
    assert_eq!(copy.body, row.body);
    assert_eq!(copy.author_name, row.author_name);
}

#[test]
fn edit_and_delete_are_author_only() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let (ws, general) = workspace(&db, &alice);
    db.join_workspace(&ws, &bob, "abc123").unwrap();

    let msg = post(&db, &alice, &general, "original");

    assert!(matches!(
        db.edit_message(&msg, &bob, "hijack"),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(
        db.delete_message(&msg, &bob),
        Err(StoreError::Unauthorized)
    ));

    let edited = db.edit_message(&msg, &alice, "fixed").unwrap();
    assert_eq!(edited.body, "fixed");
    assert!(edited.updated_at.is_some());
}

#[test]
fn delete_message_cascades_replies_and_reactions() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let (_, general) = workspace(&db, &alice);

    let root = post(&db, &alice, &general, "root");
    let thread = MessageScope::Thread(root.parse().unwrap());
    let reply = new_id();
    db.create_message(&reply, &alice, &thread, "reply", None).unwrap();
    db.toggle_reaction(&new_id(), &alice, &root, "👍").unwrap();
    db.toggle_reaction(&new_id(), &alice, &reply, "👀").unwrap();

    db.delete_message(&root, &alice).unwrap();

    assert!(matches!(
        db.get_message(&root, &alice),
        Err(StoreError::NotFound("message"))
    ));
    assert!(matches!(
        db.get_message(&reply, &alice),
        Err(StoreError::NotFound("message"))
    ));
    assert!(db
        .reactions_for_messages(&[root, reply])
        .unwrap()
        .is_empty());
}

#[test]
fn join_code_checks_and_rotation() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let (ws, _) = workspace(&db, &alice);

    assert!(matches!(
        db.join_workspace(&ws, &bob, "wrong"),
        Err(StoreError::Validation(_))
    ));

    let joined = db.join_workspace(&ws, &bob, "ABC123").unwrap();
    assert_eq!(joined.role, "member");

    // Idempotent for existing members.
    let again = db.join_workspace(&ws, &bob, "abc123").unwrap();
    assert_eq!(again.id, joined.id);

    // Rotation is admin-only and invalidates the old code.
    assert!(matches!(
        db.rotate_join_code(&ws, &bob, "zzz999"),
        Err(StoreError::Unauthorized)
    ));
    db.rotate_join_code(&ws, &alice, "zzz999").unwrap();

    let carol = register(&db, "carol");
    assert!(matches!(
        db.join_workspace(&ws, &carol, "abc123"),
        Err(StoreError::Validation(_))
    ));
    db.join_workspace(&ws, &carol, "zzz999").unwrap();
}

#[test]
fn channel_admin_rules_and_name_normalization() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let (ws, general) = workspace(&db, &alice);
    db.join_workspace(&ws, &bob, "abc123").unwrap();

    assert!(matches!(
        db.create_channel(&new_id(), &ws, &bob, "Team Updates"),
        Err(StoreError::Unauthorized)
    ));

    let channel = db.create_channel(&new_id(), &ws, &alice, "Team  Updates").unwrap();
    assert_eq!(channel.name, "team-updates");

    assert!(matches!(
        db.rename_channel(&general, &alice, "   "),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        db.rename_channel(&general, &bob, "lounge"),
        Err(StoreError::Unauthorized)
    ));

    let renamed = db.rename_channel(&general, &alice, "Lounge").unwrap();
    assert_eq!(renamed.name, "lounge");

    // Promote bob and the same operations start succeeding.
    let bob_member = db.current_member(&ws, &bob).unwrap().unwrap();
    db.update_member_role(&bob_member.id, &alice, Role::Admin).unwrap();
    db.rename_channel(&general, &bob, "back-to-general").unwrap();
}

#[test]
fn conversations_deduplicate_across_pair_order() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let mallory = register(&db, "mallory");
    let (ws, _) = workspace(&db, &alice);
    db.join_workspace(&ws, &bob, "abc123").unwrap();

    let alice_member = db.current_member(&ws, &alice).unwrap().unwrap();
    let bob_member = db.current_member(&ws, &bob).unwrap().unwrap();

    let first = db
        .create_or_get_conversation(&new_id(), &ws, &alice, &bob_member.id)
        .unwrap();
    let second = db
        .create_or_get_conversation(&new_id(), &ws, &bob, &alice_member.id)
        .unwrap();
    assert_eq!(first.id, second.id);

    assert!(matches!(
        db.create_or_get_conversation(&new_id(), &ws, &mallory, &bob_member.id),
        Err(StoreError::Unauthorized)
    ));

    // A third member cannot read the pair's stream.
    let carol = register(&db, "carol");
    db.join_workspace(&ws, &carol, "abc123").unwrap();
    let scope = MessageScope::Conversation(first.id.parse().unwrap());
    db.create_message(&new_id(), &alice, &scope, "psst", None).unwrap();
    assert!(matches!(
        db.list_messages(&carol, &scope, None, 10),
        Err(StoreError::Unauthorized)
    ));
}

#[test]
fn member_removal_rules_and_cascade() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let (ws, general) = workspace(&db, &alice);
    db.join_workspace(&ws, &bob, "abc123").unwrap();

    let alice_member = db.current_member(&ws, &alice).unwrap().unwrap();
    let bob_member = db.current_member(&ws, &bob).unwrap().unwrap();

    // Non-admin cannot remove others; an admin cannot remove themselves.
    assert!(matches!(
        db.remove_member(&alice_member.id, &bob),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(
        db.remove_member(&alice_member.id, &alice),
        Err(StoreError::Validation(_))
    ));

    let bob_msg = post(&db, &bob, &general, "bye");
    db.toggle_reaction(&new_id(), &bob, &bob_msg, "👋").unwrap();

    // Self-removal (leave) is allowed for non-admins and erases their data.
    db.remove_member(&bob_member.id, &bob).unwrap();
    assert!(db.current_member(&ws, &bob).unwrap().is_none());
    let (page, _) = db.list_messages(&alice, &channel_scope(&general), None, 10).unwrap();
    assert!(page.iter().all(|m| m.id != bob_msg));
}

#[test]
fn upload_slots_expire_and_claim_once() {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "alice");

    let future = format_rfc3339(chrono::Utc::now() + chrono::Duration::minutes(10));
    let past = format_rfc3339(chrono::Utc::now() - chrono::Duration::minutes(1));

    db.create_upload(&new_id(), &alice, "fresh-token", &future).unwrap();
    db.create_upload(&new_id(), &alice, "stale-token", &past).unwrap();

    assert!(db.claim_upload("stale-token", 42).unwrap().is_none());
    assert!(db.claim_upload("unknown-token", 42).unwrap().is_none());

    let claimed = db.claim_upload("fresh-token", 42).unwrap().unwrap();
    assert_eq!(claimed.size, Some(42));
    assert!(db.get_upload(&claimed.id).unwrap().is_some());

    // A token is single-use.
    assert!(db.claim_upload("fresh-token", 7).unwrap().is_none());
}
