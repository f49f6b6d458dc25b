use inkpost::models::{StorePost, UpdatePost, User};
use inkpost::services::storage::Storage;
use inkpost::services::{auth, images, posts, slug, tags};
use inkpost::web::error::ApiError;
use inkpost::Database;
use std::path::PathBuf;

fn create_test_db() -> Database {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    let name = format!("test_db_{}", id);

    let db = Database::open_memory(&name).expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

fn create_test_storage() -> (Storage, PathBuf) {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    let root = std::env::temp_dir().join(format!("inkpost_test_{}", id));
    std::fs::create_dir_all(&root).expect("Failed to create storage root");
    (Storage::new(&root), root)
}

const TEST_PASSWORD: &str = "Password123";

fn create_admin(db: &Database) -> User {
    let id = auth::create_user(db, "admin", "admin@example.com", TEST_PASSWORD, true)
        .expect("Failed to create admin");
    auth::get_user(db, id)
        .expect("Failed to load admin")
        .expect("Admin should exist")
}

fn store_post(title: &str, image_path: Option<&str>) -> StorePost {
    StorePost {
        title: title.to_string(),
        slug: None,
        excerpt_raw: "excerpt".to_string(),
        excerpt_html: "<p>excerpt</p>".to_string(),
        content_raw: "content".to_string(),
        content_html: "<p>content</p>".to_string(),
        is_published: true,
        image_path: image_path.map(|p| p.to_string()),
        image_counter: Some(0),
    }
}

fn post_count(db: &Database) -> i64 {
    let conn = db.get().unwrap();
    conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
        .unwrap()
}

fn insert_folder_image(db: &Database, folder: &str, file_name: &str, user_id: i64) -> i64 {
    let conn = db.get().unwrap();
    conn.execute(
        "INSERT INTO images (file_name, path, attached_to_post, user_id) VALUES (?, ?, 1, ?)",
        (file_name, folder, user_id),
    )
    .unwrap();
    conn.last_insert_rowid()
}

mod post_tests {
    use super::*;

    #[test]
    fn test_create_post_derives_slug() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let outcome = posts::create_post(&db, &store_post("Hello World", None), 0, admin.id)
            .expect("Failed to create post");
        let id = match outcome {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        let post = posts::get_post(&db, id).unwrap().expect("Post should exist");
        assert_eq!(post.slug, "hello-world");
        assert!(post.is_published);
        assert!(post.published_at.is_some());
    }

    #[test]
    fn test_create_post_slug_conflict_leaves_count_unchanged() {
        let db = create_test_db();
        let admin = create_admin(&db);

        posts::create_post(&db, &store_post("Hello World", None), 0, admin.id).unwrap();
        let before = post_count(&db);

        let outcome = posts::create_post(&db, &store_post("Hello World", None), 0, admin.id)
            .expect("Conflict should not be an error");
        assert!(matches!(outcome, posts::CreateOutcome::SlugTaken));
        assert_eq!(post_count(&db), before);
    }

    #[test]
    fn test_update_post_keeps_own_slug() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let id = match posts::create_post(&db, &store_post("Hello World", None), 0, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        // Saving again with an unchanged title must not conflict with itself.
        let input = UpdatePost {
            title: "Hello World".to_string(),
            slug: Some("hello-world".to_string()),
            excerpt_raw: "changed".to_string(),
            excerpt_html: "<p>changed</p>".to_string(),
            content_raw: "changed".to_string(),
            content_html: "<p>changed</p>".to_string(),
            is_published: true,
            image_path: None,
        };
        let outcome = posts::update_post(&db, id, &input).unwrap();
        match outcome {
            posts::UpdateOutcome::Updated(updated) => {
                assert_eq!(updated.post.excerpt_raw, "changed");
            }
            other => panic!("Unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_update_post_conflicts_with_other_post() {
        let db = create_test_db();
        let admin = create_admin(&db);

        posts::create_post(&db, &store_post("First Post", None), 0, admin.id).unwrap();
        let id = match posts::create_post(&db, &store_post("Second Post", None), 0, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        let input = UpdatePost {
            title: "Second Post".to_string(),
            slug: Some("first-post".to_string()),
            excerpt_raw: String::new(),
            excerpt_html: String::new(),
            content_raw: String::new(),
            content_html: String::new(),
            is_published: false,
            image_path: None,
        };
        let outcome = posts::update_post(&db, id, &input).unwrap();
        assert!(matches!(outcome, posts::UpdateOutcome::SlugTaken));
    }

    #[test]
    fn test_published_at_set_once() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let mut draft = store_post("Draft Post", None);
        draft.is_published = false;
        let id = match posts::create_post(&db, &draft, 0, admin.id).unwrap() {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };
        assert!(posts::get_post(&db, id).unwrap().unwrap().published_at.is_none());

        let publish = UpdatePost {
            title: "Draft Post".to_string(),
            slug: None,
            excerpt_raw: String::new(),
            excerpt_html: String::new(),
            content_raw: String::new(),
            content_html: String::new(),
            is_published: true,
            image_path: None,
        };
        posts::update_post(&db, id, &publish).unwrap();
        let first = posts::get_post(&db, id)
            .unwrap()
            .unwrap()
            .published_at
            .expect("published_at should be stamped");

        // Re-saving a published post must not move the timestamp.
        posts::update_post(&db, id, &publish).unwrap();
        let second = posts::get_post(&db, id).unwrap().unwrap().published_at.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_feed_only_shows_published() {
        let db = create_test_db();
        let admin = create_admin(&db);

        posts::create_post(&db, &store_post("Published Post", None), 0, admin.id).unwrap();
        let mut draft = store_post("Draft Post", None);
        draft.is_published = false;
        posts::create_post(&db, &draft, 0, admin.id).unwrap();

        let (feed, total) = posts::feed(&db, 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.title, "Published Post");

        let (all, all_total) = posts::list_for_admin(&db, 10, 0).unwrap();
        assert_eq!(all_total, 2);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_find_by_slug_or_id() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let id = match posts::create_post(&db, &store_post("Hello World", None), 0, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        let by_slug = posts::find_by_slug_or_id(&db, "hello-world").unwrap().unwrap();
        assert_eq!(by_slug.id, id);

        let by_id = posts::find_by_slug_or_id(&db, &id.to_string()).unwrap().unwrap();
        assert_eq!(by_id.id, id);

        assert!(posts::find_by_slug_or_id(&db, "no-such-post").unwrap().is_none());
    }
}

mod image_attachment_tests {
    use super::*;

    #[test]
    fn test_create_post_links_all_folder_images() {
        let db = create_test_db();
        let admin = create_admin(&db);
        let folder = images::new_post_folder();

        let first = insert_folder_image(&db, &folder, "a.png", admin.id);
        let second = insert_folder_image(&db, &folder, "b.png", admin.id);

        let post_id = match posts::create_post(&db, &store_post("With Images", Some(&folder)), 2, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        for image_id in [first, second] {
            let image = images::get_image(&db, image_id).unwrap().unwrap();
            assert_eq!(image.post_id, Some(post_id));
        }
        assert_eq!(images::list_for_post(&db, post_id).unwrap().len(), 2);
    }

    #[test]
    fn test_create_post_rolls_back_when_no_images_match() {
        let db = create_test_db();
        let admin = create_admin(&db);
        let before = post_count(&db);

        // The client claims an upload folder that has no rows in the DB.
        let result = posts::create_post(
            &db,
            &store_post("Phantom Images", Some("posts/does-not-exist")),
            3,
            admin.id,
        );
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(post_count(&db), before);
    }

    #[test]
    fn test_create_post_with_zero_counter_skips_linking() {
        let db = create_test_db();
        let admin = create_admin(&db);

        // Counter zero means the client uploaded nothing; an empty folder
        // reference must not fail the creation.
        let outcome = posts::create_post(
            &db,
            &store_post("No Images", Some("posts/empty-session")),
            0,
            admin.id,
        )
        .unwrap();
        assert!(matches!(outcome, posts::CreateOutcome::Created(_)));
    }

    #[test]
    fn test_clear_unattached_removes_rows_and_folder() {
        let db = create_test_db();
        let (storage, root) = create_test_storage();
        let admin = create_admin(&db);
        let folder = images::new_post_folder();

        storage.save_file(&folder, "a.png", b"fake").unwrap();
        insert_folder_image(&db, &folder, "a.png", admin.id);
        insert_folder_image(&db, &folder, "b.png", admin.id);

        let removed = images::clear_unattached(&db, &storage, &folder).unwrap();
        assert_eq!(removed, 2);
        assert!(!storage.folder_exists(&folder));

        let conn = db.get().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM images WHERE path = ?", [&folder], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_clear_unattached_keeps_linked_images() {
        let db = create_test_db();
        let (storage, root) = create_test_storage();
        let admin = create_admin(&db);
        let folder = images::new_post_folder();

        insert_folder_image(&db, &folder, "a.png", admin.id);
        let post_id = match posts::create_post(&db, &store_post("Keeper", Some(&folder)), 1, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        let removed = images::clear_unattached(&db, &storage, &folder).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(images::list_for_post(&db, post_id).unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(root);
    }
}

mod post_deletion_tests {
    use super::*;

    #[test]
    fn test_delete_post_cleans_up_everything() {
        let db = create_test_db();
        let (storage, root) = create_test_storage();
        let admin = create_admin(&db);
        let folder = images::new_post_folder();

        storage.save_file(&folder, "a.png", b"fake").unwrap();
        insert_folder_image(&db, &folder, "a.png", admin.id);

        let post_id = match posts::create_post(&db, &store_post("Doomed", Some(&folder)), 1, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        let tag = tags::create_tag(&db, "Rust", &admin).unwrap();
        let conn = db.get().unwrap();
        conn.execute(
            "INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)",
            (post_id, tag.id),
        )
        .unwrap();
        drop(conn);

        let message = posts::delete_post(&db, &storage, post_id, &admin).unwrap();
        assert_eq!(
            message,
            format!("Post #{} has been successfully deleted", post_id)
        );

        assert!(posts::get_post(&db, post_id).unwrap().is_none());
        assert!(!storage.folder_exists(&folder));

        let conn = db.get().unwrap();
        let image_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM images WHERE path = ?", [&folder], |r| r.get(0))
            .unwrap();
        let tag_links: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_tags WHERE post_id = ?", [post_id], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(image_rows, 0);
        assert_eq!(tag_links, 0);
        // The tag itself survives its associations.
        assert!(tags::get_tag(&db, tag.id).unwrap().is_some());

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_delete_post_with_absent_folder_still_succeeds() {
        let db = create_test_db();
        let (storage, root) = create_test_storage();
        let admin = create_admin(&db);
        let folder = images::new_post_folder();

        // Image row exists but the folder was never written to disk.
        insert_folder_image(&db, &folder, "a.png", admin.id);
        let post_id = match posts::create_post(&db, &store_post("No Folder", Some(&folder)), 1, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        posts::delete_post(&db, &storage, post_id, &admin).unwrap();
        assert!(posts::get_post(&db, post_id).unwrap().is_none());

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_delete_post_after_image_path_cleared() {
        let db = create_test_db();
        let (storage, root) = create_test_storage();
        let admin = create_admin(&db);
        let folder = images::new_post_folder();

        storage.save_file(&folder, "a.png", b"fake").unwrap();
        insert_folder_image(&db, &folder, "a.png", admin.id);
        let post_id = match posts::create_post(&db, &store_post("Edited", Some(&folder)), 1, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        // A later edit drops the folder reference; the linked image row
        // still points at the post.
        let input = UpdatePost {
            title: "Edited".to_string(),
            slug: None,
            excerpt_raw: String::new(),
            excerpt_html: String::new(),
            content_raw: String::new(),
            content_html: String::new(),
            is_published: true,
            image_path: None,
        };
        posts::update_post(&db, post_id, &input).unwrap();

        posts::delete_post(&db, &storage, post_id, &admin).unwrap();
        assert!(posts::get_post(&db, post_id).unwrap().is_none());

        let conn = db.get().unwrap();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM images WHERE post_id = ?",
                [post_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_delete_missing_post_is_not_found() {
        let db = create_test_db();
        let (storage, root) = create_test_storage();
        let admin = create_admin(&db);

        let result = posts::delete_post(&db, &storage, 9999, &admin);
        assert!(matches!(result, Err(ApiError::NotFound(_))));

        let _ = std::fs::remove_dir_all(root);
    }
}

mod tag_tests {
    use super::*;

    #[test]
    fn test_create_tag_derives_slug_and_lowercase() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let tag = tags::create_tag(&db, "Rust Lang", &admin).unwrap();
        assert_eq!(tag.name, "Rust Lang");
        assert_eq!(tag.name_low_case, "rust lang");
        assert_eq!(tag.slug, "rust-lang");
    }

    #[test]
    fn test_create_tag_name_conflict() {
        let db = create_test_db();
        let admin = create_admin(&db);

        tags::create_tag(&db, "Rust", &admin).unwrap();
        let result = tags::create_tag(&db, "Rust", &admin);
        match result {
            Err(ApiError::Validation { field, .. }) => assert_eq!(field, "name"),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_create_tag_slug_conflict_reported_as_slug() {
        let db = create_test_db();
        let admin = create_admin(&db);

        // Different names, identical derived slug.
        tags::create_tag(&db, "Rust Lang", &admin).unwrap();
        let result = tags::create_tag(&db, "Rust lang", &admin);
        match result {
            Err(ApiError::Validation { field, .. }) => assert_eq!(field, "slug"),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_update_tag_unchanged_name_is_noop() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let tag = tags::create_tag(&db, "Rust", &admin).unwrap();
        let updated = tags::update_tag(&db, tag.id, "Rust", &admin).unwrap();
        assert_eq!(updated.id, tag.id);
        assert_eq!(updated.slug, tag.slug);
    }

    #[test]
    fn test_update_tag_excludes_self_from_check() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let tag = tags::create_tag(&db, "Rust", &admin).unwrap();
        let updated = tags::update_tag(&db, tag.id, "Rustacean", &admin).unwrap();
        assert_eq!(updated.name, "Rustacean");
        assert_eq!(updated.slug, "rustacean");
    }

    #[test]
    fn test_update_tag_conflicts_with_other_tag() {
        let db = create_test_db();
        let admin = create_admin(&db);

        tags::create_tag(&db, "Rust", &admin).unwrap();
        let other = tags::create_tag(&db, "Go", &admin).unwrap();
        let result = tags::update_tag(&db, other.id, "Rust", &admin);
        assert!(matches!(result, Err(ApiError::Validation { field: "name", .. })));
    }

    #[test]
    fn test_delete_tag_detaches_posts() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let tag = tags::create_tag(&db, "Rust", &admin).unwrap();
        let post_id = match posts::create_post(&db, &store_post("Tagged", None), 0, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };
        let conn = db.get().unwrap();
        conn.execute(
            "INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)",
            (post_id, tag.id),
        )
        .unwrap();
        drop(conn);

        let message = tags::delete_tag(&db, tag.id, &admin).unwrap();
        assert_eq!(message, format!("Tag #{} has been successfully deleted", tag.id));
        assert!(tags::get_tag(&db, tag.id).unwrap().is_none());

        let conn = db.get().unwrap();
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_tags WHERE tag_id = ?", [tag.id], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(links, 0);
        // The post survives its tag.
        assert!(posts::get_post(&db, post_id).unwrap().is_some());
    }

    #[test]
    fn test_feed_by_tag() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let tag = tags::create_tag(&db, "Rust", &admin).unwrap();
        let tagged = match posts::create_post(&db, &store_post("Tagged", None), 0, admin.id).unwrap() {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };
        posts::create_post(&db, &store_post("Untagged", None), 0, admin.id).unwrap();

        let conn = db.get().unwrap();
        conn.execute(
            "INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)",
            (tagged, tag.id),
        )
        .unwrap();
        drop(conn);

        let (feed, total) = posts::feed_by_tag(&db, "rust", 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.id, tagged);
        assert_eq!(feed[0].tags.len(), 1);
    }
}

mod slug_policy_tests {
    use super::*;

    #[test]
    fn test_post_slug_taken_excludes_id() {
        let db = create_test_db();
        let admin = create_admin(&db);

        let id = match posts::create_post(&db, &store_post("Hello World", None), 0, admin.id)
            .unwrap()
        {
            posts::CreateOutcome::Created(id) => id,
            other => panic!("Unexpected outcome: {:?}", other),
        };

        assert!(slug::post_slug_taken(&db, "hello-world", None).unwrap());
        assert!(!slug::post_slug_taken(&db, "hello-world", Some(id)).unwrap());
        assert!(!slug::post_slug_taken(&db, "other-slug", None).unwrap());
    }
}

mod db_tests {
    use super::*;

    // Holding the whole pool at once forces every connection to be
    // created; each one must reject rows violating a foreign key.
    #[test]
    fn test_foreign_keys_enforced_on_every_pooled_connection() {
        let db = create_test_db();

        let conns: Vec<_> = (0..4).map(|_| db.get().unwrap()).collect();
        for conn in &conns {
            let result = conn.execute(
                "INSERT INTO images (file_name, path, user_id) VALUES ('a.png', 'posts/x', 999)",
                [],
            );
            assert!(result.is_err());
        }
    }
}

mod auth_tests {
    use super::*;

    #[test]
    fn test_create_and_authenticate_user() {
        let db = create_test_db();

        let id = auth::create_user(&db, "reader", "reader@example.com", TEST_PASSWORD, false)
            .unwrap();
        assert!(id > 0);

        let user = auth::authenticate(&db, "reader@example.com", TEST_PASSWORD)
            .unwrap()
            .expect("User should authenticate");
        assert_eq!(user.name, "reader");
        assert!(!user.is_admin);

        let wrong = auth::authenticate(&db, "reader@example.com", "WrongPass456").unwrap();
        assert!(wrong.is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let db = create_test_db();

        auth::create_user(&db, "reader", "one@example.com", TEST_PASSWORD, false).unwrap();
        let result = auth::create_user(&db, "reader", "two@example.com", TEST_PASSWORD, false);
        assert!(matches!(result, Err(ApiError::Validation { field: "name", .. })));
    }

    #[test]
    fn test_session_lifecycle() {
        let db = create_test_db();

        let id = auth::create_user(&db, "reader", "reader@example.com", TEST_PASSWORD, false)
            .unwrap();
        let token = auth::create_session(&db, id, 7).unwrap();

        let user = auth::validate_session(&db, &token)
            .unwrap()
            .expect("Session should be valid");
        assert_eq!(user.id, id);

        auth::delete_session(&db, &token).unwrap();
        assert!(auth::validate_session(&db, &token).unwrap().is_none());
    }

    #[test]
    fn test_expired_session_rejected() {
        let db = create_test_db();

        let id = auth::create_user(&db, "reader", "reader@example.com", TEST_PASSWORD, false)
            .unwrap();
        let token = auth::create_session(&db, id, -1).unwrap();
        assert!(auth::validate_session(&db, &token).unwrap().is_none());
    }

    #[test]
    fn test_short_password_rejected() {
        let db = create_test_db();
        let result = auth::create_user(&db, "reader", "reader@example.com", "short", false);
        assert!(matches!(
            result,
            Err(ApiError::Validation { field: "password", .. })
        ));
    }
}
