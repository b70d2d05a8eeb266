use calcforum_api::{ApiConfig, ApiRequest, ApiResponse, ForumApi};
use serde_json::{json, Value};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn api() -> (TempDir, ForumApi) {
    let dir = tempfile::tempdir().unwrap();
    let api = ForumApi::new(ApiConfig::with_db_path(dir.path().join("forum.sqlite3")));
    (dir, api)
}

fn register(api: &ForumApi, username: &str) -> i64 {
    let response = api.handle(&ApiRequest::new("POST", "/users").with_body(
        json!({
            "name": username,
            "username": username,
            "email": format!("{username}@example.com"),
        })
        .to_string(),
    ));
    assert_eq!(response.status, 201, "{}", response.body_text());
    body(response)["id"].as_i64().unwrap()
}

fn body(response: ApiResponse) -> Value {
    response.body.expect("response should carry a body")
}

fn create(api: &ForumApi, actor: i64, payload: Value) -> Value {
    let response = api.handle(
        &ApiRequest::new("POST", "/posts")
            .with_actor(actor)
            .with_body(payload.to_string()),
    );
    assert_eq!(response.status, 201, "{}", response.body_text());
    body(response)
}

fn get(api: &ForumApi, path: &str) -> ApiResponse {
    api.handle(&ApiRequest::new("GET", path))
}

#[test]
fn thread_values_fold_through_the_chain() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");

    let root = create(&api, ada, json!({"number": 10}));
    let child = create(
        &api,
        ada,
        json!({"number": 5, "operator": "+", "parentPostId": root["id"]}),
    );
    let grandchild = create(
        &api,
        ada,
        json!({"number": 2, "operator": "*", "parentPostId": child["id"]}),
    );
    assert_eq!(grandchild["number"], json!(30.0));
    assert_eq!(grandchild["operation"], json!("*"));

    let read = body(get(&api, &format!("/posts/{}", grandchild["id"])));
    assert_eq!(read["number"], json!(30.0));
    assert_eq!(read["user"]["email"], json!("ada@example.com"));
    assert!(read["createdAt"].as_i64().unwrap() > 0);

    let parent = body(get(&api, &format!("posts/{}/parent", grandchild["id"])));
    assert_eq!(parent["id"], child["id"]);
    assert_eq!(parent["number"], json!(15.0));

    let count = body(get(&api, &format!("posts/{}/children/count", root["id"])));
    assert_eq!(count, json!({"count": 1}));

    let page = body(get(&api, &format!("posts/{}/children/page/0", child["id"])));
    assert_eq!(page["left"], json!(0));
    assert_eq!(page["posts"][0]["number"], json!(30.0));
}

#[test]
fn root_parent_and_unknown_posts_are_not_found() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");
    let root = create(&api, ada, json!({"number": 1}));

    let response = get(&api, &format!("posts/{}/parent", root["id"]));
    assert_eq!(response.status, 404);
    assert_eq!(body(response)["error"], json!("not_found"));

    assert_eq!(get(&api, "posts/999").status, 404);
    assert_eq!(get(&api, "posts/999/children/page/0").status, 404);
}

#[test]
fn division_by_zero_reply_is_rejected() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");
    let root = create(&api, ada, json!({"number": 8}));

    let response = api.handle(
        &ApiRequest::new("POST", "posts").with_actor(ada).with_body(
            json!({"number": 0, "operator": "/", "parentPostId": root["id"]}).to_string(),
        ),
    );
    assert_eq!(response.status, 400);
    assert_eq!(body(response)["error"], json!("validation"));

    let count = body(get(&api, &format!("posts/{}/children/count", root["id"])));
    assert_eq!(count["count"], json!(0));
}

#[test]
fn roots_paginate_newest_first_with_left_counts() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");
    for number in 0..25 {
        create(&api, ada, json!({"number": number}));
    }

    let first = body(get(&api, "roots"));
    assert_eq!(first["posts"].as_array().unwrap().len(), 10);
    assert_eq!(first["left"], json!(15));
    assert_eq!(first["posts"][0]["number"], json!(24.0));

    let third = body(get(&api, "roots?page=2"));
    assert_eq!(third["posts"].as_array().unwrap().len(), 5);
    assert_eq!(third["left"], json!(0));

    let alias = body(get(&api, "posts/page/2"));
    assert_eq!(alias, third);

    let beyond = body(get(&api, "roots?page=3"));
    assert_eq!(beyond, json!({"posts": [], "left": 0}));
}

#[test]
fn owner_updates_and_operator_null_semantics() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");
    let root = create(&api, ada, json!({"number": 6}));
    let child = create(
        &api,
        ada,
        json!({"number": 2, "operator": "-", "parentPostId": root["id"]}),
    );
    let child_path = format!("posts/{}", child["id"]);

    let updated = api.handle(
        &ApiRequest::new("PUT", child_path.as_str())
            .with_actor(ada)
            .with_body(r#"{"operator": "/"}"#),
    );
    assert_eq!(updated.status, 200);
    let updated = body(updated);
    assert_eq!(updated["number"], json!(3.0));
    assert_eq!(updated["operation"], json!("/"));

    let cleared = api.handle(
        &ApiRequest::new("PUT", child_path.as_str())
            .with_actor(ada)
            .with_body(r#"{"operator": null}"#),
    );
    assert_eq!(cleared.status, 400);

    let root_cleared = api.handle(
        &ApiRequest::new("PUT", format!("posts/{}", root["id"]))
            .with_actor(ada)
            .with_body(r#"{"operator": null, "number": 12}"#),
    );
    assert_eq!(root_cleared.status, 200);

    assert_eq!(body(get(&api, &child_path))["number"], json!(6.0));
}

#[test]
fn only_owner_may_delete_and_delete_cascades() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");
    let bob = register(&api, "bob");
    let root = create(&api, ada, json!({"number": 1}));
    let reply = create(
        &api,
        bob,
        json!({"number": 1, "operator": "+", "parentPostId": root["id"]}),
    );
    let root_path = format!("posts/{}", root["id"]);

    let denied = api.handle(&ApiRequest::new("DELETE", root_path.as_str()).with_actor(bob));
    assert_eq!(denied.status, 403);
    assert_eq!(get(&api, &root_path).status, 200);

    let anonymous = api.handle(&ApiRequest::new("DELETE", root_path.as_str()));
    assert_eq!(anonymous.status, 401);

    let deleted = api.handle(&ApiRequest::new("DELETE", root_path.as_str()).with_actor(ada));
    assert_eq!(deleted.status, 204);
    assert_eq!(get(&api, &root_path).status, 404);
    assert_eq!(get(&api, &format!("posts/{}", reply["id"])).status, 404);
}

#[test]
fn user_roots_lists_only_that_users_threads() {
    let (_dir, api) = api();
    let ada = register(&api, "ada");
    let bob = register(&api, "bob");
    let ada_root = create(&api, ada, json!({"number": 1}));
    create(&api, bob, json!({"number": 2}));
    create(
        &api,
        ada,
        json!({"number": 3, "operator": "*", "parentPostId": ada_root["id"]}),
    );

    let listed = body(get(&api, &format!("users/{ada}/roots")));
    let posts = listed["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], ada_root["id"]);

    assert_eq!(get(&api, "users/404/roots").status, 404);
}

#[test]
fn unopenable_database_is_internal_error_with_generic_message() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened as a database file.
    let api = ForumApi::new(ApiConfig::with_db_path(dir.path()));

    let response = api.handle(&ApiRequest::new("GET", "roots"));
    assert_eq!(response.status, 500);
    assert_eq!(
        body(response),
        json!({"error": "internal", "message": "internal error"})
    );
}

#[test]
fn first_requests_racing_on_a_fresh_database_all_succeed() {
    for _ in 0..5 {
        let (_dir, api) = api();
        let api = Arc::new(api);
        let barrier = Arc::new(Barrier::new(8));

        let requests = (0..8)
            .map(|_| {
                let api = Arc::clone(&api);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    api.handle(&ApiRequest::new("GET", "roots"))
                })
            })
            .collect::<Vec<_>>();
        for request in requests {
            let response = request.join().unwrap();
            assert_eq!(response.status, 200, "{}", response.body_text());
            assert_eq!(body(response), json!({"posts": [], "left": 0}));
        }
    }
}
