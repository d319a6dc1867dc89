//! Seed data for the in-memory blog resources.

use crudl_engine::envelope::record;
use crudl_engine::Record;
use serde_json::{json, Value};

fn records(values: Vec<Value>) -> Vec<Record> {
    values.into_iter().map(record).collect()
}

pub fn users() -> Vec<Record> {
    records(vec![
        json!({"id": 1, "username": "admin", "email": "admin@example.com", "is_staff": true}),
        json!({"id": 2, "username": "editor", "email": "editor@example.com", "is_staff": true}),
    ])
}

pub fn sections() -> Vec<Record> {
    records(vec![
        json!({"id": 1, "name": "Programming", "slug": "programming", "position": 1}),
        json!({"id": 2, "name": "Travel", "slug": "travel", "position": 2}),
    ])
}

pub fn categories() -> Vec<Record> {
    records(vec![
        json!({"id": 1, "section": 1, "name": "Rust", "slug": "rust", "position": 1}),
        json!({"id": 2, "section": 1, "name": "Python", "slug": "python", "position": 2}),
        json!({"id": 3, "section": 2, "name": "Europe", "slug": "europe", "position": 1}),
        json!({"id": 4, "section": 2, "name": "Asia", "slug": "asia", "position": 2}),
    ])
}

pub fn tags() -> Vec<Record> {
    records(vec![
        json!({"id": 1, "name": "async"}),
        json!({"id": 2, "name": "ownership"}),
        json!({"id": 3, "name": "tutorial"}),
        json!({"id": 4, "name": "trains"}),
    ])
}

pub fn entries() -> Vec<Record> {
    records(vec![
        json!({
            "id": 1,
            "title": "Understanding Ownership",
            "status": "1",
            "status_name": "Online",
            "date": "2024-03-01",
            "sticky": true,
            "section": 1,
            "section_name": "Programming",
            "category": 1,
            "category_name": "Rust",
            "tags": [2, 3],
            "summary": "Moves, borrows and lifetimes.",
            "body": "Every value has exactly one owner.",
            "owner": "admin",
            "createdate": "2024-02-27T09:12:00Z",
            "updatedate": "2024-03-01T08:00:00Z",
            "counter_links": 1,
        }),
        json!({
            "id": 2,
            "title": "Async Rust in Practice",
            "status": "0",
            "status_name": "Draft",
            "date": "2024-04-12",
            "sticky": false,
            "section": 1,
            "section_name": "Programming",
            "category": 1,
            "category_name": "Rust",
            "tags": [1],
            "summary": "",
            "body": "",
            "owner": "editor",
            "createdate": "2024-04-10T14:30:00Z",
            "updatedate": "2024-04-12T10:00:00Z",
            "counter_links": 0,
        }),
        json!({
            "id": 3,
            "title": "Night Trains Across Europe",
            "status": "1",
            "status_name": "Online",
            "date": "2024-05-20",
            "sticky": false,
            "section": 2,
            "section_name": "Travel",
            "category": 3,
            "category_name": "Europe",
            "tags": [4],
            "summary": "Sleeping your way from Vienna to Brussels.",
            "body": "The route is slower than a plane and far more fun.",
            "owner": "admin",
            "createdate": "2024-05-18T19:45:00Z",
            "updatedate": "2024-05-20T07:15:00Z",
            "counter_links": 0,
        }),
    ])
}

pub fn links() -> Vec<Record> {
    records(vec![json!({
        "id": 1,
        "entry": 1,
        "url": "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html",
        "title": "The Book: Ownership",
    })])
}
