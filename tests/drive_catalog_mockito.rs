use mockito::{Matcher, Server};
use std::time::Duration;

use hearing_sync::api::drive::DriveCatalogSource;
use hearing_sync::api::CatalogSource;
use hearing_sync::catalog;
use hearing_sync::config::CatalogLayout;
use hearing_sync::SyncError;

fn query(q: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("q".into(), q.into()),
        Matcher::UrlEncoded("orderBy".into(), "name".into()),
        Matcher::UrlEncoded("key".into(), "drive-key".into()),
    ])
}

fn source(base: &str) -> DriveCatalogSource {
    DriveCatalogSource::new(base, "drive-key", Duration::from_secs(5)).unwrap()
}

#[test]
fn grouped_catalog_follows_backend_order_and_skips_broken_folder() {
    let mut server = Server::new();
    let _folders = server
        .mock("GET", "/files")
        .match_query(query("'root' in parents and mimeType='application/vnd.google-apps.folder'"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"files":[{"id":"f1","name":"Band 1"},{"id":"f2","name":"Band 2"},{"id":"f3","name":"Band 3"}]}"#,
        )
        .create();
    let _f1 = server
        .mock("GET", "/files")
        .match_query(query("'f1' in parents and (mimeType='audio/mpeg')"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"files":[
                {"id":"a1","name":"01 Anfang.mp3","mimeType":"audio/mpeg"},
                {"id":"a2","name":"cover.png","mimeType":"image/png"},
                {"id":"a3","name":"02 Ende.mp3","mimeType":"audio/mpeg"}
            ]}"#,
        )
        .create();
    let _f2 = server
        .mock("GET", "/files")
        .match_query(query("'f2' in parents and (mimeType='audio/mpeg')"))
        .with_status(500)
        .with_body("backend error")
        .create();
    let _f3 = server
        .mock("GET", "/files")
        .match_query(query("'f3' in parents and (mimeType='audio/mpeg')"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"files":[{"id":"c1","name":"Epilog.mp3","mimeType":"audio/mpeg"}]}"#)
        .create();

    let base = server.url();
    let src = source(&base);
    let mimes = vec!["audio/mpeg".to_string()];
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cat = rt
        .block_on(async { catalog::load(&src, "root", CatalogLayout::Grouped, &mimes, Duration::from_secs(5)).await })
        .unwrap();

    let labels: Vec<String> = cat.items().iter().map(|i| i.label()).collect();
    assert_eq!(labels, vec!["Band 1 / 01 Anfang.mp3", "Band 1 / 02 Ende.mp3", "Band 3 / Epilog.mp3"]);
    assert_eq!(cat.group_count(), 2);
    assert_eq!(cat.get(0).unwrap().source_locator, format!("{}/files/a1?alt=media", base));
}

#[test]
fn root_listing_failure_is_an_error() {
    let mut server = Server::new();
    let _m = server
        .mock("GET", "/files")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"message":"API key not valid"}}"#)
        .create();

    let src = source(&server.url());
    let mimes = vec!["audio/mpeg".to_string()];
    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(async { catalog::load(&src, "root", CatalogLayout::Grouped, &mimes, Duration::from_secs(5)).await });
    match res {
        Err(SyncError::Transport(msg)) => assert!(msg.contains("403")),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(c) => panic!("expected failure, got {} items", c.len()),
    }
}

#[test]
fn fetch_media_returns_bytes() {
    let mut server = Server::new();
    let _m = server
        .mock("GET", "/files/a1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("alt".into(), "media".into()),
            Matcher::UrlEncoded("key".into(), "drive-key".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "audio/mpeg")
        .with_body(b"ID3\x04fake".to_vec())
        .create();
    let _missing = server
        .mock("GET", "/files/gone")
        .match_query(Matcher::Any)
        .with_status(404)
        .create();

    let src = source(&server.url());
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (found, missing) = rt.block_on(async { (src.fetch_media("a1").await, src.fetch_media("gone").await) });
    assert_eq!(found.unwrap(), b"ID3\x04fake".to_vec());
    assert!(matches!(missing, Err(SyncError::NotFound)));
}
