// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use hireboard_api::{ApiError, Client, SCORE_TYPES_PATH};
use hireboard_app::{
    ListConfig, PagedListController, ProcessId, Reason, ReasonCategoryId, ScoreTypeId, TableCommand,
};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn mock_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());
    Ok((server, addr))
}

#[test]
fn unreachable_backend_error_is_actionable() {
    let client = Client::new("http://127.0.0.1:1/api", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .get_json::<serde_json::Value>(SCORE_TYPES_PATH)
        .expect_err("request should fail for unreachable endpoint");
    assert!(matches!(error, ApiError::Unreachable { .. }));
    assert!(error.to_string().contains("[api].base_url"));
}

#[test]
fn paged_envelope_is_fetched_with_query_parameters() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(
            request.url(),
            "/api/ScoreSetting/types?page=1&pageSize=2&search=tech&SortFields=name+desc"
        );
        let body = r#"{
            "items": [{"id": 1, "name": "Technical"}, {"id": 2, "name": "Culture"}],
            "page": 1, "pageSize": 2, "totalItems": 3, "totalPages": 2,
            "hasNextPage": true, "hasPreviousPage": false,
            "statusGroupCount": {"active": 2, "inactive": 1}
        }"#;
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let mut list = PagedListController::new(ListConfig::new("scoreTypeSettings").page_size(2));
    list.set_search("tech");
    let mut sort = hireboard_app::SortState::default();
    sort.cycle("name");
    sort.cycle("name");
    list.apply_sort(sort);

    let ticket = list.request_first_page();
    let command = list
        .load(&client.score_types(), ticket)
        .ok_or_else(|| anyhow!("first page should apply"))?;
    let TableCommand::SetRows { rows, reset_key } = command else {
        return Err(anyhow!("page one should replace rows"));
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(reset_key, 1);
    assert!(list.has_next_page());
    assert_eq!(list.group_counts().get("inactive"), Some(&1));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn bare_array_is_treated_as_single_page() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"[{"id": 4}, {"id": 5}, {"id": 6}]"#, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let mut list = PagedListController::new(ListConfig::new("benefitsFiterSettings"));
    let ticket = list.request_first_page();
    let page = client.fetch_page(hireboard_api::BENEFITS_PATH, &list.query(ticket))?;
    assert_eq!(page.items.len(), 3);
    assert!(!page.has_next_page);
    assert_eq!(page.total_items, 3);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn duplicate_name_conflict_maps_to_conflict() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.method(), &tiny_http::Method::Post);
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("request body should be readable");
        assert!(body.contains("\"name\":\"Technical\""));
        request
            .respond(json_response(
                r#"{"title":"Conflict","detail":"A score type named Technical already exists"}"#,
                409,
            ))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let row = hireboard_app::Row::new().with("name", "Technical");
    let error = client
        .create_score_type(&row)
        .expect_err("conflict should fail");
    assert!(error.is_conflict());
    assert!(error.to_string().contains("already exists"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn toggle_patch_sends_active_flag() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.method(), &tiny_http::Method::Patch);
        assert_eq!(request.url(), "/api/ScoreSetting/types/3/active");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("request body should be readable");
        assert_eq!(body, r#"{"active":false}"#);
        request
            .respond(Response::empty(204))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    client.set_score_type_active(ScoreTypeId::new(3), false)?;

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn malformed_body_is_a_decode_error() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response("{\"items\": 12}", 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .score_details(ScoreTypeId::new(1))
        .expect_err("malformed body should fail");
    assert!(matches!(error, ApiError::Decode { .. }));
    assert!(!error.is_rejection());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn reason_details_load_and_save_round_trip() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("load request expected");
        assert_eq!(request.method(), &tiny_http::Method::Get);
        assert_eq!(request.url(), "/api/RecruitmentStages/4/categories/with-reasons");
        let body = r#"{
            "processId": 4,
            "categories": [
                {"id": 10, "name": "Salary", "reasons": [{"id": 100, "text": "Too low"}]}
            ]
        }"#;
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");

        let mut request = server.recv().expect("save request expected");
        assert_eq!(request.method(), &tiny_http::Method::Put);
        assert_eq!(request.url(), "/api/RecruitmentStages/4/categories/with-reasons");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("request body should be readable");
        assert!(body.contains("\"processId\":4"));
        assert!(body.contains("\"text\":\"Too high\""));
        let saved = r#"{
            "processId": 4,
            "categories": [
                {"id": 10, "name": "Salary", "reasons": [
                    {"id": 100, "text": "Too low", "active": true},
                    {"id": 101, "text": "Too high", "active": true}
                ]}
            ]
        }"#;
        request
            .respond(json_response(saved, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let mut form = client.reason_details(ProcessId::new(4))?;
    assert_eq!(form.categories.len(), 1);
    assert_eq!(form.categories[0].id, Some(ReasonCategoryId::new(10)));
    assert!(form.categories[0].reasons[0].active);

    form.categories[0].reasons.push(Reason {
        id: None,
        text: "Too high".to_owned(),
        active: true,
    });
    let saved = client.save_reason_details(&form)?;
    assert_eq!(saved.categories[0].reasons.len(), 2);
    assert!(saved.categories[0].reasons.iter().all(|reason| reason.id.is_some()));

    handle.join().expect("server thread should join");
    Ok(())
}
