//! Integration tests for the JSON-RPC adapter.

mod common;

use common::TestClient;
use serde_json::{json, Value};

fn text_of(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content")
}

#[tokio::test]
async fn test_lists_resources_and_tools() {
    let client = TestClient::new();

    let response = client.rpc("alice", "resources/list", Value::Null).await;
    let uris: Vec<_> = response["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        uris,
        vec!["paylog://entries", "paylog://weekly-summaries", "paylog://stats"]
    );

    let response = client.rpc("alice", "tools/list", Value::Null).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["add_entry", "update_entry", "delete_entry", "calculate_weekly_hours"]
    );
    assert_eq!(tools[1]["inputSchema"]["required"], json!(["id"]));
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
}

#[tokio::test]
async fn test_tool_calls_mutate_store() {
    let client = TestClient::new();

    let added = client
        .rpc(
            "alice",
            "tools/call",
            json!({
                "name": "add_entry",
                "arguments": {
                    "start_date": "2024-01-01",
                    "end_date": "2024-01-01",
                    "hours_worked": 8,
                    "base_salary": 200,
                    "tips": 20,
                },
            }),
        )
        .await;
    assert!(text_of(&added).starts_with("Added entry:"));

    let (_, entries) = client.get_json("/api/owners/alice/entries").await;
    let id = entries[0]["id"].as_str().unwrap().to_string();
    assert_eq!(entries[0]["tipsAmount"], 20.0);

    let updated = client
        .rpc(
            "alice",
            "tools/call",
            json!({ "name": "update_entry", "arguments": { "id": id, "tipsAmount": 40 } }),
        )
        .await;
    assert!(text_of(&updated).contains("\"tipsAmount\": 40.0"));

    let deleted = client
        .rpc(
            "alice",
            "tools/call",
            json!({ "name": "delete_entry", "arguments": { "id": id } }),
        )
        .await;
    assert_eq!(text_of(&deleted), format!("Deleted entry with ID: {}", id));

    let (_, entries) = client.get_json("/api/owners/alice/entries").await;
    assert!(entries.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_calculate_weekly_hours() {
    let client = TestClient::new();
    client.create_entry("alice", "2024-01-01", 8.0, 200.0, 0.0).await;
    client.create_entry("alice", "2024-01-07", 4.5, 100.0, 0.0).await;
    client.create_entry("alice", "2024-01-08", 6.0, 100.0, 0.0).await;
    client
        .post_json(
            "/api/owners/alice/entries",
            &json!({
                "periodStart": "2024-01-03",
                "periodEnd": "2024-01-03",
                "hoursWorked": 2,
                "extraHours": 1.5,
                "baseAmount": 50,
            }),
        )
        .await;

    let response = client
        .rpc(
            "alice",
            "tools/call",
            json!({ "name": "calculate_weekly_hours", "arguments": { "week_start": "2024-01-01" } }),
        )
        .await;
    assert_eq!(
        text_of(&response),
        "Week of 2024-01-01: 14.5 regular hours, 1.5 extra hours (16 total)"
    );
}

#[tokio::test]
async fn test_read_resources() {
    let client = TestClient::new();
    client.create_entry("alice", "2024-01-01", 8.0, 200.0, 20.0).await;
    client.create_entry("alice", "2024-01-03", 8.0, 200.0, 10.0).await;

    let response = client
        .rpc("alice", "resources/read", json!({ "uri": "paylog://weekly-summaries" }))
        .await;
    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "application/json");
    let weeks: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(weeks[0]["weekStart"], "2023-12-31");
    assert_eq!(weeks[0]["totalIncome"], 430.0);

    let response = client
        .rpc("alice", "resources/read", json!({ "uri": "paylog://stats" }))
        .await;
    let stats: Value =
        serde_json::from_str(response["result"]["contents"][0]["text"].as_str().unwrap())
            .unwrap();
    assert_eq!(stats["totalEntries"], 2);
    assert_eq!(stats["averageHourlyRate"], 26.875);
}

#[tokio::test]
async fn test_error_codes() {
    let client = TestClient::new();

    let response = client.rpc("alice", "prompts/list", Value::Null).await;
    assert_eq!(response["error"]["code"], -32601);
    assert!(response.get("result").is_none());

    let response = client
        .rpc("alice", "resources/read", json!({ "uri": "paylog://nope" }))
        .await;
    assert_eq!(response["error"]["code"], -32602);

    let response = client
        .rpc("alice", "tools/call", json!({ "name": "launch_rocket" }))
        .await;
    assert_eq!(response["error"]["code"], -32602);

    let response = client
        .rpc(
            "alice",
            "tools/call",
            json!({ "name": "add_entry", "arguments": { "start_date": "2024-01-01" } }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32602);

    let response = client
        .rpc(
            "alice",
            "tools/call",
            json!({ "name": "delete_entry", "arguments": { "id": "missing" } }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32602);

    let response = client.rpc("alice", "resources/read", json!({})).await;
    assert_eq!(response["error"]["code"], -32602);
}
