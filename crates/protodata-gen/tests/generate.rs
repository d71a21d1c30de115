use protodata_gen::{generate, GenerateOptions, GenerationOutput, JsonEncoder, YamlEncoder};
use protodata_schema::SchemaGraph;
use serde_json::{json, Value};

const LIBRARY: &str = include_str!("../../protodata-schema/tests/fixtures/library.json");

fn run_json() -> GenerationOutput {
    let graph = SchemaGraph::from_descriptor_json(LIBRARY, &[]).unwrap();
    generate(&graph, &JsonEncoder, &GenerateOptions::default()).unwrap()
}

fn json_artifact(output: &GenerationOutput, path: &str) -> Value {
    let artifact = output
        .artifact(path)
        .unwrap_or_else(|| panic!("missing artifact {path}"));
    serde_json::from_str(&artifact.content).unwrap()
}

#[test]
fn emits_one_artifact_per_target_entity() {
    let output = run_json();
    let paths: Vec<String> = output
        .artifacts
        .iter()
        .map(|a| a.path.to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(
        paths,
        vec![
            "api/acme.library.v1/enums/ShelfState.json",
            "api/acme.library.v1/enums/Book.Author.Role.json",
            "api/acme.library.v1/messages/Book.json",
            "api/acme.library.v1/messages/Book.Author.json",
            "api/acme.library.v1/messages/GetBookRequest.json",
            "api/acme.library.v1/messages/UpdateBookRequest.json",
            "api/acme.library.v1/services/LibraryService.json",
        ]
    );
    assert!(output.diagnostics.is_empty());
}

#[test]
fn enum_document() {
    let output = run_json();
    assert_eq!(
        json_artifact(&output, "api/acme.library.v1/enums/ShelfState.json"),
        json!({
            "name": "ShelfState",
            "comment": "Where a book currently sits.",
            "values": [
                { "name": "SHELF_STATE_UNSPECIFIED", "value": 0 },
                { "name": "SHELF_STATE_OPEN", "comment": "Open for loans.", "value": 1 },
                { "name": "SHELF_STATE_CLOSED", "value": 2 }
            ]
        })
    );
}

#[test]
fn message_document() {
    let output = run_json();
    assert_eq!(
        json_artifact(&output, "api/acme.library.v1/messages/Book.json"),
        json!({
            "name": "Book",
            "comment": "A book in the catalog.\n\nBooks are immutable once archived.",
            "fields": [
                {
                    "name": "title",
                    "comment": "Display title.",
                    "type": "string",
                    "rules": { "min_len": 1, "max_len": 200 },
                    "default": ""
                },
                {
                    "name": "tags",
                    "rules": { "min_items": 1, "unique": true },
                    "repeated": { "type": "string", "rules": { "max_len": 32 } },
                    "default": []
                },
                {
                    "name": "ratings",
                    "rules": { "max_pairs": 10 },
                    "map_key": { "type": "string" },
                    "map_value": { "type": "int32", "rules": { "gte": 1, "lte": 5 } },
                    "default": {}
                },
                {
                    "name": "published_at",
                    "message": { "package": "google.protobuf", "name": "Timestamp" },
                    "rules": { "lt_now": true },
                    "default": "0001-01-01T00:00:00Z"
                },
                {
                    "name": "loan_period",
                    "message": { "package": "google.protobuf", "name": "Duration" },
                    "rules": { "gt": 0, "lte": 2_592_000_000_000_000_i64 },
                    "default": "0s"
                },
                {
                    "name": "subtitle",
                    "message": { "package": "google.protobuf", "name": "StringValue" },
                    "default": null
                },
                {
                    "name": "shelf_state",
                    "enum": { "name": "ShelfState" },
                    "rules": { "defined_only": true },
                    "default": "SHELF_STATE_UNSPECIFIED"
                },
                {
                    "name": "visibility",
                    "enum": { "package": "acme.common.v1", "name": "Visibility" },
                    "default": "VISIBILITY_UNSPECIFIED"
                },
                {
                    "name": "author",
                    "message": { "name": "Book.Author" },
                    "rules": { "required": true },
                    "default": {}
                },
                {
                    "name": "cover",
                    "type": "bytes",
                    "rules": { "max_len": 1_048_576, "prefix": [137, 80, 78, 71] },
                    "default": []
                },
                { "name": "isbn", "type": "string", "default": "" },
                { "name": "catalog_id", "type": "uint64", "rules": { "gt": 0 }, "default": 0 },
                { "name": "copies", "type": "uint32", "default": 0 },
                {
                    "name": "extra",
                    "message": { "package": "google.protobuf", "name": "Any" },
                    "default": null
                }
            ],
            "oneofs": [
                {
                    "name": "source",
                    "comment": "Where the book came from.",
                    "field_names": ["isbn", "catalog_id"]
                }
            ]
        })
    );
}

#[test]
fn field_keys_follow_declared_order() {
    let output = run_json();
    let text = &output
        .artifact("api/acme.library.v1/messages/Book.json")
        .unwrap()
        .content;
    let ratings = text.find("\"name\": \"ratings\"").unwrap();
    let tail = &text[ratings..];
    let order: Vec<usize> = ["\"rules\"", "\"map_key\"", "\"map_value\"", "\"default\""]
        .iter()
        .map(|key| tail.find(key).unwrap())
        .collect();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(order, sorted);
    assert!(text.starts_with("{\n  \"name\": \"Book\",\n  \"comment\""));
}

#[test]
fn nested_message_document() {
    let output = run_json();
    assert_eq!(
        json_artifact(&output, "api/acme.library.v1/messages/Book.Author.json"),
        json!({
            "name": "Book.Author",
            "comment": "Who wrote it.",
            "fields": [
                { "name": "name", "type": "string", "default": "" },
                { "name": "role", "enum": { "name": "Book.Author.Role" }, "default": "ROLE_UNSPECIFIED" }
            ]
        })
    );
}

#[test]
fn service_document() {
    let output = run_json();
    let artifact = output
        .artifact("api/acme.library.v1/services/LibraryService.json")
        .unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&artifact.content).unwrap(),
        json!({
            "name": "LibraryService",
            "comment": "Lending operations.",
            "methods": {
                "GetBook": {
                    "name": "GetBook",
                    "comment": "Fetch a single book.",
                    "input": { "name": "GetBookRequest" },
                    "output": { "name": "Book" },
                    "http": [
                        { "method": "GET", "path": "/v1/{name=books/*}" },
                        { "method": "POST", "path": "/v1/{name=books/*}:get" }
                    ]
                },
                "UpdateBook": {
                    "name": "UpdateBook",
                    "input": { "name": "UpdateBookRequest" },
                    "output": { "name": "Book" },
                    "http": [{
                        "method": "PATCH",
                        "path": "/v1/{book.name=books/*}",
                        "input": "book",
                        "input_message": ".acme.library.v1.UpdateBookRequest.book"
                    }]
                },
                "WatchBooks": {
                    "name": "WatchBooks",
                    "input": { "name": "GetBookRequest" },
                    "output": { "name": "Book", "stream": true },
                    "http": [{ "method": "HEAD", "path": "/v1/books:watch", "output": "missing_field" }]
                },
                "ArchiveBook": {
                    "name": "ArchiveBook",
                    "input": { "name": "GetBookRequest" },
                    "output": { "package": "google.protobuf", "name": "Any" }
                }
            }
        })
    );

    // Methods stay in declaration order, not alphabetical.
    let positions: Vec<usize> = ["\"GetBook\":", "\"UpdateBook\":", "\"WatchBooks\":", "\"ArchiveBook\":"]
        .iter()
        .map(|key| artifact.content.find(key).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
}

#[test]
fn yaml_output_mirrors_json_with_base64_bytes() {
    let graph = SchemaGraph::from_descriptor_json(LIBRARY, &[]).unwrap();
    let output = generate(&graph, &YamlEncoder, &GenerateOptions::default()).unwrap();
    assert_eq!(output.artifacts.len(), 7);

    let book = output
        .artifact("api/acme.library.v1/messages/Book.yml")
        .unwrap();
    assert!(book.content.starts_with("name: Book\n"), "{}", book.content);

    let doc: serde_yaml::Value = serde_yaml::from_str(&book.content).unwrap();
    assert_eq!(
        doc["comment"].as_str(),
        Some("A book in the catalog.\n\nBooks are immutable once archived.")
    );
    let cover = &doc["fields"][9];
    assert_eq!(cover["name"].as_str(), Some("cover"));
    assert_eq!(cover["rules"]["prefix"].as_str(), Some("iVBORw=="));
    assert_eq!(cover["default"].as_str(), Some(""));

    let service = output
        .artifact("api/acme.library.v1/services/LibraryService.yml")
        .unwrap();
    let get = service.content.find("  GetBook:").unwrap();
    let archive = service.content.find("  ArchiveBook:").unwrap();
    assert!(get < archive);
}
