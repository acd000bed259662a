mod common;

use common::TestCtx;
use docstack_model::{FieldType, Role, SchemaError, SchemaFile, SchemaRegistry, Scope};
use docstack_types::Value;
use pretty_assertions::assert_eq;

const SCHEMA: &str = r#"
[[entity]]
name = "post"
rules = { read = "guest", write = "editor" }

[[entity.fields]]
name = "title"
required = true
name_provider = true
transform = "trim"

[[entity.fields]]
name = "tags"
multiple = true

[[entity.fields]]
name = "status"
default = "draft"

[[entity.fields]]
name = "author"
type = "key"
default_from = "current_user"

[[entity.fields]]
name = "seo.description"
type = "long_text"
no_index = true
rules = { write = "admin" }

[[entity]]
name = "tag"
"#;

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parses_entities_and_fields() {
    let file = SchemaFile::from_toml_str(SCHEMA).unwrap();
    assert_eq!(file.entities.len(), 2);

    let post = &file.entities[0];
    assert_eq!(post.name, "post");
    assert_eq!(post.rules.get(Scope::Write), Some(Role::Editor));
    assert_eq!(post.fields.len(), 5);
    assert_eq!(post.fields[3].field_type, FieldType::Key);
    assert_eq!(post.fields[4].field_type, FieldType::LongText);
    assert!(file.entities[1].fields.is_empty());
}

#[test]
fn empty_file_has_no_entities() {
    let file = SchemaFile::from_toml_str("").unwrap();
    assert!(file.entities.is_empty());
}

#[test]
fn malformed_toml_is_parse_error() {
    assert!(matches!(
        SchemaFile::from_toml_str("[[entity]\nname = "),
        Err(SchemaError::Parse(_))
    ));
}

// ── Compilation ──────────────────────────────────────────────────

#[test]
fn compiles_into_registry() {
    let file = SchemaFile::from_toml_str(SCHEMA).unwrap();
    let registry = SchemaRegistry::from_schema_file(&file).unwrap();
    let post = registry.get("post").unwrap();

    assert_eq!(post.rules().get(Scope::Edit), Some(Role::Editor));
    assert_eq!(post.rules().get(Scope::Read), Some(Role::Guest));
    assert_eq!(registry.get("tag").unwrap().rules().get(Scope::Read), Some(Role::Admin));
    assert!(post.name_func().is_some());
    assert!(post.field("seo.description").unwrap().is_no_index());
}

#[test]
fn named_strategies_are_resolved() {
    let file = SchemaFile::from_toml_str(SCHEMA).unwrap();
    let post = file.entities[0].compile().unwrap();
    let ctx = TestCtx::admin();

    let title = post.field("title").unwrap().parse(&ctx, &"  Hi  ".into()).unwrap();
    assert_eq!(title[0].value, Value::from("Hi"));

    let status = post.field("status").unwrap().default_for(&ctx).unwrap();
    assert_eq!(status[0].value, Value::from("draft"));

    let author = post.field("author").unwrap().default_for(&ctx).unwrap();
    assert_eq!(author[0].value.as_key(), ctx.user.as_ref());
}

#[test]
fn default_must_fit_field_type() {
    let file = SchemaFile::from_toml_str(
        r#"
[[entity]]
name = "post"

[[entity.fields]]
name = "count"
type = "number"
default = "many"
"#,
    )
    .unwrap();
    let err = file.entities[0].compile().unwrap_err();
    assert!(matches!(err, SchemaError::InvalidDefault { ref field, .. } if field == "count"));
}

#[test]
fn default_and_default_from_are_exclusive() {
    let file = SchemaFile::from_toml_str(
        r#"
[[entity]]
name = "post"

[[entity.fields]]
name = "when"
type = "timestamp"
default = "2024-01-01T00:00:00Z"
default_from = "now"
"#,
    )
    .unwrap();
    assert!(matches!(
        file.entities[0].compile(),
        Err(SchemaError::InvalidDefault { .. })
    ));
}

#[test]
fn compile_errors_surface_from_registry() {
    let file = SchemaFile::from_toml_str(
        r#"
[[entity]]
name = "post"

[[entity.fields]]
name = "id"
"#,
    )
    .unwrap();
    assert!(matches!(
        SchemaRegistry::from_schema_file(&file),
        Err(SchemaError::ReservedFieldName(_))
    ));
}
