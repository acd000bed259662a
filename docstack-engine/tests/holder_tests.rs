mod common;

use common::{admin, admin_key, article_entity, at, caller, input, post_entity};
use docstack_engine::{Context, EngineError, EntityExt};
use docstack_model::{Entity, EntityHooks, Field, FieldError, FieldType, RequestContext, Role, Scope};
use docstack_types::{Map, Property, Value, meta};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn meta_value<'a>(props: &'a [Property], name: &str) -> Option<&'a Value> {
    props.iter().find(|p| p.name == name).map(|p| &p.value)
}

// ── Prepare ──────────────────────────────────────────────────────

#[test]
fn prepare_marks_absent_fields_waiting() {
    let entity = article_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(input(json!({"title": "Hi"}))).unwrap();

    let waiting: Vec<_> = holder.waiting().collect();
    assert_eq!(waiting, vec!["tags", "author.name", "author.email", "secret"]);
}

#[test]
fn prepare_resolves_nested_paths_and_literal_names() {
    let entity = article_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder
        .prepare(input(json!({
            "title": "Hi",
            "author": {"name": "Ann"},
            "author.email": "ann@example.com"
        })))
        .unwrap();

    let props = holder.save().unwrap();
    assert_eq!(meta_value(&props, "author.name"), Some(&Value::from("Ann")));
    assert_eq!(
        meta_value(&props, "author.email"),
        Some(&Value::from("ann@example.com"))
    );
}

#[test]
fn prepare_treats_broken_nesting_as_absent() {
    let entity = article_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder
        .prepare(input(json!({"title": "Hi", "author": "not a map"})))
        .unwrap();
    assert!(holder.waiting().any(|name| name == "author.name"));
}

#[test]
fn failed_prepare_leaves_holder_untouched() {
    let entity = Entity::compile(
        "post",
        vec![Field::text("title"), Field::new("count", FieldType::Number)],
    )
    .unwrap();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(input(json!({"title": "first"}))).unwrap();

    let err = holder
        .prepare(input(json!({"title": "second", "count": "x"})))
        .unwrap_err();
    assert!(matches!(err, EngineError::Field(FieldError::TypeMismatch { .. })));

    let props = holder.save().unwrap();
    assert_eq!(meta_value(&props, "title"), Some(&Value::from("first")));
}

#[test]
fn prepare_checks_write_rules_whatever_the_scope() {
    let entity = Entity::builder("member")
        .field(Field::text("nick"))
        .field(Field::text("role").rule(Scope::Write, Role::Admin))
        .build()
        .unwrap();
    let sub = || caller("sub", Role::Subscriber);

    for ctx in [sub(), sub().with_scope(Scope::Read)] {
        let mut holder = entity.new_holder(ctx);
        let err = holder.prepare(input(json!({"role": "admin"}))).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Field(FieldError::Forbidden { ref field, scope: Scope::Add }) if field == "role"
        ));
        assert_eq!(holder.context().current_scope(), Scope::Add);
    }

    let mut holder = entity.new_holder(sub());
    holder.prepare(input(json!({"nick": "s"}))).unwrap();
}

#[test]
fn name_provider_value_is_raw_input() {
    let entity = Entity::compile(
        "post",
        vec![Field::text("title")
            .name_provider()
            .transform(docstack_model::strategy::Slugify)],
    )
    .unwrap();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(input(json!({"title": "Hello World"}))).unwrap();

    assert_eq!(holder.name_provider_value(), Some(&Value::from("Hello World")));
}

// ── Save: create ─────────────────────────────────────────────────

#[test]
fn save_on_create_stamps_initial_meta() {
    let entity = post_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(input(json!({"title": "Hello"}))).unwrap();
    let props = holder.save().unwrap();

    assert_eq!(meta_value(&props, meta::VERSION), Some(&Value::Int(0)));
    assert_eq!(meta_value(&props, meta::STATUS), Some(&Value::from("active")));
    assert_eq!(
        meta_value(&props, meta::CREATED_BY),
        Some(&Value::Key(admin_key()))
    );
    assert_eq!(
        meta_value(&props, meta::UPDATED_BY),
        Some(&Value::Key(admin_key()))
    );
    assert_eq!(
        meta_value(&props, meta::CREATED_AT),
        meta_value(&props, meta::UPDATED_AT)
    );
}

#[test]
fn anonymous_save_has_no_author() {
    let entity = post_entity();
    let mut holder = entity.new_holder(Context::anonymous().with_scope(Scope::Add));
    holder.prepare(input(json!({"title": "Hello"}))).unwrap();
    let props = holder.save().unwrap();

    assert!(meta_value(&props, meta::CREATED_BY).is_none());
    assert!(meta_value(&props, meta::UPDATED_BY).is_none());
}

#[test]
fn missing_required_field_fails_save() {
    let entity = Entity::compile("signup", vec![Field::text("email").required()]).unwrap();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(Map::new()).unwrap();

    let err = holder.save().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Field(FieldError::Required { ref field }) if field == "email"
    ));
    assert!(holder.saved().is_empty());
}

#[test]
fn empty_sequence_does_not_satisfy_required_multiple() {
    let entity = Entity::compile("post", vec![Field::text("tags").multiple().required()]).unwrap();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(input(json!({"tags": []}))).unwrap();
    assert!(holder.save().is_err());
}

#[test]
fn defaults_fill_absent_fields_before_required_check() {
    let entity = Entity::compile(
        "post",
        vec![
            Field::text("status").required().default_value("draft"),
            Field::new("author", FieldType::Key).default_with(docstack_model::strategy::CurrentUser),
        ],
    )
    .unwrap();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    holder.prepare(Map::new()).unwrap();
    let props = holder.save().unwrap();

    assert_eq!(meta_value(&props, "status"), Some(&Value::from("draft")));
    assert_eq!(meta_value(&props, "author"), Some(&Value::Key(admin_key())));
}

// ── Load + Save: update ──────────────────────────────────────────

fn stored_post(title: &str, version: i64) -> Vec<Property> {
    vec![
        Property::new("title", title),
        Property::new(meta::CREATED_AT, Value::Timestamp(chrono::Utc::now())),
        Property::new(meta::CREATED_BY, Value::Key(admin_key())),
        Property::new(meta::VERSION, version),
        Property::new(meta::STATUS, "active"),
    ]
}

#[test]
fn omitted_fields_keep_stored_values() {
    let entity = post_entity();
    let stored = stored_post("Hello", 3);
    let mut holder = entity.new_holder(caller("ed", Role::Admin).with_scope(Scope::Edit));
    holder.prepare(Map::new()).unwrap();
    holder.load(stored.clone()).unwrap();
    let props = holder.save().unwrap();

    assert_eq!(meta_value(&props, "title"), Some(&Value::from("Hello")));
    assert_eq!(meta_value(&props, meta::VERSION), Some(&Value::Int(4)));
    assert_eq!(
        meta_value(&props, meta::CREATED_AT),
        meta_value(&stored, meta::CREATED_AT)
    );
    assert_eq!(
        meta_value(&props, meta::CREATED_BY),
        Some(&Value::Key(admin_key()))
    );
    assert_eq!(
        meta_value(&props, meta::UPDATED_BY),
        Some(&Value::Key(docstack_types::Key::named("member", "ed")))
    );
}

#[test]
fn explicit_input_overrides_stored() {
    let entity = post_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Edit));
    holder.prepare(input(json!({"title": "New"}))).unwrap();
    holder.load(stored_post("Old", 0)).unwrap();
    let props = holder.save().unwrap();

    let titles: Vec<_> = props.iter().filter(|p| p.name == "title").collect();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].value, Value::from("New"));
}

#[test]
fn missing_stored_version_starts_at_one() {
    let entity = post_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Edit));
    holder.prepare(Map::new()).unwrap();
    holder.load(vec![Property::new("title", "x")]).unwrap();
    let props = holder.save().unwrap();
    assert_eq!(meta_value(&props, meta::VERSION), Some(&Value::Int(1)));
}

#[test]
fn unknown_stored_properties_pass_through() {
    let entity = post_entity();
    let mut stored = stored_post("Hello", 0);
    stored.push(Property::new("legacy.rating", 5i64));

    let mut holder = entity.new_holder(admin().with_scope(Scope::Edit));
    holder.prepare(Map::new()).unwrap();
    holder.load(stored).unwrap();
    let props = holder.save().unwrap();

    assert_eq!(meta_value(&props, "legacy.rating"), Some(&Value::Int(5)));
    assert_eq!(
        at(&holder.output(), "legacy.rating"),
        Some(&json!(5))
    );
}

#[test]
fn stored_status_is_reset_to_active() {
    let entity = post_entity();
    let mut stored = stored_post("Hello", 0);
    stored.retain(|p| p.name != meta::STATUS);
    stored.push(Property::new(meta::STATUS, "draft"));

    let mut holder = entity.new_holder(admin().with_scope(Scope::Edit));
    holder.prepare(Map::new()).unwrap();
    holder.load(stored).unwrap();
    let props = holder.save().unwrap();

    let statuses: Vec<_> = props.iter().filter(|p| p.name == meta::STATUS).collect();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].value, Value::from("active"));
}

// ── Output ───────────────────────────────────────────────────────

#[test]
fn output_nests_and_collects() {
    let entity = article_entity();
    let mut holder = entity.new_holder(caller("ed", Role::Editor).with_scope(Scope::Add));
    holder
        .prepare(input(json!({
            "title": "Hi",
            "tags": ["rust", "db", "rust"],
            "author": {"name": "Ann", "email": "ann@example.com"},
            "secret": "s3cret"
        })))
        .unwrap();
    holder.save().unwrap();
    let out = holder.output();

    assert_eq!(at(&out, "title"), Some(&json!("Hi")));
    assert_eq!(at(&out, "tags"), Some(&json!(["rust", "db", "rust"])));
    assert_eq!(at(&out, "author.name"), Some(&json!("Ann")));
    assert_eq!(at(&out, "author.email"), Some(&json!("ann@example.com")));
    assert!(at(&out, "secret").is_none());
    assert_eq!(at(&out, "meta.version"), Some(&json!(0)));
}

#[test]
fn output_drops_fields_the_caller_cannot_read() {
    let entity = article_entity();
    let mut holder = entity.new_holder(Context::anonymous().with_scope(Scope::Read));
    holder
        .load(vec![
            Property::new("title", "Hi"),
            Property::new("author.name", "Ann"),
            Property::new("author.email", "ann@example.com"),
        ])
        .unwrap();
    let out = holder.output();

    assert_eq!(at(&out, "author.name"), Some(&json!("Ann")));
    assert!(at(&out, "author.email").is_none());
    assert_eq!(out.get("author"), Some(&json!({"name": "Ann"})));
}

#[test]
fn id_and_meta_come_last() {
    let entity = post_entity();
    let mut holder = entity.new_holder(admin().with_scope(Scope::Read));
    holder
        .load(vec![
            Property::new("id", "forged"),
            Property::new(meta::VERSION, 2i64),
            Property::new("title", "Hi"),
        ])
        .unwrap();
    let out = holder.output();

    let keys: Vec<_> = out.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "meta"]);
    assert_eq!(at(&out, "meta.version"), Some(&json!(2)));
}

struct WordCount;

impl EntityHooks for WordCount {
    fn after_read(
        &self,
        _ctx: &dyn RequestContext,
        output: &mut serde_json::Map<String, serde_json::Value>,
    ) {
        let words = output
            .get("title")
            .and_then(|t| t.as_str())
            .map_or(0, |t| t.split_whitespace().count());
        output.insert("words".into(), json!(words));
    }

    fn pre_init(&self, _ctx: &dyn RequestContext, input: &mut Map) -> Result<(), String> {
        if input.contains_key("forbidden") {
            return Err("forbidden key".into());
        }
        Ok(())
    }
}

#[test]
fn hooks_shape_input_and_output() {
    let entity = Entity::builder("post")
        .field(Field::text("title"))
        .hooks(WordCount)
        .build()
        .unwrap();

    let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
    let err = holder
        .prepare(input(json!({"forbidden": true})))
        .unwrap_err();
    assert!(matches!(err, EngineError::Hook(_)));

    holder.prepare(input(json!({"title": "one two three"}))).unwrap();
    holder.save().unwrap();
    assert_eq!(holder.output().get("words"), Some(&json!(3)));
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    /// Save fails with Required iff some required field has neither input
    /// nor stored data.
    #[test]
    fn required_iff_no_input_and_no_stored(
        fields in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 1..6)
    ) {
        let entity = Entity::compile(
            "post",
            fields
                .iter()
                .enumerate()
                .map(|(i, (required, _, _))| {
                    let f = Field::text(format!("f{i}"));
                    if *required { f.required() } else { f }
                })
                .collect(),
        )
        .unwrap();

        let mut given = Map::new();
        let mut stored = Vec::new();
        for (i, (_, in_input, in_store)) in fields.iter().enumerate() {
            if *in_input {
                given.insert(format!("f{i}"), Value::from("input"));
            }
            if *in_store {
                stored.push(Property::new(format!("f{i}"), "stored"));
            }
        }

        let mut holder = entity.new_holder(admin().with_scope(Scope::Edit));
        holder.prepare(given).unwrap();
        holder.load(stored).unwrap();
        let result = holder.save();

        let should_fail = fields.iter().any(|(req, inp, st)| *req && !*inp && !*st);
        prop_assert_eq!(
            matches!(result, Err(EngineError::Field(FieldError::Required { .. }))),
            should_fail
        );
        prop_assert_eq!(result.is_ok(), !should_fail);
    }

    /// Every input value comes back out of Output unchanged.
    #[test]
    fn output_reproduces_input(
        title in "[a-zA-Z ]{1,20}",
        tags in prop::collection::vec("[a-z]{1,8}", 0..5),
        city in prop::option::of("[A-Z][a-z]{2,10}"),
    ) {
        let entity = Entity::compile(
            "place",
            vec![
                Field::text("title").required(),
                Field::text("tags").multiple(),
                Field::text("address.city"),
            ],
        )
        .unwrap();

        let mut doc = json!({"title": &title, "tags": &tags});
        if let Some(city) = &city {
            doc["address"] = json!({"city": city});
        }

        let mut holder = entity.new_holder(admin().with_scope(Scope::Add));
        holder.prepare(input(doc)).unwrap();
        holder.save().unwrap();
        let out = holder.output();

        prop_assert_eq!(at(&out, "title"), Some(&json!(title)));
        if tags.is_empty() {
            prop_assert!(at(&out, "tags").is_none());
        } else {
            prop_assert_eq!(at(&out, "tags"), Some(&json!(tags)));
        }
        let expected_city = city.as_ref().map(|c| json!(c));
        prop_assert_eq!(at(&out, "address.city"), expected_city.as_ref());
    }
}
