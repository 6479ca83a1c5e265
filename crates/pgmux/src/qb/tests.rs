use super::*;
use crate::manifest::LogicalType::*;
use crate::manifest::Manifest;
use crate::param::Param;

fn model() -> Arc<ManifestModel> {
    let manifest = Manifest::new()
        .table(
            "users",
            [("user_id", UniqueIntegerMainKey), ("name", String), ("age", Integer)],
        )
        .table(
            "profiles",
            [("profile_id", UniqueInteger), ("user_id", Integer), ("bio", String)],
        )
        .table(
            "tags",
            [("tag_id", UniqueInteger), ("user_id", Integer), ("label", String)],
        );
    Arc::new(ManifestModel::load(manifest).unwrap())
}

fn qb() -> QueryBuilder {
    QueryBuilder::new(model())
}

#[test]
fn register_column_pulls_in_table_index() {
    let mut qb = qb();
    assert_eq!(qb.register_column("bio").unwrap(), r#""profiles"."bio""#);
    assert_eq!(qb.active_tables(), ["profiles"]);
    assert_eq!(
        qb.active_columns(),
        [r#""profiles"."bio""#, r#""profiles"."profile_id""#]
    );
}

#[test]
fn register_index_column_stops_recursion() {
    let mut qb = qb();
    qb.register_column("profile_id").unwrap();
    assert_eq!(qb.active_columns(), [r#""profiles"."profile_id""#]);
}

#[test]
fn select_single_table() {
    let built = qb().select(&["name"]).unwrap();
    assert_eq!(
        built.sql,
        r#"SELECT "users"."name", "users"."user_id" FROM "users""#
    );
    assert!(built.params.is_empty());
}

#[test]
fn select_joins_on_shared_key() {
    let built = qb().select(&["name", "bio"]).unwrap();
    assert_eq!(
        built.sql,
        concat!(
            r#"SELECT "users"."name", "users"."user_id", "profiles"."bio", "profiles"."profile_id", "#,
            r#""profiles"."profile_id" AS "profiles_profile_id" "#,
            r#"FROM "users" JOIN "profiles" ON "profiles"."user_id" = "users"."user_id""#
        )
    );
}

#[test]
fn select_over_n_tables_has_n_minus_one_joins() {
    let built = qb().select(&["label", "name", "bio"]).unwrap();
    assert_eq!(built.sql.matches(" JOIN ").count(), 2);
    assert_eq!(built.sql.matches(" AS ").count(), 2);
    assert!(built.sql.contains(r#"FROM "users" JOIN "tags""#));
}

#[test]
fn select_across_secondary_tables_anchors_on_primary_table() {
    let built = qb().select(&["bio", "label"]).unwrap();
    assert_eq!(
        built.sql,
        concat!(
            r#"SELECT "profiles"."bio", "profiles"."profile_id", "tags"."label", "tags"."tag_id", "#,
            r#""users"."user_id", "profiles"."profile_id" AS "profiles_profile_id", "#,
            r#""tags"."tag_id" AS "tags_tag_id" "#,
            r#"FROM "users" JOIN "profiles" ON "profiles"."user_id" = "users"."user_id" "#,
            r#"JOIN "tags" ON "tags"."user_id" = "users"."user_id""#
        )
    );
}

#[test]
fn select_on_one_secondary_table_needs_no_anchor() {
    let built = qb().select(&["bio"]).unwrap();
    assert_eq!(
        built.sql,
        r#"SELECT "profiles"."bio", "profiles"."profile_id" FROM "profiles""#
    );
}

#[test]
fn select_aliases_shared_key_of_secondary_table() {
    let built = qb().select(&["profiles_user_id"]).unwrap();
    assert_eq!(
        built.sql,
        r#"SELECT "profiles"."user_id" AS "profiles_user_id", "profiles"."profile_id" FROM "profiles""#
    );
}

#[test]
fn select_requires_columns() {
    assert!(qb().select(&[]).unwrap_err().is_request());
}

#[test]
fn condition_binds_by_occurrence_not_registration() {
    let mut qb = qb();
    let inner = qb.matching(Joiner::And, [("age", 30)]).unwrap();
    qb.featuring(
        Joiner::Or,
        Criteria::new().column("name", "bo").fragment(&inner),
    )
    .unwrap();

    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with(
        r#"WHERE ("users"."name" LIKE $1 OR ("users"."age" = $2))"#
    ));
    assert_eq!(built.params.len(), 2);
    assert_eq!(built.params.get(0), Some(&Param::Text("%bo%".into())));
    assert_eq!(built.params.get(1), Some(&Param::Integer(30)));
}

#[test]
fn repeated_fragment_shares_one_param() {
    let mut qb = qb();
    let inner = qb.matching(Joiner::And, [("age", 30)]).unwrap();
    qb.either(Criteria::new().fragment(&inner).fragment(&inner))
        .unwrap();

    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with(
        r#"WHERE (("users"."age" = $1) OR ("users"."age" = $1))"#
    ));
    assert_eq!(built.params.len(), 1);
}

#[test]
fn separate_conditions_are_anded() {
    let mut qb = qb();
    qb.matching(Joiner::And, [("name", "ann")]).unwrap();
    qb.matching(Joiner::And, [("age", 41)]).unwrap();

    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with(
        r#"WHERE ("users"."name" = $1) AND ("users"."age" = $2)"#
    ));
    assert_eq!(built.params.get(1), Some(&Param::Integer(41)));
}

#[test]
fn same_column_twice_in_one_call_binds_both_values() {
    let mut qb = qb();
    qb.either(vec![("name", "ann"), ("name", "bob")]).unwrap();

    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with(
        r#"WHERE ("users"."name" = $1 OR "users"."name" = $2)"#
    ));
    assert_eq!(built.params.get(0), Some(&Param::Text("ann".into())));
    assert_eq!(built.params.get(1), Some(&Param::Text("bob".into())));
}

#[test]
fn pattern_variants() {
    let mut qb = qb();
    qb.starts_with(Joiner::And, [("name", "an")]).unwrap();
    qb.ends_with(Joiner::And, [("bio", "rs")]).unwrap();
    qb.featuring(Joiner::And, [("label", "50%")]).unwrap();

    let built = qb.select(&["name"]).unwrap();
    assert_eq!(built.params.get(0), Some(&Param::Text("an%".into())));
    assert_eq!(built.params.get(1), Some(&Param::Text("%rs".into())));
    assert_eq!(built.params.get(2), Some(&Param::Text(r"%50\%%".into())));
}

#[test]
fn pattern_on_non_string_column_casts_to_text() {
    let mut qb = qb();
    let fragment = qb.featuring(Joiner::And, [("age", 4)]).unwrap();
    assert!(fragment.starts_with(r#"(CAST("users"."age" AS TEXT) LIKE ?"#));
}

#[test]
fn exact_null_renders_is_null() {
    let mut qb = qb();
    qb.matching(Joiner::And, [("bio", Value::Null)]).unwrap();
    let built = qb.select(&["bio"]).unwrap();
    assert!(built.sql.ends_with(r#"WHERE ("profiles"."bio" IS NULL)"#));
    assert!(built.params.is_empty());
}

#[test]
fn condition_pulls_table_into_join() {
    let mut qb = qb();
    qb.matching(Joiner::And, [("label", "x")]).unwrap();
    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.contains(r#"JOIN "tags""#));
}

#[test]
fn failed_condition_abandons_request() {
    let mut qb = qb();
    qb.matching(Joiner::And, [("name", "ann")]).unwrap();
    let err = qb.matching(Joiner::And, [("nope", 1)]).unwrap_err();
    assert!(err.is_request());
    assert!(qb.active_tables().is_empty());

    let err = qb.matching(Joiner::And, Criteria::new()).unwrap_err();
    assert!(err.is_request());
}

#[test]
fn fragment_from_a_finished_request_is_rejected() {
    let mut qb = qb();
    let stale = qb.matching(Joiner::And, [("age", 30)]).unwrap();
    qb.select(&["name"]).unwrap();

    let err = qb.either(Criteria::new().fragment(&stale)).unwrap_err();
    assert!(err.is_request());
    assert!(err.to_string().contains("?1.0:age@"));

    let built = qb.select(&["name"]).unwrap();
    assert!(!built.sql.contains("WHERE"));
    assert!(built.params.is_empty());
}

#[test]
fn fragment_without_placeholders_embeds_as_is() {
    let mut qb = qb();
    let missing = qb.matching(Joiner::And, [("bio", Value::Null)]).unwrap();
    qb.either(Criteria::new().fragment(&missing).column("name", "ann"))
        .unwrap();
    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with(
        r#"WHERE (("profiles"."bio" IS NULL) OR "users"."name" = $1)"#
    ));
}

#[test]
fn unbound_token_fails_where_rendering() {
    let roots = vec![r#"("users"."age" = ?4.0:age@)"#.to_string()];
    let mut params = crate::param::ParamList::new();
    let err = condition::render_where(&roots, Vec::new(), &mut params).unwrap_err();
    assert!(err.is_request());
    assert!(params.is_empty());
}

#[test]
fn pattern_match_rejects_bytes() {
    let mut qb = qb();
    let err = qb
        .featuring(Joiner::And, [("bio", Value::Bytes(vec![1, 2, 3]))])
        .unwrap_err();
    assert!(err.is_request());
    assert!(err.to_string().contains("bytes"));
    assert!(qb.active_tables().is_empty());
}

#[test]
fn integer_column_rejects_non_integer_value() {
    let mut qb = qb();
    let err = qb.matching(Joiner::And, [("age", "old")]).unwrap_err();
    assert!(err.is_request());
}

#[test]
fn sort_and_limit_are_appended_in_order() {
    let mut qb = qb();
    qb.sort("name", SortDirection::Ascending).unwrap();
    qb.sort("bio", SortDirection::Descending).unwrap();
    qb.limit(3, 10).unwrap();

    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with(
        r#"ORDER BY "users"."name" ASC, "profiles"."bio" DESC LIMIT 10 OFFSET 20"#
    ));
    assert!(built.sql.contains(r#"JOIN "profiles""#));
}

#[test]
fn limit_rejects_page_zero() {
    let mut qb = qb();
    assert!(qb.limit(0, 10).unwrap_err().is_request());
    qb.limit(1, 10).unwrap();
    let built = qb.select(&["name"]).unwrap();
    assert!(built.sql.ends_with("LIMIT 10 OFFSET 0"));
}

#[test]
fn state_is_cleared_after_assembly() {
    let mut qb = qb();
    qb.matching(Joiner::And, [("name", "ann")]).unwrap();
    qb.select(&["name"]).unwrap();
    assert!(qb.active_tables().is_empty());
    let again = qb.select(&["name"]).unwrap();
    assert!(!again.sql.contains("WHERE"));
}

#[test]
fn state_is_cleared_after_failed_assembly() {
    let mut qb = qb();
    qb.matching(Joiner::And, [("name", "ann")]).unwrap();
    qb.limit(2, 5).unwrap();
    assert!(qb.select(&["nope"]).is_err());
    let again = qb.select(&["name"]).unwrap();
    assert_eq!(
        again.sql,
        r#"SELECT "users"."name", "users"."user_id" FROM "users""#
    );
}

#[test]
fn insert_spreads_entity_across_tables() {
    let plan = qb()
        .insert(&[("bio", "hi".into()), ("name", "ann".into())])
        .unwrap();
    assert_eq!(plan.tables().collect::<Vec<_>>(), ["users", "profiles"]);

    let users = &plan.statements[0];
    assert_eq!(
        users.sql,
        r#"INSERT INTO "users" ("name") VALUES ($1) RETURNING "user_id""#
    );
    assert!(users.returns_key);
    assert_eq!(users.identity, Identity::Generated);

    let profiles = &plan.statements[1];
    assert_eq!(
        profiles.sql,
        r#"INSERT INTO "profiles" ("user_id", "bio") VALUES ($1, $2)"#
    );
    assert!(profiles.needs_generated_key());
    let params = profiles.bind(Some(7)).unwrap();
    assert_eq!(params.get(0), Some(&Param::Integer(7)));
    assert_eq!(params.get(1), Some(&Param::Text("hi".into())));
    assert!(profiles.bind(None).unwrap_err().is_request());
}

#[test]
fn insert_with_supplied_key_skips_primary_table() {
    let plan = qb()
        .insert(&[("user_id", 5.into()), ("label", "rust".into())])
        .unwrap();
    assert_eq!(plan.statements.len(), 1);
    let tags = &plan.statements[0];
    assert_eq!(tags.table, "tags");
    assert_eq!(tags.identity, Identity::Supplied(5));
    assert!(!tags.needs_generated_key());
    assert_eq!(
        tags.params[0],
        InsertParam::Bound(Param::Integer(5))
    );
}

#[test]
fn insert_rejects_ambiguous_identity() {
    let err = qb()
        .insert(&[("user_id", 5.into()), ("name", "ann".into())])
        .unwrap_err();
    assert!(err.is_request());
}

#[test]
fn insert_secondary_without_key_fails() {
    let err = qb().insert(&[("bio", "hi".into())]).unwrap_err();
    assert!(err.is_request());
}

#[test]
fn insert_rejects_unknown_and_duplicate_columns() {
    assert!(qb().insert(&[("nope", 1.into())]).unwrap_err().is_request());
    let err = qb()
        .insert(&[("name", "a".into()), ("name", "b".into())])
        .unwrap_err();
    assert!(err.is_request());
}

#[test]
fn insert_qualifies_schema() {
    let mut qb = qb().with_schema("app").unwrap();
    let plan = qb.insert(&[("name", "ann".into())]).unwrap();
    assert!(plan.statements[0].sql.starts_with(r#"INSERT INTO "app"."users""#));
}

#[test]
fn update_scopes_each_table_by_its_filter() {
    let statements = qb()
        .update(&[("bio", "new".into())], &[("user_id", 3.into())])
        .unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql,
        r#"UPDATE "profiles" SET "bio" = $1 WHERE "profiles"."user_id" = $2"#
    );
    assert_eq!(statements[0].params.get(1), Some(&Param::Integer(3)));
}

#[test]
fn update_spanning_tables_emits_one_statement_each() {
    let statements = qb()
        .update(
            &[("name", "ann".into()), ("label", "x".into())],
            &[("user_id", 3.into())],
        )
        .unwrap();
    let tables: Vec<_> = statements.iter().map(|s| s.table.as_str()).collect();
    assert_eq!(tables, ["users", "tags"]);
    assert_eq!(
        statements[0].sql,
        r#"UPDATE "users" SET "name" = $1 WHERE "users"."user_id" = $2"#
    );
}

#[test]
fn update_without_filter_for_a_table_fails() {
    let err = qb()
        .update(&[("name", "x".into()), ("bio", "y".into())], &[("name", "old".into())])
        .unwrap_err();
    assert!(err.is_request());
}

#[test]
fn delete_by_shared_key_hits_every_table() {
    let statements = qb().delete(&[("user_id", 3.into())]).unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(
        statements[0].sql,
        r#"DELETE FROM "users" WHERE "users"."user_id" = $1"#
    );
    assert_eq!(
        statements[2].sql,
        r#"DELETE FROM "tags" WHERE "tags"."user_id" = $1"#
    );
}

#[test]
fn delete_by_column_hits_owning_table() {
    let statements = qb().delete(&[("label", "old".into())]).unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].table, "tags");
    assert!(qb().delete(&[]).unwrap_err().is_request());
}

#[test]
fn create_tables_renders_storage_definitions() {
    let statements = qb().create_tables_sql("public").unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(
        statements[0],
        concat!(
            r#"CREATE TABLE "public"."users" ("user_id" BIGSERIAL NOT NULL, "#,
            r#""name" VARCHAR(255) NOT NULL DEFAULT '', "age" BIGINT NOT NULL DEFAULT 0, "#,
            r#"PRIMARY KEY ("user_id"))"#
        )
    );
    assert!(statements[1].ends_with(r#"PRIMARY KEY ("profile_id"))"#));
}

#[test]
fn create_tables_requires_unique_column_per_table() {
    let manifest = Manifest::new()
        .table("users", [("user_id", UniqueIntegerMainKey)])
        .table("notes", [("user_id", Integer), ("body", String)]);
    let qb = QueryBuilder::new(Arc::new(ManifestModel::load(manifest).unwrap()));
    assert!(qb.create_tables_sql("public").unwrap_err().is_schema());
}
