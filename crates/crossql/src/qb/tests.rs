//! Integration tests for the qb module.

use chrono::{NaiveDate, NaiveTime};

use crate::qb::{Filter, Query, count_placeholders, table};
use crate::{BuiltQuery, Dialect, QbError, Value, row};

fn assert_balanced(built: &BuiltQuery) {
    assert_eq!(
        count_placeholders(&built.sql, built.dialect),
        built.params.len(),
        "placeholder/param mismatch in: {}",
        built.sql
    );
}

#[test]
fn test_simple_and_chain() {
    for dialect in Dialect::ALL {
        let built = table("t")
            .dialect(dialect)
            .eq("x", 1)
            .eq("y", 2)
            .select_all()
            .get()
            .unwrap();
        let p = dialect.placeholder(1);
        let (x, y, t) = (
            dialect.quote_identifier("x").unwrap(),
            dialect.quote_identifier("y").unwrap(),
            dialect.quote_identifier("t").unwrap(),
        );
        assert_eq!(built.sql, format!("SELECT * FROM {t} WHERE {x} = {p} AND {y} = {p}"));
        assert_eq!(built.params, vec![Value::Int(1), Value::Int(2)]);
    }
}

#[test]
fn test_or_nest_is_parenthesized() {
    let built = table("t")
        .dialect(Dialect::Sqlite)
        .where_op("a", "=", 1)
        .unwrap()
        .where_op("b", "=", 2)
        .unwrap()
        .or_nest(|q| q.eq("c", 3).eq("d", 4))
        .get()
        .unwrap();
    assert_eq!(
        built.sql,
        "SELECT * FROM \"t\" WHERE \"a\" = ? AND \"b\" = ? OR (\"c\" = ? AND \"d\" = ?)"
    );
    assert_eq!(
        built.params,
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
    );
}

#[test]
fn test_mssql_pagination_requires_order() {
    let err = table("t").dialect(Dialect::MsSql).paginate(2, 10).unwrap().get().unwrap_err();
    assert!(err.is_pagination());

    let built = table("t")
        .dialect(Dialect::MsSql)
        .order_by("id")
        .paginate(2, 10)
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(
        built.sql,
        "SELECT * FROM [t] ORDER BY [id] ASC OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn test_subquery_params_keep_text_position() {
    let active = Query::new()
        .table("orders")
        .select(&["user_id"])
        .eq("status", "open")
        .gt("total", 50);
    let built = table("users")
        .dialect(Dialect::MySql)
        .eq("region", "eu")
        .in_subquery("id", active)
        .eq("deleted", false)
        .get()
        .unwrap();

    assert_eq!(
        built.sql,
        "SELECT * FROM `users` WHERE `region` = %s AND `id` IN (SELECT `user_id` FROM `orders` WHERE `status` = %s AND `total` > %s) AND `deleted` = %s"
    );
    assert_eq!(
        built.params,
        vec![
            Value::from("eu"),
            Value::from("open"),
            Value::Int(50),
            Value::Bool(false),
        ]
    );
}

#[test]
fn test_unsafe_mutations() {
    for dialect in Dialect::ALL {
        let q = table("users").dialect(dialect);
        assert!(matches!(
            q.update(row! { "a" => 1 }),
            Err(QbError::UnsafeMutation(_))
        ));
        assert!(matches!(q.delete(), Err(QbError::UnsafeMutation(_))));
        assert!(matches!(
            q.increment_each(&[("a", 1)]),
            Err(QbError::UnsafeMutation(_))
        ));
    }
}

#[test]
fn test_heterogeneous_insert_many() {
    let err = table("users")
        .dialect(Dialect::Sqlite)
        .insert_many(vec![
            row! { "name" => "a", "age" => 1 },
            row! { "name" => "b", "email" => "b@example.com" },
        ])
        .unwrap_err();
    assert!(err.is_schema_mismatch());
}

#[test]
fn test_clone_independence() {
    let base = table("users").dialect(Dialect::MySql).eq("active", true);
    let admins = base.clone().eq("role", "admin").order_by("name");
    let recent = base.clone().latest("created_at").limit(5);

    assert_eq!(
        base.to_sql().unwrap(),
        "SELECT * FROM `users` WHERE `active` = %s"
    );
    assert_eq!(
        admins.to_sql().unwrap(),
        "SELECT * FROM `users` WHERE `active` = %s AND `role` = %s ORDER BY `name` ASC"
    );
    assert_eq!(
        recent.to_sql().unwrap(),
        "SELECT * FROM `users` WHERE `active` = %s ORDER BY `created_at` DESC LIMIT 5"
    );
}

#[test]
fn test_render_is_idempotent() {
    let q = table("users u")
        .dialect(Dialect::MsSql)
        .left_join("orders o", "o.user_id", "=", "u.id")
        .unwrap()
        .in_list("u.status", ["a", "b"])
        .nest(|c| c.like("u.name", "a%").or_is_null("u.name"))
        .order_by("u.id")
        .paginate(3, 15)
        .unwrap();
    let first = q.render().unwrap();
    let second = q.render().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_upsert_param_counts() {
    let rows = vec![
        row! { "sku" => "a", "qty" => 1, "price" => 2.5 },
        row! { "sku" => "b", "qty" => 2, "price" => 3.5 },
        row! { "sku" => "c", "qty" => 3, "price" => 4.5 },
    ];
    for dialect in Dialect::ALL {
        let built = table("stock")
            .dialect(dialect)
            .upsert(rows.clone(), &["sku"], &["qty", "price"])
            .unwrap();
        assert_eq!(built.params.len(), 9);
        assert_balanced(&built);
    }
}

#[test]
fn test_every_generator_balances_placeholders() {
    for dialect in Dialect::ALL {
        let q = table("users")
            .dialect(dialect)
            .eq("status", "active")
            .between("age", 18, 65)
            .not_in("role", ["banned"])
            .where_raw("score > ? OR bonus = ?", vec![Value::Int(10), Value::Int(1)])
            .unwrap()
            .or_where_between_dates("created_at", "2024-01-01", "2024-12-31")
            .order_by("id");

        assert_balanced(&q.render().unwrap());
        assert_balanced(&q.count_query().render().unwrap());
        assert_balanced(&q.clone().paginate(2, 10).unwrap().render().unwrap());
        assert_balanced(&q.update(row! { "status" => "idle" }).unwrap());
        assert_balanced(&q.delete().unwrap());
        assert_balanced(&q.increment("logins", 1).unwrap());
        assert_balanced(&q.insert(row! { "name" => "x", "age" => 3 }).unwrap());
        assert_balanced(
            &q.insert_or_ignore(vec![row! { "id" => 1 }, row! { "id" => 2 }])
                .unwrap(),
        );
    }
}

#[test]
fn test_empty_in_list_renders_constant() {
    let built = table("t")
        .dialect(Dialect::Sqlite)
        .in_list::<i32>("id", [])
        .get()
        .unwrap();
    assert_eq!(built.sql, "SELECT * FROM \"t\" WHERE 1 = 0");
    assert!(built.params.is_empty());
}

#[test]
fn test_exists_and_column_predicates() {
    let orders = Query::new()
        .table("orders o")
        .select_raw("1", vec![])
        .unwrap()
        .where_column("o.user_id", "=", "u.id")
        .unwrap();
    let built = table("users u")
        .dialect(Dialect::MsSql)
        .where_exists(orders)
        .get()
        .unwrap();
    assert_eq!(
        built.sql,
        "SELECT * FROM [users] AS [u] WHERE EXISTS (SELECT 1 FROM [orders] AS [o] WHERE [o].[user_id] = [u].[id])"
    );
}

#[test]
fn test_config_applies_per_query() {
    let cfg = crate::QbConfig::from_toml_str("dialect = \"sqlite\"\nper_page = 5").unwrap();
    let built = table("t")
        .with_config(&cfg)
        .page(3)
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(built.sql, "SELECT * FROM \"t\" LIMIT 5 OFFSET 10");
}

#[test]
fn test_raw_markers_must_match_values() {
    let q = table("t").dialect(Dialect::Sqlite);
    let err = q.clone().where_raw("a = ? AND b = ?", vec![Value::Int(1)]).unwrap_err();
    assert!(err.is_invalid_predicate());
    let err = q
        .clone()
        .or_where_raw("a = ?", vec![Value::Int(1), Value::Int(2)])
        .unwrap_err();
    assert!(err.is_invalid_predicate());
    assert!(q.clone().having_raw("SUM(x) > ?", vec![]).is_err());
    assert!(q.clone().select_raw("COALESCE(a, ?)", vec![]).is_err());

    let built = table("t")
        .dialect(Dialect::MySql)
        .where_raw("name <> '?' AND id = ?", vec![Value::Int(5)])
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(built.sql, "SELECT * FROM `t` WHERE name <> '?' AND id = %s");
    assert_eq!(built.params, vec![Value::Int(5)]);
    assert_balanced(&built);
}

#[test]
fn test_non_comparison_operators_rejected() {
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let q = table("t").dialect(Dialect::MySql);
    assert!(q.clone().where_date("created", "IN", day).unwrap_err().is_invalid_predicate());
    assert!(q.clone().or_where_date("created", "between", day).is_err());
    assert!(q.clone().where_column("a", "IS NULL", "b").is_err());
    assert!(q.clone().or_where_column("a", "not in", "b").is_err());
    assert!(q.clone().join("o", "t.id", "IN", "o.t_id").is_err());
    let err = q.where_full_text(&[], "rust", None).unwrap_err();
    assert!(err.is_invalid_predicate());
}

#[test]
fn test_blank_columns_fail_at_render() {
    let q = table("t").dialect(Dialect::Sqlite);
    assert!(q.clone().eq("", 1).get().unwrap_err().is_invalid_predicate());
    assert!(q.clone().in_list(" ", [1, 2]).get().unwrap_err().is_invalid_predicate());
    assert!(q.clone().between("", 1, 2).get().unwrap_err().is_invalid_predicate());
    let sub = Query::new().table("u").select(&["id"]);
    assert!(q.clone().in_subquery("", sub).get().unwrap_err().is_invalid_predicate());
    assert!(q.clone().nest(|c| c.eq("", 1)).get().unwrap_err().is_invalid_predicate());

    // reported ahead of the unrestricted-mutation guard
    let err = q.clone().eq(" ", 1).update(row! { "a" => 1 }).unwrap_err();
    assert!(err.is_invalid_predicate());
    assert!(q.eq("", 1).delete().unwrap_err().is_invalid_predicate());
}

#[test]
fn test_or_variants() {
    let built = table("t")
        .dialect(Dialect::Sqlite)
        .eq("a", 1)
        .or_not_in("b", [2, 3])
        .or_not_like("c", "x%")
        .or_where_none(&["d", "e"])
        .or_where_year("created", 2024)
        .or_where_month("created", 2)
        .or_where_day("created", 29)
        .or_where_time("created", NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        .get()
        .unwrap();
    assert_eq!(
        built.sql,
        "SELECT * FROM \"t\" WHERE \"a\" = ? OR \"b\" NOT IN (?, ?) OR \"c\" NOT LIKE ? \
         OR (\"d\" IS NULL AND \"e\" IS NULL) \
         OR CAST(strftime('%Y', \"created\") AS INTEGER) = ? \
         OR CAST(strftime('%m', \"created\") AS INTEGER) = ? \
         OR CAST(strftime('%d', \"created\") AS INTEGER) = ? \
         OR time(\"created\") = ?"
    );
    assert_eq!(built.params.len(), 8);
    assert_balanced(&built);
}

#[test]
fn test_relative_day_aliases() {
    let q = table("t").dialect(Dialect::Sqlite);
    assert_eq!(
        q.clone().where_before_today("due").to_sql().unwrap(),
        q.clone().where_past("due").to_sql().unwrap()
    );
    assert_eq!(
        q.clone().where_after_today("due").to_sql().unwrap(),
        "SELECT * FROM \"t\" WHERE date(\"due\") > ?"
    );
    assert_eq!(
        q.where_before_today("due").to_sql().unwrap(),
        "SELECT * FROM \"t\" WHERE date(\"due\") < ?"
    );
}

#[test]
fn test_unless_runs_fallback_when_true() {
    let q = table("t").dialect(Dialect::Sqlite);
    let built = q
        .clone()
        .unless(true, |q| q.eq("skipped", 1), |q| q.eq("fallback", 2))
        .unless(false, |q| q.eq("applied", 3), |q| q)
        .get()
        .unwrap();
    assert_eq!(
        built.sql,
        "SELECT * FROM \"t\" WHERE \"fallback\" = ? AND \"applied\" = ?"
    );
    assert_eq!(built.params, vec![Value::Int(2), Value::Int(3)]);
}
