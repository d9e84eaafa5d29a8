#[cfg(test)]
mod error_tests {
    use crate::fixture_loader::load_fixture;
    use crate::fixtures::{ConnectOptions, is_connection_error, setup_or_skip};
    use anyhow::Result;
    use dbal_core::{DbalError, Value};
    use indoc::indoc;
    use rstest::rstest;

    /// Tests that statements the server rejects come back as execution errors.
    #[rstest]
    #[case::invalid_keyword("INVALID KEYWORD \"customer\"")]
    #[case::missing_table("SELECT * FROM \"no_such_table\"")]
    #[case::unclosed_quote("SELECT 'John FROM DUAL")]
    #[tokio::test]
    async fn test_invalid_sql_is_execution_error(#[case] sql: &str) -> Result<()> {
        let Some(ctx) = setup_or_skip(ConnectOptions::without_fixture()).await else {
            return Ok(());
        };

        let err = ctx.connection().execute(sql, &[]).await.unwrap_err();
        assert!(
            matches!(err, DbalError::Execution(ref msg) if msg.contains("ORA-")),
            "expected an ORA- execution error, got: {}",
            err
        );

        // the connection stays usable after a rejected statement
        let result = ctx.connection().query("SELECT 1 FROM DUAL", &[]).await?;
        assert_eq!(result.row_count(), 1);

        ctx.teardown().await
    }

    /// Tests that a unique constraint violation is reported, not ignored.
    #[tokio::test]
    async fn test_unique_violation() -> Result<()> {
        let Some(ctx) = setup_or_skip(ConnectOptions::default()).await else {
            return Ok(());
        };

        let err = ctx
            .connection()
            .execute(
                "INSERT INTO \"customer\" (\"email\") VALUES (:1)",
                &[Value::String("user1@example.com".into())],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ORA-00001"), "got: {}", err);

        ctx.teardown().await
    }

    /// Tests that a failing statement stops the fixture and leaves earlier
    /// statements applied.
    #[tokio::test]
    async fn test_broken_fixture_aborts_remaining_statements() -> Result<()> {
        let Some(ctx) = setup_or_skip(ConnectOptions::without_fixture()).await else {
            return Ok(());
        };
        let conn = ctx.connection();

        let document = indoc! {r#"
            BEGIN EXECUTE IMMEDIATE 'DROP TABLE "broken_t"'; EXCEPTION WHEN OTHERS THEN IF SQLCODE != -942 THEN RAISE; END IF; END;--
            /* STATEMENTS */
            CREATE TABLE "broken_t" ("id" NUMBER PRIMARY KEY);
            /* TRIGGERS */
            /* TRIGGERS */
            INSERT INTO "broken_t" VALUES (1);
            INSERT INTO "broken_t" VALUES (1);
            INSERT INTO "broken_t" VALUES (2);
        "#};

        let err = load_fixture(conn.as_ref(), document).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("data statement #2"), "got: {}", msg);
        assert!(!is_connection_error(&err.into()));

        let result = conn
            .query("SELECT \"id\" FROM \"broken_t\" ORDER BY \"id\"", &[])
            .await?;
        let ids: Vec<i64> = result
            .rows
            .iter()
            .filter_map(|row| row.get(0).and_then(Value::as_i64))
            .collect();
        assert_eq!(ids, vec![1]);

        conn.execute("DROP TABLE \"broken_t\"", &[]).await?;
        ctx.teardown().await
    }

    /// Tests that a malformed fixture executes nothing at all, whichever
    /// marker is missing.
    #[rstest]
    #[case::missing_statements_marker(indoc! {r#"
        CREATE TABLE "never_created" ("id" NUMBER)--
        /* TRIGGERS */
        /* TRIGGERS */
        INSERT INTO "never_created" VALUES (1);
    "#})]
    #[case::missing_second_triggers_marker(indoc! {r#"
        /* STATEMENTS */
        CREATE TABLE "never_created" ("id" NUMBER);
        /* TRIGGERS */
        INSERT INTO "never_created" VALUES (1);
    "#})]
    #[tokio::test]
    async fn test_malformed_fixture_touches_nothing(#[case] document: &str) -> Result<()> {
        let Some(ctx) = setup_or_skip(ConnectOptions::without_fixture()).await else {
            return Ok(());
        };
        let conn = ctx.connection();

        let err = load_fixture(conn.as_ref(), document).await.unwrap_err();
        assert!(matches!(err, DbalError::Configuration(_)), "got: {}", err);

        let exists = conn
            .query(
                "SELECT COUNT(*) FROM USER_TABLES WHERE TABLE_NAME = :1",
                &[Value::String("never_created".into())],
            )
            .await?;
        assert_eq!(exists.scalar().and_then(Value::as_i64), Some(0));

        ctx.teardown().await
    }

    /// Tests that an unknown fixture alias fails setup as a configuration problem.
    #[tokio::test]
    async fn test_unknown_fixture_alias() -> Result<()> {
        let Some(ctx) = setup_or_skip(ConnectOptions::without_fixture()).await else {
            return Ok(());
        };

        let err = ctx.load_fixture("@nowhere/oci.sql").await.unwrap_err();
        assert!(!is_connection_error(&err));
        assert!(err.to_string().contains("@nowhere"), "got: {}", err);

        ctx.teardown().await
    }
}
