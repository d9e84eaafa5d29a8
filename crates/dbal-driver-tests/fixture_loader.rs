//! Loading of combined SQL fixture documents.
//!
//! A fixture document resets and repopulates the test schema in one file.
//! Two literal markers partition it into four zones:
//!
//! ```text
//! <drop statements, each terminated by `--`>
//! /* STATEMENTS */
//! <CREATE TABLE / CREATE SEQUENCE statements, `;` separated>
//! /* TRIGGERS */
//! <PL/SQL trigger bodies, each terminated by `/`>
//! /* TRIGGERS */
//! <INSERT statements, `;` separated>
//! ```
//!
//! The document is split completely before anything runs, so a malformed
//! document never touches the database. Execution then walks the zones in
//! order (drops, statements, triggers, data) and stops at the first failure.
//!
//! Splitting is purely textual: a delimiter inside a string literal or a
//! trigger body splits the statement. Only the first `/* STATEMENTS */`
//! counts as a marker; a later one is an ordinary comment in the create
//! zone. A document with more than two `/* TRIGGERS */` markers is rejected.

use dbal_core::{Connection, DbalError, Result};
use std::fmt;
use std::path::Path;

/// Separates the drop zone from the rest of the document
pub const STATEMENTS_MARKER: &str = "/* STATEMENTS */";

/// Separates create statements from triggers, and triggers from data
pub const TRIGGERS_MARKER: &str = "/* TRIGGERS */";

/// One of the four zones of a fixture document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureZone {
    /// Guarded DROP blocks, terminated by `--`
    Drops,
    /// Table and sequence creation, terminated by `;`
    Statements,
    /// PL/SQL trigger definitions, terminated by `/`
    Triggers,
    /// Data population, terminated by `;`
    Data,
}

impl FixtureZone {
    /// Zones in execution order
    pub const ALL: [FixtureZone; 4] = [
        FixtureZone::Drops,
        FixtureZone::Statements,
        FixtureZone::Triggers,
        FixtureZone::Data,
    ];

    /// Statement delimiter used inside this zone
    pub fn delimiter(&self) -> &'static str {
        match self {
            FixtureZone::Drops => "--",
            FixtureZone::Statements | FixtureZone::Data => ";",
            FixtureZone::Triggers => "/",
        }
    }

    /// Lowercase zone name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            FixtureZone::Drops => "drops",
            FixtureZone::Statements => "statements",
            FixtureZone::Triggers => "triggers",
            FixtureZone::Data => "data",
        }
    }
}

impl fmt::Display for FixtureZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixture document split into trimmed, non-blank statements per zone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureScript {
    drops: Vec<String>,
    statements: Vec<String>,
    triggers: Vec<String>,
    data: Vec<String>,
}

impl FixtureScript {
    /// Split a fixture document into its four zones.
    ///
    /// The document is split at the first `/* STATEMENTS */` marker, and the
    /// remainder must contain exactly two `/* TRIGGERS */` markers. Anything
    /// else fails with `DbalError::Configuration`.
    pub fn parse(document: &str) -> Result<Self> {
        let (drops, creates) = document.split_once(STATEMENTS_MARKER).ok_or_else(|| {
            DbalError::Configuration(format!(
                "malformed fixture: missing '{}' marker",
                STATEMENTS_MARKER
            ))
        })?;
        let [statements, triggers, data] = split_exact::<3>(creates, TRIGGERS_MARKER)?;

        Ok(Self {
            drops: split_zone(drops, FixtureZone::Drops),
            statements: split_zone(statements, FixtureZone::Statements),
            triggers: split_zone(triggers, FixtureZone::Triggers),
            data: split_zone(data, FixtureZone::Data),
        })
    }

    /// Statements of a single zone, in document order
    pub fn zone(&self, zone: FixtureZone) -> &[String] {
        match zone {
            FixtureZone::Drops => &self.drops,
            FixtureZone::Statements => &self.statements,
            FixtureZone::Triggers => &self.triggers,
            FixtureZone::Data => &self.data,
        }
    }

    /// All statements in execution order, tagged with their zone
    pub fn iter(&self) -> impl Iterator<Item = (FixtureZone, &str)> + '_ {
        FixtureZone::ALL.into_iter().flat_map(move |zone| {
            self.zone(zone)
                .iter()
                .map(move |statement| (zone, statement.as_str()))
        })
    }

    /// Total number of statements across all zones
    pub fn len(&self) -> usize {
        FixtureZone::ALL.iter().map(|zone| self.zone(*zone).len()).sum()
    }

    /// Whether the document held no statements at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute every statement against `conn`, one at a time, stopping at
    /// the first failure.
    pub async fn run(&self, conn: &dyn Connection) -> Result<()> {
        tracing::info!(
            drops = self.drops.len(),
            statements = self.statements.len(),
            triggers = self.triggers.len(),
            data = self.data.len(),
            "loading fixture"
        );

        for zone in FixtureZone::ALL {
            for (idx, statement) in self.zone(zone).iter().enumerate() {
                tracing::debug!(zone = %zone, index = idx + 1, "executing fixture statement");

                conn.execute(statement, &[]).await.map_err(|e| match e {
                    DbalError::Execution(msg) => DbalError::Execution(format!(
                        "fixture {} statement #{} failed: {}",
                        zone,
                        idx + 1,
                        msg
                    )),
                    other => other,
                })?;
            }
        }

        tracing::info!(total = self.len(), "fixture loaded");
        Ok(())
    }
}

/// Split `document` and execute it against `conn`. Nothing is executed when
/// the document is malformed.
pub async fn load_fixture(conn: &dyn Connection, document: &str) -> Result<()> {
    FixtureScript::parse(document)?.run(conn).await
}

/// Read a fixture file and load it with [`load_fixture`]
pub async fn load_fixture_file(conn: &dyn Connection, path: &Path) -> Result<()> {
    tracing::debug!(path = %path.display(), "reading fixture file");
    let document = tokio::fs::read_to_string(path).await.map_err(|e| {
        DbalError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read fixture {}: {}", path.display(), e),
        ))
    })?;
    load_fixture(conn, &document).await
}

fn split_exact<'a, const N: usize>(text: &'a str, marker: &str) -> Result<[&'a str; N]> {
    let parts: Vec<&str> = text.split(marker).collect();
    let found = parts.len();

    parts.try_into().map_err(|_| {
        DbalError::Configuration(format!(
            "malformed fixture: expected {} occurrence(s) of '{}', found {}",
            N - 1,
            marker,
            found - 1
        ))
    })
}

fn split_zone(text: &str, zone: FixtureZone) -> Vec<String> {
    text.split(zone.delimiter())
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingConnection;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const EXAMPLE: &str = "A\n-- B\n/* STATEMENTS */\nCREATE TABLE t;CREATE TABLE u;\n/* TRIGGERS */\nTRIG1/\nTRIG2/\n/* TRIGGERS */\nINSERT INTO t VALUES(1);";

    #[test]
    fn test_parse_splits_each_zone() {
        let script = FixtureScript::parse(EXAMPLE).unwrap();

        assert_eq!(script.zone(FixtureZone::Drops), ["A", "B"]);
        assert_eq!(
            script.zone(FixtureZone::Statements),
            ["CREATE TABLE t", "CREATE TABLE u"]
        );
        assert_eq!(script.zone(FixtureZone::Triggers), ["TRIG1", "TRIG2"]);
        assert_eq!(script.zone(FixtureZone::Data), ["INSERT INTO t VALUES(1)"]);
        assert_eq!(script.len(), 7);
    }

    #[tokio::test]
    async fn test_load_executes_in_zone_order() {
        let conn = RecordingConnection::new();

        load_fixture(&conn, EXAMPLE).await.unwrap();

        assert_eq!(
            conn.executed(),
            [
                "A",
                "B",
                "CREATE TABLE t",
                "CREATE TABLE u",
                "TRIG1",
                "TRIG2",
                "INSERT INTO t VALUES(1)",
            ]
        );
    }

    #[test]
    fn test_iter_matches_zone_concatenation() {
        let script = FixtureScript::parse(EXAMPLE).unwrap();

        let flat: Vec<&str> = script.iter().map(|(_, stmt)| stmt).collect();
        let by_zone: Vec<&str> = FixtureZone::ALL
            .iter()
            .flat_map(|zone| script.zone(*zone).iter().map(String::as_str))
            .collect();

        assert_eq!(flat, by_zone);
        assert_eq!(flat.len(), script.len());
        assert_eq!(script.iter().next(), Some((FixtureZone::Drops, "A")));
        assert_eq!(
            script.iter().last(),
            Some((FixtureZone::Data, "INSERT INTO t VALUES(1)"))
        );
    }

    #[test]
    fn test_blank_zones_contribute_nothing() {
        let script =
            FixtureScript::parse("/* STATEMENTS */\n  \n/* TRIGGERS */\n/\n /* TRIGGERS */;;\n")
                .unwrap();

        assert!(script.is_empty());
        for zone in FixtureZone::ALL {
            assert!(script.zone(zone).is_empty(), "{} should be empty", zone);
        }
    }

    #[test]
    fn test_blank_entries_between_delimiters_are_dropped() {
        let document = indoc! {"
            DROP A--
            --
            DROP B--
            /* STATEMENTS */
            CREATE TABLE a (id NUMBER);

            ;
            CREATE TABLE b (id NUMBER);
            /* TRIGGERS */
            /* TRIGGERS */
            INSERT INTO a VALUES (1);;
        "};

        let script = FixtureScript::parse(document).unwrap();

        assert_eq!(script.zone(FixtureZone::Drops), ["DROP A", "DROP B"]);
        assert_eq!(
            script.zone(FixtureZone::Statements),
            ["CREATE TABLE a (id NUMBER)", "CREATE TABLE b (id NUMBER)"]
        );
        assert!(script.zone(FixtureZone::Triggers).is_empty());
        assert_eq!(script.zone(FixtureZone::Data), ["INSERT INTO a VALUES (1)"]);
    }

    #[test]
    fn test_duplicates_are_kept_in_order() {
        let script = FixtureScript::parse(
            "/* STATEMENTS */ X; Y; X /* TRIGGERS */ /* TRIGGERS */ I; I",
        )
        .unwrap();

        assert_eq!(script.zone(FixtureZone::Statements), ["X", "Y", "X"]);
        assert_eq!(script.zone(FixtureZone::Data), ["I", "I"]);
    }

    #[test]
    fn test_trigger_bodies_keep_inner_semicolons() {
        let document = indoc! {r#"
            /* STATEMENTS */
            CREATE TABLE "t" ("id" NUMBER)
            /* TRIGGERS */
            CREATE TRIGGER "t_TRG" BEFORE INSERT ON "t" FOR EACH ROW BEGIN
              SELECT "t_SEQ".NEXTVAL INTO :NEW."id" FROM SYS.DUAL;
            END;
            /
            /* TRIGGERS */
        "#};

        let script = FixtureScript::parse(document).unwrap();
        let triggers = script.zone(FixtureZone::Triggers);

        assert_eq!(triggers.len(), 1);
        assert!(triggers[0].starts_with("CREATE TRIGGER"));
        assert!(triggers[0].ends_with("END;"));
    }

    #[rstest]
    #[case::no_markers("DROP TABLE t--")]
    #[case::missing_statements("A-- /* TRIGGERS */ T/ /* TRIGGERS */ I;")]
    #[case::missing_triggers("A-- /* STATEMENTS */ CREATE TABLE t; INSERT INTO t VALUES (1);")]
    #[case::single_triggers("A-- /* STATEMENTS */ CREATE TABLE t; /* TRIGGERS */ T/")]
    #[case::data_without_marker(
        "A\n-- B\n/* STATEMENTS */\nCREATE TABLE t;CREATE TABLE u;\n/* TRIGGERS */\nTRIG1/\nTRIG2/\nINSERT INTO t VALUES(1);"
    )]
    #[case::third_triggers(
        "/* STATEMENTS */ C; /* TRIGGERS */ T/ /* TRIGGERS */ I; /* TRIGGERS */ J;"
    )]
    fn test_parse_rejects_malformed_documents(#[case] document: &str) {
        let err = FixtureScript::parse(document).unwrap_err();
        assert!(
            matches!(err, DbalError::Configuration(_)),
            "expected configuration error, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_later_statements_marker_stays_in_create_zone() {
        let document = indoc! {"
            DROP T--
            /* STATEMENTS */
            CREATE TABLE t (id NUMBER);
            /* STATEMENTS */ CREATE TABLE u (id NUMBER);
            /* TRIGGERS */
            /* TRIGGERS */
            INSERT INTO t VALUES (1);
        "};

        let script = FixtureScript::parse(document).unwrap();
        assert_eq!(script.zone(FixtureZone::Drops), ["DROP T"]);
        assert_eq!(
            script.zone(FixtureZone::Statements),
            [
                "CREATE TABLE t (id NUMBER)",
                "/* STATEMENTS */ CREATE TABLE u (id NUMBER)",
            ]
        );

        let conn = RecordingConnection::new();
        load_fixture(&conn, document).await.unwrap();
        assert_eq!(conn.executed().len(), 4);
        assert_eq!(
            conn.executed()[2],
            "/* STATEMENTS */ CREATE TABLE u (id NUMBER)"
        );
    }

    #[tokio::test]
    async fn test_malformed_document_executes_nothing() {
        let conn = RecordingConnection::new();

        let missing_statements = load_fixture(&conn, "DROP TABLE t--\nCREATE TABLE t;").await;
        assert!(missing_statements.is_err());

        let missing_triggers =
            load_fixture(&conn, "DROP TABLE t--\n/* STATEMENTS */\nCREATE TABLE t;").await;
        assert!(missing_triggers.is_err());

        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_statements() {
        let conn = RecordingConnection::failing_on("CREATE TABLE u");

        let err = load_fixture(&conn, EXAMPLE).await.unwrap_err();

        assert_eq!(conn.executed(), ["A", "B", "CREATE TABLE t"]);
        match err {
            DbalError::Execution(msg) => {
                assert!(msg.contains("statements statement #2"), "message was: {}", msg)
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_errors_keep_their_kind() {
        let conn = RecordingConnection::new();
        conn.close().await.unwrap();

        let err = load_fixture(&conn, EXAMPLE).await.unwrap_err();

        assert!(err.is_connection(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_drops_run_before_creates() {
        let document = indoc! {r#"
            BEGIN EXECUTE IMMEDIATE 'DROP TABLE "customer"'; EXCEPTION WHEN OTHERS THEN IF SQLCODE != -942 THEN RAISE; END IF; END;--
            /* STATEMENTS */
            CREATE TABLE "customer" ("id" INTEGER NOT NULL PRIMARY KEY);
            /* TRIGGERS */
            /* TRIGGERS */
            INSERT INTO "customer" ("id") VALUES (1);
        "#};
        let conn = RecordingConnection::new();

        load_fixture(&conn, document).await.unwrap();
        load_fixture(&conn, document).await.unwrap();

        let executed = conn.executed();
        assert_eq!(executed.len(), 6);
        for run in executed.chunks(3) {
            assert!(run[0].starts_with("BEGIN EXECUTE IMMEDIATE 'DROP TABLE"));
            assert!(run[0].ends_with("END;"));
            assert!(run[1].starts_with("CREATE TABLE"));
            assert!(run[2].starts_with("INSERT INTO"));
        }
    }

    #[tokio::test]
    async fn test_load_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.sql");
        std::fs::write(&path, EXAMPLE).unwrap();
        let conn = RecordingConnection::new();

        load_fixture_file(&conn, &path).await.unwrap();

        assert_eq!(conn.executed().len(), 7);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let conn = RecordingConnection::new();

        let err = load_fixture_file(&conn, &dir.path().join("missing.sql"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbalError::Io(_)), "got {:?}", err);
        assert!(conn.executed().is_empty());
    }
}
