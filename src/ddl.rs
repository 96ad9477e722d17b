// ABOUTME: Generates CREATE TABLE statements from per-table column rules
// ABOUTME: Columns marked exclude="true" are left out of the generated table

use crate::config::TableRule;

/// Build the `CREATE TABLE IF NOT EXISTS` statement for a table rule
///
/// One column definition per rule, in document order, skipping rules whose
/// `exclude` is `"true"`. Names and types were validated when the
/// configuration was parsed.
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::config::{ColumnRule, TableRule};
/// # use pg_table_migrator::ddl::generate_ddl;
/// let rule = TableRule {
///     source: "users".into(),
///     columns: vec![ColumnRule {
///         source_name: "id".into(),
///         column_type: Some("BIGINT".into()),
///         ..Default::default()
///     }],
///     ..Default::default()
/// };
/// assert_eq!(
///     generate_ddl(&rule),
///     "CREATE TABLE IF NOT EXISTS users (\n    id BIGINT\n);"
/// );
/// ```
pub fn generate_ddl(rule: &TableRule) -> String {
    let definitions: Vec<String> = rule
        .columns
        .iter()
        .filter(|column| !column.is_excluded())
        .map(|column| format!("    {} {}", column.output_name(), column.ddl_type()))
        .collect();

    let mut ddl = format!("CREATE TABLE IF NOT EXISTS {} (\n", rule.target_table());
    if !definitions.is_empty() {
        ddl.push_str(&definitions.join(",\n"));
        ddl.push('\n');
    }
    ddl.push_str(");");
    ddl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnRule;

    fn column(name: &str, target: Option<&str>, ty: Option<&str>, exclude: Option<&str>) -> ColumnRule {
        ColumnRule {
            source_name: name.to_string(),
            target_name: target.map(str::to_string),
            column_type: ty.map(str::to_string),
            exclude: exclude.map(str::to_string),
        }
    }

    #[test]
    fn renders_columns_in_rule_order() {
        let rule = TableRule {
            source: "people".into(),
            target: "persons".into(),
            columns: vec![
                column("zeta", None, Some("BIGINT"), None),
                column("alpha", Some("first_name"), Some("VARCHAR(50)"), None),
                column("mid", None, None, None),
            ],
            ..Default::default()
        };

        assert_eq!(
            generate_ddl(&rule),
            "CREATE TABLE IF NOT EXISTS persons (\n    zeta BIGINT,\n    first_name VARCHAR(50),\n    mid TEXT\n);"
        );
    }

    #[test]
    fn omits_exactly_the_excluded_columns() {
        let rule = TableRule {
            source: "accounts".into(),
            columns: vec![
                column("id", None, Some("BIGINT"), Some("false")),
                column("secret", None, Some("TEXT"), Some("true")),
                column("note", None, None, Some("TRUE")),
                column("email", None, None, Some("yes")),
            ],
            ..Default::default()
        };

        let ddl = generate_ddl(&rule);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS accounts ("));
        assert!(ddl.contains("id BIGINT"));
        assert!(!ddl.contains("secret"));
        // Only the exact string "true" excludes
        assert!(ddl.contains("note TEXT"));
        assert!(ddl.contains("email TEXT"));
    }

    #[test]
    fn table_without_columns_renders_empty_definition() {
        let rule = TableRule {
            source: "empty".into(),
            ..Default::default()
        };
        assert_eq!(generate_ddl(&rule), "CREATE TABLE IF NOT EXISTS empty (\n);");
    }
}
